use switchboard_sessions::{
    FsSessionStore, MemorySessionStore, SessionEntry, SessionStore, SessionStoreResult,
};

async fn exercise_upsert_update_list<T: SessionStore>(store: &T) -> SessionStoreResult<()> {
    store
        .upsert("agent:main:main", SessionEntry::new("s-main", 100))
        .await?;
    store
        .upsert("agent:main:subagent:a", SessionEntry::new("s-a", 200))
        .await?;

    let updated = store
        .update(
            "agent:main:subagent:a",
            Box::new(|entry: &mut SessionEntry| {
                entry.aborted_last_run = true;
                entry.updated_at_ms = 300;
            }),
        )
        .await?
        .expect("entry should exist");
    assert!(updated.aborted_last_run);
    assert_eq!(updated.updated_at_ms, 300);

    let listed = store.list().await?;
    let keys: Vec<&str> = listed.iter().map(|(key, _)| key.as_str()).collect();
    assert_eq!(keys, vec!["agent:main:main", "agent:main:subagent:a"]);
    Ok(())
}

async fn exercise_missing_lookups<T: SessionStore>(store: &T) -> SessionStoreResult<()> {
    assert!(store.get("agent:main:ghost").await?.is_none());
    assert!(
        store
            .update(
                "agent:main:ghost",
                Box::new(|entry: &mut SessionEntry| entry.aborted_last_run = true),
            )
            .await?
            .is_none()
    );
    assert!(store.get("   ").await.is_err());
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn memory_store_upsert_update_list_expected_sorted_entries() {
    let store = MemorySessionStore::new();
    exercise_upsert_update_list(&store)
        .await
        .expect("memory store flow should succeed");
}

#[tokio::test(flavor = "current_thread")]
async fn fs_store_upsert_update_list_expected_sorted_entries() {
    let tmp = tempfile::tempdir().expect("tempdir should be created");
    let store = FsSessionStore::new(tmp.path()).expect("fs store should initialize");
    exercise_upsert_update_list(&store)
        .await
        .expect("fs store flow should succeed");
}

#[tokio::test(flavor = "current_thread")]
async fn memory_store_missing_lookups_expected_none() {
    let store = MemorySessionStore::new();
    exercise_missing_lookups(&store)
        .await
        .expect("memory store lookups should succeed");
}

#[tokio::test(flavor = "current_thread")]
async fn fs_store_missing_lookups_expected_none() {
    let tmp = tempfile::tempdir().expect("tempdir should be created");
    let store = FsSessionStore::new(tmp.path()).expect("fs store should initialize");
    exercise_missing_lookups(&store)
        .await
        .expect("fs store lookups should succeed");
}

#[tokio::test(flavor = "current_thread")]
async fn fs_store_two_handles_same_dir_expected_both_writes_kept() {
    let tmp = tempfile::tempdir().expect("tempdir should be created");
    let first = FsSessionStore::new(tmp.path()).expect("first handle should initialize");
    let second = FsSessionStore::new(tmp.path()).expect("second handle should initialize");

    first
        .upsert("agent:main:a", SessionEntry::new("s-a", 100))
        .await
        .expect("first upsert should succeed");
    second
        .upsert("agent:main:b", SessionEntry::new("s-b", 200))
        .await
        .expect("second upsert should succeed");
    first
        .update(
            "agent:main:b",
            Box::new(|entry: &mut SessionEntry| entry.aborted_last_run = true),
        )
        .await
        .expect("update should succeed")
        .expect("first handle should see the second handle's entry");

    let reopened = FsSessionStore::new(tmp.path()).expect("store should reopen");
    let listed = reopened.list().await.expect("list should succeed");
    let keys: Vec<&str> = listed.iter().map(|(key, _)| key.as_str()).collect();
    assert_eq!(keys, vec!["agent:main:a", "agent:main:b"]);
    assert!(listed[1].1.aborted_last_run);
    assert!(
        second
            .get("agent:main:a")
            .await
            .expect("get should succeed")
            .is_some()
    );
}
