use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use switchboard_control::ActiveRuns;
use switchboard_followup::{FollowupRunner, FollowupTurn, RunError, TurnKind};
use switchboard_sessions::{SessionEntry, SessionStore, SessionStoreError, now_ms};

/// Stand-in execution engine: holds each turn for a fixed time, then prints it.
///
/// Runs register with [`ActiveRuns`] so stop commands can cut them short, and touch
/// the durable session record on completion the way a real engine would.
pub struct EchoRunner {
    store: Arc<dyn SessionStore>,
    runs: ActiveRuns,
    turn_duration: Duration,
}

impl EchoRunner {
    pub fn new(store: Arc<dyn SessionStore>, runs: ActiveRuns, turn_duration: Duration) -> Self {
        Self {
            store,
            runs,
            turn_duration,
        }
    }
}

#[async_trait]
impl FollowupRunner for EchoRunner {
    async fn run(&self, turn: FollowupTurn) -> Result<(), RunError> {
        let session_id = turn.run.session_id.clone();
        let handle = self.runs.register(&session_id);
        let aborted = tokio::select! {
            _ = tokio::time::sleep(self.turn_duration) => false,
            _ = handle.aborted() => true,
        };
        self.runs.finish(&session_id);
        if aborted {
            println!("aborted session={}", turn.session_key);
            return Ok(());
        }

        let completed_at = now_ms();
        self.store
            .update(
                &turn.session_key,
                Box::new(move |entry: &mut SessionEntry| entry.updated_at_ms = completed_at),
            )
            .await
            .map_err(run_error)?;

        let prompt = serde_json::to_string(&turn.prompt)
            .map_err(|error| RunError::Failed(error.to_string()))?;
        println!(
            "delivered session={} kind={} prompt={}",
            turn.session_key,
            kind_label(&turn.kind),
            prompt
        );
        Ok(())
    }
}

fn run_error(error: SessionStoreError) -> RunError {
    match error {
        SessionStoreError::Locked(detail) => RunError::Locked(detail),
        other => RunError::Failed(other.to_string()),
    }
}

fn kind_label(kind: &TurnKind) -> &'static str {
    match kind {
        TurnKind::Single => "single",
        TurnKind::Collected { .. } => "collected",
        TurnKind::DropSummary { .. } => "summary",
    }
}
