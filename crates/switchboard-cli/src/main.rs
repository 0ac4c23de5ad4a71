mod config;
mod demo;

use clap::{ArgAction, Parser, Subcommand};
use config::SwitchboardConfig;
use demo::EchoRunner;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use switchboard_control::{ActiveRuns, ControlMessage, ControlPlane};
use switchboard_followup::{FollowupItem, FollowupQueues, FollowupRunner, OriginRoute, RunContext};
use switchboard_sessions::{
    FsSessionStore, MemorySessionStore, MemorySubagentRegistry, SessionEntry, SessionStore,
    now_ms,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Parser, Debug)]
#[command(name = "switchboard")]
#[command(about = "Follow-up queue and stop-command host for chat sessions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reads `<session-key> <text>` lines from stdin and drains them through a demo engine.
    Run(RunArgs),
    /// Prints the durable session records in a state directory.
    Sessions(SessionsArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    state_dir: Option<PathBuf>,
    #[arg(long, default_value_t = 200)]
    turn_ms: u64,
}

#[derive(clap::Args, Debug)]
struct SessionsArgs {
    #[arg(long)]
    state_dir: PathBuf,
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

struct Gateway {
    config: SwitchboardConfig,
    store: Arc<dyn SessionStore>,
    control: ControlPlane,
    runner: Arc<dyn FollowupRunner>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run(args) => run_command(args).await,
        Commands::Sessions(args) => sessions_command(args).await,
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(1)
        }
    }
}

// stdout carries command output only.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run_command(args: RunArgs) -> Result<ExitCode, String> {
    let config = SwitchboardConfig::load(args.config.as_deref())?;
    let store: Arc<dyn SessionStore> = match args.state_dir.as_deref() {
        Some(dir) => Arc::new(FsSessionStore::new(dir).map_err(|e| e.to_string())?),
        None => Arc::new(MemorySessionStore::new()),
    };
    let queues = FollowupQueues::new(config.drain.clone());
    let runs = ActiveRuns::new();
    let control = ControlPlane::new(
        queues.clone(),
        store.clone(),
        Arc::new(MemorySubagentRegistry::new()),
        Arc::new(runs.clone()),
        config.control.clone(),
    )
    .map_err(|e| e.to_string())?;
    let runner: Arc<dyn FollowupRunner> = Arc::new(EchoRunner::new(
        store.clone(),
        runs,
        Duration::from_millis(args.turn_ms),
    ));
    let gateway = Gateway {
        config,
        store,
        control,
        runner,
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| format!("failed reading stdin: {e}"))?
    {
        match parse_line(&line) {
            Some((session_key, text)) => gateway.handle_line(session_key, text).await?,
            None if line.trim().is_empty() => {}
            None => tracing::warn!(%line, "expected '<session-key> <text>'"),
        }
    }

    while !queues.keys().is_empty() {
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }
    Ok(ExitCode::SUCCESS)
}

impl Gateway {
    async fn handle_line(&self, session_key: &str, text: &str) -> Result<(), String> {
        let outcome = self
            .control
            .handle_inbound_control_message(&ControlMessage::new(session_key, text))
            .await
            .map_err(|e| e.to_string())?;
        if outcome.handled {
            println!(
                "control session={session_key} aborted={} stopped={}",
                outcome.aborted, outcome.stopped_subagents
            );
            return Ok(());
        }

        let entry = self.ensure_session(session_key).await?;
        // A stop that arrived before the record existed cancels the run it raced with.
        if self
            .control
            .honor_pending_abort(session_key)
            .await
            .map_err(|e| e.to_string())?
        {
            println!("control session={session_key} aborted=true pending=true");
            return Ok(());
        }
        self.control
            .take_abort_flag(session_key)
            .await
            .map_err(|e| e.to_string())?;

        let route = route_for(session_key);
        let settings = self.config.queue_settings_for(route.channel.as_deref());
        let mut run = RunContext::new(entry.session_id, session_key);
        run.agent_id = session_key.split(':').nth(1).map(str::to_string);
        let item = FollowupItem::new(text, run).with_route(route);

        let queues = self.control.queues();
        let outcome = queues
            .enqueue(session_key, item, settings)
            .map_err(|e| e.to_string())?;
        tracing::debug!(session_key, ?outcome, "message queued");
        queues.schedule_drain(session_key, self.runner.clone());
        Ok(())
    }

    async fn ensure_session(&self, session_key: &str) -> Result<SessionEntry, String> {
        if let Some(entry) = self.store.get(session_key).await.map_err(|e| e.to_string())? {
            return Ok(entry);
        }
        let entry = SessionEntry::with_generated_id(now_ms());
        self.store
            .upsert(session_key, entry.clone())
            .await
            .map_err(|e| e.to_string())?;
        tracing::info!(session_key, session_id = %entry.session_id, "session created");
        Ok(entry)
    }
}

async fn sessions_command(args: SessionsArgs) -> Result<ExitCode, String> {
    let store = FsSessionStore::new(&args.state_dir).map_err(|e| e.to_string())?;
    let entries = store.list().await.map_err(|e| e.to_string())?;

    if args.json {
        let map: BTreeMap<String, SessionEntry> = entries.into_iter().collect();
        let json = serde_json::to_string_pretty(&map).map_err(|e| e.to_string())?;
        println!("{json}");
        return Ok(ExitCode::SUCCESS);
    }

    if entries.is_empty() {
        println!("no sessions in {}", args.state_dir.display());
    }
    for (key, entry) in entries {
        println!(
            "{key} session_id={} aborted_last_run={} updated_at_ms={}",
            entry.session_id, entry.aborted_last_run, entry.updated_at_ms
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn parse_line(line: &str) -> Option<(&str, &str)> {
    let (session_key, text) = line.trim().split_once(char::is_whitespace)?;
    let text = text.trim();
    (!session_key.is_empty() && !text.is_empty()).then_some((session_key, text))
}

/// `agent:<id>:<channel>:<peer...>` keys carry their reply route.
fn route_for(session_key: &str) -> OriginRoute {
    let segments: Vec<&str> = session_key.split(':').collect();
    match segments.as_slice() {
        [_, _, channel, peer @ ..] if !peer.is_empty() => {
            OriginRoute::new(*channel, peer.join(":"))
        }
        _ => OriginRoute::default(),
    }
}
