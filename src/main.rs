// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Sidekick main entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::json;
use tokio::sync::mpsc;

use sidekick::config::{self, CliOptions, ResolvedConfig};
use sidekick::gateway::{GatewayClient, SocketTransport};
use sidekick::orchestrate::{
    task_budget, AnnounceFlow, AnnounceSupervisor, CompletionWatcher, RequesterContext,
    SubagentOrchestrator, SubagentRegistry, UsageResolver,
};
use sidekick::session::FileSessionStore;
use sidekick::telemetry::{init_telemetry, TelemetryConfig};
use sidekick::tools::{ToolRegistry, SESSIONS_SPAWN};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Size of the buffer between the socket reader and the completion watcher.
const EVENT_BUFFER: usize = 256;

/// Sidekick - background sub-agents for chat sessions.
#[derive(Parser)]
#[command(name = "sidekick")]
#[command(author, version, about = "Spawn sub-agent runs and announce their results", long_about = None)]
struct Cli {
    /// Gateway socket path
    #[arg(long, global = true, env = "SIDEKICK_SOCKET")]
    socket: Option<PathBuf>,

    /// Session store path
    #[arg(long, global = true, env = "SIDEKICK_SESSION_STORE")]
    store: Option<PathBuf>,

    /// Show debug logs and a metrics report
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Spawn a sub-agent run
    Spawn {
        /// Task for the sub-agent
        #[arg(short, long)]
        task: String,

        /// Requester session key
        #[arg(short, long, default_value = "main")]
        requester: String,

        /// Chat provider of the requester (discord, slack, ...)
        #[arg(short, long)]
        provider: Option<String>,

        /// Label for the run
        #[arg(short, long)]
        label: Option<String>,

        /// Model override for the sub-agent session
        #[arg(short, long)]
        model: Option<String>,

        /// Seconds to wait for the run (0 returns immediately)
        #[arg(long, default_value_t = 0)]
        timeout: u64,

        /// What to do with the sub-agent session afterwards
        #[arg(long, value_enum, default_value = "keep")]
        cleanup: CleanupArg,

        /// Requester runs in a sandbox; record it as the owner of the child
        #[arg(long)]
        sandboxed: bool,
    },

    /// Show resolved configuration
    Config,

    /// Write an example .sidekick.json in the current directory
    Init,

    /// Show version information
    Version,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CleanupArg {
    Delete,
    Keep,
}

impl CleanupArg {
    fn as_str(self) -> &'static str {
        match self {
            CleanupArg::Delete => "delete",
            CleanupArg::Keep => "keep",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _telemetry = init_telemetry(&TelemetryConfig::for_cli(cli.verbose))?;

    let cli_options = CliOptions {
        socket_path: cli.socket.clone(),
        session_store: cli.store.clone(),
        ..Default::default()
    };

    match cli.command {
        Commands::Spawn {
            task,
            requester,
            provider,
            label,
            model,
            timeout,
            cleanup,
            sandboxed,
        } => {
            let config = config::load_config(&std::env::current_dir()?, cli_options)?;
            let mut requester = RequesterContext::new(requester).sandboxed(sandboxed);
            if let Some(provider) = provider {
                requester = requester.with_provider(provider);
            }
            let args = json!({
                "task": task,
                "label": label,
                "model": model,
                "timeoutSeconds": timeout,
                "cleanup": cleanup.as_str(),
            });
            run_spawn(&config, requester, args).await?;
        }
        Commands::Config => {
            let config = config::load_config(&std::env::current_dir()?, cli_options)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Init => {
            let path = config::init_config(&std::env::current_dir()?, Some(config::get_example_config()))?;
            println!("{} {}", "Created config file:".green(), path.display());
        }
        Commands::Version => {
            println!("sidekick {}", VERSION);
        }
    }

    #[cfg(feature = "telemetry")]
    if cli.verbose {
        eprintln!("{}", sidekick::telemetry::GLOBAL_METRICS.snapshot().format_report().dimmed());
    }

    Ok(())
}

async fn run_spawn(
    config: &ResolvedConfig,
    requester: RequesterContext,
    args: serde_json::Value,
) -> anyhow::Result<()> {
    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
    let transport = SocketTransport::connect(&config.socket_path, Some(events_tx)).await?;
    let client = GatewayClient::new(Arc::new(transport))
        .with_timeouts(config.call_timeout(), config.abort_timeout());

    let store = Arc::new(FileSessionStore::new(config.session_store.clone()));
    let usage = Arc::new(UsageResolver::new(store, config.pricing.clone()).with_poll(config.usage_poll()));
    let announcer = AnnounceFlow::new(client.clone(), usage);
    let registry = Arc::new(SubagentRegistry::new());
    let supervisor = Arc::new(AnnounceSupervisor::new());

    let watcher = CompletionWatcher::new(
        Arc::clone(&registry),
        announcer.clone(),
        Arc::clone(&supervisor),
        config.announce_timeout(),
    )
    .spawn(events_rx);

    let orchestrator = SubagentOrchestrator::new(client, registry, announcer, Arc::clone(&supervisor))
        .with_alias(config.main_session_alias())
        .with_announce_timeout(config.announce_timeout());
    let tools = ToolRegistry::for_requester(Arc::new(orchestrator), requester);

    let dispatched = tools.dispatch(SESSIONS_SPAWN, args).await?;
    println!("{}", dispatched.output.content());

    let status = dispatched
        .output
        .metadata()
        .and_then(|m| m["status"].as_str())
        .unwrap_or("error")
        .to_string();
    let label = if dispatched.output.is_success() {
        status.green().bold()
    } else {
        status.red().bold()
    };
    eprintln!("{} {}", "spawn:".dimmed(), label);

    if supervisor.pending() > 0 {
        eprintln!("{}", "Waiting for announce to finish...".dimmed());
    }
    let aborted = supervisor.drain(task_budget(config.announce_timeout())).await;
    if aborted > 0 {
        eprintln!("{} {}", "Abandoned announce tasks:".yellow(), aborted);
    }
    watcher.abort();

    Ok(())
}
