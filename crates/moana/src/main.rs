// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Moana - a conversational agent with long-term memory.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod app;
mod shell;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use moana_config::{MoanaConfig, RunOverrides};
use moana_core::MoanaError;
use moana_memory::MemoryKind;

/// Moana - a conversational agent with long-term memory.
#[derive(Parser, Debug)]
#[command(name = "moana", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Launch an interactive REPL session.
    Shell {
        /// User whose memories are read and written.
        #[arg(long)]
        user: Option<String>,
        /// Resume an existing session instead of starting a new one.
        #[arg(long)]
        session: Option<String>,
    },
    /// Send one message and print the reply.
    Chat {
        message: String,
        #[arg(long)]
        user: Option<String>,
    },
    /// Print stored long-term memory.
    Memories {
        #[arg(long)]
        user: Option<String>,
        /// Only this kind (memories, triples, profile).
        #[arg(long)]
        kind: Option<MemoryKind>,
    },
    /// Print the effective configuration with secrets redacted.
    Config,
}

impl Commands {
    fn user(&self) -> Option<String> {
        match self {
            Commands::Shell { user, .. }
            | Commands::Chat { user, .. }
            | Commands::Memories { user, .. } => user.clone(),
            Commands::Config => None,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("moana: use --help for available commands");
        return ExitCode::SUCCESS;
    };

    let overrides = RunOverrides {
        user_id: command.user(),
        ..RunOverrides::default()
    };
    let config = match moana_config::load_and_validate(&overrides) {
        Ok(config) => config,
        Err(errors) => {
            moana_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };

    let interactive = matches!(command, Commands::Shell { .. });
    init_tracing(&config.agent.log_level, interactive);

    match run(command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", "error".red());
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, config: MoanaConfig) -> Result<(), MoanaError> {
    match command {
        Commands::Shell { session, .. } => shell::run_shell(config, session).await,
        Commands::Chat { message, .. } => {
            let app = app::App::build(&config).await?;
            let session = app.agent.start_session().await?;
            let outcome = app.agent.send(&session.id, &message).await;
            app.close().await?;
            println!("{}", outcome?.reply);
            Ok(())
        }
        Commands::Memories { kind, .. } => {
            let app = app::Offline::open(&config).await?;
            let kinds = kind.map(|k| vec![k]).unwrap_or_else(|| MemoryKind::ALL.to_vec());
            app.print_memories(&config.agent.user_id, &kinds).await;
            app.close().await
        }
        Commands::Config => {
            println!("{}", redacted_toml(&config)?);
            Ok(())
        }
    }
}

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` wins over `agent.log_level`. Interactive sessions only show
/// warnings so log lines do not interleave with the conversation.
fn init_tracing(log_level: &str, interactive: bool) {
    use tracing_subscriber::EnvFilter;

    let level = if interactive { "warn" } else { log_level };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("moana={level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

const REDACTED: &str = "********";

fn redacted_toml(config: &MoanaConfig) -> Result<String, MoanaError> {
    let mut config = config.clone();
    if config.anthropic.api_key.is_some() {
        config.anthropic.api_key = Some(REDACTED.to_string());
    }
    if config.embedding.api_key.is_some() {
        config.embedding.api_key = Some(REDACTED.to_string());
    }
    toml::to_string_pretty(&config)
        .map_err(|e| MoanaError::Config(format!("failed to render configuration: {e}")))
}
