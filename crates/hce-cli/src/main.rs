// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! hce: command-line front end for the hook coordination daemon.

mod client;
mod commands;
mod env;
mod exit_error;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use exit_error::ExitError;
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "hce", version, about = "Hook coordination engine client")]
struct Cli {
    #[arg(long, value_enum, global = true, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every configured hook for a lifecycle event.
    Run {
        /// Event name, e.g. PreToolUse, PostToolUse, SessionStart.
        event: String,
        /// Project directory to resolve settings and dispatch hooks from.
        #[arg(long, default_value = ".")]
        cwd: PathBuf,
        #[arg(long)]
        session_id: Option<String>,
        /// Cancel remaining hooks in the group as soon as one fails.
        #[arg(long)]
        fail_fast: bool,
        /// Run only the named hooks (as `group<N>-hook<N>`) instead of every
        /// hook configured for the event. May be repeated.
        #[arg(long = "hook")]
        hooks: Vec<String>,
    },
    /// Report daemon health and basic counters.
    Status,
    /// Manage the daemon process.
    Daemon {
        #[command(subcommand)]
        command: commands::daemon::DaemonCommand,
    },
    /// Inspect orchestrations.
    Orchestration {
        #[command(subcommand)]
        command: OrchestrationCommand,
    },
    /// Inspect per-directory slot leases.
    Leases,
}

#[derive(Subcommand)]
enum OrchestrationCommand {
    /// Show one orchestration's current state.
    Show { id: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        if let Some(exit_error) = err.downcast_ref::<ExitError>() {
            eprintln!("{exit_error}");
            std::process::exit(exit_error.code);
        }
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Run { event, cwd, session_id, fail_fast, hooks } => {
            commands::run::handle(commands::run::RunOptions {
                event,
                cwd,
                session_id,
                fail_fast: fail_fast.then_some(true),
                hooks,
            })
            .await
        }
        Command::Status => commands::status::handle(cli.output).await,
        Command::Daemon { command } => commands::daemon::handle(command, cli.output).await,
        Command::Orchestration { command } => match command {
            OrchestrationCommand::Show { id } => commands::orchestration::show(id, cli.output).await,
        },
        Command::Leases => commands::leases::list(cli.output).await,
    }
}
