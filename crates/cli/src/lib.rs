pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "grievance",
    about = "Grievance workflow operator CLI",
    long_about = "Operate the grievance workflow store: migrations, demo data, readiness checks, config inspection, and auto-escalation sweeps.",
    after_help = "Examples:\n  grievance doctor --json\n  grievance overdue\n  grievance sweep --at 2026-03-01T00:00:00Z"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo categories, users, sessions and complaints (idempotent)")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution"
    )]
    Config,
    #[command(about = "Validate config, DB connectivity, schema and escalation rule readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run one auto-escalation sweep and print its summary")]
    Sweep {
        #[arg(long, help = "Evaluate deadlines as of this RFC 3339 instant instead of now")]
        at: Option<String>,
    },
    #[command(about = "List overdue complaints with hours open and hours overdue")]
    Overdue {
        #[arg(long, help = "Evaluate deadlines as of this RFC 3339 instant instead of now")]
        at: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Sweep { at } => commands::sweep::run(at.as_deref()),
        Command::Overdue { at } => commands::overdue::run(at.as_deref()),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
