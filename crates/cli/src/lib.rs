pub mod commands;

use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use leadflow_core::config::{AppConfig, LoadOptions, LogFormat, LoggingConfig};

#[derive(Debug, Parser)]
#[command(
    name = "leadflow",
    about = "Leadflow operator CLI",
    long_about = "Apply migrations, load demo data, distribute unassigned leads, and inspect lead history.",
    after_help = "Examples:\n  leadflow migrate\n  leadflow distribute\n  leadflow distribute --lead 4 --lead 5 --user 2\n  leadflow history 4 --limit 10"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Reload the deterministic demo sales team and unassigned leads")]
    Seed,
    #[command(
        about = "Round-robin unassigned NEW leads to active sales persons",
        long_about = "Without arguments every unassigned NEW lead is distributed to the active \
                      sales persons. With --lead and --user only the listed leads are spread \
                      over the listed users."
    )]
    Distribute {
        #[arg(long = "lead", value_name = "LEAD_ID", requires = "users")]
        leads: Vec<i64>,
        #[arg(long = "user", value_name = "USER_ID", requires = "leads")]
        users: Vec<i64>,
    },
    #[command(about = "Show lead counts and per sales person load")]
    Stats,
    #[command(about = "Show the audit trail of a lead, newest first")]
    History {
        lead: i64,
        #[arg(long, help = "Only show the most recent entries")]
        limit: Option<usize>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    if let Err(error) = install_logging() {
        eprintln!("logging disabled: {error:#}");
    }

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Distribute { leads, users } => commands::distribute::run(&leads, &users),
        Command::Stats => commands::stats::run(),
        Command::History { lead, limit } => commands::history::run(lead, limit),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

fn install_logging() -> anyhow::Result<()> {
    let config =
        AppConfig::load(LoadOptions::default()).context("loading logging configuration")?;
    init_logging(&config.logging)
}

/// Events go to stderr; stdout carries only the command outcome.
fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    use tracing::Level;

    let level = config.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .with_writer(std::io::stderr);

    let installed = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|error| anyhow::anyhow!("installing tracing subscriber: {error}"))
}
