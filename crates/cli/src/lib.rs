pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "saiborg",
    about = "Saiborg operator CLI",
    long_about = "Operate the saiborg assistant: offline document indexing, CRM connectivity checks, configuration inspection, and readiness diagnostics.",
    after_help = "Examples:\n  saiborg index\n  saiborg index --data-dir ./docs\n  saiborg crm-test\n  saiborg doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Build or refresh the vector store from a directory of PDF documents")]
    Index {
        #[arg(
            long,
            help = "Source document directory (defaults to the configured index.data_dir)"
        )]
        data_dir: Option<String>,
    },
    #[command(
        name = "crm-test",
        about = "Round-trip the CRM connection using the configured API key"
    )]
    CrmTest,
    #[command(about = "Validate config, Slack token shape, vector store and CRM readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Inspect effective configuration values with secrets redacted")]
    Config,
}

pub fn run() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Index { data_dir } => commands::index::run(data_dir),
        Command::CrmTest => commands::crm_test::run(),
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
