pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "faqbot",
    about = "FAQ bot operator CLI",
    long_about = "Inspect configuration, query the knowledge base and check runtime readiness.",
    after_help = "Examples:\n  faqbot config\n  faqbot ask \"How do I share my screen?\"\n  \
                  faqbot doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Ask the knowledge base a question and print the candidates it would offer")]
    Ask {
        #[arg(help = "Question text, as a user would type it")]
        question: Vec<String>,
    },
    #[command(about = "Validate config and probe the knowledge base and answer page settings")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Ask { question } => commands::ask::run(&question.join(" ")),
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
