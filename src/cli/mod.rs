//! Command-line surface: argument parsing and dispatch. Every command renders to a `String`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{Config, OutputFormat};
use crate::entities::cost::CostProfile;

pub mod cache;
pub mod cost;
pub mod health;
pub mod notes;
mod process;

pub use cache::CacheCommand;
pub use cost::CostCommand;
pub use notes::NotesCommand;

#[derive(Parser, Debug)]
#[command(
    name = "shoplist",
    version,
    about = "Turn an Apple Note into a shopping list using Claude"
)]
pub struct Cli {
    /// Path to the YAML config file (default: ./config.yaml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Debug logging; `process` also appends an API cost summary
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a note, ask Claude for the items in it, and print the shopping list
    Process(ProcessArgs),
    /// Browse notes on the Apple Notes MCP server
    #[command(subcommand)]
    Notes(NotesCommand),
    /// API cost log, model pricing, and cost profiles
    #[command(subcommand)]
    Cost(CostCommand),
    /// Inspect the cache of previously seen items
    #[command(subcommand)]
    Cache(CacheCommand),
    /// Check the Claude API, the notes MCP server, and local directories
    Health,
}

#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Apple Notes id to fetch through the MCP server
    pub note_id: Option<String>,

    /// Read the note from a local file instead (.json or plain text)
    #[arg(long, value_name = "PATH", conflicts_with = "stdin")]
    pub file: Option<PathBuf>,

    /// Read the note text from standard input
    #[arg(long)]
    pub stdin: bool,

    /// Output format (default from config)
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Generation profile overriding max_tokens and temperature
    #[arg(long, value_enum)]
    pub profile: Option<CostProfile>,

    /// Do not write the JSON result to the output directory
    #[arg(long)]
    pub no_save: bool,
}

/// Runs a parsed command against a loaded config.
///
/// # Errors
///
/// Returns an error when the command fails; `main` prints it and exits non-zero.
pub async fn run(cli: Cli, config: Config) -> anyhow::Result<String> {
    match cli.command {
        Commands::Process(args) => process::run(args, config, cli.debug).await,
        Commands::Notes(cmd) => notes::run(cmd, &config).await,
        Commands::Cost(cmd) => cost::run(cmd, &config),
        Commands::Cache(cmd) => cache::run(cmd, &config),
        Commands::Health => health::check(&config).await?.into_result(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_accepts_note_id_and_flags() {
        let cli = Cli::try_parse_from([
            "shoplist",
            "--debug",
            "process",
            "x-coredata://ICNote/p7",
            "--format",
            "json",
            "--profile",
            "minimal",
            "--no-save",
        ])
        .expect("parse");
        assert!(cli.debug);
        let Commands::Process(args) = cli.command else {
            panic!("expected process");
        };
        assert_eq!(args.note_id.as_deref(), Some("x-coredata://ICNote/p7"));
        assert_eq!(args.format, Some(OutputFormat::Json));
        assert_eq!(args.profile, Some(CostProfile::Minimal));
        assert!(args.no_save);
    }

    #[test]
    fn file_and_stdin_conflict() {
        let err = Cli::try_parse_from(["shoplist", "process", "--file", "a.txt", "--stdin"])
            .expect_err("conflict");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn global_config_flag_works_after_subcommand() {
        let cli = Cli::try_parse_from(["shoplist", "cost", "summary", "--config", "alt.yaml"])
            .expect("parse");
        assert_eq!(cli.config, Some(PathBuf::from("alt.yaml")));
        assert!(matches!(
            cli.command,
            Commands::Cost(CostCommand::Summary { json: false })
        ));
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(Cli::try_parse_from(["shoplist", "process", "n1", "--format", "pdf"]).is_err());
    }
}
