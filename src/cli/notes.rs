use clap::Subcommand;

use crate::config::Config;
use crate::entities::note::NoteSource;
use crate::mcp::NotesMcpClient;

#[derive(Subcommand, Debug)]
pub enum NotesCommand {
    /// List notes offered by the MCP server
    List {
        /// Only notes matching this text
        #[arg(long, short)]
        query: Option<String>,
    },
    /// Show one note as the processing pipeline sees it
    Show {
        note_id: String,
        /// Print JSON instead of Markdown
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(cmd: NotesCommand, config: &Config) -> anyhow::Result<String> {
    let client = NotesMcpClient::new(config.mcp.clone());
    match cmd {
        NotesCommand::List { query } => {
            let listing = client.list_notes(query.as_deref()).await?;
            if listing.trim().is_empty() {
                return Ok("No notes found.".to_string());
            }
            Ok(listing)
        }
        NotesCommand::Show { note_id, json } => {
            let note = client.fetch_note(&note_id).await?;
            if json {
                return Ok(crate::render::json::to_pretty(&note)?);
            }
            Ok(crate::render::markdown::note_markdown(&note)?)
        }
    }
}
