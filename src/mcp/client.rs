use std::process::Stdio;
use std::time::Duration;

use rmcp::model::{CallToolRequestParam, CallToolResult, RawContent};
use rmcp::service::{RoleClient, RunningService};
use rmcp::transport::TokioChildProcess;
use rmcp::ServiceExt;
use tracing::{debug, info, warn};

use crate::config::McpConfig;
use crate::entities::note::{Note, NoteImage, NoteSource, ensure_content};
use crate::error::ShoplistError;

const SOURCE_NAME: &str = "mcp";

/// One content block of a tool result, reduced to what notes use.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ToolOutput {
    Text(String),
    Image { data: String, mime_type: String },
}

fn tool_outputs(result: CallToolResult) -> (bool, Vec<ToolOutput>) {
    let is_error = result.is_error.unwrap_or(false);
    let outputs = result
        .content
        .into_iter()
        .filter_map(|content| match content.raw {
            RawContent::Text(text) => Some(ToolOutput::Text(text.text)),
            RawContent::Image(image) => Some(ToolOutput::Image {
                data: image.data,
                mime_type: image.mime_type,
            }),
            _ => None,
        })
        .collect();
    (is_error, outputs)
}

fn joined_text(outputs: &[ToolOutput]) -> String {
    outputs
        .iter()
        .filter_map(|output| match output {
            ToolOutput::Text(text) => Some(text.as_str()),
            ToolOutput::Image { .. } => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Builds a note from the content of a `get_note`-style tool call.
pub(crate) fn note_from_outputs(
    id: &str,
    is_error: bool,
    outputs: &[ToolOutput],
) -> Result<Note, ShoplistError> {
    let text = joined_text(outputs);
    if is_error {
        let detail = text.trim();
        return Err(ShoplistError::NotFound {
            entity: "note".into(),
            id: id.to_string(),
            suggestion: if detail.is_empty() {
                "List notes with: shoplist notes list".to_string()
            } else {
                format!("Notes server said: {detail}\nList notes with: shoplist notes list")
            },
        });
    }

    let mut note = crate::transform::note::from_tool_text(&text, id, SOURCE_NAME);
    note.images
        .extend(outputs.iter().filter_map(|output| match output {
            ToolOutput::Image { data, mime_type } => Some(NoteImage {
                name: None,
                media_type: Some(mime_type.clone()),
                data: Some(data.clone()),
            }),
            ToolOutput::Text(_) => None,
        }));
    ensure_content(note)
}

/// Text of a `list_notes`-style tool call; a tool error becomes an MCP error.
pub(crate) fn listing_from_outputs(
    tool: &str,
    is_error: bool,
    outputs: &[ToolOutput],
) -> Result<String, ShoplistError> {
    let text = joined_text(outputs);
    if is_error {
        let detail = text.trim();
        return Err(ShoplistError::Mcp(if detail.is_empty() {
            format!("{tool} failed")
        } else {
            format!("{tool}: {detail}")
        }));
    }
    Ok(text)
}

/// Client for an Apple Notes MCP server run as a child process over stdio.
#[derive(Debug, Clone)]
pub struct NotesMcpClient {
    settings: McpConfig,
}

impl NotesMcpClient {
    pub fn new(settings: McpConfig) -> Self {
        Self { settings }
    }

    fn unavailable(&self, reason: impl Into<String>) -> ShoplistError {
        ShoplistError::SourceUnavailable {
            source_name: self.settings.command.clone(),
            reason: reason.into(),
            suggestion: "Set mcp.command in config.yaml or SHOPLIST_MCP_COMMAND, or use --file"
                .into(),
        }
    }

    fn command(&self) -> Result<tokio::process::Command, ShoplistError> {
        let mut parts = shlex::split(&self.settings.command)
            .ok_or_else(|| self.unavailable("mcp.command has unbalanced quotes"))?
            .into_iter();
        let program = parts
            .next()
            .ok_or_else(|| self.unavailable("mcp.command is empty"))?;

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(parts)
            .args(&self.settings.args)
            .stderr(Stdio::null())
            .kill_on_drop(true);
        Ok(cmd)
    }

    async fn connect(&self) -> Result<RunningService<RoleClient, ()>, ShoplistError> {
        let mut cmd = self.command()?;
        let transport = TokioChildProcess::new(&mut cmd)
            .map_err(|err| self.unavailable(format!("failed to start: {err}")))?;
        debug!(command = %self.settings.command, "Starting MCP server");
        ().serve(transport)
            .await
            .map_err(|err| self.unavailable(format!("handshake failed: {err}")))
    }

    /// Starts the server, runs `op`, and shuts it down, all within the configured timeout.
    async fn with_service<T, F, Fut>(&self, op: F) -> Result<T, ShoplistError>
    where
        F: FnOnce(RunningService<RoleClient, ()>) -> Fut,
        Fut: std::future::Future<Output = (RunningService<RoleClient, ()>, Result<T, ShoplistError>)>,
    {
        let limit = Duration::from_secs(self.settings.timeout_seconds.max(1));
        let run = async {
            let service = self.connect().await?;
            let (service, result) = op(service).await;
            if let Err(err) = service.cancel().await {
                warn!("MCP server shutdown failed: {err}");
            }
            result
        };
        tokio::time::timeout(limit, run)
            .await
            .map_err(|_| self.unavailable(format!("no response within {}s", limit.as_secs())))?
    }

    async fn call(
        service: &RunningService<RoleClient, ()>,
        tool: &str,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Result<CallToolResult, ShoplistError> {
        service
            .call_tool(CallToolRequestParam {
                name: tool.to_string().into(),
                arguments: Some(arguments),
            })
            .await
            .map_err(|err| ShoplistError::Mcp(format!("{tool}: {err}")))
    }

    /// Text listing of notes, optionally filtered by a search query.
    pub async fn list_notes(&self, query: Option<&str>) -> Result<String, ShoplistError> {
        let tool = self.settings.list_tool.clone();
        let mut arguments = serde_json::Map::new();
        if let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) {
            arguments.insert("query".into(), query.into());
        }

        let (is_error, outputs) = self
            .with_service(|service| async move {
                let result = Self::call(&service, &tool, arguments).await;
                (service, result.map(tool_outputs))
            })
            .await?;
        listing_from_outputs(&self.settings.list_tool, is_error, &outputs)
    }

    /// Names of the tools the server offers.
    pub async fn list_tools(&self) -> Result<Vec<String>, ShoplistError> {
        self.with_service(|service| async move {
            let result = service
                .list_tools(Default::default())
                .await
                .map(|listing| {
                    listing
                        .tools
                        .into_iter()
                        .map(|tool| tool.name.to_string())
                        .collect::<Vec<_>>()
                })
                .map_err(|err| ShoplistError::Mcp(format!("list_tools: {err}")));
            (service, result)
        })
        .await
    }
}

#[async_trait::async_trait]
impl NoteSource for NotesMcpClient {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch_note(&self, id: &str) -> Result<Note, ShoplistError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ShoplistError::InvalidArgument("Note id is required".into()));
        }

        let tool = self.settings.get_tool.clone();
        let mut arguments = serde_json::Map::new();
        arguments.insert(self.settings.id_argument.clone(), id.into());

        info!(tool = %tool, note_id = id, "Fetching note from MCP server");
        let (is_error, outputs) = self
            .with_service(|service| async move {
                let result = Self::call(&service, &tool, arguments).await;
                (service, result.map(tool_outputs))
            })
            .await?;
        note_from_outputs(id, is_error, &outputs)
    }
}
