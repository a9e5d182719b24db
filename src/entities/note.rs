use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ShoplistError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteImage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Base64 payload when the source shipped the image bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub images: Vec<NoteImage>,
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_date: Option<String>,
    pub source: String,
}

impl Note {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.images.is_empty() && self.links.is_empty()
    }
}

/// Where notes come from: the MCP server, or a local file for offline runs.
#[async_trait::async_trait]
pub trait NoteSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_note(&self, id: &str) -> Result<Note, ShoplistError>;
}

/// Reads a note from disk. `.json` files use the MCP note shape; anything
/// else is the note body.
#[derive(Debug, Clone)]
pub struct FileNoteSource {
    path: PathBuf,
}

impl FileNoteSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn note_id(&self) -> String {
        file_stem(&self.path)
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| "file".to_string())
}

#[async_trait::async_trait]
impl NoteSource for FileNoteSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch_note(&self, id: &str) -> Result<Note, ShoplistError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ShoplistError::NotFound {
                    entity: "note file".into(),
                    id: self.path.display().to_string(),
                    suggestion: "Check the --file path".into(),
                });
            }
            Err(err) => return Err(err.into()),
        };

        let is_json = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let note = if is_json {
            let value: serde_json::Value = serde_json::from_str(&raw)?;
            crate::transform::note::from_json(&value, id, "file")
        } else {
            crate::transform::note::from_text(&raw, id, "file")
        };
        ensure_content(note)
    }
}

/// A note already held in memory, e.g. read from stdin.
#[derive(Debug, Clone)]
pub struct TextNoteSource {
    text: String,
    source: &'static str,
}

impl TextNoteSource {
    pub fn new(text: impl Into<String>, source: &'static str) -> Self {
        Self {
            text: text.into(),
            source,
        }
    }
}

#[async_trait::async_trait]
impl NoteSource for TextNoteSource {
    fn name(&self) -> &str {
        self.source
    }

    async fn fetch_note(&self, id: &str) -> Result<Note, ShoplistError> {
        ensure_content(crate::transform::note::from_text(&self.text, id, self.source))
    }
}

pub(crate) fn ensure_content(note: Note) -> Result<Note, ShoplistError> {
    if note.is_empty() {
        return Err(ShoplistError::NotFound {
            entity: "note content".into(),
            id: note.id,
            suggestion: "The note is empty; add items to it and try again".into(),
        });
    }
    Ok(note)
}
