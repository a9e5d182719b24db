use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use tracing::{debug, info, warn};

use crate::entities::cost::{CostTracker, TokenUsage};
use crate::entities::item_cache::ItemCache;
use crate::entities::note::{Note, NoteSource};
use crate::entities::timing::{self, TimingAnalysis};
use crate::error::ShoplistError;
use crate::sources::claude::{ClaudeClient, ContentBlock};

pub const SYSTEM_PROMPT: &str = r#"You are a shopping assistant. Read the user's note and extract everything they intend to buy.
Respond with a single JSON object and nothing else, using this shape:
{
  "shopping_list": [
    {"item": "name", "category": "groceries", "priority": "high|medium|low", "estimated_cost": "$0.00", "quantity": "1", "notes": "optional detail"}
  ],
  "total_estimated_cost": "$0.00",
  "categories": ["groceries"],
  "recommended_stores": ["store name"]
}
Only include actionable items someone could buy. Skip ideas, reminders, and links that are not products."#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Unknown or blank values are `medium`.
    pub fn from_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" | "urgent" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(match raw {
            Some(serde_json::Value::String(s)) => Self::from_lenient(&s),
            _ => Self::Medium,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShoppingItem {
    #[serde(
        alias = "name",
        default,
        deserialize_with = "crate::utils::serde::lenient_string"
    )]
    pub item: String,
    #[serde(
        default,
        deserialize_with = "crate::utils::serde::string_or_number_as_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(
        default,
        alias = "cost",
        deserialize_with = "crate::utils::serde::string_or_number_as_cost",
        skip_serializing_if = "Option::is_none"
    )]
    pub estimated_cost: Option<String>,
    #[serde(
        default,
        deserialize_with = "crate::utils::serde::string_or_number_as_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub quantity: Option<String>,
    #[serde(
        default,
        deserialize_with = "crate::utils::serde::string_or_number_as_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListMetadata {
    pub source_note_id: String,
    pub note_title: String,
    pub processed_at: String,
    pub version: String,
    pub model: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShoppingList {
    #[serde(
        rename = "shopping_list",
        alias = "items",
        default,
        deserialize_with = "lenient_items"
    )]
    pub items: Vec<ShoppingItem>,
    #[serde(
        default,
        deserialize_with = "crate::utils::serde::string_or_number_as_cost",
        skip_serializing_if = "Option::is_none"
    )]
    pub total_estimated_cost: Option<String>,
    #[serde(
        default,
        deserialize_with = "crate::utils::serde::lenient_string_list"
    )]
    pub categories: Vec<String>,
    #[serde(
        default,
        deserialize_with = "crate::utils::serde::lenient_string_list"
    )]
    pub recommended_stores: Vec<String>,
    #[serde(
        default,
        deserialize_with = "crate::utils::serde::invalid_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub timing: Option<TimingAnalysis>,
    #[serde(
        default,
        deserialize_with = "crate::utils::serde::invalid_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub metadata: Option<ListMetadata>,
}

/// Item entries may be objects or bare names.
fn lenient_items<'de, D>(deserializer: D) -> Result<Vec<ShoppingItem>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values = match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(serde_json::Value::Array(values)) => values,
        Some(value) => vec![value],
    };
    values
        .into_iter()
        .map(|value| match value {
            serde_json::Value::Object(_) => {
                serde_json::from_value(value).map_err(serde::de::Error::custom)
            }
            other => Ok(ShoppingItem {
                item: crate::utils::serde::value_text(other).unwrap_or_default(),
                ..ShoppingItem::default()
            }),
        })
        .collect()
}

/// Prompt body for a note: text, image count, then links, separated by blank lines.
pub fn format_note_content(note: &Note) -> String {
    let mut parts: Vec<String> = Vec::new();
    let text = note.text.trim();
    if !text.is_empty() {
        parts.push(format!("Text content:\n{text}"));
    }
    if !note.images.is_empty() {
        parts.push(format!("Contains {} images", note.images.len()));
    }
    if !note.links.is_empty() {
        let links = note
            .links
            .iter()
            .map(|link| format!("- {link}"))
            .collect::<Vec<_>>()
            .join("\n");
        parts.push(format!("Links found:\n{links}"));
    }
    parts.join("\n\n")
}

fn content_blocks(note: &Note) -> Vec<ContentBlock> {
    let mut blocks = vec![ContentBlock::text(format_note_content(note))];
    for image in &note.images {
        if let (Some(media_type), Some(data)) = (&image.media_type, &image.data) {
            blocks.push(ContentBlock::base64_image(media_type, data));
        }
    }
    blocks
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

/// A reply cut off by the token limit is usually why its JSON will not parse.
fn explain_truncation(err: ShoplistError, stop_reason: Option<&str>) -> ShoplistError {
    match (err, stop_reason) {
        (ShoplistError::ResponseParse { message, raw }, Some("max_tokens")) => {
            ShoplistError::ResponseParse {
                message: format!(
                    "{message} (the reply hit the max_tokens limit; raise claude.max_tokens or choose a larger --profile)"
                ),
                raw,
            }
        }
        (err, _) => err,
    }
}

/// Runs one note through the model and returns the finished document.
pub async fn process(
    source: &dyn NoteSource,
    note_id: &str,
    claude: &ClaudeClient,
    costs: &CostTracker,
    cache: Option<&ItemCache>,
) -> Result<ShoppingList, ShoplistError> {
    info!(note_id, source = source.name(), "Fetching note");
    let note = source.fetch_note(note_id).await?;
    debug!(
        title = %note.title,
        images = note.images.len(),
        links = note.links.len(),
        "Note fetched"
    );

    let blocks = content_blocks(&note);
    let prompt = format_note_content(&note);
    let reply = claude.create_message(SYSTEM_PROMPT, &blocks).await?;

    let usage = TokenUsage::metered_or_estimated(
        reply.usage,
        &format!("{SYSTEM_PROMPT}\n{prompt}"),
        &reply.text,
    );
    if let Err(err) = costs.log_call(&note.id, &reply.model, usage, now_rfc3339()) {
        warn!(path = %costs.path().display(), "Failed to record API cost: {err}");
    }

    let mut list = match crate::transform::shopping_list::parse_response(&reply.text) {
        Ok(list) => list,
        Err(err) => {
            warn!(raw = %reply.text, "Model response could not be parsed");
            return Err(explain_truncation(err, reply.stop_reason.as_deref()));
        }
    };
    if !list.items.is_empty() {
        list.timing = Some(timing::analyze(&list.items));
    }
    list.metadata = Some(ListMetadata {
        source_note_id: note.id.clone(),
        note_title: note.title.clone(),
        processed_at: now_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: reply.model,
    });

    if let Some(cache) = cache {
        match cache.remember_items(&list.items) {
            Ok(added) if added > 0 => debug!(added, "Item cache updated"),
            Ok(_) => {}
            Err(err) => warn!("Failed to update item cache: {err}"),
        }
    }

    info!(items = list.items.len(), "Shopping list ready");
    Ok(list)
}

pub fn output_file_name(note_id: &str, at: OffsetDateTime) -> String {
    let stamp = at
        .format(format_description!(
            "[year][month][day]_[hour][minute][second]"
        ))
        .unwrap_or_else(|_| at.unix_timestamp().to_string());
    format!(
        "shopping_list_{}_{stamp}.json",
        crate::utils::paths::file_component(note_id)
    )
}

#[derive(Serialize)]
struct UnparsedResponse<'a> {
    error: &'a str,
    raw_response: &'a str,
}

/// Keeps a model answer that could not be parsed, as `{error, raw_response}`.
pub async fn save_unparsed(
    message: &str,
    raw: &str,
    note_id: &str,
    dir: &Path,
) -> Result<PathBuf, ShoplistError> {
    let path = dir.join(output_file_name(note_id, OffsetDateTime::now_utc()));
    let body = crate::render::json::to_pretty(&UnparsedResponse {
        error: message,
        raw_response: raw,
    })?;
    crate::utils::paths::write_atomic(&path, &body).await?;
    warn!(path = %path.display(), "Saved unparsed model response");
    Ok(path)
}

/// Writes the pretty JSON document into `dir` and returns the file path.
pub async fn save(
    list: &ShoppingList,
    note_id: &str,
    dir: &Path,
) -> Result<PathBuf, ShoplistError> {
    let path = dir.join(output_file_name(note_id, OffsetDateTime::now_utc()));
    let body = crate::render::json::to_pretty(list)?;
    crate::utils::paths::write_atomic(&path, &body).await?;
    info!(path = %path.display(), "Saved shopping list");
    Ok(path)
}
