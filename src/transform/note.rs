use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::entities::note::{Note, NoteImage};

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"https?://[^\s<>"')\]]+"#).expect("valid regex"))
}

fn html_hint_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<(div|br|p|li|ul|ol|h[1-6]|body|html|span)\b").expect("valid regex")
    })
}

fn html_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<br\s*/?>|</(div|p|li|h[1-6]|tr|ul|ol)>").expect("valid regex")
    })
}

fn html_list_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<li\b[^>]*>").expect("valid regex"))
}

fn html_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<[^>]+>").expect("valid regex"))
}

fn blank_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("valid regex"))
}

pub(crate) fn looks_like_html(text: &str) -> bool {
    html_hint_re().is_match(text)
}

/// Flattens an Apple Notes HTML body into plain lines.
pub(crate) fn html_to_text(html: &str) -> String {
    let out = html_list_item_re().replace_all(html, "- ");
    let out = html_break_re().replace_all(&out, "\n");
    let out = html_tag_re().replace_all(&out, "");
    let out = out
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    let out = out
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    blank_run_re()
        .replace_all(out.trim(), "\n\n")
        .to_string()
}

pub(crate) fn extract_links(text: &str) -> Vec<String> {
    link_re()
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':']).to_string())
        .collect()
}

fn merge_links(reported: Vec<String>, text: &str) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    reported
        .into_iter()
        .chain(extract_links(text))
        .map(|link| link.trim().to_string())
        .filter(|link| !link.is_empty())
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

fn first_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .trim_start_matches(['#', '-', '*', ' '])
        .to_string()
}

fn normalize_body(raw: &str) -> String {
    if looks_like_html(raw) {
        html_to_text(raw)
    } else {
        raw.trim().to_string()
    }
}

/// Builds a note from a plain-text (or HTML) body.
pub fn from_text(raw: &str, id: &str, source: &str) -> Note {
    let text = normalize_body(raw);
    Note {
        id: id.to_string(),
        title: first_line(&text),
        links: merge_links(Vec::new(), &text),
        text,
        images: Vec::new(),
        created_date: None,
        modified_date: None,
        source: source.to_string(),
    }
}

fn json_get_string(value: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match value.get(*key) {
            Some(Value::String(v)) if !v.trim().is_empty() => return Some(v.trim().to_string()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn json_string_list(value: &Value, key: &str) -> Vec<String> {
    match value.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                other => json_get_string(other, &["url", "href"]),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn json_images(value: &Value) -> Vec<NoteImage> {
    let Some(Value::Array(items)) = value.get("images").or_else(|| value.get("attachments"))
    else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(name) => Some(NoteImage {
                name: Some(name.clone()),
                ..Default::default()
            }),
            Value::Object(_) => Some(NoteImage {
                name: json_get_string(item, &["name", "filename", "id"]),
                media_type: json_get_string(item, &["media_type", "mime_type", "mimeType"]),
                data: json_get_string(item, &["data", "base64"]),
            }),
            _ => None,
        })
        .collect()
}

/// Builds a note from a JSON tool result. A `{"note": {...}}` wrapper is unwrapped.
pub fn from_json(value: &Value, fallback_id: &str, source: &str) -> Note {
    let value = match value.get("note") {
        Some(inner @ Value::Object(_)) => inner,
        _ => value,
    };

    let text = json_get_string(value, &["text", "body", "content", "plaintext"])
        .map(|raw| normalize_body(&raw))
        .unwrap_or_default();
    let title = json_get_string(value, &["title", "name"]).unwrap_or_else(|| first_line(&text));
    let links = merge_links(json_string_list(value, "links"), &text);

    Note {
        id: json_get_string(value, &["id", "note_id", "noteId"])
            .unwrap_or_else(|| fallback_id.to_string()),
        title,
        links,
        images: json_images(value),
        created_date: json_get_string(
            value,
            &["created_date", "creation_date", "created", "creationDate"],
        ),
        modified_date: json_get_string(
            value,
            &[
                "modified_date",
                "modification_date",
                "modified",
                "modificationDate",
            ],
        ),
        text,
        source: source.to_string(),
    }
}

/// Tool results are either a JSON note object or the note body itself.
pub fn from_tool_text(raw: &str, fallback_id: &str, source: &str) -> Note {
    match serde_json::from_str::<Value>(raw.trim()) {
        Ok(value @ Value::Object(_)) => from_json(&value, fallback_id, source),
        _ => from_text(raw, fallback_id, source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_text_uses_first_line_as_title_and_finds_links() {
        let note = from_text(
            "Buy this\nPacsun extra baggy pants https://www.pacsun.com/pants.\nI want to make CK's kimchi fried rice",
            "buy-this-note",
            "mcp",
        );
        assert_eq!(note.title, "Buy this");
        assert_eq!(note.links, vec!["https://www.pacsun.com/pants".to_string()]);
        assert!(note.text.contains("kimchi fried rice"));
    }

    #[test]
    fn html_bodies_are_flattened() {
        let note = from_text(
            "<div><h1>Groceries</h1></div><ul><li>Milk &amp; eggs</li><li>Bread</li></ul><div><br></div>",
            "n1",
            "mcp",
        );
        assert_eq!(note.title, "Groceries");
        assert!(note.text.contains("- Milk & eggs"));
        assert!(note.text.contains("- Bread"));
        assert!(!note.text.contains('<'));
    }

    #[test]
    fn from_json_reads_aliases_and_images() {
        let value = json!({
            "note": {
                "noteId": "x-coredata://ICNote/p7",
                "name": "Hardware store",
                "body": "Light bulbs (LED)\nhttps://example.com/bulbs",
                "links": ["https://example.com/bulbs", "https://example.com/soap"],
                "attachments": [
                    {"filename": "shelf.png", "mimeType": "image/png", "data": "iVBORw0KGgo="},
                    "receipt.jpg"
                ],
                "creationDate": "2026-01-02T10:00:00Z"
            }
        });
        let note = from_json(&value, "fallback", "mcp");
        assert_eq!(note.id, "x-coredata://ICNote/p7");
        assert_eq!(note.title, "Hardware store");
        assert_eq!(
            note.links,
            vec![
                "https://example.com/bulbs".to_string(),
                "https://example.com/soap".to_string()
            ]
        );
        assert_eq!(note.images.len(), 2);
        assert_eq!(note.images[0].media_type.as_deref(), Some("image/png"));
        assert_eq!(note.images[1].data, None);
        assert_eq!(note.created_date.as_deref(), Some("2026-01-02T10:00:00Z"));
    }

    #[test]
    fn from_tool_text_falls_back_to_plain_text() {
        let note = from_tool_text("- milk\n- bread", "n2", "mcp");
        assert_eq!(note.id, "n2");
        assert_eq!(note.title, "milk");

        let note = from_tool_text(r#"{"id": 42, "text": "eggs"}"#, "n3", "mcp");
        assert_eq!(note.id, "42");
        assert_eq!(note.text, "eggs");
    }
}
