use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use super::ProcessArgs;
use crate::config::Config;
use crate::entities::cost::CostTracker;
use crate::entities::item_cache::ItemCache;
use crate::entities::note::{FileNoteSource, NoteSource, TextNoteSource};
use crate::entities::shopping_list;
use crate::error::ShoplistError;
use crate::mcp::NotesMcpClient;
use crate::sources::claude::ClaudeClient;

const STDIN_NOTE_ID: &str = "stdin";

async fn read_stdin() -> Result<String, ShoplistError> {
    let mut text = String::new();
    tokio::io::stdin().read_to_string(&mut text).await?;
    Ok(text)
}

/// Picks the note source and the id to process.
async fn note_source(
    args: &ProcessArgs,
    config: &Config,
) -> Result<(Box<dyn NoteSource>, String), ShoplistError> {
    if let Some(path) = &args.file {
        let source = FileNoteSource::new(path);
        let id = args.note_id.clone().unwrap_or_else(|| source.note_id());
        return Ok((Box::new(source), id));
    }
    if args.stdin {
        let source = TextNoteSource::new(read_stdin().await?, STDIN_NOTE_ID);
        let id = args
            .note_id
            .clone()
            .unwrap_or_else(|| STDIN_NOTE_ID.to_string());
        return Ok((Box::new(source), id));
    }
    match args.note_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => Ok((
            Box::new(NotesMcpClient::new(config.mcp.clone())),
            id.to_string(),
        )),
        _ => Err(ShoplistError::InvalidArgument(
            "A note id, --file, or --stdin is required. List notes with: shoplist notes list"
                .into(),
        )),
    }
}

pub(super) async fn run(
    args: ProcessArgs,
    mut config: Config,
    debug: bool,
) -> anyhow::Result<String> {
    if let Some(profile) = args.profile {
        config.apply_profile(profile);
        info!(profile = profile.name(), "Applied cost profile");
    }
    let format = args.format.unwrap_or(config.output.format);

    let (source, note_id) = note_source(&args, &config).await?;
    let claude = ClaudeClient::new(&config.claude, config.api_key()?)?;
    let costs = CostTracker::new(config.cost_log_path());
    let cache = config
        .cache
        .enabled
        .then(|| ItemCache::new(config.item_cache_path()));

    let save = config.output.save_to_file && !args.no_save;
    let list = match shopping_list::process(
        source.as_ref(),
        &note_id,
        &claude,
        &costs,
        cache.as_ref(),
    )
    .await
    {
        Ok(list) => list,
        Err(ShoplistError::ResponseParse { message, raw }) if save => {
            let dir = &config.output.output_directory;
            if let Err(err) = shopping_list::save_unparsed(&message, &raw, &note_id, dir).await {
                warn!("Failed to save unparsed model response: {err}");
            }
            return Err(ShoplistError::ResponseParse { message, raw }.into());
        }
        Err(err) => return Err(err.into()),
    };

    if save {
        shopping_list::save(&list, &note_id, &config.output.output_directory).await?;
    }

    let mut out = crate::render::shopping_list(&list, format)?;
    if debug {
        out.push_str("\n\n");
        out.push_str(&crate::render::markdown::cost_summary_markdown(
            &costs.stats(),
        )?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(note_id: Option<&str>) -> ProcessArgs {
        ProcessArgs {
            note_id: note_id.map(str::to_string),
            file: None,
            stdin: false,
            format: None,
            profile: None,
            no_save: false,
        }
    }

    #[tokio::test]
    async fn missing_note_id_is_invalid_argument() {
        let err = note_source(&args(None), &Config::default())
            .await
            .err()
            .expect("error");
        assert!(matches!(err, ShoplistError::InvalidArgument(_)));

        let err = note_source(&args(Some("  ")), &Config::default())
            .await
            .err()
            .expect("error");
        assert!(err.to_string().contains("--file"));
    }

    #[tokio::test]
    async fn file_source_uses_file_stem_as_id() {
        let mut args = args(None);
        args.file = Some("notes/weekly groceries.txt".into());
        let (source, id) = note_source(&args, &Config::default()).await.expect("source");
        assert_eq!(source.name(), "file");
        assert_eq!(id, "weekly groceries");
    }

    #[tokio::test]
    async fn note_id_selects_mcp_source() {
        let (source, id) = note_source(&args(Some("p7")), &Config::default())
            .await
            .expect("source");
        assert_eq!(source.name(), "mcp");
        assert_eq!(id, "p7");
    }

    #[tokio::test]
    async fn process_requires_api_key_before_calling_out() {
        let dir = tempfile::tempdir().unwrap();
        let note = dir.path().join("groceries.txt");
        std::fs::write(&note, "milk").unwrap();

        let mut args = args(None);
        args.file = Some(note);
        let mut config = Config::default();
        config.claude.api_key = None;
        config.cost.log_file = Some(dir.path().join("cost_log.json"));

        let err = run(args, config, false).await.expect_err("no key");
        let err = err.downcast::<ShoplistError>().expect("shoplist error");
        assert!(matches!(err, ShoplistError::ApiKeyRequired { .. }));
    }

    #[tokio::test]
    async fn process_from_file_renders_and_saves() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [{"type": "text", "text": "{\"shopping_list\":[{\"item\":\"Milk\",\"category\":\"dairy\",\"priority\":\"high\",\"estimated_cost\":\"$4.00\"}]}"}],
                "usage": {"input_tokens": 100, "output_tokens": 20}
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let note = dir.path().join("groceries.txt");
        std::fs::write(&note, "Groceries\n- milk").unwrap();
        let outputs = dir.path().join("outputs");

        let mut config = Config::default();
        config.claude.api_key = Some("test-key".into());
        config.claude.base_url = server.uri();
        config.cost.log_file = Some(dir.path().join("cost_log.json"));
        config.cache.path = Some(dir.path().join("item_cache.json"));
        config.output.output_directory = outputs.clone();

        let mut args = args(None);
        args.file = Some(note);
        args.format = Some(crate::config::OutputFormat::Text);

        let out = run(args, config, true).await.expect("output");
        assert!(out.starts_with("SHOPPING LIST\n"));
        assert!(out.contains("[ ] Milk (high) - $4.00"));
        assert!(out.contains("# API Cost Summary"));

        let saved = std::fs::read_dir(&outputs)
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect::<Vec<_>>();
        assert_eq!(saved.len(), 1);
        assert!(saved[0].starts_with("shopping_list_groceries_"));
    }

    #[tokio::test]
    async fn unparseable_answer_is_saved_for_inspection() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [{"type": "text", "text": "Nothing here looks like shopping."}]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let note = dir.path().join("todo.txt");
        std::fs::write(&note, "call mom").unwrap();
        let outputs = dir.path().join("outputs");

        let mut config = Config::default();
        config.claude.api_key = Some("test-key".into());
        config.claude.base_url = server.uri();
        config.cost.log_file = Some(dir.path().join("cost_log.json"));
        config.cache.enabled = false;
        config.output.output_directory = outputs.clone();

        let mut args = args(None);
        args.file = Some(note);

        let err = run(args, config, false).await.expect_err("parse failure");
        assert!(err.to_string().contains("No JSON found in response"));

        let saved = std::fs::read_dir(&outputs)
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.path())
            .collect::<Vec<_>>();
        assert_eq!(saved.len(), 1);
        let body: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&saved[0]).unwrap()).unwrap();
        assert_eq!(body["error"], "No JSON found in response");
        assert_eq!(body["raw_response"], "Nothing here looks like shopping.");
    }
}
