#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum ShoplistError {
    #[error("HTTP client initialization failed: {0}")]
    HttpClientInit(reqwest::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP middleware error: {0}")]
    HttpMiddleware(#[from] reqwest_middleware::Error),

    #[error("API error from {api}: {message}")]
    Api { api: String, message: String },

    #[error("API JSON error from {api}: {source}")]
    ApiJson {
        api: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{entity} '{id}' not found.\n\n{suggestion}")]
    NotFound {
        entity: String,
        id: String,
        suggestion: String,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(
        "API key required: {api} requires {env_var} environment variable.\n\nTo set:\n  export {env_var}=your-key\n\nMore info: {docs_url}"
    )]
    ApiKeyRequired {
        api: String,
        env_var: String,
        docs_url: String,
    },

    #[error("Source unavailable: {source_name} is not available. {reason}\n\nTry: {suggestion}")]
    SourceUnavailable {
        source_name: String,
        reason: String,
        suggestion: String,
    },

    #[error("MCP error: {0}")]
    Mcp(String),

    #[error("Failed to parse model response: {message}")]
    ResponseParse { message: String, raw: String },

    #[error("Config error in {path}: {message}")]
    Config { path: String, message: String },

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::ShoplistError;

    #[test]
    fn not_found_display_includes_suggestion() {
        let err = ShoplistError::NotFound {
            entity: "note".to_string(),
            id: "x-coredata://note/p42".to_string(),
            suggestion: "Try listing notes: shoplist notes list".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("note 'x-coredata://note/p42' not found"));
        assert!(msg.contains("Try listing notes"));
    }

    #[test]
    fn api_key_required_display_includes_env_var_and_docs() {
        let err = ShoplistError::ApiKeyRequired {
            api: "claude".to_string(),
            env_var: "CLAUDE_API_KEY".to_string(),
            docs_url: "https://console.anthropic.com/settings/keys".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("CLAUDE_API_KEY"));
        assert!(msg.contains("https://console.anthropic.com/settings/keys"));
    }

    #[test]
    fn source_unavailable_display_includes_reason() {
        let err = ShoplistError::SourceUnavailable {
            source_name: "apple-notes-mcp".to_string(),
            reason: "No such file or directory".to_string(),
            suggestion: "Set mcp.command in config.yaml".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("Source unavailable: apple-notes-mcp"));
        assert!(msg.contains("No such file or directory"));
        assert!(msg.contains("Set mcp.command"));
    }

    #[test]
    fn response_parse_display_omits_raw_body() {
        let err = ShoplistError::ResponseParse {
            message: "No JSON found in response".to_string(),
            raw: "Sorry, I cannot help with that.".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("No JSON found in response"));
        assert!(!msg.contains("Sorry"));
    }
}
