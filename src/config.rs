//! Configuration: `config.yaml`, `.env`, and environment overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ShoplistError;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
pub const API_KEY_ENV: &str = "CLAUDE_API_KEY";
const API_KEY_FALLBACK_ENV: &str = "ANTHROPIC_API_KEY";
const API_KEY_PLACEHOLDER: &str = "your-claude-api-key-here";
const API_KEY_DOCS: &str = "https://console.anthropic.com/settings/keys";
const CLAUDE_BASE_ENV: &str = "SHOPLIST_CLAUDE_BASE";
const MCP_COMMAND_ENV: &str = "SHOPLIST_MCP_COMMAND";
const LOG_LEVEL_ENV: &str = "SHOPLIST_LOG_LEVEL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub claude: ClaudeConfig,
    pub mcp: McpConfig,
    pub output: OutputConfig,
    pub debug: DebugConfig,
    pub cost: CostConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaudeConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub base_url: String,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "claude-3-5-sonnet-20241022".to_string(),
            max_tokens: 2000,
            temperature: 0.0,
            base_url: "https://api.anthropic.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    /// Full command line, split shell-style. `args` are appended.
    pub command: String,
    pub args: Vec<String>,
    pub get_tool: String,
    pub list_tool: String,
    pub id_argument: String,
    pub timeout_seconds: u64,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            command: "npx -y apple-notes-mcp".to_string(),
            args: Vec::new(),
            get_tool: "get_note".to_string(),
            list_tool: "list_notes".to_string(),
            id_argument: "id".to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    #[default]
    Markdown,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub save_to_file: bool,
    pub output_directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Markdown,
            save_to_file: true,
            output_directory: PathBuf::from("outputs"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl Config {
    /// Loads `.env`, the YAML file, then environment overrides.
    ///
    /// A missing file at the default path yields defaults; a missing file at an
    /// explicitly requested path is an error.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ShoplistError> {
        dotenv::dotenv().ok();

        let explicit = path.is_some();
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        let mut config = match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_yaml(&raw).map_err(|err| ShoplistError::Config {
                path: path.display().to_string(),
                message: err.to_string(),
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound && !explicit => {
                debug!(path = %path.display(), "No config file; using defaults");
                Self::default()
            }
            Err(err) => {
                return Err(ShoplistError::Config {
                    path: path.display().to_string(),
                    message: err.to_string(),
                });
            }
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ShoplistError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    fn apply_env(&mut self) {
        self.apply_overrides(env_value);
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(API_KEY_ENV).or_else(|| lookup(API_KEY_FALLBACK_ENV)) {
            self.claude.api_key = Some(key);
        }
        if let Some(base) = lookup(CLAUDE_BASE_ENV) {
            self.claude.base_url = base;
        }
        if let Some(command) = lookup(MCP_COMMAND_ENV) {
            self.mcp.command = command;
        }
        if let Some(level) = lookup(LOG_LEVEL_ENV) {
            self.debug.log_level = level;
        }
    }

    /// The Claude API key, rejecting empty values and the sample placeholder.
    pub fn api_key(&self) -> Result<&str, ShoplistError> {
        match self.claude.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() && key != API_KEY_PLACEHOLDER => Ok(key),
            _ => Err(ShoplistError::ApiKeyRequired {
                api: "claude".into(),
                env_var: API_KEY_ENV.into(),
                docs_url: API_KEY_DOCS.into(),
            }),
        }
    }

    pub fn cost_log_path(&self) -> PathBuf {
        self.cost
            .log_file
            .clone()
            .unwrap_or_else(|| crate::utils::paths::shoplist_data_dir().join("cost_log.json"))
    }

    pub fn item_cache_path(&self) -> PathBuf {
        self.cache
            .path
            .clone()
            .unwrap_or_else(|| crate::utils::paths::shoplist_data_dir().join("item_cache.json"))
    }

    /// Overrides generation settings with a named cost profile.
    pub fn apply_profile(&mut self, profile: crate::entities::cost::CostProfile) {
        let settings = profile.settings();
        self.claude.max_tokens = settings.max_tokens;
        self.claude.temperature = settings.temperature;
    }
}
