use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::ShoplistError;
use crate::mcp::NotesMcpClient;

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthRow {
    pub check: String,
    pub status: String,
    pub detail: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthReport {
    pub healthy: usize,
    pub total: usize,
    pub rows: Vec<HealthRow>,
}

impl HealthReport {
    pub fn all_healthy(&self) -> bool {
        self.healthy == self.total
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# shoplist Health Check\n\n");
        out.push_str("| Check | Status | Detail |\n");
        out.push_str("|-------|--------|--------|\n");
        for row in &self.rows {
            out.push_str(&format!(
                "| {} | {} | {} |\n",
                row.check, row.status, row.detail
            ));
        }
        out.push_str(&format!(
            "\nStatus: {}/{} checks healthy\n",
            self.healthy, self.total
        ));
        out
    }

    /// The rendered report, or an error carrying it when any check failed.
    pub fn into_result(self) -> anyhow::Result<String> {
        let markdown = self.to_markdown();
        if self.all_healthy() {
            return Ok(markdown);
        }
        anyhow::bail!(
            "{} of {} health checks failed\n\n{markdown}",
            self.total - self.healthy,
            self.total
        )
    }
}

fn row(check: impl Into<String>, ok: bool, detail: impl Into<String>) -> HealthRow {
    HealthRow {
        check: check.into(),
        status: if ok { "ok" } else { "error" }.into(),
        detail: detail.into(),
    }
}

async fn check_claude(client: reqwest::Client, base: &str, api_key: Option<&str>) -> HealthRow {
    const CHECK: &str = "Claude API";
    let Some(api_key) = api_key else {
        return row(CHECK, false, "no API key (set CLAUDE_API_KEY)");
    };

    let url = format!("{}/v1/models", base.trim_end_matches('/'));
    let start = Instant::now();
    let resp = client
        .get(&url)
        .header("x-api-key", api_key)
        .header("anthropic-version", "2023-06-01")
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await;

    match resp {
        Ok(resp) => {
            let status = resp.status();
            let elapsed = start.elapsed().as_millis();
            if status.is_success() {
                row(CHECK, true, format!("{elapsed}ms"))
            } else {
                row(CHECK, false, format!("{elapsed}ms (HTTP {})", status.as_u16()))
            }
        }
        Err(err) => {
            let reason = if err.is_timeout() {
                "timeout"
            } else if err.is_connect() {
                "connect"
            } else {
                "error"
            };
            row(CHECK, false, reason)
        }
    }
}

async fn check_mcp(client: &NotesMcpClient, get_tool: &str) -> HealthRow {
    const CHECK: &str = "Notes MCP server";
    let start = Instant::now();
    match client.list_tools().await {
        Ok(tools) if tools.iter().any(|t| t == get_tool) => row(
            CHECK,
            true,
            format!("{}ms ({} tools)", start.elapsed().as_millis(), tools.len()),
        ),
        Ok(tools) => row(
            CHECK,
            false,
            format!("tool '{get_tool}' missing; offers: {}", tools.join(", ")),
        ),
        Err(err) => row(
            CHECK,
            false,
            err.to_string().lines().next().unwrap_or("error").to_string(),
        ),
    }
}

fn health_http_client() -> Result<reqwest::Client, ShoplistError> {
    static HEALTH_HTTP_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

    if let Some(client) = HEALTH_HTTP_CLIENT.get() {
        return Ok(client.clone());
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .connect_timeout(Duration::from_secs(5))
        .user_agent(concat!("shoplist-cli/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(ShoplistError::HttpClientInit)?;

    match HEALTH_HTTP_CLIENT.set(client.clone()) {
        Ok(()) => Ok(client),
        Err(_) => HEALTH_HTTP_CLIENT
            .get()
            .cloned()
            .ok_or_else(|| ShoplistError::Api {
                api: "health".into(),
                message: "Health HTTP client initialization race".into(),
            }),
    }
}

async fn check_writable_dir(label: &str, dir: &Path) -> HealthRow {
    let start = Instant::now();
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let probe = dir.join(format!(".shoplist-healthcheck-{suffix}.tmp"));

    let result = async {
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&probe, b"ok").await?;
        match tokio::fs::remove_file(&probe).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
    .await;

    let check = format!("{label} ({})", dir.display());
    match result {
        Ok(()) => row(check, true, format!("{}ms", start.elapsed().as_millis())),
        Err(err) => row(check, false, format!("{:?}", err.kind())),
    }
}

fn data_dir(config: &Config) -> PathBuf {
    config
        .cost_log_path()
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(crate::utils::paths::shoplist_data_dir)
}

/// Checks the Claude API, the notes MCP server, and the local directories shoplist writes to.
///
/// # Errors
///
/// Returns an error when the health HTTP client cannot be created.
pub async fn check(config: &Config) -> Result<HealthReport, ShoplistError> {
    let client = health_http_client()?;
    let api_key = config.api_key().ok();
    let mcp = NotesMcpClient::new(config.mcp.clone());

    let (claude, notes) = tokio::join!(
        check_claude(client, &config.claude.base_url, api_key),
        check_mcp(&mcp, &config.mcp.get_tool),
    );
    let rows = vec![
        claude,
        notes,
        check_writable_dir("Output dir", &config.output.output_directory).await,
        check_writable_dir("Data dir", &data_dir(config)).await,
    ];

    let healthy = rows.iter().filter(|r| r.status == "ok").count();
    Ok(HealthReport {
        healthy,
        total: rows.len(),
        rows,
    })
}
