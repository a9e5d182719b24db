use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ClaudeConfig;
use crate::error::ShoplistError;

const CLAUDE_API: &str = "claude";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// One block of a user message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn base64_image(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::Image {
            source: ImageSource {
                kind: "base64",
                media_type: media_type.into(),
                data: data.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: String,
    data: String,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: [UserMessage<'a>; 1],
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a [ContentBlock],
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClaudeReply {
    pub text: String,
    pub model: String,
    pub stop_reason: Option<String>,
    /// `(input, output)` tokens as metered by the API.
    pub usage: Option<(u64, u64)>,
}

pub struct ClaudeClient {
    client: reqwest_middleware::ClientWithMiddleware,
    base: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl ClaudeClient {
    pub fn new(settings: &ClaudeConfig, api_key: &str) -> Result<Self, ShoplistError> {
        Ok(Self {
            client: crate::sources::shared_client()?,
            base: settings.base_url.clone(),
            api_key: api_key.to_string(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        })
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(base: String) -> Result<Self, ShoplistError> {
        let settings = ClaudeConfig {
            base_url: base,
            ..ClaudeConfig::default()
        };
        Self::new(&settings, "test-key")
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn authorized(
        &self,
        req: reqwest_middleware::RequestBuilder,
    ) -> reqwest_middleware::RequestBuilder {
        req.header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        req: reqwest_middleware::RequestBuilder,
    ) -> Result<T, ShoplistError> {
        let resp = self.authorized(req).send().await?;
        let status = resp.status();
        let content_type = resp.headers().get(reqwest::header::CONTENT_TYPE).cloned();
        let bytes = crate::sources::read_limited_body(resp, CLAUDE_API).await?;
        if !status.is_success() {
            return Err(ShoplistError::Api {
                api: CLAUDE_API.to_string(),
                message: format!("HTTP {status}: {}", error_message(&bytes)),
            });
        }
        crate::sources::ensure_json_content_type(CLAUDE_API, content_type.as_ref(), &bytes)?;
        serde_json::from_slice(&bytes).map_err(|source| ShoplistError::ApiJson {
            api: CLAUDE_API.to_string(),
            source,
        })
    }

    /// Sends a single-turn Messages API request and joins the text blocks of the reply.
    pub async fn create_message(
        &self,
        system: &str,
        content: &[ContentBlock],
    ) -> Result<ClaudeReply, ShoplistError> {
        if content.is_empty() {
            return Err(ShoplistError::InvalidArgument(
                "Message content is required".into(),
            ));
        }

        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system,
            messages: [UserMessage {
                role: "user",
                content,
            }],
        };

        info!(
            model = %self.model,
            blocks = content.len(),
            "Sending note to Claude"
        );
        let url = self.endpoint("v1/messages");
        let resp: MessagesResponse = self.send_json(self.client.post(&url).json(&body)).await?;

        let text = resp
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseBlock::Text { text } => Some(text),
                ResponseBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        if text.trim().is_empty() {
            return Err(ShoplistError::Api {
                api: CLAUDE_API.to_string(),
                message: "Response contained no text content".into(),
            });
        }

        let usage = resp.usage.map(|u| (u.input_tokens, u.output_tokens));
        debug!(?usage, stop_reason = ?resp.stop_reason, "Claude reply received");
        Ok(ClaudeReply {
            text,
            model: resp.model.unwrap_or_else(|| self.model.clone()),
            stop_reason: resp.stop_reason,
            usage,
        })
    }
}

fn error_message(bytes: &[u8]) -> String {
    match serde_json::from_slice::<ErrorEnvelope>(bytes) {
        Ok(envelope) => match envelope.error.kind {
            Some(kind) => format!("{kind}: {}", envelope.error.message),
            None => envelope.error.message,
        },
        Err(_) => crate::sources::body_excerpt(bytes),
    }
}
