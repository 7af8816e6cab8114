//! Vision API HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::Client;
use tracing::{debug, error};

use framesight_models::OutputFormat;

use crate::dispatcher::{AnalysisDispatcher, AnalysisOutput, AnalysisRequest};
use crate::error::{VisionError, VisionResult};
use crate::sse;
use crate::types::{Message, MessagesRequest, MessagesResponse};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20240620";
pub const DEFAULT_API_VERSION: &str = "2023-06-01";

/// Prefill used for JSON output when the caller gives none.
const JSON_PREFILL: &str = "{";

const TEXT_SYSTEM_PROMPT: &str =
    "You are an AI assistant with vision capabilities. Describe the image.";
const JSON_SYSTEM_PROMPT: &str =
    "Analyze the image and provide output in valid JSON format only. No additional text.";
const MARKDOWN_SYSTEM_PROMPT: &str =
    "Analyze the image and provide output in valid Markdown format only. No additional text.";

/// System prompt used when a request does not carry one.
pub fn default_system_prompt(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Text => TEXT_SYSTEM_PROMPT,
        OutputFormat::Json => JSON_SYSTEM_PROMPT,
        OutputFormat::Markdown => MARKDOWN_SYSTEM_PROMPT,
    }
}

/// Configuration for the vision client.
#[derive(Debug, Clone)]
pub struct VisionClientConfig {
    /// API key sent as `x-api-key`
    pub api_key: String,
    /// Base URL of the API
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Value of the `anthropic-version` header
    pub api_version: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for VisionClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(180),
        }
    }
}

impl VisionClientConfig {
    /// Create config from environment variables. `ANTHROPIC_API_KEY` is required.
    pub fn from_env() -> VisionResult<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| VisionError::config("ANTHROPIC_API_KEY is not set"))?;

        Ok(Self {
            api_key,
            base_url: std::env::var("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            model: std::env::var("FRAMESIGHT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            api_version: std::env::var("ANTHROPIC_VERSION")
                .unwrap_or_else(|_| DEFAULT_API_VERSION.to_string()),
            timeout: Duration::from_secs(
                std::env::var("FRAMESIGHT_REQUEST_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(180),
            ),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }
}

/// HTTP client for the vision backend.
pub struct VisionClient {
    http: Client,
    config: VisionClientConfig,
}

impl VisionClient {
    /// Create a new vision client.
    pub fn new(config: VisionClientConfig) -> VisionResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(VisionError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> VisionResult<Self> {
        Self::new(VisionClientConfig::from_env()?)
    }

    pub fn config(&self) -> &VisionClientConfig {
        &self.config
    }

    /// Build the request body. The flag reports whether the JSON prefill was added.
    fn build_body(&self, request: &AnalysisRequest) -> (MessagesRequest, bool) {
        let mut messages = vec![Message::user(&request.prompt, &request.images)];

        let json_prefill = request.output_format == OutputFormat::Json
            && request.prefill.as_deref().map_or(true, str::is_empty);
        let prefill = if json_prefill {
            Some(JSON_PREFILL)
        } else {
            request.prefill.as_deref().filter(|p| !p.is_empty())
        };
        if let Some(prefill) = prefill {
            messages.push(Message::assistant(prefill));
        }

        let system = request
            .system
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| default_system_prompt(request.output_format).to_string());

        let body = MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: request.max_tokens,
            system,
            messages,
            stream: request.stream,
        };
        (body, json_prefill)
    }
}

#[async_trait]
impl AnalysisDispatcher for VisionClient {
    async fn analyze(&self, request: AnalysisRequest) -> VisionResult<AnalysisOutput> {
        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        let (body, json_prefill) = self.build_body(&request);

        debug!(
            images = request.images.len(),
            stream = request.stream,
            format = %request.output_format,
            "Sending analysis request to {}",
            url
        );

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Vision API returned an error");
            return Err(VisionError::from_status(status.as_u16(), &text));
        }

        if request.stream {
            let chunks = sse::text_stream(response.bytes_stream().map_err(VisionError::Network));
            let chunks = if json_prefill {
                stream::once(async { Ok::<_, VisionError>(JSON_PREFILL.to_string()) })
                    .chain(chunks)
                    .boxed()
            } else {
                chunks
            };
            return Ok(AnalysisOutput::Stream(chunks));
        }

        let text = response.text().await?;
        let parsed: MessagesResponse = serde_json::from_str(&text)?;
        let content = parsed
            .first_text()
            .ok_or_else(|| VisionError::Api("response contained no text content".to_string()))?;

        let content = if request.output_format == OutputFormat::Json {
            format!("{}{}", JSON_PREFILL, content.trim_start_matches('{'))
        } else {
            content.to_string()
        };

        Ok(AnalysisOutput::Complete(content))
    }
}
