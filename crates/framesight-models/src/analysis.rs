//! Analysis request templates and modes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default response budget for a single analysis request.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Output format requested from the vision backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Markdown,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
            OutputFormat::Markdown => "md",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
#[error("unknown output format: {0} (expected text, json, md or markdown)")]
pub struct ParseOutputFormatError(String);

impl FromStr for OutputFormat {
    type Err = ParseOutputFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "md" | "markdown" => Ok(OutputFormat::Markdown),
            other => Err(ParseOutputFormatError(other.to_string())),
        }
    }
}

/// How frames inside a batch are sent to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    /// One request per frame; the batch size only bounds in-flight requests.
    #[default]
    Independent,
    /// One request per batch carrying every image; the answer is shared by
    /// every frame of the batch.
    Grouped,
}

impl BatchMode {
    pub fn from_group_flag(group: bool) -> Self {
        if group {
            BatchMode::Grouped
        } else {
            BatchMode::Independent
        }
    }

    pub fn is_grouped(&self) -> bool {
        matches!(self, BatchMode::Grouped)
    }
}

/// Caller-supplied parameters shared by every request of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisTemplate {
    /// Custom prompt; replaces the generated per-frame description prompt
    pub prompt: Option<String>,
    /// Persona woven into the generated prompt
    pub persona: Option<String>,
    /// System text sent with every request
    pub system: Option<String>,
    /// Requested output format
    pub output_format: OutputFormat,
    /// Whether to ask the backend for a token stream
    pub stream: bool,
    /// Response budget per request
    pub max_tokens: u32,
    /// Assistant prefill
    pub prefill: Option<String>,
}

impl Default for AnalysisTemplate {
    fn default() -> Self {
        Self {
            prompt: None,
            persona: None,
            system: None,
            output_format: OutputFormat::Text,
            stream: false,
            max_tokens: DEFAULT_MAX_TOKENS,
            prefill: None,
        }
    }
}

impl AnalysisTemplate {
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = Some(persona.into());
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_prefill(mut self, prefill: impl Into<String>) -> Self {
        self.prefill = Some(prefill.into());
        self
    }
}
