//! Generation client
//!
//! Calls a hosted `generateContent`-style model endpoint, extracts the text of
//! the first candidate and splits it with [`parse_response`]. When the call
//! fails the orchestrator renders [`fallback_component`] instead, so a
//! transport problem still ends in a rendered preview that names the error.

#![warn(clippy::all, rust_2018_idioms)]

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::normalizer::ENTRY_POINT;
use super::response_parser::{parse_response, ParsedResponse};
use super::shims::advertised_components;
use super::status::ErrorKind;

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationSettings {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub request_timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_output_tokens: 8192,
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug)]
pub enum GenerationError {
    MissingApiKey,
    InvalidEndpoint(String),
    /// Connection failure or non-2xx answer
    Transport { status: Option<u16>, message: String },
    InvalidResponse(String),
}

impl GenerationError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::TransportError
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::MissingApiKey => write!(f, "No model API key configured"),
            GenerationError::InvalidEndpoint(endpoint) => {
                write!(f, "Invalid generation endpoint: {}", endpoint)
            }
            GenerationError::Transport {
                status: Some(status),
                message,
            } => write!(f, "Generation request failed with HTTP {}: {}", status, message),
            GenerationError::Transport { status: None, message } => {
                write!(f, "Generation request failed: {}", message)
            }
            GenerationError::InvalidResponse(message) => {
                write!(f, "Generation response could not be read: {}", message)
            }
        }
    }
}

impl std::error::Error for GenerationError {}

/// Generated component plus the model's description of it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Generation {
    pub prompt: String,
    pub response: ParsedResponse,
}

pub struct GenerationClient {
    client: reqwest::Client,
    settings: GenerationSettings,
    api_key: Option<String>,
}

impl GenerationClient {
    pub fn new(settings: GenerationSettings, api_key: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            settings,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    fn request_url(&self, api_key: &str) -> Result<url::Url, GenerationError> {
        let base = format!(
            "{}/models/{}:generateContent",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.model
        );
        url::Url::parse_with_params(&base, &[("key", api_key)])
            .map_err(|_| GenerationError::InvalidEndpoint(base))
    }

    pub async fn generate(&self, user_prompt: &str) -> Result<Generation, GenerationError> {
        let api_key = self.api_key.as_deref().ok_or(GenerationError::MissingApiKey)?;
        let url = self.request_url(api_key)?;
        let prompt = build_prompt(user_prompt);
        let body = request_body(&prompt, &self.settings);

        log_info!(
            "Requesting generation from {} ({} prompt chars)",
            self.settings.model,
            prompt.len()
        );

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Transport {
                status: None,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            log_error!("Generation endpoint answered {}", status);
            return Err(GenerationError::Transport {
                status: Some(status.as_u16()),
                message: truncate(&message, 500),
            });
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;
        let text = extract_text(&payload);
        if text.is_empty() {
            log_warn!("Generation response carried no candidate text");
        }

        Ok(Generation {
            prompt: user_prompt.to_string(),
            response: parse_response(&text),
        })
    }
}

/// Wrap the user's request with the output contract and the shim catalogue
pub fn build_prompt(user_prompt: &str) -> String {
    format!(
        "Build a single React function component named {entry} for this request:\n\n{request}\n\n\
         {components}\n\n\
         Use hooks as React.useState / React.useEffect or bare useState / useEffect. \
         Do not import anything.\n\n\
         Answer exactly in this format:\nDESCRIPTION: <one paragraph>\n\nCODE:\n<the component source>",
        entry = ENTRY_POINT,
        request = user_prompt.trim(),
        components = advertised_components()
    )
}

pub fn request_body(prompt: &str, settings: &GenerationSettings) -> serde_json::Value {
    serde_json::json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
        "generationConfig": {
            "temperature": settings.temperature,
            "maxOutputTokens": settings.max_output_tokens,
        }
    })
}

/// `candidates[0].content.parts[0].text`, or empty when any step is missing
pub fn extract_text(payload: &serde_json::Value) -> String {
    payload
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(|text| text.as_str())
        .unwrap_or_default()
        .to_string()
}

/// Component source shown when generation fails.
///
/// Written with `React.createElement` only so it needs no transpiler and no
/// shim, and renders under every strategy.
pub fn fallback_component(error: &str) -> String {
    let message = serde_json::to_string(error).unwrap_or_else(|_| "\"Unknown error\"".to_string());
    format!(
        r#"function {entry}() {{
  const message = {message};
  return React.createElement(
    "div",
    {{ className: "uiforge-fallback", style: {{ padding: "16px", border: "1px solid #f87171", borderRadius: "8px" }} }},
    React.createElement("h2", null, "Preview unavailable"),
    React.createElement("p", null, "The component could not be generated."),
    React.createElement("pre", {{ className: "uiforge-fallback-error" }}, message)
  );
}}"#,
        entry = ENTRY_POINT,
        message = message
    )
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => format!("{}...", &text[..index]),
        None => text.to_string(),
    }
}
