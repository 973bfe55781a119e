//! Metadata extraction collaborators.
//!
//! - **[`DisabledExtractor`]**: always fails; assisted ingest then falls
//!   back to file-name metadata.
//! - **[`LlmExtractor`]**: sends a text excerpt of the document to an
//!   OpenAI-compatible chat completions endpoint or a local Ollama
//!   instance and parses the reply with
//!   [`parse_extraction_response`].
//!
//! Requests are single attempts bounded by `extraction.timeout_secs`.
//! Failures are returned to the caller, which decides on fallbacks.
//!
//! Use [`create_extractor`] to build the configured extractor.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use doccat_core::extraction::{parse_extraction_response, Extraction};
use doccat_core::models::FileUpload;

use crate::config::ExtractionConfig;
use crate::extract::{excerpt, extract_text};

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

const SYSTEM_PROMPT: &str = "You catalogue engineering documents. \
Reply with a single JSON object using only these keys: title, doc_type, tags (array of strings), \
equipment_model, manufacturer, year (number), norm_source, description, serial_number, \
plant_unit, system_area, revision_version. Use null for unknown values.";

#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    fn name(&self) -> &str;

    /// Propose metadata for `upload`, declared as `doc_type`.
    async fn extract(&self, upload: &FileUpload, doc_type: &str) -> Result<Extraction>;
}

pub struct DisabledExtractor;

#[async_trait]
impl MetadataExtractor for DisabledExtractor {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn extract(&self, _upload: &FileUpload, _doc_type: &str) -> Result<Extraction> {
        bail!("metadata extraction is disabled")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Provider {
    OpenAi,
    Ollama,
}

pub struct LlmExtractor {
    provider: Provider,
    model: String,
    base_url: String,
    api_key: Option<String>,
    max_chars: usize,
    client: reqwest::Client,
}

impl LlmExtractor {
    /// Fails when the model is missing, or for OpenAI when
    /// `OPENAI_API_KEY` is not set.
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let provider = match config.provider.as_str() {
            "openai" => Provider::OpenAi,
            "ollama" => Provider::Ollama,
            other => bail!("Unknown extraction provider: {}", other),
        };
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("extraction.model required for {}", config.provider))?;
        let api_key = match provider {
            Provider::OpenAi => Some(
                std::env::var("OPENAI_API_KEY")
                    .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?,
            ),
            Provider::Ollama => None,
        };
        let base_url = config
            .url
            .clone()
            .unwrap_or_else(|| match provider {
                Provider::OpenAi => OPENAI_DEFAULT_URL.to_string(),
                Provider::Ollama => OLLAMA_DEFAULT_URL.to_string(),
            })
            .trim_end_matches('/')
            .to_string();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            provider,
            model,
            base_url,
            api_key,
            max_chars: config.max_chars,
            client,
        })
    }

    async fn chat(&self, user_prompt: String) -> Result<String> {
        let messages = json!([
            {"role": "system", "content": SYSTEM_PROMPT},
            {"role": "user", "content": user_prompt},
        ]);

        let (url, body) = match self.provider {
            Provider::OpenAi => (
                format!("{}/chat/completions", self.base_url),
                json!({"model": self.model, "messages": messages, "temperature": 0}),
            ),
            Provider::Ollama => (
                format!("{}/api/chat", self.base_url),
                json!({"model": self.model, "messages": messages, "stream": false, "format": "json"}),
            ),
        };

        let mut req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(ref key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let resp = req.send().await.map_err(|e| match self.provider {
            Provider::Ollama => anyhow!(
                "Ollama connection error (is Ollama running at {}?): {}",
                self.base_url,
                e
            ),
            Provider::OpenAi => anyhow!("OpenAI request failed: {}", e),
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            bail!("{} API error {}: {}", self.name(), status, body_text);
        }

        let json: Value = resp.json().await?;
        match self.provider {
            Provider::OpenAi => parse_openai_content(&json),
            Provider::Ollama => parse_ollama_content(&json),
        }
    }
}

#[async_trait]
impl MetadataExtractor for LlmExtractor {
    fn name(&self) -> &str {
        match self.provider {
            Provider::OpenAi => "openai",
            Provider::Ollama => "ollama",
        }
    }

    async fn extract(&self, upload: &FileUpload, doc_type: &str) -> Result<Extraction> {
        let text = extract_text(&upload.bytes, &upload.content_type)?;
        let prompt = build_user_prompt(&upload.file_name, doc_type, &excerpt(&text, self.max_chars));
        debug!(file = %upload.file_name, provider = self.name(), "extractor: requesting metadata");
        let reply = self.chat(prompt).await?;
        Ok(parse_extraction_response(&reply))
    }
}

fn build_user_prompt(file_name: &str, doc_type: &str, text: &str) -> String {
    format!(
        "File name: {file_name}\nDeclared document type: {doc_type}\n\nDocument text:\n{text}"
    )
}

fn parse_openai_content(json: &Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

fn parse_ollama_content(json: &Value) -> Result<String> {
    json.pointer("/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing message.content"))
}

/// Build the extractor selected by `[extraction] provider`.
///
/// | Config Value | Extractor |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledExtractor`] |
/// | `"openai"` | [`LlmExtractor`] (chat completions) |
/// | `"ollama"` | [`LlmExtractor`] (`/api/chat`) |
pub fn create_extractor(config: &ExtractionConfig) -> Result<Box<dyn MetadataExtractor>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledExtractor)),
        "openai" | "ollama" => Ok(Box::new(LlmExtractor::new(config)?)),
        other => bail!("Unknown extraction provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_content_is_read_from_first_choice() {
        let json = json!({"choices": [{"message": {"role": "assistant", "content": "{\"title\": \"X\"}"}}]});
        assert_eq!(parse_openai_content(&json).unwrap(), "{\"title\": \"X\"}");
        assert!(parse_openai_content(&json!({"choices": []})).is_err());
    }

    #[test]
    fn ollama_content_is_read_from_message() {
        let json = json!({"model": "llama3", "message": {"role": "assistant", "content": "Title: X"}, "done": true});
        assert_eq!(parse_ollama_content(&json).unwrap(), "Title: X");
        assert!(parse_ollama_content(&json!({"done": true})).is_err());
    }

    #[test]
    fn ollama_extractor_needs_no_key() {
        let config = ExtractionConfig {
            provider: "ollama".into(),
            model: Some("llama3".into()),
            url: Some("http://gpu-box:11434/".into()),
            ..Default::default()
        };
        let extractor = create_extractor(&config).unwrap();
        assert_eq!(extractor.name(), "ollama");
    }

    #[test]
    fn disabled_and_unknown_providers() {
        assert_eq!(
            create_extractor(&ExtractionConfig::default()).unwrap().name(),
            "disabled"
        );
        let config = ExtractionConfig {
            provider: "gemini".into(),
            ..Default::default()
        };
        assert!(create_extractor(&config).is_err());
    }

    #[tokio::test]
    async fn disabled_extractor_fails() {
        let upload = FileUpload::new("a.txt", "text/plain", b"a".to_vec());
        assert!(DisabledExtractor.extract(&upload, "manual").await.is_err());
    }

    #[test]
    fn prompt_carries_context() {
        let prompt = build_user_prompt("P-101.pdf", "datasheet", "Pump");
        assert!(prompt.contains("P-101.pdf"));
        assert!(prompt.contains("datasheet"));
        assert!(prompt.ends_with("Pump"));
    }
}
