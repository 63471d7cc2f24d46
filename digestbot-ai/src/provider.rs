use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use digestbot_common::error::Error;
use digestbot_common::traits::TextGenerator;

use crate::models::ProviderConfig;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini provider implementation
pub struct GeminiProvider {
    config: ProviderConfig,
    client: Client,
}

impl GeminiProvider {
    /// Create a new Gemini provider with the given configuration
    pub fn new(config: ProviderConfig) -> Result<Self, Error> {
        if config.api_key.trim().is_empty() {
            return Err(Error::Config("Gemini API key is empty".into()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        let api_base = self
            .config
            .api_base
            .clone()
            .unwrap_or_else(|| GEMINI_API_BASE.to_string());
        format!("{}/models/{}:generateContent", api_base, self.config.default_model)
    }
}

#[async_trait]
impl TextGenerator for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        prompt: &str,
        max_output_tokens: u32,
        temperature: f32,
    ) -> Result<String, Error> {
        let request_payload = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "temperature": temperature,
                "maxOutputTokens": max_output_tokens,
            }
        });

        tracing::debug!(
            "Making API call to {} (max_output_tokens={}, prompt_chars={})",
            self.endpoint(),
            max_output_tokens,
            prompt.chars().count()
        );

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&request_payload)
            .send()
            .await?;

        let status = response.status();
        // Get the raw response text first for better error handling
        let response_text = response.text().await?;
        tracing::trace!("Raw API response: {}", response_text);

        let data = match serde_json::from_str::<serde_json::Value>(&response_text) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to parse API response as JSON: {:?}", e);
                return Err(Error::Model(format!("API returned non-JSON response ({}): {}", status, e)));
            }
        };

        if let Some(error) = data.get("error") {
            let error_message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown error");
            return Err(Error::Model(format!("API error ({}): {}", status, error_message)));
        }
        if !status.is_success() {
            return Err(Error::Model(format!("API returned status {}", status)));
        }

        extract_text(&data)
    }
}

/// Concatenates the text parts of the first candidate.
fn extract_text(data: &serde_json::Value) -> Result<String, Error> {
    let candidate = data
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| Error::Model("Response missing 'candidates'".into()))?;

    let parts = candidate
        .pointer("/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| {
            let reason = candidate
                .get("finishReason")
                .and_then(|r| r.as_str())
                .unwrap_or("unknown");
            Error::Model(format!("Candidate has no content (finishReason={})", reason))
        })?;

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.trim().is_empty() {
        return Err(Error::Model("Model returned an empty response".into()));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_joined_parts() {
        let data = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "- topic one\n" }, { "text": "- topic two" }] },
                "finishReason": "STOP"
            }]
        });
        assert_eq!(extract_text(&data).unwrap(), "- topic one\n- topic two");
    }

    #[test]
    fn missing_or_blank_text_is_an_error() {
        let blocked = json!({ "candidates": [{ "finishReason": "SAFETY" }] });
        assert!(matches!(extract_text(&blocked), Err(Error::Model(_))));

        let blank = json!({ "candidates": [{ "content": { "parts": [{ "text": "  " }] } }] });
        assert!(matches!(extract_text(&blank), Err(Error::Model(_))));

        let empty = json!({ "candidates": [] });
        assert!(extract_text(&empty).is_err());
    }

    #[test]
    fn empty_key_is_rejected() {
        let config = ProviderConfig::gemini("  ", "gemini-1.5-flash");
        assert!(GeminiProvider::new(config).is_err());
    }
}
