use serde::{Serialize, Deserialize};

/// Configuration for the model provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL for API requests
    pub api_base: Option<String>,

    /// API key for authentication
    pub api_key: String,

    /// Model used for every summary
    pub default_model: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl ProviderConfig {
    pub fn gemini(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_base: None,
            api_key: api_key.into(),
            default_model: model.into(),
            timeout_secs: 60,
        }
    }
}
