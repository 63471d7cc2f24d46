use async_trait::async_trait;

use crate::error::Error;
use crate::models::summary::SummaryRequest;

/// A single call to a language model: prompt in, text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(
        &self,
        prompt: &str,
        max_output_tokens: u32,
        temperature: f32,
    ) -> Result<String, Error>;
}

/// Turns a summary request into model-written text. Rate limiting and
/// memoization are layered on top of this as further implementations.
#[async_trait]
pub trait SummaryBackend: Send + Sync {
    async fn summarize(&self, request: &SummaryRequest) -> Result<String, Error>;
}
