pub mod cache;
pub mod fallback;
pub mod models;
pub mod prompt;
pub mod provider;
pub mod rate_limit;
pub mod summarizer;
pub mod usage;

// Re-export public APIs
pub use cache::{Memoized, SummaryCache};
pub use fallback::keyword_summary;
pub use models::ProviderConfig;
pub use provider::GeminiProvider;
pub use rate_limit::{RateLimited, SlidingWindowLimiter};
pub use summarizer::{build_pipeline, ModelBackend, SummaryFallbackChain};
pub use usage::{UsageSnapshot, UsageTracker};
