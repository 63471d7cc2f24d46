pub mod ai_traits;
pub mod platform_traits;
pub mod repository_traits;

pub use ai_traits::{SummaryBackend, TextGenerator};
pub use platform_traits::{HasAuthor, HasChannel, HasTimestamp, IncomingMessage, SummaryDelivery};
pub use repository_traits::ServerConfigRepository;
