pub mod command_service;
pub mod message_service;
pub mod summary_composer;
pub mod summary_service;
pub mod system_stats;

pub use command_service::{CommandContext, CommandResponse, CommandService, StatusReport};
pub use message_service::{Ingest, MessageService};
pub use summary_composer::SummaryComposer;
pub use summary_service::{AnchorReport, SummaryService};
pub use system_stats::SystemReport;
