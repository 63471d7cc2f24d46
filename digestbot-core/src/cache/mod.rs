pub mod retention_buffer;
pub mod window;

pub use retention_buffer::{ChannelLog, RetentionBuffer};
