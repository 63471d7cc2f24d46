pub mod cache_maintenance;
pub mod summary_schedule;

pub use cache_maintenance::spawn_cache_prune_task;
pub use summary_schedule::{spawn_summary_scheduler, ScheduleEngine, SummaryScheduler};
