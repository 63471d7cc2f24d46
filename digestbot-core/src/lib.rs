// src/lib.rs

pub mod cache;
pub mod context;
pub mod platforms;
pub mod repositories;
pub mod services;
pub mod tasks;
pub mod test_utils;

pub use context::BotContext;
pub use digestbot_common::error::Error;
