// src/repositories/mod.rs

pub use memory::server_config::{InMemoryServerConfigRepository, ServerConfigRepository};

pub mod memory;
