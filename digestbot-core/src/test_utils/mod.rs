pub mod helpers;

pub use helpers::{inbound, test_context, RecordingDelivery, ScriptedGenerator, TokioClock};
