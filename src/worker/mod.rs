//! Queue consumer and process shutdown wiring

pub mod consumer;
pub mod shutdown;

pub use consumer::{ConsumerSummary, JobConsumer, JobOutcome};
pub use shutdown::{ShutdownSignal, shutdown_channel, spawn_signal_listener};
