// src/metrics/mod.rs
mod collector;

pub use collector::{AttemptOutcome, CheckOutcome, MetricsCollector, MetricsRegistry};
