// src/retry/mod.rs
mod strategy;

pub use strategy::{Backoff, RetryDecision, RetryStrategy};
