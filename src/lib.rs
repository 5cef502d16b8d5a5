// src/lib.rs
pub mod command;
pub mod config;
pub mod harness;
pub mod inspect;
pub mod metrics;
pub mod provision;
pub mod retry;
pub mod validator;
