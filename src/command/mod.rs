// src/command/mod.rs
mod runner;

pub use runner::{CommandError, CommandRunner, TokioCommandRunner};
