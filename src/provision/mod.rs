// src/provision/mod.rs
mod outputs;
mod terraform;

pub use outputs::{
    EcsOutputs, ElbOutput, MicroserviceOutputs, RecordOutput, Route53Output, StackOutputs,
    ZoneOutput,
};
pub use terraform::TerraformCli;

use async_trait::async_trait;
use std::path::PathBuf;

use crate::command::CommandError;

/// A module directory and the variables to apply it with.
#[derive(Debug, Clone)]
pub struct ModuleOptions {
    pub dir: PathBuf,
    pub vars: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("`{command}` exited with {}: {stderr}", exit_code(.code))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("failed to write variables file {path}: {source}")]
    VarFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse module outputs: {0}")]
    Outputs(#[from] serde_json::Error),
}

fn exit_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "a signal".to_string(), |code| format!("status {}", code))
}

/// Materializes and tears down infrastructure.
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn apply(&self, module: &ModuleOptions) -> Result<StackOutputs, ProvisionError>;

    /// Outputs of an already-applied module.
    async fn outputs(&self, module: &ModuleOptions) -> Result<StackOutputs, ProvisionError>;

    async fn destroy(&self, module: &ModuleOptions) -> Result<(), ProvisionError>;
}
