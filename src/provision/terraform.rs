// src/provision/terraform.rs
use async_trait::async_trait;
use std::path::Path;
use tracing::{info, warn};

use super::{ModuleOptions, ProvisionError, Provisioner, StackOutputs};
use crate::command::CommandRunner;
use crate::retry::{RetryDecision, RetryStrategy};

const VAR_FILE: &str = "microservice-validator.tfvars.json";

/// Errors that usually clear up on a second try.
const RETRYABLE_ERRORS: &[&str] = &[
    "connection reset by peer",
    "TLS handshake timeout",
    "Error installing provider",
    "Failed to query available provider packages",
    "RequestError: send request failed",
    "timeout while waiting for state",
    "Error acquiring the state lock",
    "ThrottlingException",
    "Rate exceeded",
];

/// `Provisioner` backed by the terraform CLI.
pub struct TerraformCli<R: CommandRunner> {
    runner: R,
    binary: String,
    retry: RetryStrategy,
}

impl<R: CommandRunner> TerraformCli<R> {
    pub fn new(runner: R, retry: RetryStrategy) -> Self {
        Self {
            runner,
            binary: "terraform".to_string(),
            retry,
        }
    }

    /// Use another compatible binary, e.g. `tofu`.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    async fn write_var_file(&self, module: &ModuleOptions) -> Result<(), ProvisionError> {
        let path = module.dir.join(VAR_FILE);
        let contents = serde_json::to_vec_pretty(&module.vars)?;
        tokio::fs::write(&path, contents)
            .await
            .map_err(|source| ProvisionError::VarFile { path, source })
    }

    async fn terraform(&self, dir: &Path, args: &[String]) -> Result<String, ProvisionError> {
        let output = self.runner.run(&self.binary, args, Some(dir)).await?;

        if !output.status.success() {
            return Err(ProvisionError::Failed {
                command: format!("{} {}", self.binary, args.join(" ")),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn terraform_with_retry(
        &self,
        dir: &Path,
        args: &[String],
    ) -> Result<String, ProvisionError> {
        self.retry
            .execute_with_decision(move || self.terraform(dir, args), classify)
            .await
    }
}

fn classify(error: &ProvisionError) -> RetryDecision {
    match error {
        ProvisionError::Failed { stderr, .. }
            if RETRYABLE_ERRORS.iter().any(|pattern| stderr.contains(pattern)) =>
        {
            warn!("Retryable terraform error: {}", stderr);
            RetryDecision::Retry
        }
        _ => RetryDecision::NoRetry,
    }
}

fn to_args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[async_trait]
impl<R: CommandRunner> Provisioner for TerraformCli<R> {
    async fn apply(&self, module: &ModuleOptions) -> Result<StackOutputs, ProvisionError> {
        info!("Applying module {}", module.dir.display());
        self.write_var_file(module).await?;

        let var_file = format!("-var-file={}", VAR_FILE);
        self.terraform_with_retry(&module.dir, &to_args(&["init", "-input=false"]))
            .await?;
        self.terraform_with_retry(
            &module.dir,
            &to_args(&["apply", "-input=false", "-auto-approve", var_file.as_str()]),
        )
        .await?;

        self.outputs(module).await
    }

    async fn outputs(&self, module: &ModuleOptions) -> Result<StackOutputs, ProvisionError> {
        let json = self
            .terraform(&module.dir, &to_args(&["output", "-json"]))
            .await?;
        Ok(StackOutputs::from_json(&json)?)
    }

    async fn destroy(&self, module: &ModuleOptions) -> Result<(), ProvisionError> {
        info!("Destroying module {}", module.dir.display());
        self.write_var_file(module).await?;

        let var_file = format!("-var-file={}", VAR_FILE);
        self.terraform_with_retry(
            &module.dir,
            &to_args(&["destroy", "-input=false", "-auto-approve", var_file.as_str()]),
        )
        .await?;
        Ok(())
    }
}
