// src/config/models.rs
use anyhow::{bail, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::validator::EndpointCheck;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub account: Option<AccountConfig>,
    #[serde(default)]
    pub deployment: Option<DeploymentConfig>,
    /// Probed directly when no deployment is configured.
    #[serde(default)]
    pub base_urls: Vec<Url>,
    #[serde(default)]
    pub validator: ValidatorConfig,
    pub endpoints: Vec<EndpointSpec>,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.deployment.is_none() && self.base_urls.is_empty() {
            bail!("either `deployment` or `base_urls` must be configured");
        }

        if self.deployment.is_some() && !self.base_urls.is_empty() {
            bail!("`base_urls` cannot be combined with `deployment`");
        }

        if !self.base_urls.is_empty() && self.endpoints.is_empty() {
            bail!("`base_urls` given without any `endpoints` to probe");
        }

        if self.validator.request_timeout_secs == 0 {
            bail!("`validator.request_timeout_secs` must be greater than zero");
        }

        for endpoint in &self.endpoints {
            if !endpoint.path.starts_with('/') {
                bail!("endpoint path `{}` must start with '/'", endpoint.path);
            }
        }

        if let Some(deployment) = &self.deployment {
            deployment.validate()?;
        }

        Ok(())
    }
}

/// Account-level settings. Loaded once and passed down explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AccountConfig {
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    pub region: String,
    #[serde(default)]
    pub domain_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentConfig {
    pub project_name: String,
    pub service_name: String,
    pub environment_name: String,
    pub module_dir: PathBuf,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default)]
    pub ecs: Option<EcsExpectations>,
    #[serde(default)]
    pub ecr: Option<EcrExpectations>,
    #[serde(default)]
    pub teardown: bool,
    #[serde(default)]
    pub skip_stages: Vec<String>,
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    #[serde(default = "default_apply_retries")]
    pub apply_retries: u32,
    #[serde(default = "default_apply_retry_delay_secs")]
    pub apply_retry_delay_secs: u64,
    /// Merged over the generated base variables.
    #[serde(default)]
    pub vars: serde_json::Map<String, serde_json::Value>,
}

impl DeploymentConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn apply_retry_delay(&self) -> Duration {
        Duration::from_secs(self.apply_retry_delay_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.project_name.is_empty() || self.service_name.is_empty() {
            bail!("deployment project and service names must not be empty");
        }
        if self.scheme != "http" && self.scheme != "https" {
            bail!("deployment scheme must be http or https, got `{}`", self.scheme);
        }
        if self.command_timeout_secs == 0 {
            bail!("`deployment.command_timeout_secs` must be greater than zero");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EcsExpectations {
    /// Defaults to the generated common name.
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default = "default_service_count")]
    pub service_count: i64,
    #[serde(default = "default_desired_count")]
    pub desired_count: i64,
    /// Task definition CPU units, checked when set.
    #[serde(default)]
    pub cpu: Option<u32>,
    /// Task definition memory in MiB, checked when set.
    #[serde(default)]
    pub memory: Option<u32>,
}

impl Default for EcsExpectations {
    fn default() -> Self {
        Self {
            cluster_name: None,
            service_name: None,
            service_count: default_service_count(),
            desired_count: default_desired_count(),
            cpu: None,
            memory: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EcrExpectations {
    /// Defaults to the generated common name.
    #[serde(default)]
    pub repository_name: Option<String>,
    #[serde(default = "default_image_count")]
    pub image_count: usize,
}

impl Default for EcrExpectations {
    fn default() -> Self {
        Self {
            repository_name: None,
            image_count: default_image_count(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorConfig {
    #[serde(default)]
    pub warmup_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl ValidatorConfig {
    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            warmup_ms: 0,
            request_timeout_secs: default_request_timeout_secs(),
            accept_invalid_certs: false,
        }
    }
}

/// An endpoint check relative to a base URL.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EndpointSpec {
    pub path: String,
    pub expected_status: u16,
    #[serde(default)]
    pub expected_body: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_sleep_between_retries_ms")]
    pub sleep_between_retries_ms: u64,
}

impl EndpointSpec {
    pub fn sleep_between_retries(&self) -> Duration {
        Duration::from_millis(self.sleep_between_retries_ms)
    }

    /// Appends `path` to `base` verbatim, so a base path is kept.
    pub fn resolve(&self, base: &Url) -> Result<EndpointCheck, url::ParseError> {
        let joined = format!("{}{}", base.as_str().trim_end_matches('/'), self.path);
        let url = Url::parse(&joined)?;

        let mut check = EndpointCheck::new(url, self.expected_status)
            .with_retries(self.max_retries, self.sleep_between_retries());
        if let Some(body) = &self.expected_body {
            check = check.with_body(body.clone());
        }
        Ok(check)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Text exposition is written here; stdout when unset.
    #[serde(default)]
    pub output_path: Option<PathBuf>,
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_command_timeout_secs() -> u64 {
    1800
}

fn default_apply_retries() -> u32 {
    3
}

fn default_apply_retry_delay_secs() -> u64 {
    5
}

fn default_service_count() -> i64 {
    1
}

fn default_image_count() -> usize {
    1
}

fn default_desired_count() -> i64 {
    1
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_sleep_between_retries_ms() -> u64 {
    30_000
}
