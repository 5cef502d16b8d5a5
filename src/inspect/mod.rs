// src/inspect/mod.rs
mod assertions;
mod aws;

pub use assertions::{assert_ecr, assert_ecs, AssertionError, EcrAssertion, EcsAssertion};
pub use aws::AwsCli;

use async_trait::async_trait;
use serde::Deserialize;

use crate::command::CommandError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDescription {
    pub cluster_name: String,
    pub status: String,
    #[serde(default)]
    pub active_services_count: i64,
    #[serde(default)]
    pub running_tasks_count: i64,
    #[serde(default)]
    pub registered_container_instances_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescription {
    pub service_name: String,
    pub status: String,
    pub desired_count: i64,
    pub running_count: i64,
    #[serde(default)]
    pub task_definition: Option<String>,
}

/// CPU units and memory (MiB) are strings in the API; `None` when unset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinitionDescription {
    pub family: String,
    #[serde(default)]
    pub revision: i64,
    #[serde(default)]
    pub cpu: Option<String>,
    #[serde(default)]
    pub memory: Option<String>,
}

impl TaskDefinitionDescription {
    pub fn cpu_units(&self) -> Option<u32> {
        self.cpu.as_deref().and_then(|cpu| cpu.parse().ok())
    }

    pub fn memory_mib(&self) -> Option<u32> {
        self.memory.as_deref().and_then(|memory| memory.parse().ok())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDetail {
    pub image_digest: String,
    #[serde(default)]
    pub image_tags: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("`aws {command}` failed: {stderr}")]
    Failed { command: String, stderr: String },

    #[error("failed to parse `aws {command}` output: {source}")]
    Parse {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{kind} `{name}` not found")]
    NotFound { kind: &'static str, name: String },
}

/// Read-only view of deployed cloud resources.
#[async_trait]
pub trait ResourceInspector: Send + Sync {
    async fn describe_cluster(&self, cluster: &str) -> Result<ClusterDescription, InspectError>;

    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<ServiceDescription, InspectError>;

    async fn describe_task_definition(
        &self,
        task_definition: &str,
    ) -> Result<TaskDefinitionDescription, InspectError>;

    async fn list_images(&self, repository: &str) -> Result<Vec<ImageDetail>, InspectError>;
}
