// src/inspect/aws.rs
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{
    ClusterDescription, ImageDetail, InspectError, ResourceInspector, ServiceDescription,
    TaskDefinitionDescription,
};
use crate::command::CommandRunner;
use crate::config::AccountConfig;

/// `ResourceInspector` backed by the aws CLI.
pub struct AwsCli<R: CommandRunner> {
    runner: R,
    region: String,
    profile: Option<String>,
}

#[derive(Deserialize)]
struct Clusters {
    clusters: Vec<ClusterDescription>,
}

#[derive(Deserialize)]
struct Services {
    services: Vec<ServiceDescription>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskDefinition {
    task_definition: TaskDefinitionDescription,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Images {
    image_details: Vec<ImageDetail>,
}

impl<R: CommandRunner> AwsCli<R> {
    pub fn new(runner: R, account: &AccountConfig) -> Self {
        Self {
            runner,
            region: account.region.clone(),
            profile: account.profile.clone(),
        }
    }

    async fn call<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T, InspectError> {
        let mut full: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        full.extend(["--region".to_string(), self.region.clone()]);
        if let Some(profile) = &self.profile {
            full.extend(["--profile".to_string(), profile.clone()]);
        }
        full.extend(["--output".to_string(), "json".to_string()]);

        let command = args.join(" ");
        let output = self.runner.run("aws", &full, None).await?;
        if !output.status.success() {
            return Err(InspectError::Failed {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|source| InspectError::Parse { command, source })
    }
}

#[async_trait]
impl<R: CommandRunner> ResourceInspector for AwsCli<R> {
    async fn describe_cluster(&self, cluster: &str) -> Result<ClusterDescription, InspectError> {
        let response: Clusters = self
            .call(&["ecs", "describe-clusters", "--clusters", cluster])
            .await?;

        response
            .clusters
            .into_iter()
            .next()
            .ok_or_else(|| InspectError::NotFound {
                kind: "cluster",
                name: cluster.to_string(),
            })
    }

    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<ServiceDescription, InspectError> {
        let response: Services = self
            .call(&[
                "ecs",
                "describe-services",
                "--cluster",
                cluster,
                "--services",
                service,
            ])
            .await?;

        response
            .services
            .into_iter()
            .next()
            .ok_or_else(|| InspectError::NotFound {
                kind: "service",
                name: service.to_string(),
            })
    }

    async fn describe_task_definition(
        &self,
        task_definition: &str,
    ) -> Result<TaskDefinitionDescription, InspectError> {
        let response: TaskDefinition = self
            .call(&[
                "ecs",
                "describe-task-definition",
                "--task-definition",
                task_definition,
            ])
            .await?;
        Ok(response.task_definition)
    }

    async fn list_images(&self, repository: &str) -> Result<Vec<ImageDetail>, InspectError> {
        let response: Images = self
            .call(&["ecr", "describe-images", "--repository-name", repository])
            .await?;
        Ok(response.image_details)
    }
}
