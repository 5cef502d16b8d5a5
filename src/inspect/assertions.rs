// src/inspect/assertions.rs
use tracing::info;

use super::{
    ClusterDescription, ImageDetail, InspectError, ResourceInspector, ServiceDescription,
};

#[derive(Debug, thiserror::Error)]
pub enum AssertionError {
    #[error(transparent)]
    Inspect(#[from] InspectError),

    #[error("{what}: expected {expected}, got {actual}")]
    Mismatch {
        what: String,
        expected: String,
        actual: String,
    },
}

fn expect_eq<T: PartialEq + ToString>(
    what: String,
    expected: T,
    actual: T,
) -> Result<(), AssertionError> {
    if expected == actual {
        Ok(())
    } else {
        Err(AssertionError::Mismatch {
            what,
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}

/// Expected state of a deployed ECS cluster and service.
#[derive(Debug, Clone)]
pub struct EcsAssertion {
    pub cluster_name: String,
    pub service_name: String,
    pub service_count: i64,
    pub desired_count: i64,
    pub cpu: Option<u32>,
    pub memory: Option<u32>,
}

pub async fn assert_ecs<I: ResourceInspector + ?Sized>(
    inspector: &I,
    expected: &EcsAssertion,
) -> Result<(ClusterDescription, ServiceDescription), AssertionError> {
    let cluster = inspector.describe_cluster(&expected.cluster_name).await?;
    expect_eq(
        format!("cluster {} status", cluster.cluster_name),
        "ACTIVE",
        cluster.status.as_str(),
    )?;
    expect_eq(
        format!("cluster {} active services", cluster.cluster_name),
        expected.service_count,
        cluster.active_services_count,
    )?;

    let service = inspector
        .describe_service(&expected.cluster_name, &expected.service_name)
        .await?;
    expect_eq(
        format!("service {} desired count", service.service_name),
        expected.desired_count,
        service.desired_count,
    )?;
    expect_eq(
        format!("service {} running count", service.service_name),
        service.desired_count,
        service.running_count,
    )?;

    if expected.cpu.is_some() || expected.memory.is_some() {
        let arn = service
            .task_definition
            .as_deref()
            .ok_or_else(|| InspectError::NotFound {
                kind: "task definition of service",
                name: service.service_name.clone(),
            })?;
        let task = inspector.describe_task_definition(arn).await?;

        if let Some(cpu) = expected.cpu {
            if task.cpu_units() != Some(cpu) {
                return Err(mismatch("cpu", &task.family, cpu, task.cpu.as_deref()));
            }
        }
        if let Some(memory) = expected.memory {
            if task.memory_mib() != Some(memory) {
                return Err(mismatch("memory", &task.family, memory, task.memory.as_deref()));
            }
        }
    }

    info!(
        "ECS cluster {} and service {} match expectations ({} running)",
        cluster.cluster_name, service.service_name, service.running_count
    );
    Ok((cluster, service))
}

/// Expected contents of the service's image repository.
#[derive(Debug, Clone)]
pub struct EcrAssertion {
    pub repository_name: String,
    pub image_count: usize,
}

pub async fn assert_ecr<I: ResourceInspector + ?Sized>(
    inspector: &I,
    expected: &EcrAssertion,
) -> Result<Vec<ImageDetail>, AssertionError> {
    let images = inspector.list_images(&expected.repository_name).await?;
    expect_eq(
        format!("repository {} images", expected.repository_name),
        expected.image_count,
        images.len(),
    )?;

    info!(
        "ECR repository {} holds {} image(s)",
        expected.repository_name,
        images.len()
    );
    Ok(images)
}

fn mismatch(field: &str, family: &str, expected: u32, actual: Option<&str>) -> AssertionError {
    AssertionError::Mismatch {
        what: format!("task definition {} {}", family, field),
        expected: expected.to_string(),
        actual: actual.unwrap_or("unset").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::TaskDefinitionDescription;
    use async_trait::async_trait;

    struct FakeInspector {
        cluster: ClusterDescription,
        service: ServiceDescription,
        task: TaskDefinitionDescription,
        images: Vec<ImageDetail>,
    }

    impl FakeInspector {
        fn healthy() -> Self {
            Self {
                cluster: ClusterDescription {
                    cluster_name: "c".to_string(),
                    status: "ACTIVE".to_string(),
                    active_services_count: 1,
                    running_tasks_count: 2,
                    registered_container_instances_count: 2,
                },
                service: ServiceDescription {
                    service_name: "s".to_string(),
                    status: "ACTIVE".to_string(),
                    desired_count: 2,
                    running_count: 2,
                    task_definition: Some("arn:td/s:1".to_string()),
                },
                task: TaskDefinitionDescription {
                    family: "s".to_string(),
                    revision: 1,
                    cpu: Some("512".to_string()),
                    memory: Some("1024".to_string()),
                },
                images: vec![ImageDetail {
                    image_digest: "sha256:ab".to_string(),
                    image_tags: vec!["latest".to_string()],
                }],
            }
        }
    }

    #[async_trait]
    impl ResourceInspector for FakeInspector {
        async fn describe_cluster(&self, _: &str) -> Result<ClusterDescription, InspectError> {
            Ok(self.cluster.clone())
        }

        async fn describe_service(
            &self,
            _: &str,
            _: &str,
        ) -> Result<ServiceDescription, InspectError> {
            Ok(self.service.clone())
        }

        async fn describe_task_definition(
            &self,
            _: &str,
        ) -> Result<TaskDefinitionDescription, InspectError> {
            Ok(self.task.clone())
        }

        async fn list_images(&self, _: &str) -> Result<Vec<ImageDetail>, InspectError> {
            Ok(self.images.clone())
        }
    }

    fn expectation() -> EcsAssertion {
        EcsAssertion {
            cluster_name: "c".to_string(),
            service_name: "s".to_string(),
            service_count: 1,
            desired_count: 2,
            cpu: Some(512),
            memory: Some(1024),
        }
    }

    #[tokio::test]
    async fn test_healthy_deployment_passes() {
        let (cluster, service) = assert_ecs(&FakeInspector::healthy(), &expectation())
            .await
            .unwrap();
        assert_eq!(cluster.cluster_name, "c");
        assert_eq!(service.running_count, 2);
    }

    #[tokio::test]
    async fn test_inactive_cluster_fails() {
        let mut inspector = FakeInspector::healthy();
        inspector.cluster.status = "INACTIVE".to_string();

        let err = assert_ecs(&inspector, &expectation()).await.unwrap_err();
        assert_eq!(err.to_string(), "cluster c status: expected ACTIVE, got INACTIVE");
    }

    #[tokio::test]
    async fn test_running_below_desired_fails() {
        let mut inspector = FakeInspector::healthy();
        inspector.service.running_count = 1;

        let err = assert_ecs(&inspector, &expectation()).await.unwrap_err();
        assert_eq!(err.to_string(), "service s running count: expected 2, got 1");
    }

    #[tokio::test]
    async fn test_task_definition_memory_mismatch() {
        let mut inspector = FakeInspector::healthy();
        inspector.task.memory = None;

        let err = assert_ecs(&inspector, &expectation()).await.unwrap_err();
        assert_eq!(err.to_string(), "task definition s memory: expected 1024, got unset");
    }

    fn ecr_expectation() -> EcrAssertion {
        EcrAssertion {
            repository_name: "scraper-frontend-ci".to_string(),
            image_count: 1,
        }
    }

    #[tokio::test]
    async fn test_published_image_passes() {
        let images = assert_ecr(&FakeInspector::healthy(), &ecr_expectation())
            .await
            .unwrap();
        assert_eq!(images[0].image_tags, ["latest"]);
    }

    #[tokio::test]
    async fn test_empty_repository_fails() {
        let mut inspector = FakeInspector::healthy();
        inspector.images.clear();

        let err = assert_ecr(&inspector, &ecr_expectation()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "repository scraper-frontend-ci images: expected 1, got 0"
        );
    }
}
