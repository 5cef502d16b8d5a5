// tests/harness_tests.rs
use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use microservice_validator::config::{
    AccountConfig, DeploymentConfig, EndpointSpec, ValidatorConfig,
};
use microservice_validator::harness::{CommonName, MicroserviceHarness};
use microservice_validator::inspect::{
    ClusterDescription, ImageDetail, InspectError, ResourceInspector, ServiceDescription,
    TaskDefinitionDescription,
};
use microservice_validator::provision::{ModuleOptions, ProvisionError, Provisioner, StackOutputs};
use microservice_validator::validator::{EndpointValidator, ReqwestProbe};

type Calls = Arc<Mutex<Vec<String>>>;

struct FakeProvisioner {
    calls: Calls,
    outputs: String,
}

#[async_trait]
impl Provisioner for FakeProvisioner {
    async fn apply(&self, module: &ModuleOptions) -> Result<StackOutputs, ProvisionError> {
        self.calls.lock().unwrap().push(format!(
            "apply {}",
            module.vars["common_name"].as_str().unwrap_or_default()
        ));
        Ok(StackOutputs::from_json(&self.outputs)?)
    }

    async fn outputs(&self, _module: &ModuleOptions) -> Result<StackOutputs, ProvisionError> {
        self.calls.lock().unwrap().push("outputs".to_string());
        Ok(StackOutputs::from_json(&self.outputs)?)
    }

    async fn destroy(&self, _module: &ModuleOptions) -> Result<(), ProvisionError> {
        self.calls.lock().unwrap().push("destroy".to_string());
        Ok(())
    }
}

struct FakeInspector {
    cluster_status: &'static str,
    image_count: usize,
    queried: Calls,
    repositories: Calls,
}

#[async_trait]
impl ResourceInspector for FakeInspector {
    async fn describe_cluster(&self, cluster: &str) -> Result<ClusterDescription, InspectError> {
        self.queried.lock().unwrap().push(cluster.to_string());
        Ok(ClusterDescription {
            cluster_name: cluster.to_string(),
            status: self.cluster_status.to_string(),
            active_services_count: 1,
            running_tasks_count: 1,
            registered_container_instances_count: 1,
        })
    }

    async fn describe_service(
        &self,
        _cluster: &str,
        service: &str,
    ) -> Result<ServiceDescription, InspectError> {
        Ok(ServiceDescription {
            service_name: service.to_string(),
            status: "ACTIVE".to_string(),
            desired_count: 1,
            running_count: 1,
            task_definition: None,
        })
    }

    async fn describe_task_definition(
        &self,
        task_definition: &str,
    ) -> Result<TaskDefinitionDescription, InspectError> {
        Err(InspectError::NotFound {
            kind: "task definition",
            name: task_definition.to_string(),
        })
    }

    async fn list_images(&self, repository: &str) -> Result<Vec<ImageDetail>, InspectError> {
        self.repositories.lock().unwrap().push(repository.to_string());
        Ok((0..self.image_count)
            .map(|i| ImageDetail {
                image_digest: format!("sha256:{:02x}", i),
                image_tags: vec![format!("v{}", i)],
            })
            .collect())
    }
}

struct Fixture {
    harness: MicroserviceHarness<FakeProvisioner, FakeInspector, ReqwestProbe>,
    provisioner_calls: Calls,
    inspected_clusters: Calls,
    inspected_repositories: Calls,
}

fn fixture(lb_host: &str, cluster_status: &'static str, extra: serde_json::Value) -> Fixture {
    let outputs = json!({ "ecs": { "elb": { "lb_dns_name": lb_host } } });
    fixture_with(outputs, cluster_status, 1, extra)
}

fn fixture_with(
    microservice: serde_json::Value,
    cluster_status: &'static str,
    image_count: usize,
    extra: serde_json::Value,
) -> Fixture {
    let mut deployment = json!({
        "project_name": "scraper",
        "service_name": "frontend",
        "environment_name": "ci",
        "module_dir": "module/aws/microservice/scraper-frontend",
    });
    if let (Some(deployment), Some(extra)) = (deployment.as_object_mut(), extra.as_object()) {
        deployment.extend(extra.clone());
    }
    let deployment: DeploymentConfig = serde_json::from_value(deployment).unwrap();

    let account = AccountConfig {
        profile: Some("ci".to_string()),
        region: "us-east-1".to_string(),
        ..Default::default()
    };
    let name = CommonName::with_id(&account, &deployment, "testrun");

    let provisioner_calls = Calls::default();
    let inspected_clusters = Calls::default();
    let inspected_repositories = Calls::default();
    let outputs = json!({ "microservice": { "value": microservice } }).to_string();

    let endpoints = vec![EndpointSpec {
        path: "/healthz".to_string(),
        expected_status: 200,
        expected_body: None,
        max_retries: 1,
        sleep_between_retries_ms: 10,
    }];
    let validator = EndpointValidator::new(&ValidatorConfig {
        request_timeout_secs: 2,
        ..Default::default()
    })
    .unwrap();

    let harness = MicroserviceHarness::new(
        FakeProvisioner {
            calls: provisioner_calls.clone(),
            outputs,
        },
        FakeInspector {
            cluster_status,
            image_count,
            queried: inspected_clusters.clone(),
            repositories: inspected_repositories.clone(),
        },
        validator,
        deployment,
        endpoints,
        name,
    );

    Fixture {
        harness,
        provisioner_calls,
        inspected_clusters,
        inspected_repositories,
    }
}

fn host(server: &mockito::Server) -> String {
    server.host_with_port()
}

#[tokio::test]
async fn test_full_run_probes_load_balancer_and_tears_down() {
    let mut server = mockito::Server::new_async().await;
    let healthz = server
        .mock("GET", "/healthz")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let fixture = fixture(&host(&server), "ACTIVE", json!({ "teardown": true }));
    let report = fixture.harness.run().await.unwrap();

    assert_eq!(report.common_name, "scraper-frontend-ci-testrun");
    assert_eq!(report.load_balancer.len(), 1);
    assert!(report.route53.is_empty());
    assert!(report.started_at <= chrono::Utc::now());
    assert_eq!(
        *fixture.provisioner_calls.lock().unwrap(),
        ["apply scraper-frontend-ci-testrun", "destroy"]
    );
    assert_eq!(
        *fixture.inspected_clusters.lock().unwrap(),
        ["scraper-frontend-ci-testrun"]
    );
    assert_eq!(
        *fixture.inspected_repositories.lock().unwrap(),
        ["scraper-frontend-ci-testrun"]
    );
    healthz.assert_async().await;
}

#[tokio::test]
async fn test_failed_ecs_check_still_tears_down_and_skips_probes() {
    let mut server = mockito::Server::new_async().await;
    let healthz = server
        .mock("GET", "/healthz")
        .with_status(200)
        .expect(0)
        .create_async()
        .await;

    let fixture = fixture(&host(&server), "INACTIVE", json!({ "teardown": true }));
    let err = fixture.harness.run().await.unwrap_err();

    assert!(format!("{:#}", err).contains("expected ACTIVE, got INACTIVE"));
    assert_eq!(
        *fixture.provisioner_calls.lock().unwrap(),
        ["apply scraper-frontend-ci-testrun", "destroy"]
    );
    healthz.assert_async().await;
}

#[tokio::test]
async fn test_skipped_deploy_reads_existing_outputs() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/healthz")
        .with_status(200)
        .create_async()
        .await;

    let fixture = fixture(
        &host(&server),
        "ACTIVE",
        json!({ "skip_stages": ["deploy", "validate_ecr", "validate_ecs"] }),
    );
    fixture.harness.run().await.unwrap();

    assert_eq!(*fixture.provisioner_calls.lock().unwrap(), ["outputs"]);
    assert!(fixture.inspected_clusters.lock().unwrap().is_empty());
    assert!(fixture.inspected_repositories.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_repository_fails_before_ecs_and_probes() {
    let mut server = mockito::Server::new_async().await;
    let healthz = server
        .mock("GET", "/healthz")
        .with_status(200)
        .expect(0)
        .create_async()
        .await;

    let outputs = json!({ "ecs": { "elb": { "lb_dns_name": host(&server) } } });
    let fixture = fixture_with(outputs, "ACTIVE", 0, json!({ "teardown": true }));
    let err = fixture.harness.run().await.unwrap_err();

    let message = format!("{:#}", err);
    assert!(message.contains("stage validate_ecr failed"), "{}", message);
    assert!(
        message.contains("repository scraper-frontend-ci-testrun images: expected 1, got 0"),
        "{}",
        message
    );
    assert!(fixture.inspected_clusters.lock().unwrap().is_empty());
    assert_eq!(
        *fixture.provisioner_calls.lock().unwrap(),
        ["apply scraper-frontend-ci-testrun", "destroy"]
    );
    healthz.assert_async().await;
}

#[tokio::test]
async fn test_configured_repository_and_image_count() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/healthz")
        .with_status(200)
        .create_async()
        .await;

    let outputs = json!({ "ecs": { "elb": { "lb_dns_name": host(&server) } } });
    let fixture = fixture_with(
        outputs,
        "ACTIVE",
        3,
        json!({ "ecr": { "repository_name": "scraper-frontend", "image_count": 3 } }),
    );
    fixture.harness.run().await.unwrap();

    assert_eq!(
        *fixture.inspected_repositories.lock().unwrap(),
        ["scraper-frontend"]
    );
}

#[tokio::test]
async fn test_route53_record_is_probed_after_load_balancer() {
    let mut lb = mockito::Server::new_async().await;
    let lb_healthz = lb
        .mock("GET", "/healthz")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;
    let mut dns = mockito::Server::new_async().await;
    let dns_healthz = dns
        .mock("GET", "/healthz")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    // "127" + "." + "0.0.1:<port>" joins back into the server's address.
    let dns_host = host(&dns);
    let (subdomain, zone) = dns_host.split_once('.').unwrap();
    let outputs = json!({
        "ecs": { "elb": { "lb_dns_name": host(&lb) } },
        "route53": {
            "zone": { "name": format!("{}.", zone) },
            "record": { "subdomain_name": subdomain }
        }
    });

    let fixture = fixture_with(outputs, "ACTIVE", 1, json!({}));
    let report = fixture.harness.run().await.unwrap();

    assert_eq!(report.load_balancer.len(), 1);
    assert_eq!(report.route53.len(), 1);
    assert!(report.route53[0].matched);
    assert_eq!(
        report.route53[0].url.as_str(),
        format!("http://{}/healthz", dns_host)
    );
    lb_healthz.assert_async().await;
    dns_healthz.assert_async().await;
}

#[tokio::test]
async fn test_skipped_route53_stage_leaves_record_unprobed() {
    let mut lb = mockito::Server::new_async().await;
    lb.mock("GET", "/healthz")
        .with_status(200)
        .create_async()
        .await;
    let mut dns = mockito::Server::new_async().await;
    let dns_healthz = dns
        .mock("GET", "/healthz")
        .with_status(200)
        .expect(0)
        .create_async()
        .await;

    let dns_host = host(&dns);
    let (subdomain, zone) = dns_host.split_once('.').unwrap();
    let outputs = json!({
        "ecs": { "elb": { "lb_dns_name": host(&lb) } },
        "route53": {
            "zone": { "name": zone },
            "record": { "subdomain_name": subdomain }
        }
    });

    let fixture = fixture_with(
        outputs,
        "ACTIVE",
        1,
        json!({ "skip_stages": ["validate_rest_endpoints_route53"] }),
    );
    let report = fixture.harness.run().await.unwrap();

    assert_eq!(report.load_balancer.len(), 1);
    assert!(report.route53.is_empty());
    dns_healthz.assert_async().await;
}

#[tokio::test]
async fn test_unhealthy_endpoint_fails_run_without_teardown() {
    let mut server = mockito::Server::new_async().await;
    let healthz = server
        .mock("GET", "/healthz")
        .with_status(503)
        .expect(2)
        .create_async()
        .await;

    let fixture = fixture(&host(&server), "ACTIVE", json!({}));
    let err = fixture.harness.run().await.unwrap_err();

    let message = format!("{:#}", err);
    assert!(message.contains("validate_rest_endpoints_load_balancer"), "{}", message);
    assert!(message.contains("expected status 200, got 503"), "{}", message);
    assert_eq!(
        *fixture.provisioner_calls.lock().unwrap(),
        ["apply scraper-frontend-ci-testrun"]
    );
    healthz.assert_async().await;
}

#[tokio::test]
async fn test_cancel_before_run_stops_at_first_retry() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/healthz")
        .with_status(503)
        .create_async()
        .await;

    let fixture = fixture(&host(&server), "ACTIVE", json!({}));
    fixture.harness.validator().cancel();

    let err = tokio::time::timeout(Duration::from_secs(5), fixture.harness.run())
        .await
        .unwrap()
        .unwrap_err();
    assert!(format!("{:#}", err).contains("cancelled"));
}
