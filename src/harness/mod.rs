// src/harness/mod.rs
mod naming;

pub use naming::{merge_vars, random_id, CommonName};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::future::Future;
use tracing::{info, info_span, warn, Instrument};
use url::Url;

use crate::config::{DeploymentConfig, EndpointSpec};
use crate::inspect::{assert_ecr, assert_ecs, EcrAssertion, EcsAssertion, ResourceInspector};
use crate::provision::{MicroserviceOutputs, ModuleOptions, Provisioner};
use crate::validator::{CheckResult, EndpointCheck, EndpointValidator, HttpProbe};

pub const STAGE_DEPLOY: &str = "deploy";
pub const STAGE_VALIDATE_ECR: &str = "validate_ecr";
pub const STAGE_VALIDATE_ECS: &str = "validate_ecs";
pub const STAGE_ENDPOINTS_LOAD_BALANCER: &str = "validate_rest_endpoints_load_balancer";
pub const STAGE_ENDPOINTS_ROUTE53: &str = "validate_rest_endpoints_route53";
pub const STAGE_CLEANUP: &str = "cleanup";

#[derive(Debug, Default)]
pub struct RunReport {
    pub common_name: String,
    pub started_at: DateTime<Utc>,
    pub load_balancer: Vec<CheckResult>,
    pub route53: Vec<CheckResult>,
}

/// Deploys a microservice module, checks what came up, and probes it.
pub struct MicroserviceHarness<P, I, H> {
    provisioner: P,
    inspector: I,
    validator: EndpointValidator<H>,
    deployment: DeploymentConfig,
    endpoints: Vec<EndpointSpec>,
    name: CommonName,
}

impl<P, I, H> MicroserviceHarness<P, I, H>
where
    P: Provisioner,
    I: ResourceInspector,
    H: HttpProbe,
{
    pub fn new(
        provisioner: P,
        inspector: I,
        validator: EndpointValidator<H>,
        deployment: DeploymentConfig,
        endpoints: Vec<EndpointSpec>,
        name: CommonName,
    ) -> Self {
        Self {
            provisioner,
            inspector,
            validator,
            deployment,
            endpoints,
            name,
        }
    }

    pub fn validator(&self) -> &EndpointValidator<H> {
        &self.validator
    }

    pub fn module(&self) -> ModuleOptions {
        let mut vars = self.name.base_vars();
        merge_vars(&mut vars, self.deployment.vars.clone());
        ModuleOptions {
            dir: self.deployment.module_dir.clone(),
            vars,
        }
    }

    /// Runs every stage, then tears down when configured to, even after a
    /// failure. The first error wins.
    pub async fn run(&self) -> Result<RunReport> {
        let module = self.module();
        let result = self.run_stages(&module).await;

        if !self.deployment.teardown {
            return result;
        }

        let cleanup = self
            .stage(STAGE_CLEANUP, || async {
                self.provisioner
                    .destroy(&module)
                    .await
                    .context("destroying infrastructure")
            })
            .await;

        match (result, cleanup) {
            (Ok(report), Ok(_)) => Ok(report),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(_)) => Err(e),
            (Err(e), Err(cleanup_err)) => {
                warn!("Cleanup after failed run also failed: {:#}", cleanup_err);
                Err(e)
            }
        }
    }

    async fn run_stages(&self, module: &ModuleOptions) -> Result<RunReport> {
        let mut report = RunReport {
            common_name: self.name.name.clone(),
            started_at: Utc::now(),
            ..Default::default()
        };

        let outputs = match self
            .stage(STAGE_DEPLOY, || async {
                self.provisioner
                    .apply(module)
                    .await
                    .context("applying module")
            })
            .await?
        {
            Some(outputs) => outputs,
            None => self
                .provisioner
                .outputs(module)
                .await
                .context("reading outputs of the existing deployment")?,
        };

        self.stage(STAGE_VALIDATE_ECR, || async {
            assert_ecr(&self.inspector, &self.ecr_assertion())
                .await
                .context("ECR repository does not match expectations")
        })
        .await?;

        self.stage(STAGE_VALIDATE_ECS, || async {
            assert_ecs(&self.inspector, &self.ecs_assertion())
                .await
                .context("ECS deployment does not match expectations")
        })
        .await?;

        let Some(microservice) = outputs
            .microservice()
            .context("malformed `microservice` output")?
        else {
            warn!("Module has no `microservice` output, no endpoints to probe");
            return Ok(report);
        };

        if let Some(checks) = self.load_balancer_checks(&microservice)? {
            if let Some(results) = self
                .stage(STAGE_ENDPOINTS_LOAD_BALANCER, || self.probe(&checks))
                .await?
            {
                report.load_balancer = results;
            }
        }

        if let Some(checks) = self.route53_checks(&microservice)? {
            if let Some(results) = self
                .stage(STAGE_ENDPOINTS_ROUTE53, || self.probe(&checks))
                .await?
            {
                report.route53 = results;
            }
        }

        Ok(report)
    }

    async fn probe(&self, checks: &[EndpointCheck]) -> Result<Vec<CheckResult>> {
        Ok(self.validator.validate(checks).await?)
    }

    fn load_balancer_checks(
        &self,
        outputs: &MicroserviceOutputs,
    ) -> Result<Option<Vec<EndpointCheck>>> {
        match outputs.load_balancer_host() {
            Some(host) => {
                info!("Load Balancer DNS = {}", host);
                self.resolve(host).map(Some)
            }
            None => Ok(None),
        }
    }

    fn route53_checks(&self, outputs: &MicroserviceOutputs) -> Result<Option<Vec<EndpointCheck>>> {
        match outputs.dns_host() {
            Some(host) => {
                info!("Route53 DNS = {}", host);
                self.resolve(&host).map(Some)
            }
            None => Ok(None),
        }
    }

    fn resolve(&self, host: &str) -> Result<Vec<EndpointCheck>> {
        let base = Url::parse(&format!("{}://{}", self.deployment.scheme, host))
            .with_context(|| format!("invalid host `{}`", host))?;

        self.endpoints
            .iter()
            .map(|endpoint| {
                endpoint
                    .resolve(&base)
                    .with_context(|| format!("invalid endpoint path `{}`", endpoint.path))
            })
            .collect()
    }

    fn ecr_assertion(&self) -> EcrAssertion {
        let expected = self.deployment.ecr.clone().unwrap_or_default();
        EcrAssertion {
            repository_name: expected
                .repository_name
                .unwrap_or_else(|| self.name.name.clone()),
            image_count: expected.image_count,
        }
    }

    fn ecs_assertion(&self) -> EcsAssertion {
        let expected = self.deployment.ecs.clone().unwrap_or_default();
        EcsAssertion {
            cluster_name: expected
                .cluster_name
                .unwrap_or_else(|| self.name.name.clone()),
            service_name: expected
                .service_name
                .unwrap_or_else(|| self.name.name.clone()),
            service_count: expected.service_count,
            desired_count: expected.desired_count,
            cpu: expected.cpu,
            memory: expected.memory,
        }
    }

    /// Runs `f` unless `name` is listed in `skip_stages`.
    async fn stage<T, F, Fut>(&self, name: &str, f: F) -> Result<Option<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if self.deployment.skip_stages.iter().any(|stage| stage == name) {
            info!("Skipping stage {}", name);
            return Ok(None);
        }

        let span = info_span!("stage", name);
        async {
            info!("Running stage {}", name);
            let value = f().await.with_context(|| format!("stage {} failed", name))?;
            info!("Stage {} complete", name);
            Ok::<_, anyhow::Error>(Some(value))
        }
        .instrument(span)
        .await
    }
}
