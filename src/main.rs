// src/main.rs
use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use microservice_validator::{
    command::TokioCommandRunner,
    config::{self, AccountConfig, Config, DeploymentConfig},
    harness::{CommonName, MicroserviceHarness},
    inspect::AwsCli,
    metrics::MetricsRegistry,
    provision::TerraformCli,
    retry::RetryStrategy,
    validator::{EndpointCheck, EndpointValidator},
};

const AWS_CLI_TIMEOUT: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("microservice_validator=debug".parse()?)
                .add_directive("reqwest=info".parse()?),
        )
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "validator.yaml".to_string());

    info!("Loading configuration from: {}", config_path);
    let config = config::load_config(&config_path).await?;

    let metrics_registry = MetricsRegistry::new()?;

    let run_id = Uuid::new_v4();
    let result = run(&config, &metrics_registry)
        .instrument(tracing::info_span!("run", %run_id))
        .await;

    if config.metrics.enabled {
        write_metrics(&config, &metrics_registry).await?;
    }

    result
}

async fn run(config: &Config, registry: &MetricsRegistry) -> Result<()> {
    let validator = EndpointValidator::new(&config.validator)
        .context("Failed to create HTTP client")?
        .with_metrics(registry.collector());

    match &config.deployment {
        Some(deployment) => run_deployment(config, deployment, validator).await,
        None => {
            let mut checks: Vec<EndpointCheck> = Vec::new();
            for base in &config.base_urls {
                for endpoint in &config.endpoints {
                    checks.push(endpoint.resolve(base).with_context(|| {
                        format!("invalid endpoint {} for {}", endpoint.path, base)
                    })?);
                }
            }

            let results = until_shutdown(validator.validate(&checks), || validator.cancel()).await?;
            info!("{} endpoint checks passed", results.len());
            Ok(())
        }
    }
}

async fn run_deployment(
    config: &Config,
    deployment: &DeploymentConfig,
    validator: EndpointValidator,
) -> Result<()> {
    let account = match &config.account {
        Some(account) => account.clone(),
        None => AccountConfig::from_env()?,
    };

    let mut terraform_runner = TokioCommandRunner::new(deployment.command_timeout())
        .with_env("AWS_REGION", account.region.clone());
    if let Some(profile) = &account.profile {
        terraform_runner = terraform_runner.with_env("AWS_PROFILE", profile.clone());
    }

    let provisioner = TerraformCli::new(
        terraform_runner,
        RetryStrategy::fixed(deployment.apply_retries, deployment.apply_retry_delay()),
    );
    let inspector = AwsCli::new(TokioCommandRunner::new(AWS_CLI_TIMEOUT), &account);
    let name = CommonName::generate(&account, deployment);
    info!("Common name for this run: {}", name.name);

    let harness = MicroserviceHarness::new(
        provisioner,
        inspector,
        validator,
        deployment.clone(),
        config.endpoints.clone(),
        name,
    );

    let report = until_shutdown(harness.run(), || harness.validator().cancel()).await?;
    info!(
        "Run {} started at {} passed: {} load balancer checks, {} route53 checks",
        report.common_name,
        report.started_at.to_rfc3339(),
        report.load_balancer.len(),
        report.route53.len()
    );
    Ok(())
}

/// Drives `work` to completion. On a shutdown signal `on_signal` runs once
/// and `work` is still awaited so cleanup can finish.
async fn until_shutdown<T>(work: impl Future<Output = T>, on_signal: impl FnOnce()) -> T {
    tokio::pin!(work);

    tokio::select! {
        output = &mut work => return output,
        _ = shutdown_signal() => {}
    }

    warn!("Shutdown signal received, cancelling pending checks");
    on_signal();
    work.await
}

async fn write_metrics(config: &Config, registry: &MetricsRegistry) -> Result<()> {
    let metrics = registry.gather()?;
    match &config.metrics.output_path {
        Some(path) => tokio::fs::write(path, metrics)
            .await
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?,
        None => println!("{}", String::from_utf8_lossy(&metrics)),
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
