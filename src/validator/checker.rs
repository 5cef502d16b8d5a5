// src/validator/checker.rs
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};
use url::Url;

use super::check::{CheckResult, EndpointCheck};
use super::probe::{HttpProbe, ReqwestProbe};
use crate::config::ValidatorConfig;
use crate::metrics::{AttemptOutcome, CheckOutcome, MetricsCollector};

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("{0}")]
    Exhausted(Box<ExhaustedCheck>),

    #[error("validation of {url} cancelled")]
    Cancelled { url: Url },
}

/// Expected vs. observed state of a check that ran out of retries.
#[derive(Debug, Clone)]
pub struct ExhaustedCheck {
    pub url: Url,
    pub attempts: u32,
    pub expected_status: u16,
    pub observed_status: Option<u16>,
    pub expected_body: Option<String>,
    pub observed_body: Option<String>,
    pub last_error: Option<String>,
}

impl fmt::Display for ExhaustedCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HTTP GET to URL {} unsuccessful after {} attempt(s): expected status {}, got ",
            self.url, self.attempts, self.expected_status
        )?;
        match self.observed_status {
            Some(status) => write!(f, "{}", status)?,
            None => f.write_str("no response")?,
        }
        if let Some(expected) = &self.expected_body {
            write!(f, "; expected body {:?}, got ", expected)?;
            match &self.observed_body {
                Some(body) => write!(f, "{:?}", body)?,
                None => f.write_str("no response")?,
            }
        }
        if let Some(error) = &self.last_error {
            write!(f, "; last error: {}", error)?;
        }
        Ok(())
    }
}

/// Evaluates endpoint checks one at a time, in order, failing on the first
/// check whose retry budget runs out.
pub struct EndpointValidator<P = ReqwestProbe> {
    probe: P,
    warmup: Duration,
    metrics: Option<Arc<MetricsCollector>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl EndpointValidator<ReqwestProbe> {
    pub fn new(config: &ValidatorConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::with_probe(ReqwestProbe::new(config)?, config.warmup()))
    }
}

impl<P: HttpProbe> EndpointValidator<P> {
    pub fn with_probe(probe: P, warmup: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            probe,
            warmup,
            metrics: None,
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Interrupts a pending warm-up or retry delay.
    pub fn cancel(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn validate(
        &self,
        checks: &[EndpointCheck],
    ) -> Result<Vec<CheckResult>, ValidationError> {
        let Some(first) = checks.first() else {
            debug!("No endpoints to validate");
            return Ok(Vec::new());
        };

        if !self.warmup.is_zero() {
            info!("Sleeping {:?} before testing endpoints", self.warmup);
            self.pause(self.warmup, first.url()).await?;
        }

        let mut results = Vec::with_capacity(checks.len());
        for check in checks {
            results.push(self.evaluate(check).await?);
        }

        info!("All {} endpoint checks passed", results.len());
        Ok(results)
    }

    /// Runs a single check until it matches or its retry budget is spent.
    pub async fn evaluate(&self, check: &EndpointCheck) -> Result<CheckResult, ValidationError> {
        let start = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            let (status, body, error) = match self.probe.get(check.url()).await {
                Ok(response) => (Some(response.status), Some(response.body), None),
                Err(e) => (None, None, Some(e.to_string())),
            };

            let matched = match (status, body.as_deref()) {
                (Some(status), Some(body)) => check.matches(status, body),
                _ => false,
            };

            self.record_attempt(match (matched, &error) {
                (true, _) => AttemptOutcome::Match,
                (false, Some(_)) => AttemptOutcome::TransportError,
                (false, None) => AttemptOutcome::Mismatch,
            });

            match &error {
                Some(error) => debug!(url = %check.url(), attempt = attempt + 1, "{}", error),
                None => debug!(
                    url = %check.url(),
                    attempt = attempt + 1,
                    expected_status = check.expected_status(),
                    got_status = ?status,
                    expected_body = ?check.expected_body(),
                    got_body = ?check.expected_body().and(body.as_deref()),
                    "probe response"
                ),
            }

            if matched {
                info!("HTTP GET to URL {} successful", check.url());
                let elapsed = start.elapsed();
                self.record_check(CheckOutcome::Passed, elapsed);

                return Ok(CheckResult {
                    url: check.url().clone(),
                    matched: true,
                    last_status: status,
                    last_body: body,
                    attempts: attempt + 1,
                    elapsed,
                });
            }

            if attempt >= check.max_retries() {
                warn!(
                    "HTTP GET to URL {} unsuccessful after {} retries",
                    check.url(),
                    check.max_retries()
                );
                self.record_check(CheckOutcome::Failed, start.elapsed());

                return Err(ValidationError::Exhausted(Box::new(ExhaustedCheck {
                    url: check.url().clone(),
                    attempts: attempt + 1,
                    expected_status: check.expected_status(),
                    observed_status: status,
                    expected_body: check.expected_body().map(str::to_string),
                    observed_body: body,
                    last_error: error,
                })));
            }

            debug!("Sleeping {:?} before retrying {}", check.delay(), check.url());
            if let Err(cancelled) = self.pause(check.delay(), check.url()).await {
                self.record_check(CheckOutcome::Cancelled, start.elapsed());
                return Err(cancelled);
            }
            attempt += 1;
        }
    }

    async fn pause(&self, delay: Duration, url: &Url) -> Result<(), ValidationError> {
        let mut shutdown_rx = self.shutdown_rx.clone();
        let cancelled = || ValidationError::Cancelled { url: url.clone() };

        if *shutdown_rx.borrow() {
            return Err(cancelled());
        }

        tokio::select! {
            _ = sleep(delay) => Ok(()),
            _ = shutdown_rx.changed() => Err(cancelled()),
        }
    }

    fn record_attempt(&self, outcome: AttemptOutcome) {
        if let Some(metrics) = &self.metrics {
            metrics.record_attempt(outcome);
        }
    }

    fn record_check(&self, outcome: CheckOutcome, elapsed: Duration) {
        if let Some(metrics) = &self.metrics {
            metrics.record_check(outcome, elapsed);
        }
    }
}
