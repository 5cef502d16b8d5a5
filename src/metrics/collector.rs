// src/metrics/collector.rs
use anyhow::Result;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Match,
    Mismatch,
    TransportError,
}

impl AttemptOutcome {
    fn as_str(self) -> &'static str {
        match self {
            AttemptOutcome::Match => "match",
            AttemptOutcome::Mismatch => "mismatch",
            AttemptOutcome::TransportError => "transport_error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Passed,
    Failed,
    Cancelled,
}

impl CheckOutcome {
    fn as_str(self) -> &'static str {
        match self {
            CheckOutcome::Passed => "passed",
            CheckOutcome::Failed => "failed",
            CheckOutcome::Cancelled => "cancelled",
        }
    }
}

pub struct MetricsCollector {
    pub probe_attempts_total: IntCounterVec,
    pub checks_total: IntCounterVec,
    pub check_duration_seconds: HistogramVec,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let probe_attempts_total = IntCounterVec::new(
            Opts::new(
                "validator_probe_attempts_total",
                "Total HTTP probe attempts by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(probe_attempts_total.clone()))?;

        let checks_total = IntCounterVec::new(
            Opts::new("validator_checks_total", "Total endpoint checks by result"),
            &["result"],
        )?;
        registry.register(Box::new(checks_total.clone()))?;

        let check_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "validator_check_duration_seconds",
                "Time from first attempt to verdict",
            )
            .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0]),
            &["result"],
        )?;
        registry.register(Box::new(check_duration_seconds.clone()))?;

        Ok(Self {
            probe_attempts_total,
            checks_total,
            check_duration_seconds,
        })
    }

    pub fn record_attempt(&self, outcome: AttemptOutcome) {
        self.probe_attempts_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    pub fn record_check(&self, outcome: CheckOutcome, duration: Duration) {
        self.checks_total.with_label_values(&[outcome.as_str()]).inc();
        self.check_duration_seconds
            .with_label_values(&[outcome.as_str()])
            .observe(duration.as_secs_f64());
    }
}
