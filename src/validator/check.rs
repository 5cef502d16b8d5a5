// src/validator/check.rs
use std::time::Duration;
use url::Url;

/// A single HTTP reachability/content assertion with its own retry budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointCheck {
    url: Url,
    expected_status: u16,
    expected_body: Option<String>,
    max_retries: u32,
    delay: Duration,
}

impl EndpointCheck {
    /// A single-attempt status check. Use the `with_*` methods to extend it.
    pub fn new(url: Url, expected_status: u16) -> Self {
        Self {
            url,
            expected_status,
            expected_body: None,
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.expected_body = Some(body.into());
        self
    }

    pub fn with_retries(mut self, max_retries: u32, delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.delay = delay;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn expected_status(&self) -> u16 {
        self.expected_status
    }

    pub fn expected_body(&self) -> Option<&str> {
        self.expected_body.as_deref()
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Exact status match, plus exact body match when a body is expected.
    pub fn matches(&self, status: u16, body: &str) -> bool {
        status == self.expected_status
            && self
                .expected_body
                .as_deref()
                .map_or(true, |expected| expected == body)
    }
}

#[derive(Debug, Clone)]
pub struct CheckResult {
    pub url: Url,
    pub matched: bool,
    /// `None` when the last attempt failed before a response arrived.
    pub last_status: Option<u16>,
    pub last_body: Option<String>,
    pub attempts: u32,
    pub elapsed: Duration,
}
