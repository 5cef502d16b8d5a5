// src/validator/probe.rs
use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::config::ValidatorConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub body: String,
}

/// Transport-level failure: DNS, connect, timeout or an unreadable body.
#[derive(Debug, thiserror::Error)]
#[error("GET {url} failed: {message}")]
pub struct ProbeError {
    pub url: String,
    pub message: String,
}

impl ProbeError {
    pub fn new(url: &Url, message: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            message: message.into(),
        }
    }
}

/// The HTTP GET primitive the validator probes through.
#[async_trait]
pub trait HttpProbe: Send + Sync {
    async fn get(&self, url: &Url) -> Result<ProbeResponse, ProbeError>;
}

pub struct ReqwestProbe {
    client: Client,
}

impl ReqwestProbe {
    pub fn new(config: &ValidatorConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpProbe for ReqwestProbe {
    async fn get(&self, url: &Url) -> Result<ProbeResponse, ProbeError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ProbeError::new(url, describe(&e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ProbeError::new(url, format!("reading body: {}", describe(&e))))?;

        Ok(ProbeResponse { status, body })
    }
}

fn describe(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timeout".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    }
}
