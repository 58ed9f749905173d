//! Health probes.
//!
//! # Responsibilities
//! - Issue a single health request against one backend
//! - Classify the result as success or a typed failure

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;

use crate::load_balancer::Backend;

/// Why a probe did not count as healthy.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to build probe request: {0}")]
    Request(String),

    #[error("connection error: {0}")]
    Connect(String),

    #[error("non-success status {0}")]
    Status(StatusCode),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Probes a backend's health endpoint.
///
/// Callers bound every probe with their own timeout; implementations need not.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, backend: &Backend, path: &str) -> Result<(), ProbeError>;
}

/// HTTP `GET` probe; any 2xx is healthy.
#[derive(Clone)]
pub struct HttpProbe {
    client: Client<HttpConnector, Body>,
}

impl HttpProbe {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client }
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe(&self, backend: &Backend, path: &str) -> Result<(), ProbeError> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(backend.endpoint(path))
            .header(header::USER_AGENT, "lb-proxy-health-check")
            .body(Body::empty())
            .map_err(|e| ProbeError::Request(e.to_string()))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| ProbeError::Connect(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ProbeError::Status(status))
        }
    }
}
