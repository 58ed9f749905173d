//! Forwarding requests to a selected backend.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;

use crate::http::response::strip_hop_by_hop;
use crate::load_balancer::Backend;

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("invalid upstream uri: {0}")]
    Uri(#[from] axum::http::uri::InvalidUri),

    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("upstream did not respond within {0:?}")]
    Timeout(std::time::Duration),
}

impl ForwardError {
    /// Status the client sees for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            ForwardError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Sends a request to a backend and returns its response.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(
        &self,
        request: Request<Body>,
        backend: &Backend,
    ) -> Result<Response<Body>, ForwardError>;
}

/// Forwarder backed by a pooled hyper client. Response bodies are streamed.
#[derive(Clone)]
pub struct HyperForwarder {
    client: Client<HttpConnector, Body>,
}

impl HyperForwarder {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client }
    }
}

impl Default for HyperForwarder {
    fn default() -> Self {
        Self::new()
    }
}

/// Point `uri` at `backend`, keeping path and query under the backend's base path.
pub fn upstream_uri(backend: &Backend, uri: &Uri) -> Result<Uri, ForwardError> {
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    Ok(backend.endpoint(path_and_query).parse::<Uri>()?)
}

#[async_trait]
impl Forwarder for HyperForwarder {
    async fn forward(
        &self,
        request: Request<Body>,
        backend: &Backend,
    ) -> Result<Response<Body>, ForwardError> {
        let (mut parts, body) = request.into_parts();
        parts.uri = upstream_uri(backend, &parts.uri)?;
        strip_hop_by_hop(&mut parts.headers);

        let response = self
            .client
            .request(Request::from_parts(parts, body))
            .await
            .map_err(|e| ForwardError::Upstream(e.to_string()))?;

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}
