//! Per-request dispatch.
//!
//! # Responsibilities
//! - Select a backend for each request
//! - Hold the backend's in-flight slot until the response body is finished
//! - Report the outcome (status, latency, backend) to the event sink
//!
//! # Design Decisions
//! - No retry against another backend; a failed forward is reported as-is
//! - The in-flight slot is an RAII guard so cancellation cannot leak it
//! - The request timeout bounds the wait for response headers; the body then
//!   streams, and latency is measured until it ends or is dropped

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};

use crate::http::body::TrackedBody;
use crate::http::forward::{ForwardError, Forwarder};
use crate::http::request::{append_forwarded_for, request_id};
use crate::http::response::error_response;
use crate::load_balancer::{Algorithm, InFlight, Pool, Selector};
use crate::observability::{EventSink, RequestEvent};

pub struct Dispatcher {
    pool: Arc<Pool>,
    selector: Selector,
    algorithm: Algorithm,
    forwarder: Arc<dyn Forwarder>,
    sink: Arc<dyn EventSink>,
    request_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        pool: Arc<Pool>,
        algorithm: Algorithm,
        forwarder: Arc<dyn Forwarder>,
        sink: Arc<dyn EventSink>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            selector: Selector::new(),
            algorithm,
            forwarder,
            sink,
            request_timeout,
        }
    }

    pub fn pool(&self) -> &Arc<Pool> {
        &self.pool
    }

    /// Select a backend, forward `request` to it and return the response.
    ///
    /// The backend's slot is released when the returned body finishes or is dropped.
    pub async fn dispatch(
        &self,
        mut request: Request<Body>,
        client_addr: Option<SocketAddr>,
    ) -> Response<Body> {
        let report = Report {
            request_id: request_id(&request),
            client_addr,
            method: request.method().to_string(),
            path: request.uri().path().to_string(),
            algorithm: self.algorithm,
            started: Instant::now(),
            sink: self.sink.clone(),
        };

        let Some(backend) = self.selector.select_backend(&self.pool, self.algorithm) else {
            tracing::warn!(
                request_id = %report.request_id,
                path = %report.path,
                algorithm = %self.algorithm,
                "No alive backends"
            );
            report.finish(None, StatusCode::SERVICE_UNAVAILABLE);
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "Service unavailable");
        };

        tracing::debug!(
            request_id = %report.request_id,
            method = %report.method,
            path = %report.path,
            backend = %backend.address(),
            "Forwarding request"
        );

        if let Some(client) = client_addr {
            append_forwarded_for(&mut request, client);
        }

        let in_flight = backend.start();
        self.sink
            .record_connections(backend.address(), backend.active_connections());

        let outcome = match tokio::time::timeout(
            self.request_timeout,
            self.forwarder.forward(request, &backend),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ForwardError::Timeout(self.request_timeout)),
        };

        match outcome {
            Ok(response) => {
                let status = response.status();
                let (parts, body) = response.into_parts();
                let body = TrackedBody::new(body, move || {
                    let address = in_flight.address().to_string();
                    release(in_flight, report.sink.as_ref());
                    report.finish(Some(address), status);
                });
                Response::from_parts(parts, Body::new(body))
            }
            Err(e) => {
                tracing::error!(
                    request_id = %report.request_id,
                    backend = %backend.address(),
                    error = %e,
                    "Upstream error"
                );
                release(in_flight, self.sink.as_ref());
                let status = e.status();
                let message = match e {
                    ForwardError::Timeout(_) => "Upstream timed out",
                    _ => "Upstream request failed",
                };
                report.finish(Some(backend.address().to_string()), status);
                error_response(status, message)
            }
        }
    }
}

/// Give back a backend slot and publish the new in-flight count.
fn release(in_flight: InFlight, sink: &dyn EventSink) {
    let backend = Arc::clone(in_flight.backend());
    drop(in_flight);
    sink.record_connections(backend.address(), backend.active_connections());
}

/// What is known about a request before its outcome.
struct Report {
    request_id: String,
    client_addr: Option<SocketAddr>,
    method: String,
    path: String,
    algorithm: Algorithm,
    started: Instant,
    sink: Arc<dyn EventSink>,
}

impl Report {
    fn finish(self, backend: Option<String>, status: StatusCode) {
        let latency = self.started.elapsed();
        tracing::info!(
            request_id = %self.request_id,
            method = %self.method,
            path = %self.path,
            backend = backend.as_deref().unwrap_or("none"),
            status = status.as_u16(),
            latency_ms = latency.as_millis() as u64,
            "Request completed"
        );
        self.sink.record_request(&RequestEvent {
            client_addr: self.client_addr.map(|a| a.to_string()),
            method: self.method,
            path: self.path,
            backend,
            algorithm: self.algorithm,
            latency_ms: latency.as_millis() as u64,
            status: status.as_u16(),
        });
    }
}
