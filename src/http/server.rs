//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router that proxies every path
//! - Wire up middleware (tracing, request ID)
//! - Bind server to listener
//! - Hand requests to the dispatcher
//! - Start the health monitor and admin API alongside the proxy

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, Response},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::admin::{setup_admin_router, AdminState};
use crate::config::ProxyConfig;
use crate::health::{HealthMonitor, HealthProbe, HttpProbe};
use crate::http::dispatch::Dispatcher;
use crate::http::forward::{Forwarder, HyperForwarder};
use crate::http::request::{MakeRequestUuid, X_REQUEST_ID};
use crate::lifecycle::Shutdown;
use crate::load_balancer::{BackendError, Pool};
use crate::observability::{self, EventSink};

/// Fatal errors while assembling the server.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("failed to open event log: {0}")]
    EventLog(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

/// How long `run` waits for the event log to drain after the listener stops.
const EVENT_LOG_DRAIN: Duration = Duration::from_secs(5);

/// HTTP server for the load balancer.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    pool: Arc<Pool>,
    probe: Arc<dyn HealthProbe>,
    sink: Arc<dyn EventSink>,
    event_writer: Option<JoinHandle<()>>,
}

impl HttpServer {
    /// Build a server with the production forwarder, probe and event sinks.
    ///
    /// Must be called from within a Tokio runtime when an event log is configured.
    pub async fn new(config: ProxyConfig) -> Result<Self, StartupError> {
        let (sink, event_writer) = observability::build_sink(&config.observability).await?;
        let mut server = Self::with_components(
            config,
            Arc::new(HyperForwarder::new()),
            Arc::new(HttpProbe::new()),
            sink,
        )?;
        server.event_writer = event_writer;
        Ok(server)
    }

    /// Build a server from explicit collaborators.
    pub fn with_components(
        config: ProxyConfig,
        forwarder: Arc<dyn Forwarder>,
        probe: Arc<dyn HealthProbe>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, StartupError> {
        let pool = Arc::new(Pool::from_addresses(&config.backends)?);

        let dispatcher = Arc::new(Dispatcher::new(
            pool.clone(),
            config.algorithm,
            forwarder,
            sink.clone(),
            Duration::from_secs(config.timeouts.request_secs),
        ));

        let router = Self::build_router(AppState { dispatcher });
        Ok(Self {
            router,
            config,
            pool,
            probe,
            sink,
            event_writer: None,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    /// Run the server until `shutdown` is triggered.
    ///
    /// Returns after open connections finish, the health monitor stops and
    /// queued events are written out.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let HttpServer {
            router,
            config,
            pool,
            probe,
            sink,
            event_writer,
        } = self;

        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            algorithm = %config.algorithm,
            backends = pool.len(),
            "HTTP server starting"
        );

        let monitor = if config.health_check.enabled {
            let monitor = HealthMonitor::new(pool.clone(), probe, sink.clone(), &config.health_check);
            Some(tokio::spawn(monitor.run(shutdown.subscribe())))
        } else {
            tracing::info!("Active health checks disabled");
            None
        };

        if config.admin.enabled {
            let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
            let admin = setup_admin_router(AdminState {
                pool: pool.clone(),
                algorithm: config.algorithm,
                api_key: Arc::from(config.admin.api_key.as_str()),
            });
            tracing::info!(address = %admin_listener.local_addr()?, "Admin API listening");
            let stop = shutdown.signalled();
            tokio::spawn(async move {
                if let Err(e) = axum::serve(admin_listener, admin)
                    .with_graceful_shutdown(stop)
                    .await
                {
                    tracing::error!(error = %e, "Admin API failed");
                }
            });
        }

        let app = router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.signalled())
            .await?;

        if let Some(monitor) = monitor {
            if let Err(e) = monitor.await {
                tracing::error!(error = %e, "Health monitor task failed");
            }
        }

        drop(sink);
        if let Some(writer) = event_writer {
            match tokio::time::timeout(EVENT_LOG_DRAIN, writer).await {
                Ok(Ok(())) => tracing::debug!("Event log drained"),
                Ok(Err(e)) => tracing::error!(error = %e, "Event log writer failed"),
                Err(_) => tracing::warn!("Event log writer did not finish in time"),
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The proxy router, without connection info attached.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn pool(&self) -> Arc<Pool> {
        self.pool.clone()
    }
}

/// Every path is proxied.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response<Body> {
    let client_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    state.dispatcher.dispatch(request, client_addr).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    use crate::observability::NoopSink;

    fn server(backends: Vec<String>) -> HttpServer {
        let config = ProxyConfig {
            backends,
            ..Default::default()
        };
        HttpServer::with_components(
            config,
            Arc::new(HyperForwarder::new()),
            Arc::new(HttpProbe::new()),
            Arc::new(NoopSink),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn empty_pool_answers_503_with_request_id() {
        let server = server(Vec::new());
        let resp = server
            .router()
            .oneshot(Request::get("/anything").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(resp.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn dead_pool_answers_503() {
        let server = server(vec!["127.0.0.1:1".into()]);
        server.pool().get(0).unwrap().set_alive(false);
        let resp = server
            .router()
            .oneshot(Request::post("/submit").body(Body::from("x")).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn invalid_backend_is_fatal() {
        let config = ProxyConfig {
            backends: vec!["http://ok:1".into(), "https://nope:2".into()],
            ..Default::default()
        };
        let result = HttpServer::with_components(
            config,
            Arc::new(HyperForwarder::new()),
            Arc::new(HttpProbe::new()),
            Arc::new(NoopSink),
        );
        assert!(matches!(result, Err(StartupError::Backend(_))));
    }
}
