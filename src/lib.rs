//! HTTP load balancer library.
//!
//! Selects one backend per request (round-robin, least-connections or
//! random), tracks per-backend liveness and load, and forwards the request.

pub mod admin;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::{Algorithm, Backend, Pool, Selector};
