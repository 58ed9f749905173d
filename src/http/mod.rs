//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace layer)
//!     → dispatch.rs (select backend, take in-flight slot)
//!     → forward.rs (rewrite URI, send upstream, stream response)
//!     → body.rs (release the slot and report once the body ends)
//!     → response.rs (hop-by-hop stripping, proxy error responses)
//!     → Send to client
//! ```

pub mod body;
pub mod dispatch;
pub mod forward;
pub mod request;
pub mod response;
pub mod server;

pub use dispatch::Dispatcher;
pub use forward::{ForwardError, Forwarder, HyperForwarder};
pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{HttpServer, StartupError};
