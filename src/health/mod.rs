//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Spawn one probe per backend (probe.rs), each with its own timeout
//!     → Apply verdict via state.rs
//!     → Report HealthEvent
//!
//! State machine (state.rs):
//!     Alive ←→ Dead
//! ```
//!
//! # Design Decisions
//! - Probes never run on the request path
//! - A hanging backend only delays its own verdict
//! - Health state is per-backend, not per-pool

pub mod active;
pub mod probe;
pub mod state;

pub use active::HealthMonitor;
pub use probe::{HealthProbe, HttpProbe, ProbeError};
