//! Backend liveness state machine.
//!
//! # States
//! - Alive: backend receives traffic (initial state)
//! - Dead: backend excluded from selection
//!
//! # State Transitions
//! ```text
//! Alive → Dead: any failed probe (error, timeout, non-2xx)
//! Dead → Alive: any successful probe
//! ```
//!
//! # Design Decisions
//! - No hysteresis: the next probe round is the retry
//! - Transitions are reported so they can be logged once

use crate::load_balancer::Backend;

/// What a probe result did to a backend's liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    StayedAlive,
    StayedDead,
    Recovered,
    Failed,
}

impl Transition {
    pub fn between(was_alive: bool, alive: bool) -> Self {
        match (was_alive, alive) {
            (true, true) => Transition::StayedAlive,
            (false, false) => Transition::StayedDead,
            (false, true) => Transition::Recovered,
            (true, false) => Transition::Failed,
        }
    }

    pub fn changed(&self) -> bool {
        matches!(self, Transition::Recovered | Transition::Failed)
    }
}

/// Store a probe verdict on `backend` and report the transition it caused.
pub fn apply(backend: &Backend, healthy: bool) -> Transition {
    let was_alive = backend.set_alive(healthy);
    let transition = Transition::between(was_alive, healthy);
    if transition.changed() {
        let state = if healthy { "alive" } else { "dead" };
        tracing::info!(backend = %backend.address(), state, "Backend liveness changed");
    }
    transition
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_success_keeps_alive() {
        let b = Backend::new("localhost:9000").unwrap();
        for _ in 0..5 {
            assert_eq!(apply(&b, true), Transition::StayedAlive);
            assert!(b.is_alive());
        }
    }

    #[test]
    fn single_failure_kills_then_success_revives() {
        let b = Backend::new("localhost:9000").unwrap();
        assert_eq!(apply(&b, false), Transition::Failed);
        assert!(!b.is_alive());
        assert_eq!(apply(&b, false), Transition::StayedDead);
        assert_eq!(apply(&b, true), Transition::Recovered);
        assert!(b.is_alive());
    }

    #[test]
    fn only_crossings_count_as_changes() {
        assert!(Transition::Failed.changed());
        assert!(Transition::Recovered.changed());
        assert!(!Transition::StayedAlive.changed());
        assert!(!Transition::StayedDead.changed());
    }
}
