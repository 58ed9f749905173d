//! Least Connections load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{backend::Backend, LoadBalancer};

/// Least connections selector.
/// Selects the alive backend with the minimum number of active connections.
///
/// Each counter is read independently, so a pick may be based on a slightly
/// stale view of a backend that is mid-update.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastConnections {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        // min_by_key keeps the first of equal minima, so ties go to pool order
        backends
            .iter()
            .filter(|b| b.is_alive())
            .min_by_key(|b| b.active_connections())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(port: u16, conns: usize) -> Arc<Backend> {
        let b = Arc::new(Backend::new(&format!("127.0.0.1:{}", port)).unwrap());
        for _ in 0..conns {
            b.record_start();
        }
        b
    }

    #[test]
    fn test_least_conn() {
        let lb = LeastConnections::new();
        let a = backend(8080, 2);
        let b = backend(8081, 0);
        let c = backend(8082, 1);
        let backends = vec![a.clone(), b.clone(), c.clone()];

        let s1 = lb.next_server(&backends).unwrap();
        assert_eq!(s1.address(), b.address());

        b.record_start();
        b.record_start(); // a=2, b=2, c=1
        let s2 = lb.next_server(&backends).unwrap();
        assert_eq!(s2.address(), c.address());
    }

    #[test]
    fn ties_go_to_first_in_pool_order() {
        let lb = LeastConnections::new();
        let backends = vec![backend(1, 1), backend(2, 0), backend(3, 0)];
        let picked = lb.next_server(&backends).unwrap();
        assert_eq!(picked.address(), "127.0.0.1:2");
    }

    #[test]
    fn ignores_dead_backends_even_if_idle() {
        let lb = LeastConnections::new();
        let idle = backend(1, 0);
        let busy = backend(2, 5);
        idle.set_alive(false);

        let picked = lb.next_server(&[idle, busy.clone()]).unwrap();
        assert_eq!(picked.address(), busy.address());
    }

    #[test]
    fn never_above_alive_minimum() {
        let lb = LeastConnections::new();
        let backends: Vec<_> = [4usize, 7, 3, 3, 9]
            .iter()
            .enumerate()
            .map(|(i, c)| backend(9000 + i as u16, *c))
            .collect();
        backends[2].set_alive(false);

        let picked = lb.next_server(&backends).unwrap();
        let min_alive = backends
            .iter()
            .filter(|b| b.is_alive())
            .map(|b| b.active_connections())
            .min()
            .unwrap();
        assert_eq!(picked.active_connections(), min_alive);
        assert_eq!(picked.address(), "127.0.0.1:9003");
    }

    #[test]
    fn none_when_all_dead_or_empty() {
        let lb = LeastConnections::new();
        assert!(lb.next_server(&[]).is_none());

        let b = backend(1, 0);
        b.set_alive(false);
        assert!(lb.next_server(&[b]).is_none());
    }
}
