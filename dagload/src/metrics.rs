// src/metrics.rs

//! Integer gauges updated by the worker pool.
//!
//! The loader does not own a metrics registry; callers pass in two gauges
//! (total worker threads, actively executing threads) and wire them into
//! whatever system they use. A `Gauge` is just a shared atomic counter.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// A cloneable atomic gauge. Clones share the same underlying counter.
#[derive(Debug, Clone, Default)]
pub struct Gauge(Arc<AtomicI64>);

impl Gauge {
    pub fn new() -> Self {
        Gauge::default()
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_counter() {
        let g = Gauge::new();
        let g2 = g.clone();
        g.inc();
        g.inc();
        g2.dec();
        assert_eq!(g.get(), 1);
        assert_eq!(g2.get(), 1);
    }
}
