//! State shared between the writer and control threads.
//!
//! The only cross-thread planning-adjacent value is the adaptive telemetry
//! rate: the writer thread lowers it under congestion and the control thread
//! derives its tick period from it. Everything else moves through queues.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Atomic wrapper for f64 values.
/// Uses AtomicU64 with bit reinterpretation.
#[derive(Debug)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(val: f64) -> Self {
        Self(AtomicU64::new(val.to_bits()))
    }

    pub fn load(&self, order: Ordering) -> f64 {
        f64::from_bits(self.0.load(order))
    }

    pub fn store(&self, val: f64, order: Ordering) {
        self.0.store(val.to_bits(), order);
    }
}

/// Adaptive telemetry rate shared across threads.
///
/// `current` is the effective rate after congestion cuts; `target` is the
/// operator-configured rate the writer recovers toward when the link is quiet.
#[derive(Debug)]
pub struct RateHandle {
    current: AtomicF64,
    target: AtomicF64,
}

impl RateHandle {
    pub fn new(target_hz: f64) -> Self {
        Self {
            current: AtomicF64::new(target_hz),
            target: AtomicF64::new(target_hz),
        }
    }

    /// Effective telemetry rate in Hz.
    pub fn current_hz(&self) -> f64 {
        self.current.load(Ordering::Acquire)
    }

    pub fn set_current_hz(&self, hz: f64) {
        self.current.store(hz, Ordering::Release);
    }

    /// Operator-configured target rate in Hz.
    pub fn target_hz(&self) -> f64 {
        self.target.load(Ordering::Acquire)
    }

    /// Reconfigure the target; the effective rate snaps to it.
    pub fn set_target_hz(&self, hz: f64) {
        self.target.store(hz, Ordering::Release);
        self.current.store(hz, Ordering::Release);
    }
}

/// Thread-safe rate handle.
pub type SharedRate = Arc<RateHandle>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_f64_roundtrip() {
        let a = AtomicF64::new(2.5);
        assert_eq!(a.load(Ordering::Acquire), 2.5);
        a.store(-0.125, Ordering::Release);
        assert_eq!(a.load(Ordering::Acquire), -0.125);
    }

    #[test]
    fn test_rate_handle_reconfigure() {
        let rate = RateHandle::new(5.0);
        rate.set_current_hz(2.5);
        assert_eq!(rate.current_hz(), 2.5);
        assert_eq!(rate.target_hz(), 5.0);
        rate.set_target_hz(10.0);
        assert_eq!(rate.current_hz(), 10.0);
        assert_eq!(rate.target_hz(), 10.0);
    }
}
