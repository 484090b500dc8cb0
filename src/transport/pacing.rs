//! Outbound pacing and congestion control.
//!
//! A token bucket bounds aggregate bytes/second on the link; a rolling
//! window of write timeouts drives automatic telemetry-rate cuts so the
//! link stays usable when conditions degrade, and a quiet-period rule
//! recovers the rate when they improve. All time-dependent methods take an
//! explicit `Instant` so behavior is deterministic under test.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Token bucket limiting aggregate outbound bytes per second.
///
/// Tokens refill continuously based on elapsed time. `consume` always books
/// the bytes and returns how long the caller must pause before they may hit
/// the wire; the balance is allowed to go negative so a single oversized
/// chunk simply pushes the next one further out.
#[derive(Debug)]
pub struct TokenBucket {
    rate_bytes_per_s: f64,
    burst: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(rate_bytes_per_s: f64, burst: f64, now: Instant) -> Self {
        Self {
            rate_bytes_per_s: rate_bytes_per_s.max(1.0),
            burst: burst.max(1.0),
            tokens: burst.max(1.0),
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;
        self.tokens = (self.tokens + elapsed * self.rate_bytes_per_s).min(self.burst);
    }

    /// Book `bytes` against the budget; returns the pause required before
    /// sending them.
    pub fn consume(&mut self, bytes: usize, now: Instant) -> Duration {
        self.refill(now);
        self.tokens -= bytes as f64;
        if self.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-self.tokens / self.rate_bytes_per_s)
        }
    }
}

/// Telemetry-rate governor driven by write timeouts.
///
/// Three or more timeouts inside a rolling 10-second window cut the rate in
/// half (floor 0.5 Hz) and clear the window. After 30 seconds without a
/// timeout the rate steps back up toward the configured target whenever the
/// writer is otherwise idle.
#[derive(Debug)]
pub struct CongestionControl {
    window: VecDeque<Instant>,
    last_timeout: Option<Instant>,
}

/// Rolling window span for counting timeouts.
const WINDOW: Duration = Duration::from_secs(10);
/// Timeouts within the window that trigger a rate cut.
const TRIP_COUNT: usize = 3;
/// Quiet period before recovery starts.
const QUIET: Duration = Duration::from_secs(30);
/// Minimum telemetry rate.
const FLOOR_HZ: f64 = 0.5;
/// Recovery step per idle pass.
const STEP_HZ: f64 = 0.5;

impl CongestionControl {
    pub fn new() -> Self {
        Self {
            window: VecDeque::new(),
            last_timeout: None,
        }
    }

    /// Record a write failure/timeout. Returns the new telemetry rate when
    /// this one trips the cut.
    pub fn record_timeout(&mut self, current_hz: f64, now: Instant) -> Option<f64> {
        self.last_timeout = Some(now);
        self.window.push_back(now);
        while let Some(&front) = self.window.front() {
            if now.saturating_duration_since(front) > WINDOW {
                self.window.pop_front();
            } else {
                break;
            }
        }

        if self.window.len() >= TRIP_COUNT {
            self.window.clear();
            Some((current_hz / 2.0).max(FLOOR_HZ))
        } else {
            None
        }
    }

    /// Called on idle writer passes. Returns a stepped-up rate once the link
    /// has been quiet long enough and the rate is still below target.
    pub fn try_recover(&mut self, current_hz: f64, target_hz: f64, now: Instant) -> Option<f64> {
        if current_hz >= target_hz {
            return None;
        }
        let quiet = match self.last_timeout {
            Some(t) => now.saturating_duration_since(t) >= QUIET,
            None => true,
        };
        if quiet {
            Some((current_hz + STEP_HZ).min(target_hz))
        } else {
            None
        }
    }
}

impl Default for CongestionControl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_bucket_allows_burst_then_paces() {
        let t0 = Instant::now();
        let mut bucket = TokenBucket::new(100.0, 50.0, t0);

        // Initial burst fits
        assert_eq!(bucket.consume(50, t0), Duration::ZERO);
        // Next 100 bytes must wait one second at 100 B/s
        let wait = bucket.consume(100, t0);
        assert!((wait.as_secs_f64() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_token_bucket_refills_over_time() {
        let t0 = Instant::now();
        let mut bucket = TokenBucket::new(100.0, 50.0, t0);
        bucket.consume(50, t0);
        // After one second, 50 more tokens are available (capped at burst)
        assert_eq!(bucket.consume(50, t0 + Duration::from_secs(1)), Duration::ZERO);
    }

    #[test]
    fn test_three_timeouts_halve_rate() {
        let t0 = Instant::now();
        let mut cc = CongestionControl::new();

        assert_eq!(cc.record_timeout(5.0, t0), None);
        assert_eq!(cc.record_timeout(5.0, t0 + Duration::from_secs(2)), None);
        let cut = cc.record_timeout(5.0, t0 + Duration::from_secs(4));
        assert_eq!(cut, Some(2.5));
    }

    #[test]
    fn test_spread_timeouts_do_not_trip() {
        let t0 = Instant::now();
        let mut cc = CongestionControl::new();

        assert_eq!(cc.record_timeout(5.0, t0), None);
        assert_eq!(cc.record_timeout(5.0, t0 + Duration::from_secs(11)), None);
        // The first timeout has rolled out of the window
        assert_eq!(cc.record_timeout(5.0, t0 + Duration::from_secs(22)), None);
    }

    #[test]
    fn test_rate_floor() {
        let t0 = Instant::now();
        let mut cc = CongestionControl::new();
        for i in 0..2 {
            cc.record_timeout(0.6, t0 + Duration::from_secs(i));
        }
        let cut = cc.record_timeout(0.6, t0 + Duration::from_secs(2));
        assert_eq!(cut, Some(0.5));
    }

    #[test]
    fn test_window_cleared_after_cut() {
        let t0 = Instant::now();
        let mut cc = CongestionControl::new();
        cc.record_timeout(5.0, t0);
        cc.record_timeout(5.0, t0 + Duration::from_secs(1));
        assert!(cc.record_timeout(5.0, t0 + Duration::from_secs(2)).is_some());
        // Window cleared: the next two timeouts alone do not trip again
        assert_eq!(cc.record_timeout(2.5, t0 + Duration::from_secs(3)), None);
        assert_eq!(cc.record_timeout(2.5, t0 + Duration::from_secs(4)), None);
    }

    #[test]
    fn test_recovery_after_quiet_period() {
        let t0 = Instant::now();
        let mut cc = CongestionControl::new();
        cc.record_timeout(5.0, t0);
        cc.record_timeout(5.0, t0 + Duration::from_secs(1));
        assert_eq!(cc.record_timeout(5.0, t0 + Duration::from_secs(2)), Some(2.5));

        // Too soon: no recovery
        assert_eq!(
            cc.try_recover(2.5, 5.0, t0 + Duration::from_secs(20)),
            None
        );
        // After 30 quiet seconds the rate steps toward target
        assert_eq!(
            cc.try_recover(2.5, 5.0, t0 + Duration::from_secs(33)),
            Some(3.0)
        );
        assert_eq!(
            cc.try_recover(3.0, 5.0, t0 + Duration::from_secs(34)),
            Some(3.5)
        );
        // At target, recovery stops
        assert_eq!(cc.try_recover(5.0, 5.0, t0 + Duration::from_secs(35)), None);
    }
}
