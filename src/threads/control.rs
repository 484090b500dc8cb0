//! Control thread: inbound dispatch plus the mission tick loop.
//!
//! The only thread that mutates session, mission, and planner state. Each
//! pass drains all queued inbound frames non-blockingly, then ticks the
//! session when the adaptive telemetry period has elapsed. Planner calls are
//! bounded, so nothing here blocks for long.

use crate::protocol::{Frame, NavSession};
use crate::shared::SharedRate;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Tick rate never drops below this, whatever congestion does.
const MIN_TICK_HZ: f64 = 0.2;

pub struct ControlThread {
    session: NavSession,
    inbound: crossbeam_channel::Receiver<Frame>,
    rate: SharedRate,
    running: Arc<AtomicBool>,
}

impl ControlThread {
    pub fn new(
        session: NavSession,
        inbound: crossbeam_channel::Receiver<Frame>,
        rate: SharedRate,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            session,
            inbound,
            rate,
            running,
        }
    }

    pub fn run(mut self) {
        let mut last_tick = Instant::now();

        while self.running.load(Ordering::Relaxed) {
            // Drain input quickly
            while let Ok(frame) = self.inbound.try_recv() {
                self.session.handle_frame(frame);
            }

            let hz = self.rate.current_hz().max(MIN_TICK_HZ);
            let period = Duration::from_secs_f64(1.0 / hz);
            let now = Instant::now();
            let elapsed = now.saturating_duration_since(last_tick);
            if elapsed >= period {
                last_tick = now;
                self.session.tick(elapsed.as_secs_f64());
            }

            thread::sleep(Duration::from_millis(5));
        }

        // Stop signal: the session transitions to Stopped on its way out
        self.session.shutdown();
    }
}
