//! Bounded outbound queue with control/telemetry prioritization.
//!
//! The link can only sustain a few hundred bytes per second, so the queue
//! must shed load without ever losing a safety-critical frame. Telemetry is
//! droppable; everything else is control traffic. When the queue is full:
//! a new telemetry frame is dropped on the floor, a new control frame evicts
//! the oldest queued telemetry frame, and only if there is no telemetry left
//! to evict is the control frame itself dropped (logged, documented loss).

use crate::protocol::Frame;
use log::{debug, warn};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::Duration;

/// Priority class of an outbound frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Priority {
    /// Never dropped while any telemetry remains to evict
    Control,
    /// Droppable under backpressure
    Telemetry,
}

fn classify(frame: &Frame) -> Priority {
    match frame {
        Frame::Telemetry { .. } => Priority::Telemetry,
        _ => Priority::Control,
    }
}

struct QueueItem {
    frame: Frame,
    priority: Priority,
}

pub struct OutboundQueue {
    items: Mutex<VecDeque<QueueItem>>,
    capacity: usize,
    available: Condvar,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            available: Condvar::new(),
        }
    }

    /// Enqueue a frame under the backpressure policy.
    pub fn push(&self, frame: Frame) {
        let priority = classify(&frame);
        let mut items = self.items.lock();

        if items.len() >= self.capacity {
            match priority {
                Priority::Telemetry => {
                    debug!("outbound queue full, dropping telemetry frame");
                    return;
                }
                Priority::Control => {
                    // Evict the oldest telemetry item to make room
                    if let Some(idx) = items.iter().position(|i| i.priority == Priority::Telemetry)
                    {
                        let _ = items.remove(idx);
                        debug!("outbound queue full, evicted telemetry for control frame");
                    } else {
                        warn!(
                            "outbound queue full of control frames, dropping {}",
                            frame.type_name()
                        );
                        return;
                    }
                }
            }
        }

        items.push_back(QueueItem { frame, priority });
        drop(items);
        self.available.notify_one();
    }

    /// Dequeue the next frame, waiting up to `timeout`.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Frame> {
        let mut items = self.items.lock();
        if items.is_empty() {
            let _ = self.available.wait_for(&mut items, timeout);
        }
        items.pop_front().map(|i| i.frame)
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;

    fn telemetry_frame() -> Frame {
        Frame::Telemetry {
            pos_gps: GeoPoint::new(0.0, 0.0),
            path_travelled_gps: Vec::new(),
            speed_ms: 1.5,
            ts: 0.0,
        }
    }

    #[test]
    fn test_fifo_order() {
        let q = OutboundQueue::new(4);
        q.push(Frame::NavDone);
        q.push(Frame::MissionStop);
        assert!(matches!(
            q.pop_timeout(Duration::from_millis(1)),
            Some(Frame::NavDone)
        ));
        assert!(matches!(
            q.pop_timeout(Duration::from_millis(1)),
            Some(Frame::MissionStop)
        ));
    }

    #[test]
    fn test_full_queue_drops_new_telemetry() {
        let q = OutboundQueue::new(2);
        q.push(Frame::NavDone);
        q.push(Frame::NavDone);
        q.push(telemetry_frame());
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn test_control_evicts_oldest_telemetry() {
        let q = OutboundQueue::new(3);
        q.push(telemetry_frame());
        q.push(telemetry_frame());
        q.push(telemetry_frame());
        assert_eq!(q.len(), 3);

        q.push(Frame::NavDone);
        assert_eq!(q.len(), 3);

        // Two telemetry frames remain ahead of the control frame
        let mut seen_control = false;
        let mut telemetry_count = 0;
        while let Some(frame) = q.pop_timeout(Duration::from_millis(1)) {
            match frame {
                Frame::Telemetry { .. } => telemetry_count += 1,
                Frame::NavDone => seen_control = true,
                _ => {}
            }
        }
        assert!(seen_control, "control frame must survive backpressure");
        assert_eq!(telemetry_count, 2, "exactly one telemetry frame evicted");
    }

    #[test]
    fn test_control_dropped_only_without_telemetry() {
        let q = OutboundQueue::new(2);
        q.push(Frame::NavDone);
        q.push(Frame::NavDone);
        q.push(Frame::MissionStop);
        // Documented loss: nothing to evict
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn test_pop_timeout_on_empty() {
        let q = OutboundQueue::new(2);
        assert!(q.pop_timeout(Duration::from_millis(5)).is_none());
    }
}
