//! Writer thread: paced, congestion-aware draining of the outbound queue.
//!
//! Frames are written in bounded-size chunks so one long line cannot block
//! the link; a token bucket holds the aggregate rate to the configured byte
//! budget, and a fixed inter-chunk delay smooths the remaining bursts.
//! Write failures feed the congestion controller, which cuts the telemetry
//! rate under sustained trouble and restores it when the link is quiet.

use crate::config::LinkConfig;
use crate::shared::SharedRate;
use crate::transport::{encode_line, CongestionControl, OutboundQueue, TokenBucket, Transport};
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// How long one idle pass waits for work.
const POP_TIMEOUT: Duration = Duration::from_millis(50);

pub struct WriterThread {
    transport: Box<dyn Transport>,
    outbound: Arc<OutboundQueue>,
    rate: SharedRate,
    bucket: TokenBucket,
    congestion: CongestionControl,
    chunk_bytes: usize,
    chunk_delay: Duration,
    running: Arc<AtomicBool>,
}

impl WriterThread {
    pub fn new(
        transport: Box<dyn Transport>,
        outbound: Arc<OutboundQueue>,
        rate: SharedRate,
        link: &LinkConfig,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            transport,
            outbound,
            rate,
            // One second of budget as burst headroom
            bucket: TokenBucket::new(link.bytes_per_sec, link.bytes_per_sec, Instant::now()),
            congestion: CongestionControl::new(),
            chunk_bytes: link.chunk_bytes.max(8),
            chunk_delay: Duration::from_millis(link.chunk_delay_ms),
            running,
        }
    }

    pub fn run(mut self) {
        while self.running.load(Ordering::Relaxed) {
            match self.outbound.pop_timeout(POP_TIMEOUT) {
                Some(frame) => {
                    let line = match encode_line(&frame) {
                        Ok(line) => line,
                        Err(e) => {
                            warn!("failed to encode {}: {}", frame.type_name(), e);
                            continue;
                        }
                    };
                    self.write_line(&line);
                }
                None => {
                    // Idle pass: a quiet link earns its rate back
                    let now = Instant::now();
                    if let Some(hz) =
                        self.congestion
                            .try_recover(self.rate.current_hz(), self.rate.target_hz(), now)
                    {
                        self.rate.set_current_hz(hz);
                        info!("telemetry rate restored to {:.1} Hz", hz);
                    }
                }
            }
        }
    }

    fn write_line(&mut self, line: &[u8]) {
        for chunk in line.chunks(self.chunk_bytes) {
            let wait = self.bucket.consume(chunk.len(), Instant::now());
            if !wait.is_zero() {
                thread::sleep(wait);
            }

            if let Err(e) = self.transport.write(chunk) {
                warn!("serial write failed: {}", e);
                let now = Instant::now();
                if let Some(hz) = self.congestion.record_timeout(self.rate.current_hz(), now) {
                    self.rate.set_current_hz(hz);
                    warn!("link congested, telemetry rate cut to {:.1} Hz", hz);
                }
            }

            thread::sleep(self.chunk_delay);
        }
        let _ = self.transport.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use crate::protocol::Frame;
    use crate::shared::RateHandle;
    use crate::transport::MockTransport;

    fn writer(mock: &MockTransport, rate: &SharedRate, chunk_bytes: usize) -> WriterThread {
        let link = LinkConfig {
            bytes_per_sec: 100_000.0, // effectively unpaced for tests
            chunk_bytes,
            chunk_delay_ms: 0,
            ..Default::default()
        };
        WriterThread::new(
            Box::new(mock.clone()),
            Arc::new(OutboundQueue::new(8)),
            Arc::clone(rate),
            &link,
            Arc::new(AtomicBool::new(true)),
        )
    }

    #[test]
    fn test_line_written_in_chunks() {
        let mock = MockTransport::new();
        let rate: SharedRate = Arc::new(RateHandle::new(5.0));
        let mut w = writer(&mock, &rate, 16);

        let line = encode_line(&Frame::Telemetry {
            pos_gps: GeoPoint::new(1.0, 2.0),
            path_travelled_gps: vec![GeoPoint::new(1.0, 2.0)],
            speed_ms: 1.5,
            ts: 12.0,
        })
        .unwrap();
        w.write_line(&line);

        let written = mock.get_written();
        assert_eq!(written, line, "chunked writes must reassemble to the line");
        assert_eq!(*written.last().unwrap(), b'\n');
    }

    #[test]
    fn test_write_failures_cut_rate() {
        let mock = MockTransport::new();
        let rate: SharedRate = Arc::new(RateHandle::new(5.0));
        // Wide chunks so each line is exactly one write
        let mut w = writer(&mock, &rate, 64);
        mock.set_fail_writes(true);

        // Three failed writes inside the window must halve the telemetry rate
        let line = encode_line(&Frame::NavDone).unwrap();
        w.write_line(&line);
        w.write_line(&line);
        w.write_line(&line);

        assert_eq!(rate.current_hz(), 2.5);
        assert_eq!(rate.target_hz(), 5.0);
    }
}
