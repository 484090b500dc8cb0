//! End-to-end session flow over a mock serial link.
//!
//! Drives the real reader/writer/control threads: the operator console side
//! is played by injecting JSONL frames into the mock transport and parsing
//! the bytes the daemon writes back.

use marga_nav::config::AppConfig;
use marga_nav::geo::{GeoPoint, M_PER_DEG_LAT};
use marga_nav::protocol::{Frame, NavSession};
use marga_nav::shared::{RateHandle, SharedRate};
use marga_nav::threads::spawn_threads;
use marga_nav::transport::{encode_line, MockTransport, OutboundQueue};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Geographic point whose planar projection (origin at lat/lon 0) is (x, y) meters.
fn geo_at(x: f64, y: f64) -> GeoPoint {
    GeoPoint::new(y / M_PER_DEG_LAT, x / M_PER_DEG_LAT)
}

fn inject(mock: &MockTransport, frame: &Frame) {
    mock.inject_read(&encode_line(frame).unwrap());
}

fn written_frames(mock: &MockTransport) -> Vec<Frame> {
    let bytes = mock.get_written();
    bytes
        .split(|&b| b == b'\n')
        .filter(|line| !line.is_empty())
        .filter_map(|line| serde_json::from_slice::<Frame>(line).ok())
        .collect()
}

#[test]
fn full_mission_over_mock_link() {
    let mock = MockTransport::new();

    // Fast link and fast vehicle so the mission completes in test time
    let mut config = AppConfig::default();
    config.link.bytes_per_sec = 1_000_000.0;
    config.link.chunk_delay_ms = 0;
    config.link.outbound_capacity = 256;
    config.mission.speed_ms = 40.0;
    config.mission.obstacle_buffer_m = 5.0;

    let outbound = Arc::new(OutboundQueue::new(config.link.outbound_capacity));
    let rate: SharedRate = Arc::new(RateHandle::new(config.telemetry.rate_hz));
    let session = NavSession::new(config.clone(), Arc::clone(&outbound), Arc::clone(&rate));

    let running = Arc::new(AtomicBool::new(true));
    let handles = spawn_threads(
        Box::new(mock.clone()),
        session,
        Arc::clone(&outbound),
        Arc::clone(&rate),
        config.link.clone(),
        Arc::clone(&running),
    )
    .expect("threads must spawn");

    inject(
        &mock,
        &Frame::Hello {
            role: Some("client".to_string()),
            app: Some("MineFinder".to_string()),
            version: Some(1),
        },
    );
    inject(
        &mock,
        &Frame::SelectController {
            id: "grid_astar".to_string(),
        },
    );
    inject(
        &mock,
        &Frame::Configure {
            origin_gps: Some(GeoPoint::new(0.0, 0.0)),
            metres_per_cm: None,
            simulate: Some(true),
            simulated_speed_ms: Some(40.0),
            mine_buffer_m: Some(5.0),
            telemetry_hz: Some(50.0),
        },
    );
    inject(
        &mock,
        &Frame::SimMines {
            mines_gps: vec![marga_nav::protocol::HazardSpec {
                lat: 0.0,
                lon: 0.0,
                radius_m: None,
            }],
        },
    );
    inject(
        &mock,
        &Frame::MissionStart {
            start_gps: geo_at(-20.0, 0.0),
            goal_gps: geo_at(20.0, 0.0),
        },
    );

    // Wait for the mission to finish (nav_done on the wire)
    let deadline = Instant::now() + Duration::from_secs(30);
    let mut frames = Vec::new();
    while Instant::now() < deadline {
        frames = written_frames(&mock);
        if frames.iter().any(|f| matches!(f, Frame::NavDone)) {
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }

    running.store(false, Ordering::Relaxed);
    let _ = handles.reader.join();
    let _ = handles.writer.join();
    let _ = handles.control.join();

    assert!(
        frames
            .iter()
            .any(|f| matches!(f, Frame::Identify { server, .. } if server == "MargaNav")),
        "hello must be answered with identify"
    );
    assert!(frames
        .iter()
        .any(|f| matches!(f, Frame::ControllerSelected { id } if id == "grid_astar")));
    assert!(frames
        .iter()
        .any(|f| matches!(f, Frame::Configured { ok: true })));
    assert!(frames
        .iter()
        .any(|f| matches!(f, Frame::PathUpdate { reason, .. } if reason == "initial")));
    assert!(
        frames
            .iter()
            .any(|f| matches!(f, Frame::MineDetected { .. })),
        "hidden hazard must be detected and reported"
    );
    assert!(
        frames
            .iter()
            .any(|f| matches!(f, Frame::PathUpdate { reason, .. } if reason == "replan")),
        "detection must produce a replanned route"
    );
    assert!(frames.iter().any(|f| matches!(f, Frame::Telemetry { .. })));
    assert!(frames.iter().any(|f| matches!(f, Frame::NavDone)));

    // The telemetry stream must report positions, not noise
    let last_telemetry = frames
        .iter()
        .rev()
        .find_map(|f| match f {
            Frame::Telemetry { pos_gps, .. } => Some(*pos_gps),
            _ => None,
        })
        .expect("telemetry frames present");
    assert!(last_telemetry.lat.abs() < 1.0 && last_telemetry.lon.abs() < 1.0);
}
