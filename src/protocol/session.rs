//! Server-side session: flat dispatch of inbound frames onto the mission
//! controller, planner backend selection, and fan-out of mission events as
//! outbound frames.
//!
//! The session owns the controller; the controller never sees the session or
//! the transport. Mission events flow back through a one-way channel and are
//! translated into frames here.

use crate::config::AppConfig;
use crate::geo::{GeoPoint, PlanarPoint};
use crate::mission::{MissionController, MissionEvent};
use crate::planning::{
    DetourPlanner, GridPlanner, GridPlannerConfig, ObstacleGrid, PlannerBackend,
};
use crate::protocol::{ControllerInfo, Frame};
use crate::shared::SharedRate;
use crate::transport::OutboundQueue;
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Protocol version advertised in the identification frame.
const PROTOCOL_VERSION: u32 = 1;

/// Lowest telemetry rate the console may configure.
const MIN_TELEMETRY_HZ: f64 = 0.5;

fn epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// A selectable planner backend.
pub struct BackendDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub capabilities: &'static [&'static str],
    pub build: fn(&AppConfig) -> Box<dyn PlannerBackend>,
}

/// The two built-in backends: discrete grid A* and continuous circle detour.
pub fn default_backends() -> Vec<BackendDescriptor> {
    vec![
        BackendDescriptor {
            id: "grid_astar",
            name: "Grid A*",
            capabilities: &["astar", "pathfinding", "telemetry", "simulation"],
            build: |cfg| {
                let offset =
                    PlanarPoint::new(-cfg.grid.width_m / 2.0, -cfg.grid.height_m / 2.0);
                let grid = ObstacleGrid::new(
                    cfg.grid.width_m,
                    cfg.grid.height_m,
                    cfg.grid.resolution_m,
                    offset,
                );
                Box::new(GridPlanner::new(grid, GridPlannerConfig::default()))
            },
        },
        BackendDescriptor {
            id: "detour",
            name: "Circle Detour",
            capabilities: &["detour", "telemetry", "simulation"],
            build: |cfg| Box::new(DetourPlanner::new(cfg.mission.path_width_m)),
        },
    ]
}

pub struct NavSession {
    config: AppConfig,
    backends: Vec<BackendDescriptor>,
    controller: Option<MissionController>,
    selected: Option<&'static str>,
    origin: Option<GeoPoint>,
    events_tx: Sender<MissionEvent>,
    events_rx: Receiver<MissionEvent>,
    outbound: Arc<OutboundQueue>,
    rate: SharedRate,
}

impl NavSession {
    pub fn new(config: AppConfig, outbound: Arc<OutboundQueue>, rate: SharedRate) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            config,
            backends: default_backends(),
            controller: None,
            selected: None,
            origin: None,
            events_tx,
            events_rx,
            outbound,
            rate,
        }
    }

    fn send(&self, frame: Frame) {
        self.outbound.push(frame);
    }

    /// Dispatch one inbound frame.
    pub fn handle_frame(&mut self, frame: Frame) {
        debug!("RX {}", frame.type_name());
        match frame {
            Frame::Hello { .. } => self.handle_hello(),
            Frame::SelectController { id } => self.handle_select(&id),
            Frame::Configure {
                origin_gps,
                metres_per_cm,
                simulate,
                simulated_speed_ms,
                mine_buffer_m,
                telemetry_hz,
            } => self.handle_configure(
                origin_gps,
                metres_per_cm,
                simulate,
                simulated_speed_ms,
                mine_buffer_m,
                telemetry_hz,
            ),
            Frame::SimMines { mines_gps } => {
                let Some(controller) = self.controller.as_mut() else {
                    self.send(Frame::Error {
                        message: "no controller selected".to_string(),
                    });
                    return;
                };
                controller.set_sim_hazards(
                    mines_gps
                        .iter()
                        .map(|m| (m.position(), m.radius_m))
                        .collect(),
                );
            }
            Frame::MissionStart { start_gps, goal_gps } => {
                let Some(controller) = self.controller.as_mut() else {
                    self.send(Frame::Error {
                        message: "no controller selected".to_string(),
                    });
                    return;
                };
                controller.start(start_gps, goal_gps);
            }
            Frame::MissionStop => {
                if let Some(controller) = self.controller.as_mut() {
                    controller.stop();
                }
                self.send(Frame::Status {
                    message: "mission stopped".to_string(),
                });
            }
            Frame::MineDetected { at_gps, .. } => {
                let Some(controller) = self.controller.as_mut() else {
                    self.send(Frame::Error {
                        message: "no controller selected".to_string(),
                    });
                    return;
                };
                controller.inject_detection(at_gps, None);
            }
            Frame::ScanResult { at_gps, mine } => {
                if let Some(controller) = self.controller.as_mut() {
                    controller.scan_result(at_gps, mine);
                }
            }
            other => {
                self.send(Frame::Status {
                    message: format!("unknown type: {}", other.type_name()),
                });
            }
        }
        self.pump_events();
    }

    fn handle_hello(&mut self) {
        let controllers = self
            .backends
            .iter()
            .map(|b| ControllerInfo {
                id: b.id.to_string(),
                name: b.name.to_string(),
                capabilities: b.capabilities.iter().map(|c| c.to_string()).collect(),
            })
            .collect();
        self.send(Frame::Identify {
            version: PROTOCOL_VERSION,
            server: "MargaNav".to_string(),
            controllers,
            selected_controller: self.selected.map(|s| s.to_string()),
        });
    }

    fn handle_select(&mut self, id: &str) {
        let Some(descriptor) = self.backends.iter().find(|b| b.id == id) else {
            self.send(Frame::Error {
                message: format!("unknown controller {}", id),
            });
            return;
        };

        let backend = (descriptor.build)(&self.config);
        let mut controller = MissionController::new(
            backend,
            self.config.mission.clone(),
            self.config.telemetry.travel_tail,
            self.events_tx.clone(),
        );
        if let Some(origin) = self.origin {
            controller.set_origin(origin);
        }

        info!("controller selected: {}", descriptor.id);
        self.selected = Some(descriptor.id);
        self.controller = Some(controller);
        self.send(Frame::ControllerSelected { id: id.to_string() });
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_configure(
        &mut self,
        origin_gps: Option<GeoPoint>,
        metres_per_cm: Option<f64>,
        simulate: Option<bool>,
        simulated_speed_ms: Option<f64>,
        mine_buffer_m: Option<f64>,
        telemetry_hz: Option<f64>,
    ) {
        if let Some(origin) = origin_gps {
            self.origin = Some(origin);
        }
        if let Some(scale) = metres_per_cm {
            self.config.mission.metres_per_cm = scale;
        }
        if let Some(sim) = simulate {
            self.config.mission.simulate = sim;
        }
        if let Some(speed) = simulated_speed_ms {
            self.config.mission.speed_ms = speed;
        }
        if let Some(buffer) = mine_buffer_m {
            self.config.mission.obstacle_buffer_m = buffer;
        }
        if let Some(hz) = telemetry_hz {
            let hz = hz.max(MIN_TELEMETRY_HZ);
            self.config.telemetry.rate_hz = hz;
            self.rate.set_target_hz(hz);
        }

        if let Some(controller) = self.controller.as_mut() {
            *controller.settings_mut() = self.config.mission.clone();
            controller.set_travel_tail(self.config.telemetry.travel_tail);
            if let Some(origin) = self.origin {
                controller.set_origin(origin);
            }
            // Backend parameters may have changed with the buffer; rebuild it
            // and carry the known obstacles over
            if let Some(descriptor) = self
                .selected
                .and_then(|id| self.backends.iter().find(|b| b.id == id))
            {
                controller.replace_backend((descriptor.build)(&self.config));
            }
        }

        self.send(Frame::Configured { ok: true });
    }

    /// Advance the active mission and flush its events to the link.
    pub fn tick(&mut self, dt: f64) {
        if let Some(controller) = self.controller.as_mut() {
            controller.tick(dt);
        }
        self.pump_events();
    }

    /// Cooperative shutdown: the active mission transitions to Stopped.
    pub fn shutdown(&mut self) {
        if let Some(controller) = self.controller.as_mut() {
            controller.stop();
        }
        self.pump_events();
    }

    fn pump_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                MissionEvent::PathUpdate { waypoints, reason } => self.send(Frame::PathUpdate {
                    waypoints_gps: waypoints,
                    reason: reason.as_str().to_string(),
                }),
                MissionEvent::Telemetry {
                    position,
                    travelled_tail,
                    speed_ms,
                } => self.send(Frame::Telemetry {
                    pos_gps: position,
                    path_travelled_gps: travelled_tail,
                    speed_ms,
                    ts: epoch_secs(),
                }),
                MissionEvent::Move { to } => self.send(Frame::Move { to_gps: to }),
                MissionEvent::RequestScan { at } => self.send(Frame::RequestScan { at_gps: at }),
                MissionEvent::HazardDetected {
                    at,
                    distance_m,
                    confidence,
                } => self.send(Frame::MineDetected {
                    at_gps: at,
                    distance_m: Some(distance_m),
                    confidence: Some(confidence),
                }),
                MissionEvent::Status { message } => self.send(Frame::Status { message }),
                MissionEvent::PlanFailed { message } => {
                    self.send(Frame::Toast {
                        message,
                        duration: 2.0,
                    });
                    self.send(Frame::NavDone);
                }
                MissionEvent::NavDone => self.send(Frame::NavDone),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::M_PER_DEG_LAT;
    use crate::shared::RateHandle;
    use std::time::Duration;

    fn geo_at(x: f64, y: f64) -> GeoPoint {
        GeoPoint::new(y / M_PER_DEG_LAT, x / M_PER_DEG_LAT)
    }

    fn session() -> (NavSession, Arc<OutboundQueue>, SharedRate) {
        let outbound = Arc::new(OutboundQueue::new(256));
        let rate: SharedRate = Arc::new(RateHandle::new(5.0));
        let session = NavSession::new(AppConfig::default(), Arc::clone(&outbound), Arc::clone(&rate));
        (session, outbound, rate)
    }

    fn drain(outbound: &OutboundQueue) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(f) = outbound.pop_timeout(Duration::from_millis(0)) {
            frames.push(f);
        }
        frames
    }

    #[test]
    fn test_hello_identifies_backends() {
        let (mut s, outbound, _) = session();
        s.handle_frame(Frame::Hello {
            role: Some("client".to_string()),
            app: None,
            version: Some(1),
        });
        let frames = drain(&outbound);
        match &frames[0] {
            Frame::Identify {
                controllers,
                selected_controller,
                ..
            } => {
                let ids: Vec<&str> = controllers.iter().map(|c| c.id.as_str()).collect();
                assert!(ids.contains(&"grid_astar"));
                assert!(ids.contains(&"detour"));
                assert!(selected_controller.is_none());
            }
            other => panic!("expected identify, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_controller_is_error_without_state_change() {
        let (mut s, outbound, _) = session();
        s.handle_frame(Frame::SelectController {
            id: "warp_drive".to_string(),
        });
        let frames = drain(&outbound);
        assert!(matches!(frames[0], Frame::Error { .. }));
        assert!(s.controller.is_none());
        assert!(s.selected.is_none());
    }

    #[test]
    fn test_mission_start_without_controller_is_error() {
        let (mut s, outbound, _) = session();
        s.handle_frame(Frame::MissionStart {
            start_gps: geo_at(0.0, 0.0),
            goal_gps: geo_at(10.0, 0.0),
        });
        assert!(matches!(drain(&outbound)[0], Frame::Error { .. }));
    }

    #[test]
    fn test_configure_updates_telemetry_target() {
        let (mut s, outbound, rate) = session();
        s.handle_frame(Frame::Configure {
            origin_gps: Some(GeoPoint::new(0.0, 0.0)),
            metres_per_cm: None,
            simulate: None,
            simulated_speed_ms: Some(3.0),
            mine_buffer_m: Some(4.0),
            telemetry_hz: Some(2.0),
        });
        assert!(matches!(drain(&outbound)[0], Frame::Configured { ok: true }));
        assert_eq!(rate.target_hz(), 2.0);
        assert_eq!(rate.current_hz(), 2.0);
        assert_eq!(s.config.mission.speed_ms, 3.0);
        assert_eq!(s.config.mission.obstacle_buffer_m, 4.0);
    }

    #[test]
    fn test_full_simulated_mission_flow() {
        let (mut s, outbound, _) = session();

        s.handle_frame(Frame::SelectController {
            id: "grid_astar".to_string(),
        });
        s.handle_frame(Frame::Configure {
            origin_gps: Some(GeoPoint::new(0.0, 0.0)),
            metres_per_cm: None,
            simulate: Some(true),
            simulated_speed_ms: Some(2.0),
            mine_buffer_m: Some(5.0),
            telemetry_hz: None,
        });
        s.handle_frame(Frame::SimMines {
            mines_gps: vec![crate::protocol::HazardSpec {
                lat: 0.0,
                lon: 0.0,
                radius_m: None,
            }],
        });
        s.handle_frame(Frame::MissionStart {
            start_gps: geo_at(-20.0, 0.0),
            goal_gps: geo_at(20.0, 0.0),
        });

        let mut frames = drain(&outbound);
        for _ in 0..600 {
            s.tick(0.5);
            frames.extend(drain(&outbound));
            if frames.iter().any(|f| matches!(f, Frame::NavDone)) {
                break;
            }
        }

        let initial_path = frames
            .iter()
            .any(|f| matches!(f, Frame::PathUpdate { reason, .. } if reason == "initial"));
        let replan_path = frames
            .iter()
            .any(|f| matches!(f, Frame::PathUpdate { reason, .. } if reason == "replan"));
        let detected = frames
            .iter()
            .any(|f| matches!(f, Frame::MineDetected { .. }));
        let telemetry = frames
            .iter()
            .any(|f| matches!(f, Frame::Telemetry { .. }));
        let done = frames.iter().any(|f| matches!(f, Frame::NavDone));

        assert!(initial_path, "initial path_update missing");
        assert!(detected, "mine_detected missing");
        assert!(replan_path, "replanned path_update missing");
        assert!(telemetry, "telemetry missing");
        assert!(done, "nav_done missing");
    }

    #[test]
    fn test_inbound_server_frame_reported_unknown() {
        let (mut s, outbound, _) = session();
        s.handle_frame(Frame::NavDone);
        let frames = drain(&outbound);
        assert!(
            matches!(&frames[0], Frame::Status { message } if message.contains("unknown type"))
        );
    }
}
