//! Frame types for the serial JSONL protocol.
//!
//! One frame per line in both directions, tagged by `"type"`. The operator
//! console speaks the client side (hello, configure, mission control, scan
//! results); the vehicle speaks the server side (identification, path
//! updates, telemetry, detections, status).

use crate::geo::GeoPoint;
use serde::{Deserialize, Serialize};

/// Planner backend advertised in the identification frame
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ControllerInfo {
    pub id: String,
    pub name: String,
    pub capabilities: Vec<String>,
}

/// Ground-truth hazard position supplied by the console for simulation
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct HazardSpec {
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius_m: Option<f64>,
}

impl HazardSpec {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

/// One protocol message. The unit of the wire format: one frame per line.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    // ---- client → server ----
    Hello {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        app: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<u32>,
    },
    SelectController {
        id: String,
    },
    Configure {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        origin_gps: Option<GeoPoint>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metres_per_cm: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        simulate: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        simulated_speed_ms: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mine_buffer_m: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        telemetry_hz: Option<f64>,
    },
    SimMines {
        mines_gps: Vec<HazardSpec>,
    },
    MissionStart {
        start_gps: GeoPoint,
        goal_gps: GeoPoint,
    },
    MissionStop,
    ScanResult {
        at_gps: GeoPoint,
        mine: bool,
    },

    // ---- server → client ----
    Identify {
        version: u32,
        server: String,
        controllers: Vec<ControllerInfo>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selected_controller: Option<String>,
    },
    ControllerSelected {
        id: String,
    },
    Configured {
        ok: bool,
    },
    PathUpdate {
        waypoints_gps: Vec<GeoPoint>,
        reason: String,
    },
    Move {
        to_gps: GeoPoint,
    },
    RequestScan {
        at_gps: GeoPoint,
    },
    Telemetry {
        pos_gps: GeoPoint,
        path_travelled_gps: Vec<GeoPoint>,
        speed_ms: f64,
        ts: f64,
    },
    NavDone,
    Status {
        message: String,
    },
    Error {
        message: String,
    },
    Toast {
        message: String,
        duration: f64,
    },

    // ---- both directions ----
    /// Inbound: external detection injection. Outbound: a hazard the vehicle
    /// discovered itself.
    MineDetected {
        at_gps: GeoPoint,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        distance_m: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence: Option<f64>,
    },
}

impl Frame {
    /// Wire tag of this frame, for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Frame::Hello { .. } => "hello",
            Frame::SelectController { .. } => "select_controller",
            Frame::Configure { .. } => "configure",
            Frame::SimMines { .. } => "sim_mines",
            Frame::MissionStart { .. } => "mission_start",
            Frame::MissionStop => "mission_stop",
            Frame::ScanResult { .. } => "scan_result",
            Frame::Identify { .. } => "identify",
            Frame::ControllerSelected { .. } => "controller_selected",
            Frame::Configured { .. } => "configured",
            Frame::PathUpdate { .. } => "path_update",
            Frame::Move { .. } => "move",
            Frame::RequestScan { .. } => "request_scan",
            Frame::Telemetry { .. } => "telemetry",
            Frame::NavDone => "nav_done",
            Frame::Status { .. } => "status",
            Frame::Error { .. } => "error",
            Frame::Toast { .. } => "toast",
            Frame::MineDetected { .. } => "mine_detected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_names_on_wire() {
        let json = serde_json::to_string(&Frame::NavDone).unwrap();
        assert_eq!(json, r#"{"type":"nav_done"}"#);

        let json = serde_json::to_string(&Frame::SelectController {
            id: "grid_astar".to_string(),
        })
        .unwrap();
        assert!(json.contains(r#""type":"select_controller""#));
    }

    #[test]
    fn test_configure_partial_fields() {
        let frame: Frame =
            serde_json::from_str(r#"{"type":"configure","telemetry_hz":2.0,"simulate":true}"#)
                .unwrap();
        match frame {
            Frame::Configure {
                telemetry_hz,
                simulate,
                origin_gps,
                ..
            } => {
                assert_eq!(telemetry_hz, Some(2.0));
                assert_eq!(simulate, Some(true));
                assert!(origin_gps.is_none());
            }
            other => panic!("wrong frame: {:?}", other),
        }
    }

    #[test]
    fn test_mission_start_geo_fields() {
        let frame: Frame = serde_json::from_str(
            r#"{"type":"mission_start","start_gps":{"lat":47.1,"lon":8.2},"goal_gps":{"lat":47.2,"lon":8.3}}"#,
        )
        .unwrap();
        match frame {
            Frame::MissionStart { start_gps, goal_gps } => {
                assert_eq!(start_gps.lat, 47.1);
                assert_eq!(goal_gps.lon, 8.3);
            }
            other => panic!("wrong frame: {:?}", other),
        }
    }

    #[test]
    fn test_sim_mines_optional_radius() {
        let frame: Frame = serde_json::from_str(
            r#"{"type":"sim_mines","mines_gps":[{"lat":1.0,"lon":2.0},{"lat":3.0,"lon":4.0,"radius_m":7.5}]}"#,
        )
        .unwrap();
        match frame {
            Frame::SimMines { mines_gps } => {
                assert_eq!(mines_gps.len(), 2);
                assert_eq!(mines_gps[0].radius_m, None);
                assert_eq!(mines_gps[1].radius_m, Some(7.5));
            }
            other => panic!("wrong frame: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_fails_parse() {
        assert!(serde_json::from_str::<Frame>(r#"{"type":"warp_drive"}"#).is_err());
    }
}
