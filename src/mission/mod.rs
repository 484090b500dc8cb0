//! Mission state machine types and outbound events.

use crate::geo::{GeoPoint, PlanarPoint};

mod controller;

pub use controller::{MissionController, MissionSession};

/// Lifecycle states of a mission session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MissionState {
    Idle,
    Planning,
    Navigating,
    BackingOff,
    Replanning,
    Complete,
    Stopped,
    /// Reserved for unrecoverable controller faults
    Error,
}

impl MissionState {
    /// States from which a new mission may be started.
    pub fn can_start(&self) -> bool {
        matches!(
            self,
            MissionState::Idle | MissionState::Complete | MissionState::Stopped | MissionState::Error
        )
    }

    /// Whether the vehicle is in motion (telemetry-relevant).
    pub fn is_moving(&self) -> bool {
        matches!(self, MissionState::Navigating | MissionState::BackingOff)
    }
}

/// Why a path update was emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplanReason {
    Initial,
    Replan,
}

impl ReplanReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplanReason::Initial => "initial",
            ReplanReason::Replan => "replan",
        }
    }
}

/// Role of a recorded path slice. Retiring is one-way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentRole {
    Active,
    Retired,
    Backtrack,
}

/// A labeled slice of path history, kept for observability only.
#[derive(Clone, Debug)]
pub struct PathSegment {
    pub points: Vec<PlanarPoint>,
    pub role: SegmentRole,
}

impl PathSegment {
    pub fn new(points: Vec<PlanarPoint>, role: SegmentRole) -> Self {
        Self { points, role }
    }

    /// One-way transition out of the active role.
    pub fn retire(&mut self) {
        if self.role == SegmentRole::Active {
            self.role = SegmentRole::Retired;
        }
    }
}

/// Outbound events from the mission controller.
///
/// The controller never talks to the transport directly; the session maps
/// these into wire frames. Coordinates are already geographic since the
/// controller owns the projector.
#[derive(Clone, Debug)]
pub enum MissionEvent {
    PathUpdate {
        waypoints: Vec<GeoPoint>,
        reason: ReplanReason,
    },
    Telemetry {
        position: GeoPoint,
        travelled_tail: Vec<GeoPoint>,
        speed_ms: f64,
    },
    /// Actuator-facing step command (non-simulated operation)
    Move { to: GeoPoint },
    /// Ask the remote client to scan a cell before the vehicle enters it
    RequestScan { at: GeoPoint },
    /// A hazard was discovered by proximity or scan
    HazardDetected {
        at: GeoPoint,
        distance_m: f64,
        confidence: f64,
    },
    Status { message: String },
    /// Planning failed; the mission stops
    PlanFailed { message: String },
    NavDone,
}
