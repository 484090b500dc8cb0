//! Path planning backends.
//!
//! Two interchangeable planners implement the same contract: a discrete A*
//! over a rasterized obstacle grid, and a continuous single-waypoint detour
//! planner for large, sparsely obstructed areas. The mission controller is
//! agnostic to which one is active.

use crate::geo::PlanarPoint;
use std::fmt;

mod detour;
mod grid;

pub use detour::DetourPlanner;
pub use grid::{CellCoord, GridPlanner, GridPlannerConfig, Neighborhood, ObstacleGrid};

/// A registered hazard with its effective exclusion radius.
///
/// The radius already includes any safety buffer. Once registered into a
/// mission, an obstacle is never removed.
#[derive(Clone, Copy, Debug)]
pub struct Obstacle {
    pub center: PlanarPoint,
    pub radius: f64,
}

impl Obstacle {
    pub fn new(center: PlanarPoint, radius: f64) -> Self {
        Self { center, radius }
    }

    /// Whether a point lies at a safe distance from this obstacle.
    #[inline]
    pub fn clears(&self, point: &PlanarPoint) -> bool {
        self.center.distance(point) >= self.radius
    }
}

/// A planned route: ordered waypoints from start to goal.
#[derive(Clone, Debug)]
pub struct PlannedPath {
    pub waypoints: Vec<PlanarPoint>,
    pub length_m: f64,
}

impl PlannedPath {
    pub fn from_waypoints(waypoints: Vec<PlanarPoint>) -> Self {
        let length_m = waypoints
            .windows(2)
            .map(|w| w[0].distance(&w[1]))
            .sum();
        Self {
            waypoints,
            length_m,
        }
    }
}

/// Expected negative outcome of a planning attempt.
///
/// "No path" is an ordinary result the caller must handle, never an error
/// that can escape the control loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanFailure {
    /// Start cell is blocked and no free cell was found nearby
    StartBlocked,
    /// Goal cell is blocked and no free cell was found nearby
    GoalBlocked,
    /// Start and goal lie in disconnected free regions
    NoRoute,
    /// Search expansion cap reached before the goal
    SearchExhausted,
}

impl fmt::Display for PlanFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanFailure::StartBlocked => write!(f, "start position blocked"),
            PlanFailure::GoalBlocked => write!(f, "goal position blocked"),
            PlanFailure::NoRoute => write!(f, "no path found"),
            PlanFailure::SearchExhausted => write!(f, "search exhausted before reaching goal"),
        }
    }
}

/// Planning result
pub type PlanResult = std::result::Result<PlannedPath, PlanFailure>;

/// Contract shared by all planner backends.
///
/// Backends accumulate obstacles for the active mission only; `reset` clears
/// them when a new mission starts. Obstacles are never shared across
/// missions.
pub trait PlannerBackend: Send {
    /// Stable identifier used by `select_controller`
    fn id(&self) -> &'static str;

    /// Human-readable name for the identification frame
    fn name(&self) -> &'static str;

    /// Capability tags advertised to the operator console
    fn capabilities(&self) -> &'static [&'static str];

    /// Make an obstacle known to this backend. Obstacles outside the
    /// backend's working area are ignored, not errors.
    fn register_obstacle(&mut self, obstacle: &Obstacle);

    /// Plan a route from start to goal around all registered obstacles.
    fn plan(&mut self, start: PlanarPoint, goal: PlanarPoint) -> PlanResult;

    /// Forget all registered obstacles (new mission).
    fn reset(&mut self);
}
