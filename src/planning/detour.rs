//! Continuous circle-obstacle detour planner.
//!
//! For large open areas, rasterizing a grid is wasteful. This planner keeps
//! obstacles as circles and reacts to the single nearest blocking obstacle
//! with a one-waypoint perpendicular detour, trading optimality for O(1)
//! cost per call. Dense overlapping obstacle fields are a known limitation:
//! the unconditional fallback path is not guaranteed collision-free and is
//! caught by the mission controller's detection loop instead.

use super::{Obstacle, PlanResult, PlannedPath, PlannerBackend};
use crate::geo::PlanarPoint;
use log::debug;

/// Whether the segment a->b intersects the circle at `center` with `radius`.
///
/// Standard quadratic-root test: solutions of |a + t(b-a) - center| = radius
/// with t in [0, 1].
pub fn segment_intersects_circle(
    a: PlanarPoint,
    b: PlanarPoint,
    center: PlanarPoint,
    radius: f64,
) -> bool {
    let d = b - a;
    let f = a - center;
    let qa = d.dot(&d);
    if qa <= 1e-12 {
        // Degenerate segment: point-in-circle test
        return f.length() <= radius;
    }
    let qb = 2.0 * f.dot(&d);
    let qc = f.dot(&f) - radius * radius;
    let disc = qb * qb - 4.0 * qa * qc;
    if disc < 0.0 {
        return false;
    }
    let disc = disc.sqrt();
    let t1 = (-qb - disc) / (2.0 * qa);
    let t2 = (-qb + disc) / (2.0 * qa);
    (0.0..=1.0).contains(&t1) || (0.0..=1.0).contains(&t2)
}

/// Single-waypoint detour planner over circular obstacles.
pub struct DetourPlanner {
    obstacles: Vec<Obstacle>,
    /// Safe corridor width; detour waypoints clear the obstacle by half of it
    path_width_m: f64,
}

impl DetourPlanner {
    pub fn new(path_width_m: f64) -> Self {
        Self {
            obstacles: Vec::new(),
            path_width_m,
        }
    }

    fn segment_blocked(&self, a: PlanarPoint, b: PlanarPoint) -> bool {
        self.obstacles
            .iter()
            .any(|o| segment_intersects_circle(a, b, o.center, o.radius))
    }

    /// The intersecting obstacle nearest to `a` by straight-line distance to
    /// its center.
    fn nearest_blocking(&self, a: PlanarPoint, b: PlanarPoint) -> Option<Obstacle> {
        self.obstacles
            .iter()
            .filter(|o| segment_intersects_circle(a, b, o.center, o.radius))
            .min_by(|x, y| {
                x.center
                    .distance(&a)
                    .partial_cmp(&y.center.distance(&a))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .copied()
    }

    /// Waypoint offset perpendicular to the start->goal direction, on the
    /// given side of the obstacle center.
    fn detour_waypoint(
        &self,
        a: PlanarPoint,
        b: PlanarPoint,
        obstacle: &Obstacle,
        side: f64,
    ) -> PlanarPoint {
        let dir = (b - a).normalize();
        let perp = dir.perpendicular();
        let offset = obstacle.radius + self.path_width_m * 0.5;
        obstacle.center + perp * (offset * side)
    }
}

impl PlannerBackend for DetourPlanner {
    fn id(&self) -> &'static str {
        "detour"
    }

    fn name(&self) -> &'static str {
        "Circle Detour"
    }

    fn capabilities(&self) -> &'static [&'static str] {
        &["detour", "telemetry", "simulation"]
    }

    fn register_obstacle(&mut self, obstacle: &Obstacle) {
        self.obstacles.push(*obstacle);
    }

    fn plan(&mut self, start: PlanarPoint, goal: PlanarPoint) -> PlanResult {
        if !self.segment_blocked(start, goal) {
            return Ok(PlannedPath::from_waypoints(vec![start, goal]));
        }

        let Some(obstacle) = self.nearest_blocking(start, goal) else {
            // Unreachable given the blocked check, but stay total
            return Ok(PlannedPath::from_waypoints(vec![start, goal]));
        };

        let left = self.detour_waypoint(start, goal, &obstacle, 1.0);
        let right = self.detour_waypoint(start, goal, &obstacle, -1.0);

        let mut candidates: Vec<PlannedPath> = [left, right]
            .into_iter()
            .filter(|&w| !self.segment_blocked(start, w) && !self.segment_blocked(w, goal))
            .map(|w| PlannedPath::from_waypoints(vec![start, w, goal]))
            .collect();

        if candidates.is_empty() {
            // Overlapping obstacles can rule out both sides. Fall back to one
            // side unconditionally; the post-hoc detection loop catches any
            // residual intersection.
            debug!(
                "[Detour] no clear single detour around ({:.1},{:.1}), falling back",
                obstacle.center.x, obstacle.center.y
            );
            return Ok(PlannedPath::from_waypoints(vec![start, left, goal]));
        }

        candidates.sort_by(|a, b| {
            a.length_m
                .partial_cmp(&b.length_m)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(candidates.swap_remove(0))
    }

    fn reset(&mut self) {
        self.obstacles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_path_when_clear() {
        let mut p = DetourPlanner::new(5.0);
        p.register_obstacle(&Obstacle::new(PlanarPoint::new(50.0, 40.0), 10.0));

        let path = p
            .plan(PlanarPoint::new(0.0, 0.0), PlanarPoint::new(100.0, 0.0))
            .unwrap();
        assert_eq!(path.waypoints.len(), 2);
        assert!((path.length_m - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_detour_clears_obstacle() {
        let mut p = DetourPlanner::new(5.0);
        let obstacle = Obstacle::new(PlanarPoint::new(50.0, 0.0), 10.0);
        p.register_obstacle(&obstacle);

        let start = PlanarPoint::new(0.0, 0.0);
        let goal = PlanarPoint::new(100.0, 0.0);
        let path = p.plan(start, goal).unwrap();

        // Straight path is blocked, so the result must be a 3-point detour
        assert_eq!(path.waypoints.len(), 3);
        let w = path.waypoints[1];
        assert!((w.distance(&obstacle.center) - 12.5).abs() < 1e-6);
        assert!(!segment_intersects_circle(start, w, obstacle.center, 10.0));
        assert!(!segment_intersects_circle(w, goal, obstacle.center, 10.0));
    }

    #[test]
    fn test_shorter_side_preferred() {
        let mut p = DetourPlanner::new(5.0);
        // Obstacle slightly north of the line: the southern detour is shorter
        p.register_obstacle(&Obstacle::new(PlanarPoint::new(50.0, 3.0), 10.0));

        let path = p
            .plan(PlanarPoint::new(0.0, 0.0), PlanarPoint::new(100.0, 0.0))
            .unwrap();
        assert_eq!(path.waypoints.len(), 3);
        assert!(path.waypoints[1].y < 0.0, "detour should pass on the south side");
    }

    #[test]
    fn test_overlapping_obstacles_fall_back() {
        let mut p = DetourPlanner::new(5.0);
        // Wall of overlapping circles across both detour sides
        for y in [-20.0, -10.0, 0.0, 10.0, 20.0] {
            p.register_obstacle(&Obstacle::new(PlanarPoint::new(50.0, y), 8.0));
        }

        let path = p
            .plan(PlanarPoint::new(0.0, 0.0), PlanarPoint::new(100.0, 0.0))
            .unwrap();
        // Fallback still produces a 3-point path rather than failing
        assert_eq!(path.waypoints.len(), 3);
    }

    #[test]
    fn test_segment_circle_tangent_cases() {
        let c = PlanarPoint::new(0.0, 5.0);
        // Segment passing below a circle of radius 4: no intersection
        assert!(!segment_intersects_circle(
            PlanarPoint::new(-10.0, 0.0),
            PlanarPoint::new(10.0, 0.0),
            c,
            4.0
        ));
        // Radius 5 grazes the segment
        assert!(segment_intersects_circle(
            PlanarPoint::new(-10.0, 0.0),
            PlanarPoint::new(10.0, 0.0),
            c,
            5.0
        ));
        // Segment ending before the circle does not intersect
        assert!(!segment_intersects_circle(
            PlanarPoint::new(-10.0, 0.0),
            PlanarPoint::new(-6.0, 0.0),
            PlanarPoint::new(0.0, 0.0),
            4.0
        ));
    }
}
