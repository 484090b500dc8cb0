//! Planner-agnostic mission controller.
//!
//! Owns one [`MissionSession`] at a time: position, route, travelled history,
//! known obstacles, and the state machine that reacts to hazard discovery by
//! retreating to the last confirmed-safe position and replanning from there.
//! The controller never touches the transport; it emits [`MissionEvent`]s
//! through a one-way channel and the session layer turns them into frames.

use super::{MissionEvent, MissionState, PathSegment, ReplanReason, SegmentRole};
use crate::config::MissionConfig;
use crate::geo::{GeoPoint, GeoProjector, PlanarPoint};
use crate::planning::{Obstacle, PlannerBackend};
use crossbeam_channel::Sender;
use log::{debug, info, warn};
use std::collections::VecDeque;

/// Positional tolerance when matching a scan reply to the pending request.
const SCAN_MATCH_TOLERANCE_M: f64 = 0.5;

/// Obstacles closer than this to an already-known one are duplicates.
const DUPLICATE_OBSTACLE_M: f64 = 1e-3;

/// A ground-truth hazard used only by simulated detection. It becomes part of
/// the planning obstacle set only once the vehicle comes within detection
/// range of it.
#[derive(Clone, Debug)]
struct SimHazard {
    geo: GeoPoint,
    radius_m: Option<f64>,
    detected: bool,
}

/// Per-waypoint scan handshake state (non-simulated operation).
#[derive(Clone, Copy, Debug)]
enum ScanGate {
    Idle,
    Pending { at: PlanarPoint, waited_s: f64 },
    Cleared { at: PlanarPoint },
}

/// One mission's full state. Created by `start()`, mutated through
/// navigation, and replaced wholesale by the next `start()` — sessions are
/// never reused, and obstacles are never shared between them.
#[derive(Debug)]
pub struct MissionSession {
    state: MissionState,
    start: PlanarPoint,
    goal: PlanarPoint,
    position: PlanarPoint,
    /// Upcoming waypoints; the head is the next position to reach
    route: VecDeque<PlanarPoint>,
    travelled: Vec<PlanarPoint>,
    segments: Vec<PathSegment>,
    obstacles: Vec<Obstacle>,
    backtrack: VecDeque<PlanarPoint>,
    backoff_target: Option<PlanarPoint>,
    scan: ScanGate,
}

impl MissionSession {
    fn idle() -> Self {
        Self {
            state: MissionState::Idle,
            start: PlanarPoint::ZERO,
            goal: PlanarPoint::ZERO,
            position: PlanarPoint::ZERO,
            route: VecDeque::new(),
            travelled: Vec::new(),
            segments: Vec::new(),
            obstacles: Vec::new(),
            backtrack: VecDeque::new(),
            backoff_target: None,
            scan: ScanGate::Idle,
        }
    }

    fn fresh(start: PlanarPoint, goal: PlanarPoint) -> Self {
        Self {
            state: MissionState::Planning,
            start,
            goal,
            position: start,
            ..Self::idle()
        }
    }
}

pub struct MissionController {
    backend: Box<dyn PlannerBackend>,
    settings: MissionConfig,
    travel_tail: usize,
    events: Sender<MissionEvent>,
    projector: Option<GeoProjector>,
    sim_hazards: Vec<SimHazard>,
    session: MissionSession,
}

impl MissionController {
    pub fn new(
        backend: Box<dyn PlannerBackend>,
        settings: MissionConfig,
        travel_tail: usize,
        events: Sender<MissionEvent>,
    ) -> Self {
        Self {
            backend,
            settings,
            travel_tail,
            events,
            projector: None,
            sim_hazards: Vec::new(),
            session: MissionSession::idle(),
        }
    }

    pub fn state(&self) -> MissionState {
        self.session.state
    }

    pub fn backend_id(&self) -> &'static str {
        self.backend.id()
    }

    pub fn settings(&self) -> &MissionConfig {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut MissionConfig {
        &mut self.settings
    }

    pub fn set_travel_tail(&mut self, n: usize) {
        self.travel_tail = n.max(1);
    }

    /// Recorded path slices, for observability.
    pub fn segments(&self) -> &[PathSegment] {
        &self.session.segments
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.session.obstacles
    }

    pub fn travelled(&self) -> &[PlanarPoint] {
        &self.session.travelled
    }

    /// Anchor the projection origin. Replacing the origin mid-mission would
    /// shift the whole local frame, so it is refused while a mission is live.
    pub fn set_origin(&mut self, origin: GeoPoint) {
        if self.session.state.is_moving() {
            warn!("origin change ignored while a mission is active");
            return;
        }
        self.projector = Some(GeoProjector::new(origin));
    }

    /// Swap the planner backend, carrying the known obstacle set over.
    pub fn replace_backend(&mut self, mut backend: Box<dyn PlannerBackend>) {
        for obstacle in &self.session.obstacles {
            backend.register_obstacle(obstacle);
        }
        self.backend = backend;
    }

    /// Store ground-truth hazard positions for simulated detection. These are
    /// never fed to the planner directly; navigation stays reactive.
    pub fn set_sim_hazards(&mut self, hazards: Vec<(GeoPoint, Option<f64>)>) {
        self.sim_hazards = hazards
            .into_iter()
            .map(|(geo, radius_m)| SimHazard {
                geo,
                radius_m,
                detected: false,
            })
            .collect();
        self.emit(MissionEvent::Status {
            message: format!(
                "stored {} hazard positions for simulated detection",
                self.sim_hazards.len()
            ),
        });
    }

    /// Start a mission. Only valid from Idle/Complete/Stopped; the previous
    /// session is discarded, nothing carries over.
    pub fn start(&mut self, start_gps: GeoPoint, goal_gps: GeoPoint) {
        if !self.session.state.can_start() {
            self.emit(MissionEvent::Status {
                message: "mission already active; stop it first".to_string(),
            });
            return;
        }

        if self.projector.is_none() {
            self.projector = Some(GeoProjector::new(start_gps));
            debug!("projection origin anchored at mission start");
        }
        let Some(proj) = self.projector.clone() else {
            return;
        };
        let start = proj.to_planar(start_gps);
        let goal = proj.to_planar(goal_gps);

        self.backend.reset();
        for h in &mut self.sim_hazards {
            h.detected = false;
        }
        self.session = MissionSession::fresh(start, goal);

        match self.backend.plan(start, goal) {
            Ok(path) => {
                info!(
                    "mission planned: {} waypoints, {:.1}m",
                    path.waypoints.len(),
                    path.length_m
                );
                self.session.route = path.waypoints.iter().copied().collect();
                self.session.travelled = vec![start];
                self.session
                    .segments
                    .push(PathSegment::new(path.waypoints.clone(), SegmentRole::Active));
                self.emit_path_update(&path.waypoints, ReplanReason::Initial);
                self.session.state = MissionState::Navigating;
                self.emit_telemetry();
            }
            Err(failure) => {
                warn!("initial planning failed: {}", failure);
                self.emit(MissionEvent::PlanFailed {
                    message: format!("planning failed: {}", failure),
                });
                self.session.state = MissionState::Stopped;
            }
        }
    }

    /// Stop the mission from any state.
    pub fn stop(&mut self) {
        self.emit(MissionEvent::NavDone);
        self.session.state = MissionState::Stopped;
    }

    /// External hazard detection (sensing collaborator). Funnels into the
    /// same trigger as simulated proximity detection.
    pub fn inject_detection(&mut self, at_gps: GeoPoint, radius_m: Option<f64>) {
        let Some(proj) = self.projector.clone() else {
            warn!("detection ignored: no projection origin yet");
            return;
        };
        let center = proj.to_planar(at_gps);
        self.register_detection(center, radius_m, None);
    }

    /// Result of a previously requested scan.
    pub fn scan_result(&mut self, at_gps: GeoPoint, hazard: bool) {
        let Some(proj) = self.projector.clone() else {
            return;
        };
        let at = proj.to_planar(at_gps);
        let ScanGate::Pending { at: pending, .. } = self.session.scan else {
            debug!("unsolicited scan result ignored");
            return;
        };
        if pending.distance(&at) > SCAN_MATCH_TOLERANCE_M {
            debug!("scan result for a different cell ignored");
            return;
        }
        if hazard {
            self.session.scan = ScanGate::Idle;
            self.register_detection(at, None, None);
        } else {
            self.session.scan = ScanGate::Cleared { at: pending };
        }
    }

    /// Advance the mission by `dt` seconds.
    pub fn tick(&mut self, dt: f64) {
        let moving = self.session.state.is_moving();
        match self.session.state {
            MissionState::Navigating => self.tick_navigating(dt),
            MissionState::BackingOff => self.tick_backing_off(dt),
            _ => return,
        }
        // Terminal transitions emit their own final telemetry
        if moving && self.session.state.is_moving() {
            self.emit_telemetry();
        }
    }

    // ---- internals ----

    fn emit(&self, event: MissionEvent) {
        let _ = self.events.send(event);
    }

    fn to_geo(&self, pt: PlanarPoint) -> GeoPoint {
        self.projector
            .as_ref()
            .map(|p| p.to_geo(pt))
            .unwrap_or(GeoPoint::new(0.0, 0.0))
    }

    fn emit_path_update(&self, waypoints: &[PlanarPoint], reason: ReplanReason) {
        let geo: Vec<GeoPoint> = waypoints.iter().map(|&w| self.to_geo(w)).collect();
        self.emit(MissionEvent::PathUpdate {
            waypoints: geo,
            reason,
        });
    }

    fn emit_telemetry(&self) {
        let tail_start = self
            .session
            .travelled
            .len()
            .saturating_sub(self.travel_tail);
        let tail: Vec<GeoPoint> = self.session.travelled[tail_start..]
            .iter()
            .map(|&p| self.to_geo(p))
            .collect();
        self.emit(MissionEvent::Telemetry {
            position: self.to_geo(self.session.position),
            travelled_tail: tail,
            speed_ms: self.settings.speed_ms,
        });
    }

    fn tick_navigating(&mut self, dt: f64) {
        // Gate each step on a remote scan when detection is not simulated
        if !self.settings.simulate && !self.hold_for_scan(dt) {
            return;
        }

        self.advance_route(dt);

        if self.session.route.is_empty() && self.session.state == MissionState::Navigating {
            info!("goal reached");
            self.session.state = MissionState::Complete;
            self.emit_telemetry();
            self.emit(MissionEvent::NavDone);
            return;
        }

        if self.settings.simulate {
            self.check_sim_detections();
        }
    }

    /// Returns true when movement toward the next waypoint is allowed.
    fn hold_for_scan(&mut self, dt: f64) -> bool {
        let Some(&next) = self.session.route.front() else {
            return true;
        };
        match self.session.scan {
            ScanGate::Idle => {
                self.emit(MissionEvent::RequestScan {
                    at: self.to_geo(next),
                });
                self.session.scan = ScanGate::Pending {
                    at: next,
                    waited_s: 0.0,
                };
                false
            }
            ScanGate::Pending { at, waited_s } if at.distance(&next) <= SCAN_MATCH_TOLERANCE_M => {
                let waited = waited_s + dt;
                if waited >= self.settings.scan_timeout_s {
                    // Inherited fallback: a silent scan loss does not strand
                    // the vehicle, it proceeds as if the cell were safe. The
                    // warning and status frame keep it visible to operators.
                    warn!(
                        "scan timeout at ({:.1},{:.1}); proceeding as if safe",
                        at.x, at.y
                    );
                    self.emit(MissionEvent::Status {
                        message: format!(
                            "Scan timeout at ({:.1},{:.1}). Proceeding cautiously.",
                            at.x, at.y
                        ),
                    });
                    self.session.scan = ScanGate::Cleared { at };
                    true
                } else {
                    self.session.scan = ScanGate::Pending { at, waited_s: waited };
                    false
                }
            }
            ScanGate::Pending { .. } => {
                // Route changed under the pending request (replan)
                self.session.scan = ScanGate::Idle;
                false
            }
            ScanGate::Cleared { at } if at.distance(&next) <= SCAN_MATCH_TOLERANCE_M => true,
            ScanGate::Cleared { .. } => {
                self.session.scan = ScanGate::Idle;
                false
            }
        }
    }

    fn advance_route(&mut self, dt: f64) {
        let mut pos = self.session.position;
        let mut step = self.settings.speed_ms.max(0.1) * dt;

        while step > 1e-9 {
            let Some(&target) = self.session.route.front() else {
                break;
            };
            let dist = pos.distance(&target);
            if dist <= step.max(self.settings.arrival_tolerance_m) {
                pos = target;
                self.session.route.pop_front();
                self.session.travelled.push(pos);
                step -= dist;
                if !self.settings.simulate {
                    self.emit(MissionEvent::Move {
                        to: self.to_geo(target),
                    });
                    // Next cell needs its own scan before entry
                    self.session.scan = ScanGate::Idle;
                    break;
                }
            } else {
                pos = pos + (target - pos).normalize() * step;
                self.session.travelled.push(pos);
                step = 0.0;
            }
        }

        self.session.position = pos;
    }

    fn tick_backing_off(&mut self, dt: f64) {
        let mut pos = self.session.position;
        let mut step = self.settings.speed_ms.max(0.1) * dt;

        while step > 1e-9 {
            let Some(&target) = self.session.backtrack.front() else {
                break;
            };
            let dist = pos.distance(&target);
            if dist <= step.max(self.settings.arrival_tolerance_m) {
                pos = target;
                self.session.backtrack.pop_front();
                self.session.travelled.push(pos);
                step -= dist;
                if !self.settings.simulate {
                    self.emit(MissionEvent::Move {
                        to: self.to_geo(target),
                    });
                    break;
                }
            } else {
                pos = pos + (target - pos).normalize() * step;
                self.session.travelled.push(pos);
                step = 0.0;
            }
        }
        self.session.position = pos;

        // Retreat can still discover new hazards; they extend the backoff
        if self.settings.simulate {
            self.check_sim_detections();
        }

        if self.session.state == MissionState::BackingOff && self.session.backtrack.is_empty() {
            if let Some(target) = self.session.backoff_target.take() {
                debug!("reached safe position ({:.1},{:.1})", target.x, target.y);
            }
            self.replan();
        }
    }

    fn replan(&mut self) {
        let start = self.session.position;
        let goal = self.session.goal;
        self.session.state = MissionState::Replanning;
        match self.backend.plan(start, goal) {
            Ok(path) => {
                info!(
                    "replanned around {} known obstacles: {} waypoints, {:.1}m",
                    self.session.obstacles.len(),
                    path.waypoints.len(),
                    path.length_m
                );
                self.session.route = path.waypoints.iter().copied().collect();
                self.session
                    .segments
                    .push(PathSegment::new(path.waypoints.clone(), SegmentRole::Active));
                self.emit_path_update(&path.waypoints, ReplanReason::Replan);
                self.session.scan = ScanGate::Idle;
                self.session.state = MissionState::Navigating;
            }
            Err(failure) => {
                warn!("replanning failed: {}", failure);
                self.emit(MissionEvent::PlanFailed {
                    message: format!("replanning failed: {}", failure),
                });
                self.session.state = MissionState::Stopped;
            }
        }
    }

    fn check_sim_detections(&mut self) {
        let Some(proj) = self.projector.clone() else {
            return;
        };
        let pos = self.session.position;

        let mut newly: Vec<(PlanarPoint, GeoPoint, Option<f64>, f64)> = Vec::new();
        for h in &mut self.sim_hazards {
            if h.detected {
                continue;
            }
            let center = proj.to_planar(h.geo);
            let dist = pos.distance(&center);
            if dist <= self.settings.detection_range_m {
                h.detected = true;
                newly.push((center, h.geo, h.radius_m, dist));
            }
        }

        for (center, geo, radius_m, dist) in newly {
            self.emit(MissionEvent::HazardDetected {
                at: geo,
                distance_m: dist,
                confidence: 0.95,
            });
            self.register_detection(center, radius_m, Some(dist));
        }
    }

    /// Register a discovered hazard and drive the backoff/replan cycle.
    /// Duplicate positions are ignored so one obstacle produces exactly one
    /// cycle.
    fn register_detection(
        &mut self,
        center: PlanarPoint,
        radius_m: Option<f64>,
        distance_m: Option<f64>,
    ) {
        if self
            .session
            .obstacles
            .iter()
            .any(|o| o.center.distance(&center) < DUPLICATE_OBSTACLE_M)
        {
            return;
        }

        let radius = radius_m.unwrap_or(self.settings.obstacle_buffer_m);
        let obstacle = Obstacle::new(center, radius);
        self.session.obstacles.push(obstacle);
        self.backend.register_obstacle(&obstacle);
        match distance_m {
            Some(d) => info!(
                "hazard registered at ({:.1},{:.1}) r={:.1}, detected at {:.1}m",
                center.x, center.y, radius, d
            ),
            None => info!(
                "hazard registered at ({:.1},{:.1}) r={:.1}",
                center.x, center.y, radius
            ),
        }
        self.emit(MissionEvent::Status {
            message: format!(
                "hazard at ({:.1},{:.1}) registered, {} known",
                center.x,
                center.y,
                self.session.obstacles.len()
            ),
        });

        match self.session.state {
            MissionState::Navigating => self.enter_backoff(),
            MissionState::BackingOff => self.recompute_backoff(),
            _ => {}
        }
    }

    fn enter_backoff(&mut self) {
        let pos = self.session.position;
        let target = self.find_backoff_target(pos);
        let route = build_backtrack(pos, target, self.settings.backtrack_step_m);

        // The interrupted forward segment is history now
        if let Some(seg) = self
            .session
            .segments
            .iter_mut()
            .rev()
            .find(|s| s.role == SegmentRole::Active)
        {
            truncate_at_nearest(&mut seg.points, pos);
            seg.retire();
        }
        self.session
            .segments
            .push(PathSegment::new(route.clone(), SegmentRole::Backtrack));

        self.session.route.clear();
        self.session.scan = ScanGate::Idle;
        self.session.backtrack = route.into_iter().collect();
        self.session.backoff_target = Some(target);
        self.session.state = MissionState::BackingOff;
        self.emit(MissionEvent::Status {
            message: format!("backing off to ({:.1},{:.1})", target.x, target.y),
        });
    }

    /// A freshly registered obstacle during retreat may invalidate the
    /// current backoff target; rebuild from the current position.
    fn recompute_backoff(&mut self) {
        let pos = self.session.position;
        let target = self.find_backoff_target(pos);
        let route = build_backtrack(pos, target, self.settings.backtrack_step_m);
        if let Some(seg) = self.session.segments.last_mut() {
            if seg.role == SegmentRole::Backtrack {
                seg.points = route.clone();
            }
        }
        self.session.backtrack = route.into_iter().collect();
        self.session.backoff_target = Some(target);
    }

    /// Most recent travelled point at a safe distance from every known
    /// obstacle; falls back to stepping directly away from the goal
    /// direction when the whole history is tainted.
    fn find_backoff_target(&self, pos: PlanarPoint) -> PlanarPoint {
        for p in self.session.travelled.iter().rev() {
            if self.session.obstacles.iter().all(|o| o.clears(p)) {
                return *p;
            }
        }

        let mut away = (pos - self.session.goal).normalize();
        if away.length() < 0.5 {
            away = PlanarPoint::new(-1.0, 0.0);
        }
        pos + away * (self.settings.obstacle_buffer_m * 1.5)
    }
}

/// Step-wise route back toward the safe position, one axis-step at a time.
/// Retreat goes through terrain the vehicle already traversed, so the
/// forward planner is not involved.
fn build_backtrack(from: PlanarPoint, to: PlanarPoint, step_m: f64) -> Vec<PlanarPoint> {
    let step = step_m.max(0.01);
    let mut points = Vec::new();
    let mut cur = from;
    loop {
        let dx = to.x - cur.x;
        let dy = to.y - cur.y;
        if dx.abs() <= step && dy.abs() <= step {
            break;
        }
        if dx.abs() > step {
            cur.x += step * dx.signum();
        } else {
            cur.y += step * dy.signum();
        }
        points.push(cur);
    }
    points.push(to);
    points
}

/// Truncate a point list just past its closest point to `at`.
fn truncate_at_nearest(points: &mut Vec<PlanarPoint>, at: PlanarPoint) {
    if points.is_empty() {
        return;
    }
    let mut best = 0usize;
    let mut best_dist = f64::INFINITY;
    for (i, p) in points.iter().enumerate() {
        let d = p.distance(&at);
        if d < best_dist {
            best = i;
            best_dist = d;
        }
    }
    points.truncate(best + 1);
}
