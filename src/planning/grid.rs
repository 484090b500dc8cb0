//! Discrete A* planner over a rasterized obstacle grid.
//!
//! The grid starts all-free and is only ever marked: registering an obstacle
//! blocks every cell whose center lies within the obstacle radius, and
//! blocked cells never become free again. Search is capped so a pathological
//! query degrades into an explicit failure instead of stalling the control
//! loop.

use super::{Obstacle, PlanFailure, PlanResult, PlannedPath, PlannerBackend};
use crate::geo::PlanarPoint;
use log::{debug, trace};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Integer grid cell indices
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct CellCoord {
    pub col: i32,
    pub row: i32,
}

impl CellCoord {
    #[inline]
    pub fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    /// The 4 cardinal neighbors (N, E, S, W)
    #[inline]
    pub fn neighbors_4(&self) -> [CellCoord; 4] {
        [
            CellCoord::new(self.col, self.row + 1),
            CellCoord::new(self.col + 1, self.row),
            CellCoord::new(self.col, self.row - 1),
            CellCoord::new(self.col - 1, self.row),
        ]
    }

    /// The 8 neighbors, cardinals first so diagonal cost assignment can key
    /// off the index
    #[inline]
    pub fn neighbors_8(&self) -> [CellCoord; 8] {
        [
            CellCoord::new(self.col, self.row + 1),
            CellCoord::new(self.col + 1, self.row),
            CellCoord::new(self.col, self.row - 1),
            CellCoord::new(self.col - 1, self.row),
            CellCoord::new(self.col + 1, self.row + 1),
            CellCoord::new(self.col + 1, self.row - 1),
            CellCoord::new(self.col - 1, self.row - 1),
            CellCoord::new(self.col - 1, self.row + 1),
        ]
    }
}

/// Blocked/free cell grid with additive obstacle rasterization.
#[derive(Clone, Debug)]
pub struct ObstacleGrid {
    width_cells: usize,
    height_cells: usize,
    resolution_m: f64,
    offset: PlanarPoint,
    blocked: Vec<bool>,
}

impl ObstacleGrid {
    /// Allocate an all-free grid covering `width_m` x `height_m`, with cell
    /// (0,0) anchored at `offset`.
    pub fn new(width_m: f64, height_m: f64, resolution_m: f64, offset: PlanarPoint) -> Self {
        let width_cells = (width_m / resolution_m).ceil().max(1.0) as usize;
        let height_cells = (height_m / resolution_m).ceil().max(1.0) as usize;
        Self {
            width_cells,
            height_cells,
            resolution_m,
            offset,
            blocked: vec![false; width_cells * height_cells],
        }
    }

    pub fn width_cells(&self) -> usize {
        self.width_cells
    }

    pub fn height_cells(&self) -> usize {
        self.height_cells
    }

    pub fn total_cells(&self) -> usize {
        self.width_cells * self.height_cells
    }

    pub fn resolution_m(&self) -> f64 {
        self.resolution_m
    }

    #[inline]
    pub fn in_bounds(&self, cell: CellCoord) -> bool {
        cell.col >= 0
            && cell.row >= 0
            && (cell.col as usize) < self.width_cells
            && (cell.row as usize) < self.height_cells
    }

    /// Out-of-bounds cells count as blocked.
    #[inline]
    pub fn is_blocked(&self, cell: CellCoord) -> bool {
        if !self.in_bounds(cell) {
            return true;
        }
        self.blocked[cell.row as usize * self.width_cells + cell.col as usize]
    }

    #[inline]
    pub fn to_cell(&self, point: PlanarPoint) -> CellCoord {
        CellCoord::new(
            ((point.x - self.offset.x) / self.resolution_m).floor() as i32,
            ((point.y - self.offset.y) / self.resolution_m).floor() as i32,
        )
    }

    /// Planar coordinates of a cell center.
    #[inline]
    pub fn cell_center(&self, cell: CellCoord) -> PlanarPoint {
        PlanarPoint::new(
            self.offset.x + (cell.col as f64 + 0.5) * self.resolution_m,
            self.offset.y + (cell.row as f64 + 0.5) * self.resolution_m,
        )
    }

    /// Block every cell whose center lies within `radius` of `center`.
    /// Obstacles centered outside the grid are ignored.
    pub fn register(&mut self, center: PlanarPoint, radius: f64) {
        let center_cell = self.to_cell(center);
        if !self.in_bounds(center_cell) {
            debug!(
                "[Grid] obstacle at ({:.1},{:.1}) outside grid, ignored",
                center.x, center.y
            );
            return;
        }

        let radius_cells = (radius / self.resolution_m).ceil() as i32 + 1;
        let mut blocked_count = 0usize;
        for drow in -radius_cells..=radius_cells {
            for dcol in -radius_cells..=radius_cells {
                let cell = CellCoord::new(center_cell.col + dcol, center_cell.row + drow);
                if !self.in_bounds(cell) {
                    continue;
                }
                if self.cell_center(cell).distance(&center) <= radius {
                    self.blocked[cell.row as usize * self.width_cells + cell.col as usize] = true;
                    blocked_count += 1;
                }
            }
        }
        trace!(
            "[Grid] obstacle at ({:.1},{:.1}) r={:.1} blocked {} cells",
            center.x,
            center.y,
            radius,
            blocked_count
        );
    }

    /// Clear all markings (fresh mission).
    pub fn clear(&mut self) {
        self.blocked.iter_mut().for_each(|c| *c = false);
    }
}

/// Connectivity of the A* search
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Neighborhood {
    /// Cardinal moves only, uniform cost 1.0
    Four,
    /// Cardinals plus diagonals, diagonal cost sqrt(2)
    Eight,
}

/// Grid planner configuration
#[derive(Clone, Debug)]
pub struct GridPlannerConfig {
    pub neighborhood: Neighborhood,
    /// Node expansion cap; effective cap is min(total cells, this)
    pub max_expansions: usize,
    /// Ring bound for substituting a blocked start/goal with a nearby free cell
    pub substitute_ring: i32,
}

impl Default for GridPlannerConfig {
    fn default() -> Self {
        Self {
            neighborhood: Neighborhood::Eight,
            max_expansions: 100_000,
            substitute_ring: 3,
        }
    }
}

impl GridPlannerConfig {
    /// The 4-connected, uniform-cost variant used by small pre-rasterized
    /// boards.
    pub fn four_connected() -> Self {
        Self {
            neighborhood: Neighborhood::Four,
            ..Default::default()
        }
    }
}

/// Node in the open set, ordered by f-cost (min-heap via reversed compare).
#[derive(Clone, Debug)]
struct SearchNode {
    cell: CellCoord,
    g_cost: f64,
    f_cost: f64,
}

impl Eq for SearchNode {}

impl PartialEq for SearchNode {
    fn eq(&self, other: &Self) -> bool {
        self.cell == other.cell
    }
}

impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f_cost
            .partial_cmp(&self.f_cost)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A* planner over an [`ObstacleGrid`].
pub struct GridPlanner {
    grid: ObstacleGrid,
    config: GridPlannerConfig,
}

impl GridPlanner {
    pub fn new(grid: ObstacleGrid, config: GridPlannerConfig) -> Self {
        Self { grid, config }
    }

    pub fn grid(&self) -> &ObstacleGrid {
        &self.grid
    }

    /// Euclidean distance heuristic; admissible for both neighborhoods.
    #[inline]
    fn heuristic(from: CellCoord, to: CellCoord) -> f64 {
        let dx = (to.col - from.col) as f64;
        let dy = (to.row - from.row) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    /// Substitute a blocked cell with the nearest free cell, searching
    /// expanding square rings up to the configured bound. Ring 1 is exactly
    /// the 8 immediate neighbors.
    fn find_nearest_free(&self, center: CellCoord) -> Option<CellCoord> {
        if !self.grid.is_blocked(center) {
            return Some(center);
        }
        for r in 1..=self.config.substitute_ring {
            for drow in -r..=r {
                for dcol in -r..=r {
                    if dcol.abs() != r && drow.abs() != r {
                        continue;
                    }
                    let cell = CellCoord::new(center.col + dcol, center.row + drow);
                    if !self.grid.is_blocked(cell) {
                        return Some(cell);
                    }
                }
            }
        }
        None
    }

    fn search(&self, start: CellCoord, goal: CellCoord) -> Result<Vec<CellCoord>, PlanFailure> {
        let mut open_set = BinaryHeap::new();
        let mut closed_set: HashSet<CellCoord> = HashSet::new();
        let mut came_from: HashMap<CellCoord, CellCoord> = HashMap::new();
        let mut g_scores: HashMap<CellCoord, f64> = HashMap::new();

        open_set.push(SearchNode {
            cell: start,
            g_cost: 0.0,
            f_cost: Self::heuristic(start, goal),
        });
        g_scores.insert(start, 0.0);

        let cap = self.grid.total_cells().min(self.config.max_expansions);
        let mut expanded = 0usize;

        while let Some(current) = open_set.pop() {
            expanded += 1;
            if expanded > cap {
                debug!("[GridPlanner] search exhausted after {} expansions", expanded);
                return Err(PlanFailure::SearchExhausted);
            }

            if current.cell == goal {
                return Ok(Self::reconstruct(&came_from, goal));
            }

            if closed_set.contains(&current.cell) {
                continue;
            }
            closed_set.insert(current.cell);

            let neighbors: Vec<CellCoord> = match self.config.neighborhood {
                Neighborhood::Four => current.cell.neighbors_4().to_vec(),
                Neighborhood::Eight => current.cell.neighbors_8().to_vec(),
            };

            for (i, neighbor) in neighbors.into_iter().enumerate() {
                if closed_set.contains(&neighbor) || self.grid.is_blocked(neighbor) {
                    continue;
                }

                let move_cost = if self.config.neighborhood == Neighborhood::Eight && i >= 4 {
                    std::f64::consts::SQRT_2
                } else {
                    1.0
                };

                let tentative_g = current.g_cost + move_cost;
                let known_g = g_scores.get(&neighbor).copied().unwrap_or(f64::INFINITY);
                if tentative_g < known_g {
                    came_from.insert(neighbor, current.cell);
                    g_scores.insert(neighbor, tentative_g);
                    open_set.push(SearchNode {
                        cell: neighbor,
                        g_cost: tentative_g,
                        f_cost: tentative_g + Self::heuristic(neighbor, goal),
                    });
                }
            }
        }

        debug!("[GridPlanner] no route after {} expansions", expanded);
        Err(PlanFailure::NoRoute)
    }

    fn reconstruct(came_from: &HashMap<CellCoord, CellCoord>, goal: CellCoord) -> Vec<CellCoord> {
        let mut cells = Vec::new();
        let mut current = goal;
        cells.push(current);
        while let Some(&prev) = came_from.get(&current) {
            current = prev;
            cells.push(current);
        }
        cells.reverse();
        cells
    }
}

impl PlannerBackend for GridPlanner {
    fn id(&self) -> &'static str {
        "grid_astar"
    }

    fn name(&self) -> &'static str {
        "Grid A*"
    }

    fn capabilities(&self) -> &'static [&'static str] {
        &["astar", "pathfinding", "telemetry", "simulation"]
    }

    fn register_obstacle(&mut self, obstacle: &Obstacle) {
        self.grid.register(obstacle.center, obstacle.radius);
    }

    fn plan(&mut self, start: PlanarPoint, goal: PlanarPoint) -> PlanResult {
        let start_cell = self
            .find_nearest_free(self.grid.to_cell(start))
            .ok_or(PlanFailure::StartBlocked)?;
        let goal_cell = self
            .find_nearest_free(self.grid.to_cell(goal))
            .ok_or(PlanFailure::GoalBlocked)?;

        let cells = self.search(start_cell, goal_cell)?;
        let waypoints: Vec<PlanarPoint> =
            cells.iter().map(|&c| self.grid.cell_center(c)).collect();
        trace!(
            "[GridPlanner] path with {} waypoints",
            waypoints.len()
        );
        Ok(PlannedPath::from_waypoints(waypoints))
    }

    fn reset(&mut self) {
        self.grid.clear();
    }
}
