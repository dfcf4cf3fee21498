#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Best-first shortest path search over the dungeon grid.
//!
//! Costs are integers: an orthogonal step costs [`ORTHOGONAL_STEP_COST`] and a
//! diagonal step [`DIAGONAL_STEP_COST`], scaled by the terrain multiplier of
//! the entered cell. Nodes with equal `f` are expanded in insertion order, so
//! identical inputs always produce the identical path.

use std::{
    cmp::Reverse,
    collections::{BTreeMap, BinaryHeap},
    fmt,
};

use delve_core::{CellCoord, Direction, MovementRule, PathfinderConfig};
use delve_world::Grid;
use thiserror::Error;

/// Cost of a single orthogonal step on neutral terrain.
pub const ORTHOGONAL_STEP_COST: u32 = 10;

/// Cost of a single diagonal step on neutral terrain.
pub const DIAGONAL_STEP_COST: u32 = 14;

/// Why a coordinate cannot take part in a search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CoordinateFault {
    /// The cell lies outside the grid.
    OutOfBounds,
    /// The cell is a wall.
    Wall,
}

impl fmt::Display for CoordinateFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds => f.write_str("outside the grid"),
            Self::Wall => f.write_str("a wall"),
        }
    }
}

/// Errors raised for malformed queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum PathError {
    /// Start or goal cannot be occupied.
    #[error("cell ({}, {}) is {reason}", cell.column(), cell.row())]
    InvalidCoordinate {
        /// Offending cell.
        cell: CellCoord,
        /// What is wrong with it.
        reason: CoordinateFault,
    },
}

/// Ordered route from start to goal, both ends included.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Path {
    cells: Vec<CellCoord>,
    cost: u32,
}

impl Path {
    /// Cells visited in order, starting with the start cell.
    #[must_use]
    pub fn cells(&self) -> &[CellCoord] {
        &self.cells
    }

    /// Number of cells on the path, both ends included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Paths always contain at least the start cell.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of moves needed to walk the path.
    #[must_use]
    pub fn steps(&self) -> u32 {
        u32::try_from(self.cells.len().saturating_sub(1)).unwrap_or(u32::MAX)
    }

    /// Total weighted cost of the path.
    #[must_use]
    pub const fn cost(&self) -> u32 {
        self.cost
    }

    /// First cell of the path.
    #[must_use]
    pub fn start(&self) -> Option<CellCoord> {
        self.cells.first().copied()
    }

    /// Last cell of the path.
    #[must_use]
    pub fn goal(&self) -> Option<CellCoord> {
        self.cells.last().copied()
    }

    /// Cell to move into next, or `None` when already at the goal.
    #[must_use]
    pub fn next_step(&self) -> Option<CellCoord> {
        self.cells.get(1).copied()
    }
}

/// Result of a well-formed search.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathOutcome {
    /// A cheapest path was found.
    Found(Path),
    /// The goal cannot be reached from the start.
    NotFound,
    /// The expansion budget ran out before the goal was reached.
    BudgetExhausted,
}

impl PathOutcome {
    /// Path carried by a successful search.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Found(path) => Some(path),
            Self::NotFound | Self::BudgetExhausted => None,
        }
    }

    /// Consumes the outcome and returns its path, if any.
    #[must_use]
    pub fn into_path(self) -> Option<Path> {
        match self {
            Self::Found(path) => Some(path),
            Self::NotFound | Self::BudgetExhausted => None,
        }
    }
}

/// Per-cell cost multipliers layered over the neutral step costs.
///
/// Multipliers below one are clamped to one so the heuristic never
/// overestimates.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TerrainCosts {
    multipliers: BTreeMap<CellCoord, u32>,
}

impl TerrainCosts {
    /// Creates an empty cost table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the multiplier paid for entering `cell`.
    pub fn set(&mut self, cell: CellCoord, multiplier: u32) {
        let _ = self.multipliers.insert(cell, multiplier.max(1));
    }

    /// Removes the override for `cell`.
    pub fn clear(&mut self, cell: CellCoord) {
        let _ = self.multipliers.remove(&cell);
    }

    /// Multiplier paid for entering `cell`.
    #[must_use]
    pub fn multiplier(&self, cell: CellCoord) -> u32 {
        self.multipliers.get(&cell).copied().unwrap_or(1)
    }

    /// Number of overridden cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.multipliers.len()
    }

    /// Reports whether no cell is overridden.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.multipliers.is_empty()
    }
}

/// Stateless search front-end.
///
/// Every query allocates its own open and closed sets, so a `Pathfinder` can
/// be shared freely between callers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Pathfinder {
    config: PathfinderConfig,
    costs: TerrainCosts,
}

impl Pathfinder {
    /// Creates a pathfinder on neutral terrain.
    #[must_use]
    pub fn new(config: PathfinderConfig) -> Self {
        Self {
            config,
            costs: TerrainCosts::default(),
        }
    }

    /// Creates a pathfinder with per-cell cost overrides.
    #[must_use]
    pub fn with_costs(config: PathfinderConfig, costs: TerrainCosts) -> Self {
        Self { config, costs }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &PathfinderConfig {
        &self.config
    }

    /// Active terrain overrides.
    #[must_use]
    pub const fn costs(&self) -> &TerrainCosts {
        &self.costs
    }

    /// Searches for a cheapest path from `start` to `goal`.
    ///
    /// # Errors
    ///
    /// Returns [`PathError::InvalidCoordinate`] when either endpoint lies
    /// outside the grid or on a wall.
    pub fn find_path(
        &self,
        grid: &Grid,
        start: CellCoord,
        goal: CellCoord,
    ) -> Result<PathOutcome, PathError> {
        validate_endpoint(grid, start)?;
        validate_endpoint(grid, goal)?;

        if start == goal {
            return Ok(PathOutcome::Found(Path {
                cells: vec![start],
                cost: 0,
            }));
        }

        let outcome = Search::new(grid, self, goal).run(start);
        match &outcome {
            PathOutcome::Found(path) => log::debug!(
                "path {start:?} -> {goal:?}: {} steps, cost {}",
                path.steps(),
                path.cost()
            ),
            PathOutcome::NotFound => log::debug!("no path {start:?} -> {goal:?}"),
            PathOutcome::BudgetExhausted => log::debug!(
                "search {start:?} -> {goal:?} gave up after {:?} expansions",
                self.config.max_expansions
            ),
        }
        Ok(outcome)
    }
}

/// Searches with neutral terrain under `config`.
///
/// # Errors
///
/// See [`Pathfinder::find_path`].
pub fn find_path(
    grid: &Grid,
    start: CellCoord,
    goal: CellCoord,
    config: &PathfinderConfig,
) -> Result<PathOutcome, PathError> {
    Pathfinder::new(*config).find_path(grid, start, goal)
}

/// Admissible distance estimate between two cells under `rule`.
#[must_use]
pub fn heuristic(rule: MovementRule, from: CellCoord, to: CellCoord) -> u32 {
    let dx = from.column().abs_diff(to.column());
    let dy = from.row().abs_diff(to.row());
    match rule {
        MovementRule::Orthogonal => ORTHOGONAL_STEP_COST.saturating_mul(dx + dy),
        MovementRule::Diagonal => {
            let (long, short) = (dx.max(dy), dx.min(dy));
            ORTHOGONAL_STEP_COST
                .saturating_mul(long)
                .saturating_add((DIAGONAL_STEP_COST - ORTHOGONAL_STEP_COST).saturating_mul(short))
        }
    }
}

fn validate_endpoint(grid: &Grid, cell: CellCoord) -> Result<(), PathError> {
    let reason = if !grid.contains(cell) {
        CoordinateFault::OutOfBounds
    } else if !grid.is_walkable(cell) {
        CoordinateFault::Wall
    } else {
        return Ok(());
    };
    log::error!(
        "rejected path query endpoint ({}, {}): {reason}",
        cell.column(),
        cell.row()
    );
    Err(PathError::InvalidCoordinate { cell, reason })
}

const NO_PARENT: usize = usize::MAX;

/// Heap key ordered by `f`, then by insertion sequence.
type OpenEntry = Reverse<(u32, u64, usize)>;

struct Search<'a> {
    grid: &'a Grid,
    pathfinder: &'a Pathfinder,
    goal: CellCoord,
    best_cost: Vec<u32>,
    parent: Vec<usize>,
    closed: Vec<bool>,
    open: BinaryHeap<OpenEntry>,
    sequence: u64,
}

impl<'a> Search<'a> {
    fn new(grid: &'a Grid, pathfinder: &'a Pathfinder, goal: CellCoord) -> Self {
        let count = grid.len();
        Self {
            grid,
            pathfinder,
            goal,
            best_cost: vec![u32::MAX; count],
            parent: vec![NO_PARENT; count],
            closed: vec![false; count],
            open: BinaryHeap::new(),
            sequence: 0,
        }
    }

    fn run(mut self, start: CellCoord) -> PathOutcome {
        let rule = self.pathfinder.config.movement;
        let budget = self.pathfinder.config.max_expansions;
        let (Some(start_index), Some(goal_index)) = (self.grid.index(start), self.grid.index(self.goal)) else {
            return PathOutcome::NotFound;
        };

        self.best_cost[start_index] = 0;
        self.push(start_index, heuristic(rule, start, self.goal));

        let mut expansions: u32 = 0;
        while let Some(Reverse((_, _, index))) = self.open.pop() {
            if self.closed[index] {
                continue;
            }
            if index == goal_index {
                return PathOutcome::Found(self.reconstruct(goal_index));
            }
            if budget.is_some_and(|limit| expansions >= limit) {
                return PathOutcome::BudgetExhausted;
            }
            self.closed[index] = true;
            expansions += 1;

            let cell = self.grid.cell_at(index);
            let current = self.best_cost[index];
            for (direction, neighbor) in self.grid.neighbors(cell, rule) {
                let Some(neighbor_index) = self.grid.index(neighbor) else {
                    continue;
                };
                if self.closed[neighbor_index] {
                    continue;
                }
                let tentative = current.saturating_add(self.step_cost(direction, neighbor));
                if tentative >= self.best_cost[neighbor_index] {
                    continue;
                }
                self.best_cost[neighbor_index] = tentative;
                self.parent[neighbor_index] = index;
                let estimate = tentative.saturating_add(heuristic(rule, neighbor, self.goal));
                self.push(neighbor_index, estimate);
            }
        }

        PathOutcome::NotFound
    }

    fn step_cost(&self, direction: Direction, entered: CellCoord) -> u32 {
        let base = if direction.is_diagonal() {
            DIAGONAL_STEP_COST
        } else {
            ORTHOGONAL_STEP_COST
        };
        base.saturating_mul(self.pathfinder.costs.multiplier(entered))
    }

    fn push(&mut self, index: usize, estimate: u32) {
        self.open.push(Reverse((estimate, self.sequence, index)));
        self.sequence += 1;
    }

    fn reconstruct(&self, goal_index: usize) -> Path {
        let mut cells = Vec::new();
        let mut cursor = goal_index;
        while cursor != NO_PARENT {
            cells.push(self.grid.cell_at(cursor));
            cursor = self.parent[cursor];
        }
        cells.reverse();
        Path {
            cells,
            cost: self.best_cost[goal_index],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_core::{CellKind, CellRect, CellRectSize};
    use delve_world::GridBuilder;

    fn open_grid(width: u32, height: u32) -> Grid {
        let mut builder = GridBuilder::new(width, height).expect("grid");
        builder
            .fill_rect(
                CellRect::from_origin_and_size(CellCoord::new(0, 0), CellRectSize::new(width, height)),
                CellKind::Floor,
            )
            .expect("fits");
        builder.build()
    }

    #[test]
    fn octile_heuristic_matches_diagonal_cost() {
        let from = CellCoord::new(0, 0);
        let to = CellCoord::new(3, 5);
        assert_eq!(heuristic(MovementRule::Orthogonal, from, to), 80);
        assert_eq!(heuristic(MovementRule::Diagonal, from, to), 3 * 14 + 2 * 10);
    }

    #[test]
    fn start_equals_goal_yields_single_cell() {
        let grid = open_grid(3, 3);
        let cell = CellCoord::new(1, 1);
        let outcome = find_path(&grid, cell, cell, &PathfinderConfig::default()).expect("valid");
        let path = outcome.into_path().expect("found");
        assert_eq!(path.cells(), &[cell]);
        assert_eq!(path.steps(), 0);
        assert_eq!(path.next_step(), None);
    }

    #[test]
    fn wall_endpoints_are_rejected() {
        let mut builder = GridBuilder::new(3, 3).expect("grid");
        builder.set(CellCoord::new(0, 0), CellKind::Floor).expect("in bounds");
        let grid = builder.build();
        assert_eq!(
            find_path(&grid, CellCoord::new(0, 0), CellCoord::new(2, 2), &PathfinderConfig::default()),
            Err(PathError::InvalidCoordinate {
                cell: CellCoord::new(2, 2),
                reason: CoordinateFault::Wall,
            })
        );
        assert_eq!(
            find_path(&grid, CellCoord::new(9, 0), CellCoord::new(0, 0), &PathfinderConfig::default()),
            Err(PathError::InvalidCoordinate {
                cell: CellCoord::new(9, 0),
                reason: CoordinateFault::OutOfBounds,
            })
        );
    }

    #[test]
    fn ties_resolve_to_earliest_insertion() {
        let grid = open_grid(3, 3);
        let config = PathfinderConfig::default();
        let path = find_path(&grid, CellCoord::new(0, 0), CellCoord::new(2, 2), &config)
            .expect("valid")
            .into_path()
            .expect("found");
        assert_eq!(path.steps(), 4);
        assert_eq!(path.cost(), 40);
        // East is queued before South, so the earlier-queued run along the top
        // row wins every equal-cost tie.
        let expected: Vec<CellCoord> = [(0, 0), (1, 0), (2, 0), (2, 1), (2, 2)]
            .into_iter()
            .map(|(column, row)| CellCoord::new(column, row))
            .collect();
        assert_eq!(path.cells(), expected.as_slice());

        let again = find_path(&grid, CellCoord::new(0, 0), CellCoord::new(2, 2), &config)
            .expect("valid")
            .into_path()
            .expect("found");
        assert_eq!(path, again);
    }

    #[test]
    fn terrain_multiplier_detours_around_expensive_cells() {
        let grid = open_grid(5, 3);
        let mut costs = TerrainCosts::new();
        for column in 1..4 {
            costs.set(CellCoord::new(column, 1), 10);
        }
        let pathfinder = Pathfinder::with_costs(PathfinderConfig::default(), costs);
        let path = pathfinder
            .find_path(&grid, CellCoord::new(0, 1), CellCoord::new(4, 1))
            .expect("valid")
            .into_path()
            .expect("found");
        assert_eq!(path.cost(), 60);
        assert!(path.cells().iter().all(|cell| cell.row() != 1 || cell.column() == 0 || cell.column() == 4));
    }

    #[test]
    fn zero_multiplier_is_clamped() {
        let mut costs = TerrainCosts::new();
        costs.set(CellCoord::new(1, 1), 0);
        assert_eq!(costs.multiplier(CellCoord::new(1, 1)), 1);
        costs.clear(CellCoord::new(1, 1));
        assert!(costs.is_empty());
    }
}
