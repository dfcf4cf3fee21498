//! Breadth-first reachability field over walkable cells.

use std::collections::VecDeque;

use delve_core::{CellCoord, MovementRule};

use crate::grid::Grid;

/// Distance stored for cells that no source can reach.
pub const UNREACHABLE: u32 = u32::MAX;

/// Dense step-count grid seeded from one or more source cells.
///
/// The field mirrors the grid's dimensions and stores the breadth-first
/// search results in row-major order. Walls and cells cut off from every
/// source keep [`UNREACHABLE`], so callers can tell them apart from
/// traversable tiles.
#[derive(Clone, Debug, Default)]
pub struct ReachabilityField {
    width: u32,
    height: u32,
    distances: Vec<u32>,
}

impl ReachabilityField {
    /// Builds a fresh field from a single source.
    #[must_use]
    pub fn from_source(grid: &Grid, source: CellCoord, rule: MovementRule) -> Self {
        let mut field = Self::default();
        field.rebuild(grid, &[source], rule);
        field
    }

    /// Rebuilds the step distances using a breadth-first search, reusing the
    /// existing allocation where possible. Sources that are walls or out of
    /// bounds are ignored.
    pub fn rebuild(&mut self, grid: &Grid, sources: &[CellCoord], rule: MovementRule) {
        let cell_count = grid.len();
        if self.distances.len() != cell_count {
            self.distances = vec![UNREACHABLE; cell_count];
        } else {
            self.distances.fill(UNREACHABLE);
        }

        self.width = grid.width();
        self.height = grid.height();

        let mut queue = VecDeque::new();

        for &source in sources {
            if !grid.is_walkable(source) {
                continue;
            }

            if let Some(index) = grid.index(source) {
                if self.distances[index] == 0 {
                    continue;
                }

                self.distances[index] = 0;
                queue.push_back(source);
            }
        }

        while let Some(cell) = queue.pop_front() {
            let Some(current_index) = grid.index(cell) else {
                continue;
            };
            let next_distance = self.distances[current_index].saturating_add(1);

            for (_, neighbor) in grid.neighbors(cell, rule) {
                let Some(neighbor_index) = grid.index(neighbor) else {
                    continue;
                };

                if self.distances[neighbor_index] <= next_distance {
                    continue;
                }

                self.distances[neighbor_index] = next_distance;
                queue.push_back(neighbor);
            }
        }
    }

    /// Width of the field in cells.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height of the field in cells.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Dense distances stored in row-major order.
    #[must_use]
    pub fn cells(&self) -> &[u32] {
        &self.distances
    }

    /// Steps from the nearest source to the cell, if the cell was reached.
    #[must_use]
    pub fn distance(&self, cell: CellCoord) -> Option<u32> {
        if cell.column() >= self.width || cell.row() >= self.height {
            return None;
        }

        let width = usize::try_from(self.width).ok()?;
        let offset = usize::try_from(cell.row())
            .ok()?
            .checked_mul(width)?
            .checked_add(usize::try_from(cell.column()).ok()?)?;
        self.distances
            .get(offset)
            .copied()
            .filter(|distance| *distance != UNREACHABLE)
    }

    /// Number of cells reached from the sources, sources included.
    #[must_use]
    pub fn reached_count(&self) -> usize {
        self.distances
            .iter()
            .filter(|distance| **distance != UNREACHABLE)
            .count()
    }
}
