//! Dense terrain grid shared by generation, pathfinding and the world.

use delve_core::{CellCoord, CellKind, CellRect, Direction, MovementRule};
use thiserror::Error;

use crate::navigation::{ReachabilityField, UNREACHABLE};

/// Errors raised by bounds-checked grid access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum GridError {
    /// The coordinate lies outside `[0, width) x [0, height)`.
    #[error("cell ({column}, {row}) is outside the {width}x{height} grid")]
    OutOfBounds {
        /// Requested column.
        column: u32,
        /// Requested row.
        row: u32,
        /// Grid width.
        width: u32,
        /// Grid height.
        height: u32,
    },
    /// A grid must contain at least one cell.
    #[error("grid dimensions must be positive, got {width}x{height}")]
    EmptyGrid {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
}

/// Immutable terrain classification for every cell of a level.
///
/// Cells are stored row-major. Entities are never stored here; they reference
/// coordinates and live in an overlay owned by the world.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Grid {
    width: u32,
    height: u32,
    cells: Vec<CellKind>,
}

impl Grid {
    /// Width of the grid in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the grid in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Width and height of the grid.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Reports whether the coordinate lies within the grid.
    #[must_use]
    pub const fn contains(&self, cell: CellCoord) -> bool {
        cell.column() < self.width && cell.row() < self.height
    }

    /// Terrain at the provided cell.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::OutOfBounds`] when the cell lies outside the grid.
    pub fn get(&self, cell: CellCoord) -> Result<CellKind, GridError> {
        self.index(cell)
            .and_then(|index| self.cells.get(index).copied())
            .ok_or(GridError::OutOfBounds {
                column: cell.column(),
                row: cell.row(),
                width: self.width,
                height: self.height,
            })
    }

    /// Reports whether the cell is inside the grid and is floor or door.
    #[must_use]
    pub fn is_walkable(&self, cell: CellCoord) -> bool {
        self.get(cell).is_ok_and(CellKind::is_walkable)
    }

    /// Row-major iterator over every cell and its terrain.
    pub fn cells(&self) -> impl Iterator<Item = (CellCoord, CellKind)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(|(index, kind)| (self.cell_at(index), *kind))
    }

    /// Row-major iterator over walkable cells.
    pub fn walkable_cells(&self) -> impl Iterator<Item = CellCoord> + '_ {
        self.cells()
            .filter(|(_, kind)| kind.is_walkable())
            .map(|(cell, _)| cell)
    }

    /// Number of cells in the grid.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Always `false`: grids are never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Dense row-major index of a cell, or `None` when out of bounds.
    #[must_use]
    pub fn index(&self, cell: CellCoord) -> Option<usize> {
        if !self.contains(cell) {
            return None;
        }
        let row = usize::try_from(cell.row()).ok()?;
        let column = usize::try_from(cell.column()).ok()?;
        let width = usize::try_from(self.width).ok()?;
        row.checked_mul(width)?.checked_add(column)
    }

    /// Inverse of [`Grid::index`].
    #[must_use]
    pub fn cell_at(&self, index: usize) -> CellCoord {
        let width = self.width as usize;
        CellCoord::new((index % width) as u32, (index / width) as u32)
    }

    /// Reports whether a single step from `from` in `direction` is legal.
    ///
    /// The destination must be walkable. Diagonal steps additionally require
    /// both orthogonally adjacent cells to be walkable so that movement never
    /// squeezes between two wall corners.
    #[must_use]
    pub fn can_step(&self, from: CellCoord, direction: Direction) -> bool {
        let Some(to) = from.step(direction) else {
            return false;
        };
        if !self.is_walkable(to) {
            return false;
        }
        if !direction.is_diagonal() {
            return true;
        }
        let (dx, _) = direction.delta();
        let horizontal = if dx > 0 {
            Direction::East
        } else {
            Direction::West
        };
        let vertical = if to.row() > from.row() {
            Direction::South
        } else {
            Direction::North
        };
        [horizontal, vertical].into_iter().all(|side| {
            from.step(side)
                .is_some_and(|cell| self.is_walkable(cell))
        })
    }

    /// Walkable cells reachable in one step under `rule`, in the rule's
    /// deterministic direction order.
    pub fn neighbors(
        &self,
        cell: CellCoord,
        rule: MovementRule,
    ) -> impl Iterator<Item = (Direction, CellCoord)> + '_ {
        rule.directions()
            .iter()
            .copied()
            .filter(move |direction| self.can_step(cell, *direction))
            .filter_map(move |direction| cell.step(direction).map(|to| (direction, to)))
    }

    /// Number of orthogonally connected walkable regions.
    #[must_use]
    pub fn walkable_regions(&self) -> usize {
        let mut seen = vec![false; self.cells.len()];
        let mut field = ReachabilityField::default();
        let mut regions = 0;
        for cell in self.walkable_cells() {
            let Some(index) = self.index(cell) else {
                continue;
            };
            if seen[index] {
                continue;
            }
            regions += 1;
            field.rebuild(self, &[cell], MovementRule::Orthogonal);
            for (offset, distance) in field.cells().iter().enumerate() {
                if *distance != UNREACHABLE {
                    seen[offset] = true;
                }
            }
        }
        regions
    }

    /// Reports whether every walkable cell can reach every other one using
    /// orthogonal steps. Grids with no walkable cells are not connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.walkable_regions() == 1
    }
}

/// Mutable staging area used while a grid is being carved.
#[derive(Clone, Debug)]
pub struct GridBuilder {
    grid: Grid,
}

impl GridBuilder {
    /// Creates a builder whose cells are all walls.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::EmptyGrid`] when either dimension is zero.
    pub fn new(width: u32, height: u32) -> Result<Self, GridError> {
        let count = usize::try_from(u64::from(width) * u64::from(height)).unwrap_or(0);
        if count == 0 {
            return Err(GridError::EmptyGrid { width, height });
        }
        Ok(Self {
            grid: Grid {
                width,
                height,
                cells: vec![CellKind::Wall; count],
            },
        })
    }

    /// Width of the staged grid in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.grid.width
    }

    /// Height of the staged grid in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.grid.height
    }

    /// Terrain currently staged at the cell.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::OutOfBounds`] when the cell lies outside the grid.
    pub fn get(&self, cell: CellCoord) -> Result<CellKind, GridError> {
        self.grid.get(cell)
    }

    /// Overwrites the terrain of a single cell.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::OutOfBounds`] when the cell lies outside the grid.
    pub fn set(&mut self, cell: CellCoord, kind: CellKind) -> Result<(), GridError> {
        let bounds = GridError::OutOfBounds {
            column: cell.column(),
            row: cell.row(),
            width: self.grid.width,
            height: self.grid.height,
        };
        let index = self.grid.index(cell).ok_or(bounds)?;
        let slot = self.grid.cells.get_mut(index).ok_or(bounds)?;
        *slot = kind;
        Ok(())
    }

    /// Overwrites every cell of the rectangle.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::OutOfBounds`] if any part of the rectangle lies
    /// outside the grid; cells before the offending one stay written.
    pub fn fill_rect(&mut self, rect: CellRect, kind: CellKind) -> Result<(), GridError> {
        for cell in rect.cells() {
            self.set(cell, kind)?;
        }
        Ok(())
    }

    /// Freezes the staged terrain.
    #[must_use]
    pub fn build(self) -> Grid {
        self.grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_core::CellRectSize;

    fn room_grid() -> Grid {
        let mut builder = GridBuilder::new(6, 5).expect("grid");
        builder
            .fill_rect(
                CellRect::from_origin_and_size(CellCoord::new(1, 1), CellRectSize::new(4, 3)),
                CellKind::Floor,
            )
            .expect("room fits");
        builder.build()
    }

    #[test]
    fn get_rejects_out_of_bounds() {
        let grid = room_grid();
        assert_eq!(grid.get(CellCoord::new(1, 1)), Ok(CellKind::Floor));
        assert_eq!(
            grid.get(CellCoord::new(6, 0)),
            Err(GridError::OutOfBounds {
                column: 6,
                row: 0,
                width: 6,
                height: 5,
            })
        );
        assert!(grid.get(CellCoord::new(0, 5)).is_err());
    }

    #[test]
    fn builder_rejects_empty_dimensions() {
        assert_eq!(
            GridBuilder::new(0, 3).map(|_| ()),
            Err(GridError::EmptyGrid {
                width: 0,
                height: 3
            })
        );
    }

    #[test]
    fn doors_are_walkable_and_walls_are_not() {
        let mut builder = GridBuilder::new(3, 1).expect("grid");
        builder.set(CellCoord::new(1, 0), CellKind::Door).expect("in bounds");
        builder.set(CellCoord::new(2, 0), CellKind::Floor).expect("in bounds");
        let grid = builder.build();
        assert!(!grid.is_walkable(CellCoord::new(0, 0)));
        assert!(grid.is_walkable(CellCoord::new(1, 0)));
        assert!(grid.is_walkable(CellCoord::new(2, 0)));
        assert!(!grid.is_walkable(CellCoord::new(3, 0)));
    }

    #[test]
    fn diagonal_steps_cannot_cut_corners() {
        let mut builder = GridBuilder::new(2, 2).expect("grid");
        builder.set(CellCoord::new(0, 0), CellKind::Floor).expect("in bounds");
        builder.set(CellCoord::new(1, 1), CellKind::Floor).expect("in bounds");
        let grid = builder.build();
        assert!(!grid.can_step(CellCoord::new(0, 0), Direction::SouthEast));

        let open = room_grid();
        assert!(open.can_step(CellCoord::new(1, 1), Direction::SouthEast));
    }

    #[test]
    fn index_round_trips_through_cell_at() {
        let grid = room_grid();
        for (cell, _) in grid.cells() {
            let index = grid.index(cell).expect("in bounds");
            assert_eq!(grid.cell_at(index), cell);
        }
        assert_eq!(grid.len(), 30);
    }

    #[test]
    fn regions_count_separate_rooms() {
        let mut builder = GridBuilder::new(7, 3).expect("grid");
        builder.set(CellCoord::new(1, 1), CellKind::Floor).expect("in bounds");
        builder.set(CellCoord::new(2, 1), CellKind::Floor).expect("in bounds");
        builder.set(CellCoord::new(5, 1), CellKind::Floor).expect("in bounds");
        let split = builder.clone().build();
        assert_eq!(split.walkable_regions(), 2);
        assert!(!split.is_connected());

        for column in 3..5 {
            builder
                .set(CellCoord::new(column, 1), CellKind::Door)
                .expect("in bounds");
        }
        assert!(builder.build().is_connected());
    }
}
