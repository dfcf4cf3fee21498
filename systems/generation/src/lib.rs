#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic dungeon generation by recursive subdivision.
//!
//! The level rectangle is split in two again and again until the pieces are
//! too small to hold two rooms. Every leaf receives one room carved strictly
//! inside its bounds, so each room keeps a wall around it. Sibling subtrees
//! are then joined bottom-up by a single corridor between their closest
//! rooms. Each join connects two regions that are already connected
//! internally, so the finished floor plan is connected as a whole. A final
//! pass gives some rooms one more corridor to their nearest unlinked room,
//! so the room graph gains loops on top of the spanning tree.
//!
//! All randomness comes from a seeded [`ChaCha8Rng`] that is threaded through
//! every call; identical seeds and configurations give identical grids.

use delve_core::{
    CellCoord, CellKind, CellRect, CellRectSize, GeneratorConfig, LevelDescriptor,
    SplitAxisPolicy,
};
use delve_world::{Grid, GridBuilder, GridError};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

/// Errors raised before or during generation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The parameters cannot produce a legal dungeon.
    #[error("invalid generator configuration: {0}")]
    InvalidConfig(String),
    /// Carving escaped the grid bounds.
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Generated grid together with the room plan that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    grid: Grid,
    rooms: Vec<CellRect>,
    links: Vec<(usize, usize)>,
}

impl Layout {
    /// Carved terrain.
    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Rooms in left-to-right leaf order of the subdivision tree.
    #[must_use]
    pub fn rooms(&self) -> &[CellRect] {
        &self.rooms
    }

    /// Corridors expressed as pairs of indices into [`Layout::rooms`].
    #[must_use]
    pub fn links(&self) -> &[(usize, usize)] {
        &self.links
    }

    /// Discards the room plan, keeping only the grid.
    #[must_use]
    pub fn into_grid(self) -> Grid {
        self.grid
    }
}

/// Generates a connected dungeon grid.
///
/// # Errors
///
/// Returns [`GenerationError::InvalidConfig`] when the dimensions cannot hold
/// a single minimum-size room with its surrounding wall, or when the
/// configuration itself is inconsistent.
pub fn generate(
    width: u32,
    height: u32,
    seed: u64,
    config: &GeneratorConfig,
) -> Result<Grid, GenerationError> {
    generate_layout(width, height, seed, config).map(Layout::into_grid)
}

/// Generates a connected dungeon and keeps the room plan.
///
/// # Errors
///
/// See [`generate`].
pub fn generate_layout(
    width: u32,
    height: u32,
    seed: u64,
    config: &GeneratorConfig,
) -> Result<Layout, GenerationError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    generate_with_rng(width, height, config, &mut rng)
}

/// Regenerates the layout described by a level descriptor.
///
/// # Errors
///
/// See [`generate`].
pub fn level_layout(level: &LevelDescriptor) -> Result<Layout, GenerationError> {
    generate_layout(level.width, level.height, level.seed, &level.generator)
}

/// Generates a layout drawing every random decision from `rng`.
///
/// # Errors
///
/// See [`generate`].
pub fn generate_with_rng<R: Rng>(
    width: u32,
    height: u32,
    config: &GeneratorConfig,
    rng: &mut R,
) -> Result<Layout, GenerationError> {
    validate(width, height, config)?;

    let mut builder = GridBuilder::new(width, height)?;
    let bounds = CellRect::from_origin_and_size(CellCoord::new(0, 0), CellRectSize::new(width, height));
    let mut rooms = Vec::new();
    let tree = subdivide(bounds, 0, config, rng);
    carve_rooms(&tree, &mut builder, &mut rooms, config, rng)?;

    let mut links = Vec::new();
    link_subtrees(&tree, &mut builder, &rooms, &mut links, config, rng)?;
    add_loops(&mut builder, &rooms, &mut links, config, rng)?;

    let grid = builder.build();
    log::info!(
        "generated {width}x{height} dungeon with {} rooms and {} corridors",
        rooms.len(),
        links.len()
    );
    Ok(Layout { grid, rooms, links })
}

fn validate(width: u32, height: u32, config: &GeneratorConfig) -> Result<(), GenerationError> {
    if config.min_room_size == 0 {
        return Err(GenerationError::InvalidConfig(
            "minimum room size must be positive".to_owned(),
        ));
    }
    if config.corridor_width == 0 || config.corridor_width > config.min_room_size {
        return Err(GenerationError::InvalidConfig(format!(
            "corridor width {} must lie in 1..={}",
            config.corridor_width, config.min_room_size
        )));
    }
    let min_leaf = min_leaf_extent(config);
    if width < min_leaf || height < min_leaf {
        return Err(GenerationError::InvalidConfig(format!(
            "{width}x{height} grid cannot fit a {0}x{0} room and its walls",
            config.min_room_size
        )));
    }
    Ok(())
}

/// Chance that a room gains a corridor beyond the spanning links.
const EXTRA_LINK_CHANCE: f64 = 0.15;

/// Smallest leaf edge that still holds a minimum room plus a wall on each side.
fn min_leaf_extent(config: &GeneratorConfig) -> u32 {
    config.min_room_size.saturating_add(2)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Axis {
    /// Cut with a vertical line, splitting the columns.
    Columns,
    /// Cut with a horizontal line, splitting the rows.
    Rows,
}

impl Axis {
    fn other(self) -> Self {
        match self {
            Self::Columns => Self::Rows,
            Self::Rows => Self::Columns,
        }
    }

    fn extent(self, region: CellRect) -> u32 {
        match self {
            Self::Columns => region.size().width(),
            Self::Rows => region.size().height(),
        }
    }
}

#[derive(Debug)]
enum Node {
    Leaf { region: CellRect },
    Split { first: Box<Node>, second: Box<Node> },
}

fn preferred_axis(region: CellRect, depth: u32, policy: SplitAxisPolicy) -> Axis {
    match policy {
        SplitAxisPolicy::Alternate => {
            if depth % 2 == 0 {
                Axis::Columns
            } else {
                Axis::Rows
            }
        }
        SplitAxisPolicy::AspectRatio => {
            if region.size().width() >= region.size().height() {
                Axis::Columns
            } else {
                Axis::Rows
            }
        }
    }
}

fn subdivide<R: Rng>(region: CellRect, depth: u32, config: &GeneratorConfig, rng: &mut R) -> Node {
    let min_leaf = min_leaf_extent(config);
    let preferred = preferred_axis(region, depth, config.split_axis);
    let axis = [preferred, preferred.other()]
        .into_iter()
        .find(|axis| axis.extent(region) >= min_leaf.saturating_mul(2));

    let Some(axis) = axis else {
        return Node::Leaf { region };
    };

    let extent = axis.extent(region);
    let offset = rng.gen_range(min_leaf..=extent - min_leaf);
    let (first, second) = split_region(region, axis, offset);

    Node::Split {
        first: Box::new(subdivide(first, depth + 1, config, rng)),
        second: Box::new(subdivide(second, depth + 1, config, rng)),
    }
}

fn split_region(region: CellRect, axis: Axis, offset: u32) -> (CellRect, CellRect) {
    let origin = region.origin();
    let size = region.size();
    match axis {
        Axis::Columns => (
            CellRect::from_origin_and_size(origin, CellRectSize::new(offset, size.height())),
            CellRect::from_origin_and_size(
                CellCoord::new(origin.column() + offset, origin.row()),
                CellRectSize::new(size.width() - offset, size.height()),
            ),
        ),
        Axis::Rows => (
            CellRect::from_origin_and_size(origin, CellRectSize::new(size.width(), offset)),
            CellRect::from_origin_and_size(
                CellCoord::new(origin.column(), origin.row() + offset),
                CellRectSize::new(size.width(), size.height() - offset),
            ),
        ),
    }
}

/// Carves one room per leaf, walking leaves left to right.
fn carve_rooms<R: Rng>(
    node: &Node,
    builder: &mut GridBuilder,
    rooms: &mut Vec<CellRect>,
    config: &GeneratorConfig,
    rng: &mut R,
) -> Result<(), GenerationError> {
    match node {
        Node::Leaf { region } => {
            if let Some(room) = room_in_leaf(*region, config, rng) {
                builder.fill_rect(room, CellKind::Floor)?;
                rooms.push(room);
            } else {
                log::debug!("leaf {region:?} too small for a room, left solid");
            }
            Ok(())
        }
        Node::Split { first, second } => {
            carve_rooms(first, builder, rooms, config, rng)?;
            carve_rooms(second, builder, rooms, config, rng)
        }
    }
}

fn room_in_leaf<R: Rng>(leaf: CellRect, config: &GeneratorConfig, rng: &mut R) -> Option<CellRect> {
    let min_leaf = min_leaf_extent(config);
    let size = leaf.size();
    if size.width() < min_leaf || size.height() < min_leaf {
        return None;
    }

    let max_width = size.width() - 2;
    let max_height = size.height() - 2;
    let width = rng.gen_range(config.min_room_size..=max_width);
    let height = rng.gen_range(config.min_room_size..=max_height);
    let column = leaf.origin().column() + 1 + rng.gen_range(0..=max_width - width);
    let row = leaf.origin().row() + 1 + rng.gen_range(0..=max_height - height);

    Some(CellRect::from_origin_and_size(
        CellCoord::new(column, row),
        CellRectSize::new(width, height),
    ))
}

/// Links sibling subtrees bottom-up so every room joins one spanning tree.
fn link_subtrees<R: Rng>(
    node: &Node,
    builder: &mut GridBuilder,
    rooms: &[CellRect],
    links: &mut Vec<(usize, usize)>,
    config: &GeneratorConfig,
    rng: &mut R,
) -> Result<(), GenerationError> {
    let mut cursor = 0;
    let _ = link_walk(node, builder, rooms, &mut cursor, links, config, rng)?;
    Ok(())
}

/// Returns the rooms of `node`'s subtree. Room indices follow leaf order, so
/// the subtree's rooms are the ones carved while visiting it.
fn link_walk<R: Rng>(
    node: &Node,
    builder: &mut GridBuilder,
    rooms: &[CellRect],
    cursor: &mut usize,
    links: &mut Vec<(usize, usize)>,
    config: &GeneratorConfig,
    rng: &mut R,
) -> Result<Vec<usize>, GenerationError> {
    match node {
        Node::Leaf { region } => {
            let owns_room = rooms
                .get(*cursor)
                .is_some_and(|room| region_contains(*region, *room));
            if owns_room {
                *cursor += 1;
                Ok(vec![*cursor - 1])
            } else {
                Ok(Vec::new())
            }
        }
        Node::Split { first, second } => {
            let mut left = link_walk(first, builder, rooms, cursor, links, config, rng)?;
            let right = link_walk(second, builder, rooms, cursor, links, config, rng)?;

            if let Some((a, b)) = nearest_pair(&left, &right, rooms) {
                carve_corridor(builder, rooms[a], rooms[b], config, rng)?;
                log::debug!("linked room {a} with room {b}");
                links.push((a, b));
            }

            left.extend(right);
            Ok(left)
        }
    }
}

/// Draws once per room; on success the room is joined to its nearest room
/// that it does not already share a corridor with.
fn add_loops<R: Rng>(
    builder: &mut GridBuilder,
    rooms: &[CellRect],
    links: &mut Vec<(usize, usize)>,
    config: &GeneratorConfig,
    rng: &mut R,
) -> Result<(), GenerationError> {
    for room in 0..rooms.len() {
        if !rng.gen_bool(EXTRA_LINK_CHANCE) {
            continue;
        }
        let unlinked: Vec<usize> = (0..rooms.len())
            .filter(|&other| other != room && !is_linked(links, room, other))
            .collect();
        if let Some((a, b)) = nearest_pair(&[room], &unlinked, rooms) {
            carve_corridor(builder, rooms[a], rooms[b], config, rng)?;
            log::debug!("added loop between room {a} and room {b}");
            links.push((a, b));
        }
    }
    Ok(())
}

fn is_linked(links: &[(usize, usize)], a: usize, b: usize) -> bool {
    links
        .iter()
        .any(|&link| link == (a, b) || link == (b, a))
}

fn region_contains(region: CellRect, room: CellRect) -> bool {
    region.contains(room.origin())
}

/// Closest pair of room centers by Manhattan distance; the first pair found
/// wins ties.
fn nearest_pair(left: &[usize], right: &[usize], rooms: &[CellRect]) -> Option<(usize, usize)> {
    let mut best: Option<(u32, usize, usize)> = None;
    for &a in left {
        for &b in right {
            let distance = rooms[a].center().manhattan_distance(rooms[b].center());
            if best.map_or(true, |(current, _, _)| distance < current) {
                best = Some((distance, a, b));
            }
        }
    }
    best.map(|(_, a, b)| (a, b))
}

/// Carves a straight or L-shaped corridor between the centers of two rooms.
fn carve_corridor<R: Rng>(
    builder: &mut GridBuilder,
    from: CellRect,
    to: CellRect,
    config: &GeneratorConfig,
    rng: &mut R,
) -> Result<(), GenerationError> {
    let start = from.center();
    let end = to.center();
    let horizontal_first = rng.gen_bool(0.5);
    let corner = if horizontal_first {
        CellCoord::new(end.column(), start.row())
    } else {
        CellCoord::new(start.column(), end.row())
    };

    let endpoints = [from, to];
    carve_leg(builder, start, corner, &endpoints, config)?;
    carve_leg(builder, corner, end, &endpoints, config)
}

/// Carves a straight run between two cells sharing a row or column,
/// thickened towards increasing indices up to the corridor width.
fn carve_leg(
    builder: &mut GridBuilder,
    from: CellCoord,
    to: CellCoord,
    endpoints: &[CellRect; 2],
    config: &GeneratorConfig,
) -> Result<(), GenerationError> {
    let grid_width = builder.width();
    let grid_height = builder.height();
    let horizontal = from.row() == to.row();

    let (start, end) = if horizontal {
        (from.column().min(to.column()), from.column().max(to.column()))
    } else {
        (from.row().min(to.row()), from.row().max(to.row()))
    };

    for along in start..=end {
        for across in 0..config.corridor_width {
            let cell = if horizontal {
                CellCoord::new(along, from.row() + across)
            } else {
                CellCoord::new(from.column() + across, along)
            };
            if cell.column() == 0
                || cell.row() == 0
                || cell.column() + 1 >= grid_width
                || cell.row() + 1 >= grid_height
            {
                continue;
            }
            if builder.get(cell)? != CellKind::Wall {
                continue;
            }
            let pierces_room_wall =
                across == 0 && endpoints.iter().any(|room| room.ring_contains(cell));
            let kind = if pierces_room_wall {
                CellKind::Door
            } else {
                CellKind::Floor
            };
            builder.set(cell, kind)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_never_shrink_below_minimum() {
        let config = GeneratorConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let bounds = CellRect::from_origin_and_size(CellCoord::new(0, 0), CellRectSize::new(60, 30));
        let tree = subdivide(bounds, 0, &config, &mut rng);

        fn check(node: &Node, min_leaf: u32) {
            match node {
                Node::Leaf { region } => {
                    assert!(region.size().width() >= min_leaf);
                    assert!(region.size().height() >= min_leaf);
                    assert!(
                        region.size().width() < min_leaf * 2 || region.size().height() < min_leaf * 2,
                        "leaf {region:?} could have been split"
                    );
                }
                Node::Split { first, second } => {
                    check(first, min_leaf);
                    check(second, min_leaf);
                }
            }
        }
        check(&tree, min_leaf_extent(&config));
    }

    #[test]
    fn room_stays_strictly_inside_leaf() {
        let config = GeneratorConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let leaf = CellRect::from_origin_and_size(CellCoord::new(10, 4), CellRectSize::new(6, 9));
        for _ in 0..64 {
            let room = room_in_leaf(leaf, &config, &mut rng).expect("leaf fits a room");
            assert!(room.origin().column() > 10);
            assert!(room.origin().row() > 4);
            assert!(room.origin().column() + room.size().width() < 16);
            assert!(room.origin().row() + room.size().height() < 13);
            assert!(room.size().width() >= config.min_room_size);
        }
    }

    #[test]
    fn undersized_leaf_gets_no_room() {
        let config = GeneratorConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let leaf = CellRect::from_origin_and_size(CellCoord::new(0, 0), CellRectSize::new(5, 12));
        assert_eq!(room_in_leaf(leaf, &config, &mut rng), None);
    }

    #[test]
    fn nearest_pair_prefers_first_on_ties() {
        let rooms = [
            CellRect::from_origin_and_size(CellCoord::new(1, 1), CellRectSize::new(4, 4)),
            CellRect::from_origin_and_size(CellCoord::new(1, 11), CellRectSize::new(4, 4)),
            CellRect::from_origin_and_size(CellCoord::new(11, 1), CellRectSize::new(4, 4)),
        ];
        assert_eq!(nearest_pair(&[0], &[1, 2], &rooms), Some((0, 1)));
        assert_eq!(nearest_pair(&[], &[1, 2], &rooms), None);
    }

    #[test]
    fn loops_never_duplicate_an_existing_corridor() {
        let config = GeneratorConfig::default();
        let rooms = [
            CellRect::from_origin_and_size(CellCoord::new(1, 1), CellRectSize::new(4, 4)),
            CellRect::from_origin_and_size(CellCoord::new(1, 11), CellRectSize::new(4, 4)),
            CellRect::from_origin_and_size(CellCoord::new(11, 1), CellRectSize::new(4, 4)),
        ];
        assert!(is_linked(&[(2, 0)], 0, 2));
        assert!(!is_linked(&[(2, 0)], 0, 1));

        let complete = vec![(0, 1), (1, 2), (2, 0)];
        for seed in 0..32 {
            let mut builder = GridBuilder::new(20, 20).expect("grid");
            let mut links = complete.clone();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            add_loops(&mut builder, &rooms, &mut links, &config, &mut rng).expect("carves");
            assert_eq!(links, complete);
        }
    }

    #[test]
    fn corridor_marks_doors_where_it_leaves_rooms() {
        let config = GeneratorConfig::default();
        let mut builder = GridBuilder::new(20, 8).expect("grid");
        let left = CellRect::from_origin_and_size(CellCoord::new(1, 2), CellRectSize::new(4, 4));
        let right = CellRect::from_origin_and_size(CellCoord::new(12, 2), CellRectSize::new(4, 4));
        builder.fill_rect(left, CellKind::Floor).expect("fits");
        builder.fill_rect(right, CellKind::Floor).expect("fits");

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        carve_corridor(&mut builder, left, right, &config, &mut rng).expect("carves");
        let grid = builder.build();

        assert_eq!(grid.get(CellCoord::new(5, 4)), Ok(CellKind::Door));
        assert_eq!(grid.get(CellCoord::new(11, 4)), Ok(CellKind::Door));
        assert_eq!(grid.get(CellCoord::new(8, 4)), Ok(CellKind::Floor));
        assert!(grid.is_connected());
    }
}
