#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Delve dungeon simulation.
//!
//! This crate defines the vocabulary every other crate speaks: grid
//! coordinates and cell kinds, movement rules, the plain entity records that
//! populate a level, the configuration tables handed in by the embedding
//! engine, and the [`Command`]/[`Event`] surface of the authoritative world.
//! Systems consume event streams, query immutable snapshots and respond with
//! new command batches; they never mutate the world directly.

use serde::{Deserialize, Serialize};

/// Location of a single grid cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Computes the Manhattan distance between two cell coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: CellCoord) -> u32 {
        self.column().abs_diff(other.column()) + self.row().abs_diff(other.row())
    }

    /// Computes the Chebyshev (king move) distance between two cell coordinates.
    #[must_use]
    pub fn chebyshev_distance(self, other: CellCoord) -> u32 {
        self.column()
            .abs_diff(other.column())
            .max(self.row().abs_diff(other.row()))
    }

    /// Cell reached by travelling one step in `direction`, if it does not
    /// underflow the coordinate space.
    #[must_use]
    pub fn step(self, direction: Direction) -> Option<CellCoord> {
        let (dx, dy) = direction.delta();
        let column = self.column.checked_add_signed(dx)?;
        let row = self.row.checked_add_signed(dy)?;
        Some(CellCoord::new(column, row))
    }
}

/// Terrain classification of a single grid cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellKind {
    /// Solid rock. Never traversable.
    #[default]
    Wall,
    /// Open floor inside a room or corridor.
    Floor,
    /// Doorway where a corridor pierces a room's wall.
    Door,
}

impl CellKind {
    /// Reports whether entities may stand on the cell.
    #[must_use]
    pub const fn is_walkable(self) -> bool {
        matches!(self, Self::Floor | Self::Door)
    }
}

/// Compass directions available to entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Movement toward decreasing row indices.
    North,
    /// Diagonal toward decreasing rows and increasing columns.
    NorthEast,
    /// Movement toward increasing column indices.
    East,
    /// Diagonal toward increasing rows and columns.
    SouthEast,
    /// Movement toward increasing row indices.
    South,
    /// Diagonal toward increasing rows and decreasing columns.
    SouthWest,
    /// Movement toward decreasing column indices.
    West,
    /// Diagonal toward decreasing rows and columns.
    NorthWest,
}

impl Direction {
    /// The four orthogonal directions in clockwise order starting north.
    pub const ORTHOGONAL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// All eight directions, orthogonal ones first so that expansion order
    /// prefers straight moves.
    pub const ALL: [Direction; 8] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
        Direction::NorthEast,
        Direction::SouthEast,
        Direction::SouthWest,
        Direction::NorthWest,
    ];

    /// Column and row offsets applied by a single step.
    #[must_use]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::NorthEast => (1, -1),
            Self::East => (1, 0),
            Self::SouthEast => (1, 1),
            Self::South => (0, 1),
            Self::SouthWest => (-1, 1),
            Self::West => (-1, 0),
            Self::NorthWest => (-1, -1),
        }
    }

    /// Reports whether the direction moves along both axes at once.
    #[must_use]
    pub const fn is_diagonal(self) -> bool {
        matches!(
            self,
            Self::NorthEast | Self::SouthEast | Self::SouthWest | Self::NorthWest
        )
    }

    /// Direction leading from `from` to the adjacent cell `to`, if they touch.
    #[must_use]
    pub fn between(from: CellCoord, to: CellCoord) -> Option<Direction> {
        Self::ALL
            .into_iter()
            .find(|direction| from.step(*direction) == Some(to))
    }
}

/// Adjacency rule used by pathfinding and movement validation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementRule {
    /// Four-directional movement.
    #[default]
    Orthogonal,
    /// Eight-directional movement, diagonals included.
    Diagonal,
}

impl MovementRule {
    /// Directions permitted by the rule in deterministic expansion order.
    #[must_use]
    pub fn directions(self) -> &'static [Direction] {
        match self {
            Self::Orthogonal => &Direction::ORTHOGONAL,
            Self::Diagonal => &Direction::ALL,
        }
    }

    /// Lower bound on the number of steps between two cells under the rule.
    #[must_use]
    pub fn straight_line_steps(self, from: CellCoord, to: CellCoord) -> u32 {
        match self {
            Self::Orthogonal => from.manhattan_distance(to),
            Self::Diagonal => from.chebyshev_distance(to),
        }
    }
}

/// Axis-aligned rectangle expressed in cell coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRect {
    origin: CellCoord,
    size: CellRectSize,
}

impl CellRect {
    /// Constructs a rectangle from an origin cell and size.
    #[must_use]
    pub const fn from_origin_and_size(origin: CellCoord, size: CellRectSize) -> Self {
        Self { origin, size }
    }

    /// Upper-left cell that anchors the rectangle.
    #[must_use]
    pub const fn origin(&self) -> CellCoord {
        self.origin
    }

    /// Dimensions of the rectangle measured in whole cells.
    #[must_use]
    pub const fn size(&self) -> CellRectSize {
        self.size
    }

    /// Cell at the integer center of the rectangle.
    #[must_use]
    pub const fn center(&self) -> CellCoord {
        CellCoord::new(
            self.origin.column() + self.size.width() / 2,
            self.origin.row() + self.size.height() / 2,
        )
    }

    /// Reports whether the cell lies inside the rectangle.
    #[must_use]
    pub const fn contains(&self, cell: CellCoord) -> bool {
        cell.column() >= self.origin.column()
            && cell.row() >= self.origin.row()
            && cell.column() < self.origin.column() + self.size.width()
            && cell.row() < self.origin.row() + self.size.height()
    }

    /// Reports whether the cell lies on the one-cell ring surrounding the
    /// rectangle.
    #[must_use]
    pub fn ring_contains(&self, cell: CellCoord) -> bool {
        if self.contains(cell) {
            return false;
        }
        let left = self.origin.column().saturating_sub(1);
        let top = self.origin.row().saturating_sub(1);
        let right = self.origin.column() + self.size.width();
        let bottom = self.origin.row() + self.size.height();
        (left..=right).contains(&cell.column()) && (top..=bottom).contains(&cell.row())
    }

    /// Iterates every cell inside the rectangle in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = CellCoord> {
        let origin = self.origin;
        let size = self.size;
        (0..size.height()).flat_map(move |dy| {
            (0..size.width())
                .map(move |dx| CellCoord::new(origin.column() + dx, origin.row() + dy))
        })
    }
}

/// Size of a [`CellRect`] measured in whole cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRectSize {
    width: u32,
    height: u32,
}

impl CellRectSize {
    /// Creates a new size descriptor with explicit dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width of the rectangle in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the rectangle in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }
}

/// Unique identifier assigned to an enemy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnemyId(u32);

impl EnemyId {
    /// Creates a new enemy identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Hit points and combat ratings carried by every combatant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CombatStats {
    /// Remaining hit points.
    pub hp: u32,
    /// Hit point ceiling.
    pub max_hp: u32,
    /// Attack rating.
    pub attack: u32,
    /// Defense rating.
    pub defense: u32,
}

impl CombatStats {
    /// Creates stats at full health.
    #[must_use]
    pub const fn full(max_hp: u32, attack: u32, defense: u32) -> Self {
        Self {
            hp: max_hp,
            max_hp,
            attack,
            defense,
        }
    }
}

/// Capability shared by every record that occupies a grid cell.
pub trait Positioned {
    /// Cell currently occupied.
    fn cell(&self) -> CellCoord;
}

/// Capability shared by records that carry hit points.
pub trait Damageable {
    /// Current combat ratings.
    fn stats(&self) -> &CombatStats;

    /// Mutable access used when the embedding engine applies resolved damage.
    fn stats_mut(&mut self) -> &mut CombatStats;

    /// Removes `amount` hit points, saturating at zero. Returns `true` when
    /// the record was defeated by this hit.
    fn take_damage(&mut self, amount: u32) -> bool {
        let stats = self.stats_mut();
        let was_alive = stats.hp > 0;
        stats.hp = stats.hp.saturating_sub(amount);
        was_alive && stats.hp == 0
    }

    /// Reports whether any hit points remain.
    fn is_alive(&self) -> bool {
        self.stats().hp > 0
    }
}

/// Species of enemy found in the dungeon.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnemyKind {
    /// Weak and common.
    Goblin,
    /// Sturdier mid-tier brute.
    Orc,
    /// Slow, heavy hitter.
    Troll,
}

impl EnemyKind {
    /// Every kind in table order.
    pub const ALL: [EnemyKind; 3] = [EnemyKind::Goblin, EnemyKind::Orc, EnemyKind::Troll];

    /// Human readable name of the kind.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Goblin => "Goblin",
            Self::Orc => "Orc",
            Self::Troll => "Troll",
        }
    }

    /// Stats assigned to a freshly spawned enemy of this kind.
    #[must_use]
    pub const fn base_stats(self) -> CombatStats {
        match self {
            Self::Goblin => CombatStats::full(30, 5, 2),
            Self::Orc => CombatStats::full(50, 8, 4),
            Self::Troll => CombatStats::full(80, 12, 6),
        }
    }
}

/// Behavioural state of a single enemy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnemyState {
    /// Unaware of the player.
    #[default]
    Idle,
    /// Closing the distance to the player.
    Chasing,
    /// Within attack range of the player.
    Attacking,
}

/// AI memory stored with each enemy so it survives save and load.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Behaviour {
    /// Current state machine node.
    pub state: EnemyState,
    /// Consecutive turns without a usable path to the player.
    pub missed_turns: u32,
}

/// Action chosen by the AI for one enemy turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnemyAction {
    /// Stay in place.
    Wait,
    /// Move into the adjacent cell.
    Step {
        /// Destination cell, adjacent to the enemy's current cell.
        to: CellCoord,
    },
    /// Strike the player.
    Attack,
}

/// Player character record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Cell occupied by the player.
    pub cell: CellCoord,
    /// Combat ratings.
    pub stats: CombatStats,
    /// Character level.
    pub level: u32,
    /// Accumulated experience.
    pub experience: u32,
}

impl PlayerRecord {
    /// Default starting stats for a new character.
    pub const STARTING_STATS: CombatStats = CombatStats::full(100, 10, 5);

    /// Creates a level one character standing at `cell`.
    #[must_use]
    pub const fn new(cell: CellCoord) -> Self {
        Self {
            cell,
            stats: Self::STARTING_STATS,
            level: 1,
            experience: 0,
        }
    }
}

impl Positioned for PlayerRecord {
    fn cell(&self) -> CellCoord {
        self.cell
    }
}

impl Damageable for PlayerRecord {
    fn stats(&self) -> &CombatStats {
        &self.stats
    }

    fn stats_mut(&mut self) -> &mut CombatStats {
        &mut self.stats
    }
}

/// Enemy record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyRecord {
    /// Identifier assigned when the enemy spawned.
    pub id: EnemyId,
    /// Species of the enemy.
    pub kind: EnemyKind,
    /// Cell occupied by the enemy.
    pub cell: CellCoord,
    /// Combat ratings.
    pub stats: CombatStats,
    /// AI memory.
    pub behaviour: Behaviour,
}

impl EnemyRecord {
    /// Creates an idle enemy of `kind` at full health.
    #[must_use]
    pub const fn spawn(id: EnemyId, kind: EnemyKind, cell: CellCoord) -> Self {
        Self {
            id,
            kind,
            cell,
            stats: kind.base_stats(),
            behaviour: Behaviour {
                state: EnemyState::Idle,
                missed_turns: 0,
            },
        }
    }
}

impl Positioned for EnemyRecord {
    fn cell(&self) -> CellCoord {
        self.cell
    }
}

impl Damageable for EnemyRecord {
    fn stats(&self) -> &CombatStats {
        &self.stats
    }

    fn stats_mut(&mut self) -> &mut CombatStats {
        &mut self.stats
    }
}

/// Broad category of a dungeon item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    /// Damage dealing gear.
    Weapon,
    /// Protective gear.
    Armor,
    /// Consumable.
    Potion,
    /// Story item.
    Quest,
}

impl ItemKind {
    /// Every kind in table order.
    pub const ALL: [ItemKind; 4] = [
        ItemKind::Weapon,
        ItemKind::Armor,
        ItemKind::Potion,
        ItemKind::Quest,
    ];
}

/// Item lying on the dungeon floor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Category of the item.
    pub kind: ItemKind,
    /// Display name.
    pub name: String,
    /// Damage, defense, healing or quest value depending on the kind.
    pub value: u32,
    /// Cell the item lies on.
    pub cell: CellCoord,
}

impl Positioned for ItemRecord {
    fn cell(&self) -> CellCoord {
        self.cell
    }
}

/// How the generator chooses the axis of each subdivision.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitAxisPolicy {
    /// Alternate between vertical and horizontal cuts at each depth.
    Alternate,
    /// Cut across the longer side of the region.
    #[default]
    AspectRatio,
}

/// Tuning knobs for dungeon generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Smallest legal room edge, walls excluded.
    pub min_room_size: u32,
    /// Width of carved corridors in cells.
    pub corridor_width: u32,
    /// Axis selection policy for subdivision.
    pub split_axis: SplitAxisPolicy,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            min_room_size: 4,
            corridor_width: 1,
            split_axis: SplitAxisPolicy::AspectRatio,
        }
    }
}

/// Everything needed to regenerate a level's grid bit for bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LevelDescriptor {
    /// Grid width in cells.
    pub width: u32,
    /// Grid height in cells.
    pub height: u32,
    /// Seed of the generator's random stream.
    pub seed: u64,
    /// Generator configuration.
    pub generator: GeneratorConfig,
}

/// Pathfinding configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PathfinderConfig {
    /// Adjacency rule.
    pub movement: MovementRule,
    /// Upper bound on expanded nodes per query; `None` searches exhaustively.
    pub max_expansions: Option<u32>,
}

impl Default for PathfinderConfig {
    fn default() -> Self {
        Self {
            movement: MovementRule::Orthogonal,
            max_expansions: None,
        }
    }
}

/// Enemy AI configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Path distance, in steps, at which an enemy notices the player.
    pub detection_radius: u32,
    /// Path distance, in steps, from which an enemy can attack.
    pub attack_range: u32,
    /// Consecutive turns without a path after which a pursuer gives up.
    pub give_up_turns: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            detection_radius: 5,
            attack_range: 1,
            give_up_turns: 3,
        }
    }
}

/// Identifies the target of resolved damage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Combatant {
    /// The player character.
    Player,
    /// A specific enemy.
    Enemy(EnemyId),
}

/// Progress of the current run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// The run continues.
    #[default]
    InProgress,
    /// The player reached the exit.
    Victory,
    /// The player ran out of hit points.
    Defeat,
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Requests that the player move one step.
    MovePlayer {
        /// Direction of travel.
        direction: Direction,
    },
    /// Applies an AI decision to an enemy.
    EnemyAct {
        /// Enemy acting this turn.
        enemy: EnemyId,
        /// AI memory after the decision.
        behaviour: Behaviour,
        /// Chosen action.
        action: EnemyAction,
    },
    /// Applies damage resolved by the embedding engine.
    ApplyDamage {
        /// Who receives the damage.
        target: Combatant,
        /// Hit points removed.
        amount: u32,
    },
    /// Closes the current turn.
    AdvanceTurn,
}

/// Reasons a movement request may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveError {
    /// The destination lies outside the grid.
    OutOfBounds,
    /// The destination is a wall.
    Blocked,
    /// Another entity stands on the destination.
    Occupied,
    /// The destination is not adjacent to the mover.
    NotAdjacent,
    /// The run has already ended.
    Finished,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Confirms that the player moved.
    PlayerMoved {
        /// Cell occupied before the move.
        from: CellCoord,
        /// Cell occupied after the move.
        to: CellCoord,
    },
    /// Reports that a player move was rejected.
    PlayerBlocked {
        /// Direction that was attempted.
        direction: Direction,
        /// Specific reason the move failed.
        reason: MoveError,
    },
    /// Confirms that an enemy moved.
    EnemyMoved {
        /// Enemy that moved.
        enemy: EnemyId,
        /// Cell occupied before the move.
        from: CellCoord,
        /// Cell occupied after the move.
        to: CellCoord,
    },
    /// Reports that an enemy step was rejected.
    EnemyBlocked {
        /// Enemy whose step failed.
        enemy: EnemyId,
        /// Specific reason the step failed.
        reason: MoveError,
    },
    /// Announces a new AI state for an enemy.
    EnemyStateChanged {
        /// Enemy whose state changed.
        enemy: EnemyId,
        /// State before the change.
        from: EnemyState,
        /// State after the change.
        to: EnemyState,
    },
    /// Reports an attack on the player; damage is resolved by the caller.
    EnemyAttacked {
        /// Attacking enemy.
        enemy: EnemyId,
        /// Attack rating of the attacker.
        attack: u32,
    },
    /// Confirms damage applied to a combatant.
    Damaged {
        /// Who received the damage.
        target: Combatant,
        /// Hit points remaining afterwards.
        remaining: u32,
    },
    /// Announces that an enemy was defeated and removed.
    EnemyDefeated {
        /// Defeated enemy.
        enemy: EnemyId,
    },
    /// Announces that the player was defeated.
    PlayerDefeated,
    /// Announces that the player reached the exit.
    ExitReached,
    /// Confirms that a turn closed.
    TurnAdvanced {
        /// Number of the turn that starts now.
        turn: u64,
    },
}

/// Complete, serialisable state of a run handed to the save codec.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    /// Turns completed so far.
    pub turn: u64,
    /// Level from which the grid is regenerated on load.
    pub level: LevelDescriptor,
    /// Exit cell.
    pub exit: CellCoord,
    /// Player record.
    pub player: PlayerRecord,
    /// Living enemies ordered by identifier.
    pub enemies: Vec<EnemyRecord>,
    /// Items lying on the floor.
    pub items: Vec<ItemRecord>,
    /// Progress of the run.
    pub outcome: Outcome,
}
