#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Delve.
//!
//! The world owns the immutable [`Grid`] of the current level together with
//! the entity records standing on it. Entities reference cells; occupancy is
//! an overlay kept beside the grid and never written into it. All mutation
//! flows through [`apply`], which validates a [`Command`] and reports the
//! outcome as [`Event`] values.

mod grid;
pub mod navigation;

use delve_core::{
    CellCoord, Combatant, Command, Damageable, Direction, EnemyAction, EnemyId, EnemyRecord,
    Event, GameSnapshot, ItemRecord, LevelDescriptor, MoveError, MovementRule, Outcome,
    PlayerRecord,
};
use thiserror::Error;

pub use grid::{Grid, GridBuilder, GridError};

/// Reasons a world cannot be assembled from the provided records.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum WorldError {
    /// An entity or the exit was placed on a wall or outside the grid.
    #[error("cell ({}, {}) is not walkable", .cell.column(), .cell.row())]
    NotWalkable {
        /// Offending cell.
        cell: CellCoord,
    },
    /// Two entities were placed on the same cell.
    #[error("cell ({}, {}) is occupied twice", .cell.column(), .cell.row())]
    Overlap {
        /// Offending cell.
        cell: CellCoord,
    },
    /// Two enemies share an identifier.
    #[error("enemy identifier {0} is used twice")]
    DuplicateEnemy(u32),
    /// The snapshot was taken on a level with different dimensions.
    #[error("snapshot level is {expected_width}x{expected_height} but grid is {width}x{height}")]
    DimensionMismatch {
        /// Width recorded in the snapshot.
        expected_width: u32,
        /// Height recorded in the snapshot.
        expected_height: u32,
        /// Width of the provided grid.
        width: u32,
        /// Height of the provided grid.
        height: u32,
    },
}

/// Records placed on a level when a world is created.
#[derive(Clone, Debug)]
pub struct Population {
    /// Player character.
    pub player: PlayerRecord,
    /// Enemies in any order; the world sorts them by identifier.
    pub enemies: Vec<EnemyRecord>,
    /// Items lying on the floor.
    pub items: Vec<ItemRecord>,
    /// Cell that ends the run when the player reaches it.
    pub exit: CellCoord,
}

/// Represents the authoritative Delve world state.
#[derive(Debug)]
pub struct World {
    grid: Grid,
    level: LevelDescriptor,
    movement: MovementRule,
    player: PlayerRecord,
    enemies: Vec<EnemyRecord>,
    items: Vec<ItemRecord>,
    exit: CellCoord,
    occupancy: OccupancyGrid,
    turn: u64,
    outcome: Outcome,
}

impl World {
    /// Creates a world at turn zero.
    ///
    /// # Errors
    ///
    /// Returns a [`WorldError`] when any record stands on an unwalkable cell,
    /// two combatants share a cell, or two enemies share an identifier.
    pub fn new(
        grid: Grid,
        level: LevelDescriptor,
        movement: MovementRule,
        population: Population,
    ) -> Result<Self, WorldError> {
        Self::assemble(grid, level, movement, population, 0, Outcome::InProgress)
    }

    /// Rebuilds a world from a saved snapshot and the regenerated grid.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::DimensionMismatch`] when the grid does not match
    /// the snapshot's level, or any placement error from [`World::new`].
    pub fn restore(
        grid: Grid,
        snapshot: GameSnapshot,
        movement: MovementRule,
    ) -> Result<Self, WorldError> {
        if grid.dimensions() != (snapshot.level.width, snapshot.level.height) {
            return Err(WorldError::DimensionMismatch {
                expected_width: snapshot.level.width,
                expected_height: snapshot.level.height,
                width: grid.width(),
                height: grid.height(),
            });
        }
        let population = Population {
            player: snapshot.player,
            enemies: snapshot.enemies,
            items: snapshot.items,
            exit: snapshot.exit,
        };
        Self::assemble(
            grid,
            snapshot.level,
            movement,
            population,
            snapshot.turn,
            snapshot.outcome,
        )
    }

    fn assemble(
        grid: Grid,
        level: LevelDescriptor,
        movement: MovementRule,
        population: Population,
        turn: u64,
        outcome: Outcome,
    ) -> Result<Self, WorldError> {
        let Population {
            player,
            mut enemies,
            items,
            exit,
        } = population;

        let placed = std::iter::once(player.cell)
            .chain(enemies.iter().map(|enemy| enemy.cell))
            .chain(items.iter().map(|item| item.cell))
            .chain(std::iter::once(exit));
        for cell in placed {
            if !grid.is_walkable(cell) {
                return Err(WorldError::NotWalkable { cell });
            }
        }

        enemies.sort_by_key(|enemy| enemy.id);
        for pair in enemies.windows(2) {
            if pair[0].id == pair[1].id {
                return Err(WorldError::DuplicateEnemy(pair[0].id.get()));
            }
        }

        let mut occupancy = OccupancyGrid::new(grid.width(), grid.height());
        occupancy.occupy(Combatant::Player, player.cell);
        for enemy in &enemies {
            if !occupancy.can_enter(enemy.cell) {
                return Err(WorldError::Overlap { cell: enemy.cell });
            }
            occupancy.occupy(Combatant::Enemy(enemy.id), enemy.cell);
        }

        log::debug!(
            "world assembled: {}x{} grid, {} enemies, {} items, turn {turn}",
            grid.width(),
            grid.height(),
            enemies.len(),
            items.len()
        );

        Ok(Self {
            grid,
            level,
            movement,
            player,
            enemies,
            items,
            exit,
            occupancy,
            turn,
            outcome,
        })
    }

    fn enemy_index(&self, enemy: EnemyId) -> Option<usize> {
        self.enemies
            .binary_search_by_key(&enemy, |record| record.id)
            .ok()
    }

    fn validate_step(&self, from: CellCoord, to: CellCoord) -> Result<Direction, MoveError> {
        if self.outcome != Outcome::InProgress {
            return Err(MoveError::Finished);
        }
        if !self.grid.contains(to) {
            return Err(MoveError::OutOfBounds);
        }
        let direction = Direction::between(from, to).ok_or(MoveError::NotAdjacent)?;
        if !self.movement.directions().contains(&direction) {
            return Err(MoveError::NotAdjacent);
        }
        if !self.grid.can_step(from, direction) {
            return Err(MoveError::Blocked);
        }
        if !self.occupancy.can_enter(to) {
            return Err(MoveError::Occupied);
        }
        Ok(direction)
    }

    fn move_player(&mut self, direction: Direction, out_events: &mut Vec<Event>) {
        let from = self.player.cell;
        let result = match from.step(direction) {
            Some(to) => self.validate_step(from, to).map(|_| to),
            None if self.outcome != Outcome::InProgress => Err(MoveError::Finished),
            None => Err(MoveError::OutOfBounds),
        };

        let to = match result {
            Ok(to) => to,
            Err(reason) => {
                out_events.push(Event::PlayerBlocked { direction, reason });
                return;
            }
        };

        self.occupancy.vacate(from);
        self.occupancy.occupy(Combatant::Player, to);
        self.player.cell = to;
        out_events.push(Event::PlayerMoved { from, to });

        if to == self.exit {
            self.outcome = Outcome::Victory;
            log::info!("player reached the exit on turn {}", self.turn);
            out_events.push(Event::ExitReached);
        }
    }

    fn enemy_act(
        &mut self,
        enemy: EnemyId,
        behaviour: delve_core::Behaviour,
        action: EnemyAction,
        out_events: &mut Vec<Event>,
    ) {
        let Some(index) = self.enemy_index(enemy) else {
            log::warn!("ignoring action for unknown enemy {}", enemy.get());
            return;
        };

        let previous = self.enemies[index].behaviour.state;
        self.enemies[index].behaviour = behaviour;
        if previous != behaviour.state {
            out_events.push(Event::EnemyStateChanged {
                enemy,
                from: previous,
                to: behaviour.state,
            });
        }

        match action {
            EnemyAction::Wait => {}
            EnemyAction::Step { to } => {
                let from = self.enemies[index].cell;
                match self.validate_step(from, to) {
                    Ok(_) => {
                        self.occupancy.vacate(from);
                        self.occupancy.occupy(Combatant::Enemy(enemy), to);
                        self.enemies[index].cell = to;
                        out_events.push(Event::EnemyMoved { enemy, from, to });
                    }
                    Err(reason) => out_events.push(Event::EnemyBlocked { enemy, reason }),
                }
            }
            EnemyAction::Attack => {
                if self.outcome == Outcome::InProgress {
                    out_events.push(Event::EnemyAttacked {
                        enemy,
                        attack: self.enemies[index].stats.attack,
                    });
                }
            }
        }
    }

    fn apply_damage(&mut self, target: Combatant, amount: u32, out_events: &mut Vec<Event>) {
        match target {
            Combatant::Player => {
                let defeated = self.player.take_damage(amount);
                out_events.push(Event::Damaged {
                    target,
                    remaining: self.player.stats.hp,
                });
                if defeated {
                    self.outcome = Outcome::Defeat;
                    log::info!("player defeated on turn {}", self.turn);
                    out_events.push(Event::PlayerDefeated);
                }
            }
            Combatant::Enemy(enemy) => {
                let Some(index) = self.enemy_index(enemy) else {
                    return;
                };
                let defeated = self.enemies[index].take_damage(amount);
                out_events.push(Event::Damaged {
                    target,
                    remaining: self.enemies[index].stats.hp,
                });
                if defeated {
                    let record = self.enemies.remove(index);
                    self.occupancy.vacate(record.cell);
                    log::info!("defeated {} {}", record.kind.display_name(), enemy.get());
                    out_events.push(Event::EnemyDefeated { enemy });
                }
            }
        }
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::MovePlayer { direction } => world.move_player(direction, out_events),
        Command::EnemyAct {
            enemy,
            behaviour,
            action,
        } => world.enemy_act(enemy, behaviour, action, out_events),
        Command::ApplyDamage { target, amount } => world.apply_damage(target, amount, out_events),
        Command::AdvanceTurn => {
            world.turn = world.turn.saturating_add(1);
            out_events.push(Event::TurnAdvanced { turn: world.turn });
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use super::{Grid, OccupancyGrid, World};
    use delve_core::{
        CellCoord, Combatant, EnemyId, EnemyRecord, GameSnapshot, ItemRecord, LevelDescriptor,
        MovementRule, Outcome, PlayerRecord,
    };

    /// Provides read-only access to the level's terrain.
    #[must_use]
    pub fn grid(world: &World) -> &Grid {
        &world.grid
    }

    /// Descriptor from which the grid was generated.
    #[must_use]
    pub fn level(world: &World) -> LevelDescriptor {
        world.level
    }

    /// Adjacency rule enforced for every move.
    #[must_use]
    pub fn movement_rule(world: &World) -> MovementRule {
        world.movement
    }

    /// Player record.
    #[must_use]
    pub fn player(world: &World) -> &PlayerRecord {
        &world.player
    }

    /// Living enemies ordered by identifier.
    #[must_use]
    pub fn enemies(world: &World) -> &[EnemyRecord] {
        &world.enemies
    }

    /// Looks up a single enemy.
    #[must_use]
    pub fn enemy(world: &World, enemy: EnemyId) -> Option<&EnemyRecord> {
        world.enemy_index(enemy).map(|index| &world.enemies[index])
    }

    /// Items lying on the floor.
    #[must_use]
    pub fn items(world: &World) -> &[ItemRecord] {
        &world.items
    }

    /// Cell that ends the run.
    #[must_use]
    pub fn exit(world: &World) -> CellCoord {
        world.exit
    }

    /// Turns completed so far.
    #[must_use]
    pub fn turn(world: &World) -> u64 {
        world.turn
    }

    /// Progress of the run.
    #[must_use]
    pub fn outcome(world: &World) -> Outcome {
        world.outcome
    }

    /// Exposes a read-only view of the occupancy overlay.
    #[must_use]
    pub fn occupancy_view(world: &World) -> OccupancyView<'_> {
        OccupancyView {
            grid: &world.occupancy,
        }
    }

    /// Captures everything required to resume the run later.
    #[must_use]
    pub fn snapshot(world: &World) -> GameSnapshot {
        GameSnapshot {
            turn: world.turn,
            level: world.level,
            exit: world.exit,
            player: world.player.clone(),
            enemies: world.enemies.clone(),
            items: world.items.clone(),
            outcome: world.outcome,
        }
    }

    /// Read-only view into the occupancy overlay.
    #[derive(Clone, Copy, Debug)]
    pub struct OccupancyView<'a> {
        grid: &'a OccupancyGrid,
    }

    impl OccupancyView<'_> {
        /// Returns the combatant standing on the provided cell, if any.
        #[must_use]
        pub fn occupant(&self, cell: CellCoord) -> Option<Combatant> {
            self.grid
                .index(cell)
                .and_then(|index| self.grid.cells().get(index).copied().flatten())
        }

        /// Reports whether the cell is currently free for traversal.
        #[must_use]
        pub fn is_free(&self, cell: CellCoord) -> bool {
            self.grid.can_enter(cell)
        }
    }
}

#[derive(Clone, Debug)]
struct OccupancyGrid {
    columns: u32,
    rows: u32,
    cells: Vec<Option<Combatant>>,
}

impl OccupancyGrid {
    fn new(columns: u32, rows: u32) -> Self {
        let capacity_u64 = u64::from(columns) * u64::from(rows);
        let capacity = usize::try_from(capacity_u64).unwrap_or(0);
        Self {
            columns,
            rows,
            cells: vec![None; capacity],
        }
    }

    fn can_enter(&self, cell: CellCoord) -> bool {
        self.index(cell)
            .is_some_and(|index| self.cells.get(index).copied().flatten().is_none())
    }

    fn occupy(&mut self, occupant: Combatant, cell: CellCoord) {
        if let Some(index) = self.index(cell) {
            if let Some(slot) = self.cells.get_mut(index) {
                *slot = Some(occupant);
            }
        }
    }

    fn vacate(&mut self, cell: CellCoord) {
        if let Some(index) = self.index(cell) {
            if let Some(slot) = self.cells.get_mut(index) {
                *slot = None;
            }
        }
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        if cell.column() < self.columns && cell.row() < self.rows {
            let row = usize::try_from(cell.row()).ok()?;
            let column = usize::try_from(cell.column()).ok()?;
            let width = usize::try_from(self.columns).ok()?;
            Some(row * width + column)
        } else {
            None
        }
    }

    fn cells(&self) -> &[Option<Combatant>] {
        &self.cells
    }
}
