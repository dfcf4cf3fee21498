#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Assembles playable worlds from level descriptors and saved snapshots.

use delve_core::{CellCoord, GameSnapshot, LevelDescriptor, MovementRule, PlayerRecord};
use delve_system_generation::{level_layout, GenerationError, Layout};
use delve_system_spawning::{SpawnConfig, SpawnError, Spawning};
use delve_world::{Population, World, WorldError};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Label of the random stream used to populate rooms.
pub const RNG_STREAM_SPAWNING: &str = "spawning";

/// Errors raised while preparing a world.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The level could not be generated.
    #[error(transparent)]
    Generation(#[from] GenerationError),
    /// Spawn tuning was rejected.
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    /// Records could not be placed on the grid.
    #[error(transparent)]
    World(#[from] WorldError),
    /// The generator produced no room to start in.
    #[error("level {width}x{height} with seed {seed} has no rooms")]
    NoRooms {
        /// Level width.
        width: u32,
        /// Level height.
        height: u32,
        /// Level seed.
        seed: u64,
    },
    /// A single-room level whose room has no cell besides its centre.
    #[error("level with seed {seed} has a single 1x1 room and no cell for the exit")]
    NoExitCell {
        /// Level seed.
        seed: u64,
    },
}

/// Builds new worlds and rebuilds saved ones.
#[derive(Clone, Copy, Debug, Default)]
pub struct Bootstrap {
    spawn: SpawnConfig,
    movement: MovementRule,
}

impl Bootstrap {
    /// Creates a bootstrapper with the provided spawn tuning and movement rule.
    #[must_use]
    pub const fn new(spawn: SpawnConfig, movement: MovementRule) -> Self {
        Self { spawn, movement }
    }

    /// Generates the level, puts the player in the first room and the exit in
    /// the last, and populates the remaining rooms. On a single-room level the
    /// exit takes another cell of that room.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError`] when generation, spawning or placement fails,
    /// or when a lone room is too small to hold both start and exit.
    pub fn build(&self, level: LevelDescriptor) -> Result<World, BootstrapError> {
        let layout = level_layout(&level)?;
        let (start, exit) = endpoints(&layout, &level)?;

        let mut spawning = Spawning::new(
            self.spawn,
            derive_labeled_seed(level.seed, RNG_STREAM_SPAWNING),
        )?;
        let spawned = spawning.populate(layout.rooms());

        log::info!(
            "level {}x{} seed {}: start {:?}, exit {:?}",
            level.width,
            level.height,
            level.seed,
            start,
            exit
        );

        let population = Population {
            player: PlayerRecord::new(start),
            enemies: spawned.enemies,
            items: spawned.items,
            exit,
        };
        Ok(World::new(layout.into_grid(), level, self.movement, population)?)
    }

    /// Regenerates the snapshot's level and places the saved records on it.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError`] when the level cannot be regenerated or the
    /// records do not fit the regenerated grid.
    pub fn restore(&self, snapshot: GameSnapshot) -> Result<World, BootstrapError> {
        let layout = level_layout(&snapshot.level)?;
        log::info!(
            "restoring turn {} on level seed {}",
            snapshot.turn,
            snapshot.level.seed
        );
        Ok(World::restore(layout.into_grid(), snapshot, self.movement)?)
    }
}

/// Start and exit cells. A lone room keeps the start at its centre and moves
/// the exit to its top-left cell.
fn endpoints(
    layout: &Layout,
    level: &LevelDescriptor,
) -> Result<(CellCoord, CellCoord), BootstrapError> {
    let rooms = layout.rooms();
    let (Some(first), Some(last)) = (rooms.first(), rooms.last()) else {
        return Err(BootstrapError::NoRooms {
            width: level.width,
            height: level.height,
            seed: level.seed,
        });
    };
    let start = first.center();
    if rooms.len() > 1 {
        return Ok((start, last.center()));
    }
    let exit = first.origin();
    if exit == start {
        return Err(BootstrapError::NoExitCell { seed: level.seed });
    }
    log::debug!("single-room level: exit moved off the start to {exit:?}");
    Ok((start, exit))
}

/// Derives an independent stream seed from a base seed and a label.
#[must_use]
pub fn derive_labeled_seed(base: u64, label: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(base.to_le_bytes());
    hasher.update(label.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0_u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}
