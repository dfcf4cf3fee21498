#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic population of generated rooms with enemies and items.

use delve_core::{CellCoord, CellRect, EnemyId, EnemyKind, EnemyRecord, ItemKind, ItemRecord};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised for unusable spawn tuning.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum SpawnError {
    /// A probability lies outside `[0, 1]` or is not a number.
    #[error("{name} must be a probability in [0, 1], got {value}")]
    InvalidChance {
        /// Which setting is wrong.
        name: &'static str,
        /// Offending value.
        value: f64,
    },
}

/// Per-room spawn probabilities.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    /// Chance that a room receives an enemy.
    pub enemy_chance: f64,
    /// Chance that a room receives an item.
    pub item_chance: f64,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            enemy_chance: 0.3,
            item_chance: 0.25,
        }
    }
}

impl SpawnConfig {
    /// Checks that both chances are probabilities.
    ///
    /// # Errors
    ///
    /// Returns [`SpawnError::InvalidChance`] for the first bad value.
    pub fn validate(&self) -> Result<(), SpawnError> {
        for (name, value) in [("enemy_chance", self.enemy_chance), ("item_chance", self.item_chance)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SpawnError::InvalidChance { name, value });
            }
        }
        Ok(())
    }
}

/// Entities placed on a level.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Spawned {
    /// Enemies with identifiers assigned from one upwards.
    pub enemies: Vec<EnemyRecord>,
    /// Items lying on the floor.
    pub items: Vec<ItemRecord>,
}

struct ItemTable {
    kind: ItemKind,
    prefixes: &'static [&'static str],
    nouns: &'static [&'static str],
    values: (u32, u32),
}

const ITEM_TABLES: [ItemTable; 4] = [
    ItemTable {
        kind: ItemKind::Weapon,
        prefixes: &["Iron", "Steel", "Mithril"],
        nouns: &["Sword", "Axe", "Dagger"],
        values: (5, 15),
    },
    ItemTable {
        kind: ItemKind::Armor,
        prefixes: &["Leather", "Chainmail", "Plate"],
        nouns: &["Armor", "Helmet", "Shield"],
        values: (3, 10),
    },
    ItemTable {
        kind: ItemKind::Potion,
        prefixes: &["Healing", "Mana", "Strength"],
        nouns: &["Potion"],
        values: (10, 30),
    },
    ItemTable {
        kind: ItemKind::Quest,
        prefixes: &["Ancient", "Cursed", "Sacred"],
        nouns: &["Artifact", "Relic", "Scroll"],
        values: (50, 100),
    },
];

/// Seeded room populator.
#[derive(Debug)]
pub struct Spawning {
    config: SpawnConfig,
    rng: ChaCha8Rng,
}

impl Spawning {
    /// Creates a populator drawing from a stream seeded with `seed`.
    ///
    /// # Errors
    ///
    /// Returns [`SpawnError`] when the configuration is invalid.
    pub fn new(config: SpawnConfig, seed: u64) -> Result<Self, SpawnError> {
        config.validate()?;
        Ok(Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// Rolls an enemy and an item for every room but the first, placing
    /// both at the room's center.
    pub fn populate(&mut self, rooms: &[CellRect]) -> Spawned {
        let mut spawned = Spawned::default();
        let mut next_id = 1;

        for room in rooms.iter().skip(1) {
            let cell = room.center();
            if self.rng.gen_bool(self.config.enemy_chance) {
                let kind = *EnemyKind::ALL
                    .choose(&mut self.rng)
                    .unwrap_or(&EnemyKind::Goblin);
                spawned
                    .enemies
                    .push(EnemyRecord::spawn(EnemyId::new(next_id), kind, cell));
                next_id += 1;
            }
            if self.rng.gen_bool(self.config.item_chance) {
                spawned.items.push(self.roll_item(cell));
            }
        }

        log::info!(
            "spawned {} enemies and {} items across {} rooms",
            spawned.enemies.len(),
            spawned.items.len(),
            rooms.len()
        );
        spawned
    }

    fn roll_item(&mut self, cell: CellCoord) -> ItemRecord {
        let index = self.rng.gen_range(0..ITEM_TABLES.len());
        let table = &ITEM_TABLES[index];
        let prefix = table.prefixes.choose(&mut self.rng).copied().unwrap_or_default();
        let noun = table.nouns.choose(&mut self.rng).copied().unwrap_or_default();
        let (low, high) = table.values;
        ItemRecord {
            kind: table.kind,
            name: format!("{prefix} {noun}"),
            value: self.rng.gen_range(low..=high),
            cell,
        }
    }
}
