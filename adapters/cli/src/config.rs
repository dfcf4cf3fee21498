//! Optional TOML configuration shared by every subcommand.

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use delve_core::{AiConfig, GeneratorConfig, PathfinderConfig};
use delve_system_spawning::SpawnConfig;
use serde::{Deserialize, Serialize};

/// Configuration format understood by this binary.
pub(crate) const CONFIG_VERSION: u32 = 1;

/// Tunables loaded from `delve.toml`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct DelveConfig {
    /// Format version; must equal [`CONFIG_VERSION`].
    pub version: u32,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub pathfinder: PathfinderConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub spawning: SpawnConfig,
}

impl Default for DelveConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            generator: GeneratorConfig::default(),
            pathfinder: PathfinderConfig::default(),
            ai: AiConfig::default(),
            spawning: SpawnConfig::default(),
        }
    }
}

impl DelveConfig {
    /// Reads the file at `path`, or the defaults when no path was given.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("could not read config {}", path.display()))?;
        let config =
            Self::parse(&text).with_context(|| format!("invalid config {}", path.display()))?;
        log::info!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parses TOML text and checks the version and spawn chances.
    pub(crate) fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        if config.version != CONFIG_VERSION {
            bail!(
                "config version {} is not supported, expected {CONFIG_VERSION}",
                config.version
            );
        }
        config.spawning.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_core::{MovementRule, SplitAxisPolicy};

    #[test]
    fn partial_tables_fall_back_to_defaults() {
        let config = DelveConfig::parse(
            r#"
            version = 1

            [generator]
            min_room_size = 5
            split_axis = "alternate"

            [pathfinder]
            movement = "diagonal"
            max_expansions = 500

            [spawning]
            enemy_chance = 0.5
            "#,
        )
        .expect("valid config");

        assert_eq!(config.generator.min_room_size, 5);
        assert_eq!(config.generator.corridor_width, 1);
        assert_eq!(config.generator.split_axis, SplitAxisPolicy::Alternate);
        assert_eq!(config.pathfinder.movement, MovementRule::Diagonal);
        assert_eq!(config.pathfinder.max_expansions, Some(500));
        assert_eq!(config.ai, AiConfig::default());
        assert!((config.spawning.enemy_chance - 0.5).abs() < f64::EPSILON);
        assert!((config.spawning.item_chance - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn version_is_required_and_checked() {
        assert!(DelveConfig::parse("[ai]\ndetection_radius = 3\n").is_err());
        assert!(DelveConfig::parse("version = 2\n").is_err());
        assert_eq!(
            DelveConfig::parse("version = 1\n").expect("valid"),
            DelveConfig::default()
        );
    }

    #[test]
    fn bad_chances_are_rejected() {
        assert!(DelveConfig::parse("version = 1\n[spawning]\nitem_chance = 2.0\n").is_err());
    }
}
