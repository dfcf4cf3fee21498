#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter for generating, exploring and saving Delve runs.

mod config;
mod ledger;
mod render;
mod session;

use std::{
    path::{Path, PathBuf},
    process::ExitCode,
    str::FromStr,
};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use delve_core::{CellCoord, GameSnapshot, LevelDescriptor};
use delve_system_ai::{Controller, EnemyAi};
use delve_system_bootstrap::Bootstrap;
use delve_system_generation::generate_layout;
use delve_system_pathfinding::{PathOutcome, Pathfinder};
use delve_system_persistence::{load, save, SaveFile, SaveKey, SAVE_KEY_ENV};
use delve_world::{query, World};

use crate::{config::DelveConfig, ledger::NonceLedger, render::draw_world, session::Session};

/// Delve: procedurally generated dungeon crawling in the terminal.
#[derive(Parser, Debug)]
#[command(name = "delve", version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Level selection shared by every subcommand that builds a level.
#[derive(Args, Debug, Clone, Copy)]
struct LevelArgs {
    /// Grid width in cells
    #[arg(long, default_value_t = 40)]
    width: u32,

    /// Grid height in cells
    #[arg(long, default_value_t = 20)]
    height: u32,

    /// Level seed
    #[arg(short, long, default_value_t = 42)]
    seed: u64,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a level and print its map
    Generate {
        #[command(flatten)]
        level: LevelArgs,
    },

    /// Find a path between two cells of a generated level
    Path {
        #[command(flatten)]
        level: LevelArgs,

        /// Start cell as `column,row` (default: centre of the first room)
        #[arg(long)]
        from: Option<Cell>,

        /// Goal cell as `column,row` (default: centre of the last room)
        #[arg(long)]
        to: Option<Cell>,
    },

    /// Play a level with the autopilot walking to the exit
    Play {
        #[command(flatten)]
        level: LevelArgs,

        /// Maximum turns to play
        #[arg(short, long, default_value_t = 200)]
        turns: u64,

        /// Write an authenticated save when play stops
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Verify a save, optionally play on, and save again under a fresh nonce
    Load {
        /// Save file to open
        save: PathBuf,

        /// Turns to play after loading
        #[arg(short, long, default_value_t = 0)]
        turns: u64,
    },
}

/// Cell coordinate parsed from `column,row`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Cell(CellCoord);

impl FromStr for Cell {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let (column, row) = text
            .split_once(',')
            .ok_or_else(|| format!("expected `column,row`, got `{text}`"))?;
        let column = column
            .trim()
            .parse()
            .map_err(|error| format!("bad column `{column}`: {error}"))?;
        let row = row
            .trim()
            .parse()
            .map_err(|error| format!("bad row `{row}`: {error}"))?;
        Ok(Self(CellCoord::new(column, row)))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("delve: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = DelveConfig::load(cli.config.as_deref())?;
    match cli.command {
        Commands::Generate { level } => generate(&config, level),
        Commands::Path { level, from, to } => path(&config, level, from, to),
        Commands::Play { level, turns, save } => play(&config, level, turns, save),
        Commands::Load { save, turns } => resume(&config, save, turns),
    }
}

fn descriptor(config: &DelveConfig, level: LevelArgs) -> LevelDescriptor {
    LevelDescriptor {
        width: level.width,
        height: level.height,
        seed: level.seed,
        generator: config.generator,
    }
}

fn generate(config: &DelveConfig, level: LevelArgs) -> Result<()> {
    let layout = generate_layout(level.width, level.height, level.seed, &config.generator)?;
    print!("{}", render::draw(layout.grid(), &Default::default()));
    println!(
        "{} rooms, {} corridors, {} walkable cells",
        layout.rooms().len(),
        layout.links().len(),
        layout.grid().walkable_cells().count()
    );
    Ok(())
}

fn path(config: &DelveConfig, level: LevelArgs, from: Option<Cell>, to: Option<Cell>) -> Result<()> {
    let layout = generate_layout(level.width, level.height, level.seed, &config.generator)?;
    let rooms = layout.rooms();
    let start = from
        .map(|cell| cell.0)
        .or_else(|| rooms.first().map(|room| room.center()))
        .ok_or_else(|| anyhow!("level has no rooms to start from"))?;
    let goal = to
        .map(|cell| cell.0)
        .or_else(|| rooms.last().map(|room| room.center()))
        .ok_or_else(|| anyhow!("level has no rooms to walk to"))?;

    let pathfinder = Pathfinder::new(config.pathfinder);
    match pathfinder.find_path(layout.grid(), start, goal)? {
        PathOutcome::Found(found) => {
            print!("{}", render::draw_path(layout.grid(), found.cells()));
            println!("{} steps, cost {}", found.steps(), found.cost());
        }
        PathOutcome::NotFound => println!("no path between {start:?} and {goal:?}"),
        PathOutcome::BudgetExhausted => println!("search budget exhausted before reaching {goal:?}"),
    }
    Ok(())
}

fn session(config: &DelveConfig, world: World) -> Session {
    let pathfinder = Pathfinder::new(config.pathfinder);
    let ai = EnemyAi::new(Controller::with_pathfinder(config.ai, pathfinder.clone()));
    Session::new(world, ai, pathfinder)
}

fn bootstrap(config: &DelveConfig) -> Bootstrap {
    Bootstrap::new(config.spawning, config.pathfinder.movement)
}

fn play(config: &DelveConfig, level: LevelArgs, turns: u64, save_path: Option<PathBuf>) -> Result<()> {
    let world = bootstrap(config).build(descriptor(config, level))?;
    let mut session = session(config, world);
    let outcome = session.run(turns)?;
    report(session.world());
    log::info!("stopped with outcome {outcome:?}");

    if let Some(path) = save_path {
        write_save(&path, &query::snapshot(session.world()))?;
        println!("saved to {}", path.display());
    }
    Ok(())
}

fn resume(config: &DelveConfig, save_path: PathBuf, turns: u64) -> Result<()> {
    let key = SaveKey::from_env(SAVE_KEY_ENV)?;
    let mut ledger = NonceLedger::read(&save_path)?;
    let envelope = SaveFile::new(&save_path).read()?;
    let snapshot: GameSnapshot = load(&envelope, &key, ledger.last_accepted())
        .with_context(|| format!("refusing save {}", save_path.display()))?;
    ledger.record_accepted(envelope.nonce());
    ledger.write(&save_path)?;

    let world = bootstrap(config).restore(snapshot)?;
    let mut session = session(config, world);
    let _ = session.run(turns)?;
    // The accepted nonce is spent; reissue so the file stays loadable.
    write_save(&save_path, &query::snapshot(session.world()))?;
    println!("saved to {}", save_path.display());
    report(session.world());
    Ok(())
}

fn write_save(path: &Path, snapshot: &GameSnapshot) -> Result<()> {
    let key = SaveKey::from_env(SAVE_KEY_ENV)?;
    write_save_with(path, snapshot, &key)
}

fn write_save_with(path: &Path, snapshot: &GameSnapshot, key: &SaveKey) -> Result<()> {
    let mut ledger = NonceLedger::read(path)?;
    let mut counter = ledger.counter();
    let envelope = save(snapshot, key, &mut counter)?;
    // Spend the nonce on disk first so a crash can never reissue it.
    ledger.record_issued(&counter);
    ledger.write(path)?;
    SaveFile::new(path).write(&envelope)?;
    Ok(())
}

fn report(world: &World) {
    print!("{}", draw_world(world));
    let player = query::player(world);
    println!(
        "turn {}: {:?}, hp {}/{}, {} enemies left",
        query::turn(world),
        query::outcome(world),
        player.stats.hp,
        player.stats.max_hp,
        query::enemies(world).len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_parse_from_column_and_row() {
        assert_eq!("3,4".parse::<Cell>(), Ok(Cell(CellCoord::new(3, 4))));
        assert_eq!(" 10 , 2 ".parse::<Cell>(), Ok(Cell(CellCoord::new(10, 2))));
        assert!("3".parse::<Cell>().is_err());
        assert!("a,4".parse::<Cell>().is_err());
        assert!("-1,4".parse::<Cell>().is_err());
    }

    #[test]
    fn command_line_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn saved_runs_resume_once() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("run.sav");
        let config = DelveConfig::default();
        let level = LevelArgs {
            width: 40,
            height: 20,
            seed: 7,
        };
        let world = bootstrap(&config)
            .build(descriptor(&config, level))
            .expect("builds");
        let snapshot = query::snapshot(&world);

        let key = SaveKey::new(vec![7; 32]).expect("long enough");
        let mut ledger = NonceLedger::read(&path).expect("fresh");
        let mut counter = ledger.counter();
        let envelope = save(&snapshot, &key, &mut counter).expect("saves");
        SaveFile::new(&path).write(&envelope).expect("writes");
        ledger.record_issued(&counter);

        let stored = SaveFile::new(&path).read().expect("reads");
        let restored: GameSnapshot =
            load(&stored, &key, ledger.last_accepted()).expect("first load");
        ledger.record_accepted(stored.nonce());
        assert_eq!(restored, snapshot);
        assert!(load::<GameSnapshot>(&stored, &key, ledger.last_accepted()).is_err());
    }

    #[test]
    fn every_save_spends_a_fresh_nonce_in_the_ledger() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("run.sav");
        let config = DelveConfig::default();
        let level = LevelArgs {
            width: 40,
            height: 20,
            seed: 3,
        };
        let snapshot = query::snapshot(
            &bootstrap(&config)
                .build(descriptor(&config, level))
                .expect("builds"),
        );
        let key = SaveKey::new(vec![3; 32]).expect("long enough");

        write_save_with(&path, &snapshot, &key).expect("first save");
        let first = SaveFile::new(&path).read().expect("reads");
        assert_eq!(
            NonceLedger::read(&path).expect("ledger").counter().last_issued(),
            first.nonce()
        );

        write_save_with(&path, &snapshot, &key).expect("second save");
        let second = SaveFile::new(&path).read().expect("reads");
        assert!(second.nonce() > first.nonce());
        assert_eq!(
            NonceLedger::read(&path).expect("ledger").counter().last_issued(),
            second.nonce()
        );
        let restored: GameSnapshot = load(&second, &key, first.nonce()).expect("loads");
        assert_eq!(restored, snapshot);
    }
}
