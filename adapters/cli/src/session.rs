//! Turn loop that drives a world with an autopiloted player.

use anyhow::Result;
use delve_core::{Combatant, Command, Direction, Event, Outcome};
use delve_system_ai::EnemyAi;
use delve_system_pathfinding::{PathOutcome, Pathfinder};
use delve_world::{apply, query, World};

/// Hit points removed by an attack; every landed blow costs at least one.
pub(crate) fn damage(attack: u32, defense: u32) -> u32 {
    attack.saturating_sub(defense).max(1)
}

/// A running game: the world plus the systems that act on it.
#[derive(Debug)]
pub(crate) struct Session {
    world: World,
    ai: EnemyAi,
    pathfinder: Pathfinder,
}

impl Session {
    pub(crate) fn new(world: World, ai: EnemyAi, pathfinder: Pathfinder) -> Self {
        Self {
            world,
            ai,
            pathfinder,
        }
    }

    pub(crate) fn world(&self) -> &World {
        &self.world
    }

    /// Plays turns until the run ends or `max_turns` turns were played.
    pub(crate) fn run(&mut self, max_turns: u64) -> Result<Outcome> {
        for _ in 0..max_turns {
            if query::outcome(&self.world) != Outcome::InProgress {
                break;
            }
            let events = self.play_turn()?;
            log::trace!("turn {} events: {events:?}", query::turn(&self.world));
        }
        Ok(query::outcome(&self.world))
    }

    /// Plays one turn: the player acts, the turn closes, enemies respond.
    pub(crate) fn play_turn(&mut self) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        if query::outcome(&self.world) != Outcome::InProgress {
            return Ok(events);
        }

        if let Some(command) = self.player_command()? {
            self.resolve(command, &mut events);
        }
        self.resolve(Command::AdvanceTurn, &mut events);

        let mut commands = Vec::new();
        self.ai.handle(
            &events,
            query::grid(&self.world),
            query::player(&self.world).cell,
            query::enemies(&self.world),
            &mut commands,
        );
        for command in commands {
            self.resolve(command, &mut events);
        }
        Ok(events)
    }

    /// Walks toward the exit and fights whatever blocks the way.
    fn player_command(&self) -> Result<Option<Command>> {
        let player = query::player(&self.world);
        let outcome =
            self.pathfinder
                .find_path(query::grid(&self.world), player.cell, query::exit(&self.world))?;
        let Some(next) = outcome.path().and_then(|path| path.next_step()) else {
            if !matches!(outcome, PathOutcome::Found(_)) {
                log::warn!("player has no route to the exit, waiting");
            }
            return Ok(None);
        };

        if let Some(Combatant::Enemy(id)) = query::occupancy_view(&self.world).occupant(next) {
            let defense = query::enemy(&self.world, id).map_or(0, |enemy| enemy.stats.defense);
            return Ok(Some(Command::ApplyDamage {
                target: Combatant::Enemy(id),
                amount: damage(player.stats.attack, defense),
            }));
        }

        Ok(Direction::between(player.cell, next).map(|direction| Command::MovePlayer { direction }))
    }

    /// Applies a command and settles any attacks it reports.
    fn resolve(&mut self, command: Command, events: &mut Vec<Event>) {
        let start = events.len();
        apply(&mut self.world, command, events);
        let attacks: Vec<u32> = events[start..]
            .iter()
            .filter_map(|event| match event {
                Event::EnemyAttacked { attack, .. } => Some(*attack),
                _ => None,
            })
            .collect();
        for attack in attacks {
            let defense = query::player(&self.world).stats.defense;
            apply(
                &mut self.world,
                Command::ApplyDamage {
                    target: Combatant::Player,
                    amount: damage(attack, defense),
                },
                events,
            );
        }
    }
}
