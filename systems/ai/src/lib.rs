#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Enemy decision making driven by fresh path queries every turn.

use delve_core::{
    AiConfig, Behaviour, CellCoord, Command, EnemyAction, EnemyRecord, EnemyState, Event,
    PathfinderConfig,
};
use delve_system_pathfinding::{PathError, PathOutcome, Pathfinder};
use delve_world::Grid;

/// What an enemy learned about the player this turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Observation {
    /// The player is beyond detection range even in a straight line, so no
    /// search was run.
    OutOfSight,
    /// A path to the player exists.
    Reachable {
        /// Steps along the cheapest path.
        steps: u32,
    },
    /// The search reported no path or ran out of budget.
    Unreachable,
}

/// Advances the behaviour of one enemy by a single turn.
#[must_use]
pub fn transition(behaviour: Behaviour, observation: Observation, config: &AiConfig) -> Behaviour {
    const IDLE: Behaviour = Behaviour {
        state: EnemyState::Idle,
        missed_turns: 0,
    };

    match (behaviour.state, observation) {
        (_, Observation::OutOfSight) => IDLE,
        (_, Observation::Reachable { steps }) if steps > config.detection_radius => IDLE,
        (EnemyState::Idle, Observation::Reachable { .. }) => Behaviour {
            state: EnemyState::Chasing,
            missed_turns: 0,
        },
        (EnemyState::Chasing | EnemyState::Attacking, Observation::Reachable { steps }) => {
            let state = if steps <= config.attack_range {
                EnemyState::Attacking
            } else {
                EnemyState::Chasing
            };
            Behaviour {
                state,
                missed_turns: 0,
            }
        }
        (EnemyState::Idle, Observation::Unreachable) => IDLE,
        (EnemyState::Chasing | EnemyState::Attacking, Observation::Unreachable) => {
            let missed_turns = behaviour.missed_turns.saturating_add(1);
            if missed_turns >= config.give_up_turns {
                IDLE
            } else {
                Behaviour {
                    state: behaviour.state,
                    missed_turns,
                }
            }
        }
    }
}

/// Behaviour and action chosen for one enemy turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Decision {
    /// Memory to store on the enemy.
    pub behaviour: Behaviour,
    /// What the enemy does this turn.
    pub action: EnemyAction,
    /// What the enemy observed while deciding.
    pub observation: Observation,
}

/// Pure per-enemy decision function.
#[derive(Clone, Debug, Default)]
pub struct Controller {
    config: AiConfig,
    pathfinder: Pathfinder,
}

impl Controller {
    /// Creates a controller that searches with `pathfinding`.
    #[must_use]
    pub fn new(config: AiConfig, pathfinding: PathfinderConfig) -> Self {
        Self {
            config,
            pathfinder: Pathfinder::new(pathfinding),
        }
    }

    /// Creates a controller around an existing pathfinder.
    #[must_use]
    pub fn with_pathfinder(config: AiConfig, pathfinder: Pathfinder) -> Self {
        Self { config, pathfinder }
    }

    /// AI tuning in effect.
    #[must_use]
    pub const fn config(&self) -> &AiConfig {
        &self.config
    }

    /// Decides what an enemy standing on `enemy` does about a player on
    /// `player`.
    ///
    /// # Errors
    ///
    /// Propagates [`PathError`] when either cell cannot be searched from.
    pub fn decide(
        &self,
        grid: &Grid,
        enemy: CellCoord,
        behaviour: Behaviour,
        player: CellCoord,
    ) -> Result<Decision, PathError> {
        let rule = self.pathfinder.config().movement;
        let mut next_step = None;

        let observation = if rule.straight_line_steps(enemy, player) > self.config.detection_radius {
            Observation::OutOfSight
        } else {
            match self.pathfinder.find_path(grid, enemy, player)? {
                PathOutcome::Found(path) => {
                    next_step = path.next_step().filter(|cell| *cell != player);
                    Observation::Reachable {
                        steps: path.steps(),
                    }
                }
                PathOutcome::NotFound | PathOutcome::BudgetExhausted => Observation::Unreachable,
            }
        };

        let behaviour = transition(behaviour, observation, &self.config);
        let action = match (behaviour.state, observation) {
            (EnemyState::Attacking, Observation::Reachable { steps })
                if steps <= self.config.attack_range =>
            {
                EnemyAction::Attack
            }
            (EnemyState::Chasing, Observation::Reachable { .. }) => {
                next_step.map_or(EnemyAction::Wait, |to| EnemyAction::Step { to })
            }
            _ => EnemyAction::Wait,
        };

        Ok(Decision {
            behaviour,
            action,
            observation,
        })
    }
}

/// Pure system that turns enemy decisions into world commands once per turn.
#[derive(Debug, Default)]
pub struct EnemyAi {
    controller: Controller,
    finished: bool,
}

impl EnemyAi {
    /// Creates the system around a controller.
    #[must_use]
    pub fn new(controller: Controller) -> Self {
        Self {
            controller,
            finished: false,
        }
    }

    /// Controller used for every enemy.
    #[must_use]
    pub const fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Consumes world events and emits one [`Command::EnemyAct`] per enemy,
    /// in identifier order, whenever a turn advanced.
    pub fn handle(
        &mut self,
        events: &[Event],
        grid: &Grid,
        player: CellCoord,
        enemies: &[EnemyRecord],
        out: &mut Vec<Command>,
    ) {
        let mut turn_advanced = false;
        for event in events {
            match event {
                Event::ExitReached | Event::PlayerDefeated => self.finished = true,
                Event::TurnAdvanced { .. } => turn_advanced = true,
                _ => {}
            }
        }

        if self.finished || !turn_advanced {
            return;
        }

        let mut ordered: Vec<&EnemyRecord> = enemies.iter().collect();
        ordered.sort_by_key(|enemy| enemy.id);

        for enemy in ordered {
            match self
                .controller
                .decide(grid, enemy.cell, enemy.behaviour, player)
            {
                Ok(decision) => {
                    log::debug!(
                        "enemy {} {:?} -> {:?}: {:?}",
                        enemy.id.get(),
                        enemy.behaviour.state,
                        decision.behaviour.state,
                        decision.action
                    );
                    out.push(Command::EnemyAct {
                        enemy: enemy.id,
                        behaviour: decision.behaviour,
                        action: decision.action,
                    });
                }
                Err(error) => {
                    log::error!("enemy {} cannot plan: {error}", enemy.id.get());
                }
            }
        }
    }
}
