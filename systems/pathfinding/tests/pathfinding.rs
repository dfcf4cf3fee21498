use std::collections::HashSet;

use delve_core::{CellCoord, CellKind, CellRect, CellRectSize, Direction, GeneratorConfig, MovementRule, PathfinderConfig};
use delve_system_generation::generate_layout;
use delve_system_pathfinding::{find_path, Path, PathOutcome, Pathfinder};
use delve_world::{navigation::ReachabilityField, Grid, GridBuilder};
use proptest::{prelude::*, sample::Index};

fn arena(width: u32, height: u32) -> Grid {
    let mut builder = GridBuilder::new(width, height).expect("grid");
    builder
        .fill_rect(
            CellRect::from_origin_and_size(CellCoord::new(1, 1), CellRectSize::new(width - 2, height - 2)),
            CellKind::Floor,
        )
        .expect("fits");
    builder.build()
}

fn assert_well_formed(grid: &Grid, path: &Path, start: CellCoord, goal: CellCoord, rule: MovementRule) {
    assert_eq!(path.start(), Some(start));
    assert_eq!(path.goal(), Some(goal));
    let unique: HashSet<_> = path.cells().iter().copied().collect();
    assert_eq!(unique.len(), path.len(), "path revisits a cell");
    for pair in path.cells().windows(2) {
        let direction = Direction::between(pair[0], pair[1]).expect("adjacent cells");
        assert!(rule.directions().contains(&direction));
        assert!(grid.can_step(pair[0], direction));
    }
}

#[test]
fn open_arena_scenario_orthogonal() {
    let grid = arena(40, 20);
    let enemy = CellCoord::new(2, 2);
    let player = CellCoord::new(37, 18);
    let config = PathfinderConfig::default();

    let path = find_path(&grid, enemy, player, &config)
        .expect("valid")
        .into_path()
        .expect("found");
    assert_well_formed(&grid, &path, enemy, player, MovementRule::Orthogonal);
    assert_eq!(path.steps(), enemy.manhattan_distance(player));
    assert_eq!(path.cost(), 10 * 51);
}

#[test]
fn open_arena_scenario_diagonal() {
    let grid = arena(40, 20);
    let enemy = CellCoord::new(2, 2);
    let player = CellCoord::new(37, 18);
    let config = PathfinderConfig {
        movement: MovementRule::Diagonal,
        max_expansions: None,
    };

    let path = find_path(&grid, enemy, player, &config)
        .expect("valid")
        .into_path()
        .expect("found");
    assert_well_formed(&grid, &path, enemy, player, MovementRule::Diagonal);
    assert_eq!(path.steps(), enemy.chebyshev_distance(player));
    assert_eq!(path.cost(), 16 * 14 + 19 * 10);
}

#[test]
fn generated_scenario_links_first_and_last_room() {
    let layout = generate_layout(40, 20, 42, &GeneratorConfig::default()).expect("valid");
    let rooms = layout.rooms();
    let start = rooms.first().expect("room").center();
    let goal = rooms.last().expect("room").center();

    let config = PathfinderConfig::default();
    let path = find_path(layout.grid(), start, goal, &config)
        .expect("valid")
        .into_path()
        .expect("generated dungeons are connected");
    assert_well_formed(layout.grid(), &path, start, goal, MovementRule::Orthogonal);

    let baseline = ReachabilityField::from_source(layout.grid(), start, MovementRule::Orthogonal);
    assert_eq!(Some(path.steps()), baseline.distance(goal));
}

#[test]
fn disconnected_pair_is_not_found() {
    let mut builder = GridBuilder::new(9, 5).expect("grid");
    builder
        .fill_rect(CellRect::from_origin_and_size(CellCoord::new(1, 1), CellRectSize::new(3, 3)), CellKind::Floor)
        .expect("fits");
    builder
        .fill_rect(CellRect::from_origin_and_size(CellCoord::new(5, 1), CellRectSize::new(3, 3)), CellKind::Floor)
        .expect("fits");
    let grid = builder.build();

    for movement in [MovementRule::Orthogonal, MovementRule::Diagonal] {
        let config = PathfinderConfig {
            movement,
            max_expansions: None,
        };
        assert_eq!(
            find_path(&grid, CellCoord::new(1, 1), CellCoord::new(7, 3), &config),
            Ok(PathOutcome::NotFound)
        );
    }
}

#[test]
fn diagonal_search_refuses_to_cut_corners() {
    let mut builder = GridBuilder::new(4, 4).expect("grid");
    for cell in [CellCoord::new(1, 1), CellCoord::new(2, 2), CellCoord::new(2, 1)] {
        builder.set(cell, CellKind::Floor).expect("in bounds");
    }
    let grid = builder.build();
    let config = PathfinderConfig {
        movement: MovementRule::Diagonal,
        max_expansions: None,
    };
    let path = find_path(&grid, CellCoord::new(1, 1), CellCoord::new(2, 2), &config)
        .expect("valid")
        .into_path()
        .expect("found");
    assert_eq!(
        path.cells(),
        &[CellCoord::new(1, 1), CellCoord::new(2, 1), CellCoord::new(2, 2)]
    );
}

#[test]
fn exhausted_budget_is_reported() {
    let grid = arena(40, 20);
    let config = PathfinderConfig {
        movement: MovementRule::Orthogonal,
        max_expansions: Some(5),
    };
    assert_eq!(
        find_path(&grid, CellCoord::new(2, 2), CellCoord::new(37, 18), &config),
        Ok(PathOutcome::BudgetExhausted)
    );

    let generous = PathfinderConfig {
        max_expansions: Some(10_000),
        ..config
    };
    assert!(matches!(
        find_path(&grid, CellCoord::new(2, 2), CellCoord::new(37, 18), &generous),
        Ok(PathOutcome::Found(_))
    ));
}

#[test]
fn pathfinder_can_be_shared_between_threads() {
    let grid = arena(20, 12);
    let pathfinder = Pathfinder::new(PathfinderConfig::default());
    let (first, second) = std::thread::scope(|scope| {
        let a = scope.spawn(|| pathfinder.find_path(&grid, CellCoord::new(1, 1), CellCoord::new(18, 10)));
        let b = scope.spawn(|| pathfinder.find_path(&grid, CellCoord::new(1, 1), CellCoord::new(18, 10)));
        (a.join().expect("thread"), b.join().expect("thread"))
    });
    assert_eq!(first, second);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn orthogonal_paths_match_breadth_first_baseline(
        seed in any::<u64>(),
        from in any::<Index>(),
        to in any::<Index>(),
    ) {
        let layout = generate_layout(48, 28, seed, &GeneratorConfig::default()).expect("valid");
        let grid = layout.grid();
        let walkable: Vec<_> = grid.walkable_cells().collect();
        let start = walkable[from.index(walkable.len())];
        let goal = walkable[to.index(walkable.len())];

        let outcome = find_path(grid, start, goal, &PathfinderConfig::default()).expect("valid");
        let path = outcome.into_path().expect("connected");
        let baseline = ReachabilityField::from_source(grid, start, MovementRule::Orthogonal);

        prop_assert_eq!(Some(path.steps()), baseline.distance(goal));
        prop_assert_eq!(path.cost(), path.steps() * 10);
    }

    #[test]
    fn repeated_queries_return_identical_paths(
        seed in any::<u64>(),
        from in any::<Index>(),
        to in any::<Index>(),
        diagonal in any::<bool>(),
    ) {
        let layout = generate_layout(40, 20, seed, &GeneratorConfig::default()).expect("valid");
        let grid = layout.grid();
        let walkable: Vec<_> = grid.walkable_cells().collect();
        let start = walkable[from.index(walkable.len())];
        let goal = walkable[to.index(walkable.len())];
        let config = PathfinderConfig {
            movement: if diagonal { MovementRule::Diagonal } else { MovementRule::Orthogonal },
            max_expansions: None,
        };

        let first = find_path(grid, start, goal, &config).expect("valid");
        let second = find_path(grid, start, goal, &config).expect("valid");
        prop_assert_eq!(first, second);
    }
}
