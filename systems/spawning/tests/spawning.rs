use delve_core::{GeneratorConfig, ItemKind};
use delve_system_generation::generate_layout;
use delve_system_spawning::{SpawnConfig, Spawning};

fn rooms() -> Vec<delve_core::CellRect> {
    generate_layout(80, 50, 21, &GeneratorConfig::default())
        .expect("valid")
        .rooms()
        .to_vec()
}

#[test]
fn same_seed_spawns_same_population() {
    let rooms = rooms();
    let first = Spawning::new(SpawnConfig::default(), 99)
        .expect("valid")
        .populate(&rooms);
    let second = Spawning::new(SpawnConfig::default(), 99)
        .expect("valid")
        .populate(&rooms);
    assert_eq!(first, second);
}

#[test]
fn certain_chances_fill_every_room_but_the_first() {
    let rooms = rooms();
    let config = SpawnConfig {
        enemy_chance: 1.0,
        item_chance: 1.0,
    };
    let spawned = Spawning::new(config, 5).expect("valid").populate(&rooms);

    assert_eq!(spawned.enemies.len(), rooms.len() - 1);
    assert_eq!(spawned.items.len(), rooms.len() - 1);
    assert!(spawned
        .enemies
        .iter()
        .all(|enemy| enemy.cell != rooms[0].center()));

    let ids: Vec<u32> = spawned.enemies.iter().map(|enemy| enemy.id.get()).collect();
    let expected: Vec<u32> = (1..=ids.len() as u32).collect();
    assert_eq!(ids, expected);

    for (enemy, room) in spawned.enemies.iter().zip(rooms.iter().skip(1)) {
        assert_eq!(enemy.cell, room.center());
        assert_eq!(enemy.stats, enemy.kind.base_stats());
    }
}

#[test]
fn zero_chances_spawn_nothing() {
    let config = SpawnConfig {
        enemy_chance: 0.0,
        item_chance: 0.0,
    };
    let spawned = Spawning::new(config, 5).expect("valid").populate(&rooms());
    assert!(spawned.enemies.is_empty());
    assert!(spawned.items.is_empty());
}

#[test]
fn items_follow_their_tables() {
    let config = SpawnConfig {
        enemy_chance: 0.0,
        item_chance: 1.0,
    };
    let mut spawning = Spawning::new(config, 17).expect("valid");
    let rooms = rooms();
    for _ in 0..20 {
        for item in spawning.populate(&rooms).items {
            let range = match item.kind {
                ItemKind::Weapon => 5..=15,
                ItemKind::Armor => 3..=10,
                ItemKind::Potion => 10..=30,
                ItemKind::Quest => 50..=100,
            };
            assert!(range.contains(&item.value), "{item:?}");
            assert_eq!(item.name.split(' ').count(), 2, "{item:?}");
            if item.kind == ItemKind::Potion {
                assert!(item.name.ends_with(" Potion"));
            }
        }
    }
}
