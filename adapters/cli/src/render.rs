//! Plain character dumps of grids and worlds for terminal inspection.

use std::collections::BTreeMap;

use delve_core::{CellCoord, CellKind, EnemyKind};
use delve_world::{query, Grid, World};

fn terrain_glyph(kind: CellKind) -> char {
    match kind {
        CellKind::Wall => '#',
        CellKind::Floor => '.',
        CellKind::Door => '+',
    }
}

fn enemy_glyph(kind: EnemyKind) -> char {
    match kind {
        EnemyKind::Goblin => 'g',
        EnemyKind::Orc => 'o',
        EnemyKind::Troll => 'T',
    }
}

/// Draws the grid with optional overlays; later overlays win.
pub(crate) fn draw(grid: &Grid, overlays: &BTreeMap<CellCoord, char>) -> String {
    let width = grid.width() as usize;
    let mut text = String::with_capacity((width + 1) * grid.height() as usize);
    for (cell, kind) in grid.cells() {
        let glyph = overlays
            .get(&cell)
            .copied()
            .unwrap_or_else(|| terrain_glyph(kind));
        text.push(glyph);
        if cell.column() + 1 == grid.width() {
            text.push('\n');
        }
    }
    text
}

/// Draws the grid with a path marked by `*`.
pub(crate) fn draw_path(grid: &Grid, path: &[CellCoord]) -> String {
    let overlays = path.iter().map(|cell| (*cell, '*')).collect();
    draw(grid, &overlays)
}

/// Draws the world: exit `>`, items `!`, enemies by kind, player `@`.
pub(crate) fn draw_world(world: &World) -> String {
    let mut overlays = BTreeMap::new();
    let _ = overlays.insert(query::exit(world), '>');
    for item in query::items(world) {
        let _ = overlays.insert(item.cell, '!');
    }
    for enemy in query::enemies(world) {
        let _ = overlays.insert(enemy.cell, enemy_glyph(enemy.kind));
    }
    let _ = overlays.insert(query::player(world).cell, '@');
    draw(query::grid(world), &overlays)
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_core::{CellRect, CellRectSize};
    use delve_world::GridBuilder;

    #[test]
    fn draws_rows_top_to_bottom() {
        let mut builder = GridBuilder::new(4, 3).expect("grid");
        builder
            .fill_rect(
                CellRect::from_origin_and_size(CellCoord::new(1, 1), CellRectSize::new(2, 1)),
                CellKind::Floor,
            )
            .expect("fits");
        builder.set(CellCoord::new(3, 1), CellKind::Door).expect("in bounds");
        let grid = builder.build();

        assert_eq!(draw(&grid, &BTreeMap::new()), "####\n#..+\n####\n");
        assert_eq!(
            draw_path(&grid, &[CellCoord::new(1, 1), CellCoord::new(2, 1)]),
            "####\n#**+\n####\n"
        );
    }
}
