//! Point collision, corner blocking and sampled line-of-sight

use super::map::{GridPos, TileMap};

/// Whether a continuous position lies on a wall or outside the grid
pub fn is_blocked(map: &TileMap, x: f32, y: f32) -> bool {
    if !x.is_finite() || !y.is_finite() {
        return true;
    }
    map.is_wall(GridPos::from_world(x, y))
}

/// A step that changes both tile axes is blocked when either corner point
/// bridging it is blocked, so movement never slips through a wall corner.
pub fn is_diagonal_step_blocked(map: &TileMap, x0: f32, y0: f32, x1: f32, y1: f32) -> bool {
    let from = GridPos::from_world(x0, y0);
    let to = GridPos::from_world(x1, y1);
    if from.x == to.x || from.y == to.y {
        return false;
    }
    is_blocked(map, x0, y1) || is_blocked(map, x1, y0)
}

/// Whether moving from `(x0, y0)` to `(x1, y1)` lands on open ground without
/// cutting a corner
pub fn can_step(map: &TileMap, x0: f32, y0: f32, x1: f32, y1: f32) -> bool {
    !is_blocked(map, x1, y1) && !is_diagonal_step_blocked(map, x0, y0, x1, y1)
}

/// Straight segment check sampled every `step` units (endpoint included)
pub fn has_line_of_sight(map: &TileMap, from: (f32, f32), to: (f32, f32), step: f32) -> bool {
    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    let dist = (dx * dx + dy * dy).sqrt();
    if !dist.is_finite() || step <= 0.0 {
        return false;
    }
    if is_blocked(map, from.0, from.1) {
        return false;
    }

    let samples = (dist / step).ceil().max(1.0) as usize;
    let (mut px, mut py) = from;
    for i in 1..=samples {
        let t = i as f32 / samples as f32;
        let sx = from.0 + dx * t;
        let sy = from.1 + dy * t;
        if !can_step(map, px, py, sx, sy) {
            return false;
        }
        px = sx;
        py = sy;
    }
    true
}
