//! Movement constraints and steering

use super::collision::{can_step, has_line_of_sight, is_blocked};
use super::map::{GridPos, TileMap, TILE_SIZE};
use super::pathfinding::next_hop;

/// Player and bot movement speed (units per second)
pub const PLAYER_SPEED: f32 = 150.0;
/// Round-one zombie speed (units per second)
pub const ZOMBIE_BASE_SPEED: f32 = 60.0;
/// Body radii used for melee and bullet overlap
pub const PLAYER_RADIUS: f32 = 12.0;
pub const ZOMBIE_RADIUS: f32 = 12.0;

/// Sample spacing for "can I walk straight there" checks
pub const MOVE_SAMPLE_STEP: f32 = TILE_SIZE / 4.0;

/// Unit vector of `(x, y)`, or `None` for zero-length or non-finite input
pub fn normalize(x: f32, y: f32) -> Option<(f32, f32)> {
    if !x.is_finite() || !y.is_finite() {
        return None;
    }
    // Pre-scale so huge components cannot overflow the length.
    let scale = x.abs().max(y.abs());
    if scale <= f32::EPSILON {
        return None;
    }
    let (sx, sy) = (x / scale, y / scale);
    let len = (sx * sx + sy * sy).sqrt();
    Some((sx / len, sy / len))
}

pub fn distance(ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    let dx = bx - ax;
    let dy = by - ay;
    (dx * dx + dy * dy).sqrt()
}

/// Circle overlap test
pub fn circles_overlap(x1: f32, y1: f32, r1: f32, x2: f32, y2: f32, r2: f32) -> bool {
    let dx = x2 - x1;
    let dy = y2 - y1;
    let combined = r1 + r2;
    dx * dx + dy * dy <= combined * combined
}

/// Move from `(x, y)` along `intent` for one tick.
///
/// The step is taken only when its destination is open; otherwise the
/// entity stays put. Bad intents mean no movement.
pub fn integrate_intent(
    map: &TileMap,
    x: f32,
    y: f32,
    intent: (f32, f32),
    speed: f32,
    dt: f32,
) -> (f32, f32) {
    let Some((dir_x, dir_y)) = normalize(intent.0, intent.1) else {
        return (x, y);
    };
    let nx = x + dir_x * speed * dt;
    let ny = y + dir_y * speed * dt;
    if is_blocked(map, nx, ny) {
        (x, y)
    } else {
        (nx, ny)
    }
}

/// Step up to `max_step` units toward `(tx, ty)` if the step is walkable
fn step_toward(map: &TileMap, x: f32, y: f32, tx: f32, ty: f32, max_step: f32) -> Option<(f32, f32)> {
    let dist = distance(x, y, tx, ty);
    if dist <= f32::EPSILON {
        return None;
    }
    let step = max_step.min(dist);
    let nx = x + (tx - x) / dist * step;
    let ny = y + (ty - y) / dist * step;
    can_step(map, x, y, nx, ny).then_some((nx, ny))
}

/// Advance toward a target: straight line when it is clear, otherwise the
/// next tile of a freshly planned path. `None` means stay idle.
pub fn advance_toward(
    map: &TileMap,
    x: f32,
    y: f32,
    tx: f32,
    ty: f32,
    speed: f32,
    dt: f32,
) -> Option<(f32, f32)> {
    let max_step = speed * dt;
    if has_line_of_sight(map, (x, y), (tx, ty), MOVE_SAMPLE_STEP) {
        if let Some(pos) = step_toward(map, x, y, tx, ty, max_step) {
            return Some(pos);
        }
    }

    let hop = next_hop(map, GridPos::from_world(x, y), GridPos::from_world(tx, ty))?;
    let (hx, hy) = hop.center();
    step_toward(map, x, y, hx, hy, max_step)
}

/// Back away from `(tx, ty)` for one tick, if the retreat is walkable
pub fn retreat_from(
    map: &TileMap,
    x: f32,
    y: f32,
    tx: f32,
    ty: f32,
    speed: f32,
    dt: f32,
) -> Option<(f32, f32)> {
    let (dir_x, dir_y) = normalize(x - tx, y - ty)?;
    let nx = x + dir_x * speed * dt;
    let ny = y + dir_y * speed * dt;
    can_step(map, x, y, nx, ny).then_some((nx, ny))
}
