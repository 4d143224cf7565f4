//! Combat system - bullets, melee cooldowns, damage

use std::collections::HashMap;
use std::time::Duration;

use uuid::Uuid;

use super::collision::is_blocked;
use super::map::TileMap;
use super::physics::{circles_overlap, normalize, ZOMBIE_RADIUS};

pub type ZombieId = u64;
pub type BulletId = u64;

/// Bullet travel speed (units per second)
pub const BULLET_SPEED: f32 = 500.0;
/// Bullet hitbox radius
pub const BULLET_RADIUS: f32 = 4.0;
/// Zombie hp removed per bullet hit
pub const BULLET_DAMAGE: i32 = 5;

/// Minimum gap between two shots by an externally controlled player
pub const PLAYER_SHOOT_COOLDOWN: Duration = Duration::from_millis(250);
/// Minimum gap between two shots by a bot
pub const BOT_SHOOT_COOLDOWN: Duration = Duration::from_millis(400);

/// Health removed per zombie hit
pub const ZOMBIE_DAMAGE: f32 = 10.0;
/// Extra reach added to body radii for melee contact
pub const MELEE_BONUS: f32 = 4.0;
/// Minimum time between two hits by the same zombie on the same player
pub const ZOMBIE_ATTACK_COOLDOWN: Duration = Duration::from_millis(1000);
/// Contact time before a zombie's first hit on a player lands
pub const CONTACT_WAIT: Duration = Duration::from_millis(200);

pub const MAX_HEALTH: f32 = 100.0;

/// Active bullet in the match
#[derive(Debug, Clone)]
pub struct Bullet {
    pub id: BulletId,
    pub owner_id: Uuid,
    pub x: f32,
    pub y: f32,
    pub dir_x: f32,
    pub dir_y: f32,
    pub created_at: Duration,
}

impl Bullet {
    /// Bullet from `(x, y)` heading at `(target_x, target_y)`.
    /// `None` when the aim direction is degenerate.
    pub fn aimed(
        id: BulletId,
        owner_id: Uuid,
        x: f32,
        y: f32,
        target_x: f32,
        target_y: f32,
        created_at: Duration,
    ) -> Option<Self> {
        let (dir_x, dir_y) = normalize(target_x - x, target_y - y)?;
        Some(Self {
            id,
            owner_id,
            x,
            y,
            dir_x,
            dir_y,
            created_at,
        })
    }

    /// Move one tick; returns false when the bullet left the map or hit a wall
    pub fn advance(&mut self, map: &TileMap, dt: f32) -> bool {
        self.x += self.dir_x * BULLET_SPEED * dt;
        self.y += self.dir_y * BULLET_SPEED * dt;
        let in_bounds =
            self.x >= 0.0 && self.y >= 0.0 && self.x < map.width() && self.y < map.height();
        in_bounds && !is_blocked(map, self.x, self.y)
    }

    /// Check collision with a zombie body
    pub fn hits(&self, zombie_x: f32, zombie_y: f32) -> bool {
        circles_overlap(self.x, self.y, BULLET_RADIUS, zombie_x, zombie_y, ZOMBIE_RADIUS)
    }
}

/// Apply damage to health, returns (new_health, is_dead)
pub fn apply_damage(current_health: f32, damage: f32) -> (f32, bool) {
    let new_health = (current_health - damage).max(0.0);
    (new_health, new_health <= 0.0)
}

/// Whether a cooldown that last fired at `last` has elapsed by `now`
pub fn cooldown_ready(last: Option<Duration>, now: Duration, cooldown: Duration) -> bool {
    match last {
        Some(last) => now.saturating_sub(last) >= cooldown,
        None => true,
    }
}

/// Per (zombie, player) pair: the time after which the next hit may land
#[derive(Debug, Default)]
pub struct AttackCooldowns {
    ready_at: HashMap<(ZombieId, Uuid), Duration>,
}

impl AttackCooldowns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register contact at `now`; returns true when a hit lands.
    ///
    /// First contact arms the pair so its first hit lands once `CONTACT_WAIT`
    /// has passed; every hit then needs more than `ZOMBIE_ATTACK_COOLDOWN`
    /// since the previous one.
    pub fn try_attack(&mut self, zombie: ZombieId, player: Uuid, now: Duration) -> bool {
        let key = (zombie, player);
        let Some(&ready_at) = self.ready_at.get(&key) else {
            self.ready_at.insert(key, now + CONTACT_WAIT);
            return false;
        };

        if now > ready_at {
            self.ready_at.insert(key, now + ZOMBIE_ATTACK_COOLDOWN);
            true
        } else {
            false
        }
    }

    pub fn forget_zombie(&mut self, zombie: ZombieId) {
        self.ready_at.retain(|(z, _), _| *z != zombie);
    }

    pub fn forget_player(&mut self, player: Uuid) {
        self.ready_at.retain(|(_, p), _| *p != player);
    }

    pub fn len(&self) -> usize {
        self.ready_at.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ready_at.is_empty()
    }
}
