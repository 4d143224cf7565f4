//! Wave progression and border spawning

use rand::Rng;
use tracing::debug;

use super::collision::is_blocked;
use super::combat::ZombieId;
use super::entities::Zombie;
use super::map::{GridPos, TileMap};
use super::physics::ZOMBIE_BASE_SPEED;

/// Zombies to spawn in round one
pub const INITIAL_WAVE_QUOTA: u32 = 50;
/// Cap on simultaneously alive zombies
pub const MAX_CONCURRENT_ZOMBIES: usize = 30;
/// Border samples tried before settling for a blocked one
pub const SPAWN_RETRIES: usize = 10;

const BASE_ZOMBIE_HP: i32 = 10;

/// Zombie hp for a round: one extra point per round after the first
pub fn zombie_hp(round: u32) -> i32 {
    BASE_ZOMBIE_HP + round.saturating_sub(1) as i32
}

/// Zombie speed for a round: +10% of the base per round after the first
pub fn zombie_speed(round: u32) -> f32 {
    ZOMBIE_BASE_SPEED * (1.0 + 0.10 * round.saturating_sub(1) as f32)
}

/// `ceil(quota * 1.2)` without float rounding
pub fn next_quota(quota: u32) -> u32 {
    quota.saturating_mul(6).saturating_add(4) / 5
}

/// Per-match spawn cadence and round bookkeeping
#[derive(Debug, Clone)]
pub struct WaveDirector {
    round: u32,
    total_to_spawn: u32,
    spawned_this_wave: u32,
    max_concurrent: usize,
    spawning: bool,
}

impl WaveDirector {
    /// Quota and cap are at least one so every wave needs a spawned zombie
    pub fn new(initial_quota: u32, max_concurrent: usize) -> Self {
        Self {
            round: 1,
            total_to_spawn: initial_quota.max(1),
            spawned_this_wave: 0,
            max_concurrent: max_concurrent.max(1),
            spawning: false,
        }
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn total_to_spawn(&self) -> u32 {
        self.total_to_spawn
    }

    pub fn spawned_this_wave(&self) -> u32 {
        self.spawned_this_wave
    }

    pub fn is_spawning(&self) -> bool {
        self.spawning
    }

    pub fn start(&mut self) {
        self.spawning = true;
    }

    pub fn stop(&mut self) {
        self.spawning = false;
    }

    fn quota_exhausted(&self) -> bool {
        self.spawned_this_wave >= self.total_to_spawn
    }

    /// One spawn-cadence step; returns the zombie to add, if any
    pub fn spawn_step<R: Rng + ?Sized>(
        &mut self,
        map: &TileMap,
        alive_zombies: usize,
        id: ZombieId,
        rng: &mut R,
    ) -> Option<Zombie> {
        if !self.spawning || self.quota_exhausted() || alive_zombies >= self.max_concurrent {
            return None;
        }

        let (x, y) = border_spawn_point(map, rng);
        self.spawned_this_wave += 1;
        debug!(
            round = self.round,
            spawned = self.spawned_this_wave,
            quota = self.total_to_spawn,
            "Zombie spawned"
        );
        Some(Zombie::new(id, x, y, zombie_hp(self.round), zombie_speed(self.round)))
    }

    /// Advance the round once the quota is spawned and cleared.
    /// Returns the new round number.
    pub fn check_wave_end(&mut self, alive_zombies: usize) -> Option<u32> {
        if !self.quota_exhausted() || alive_zombies > 0 {
            return None;
        }
        self.round += 1;
        self.spawned_this_wave = 0;
        self.total_to_spawn = next_quota(self.total_to_spawn);
        Some(self.round)
    }
}

/// Random point just inside one of the four border walls.
///
/// Retries while the sample is blocked; the last sample is used when every
/// retry fails.
pub fn border_spawn_point<R: Rng + ?Sized>(map: &TileMap, rng: &mut R) -> (f32, f32) {
    let max_x = (map.cols() as i32 - 2).max(1);
    let max_y = (map.rows() as i32 - 2).max(1);
    let mut point = map.center().center();

    for _ in 0..SPAWN_RETRIES {
        let tile = match rng.gen_range(0..4) {
            0 => GridPos::new(rng.gen_range(1..=max_x), 1),
            1 => GridPos::new(rng.gen_range(1..=max_x), max_y),
            2 => GridPos::new(1, rng.gen_range(1..=max_y)),
            _ => GridPos::new(max_x, rng.gen_range(1..=max_y)),
        };
        point = tile.center();
        if !is_blocked(map, point.0, point.1) {
            break;
        }
    }

    point
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn round_scaling() {
        assert_eq!(zombie_hp(1), 10);
        assert_eq!(zombie_hp(4), 13);
        assert_eq!(zombie_speed(1), ZOMBIE_BASE_SPEED);
        assert!((zombie_speed(3) - ZOMBIE_BASE_SPEED * 1.2).abs() < 1e-4);
    }

    #[test]
    fn quota_grows_by_twenty_percent_rounded_up() {
        assert_eq!(next_quota(50), 60);
        assert_eq!(next_quota(60), 72);
        assert_eq!(next_quota(72), 87);
        assert_eq!(next_quota(1), 2);
        assert_eq!(next_quota(5), 6);
    }

    #[test]
    fn nothing_spawns_when_stopped_or_capped() {
        let map = TileMap::bordered(20, 20);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut waves = WaveDirector::new(5, 2);
        assert!(waves.spawn_step(&map, 0, 1, &mut rng).is_none());

        waves.start();
        assert!(waves.spawn_step(&map, 2, 1, &mut rng).is_none());
        assert!(waves.spawn_step(&map, 1, 1, &mut rng).is_some());

        waves.stop();
        assert!(waves.spawn_step(&map, 0, 2, &mut rng).is_none());
        assert_eq!(waves.spawned_this_wave(), 1);
    }

    #[test]
    fn spawn_points_are_open_and_near_the_border() {
        let map = TileMap::with_walls(20, 20, &[(1, 1), (2, 1), (3, 1)]);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..200 {
            let (x, y) = border_spawn_point(&map, &mut rng);
            assert!(!is_blocked(&map, x, y));
            let tile = GridPos::from_world(x, y);
            assert!(tile.x == 1 || tile.y == 1 || tile.x == 18 || tile.y == 18);
        }
    }

    #[test]
    fn zero_quota_still_needs_a_spawn() {
        let mut waves = WaveDirector::new(0, 0);
        assert_eq!(waves.check_wave_end(0), None);
        assert_eq!(waves.round(), 1);

        let map = TileMap::bordered(10, 10);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        waves.start();
        assert!(waves.spawn_step(&map, 0, 1, &mut rng).is_some());
        assert!(waves.spawn_step(&map, 0, 2, &mut rng).is_none());
        assert_eq!(waves.check_wave_end(0), Some(2));
    }

    #[test]
    fn fully_walled_ring_falls_back_to_last_sample() {
        let ring: Vec<(i32, i32)> = (1..=18)
            .flat_map(|i| [(i, 1), (i, 18), (1, i), (18, i)])
            .collect();
        let map = TileMap::with_walls(20, 20, &ring);
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        for _ in 0..50 {
            let (x, y) = border_spawn_point(&map, &mut rng);
            // Not the open center default: a blocked ring sample is returned.
            assert!(is_blocked(&map, x, y));
            let tile = GridPos::from_world(x, y);
            assert!(tile.x == 1 || tile.y == 1 || tile.x == 18 || tile.y == 18);
            assert_eq!((x, y), tile.center());
        }
    }

    #[test]
    fn round_one_scenario() {
        let map = TileMap::bordered(50, 50);
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let mut waves = WaveDirector::new(INITIAL_WAVE_QUOTA, MAX_CONCURRENT_ZOMBIES);
        waves.start();

        let mut next_id = 0;
        let mut alive: Vec<Zombie> = Vec::new();
        while waves.spawned_this_wave() < waves.total_to_spawn() {
            next_id += 1;
            match waves.spawn_step(&map, alive.len(), next_id, &mut rng) {
                Some(zombie) => {
                    assert_eq!(zombie.hp, 10);
                    assert_eq!(zombie.speed, ZOMBIE_BASE_SPEED);
                    alive.push(zombie);
                }
                // Cap reached: clear the field.
                None => alive.clear(),
            }
            assert!(alive.len() <= MAX_CONCURRENT_ZOMBIES);
            assert_eq!(waves.check_wave_end(alive.len()), None);
        }

        assert_eq!(waves.spawned_this_wave(), 50);
        assert_eq!(waves.check_wave_end(alive.len()), None);
        alive.clear();
        assert_eq!(waves.check_wave_end(0), Some(2));
        assert_eq!(waves.round(), 2);
        assert_eq!(waves.total_to_spawn(), 60);
        assert_eq!(waves.spawned_this_wave(), 0);

        let zombie = waves.spawn_step(&map, 0, 100, &mut rng).expect("round two spawn");
        assert_eq!(zombie.hp, 11);
    }
}
