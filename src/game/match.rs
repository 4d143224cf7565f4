//! Match state and the authoritative per-tick simulation

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::net::protocol::{
    Audience, MatchStats, Outbound, PlayerInfo, PlayerMatchStats, ServerMsg,
};
use crate::util::time::{tick_delta, tick_duration, unix_millis, MatchClock, SIMULATION_TPS};

use super::collision::{has_line_of_sight, is_blocked};
use super::combat::{
    apply_damage, cooldown_ready, AttackCooldowns, Bullet, BulletId, ZombieId, BULLET_DAMAGE,
    MELEE_BONUS, PLAYER_SHOOT_COOLDOWN, ZOMBIE_DAMAGE,
};
use super::entities::{Controller, Player, Zombie};
use super::map::{MapGenError, MapGenerator, TileMap, TILE_SIZE};
use super::physics::{
    advance_toward, distance, integrate_intent, retreat_from, PLAYER_RADIUS, PLAYER_SPEED,
    ZOMBIE_RADIUS,
};
use super::snapshot::SnapshotBuilder;
use super::wave::{WaveDirector, INITIAL_WAVE_QUOTA, MAX_CONCURRENT_ZOMBIES};

/// Players per match, humans plus bots
pub const MAX_PLAYERS: usize = 4;
/// Bots engage (kite and shoot) zombies closer than this
pub const BOT_ENGAGE_RANGE: f32 = 250.0;
/// Minimum distance between two players at launch
pub const MIN_SPAWN_SEPARATION: f32 = 40.0;
const SPAWN_PLACEMENT_ATTEMPTS: usize = 50;

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// Match in progress
    Running,
    /// Every player is down
    Ended,
}

/// Tunables for one match
#[derive(Debug, Clone)]
pub struct MatchSettings {
    pub tick_rate: u32,
    pub map: MapGenerator,
    pub max_players: usize,
    pub max_zombies: usize,
    pub initial_wave_quota: u32,
    pub snapshot_every_ticks: u32,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            tick_rate: SIMULATION_TPS,
            map: MapGenerator::default(),
            max_players: MAX_PLAYERS,
            max_zombies: MAX_CONCURRENT_ZOMBIES,
            initial_wave_quota: INITIAL_WAVE_QUOTA,
            snapshot_every_ticks: 1,
        }
    }
}

/// Launch failures
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("{requested} ready players exceed the cap of {cap}")]
    TooManyPlayers { requested: usize, cap: usize },

    #[error("player {0} is already in a match")]
    AlreadyInMatch(Uuid),

    #[error("map generation failed: {0}")]
    Map(#[from] MapGenError),

    #[error("match scheduler is not running")]
    SchedulerGone,
}

/// The authoritative game match
pub struct GameMatch {
    pub id: Uuid,
    pub seed: u64,
    pub phase: MatchPhase,
    pub tick: u64,
    pub map: TileMap,
    pub players: BTreeMap<Uuid, Player>,
    pub zombies: BTreeMap<ZombieId, Zombie>,
    pub bullets: BTreeMap<BulletId, Bullet>,
    pub waves: WaveDirector,
    pub cooldowns: AttackCooldowns,
    pub clock: MatchClock,
    rng: ChaCha8Rng,
    next_entity_id: u64,
    tick_rate: u32,
    snapshot_builder: SnapshotBuilder,
    outbox: Vec<Outbound>,
}

impl GameMatch {
    /// Launch a match for the ready players.
    ///
    /// Remaining slots up to the player cap are filled with bots; everyone is
    /// placed near the map center and the wave director starts spawning.
    pub fn launch(
        id: Uuid,
        seed: u64,
        settings: &MatchSettings,
        ready: Vec<(Uuid, String)>,
    ) -> Result<Self, LaunchError> {
        if ready.len() > settings.max_players {
            return Err(LaunchError::TooManyPlayers {
                requested: ready.len(),
                cap: settings.max_players,
            });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let map = settings.map.generate(&mut rng)?;
        Ok(Self::with_map(id, seed, settings, map, rng, ready))
    }

    fn with_map(
        id: Uuid,
        seed: u64,
        settings: &MatchSettings,
        map: TileMap,
        mut rng: ChaCha8Rng,
        ready: Vec<(Uuid, String)>,
    ) -> Self {
        let bot_count = settings.max_players.saturating_sub(ready.len());
        let spawns = spawn_positions(
            &map,
            ready.len() + bot_count,
            settings.map.keep_clear_radius,
            &mut rng,
        );
        let mut spawns = spawns.into_iter();

        let mut players = BTreeMap::new();
        for (player_id, name) in ready {
            let (x, y) = spawns.next().unwrap_or_else(|| map.center().center());
            players.insert(player_id, Player::human(player_id, name, x, y));
        }
        for n in 1..=bot_count {
            let bot_id = uuid::Builder::from_random_bytes(rng.gen()).into_uuid();
            let (x, y) = spawns.next().unwrap_or_else(|| map.center().center());
            players.insert(bot_id, Player::bot(bot_id, format!("Bot {n}"), x, y));
        }

        let mut waves = WaveDirector::new(settings.initial_wave_quota, settings.max_zombies);
        waves.start();

        let mut game_match = Self {
            id,
            seed,
            phase: MatchPhase::Running,
            tick: 0,
            map,
            players,
            zombies: BTreeMap::new(),
            bullets: BTreeMap::new(),
            waves,
            cooldowns: AttackCooldowns::new(),
            clock: MatchClock::new(),
            rng,
            next_entity_id: 0,
            tick_rate: settings.tick_rate,
            snapshot_builder: SnapshotBuilder::new(settings.snapshot_every_ticks),
            outbox: Vec::new(),
        };

        let players: Vec<PlayerInfo> = game_match
            .players
            .values()
            .map(|p| PlayerInfo {
                player_id: p.id,
                display_name: p.display_name.clone(),
                is_bot: p.is_bot(),
            })
            .collect();
        game_match.broadcast(ServerMsg::MatchLaunched {
            match_id: id,
            seed,
            rows: game_match.map.rows(),
            cols: game_match.map.cols(),
            tiles: game_match.map.to_rows(),
            players,
            server_time: unix_millis(),
        });

        info!(
            match_id = %id,
            seed,
            humans = game_match.players.values().filter(|p| !p.is_bot()).count(),
            bots = bot_count,
            "Match launched"
        );

        game_match
    }

    pub fn is_running(&self) -> bool {
        self.phase == MatchPhase::Running
    }

    /// True exactly when no player is alive
    pub fn is_ended(&self) -> bool {
        self.players.values().all(|p| !p.alive)
    }

    pub fn round(&self) -> u32 {
        self.waves.round()
    }

    /// Take every message produced since the last drain
    pub fn drain_outbox(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    fn broadcast(&mut self, msg: ServerMsg) {
        self.outbox.push(Outbound {
            match_id: self.id,
            audience: Audience::Match,
            msg,
        });
    }

    fn notify(outbox: &mut Vec<Outbound>, match_id: Uuid, player_id: Uuid, msg: ServerMsg) {
        outbox.push(Outbound {
            match_id,
            audience: Audience::Player(player_id),
            msg,
        });
    }

    fn next_id(&mut self) -> u64 {
        self.next_entity_id += 1;
        self.next_entity_id
    }

    /// Record the latest movement direction of a human player
    pub fn set_movement_intent(&mut self, player_id: Uuid, x: f32, y: f32) -> bool {
        if !self.is_running() {
            return false;
        }
        match self.players.get_mut(&player_id) {
            Some(player) if player.alive && !player.is_bot() => {
                player.intent = (x, y);
                true
            }
            _ => false,
        }
    }

    /// Shoot from a human player toward a map position, subject to cooldown
    pub fn fire_at(&mut self, player_id: Uuid, target_x: f32, target_y: f32) -> bool {
        if !self.is_running() {
            return false;
        }
        let now = self.clock.now();
        let (x, y) = match self.players.get(&player_id) {
            Some(p)
                if p.alive
                    && !p.is_bot()
                    && cooldown_ready(p.last_shot, now, PLAYER_SHOOT_COOLDOWN) =>
            {
                (p.x, p.y)
            }
            _ => return false,
        };

        let bullet_id = self.next_entity_id + 1;
        let Some(bullet) = Bullet::aimed(bullet_id, player_id, x, y, target_x, target_y, now) else {
            return false;
        };
        self.next_entity_id = bullet_id;
        self.bullets.insert(bullet_id, bullet);
        if let Some(player) = self.players.get_mut(&player_id) {
            player.last_shot = Some(now);
        }
        true
    }

    /// Remove a disconnected human; bots stay for the whole match
    pub fn remove_player(&mut self, player_id: Uuid) -> bool {
        match self.players.get(&player_id) {
            Some(p) if !p.is_bot() => {}
            _ => return false,
        }
        self.players.remove(&player_id);
        self.cooldowns.forget_player(player_id);
        self.broadcast(ServerMsg::PlayerLeft { player_id });
        info!(match_id = %self.id, player_id = %player_id, "Player left match");
        true
    }

    /// One wave-director spawn step
    pub fn spawn_step(&mut self) {
        if !self.is_running() || !self.waves.is_spawning() {
            return;
        }
        let id = self.next_entity_id + 1;
        if let Some(zombie) = self
            .waves
            .spawn_step(&self.map, self.zombies.len(), id, &mut self.rng)
        {
            self.next_entity_id = id;
            self.zombies.insert(zombie.id, zombie);
        }
    }

    /// Advance the simulation by one fixed tick
    pub fn run_tick(&mut self) {
        if !self.is_running() {
            return;
        }

        self.tick += 1;
        self.clock.advance(tick_duration(self.tick_rate));
        let dt = tick_delta(self.tick_rate);

        self.move_humans(dt);
        self.update_bots(dt);
        self.update_zombies(dt);
        self.update_bullets(dt);

        if let Some(round) = self.waves.check_wave_end(self.zombies.len()) {
            info!(match_id = %self.id, round, quota = self.waves.total_to_spawn(), "Wave advanced");
            self.broadcast(ServerMsg::WaveStarted {
                round,
                label: format!("Round {round}"),
            });
            self.snapshot_builder.force_next();
        }

        if self.snapshot_builder.should_send() {
            let snapshot = self.snapshot_builder.build(
                self.tick,
                self.waves.round(),
                &self.players,
                &self.zombies,
                &self.bullets,
            );
            self.broadcast(snapshot);
        }

        if self.is_ended() {
            self.end();
        }
    }

    fn move_humans(&mut self, dt: f32) {
        for player in self.players.values_mut() {
            if !player.alive || player.is_bot() {
                continue;
            }
            let (x, y) = integrate_intent(&self.map, player.x, player.y, player.intent, PLAYER_SPEED, dt);
            player.x = x;
            player.y = y;
        }
    }

    fn update_bots(&mut self, dt: f32) {
        let now = self.clock.now();
        let targets: Vec<(ZombieId, f32, f32)> =
            self.zombies.values().map(|z| (z.id, z.x, z.y)).collect();
        let mut shots: Vec<(Uuid, f32, f32, f32, f32)> = Vec::new();

        for player in self.players.values_mut() {
            if !player.alive {
                continue;
            }
            let Controller::Bot(bot) = &mut player.controller else {
                continue;
            };

            let nearest = targets
                .iter()
                .map(|&(id, zx, zy)| (id, zx, zy, distance(player.x, player.y, zx, zy)))
                .min_by(|a, b| a.3.total_cmp(&b.3));
            let Some((target_id, zx, zy, dist)) = nearest else {
                bot.target = None;
                continue;
            };
            bot.target = Some(target_id);

            let engaged = dist <= BOT_ENGAGE_RANGE
                && has_line_of_sight(&self.map, (player.x, player.y), (zx, zy), TILE_SIZE);
            if engaged {
                if let Some((x, y)) =
                    retreat_from(&self.map, player.x, player.y, zx, zy, PLAYER_SPEED, dt)
                {
                    player.x = x;
                    player.y = y;
                }
                if cooldown_ready(player.last_shot, now, bot.shoot_cooldown) {
                    player.last_shot = Some(now);
                    shots.push((player.id, player.x, player.y, zx, zy));
                }
            } else if let Some((x, y)) =
                advance_toward(&self.map, player.x, player.y, zx, zy, PLAYER_SPEED, dt)
            {
                player.x = x;
                player.y = y;
            }
        }

        for (owner, x, y, tx, ty) in shots {
            let bullet_id = self.next_id();
            if let Some(bullet) = Bullet::aimed(bullet_id, owner, x, y, tx, ty, now) {
                self.bullets.insert(bullet_id, bullet);
            }
        }
    }

    fn update_zombies(&mut self, dt: f32) {
        let now = self.clock.now();
        let reach = PLAYER_RADIUS + ZOMBIE_RADIUS + MELEE_BONUS;
        let targets: Vec<(Uuid, f32, f32)> = self
            .players
            .values()
            .filter(|p| p.alive)
            .map(|p| (p.id, p.x, p.y))
            .collect();
        let mut hits: Vec<Uuid> = Vec::new();

        for zombie in self.zombies.values_mut() {
            let nearest = targets
                .iter()
                .map(|&(id, px, py)| (id, px, py, distance(zombie.x, zombie.y, px, py)))
                .min_by(|a, b| a.3.total_cmp(&b.3));
            let Some((player_id, px, py, dist)) = nearest else {
                continue;
            };

            if dist <= reach {
                if self.cooldowns.try_attack(zombie.id, player_id, now) {
                    zombie.last_attack = Some(now);
                    hits.push(player_id);
                }
                continue;
            }

            if let Some((x, y)) = advance_toward(&self.map, zombie.x, zombie.y, px, py, zombie.speed, dt)
            {
                zombie.x = x;
                zombie.y = y;
            }
        }

        for player_id in hits {
            self.damage_player(player_id, ZOMBIE_DAMAGE);
        }
    }

    fn damage_player(&mut self, player_id: Uuid, amount: f32) {
        let round = self.waves.round();
        let Some(player) = self.players.get_mut(&player_id) else {
            return;
        };
        if !player.alive {
            return;
        }

        let (health, killed) = apply_damage(player.health, amount);
        player.health = health;
        let is_human = !player.is_bot();
        let kills = player.kills;
        if killed {
            player.alive = false;
            player.intent = (0.0, 0.0);
        }

        if is_human {
            Self::notify(
                &mut self.outbox,
                self.id,
                player_id,
                ServerMsg::Damaged { amount, health },
            );
        }
        self.broadcast(ServerMsg::HealthUpdate {
            player_id,
            health,
            alive: !killed,
        });

        if killed {
            info!(match_id = %self.id, player_id = %player_id, kills, round, "Player died");
            if is_human {
                Self::notify(
                    &mut self.outbox,
                    self.id,
                    player_id,
                    ServerMsg::YouDied { kills, round },
                );
            }
        }
    }

    fn update_bullets(&mut self, dt: f32) {
        let bullet_ids: Vec<BulletId> = self.bullets.keys().copied().collect();

        for bullet_id in bullet_ids {
            let Some(bullet) = self.bullets.get_mut(&bullet_id) else {
                continue;
            };
            if !bullet.advance(&self.map, dt) {
                self.bullets.remove(&bullet_id);
                continue;
            }

            let hit = self
                .zombies
                .values()
                .find(|z| bullet.hits(z.x, z.y))
                .map(|z| z.id);
            let Some(zombie_id) = hit else {
                continue;
            };
            let owner_id = bullet.owner_id;
            self.bullets.remove(&bullet_id);

            let Some(zombie) = self.zombies.get_mut(&zombie_id) else {
                continue;
            };
            zombie.hp -= BULLET_DAMAGE;
            if zombie.hp > 0 {
                continue;
            }

            self.zombies.remove(&zombie_id);
            self.cooldowns.forget_zombie(zombie_id);
            if let Some(owner) = self.players.get_mut(&owner_id) {
                owner.kills += 1;
                let kills = owner.kills;
                if !owner.is_bot() {
                    Self::notify(&mut self.outbox, self.id, owner_id, ServerMsg::KillCount { kills });
                }
            }
            debug!(match_id = %self.id, zombie_id, owner_id = %owner_id, "Zombie killed");
        }
    }

    fn end(&mut self) {
        self.phase = MatchPhase::Ended;
        self.waves.stop();
        self.zombies.clear();
        self.bullets.clear();

        let stats = self.build_match_stats();
        let round = self.waves.round();
        self.broadcast(ServerMsg::MatchEnded { round, stats });
        info!(match_id = %self.id, round, ticks = self.tick, "Match ended");
    }

    /// Build match stats
    fn build_match_stats(&self) -> MatchStats {
        let mut player_stats: Vec<PlayerMatchStats> = self
            .players
            .values()
            .map(|p| PlayerMatchStats {
                player_id: p.id,
                display_name: p.display_name.clone(),
                is_bot: p.is_bot(),
                kills: p.kills,
            })
            .collect();
        player_stats.sort_by(|a, b| b.kills.cmp(&a.kills));

        MatchStats {
            ticks: self.tick,
            duration_secs: self.clock.now().as_secs_f32(),
            player_stats,
        }
    }
}

/// Launch positions clustered inside the keep-clear zone, kept apart by
/// `MIN_SPAWN_SEPARATION` when space allows
fn spawn_positions<R: Rng + ?Sized>(
    map: &TileMap,
    count: usize,
    keep_clear_radius: usize,
    rng: &mut R,
) -> Vec<(f32, f32)> {
    let (cx, cy) = map.center().center();
    let spread = keep_clear_radius as f32 * TILE_SIZE;
    let mut placed: Vec<(f32, f32)> = Vec::with_capacity(count);

    for _ in 0..count {
        let mut choice = (cx, cy);
        for _ in 0..SPAWN_PLACEMENT_ATTEMPTS {
            let x = cx + rng.gen_range(-spread..=spread);
            let y = cy + rng.gen_range(-spread..=spread);
            if is_blocked(map, x, y) {
                continue;
            }
            choice = (x, y);
            let separated = placed
                .iter()
                .all(|&(px, py)| distance(px, py, x, y) >= MIN_SPAWN_SEPARATION);
            if separated {
                break;
            }
        }
        placed.push(choice);
    }

    placed
}
