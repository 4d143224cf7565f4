//! Match scheduler - owns every live match and drives them at a fixed cadence

use std::collections::HashMap;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::net::gateway::{ArenaHandle, MatchCommand};
use crate::net::protocol::Outbound;
use crate::util::time::tick_duration;

use super::r#match::{GameMatch, LaunchError, MatchSettings};

/// Outbound messages buffered per subscriber before it starts lagging
pub const OUTBOUND_BUFFER: usize = 1024;

/// Player -> current match, shared with every gateway handle
pub type PlayerDirectory = Arc<DashMap<Uuid, Uuid>>;

/// Scheduler advancing all live matches
pub struct MatchLoop {
    settings: MatchSettings,
    spawn_interval: Duration,
    matches: HashMap<Uuid, GameMatch>,
    directory: PlayerDirectory,
    outbound_tx: broadcast::Sender<Outbound>,
    /// Source of per-match seeds
    seeds: ChaCha8Rng,
}

impl MatchLoop {
    /// Create an empty scheduler.
    ///
    /// With `seed` set, match seeds are derived from it so a whole run is
    /// reproducible; otherwise they come from OS entropy.
    pub fn new(settings: MatchSettings, spawn_interval: Duration, seed: Option<u64>) -> Self {
        let (outbound_tx, _) = broadcast::channel(OUTBOUND_BUFFER);
        let seeds = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Self {
            settings,
            spawn_interval,
            matches: HashMap::new(),
            directory: Arc::new(DashMap::new()),
            outbound_tx,
            seeds,
        }
    }

    /// Gateway handle that feeds `commands` into this scheduler
    pub fn handle(&self, commands: mpsc::Sender<MatchCommand>) -> ArenaHandle {
        ArenaHandle::new(commands, self.outbound_tx.clone(), self.directory.clone())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Outbound> {
        self.outbound_tx.subscribe()
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    pub fn get(&self, match_id: &Uuid) -> Option<&GameMatch> {
        self.matches.get(match_id)
    }

    pub fn get_mut(&mut self, match_id: &Uuid) -> Option<&mut GameMatch> {
        self.matches.get_mut(match_id)
    }

    /// Match a player is currently in
    pub fn match_of(&self, player_id: &Uuid) -> Option<Uuid> {
        self.directory.get(player_id).map(|entry| *entry)
    }

    /// Launch a match for the ready players and register it
    pub fn launch(&mut self, players: Vec<(Uuid, String)>) -> Result<Uuid, LaunchError> {
        if let Some((player_id, _)) = players
            .iter()
            .find(|(player_id, _)| self.directory.contains_key(player_id))
        {
            return Err(LaunchError::AlreadyInMatch(*player_id));
        }

        let match_id = Uuid::new_v4();
        let seed: u64 = self.seeds.gen();
        let human_ids: Vec<Uuid> = players.iter().map(|(id, _)| *id).collect();
        let mut game_match = GameMatch::launch(match_id, seed, &self.settings, players)?;

        for player_id in human_ids {
            self.directory.insert(player_id, match_id);
        }
        flush(&self.outbound_tx, &mut game_match);
        self.matches.insert(match_id, game_match);

        Ok(match_id)
    }

    /// Apply one inbound command between ticks
    pub fn apply(&mut self, command: MatchCommand) {
        match command {
            MatchCommand::Launch { players, reply } => {
                let result = self.launch(players);
                if let Err(e) = &result {
                    warn!(error = %e, "Match launch rejected");
                }
                let _ = reply.send(result);
            }
            MatchCommand::SetMovementIntent { player_id, x, y } => {
                if let Some(game_match) = match_for(&mut self.matches, &self.directory, &player_id) {
                    game_match.set_movement_intent(player_id, x, y);
                }
            }
            MatchCommand::FireAt {
                player_id,
                target_x,
                target_y,
            } => {
                if let Some(game_match) = match_for(&mut self.matches, &self.directory, &player_id) {
                    game_match.fire_at(player_id, target_x, target_y);
                }
            }
            MatchCommand::Disconnect { player_id } => {
                self.directory.remove(&player_id);
                let Some(game_match) = match_for(&mut self.matches, &self.directory, &player_id) else {
                    debug!(player_id = %player_id, "Disconnect for player without a match");
                    return;
                };
                game_match.remove_player(player_id);
                flush(&self.outbound_tx, game_match);
            }
        }
    }

    /// Tick every live match once and retire the ones that ended
    pub fn tick_all(&mut self) {
        let mut retired = Vec::new();

        for (match_id, game_match) in self.matches.iter_mut() {
            // A faulted match stays scheduled and ticks again next time
            isolate(*match_id, "tick", || game_match.run_tick());
            flush(&self.outbound_tx, game_match);
            if !game_match.is_running() {
                retired.push(*match_id);
            }
        }

        for match_id in retired {
            self.retire(match_id);
        }
    }

    /// Run one wave spawn step for every match that is spawning
    pub fn spawn_step_all(&mut self) {
        for (match_id, game_match) in self.matches.iter_mut() {
            if !game_match.waves.is_spawning() {
                continue;
            }
            isolate(*match_id, "spawn", || game_match.spawn_step());
        }
    }

    fn retire(&mut self, match_id: Uuid) {
        if let Some(game_match) = self.matches.remove(&match_id) {
            self.directory.retain(|_, m| *m != match_id);
            info!(
                match_id = %match_id,
                round = game_match.round(),
                ticks = game_match.tick,
                active_matches = self.matches.len(),
                "Match retired"
            );
        }
    }

    /// Drive all matches until `shutdown` resolves or every handle is dropped
    pub async fn run<S>(mut self, mut commands: mpsc::Receiver<MatchCommand>, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        let mut tick_interval = interval(tick_duration(self.settings.tick_rate));
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut spawn_interval = interval(self.spawn_interval);
        spawn_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            tick_rate = self.settings.tick_rate,
            spawn_interval_ms = self.spawn_interval.as_millis() as u64,
            "Match scheduler started"
        );

        loop {
            tokio::select! {
                _ = tick_interval.tick() => self.tick_all(),
                _ = spawn_interval.tick() => self.spawn_step_all(),
                command = commands.recv() => match command {
                    Some(command) => self.apply(command),
                    None => {
                        info!("All arena handles dropped");
                        break;
                    }
                },
                _ = &mut shutdown => {
                    info!(active_matches = self.matches.len(), "Match scheduler shutting down");
                    break;
                }
            }
        }
    }
}

fn match_for<'a>(
    matches: &'a mut HashMap<Uuid, GameMatch>,
    directory: &PlayerDirectory,
    player_id: &Uuid,
) -> Option<&'a mut GameMatch> {
    match directory.get(player_id).map(|entry| *entry) {
        Some(match_id) => matches.get_mut(&match_id),
        // Disconnects arrive after the directory entry is gone
        None => matches
            .values_mut()
            .find(|m| m.players.contains_key(player_id)),
    }
}

/// Send everything a match produced since the last flush
fn flush(outbound_tx: &broadcast::Sender<Outbound>, game_match: &mut GameMatch) {
    for outbound in game_match.drain_outbox() {
        // No subscribers is fine
        let _ = outbound_tx.send(outbound);
    }
}

/// Run one match step, containing any panic to that match
fn isolate(match_id: Uuid, stage: &'static str, step: impl FnOnce()) -> bool {
    match catch_unwind(AssertUnwindSafe(step)) {
        Ok(()) => true,
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(match_id = %match_id, stage, reason = %reason, "Match step panicked");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::map::MapGenerator;
    use crate::net::protocol::ServerMsg;
    use tokio::sync::oneshot;

    fn small_loop() -> MatchLoop {
        let settings = MatchSettings {
            map: MapGenerator::new(20, 20, 10),
            ..MatchSettings::default()
        };
        MatchLoop::new(settings, Duration::from_millis(200), Some(1))
    }

    #[test]
    fn launch_registers_humans_in_directory() {
        let mut scheduler = small_loop();
        let mut rx = scheduler.subscribe();
        let human = Uuid::from_u128(10);

        let match_id = scheduler.launch(vec![(human, "erin".into())]).expect("launch");
        assert_eq!(scheduler.match_of(&human), Some(match_id));
        assert_eq!(scheduler.match_count(), 1);

        let first = rx.try_recv().expect("launch message");
        assert!(matches!(first.msg, ServerMsg::MatchLaunched { .. }));

        let again = scheduler.launch(vec![(human, "erin".into())]);
        assert!(matches!(again, Err(LaunchError::AlreadyInMatch(id)) if id == human));
    }

    #[test]
    fn launch_command_replies_with_result() {
        let mut scheduler = small_loop();
        let (reply, mut reply_rx) = oneshot::channel();
        scheduler.apply(MatchCommand::Launch {
            players: vec![],
            reply,
        });
        let match_id = reply_rx.try_recv().expect("reply").expect("launched");
        assert!(scheduler.get(&match_id).is_some());
    }

    #[test]
    fn commands_route_through_directory() {
        let mut scheduler = small_loop();
        let human = Uuid::from_u128(11);
        let match_id = scheduler.launch(vec![(human, "finn".into())]).expect("launch");

        scheduler.apply(MatchCommand::SetMovementIntent {
            player_id: human,
            x: 1.0,
            y: 0.0,
        });
        let game_match = scheduler.get(&match_id).expect("match");
        assert_eq!(game_match.players[&human].intent, (1.0, 0.0));

        scheduler.apply(MatchCommand::FireAt {
            player_id: human,
            target_x: 0.0,
            target_y: 0.0,
        });
        assert_eq!(scheduler.get(&match_id).expect("match").bullets.len(), 1);

        scheduler.apply(MatchCommand::Disconnect { player_id: human });
        assert_eq!(scheduler.match_of(&human), None);
        assert!(!scheduler.get(&match_id).expect("match").players.contains_key(&human));
    }

    #[test]
    fn spawn_steps_add_zombies() {
        let mut scheduler = small_loop();
        let match_id = scheduler.launch(vec![]).expect("launch");
        for _ in 0..5 {
            scheduler.spawn_step_all();
        }
        assert_eq!(scheduler.get(&match_id).expect("match").zombies.len(), 5);
    }

    #[test]
    fn ended_match_is_retired() {
        let mut scheduler = small_loop();
        let mut rx = scheduler.subscribe();
        let human = Uuid::from_u128(12);
        let match_id = scheduler.launch(vec![(human, "gus".into())]).expect("launch");

        for player in scheduler.get_mut(&match_id).expect("match").players.values_mut() {
            player.alive = false;
        }
        scheduler.tick_all();

        assert_eq!(scheduler.match_count(), 0);
        assert_eq!(scheduler.match_of(&human), None);

        let mut ended = false;
        while let Ok(outbound) = rx.try_recv() {
            ended |= matches!(outbound.msg, ServerMsg::MatchEnded { .. });
        }
        assert!(ended);
    }

    #[test]
    fn panicking_match_does_not_stop_others() {
        let mut scheduler = small_loop();
        let broken = scheduler.launch(vec![]).expect("launch");
        let healthy = scheduler.launch(vec![]).expect("launch");

        // Tick counter overflow panics in test builds
        scheduler.get_mut(&broken).expect("match").tick = u64::MAX;
        scheduler.tick_all();
        scheduler.tick_all();

        assert_eq!(scheduler.get(&healthy).expect("match").tick, 2);
        let faulted = scheduler.get(&broken).expect("faulted match stays registered");
        assert_eq!(faulted.tick, u64::MAX);
        assert!(faulted.is_running());

        // Once the fault clears the match ticks again
        scheduler.get_mut(&broken).expect("match").tick = 0;
        scheduler.tick_all();
        assert_eq!(scheduler.get(&broken).expect("match").tick, 1);
        assert_eq!(scheduler.get(&healthy).expect("match").tick, 3);
        assert_eq!(scheduler.match_count(), 2);
    }

    #[test]
    fn isolate_reports_panics() {
        assert!(isolate(Uuid::nil(), "test", || {}));
        assert!(!isolate(Uuid::nil(), "test", || panic!("boom")));
    }
}
