//! Snapshot building

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::net::protocol::{BulletSnapshot, PlayerSnapshot, ServerMsg, ZombieSnapshot};

use super::combat::{Bullet, BulletId, ZombieId};
use super::entities::{Player, Zombie};

/// Builds snapshots for network transmission
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used for important events)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Build a snapshot message
    pub fn build(
        &self,
        tick: u64,
        round: u32,
        players: &BTreeMap<Uuid, Player>,
        zombies: &BTreeMap<ZombieId, Zombie>,
        bullets: &BTreeMap<BulletId, Bullet>,
    ) -> ServerMsg {
        let players = players
            .values()
            .map(|p| PlayerSnapshot {
                player_id: p.id,
                display_name: p.display_name.clone(),
                x: p.x,
                y: p.y,
                health: p.health,
                alive: p.alive,
            })
            .collect();

        let zombies = zombies
            .values()
            .map(|z| ZombieSnapshot {
                id: z.id,
                x: z.x,
                y: z.y,
                hp: z.hp,
            })
            .collect();

        let bullets = bullets
            .values()
            .map(|b| BulletSnapshot {
                id: b.id,
                x: b.x,
                y: b.y,
            })
            .collect();

        ServerMsg::Snapshot {
            tick,
            round,
            zombies,
            bullets,
            players,
        }
    }
}
