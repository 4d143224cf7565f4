//! Message definitions exchanged with the transport layer
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Desired movement direction; need not be normalized
    Move { x: f32, y: f32 },

    /// Shoot toward a map position
    Fire { target_x: f32, target_y: f32 },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Match has been launched
    MatchLaunched {
        match_id: Uuid,
        /// Seed the map and spawns were generated from
        seed: u64,
        rows: usize,
        cols: usize,
        /// Row-major map, `#` wall and `.` open
        tiles: Vec<String>,
        players: Vec<PlayerInfo>,
        /// Server wall clock at launch (unix millis)
        server_time: u64,
    },

    /// Game state snapshot (sent every tick)
    Snapshot {
        tick: u64,
        round: u32,
        zombies: Vec<ZombieSnapshot>,
        bullets: Vec<BulletSnapshot>,
        players: Vec<PlayerSnapshot>,
    },

    /// A new wave has begun
    WaveStarted { round: u32, label: String },

    /// Scoring player's updated kill count
    KillCount { kills: u32 },

    /// Damage taken by the receiving player
    Damaged { amount: f32, health: f32 },

    /// Health change of any player in the match
    HealthUpdate {
        player_id: Uuid,
        health: f32,
        alive: bool,
    },

    /// Receiving player has died
    YouDied { kills: u32, round: u32 },

    /// Player left the match
    PlayerLeft { player_id: Uuid },

    /// Match has ended
    MatchEnded { round: u32, stats: MatchStats },
}

/// Player info for launch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub player_id: Uuid,
    pub display_name: String,
    pub is_bot: bool,
}

/// Player state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub player_id: Uuid,
    pub display_name: String,
    pub x: f32,
    pub y: f32,
    /// Health (0-100)
    pub health: f32,
    pub alive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZombieSnapshot {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub hp: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulletSnapshot {
    pub id: u64,
    pub x: f32,
    pub y: f32,
}

/// Match statistics at end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchStats {
    pub ticks: u64,
    pub duration_secs: f32,
    pub player_stats: Vec<PlayerMatchStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerMatchStats {
    pub player_id: Uuid,
    pub display_name: String,
    pub is_bot: bool,
    pub kills: u32,
}

/// Who an outbound message is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "to", content = "player_id", rename_all = "snake_case")]
pub enum Audience {
    /// Every participant of the match
    Match,
    /// One player only
    Player(Uuid),
}

/// Outbound message addressed within a match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outbound {
    pub match_id: Uuid,
    pub audience: Audience,
    pub msg: ServerMsg,
}

impl Outbound {
    /// Whether `player_id` of `match_id` should receive this message
    pub fn is_for(&self, match_id: Uuid, player_id: Uuid) -> bool {
        self.match_id == match_id
            && match self.audience {
                Audience::Match => true,
                Audience::Player(id) => id == player_id,
            }
    }
}

/// Serialize a message for a text frame
pub fn encode(msg: &ServerMsg) -> Result<String, serde_json::Error> {
    serde_json::to_string(msg)
}

/// Parse a client text frame
pub fn decode(text: &str) -> Result<ClientMsg, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_use_type_tag() {
        let msg = decode(r#"{"type":"move","x":1.0,"y":-0.5}"#).expect("parse");
        assert!(matches!(msg, ClientMsg::Move { x, y } if x == 1.0 && y == -0.5));

        let msg = decode(r#"{"type":"fire","target_x":10.0,"target_y":20.0}"#).expect("parse");
        assert!(matches!(msg, ClientMsg::Fire { .. }));

        assert!(decode(r#"{"type":"teleport"}"#).is_err());
    }

    #[test]
    fn wave_announcement_encoding() {
        let json = encode(&ServerMsg::WaveStarted {
            round: 2,
            label: "Round 2".to_string(),
        })
        .expect("encode");
        let value: serde_json::Value = serde_json::from_str(&json).expect("json");
        assert_eq!(value["type"], "wave_started");
        assert_eq!(value["round"], 2);
        assert_eq!(value["label"], "Round 2");
    }

    #[test]
    fn audience_filtering() {
        let match_id = Uuid::from_u128(1);
        let me = Uuid::from_u128(2);
        let other = Uuid::from_u128(3);
        let personal = Outbound {
            match_id,
            audience: Audience::Player(me),
            msg: ServerMsg::KillCount { kills: 1 },
        };
        assert!(personal.is_for(match_id, me));
        assert!(!personal.is_for(match_id, other));
        assert!(!personal.is_for(Uuid::from_u128(9), me));

        let everyone = Outbound {
            audience: Audience::Match,
            ..personal
        };
        assert!(everyone.is_for(match_id, other));
    }
}
