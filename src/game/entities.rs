//! Players, bots and zombies

use std::time::Duration;

use uuid::Uuid;

use super::combat::{ZombieId, BOT_SHOOT_COOLDOWN, MAX_HEALTH};

/// Who drives a player entity
#[derive(Debug, Clone)]
pub enum Controller {
    /// Input arrives from a connected session
    Human,
    /// Steered by the server every tick
    Bot(BotState),
}

#[derive(Debug, Clone)]
pub struct BotState {
    /// Zombie chosen on the most recent tick (read-only snapshot)
    pub target: Option<ZombieId>,
    pub shoot_cooldown: Duration,
}

impl Default for BotState {
    fn default() -> Self {
        Self {
            target: None,
            shoot_cooldown: BOT_SHOOT_COOLDOWN,
        }
    }
}

/// Player state in a match (authoritative)
#[derive(Debug, Clone)]
pub struct Player {
    pub id: Uuid,
    pub display_name: String,
    pub controller: Controller,

    // Position and movement
    pub x: f32,
    pub y: f32,
    /// Last movement direction received; sanitised when applied
    pub intent: (f32, f32),

    // Combat
    pub health: f32,
    pub alive: bool,
    pub last_shot: Option<Duration>,

    // Stats
    pub kills: u32,
}

impl Player {
    pub fn human(id: Uuid, display_name: String, x: f32, y: f32) -> Self {
        Self::new(id, display_name, Controller::Human, x, y)
    }

    pub fn bot(id: Uuid, display_name: String, x: f32, y: f32) -> Self {
        Self::new(id, display_name, Controller::Bot(BotState::default()), x, y)
    }

    fn new(id: Uuid, display_name: String, controller: Controller, x: f32, y: f32) -> Self {
        Self {
            id,
            display_name,
            controller,
            x,
            y,
            intent: (0.0, 0.0),
            health: MAX_HEALTH,
            alive: true,
            last_shot: None,
            kills: 0,
        }
    }

    pub fn is_bot(&self) -> bool {
        matches!(self.controller, Controller::Bot(_))
    }
}

/// Zombie in the arena
#[derive(Debug, Clone)]
pub struct Zombie {
    pub id: ZombieId,
    pub x: f32,
    pub y: f32,
    pub hp: i32,
    pub max_hp: i32,
    pub speed: f32,
    /// Most recent hit this zombie landed on anyone
    pub last_attack: Option<Duration>,
}

impl Zombie {
    pub fn new(id: ZombieId, x: f32, y: f32, hp: i32, speed: f32) -> Self {
        Self {
            id,
            x,
            y,
            hp,
            max_hp: hp,
            speed,
            last_attack: None,
        }
    }
}
