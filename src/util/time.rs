//! Time utilities for game simulation

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Tick rate configuration
pub const SIMULATION_TPS: u32 = 30; // 30 ticks per second
pub const SPAWN_INTERVAL_MS: u64 = 200; // Zombie spawn cadence

/// Wall-clock length of one simulation tick
pub fn tick_duration(tps: u32) -> Duration {
    Duration::from_micros(1_000_000 / tps.max(1) as u64)
}

/// Calculate delta time for physics (in seconds)
pub fn tick_delta(tps: u32) -> f32 {
    1.0 / tps.max(1) as f32
}

/// Simulated time elapsed inside a match.
///
/// Advances only when the match ticks, so cooldowns and timestamps are
/// reproducible no matter how the scheduler is driven.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchClock {
    elapsed: Duration,
}

impl MatchClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.elapsed
    }

    pub fn advance(&mut self, step: Duration) {
        self.elapsed += step;
    }
}
