//! Configuration module - environment variable parsing

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::game::map::{
    ConnectivityPolicy, MapGenerator, DEFAULT_COLS, DEFAULT_KEEP_CLEAR_RADIUS, DEFAULT_OBSTACLES,
    DEFAULT_ROWS,
};
use crate::game::r#match::{MatchSettings, MAX_PLAYERS};
use crate::game::wave::{INITIAL_WAVE_QUOTA, MAX_CONCURRENT_ZOMBIES};
use crate::util::time::{SIMULATION_TPS, SPAWN_INTERVAL_MS};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,

    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Zombie spawn cadence
    pub spawn_interval: Duration,
    /// Ticks between two snapshots
    pub snapshot_every_ticks: u32,

    pub map_rows: usize,
    pub map_cols: usize,
    pub map_obstacles: usize,
    /// Radius (tiles) around the center kept free of obstacles
    pub keep_clear_radius: usize,
    pub connectivity: ConnectivityPolicy,

    /// Player cap per match; bots fill the rest
    pub max_players: usize,
    pub max_zombies: usize,
    pub initial_wave_quota: u32,

    /// Fixed seed for reproducible runs
    pub arena_seed: Option<u64>,
    /// Bot-only matches the server binary launches at startup
    pub headless_matches: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            tick_rate: SIMULATION_TPS,
            spawn_interval: Duration::from_millis(SPAWN_INTERVAL_MS),
            snapshot_every_ticks: 1,
            map_rows: DEFAULT_ROWS,
            map_cols: DEFAULT_COLS,
            map_obstacles: DEFAULT_OBSTACLES,
            keep_clear_radius: DEFAULT_KEEP_CLEAR_RADIUS,
            connectivity: ConnectivityPolicy::BestEffort,
            max_players: MAX_PLAYERS,
            max_zombies: MAX_CONCURRENT_ZOMBIES,
            initial_wave_quota: INITIAL_WAVE_QUOTA,
            arena_seed: None,
            headless_matches: 1,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let tick_rate = parse_or(&lookup, "TICK_RATE", defaults.tick_rate)?;
        if tick_rate == 0 {
            return Err(invalid("TICK_RATE", "0"));
        }
        let spawn_interval_ms = parse_or(&lookup, "SPAWN_INTERVAL_MS", SPAWN_INTERVAL_MS)?;
        if spawn_interval_ms == 0 {
            return Err(invalid("SPAWN_INTERVAL_MS", "0"));
        }
        let max_players = parse_or(&lookup, "MAX_PLAYERS", defaults.max_players)?;
        if max_players == 0 {
            return Err(invalid("MAX_PLAYERS", "0"));
        }

        let max_zombies = parse_or(&lookup, "MAX_ZOMBIES", defaults.max_zombies)?;
        if max_zombies == 0 {
            return Err(invalid("MAX_ZOMBIES", "0"));
        }
        let initial_wave_quota =
            parse_or(&lookup, "INITIAL_WAVE_QUOTA", defaults.initial_wave_quota)?;
        if initial_wave_quota == 0 {
            return Err(invalid("INITIAL_WAVE_QUOTA", "0"));
        }

        let connectivity = match lookup("MAP_CONNECTIVITY") {
            None => defaults.connectivity,
            Some(value) => match value.trim() {
                "best_effort" => ConnectivityPolicy::BestEffort,
                "strict" => ConnectivityPolicy::Strict,
                _ => return Err(invalid("MAP_CONNECTIVITY", &value)),
            },
        };

        let log_json = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("pretty") => false,
            Some("json") => true,
            Some(other) => return Err(invalid("LOG_FORMAT", other)),
        };

        let arena_seed = match lookup("ARENA_SEED") {
            None => None,
            Some(value) => Some(
                value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| invalid("ARENA_SEED", &value))?,
            ),
        };

        Ok(Self {
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_json,
            tick_rate,
            spawn_interval: Duration::from_millis(spawn_interval_ms),
            snapshot_every_ticks: parse_or(
                &lookup,
                "SNAPSHOT_EVERY_TICKS",
                defaults.snapshot_every_ticks,
            )?,
            map_rows: parse_or(&lookup, "MAP_ROWS", defaults.map_rows)?,
            map_cols: parse_or(&lookup, "MAP_COLS", defaults.map_cols)?,
            map_obstacles: parse_or(&lookup, "MAP_OBSTACLES", defaults.map_obstacles)?,
            keep_clear_radius: parse_or(&lookup, "KEEP_CLEAR_RADIUS", defaults.keep_clear_radius)?,
            connectivity,
            max_players,
            max_zombies,
            initial_wave_quota,
            arena_seed,
            headless_matches: parse_or(&lookup, "HEADLESS_MATCHES", defaults.headless_matches)?,
        })
    }

    /// Per-match tunables
    pub fn match_settings(&self) -> MatchSettings {
        MatchSettings {
            tick_rate: self.tick_rate,
            map: MapGenerator {
                rows: self.map_rows,
                cols: self.map_cols,
                obstacle_count: self.map_obstacles,
                keep_clear_radius: self.keep_clear_radius,
                policy: self.connectivity,
            },
            max_players: self.max_players,
            max_zombies: self.max_zombies,
            initial_wave_quota: self.initial_wave_quota,
            snapshot_every_ticks: self.snapshot_every_ticks,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| invalid(key, &value)),
    }
}

fn invalid(key: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = config_from(&[]).expect("config");
        assert_eq!(config.tick_rate, 30);
        assert_eq!(config.spawn_interval, Duration::from_millis(200));
        assert_eq!(config.map_rows, 50);
        assert_eq!(config.map_obstacles, 250);
        assert_eq!(config.keep_clear_radius, 6);
        assert_eq!(config.connectivity, ConnectivityPolicy::BestEffort);
        assert_eq!(config.arena_seed, None);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("TICK_RATE", "60"),
            ("MAP_CONNECTIVITY", "strict"),
            ("ARENA_SEED", "42"),
            ("MAX_PLAYERS", " 2 "),
            ("LOG_FORMAT", "json"),
        ])
        .expect("config");
        assert!(config.log_json);
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.connectivity, ConnectivityPolicy::Strict);
        assert_eq!(config.arena_seed, Some(42));

        let settings = config.match_settings();
        assert_eq!(settings.max_players, 2);
        assert_eq!(settings.map.policy, ConnectivityPolicy::Strict);
    }

    #[test]
    fn bad_values_name_the_key() {
        let err = config_from(&[("MAP_ROWS", "many")]).expect_err("invalid");
        assert!(matches!(err, ConfigError::Invalid { key: "MAP_ROWS", .. }));

        let err = config_from(&[("TICK_RATE", "0")]).expect_err("zero rate");
        assert!(matches!(err, ConfigError::Invalid { key: "TICK_RATE", .. }));

        let err = config_from(&[("MAX_ZOMBIES", "0")]).expect_err("zero zombie cap");
        assert!(matches!(err, ConfigError::Invalid { key: "MAX_ZOMBIES", .. }));

        let err = config_from(&[("INITIAL_WAVE_QUOTA", "0")]).expect_err("zero quota");
        assert!(matches!(err, ConfigError::Invalid { key: "INITIAL_WAVE_QUOTA", .. }));

        let err = config_from(&[("MAP_CONNECTIVITY", "maybe")]).expect_err("policy");
        assert!(matches!(err, ConfigError::Invalid { key: "MAP_CONNECTIVITY", .. }));
    }
}
