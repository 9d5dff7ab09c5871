//! Server and engine configuration.
//!
//! Defaults come from the game constants; `ServerConfig::from_env` layers an
//! optional JSON file (`PONGNET_CONFIG`) and `PONGNET_*` variables on top.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{PongNetError, Result};
use crate::game::constants::{
    GAME_START_TIMER_MS, MAX_DISCONNECT_ACCUMULATED_MS, MAX_SCORE, TICK_INTERVAL_MS,
};
use crate::telemetry::TracingConfig;

/// Knobs of the tick scheduler and match sessions.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tick_interval_ms: u64,
    pub start_countdown_ms: i64,
    pub max_disconnect_ms: i64,
    pub max_score: u32,
    /// Waiting rooms untouched for this long are removed.
    pub idle_room_ttl_secs: u64,
    /// Completed rooms are kept this long before being dropped.
    pub completed_room_retention_secs: u64,
    pub housekeeping_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: TICK_INTERVAL_MS,
            start_countdown_ms: GAME_START_TIMER_MS,
            max_disconnect_ms: MAX_DISCONNECT_ACCUMULATED_MS,
            max_score: MAX_SCORE,
            idle_room_ttl_secs: 30 * 60,
            completed_room_retention_secs: 5 * 60,
            housekeeping_interval_ms: 1_000,
        }
    }
}

impl EngineConfig {
    pub fn with_tick_interval(mut self, millis: u64) -> Self {
        self.tick_interval_ms = millis;
        self
    }

    pub fn with_start_countdown(mut self, millis: i64) -> Self {
        self.start_countdown_ms = millis;
        self
    }

    pub fn with_max_disconnect(mut self, millis: i64) -> Self {
        self.max_disconnect_ms = millis;
        self
    }

    pub fn with_idle_room_ttl(mut self, secs: u64) -> Self {
        self.idle_room_ttl_secs = secs;
        self
    }

    pub fn with_completed_room_retention(mut self, secs: u64) -> Self {
        self.completed_room_retention_secs = secs;
        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn idle_room_ttl_ms(&self) -> i64 {
        (self.idle_room_ttl_secs as i64).saturating_mul(1_000)
    }

    pub fn completed_room_retention_ms(&self) -> i64 {
        (self.completed_room_retention_secs as i64).saturating_mul(1_000)
    }
}

/// Process-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub log_level: String,
    pub log_json: bool,
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:7350".to_string(),
            log_level: "info".to_string(),
            log_json: false,
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Parse a JSON document; missing fields fall back to defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("PONGNET_CONFIG") {
            Some(path) => {
                let raw = std::fs::read_to_string(&path)?;
                Self::from_json(&raw)?
            }
            None => Self::default(),
        };

        if let Some(bind) = lookup("PONGNET_BIND") {
            config.bind_addr = bind;
        }
        if let Some(level) = lookup("PONGNET_LOG") {
            config.log_level = level;
        }
        if let Some(json) = lookup("PONGNET_LOG_JSON") {
            config.log_json = parse_bool("PONGNET_LOG_JSON", &json)?;
        }
        if let Some(tick) = lookup("PONGNET_TICK_MS") {
            config.engine.tick_interval_ms = parse_num("PONGNET_TICK_MS", &tick)?;
        }
        if let Some(ttl) = lookup("PONGNET_IDLE_ROOM_TTL_SECS") {
            config.engine.idle_room_ttl_secs = parse_num("PONGNET_IDLE_ROOM_TTL_SECS", &ttl)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.tick_interval_ms == 0 {
            return Err(PongNetError::config("tick_interval_ms must be positive"));
        }
        if self.engine.max_score == 0 {
            return Err(PongNetError::config("max_score must be positive"));
        }
        Ok(())
    }

    pub fn tracing(&self) -> TracingConfig {
        let config = TracingConfig::new("pongnet").with_level(self.log_level.clone());
        if self.log_json {
            config.with_json()
        } else {
            config
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(PongNetError::config(format!("{key}: not a boolean: {other}"))),
    }
}

fn parse_num(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| PongNetError::config(format!("{key}: not a number: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:7350");
        assert_eq!(config.engine.tick_interval_ms, 16);
        assert_eq!(config.engine.start_countdown_ms, 3_000);
        assert_eq!(config.engine.max_disconnect_ms, 180_000);
        assert_eq!(config.engine.max_score, 7);
    }

    #[test]
    fn test_env_overrides() {
        let config = ServerConfig::from_vars(vars(&[
            ("PONGNET_BIND", "127.0.0.1:9000"),
            ("PONGNET_LOG", "debug"),
            ("PONGNET_LOG_JSON", "true"),
            ("PONGNET_TICK_MS", "20"),
            ("PONGNET_IDLE_ROOM_TTL_SECS", "60"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.log_level, "debug");
        assert!(config.log_json);
        assert_eq!(config.engine.tick_interval_ms, 20);
        assert_eq!(config.engine.idle_room_ttl_ms(), 60_000);
        assert!(config.tracing().json_output);
    }

    #[test]
    fn test_invalid_env_value() {
        let err = ServerConfig::from_vars(vars(&[("PONGNET_TICK_MS", "fast")])).unwrap_err();
        assert!(matches!(err, PongNetError::Config { .. }));

        let err = ServerConfig::from_vars(vars(&[("PONGNET_TICK_MS", "0")])).unwrap_err();
        assert!(matches!(err, PongNetError::Config { .. }));
    }

    #[test]
    fn test_partial_json() {
        let config =
            ServerConfig::from_json(r#"{"bind_addr":"0.0.0.0:1","engine":{"max_score":3}}"#)
                .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:1");
        assert_eq!(config.engine.max_score, 3);
        assert_eq!(config.engine.tick_interval_ms, 16);
    }
}
