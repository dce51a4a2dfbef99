//! Process-level configuration.

use std::time::Duration;

use arcade_room::LobbyConfig;

use crate::ArcadeError;

pub const BIND_VAR: &str = "ARCADE_BIND";
pub const IDLE_TIMEOUT_VAR: &str = "ARCADE_IDLE_TIMEOUT_SECS";
pub const SWEEP_INTERVAL_VAR: &str = "ARCADE_SWEEP_INTERVAL_SECS";
pub const HANDSHAKE_TIMEOUT_VAR: &str = "ARCADE_HANDSHAKE_TIMEOUT_SECS";

/// Everything the server binary needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address, `host:port`.
    pub bind: String,
    /// A connection outside any room with no traffic either way for this
    /// long is closed.
    pub idle_timeout: Duration,
    /// Limit for a client to finish the WebSocket upgrade.
    pub handshake_timeout: Duration,
    pub lobby: LobbyConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            idle_timeout: Duration::from_secs(120),
            handshake_timeout: Duration::from_secs(10),
            lobby: LobbyConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `ARCADE_BIND`, `ARCADE_IDLE_TIMEOUT_SECS`,
    /// `ARCADE_HANDSHAKE_TIMEOUT_SECS` and `ARCADE_SWEEP_INTERVAL_SECS` when
    /// set.
    pub fn from_env() -> Result<Self, ArcadeError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through
    /// `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ArcadeError> {
        let mut config = Self::default();

        if let Some(bind) = lookup(BIND_VAR) {
            let bind = bind.trim();
            if bind.is_empty() {
                return Err(ArcadeError::Config { var: BIND_VAR, value: bind.to_string() });
            }
            config.bind = bind.to_string();
        }
        if let Some(idle) = seconds(&lookup, IDLE_TIMEOUT_VAR)? {
            config.idle_timeout = idle;
        }
        if let Some(handshake) = seconds(&lookup, HANDSHAKE_TIMEOUT_VAR)? {
            config.handshake_timeout = handshake;
        }
        if let Some(interval) = seconds(&lookup, SWEEP_INTERVAL_VAR)? {
            config.lobby.sweep_interval = interval;
        }
        Ok(config)
    }
}

/// A positive whole number of seconds, if the variable is set.
fn seconds(lookup: &impl Fn(&str) -> Option<String>, var: &'static str) -> Result<Option<Duration>, ArcadeError> {
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Some(Duration::from_secs(secs))),
        _ => Err(ArcadeError::Config { var, value: raw }),
    }
}
