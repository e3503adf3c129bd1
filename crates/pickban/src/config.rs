//! Server configuration.

use std::time::Duration;

use pickban_draft::SessionConfig;
use serde::{Deserialize, Serialize};

use crate::PickbanError;
use crate::server::PROTOCOL_VERSION;

/// Everything the server needs besides an authenticator.
///
/// Every field has a default, so a JSON file only lists what it changes:
///
/// ```json
/// { "bind_addr": "0.0.0.0:9000", "session": { "draft": { "timer_duration_ms": 20000 } } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,

    /// Version a client's `hello` must announce.
    pub protocol_version: u32,

    /// How long a new connection has to send `hello`.
    pub handshake_timeout_ms: u64,

    /// A connection that sends nothing for this long is closed.
    /// Clients keep it open with `heartbeat`.
    pub read_timeout_ms: u64,

    /// Per-connection outbound queue. A session drops a connection whose
    /// queue is full.
    pub outbound_capacity: usize,

    /// How often retired sessions are dropped from the registry.
    pub reap_interval_ms: u64,

    /// When set, `join_session` for an unknown id creates the session with
    /// [`session`](Self::session). Otherwise unknown ids are a 404.
    pub auto_create_sessions: bool,

    /// Settings for sessions the server creates on its own.
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            protocol_version: PROTOCOL_VERSION,
            handshake_timeout_ms: 5_000,
            read_timeout_ms: 15_000,
            outbound_capacity: 64,
            reap_interval_ms: 30_000,
            auto_create_sessions: false,
            session: SessionConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms)
    }

    pub fn validate(&self) -> Result<(), PickbanError> {
        if self.outbound_capacity == 0 {
            return Err(PickbanError::Config(
                "outbound_capacity must be at least 1".into(),
            ));
        }
        if self.handshake_timeout_ms == 0
            || self.read_timeout_ms == 0
            || self.reap_interval_ms == 0
        {
            return Err(PickbanError::Config("timeouts must be non-zero".into()));
        }
        self.session.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.handshake_timeout(), Duration::from_secs(5));
        assert_eq!(config.read_timeout(), Duration::from_secs(15));
        assert_eq!(config.reap_interval(), Duration::from_secs(30));
        assert_eq!(config.outbound_capacity, 64);
        assert_eq!(config.protocol_version, PROTOCOL_VERSION);
        assert!(!config.auto_create_sessions);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_config_partial_json_keeps_defaults() {
        let json = r#"{
            "bind_addr": "0.0.0.0:9000",
            "auto_create_sessions": true,
            "session": { "draft": { "timer_duration_ms": 20000 } }
        }"#;
        let config: ServerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert!(config.auto_create_sessions);
        assert_eq!(config.session.draft.timer_duration_ms, 20_000);
        assert_eq!(config.read_timeout_ms, 15_000);
        assert_eq!(config.session.phases.len(), 20);
    }

    #[test]
    fn test_server_config_zero_outbound_capacity_is_invalid() {
        let config = ServerConfig {
            outbound_capacity: 0,
            ..ServerConfig::default()
        };
        assert!(matches!(config.validate(), Err(PickbanError::Config(_))));
    }

    #[test]
    fn test_server_config_invalid_session_is_draft_error() {
        let mut config = ServerConfig::default();
        config.session.phases.clear();
        assert!(matches!(config.validate(), Err(PickbanError::Draft(_))));
    }
}
