//! Configuration for the call coordinator

use murmur_infra_common::config::{env_override, load_config_file};
use murmur_infra_common::ErrorExt;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::errors::{CallError, Result};
use crate::types::{IceServer, ParticipantProfile};

/// Overrides the ring timeout, in seconds
pub const ENV_RING_TIMEOUT_SECS: &str = "MURMUR_RING_TIMEOUT_SECS";
/// Overrides the calls collection name
pub const ENV_CALLS_COLLECTION: &str = "MURMUR_CALLS_COLLECTION";

/// Public STUN servers used when nothing else is configured
pub const DEFAULT_STUN_SERVERS: &[&str] = &[
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
    "stun:stun2.l.google.com:19302",
    "stun:stun3.l.google.com:19302",
    "stun:stun4.l.google.com:19302",
];

/// Call coordinator configuration.
///
/// Every field has a default, so a config file only needs the fields it
/// changes plus the local participant:
///
/// ```toml
/// ring_timeout_secs = 30
///
/// [local]
/// id = "alice"
/// name = "Alice"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// Who this coordinator acts for
    pub local: ParticipantProfile,

    /// STUN/TURN servers handed to every peer negotiation
    pub ice_servers: Vec<IceServer>,

    /// How long a call may ring before it is given up
    pub ring_timeout_secs: u64,

    /// Interval of the connected-duration ticker
    pub duration_tick_ms: u64,

    /// Collection holding the call documents
    pub calls_collection: String,

    /// Capacity of the internal event router
    pub event_channel_capacity: usize,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            local: ParticipantProfile::new(""),
            ice_servers: DEFAULT_STUN_SERVERS.iter().map(|url| IceServer::stun(*url)).collect(),
            ring_timeout_secs: 45,
            duration_tick_ms: 1000,
            calls_collection: "calls".to_string(),
            event_channel_capacity: 256,
        }
    }
}

impl CallConfig {
    /// Defaults for the given local participant
    pub fn new(local: ParticipantProfile) -> Self {
        Self { local, ..Default::default() }
    }

    pub fn with_ice_servers(mut self, servers: Vec<IceServer>) -> Self {
        self.ice_servers = servers;
        self
    }

    pub fn with_ring_timeout(mut self, timeout: Duration) -> Self {
        self.ring_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_duration_tick(mut self, tick: Duration) -> Self {
        self.duration_tick_ms = tick.as_millis() as u64;
        self
    }

    pub fn with_calls_collection(mut self, collection: impl Into<String>) -> Self {
        self.calls_collection = collection.into();
        self
    }

    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    pub fn ring_timeout(&self) -> Duration {
        Duration::from_secs(self.ring_timeout_secs)
    }

    pub fn duration_tick(&self) -> Duration {
        Duration::from_millis(self.duration_tick_ms)
    }

    /// Load from a TOML or JSON file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: CallConfig = load_config_file(path.as_ref())
            .with_context("call-core", "load call config")?;
        let config = config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `MURMUR_*` overrides from the environment
    pub fn apply_env(mut self) -> Result<Self> {
        if let Some(secs) = env_override::<u64>(ENV_RING_TIMEOUT_SECS)? {
            self.ring_timeout_secs = secs;
        }
        if let Some(collection) = env_override::<String>(ENV_CALLS_COLLECTION)? {
            self.calls_collection = collection;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.local.id.as_str().trim().is_empty() {
            return Err(CallError::config("local participant id must not be empty"));
        }
        if self.ice_servers.is_empty() {
            return Err(CallError::config("at least one ICE server is required"));
        }
        if self.ice_servers.iter().any(|s| s.urls.is_empty()) {
            return Err(CallError::config("ICE server entry without urls"));
        }
        if self.ring_timeout_secs == 0 {
            return Err(CallError::config("ring timeout must be positive"));
        }
        if self.duration_tick_ms == 0 {
            return Err(CallError::config("duration tick must be positive"));
        }
        if self.calls_collection.trim().is_empty() {
            return Err(CallError::config("calls collection must not be empty"));
        }
        if self.event_channel_capacity == 0 {
            return Err(CallError::config("event channel capacity must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CallConfig::new(ParticipantProfile::new("alice"));
        assert_eq!(config.ice_servers.len(), 5);
        assert_eq!(config.ring_timeout(), Duration::from_secs(45));
        assert_eq!(config.duration_tick(), Duration::from_secs(1));
        assert_eq!(config.calls_collection, "calls");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert!(CallConfig::default().validate().is_err());

        let local = ParticipantProfile::new("alice");
        assert!(CallConfig::new(local.clone()).with_ice_servers(vec![]).validate().is_err());
        assert!(CallConfig::new(local.clone())
            .with_ring_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(CallConfig::new(local)
            .with_duration_tick(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    #[serial]
    fn test_from_toml_file() {
        unsafe { std::env::remove_var(ENV_RING_TIMEOUT_SECS); }
        unsafe { std::env::remove_var(ENV_CALLS_COLLECTION); }

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "ring_timeout_secs = 30\n\n[local]\nid = \"alice\"\nname = \"Alice\"\n\n[[ice_servers]]\nurls = [\"stun:example.org:3478\"]"
        )
        .unwrap();

        let config = CallConfig::from_file(file.path()).unwrap();
        assert_eq!(config.ring_timeout_secs, 30);
        assert_eq!(config.local.display_name(), "Alice");
        assert_eq!(config.ice_servers, vec![IceServer::stun("stun:example.org:3478")]);
        assert_eq!(config.calls_collection, "calls");
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        unsafe { std::env::set_var(ENV_RING_TIMEOUT_SECS, "10"); }
        unsafe { std::env::set_var(ENV_CALLS_COLLECTION, "test_calls"); }

        let config = CallConfig::new(ParticipantProfile::new("bob")).apply_env().unwrap();
        assert_eq!(config.ring_timeout_secs, 10);
        assert_eq!(config.calls_collection, "test_calls");

        unsafe { std::env::set_var(ENV_RING_TIMEOUT_SECS, "soon"); }
        assert!(CallConfig::default().apply_env().is_err());

        unsafe { std::env::remove_var(ENV_RING_TIMEOUT_SECS); }
        unsafe { std::env::remove_var(ENV_CALLS_COLLECTION); }
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        let err = CallConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, CallError::Config { .. }));
    }
}
