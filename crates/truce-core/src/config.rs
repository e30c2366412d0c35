//! Relay connection configuration
//!
//! Timing knobs default to the values the relay deployment expects (10s
//! connect timeout, 20s heartbeat, 30s backoff cap) and are expressed in
//! whole seconds in the on-disk form.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::ConfigError;
use crate::types::PeerId;

// ----------------------------------------------------------------------------
// Trust List
// ----------------------------------------------------------------------------

/// Explicit allow-list of peer identifiers.
///
/// An empty list allows everyone. A non-empty list restricts which peers may
/// deliver application events (requests, votes, alerts) to this installation;
/// roster and control messages are unaffected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrustList(HashSet<PeerId>);

impl TrustList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn insert(&mut self, peer_id: PeerId) -> bool {
        self.0.insert(peer_id)
    }

    pub fn remove(&mut self, peer_id: &PeerId) -> bool {
        self.0.remove(peer_id)
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.0.contains(peer_id)
    }

    /// Whether events from this peer should be delivered
    pub fn allows(&self, peer_id: &PeerId) -> bool {
        self.0.is_empty() || self.0.contains(peer_id)
    }
}

impl FromIterator<PeerId> for TrustList {
    fn from_iter<I: IntoIterator<Item = PeerId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ----------------------------------------------------------------------------
// Relay Configuration
// ----------------------------------------------------------------------------

/// Configuration for the relay session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Relay endpoint, ws:// or wss://
    pub url: String,

    /// Bound on transport connection establishment, in seconds
    pub connect_timeout_secs: u64,

    /// Keep-alive ping interval while connected, in seconds
    pub ping_interval_secs: u64,

    /// Cap on the exponential reconnect backoff, in seconds
    pub max_reconnect_delay_secs: u64,

    /// Peers allowed to deliver application events (empty = everyone)
    pub trust: TrustList,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080".to_string(),
            connect_timeout_secs: 10,
            ping_interval_secs: 20,
            max_reconnect_delay_secs: 30,
            trust: TrustList::new(),
        }
    }
}

impl RelayConfig {
    /// Create a config for the given relay endpoint with default timings
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn max_reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.max_reconnect_delay_secs)
    }

    /// Validate the relay endpoint
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.url).map_err(|e| ConfigError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;
        match url.scheme() {
            "ws" | "wss" => Ok(()),
            other => Err(ConfigError::UnsupportedScheme {
                scheme: other.to_string(),
            }),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = toml::from_str(&text).map_err(|e| ConfigError::Malformed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timings() {
        let config = RelayConfig::default();
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.ping_interval(), Duration::from_secs(20));
        assert_eq!(config.max_reconnect_delay(), Duration::from_secs(30));
    }

    #[test]
    fn test_url_validation() {
        assert!(RelayConfig::new("ws://relay.local:8080").validate().is_ok());
        assert!(RelayConfig::new("wss://relay.example.com").validate().is_ok());
        assert!(matches!(
            RelayConfig::new("http://relay.example.com").validate(),
            Err(ConfigError::UnsupportedScheme { .. })
        ));
        assert!(matches!(
            RelayConfig::new("not a url").validate(),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_empty_trust_list_allows_everyone() {
        let trust = TrustList::new();
        assert!(trust.allows(&PeerId::new("anyone")));
    }

    #[test]
    fn test_non_empty_trust_list_restricts() {
        let trust: TrustList = [PeerId::new("friend")].into_iter().collect();
        assert!(trust.allows(&PeerId::new("friend")));
        assert!(!trust.allows(&PeerId::new("stranger")));
    }

    #[test]
    fn test_config_toml_round_trip() {
        let mut config = RelayConfig::new("wss://relay.example.com");
        config.ping_interval_secs = 5;
        config.trust.insert(PeerId::new("friend"));

        let text = toml::to_string(&config).unwrap();
        let parsed: RelayConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: RelayConfig = toml::from_str("url = \"ws://elsewhere:9000\"").unwrap();
        assert_eq!(parsed.url, "ws://elsewhere:9000");
        assert_eq!(parsed.ping_interval_secs, 20);
        assert!(parsed.trust.is_empty());
    }
}
