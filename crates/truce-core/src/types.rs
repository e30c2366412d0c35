//! Core types for the truce protocol
//!
//! This module defines the fundamental types used throughout the protocol,
//! using newtype patterns for semantic validation and type safety.

use core::fmt;
use core::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Peer Identifier
// ----------------------------------------------------------------------------

/// Stable, opaque identifier for a peer installation.
///
/// Assigned once per installation and never changed afterwards; see
/// [`crate::identity::IdentityStore`] for how the value is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Create a PeerId from an existing identifier string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

// ----------------------------------------------------------------------------
// Request Correlation Token
// ----------------------------------------------------------------------------

/// Opaque correlation token threading a request to its eventual reply.
///
/// Generated fresh for every outbound request/alert and echoed back verbatim
/// by recipients. The core never validates or deduplicates these tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Wrap an existing token
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random token
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the token as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

// ----------------------------------------------------------------------------
// Peer
// ----------------------------------------------------------------------------

/// A roster entry as reported by the relay.
///
/// Equality and hashing consider only `peer_id`; the display name may change
/// across sessions without the peer becoming a different peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
    pub peer_id: PeerId,
    pub peer_name: String,
}

impl Peer {
    pub fn new(peer_id: impl Into<PeerId>, peer_name: impl Into<String>) -> Self {
        Self {
            peer_id: peer_id.into(),
            peer_name: peer_name.into(),
        }
    }
}

impl PartialEq for Peer {
    fn eq(&self, other: &Self) -> bool {
        self.peer_id == other.peer_id
    }
}

impl Eq for Peer {}

impl core::hash::Hash for Peer {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.peer_id.hash(state);
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.peer_name, self.peer_id)
    }
}

// ----------------------------------------------------------------------------
// Message Kind Discriminants
// ----------------------------------------------------------------------------

/// The two request/vote exchanges peers can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Surrender,
    Coffee,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Surrender => f.write_str("surrender"),
            RequestKind::Coffee => f.write_str("coffee"),
        }
    }
}

/// One-shot alerts with no reply exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    Fatigue,
    GoodBoy,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::Fatigue => f.write_str("fatigue"),
            AlertKind::GoodBoy => f.write_str("good boy"),
        }
    }
}

/// A yes/no response to a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    Yes,
    No,
}

impl Vote {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vote::Yes => "yes",
            Vote::No => "no",
        }
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ----------------------------------------------------------------------------
// Connection State
// ----------------------------------------------------------------------------

/// Lifecycle state of the logical relay connection.
///
/// Lives only for the process runtime; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected { registered: bool },
    Reconnecting { attempt: u32, next_delay: Duration },
}

impl ConnectionState {
    /// Whether the transport connection is up (registered or not)
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected { .. })
    }

    /// Whether we are connected and the relay has acknowledged our identity
    pub fn is_registered(&self) -> bool {
        matches!(self, ConnectionState::Connected { registered: true })
    }

    /// Human-readable state name for logging
    pub fn state_name(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected { .. } => "Connected",
            ConnectionState::Reconnecting { .. } => "Reconnecting",
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::Disconnected
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_equality_by_id_only() {
        let a = Peer::new("abc", "Workstation");
        let b = Peer::new("abc", "Renamed Workstation");
        let c = Peer::new("def", "Workstation");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_request_id_generation_is_unique() {
        let a = RequestId::generate();
        let b = RequestId::generate();
        assert_ne!(a, b);
        assert!(!a.as_str().is_empty());
    }

    #[test]
    fn test_vote_wire_form() {
        assert_eq!(serde_json::to_string(&Vote::Yes).unwrap(), "\"yes\"");
        assert_eq!(serde_json::to_string(&Vote::No).unwrap(), "\"no\"");
        let parsed: Vote = serde_json::from_str("\"no\"").unwrap();
        assert_eq!(parsed, Vote::No);
    }

    #[test]
    fn test_connection_state_predicates() {
        assert!(!ConnectionState::Disconnected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
        assert!(ConnectionState::Connected { registered: false }.is_connected());
        assert!(!ConnectionState::Connected { registered: false }.is_registered());
        assert!(ConnectionState::Connected { registered: true }.is_registered());

        let reconnecting = ConnectionState::Reconnecting {
            attempt: 3,
            next_delay: Duration::from_secs(8),
        };
        assert!(!reconnecting.is_connected());
        assert_eq!(reconnecting.state_name(), "Reconnecting");
    }
}
