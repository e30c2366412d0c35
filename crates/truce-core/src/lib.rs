//! Truce Core Protocol Implementation
//!
//! This crate provides the wire message taxonomy, domain types, peer identity
//! resolution, and configuration for the truce peer notification service. A
//! small set of peer machines exchanges ephemeral request/response
//! notifications (surrender requests, coffee requests, votes, alerts) through
//! a single relay server; this crate defines everything both ends of that
//! conversation agree on, with no async runtime dependency.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod errors;
pub mod identity;
pub mod message;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::{RelayConfig, TrustList};
pub use errors::{CodecError, ConfigError, IdentityError, Result, TruceError};
pub use identity::{IdentityStore, PeerIdentity};
pub use message::{ClientMessage, ServerMessage};
pub use types::{AlertKind, ConnectionState, Peer, PeerId, RequestId, RequestKind, Vote};
