//! Truce relay session engine
//!
//! This crate maintains the durable logical connection to the relay: it
//! registers the local identity, tracks the live peer roster, decodes inbound
//! messages, dispatches application events to registered handlers, and
//! recovers transparently from transport failures with exponential backoff.
//!
//! All mutable session state (connection state, roster, timers) is owned by a
//! single tokio task; the [`PeerService`] handle communicates with it through
//! channels, so no two state mutations ever race. Observation of connection
//! state and roster happens through `watch` subscriptions.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

mod connection;
mod session;

pub mod error;
pub mod handlers;
pub mod service;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use error::ServiceError;
pub use handlers::{AlertPayload, RequestPayload, VotePayload};
pub use service::{PeerService, PeerServiceBuilder};

// Re-export the protocol surface callers need alongside the service.
pub use truce_core::{
    AlertKind, ConnectionState, IdentityStore, Peer, PeerId, PeerIdentity, RelayConfig, RequestId,
    RequestKind, TrustList, Vote,
};
