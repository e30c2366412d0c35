//! Error types for the session engine

use thiserror::Error;
use truce_core::errors::{ConfigError, IdentityError};

/// Failures surfaced by [`crate::PeerServiceBuilder::build`].
///
/// Nothing after a successful build is fatal: transport failures feed the
/// reconnect path and malformed messages are dropped.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),
}
