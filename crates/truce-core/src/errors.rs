//! Error types for the truce protocol
//!
//! Per-concern error enums unified under [`TruceError`]. Nothing here is
//! user-fatal: codec failures drop the offending message, transport failures
//! feed the reconnect path, and relay-reported errors are surfaced to logs.

use thiserror::Error;

// ----------------------------------------------------------------------------
// Codec Errors
// ----------------------------------------------------------------------------

/// Wire encoding/decoding failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("failed to encode message: {0}")]
    Encode(String),
    #[error("failed to decode message: {0}")]
    Decode(String),
}

// ----------------------------------------------------------------------------
// Identity Errors
// ----------------------------------------------------------------------------

/// Failures while resolving or persisting the local peer identity
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity file I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("identity file at {path} is malformed: {reason}")]
    Malformed { path: String, reason: String },
    #[error("no usable identity storage location")]
    NoStorageLocation,
}

// ----------------------------------------------------------------------------
// Configuration Errors
// ----------------------------------------------------------------------------

/// Invalid or unreadable relay configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid relay URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("unsupported relay URL scheme {scheme} (expected ws or wss)")]
    UnsupportedScheme { scheme: String },
    #[error("config file I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("config file at {path} is malformed: {reason}")]
    Malformed { path: String, reason: String },
}

// ----------------------------------------------------------------------------
// Unified Error Type
// ----------------------------------------------------------------------------

/// Core error type for the truce protocol
#[derive(Debug, Error)]
pub enum TruceError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Relay-reported application error; logged, never a state change
    #[error("relay error: {message}")]
    Server { message: String },
}

impl TruceError {
    /// Create a relay-reported error with a message
    pub fn server<T: Into<String>>(message: T) -> Self {
        TruceError::Server {
            message: message.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, TruceError>;
