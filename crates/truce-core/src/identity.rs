//! Local peer identity resolution and persistence
//!
//! Every installation gets exactly one stable [`PeerId`]. On first use we
//! prefer the platform machine id, fall back to a random UUID, and persist
//! whichever was chosen so later runs return the same value. The display name
//! is resolved from the host name on every call and deliberately never
//! persisted, so renaming the machine renames the peer.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::IdentityError;
use crate::types::PeerId;

// ----------------------------------------------------------------------------
// Peer Identity
// ----------------------------------------------------------------------------

/// The local installation's identity as presented to the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIdentity {
    pub peer_id: PeerId,
    pub display_name: String,
}

/// On-disk identity record. Holds only the peer id; the display name is
/// re-resolved from the host name at every call site.
#[derive(Debug, Serialize, Deserialize)]
struct IdentityFile {
    peer_id: String,
}

// ----------------------------------------------------------------------------
// Identity Store
// ----------------------------------------------------------------------------

/// Loads the persistent peer id, creating and persisting one if absent
#[derive(Debug, Clone)]
pub struct IdentityStore {
    path: PathBuf,
}

impl IdentityStore {
    /// Create a store backed by the given identity file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a store at the default per-user location
    /// (`<config_dir>/truce/identity.toml`)
    pub fn default_location() -> Result<Self, IdentityError> {
        let base = dirs::config_dir().ok_or(IdentityError::NoStorageLocation)?;
        Ok(Self::new(base.join("truce").join("identity.toml")))
    }

    /// Path of the backing identity file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve the local identity, assigning and persisting a peer id on
    /// first use. The id never changes once assigned.
    pub fn load_or_create(&self) -> Result<PeerIdentity, IdentityError> {
        let peer_id = match self.load_persisted()? {
            Some(id) => id,
            None => {
                let id = machine_id().unwrap_or_else(|| {
                    debug!("no platform machine id available, generating random peer id");
                    Uuid::new_v4().to_string()
                });
                self.persist(&id)?;
                info!(peer_id = %id, path = %self.path.display(), "assigned new peer id");
                id
            }
        };

        Ok(PeerIdentity {
            peer_id: PeerId::new(peer_id),
            display_name: host_display_name(),
        })
    }

    fn load_persisted(&self) -> Result<Option<String>, IdentityError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(IdentityError::Io {
                    path: self.path.display().to_string(),
                    source: e,
                })
            }
        };

        let file: IdentityFile =
            toml::from_str(&text).map_err(|e| IdentityError::Malformed {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })?;

        if file.peer_id.trim().is_empty() {
            return Err(IdentityError::Malformed {
                path: self.path.display().to_string(),
                reason: "empty peer_id".to_string(),
            });
        }

        Ok(Some(file.peer_id))
    }

    fn persist(&self, peer_id: &str) -> Result<(), IdentityError> {
        let io_err = |e| IdentityError::Io {
            path: self.path.display().to_string(),
            source: e,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let file = IdentityFile {
            peer_id: peer_id.to_string(),
        };
        // IdentityFile is a flat struct of strings; serialization cannot fail
        let text = toml::to_string_pretty(&file).unwrap_or_default();
        fs::write(&self.path, text).map_err(io_err)
    }
}

// ----------------------------------------------------------------------------
// Platform Lookups
// ----------------------------------------------------------------------------

/// Stable hardware/installation identifier, if the platform exposes one
fn machine_id() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        let id = fs::read_to_string("/etc/machine-id").ok()?;
        let id = id.trim();
        if id.is_empty() {
            return None;
        }
        return Some(id.to_string());
    }

    #[allow(unreachable_code)]
    None
}

/// Human-readable machine name, resolved fresh on every call
fn host_display_name() -> String {
    hostname::get()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown-host".to_string())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
