//! CAN channel name derivation
//!
//! Virtual CAN interfaces get short hash-derived names so that several
//! vehicles (or several logical buses of one vehicle) can share a host
//! without their interface names colliding. Names are a pure function of
//! vehicle id, logical interface name and nonce.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Default number of hex characters in a derived channel name
pub const DEFAULT_HASH_LEN: usize = 8;

/// Longest interface name the Linux kernel accepts (IFNAMSIZ - 1)
pub const MAX_HASH_LEN: usize = 15;

/// A derived virtual CAN channel name (e.g., "3f9a1c0b")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelName(String);

impl ChannelName {
    /// Get the interface name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Derives channel names of a fixed length
#[derive(Debug, Clone, Copy)]
pub struct ChannelNamer {
    len: usize,
}

impl Default for ChannelNamer {
    fn default() -> Self {
        Self {
            len: DEFAULT_HASH_LEN,
        }
    }
}

impl ChannelNamer {
    /// Create a namer producing `len` hex characters, clamped to 1..=15
    pub fn new(len: usize) -> Self {
        Self {
            len: len.clamp(1, MAX_HASH_LEN),
        }
    }

    /// Length of the names this namer produces
    pub fn hash_len(&self) -> usize {
        self.len
    }

    /// Derive the channel name for a logical interface of a vehicle
    ///
    /// The digest input is `vehicle_id + logical + nonce`. An empty nonce
    /// gives the stable name reused across restarts; any other nonce moves
    /// the name to a different point in the hash space.
    pub fn derive(&self, vehicle_id: &str, logical: &str, nonce: &str) -> Result<ChannelName> {
        if logical.is_empty() {
            return Err(Error::InvalidArgument(
                "logical interface name must not be empty".to_string(),
            ));
        }

        let mut hasher = Sha256::new();
        hasher.update(vehicle_id.as_bytes());
        hasher.update(logical.as_bytes());
        hasher.update(nonce.as_bytes());
        let digest = hex::encode(hasher.finalize());

        Ok(ChannelName(digest[..self.len].to_string()))
    }
}
