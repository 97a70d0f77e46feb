//! Virtual CAN channel provisioning
//!
//! Provides:
//! - The `NetworkProvisioner` capability (create/delete one channel)
//! - `ip link` based vcan provisioning for Linux hosts
//! - Set-level provision (fail fast) and deprovision (best effort)

pub mod vcan;

#[cfg(test)]
pub mod memory;

pub use vcan::IpLinkProvisioner;

use crate::error::Result;
use crate::naming::ChannelName;
use std::collections::BTreeSet;

/// Host facility able to create and delete virtual CAN channels
pub trait NetworkProvisioner {
    /// Create the channel and bring it up
    fn create(&self, channel: &ChannelName) -> Result<()>;

    /// Delete the channel
    fn delete(&self, channel: &ChannelName) -> Result<()>;
}

/// Create every channel in `channels`
///
/// Stops at the first failure. Each channel that was created is added to
/// `created` as soon as it exists, so the caller always knows exactly what
/// has to be torn down again. Nothing is rolled back here.
pub fn provision(
    provisioner: &dyn NetworkProvisioner,
    channels: &BTreeSet<ChannelName>,
    created: &mut BTreeSet<ChannelName>,
) -> Result<()> {
    for channel in channels {
        tracing::debug!("Creating CAN channel {}", channel);
        provisioner.create(channel)?;
        created.insert(channel.clone());
    }
    Ok(())
}

/// Delete every channel in `channels`, continuing past failures
///
/// Returns the channels whose deletion failed.
pub fn deprovision(
    provisioner: &dyn NetworkProvisioner,
    channels: &BTreeSet<ChannelName>,
) -> Vec<ChannelName> {
    let mut failed = Vec::new();
    for channel in channels {
        tracing::debug!("Deleting CAN channel {}", channel);
        if let Err(e) = provisioner.delete(channel) {
            tracing::warn!("Failed to delete CAN channel {}: {}", channel, e);
            failed.push(channel.clone());
        }
    }
    failed
}
