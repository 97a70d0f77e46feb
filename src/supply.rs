//! Simulation package download
//!
//! Packages are synced from object storage with the storage provider's CLI
//! into `<sim_root>/<vehicle_id>`.

use crate::error::{Error, Result};
use crate::manifest::StorageSettings;
use std::path::Path;
use std::process::Command;

/// Build the sync command for one vehicle's package
fn sync_command(cli: &str, bucket: &str, key: &str, dest: &Path) -> Command {
    let mut cmd = Command::new(cli);
    cmd.args(["s3", "sync"])
        .arg(format!("s3://{}/{}", bucket, key))
        .arg(dest);
    cmd
}

/// Download the simulation package for a vehicle
///
/// Does nothing when no bucket/key is configured (package already baked
/// into the container).
pub fn sync_package(storage: &StorageSettings, vehicle_id: &str, sim_root: &Path) -> Result<()> {
    let Some((bucket, key)) = storage.location() else {
        tracing::info!("No package location configured, skipping download");
        return Ok(());
    };

    let dest = sim_root.join(vehicle_id);
    tracing::info!("Downloading s3://{}/{} to {}", bucket, key, dest.display());

    let output = sync_command(&storage.cli, bucket, key, &dest)
        .output()
        .map_err(|e| {
            Error::DownloadFailed(format!(
                "Failed to run '{}' for vehicle {}: {}",
                storage.cli, vehicle_id, e
            ))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::DownloadFailed(format!(
            "Package sync for vehicle {} exited with {}: {}",
            vehicle_id,
            output.status,
            stderr.trim()
        )));
    }

    Ok(())
}
