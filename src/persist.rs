//! Mapping and config persistence
//!
//! The CAN mapping and the rewritten agent config are the hand-off points to
//! other processes (the telemetry agent, the playback script), so both are
//! written whole and atomically: readers see either the previous document or
//! the new one, never a torn write.

use crate::error::{Error, Result};
use crate::naming::ChannelName;
use crate::rewrite::{ChannelMapping, VehicleConfig};
use serde::Serialize;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Write the logical -> channel mapping
pub fn write_mapping(path: &Path, mapping: &ChannelMapping) -> Result<()> {
    write_json(path, mapping)?;
    tracing::info!("Saved CAN mapping ({} channels) at {}", mapping.len(), path.display());
    Ok(())
}

/// Write a rewritten vehicle config
pub fn write_config(path: &Path, config: &VehicleConfig) -> Result<()> {
    write_json(path, config.document())?;
    tracing::info!("Saved rewritten config at {}", path.display());
    Ok(())
}

/// Load a vehicle config document
pub fn read_vehicle_config(path: &Path) -> Result<VehicleConfig> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(Error::VehicleConfigNotFound(path.to_path_buf()));
        }
        Err(e) => {
            return Err(Error::MalformedConfig {
                location: path.display().to_string(),
                message: e.to_string(),
            });
        }
    };

    let document = serde_json::from_str(&content).map_err(|e| Error::MalformedConfig {
        location: path.display().to_string(),
        message: e.to_string(),
    })?;

    Ok(VehicleConfig::new(document))
}

/// Load a previously persisted mapping
pub fn read_mapping(path: &Path) -> Result<ChannelMapping> {
    let content = fs::read_to_string(path).map_err(|e| Error::MappingRead {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    serde_json::from_str(&content).map_err(|e| Error::MappingRead {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Remove a mapping whose channels are going away
///
/// A mapping that is already gone counts as removed.
pub fn remove_mapping(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::info!("Removed CAN mapping at {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Persistence {
            path: path.to_path_buf(),
            message: format!("Failed to remove mapping: {}", e),
        }),
    }
}

/// Look up the channel backing a logical interface
pub fn resolve<'a>(mapping: &'a ChannelMapping, logical: &str) -> Result<&'a ChannelName> {
    mapping
        .get(logical)
        .ok_or_else(|| Error::UnknownLogicalInterface(logical.to_string()))
}

/// Serialize `value` and atomically replace `path` with it
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let persistence = |message: String| Error::Persistence {
        path: path.to_path_buf(),
        message,
    };

    let mut content = serde_json::to_string_pretty(value).map_err(|e| persistence(e.to_string()))?;
    content.push('\n');

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .map_err(|e| persistence(format!("Failed to create {}: {}", parent.display(), e)))?;

    let mut temp = NamedTempFile::new_in(parent)
        .map_err(|e| persistence(format!("Failed to create temp file: {}", e)))?;
    temp.write_all(content.as_bytes())
        .map_err(|e| persistence(format!("Failed to write temp file: {}", e)))?;
    temp.persist(path)
        .map_err(|e| persistence(format!("Failed to replace file: {}", e.error)))?;

    Ok(())
}
