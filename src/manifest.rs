//! Settings file parsing for candock
//!
//! Parses `candock.toml` using serde. Every field has a default matching the
//! layout of the simulation container, so the file is optional.

use crate::error::{Error, Result};
use crate::naming::{DEFAULT_HASH_LEN, MAX_HASH_LEN};
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable carrying the package bucket
pub const ENV_S3_BUCKET: &str = "S3_BUCKET";
/// Environment variable carrying the package key prefix
pub const ENV_S3_KEY: &str = "S3_KEY";

/// Load settings from a file
///
/// A missing file yields the defaults unless `required` is set (the path
/// was given explicitly on the command line).
pub fn load(path: &Path, required: bool) -> Result<Settings> {
    let mut settings: Settings = match fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content)?,
        Err(e) if e.kind() == ErrorKind::NotFound && !required => {
            tracing::debug!("No settings at {}, using defaults", path.display());
            Settings::default()
        }
        Err(e) => {
            return Err(Error::SettingsRead {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    settings.apply_env(|key| std::env::var(key).ok());
    settings.validate()?;

    Ok(settings)
}

/// Root settings structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: PathSettings,
    pub naming: NamingSettings,
    pub network: NetworkSettings,
    pub agent: AgentSettings,
    pub playback: PlaybackSettings,
    pub storage: StorageSettings,
}

impl Settings {
    /// Override storage location from the environment
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(bucket) = lookup(ENV_S3_BUCKET).filter(|s| !s.is_empty()) {
            self.storage.bucket = Some(bucket);
        }
        if let Some(key) = lookup(ENV_S3_KEY).filter(|s| !s.is_empty()) {
            self.storage.key = Some(key);
        }
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_HASH_LEN).contains(&self.naming.hash_len) {
            return Err(Error::SettingsValidation(format!(
                "naming.hash_len must be between 1 and {} (got {})",
                MAX_HASH_LEN, self.naming.hash_len
            )));
        }

        for (field, value) in [
            ("paths.source_config", &self.paths.source_config),
            ("paths.agent_config", &self.paths.agent_config),
            ("paths.mapping_file", &self.paths.mapping_file),
        ] {
            if value.as_os_str().is_empty() {
                return Err(Error::SettingsValidation(format!("{} must not be empty", field)));
            }
        }

        if self.paths.source_config == self.paths.agent_config {
            return Err(Error::SettingsValidation(
                "paths.agent_config must differ from paths.source_config".into(),
            ));
        }

        if self.playback.poll_interval_ms == 0 {
            return Err(Error::SettingsValidation(
                "playback.poll_interval_ms must be greater than zero".into(),
            ));
        }

        Ok(())
    }

    /// CAN mapping location shared by every process in the container
    pub fn mapping_path(&self) -> PathBuf {
        self.paths.sim_root.join(&self.paths.mapping_file)
    }

    /// Resolve the file locations used for one vehicle
    pub fn setup_paths(&self, vehicle_id: &str) -> SetupPaths {
        let vehicle_dir = self.paths.sim_root.join(vehicle_id);
        SetupPaths {
            source_config: vehicle_dir.join(&self.paths.source_config),
            agent_config: vehicle_dir.join(&self.paths.agent_config),
            mapping_file: self.mapping_path(),
            vehicle_dir,
        }
    }
}

/// Where the simulation package lives inside the container
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Root of downloaded simulation packages
    pub sim_root: PathBuf,
    /// Vehicle config as shipped in the package (relative to the vehicle dir)
    pub source_config: PathBuf,
    /// Rewritten config handed to the agent (relative to the vehicle dir)
    pub agent_config: PathBuf,
    /// CAN mapping file (relative to sim_root); one per container
    pub mapping_file: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            sim_root: PathBuf::from("/etc/aws-iot-fleetwise"),
            source_config: PathBuf::from("config.json"),
            agent_config: PathBuf::from("agent-config.json"),
            mapping_file: PathBuf::from("can_mapping.json"),
        }
    }
}

/// Channel naming parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NamingSettings {
    /// Hex characters per derived channel name
    pub hash_len: usize,
}

impl Default for NamingSettings {
    fn default() -> Self {
        Self {
            hash_len: DEFAULT_HASH_LEN,
        }
    }
}

/// How vcan channels are created on the host
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// iproute2 binary
    pub ip_binary: String,
    /// Run `ip link` through sudo
    pub use_sudo: bool,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            ip_binary: "ip".into(),
            use_sudo: true,
        }
    }
}

/// Telemetry agent process
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Agent binary, invoked with the rewritten config path
    pub binary: PathBuf,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("/usr/bin/aws-iot-fleetwise-edge"),
        }
    }
}

/// Signal playback script
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    pub interpreter: String,
    /// Script path relative to the vehicle dir
    pub script: PathBuf,
    /// How often the launcher checks whether playback has ended
    pub poll_interval_ms: u64,
}

impl PlaybackSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            interpreter: "python3".into(),
            script: PathBuf::from("sim/kfarm_sim.py"),
            poll_interval_ms: 500,
        }
    }
}

/// Object storage holding the simulation packages
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Object storage CLI
    pub cli: String,
    pub bucket: Option<String>,
    pub key: Option<String>,
}

impl StorageSettings {
    /// Bucket and key, when both are known
    pub fn location(&self) -> Option<(&str, &str)> {
        match (&self.bucket, &self.key) {
            (Some(bucket), Some(key)) => Some((bucket.as_str(), key.as_str())),
            _ => None,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            cli: "aws".into(),
            bucket: None,
            key: None,
        }
    }
}

/// Resolved file locations for one vehicle's setup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupPaths {
    /// `<sim_root>/<vehicle_id>`
    pub vehicle_dir: PathBuf,
    /// Config as downloaded
    pub source_config: PathBuf,
    /// Config after channel rewriting
    pub agent_config: PathBuf,
    /// Logical -> channel mapping
    pub mapping_file: PathBuf,
}

#[cfg(test)]
impl SetupPaths {
    /// Lay out all artifacts under one directory
    pub fn under(root: &Path, vehicle_id: &str) -> Self {
        let settings = Settings {
            paths: PathSettings {
                sim_root: root.to_path_buf(),
                ..PathSettings::default()
            },
            ..Settings::default()
        };
        settings.setup_paths(vehicle_id)
    }
}
