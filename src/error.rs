//! Unified error types for candock

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for candock operations
#[derive(Error, Debug)]
pub enum Error {
    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Settings errors
    #[error("Failed to read settings file '{path}': {source}")]
    SettingsRead { path: PathBuf, source: io::Error },

    #[error("Failed to parse settings: {0}")]
    SettingsParse(#[from] toml::de::Error),

    #[error("Settings validation failed: {0}")]
    SettingsValidation(String),

    // Naming errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Vehicle config errors
    #[error("No vehicle config found at {0}")]
    VehicleConfigNotFound(PathBuf),

    #[error("Malformed vehicle config at {location}: {message}")]
    MalformedConfig { location: String, message: String },

    #[error("Unknown network interface type '{kind}' for interface '{interface_id}'")]
    UnrecognizedInterfaceType { interface_id: String, kind: String },

    // Network errors
    #[error("Failed to provision CAN channel '{channel}': {message}")]
    Provisioning { channel: String, message: String },

    // Persistence errors
    #[error("Failed to persist {path}: {message}")]
    Persistence { path: PathBuf, message: String },

    #[error("Failed to read CAN mapping at {path}: {message}")]
    MappingRead { path: PathBuf, message: String },

    #[error("No CAN channel mapped for logical interface '{0}'")]
    UnknownLogicalInterface(String),

    // Orchestration errors
    #[error("Setup state transition rejected: {0}")]
    SetupState(String),

    // Launch errors
    #[error("Failed to download simulation package: {0}")]
    DownloadFailed(String),

    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },
}

impl Error {
    /// Whether a fresh channel-name nonce could make the operation succeed
    ///
    /// Only host-side failures qualify. Defects in the input data fail the
    /// same way whatever names are derived.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Provisioning { .. } | Error::Persistence { .. })
    }
}

impl From<state_machines::DynamicError> for Error {
    fn from(e: state_machines::DynamicError) -> Self {
        Error::SetupState(format!("{:?}", e))
    }
}

/// Result type alias for candock operations
pub type Result<T> = std::result::Result<T, Error>;
