//! Setup/retry orchestration for one vehicle

use super::state::{self, DynamicSetupMachine, SetupMachineEvent, SetupState};
use crate::error::{Error, Result};
use crate::manifest::SetupPaths;
use crate::naming::{ChannelName, ChannelNamer};
use crate::network::{self, NetworkProvisioner};
use crate::persist;
use crate::rewrite::{self, ChannelMapping};
use rand::{Rng, rng};
use std::collections::BTreeSet;

/// Outcome of a successful setup
#[derive(Debug, Clone)]
pub struct SetupReport {
    /// Nonce the live channel names were derived with ("" on first try)
    pub nonce: String,
    /// Persisted logical -> channel mapping
    pub mapping: ChannelMapping,
    /// Channels now live on the host
    pub channels: BTreeSet<ChannelName>,
}

/// Provisions and tears down the CAN channels of one vehicle
///
/// One instance per vehicle id at a time; nothing here guards against two
/// instances racing on the same vehicle.
pub struct CanSetup {
    vehicle_id: String,
    paths: SetupPaths,
    namer: ChannelNamer,
    provisioner: Box<dyn NetworkProvisioner>,
    machine: DynamicSetupMachine<()>,
    /// Channels created by this instance; the only ones cleanup touches
    provisioned: BTreeSet<ChannelName>,
    /// Mapping file holds names from the current attempt
    mapping_written: bool,
}

impl CanSetup {
    pub fn new(
        vehicle_id: impl Into<String>,
        paths: SetupPaths,
        namer: ChannelNamer,
        provisioner: Box<dyn NetworkProvisioner>,
    ) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            paths,
            namer,
            provisioner,
            machine: state::new_machine(),
            provisioned: BTreeSet::new(),
            mapping_written: false,
        }
    }

    /// Get current state as enum
    pub fn state(&self) -> SetupState {
        SetupState::from_str(self.machine.current_state())
    }

    /// Channels created by this instance and not yet cleaned up
    pub fn provisioned(&self) -> &BTreeSet<ChannelName> {
        &self.provisioned
    }

    /// Run the full setup, retrying once with a random nonce
    ///
    /// A missing or malformed config, an unknown interface type or an empty
    /// interface name fail immediately. Provisioning and persistence
    /// failures tear down what was created and try again with new names;
    /// a second failure is final. After a final failure the channels of
    /// the retry are still tracked for `cleanup`.
    pub fn setup(&mut self) -> Result<SetupReport> {
        self.machine.handle(SetupMachineEvent::Load)?;
        tracing::info!("Setting up CAN channels for vehicle {}", self.vehicle_id);

        let err = match self.attempt("") {
            Ok(report) => return self.succeed(report),
            Err(e) if !e.is_retryable() => return self.abort(e),
            Err(e) => e,
        };

        tracing::warn!("CAN setup failed ({}), retrying with a new nonce", err);
        self.release();
        self.machine.handle(SetupMachineEvent::Retry)?;

        let nonce = fresh_nonce();
        match self.attempt(&nonce) {
            Ok(report) => self.succeed(report),
            Err(e) => self.abort(e),
        }
    }

    /// Delete every channel this instance created
    ///
    /// Failures are logged and skipped so one stuck channel can't keep the
    /// rest alive. Returns the channels that could not be deleted. Calling
    /// this with nothing provisioned is a no-op.
    pub fn cleanup(&mut self) -> Vec<ChannelName> {
        if self.provisioned.is_empty() {
            tracing::debug!("No CAN channels to clean up");
            return Vec::new();
        }

        let failed = self.release();
        if failed.is_empty() {
            tracing::info!("Finished deleting all CAN channels");
        } else {
            tracing::warn!("{} CAN channel(s) could not be deleted", failed.len());
        }
        failed
    }

    /// One pass of Reading -> Provisioning
    fn attempt(&mut self, nonce: &str) -> Result<SetupReport> {
        self.provisioned.clear();

        // Reading
        let config = match persist::read_vehicle_config(&self.paths.source_config) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(
                    "No usable config for vehicle {} at {}",
                    self.vehicle_id,
                    self.paths.source_config.display()
                );
                return Err(e);
            }
        };
        self.machine.handle(SetupMachineEvent::Provision)?;

        // Provisioning
        let rewritten = rewrite::rewrite(&config, &self.namer, &self.vehicle_id, nonce)?;
        network::provision(
            self.provisioner.as_ref(),
            &rewritten.channels,
            &mut self.provisioned,
        )?;
        persist::write_mapping(&self.paths.mapping_file, &rewritten.mapping)?;
        self.mapping_written = true;
        persist::write_config(&self.paths.agent_config, &rewritten.config)?;

        Ok(SetupReport {
            nonce: nonce.to_string(),
            mapping: rewritten.mapping,
            channels: rewritten.channels,
        })
    }

    fn succeed(&mut self, report: SetupReport) -> Result<SetupReport> {
        self.machine.handle(SetupMachineEvent::Complete)?;
        tracing::info!(
            "Provisioned {} CAN channel(s) for vehicle {}",
            report.channels.len(),
            self.vehicle_id
        );
        Ok(report)
    }

    fn abort(&mut self, err: Error) -> Result<SetupReport> {
        self.machine.handle(SetupMachineEvent::Fail)?;
        tracing::error!("CAN setup failed for vehicle {}: {}", self.vehicle_id, err);

        // The mapping names channels cleanup is about to delete
        if self.mapping_written {
            if let Err(e) = persist::remove_mapping(&self.paths.mapping_file) {
                tracing::warn!("{}", e);
            }
            self.mapping_written = false;
        }
        Err(err)
    }

    /// Deprovision and forget the tracked channels
    fn release(&mut self) -> Vec<ChannelName> {
        let failed = network::deprovision(self.provisioner.as_ref(), &self.provisioned);
        self.provisioned.clear();
        failed
    }
}

/// Random nonce for the retry pass
fn fresh_nonce() -> String {
    rng().random::<u64>().to_string()
}
