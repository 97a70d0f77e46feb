//! Container launch sequence
//!
//! Runs one vehicle simulation end to end:
//! - Download the simulation package
//! - Provision the vehicle's CAN channels
//! - Start the telemetry agent on the rewritten config
//! - Run the playback script until it exits
//! - Tear everything down again

use crate::error::{Error, Result};
use crate::manifest::{SetupPaths, Settings};
use crate::naming::ChannelNamer;
use crate::network::IpLinkProvisioner;
use crate::setup::CanSetup;
use crate::supply;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use std::fs;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, ExitStatus};
use std::thread;

/// Environment variable telling the playback script where the mapping lives
pub const ENV_MAPPING_FILE: &str = "CANDOCK_MAPPING_FILE";

/// Launch options from the command line
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    /// Use the package already present under the sim root
    pub skip_download: bool,
}

/// Build the CAN setup for a vehicle from settings
pub fn can_setup(settings: &Settings, vehicle_id: &str) -> CanSetup {
    let provisioner =
        IpLinkProvisioner::new(settings.network.ip_binary.clone(), settings.network.use_sudo);
    CanSetup::new(
        vehicle_id,
        settings.setup_paths(vehicle_id),
        ChannelNamer::new(settings.naming.hash_len),
        Box::new(provisioner),
    )
}

/// Run the full simulation for one vehicle, returning the playback exit status
pub fn launch(settings: &Settings, vehicle_id: &str, opts: &LaunchOptions) -> Result<ExitStatus> {
    let paths = settings.setup_paths(vehicle_id);
    fs::create_dir_all(&settings.paths.sim_root)?;

    if opts.skip_download {
        tracing::info!("Skipping package download");
    } else {
        supply::sync_package(&settings.storage, vehicle_id, &settings.paths.sim_root)?;
    }

    let mut can = can_setup(settings, vehicle_id);
    if let Err(e) = can.setup() {
        can.cleanup();
        return Err(e);
    }
    tracing::info!("Setup completed for vehicle {}", vehicle_id);

    let result = run_simulation(settings, &paths);
    can.cleanup();
    result
}

/// Start the agent and the playback, wait for playback to end
fn run_simulation(settings: &Settings, paths: &SetupPaths) -> Result<ExitStatus> {
    let mut agent = spawn_agent(&settings.agent.binary, &paths.agent_config)?;

    let status = spawn_playback(settings, paths).and_then(|mut playback| {
        let poll = settings.playback.poll_interval();
        loop {
            if let Some(status) = playback.try_wait()? {
                break Ok(status);
            }
            thread::sleep(poll);
        }
    });

    match &status {
        Ok(s) => tracing::info!("Simulation has ended ({})", s),
        Err(e) => tracing::error!("Simulation failed: {}", e),
    }

    stop_agent(&mut agent);
    status
}

/// Start the telemetry agent in its own process group
fn spawn_agent(binary: &Path, config: &Path) -> Result<Child> {
    tracing::info!("Starting telemetry agent {}", binary.display());
    Command::new(binary)
        .arg(config)
        .process_group(0)
        .spawn()
        .map_err(|e| Error::CommandFailed {
            command: format!("{} {}", binary.display(), config.display()),
            message: e.to_string(),
        })
}

/// Start the playback script with the mapping location exported
fn spawn_playback(settings: &Settings, paths: &SetupPaths) -> Result<Child> {
    let script = paths.vehicle_dir.join(&settings.playback.script);
    tracing::info!("Starting simulation {}", script.display());

    Command::new(&settings.playback.interpreter)
        .arg(&script)
        .current_dir(&paths.vehicle_dir)
        .env(ENV_MAPPING_FILE, &paths.mapping_file)
        .spawn()
        .map_err(|e| Error::CommandFailed {
            command: format!("{} {}", settings.playback.interpreter, script.display()),
            message: e.to_string(),
        })
}

/// Hang up and terminate the agent's process group, then reap it
fn stop_agent(agent: &mut Child) {
    let group = Pid::from_raw(agent.id() as i32);
    for signal in [Signal::SIGHUP, Signal::SIGTERM] {
        if let Err(e) = killpg(group, signal) {
            tracing::debug!("Signalling agent group {} with {:?}: {}", group, signal, e);
        }
    }
    if let Err(e) = agent.wait() {
        tracing::warn!("Failed to reap telemetry agent: {}", e);
    }
}
