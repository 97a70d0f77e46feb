//! candock - per-vehicle virtual CAN launcher
//!
//! Provisions hash-named vcan channels for a simulated vehicle, rewrites the
//! telemetry agent config to use them, and drives the container's
//! simulation lifecycle.

mod cli;
mod error;
mod launch;
mod manifest;
mod naming;
mod network;
mod persist;
mod rewrite;
mod setup;
mod supply;

use cli::{Cli, Commands};
use error::{Error, Result};
use manifest::Settings;
use naming::ChannelNamer;
use serde_json::json;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    let cli = Cli::parse_args();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Initialize logging: RUST_LOG wins, otherwise info (debug with --verbose)
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn run(cli: Cli) -> Result<i32> {
    if let Commands::Completion { shell } = cli.command {
        Cli::generate_completion(shell);
        return Ok(0);
    }

    let (settings_path, required) = cli.settings_path();
    let settings = manifest::load(&settings_path, required)?;
    let vehicle_id = cli.vehicle_id.as_deref();

    match cli.command {
        Commands::Launch { skip_download } => {
            let vehicle_id = require_vehicle(vehicle_id)?;
            let opts = launch::LaunchOptions { skip_download };
            let status = launch::launch(&settings, vehicle_id, &opts)?;
            Ok(status.code().unwrap_or(1))
        }

        Commands::Setup => {
            let vehicle_id = require_vehicle(vehicle_id)?;
            let mut can = launch::can_setup(&settings, vehicle_id);
            let report = match can.setup() {
                Ok(report) => report,
                Err(e) => {
                    can.cleanup();
                    return Err(e);
                }
            };
            tracing::info!(
                "{} CAN channel(s) left up for vehicle {} (nonce {:?})",
                can.provisioned().len(),
                vehicle_id,
                report.nonce
            );
            println!("{}", serde_json::to_string_pretty(&report.mapping)?);
            Ok(0)
        }

        Commands::Derive { logical, nonce } => {
            let vehicle_id = require_vehicle(vehicle_id)?;
            let namer = ChannelNamer::new(settings.naming.hash_len);
            println!("{}", namer.derive(vehicle_id, &logical, &nonce)?);
            Ok(0)
        }

        Commands::Rewrite { nonce } => {
            let vehicle_id = require_vehicle(vehicle_id)?;
            let paths = settings.setup_paths(vehicle_id);
            let config = persist::read_vehicle_config(&paths.source_config)?;
            let namer = ChannelNamer::new(settings.naming.hash_len);
            let rewritten = rewrite::rewrite(&config, &namer, vehicle_id, &nonce)?;

            let out = json!({
                "mapping": rewritten.mapping,
                "config": rewritten.config.document(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(0)
        }

        Commands::Resolve { logical } => {
            let mapping = persist::read_mapping(&settings.mapping_path())?;
            println!("{}", persist::resolve(&mapping, &logical)?);
            Ok(0)
        }

        Commands::Check => {
            check(&settings, vehicle_id)?;
            Ok(0)
        }

        Commands::Completion { .. } => Ok(0),
    }
}

/// Validate settings and, when a vehicle is given, its config
fn check(settings: &Settings, vehicle_id: Option<&str>) -> Result<()> {
    let namer = ChannelNamer::new(settings.naming.hash_len);
    println!("Settings OK");
    println!("  sim root:     {}", settings.paths.sim_root.display());
    println!("  mapping file: {}", settings.mapping_path().display());
    println!("  hash length:  {}", namer.hash_len());

    let Some(vehicle_id) = vehicle_id else {
        println!("No vehicle id given, skipping vehicle config check");
        return Ok(());
    };

    let paths = settings.setup_paths(vehicle_id);
    let config = persist::read_vehicle_config(&paths.source_config)?;
    let rewritten = rewrite::rewrite(&config, &namer, vehicle_id, "")?;

    println!(
        "Vehicle config OK: {} ({} CAN/OBD interface(s))",
        paths.source_config.display(),
        rewritten.mapping.len()
    );
    for (logical, channel) in &rewritten.mapping {
        println!("  {} -> {}", logical, channel);
    }
    Ok(())
}

fn require_vehicle(vehicle_id: Option<&str>) -> Result<&str> {
    vehicle_id
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            Error::InvalidArgument("vehicle id required (--vehicle-id or VEHICLE_ID)".into())
        })
}
