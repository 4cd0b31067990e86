//! Operator CLI for the rehalink connectivity core.
//!
//! Drives the same registry API the application layers use: discover a
//! device, check availability, trigger calibration, apply stimulation
//! parameters, or hold a session open and watch its lifecycle events.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use rehalink::{Command, DeviceClass, DeviceRegistry, LinkConfig, LinkEvent};

#[derive(Parser)]
#[command(name = "rehalink", about = "LAN discovery and control for rehab peripherals")]
struct Cli {
    /// Path to a configuration file (defaults to ./rehalink.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Discover a device and report its endpoint.
    Discover {
        /// Device class: plank or stimulator.
        class: DeviceClass,
    },
    /// Probe the cached address for liveness without connecting.
    Available {
        /// Device class: plank or stimulator.
        class: DeviceClass,
    },
    /// Trigger the plank's calibration routine.
    Calibrate,
    /// Apply stimulation parameters (out-of-range values are clamped).
    Stim {
        /// Stimulation pattern, 1-8.
        #[arg(long)]
        mode: i32,
        /// Stimulation intensity, 0-19.
        #[arg(long)]
        power: i32,
    },
    /// Connect and stay attached, printing session events until the
    /// connection drops or ctrl-c.
    Watch {
        /// Device class: plank or stimulator.
        class: DeviceClass,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => LinkConfig::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => LinkConfig::load().context("loading configuration")?,
    };
    config.validate().map_err(|e| anyhow!(e))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log.level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut registry = DeviceRegistry::new(config)?;

    match cli.command {
        Cmd::Discover { class } => {
            let endpoint = registry.connect(class).await?;
            println!("{class} at {endpoint}");
            registry.disconnect(class);
        }
        Cmd::Available { class } => {
            let available = registry.is_available(class).await;
            println!("{class}: {}", if available { "available" } else { "unreachable" });
        }
        Cmd::Calibrate => {
            registry.connect(DeviceClass::Plank).await?;
            registry.send(DeviceClass::Plank, Command::Calibrate).await?;
            println!("calibration sent");
            registry.disconnect(DeviceClass::Plank);
        }
        Cmd::Stim { mode, power } => {
            registry.connect(DeviceClass::Stimulator).await?;
            registry
                .send(
                    DeviceClass::Stimulator,
                    Command::SetStimulation { mode, power },
                )
                .await?;
            println!("stimulation acknowledged");
            registry.disconnect(DeviceClass::Stimulator);
        }
        Cmd::Watch { class } => {
            let mut events = registry.events();
            let endpoint = registry.connect(class).await?;
            info!(%class, %endpoint, "watching; ctrl-c to stop");
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Ok(LinkEvent::Connected { class, endpoint }) => {
                            println!("connected: {class} at {endpoint}");
                        }
                        Ok(LinkEvent::Disconnected { class, reason }) => {
                            println!("disconnected: {class} ({reason})");
                            break;
                        }
                        Err(_) => break,
                    },
                    _ = tokio::signal::ctrl_c() => {
                        registry.disconnect(class);
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}
