//! CLI argument definitions.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "scenectl")]
#[command(about = "Scripted observation and interaction driver for a mobile UI application")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace). Default is warn.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a scene file against a device.
    Run {
        /// Path to a scene YAML file.
        #[arg(long)]
        scene: PathBuf,

        /// Target device id (auto-selected if exactly one is connected).
        #[arg(long)]
        device: Option<String>,

        /// Directory observation bundles are written under.
        #[arg(long, default_value = "observations")]
        out: PathBuf,

        /// UI-framework project directory (must contain pubspec.yaml).
        #[arg(long)]
        project: PathBuf,

        /// Application id reported by the daemon.
        #[arg(long, default_value = "app")]
        app_id: String,

        /// Connect the VM Inspection Client after the session becomes ready,
        /// enabling the Framework Camera and label/text-based taps.
        #[arg(long)]
        connect_vm: bool,

        /// Seconds to wait for the session to become ready.
        #[arg(long, default_value_t = 60)]
        ready_timeout_secs: u64,
    },

    /// List devices ADB currently sees, with their readiness state.
    Devices,
}
