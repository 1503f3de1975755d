//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rowbridge_core::{AntMode, BleMode, HrmMode};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path (defaults to the user config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// BLE profile: FTMS, FTMSBIKE, PM5, CSC, CPS or OFF
    #[arg(long, global = true)]
    pub ble_mode: Option<BleMode>,

    /// ANT+ profile: FE or OFF
    #[arg(long, global = true)]
    pub ant_mode: Option<AntMode>,

    /// Heart-rate source: ANT, BLE or OFF
    #[arg(long, global = true)]
    pub hrm_mode: Option<HrmMode>,

    /// Run without a Bluetooth adapter
    #[arg(long, global = true)]
    pub no_ble: bool,

    /// Run without an ANT+ stick
    #[arg(long, global = true)]
    pub no_ant: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the peripherals and feed them metrics
    Run {
        /// JSON-lines file of metrics snapshots to replay
        #[arg(short, long)]
        replay: Option<PathBuf>,
        /// Replay without waiting between snapshots
        #[arg(long)]
        fast: bool,
        /// Workout plan delivered as if received over MQTT
        #[arg(short, long)]
        workout_plan: Option<PathBuf>,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_flags_parse() {
        let cli = Cli::parse_from([
            "rowbridge",
            "--ble-mode",
            "pm5",
            "--hrm-mode",
            "ANT",
            "run",
            "--fast",
        ]);
        assert_eq!(cli.ble_mode, Some(BleMode::Pm5));
        assert_eq!(cli.hrm_mode, Some(HrmMode::Ant));
        assert_eq!(cli.ant_mode, None);
        assert!(matches!(cli.command, Commands::Run { fast: true, .. }));
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let parsed = Cli::try_parse_from(["rowbridge", "--ant-mode", "bike", "config"]);
        assert!(parsed.is_err());
    }
}
