//! rowbridge CLI library
//!
//! Process wiring for the peripheral bridge: argument parsing, TOML configuration,
//! logging transports and replay of recorded metrics.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod replay;
pub mod transports;

pub use app::BridgeApp;
pub use cli::{Cli, Commands};
pub use config::{AppConfig, RadioConfig};
pub use error::{CliError, Result};
pub use transports::{LoggingAntStick, LoggingMqttClient};
