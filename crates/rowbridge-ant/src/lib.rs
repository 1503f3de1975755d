//! ANT+ profiles for the rowing peripheral bridge
//!
//! Broadcasts the rower as ANT+ fitness equipment and receives ANT+ heart-rate straps, both
//! through one shared stick.
//!
//! ## Architecture
//!
//! - [`messages`] - ANT serial framing and the channel configuration messages
//! - [`manager`] - Stick manager shared by every ANT+ role
//! - [`pages`] - FE-C data page layouts
//! - [`fe`] - FE-C rower with the page scheduler and accumulators
//! - [`hrm`] - Heart-rate strap receiver

mod error;
pub mod fe;
pub mod hrm;
pub mod manager;
pub mod messages;
pub mod pages;
mod profile;

// Public API exports
pub use error::AntError;
pub use fe::AntFePeripheral;
pub use hrm::AntHeartRateMonitor;
pub use manager::{AntPlusManager, ChannelConfig};
pub use messages::{AntMessage, AntPage};
pub use profile::AntFitnessProfile;
