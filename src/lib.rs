//! # soundbox
//!
//! Firmware for a button-triggered audio clip player: five pre-recorded
//! 8 kHz / 8-bit clips in an external SPI EEPROM, played through a PWM
//! speaker driver with a breathing LED, loaded once over an XMODEM serial
//! bootstrap.
//!
//! ## Architecture
//!
//! Everything flows through the [`Player`] engine; the other modules are
//! services it calls:
//! - [`eeprom`]: SPI EEPROM command driver (chip-select bracketed)
//! - [`xmodem`]: one-shot bootstrap that programs the clip data
//! - [`led`]: triangle-wave brightness ramp, dithered by the sample loop
//! - [`hal`]: capability traits for the timers and the wake button
//! - [`sim`]: simulated peripheral set for host tests and the simulator
//!
//! Hardware access goes only through the peripheral set owned by a
//! [`Board`]; there is no global register state, so the whole firmware
//! path runs unmodified against the simulated board.

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod eeprom;
pub mod fault;
pub mod hal;
pub mod led;
pub mod player;
pub mod serial;
pub mod sim;
pub mod track;
pub mod xmodem;

pub use config::TRACKS;
pub use eeprom::{Eeprom, EepromError, EepromReader};
pub use fault::{FaultCode, FaultState};
pub use hal::{PwmCarrier, SampleTimer, WakeButton};
pub use led::LedRamp;
pub use player::{Board, Player, PlayerError, PlayerState};
pub use track::Track;
pub use xmodem::{Bootstrap, BootstrapError};
