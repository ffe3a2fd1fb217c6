//! # rotator-link
//!
//! Link layer for a two-station antenna rotator split over a half-duplex
//! RS-485 pair: the **Antenna** node (role [`Master`]) owns motors and
//! sensors, the **Shack** node (role [`Remote`]) owns the user interface.
//!
//! | Module | Purpose |
//! | ------ | ------- |
//! | [`protocol`] | Frame layout, command space, CRC16, legacy 8-byte packets |
//! | [`state`] | `RotatorState` / `GpsData` records exchanged on the wire |
//! | [`transport`] | Half-duplex send and bounded receive over a UART + DE pin |
//! | [`master`] | Antenna-side engine: answers requests, broadcasts state |
//! | [`remote`] | Shack-side engine: commands with retry, cached state |
//! | [`config`] | Link parameters shared by both stations |
//! | [`console`] | Operator command lines for the shack console |
//!
//! Everything here is `no_std` and executor-agnostic; timing goes through
//! `embassy-time`, the bus through `embedded-io-async` and `embedded-hal`.
//! Enable the `defmt` feature to get link logging on target.

#![cfg_attr(not(test), no_std)]

// must come first so the macros are visible in the other modules
mod fmt;

pub mod config;
pub mod console;
pub mod master;
pub mod protocol;
pub mod remote;
pub mod state;
pub mod transport;

#[cfg(test)]
mod mock;

pub use config::{ConfigError, LinkConfig};
pub use console::OperatorCommand;
pub use master::{Master, MasterState, RotatorInputs};
pub use protocol::{Address, Command, CommandClass, ErrorCode, Frame, FrameError};
pub use remote::{Remote, RemoteState, Reply};
pub use state::{GpsData, RotatorState, StatusFlags};
pub use transport::{LinkError, LinkStats, Transport};
