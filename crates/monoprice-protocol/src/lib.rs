//! Monoprice multi-zone amplifier serial protocol
//!
//! This crate provides the wire-level pieces for talking to a Monoprice
//! 6-zone home audio amplifier (and up to two chained expansion units) over
//! its RS-232 port. It has no I/O of its own; the transaction engine in
//! `monoprice-amp` drives it.
//!
//! # Protocol Overview
//!
//! The protocol is a half-duplex ASCII line interface:
//!
//! - **Commands** (host → amplifier): text terminated with `\r`
//! - **Echo**: the amplifier repeats every command it receives on its own line
//! - **Data**: queries are then answered with a line starting with `>`
//! - **Errors**: rejected commands are answered with `Command Error.`
//! - **Framing**: lines end with `\n` and may carry a `#` prompt character
//!
//! ```text
//! host      ?11\r
//! amplifier ?11\r\n#>1100010000131112100401\r\r\n#
//! ```
//!
//! # Example
//!
//! ```rust
//! use monoprice_protocol::{Argument, Command, Request, State, ZoneId};
//!
//! let zone = ZoneId::new(11).unwrap();
//! let req = Request::set(zone, Command::Volume, Argument::Level(20)).unwrap();
//! assert_eq!(req.to_command_string(), "<11VO20");
//!
//! let state: State = "1100010000131112100401".parse().unwrap();
//! assert_eq!(state.volume, 13);
//! ```

mod codec;
mod commands;
mod error;
mod responses;
mod state;
mod types;

pub use codec::*;
pub use commands::*;
pub use error::*;
pub use responses::*;
pub use state::*;
pub use types::*;
