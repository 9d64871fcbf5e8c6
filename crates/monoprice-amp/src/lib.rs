//! Control of a Monoprice multi-zone amplifier over its serial port.
//!
//! [`Engine`] serializes command/response exchanges on the half-duplex line,
//! [`Amplifier`] discovers which zones are populated, and [`Zone`] offers
//! typed operations on one of them.
//!
//! ```rust,ignore
//! use monoprice_amp::{open_serial, AmpConfig, Amplifier};
//!
//! let port = open_serial("/dev/ttyUSB0", 9600)?;
//! let amp = Amplifier::connect(port, AmpConfig::default()).await?;
//! for zone in amp.zones() {
//!     let state = zone.state().await?;
//!     println!("{}: volume {}", zone.id(), state.volume);
//! }
//! amp.zones()[0].set_volume(20).await?;
//! ```

pub mod amplifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod transport;
pub mod zone;

pub use amplifier::{discover, Amplifier};
pub use config::AmpConfig;
pub use engine::{Engine, Reply, ReplyValue};
pub use error::{AmpError, AmpResult, StatusClass};
pub use transport::{
    open_serial, DynSerial, LineTransport, SerialPortIO, DEFAULT_BAUD_RATE, DEFAULT_PORT,
};
pub use zone::{collect_states, Zone, ZoneControl};

pub use monoprice_protocol as protocol;
