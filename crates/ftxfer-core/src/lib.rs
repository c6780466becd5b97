//! ftxfer-core - Chunked SPI and I²C transfers over MPSSE bridges
//!
//! The MPSSE engine found in FTDI USB bridges encodes transfer lengths in a
//! 16-bit field, so a single request can move at most 65536 bytes. This
//! crate splits arbitrarily long buffers into link-sized segments while
//! keeping transaction framing intact:
//!
//! - SPI chip-select is asserted on the first segment and deasserted on the
//!   last one only.
//! - I²C start condition and slave addressing happen once, the stop
//!   condition is only generated after the final segment.
//!
//! The crate does not talk to hardware itself. Backends implement
//! [`SpiTransport`], [`I2cTransport`] and [`ChannelDriver`]; the
//! `ftxfer-mpsse` crate provides one for libftdi1.
//!
//! # Example
//!
//! ```ignore
//! use ftxfer_core::{Channel, SpiConfig, SpiTransferOptions};
//!
//! fn dump<D: ftxfer_core::ChannelDriver>(driver: D) -> Result<(), ftxfer_core::Error> {
//!     let mut channel = Channel::new(driver);
//!     channel.init_spi(&SpiConfig::default())?;
//!
//!     let mut buf = vec![0u8; 256 * 1024];
//!     channel.spi()?.read(&mut buf, SpiTransferOptions::FRAMED)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod channel;
pub mod chunk;
pub mod error;
pub mod flags;
pub mod i2c;
pub mod spi;
pub mod transport;

#[cfg(test)]
mod testing;

pub use channel::{
    Channel, ChannelDriver, ChannelState, ChipSelect, I2cClockRate, I2cConfig, Mode, PinState,
    SharedChannel, SpiConfig, SpiMode,
};
pub use chunk::{plan, ChunkPlan, Segment, MAX_SEGMENT_SIZE};
pub use error::{Error, Result, Status, TransferError, TransportError};
pub use flags::{Framing, I2cTransferOptions, SpiTransferOptions};
pub use i2c::{I2cBus, I2cEngine};
pub use spi::{SpiBus, SpiEngine};
pub use transport::{I2cTransport, SpiTransport, TransportResult};
