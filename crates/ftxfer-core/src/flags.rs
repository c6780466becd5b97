//! Transfer option sets
//!
//! Options are bit sets rather than raw integers so the chunk planner can
//! reason about them by class. The bit values follow the libMPSSE encoding,
//! which keeps debug output comparable with vendor traces.

use bitflags::{bitflags, Flags};
use core::fmt::Debug;

bitflags! {
    /// Per-call SPI transfer options
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SpiTransferOptions: u32 {
        /// Assert chip-select before the first clock
        const CHIP_SELECT_ENABLE  = 1 << 1;
        /// Deassert chip-select after the last clock
        const CHIP_SELECT_DISABLE = 1 << 2;

        /// Shorthand for a self-contained transaction (assert and deassert)
        const FRAMED = Self::CHIP_SELECT_ENABLE.bits() | Self::CHIP_SELECT_DISABLE.bits();
    }
}

bitflags! {
    /// Per-call I²C transfer options
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct I2cTransferOptions: u32 {
        /// Generate a start condition before addressing the slave
        const START_BIT      = 1 << 0;
        /// Generate a stop condition after the last byte
        const STOP_BIT       = 1 << 1;
        /// Abort a write as soon as the slave NACKs a byte
        const BREAK_ON_NACK  = 1 << 2;
        /// NACK the final byte of a read
        const NACK_LAST_BYTE = 1 << 3;
        /// Batch all bytes into one USB round trip per segment
        const FAST_TRANSFER  = 1 << 4;
        /// Do not send the address byte (continue an open transaction)
        const NO_ADDRESS     = 1 << 6;

        /// Shorthand for a self-contained transaction (start and stop)
        const FRAMED = Self::START_BIT.bits() | Self::STOP_BIT.bits();
    }
}

/// Classification of transfer options by where they belong in a transaction
///
/// A logical transfer split into several segments must only apply
/// `LEADING` options to its first segment and `TRAILING` options to its
/// last. `CONTINUATION` options are added to every segment after the first.
pub trait Framing: Flags + Copy + Eq + Debug {
    /// Options meaningful only at the very first byte
    const LEADING: Self;
    /// Options meaningful only at the very last byte
    const TRAILING: Self;
    /// Options that mark a segment as continuing an open transaction
    const CONTINUATION: Self;
}

impl Framing for SpiTransferOptions {
    const LEADING: Self = Self::CHIP_SELECT_ENABLE;
    const TRAILING: Self = Self::CHIP_SELECT_DISABLE;
    const CONTINUATION: Self = Self::empty();
}

impl Framing for I2cTransferOptions {
    const LEADING: Self = Self::START_BIT;
    const TRAILING: Self =
        Self::from_bits_retain(Self::STOP_BIT.bits() | Self::NACK_LAST_BYTE.bits());
    const CONTINUATION: Self = Self::NO_ADDRESS;
}
