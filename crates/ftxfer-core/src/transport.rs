//! Transport traits
//!
//! A transport moves exactly one segment per call and blocks until the
//! driver returns. Implementations must honour the options they are given
//! verbatim; all splitting and framing decisions have already been made by
//! the chunk planner.
//!
//! On failure a transport must still report how many bytes of the segment
//! were transferred, so the engines can compute exact partial counts.

use crate::error::TransportError;
use crate::flags::{I2cTransferOptions, SpiTransferOptions};

/// Result of one transport call: bytes transferred, or the failure
pub type TransportResult = core::result::Result<usize, TransportError>;

/// SPI master transport (one segment per call, at most 65536 bytes)
pub trait SpiTransport {
    /// Clock in `buf.len()` bytes
    fn read(&mut self, buf: &mut [u8], options: SpiTransferOptions) -> TransportResult;

    /// Clock out `data`
    fn write(&mut self, data: &[u8], options: SpiTransferOptions) -> TransportResult;

    /// Clock out `send` while clocking in the same number of bytes into `recv`
    ///
    /// Callers guarantee `recv.len() == send.len()`.
    fn read_write(
        &mut self,
        recv: &mut [u8],
        send: &[u8],
        options: SpiTransferOptions,
    ) -> TransportResult;
}

/// I²C master transport (one segment per call, at most 65536 bytes)
///
/// The 7-bit address is passed on every call. Whether it reaches the wire
/// is decided by [`I2cTransferOptions::NO_ADDRESS`].
pub trait I2cTransport {
    /// Read `buf.len()` bytes from the slave at `address`
    fn device_read(
        &mut self,
        address: u8,
        buf: &mut [u8],
        options: I2cTransferOptions,
    ) -> TransportResult;

    /// Write `data` to the slave at `address`
    fn device_write(
        &mut self,
        address: u8,
        data: &[u8],
        options: I2cTransferOptions,
    ) -> TransportResult;
}

impl<T: SpiTransport + ?Sized> SpiTransport for &mut T {
    fn read(&mut self, buf: &mut [u8], options: SpiTransferOptions) -> TransportResult {
        (**self).read(buf, options)
    }

    fn write(&mut self, data: &[u8], options: SpiTransferOptions) -> TransportResult {
        (**self).write(data, options)
    }

    fn read_write(
        &mut self,
        recv: &mut [u8],
        send: &[u8],
        options: SpiTransferOptions,
    ) -> TransportResult {
        (**self).read_write(recv, send, options)
    }
}

// Boxed transports, so backends can be selected at runtime
impl<T: SpiTransport + ?Sized> SpiTransport for Box<T> {
    fn read(&mut self, buf: &mut [u8], options: SpiTransferOptions) -> TransportResult {
        (**self).read(buf, options)
    }

    fn write(&mut self, data: &[u8], options: SpiTransferOptions) -> TransportResult {
        (**self).write(data, options)
    }

    fn read_write(
        &mut self,
        recv: &mut [u8],
        send: &[u8],
        options: SpiTransferOptions,
    ) -> TransportResult {
        (**self).read_write(recv, send, options)
    }
}

impl<T: I2cTransport + ?Sized> I2cTransport for &mut T {
    fn device_read(
        &mut self,
        address: u8,
        buf: &mut [u8],
        options: I2cTransferOptions,
    ) -> TransportResult {
        (**self).device_read(address, buf, options)
    }

    fn device_write(
        &mut self,
        address: u8,
        data: &[u8],
        options: I2cTransferOptions,
    ) -> TransportResult {
        (**self).device_write(address, data, options)
    }
}

impl<T: I2cTransport + ?Sized> I2cTransport for Box<T> {
    fn device_read(
        &mut self,
        address: u8,
        buf: &mut [u8],
        options: I2cTransferOptions,
    ) -> TransportResult {
        (**self).device_read(address, buf, options)
    }

    fn device_write(
        &mut self,
        address: u8,
        data: &[u8],
        options: I2cTransferOptions,
    ) -> TransportResult {
        (**self).device_write(address, data, options)
    }
}
