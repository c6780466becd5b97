//! I²C transfer engine
//!
//! Same segmentation as the SPI engine, with I²C framing: only the first
//! segment may generate a start condition, every later segment carries
//! [`I2cTransferOptions::NO_ADDRESS`] so the slave is not readdressed
//! mid-stream, and only the last segment generates the stop condition.
//!
//! The slave address is still handed to the transport on every call.

use crate::chunk::{self, ChunkPlan, MAX_SEGMENT_SIZE};
use crate::error::TransferError;
use crate::flags::I2cTransferOptions;
use crate::transport::I2cTransport;
use core::num::NonZeroUsize;

/// Highest 7-bit slave address
pub const MAX_ADDRESS: u8 = 0x7F;

fn check_address(address: u8) -> Result<(), TransferError> {
    if address > MAX_ADDRESS {
        return Err(TransferError::InvalidAddress(address));
    }
    Ok(())
}

/// Stateless I²C engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cEngine {
    max_segment: NonZeroUsize,
}

impl Default for I2cEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl I2cEngine {
    /// Engine using the full 64 KiB link segment size
    pub const fn new() -> Self {
        Self {
            max_segment: MAX_SEGMENT_SIZE,
        }
    }

    /// Engine with a smaller segment size (capped at 64 KiB)
    pub fn with_max_segment(max_segment: NonZeroUsize) -> Self {
        Self {
            max_segment: max_segment.min(MAX_SEGMENT_SIZE),
        }
    }

    /// Segment size used for planning
    pub fn max_segment(&self) -> NonZeroUsize {
        self.max_segment
    }

    /// Plan a transfer of `len` bytes without running it
    pub fn plan(&self, len: usize, options: I2cTransferOptions) -> ChunkPlan<I2cTransferOptions> {
        chunk::plan(len, self.max_segment, options)
    }

    /// Read `buf.len()` bytes from the slave at `address`
    ///
    /// On failure `buf[..err.transferred()]` holds the bytes that did arrive.
    pub fn read<T: I2cTransport + ?Sized>(
        &self,
        transport: &mut T,
        address: u8,
        buf: &mut [u8],
        options: I2cTransferOptions,
    ) -> Result<usize, TransferError> {
        check_address(address)?;

        let plan = self.plan(buf.len(), options);
        log::debug!(
            "I2C read from 0x{:02X}: {} bytes in {} segment(s), {:?}",
            address,
            buf.len(),
            plan.len(),
            options
        );

        chunk::execute(&plan, |seg| {
            transport.device_read(address, &mut buf[seg.range()], seg.flags)
        })
        .inspect_err(|e| log::warn!("I2C read from 0x{:02X} stopped: {}", address, e))
    }

    /// Read `count` bytes into a new buffer
    ///
    /// Partial data is discarded on failure; use [`I2cEngine::read`] to keep it.
    pub fn read_vec<T: I2cTransport + ?Sized>(
        &self,
        transport: &mut T,
        address: u8,
        count: usize,
        options: I2cTransferOptions,
    ) -> Result<Vec<u8>, TransferError> {
        let mut buf = vec![0u8; count];
        self.read(transport, address, &mut buf, options)?;
        Ok(buf)
    }

    /// Write `data` to the slave at `address`, returning the bytes written
    pub fn write<T: I2cTransport + ?Sized>(
        &self,
        transport: &mut T,
        address: u8,
        data: &[u8],
        options: I2cTransferOptions,
    ) -> Result<usize, TransferError> {
        check_address(address)?;

        let plan = self.plan(data.len(), options);
        log::debug!(
            "I2C write to 0x{:02X}: {} bytes in {} segment(s), {:?}",
            address,
            data.len(),
            plan.len(),
            options
        );

        chunk::execute(&plan, |seg| {
            transport.device_write(address, &data[seg.range()], seg.flags)
        })
        .inspect_err(|e| log::warn!("I2C write to 0x{:02X} stopped: {}", address, e))
    }
}

/// An I²C transport borrowed from an open channel
pub struct I2cBus<'a, T: I2cTransport + ?Sized> {
    transport: &'a mut T,
    engine: I2cEngine,
}

impl<'a, T: I2cTransport + ?Sized> I2cBus<'a, T> {
    /// Wrap a transport with the given engine
    pub fn new(transport: &'a mut T, engine: I2cEngine) -> Self {
        Self { transport, engine }
    }

    /// See [`I2cEngine::read`]
    pub fn read(
        &mut self,
        address: u8,
        buf: &mut [u8],
        options: I2cTransferOptions,
    ) -> Result<usize, TransferError> {
        self.engine.read(&mut *self.transport, address, buf, options)
    }

    /// See [`I2cEngine::read_vec`]
    pub fn read_vec(
        &mut self,
        address: u8,
        count: usize,
        options: I2cTransferOptions,
    ) -> Result<Vec<u8>, TransferError> {
        self.engine
            .read_vec(&mut *self.transport, address, count, options)
    }

    /// See [`I2cEngine::write`]
    pub fn write(
        &mut self,
        address: u8,
        data: &[u8],
        options: I2cTransferOptions,
    ) -> Result<usize, TransferError> {
        self.engine.write(&mut *self.transport, address, data, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Status;
    use crate::testing::{Call, Op, StubBus};

    type Opts = I2cTransferOptions;

    fn small(n: usize) -> I2cEngine {
        I2cEngine::with_max_segment(NonZeroUsize::new(n).unwrap())
    }

    fn i2c_calls(bus: &StubBus) -> Vec<(Op, u8, usize, Opts)> {
        bus.calls
            .iter()
            .map(|c| match *c {
                Call::I2c {
                    op,
                    address,
                    len,
                    options,
                } => (op, address, len, options),
                Call::Spi { .. } => panic!("unexpected SPI call"),
            })
            .collect()
    }

    #[test]
    fn test_write_70000_two_segments() {
        let data = vec![0x5Au8; 70000];
        let mut bus = StubBus::new();

        let n = I2cEngine::new()
            .write(&mut bus, 0x50, &data, Opts::FRAMED)
            .unwrap();

        assert_eq!(n, 70000);
        assert_eq!(
            i2c_calls(&bus),
            vec![
                (Op::Write, 0x50, 65536, Opts::START_BIT),
                (Op::Write, 0x50, 4464, Opts::STOP_BIT | Opts::NO_ADDRESS),
            ]
        );
    }

    #[test]
    fn test_read_suppresses_readdressing() {
        let mut bus = StubBus::new();
        let opts = Opts::FRAMED | Opts::NACK_LAST_BYTE;
        let data = small(4).read_vec(&mut bus, 0x3C, 10, opts).unwrap();

        let expected: Vec<u8> = (0..10).map(StubBus::pattern).collect();
        assert_eq!(data, expected);
        assert_eq!(
            i2c_calls(&bus),
            vec![
                (Op::Read, 0x3C, 4, Opts::START_BIT),
                (Op::Read, 0x3C, 4, Opts::NO_ADDRESS),
                (
                    Op::Read,
                    0x3C,
                    2,
                    Opts::STOP_BIT | Opts::NACK_LAST_BYTE | Opts::NO_ADDRESS
                ),
            ]
        );
    }

    #[test]
    fn test_single_segment_keeps_options() {
        let mut bus = StubBus::new();
        small(4)
            .write(&mut bus, 0x20, &[1, 2, 3, 4], Opts::FRAMED)
            .unwrap();
        assert_eq!(
            i2c_calls(&bus),
            vec![(Op::Write, 0x20, 4, Opts::FRAMED)]
        );
    }

    #[test]
    fn test_write_partial_failure() {
        let mut bus = StubBus::failing(2, 1, Status::FailedToWriteDevice);
        let err = small(4)
            .write(&mut bus, 0x50, &[0u8; 12], Opts::FRAMED)
            .unwrap_err();

        assert_eq!(
            err,
            TransferError::Failed {
                segment: 2,
                transferred: 9,
                status: Status::FailedToWriteDevice,
            }
        );
        assert_eq!(bus.calls.len(), 3);
    }

    #[test]
    fn test_read_partial_failure_keeps_data() {
        let mut bus = StubBus::failing(1, 2, Status::IoError);
        let mut buf = [0u8; 8];
        let err = small(4)
            .read(&mut bus, 0x50, &mut buf, Opts::FRAMED)
            .unwrap_err();

        assert_eq!(err.transferred(), 6);
        let expected: Vec<u8> = (0..6).map(StubBus::pattern).collect();
        assert_eq!(&buf[..6], &expected[..]);
    }

    #[test]
    fn test_invalid_address_rejected() {
        let mut bus = StubBus::new();
        let err = I2cEngine::new()
            .write(&mut bus, 0x80, &[1], Opts::FRAMED)
            .unwrap_err();
        assert_eq!(err, TransferError::InvalidAddress(0x80));
        assert!(bus.calls.is_empty());
    }

    #[test]
    fn test_empty_read_addresses_slave() {
        let mut bus = StubBus::new();
        let n = I2cEngine::new()
            .read(&mut bus, 0x68, &mut [], Opts::FRAMED)
            .unwrap();
        assert_eq!(n, 0);
        assert_eq!(i2c_calls(&bus), vec![(Op::Read, 0x68, 0, Opts::FRAMED)]);
    }
}
