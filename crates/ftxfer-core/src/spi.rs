//! SPI transfer engine
//!
//! Drives [`SpiTransport`] one segment at a time so that chip-select is
//! asserted before the first byte and deasserted after the last byte of the
//! whole transfer, however many link requests it takes.
//!
//! A failed segment ends the transfer immediately. Nothing is retried and
//! chip-select is left in whatever state the failing call left it; callers
//! that need a clean bus must reinitialize the channel.

use crate::chunk::{self, ChunkPlan, MAX_SEGMENT_SIZE};
use crate::error::TransferError;
use crate::flags::SpiTransferOptions;
use crate::transport::SpiTransport;
use core::num::NonZeroUsize;

/// Stateless SPI engine
///
/// Holds only the segment size; the transport is borrowed per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiEngine {
    max_segment: NonZeroUsize,
}

impl Default for SpiEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SpiEngine {
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
    pub fn plan(&self, len: usize, options: SpiTransferOptions) -> ChunkPlan<SpiTransferOptions> {
        chunk::plan(len, self.max_segment, options)
    }

    /// Write `data`, returning the number of bytes written
    pub fn write<T: SpiTransport + ?Sized>(
        &self,
        transport: &mut T,
        data: &[u8],
        options: SpiTransferOptions,
    ) -> Result<usize, TransferError> {
        let plan = self.plan(data.len(), options);
        log::debug!(
            "SPI write: {} bytes in {} segment(s), {:?}",
            data.len(),
            plan.len(),
            options
        );

        chunk::execute(&plan, |seg| transport.write(&data[seg.range()], seg.flags))
            .inspect_err(|e| log::warn!("SPI write stopped: {}", e))
    }

    /// Fill `buf` from the bus, returning the number of bytes read
    ///
    /// On failure `buf[..err.transferred()]` holds the bytes that did arrive.
    pub fn read<T: SpiTransport + ?Sized>(
        &self,
        transport: &mut T,
        buf: &mut [u8],
        options: SpiTransferOptions,
    ) -> Result<usize, TransferError> {
        let plan = self.plan(buf.len(), options);
        log::debug!(
            "SPI read: {} bytes in {} segment(s), {:?}",
            buf.len(),
            plan.len(),
            options
        );

        chunk::execute(&plan, |seg| transport.read(&mut buf[seg.range()], seg.flags))
            .inspect_err(|e| log::warn!("SPI read stopped: {}", e))
    }

    /// Read `count` bytes into a new buffer
    ///
    /// Partial data is discarded on failure; use [`SpiEngine::read`] to keep it.
    pub fn read_vec<T: SpiTransport + ?Sized>(
        &self,
        transport: &mut T,
        count: usize,
        options: SpiTransferOptions,
    ) -> Result<Vec<u8>, TransferError> {
        let mut buf = vec![0u8; count];
        self.read(transport, &mut buf, options)?;
        Ok(buf)
    }

    /// Full-duplex transfer: one bit out and one bit in per clock
    ///
    /// `recv` must be exactly as long as `send`. Returns the number of bytes
    /// exchanged; on failure `recv[..err.transferred()]` is valid.
    pub fn swap<T: SpiTransport + ?Sized>(
        &self,
        transport: &mut T,
        send: &[u8],
        recv: &mut [u8],
        options: SpiTransferOptions,
    ) -> Result<usize, TransferError> {
        if send.len() != recv.len() {
            return Err(TransferError::LengthMismatch {
                send: send.len(),
                recv: recv.len(),
            });
        }

        let plan = self.plan(send.len(), options);
        log::debug!(
            "SPI swap: {} bytes in {} segment(s), {:?}",
            send.len(),
            plan.len(),
            options
        );

        chunk::execute(&plan, |seg| {
            transport.read_write(&mut recv[seg.range()], &send[seg.range()], seg.flags)
        })
        .inspect_err(|e| log::warn!("SPI swap stopped: {}", e))
    }
}

/// An SPI transport borrowed from an open channel
///
/// Obtained from [`Channel::spi`](crate::Channel::spi); the borrow keeps the
/// channel from being closed or reinitialized while a transfer is running.
pub struct SpiBus<'a, T: SpiTransport + ?Sized> {
    transport: &'a mut T,
    engine: SpiEngine,
}

impl<'a, T: SpiTransport + ?Sized> SpiBus<'a, T> {
    /// Wrap a transport with the given engine
    pub fn new(transport: &'a mut T, engine: SpiEngine) -> Self {
        Self { transport, engine }
    }

    /// See [`SpiEngine::write`]
    pub fn write(
        &mut self,
        data: &[u8],
        options: SpiTransferOptions,
    ) -> Result<usize, TransferError> {
        self.engine.write(&mut *self.transport, data, options)
    }

    /// See [`SpiEngine::read`]
    pub fn read(
        &mut self,
        buf: &mut [u8],
        options: SpiTransferOptions,
    ) -> Result<usize, TransferError> {
        self.engine.read(&mut *self.transport, buf, options)
    }

    /// See [`SpiEngine::read_vec`]
    pub fn read_vec(
        &mut self,
        count: usize,
        options: SpiTransferOptions,
    ) -> Result<Vec<u8>, TransferError> {
        self.engine.read_vec(&mut *self.transport, count, options)
    }

    /// See [`SpiEngine::swap`]
    pub fn swap(
        &mut self,
        send: &[u8],
        recv: &mut [u8],
        options: SpiTransferOptions,
    ) -> Result<usize, TransferError> {
        self.engine.swap(&mut *self.transport, send, recv, options)
    }
}
