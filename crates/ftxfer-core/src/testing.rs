//! In-memory bus used by the unit tests
//!
//! Records every transport call and can be told to fail (or come up short)
//! on a given call index after a given number of bytes.

use crate::error::{Status, TransportError};
use crate::flags::{I2cTransferOptions, SpiTransferOptions};
use crate::transport::{I2cTransport, SpiTransport, TransportResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    Read,
    Write,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Call {
    Spi {
        op: Op,
        len: usize,
        options: SpiTransferOptions,
    },
    I2c {
        op: Op,
        address: u8,
        len: usize,
        options: I2cTransferOptions,
    },
}

#[derive(Debug, Default)]
pub(crate) struct StubBus {
    pub calls: Vec<Call>,
    /// Every byte that reached the "wire", in order
    pub wire: Vec<u8>,
    /// Fail call `.0` after `.1` bytes with status `.2`
    pub fail_at: Option<(usize, usize, Status)>,
    /// Report only `.1` bytes for call `.0`, without failing
    pub short_at: Option<(usize, usize)>,
    /// Position of the next byte produced by a read
    read_pos: usize,
}

impl StubBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(call: usize, after: usize, status: Status) -> Self {
        Self {
            fail_at: Some((call, after, status)),
            ..Self::default()
        }
    }

    pub fn short(call: usize, after: usize) -> Self {
        Self {
            short_at: Some((call, after)),
            ..Self::default()
        }
    }

    /// Byte the stub returns for absolute read position `pos`
    pub fn pattern(pos: usize) -> u8 {
        (pos % 251) as u8
    }

    /// How many bytes call `index` of length `len` gets to move, and whether it fails
    fn allowance(&self, index: usize, len: usize) -> (usize, Option<Status>) {
        match (self.fail_at, self.short_at) {
            (Some((call, after, status)), _) if call == index => (after.min(len), Some(status)),
            (_, Some((call, after))) if call == index => (after.min(len), None),
            _ => (len, None),
        }
    }

    fn finish(&mut self, moved: usize, failure: Option<Status>) -> TransportResult {
        match failure {
            Some(status) => Err(TransportError::new(status, moved)),
            None => Ok(moved),
        }
    }

    fn fill(&mut self, buf: &mut [u8]) {
        for b in buf.iter_mut() {
            *b = Self::pattern(self.read_pos);
            self.read_pos += 1;
        }
    }

    fn do_read(&mut self, buf: &mut [u8]) -> TransportResult {
        let index = self.calls.len() - 1;
        let (moved, failure) = self.allowance(index, buf.len());
        self.fill(&mut buf[..moved]);
        self.finish(moved, failure)
    }

    fn do_write(&mut self, data: &[u8]) -> TransportResult {
        let index = self.calls.len() - 1;
        let (moved, failure) = self.allowance(index, data.len());
        self.wire.extend_from_slice(&data[..moved]);
        self.finish(moved, failure)
    }
}

impl SpiTransport for StubBus {
    fn read(&mut self, buf: &mut [u8], options: SpiTransferOptions) -> TransportResult {
        self.calls.push(Call::Spi {
            op: Op::Read,
            len: buf.len(),
            options,
        });
        self.do_read(buf)
    }

    fn write(&mut self, data: &[u8], options: SpiTransferOptions) -> TransportResult {
        self.calls.push(Call::Spi {
            op: Op::Write,
            len: data.len(),
            options,
        });
        self.do_write(data)
    }

    fn read_write(
        &mut self,
        recv: &mut [u8],
        send: &[u8],
        options: SpiTransferOptions,
    ) -> TransportResult {
        self.calls.push(Call::Spi {
            op: Op::ReadWrite,
            len: send.len(),
            options,
        });
        let index = self.calls.len() - 1;
        let (moved, failure) = self.allowance(index, send.len());
        // Loopback with inverted bits
        for (r, s) in recv[..moved].iter_mut().zip(&send[..moved]) {
            *r = !*s;
        }
        self.wire.extend_from_slice(&send[..moved]);
        self.finish(moved, failure)
    }
}

impl I2cTransport for StubBus {
    fn device_read(
        &mut self,
        address: u8,
        buf: &mut [u8],
        options: I2cTransferOptions,
    ) -> TransportResult {
        self.calls.push(Call::I2c {
            op: Op::Read,
            address,
            len: buf.len(),
            options,
        });
        self.do_read(buf)
    }

    fn device_write(
        &mut self,
        address: u8,
        data: &[u8],
        options: I2cTransferOptions,
    ) -> TransportResult {
        self.calls.push(Call::I2c {
            op: Op::Write,
            address,
            len: data.len(),
            options,
        });
        self.do_write(data)
    }
}
