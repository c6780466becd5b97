//! MPSSE channel driver and handle
//!
//! [`MpsseDriver`] opens the bridge through libftdi1 and hands out
//! [`MpsseHandle`]s. A handle turns each transport call into one MPSSE
//! command stream; SPI segments go out in a single USB write, I²C segments
//! go out byte by byte unless [`I2cTransferOptions::FAST_TRANSFER`] asks for
//! one batched write.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use ftdi::{find_by_vid_pid, BitMode, Device};
use ftxfer_core::{
    ChannelDriver, I2cConfig, I2cTransferOptions, I2cTransport, Mode, SpiConfig,
    SpiTransferOptions, SpiTransport, Status, TransportError, TransportResult,
};

use crate::error::{MpsseError, Result};
use crate::protocol::*;

/// How long to wait for the device to answer a command stream
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Opens FTDI bridges by VID/PID and interface
#[derive(Debug, Clone)]
pub struct MpsseDriver {
    vendor_id: u16,
    product_id: u16,
    interface: Interface,
    read_timeout: Duration,
}

impl Default for MpsseDriver {
    fn default() -> Self {
        Self::with_ids(FTDI_VID, FTDI_FT232H_PID, Interface::A)
    }
}

impl MpsseDriver {
    /// Driver for a known device type
    pub fn new(device_type: DeviceType, interface: Interface) -> Result<Self> {
        if interface.index() >= device_type.mpsse_channels() {
            return Err(MpsseError::InvalidParameter(format!(
                "Channel {} of {} has no MPSSE engine",
                interface.letter(),
                device_type.name()
            )));
        }
        Ok(Self::with_ids(FTDI_VID, device_type.product_id(), interface))
    }

    /// Driver for an arbitrary VID/PID (custom EEPROM IDs)
    pub fn with_ids(vendor_id: u16, product_id: u16, interface: Interface) -> Self {
        Self {
            vendor_id,
            product_id,
            interface,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Set the response timeout
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// USB vendor ID
    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    /// USB product ID
    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    /// Selected interface
    pub fn interface(&self) -> Interface {
        self.interface
    }

    fn open(&self) -> Result<Device> {
        log::debug!(
            "Looking for FTDI device VID={:04X} PID={:04X}",
            self.vendor_id,
            self.product_id
        );

        let mut device = find_by_vid_pid(self.vendor_id, self.product_id)
            .interface(self.interface.to_ftdi())
            .open()
            .map_err(|e| MpsseError::OpenFailed(format!("{}", e)))?;

        device
            .usb_reset()
            .map_err(|e| MpsseError::ConfigFailed(format!("USB reset failed: {}", e)))?;

        Ok(device)
    }
}

fn status_of(e: MpsseError) -> Status {
    log::warn!("{}", e);
    e.status()
}

impl ChannelDriver for MpsseDriver {
    type Handle = MpsseHandle;

    fn acquire(&mut self, mode: Mode) -> std::result::Result<MpsseHandle, Status> {
        log::info!(
            "Opening FTDI {:04X}:{:04X} channel {} for {}",
            self.vendor_id,
            self.product_id,
            self.interface.letter(),
            mode
        );
        let device = self.open().map_err(status_of)?;
        Ok(MpsseHandle::new(device, self.read_timeout))
    }

    fn init_spi(
        &mut self,
        handle: &mut MpsseHandle,
        config: &SpiConfig,
    ) -> std::result::Result<(), Status> {
        handle
            .enter_mpsse(config.latency_timer)
            .and_then(|()| handle.setup_spi(config))
            .map_err(status_of)
    }

    fn init_i2c(
        &mut self,
        handle: &mut MpsseHandle,
        config: &I2cConfig,
    ) -> std::result::Result<(), Status> {
        handle
            .enter_mpsse(config.latency_timer)
            .and_then(|()| handle.setup_i2c(config))
            .map_err(status_of)
    }

    fn change_spi(
        &mut self,
        handle: &mut MpsseHandle,
        config: &SpiConfig,
    ) -> std::result::Result<(), Status> {
        handle.change_spi(config).map_err(status_of)
    }

    fn release(&mut self, mut handle: MpsseHandle) -> std::result::Result<(), Status> {
        handle.release_pins().map_err(status_of)
        // Device is closed when the handle drops
    }
}

#[derive(Debug, Clone, Copy)]
enum Line {
    Unconfigured,
    Spi(SpiLines),
    I2c(I2cLines),
}

/// An open MPSSE channel
///
/// Generic over the byte pipe so the command streams can be exercised
/// without hardware; the driver always uses a libftdi1 [`Device`].
pub struct MpsseHandle<P: Read + Write = Device> {
    port: P,
    line: Line,
    read_timeout: Duration,
    released: bool,
}

impl MpsseHandle<Device> {
    /// Switch the interface into MPSSE mode
    fn enter_mpsse(&mut self, latency_timer: u8) -> Result<()> {
        self.port.set_latency_timer(latency_timer).map_err(|e| {
            MpsseError::ConfigFailed(format!("Set latency timer failed: {}", e))
        })?;

        self.port
            .set_bitmode(0x00, BitMode::Mpsse)
            .map_err(|e| MpsseError::ConfigFailed(format!("Set MPSSE mode failed: {}", e)))?;

        Ok(())
    }
}

impl<P: Read + Write> MpsseHandle<P> {
    /// Wrap a pipe that is already in MPSSE mode
    pub fn new(port: P, read_timeout: Duration) -> Self {
        Self {
            port,
            line: Line::Unconfigured,
            read_timeout,
            released: false,
        }
    }

    /// Configure the engine as SPI master
    pub fn setup_spi(&mut self, config: &SpiConfig) -> Result<()> {
        let divisor = clock_divisor(config.clock_rate, false).ok_or_else(|| {
            MpsseError::InvalidParameter("SPI clock rate must be non-zero".to_string())
        })?;
        let lines = SpiLines::new(config);

        let mut buf = Vec::with_capacity(16);
        buf.push(DIS_DIV_5);
        buf.push(CLK_NO_ADAPTIVE);
        buf.push(DIS_3_PHASE);
        push_divisor(&mut buf, divisor);
        buf.push(LOOPBACK_END);
        log::debug!(
            "Setting data bits: idle=0x{:02X} active=0x{:02X} pindir=0x{:02X}",
            lines.idle,
            lines.active,
            lines.direction
        );
        push_set_bits_low(&mut buf, lines.idle, lines.direction);
        self.send(&buf)?;

        self.line = Line::Spi(lines);
        log::info!(
            "MPSSE configured for SPI mode {} at {:.2} MHz",
            config.mode.number(),
            clock_rate(divisor, false) as f64 / 1_000_000.0
        );
        Ok(())
    }

    /// Re-apply clock, mode and chip-select settings on an SPI handle
    ///
    /// The latency timer keeps the value it was opened with.
    pub fn change_spi(&mut self, config: &SpiConfig) -> Result<()> {
        if !matches!(self.line, Line::Spi(_)) {
            return Err(MpsseError::NotConfigured("SPI"));
        }
        let divisor = clock_divisor(config.clock_rate, false).ok_or_else(|| {
            MpsseError::InvalidParameter("SPI clock rate must be non-zero".to_string())
        })?;
        let lines = SpiLines::new(config);

        let mut buf = Vec::with_capacity(8);
        push_divisor(&mut buf, divisor);
        push_set_bits_low(&mut buf, lines.idle, lines.direction);
        self.send(&buf)?;

        self.line = Line::Spi(lines);
        log::debug!(
            "MPSSE SPI settings changed: mode {}, CS on ADBUS{}, idle=0x{:02X}",
            config.mode.number(),
            config.chip_select.pin(),
            lines.idle
        );
        Ok(())
    }

    /// Configure the engine as I²C master
    pub fn setup_i2c(&mut self, config: &I2cConfig) -> Result<()> {
        let lines = I2cLines::default();
        let mut buf = Vec::with_capacity(16);
        push_i2c_setup(
            &mut buf,
            &lines,
            config.clock_rate,
            config.three_phase,
            config.drive_only_zero,
        );
        self.send(&buf)?;

        self.line = Line::I2c(lines);
        log::info!(
            "MPSSE configured for I2C at {} ({} Hz)",
            config.clock_rate,
            config.clock_rate.hz()
        );
        Ok(())
    }

    /// Drive the release pin levels (all inputs unless configured otherwise)
    ///
    /// Only the first call touches the device.
    pub fn release_pins(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let (value, direction) = match self.line {
            Line::Spi(lines) => (lines.release_value, lines.release_direction),
            _ => (0x00, 0x00),
        };
        self.send(&[SET_BITS_LOW, value, direction])
    }

    #[cfg(test)]
    fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Send data to the device
    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.port
            .write_all(data)
            .map_err(|source| MpsseError::TransferFailed {
                received: 0,
                source,
            })?;
        log::trace!("Sent {} bytes", data.len());
        Ok(())
    }

    /// Receive exactly `buf.len()` bytes from the device
    ///
    /// Fails once the device stays silent for `read_timeout`; a slow but
    /// steady response is waited out however long it takes.
    fn recv_into(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut deadline = Instant::now() + self.read_timeout;
        let mut total = 0;

        while total < buf.len() {
            match self.port.read(&mut buf[total..]) {
                Ok(0) => {
                    if Instant::now() >= deadline {
                        return Err(MpsseError::Timeout {
                            expected: buf.len(),
                            received: total,
                        });
                    }
                    // No data available, wait a bit
                    std::thread::sleep(Duration::from_micros(100));
                }
                Ok(n) => {
                    total += n;
                    deadline = Instant::now() + self.read_timeout;
                }
                Err(source) => {
                    return Err(MpsseError::TransferFailed {
                        received: total,
                        source,
                    })
                }
            }
        }

        log::trace!("Received {} bytes", total);
        Ok(())
    }

    /// Send `cmd` with SEND_IMMEDIATE and read `response.len()` bytes back
    fn exchange(&mut self, cmd: &mut Vec<u8>, response: &mut [u8]) -> Result<()> {
        cmd.push(SEND_IMMEDIATE);
        let sent = self.send(cmd);
        cmd.clear();
        sent?;
        self.recv_into(response)
    }

    /// Send whatever is queued in `cmd`
    fn flush(&mut self, cmd: &mut Vec<u8>) -> Result<()> {
        if cmd.is_empty() {
            return Ok(());
        }
        let sent = self.send(cmd);
        cmd.clear();
        sent
    }

    fn spi_lines(&self) -> std::result::Result<SpiLines, TransportError> {
        match self.line {
            Line::Spi(lines) => Ok(lines),
            _ => Err(transport_error(MpsseError::NotConfigured("SPI"), 0)),
        }
    }

    fn i2c_lines(&self) -> std::result::Result<I2cLines, TransportError> {
        match self.line {
            Line::I2c(lines) => Ok(lines),
            _ => Err(transport_error(MpsseError::NotConfigured("I2C"), 0)),
        }
    }

    fn spi_segment(
        &mut self,
        data: SpiData<'_>,
        recv: Option<&mut [u8]>,
        options: SpiTransferOptions,
    ) -> TransportResult {
        let lines = self.spi_lines()?;
        check_len(data.len())?;

        let mut cmd = Vec::with_capacity(data.len() + 16);
        push_spi_segment(
            &mut cmd,
            &lines,
            data,
            options.contains(SpiTransferOptions::CHIP_SELECT_ENABLE),
            options.contains(SpiTransferOptions::CHIP_SELECT_DISABLE),
        );
        self.send(&cmd).map_err(|e| transport_error(e, 0))?;

        if let Some(buf) = recv {
            self.recv_into(buf).map_err(|e| {
                let received = e.received();
                transport_error(e, received)
            })?;
        }
        Ok(data.len())
    }

    /// Address the slave; on NACK the segment ends, with a stop if requested
    fn i2c_address(
        &mut self,
        cmd: &mut Vec<u8>,
        lines: &I2cLines,
        address: u8,
        read: bool,
        options: I2cTransferOptions,
    ) -> std::result::Result<(), TransportError> {
        push_i2c_write_byte(cmd, lines, address_byte(address, read));
        let mut ack = [0u8; 1];
        self.exchange(cmd, &mut ack)
            .map_err(|e| transport_error(e, 0))?;

        if is_ack(ack[0]) {
            return Ok(());
        }
        log::debug!("I2C address 0x{:02X} not acknowledged", address);
        self.abort_i2c(cmd, lines, options);
        Err(TransportError::new(Status::DeviceNotFound, 0))
    }

    fn abort_i2c(&mut self, cmd: &mut Vec<u8>, lines: &I2cLines, options: I2cTransferOptions) {
        cmd.clear();
        if options.contains(I2cTransferOptions::STOP_BIT) {
            push_i2c_stop(cmd, lines);
            if let Err(e) = self.flush(cmd) {
                log::warn!("Failed to send I2C stop: {}", e);
            }
        }
    }

    fn finish_i2c(
        &mut self,
        cmd: &mut Vec<u8>,
        lines: &I2cLines,
        options: I2cTransferOptions,
        len: usize,
    ) -> TransportResult {
        if options.contains(I2cTransferOptions::STOP_BIT) {
            push_i2c_stop(cmd, lines);
        }
        self.flush(cmd).map_err(|e| transport_error(e, len))?;
        Ok(len)
    }
}

fn transport_error(e: MpsseError, transferred: usize) -> TransportError {
    log::debug!("MPSSE transport failure: {}", e);
    TransportError::new(e.status(), transferred)
}

fn check_len(len: usize) -> std::result::Result<(), TransportError> {
    if len > MAX_COMMAND_LEN {
        return Err(transport_error(
            MpsseError::InvalidParameter(format!(
                "segment of {} bytes exceeds {} byte limit",
                len, MAX_COMMAND_LEN
            )),
            0,
        ));
    }
    Ok(())
}

impl<P: Read + Write> Drop for MpsseHandle<P> {
    fn drop(&mut self) {
        // Release I/O pins on close
        if let Err(e) = self.release_pins() {
            log::warn!("Failed to release pins on close: {}", e);
        }
    }
}

impl<P: Read + Write> SpiTransport for MpsseHandle<P> {
    fn read(&mut self, buf: &mut [u8], options: SpiTransferOptions) -> TransportResult {
        self.spi_segment(SpiData::Read(buf.len()), Some(buf), options)
    }

    fn write(&mut self, data: &[u8], options: SpiTransferOptions) -> TransportResult {
        self.spi_segment(SpiData::Write(data), None, options)
    }

    fn read_write(
        &mut self,
        recv: &mut [u8],
        send: &[u8],
        options: SpiTransferOptions,
    ) -> TransportResult {
        self.spi_segment(SpiData::Both(send), Some(recv), options)
    }
}

impl<P: Read + Write> I2cTransport for MpsseHandle<P> {
    fn device_read(
        &mut self,
        address: u8,
        buf: &mut [u8],
        options: I2cTransferOptions,
    ) -> TransportResult {
        let lines = self.i2c_lines()?;
        check_len(buf.len())?;

        let mut cmd = Vec::with_capacity(64);
        if options.contains(I2cTransferOptions::START_BIT) {
            push_i2c_start(&mut cmd, &lines);
        }
        if !options.contains(I2cTransferOptions::NO_ADDRESS) {
            self.i2c_address(&mut cmd, &lines, address, true, options)?;
        }

        let nack_last = options.contains(I2cTransferOptions::NACK_LAST_BYTE);
        let count = buf.len();

        if options.contains(I2cTransferOptions::FAST_TRANSFER) {
            for i in 0..count {
                push_i2c_read_byte(&mut cmd, &lines, nack_last && i + 1 == count);
            }
            self.exchange(&mut cmd, buf).map_err(|e| {
                let received = e.received();
                transport_error(e, received)
            })?;
        } else {
            for (i, byte) in buf.iter_mut().enumerate() {
                push_i2c_read_byte(&mut cmd, &lines, nack_last && i + 1 == count);
                self.exchange(&mut cmd, std::slice::from_mut(byte))
                    .map_err(|e| transport_error(e, i))?;
            }
        }

        self.finish_i2c(&mut cmd, &lines, options, count)
    }

    fn device_write(
        &mut self,
        address: u8,
        data: &[u8],
        options: I2cTransferOptions,
    ) -> TransportResult {
        let lines = self.i2c_lines()?;
        check_len(data.len())?;

        let mut cmd = Vec::with_capacity(64);
        if options.contains(I2cTransferOptions::START_BIT) {
            push_i2c_start(&mut cmd, &lines);
        }
        if !options.contains(I2cTransferOptions::NO_ADDRESS) {
            self.i2c_address(&mut cmd, &lines, address, false, options)?;
        }

        let break_on_nack = options.contains(I2cTransferOptions::BREAK_ON_NACK);

        // Index of the first data byte the slave refused, if any
        let nacked = if options.contains(I2cTransferOptions::FAST_TRANSFER) {
            for &byte in data {
                push_i2c_write_byte(&mut cmd, &lines, byte);
            }
            let mut acks = vec![0u8; data.len()];
            self.exchange(&mut cmd, &mut acks).map_err(|e| {
                let received = e.received();
                transport_error(e, received)
            })?;
            acks.iter().position(|&a| !is_ack(a))
        } else {
            let mut first = None;
            for (i, &byte) in data.iter().enumerate() {
                push_i2c_write_byte(&mut cmd, &lines, byte);
                let mut ack = [0u8; 1];
                self.exchange(&mut cmd, &mut ack)
                    .map_err(|e| transport_error(e, i))?;
                if !is_ack(ack[0]) {
                    first = Some(i);
                    if break_on_nack {
                        break;
                    }
                }
            }
            first
        };

        if let Some(i) = nacked {
            log::debug!("I2C data byte {} to 0x{:02X} not acknowledged", i, address);
            if break_on_nack {
                self.abort_i2c(&mut cmd, &lines, options);
                return Err(TransportError::new(Status::FailedToWriteDevice, i));
            }
        }

        self.finish_i2c(&mut cmd, &lines, options, data.len())
    }
}
