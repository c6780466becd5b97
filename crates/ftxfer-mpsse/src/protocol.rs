//! MPSSE protocol constants and command builders
//!
//! Command encodings follow FTDI AN_108 ("Command Processor for MPSSE and
//! MCU Host Bus Emulation Modes"). Builders append to a caller-owned buffer
//! and never touch the device, so the byte streams can be checked in tests.

use ftxfer_core::{I2cClockRate, SpiConfig, SpiMode};

// ============================================================================
// USB VID/PID constants
// ============================================================================

/// FTDI vendor ID
pub const FTDI_VID: u16 = 0x0403;

/// FT2232H product ID (dual channel)
pub const FTDI_FT2232H_PID: u16 = 0x6010;

/// FT4232H product ID (quad channel)
pub const FTDI_FT4232H_PID: u16 = 0x6011;

/// FT232H product ID (single channel)
pub const FTDI_FT232H_PID: u16 = 0x6014;

// ============================================================================
// MPSSE Commands
// ============================================================================

/// Clock data bytes out
pub const MPSSE_DO_WRITE: u8 = 0x10;

/// Clock data bytes in
pub const MPSSE_DO_READ: u8 = 0x20;

/// Data out changes on the falling clock edge
pub const MPSSE_WRITE_NEG: u8 = 0x01;

/// Data in is sampled on the falling clock edge
pub const MPSSE_READ_NEG: u8 = 0x04;

/// Length field counts bits instead of bytes
pub const MPSSE_BITMODE: u8 = 0x02;

/// Set data bits low byte
pub const SET_BITS_LOW: u8 = 0x80;

/// Disable loopback mode
pub const LOOPBACK_END: u8 = 0x85;

/// Set clock divisor
pub const TCK_DIVISOR: u8 = 0x86;

/// Send immediate (flush buffers)
pub const SEND_IMMEDIATE: u8 = 0x87;

/// Disable divide-by-5 prescaler (60 MHz clock)
pub const DIS_DIV_5: u8 = 0x8A;

/// Enable 3-phase clocking (for I2C)
pub const EN_3_PHASE: u8 = 0x8C;

/// Disable 3-phase clocking
pub const DIS_3_PHASE: u8 = 0x8D;

/// Disable adaptive clocking
pub const CLK_NO_ADAPTIVE: u8 = 0x97;

/// Only drive the selected pins low, tri-state them for high (FT232H)
pub const DRIVE_ONLY_ZERO: u8 = 0x9E;

/// Largest length a single clock command can encode
pub const MAX_COMMAND_LEN: usize = 65536;

/// Base clock with the divide-by-5 prescaler off
pub const BASE_CLOCK_HZ: u32 = 60_000_000;

// ============================================================================
// Pin assignments (low byte)
//
// SPI: SK is bit 0, DO is bit 1, DI is bit 2, CS is bit 3..7.
// I2C: SCL is bit 0, SDA out is bit 1, SDA in is bit 2 (bits 1 and 2
// are tied together externally).
// ============================================================================

/// SPI clock
pub const PIN_SK: u8 = 1 << 0;

/// SPI data out (MOSI)
pub const PIN_DO: u8 = 1 << 1;

/// SPI data in (MISO)
pub const PIN_DI: u8 = 1 << 2;

/// I2C clock
pub const PIN_SCL: u8 = 1 << 0;

/// I2C data, driven side
pub const PIN_SDA_OUT: u8 = 1 << 1;

/// I2C data, sampled side
pub const PIN_SDA_IN: u8 = 1 << 2;

/// Pins reserved for the serial engine
const ENGINE_PINS: u8 = PIN_SK | PIN_DO | PIN_DI;

/// Number of times each I2C start/stop line state is repeated
///
/// Each SET_BITS_LOW takes one 60 MHz cycle; repeating stretches the
/// condition past the setup/hold minimum of the slowest bus class.
const I2C_CONDITION_REPEAT: usize = 4;

// ============================================================================
// Supported device types
// ============================================================================

/// MPSSE-capable FTDI bridges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceType {
    /// FT232H (single channel)
    #[default]
    Ft232H,
    /// FT2232H (dual channel)
    Ft2232H,
    /// FT4232H (quad channel)
    Ft4232H,
}

impl DeviceType {
    /// Get the product ID for this device type
    pub fn product_id(&self) -> u16 {
        match self {
            DeviceType::Ft232H => FTDI_FT232H_PID,
            DeviceType::Ft2232H => FTDI_FT2232H_PID,
            DeviceType::Ft4232H => FTDI_FT4232H_PID,
        }
    }

    /// Get the number of MPSSE-capable channels
    ///
    /// Channels C and D of the FT4232H have no MPSSE engine.
    pub fn mpsse_channels(&self) -> u8 {
        match self {
            DeviceType::Ft232H => 1,
            DeviceType::Ft2232H | DeviceType::Ft4232H => 2,
        }
    }

    /// Device type for a product ID
    pub fn from_product_id(pid: u16) -> Option<Self> {
        match pid {
            FTDI_FT232H_PID => Some(DeviceType::Ft232H),
            FTDI_FT2232H_PID => Some(DeviceType::Ft2232H),
            FTDI_FT4232H_PID => Some(DeviceType::Ft4232H),
            _ => None,
        }
    }

    /// Parse device type from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "232h" | "ft232h" => Some(DeviceType::Ft232H),
            "2232h" | "ft2232h" => Some(DeviceType::Ft2232H),
            "4232h" | "ft4232h" => Some(DeviceType::Ft4232H),
            _ => None,
        }
    }

    /// Get the name of this device type
    pub fn name(&self) -> &'static str {
        match self {
            DeviceType::Ft232H => "FT232H",
            DeviceType::Ft2232H => "FT2232H",
            DeviceType::Ft4232H => "FT4232H",
        }
    }
}

/// FTDI interface/channel selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interface {
    /// Channel A (default)
    #[default]
    A,
    /// Channel B
    B,
    /// Channel C
    C,
    /// Channel D
    D,
}

impl Interface {
    /// Parse interface from character
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(Interface::A),
            'B' => Some(Interface::B),
            'C' => Some(Interface::C),
            'D' => Some(Interface::D),
            _ => None,
        }
    }

    /// Get the interface index (0-3)
    pub fn index(&self) -> u8 {
        *self as u8
    }

    /// Get the channel letter
    pub fn letter(&self) -> char {
        (b'A' + self.index()) as char
    }

    pub(crate) fn to_ftdi(self) -> ftdi::Interface {
        match self {
            Interface::A => ftdi::Interface::A,
            Interface::B => ftdi::Interface::B,
            Interface::C => ftdi::Interface::C,
            Interface::D => ftdi::Interface::D,
        }
    }
}

// ============================================================================
// Clocking
// ============================================================================

/// TCK divisor value for `rate_hz`
///
/// Two-phase clocking gives `60 MHz / ((1 + div) * 2)`, three-phase
/// `60 MHz / ((1 + div) * 3)`. The result is rounded so the bus never runs
/// faster than requested. Returns `None` for a zero rate.
pub fn clock_divisor(rate_hz: u32, three_phase: bool) -> Option<u16> {
    if rate_hz == 0 {
        return None;
    }
    let phases = if three_phase { 3 } else { 2 };
    let base = BASE_CLOCK_HZ / phases;
    let div = base.div_ceil(rate_hz).saturating_sub(1);
    Some(div.min(u16::MAX as u32) as u16)
}

/// Actual clock produced by `divisor`
pub fn clock_rate(divisor: u16, three_phase: bool) -> u32 {
    let phases = if three_phase { 3 } else { 2 };
    BASE_CLOCK_HZ / phases / (1 + divisor as u32)
}

/// Append a TCK_DIVISOR command
pub fn push_divisor(buf: &mut Vec<u8>, divisor: u16) {
    buf.push(TCK_DIVISOR);
    buf.extend_from_slice(&divisor.to_le_bytes());
}

/// Append a SET_BITS_LOW command
pub fn push_set_bits_low(buf: &mut Vec<u8>, value: u8, direction: u8) {
    buf.push(SET_BITS_LOW);
    buf.push(value);
    buf.push(direction);
}

/// Append the 16-bit length field of a clock command (`len - 1`)
///
/// `len` must be between 1 and [`MAX_COMMAND_LEN`].
fn push_len(buf: &mut Vec<u8>, len: usize) {
    debug_assert!((1..=MAX_COMMAND_LEN).contains(&len));
    buf.extend_from_slice(&((len - 1) as u16).to_le_bytes());
}

// ============================================================================
// SPI
// ============================================================================

/// Clock edge modifiers for an SPI mode
///
/// Returns `(write_edge, read_edge)` to OR into the clock commands.
pub fn spi_edges(mode: SpiMode) -> (u8, u8) {
    match mode {
        // Sample on the rising edge, shift out on the falling one
        SpiMode::Mode0 | SpiMode::Mode3 => (MPSSE_WRITE_NEG, 0),
        SpiMode::Mode1 | SpiMode::Mode2 => (0, MPSSE_READ_NEG),
    }
}

/// Resolved SPI pin levels for one configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiLines {
    /// Output pins
    pub direction: u8,
    /// Pin levels with chip-select deasserted
    pub idle: u8,
    /// Pin levels with chip-select asserted
    pub active: u8,
    /// Write edge modifier
    pub write_edge: u8,
    /// Read edge modifier
    pub read_edge: u8,
    /// Levels written when the channel is released
    pub release_value: u8,
    /// Directions written when the channel is released
    pub release_direction: u8,
}

impl SpiLines {
    /// Compute pin levels for `config`
    pub fn new(config: &SpiConfig) -> Self {
        let cs = config.chip_select.mask();
        let gpio_mask = !(ENGINE_PINS | cs);
        let gpio_dir = config.initial_pins.direction & gpio_mask;

        let mut base = config.initial_pins.value & gpio_dir;
        if config.mode.cpol() {
            base |= PIN_SK;
        }
        let (idle, active) = if config.cs_active_low {
            (base | cs, base)
        } else {
            (base, base | cs)
        };
        let (write_edge, read_edge) = spi_edges(config.mode);

        Self {
            direction: PIN_SK | PIN_DO | cs | gpio_dir,
            idle,
            active,
            write_edge,
            read_edge,
            release_value: config.final_pins.value,
            release_direction: config.final_pins.direction,
        }
    }
}

/// Data phase of one SPI segment
#[derive(Debug, Clone, Copy)]
pub enum SpiData<'a> {
    /// Clock in this many bytes
    Read(usize),
    /// Clock out these bytes
    Write(&'a [u8]),
    /// Clock out these bytes while clocking in as many
    Both(&'a [u8]),
}

impl SpiData<'_> {
    /// Bytes moved by the data phase
    pub fn len(&self) -> usize {
        match self {
            SpiData::Read(n) => *n,
            SpiData::Write(d) | SpiData::Both(d) => d.len(),
        }
    }

    /// Whether the data phase is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Append the commands for one SPI segment
///
/// `assert_cs` and `deassert_cs` wrap the data phase in chip-select edges.
/// The buffer always ends with SEND_IMMEDIATE.
pub fn push_spi_segment(
    buf: &mut Vec<u8>,
    lines: &SpiLines,
    data: SpiData<'_>,
    assert_cs: bool,
    deassert_cs: bool,
) {
    if assert_cs {
        push_set_bits_low(buf, lines.active, lines.direction);
    }

    if !data.is_empty() {
        match data {
            SpiData::Read(n) => {
                buf.push(MPSSE_DO_READ | lines.read_edge);
                push_len(buf, n);
            }
            SpiData::Write(bytes) => {
                buf.push(MPSSE_DO_WRITE | lines.write_edge);
                push_len(buf, bytes.len());
                buf.extend_from_slice(bytes);
            }
            SpiData::Both(bytes) => {
                buf.push(MPSSE_DO_WRITE | MPSSE_DO_READ | lines.write_edge | lines.read_edge);
                push_len(buf, bytes.len());
                buf.extend_from_slice(bytes);
            }
        }
    }

    if deassert_cs {
        push_set_bits_low(buf, lines.idle, lines.direction);
    }
    buf.push(SEND_IMMEDIATE);
}

// ============================================================================
// I2C
// ============================================================================

/// Line directions used on an I2C channel
///
/// [`PIN_SDA_IN`] is an input in both states; it must be wired to
/// [`PIN_SDA_OUT`] so the engine can sample what the slave drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cLines {
    /// SCL and SDA driven
    pub drive: u8,
    /// SCL driven, SDA released for the slave
    pub listen: u8,
}

impl Default for I2cLines {
    fn default() -> Self {
        Self {
            drive: PIN_SCL | PIN_SDA_OUT,
            listen: PIN_SCL,
        }
    }
}

fn push_repeated(buf: &mut Vec<u8>, value: u8, direction: u8) {
    for _ in 0..I2C_CONDITION_REPEAT {
        push_set_bits_low(buf, value, direction);
    }
}

/// Append MPSSE setup for an I2C channel
pub fn push_i2c_setup(
    buf: &mut Vec<u8>,
    lines: &I2cLines,
    rate: I2cClockRate,
    three_phase: bool,
    drive_only_zero: bool,
) {
    buf.push(DIS_DIV_5);
    buf.push(CLK_NO_ADAPTIVE);
    buf.push(if three_phase { EN_3_PHASE } else { DIS_3_PHASE });
    if drive_only_zero {
        buf.extend_from_slice(&[DRIVE_ONLY_ZERO, PIN_SCL | PIN_SDA_OUT, 0x00]);
    }
    let divisor = clock_divisor(rate.hz(), three_phase).unwrap_or(u16::MAX);
    push_divisor(buf, divisor);
    buf.push(LOOPBACK_END);
    // Bus idle: both lines high
    push_set_bits_low(buf, PIN_SCL | PIN_SDA_OUT, lines.drive);
}

/// Append a start condition: SDA falls while SCL is high
pub fn push_i2c_start(buf: &mut Vec<u8>, lines: &I2cLines) {
    push_repeated(buf, PIN_SCL | PIN_SDA_OUT, lines.drive);
    push_repeated(buf, PIN_SCL, lines.drive);
    push_repeated(buf, 0, lines.drive);
}

/// Append a stop condition: SDA rises while SCL is high
pub fn push_i2c_stop(buf: &mut Vec<u8>, lines: &I2cLines) {
    push_repeated(buf, 0, lines.drive);
    push_repeated(buf, PIN_SCL, lines.drive);
    push_repeated(buf, PIN_SCL | PIN_SDA_OUT, lines.drive);
}

/// Append one byte out followed by a one-bit ACK read
///
/// The device answers with one byte whose bit 0 is the ACK bit.
pub fn push_i2c_write_byte(buf: &mut Vec<u8>, lines: &I2cLines, byte: u8) {
    buf.extend_from_slice(&[MPSSE_DO_WRITE | MPSSE_WRITE_NEG, 0x00, 0x00, byte]);
    push_set_bits_low(buf, 0, lines.listen);
    buf.extend_from_slice(&[MPSSE_DO_READ | MPSSE_BITMODE, 0x00]);
    push_set_bits_low(buf, PIN_SDA_OUT, lines.drive);
}

/// Append one byte in followed by an ACK (or NACK) bit out
///
/// The device answers with the data byte.
pub fn push_i2c_read_byte(buf: &mut Vec<u8>, lines: &I2cLines, nack: bool) {
    push_set_bits_low(buf, 0, lines.listen);
    buf.extend_from_slice(&[MPSSE_DO_READ, 0x00, 0x00]);
    push_set_bits_low(buf, 0, lines.drive);
    let ack_bit = if nack { 0x80 } else { 0x00 };
    buf.extend_from_slice(&[MPSSE_DO_WRITE | MPSSE_BITMODE | MPSSE_WRITE_NEG, 0x00, ack_bit]);
    push_set_bits_low(buf, PIN_SDA_OUT, lines.drive);
}

/// Whether the ACK response byte reports an acknowledge
pub fn is_ack(response: u8) -> bool {
    response & 0x01 == 0
}

/// Address byte for a 7-bit address and direction
pub fn address_byte(address: u8, read: bool) -> u8 {
    (address << 1) | u8::from(read)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftxfer_core::{ChipSelect, PinState};

    #[test]
    fn test_clock_divisor() {
        // 30 MHz is the fastest two-phase rate
        assert_eq!(clock_divisor(30_000_000, false), Some(0));
        assert_eq!(clock_divisor(10_000_000, false), Some(2));
        assert_eq!(clock_rate(2, false), 10_000_000);
        // Never faster than requested
        assert_eq!(clock_divisor(7_000_000, false), Some(4));
        assert!(clock_rate(4, false) <= 7_000_000);
        // 400 kHz with three-phase: 20 MHz / 400 kHz = 50
        assert_eq!(clock_divisor(400_000, true), Some(49));
        assert_eq!(clock_divisor(1, false), Some(u16::MAX));
        assert_eq!(clock_divisor(0, true), None);
    }

    #[test]
    fn test_spi_edges() {
        assert_eq!(spi_edges(SpiMode::Mode0), (MPSSE_WRITE_NEG, 0));
        assert_eq!(spi_edges(SpiMode::Mode3), (MPSSE_WRITE_NEG, 0));
        assert_eq!(spi_edges(SpiMode::Mode1), (0, MPSSE_READ_NEG));
        assert_eq!(spi_edges(SpiMode::Mode2), (0, MPSSE_READ_NEG));
    }

    #[test]
    fn test_spi_lines() {
        let lines = SpiLines::new(&SpiConfig::default());
        assert_eq!(lines.direction, 0x0B);
        assert_eq!(lines.idle, 0x08);
        assert_eq!(lines.active, 0x00);

        let mut config = SpiConfig::default()
            .mode(SpiMode::Mode2)
            .chip_select(ChipSelect::Adbus5, false);
        config.initial_pins = PinState::new(0xC7, 0xFF);
        let lines = SpiLines::new(&config);
        // Engine pins in initial_pins are ignored; GPIOL2/3 become outputs
        assert_eq!(lines.direction, 0x01 | 0x02 | 0x20 | 0xC0);
        assert_eq!(lines.idle, 0xC0 | PIN_SK);
        assert_eq!(lines.active, 0xC0 | PIN_SK | 0x20);
    }

    #[test]
    #[rustfmt::skip]
    fn test_spi_write_segment() {
        let lines = SpiLines::new(&SpiConfig::default());
        let mut buf = Vec::new();
        push_spi_segment(&mut buf, &lines, SpiData::Write(&[0xAA, 0xBB]), true, true);
        assert_eq!(
            buf,
            vec![
                SET_BITS_LOW, 0x00, 0x0B,
                0x11, 0x01, 0x00, 0xAA, 0xBB,
                SET_BITS_LOW, 0x08, 0x0B,
                SEND_IMMEDIATE,
            ]
        );
    }

    #[test]
    fn test_spi_middle_segment_leaves_cs() {
        let lines = SpiLines::new(&SpiConfig::default());
        let mut buf = Vec::new();
        push_spi_segment(&mut buf, &lines, SpiData::Read(65536), false, false);
        assert_eq!(buf, vec![0x20, 0xFF, 0xFF, SEND_IMMEDIATE]);

        buf.clear();
        let lines = SpiLines::new(&SpiConfig::default().mode(SpiMode::Mode1));
        push_spi_segment(&mut buf, &lines, SpiData::Both(&[1]), false, false);
        assert_eq!(buf, vec![0x34, 0x00, 0x00, 0x01, SEND_IMMEDIATE]);
    }

    #[test]
    fn test_spi_empty_segment_only_frames() {
        let lines = SpiLines::new(&SpiConfig::default());
        let mut buf = Vec::new();
        push_spi_segment(&mut buf, &lines, SpiData::Write(&[]), true, true);
        assert_eq!(
            buf,
            vec![SET_BITS_LOW, 0x00, 0x0B, SET_BITS_LOW, 0x08, 0x0B, SEND_IMMEDIATE]
        );
    }

    #[test]
    fn test_i2c_start_stop() {
        let lines = I2cLines::default();
        let mut buf = Vec::new();
        push_i2c_start(&mut buf, &lines);
        assert_eq!(buf.len(), 3 * 3 * I2C_CONDITION_REPEAT);
        let values: Vec<u8> = buf.chunks(3).map(|c| c[1]).collect();
        assert_eq!(&values[..4], &[0x03; 4]);
        assert_eq!(&values[4..8], &[0x01; 4]);
        assert_eq!(&values[8..], &[0x00; 4]);

        buf.clear();
        push_i2c_stop(&mut buf, &lines);
        let values: Vec<u8> = buf.chunks(3).map(|c| c[1]).collect();
        assert_eq!(values.first(), Some(&0x00));
        assert_eq!(values.last(), Some(&0x03));
    }

    #[test]
    #[rustfmt::skip]
    fn test_i2c_write_byte() {
        let mut buf = Vec::new();
        push_i2c_write_byte(&mut buf, &I2cLines::default(), 0xA0);
        assert_eq!(
            buf,
            vec![
                0x11, 0x00, 0x00, 0xA0,
                SET_BITS_LOW, 0x00, 0x01,
                0x22, 0x00,
                SET_BITS_LOW, 0x02, 0x03,
            ]
        );
    }

    #[test]
    fn test_i2c_read_byte_ack_bit() {
        let mut ack = Vec::new();
        push_i2c_read_byte(&mut ack, &I2cLines::default(), false);
        let mut nack = Vec::new();
        push_i2c_read_byte(&mut nack, &I2cLines::default(), true);

        assert_eq!(&ack[3..6], &[0x20, 0x00, 0x00]);
        assert_eq!(&ack[9..12], &[0x13, 0x00, 0x00]);
        assert_eq!(&nack[9..12], &[0x13, 0x00, 0x80]);
    }

    #[test]
    fn test_i2c_lines_never_drive_sda_in() {
        let lines = I2cLines::default();
        assert_eq!(lines.drive & PIN_SDA_IN, 0);
        assert_eq!(lines.listen & PIN_SDA_IN, 0);
        assert_eq!(lines.listen & PIN_SDA_OUT, 0);
        assert_ne!(lines.drive & PIN_SDA_OUT, 0);
    }

    #[test]
    fn test_address_byte() {
        assert_eq!(address_byte(0x50, false), 0xA0);
        assert_eq!(address_byte(0x50, true), 0xA1);
        assert!(is_ack(0xFE));
        assert!(!is_ack(0x01));
    }

    #[test]
    fn test_device_types() {
        assert_eq!(DeviceType::parse("ft2232h"), Some(DeviceType::Ft2232H));
        assert_eq!(DeviceType::from_product_id(0x6014), Some(DeviceType::Ft232H));
        assert_eq!(DeviceType::Ft4232H.mpsse_channels(), 2);
        assert_eq!(Interface::from_char('b'), Some(Interface::B));
        assert_eq!(Interface::D.letter(), 'D');
    }
}
