//! Channel configuration passed to [`ChannelDriver`](super::ChannelDriver)

use core::fmt;
use core::str::FromStr;

/// SPI clock polarity/phase combination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpiMode {
    /// CPOL=0, CPHA=0
    #[default]
    Mode0,
    /// CPOL=0, CPHA=1
    Mode1,
    /// CPOL=1, CPHA=0
    Mode2,
    /// CPOL=1, CPHA=1
    Mode3,
}

impl SpiMode {
    /// Mode from its number (0-3)
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            0 => Some(SpiMode::Mode0),
            1 => Some(SpiMode::Mode1),
            2 => Some(SpiMode::Mode2),
            3 => Some(SpiMode::Mode3),
            _ => None,
        }
    }

    /// Mode number (0-3)
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Clock idles high
    pub fn cpol(self) -> bool {
        matches!(self, SpiMode::Mode2 | SpiMode::Mode3)
    }

    /// Data is sampled on the trailing clock edge
    pub fn cpha(self) -> bool {
        matches!(self, SpiMode::Mode1 | SpiMode::Mode3)
    }
}

/// Pin used as chip-select
///
/// ADBUS0-2 are taken by SCK, MOSI and MISO, so only ADBUS3-7 qualify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChipSelect {
    /// ADBUS3
    #[default]
    Adbus3,
    /// ADBUS4 (GPIOL0)
    Adbus4,
    /// ADBUS5 (GPIOL1)
    Adbus5,
    /// ADBUS6 (GPIOL2)
    Adbus6,
    /// ADBUS7 (GPIOL3)
    Adbus7,
}

impl ChipSelect {
    /// ADBUS pin number
    pub fn pin(self) -> u8 {
        match self {
            ChipSelect::Adbus3 => 3,
            ChipSelect::Adbus4 => 4,
            ChipSelect::Adbus5 => 5,
            ChipSelect::Adbus6 => 6,
            ChipSelect::Adbus7 => 7,
        }
    }

    /// Bit mask of the pin within the low byte
    pub fn mask(self) -> u8 {
        1 << self.pin()
    }

    /// Chip-select from an ADBUS pin number
    pub fn from_pin(pin: u8) -> Option<Self> {
        match pin {
            3 => Some(ChipSelect::Adbus3),
            4 => Some(ChipSelect::Adbus4),
            5 => Some(ChipSelect::Adbus5),
            6 => Some(ChipSelect::Adbus6),
            7 => Some(ChipSelect::Adbus7),
            _ => None,
        }
    }
}

/// Direction and level of the eight low-byte pins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PinState {
    /// 1 = output
    pub direction: u8,
    /// Output level
    pub value: u8,
}

impl PinState {
    /// Create a pin state
    pub const fn new(direction: u8, value: u8) -> Self {
        Self { direction, value }
    }
}

/// SPI channel configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpiConfig {
    /// SCK frequency in Hz
    pub clock_rate: u32,
    /// USB latency timer in milliseconds
    pub latency_timer: u8,
    /// Clock polarity and phase
    pub mode: SpiMode,
    /// Pin driven as chip-select
    pub chip_select: ChipSelect,
    /// Chip-select is asserted by driving it low
    pub cs_active_low: bool,
    /// Extra GPIO state applied after configuration
    pub initial_pins: PinState,
    /// GPIO state applied when the channel is released
    pub final_pins: PinState,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            clock_rate: 10_000_000,
            latency_timer: 2,
            mode: SpiMode::Mode0,
            chip_select: ChipSelect::Adbus3,
            cs_active_low: true,
            initial_pins: PinState::default(),
            final_pins: PinState::default(),
        }
    }
}

impl SpiConfig {
    /// Set the clock rate in Hz
    pub fn clock_rate(mut self, hz: u32) -> Self {
        self.clock_rate = hz;
        self
    }

    /// Set the latency timer in milliseconds
    pub fn latency_timer(mut self, ms: u8) -> Self {
        self.latency_timer = ms;
        self
    }

    /// Set the SPI mode
    pub fn mode(mut self, mode: SpiMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the chip-select pin and polarity
    pub fn chip_select(mut self, cs: ChipSelect, active_low: bool) -> Self {
        self.chip_select = cs;
        self.cs_active_low = active_low;
        self
    }
}

/// I²C bus speed class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum I2cClockRate {
    /// 100 kHz
    Standard,
    /// 400 kHz
    #[default]
    Fast,
    /// 1 MHz
    FastPlus,
    /// 3.4 MHz
    HighSpeed,
}

impl I2cClockRate {
    /// SCL frequency in Hz
    pub fn hz(self) -> u32 {
        match self {
            I2cClockRate::Standard => 100_000,
            I2cClockRate::Fast => 400_000,
            I2cClockRate::FastPlus => 1_000_000,
            I2cClockRate::HighSpeed => 3_400_000,
        }
    }

    /// Name as accepted by [`FromStr`]
    pub fn name(self) -> &'static str {
        match self {
            I2cClockRate::Standard => "standard",
            I2cClockRate::Fast => "fast",
            I2cClockRate::FastPlus => "fast-plus",
            I2cClockRate::HighSpeed => "high-speed",
        }
    }
}

impl fmt::Display for I2cClockRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unrecognized I²C clock rate name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown I2C clock rate '{0}' (expected standard, fast, fast-plus or high-speed)")]
pub struct ParseClockRateError(pub String);

impl FromStr for I2cClockRate {
    type Err = ParseClockRateError;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "standard" | "100k" => Ok(I2cClockRate::Standard),
            "fast" | "400k" => Ok(I2cClockRate::Fast),
            "fast-plus" | "1m" => Ok(I2cClockRate::FastPlus),
            "high-speed" | "3.4m" => Ok(I2cClockRate::HighSpeed),
            _ => Err(ParseClockRateError(s.to_string())),
        }
    }
}

/// I²C channel configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct I2cConfig {
    /// Bus speed class
    pub clock_rate: I2cClockRate,
    /// USB latency timer in milliseconds
    pub latency_timer: u8,
    /// Use 3-phase data clocking
    pub three_phase: bool,
    /// Only drive lines low, relying on external pull-ups for high
    pub drive_only_zero: bool,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self {
            clock_rate: I2cClockRate::Fast,
            latency_timer: 2,
            three_phase: true,
            drive_only_zero: false,
        }
    }
}

impl I2cConfig {
    /// Set the bus speed class
    pub fn clock_rate(mut self, rate: I2cClockRate) -> Self {
        self.clock_rate = rate;
        self
    }

    /// Set the latency timer in milliseconds
    pub fn latency_timer(mut self, ms: u8) -> Self {
        self.latency_timer = ms;
        self
    }
}
