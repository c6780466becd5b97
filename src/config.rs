//! TOML configuration file
//!
//! ```toml
//! [device]
//! vid = 0x0403
//! pid = "0x6014"
//! interface = "A"
//!
//! [spi]
//! clock_rate = 10_000_000
//! mode = 0
//! chip_select = 3
//!
//! [i2c]
//! clock_rate = "fast"
//! three_phase = true
//! ```
//!
//! Every key is optional. Numbers may be written as hex strings.

use std::fs;
use std::path::{Path, PathBuf};

use ftxfer_core::{ChipSelect, I2cClockRate, I2cConfig, SpiConfig, SpiMode};
use ftxfer_mpsse::{FTDI_FT232H_PID, FTDI_VID};
use serde::Deserialize;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Whole configuration file
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub device: DeviceSection,
    pub spi: SpiSection,
    pub i2c: I2cSection,
}

/// `[device]`
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceSection {
    #[serde(deserialize_with = "deserialize_hex_u16")]
    pub vid: u16,
    #[serde(deserialize_with = "deserialize_hex_u16")]
    pub pid: u16,
    pub interface: char,
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            vid: FTDI_VID,
            pid: FTDI_FT232H_PID,
            interface: 'A',
        }
    }
}

/// `[spi]`
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpiSection {
    #[serde(deserialize_with = "deserialize_hex_u32")]
    pub clock_rate: u32,
    pub latency_timer: u8,
    pub mode: u8,
    pub chip_select: u8,
    pub cs_active_low: bool,
}

impl Default for SpiSection {
    fn default() -> Self {
        let spi = SpiConfig::default();
        Self {
            clock_rate: spi.clock_rate,
            latency_timer: spi.latency_timer,
            mode: spi.mode.number(),
            chip_select: spi.chip_select.pin(),
            cs_active_low: spi.cs_active_low,
        }
    }
}

/// `[i2c]`
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct I2cSection {
    pub clock_rate: String,
    pub latency_timer: u8,
    pub three_phase: bool,
    pub drive_only_zero: bool,
}

impl Default for I2cSection {
    fn default() -> Self {
        let i2c = I2cConfig::default();
        Self {
            clock_rate: i2c.clock_rate.name().to_string(),
            latency_timer: i2c.latency_timer,
            three_phase: i2c.three_phase,
            drive_only_zero: i2c.drive_only_zero,
        }
    }
}

/// Deserialize a u32 that can be hex (0x...) or decimal
fn deserialize_hex_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    // Try to deserialize as a number first, then as a string
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HexOrInt {
        Int(u32),
        Str(String),
    }

    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(n) => Ok(n),
        HexOrInt::Str(s) => parse_number(&s).map_err(serde::de::Error::custom),
    }
}

fn deserialize_hex_u16<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let n = deserialize_hex_u32(deserializer)?;
    u16::try_from(n)
        .map_err(|_| serde::de::Error::custom(format!("0x{:X} does not fit in 16 bits", n)))
}

/// Parse a number that can be hex (0x...) or decimal
fn parse_number(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex: {}", e))
    } else {
        s.replace('_', "")
            .parse()
            .map_err(|e| format!("invalid number: {}", e))
    }
}

impl Config {
    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse a configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// SPI channel settings
    pub fn spi_config(&self) -> Result<SpiConfig, ConfigError> {
        let s = &self.spi;
        let mode = SpiMode::from_number(s.mode)
            .ok_or_else(|| ConfigError::Invalid(format!("SPI mode {} (must be 0-3)", s.mode)))?;
        let cs = ChipSelect::from_pin(s.chip_select).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "chip_select {} (must be ADBUS pin 3-7)",
                s.chip_select
            ))
        })?;
        if s.clock_rate == 0 {
            return Err(ConfigError::Invalid("SPI clock_rate must be non-zero".into()));
        }

        Ok(SpiConfig::default()
            .clock_rate(s.clock_rate)
            .latency_timer(s.latency_timer)
            .mode(mode)
            .chip_select(cs, s.cs_active_low))
    }

    /// I2C channel settings
    pub fn i2c_config(&self) -> Result<I2cConfig, ConfigError> {
        let s = &self.i2c;
        let rate = s
            .clock_rate
            .parse::<I2cClockRate>()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let mut config = I2cConfig::default()
            .clock_rate(rate)
            .latency_timer(s.latency_timer);
        config.three_phase = s.three_phase;
        config.drive_only_zero = s.drive_only_zero;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.device.vid, 0x0403);
        assert_eq!(config.device.pid, 0x6014);
        assert_eq!(config.device.interface, 'A');
        assert_eq!(config.spi_config().unwrap(), SpiConfig::default());
        assert_eq!(config.i2c_config().unwrap(), I2cConfig::default());
    }

    #[test]
    fn test_full_config() {
        let toml = r#"
[device]
vid = 0x0403
pid = "0x6010"
interface = "B"

[spi]
clock_rate = "0x1E8480"
latency_timer = 1
mode = 3
chip_select = 4
cs_active_low = false

[i2c]
clock_rate = "fast-plus"
three_phase = false
drive_only_zero = true
"#;
        let config = Config::from_toml_str(toml).unwrap();
        assert_eq!(config.device.pid, 0x6010);
        assert_eq!(config.device.interface, 'B');

        let spi = config.spi_config().unwrap();
        assert_eq!(spi.clock_rate, 2_000_000);
        assert_eq!(spi.latency_timer, 1);
        assert_eq!(spi.mode, SpiMode::Mode3);
        assert_eq!(spi.chip_select, ChipSelect::Adbus4);
        assert!(!spi.cs_active_low);

        let i2c = config.i2c_config().unwrap();
        assert_eq!(i2c.clock_rate, I2cClockRate::FastPlus);
        assert!(!i2c.three_phase);
        assert!(i2c.drive_only_zero);
    }

    #[test]
    fn test_invalid_values() {
        let config = Config::from_toml_str("[spi]\nmode = 4\n").unwrap();
        assert!(matches!(config.spi_config(), Err(ConfigError::Invalid(_))));

        let config = Config::from_toml_str("[spi]\nchip_select = 2\n").unwrap();
        assert!(config.spi_config().is_err());

        let config = Config::from_toml_str("[i2c]\nclock_rate = \"turbo\"\n").unwrap();
        assert!(config.i2c_config().is_err());

        assert!(Config::from_toml_str("[device]\npid = \"0x10000\"\n").is_err());
        assert!(Config::from_toml_str("[spi]\nbogus = 1\n").is_err());
    }
}
