//! CLI argument parsing

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a string as a hex or decimal u16
fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let n = parse_hex_u32(s)?;
    u16::try_from(n).map_err(|_| format!("Value {} does not fit in 16 bits", s))
}

/// Parse a 7-bit I2C address
fn parse_address(s: &str) -> Result<u8, String> {
    let n = parse_hex_u32(s)?;
    match u8::try_from(n) {
        Ok(addr) if addr <= 0x7F => Ok(addr),
        _ => Err(format!("I2C address {} is not a 7-bit address", s)),
    }
}

/// Parse a byte count
fn parse_count(s: &str) -> Result<usize, String> {
    parse_hex_u32(s).map(|n| n as usize)
}

#[derive(Parser)]
#[command(name = "ftxfer")]
#[command(
    author,
    version,
    about = "SPI and I2C transfers through FTDI MPSSE bridges",
    long_about = None
)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (TOML format)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub device: DeviceArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Device selection, overriding the `[device]` section of the config file
#[derive(Args, Debug, Clone, Default)]
pub struct DeviceArgs {
    /// Device type (232h, 2232h, 4232h)
    #[arg(short = 't', long = "type", global = true)]
    pub device_type: Option<String>,

    /// USB vendor ID
    #[arg(long, global = true, value_parser = parse_hex_u16)]
    pub vid: Option<u16>,

    /// USB product ID
    #[arg(long, global = true, value_parser = parse_hex_u16)]
    pub pid: Option<u16>,

    /// Interface/channel (A, B, C, D)
    #[arg(short, long, global = true)]
    pub interface: Option<char>,
}

/// Data to send, inline or from a file
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct InputArgs {
    /// Hex bytes, e.g. "9f" or "de:ad:be:ef"
    #[arg(short, long)]
    pub data: Option<String>,

    /// Binary file to send
    #[arg(short = 'f', long)]
    pub input: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// SPI master transfers
    Spi {
        /// SCK frequency in Hz (overrides config)
        #[arg(long, value_parser = parse_hex_u32)]
        clock: Option<u32>,

        /// SPI mode 0-3 (overrides config)
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=3))]
        mode: Option<u8>,

        #[command(subcommand)]
        command: SpiCommands,
    },

    /// I2C master transfers
    I2c {
        /// Bus speed: standard, fast, fast-plus or high-speed (overrides config)
        #[arg(long)]
        speed: Option<String>,

        #[command(subcommand)]
        command: I2cCommands,
    },
}

/// Chip-select framing flags
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct SpiFramingArgs {
    /// Do not assert chip-select before the transfer
    #[arg(long)]
    pub no_assert: bool,

    /// Leave chip-select asserted after the transfer
    #[arg(long)]
    pub no_deassert: bool,
}

#[derive(Subcommand)]
pub enum SpiCommands {
    /// Clock bytes out
    Write {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        framing: SpiFramingArgs,
    },

    /// Clock bytes in
    Read {
        /// Number of bytes to read
        #[arg(short = 'n', long, value_parser = parse_count)]
        count: usize,

        /// Output file (hex dump to stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        framing: SpiFramingArgs,
    },

    /// Full-duplex transfer
    Swap {
        #[command(flatten)]
        input: InputArgs,

        /// Output file (hex dump to stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        framing: SpiFramingArgs,
    },
}

/// I2C framing flags
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct I2cFramingArgs {
    /// Do not generate a start condition
    #[arg(long)]
    pub no_start: bool,

    /// Do not generate a stop condition
    #[arg(long)]
    pub no_stop: bool,

    /// Batch all bytes into one USB request
    #[arg(long)]
    pub fast: bool,
}

#[derive(Subcommand)]
pub enum I2cCommands {
    /// Read bytes from a slave
    Read {
        /// 7-bit slave address
        #[arg(short, long, value_parser = parse_address)]
        address: u8,

        /// Number of bytes to read
        #[arg(short = 'n', long, value_parser = parse_count)]
        count: usize,

        /// NACK the final byte
        #[arg(long)]
        nack_last: bool,

        /// Output file (hex dump to stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        framing: I2cFramingArgs,
    },

    /// Write bytes to a slave
    Write {
        /// 7-bit slave address
        #[arg(short, long, value_parser = parse_address)]
        address: u8,

        #[command(flatten)]
        input: InputArgs,

        /// Stop at the first byte the slave does not acknowledge
        #[arg(long)]
        break_on_nack: bool,

        #[command(flatten)]
        framing: I2cFramingArgs,
    },
}
