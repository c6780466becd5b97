//! ftxfer - SPI and I2C transfers through FTDI MPSSE bridges
//!
//! Opens one MPSSE channel, initializes it for the requested protocol and
//! runs a single logical transfer. Transfers of any length are split into
//! link-sized segments by `ftxfer-core` while keeping the bus framing of
//! one transaction.

mod cli;
mod commands;
mod config;

use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use ftxfer_core::{Channel, I2cClockRate, SpiMode};

/// Logger at the level picked by `-v`/`-vv`; `RUST_LOG` (read from `env`) wins
fn logger(verbose: u8, env: env_logger::Env<'_>) -> env_logger::Builder {
    let level = match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).parse_env(env);
    builder
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logger(cli.verbose, env_logger::Env::default()).init();

    let config = match cli.config.as_deref() {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let driver = commands::build_driver(&cli.device, &config)?;
    log::info!(
        "Using FTDI device {:04x}:{:04x} interface {}",
        driver.vendor_id(),
        driver.product_id(),
        driver.interface().letter()
    );

    let mut channel = Channel::new(driver)
        .with_observer(|state| log::trace!("Channel state: {}", state));

    let result = match cli.command {
        Commands::Spi {
            clock,
            mode,
            command,
        } => {
            let mut spi = config.spi_config()?;
            if let Some(hz) = clock {
                spi = spi.clock_rate(hz);
            }
            if let Some(mode) = mode.and_then(SpiMode::from_number) {
                spi = spi.mode(mode);
            }
            commands::spi::run(&mut channel, &spi, command)
        }
        Commands::I2c { speed, command } => {
            let mut i2c = config.i2c_config()?;
            if let Some(speed) = speed {
                i2c = i2c.clock_rate(speed.parse::<I2cClockRate>()?);
            }
            commands::i2c::run(&mut channel, &i2c, command)
        }
    };

    if let Err(e) = channel.close() {
        log::warn!("Failed to release channel: {}", e);
    }

    result
}
