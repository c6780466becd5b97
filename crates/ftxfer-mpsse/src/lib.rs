//! ftxfer-mpsse - libftdi1 backend for ftxfer channels
//!
//! Implements [`ftxfer_core::ChannelDriver`] and both transport traits on
//! top of the MPSSE engine of FTDI "H" bridges.
//!
//! # Supported Devices
//!
//! - FTDI FT232H (single channel)
//! - FTDI FT2232H (channels A and B)
//! - FTDI FT4232H (channels A and B)
//!
//! # Example
//!
//! ```no_run
//! use ftxfer_core::{Channel, I2cConfig, I2cTransferOptions};
//! use ftxfer_mpsse::{DeviceType, Interface, MpsseDriver};
//!
//! let driver = MpsseDriver::new(DeviceType::Ft232H, Interface::A)?;
//! let mut channel = Channel::new(driver);
//! channel.init_i2c(&I2cConfig::default())?;
//!
//! // Read 128 KiB from an EEPROM at 0x50; the transfer is split into
//! // two link segments but stays one I2C transaction
//! let data = channel
//!     .i2c()?
//!     .read_vec(0x50, 128 * 1024, I2cTransferOptions::FRAMED)?;
//! println!("read {} bytes", data.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Pin Usage
//!
//! | Pin    | SPI        | I2C                    |
//! |--------|------------|------------------------|
//! | ADBUS0 | SCK        | SCL                    |
//! | ADBUS1 | MOSI       | SDA (out)              |
//! | ADBUS2 | MISO       | SDA (in, tie to ADBUS1)|
//! | ADBUS3 | CS default | unused                 |
//! | ADBUS4-7 | CS or GPIO | unused               |

mod device;
mod error;
mod protocol;

pub use device::{MpsseDriver, MpsseHandle, DEFAULT_READ_TIMEOUT};
pub use error::{MpsseError, Result};
pub use protocol::{
    clock_divisor, clock_rate, DeviceType, Interface, FTDI_FT2232H_PID, FTDI_FT232H_PID,
    FTDI_FT4232H_PID, FTDI_VID, MAX_COMMAND_LEN, PIN_SCL, PIN_SDA_IN, PIN_SDA_OUT,
};
