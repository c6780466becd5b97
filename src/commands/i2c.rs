//! `ftxfer i2c` command

use ftxfer_core::{Channel, ChannelDriver, I2cConfig, I2cTransferOptions};

use super::{emit_output, load_input, CommandResult};
use crate::cli::{I2cCommands, I2cFramingArgs};

fn transfer_options(framing: I2cFramingArgs) -> I2cTransferOptions {
    let mut options = I2cTransferOptions::FRAMED;
    options.set(I2cTransferOptions::START_BIT, !framing.no_start);
    options.set(I2cTransferOptions::STOP_BIT, !framing.no_stop);
    options.set(I2cTransferOptions::FAST_TRANSFER, framing.fast);
    options
}

/// Open the channel in I2C mode and run one transaction
pub fn run<D: ChannelDriver>(
    channel: &mut Channel<D>,
    config: &I2cConfig,
    command: I2cCommands,
) -> CommandResult {
    channel.init_i2c(config)?;
    log::info!("I2C at {}", config.clock_rate);
    let mut bus = channel.i2c()?;

    match command {
        I2cCommands::Read {
            address,
            count,
            nack_last,
            output,
            framing,
        } => {
            let mut options = transfer_options(framing);
            options.set(I2cTransferOptions::NACK_LAST_BYTE, nack_last);

            let mut buf = vec![0u8; count];
            match bus.read(address, &mut buf, options) {
                Ok(n) => emit_output(&buf[..n], output.as_deref())?,
                Err(e) => {
                    let n = e.transferred();
                    log::warn!(
                        "Read from 0x{:02X} stopped after {} of {} bytes",
                        address,
                        n,
                        count
                    );
                    emit_output(&buf[..n], output.as_deref())?;
                    return Err(e.into());
                }
            }
        }
        I2cCommands::Write {
            address,
            input,
            break_on_nack,
            framing,
        } => {
            let mut options = transfer_options(framing);
            options.set(I2cTransferOptions::BREAK_ON_NACK, break_on_nack);

            let data = load_input(&input)?;
            let written = bus.write(address, &data, options)?;
            println!("Wrote {} bytes to 0x{:02X}", written, address);
        }
    }

    Ok(())
}
