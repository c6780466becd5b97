//! `ftxfer spi` command

use ftxfer_core::{Channel, ChannelDriver, SpiConfig, SpiTransferOptions};

use super::{emit_output, load_input, CommandResult};
use crate::cli::{SpiCommands, SpiFramingArgs};

/// Chip-select options for one logical transfer
fn transfer_options(framing: SpiFramingArgs) -> SpiTransferOptions {
    let mut options = SpiTransferOptions::FRAMED;
    options.set(SpiTransferOptions::CHIP_SELECT_ENABLE, !framing.no_assert);
    options.set(SpiTransferOptions::CHIP_SELECT_DISABLE, !framing.no_deassert);
    options
}

/// Open the channel in SPI mode and run one transfer
pub fn run<D: ChannelDriver>(
    channel: &mut Channel<D>,
    config: &SpiConfig,
    command: SpiCommands,
) -> CommandResult {
    channel.init_spi(config)?;
    log::info!(
        "SPI mode {} at {} Hz, CS on ADBUS{}",
        config.mode.number(),
        config.clock_rate,
        config.chip_select.pin()
    );
    let mut bus = channel.spi()?;

    match command {
        SpiCommands::Write { input, framing } => {
            let data = load_input(&input)?;
            let written = bus.write(&data, transfer_options(framing))?;
            println!("Wrote {} bytes", written);
        }
        SpiCommands::Read {
            count,
            output,
            framing,
        } => {
            let mut buf = vec![0u8; count];
            match bus.read(&mut buf, transfer_options(framing)) {
                Ok(n) => emit_output(&buf[..n], output.as_deref())?,
                Err(e) => {
                    let n = e.transferred();
                    log::warn!("Read stopped after {} of {} bytes", n, count);
                    emit_output(&buf[..n], output.as_deref())?;
                    return Err(e.into());
                }
            }
        }
        SpiCommands::Swap {
            input,
            output,
            framing,
        } => {
            let send = load_input(&input)?;
            let mut recv = vec![0u8; send.len()];
            match bus.swap(&send, &mut recv, transfer_options(framing)) {
                Ok(n) => emit_output(&recv[..n], output.as_deref())?,
                Err(e) => {
                    let n = e.transferred();
                    log::warn!("Swap stopped after {} of {} bytes", n, send.len());
                    emit_output(&recv[..n], output.as_deref())?;
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}
