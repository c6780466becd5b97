//! CLI command implementations
//!
//! Each protocol module initializes the channel for its protocol, runs one
//! transfer through the chunking engine and reports the result. Helpers
//! shared by both live here: device selection, hex input and output.

pub mod i2c;
pub mod spi;

use std::fs;
use std::path::Path;

use ftxfer_mpsse::{DeviceType, Interface, MpsseDriver, FTDI_VID};

use crate::cli::{DeviceArgs, InputArgs};
use crate::config::Config;

/// Result type shared by the commands
pub type CommandResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Build the device driver from the config file and command-line overrides
///
/// `--type` replaces the configured VID/PID with the FTDI defaults for
/// that chip; explicit `--vid`/`--pid` win over both.
pub fn build_driver(args: &DeviceArgs, config: &Config) -> CommandResult<MpsseDriver> {
    let letter = args.interface.unwrap_or(config.device.interface);
    let interface = Interface::from_char(letter)
        .ok_or_else(|| format!("Invalid interface '{}': must be A, B, C or D", letter))?;

    let (mut vid, mut pid) = (config.device.vid, config.device.pid);
    if let Some(name) = &args.device_type {
        let device_type = DeviceType::parse(name)
            .ok_or_else(|| format!("Unknown device type '{}' (232h, 2232h, 4232h)", name))?;
        // Validates the interface for this chip
        MpsseDriver::new(device_type, interface)?;
        vid = FTDI_VID;
        pid = device_type.product_id();
    }

    Ok(MpsseDriver::with_ids(
        args.vid.unwrap_or(vid),
        args.pid.unwrap_or(pid),
        interface,
    ))
}

/// Parse hex bytes such as "9f", "0x9f00" or "de:ad be-ef"
pub fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, String> {
    let digits: String = s
        .split(|c: char| c.is_whitespace() || matches!(c, ':' | ',' | '-'))
        .map(|tok| {
            tok.strip_prefix("0x")
                .or_else(|| tok.strip_prefix("0X"))
                .unwrap_or(tok)
        })
        .collect();

    if !digits.is_ascii() {
        return Err(format!("Non-hex characters in '{}'", s));
    }
    if digits.len() % 2 != 0 {
        return Err(format!("Odd number of hex digits in '{}'", s));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| format!("Invalid hex byte '{}'", &digits[i..i + 2]))
        })
        .collect()
}

/// Load the bytes to send
pub fn load_input(input: &InputArgs) -> CommandResult<Vec<u8>> {
    match (&input.data, &input.input) {
        (Some(hex), _) => Ok(parse_hex_bytes(hex)?),
        (None, Some(path)) => {
            let data = fs::read(path)?;
            println!("Read {} bytes from {:?}", data.len(), path);
            Ok(data)
        }
        (None, None) => Err("No input given: use --data or --input".into()),
    }
}

/// Format `data` as a hex dump, 16 bytes per line
pub fn hex_dump(data: &[u8]) -> String {
    let mut out = String::new();
    for (i, line) in data.chunks(16).enumerate() {
        let bytes: Vec<String> = line.iter().map(|b| format!("{:02x}", b)).collect();
        out.push_str(&format!("{:08x}: {}\n", i * 16, bytes.join(" ")));
    }
    out
}

/// Write received bytes to `output`, or dump them to stdout
pub fn emit_output(data: &[u8], output: Option<&Path>) -> CommandResult {
    match output {
        Some(path) => {
            fs::write(path, data)?;
            println!("Wrote {} bytes to {:?}", data.len(), path);
        }
        None => print!("{}", hex_dump(data)),
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_bytes() {
        assert_eq!(parse_hex_bytes("9f"), Ok(vec![0x9F]));
        assert_eq!(parse_hex_bytes("0xdead"), Ok(vec![0xDE, 0xAD]));
        assert_eq!(
            parse_hex_bytes("de:ad be-ef,00"),
            Ok(vec![0xDE, 0xAD, 0xBE, 0xEF, 0x00])
        );
        assert_eq!(parse_hex_bytes(""), Ok(vec![]));
        assert!(parse_hex_bytes("abc").is_err());
        assert!(parse_hex_bytes("zz").is_err());
    }

    #[test]
    fn test_parse_hex_bytes_rejects_non_ascii() {
        assert!(parse_hex_bytes("aé0").is_err());
        assert!(parse_hex_bytes("ééé").is_err());
        assert!(parse_hex_bytes("9f ü").is_err());
    }

    #[test]
    fn test_hex_dump() {
        let data: Vec<u8> = (0..18).collect();
        let dump = hex_dump(&data);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00000000: 00 01 02"));
        assert_eq!(lines[1], "00000010: 10 11");
    }

    #[test]
    fn test_build_driver_overrides() {
        let config = Config::default();
        let args = DeviceArgs {
            device_type: Some("2232h".into()),
            interface: Some('b'),
            ..Default::default()
        };
        let driver = build_driver(&args, &config).unwrap();
        assert_eq!(driver.product_id(), 0x6010);
        assert_eq!(driver.interface(), Interface::B);

        let args = DeviceArgs {
            vid: Some(0x1234),
            pid: Some(0x5678),
            ..Default::default()
        };
        let driver = build_driver(&args, &config).unwrap();
        assert_eq!((driver.vendor_id(), driver.product_id()), (0x1234, 0x5678));

        // FT232H has a single channel
        let args = DeviceArgs {
            device_type: Some("232h".into()),
            interface: Some('B'),
            ..Default::default()
        };
        assert!(build_driver(&args, &config).is_err());
    }
}
