use crate::EmulatorConfig;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
pub struct Args {
    /// Path to a raw flash image. The first two words must be the initial
    /// stack pointer and the reset vector.
    #[arg(required_unless_present = "list_devices")]
    pub firmware: Option<PathBuf>,

    /// Stop when PC reaches this address (hex: 0x1234 or decimal: 1234)
    #[arg(long, value_parser = parse_hex_or_dec)]
    pub stop_pc: Option<u64>,

    /// Stop after this many instructions
    #[arg(long, short = 'i')]
    pub max_instructions: Option<u64>,

    /// Give up after this many milliseconds of wall-clock time
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Print the registered device types and the board layout, then exit
    #[arg(long)]
    pub list_devices: bool,
}

impl Args {
    /// Validate that the arguments are consistent
    pub fn validate(&self) -> Result<(), String> {
        if let Some(pc) = self.stop_pc
            && pc & 1 != 0
        {
            return Err(format!(
                "--stop-pc {:#X} must be a halfword-aligned instruction address (drop the Thumb bit)",
                pc
            ));
        }
        if self.max_instructions == Some(0) {
            return Err("--max-instructions must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Convert Args to EmulatorConfig
    pub fn to_emulator_config(&self) -> EmulatorConfig {
        EmulatorConfig {
            stop_pc: self.stop_pc,
            max_instructions: self.max_instructions.map(|v| v as usize),
            timeout_ms: self.timeout_ms,
        }
    }
}

pub fn parse_hex_or_dec(s: &str) -> Result<u64, std::num::ParseIntError> {
    if let Some(hex) = s.strip_prefix("0x") {
        u64::from_str_radix(hex, 16)
    } else {
        s.parse()
    }
}

/// Load the firmware image named on the command line
pub fn load_firmware_data(args: &Args) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    use tracing::info;

    let path = args.firmware.as_ref().ok_or("no firmware image given")?;
    info!("Loading firmware from file: {:?}", path);
    let data = std::fs::read(path)?;
    info!("Loaded {} bytes", data.len());
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_and_decimal() {
        assert_eq!(parse_hex_or_dec("0x08000100"), Ok(0x0800_0100));
        assert_eq!(parse_hex_or_dec("256"), Ok(256));
        assert!(parse_hex_or_dec("0xZZ").is_err());
    }

    #[test]
    fn firmware_required_unless_listing() {
        assert!(Args::try_parse_from(["stm32emu-cli"]).is_err());

        let args = Args::try_parse_from(["stm32emu-cli", "--list-devices"]).unwrap();
        assert!(args.list_devices);
        assert!(args.firmware.is_none());
    }

    #[test]
    fn builds_config() {
        let args = Args::try_parse_from([
            "stm32emu-cli",
            "fw.bin",
            "--stop-pc",
            "0x0800000E",
            "-i",
            "1000",
            "--timeout-ms",
            "50",
        ])
        .unwrap();
        args.validate().unwrap();

        let config = args.to_emulator_config();
        assert_eq!(config.stop_pc, Some(0x0800_000E));
        assert_eq!(config.max_instructions, Some(1000));
        assert_eq!(config.timeout_ms, Some(50));
    }

    #[test]
    fn rejects_thumb_bit_in_stop_pc() {
        let args = Args::try_parse_from(["stm32emu-cli", "fw.bin", "--stop-pc", "0x08000009"])
            .unwrap();
        assert!(args.validate().is_err());
    }
}
