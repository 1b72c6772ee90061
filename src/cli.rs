//! CLI argument parsing

use crate::drivers;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a marker code: a number in 128..224 or one of the named codes
fn parse_marker_code(s: &str) -> Result<u8, String> {
    match s {
        "sor" | "start" => Ok(192),
        "eor" | "end" => Ok(193),
        "chunk" => Ok(223),
        _ => {
            let v = parse_hex_u32(s)?;
            if (128..224).contains(&v) {
                Ok(v as u8)
            } else {
                Err(format!("Marker code {} outside 128..224", v))
            }
        }
    }
}

/// Generate dynamic help text for the driver argument
fn driver_help() -> String {
    format!(
        "USB driver to use [available: {}]",
        drivers::driver_names_short()
    )
}

#[derive(Parser)]
#[command(name = "bsusb")]
#[command(author, version, about = "BioSemi USB trigger interface tools", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Driver and its options, e.g. ftdi:timeout=1000 or dummy:boxes=2
    #[arg(short, long, global = true, default_value = "ftdi", help = driver_help())]
    pub driver: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(flatten)]
    Boxes(BoxCommands),

    /// Toggle parallel port data lines between 0x00 and 0xFF
    Pulse {
        /// Parallel port back end and options, e.g. ppdev:dev=/dev/parport0
        #[arg(short, long, default_value = "direct:base=0x378")]
        port: String,

        /// Time the lines stay high, in microseconds
        #[arg(long, default_value = "1000")]
        high_us: u64,

        /// Time the lines stay low, in microseconds
        #[arg(long, default_value = "1000")]
        low_us: u64,

        /// Number of cycles (0 = until interrupted)
        #[arg(short, long, default_value = "0")]
        count: u64,
    },

    /// Probe legacy addresses for a parallel port
    ProbePort,

    /// List available parallel port back ends
    ListPorts,

    /// List available USB drivers
    ListDrivers,
}

/// Commands that talk to trigger boxes
#[derive(Subcommand)]
pub enum BoxCommands {
    /// List connected trigger boxes
    List,

    /// Send pseudo-random blocks to a box
    Send {
        /// Slot (position in the device list) to use
        #[arg(short, long, default_value = "0")]
        slot: usize,

        /// Generator seed
        #[arg(long, value_parser = parse_hex_u32, default_value = "0x01020304")]
        seed: u32,

        /// Bytes per block
        #[arg(short, long, default_value = "1")]
        length: usize,

        /// Number of blocks
        #[arg(short, long, default_value = "1")]
        blocks: usize,

        /// Parallel port to raise while each block is sent
        #[arg(short, long)]
        port: Option<String>,
    },

    /// Measure write throughput
    Stream {
        /// Slot to use
        #[arg(short, long, default_value = "0")]
        slot: usize,

        /// Number of bytes to write
        #[arg(short, long, default_value = "4096")]
        length: usize,
    },

    /// Read the data pins of a box
    Pins {
        /// Slot to use
        #[arg(short, long, default_value = "0")]
        slot: usize,
    },

    /// Send event markers to every connected box
    Mark {
        /// Marker code (128..224, or sor, eor, chunk)
        #[arg(short, long, value_parser = parse_marker_code, default_value = "chunk")]
        code: u8,

        /// Payload text (ASCII)
        #[arg(short, long, default_value = "")]
        text: String,

        /// Number of markers
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,

        /// Pause between markers, in milliseconds
        #[arg(short, long, default_value = "1000")]
        interval: u64,

        /// Record markers to a file instead of sending them
        #[arg(short, long)]
        record: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0x01020304").unwrap(), 0x01020304);
        assert_eq!(parse_hex_u32("42").unwrap(), 42);
        assert!(parse_hex_u32("0xzz").is_err());
    }

    #[test]
    fn test_parse_marker_code() {
        assert_eq!(parse_marker_code("sor").unwrap(), 192);
        assert_eq!(parse_marker_code("chunk").unwrap(), 223);
        assert_eq!(parse_marker_code("130").unwrap(), 130);
        assert_eq!(parse_marker_code("0xc1").unwrap(), 193);
        assert!(parse_marker_code("65").is_err());
        assert!(parse_marker_code("224").is_err());
    }

    #[test]
    fn test_cli_parses_box_command() {
        let cli = Cli::try_parse_from(["bsusb", "-d", "dummy:boxes=2", "send", "-l", "16"]).unwrap();
        assert_eq!(cli.driver, "dummy:boxes=2");
        match cli.command {
            Commands::Boxes(BoxCommands::Send {
                seed,
                length,
                blocks,
                ..
            }) => {
                assert_eq!(seed, 0x01020304);
                assert_eq!(length, 16);
                assert_eq!(blocks, 1);
            }
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn test_cli_verify() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
