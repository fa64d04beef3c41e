use std::fs;
use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use navlink_frame::{FieldWidth, FletcherWidth, FrameConfig, VerifierKind};
use navlink_protocols::{onboard_logs, rover_terminal};

use crate::exit::{io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod checksum;
pub mod decode;
pub mod encode;
pub mod layout;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode a captured link stream or log file.
    Decode(DecodeArgs),
    /// Build one frame from a payload.
    Encode(EncodeArgs),
    /// Compute a checksum or CRC over some bytes.
    Checksum(ChecksumArgs),
    /// Show the frame layout of a protocol.
    Layout(LayoutArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Decode(args) => decode::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Checksum(args) => checksum::run(args, format),
        Command::Layout(args) => layout::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Protocol {
    /// Rover to terminal radio link.
    RoverTerminal,
    /// Onboard log files.
    OnboardLogs,
}

impl Protocol {
    pub fn config(self) -> FrameConfig {
        match self {
            Protocol::RoverTerminal => rover_terminal::config(),
            Protocol::OnboardLogs => onboard_logs::config(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Protocol::RoverTerminal => "rover-terminal",
            Protocol::OnboardLogs => "onboard-logs",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum VerifierArg {
    Fletcher16,
    Fletcher32,
    Crc8,
    Crc16,
    Crc32,
}

impl VerifierArg {
    /// Verifier with `polynomial`, or the usual one for the CRC width.
    pub fn kind(self, polynomial: Option<u32>) -> CliResult<VerifierKind> {
        let crc = |width: FieldWidth, default: u32| -> CliResult<VerifierKind> {
            let polynomial = polynomial.unwrap_or(default);
            if polynomial > width.max_value() {
                return Err(CliError::new(
                    USAGE,
                    format!(
                        "polynomial 0x{polynomial:X} does not fit a {}-bit CRC",
                        width.bits()
                    ),
                ));
            }
            Ok(VerifierKind::Crc { width, polynomial })
        };

        match self {
            VerifierArg::Fletcher16 | VerifierArg::Fletcher32 if polynomial.is_some() => Err(
                CliError::new(USAGE, "--polynomial only applies to CRC verifiers"),
            ),
            VerifierArg::Fletcher16 => Ok(VerifierKind::Fletcher(FletcherWidth::Bits16)),
            VerifierArg::Fletcher32 => Ok(VerifierKind::Fletcher(FletcherWidth::Bits32)),
            VerifierArg::Crc8 => crc(FieldWidth::U8, 0x07),
            VerifierArg::Crc16 => crc(FieldWidth::U16, 0x1021),
            VerifierArg::Crc32 => crc(FieldWidth::U32, 0x04C1_1DB7),
        }
    }
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Capture or log file to read (`-` for stdin).
    pub path: PathBuf,
    /// Protocol the stream was written with.
    #[arg(long, short = 'p')]
    pub protocol: Protocol,
    /// Exit with status 60 if any frame was aborted.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Protocol to frame the payload for.
    #[arg(long, short = 'p')]
    pub protocol: Protocol,
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// Sub-message id (rover-terminal) or record type (onboard-logs), e.g. 0x43.
    #[arg(long, value_parser = parse_number)]
    pub id: Option<u32>,
    /// Write the frame to a file instead of stdout.
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ChecksumArgs {
    /// Algorithm to run.
    #[arg(long)]
    pub verifier: VerifierArg,
    /// CRC polynomial (decimal or 0x-prefixed hex).
    #[arg(long, value_parser = parse_number)]
    pub polynomial: Option<u32>,
    #[command(flatten)]
    pub payload: PayloadArgs,
}

#[derive(Args, Debug)]
pub struct LayoutArgs {
    #[arg(long, short = 'p')]
    pub protocol: Protocol,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Exactly one payload source.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct PayloadArgs {
    /// Raw string payload.
    #[arg(long)]
    pub data: Option<String>,
    /// Hex-encoded payload.
    #[arg(long)]
    pub hex: Option<String>,
    /// Read payload from file.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

impl PayloadArgs {
    pub fn resolve(&self) -> CliResult<Vec<u8>> {
        if let Some(data) = &self.data {
            return Ok(data.as_bytes().to_vec());
        }
        if let Some(text) = &self.hex {
            let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            return hex::decode(compact)
                .map_err(|err| CliError::new(USAGE, format!("--hex is not valid hex: {err}")));
        }
        if let Some(path) = &self.file {
            return fs::read(path)
                .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
        }
        Ok(Vec::new())
    }
}

fn parse_number(input: &str) -> Result<u32, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|err| format!("invalid number {input:?}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_number_accepts_hex_and_decimal() {
        assert_eq!(parse_number("0x1021"), Ok(0x1021));
        assert_eq!(parse_number("0XFF"), Ok(0xFF));
        assert_eq!(parse_number("67"), Ok(67));
        assert!(parse_number("0xZZ").is_err());
        assert!(parse_number("").is_err());
    }

    #[test]
    fn crc_defaults_per_width() {
        assert_eq!(
            VerifierArg::Crc16.kind(None).unwrap(),
            VerifierKind::Crc {
                width: FieldWidth::U16,
                polynomial: 0x1021
            }
        );
        assert_eq!(
            VerifierArg::Crc8.kind(Some(0x31)).unwrap(),
            VerifierKind::Crc {
                width: FieldWidth::U8,
                polynomial: 0x31
            }
        );
    }

    #[test]
    fn polynomial_must_fit_width() {
        let err = VerifierArg::Crc8.kind(Some(0x1021)).unwrap_err();
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn fletcher_rejects_polynomial() {
        assert!(VerifierArg::Fletcher32.kind(Some(7)).is_err());
    }

    #[test]
    fn hex_payload_ignores_whitespace() {
        let args = PayloadArgs {
            data: None,
            hex: Some("03 02 6f6b".to_string()),
            file: None,
        };
        assert_eq!(args.resolve().unwrap(), vec![0x03, 0x02, b'o', b'k']);
    }
}
