use std::path::PathBuf;

use clap::{Args, Parser as ClapParser, Subcommand, ValueEnum};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_DESCRIBE"),
    ")\nvideots ",
    env!("VIDEOTS_VERSION"),
    "\nbuilt ",
    env!("BUILD_TIMESTAMP"),
);

#[derive(Debug, ClapParser)]
#[command(
    name         = env!("CARGO_PKG_NAME"),
    version      = env!("CARGO_PKG_VERSION"),
    long_version = LONG_VERSION,
    about        = "Tools for inspecting DVD-Video navigation data and recovering CSS title keys",
    long_about   = None,
)]
pub struct Cli {
    /// Set the log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// Treat warnings as fatal errors (fail on first warning).
    #[arg(long, global = true)]
    pub strict: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Show progress bars during operations.
    #[arg(long, global = true)]
    pub progress: bool,

    /// Choose an operation to perform.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the video manager and title set information of a disc image.
    Info(InfoArgs),

    /// Recover the title key of a scrambled title.
    Crack(CrackArgs),

    /// Write a descrambled copy of a disc image or VOB file.
    Descramble(DescrambleArgs),
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Disc image.
    #[arg(value_name = "IMAGE")]
    pub input: PathBuf,

    /// Sector of VIDEO_TS.IFO in the image.
    #[arg(long, value_name = "SECTOR", default_value_t = 0)]
    pub ifo_sector: u64,

    /// Also parse the title set holding this title.
    #[arg(long, value_name = "TITLE")]
    pub title: Option<u16>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Where the scrambled title starts.
#[derive(Debug, Args)]
pub struct TitleArgs {
    /// First sector of the title VOBs.
    #[arg(long, value_name = "SECTOR", conflicts_with = "title")]
    pub start_sector: Option<u64>,

    /// Title number, located through VIDEO_TS.IFO.
    #[arg(long, value_name = "TITLE")]
    pub title: Option<u16>,

    /// Sector of VIDEO_TS.IFO in the image.
    #[arg(long, value_name = "SECTOR", default_value_t = 0)]
    pub ifo_sector: u64,
}

#[derive(Debug, Args)]
pub struct CrackArgs {
    /// Disc image or VOB file.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    #[command(flatten)]
    pub target: TitleArgs,

    /// Number of sectors that must agree on a key before it is accepted.
    #[arg(long, value_name = "COUNT", default_value_t = 1)]
    pub confirm: usize,

    /// Stop scanning after this many sectors.
    #[arg(long, value_name = "COUNT")]
    pub max_sectors: Option<u64>,
}

#[derive(Debug, Args)]
pub struct DescrambleArgs {
    /// Disc image or VOB file (use "-" for stdin, requires --key).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output file.
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Title key as 10 hex digits, recovered from the input when omitted.
    #[arg(long, value_name = "HEX", value_parser = parse_key)]
    pub key: Option<[u8; 5]>,

    #[command(flatten)]
    pub target: TitleArgs,

    /// Number of sectors that must agree on a key before it is accepted.
    #[arg(long, value_name = "COUNT", default_value_t = 1)]
    pub confirm: usize,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    /// Disable logging output.
    Off,
    /// No output except errors.
    Error,
    /// Show warnings and errors.
    Warn,
    /// Show info, warnings and errors (default).
    Info,
    /// Show debug, info, warnings and errors.
    Debug,
    /// Show all log messages including trace.
    Trace,
}

impl LogLevel {
    /// Convert LogLevel to log::LevelFilter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Colorized human-readable text.
    Plain,
    /// Structured JSON per log record.
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum OutputFormat {
    /// Aligned human-readable text.
    Text,
    /// YAML document.
    Yaml,
}

/// Parses a 40-bit key written as 10 hex digits, with optional `:` or space
/// separators.
pub fn parse_key(s: &str) -> Result<[u8; 5], String> {
    let digits: String = s.chars().filter(|c| !matches!(c, ':' | ' ')).collect();
    if digits.len() != 10 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("expected 10 hex digits, got {s:?}"));
    }

    let mut key = [0u8; 5];
    for (i, byte) in key.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&digits[2 * i..2 * i + 2], 16).map_err(|e| e.to_string())?;
    }
    Ok(key)
}

pub fn format_key(key: &[u8; 5]) -> String {
    key.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_round_trip() {
        let key = parse_key("0a:1B:2c:3D:4e").unwrap();
        assert_eq!(key, [0x0A, 0x1B, 0x2C, 0x3D, 0x4E]);
        assert_eq!(format_key(&key), "0A:1B:2C:3D:4E");
        assert_eq!(parse_key("0A1B2C3D4E"), Ok(key));
    }

    #[test]
    fn bad_keys() {
        assert!(parse_key("0A1B2C3D").is_err());
        assert!(parse_key("0A1B2C3DZZ").is_err());
        assert!(parse_key("é0A1B2C3D").is_err());
    }
}
