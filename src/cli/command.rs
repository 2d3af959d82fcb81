use std::path::PathBuf;

use clap::{Args, Parser as ClapParser, Subcommand, ValueEnum};
use iec61937::process::{ByteOrder, Codec};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (iec61937 ",
    env!("IEC61937_VERSION"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")"
);

#[derive(Debug, ClapParser)]
#[command(
    name       = env!("CARGO_PKG_NAME"),
    version    = VERSION,
    author     = env!("CARGO_PKG_AUTHORS"),
    about      = "Wraps compressed audio bitstreams into IEC 61937 streams for S/PDIF and HDMI",
    long_about = None,
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

impl Cli {
    /// Severity at which validation problems abort the run.
    pub fn fail_level(&self) -> log::Level {
        if self.strict {
            log::Level::Warn
        } else {
            log::Level::Error
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Encapsulate an elementary stream into an IEC 61937 stream.
    Wrap(WrapArgs),

    /// Print stream information
    Info(InfoArgs),
}

#[derive(Debug, Args)]
pub struct WrapArgs {
    /// Input elementary stream (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Codec of the input stream.
    #[arg(long, value_enum)]
    pub codec: CodecArg,

    /// Output file (use "-" for stdout). Defaults to the input name with the
    /// extension of the output format.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Container of the output stream.
    #[arg(long, value_enum, default_value_t = OutputFormat::Raw)]
    pub format: OutputFormat,

    /// Byte order of the 16-bit words on the link.
    #[arg(long, value_enum, default_value_t = ByteOrderArg::Le)]
    pub byte_order: ByteOrderArg,

    /// Link sample rate in Hz. Defaults to 192000 for E-AC-3 and TrueHD, 48000
    /// otherwise. DTS above 48000 is sent as DTS-HD.
    #[arg(long, value_name = "HZ")]
    pub rate: Option<u32>,

    /// Link channel count. Defaults to 8 for TrueHD, 2 otherwise.
    #[arg(long, value_name = "N")]
    pub channels: Option<u16>,

    /// Write a YAML summary of the run.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Disable progress estimation
    #[arg(long)]
    pub no_estimate_progress: bool,
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Input elementary stream (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Codec of the input stream.
    #[arg(long, value_enum)]
    pub codec: CodecArg,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum CodecArg {
    /// Dolby Digital.
    Ac3,
    /// Dolby Digital Plus.
    Eac3,
    /// DTS core, with DTS-HD substreams when present.
    Dts,
    /// Dolby TrueHD.
    Truehd,
    /// Meridian Lossless Packing.
    Mlp,
}

impl From<CodecArg> for Codec {
    fn from(value: CodecArg) -> Self {
        match value {
            CodecArg::Ac3 => Codec::Ac3,
            CodecArg::Eac3 => Codec::Eac3,
            CodecArg::Dts => Codec::Dts,
            CodecArg::Truehd => Codec::TrueHd,
            CodecArg::Mlp => Codec::Mlp,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ByteOrderArg {
    /// Little-endian words (SPDIFL).
    Le,
    /// Big-endian words (SPDIFB).
    Be,
}

impl From<ByteOrderArg> for ByteOrder {
    fn from(value: ByteOrderArg) -> Self {
        ByteOrder::from_big_endian(value == ByteOrderArg::Be)
    }
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

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Bare IEC 61937 stream.
    Raw,
    /// 16-bit PCM RIFF/WAVE (little-endian links only).
    Wav,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Raw => "spdif",
            OutputFormat::Wav => "wav",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_arguments() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "spdifd",
            "--strict",
            "wrap",
            "in.thd",
            "--codec",
            "truehd",
            "--byte-order",
            "be",
            "--rate",
            "192000",
        ])?;

        assert_eq!(cli.fail_level(), log::Level::Warn);
        let Commands::Wrap(args) = cli.command else {
            anyhow::bail!("expected wrap");
        };
        assert_eq!(Codec::from(args.codec), Codec::TrueHd);
        assert_eq!(ByteOrder::from(args.byte_order), ByteOrder::Big);
        assert_eq!(args.rate, Some(192_000));
        assert_eq!(args.format, OutputFormat::Raw);
        assert!(args.channels.is_none());
        Ok(())
    }

    #[test]
    fn codec_is_required() {
        assert!(Cli::try_parse_from(["spdifd", "info", "in.ac3"]).is_err());
        assert!(Cli::try_parse_from(["spdifd", "info", "in.ac3", "--codec", "ac3"]).is_ok());
    }
}
