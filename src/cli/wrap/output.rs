use crate::wav::{FormatChunk, WavWriter};
use anyhow::{Result, bail};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use iec61937::process::StreamConfig;

use super::super::command::OutputFormat;

/// Where the IEC 61937 stream goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

impl OutputTarget {
    /// Picks the output from `--output`, or derives it from the input name.
    pub fn resolve(input: &Path, output: Option<&Path>, format: OutputFormat) -> Result<Self> {
        let target = match output {
            Some(path) if path.as_os_str() == "-" => OutputTarget::Stdout,
            Some(path) => OutputTarget::File(path.to_path_buf()),
            None if input.as_os_str() == "-" => OutputTarget::Stdout,
            None => {
                let path = create_path_with_extension(input, format.extension());
                if path == input {
                    bail!(
                        "Output would overwrite the input {}, pass --output",
                        input.display()
                    );
                }
                OutputTarget::File(path)
            }
        };

        if target == OutputTarget::Stdout && format == OutputFormat::Wav {
            bail!("WAVE output needs a seekable file, pass --output PATH");
        }
        Ok(target)
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            OutputTarget::Stdout => None,
            OutputTarget::File(path) => Some(path),
        }
    }
}

impl std::fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputTarget::Stdout => write!(f, "<stdout>"),
            OutputTarget::File(path) => write!(f, "{}", path.display()),
        }
    }
}

pub fn create_path_with_extension(base_path: &Path, expected_ext: &str) -> PathBuf {
    if base_path.extension().is_some_and(|ext| ext == expected_ext) {
        return base_path.to_path_buf();
    }
    let mut path = base_path.to_path_buf();
    path.set_extension(expected_ext);
    path
}

pub enum PacketSink {
    Raw(BufWriter<Box<dyn Write>>),
    Wav(WavWriter<File>),
}

impl PacketSink {
    pub fn create(
        target: &OutputTarget,
        format: OutputFormat,
        config: &StreamConfig,
        channels: u16,
    ) -> Result<Self> {
        Ok(match (target, format) {
            (OutputTarget::Stdout, OutputFormat::Raw) => {
                PacketSink::Raw(BufWriter::new(Box::new(io::stdout().lock())))
            }
            (OutputTarget::File(path), OutputFormat::Raw) => {
                PacketSink::Raw(BufWriter::new(Box::new(File::create(path)?)))
            }
            (OutputTarget::File(path), OutputFormat::Wav) => {
                let format = FormatChunk::pcm16(config.output_rate, channels);
                let alignment = config.burst_alignment();
                if !format.fits_bursts(alignment) {
                    bail!(
                        "{} bursts of {alignment} bytes do not fit {channels} channel WAVE frames",
                        config.codec
                    );
                }
                PacketSink::Wav(WavWriter::new(File::create(path)?, format, alignment)?)
            }
            (OutputTarget::Stdout, OutputFormat::Wav) => {
                bail!("WAVE output needs a seekable file")
            }
        })
    }

    pub fn write_packet(&mut self, data: &[u8]) -> Result<()> {
        match self {
            PacketSink::Raw(writer) => writer.write_all(data)?,
            PacketSink::Wav(writer) => writer.write_data(data)?,
        }
        Ok(())
    }

    pub fn finish(&mut self) -> Result<()> {
        match self {
            PacketSink::Raw(writer) => writer.flush()?,
            PacketSink::Wav(writer) => {
                writer.finish()?;
                log::debug!("WAVE data chunk of {} bytes", writer.data_written());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_paths() -> Result<()> {
        let input = Path::new("movie/track.eac3");
        assert_eq!(
            OutputTarget::resolve(input, None, OutputFormat::Raw)?,
            OutputTarget::File(PathBuf::from("movie/track.spdif"))
        );
        assert_eq!(
            OutputTarget::resolve(input, None, OutputFormat::Wav)?,
            OutputTarget::File(PathBuf::from("movie/track.wav"))
        );
        assert_eq!(
            OutputTarget::resolve(input, Some(Path::new("-")), OutputFormat::Raw)?,
            OutputTarget::Stdout
        );
        assert_eq!(
            OutputTarget::resolve(Path::new("-"), None, OutputFormat::Raw)?,
            OutputTarget::Stdout
        );
        Ok(())
    }

    #[test]
    fn wav_layout_is_checked_before_creating_the_file() {
        let path = std::env::temp_dir().join(format!("spdifd-layout-{}.wav", std::process::id()));
        let target = OutputTarget::File(path.clone());
        let config = StreamConfig::new(iec61937::process::Codec::Dts);

        assert!(PacketSink::create(&target, OutputFormat::Wav, &config, 6).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn rejected_outputs() {
        assert!(OutputTarget::resolve(Path::new("a.spdif"), None, OutputFormat::Raw).is_err());
        assert!(OutputTarget::resolve(Path::new("-"), None, OutputFormat::Wav).is_err());
    }
}
