use anyhow::Result;

use iec61937::process::{Codec, DataType, dts};
use iec61937::structs::a52::{A52Header, A52Kind, Eac3StreamType};
use iec61937::structs::dts::{DtsHeader, DtsSyncType};
use iec61937::structs::mlp::{AccessUnitHeader, SyncInfo, major_sync_substreams};

/// Stream parameters read from a syncframe header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub codec: Codec,
    pub sample_rate: u32,
    pub channels: Option<u8>,
    pub samples_per_frame: u32,
    pub bitrate: Option<u32>,
    pub details: Vec<(&'static str, String)>,
    /// Burst type on a 48 kHz link.
    pub data_type: DataType,
}

impl StreamInfo {
    /// Reads the parameters from the first frame of a stream.
    ///
    /// TrueHD needs a major sync access unit.
    pub fn probe(codec: Codec, frame: &[u8]) -> Result<Self> {
        match codec {
            Codec::Ac3 | Codec::Eac3 => Self::from_a52(codec, frame),
            Codec::Dts => Self::from_dts(frame),
            Codec::TrueHd | Codec::Mlp => Self::from_mlp(codec, frame),
        }
    }

    fn from_a52(codec: Codec, frame: &[u8]) -> Result<Self> {
        let header = A52Header::parse(frame)?;
        let mut details = vec![("Bitstream ID", header.bsid.to_string())];

        match header.kind {
            A52Kind::Ac3 => details.push(("Bitstream mode", header.bsmod.to_string())),
            A52Kind::Eac3 {
                stream_type,
                substream_id,
            } => {
                let stream_type = match stream_type {
                    Eac3StreamType::Independent => "independent",
                    Eac3StreamType::Dependent => "dependent",
                    Eac3StreamType::Ac3Convert => "AC-3 convertible",
                };
                details.push(("Stream type", stream_type.to_string()));
                details.push(("Substream ID", substream_id.to_string()));
                if frame.len() > header.frame_size {
                    details.push((
                        "Dependent substream",
                        format!("{} bytes", frame.len() - header.frame_size),
                    ));
                }
            }
        }

        Ok(Self {
            codec,
            sample_rate: header.sample_rate,
            channels: Some(header.channels()),
            samples_per_frame: header.samples,
            bitrate: Some(header.bitrate),
            details,
            data_type: match codec {
                Codec::Ac3 => DataType::Ac3,
                _ => DataType::Eac3,
            },
        })
    }

    fn from_dts(frame: &[u8]) -> Result<Self> {
        let header = DtsHeader::parse(frame)?;
        let packing = match header.sync {
            DtsSyncType::Core16BitBe => "16-bit big-endian",
            DtsSyncType::Core16BitLe => "16-bit little-endian",
            DtsSyncType::Core14BitBe => "14-bit big-endian",
            DtsSyncType::Core14BitLe => "14-bit little-endian",
            DtsSyncType::Substream => "substream",
        };
        let mut details = vec![
            ("Word packing", packing.to_string()),
            ("Core size", format!("{} bytes", header.frame_size)),
        ];
        if frame.len() > header.frame_size {
            details.push((
                "Extension substream",
                format!("{} bytes", frame.len() - header.frame_size),
            ));
        }

        Ok(Self {
            codec: Codec::Dts,
            sample_rate: header.sample_rate,
            channels: Some(header.channels()),
            samples_per_frame: header.frame_length,
            bitrate: None,
            details,
            data_type: dts::data_type_for(header.frame_length)?,
        })
    }

    fn from_mlp(codec: Codec, frame: &[u8]) -> Result<Self> {
        let header = AccessUnitHeader::parse(frame)?;
        let major = match header.sync {
            SyncInfo::Major(major) => major,
            SyncInfo::Minor => anyhow::bail!("Stream does not start with a major sync"),
            SyncInfo::UnknownFormat(format) => {
                anyhow::bail!("Unknown major sync format byte {format:#04X}")
            }
        };
        let Some(sample_rate) = major.sampling_frequency() else {
            anyhow::bail!("Reserved sampling frequency code {}", major.ratebits);
        };

        let mut details = vec![("Format sync", format!("{:08X}", major.format_sync))];
        if let Some(substreams) = major_sync_substreams(frame) {
            details.push(("Number of substreams", substreams.to_string()));
        }

        Ok(Self {
            codec,
            sample_rate,
            channels: None,
            samples_per_frame: major.samples_per_au(),
            bitrate: None,
            details,
            data_type: DataType::TrueHd,
        })
    }

    /// Link parameters used when none are given: rate and channel count of the
    /// 16-bit PCM stream the bursts travel in.
    pub fn default_link(codec: Codec) -> (u32, u16) {
        match codec {
            Codec::Ac3 | Codec::Dts => (48_000, 2),
            Codec::Eac3 => (192_000, 2),
            Codec::TrueHd | Codec::Mlp => (192_000, 8),
        }
    }
}
