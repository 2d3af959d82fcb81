use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use iec61937::process::DataType;
use iec61937::process::encapsulate::EncapsulatorStats;

/// YAML summary written by `wrap --report`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct WrapReport {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub codec: String,
    pub burst_format: String,
    pub byte_order: String,
    pub output_rate: u32,
    pub channels: u16,
    pub frames_in: u64,
    pub packets_out: u64,
    pub frames_rejected: u64,
    /// Corrupt frames skipped while framing the input.
    pub extract_errors: usize,
    pub bytes_written: u64,
    pub packets_per_data_type: BTreeMap<String, u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<StreamDuration>,
}

#[derive(Debug, Serialize)]
pub struct StreamDuration {
    pub samples: u64,
    pub sample_rate: u32,
    pub time: String,
}

/// Packet counts per burst data type.
#[derive(Debug, Default)]
pub struct DataTypeCounter {
    counts: BTreeMap<DataType, u64>,
    unknown: u64,
}

impl DataTypeCounter {
    pub fn count(&mut self, data_type: Option<DataType>) {
        match data_type {
            Some(data_type) => *self.counts.entry(data_type).or_default() += 1,
            None => self.unknown += 1,
        }
    }

    pub fn to_map(&self) -> BTreeMap<String, u64> {
        let mut map: BTreeMap<String, u64> = self
            .counts
            .iter()
            .map(|(data_type, count)| (data_type.to_string(), *count))
            .collect();
        if self.unknown > 0 {
            map.insert("unknown".to_string(), self.unknown);
        }
        map
    }
}

impl WrapReport {
    pub fn apply_stats(&mut self, stats: EncapsulatorStats) {
        self.frames_in = stats.frames_in;
        self.packets_out = stats.packets_out;
        self.frames_rejected = stats.frames_rejected;
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_yaml()?)
            .with_context(|| format!("Failed to write report to {}", path.display()))
    }
}
