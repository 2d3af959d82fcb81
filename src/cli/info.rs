use anyhow::{Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use super::command::{Cli, InfoArgs};
use crate::input::{CHUNK_SIZE, InputReader};
use crate::stream::StreamInfo;
use crate::timestamp::{samples_to_secs, time_str};
use iec61937::process::extract::{Extractor, Frame};
use iec61937::process::{Codec, DataType};
use iec61937::utils::errors::ExtractError;

pub fn cmd_info(args: &InfoArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    let codec = Codec::from(args.codec);
    log::info!("Analyzing {codec} stream: {}", args.input.display());

    let mut input_reader = InputReader::new(&args.input)?;
    let mut extractor = Extractor::new(codec);
    extractor.set_fail_level(cli.fail_level());

    let mut context = AnalysisContext::default();
    if let Some(multi) = multi {
        let pb = multi.add(ProgressBar::new_spinner());
        pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb.set_message("Analyzing frames...");
        context.pb = Some(pb);
    }

    input_reader.process_chunks(CHUNK_SIZE, |chunk| {
        context.total_bytes += chunk.len() as u64;
        extractor.push_bytes(chunk);
        context.drain(&mut extractor)?;
        Ok(true)
    })?;
    extractor.finish();
    context.drain(&mut extractor)?;
    context.extract_errors = extractor.error_count();

    if let Some(pb) = context.pb.take() {
        pb.finish_and_clear();
    }

    match &context.stream_info {
        Some(info) => display_summary(info, &context),
        None => {
            println!("No {codec} syncframe found in the file.");
            println!("This doesn't appear to be a valid {codec} stream.");
        }
    }

    Ok(())
}

#[derive(Default)]
struct AnalysisContext {
    stream_info: Option<StreamInfo>,
    frame_count: u64,
    total_samples: u64,
    total_bytes: u64,
    extract_errors: usize,
    /// Frames that differ in size from the first one.
    variable_size: bool,
    first_size: usize,
    pb: Option<ProgressBar>,
}

impl AnalysisContext {
    fn drain(&mut self, extractor: &mut Extractor) -> Result<()> {
        let codec = extractor.codec();
        for frame_result in extractor.by_ref() {
            match frame_result {
                Ok(frame) => self.process_frame(codec, &frame),
                Err(ExtractError::InsufficientData) => break,
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Corrupt frame after frame {}", self.frame_count));
                }
            }
        }
        Ok(())
    }

    fn process_frame(&mut self, codec: Codec, frame: &Frame) {
        if self.stream_info.is_none() {
            match StreamInfo::probe(codec, frame.as_ref()) {
                Ok(info) => {
                    self.first_size = frame.as_ref().len();
                    self.display_immediate_info(&info);
                    self.stream_info = Some(info);
                }
                Err(e) => log::warn!("Unreadable header at frame {}: {e}", self.frame_count),
            }
        } else if frame.as_ref().len() != self.first_size {
            self.variable_size = true;
        }

        self.frame_count += 1;
        self.total_samples += frame.sample_count as u64;

        if self.frame_count.is_multiple_of(100)
            && let Some(pb) = &self.pb
        {
            pb.set_message(format!("Analyzing frames...       {}", self.frame_count));
            pb.tick();
        }
    }

    fn display_immediate_info(&self, info: &StreamInfo) {
        match &self.pb {
            Some(pb) => pb.suspend(|| display_stream_info(info)),
            None => display_stream_info(info),
        }
    }
}

fn display_stream_info(info: &StreamInfo) {
    let title = format!("{} Stream Information", info.codec);
    println!();
    println!("{title}");
    println!("{}", "=".repeat(title.len()));
    println!();

    println!("Stream Information");
    println!("  Sampling rate             {} Hz", info.sample_rate);
    if let Some(channels) = info.channels {
        println!("  Channels                  {channels}");
    }
    if let Some(bitrate) = info.bitrate {
        println!("  Bitrate                   {} kbps", bitrate / 1000);
    }
    println!("  Samples per frame         {}", info.samples_per_frame);
    for (label, value) in &info.details {
        println!("  {label:<26}{value}");
    }
    println!();

    println!("IEC 61937 Encapsulation");
    println!(
        "  Burst data type           {} ({:#04X})",
        info.data_type,
        info.data_type.code()
    );
    if info.codec == Codec::Dts {
        println!("  Above 48 kHz              {}", DataType::DtsHd);
    }
    let (rate, channels) = StreamInfo::default_link(info.codec);
    println!("  Default link              {rate} Hz, {channels} channels");
    println!();
}

fn display_summary(info: &StreamInfo, context: &AnalysisContext) {
    println!("Analysis Summary");
    println!("  Frames processed          {}", context.frame_count);
    if context.extract_errors > 0 {
        println!("  Corrupt frames skipped    {}", context.extract_errors);
    }
    println!("  Variable frame size       {}", context.variable_size);

    let size_mb = context.total_bytes as f64 / 1_000_000.0;
    println!(
        "  Size                      {size_mb:.2} MB ({} bytes)",
        context.total_bytes
    );

    let duration_secs = samples_to_secs(context.total_samples, info.sample_rate);
    println!("  Duration                  {}", time_str(duration_secs));
    if duration_secs > 0.0 {
        let avg_data_rate_kbps = (context.total_bytes as f64 * 8.0) / (duration_secs * 1000.0);
        println!("  Average data rate         {avg_data_rate_kbps:.1} kbps");
    }

    println!();
}
