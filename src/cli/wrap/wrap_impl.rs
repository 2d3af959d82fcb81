use super::output::{OutputTarget, PacketSink};
use super::progress::{create_progress_bar, estimate_total_frames, finalize_progress_bar};
use super::wrap_thread::{WrapSummary, WrapThreadConfig, spawn_wrap_thread};
use crate::cli::command::{Cli, OutputFormat, WrapArgs};
use crate::report::{DataTypeCounter, StreamDuration, WrapReport};
use crate::stream::StreamInfo;
use crate::timestamp::{samples_to_secs, time_str};
use anyhow::{Result, bail};
use indicatif::MultiProgress;
use std::sync::mpsc;

use iec61937::process::encapsulate::Encapsulator;
use iec61937::process::extract::Extractor;
use iec61937::process::{ByteOrder, Codec, StreamConfig};

pub fn cmd_wrap(args: &WrapArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    let codec = Codec::from(args.codec);
    let byte_order = ByteOrder::from(args.byte_order);
    let (default_rate, default_channels) = StreamInfo::default_link(codec);
    let rate = args.rate.unwrap_or(default_rate);
    let channels = args.channels.unwrap_or(default_channels);

    if channels == 0 || channels % 2 != 0 {
        bail!("Link channel count must be a non-zero even number, got {channels}");
    }
    if args.format == OutputFormat::Wav && byte_order == ByteOrder::Big {
        bail!("WAVE output carries little-endian words only, use --byte-order le");
    }

    let config = StreamConfig::new(codec)
        .with_byte_order(byte_order)
        .with_output_rate(rate)
        .with_bytes_per_frame(channels as u32 * 2)
        .with_fail_level(cli.fail_level());
    let encapsulator = Encapsulator::new(config)?;

    let target = OutputTarget::resolve(&args.input, args.output.as_deref(), args.format)?;
    log::info!(
        "Wrapping {codec} stream: {} -> {target} ({} bursts, {byte_order}, {rate} Hz, {channels} channels, strict mode: {})",
        args.input.display(),
        encapsulator.burst_format(),
        cli.strict
    );
    let mut sink = PacketSink::create(&target, args.format, &config, channels)?;

    let is_pipe = args.input.as_os_str() == "-";
    let should_estimate = !args.no_estimate_progress && !is_pipe && multi.is_some();
    let total_frames = if should_estimate {
        Some(estimate_total_frames(&args.input, codec)?)
    } else {
        if is_pipe {
            log::debug!("Skipping progress estimation for pipe input");
        } else if args.no_estimate_progress {
            log::debug!("Progress estimation disabled by --no-estimate-progress flag");
        }
        None
    };

    let pb = match multi {
        Some(multi) => Some(create_progress_bar(multi, total_frames)?),
        None => None,
    };

    let mut extractor = Extractor::new(codec);
    extractor.set_fail_level(cli.fail_level());

    let (tx, rx) = mpsc::channel();
    let wrap_thread = spawn_wrap_thread(WrapThreadConfig {
        input_path: args.input.clone(),
        strict_mode: cli.strict,
        tx,
        pb_clone: pb.clone(),
        extractor,
        encapsulator,
    });

    let start_time = std::time::Instant::now();
    let mut data_types = DataTypeCounter::default();
    let mut bytes_written = 0u64;

    if let Some(pb) = &pb {
        pb.set_message("encapsulating");
    }
    while let Ok(packet) = rx.recv() {
        data_types.count(packet.kind());
        sink.write_packet(&packet.data)?;
        bytes_written += packet.len() as u64;
    }

    let summary = match wrap_thread.join() {
        Ok(Ok(summary)) => summary,
        Ok(Err(e)) => {
            if let Some(pb) = pb {
                pb.finish_with_message("wrap failed");
            }
            return Err(e);
        }
        Err(_) => {
            if let Some(pb) = pb {
                pb.finish_with_message("wrap thread panicked");
            }
            bail!("Wrap thread panicked");
        }
    };
    sink.finish()?;

    let duration = summary.counters.stream_info.as_ref().map(|info| {
        let secs = samples_to_secs(summary.counters.samples, info.sample_rate);
        StreamDuration {
            samples: summary.counters.samples,
            sample_rate: info.sample_rate,
            time: time_str(secs),
        }
    });

    if let Some(pb) = &pb {
        let secs = duration
            .as_ref()
            .map_or(0.0, |d| samples_to_secs(d.samples, d.sample_rate));
        finalize_progress_bar(pb, total_frames.is_some(), secs, start_time);
    }

    if summary.stats.frames_rejected > 0 || summary.extract_errors > 0 {
        log::warn!(
            "{} frames rejected by the encapsulator, {} corrupt frames skipped",
            summary.stats.frames_rejected,
            summary.extract_errors
        );
    }
    log::info!(
        "Wrote {} bursts ({bytes_written} bytes) to {target}",
        summary.stats.packets_out
    );

    if let Some(report_path) = &args.report {
        let report = build_report(args, &target, &summary, data_types, bytes_written, duration);
        report.write(report_path)?;
        log::info!("Report written to {}", report_path.display());
    }

    Ok(())
}

fn build_report(
    args: &WrapArgs,
    target: &OutputTarget,
    summary: &WrapSummary,
    data_types: DataTypeCounter,
    bytes_written: u64,
    duration: Option<StreamDuration>,
) -> WrapReport {
    let codec = Codec::from(args.codec);
    let (default_rate, default_channels) = StreamInfo::default_link(codec);

    let mut report = WrapReport {
        input: args.input.clone(),
        output: target.path().map(|p| p.to_path_buf()),
        codec: codec.to_string(),
        burst_format: summary.burst_format.to_string(),
        byte_order: ByteOrder::from(args.byte_order).to_string(),
        output_rate: args.rate.unwrap_or(default_rate),
        channels: args.channels.unwrap_or(default_channels),
        frames_in: 0,
        packets_out: 0,
        frames_rejected: 0,
        extract_errors: summary.extract_errors,
        bytes_written,
        packets_per_data_type: data_types.to_map(),
        duration,
    };
    report.apply_stats(summary.stats);
    report
}
