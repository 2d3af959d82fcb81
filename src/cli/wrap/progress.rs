use crate::input::{CHUNK_SIZE, InputReader};
use anyhow::Result;
use iec61937::process::Codec;
use iec61937::process::extract::Extractor;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::Path;

const BAR_TEMPLATE: &str =
    "{bar:40.cyan/blue} {pos}/{len} frames ({percent}%)\n{msg} | elapsed: {elapsed_precise}";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {pos} frames\n{msg} | elapsed: {elapsed_precise}";

/// Counts the frames of a file in a separate pass.
pub fn estimate_total_frames(input_path: &Path, codec: Codec) -> Result<u64> {
    log::info!("Counting frames for progress estimation");
    let count_start = std::time::Instant::now();

    let mut input_reader = InputReader::new(input_path)?;
    let mut extractor = Extractor::new(codec);
    let mut frames = 0u64;
    let mut bytes_read = 0u64;

    input_reader.process_chunks(CHUNK_SIZE, |chunk| {
        bytes_read += chunk.len() as u64;
        extractor.push_bytes(chunk);
        frames += extractor.by_ref().filter(Result::is_ok).count() as u64;
        Ok(true)
    })?;

    extractor.finish();
    frames += extractor.by_ref().filter(Result::is_ok).count() as u64;

    let count_elapsed = count_start.elapsed();
    let read_speed_mbps = if count_elapsed.as_secs_f64() > 0.0 {
        (bytes_read as f64) / 1_000_000.0 / count_elapsed.as_secs_f64()
    } else {
        0.0
    };

    log::info!(
        "Found {frames} extractable frames in {:.3}s ({:.1} MB/s, {} bytes)",
        count_elapsed.as_secs_f64(),
        read_speed_mbps,
        bytes_read
    );

    Ok(frames)
}

pub fn create_progress_bar(
    multi: &MultiProgress,
    total_frames: Option<u64>,
) -> Result<ProgressBar> {
    let pb = if let Some(total) = total_frames {
        let pb = multi.add(ProgressBar::new(total));
        pb.set_style(ProgressStyle::with_template(&format!(
            "{BAR_TEMPLATE} | ETA: {{eta_precise}}"
        ))?);

        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    } else {
        let pb = multi.add(ProgressBar::new_spinner());
        pb.set_style(ProgressStyle::with_template(SPINNER_TEMPLATE)?);

        pb
    };
    pb.set_message("initializing encapsulator");
    Ok(pb)
}

/// Replaces the ETA with the realtime factor of the finished run.
pub fn finalize_progress_bar(
    pb: &ProgressBar,
    estimated: bool,
    audio_secs: f64,
    start_time: std::time::Instant,
) {
    let style = if estimated {
        ProgressStyle::with_template(BAR_TEMPLATE).unwrap_or_else(|_| ProgressStyle::default_bar())
    } else {
        ProgressStyle::with_template(SPINNER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    };
    pb.set_style(style);

    let elapsed = start_time.elapsed().as_secs_f64();
    let realtime_multiplier = if elapsed > 0.0 {
        audio_secs / elapsed
    } else {
        0.0
    };
    pb.finish_with_message(format!(
        "speed: {realtime_multiplier:.1}x | timestamp: {}",
        crate::timestamp::time_str(audio_secs)
    ));
}
