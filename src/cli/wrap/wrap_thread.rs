use super::processor::{FrameCounters, ProcessFramesContext, process_frames};
use crate::input::{CHUNK_SIZE, InputReader};
use anyhow::Result;
use indicatif::ProgressBar;
use std::sync::mpsc;
use std::thread;

use iec61937::process::encapsulate::{Encapsulator, EncapsulatorStats};
use iec61937::process::extract::Extractor;
use iec61937::process::writer::OutputPacket;

pub struct WrapThreadConfig {
    pub input_path: std::path::PathBuf,
    pub strict_mode: bool,
    pub tx: mpsc::Sender<OutputPacket>,
    pub pb_clone: Option<ProgressBar>,
    pub extractor: Extractor,
    pub encapsulator: Encapsulator,
}

/// What the worker hands back once the input is exhausted.
#[derive(Debug)]
pub struct WrapSummary {
    pub counters: FrameCounters,
    pub stats: EncapsulatorStats,
    pub extract_errors: usize,
    pub burst_format: &'static str,
}

pub fn spawn_wrap_thread(config: WrapThreadConfig) -> thread::JoinHandle<Result<WrapSummary>> {
    thread::spawn(move || -> Result<WrapSummary> {
        let WrapThreadConfig {
            input_path,
            strict_mode,
            tx,
            pb_clone,
            mut extractor,
            mut encapsulator,
        } = config;

        let mut counters = FrameCounters::default();
        let mut input_reader = InputReader::new(&input_path)?;

        input_reader.process_chunks(CHUNK_SIZE, |chunk| {
            extractor.push_bytes(chunk);

            let should_exit = process_frames(&mut ProcessFramesContext {
                extractor: &mut extractor,
                encapsulator: &mut encapsulator,
                counters: &mut counters,
                strict_mode,
                tx: &tx,
                pb_clone: &pb_clone,
            })?;

            Ok(!should_exit) // Convert exit signal to continue signal
        })?;

        // Release the frame held back for the next sync check
        extractor.finish();
        process_frames(&mut ProcessFramesContext {
            extractor: &mut extractor,
            encapsulator: &mut encapsulator,
            counters: &mut counters,
            strict_mode,
            tx: &tx,
            pb_clone: &pb_clone,
        })?;

        let stats = encapsulator.stats();
        if encapsulator.has_pending() {
            log::info!(
                "Dropping the incomplete {} burst at the end of the stream",
                encapsulator.burst_format()
            );
            encapsulator.flush();
        }

        log::info!(
            "Processing complete: {} frames, {} samples, {} bursts",
            counters.frames,
            counters.samples,
            stats.packets_out
        );

        Ok(WrapSummary {
            counters,
            stats,
            extract_errors: extractor.error_count(),
            burst_format: encapsulator.burst_format(),
        })
    })
}
