//! Batch optimisation of independent streams on a worker pool.
//!
//! Architecture:
//! - Main thread: send one job per input stream, collect results
//! - Worker pool: each worker parses, optimises and writes whole streams
//! - Main thread: re-order results by job id

use std::collections::BTreeMap;
use std::io::{Read, Write};

use crossbeam::channel::{bounded, Receiver, Sender};

use crate::error::{Error, Result};
use crate::optimiser::diagnostics::LogDiagnostics;
use crate::{optimise_deflate_stream_with, OptimiseConfig, OptimiseStats};

/// Result for one input stream
#[derive(Clone, Debug)]
pub struct BatchResult {
    /// Position of the stream in the input batch
    pub index: usize,
    pub output: Vec<u8>,
    pub stats: OptimiseStats,
    /// Which candidate produced `output`, e.g. "input" or "libdeflate-12"
    pub source: String,
}

struct Job {
    id: usize,
    input: Vec<u8>,
}

/// Optimises many streams concurrently
pub struct BatchOptimiser {
    config: OptimiseConfig,
}

impl BatchOptimiser {
    pub fn new(config: OptimiseConfig) -> Self {
        Self { config }
    }

    fn effective_threads(&self) -> usize {
        match self.config.num_threads {
            0 => num_cpus::get().clamp(1, 32),
            n => n.clamp(1, 32),
        }
    }

    /// Optimise every stream; results come back in input order
    pub fn optimise_all(&self, inputs: Vec<Vec<u8>>) -> Result<Vec<BatchResult>> {
        let num_threads = self.effective_threads().min(inputs.len().max(1));

        if num_threads == 1 {
            return Ok(inputs
                .into_iter()
                .enumerate()
                .map(|(id, input)| optimise_one(&self.config, Job { id, input }))
                .collect());
        }

        let channel_capacity = num_threads * 4;
        let (job_tx, job_rx): (Sender<Job>, Receiver<Job>) = bounded(channel_capacity);
        let (result_tx, result_rx): (Sender<BatchResult>, Receiver<BatchResult>) =
            bounded(channel_capacity);
        let total = inputs.len();
        let config = &self.config;

        let result = crossbeam::scope(|scope| {
            for _ in 0..num_threads {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move |_| worker_thread(config, job_rx, result_tx));
            }

            drop(job_rx);
            drop(result_tx);

            // Feed jobs from a separate thread so a full result channel cannot stall dispatch
            scope.spawn(move |_| {
                for (id, input) in inputs.into_iter().enumerate() {
                    if job_tx.send(Job { id, input }).is_err() {
                        break;
                    }
                }
            });

            collect_results(result_rx, total)
        });

        result.map_err(|_| Error::Internal("Thread panicked".to_string()))?
    }
}

fn collect_results(result_rx: Receiver<BatchResult>, total: usize) -> Result<Vec<BatchResult>> {
    let mut pending: BTreeMap<usize, BatchResult> = BTreeMap::new();
    while let Ok(result) = result_rx.recv() {
        pending.insert(result.index, result);
    }

    if pending.len() != total {
        return Err(Error::Internal(format!(
            "expected {total} batch results, got {}",
            pending.len()
        )));
    }
    Ok(pending.into_values().collect())
}

fn worker_thread(config: &OptimiseConfig, job_rx: Receiver<Job>, result_tx: Sender<BatchResult>) {
    while let Ok(job) = job_rx.recv() {
        if result_tx.send(optimise_one(config, job)).is_err() {
            break;
        }
    }
}

fn optimise_one(config: &OptimiseConfig, job: Job) -> BatchResult {
    let mut diagnostics = LogDiagnostics::new(format!("stream {}", job.id));
    let (output, stats) = optimise_deflate_stream_with(&job.input, config, &mut diagnostics);
    let mut best = BatchResult { index: job.id, output, stats, source: "input".to_string() };

    if !config.recompress {
        return best;
    }

    let data = match inflate(&job.input) {
        Ok(data) => data,
        Err(e) => {
            log::warn!("stream {}: cannot decode for recompression: {e}", job.id);
            return best;
        }
    };

    for (source, candidate) in recompressed_candidates(&data) {
        let (output, _) = optimise_deflate_stream_with(&candidate, config, &mut diagnostics);
        log::debug!("stream {}: {source} gives {} bytes", job.id, output.len());
        if output.len() < best.output.len() {
            best.stats.output_bits = output.len() as u64 * 8;
            best.stats.output_blocks = crate::Stream::parse(&output).map_or(0, |s| s.len());
            best.output = output;
            best.source = source;
        }
    }
    best
}

/// Reference decode through flate2
fn inflate(input: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    flate2::read::DeflateDecoder::new(input).read_to_end(&mut out)?;
    Ok(out)
}

/// Fresh encodings of `data` from flate2 levels 0-9 and libdeflate levels 1-12
fn recompressed_candidates(data: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut candidates = Vec::new();

    for level in 0..=9 {
        match flate2_compress(data, level) {
            Ok(out) => candidates.push((format!("flate2-{level}"), out)),
            Err(e) => log::debug!("flate2 level {level} failed: {e}"),
        }
    }
    for level in 1..=12 {
        match libdeflate_compress(data, level) {
            Ok(out) => candidates.push((format!("libdeflate-{level}"), out)),
            Err(e) => log::debug!("libdeflate level {level} failed: {e}"),
        }
    }
    candidates
}

fn flate2_compress(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder =
        flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::new(level));
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn libdeflate_compress(data: &[u8], level: i32) -> Result<Vec<u8>> {
    let level = libdeflater::CompressionLvl::new(level)
        .map_err(|e| Error::Internal(format!("libdeflate level: {e:?}")))?;
    let mut compressor = libdeflater::Compressor::new(level);
    let mut out = vec![0u8; compressor.deflate_compress_bound(data.len())];
    let len = compressor
        .deflate_compress(data, &mut out)
        .map_err(|e| Error::Internal(format!("libdeflate: {e:?}")))?;
    out.truncate(len);
    Ok(out)
}
