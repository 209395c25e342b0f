pub mod bits;
pub mod deflate;
pub mod error;
pub mod huffman;
pub mod optimiser;

pub use deflate::{Block, BlockInfo, BlockType, DeflateBlock, Stream};
pub use error::{Error, Result};
pub use optimiser::diagnostics::{Diagnostics, LogDiagnostics, NoopDiagnostics};
pub use optimiser::parallel::{BatchOptimiser, BatchResult};

/// Configuration for stream optimisation
#[derive(Clone, Debug)]
pub struct OptimiseConfig {
    /// Try merging adjacent blocks
    pub merge_blocks: bool,
    /// Try every header packing heuristic; otherwise only greedy packing
    pub exhaustive_headers: bool,
    /// Stop after this many full passes (0 = until nothing changes)
    pub max_passes: usize,
    /// Number of threads for batch optimisation (0 = auto-detect)
    pub num_threads: usize,
    /// Also try streams produced by external compressors (batch only)
    pub recompress: bool,
}

impl Default for OptimiseConfig {
    fn default() -> Self {
        Self {
            merge_blocks: true,
            exhaustive_headers: true,
            max_passes: 0,
            num_threads: 0,
            recompress: false,
        }
    }
}

/// Outcome of optimising one stream
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OptimiseStats {
    pub input_bits: u64,
    pub output_bits: u64,
    pub input_blocks: usize,
    pub output_blocks: usize,
}

impl OptimiseStats {
    pub fn saved_bits(&self) -> u64 {
        self.input_bits.saturating_sub(self.output_bits)
    }

    /// Whether the returned bytes are the input bytes unchanged
    pub fn unchanged(&self) -> bool {
        self.saved_bits() == 0
    }
}

/// Size in bits of a raw DEFLATE stream, or `8 * len` if it does not parse
pub fn size_bits_fallback(bytes: &[u8]) -> u64 {
    match Stream::parse(bytes) {
        Ok(stream) => stream.size_bits(),
        Err(_) => bytes.len() as u64 * 8,
    }
}

/// Optimise a raw DEFLATE stream, returning the smaller encoding
///
/// Never fails: input that does not parse, or an output that does not decode
/// back to the same bytes, yields the input unchanged.
pub fn optimise_deflate_stream(bytes: &[u8], config: &OptimiseConfig) -> (Vec<u8>, OptimiseStats) {
    optimise_deflate_stream_with(bytes, config, &mut NoopDiagnostics)
}

pub fn optimise_deflate_stream_with(
    bytes: &[u8],
    config: &OptimiseConfig,
    diagnostics: &mut dyn Diagnostics,
) -> (Vec<u8>, OptimiseStats) {
    let unchanged = |blocks: usize| {
        let bits = bytes.len() as u64 * 8;
        let stats = OptimiseStats {
            input_bits: bits,
            output_bits: bits,
            input_blocks: blocks,
            output_blocks: blocks,
        };
        (bytes.to_vec(), stats)
    };

    let mut stream = match Stream::parse(bytes) {
        Ok(stream) => stream,
        Err(e) => {
            log::warn!("input does not parse, left unchanged: {e}");
            return unchanged(0);
        }
    };
    let input_blocks = stream.len();
    let expected = stream.uncompressed_data();

    stream.optimise_with(config, diagnostics);

    let output = match stream.write().and_then(|out| verify(&out, &expected).map(|()| out)) {
        Ok(out) => out,
        Err(e) => {
            log::warn!("optimised stream rejected: {e}");
            return unchanged(input_blocks);
        }
    };

    // Byte granularity: a saving under 8 bits may not shorten the output
    if output.len() >= bytes.len() {
        return unchanged(input_blocks);
    }

    let stats = OptimiseStats {
        input_bits: bytes.len() as u64 * 8,
        output_bits: output.len() as u64 * 8,
        input_blocks,
        output_blocks: stream.len(),
    };
    (output, stats)
}

fn verify(output: &[u8], expected: &[u8]) -> Result<()> {
    let decoded = Stream::parse(output)?.uncompressed_data();
    if decoded != expected {
        return Err(Error::Internal(format!(
            "decoded {} bytes, expected {}",
            decoded.len(),
            expected.len()
        )));
    }
    Ok(())
}
