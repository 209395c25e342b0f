use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use memmap2::Mmap;
use redeflate::{
    optimise_deflate_stream_with, BatchOptimiser, LogDiagnostics, OptimiseConfig, Stream,
};

#[derive(Parser, Debug)]
#[command(name = "redeflate")]
#[command(about = "Shrink raw DEFLATE streams by re-encoding their blocks losslessly")]
#[command(version)]
struct Args {
    /// Input raw DEFLATE file (use - for stdin)
    #[arg(short, long)]
    input: PathBuf,

    /// Output file (use - for stdout)
    #[arg(short, long, required_unless_present = "check")]
    output: Option<PathBuf>,

    /// Do not try merging adjacent blocks
    #[arg(long)]
    no_merge: bool,

    /// Only try the default header packing (much faster)
    #[arg(long)]
    fast_headers: bool,

    /// Stop after this many passes (0 = until nothing changes)
    #[arg(long, default_value = "0")]
    max_passes: usize,

    /// Also try re-compressing with flate2 and libdeflate and keep the smallest
    #[arg(long)]
    recompress: bool,

    /// Number of threads (0 = auto)
    #[arg(short = 't', long, default_value = "0")]
    threads: usize,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Parse the input and print its blocks, without writing anything
    #[arg(long)]
    check: bool,
}

const EXIT_OK: u8 = 0;
const EXIT_ERROR: u8 = 2;

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env().filter_level(level).init();

    match run(&args) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Input bytes, memory-mapped when they come from a file
enum Input {
    Mapped(Mmap),
    Buffered(Vec<u8>),
}

impl Input {
    fn open(path: &Path) -> io::Result<Self> {
        if path.to_str() == Some("-") {
            let mut buf = Vec::new();
            io::stdin().lock().read_to_end(&mut buf)?;
            return Ok(Input::Buffered(buf));
        }
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Ok(Input::Buffered(Vec::new()));
        }
        // SAFETY: the file is opened read-only and not modified while mapped
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Input::Mapped(mmap))
    }

    fn bytes(&self) -> &[u8] {
        match self {
            Input::Mapped(mmap) => &mmap[..],
            Input::Buffered(buf) => &buf[..],
        }
    }
}

fn run(args: &Args) -> Result<u8, Box<dyn std::error::Error>> {
    let input = Input::open(&args.input)?;
    let bytes = input.bytes();

    if args.check {
        return run_check_mode(bytes);
    }

    let output_path = args.output.as_ref().ok_or("--output is required")?;
    let config = OptimiseConfig {
        merge_blocks: !args.no_merge,
        exhaustive_headers: !args.fast_headers,
        max_passes: args.max_passes,
        num_threads: args.threads,
        recompress: args.recompress,
    };

    let start = std::time::Instant::now();
    let (output, stats, source) = if config.recompress {
        let mut results = BatchOptimiser::new(config).optimise_all(vec![bytes.to_vec()])?;
        let result = results.pop().ok_or("no result from batch optimiser")?;
        (result.output, result.stats, result.source)
    } else {
        let name = args.input.display().to_string();
        let mut diagnostics = LogDiagnostics::new(name);
        let (output, stats) = optimise_deflate_stream_with(bytes, &config, &mut diagnostics);
        (output, stats, "input".to_string())
    };
    let elapsed = start.elapsed();

    if output_path.to_str() == Some("-") {
        io::stdout().lock().write_all(&output)?;
    } else {
        let mut writer = BufWriter::new(File::create(output_path)?);
        writer.write_all(&output)?;
        writer.flush()?;
    }

    eprintln!(
        "{}: {} -> {} bytes, saved {} bits ({})",
        args.input.display(),
        bytes.len(),
        output.len(),
        stats.saved_bits(),
        source
    );
    log::debug!(
        "blocks: {} -> {}, time: {:.2?}",
        stats.input_blocks,
        stats.output_blocks,
        elapsed
    );

    Ok(EXIT_OK)
}

fn run_check_mode(bytes: &[u8]) -> Result<u8, Box<dyn std::error::Error>> {
    let stream = Stream::parse(bytes)?;
    let mut stdout = io::stdout().lock();
    for info in stream.block_info() {
        writeln!(stdout, "{info}")?;
    }
    writeln!(
        stdout,
        "{} blocks, {} bits, {} bytes uncompressed",
        stream.len(),
        stream.size_bits(),
        stream.uncompressed_data().len()
    )?;
    Ok(EXIT_OK)
}
