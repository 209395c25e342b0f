//! End-to-end integration tests for redeflate.
//!
//! flate2 serves as the independent encoder and reference decoder.

use std::io::{Read, Write};
use std::process::Command;
use std::sync::Arc;

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use proptest::prelude::*;

use redeflate::deflate::{HuffmanBlock, LitLen, StoredBlock};
use redeflate::huffman::{pack_code_lengths, unpack_code_lengths, HuffmanTree, PackOptions};
use redeflate::{
    optimise_deflate_stream, size_bits_fallback, BatchOptimiser, Block, BlockType, DeflateBlock,
    NoopDiagnostics, OptimiseConfig, Stream,
};

// ============================================================================
// Test Data Generators
// ============================================================================

/// Generate random data using a simple PRNG
fn generate_random_data(size: usize, seed: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    let mut state = seed;
    for _ in 0..size {
        // Simple xorshift PRNG
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        data.push((state & 0xFF) as u8);
    }
    data
}

/// Text-like data: a small vocabulary in pseudo-random order
fn generate_text_data(size: usize, seed: u64) -> Vec<u8> {
    let words: [&[u8]; 8] =
        [b"the ", b"quick ", b"brown ", b"fox ", b"jumps ", b"over ", b"lazy ", b"dog. "];
    let mut data = Vec::with_capacity(size);
    let mut state = seed;
    while data.len() < size {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        data.extend_from_slice(words[(state % 8) as usize]);
    }
    data.truncate(size);
    data
}

fn compress(data: &[u8], level: u32) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn inflate(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    DeflateDecoder::new(data).read_to_end(&mut out).unwrap();
    out
}

fn fast_config() -> OptimiseConfig {
    OptimiseConfig { exhaustive_headers: false, ..OptimiseConfig::default() }
}

fn optimise_and_check(input: &[u8], config: &OptimiseConfig) -> Stream {
    let mut stream = Stream::parse(input).unwrap();
    let expected = stream.uncompressed_data();
    let before = stream.size_bits();

    let saved = stream.optimise_with(config, &mut NoopDiagnostics);
    let after = stream.size_bits();
    assert!(after <= before, "stream grew from {before} to {after} bits");
    assert_eq!(saved, before - after);

    let output = stream.write().unwrap();
    assert_eq!(output.len() as u64, after.div_ceil(8));
    assert_eq!(inflate(&output), expected);
    stream
}

// ============================================================================
// Parsing
// ============================================================================

#[test]
fn test_parse_all_block_types() {
    let data = generate_text_data(20_000, 7);
    for (level, expected) in [
        (0, BlockType::Stored),
        (1, BlockType::DynamicHuffman),
        (9, BlockType::DynamicHuffman),
    ] {
        let input = compress(&data, level);
        let stream = Stream::parse(&input).unwrap();
        assert_eq!(stream.uncompressed_data(), data, "level {level}");
        assert!(stream.iter().any(|(_, block)| block.block_type() == expected));
        assert_eq!(stream.size_bits().div_ceil(8), input.len() as u64);
    }
}

#[test]
fn test_parse_fixed_huffman() {
    // Short inputs get fixed tables from zlib
    let input = compress(b"abc", 6);
    let stream = Stream::parse(&input).unwrap();
    assert_eq!(stream.uncompressed_data(), b"abc");
    let (_, block) = stream.iter().next().unwrap();
    assert_eq!(block.block_type(), BlockType::FixedHuffman);
}

#[test]
fn test_write_is_bit_exact() {
    for level in [0, 1, 6, 9] {
        let input = compress(&generate_text_data(5000, level as u64 + 1), level);
        let stream = Stream::parse(&input).unwrap();
        assert_eq!(stream.write().unwrap(), input, "level {level}");
    }
}

#[test]
fn test_truncated_input() {
    let input = compress(&generate_text_data(5000, 3), 6);
    assert!(Stream::parse(&input[..input.len() / 2]).is_err());
}

#[test]
fn test_trailing_bytes_ignored() {
    let mut input = compress(b"hello hello hello", 6);
    input.extend_from_slice(b"trailer");
    let stream = Stream::parse(&input).unwrap();
    assert_eq!(stream.uncompressed_data(), b"hello hello hello");
}

// ============================================================================
// Optimisation
// ============================================================================

#[test]
fn test_optimise_stored_input() {
    let data = generate_text_data(3000, 11);
    let input = compress(&data, 0);
    let stream = optimise_and_check(&input, &fast_config());
    // Literal Huffman coding beats raw bytes for text
    assert!(stream.size_bits() < Stream::parse(&input).unwrap().size_bits());
}

#[test]
fn test_optimise_compressed_levels() {
    let data = generate_text_data(30_000, 5);
    for level in [1, 6, 9] {
        optimise_and_check(&compress(&data, level), &fast_config());
    }
}

#[test]
fn test_optimise_random_data() {
    let data = generate_random_data(10_000, 42);
    optimise_and_check(&compress(&data, 6), &fast_config());
}

#[test]
fn test_optimise_exhaustive_headers() {
    let data = generate_text_data(2000, 9);
    optimise_and_check(&compress(&data, 6), &OptimiseConfig::default());
}

#[test]
fn test_optimise_without_merging() {
    let data = generate_text_data(4000, 13);
    let config = OptimiseConfig { merge_blocks: false, ..fast_config() };
    let input = compress(&data, 0);
    let before = Stream::parse(&input).unwrap().len();
    let stream = optimise_and_check(&input, &config);
    assert_eq!(stream.len(), before);
}

#[test]
fn test_merge_adjacent_stored_blocks() {
    let mut stream = Stream::new();
    for chunk in generate_random_data(3000, 17).chunks(1000) {
        stream.push_back(StoredBlock::new(Arc::from(chunk)).unwrap().into());
    }
    let bytes = stream.write().unwrap();
    let optimised = optimise_and_check(&bytes, &fast_config());
    assert_eq!(optimised.len(), 1);
}

#[test]
fn test_optimise_is_idempotent() {
    let data = generate_text_data(8000, 21);
    let first = optimise_and_check(&compress(&data, 6), &fast_config());

    let mut second = Stream::parse(&first.write().unwrap()).unwrap();
    let saved = second.optimise_with(&fast_config(), &mut NoopDiagnostics);
    assert_eq!(saved, 0);
    assert_eq!(second.size_bits(), first.size_bits());
}

#[test]
fn test_max_passes_bounds_work() {
    let data = generate_text_data(4000, 23);
    let config = OptimiseConfig { max_passes: 1, ..fast_config() };
    optimise_and_check(&compress(&data, 0), &config);
}

#[test]
fn test_size_cache_agrees_after_optimise() {
    let data = generate_text_data(6000, 29);
    let stream = optimise_and_check(&compress(&data, 9), &fast_config());
    for (_, block) in stream.iter() {
        if let Some(huffman) = block.as_huffman() {
            assert_eq!(huffman.size_bits(0), huffman.recompute_size_bits());
        }
    }
}

#[test]
fn test_optimise_deflate_stream_convenience() {
    let data = generate_text_data(5000, 31);
    let input = compress(&data, 0);
    let (output, stats) = optimise_deflate_stream(&input, &fast_config());
    assert!(output.len() < input.len());
    assert_eq!(stats.output_bits, output.len() as u64 * 8);
    assert_eq!(inflate(&output), data);
    assert!(size_bits_fallback(&output) <= stats.output_bits);
}

// ============================================================================
// Back-references
// ============================================================================

#[test]
fn test_overlapping_backref() {
    // 'a' then a length-20 copy at distance 1
    let tokens = vec![
        LitLen::Literal(b'a'),
        LitLen::Backref { length: 20, distance: 1, payload: Arc::from(&[b'a'; 20][..]) },
        LitLen::EndOfBlock,
    ];
    let mut stream = Stream::new();
    stream.push_back(HuffmanBlock::from_tokens(tokens).unwrap().into());
    let bytes = stream.write().unwrap();

    assert_eq!(inflate(&bytes), vec![b'a'; 21]);
    let parsed = Stream::parse(&bytes).unwrap();
    assert_eq!(parsed.uncompressed_data(), vec![b'a'; 21]);
}

#[test]
fn test_cross_block_backref() {
    let first: Vec<LitLen> =
        b"abcdefgh".iter().map(|&b| LitLen::Literal(b)).chain([LitLen::EndOfBlock]).collect();
    let second = vec![
        LitLen::Backref { length: 8, distance: 8, payload: Arc::from(&b"abcdefgh"[..]) },
        LitLen::Literal(b'!'),
        LitLen::EndOfBlock,
    ];

    let mut stream = Stream::new();
    stream.push_back(HuffmanBlock::from_tokens(first).unwrap().into());
    stream.push_back(HuffmanBlock::from_tokens(second).unwrap().into());
    let bytes = stream.write().unwrap();
    assert_eq!(inflate(&bytes), b"abcdefghabcdefgh!");

    let optimised = optimise_and_check(&bytes, &fast_config());
    assert_eq!(optimised.uncompressed_data(), b"abcdefghabcdefgh!");
}

#[test]
fn test_backref_across_stored_block() {
    let mut stream = Stream::new();
    stream.push_back(StoredBlock::new(Arc::from(&b"xyzxyz"[..])).unwrap().into());
    let tokens = vec![
        LitLen::Backref { length: 6, distance: 6, payload: Arc::from(&b"xyzxyz"[..]) },
        LitLen::EndOfBlock,
    ];
    stream.push_back(HuffmanBlock::from_tokens(tokens).unwrap().into());
    let bytes = stream.write().unwrap();
    assert_eq!(inflate(&bytes), b"xyzxyzxyzxyz");
    assert_eq!(Stream::parse(&bytes).unwrap().uncompressed_data(), b"xyzxyzxyzxyz");
}

#[test]
fn test_backref_before_start_rejected() {
    // Fixed block, length 3 (257) at distance 1 with no prior output
    let tokens = vec![
        LitLen::Backref { length: 3, distance: 1, payload: Arc::from(&b"aaa"[..]) },
        LitLen::EndOfBlock,
    ];
    let mut block = HuffmanBlock::from_tokens(tokens).unwrap();
    block.recode_to_fixed();
    let mut stream = Stream::new();
    stream.push_back(block.into());
    let bytes = stream.write().unwrap();
    assert!(Stream::parse(&bytes).is_err());
}

// ============================================================================
// Hand-built streams
// ============================================================================

#[test]
fn test_run_of_ten_a() {
    let tokens = vec![
        LitLen::Literal(b'A'),
        LitLen::Backref { length: 9, distance: 1, payload: Arc::from(&b"AAAAAAAAA"[..]) },
        LitLen::EndOfBlock,
    ];
    let block = HuffmanBlock::from_tokens(tokens).unwrap();
    assert_eq!(DeflateBlock::block_type(&block), BlockType::DynamicHuffman);

    let mut stream = Stream::new();
    stream.push_back(block.clone().into());
    let bytes = stream.write().unwrap();

    let mut parsed = Stream::parse(&bytes).unwrap();
    assert_eq!(parsed.uncompressed_data(), b"AAAAAAAAAA");
    let before = parsed.size_bits();
    parsed.optimise_with(&fast_config(), &mut NoopDiagnostics);
    assert!(parsed.size_bits() <= before);
    assert_eq!(inflate(&parsed.write().unwrap()), b"AAAAAAAAAA");

    // The dynamic header dwarfs three tokens
    let mut fixed = block.clone();
    fixed.recode_to_fixed();
    assert!(fixed.size_bits(3) <= block.size_bits(3));
    assert_eq!(&fixed.data()[..], b"AAAAAAAAAA");
}

#[test]
fn test_block_info_positions() {
    let mut stream = Stream::new();
    stream.push_back(StoredBlock::new(Arc::from(&b"abc"[..])).unwrap().into());
    stream.push_back(Block::Huffman(
        HuffmanBlock::from_tokens(vec![LitLen::Literal(b'x'), LitLen::EndOfBlock]).unwrap(),
    ));
    let info = stream.block_info();
    assert_eq!(info.len(), 2);
    assert_eq!(info[0].position, 0);
    assert_eq!(info[1].position, info[0].size_bits);
    assert_eq!(info[0].size_bits + info[1].size_bits, stream.size_bits());
    assert!(info[1].to_string().contains("dynamic"));
}

// ============================================================================
// Batch optimiser
// ============================================================================

#[test]
fn test_batch_matches_single() {
    let inputs: Vec<Vec<u8>> =
        (0..4).map(|i| compress(&generate_text_data(2000 + i * 500, i as u64 + 1), 6)).collect();
    let config = OptimiseConfig { num_threads: 2, ..fast_config() };
    let results = BatchOptimiser::new(config.clone()).optimise_all(inputs.clone()).unwrap();

    for (input, result) in inputs.iter().zip(&results) {
        let (single, _) = optimise_deflate_stream(input, &config);
        assert_eq!(result.output, single);
        assert_eq!(inflate(&result.output), inflate(input));
    }
}

// ============================================================================
// CLI
// ============================================================================

#[test]
fn test_cli_optimise_and_check() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("input.deflate");
    let output_path = dir.path().join("output.deflate");
    let data = generate_text_data(4000, 37);
    let input = compress(&data, 0);
    std::fs::write(&input_path, &input).unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_redeflate"))
        .args(["--fast-headers", "-t", "1", "-i"])
        .arg(&input_path)
        .arg("-o")
        .arg(&output_path)
        .status()
        .expect("Failed to run CLI");
    assert!(status.success());

    let output = std::fs::read(&output_path).unwrap();
    assert!(output.len() < input.len());
    assert_eq!(inflate(&output), data);

    let check = Command::new(env!("CARGO_BIN_EXE_redeflate"))
        .arg("--check")
        .arg("-i")
        .arg(&output_path)
        .output()
        .expect("Failed to run CLI");
    assert!(check.status.success());
    assert!(String::from_utf8_lossy(&check.stdout).contains("block    0"));
}

#[test]
fn test_cli_rejects_garbage_in_check_mode() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.bin");
    std::fs::write(&path, [0xffu8, 0xff, 0xff]).unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_redeflate"))
        .arg("--check")
        .arg("-i")
        .arg(&path)
        .status()
        .expect("Failed to run CLI");
    assert_eq!(status.code(), Some(2));
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_stream_round_trip(data in proptest::collection::vec(any::<u8>(), 0..2000), level in 0u32..=9) {
        let input = compress(&data, level);
        let mut stream = Stream::parse(&input).unwrap();
        prop_assert_eq!(stream.uncompressed_data(), data.clone());

        let before = stream.size_bits();
        stream.optimise_with(&fast_config(), &mut NoopDiagnostics);
        prop_assert!(stream.size_bits() <= before);
        prop_assert_eq!(inflate(&stream.write().unwrap()), data);
    }

    #[test]
    fn prop_header_rle_round_trip(
        litlen in proptest::collection::vec(0u8..=15, 257..=286),
        dist in proptest::collection::vec(0u8..=15, 1..=30),
        variant in 0usize..20,
    ) {
        let opts = PackOptions::variants()[variant];
        let pairs = pack_code_lengths(&litlen, &dist, &opts);
        let mut expected = litlen.clone();
        expected.extend_from_slice(&dist);
        prop_assert_eq!(unpack_code_lengths(&pairs).unwrap(), expected);
    }

    #[test]
    fn prop_tree_is_canonical_and_limited(
        freq in proptest::collection::vec(0u32..10_000, 2..300),
        limit in 9u8..=15,
    ) {
        prop_assume!(freq.iter().filter(|&&f| f > 0).count() >= 1);
        let tree = HuffmanTree::new(&freq, limit).unwrap();
        let table = tree.table();
        prop_assert!(table.is_valid());
        prop_assert!(table.max_code_len() <= limit);
        for (symbol, &f) in freq.iter().enumerate() {
            if f > 0 {
                prop_assert!(table.code_len[symbol] > 0);
            }
        }
    }

    #[test]
    fn prop_skewed_tree_respects_short_limit(
        freq in proptest::collection::vec(0u32..28, 2..=120)
            .prop_map(|exps| exps.into_iter().map(|k| 1u32 << k).collect::<Vec<u32>>()),
    ) {
        let tree = HuffmanTree::new(&freq, 7).unwrap();
        let table = tree.table();
        prop_assert!(table.is_valid());
        prop_assert!(table.max_code_len() <= 7);
        prop_assert!(table.code_len.iter().take(freq.len()).all(|&len| len > 0));
    }
}
