#![no_main]

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use libfuzzer_sys::fuzz_target;
use redeflate::{NoopDiagnostics, OptimiseConfig, Stream};
use std::io::{Read, Write};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // Limit data size to avoid slowdowns
    let data = if data.len() > 16 * 1024 { &data[..16 * 1024] } else { data };
    let level = u32::from(data[0] % 10);

    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(level));
    if encoder.write_all(data).is_err() {
        return;
    }
    let input = match encoder.finish() {
        Ok(d) => d,
        Err(_) => return,
    };

    let mut stream = Stream::parse(&input).expect("flate2 output parses");
    let before = stream.size_bits();
    let config = OptimiseConfig { exhaustive_headers: false, ..OptimiseConfig::default() };
    stream.optimise_with(&config, &mut NoopDiagnostics);
    assert!(stream.size_bits() <= before, "optimised stream grew");

    let output = stream.write().expect("optimised stream writes");
    let mut decoded = Vec::new();
    DeflateDecoder::new(&output[..]).read_to_end(&mut decoded).expect("flate2 decodes output");
    assert_eq!(decoded, data, "Round-trip mismatch");
});
