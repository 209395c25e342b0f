#![no_main]

use libfuzzer_sys::fuzz_target;
use redeflate::Stream;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes: parsing may fail, but must not panic
    if let Ok(stream) = Stream::parse(data) {
        // Whatever parsed must write back and parse to the same bytes
        let written = stream.write().expect("parsed stream writes");
        let reparsed = Stream::parse(&written).expect("written stream parses");
        assert_eq!(reparsed.uncompressed_data(), stream.uncompressed_data());
        assert_eq!(reparsed.size_bits(), stream.size_bits());
    }
});
