/// Length codes 257-285: base length and extra bits
/// Index by (code - 257)
pub const LENGTH_TABLE: [(u16, u8); 29] = [
    // (base_length, extra_bits)
    (3, 0),   // 257
    (4, 0),   // 258
    (5, 0),   // 259
    (6, 0),   // 260
    (7, 0),   // 261
    (8, 0),   // 262
    (9, 0),   // 263
    (10, 0),  // 264
    (11, 1),  // 265
    (13, 1),  // 266
    (15, 1),  // 267
    (17, 1),  // 268
    (19, 2),  // 269
    (23, 2),  // 270
    (27, 2),  // 271
    (31, 2),  // 272
    (35, 3),  // 273
    (43, 3),  // 274
    (51, 3),  // 275
    (59, 3),  // 276
    (67, 4),  // 277
    (83, 4),  // 278
    (99, 4),  // 279
    (115, 4), // 280
    (131, 5), // 281
    (163, 5), // 282
    (195, 5), // 283
    (227, 5), // 284
    (258, 0), // 285 - special case
];

/// Distance codes 0-29: base distance and extra bits
pub const DISTANCE_TABLE: [(u16, u8); 30] = [
    // (base_distance, extra_bits)
    (1, 0),      // 0
    (2, 0),      // 1
    (3, 0),      // 2
    (4, 0),      // 3
    (5, 1),      // 4
    (7, 1),      // 5
    (9, 2),      // 6
    (13, 2),     // 7
    (17, 3),     // 8
    (25, 3),     // 9
    (33, 4),     // 10
    (49, 4),     // 11
    (65, 5),     // 12
    (97, 5),     // 13
    (129, 6),    // 14
    (193, 6),    // 15
    (257, 7),    // 16
    (385, 7),    // 17
    (513, 8),    // 18
    (769, 8),    // 19
    (1025, 9),   // 20
    (1537, 9),   // 21
    (2049, 10),  // 22
    (3073, 10),  // 23
    (4097, 11),  // 24
    (6145, 11),  // 25
    (8193, 12),  // 26
    (12289, 12), // 27
    (16385, 13), // 28
    (24577, 13), // 29
];

/// Order of code length alphabet for dynamic Huffman blocks
pub const CODE_LENGTH_ORDER: [usize; 19] =
    [16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15];

/// Sliding window size; the largest legal back-reference distance
pub const MAX_DISTANCE: usize = 32768;
pub const MIN_MATCH: u16 = 3;
pub const MAX_MATCH: u16 = 258;

pub const END_OF_BLOCK: u16 = 256;
/// First length symbol in the literal/length alphabet
pub const LENGTH_CODE_OFFSET: u16 = 257;
pub const MAX_LITLEN_SYMBOL: u16 = 285;
pub const MAX_DISTANCE_SYMBOL: u16 = 29;

/// Bounds for HLIT + 257, HDIST + 1 and HCLEN + 4
pub const MIN_LITLEN_LENS: usize = 257;
pub const MAX_LITLEN_LENS: usize = 288;
pub const MIN_DIST_LENS: usize = 1;
pub const MAX_DIST_LENS: usize = 32;
pub const MIN_CODELEN_LENS: usize = 4;
pub const MAX_CODELEN_LENS: usize = 19;

/// Frequency table sizes for the symbols an encoder may emit
pub const NUM_LITLEN_SYMBOLS: usize = 286;
pub const NUM_DISTANCE_SYMBOLS: usize = 30;

/// Maximum code length for literal/length and distance alphabets
pub const MAX_CODE_LENGTH: u8 = 15;
/// Maximum code length for the code length alphabet
pub const MAX_CODELEN_CODE_LENGTH: u8 = 7;

/// Code length alphabet: 0-15 are literal lengths, 16-18 are runs
pub const CODELEN_MAX_LITERAL: u16 = 15;
pub const CODELEN_COPY: u16 = 16;
pub const CODELEN_ZEROS: u16 = 17;
pub const CODELEN_ZEROS_LONG: u16 = 18;

/// Copy previous length 3-6 times (2 extra bits)
pub const COPY_MIN: usize = 3;
pub const COPY_MAX: usize = 6;
/// Repeat zero 3-10 times (3 extra bits)
pub const ZEROS_MIN: usize = 3;
pub const ZEROS_MAX: usize = 10;
/// Repeat zero 11-138 times (7 extra bits)
pub const ZEROS_LONG_MIN: usize = 11;
pub const ZEROS_LONG_MAX: usize = 138;

/// Match length (0-258) to index into LENGTH_TABLE
static LENGTH_CODES: [u8; 259] = build_length_codes();

/// (distance - 1) to distance code, for distances up to 256
static DISTANCE_CODES_LO: [u8; 256] = build_distance_codes_lo();

/// ((distance - 1) >> 7) to distance code, for distances above 256
static DISTANCE_CODES_HI: [u8; 256] = build_distance_codes_hi();

const fn build_length_codes() -> [u8; 259] {
    let mut table = [0u8; 259];
    let mut idx = 0;
    while idx < LENGTH_TABLE.len() {
        let (base, extra) = LENGTH_TABLE[idx];
        let mut len = base as usize;
        let end = base as usize + (1usize << extra);
        // Code 284 also spans 258; the later entry (285) wins
        while len < end && len < 259 {
            table[len] = idx as u8;
            len += 1;
        }
        idx += 1;
    }
    table
}

const fn build_distance_codes_lo() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut code = 0;
    while code < DISTANCE_TABLE.len() {
        let (base, extra) = DISTANCE_TABLE[code];
        let mut dist = base as usize;
        let end = base as usize + (1usize << extra);
        while dist < end && dist <= 256 {
            table[dist - 1] = code as u8;
            dist += 1;
        }
        code += 1;
    }
    table
}

const fn build_distance_codes_hi() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut code = 0;
    while code < DISTANCE_TABLE.len() {
        let (base, extra) = DISTANCE_TABLE[code];
        if base > 256 {
            let first = (base as usize - 1) >> 7;
            let last = (base as usize - 1 + (1usize << extra) - 1) >> 7;
            let mut i = first;
            while i <= last {
                table[i] = code as u8;
                i += 1;
            }
        }
        code += 1;
    }
    table
}

/// Literal/length symbol (257-285) for a match length (3-258)
#[inline]
pub fn length_to_litlen(length: u16) -> u16 {
    debug_assert!((MIN_MATCH..=MAX_MATCH).contains(&length));
    LENGTH_CODE_OFFSET + LENGTH_CODES[length as usize] as u16
}

/// Distance symbol (0-29) for a distance (1-32768)
#[inline]
pub fn distance_to_code(distance: u16) -> u16 {
    debug_assert!(distance >= 1 && distance as usize <= MAX_DISTANCE);
    let d = distance as usize - 1;
    if d < 256 {
        DISTANCE_CODES_LO[d] as u16
    } else {
        DISTANCE_CODES_HI[d >> 7] as u16
    }
}

/// Extra bits carried by a length symbol (257-285)
#[inline]
pub fn length_extra_bits(litlen: u16) -> u8 {
    LENGTH_TABLE[(litlen - LENGTH_CODE_OFFSET) as usize].1
}

/// Extra bits carried by a distance symbol (0-29)
#[inline]
pub fn distance_extra_bits(code: u16) -> u8 {
    DISTANCE_TABLE[code as usize].1
}

/// Decode a length value from a length code (257-285) and extra bits
pub fn decode_length(code: u16, extra_bits: u32) -> Option<u16> {
    if !(LENGTH_CODE_OFFSET..=MAX_LITLEN_SYMBOL).contains(&code) {
        return None;
    }
    // 284 covers 227-257; its top extra value would alias 285's 258
    if code == MAX_LITLEN_SYMBOL - 1 && extra_bits == 31 {
        return None;
    }
    let (base, _) = LENGTH_TABLE[(code - LENGTH_CODE_OFFSET) as usize];
    Some(base + extra_bits as u16)
}

/// Decode a distance value from a distance code (0-29) and extra bits
pub fn decode_distance(code: u16, extra_bits: u32) -> Option<u16> {
    if code > MAX_DISTANCE_SYMBOL {
        return None;
    }
    let (base, _) = DISTANCE_TABLE[code as usize];
    Some(base + extra_bits as u16)
}

/// Reverse lookup: find length code from length value
/// Returns (code, extra_value, extra_bits)
pub fn encode_length(length: u16) -> Option<(u16, u16, u8)> {
    if !(MIN_MATCH..=MAX_MATCH).contains(&length) {
        return None;
    }
    let code = length_to_litlen(length);
    let (base, extra_bits) = LENGTH_TABLE[(code - LENGTH_CODE_OFFSET) as usize];
    Some((code, length - base, extra_bits))
}

/// Reverse lookup: find distance code from distance value
/// Returns (code, extra_value, extra_bits)
pub fn encode_distance(distance: u16) -> Option<(u16, u16, u8)> {
    if distance == 0 || distance as usize > MAX_DISTANCE {
        return None;
    }
    let code = distance_to_code(distance);
    let (base, extra_bits) = DISTANCE_TABLE[code as usize];
    Some((code, distance - base, extra_bits))
}

/// Fixed Huffman literal/length code lengths (RFC 1951 section 3.2.6)
pub fn fixed_litlen_lengths() -> [u8; MAX_LITLEN_LENS] {
    let mut lengths = [0u8; MAX_LITLEN_LENS];
    lengths[0..=143].fill(8); // 0-143: 8 bits
    lengths[144..=255].fill(9); // 144-255: 9 bits
    lengths[256..=279].fill(7); // 256-279: 7 bits
    lengths[280..=287].fill(8); // 280-287: 8 bits
    lengths
}

/// Fixed Huffman distance code lengths (all 5 bits)
pub fn fixed_distance_lengths() -> [u8; MAX_DIST_LENS] {
    [5u8; MAX_DIST_LENS]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_length() {
        assert_eq!(decode_length(257, 0), Some(3));
        assert_eq!(decode_length(258, 0), Some(4));
        assert_eq!(decode_length(265, 0), Some(11));
        assert_eq!(decode_length(265, 1), Some(12));
        assert_eq!(decode_length(285, 0), Some(258));
        assert_eq!(decode_length(286, 0), None);
        assert_eq!(decode_length(284, 30), Some(257));
        assert_eq!(decode_length(284, 31), None);
    }

    #[test]
    fn test_decode_distance() {
        assert_eq!(decode_distance(0, 0), Some(1));
        assert_eq!(decode_distance(4, 0), Some(5));
        assert_eq!(decode_distance(4, 1), Some(6));
        assert_eq!(decode_distance(29, 0x1FFF), Some(32768));
        assert_eq!(decode_distance(30, 0), None);
    }

    #[test]
    fn test_encode_length() {
        assert_eq!(encode_length(3), Some((257, 0, 0)));
        assert_eq!(encode_length(4), Some((258, 0, 0)));
        assert_eq!(encode_length(11), Some((265, 0, 1)));
        assert_eq!(encode_length(12), Some((265, 1, 1)));
        assert_eq!(encode_length(257), Some((284, 30, 5)));
        assert_eq!(encode_length(258), Some((285, 0, 0)));
        assert_eq!(encode_length(2), None);
    }

    #[test]
    fn test_encode_distance() {
        assert_eq!(encode_distance(1), Some((0, 0, 0)));
        assert_eq!(encode_distance(5), Some((4, 0, 1)));
        assert_eq!(encode_distance(6), Some((4, 1, 1)));
        assert_eq!(encode_distance(256), Some((15, 63, 6)));
        assert_eq!(encode_distance(257), Some((16, 0, 7)));
        assert_eq!(encode_distance(32768), Some((29, 8191, 13)));
        assert_eq!(encode_distance(0), None);
    }

    #[test]
    fn test_lookup_tables_match_linear_search() {
        for len in MIN_MATCH..=MAX_MATCH {
            let expected = if len == 258 {
                28
            } else {
                LENGTH_TABLE
                    .iter()
                    .position(|&(base, extra)| len >= base && len < base + (1 << extra))
                    .unwrap()
            };
            assert_eq!(length_to_litlen(len), 257 + expected as u16, "length {}", len);
        }
        for dist in 1..=MAX_DISTANCE as u32 {
            let expected = DISTANCE_TABLE
                .iter()
                .position(|&(base, extra)| {
                    dist >= base as u32 && dist < base as u32 + (1u32 << extra)
                })
                .unwrap();
            assert_eq!(distance_to_code(dist as u16), expected as u16, "distance {}", dist);
        }
    }

    #[test]
    fn test_fixed_lengths() {
        let lit = fixed_litlen_lengths();
        assert_eq!(lit[0], 8);
        assert_eq!(lit[200], 9);
        assert_eq!(lit[256], 7);
        assert_eq!(lit[287], 8);
        assert!(fixed_distance_lengths().iter().all(|&l| l == 5));
    }
}
