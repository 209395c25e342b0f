use crate::deflate::tables::{
    fixed_distance_lengths, fixed_litlen_lengths, COPY_MAX, COPY_MIN, MAX_CODE_LENGTH,
    ZEROS_LONG_MAX, ZEROS_LONG_MIN, ZEROS_MAX, ZEROS_MIN,
};
use crate::deflate::tokens::CodeLengthSymbol;
use crate::error::{Error, Result};

/// Canonical Huffman code table: parallel code / length arrays indexed by symbol
///
/// `code` holds the code MSB-first as assigned by the canonical construction;
/// a `code_len` of 0 marks an unused symbol.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HuffmanTable {
    pub code: Vec<u16>,
    pub code_len: Vec<u8>,
}

impl HuffmanTable {
    /// An all-unused table for `num_symbols` symbols
    pub fn new(num_symbols: usize) -> Self {
        Self { code: vec![0; num_symbols], code_len: vec![0; num_symbols] }
    }

    /// Build canonical codes from code lengths (RFC 1951 section 3.2.2)
    pub fn from_lengths(lengths: &[u8]) -> Self {
        let max_bits = lengths.iter().copied().max().unwrap_or(0) as usize;

        // Count codes of each length
        let mut bl_count = vec![0u32; max_bits + 1];
        for &len in lengths {
            if len > 0 {
                bl_count[len as usize] += 1;
            }
        }

        // Compute first code for each bit length
        let mut next_code = vec![0u32; max_bits + 1];
        let mut code = 0u32;
        for bits in 1..=max_bits {
            code = (code + bl_count[bits - 1]) << 1;
            next_code[bits] = code;
        }

        // Assign codes to symbols in increasing symbol order
        let mut codes = vec![0u16; lengths.len()];
        for (sym, &len) in lengths.iter().enumerate() {
            if len > 0 {
                codes[sym] = next_code[len as usize] as u16;
                next_code[len as usize] += 1;
            }
        }

        Self { code: codes, code_len: lengths.to_vec() }
    }

    /// Fixed literal/length table (RFC 1951 section 3.2.6)
    pub fn fixed_litlen() -> Self {
        Self::from_lengths(&fixed_litlen_lengths())
    }

    /// Fixed distance table
    pub fn fixed_distance() -> Self {
        Self::from_lengths(&fixed_distance_lengths())
    }

    pub fn num_symbols(&self) -> usize {
        self.code_len.len()
    }

    pub fn max_code_len(&self) -> u8 {
        self.code_len.iter().copied().max().unwrap_or(0)
    }

    /// Number of symbols with a code
    pub fn used_symbols(&self) -> usize {
        self.code_len.iter().filter(|&&l| l > 0).count()
    }

    /// Kraft sum scaled by 2^15 (32768 means a complete code)
    pub fn kraft_sum(&self) -> u32 {
        self.code_len
            .iter()
            .filter(|&&l| l > 0 && l <= MAX_CODE_LENGTH)
            .map(|&l| 1u32 << (MAX_CODE_LENGTH - l))
            .sum()
    }

    /// Whether the lengths describe a usable prefix code
    pub fn is_valid(&self) -> bool {
        self.max_code_len() <= MAX_CODE_LENGTH && self.kraft_sum() <= 1 << MAX_CODE_LENGTH
    }
}

/// Switches for the code length RLE packer
///
/// The default is the greedy packer with the combined-run refinements on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PackOptions {
    /// Split runs of 7 or 8 repeats into two copy symbols instead of 6 plus literals
    pub combine: bool,
    /// With `combine`, pack 8 repeats as 4 + 4
    pub use8: bool,
    /// With `combine`, pack 7 repeats as 4 + 3
    pub use7: bool,
    /// With `use8`, pack 8 repeats as 5 + 3
    pub alt8: bool,
    /// Never emit symbol 16
    pub no_rep: bool,
    /// Never emit symbol 17
    pub no_zero_rep: bool,
    /// Never emit symbol 18
    pub no_zero_rep_long: bool,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            combine: true,
            use8: true,
            use7: true,
            alt8: false,
            no_rep: false,
            no_zero_rep: false,
            no_zero_rep_long: false,
        }
    }
}

impl PackOptions {
    /// Plain greedy packing with every RLE symbol allowed
    pub fn greedy() -> Self {
        Self { combine: false, use8: false, use7: false, ..Self::default() }
    }

    /// Every packing combination worth trying on a header
    pub fn variants() -> Vec<PackOptions> {
        let mut out = Vec::with_capacity(20);
        for no_rep in [false, true] {
            for no_zero_rep in [false, true] {
                for no_zero_rep_long in [false, true] {
                    if !no_rep {
                        for (use8, use7) in [(true, true), (true, false), (false, true)] {
                            out.push(PackOptions {
                                combine: true,
                                use8,
                                use7,
                                alt8: false,
                                no_rep,
                                no_zero_rep,
                                no_zero_rep_long,
                            });
                        }
                    }
                    out.push(PackOptions { no_rep, no_zero_rep, no_zero_rep_long, ..Self::greedy() });
                }
            }
        }
        out
    }
}

/// RLE-pack literal/length and distance code lengths (RFC 1951 section 3.2.7)
///
/// The two arrays are packed as one sequence, so runs may cross from the
/// literal/length lengths into the distance lengths.
pub fn pack_code_lengths(
    litlen_lens: &[u8],
    dist_lens: &[u8],
    opts: &PackOptions,
) -> Vec<CodeLengthSymbol> {
    let lengths: Vec<u8> = litlen_lens.iter().chain(dist_lens).copied().collect();
    let mut out = Vec::with_capacity(lengths.len() / 2);

    let mut i = 0;
    while i < lengths.len() {
        let value = lengths[i];
        let mut run = lengths[i..].iter().take_while(|&&l| l == value).count();
        i += run;

        if value == 0 {
            if !opts.no_zero_rep_long {
                while run >= ZEROS_LONG_MIN {
                    let n = run.min(ZEROS_LONG_MAX);
                    out.push(CodeLengthSymbol::LongZeros { count: n as u8 });
                    run -= n;
                }
            }
            if !opts.no_zero_rep {
                while run >= ZEROS_MIN {
                    let n = run.min(ZEROS_MAX);
                    out.push(CodeLengthSymbol::Zeros { count: n as u8 });
                    run -= n;
                }
            }
        }

        if !opts.no_rep && run > 0 {
            out.push(CodeLengthSymbol::Length(value));
            run -= 1;

            while run >= COPY_MIN {
                let split = match run {
                    8 if opts.combine && opts.use8 => {
                        Some(if opts.alt8 { (5, 3) } else { (4, 4) })
                    }
                    7 if opts.combine && opts.use7 => Some((4, 3)),
                    _ => None,
                };
                if let Some((first, second)) = split {
                    out.push(CodeLengthSymbol::Copy { count: first, value });
                    out.push(CodeLengthSymbol::Copy { count: second, value });
                    run = 0;
                    break;
                }

                let n = run.min(COPY_MAX);
                out.push(CodeLengthSymbol::Copy { count: n as u8, value });
                run -= n;
            }
        }

        out.extend(std::iter::repeat(CodeLengthSymbol::Length(value)).take(run));
    }

    out
}

/// Expand an RLE-packed code length sequence back into code lengths
pub fn unpack_code_lengths(symbols: &[CodeLengthSymbol]) -> Result<Vec<u8>> {
    let mut lengths: Vec<u8> = Vec::with_capacity(symbols.len() * 2);
    for sym in symbols {
        if let CodeLengthSymbol::Copy { value, .. } = sym {
            match lengths.last() {
                Some(prev) if prev == value => {}
                Some(_) => return Err(Error::Internal("copy run does not repeat its predecessor".into())),
                None => return Err(Error::MissingPreviousLength),
            }
        }
        lengths.extend(std::iter::repeat(sym.value()).take(sym.run_len()));
    }
    Ok(lengths)
}
