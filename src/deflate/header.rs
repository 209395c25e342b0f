use std::sync::Arc;

use super::tables::{
    CODE_LENGTH_ORDER, CODELEN_COPY, CODELEN_MAX_LITERAL, CODELEN_ZEROS, CODELEN_ZEROS_LONG,
    COPY_MIN, MAX_CODELEN_CODE_LENGTH, MAX_CODELEN_LENS, MIN_CODELEN_LENS, MIN_DIST_LENS,
    MIN_LITLEN_LENS, ZEROS_LONG_MIN, ZEROS_MIN,
};
use super::tokens::CodeLengthSymbol;
use crate::bits::{BitReader, BitWriter};
use crate::error::{Error, Result};
use crate::huffman::{pack_code_lengths, Huffman, HuffmanTree, PackOptions};

/// HLIT (5) + HDIST (5) + HCLEN (4)
const COUNT_FIELD_BITS: u64 = 14;
/// Each transmitted code length alphabet length
const CODELEN_LEN_BITS: u64 = 3;

/// Dynamic block header: the code length alphabet and the RLE-packed
/// literal/length and distance code lengths
///
/// `size_bits` is maintained alongside every mutation;
/// [`recompute_size_bits`](Self::recompute_size_bits) derives it from scratch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DynamicHeader {
    num_litlen_lens: usize,
    num_dist_lens: usize,
    num_codelen_lens: usize,
    codelen: Arc<Huffman>,
    pairs: Arc<Vec<CodeLengthSymbol>>,
    size_bits: u64,
}

/// Code lengths carried by a parsed header
pub struct HeaderLengths {
    pub litlen: Vec<u8>,
    pub dist: Vec<u8>,
}

impl DynamicHeader {
    /// Parse a dynamic header; the 3-bit block header is already consumed
    pub fn parse(bits: &mut BitReader<'_>) -> Result<(Self, HeaderLengths)> {
        let num_litlen_lens = bits.read_bits(5)? as usize + MIN_LITLEN_LENS;
        let num_dist_lens = bits.read_bits(5)? as usize + MIN_DIST_LENS;
        let num_codelen_lens = bits.read_bits(4)? as usize + MIN_CODELEN_LENS;

        let mut codelen_lens = [0u8; MAX_CODELEN_LENS];
        for &index in &CODE_LENGTH_ORDER[..num_codelen_lens] {
            codelen_lens[index] = bits.read_bits(3)? as u8;
        }
        let codelen = Arc::new(Huffman::from_lengths(&codelen_lens)?);

        let declared = num_litlen_lens + num_dist_lens;
        let mut lengths: Vec<u8> = Vec::with_capacity(declared);
        let mut pairs = Vec::new();

        while lengths.len() < declared {
            let sym = codelen.read_sym(bits)?.symbol;
            let pair = match sym {
                0..=CODELEN_MAX_LITERAL => CodeLengthSymbol::Length(sym as u8),
                CODELEN_COPY => {
                    let count = bits.read_bits(2)? as u8 + COPY_MIN as u8;
                    let value = *lengths.last().ok_or(Error::MissingPreviousLength)?;
                    CodeLengthSymbol::Copy { count, value }
                }
                CODELEN_ZEROS => {
                    CodeLengthSymbol::Zeros { count: bits.read_bits(3)? as u8 + ZEROS_MIN as u8 }
                }
                CODELEN_ZEROS_LONG => CodeLengthSymbol::LongZeros {
                    count: bits.read_bits(7)? as u8 + ZEROS_LONG_MIN as u8,
                },
                _ => return Err(Error::InvalidCodeLengthSymbol(sym)),
            };

            let decoded = lengths.len() + pair.run_len();
            if decoded > declared {
                return Err(Error::CodeLengthOverflow { declared, decoded });
            }
            lengths.extend(std::iter::repeat(pair.value()).take(pair.run_len()));
            pairs.push(pair);
        }

        let dist = lengths.split_off(num_litlen_lens);
        let mut header = Self {
            num_litlen_lens,
            num_dist_lens,
            num_codelen_lens,
            codelen,
            pairs: Arc::new(pairs),
            size_bits: 0,
        };
        header.size_bits = header.recompute_size_bits();

        Ok((header, HeaderLengths { litlen: lengths, dist }))
    }

    /// Build a fresh header transmitting the given tables
    ///
    /// The code length alphabet is derived from the packed sequence and
    /// trailing unused entries are trimmed.
    pub fn pack(litlen: &Huffman, dist: &Huffman, opts: &PackOptions) -> Result<Self> {
        let pairs = pack_code_lengths(litlen.code_lengths(), dist.code_lengths(), opts);
        let mut header = Self {
            num_litlen_lens: litlen.num_symbols(),
            num_dist_lens: dist.num_symbols(),
            num_codelen_lens: MAX_CODELEN_LENS,
            codelen: codelen_alphabet(&pairs)?,
            pairs: Arc::new(pairs),
            size_bits: 0,
        };
        header.size_bits = header.recompute_size_bits();
        header.trim_codelen_lens();
        Ok(header)
    }

    /// Rebuild the code length alphabet for the current pair sequence
    pub fn recode(&mut self) -> Result<()> {
        self.codelen = codelen_alphabet(&self.pairs)?;
        self.num_codelen_lens = MAX_CODELEN_LENS;
        self.size_bits = self.recompute_size_bits();
        self.trim_codelen_lens();
        Ok(())
    }

    /// Drop trailing zero entries from the transmitted code length alphabet
    ///
    /// Returns bits saved.
    pub fn trim_codelen_lens(&mut self) -> u64 {
        let mut saved = 0;
        while self.num_codelen_lens > MIN_CODELEN_LENS
            && self.codelen.sym_len(CODE_LENGTH_ORDER[self.num_codelen_lens - 1] as u16) == 0
        {
            self.num_codelen_lens -= 1;
            saved += CODELEN_LEN_BITS;
        }
        self.size_bits -= saved;
        saved
    }

    /// Replace RLE runs with literal lengths where that is cheaper under the
    /// current code length alphabet, or no dearer when `prune` is set
    ///
    /// Returns bits saved.
    pub fn replace_runs_with_literals(&mut self, prune: bool) -> u64 {
        let codelen = &self.codelen;
        let worth_replacing = |pair: &CodeLengthSymbol| -> Option<(u64, u64)> {
            if !pair.is_run() {
                return None;
            }
            let literal_len = codelen.sym_len(pair.value() as u16) as u64;
            if literal_len == 0 {
                return None;
            }
            let cost = pair.cost(codelen);
            let total = literal_len * pair.run_len() as u64;
            let keep = if prune { total > cost } else { total >= cost };
            (!keep).then_some((cost, total))
        };

        if !self.pairs.iter().any(|p| worth_replacing(p).is_some()) {
            return 0;
        }

        let mut saved = 0;
        let mut size = self.size_bits;
        let mut pairs = Vec::with_capacity(self.pairs.len());
        for pair in self.pairs.iter() {
            match worth_replacing(pair) {
                Some((cost, total)) => {
                    size = size - cost + total;
                    saved += cost - total;
                    pairs.extend(
                        std::iter::repeat(CodeLengthSymbol::Length(pair.value())).take(pair.run_len()),
                    );
                }
                None => pairs.push(*pair),
            }
        }

        self.pairs = Arc::new(pairs);
        self.size_bits = size;
        saved
    }

    /// Write the header; the 3-bit block header is written by the caller
    pub fn write(&self, writer: &mut BitWriter) -> Result<()> {
        writer.write_bits((self.num_litlen_lens - MIN_LITLEN_LENS) as u64, 5);
        writer.write_bits((self.num_dist_lens - MIN_DIST_LENS) as u64, 5);
        writer.write_bits((self.num_codelen_lens - MIN_CODELEN_LENS) as u64, 4);

        for &index in &CODE_LENGTH_ORDER[..self.num_codelen_lens] {
            writer.write_bits(self.codelen.sym_len(index as u16) as u64, 3);
        }

        for pair in self.pairs.iter() {
            let sym = pair.symbol();
            let len = self.codelen.sym_len(sym);
            if len == 0 {
                return Err(Error::MissingCode(sym));
            }
            writer.write_bits(self.codelen.sym(sym) as u64, len);
            let (extra, extra_bits) = pair.extra();
            if extra_bits > 0 {
                writer.write_bits(extra, extra_bits);
            }
        }
        Ok(())
    }

    /// Header size in bits, excluding the 3-bit block header
    pub fn size_bits(&self) -> u64 {
        self.size_bits
    }

    pub fn recompute_size_bits(&self) -> u64 {
        COUNT_FIELD_BITS
            + CODELEN_LEN_BITS * self.num_codelen_lens as u64
            + self.pairs.iter().map(|p| p.cost(&self.codelen)).sum::<u64>()
    }

    pub fn pairs(&self) -> &[CodeLengthSymbol] {
        &self.pairs
    }

    pub fn num_codelen_lens(&self) -> usize {
        self.num_codelen_lens
    }

    pub fn num_litlen_lens(&self) -> usize {
        self.num_litlen_lens
    }

    pub fn num_dist_lens(&self) -> usize {
        self.num_dist_lens
    }

    /// Number of RLE run symbols (16, 17, 18) in the sequence
    pub fn num_runs(&self) -> usize {
        self.pairs.iter().filter(|p| p.is_run()).count()
    }
}

/// Length-limited code for the symbols a pair sequence uses
fn codelen_alphabet(pairs: &[CodeLengthSymbol]) -> Result<Arc<Huffman>> {
    let mut freq = [0u32; MAX_CODELEN_LENS];
    for pair in pairs {
        freq[pair.symbol() as usize] += 1;
    }
    let table = HuffmanTree::new(&freq, MAX_CODELEN_CODE_LENGTH)?.table();
    Ok(Arc::new(Huffman::from_table(table)))
}
