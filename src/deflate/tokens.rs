use std::sync::Arc;

use super::tables::{
    distance_extra_bits, distance_to_code, length_extra_bits, length_to_litlen, CODELEN_COPY,
    CODELEN_ZEROS, CODELEN_ZEROS_LONG, COPY_MIN, END_OF_BLOCK, ZEROS_LONG_MIN, ZEROS_MIN,
};
use crate::huffman::Huffman;

/// A single entry in a Huffman block's symbol stream
///
/// Back-references carry the bytes they decode to, so a block can be
/// re-encoded (or have matches replaced by literals) without consulting
/// the sliding window again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LitLen {
    /// A literal byte
    Literal(u8),
    /// End of block marker
    EndOfBlock,
    /// Copy `length` bytes from `distance` bytes back
    Backref { length: u16, distance: u16, payload: Arc<[u8]> },
}

impl LitLen {
    /// Symbol in the literal/length alphabet (0-285)
    #[inline]
    pub fn litlen(&self) -> u16 {
        match self {
            LitLen::Literal(b) => *b as u16,
            LitLen::EndOfBlock => END_OF_BLOCK,
            LitLen::Backref { length, .. } => length_to_litlen(*length),
        }
    }

    /// Back-reference distance, 0 for literals and end of block
    #[inline]
    pub fn distance(&self) -> u16 {
        match self {
            LitLen::Backref { distance, .. } => *distance,
            _ => 0,
        }
    }

    pub fn is_backref(&self) -> bool {
        matches!(self, LitLen::Backref { .. })
    }

    /// Bytes this token expands to
    pub fn decoded(&self) -> &[u8] {
        match self {
            LitLen::Literal(b) => std::slice::from_ref(b),
            LitLen::EndOfBlock => &[],
            LitLen::Backref { payload, .. } => payload,
        }
    }

    /// Encoded size in bits under the given tables
    ///
    /// A symbol without a code costs 0 bits; callers that write must check
    /// for missing codes separately.
    pub fn cost(&self, litlen: &Huffman, dist: &Huffman) -> u64 {
        match self {
            LitLen::Backref { distance, .. } => {
                let sym = self.litlen();
                let dist_code = distance_to_code(*distance);
                litlen.sym_len(sym) as u64
                    + length_extra_bits(sym) as u64
                    + dist.sym_len(dist_code) as u64
                    + distance_extra_bits(dist_code) as u64
            }
            _ => litlen.sym_len(self.litlen()) as u64,
        }
    }
}

/// One entry of a dynamic header's RLE-packed code length sequence
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CodeLengthSymbol {
    /// A literal code length (symbols 0-15)
    Length(u8),
    /// Symbol 16: repeat the previous length `count` (3-6) times
    Copy { count: u8, value: u8 },
    /// Symbol 17: `count` (3-10) zero lengths
    Zeros { count: u8 },
    /// Symbol 18: `count` (11-138) zero lengths
    LongZeros { count: u8 },
}

impl CodeLengthSymbol {
    /// Symbol in the code length alphabet (0-18)
    #[inline]
    pub fn symbol(&self) -> u16 {
        match self {
            CodeLengthSymbol::Length(v) => *v as u16,
            CodeLengthSymbol::Copy { .. } => CODELEN_COPY,
            CodeLengthSymbol::Zeros { .. } => CODELEN_ZEROS,
            CodeLengthSymbol::LongZeros { .. } => CODELEN_ZEROS_LONG,
        }
    }

    /// The code length value this entry expands to
    #[inline]
    pub fn value(&self) -> u8 {
        match self {
            CodeLengthSymbol::Length(v) => *v,
            CodeLengthSymbol::Copy { value, .. } => *value,
            CodeLengthSymbol::Zeros { .. } | CodeLengthSymbol::LongZeros { .. } => 0,
        }
    }

    /// Number of code lengths this entry expands to
    #[inline]
    pub fn run_len(&self) -> usize {
        match self {
            CodeLengthSymbol::Length(_) => 1,
            CodeLengthSymbol::Copy { count, .. }
            | CodeLengthSymbol::Zeros { count }
            | CodeLengthSymbol::LongZeros { count } => *count as usize,
        }
    }

    pub fn is_run(&self) -> bool {
        !matches!(self, CodeLengthSymbol::Length(_))
    }

    /// Extra bits following the symbol: (value, bit count)
    pub fn extra(&self) -> (u64, u8) {
        match self {
            CodeLengthSymbol::Length(_) => (0, 0),
            CodeLengthSymbol::Copy { count, .. } => ((*count as usize - COPY_MIN) as u64, 2),
            CodeLengthSymbol::Zeros { count } => ((*count as usize - ZEROS_MIN) as u64, 3),
            CodeLengthSymbol::LongZeros { count } => {
                ((*count as usize - ZEROS_LONG_MIN) as u64, 7)
            }
        }
    }

    /// Encoded size in bits under the code length table
    pub fn cost(&self, codelen: &Huffman) -> u64 {
        codelen.sym_len(self.symbol()) as u64 + self.extra().1 as u64
    }
}
