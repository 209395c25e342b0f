use std::sync::Arc;

use super::block::{BlockType, DeflateBlock};
use super::header::DynamicHeader;
use super::slice::{resolve_backref, History};
use super::stored::{StoredBlock, MAX_STORED_LEN};
use super::tables::{
    decode_distance, decode_length, distance_extra_bits, distance_to_code, encode_distance,
    encode_length, length_extra_bits, END_OF_BLOCK, LENGTH_CODE_OFFSET, MAX_CODE_LENGTH,
    MAX_DISTANCE_SYMBOL, MAX_LITLEN_SYMBOL, NUM_DISTANCE_SYMBOLS, NUM_LITLEN_SYMBOLS,
};
use super::tokens::LitLen;
use crate::bits::{BitReader, BitWriter};
use crate::error::{Error, Result};
use crate::huffman::{Huffman, HuffmanTable, HuffmanTree, PackOptions};

/// Which length code `remove_least_expensive_length` gives up
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PruneMode {
    /// The code whose matches save the fewest bits over literals
    LeastExpensive,
    /// The code used by the fewest matches
    LeastSeen,
}

/// A fixed or dynamic Huffman block
///
/// Tokens and tables are shared between copies until one of them changes,
/// so candidate blocks are cheap to derive. `token_bits` is kept in step with
/// every mutation; [`recompute_size_bits`](Self::recompute_size_bits) derives
/// the whole size from scratch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HuffmanBlock {
    block_type: BlockType,
    litlen: Arc<Huffman>,
    dist: Arc<Huffman>,
    header: Option<DynamicHeader>,
    tokens: Arc<Vec<LitLen>>,
    data: Arc<[u8]>,
    token_bits: u64,
}

impl HuffmanBlock {
    /// A dynamic block over `tokens`, with tables derived from their frequencies
    ///
    /// The tokens must end with the end-of-block marker.
    pub fn from_tokens(tokens: Vec<LitLen>) -> Result<Self> {
        if tokens.last() != Some(&LitLen::EndOfBlock) {
            return Err(Error::Internal("token stream does not end with end of block".into()));
        }
        let data: Vec<u8> = tokens.iter().flat_map(|t| t.decoded().iter().copied()).collect();
        let mut block = Self {
            block_type: BlockType::FixedHuffman,
            litlen: Huffman::fixed_litlen(),
            dist: Huffman::fixed_distance(),
            header: None,
            tokens: Arc::new(tokens),
            data: data.into(),
            token_bits: 0,
        };
        block.recode_huffman()?;
        Ok(block)
    }

    pub fn tokens(&self) -> &[LitLen] {
        &self.tokens
    }

    pub fn data(&self) -> &Arc<[u8]> {
        &self.data
    }

    pub fn header(&self) -> Option<&DynamicHeader> {
        self.header.as_ref()
    }

    pub fn litlen(&self) -> &Huffman {
        &self.litlen
    }

    pub fn dist(&self) -> &Huffman {
        &self.dist
    }

    /// Token bits plus header bits
    pub fn recompute_size_bits(&self) -> u64 {
        self.header.as_ref().map_or(0, DynamicHeader::recompute_size_bits)
            + self.tokens.iter().map(|t| t.cost(&self.litlen, &self.dist)).sum::<u64>()
    }

    fn total_bits(&self) -> u64 {
        self.header.as_ref().map_or(0, DynamicHeader::size_bits) + self.token_bits
    }

    fn is_dynamic(&self) -> bool {
        self.block_type == BlockType::DynamicHuffman
    }

    /// Literal cost of `bytes` under the current table, `None` if a byte has no code
    fn literal_cost(&self, bytes: &[u8]) -> Option<u64> {
        bytes.iter().try_fold(0u64, |acc, &b| match self.litlen.sym_len(b as u16) {
            0 => None,
            len => Some(acc + len as u64),
        })
    }

    /// Replace back-references with literals where that is cheaper under the
    /// current tables, or no dearer when `prune` is set
    ///
    /// Returns bits saved.
    pub fn replace_backrefs_with_literals(&mut self, prune: bool) -> u64 {
        let worth_replacing = |token: &LitLen| -> Option<(u64, u64)> {
            if !token.is_backref() {
                return None;
            }
            let total = self.literal_cost(token.decoded())?;
            let cost = token.cost(&self.litlen, &self.dist);
            let keep = if prune { total > cost } else { total >= cost };
            (!keep).then_some((cost, total))
        };

        if !self.tokens.iter().any(|t| worth_replacing(t).is_some()) {
            return 0;
        }

        let mut saved = 0;
        let mut token_bits = self.token_bits;
        let mut tokens = Vec::with_capacity(self.tokens.len());
        for token in self.tokens.iter() {
            match worth_replacing(token) {
                Some((cost, total)) => {
                    token_bits = token_bits - cost + total;
                    saved += cost - total;
                    tokens.extend(token.decoded().iter().map(|&b| LitLen::Literal(b)));
                }
                None => tokens.push(token.clone()),
            }
        }

        self.tokens = Arc::new(tokens);
        self.token_bits = token_bits;
        saved
    }

    /// Trim the code length alphabet and drop unprofitable header runs
    pub fn optimise_header(&mut self) -> u64 {
        if !self.is_dynamic() {
            return 0;
        }
        match self.header.as_mut() {
            Some(header) => header.trim_codelen_lens() + header.replace_runs_with_literals(false),
            None => 0,
        }
    }

    /// Repack the header for the current tables with the given packing
    pub fn rewrite_header(&mut self, opts: &PackOptions) -> Result<()> {
        if self.is_dynamic() {
            self.header = Some(DynamicHeader::pack(&self.litlen, &self.dist, opts)?);
        }
        Ok(())
    }

    /// Rebuild the header's code length alphabet for its current sequence
    pub fn recode_header(&mut self) -> Result<()> {
        match self.header.as_mut() {
            Some(header) if self.block_type == BlockType::DynamicHuffman => header.recode(),
            _ => Ok(()),
        }
    }

    /// Drop header runs that cost no less than literal lengths, then recode the header
    pub fn recode_header_to_less_rle_matches(&mut self) -> Result<()> {
        if let Some(header) = self.header.as_mut() {
            header.replace_runs_with_literals(true);
        }
        self.recode_header()
    }

    /// Derive new literal/length and distance tables from the token
    /// frequencies; the block becomes dynamic
    pub fn recode_huffman(&mut self) -> Result<()> {
        let mut lit_freq = vec![0u32; NUM_LITLEN_SYMBOLS];
        let mut dist_freq = vec![0u32; NUM_DISTANCE_SYMBOLS];
        for token in self.tokens.iter() {
            lit_freq[token.litlen() as usize] += 1;
            if let LitLen::Backref { distance, .. } = token {
                dist_freq[distance_to_code(*distance) as usize] += 1;
            }
        }
        trim_trailing_zeros(&mut lit_freq);
        trim_trailing_zeros(&mut dist_freq);

        let dist_table = match dist_freq.iter().filter(|&&f| f > 0).count() {
            0 => HuffmanTable::new(1),
            1 => {
                // A single used distance code gets a one-bit code
                let mut table = HuffmanTable::new(dist_freq.len());
                if let Some(last) = table.code_len.last_mut() {
                    *last = 1;
                }
                table
            }
            _ => HuffmanTree::new(&dist_freq, MAX_CODE_LENGTH)?.table(),
        };
        let litlen_table = HuffmanTree::new(&lit_freq, MAX_CODE_LENGTH)?.table();

        self.litlen = Arc::new(Huffman::from_table(litlen_table));
        self.dist = Arc::new(Huffman::from_table(dist_table));
        self.block_type = BlockType::DynamicHuffman;
        self.token_bits = self.token_cost();
        self.rewrite_header(&PackOptions::default())
    }

    /// Replace matches that do not pay for themselves, then derive new tables
    pub fn recode_huffman_less_matches(&mut self) -> Result<()> {
        self.replace_backrefs_with_literals(true);
        self.recode_huffman()
    }

    /// Switch to the fixed tables, dropping the dynamic header
    pub fn recode_to_fixed(&mut self) {
        self.block_type = BlockType::FixedHuffman;
        self.header = None;
        self.litlen = Huffman::fixed_litlen();
        self.dist = Huffman::fixed_distance();
        self.token_bits = self.token_cost();
    }

    /// Give up one length code entirely, turning all of its matches into literals
    ///
    /// Returns whether a code was removed. Tables are left as they are.
    pub fn remove_least_expensive_length(&mut self, mode: PruneMode) -> bool {
        if !self.is_dynamic() {
            return false;
        }

        struct Usage {
            delta: i64,
            seen: u32,
            allowed: bool,
        }
        let num_length_codes = (MAX_LITLEN_SYMBOL - LENGTH_CODE_OFFSET + 1) as usize;
        let mut usage: Vec<Option<Usage>> = (0..num_length_codes).map(|_| None).collect();

        for token in self.tokens.iter().filter(|t| t.is_backref()) {
            let index = (token.litlen() - LENGTH_CODE_OFFSET) as usize;
            let literal = self.literal_cost(token.decoded());
            let cost = token.cost(&self.litlen, &self.dist) as i64;

            let entry =
                usage[index].get_or_insert_with(|| Usage { delta: 0, seen: 0, allowed: true });
            entry.seen += 1;
            match literal {
                Some(total) => entry.delta += total as i64 - cost,
                None => entry.allowed = false,
            }
        }

        // (index, key, delta) of the best code so far; ties keep the lower code
        let mut chosen: Option<(usize, i64, i64)> = None;
        for (index, entry) in usage.iter().enumerate() {
            let Some(entry) = entry else { continue };
            if !entry.allowed {
                continue;
            }
            let key = match mode {
                PruneMode::LeastExpensive => entry.delta,
                PruneMode::LeastSeen => entry.seen as i64,
            };
            if chosen.map_or(true, |(_, best, _)| key < best) {
                chosen = Some((index, key, entry.delta));
            }
        }

        let Some((index, _, delta)) = chosen else { return false };
        let symbol = LENGTH_CODE_OFFSET + index as u16;

        let tokens: Vec<LitLen> = self
            .tokens
            .iter()
            .flat_map(|token| {
                if token.is_backref() && token.litlen() == symbol {
                    token.decoded().iter().map(|&b| LitLen::Literal(b)).collect::<Vec<_>>()
                } else {
                    vec![token.clone()]
                }
            })
            .collect();

        self.tokens = Arc::new(tokens);
        self.token_bits = (self.token_bits as i64 + delta) as u64;
        true
    }

    /// The same bytes as a stored block, if they fit in one
    pub fn to_stored(&self) -> Option<StoredBlock> {
        if self.data.len() > MAX_STORED_LEN {
            return None;
        }
        StoredBlock::new(self.data.clone()).ok()
    }

    /// One dynamic block carrying this block's tokens followed by `next`'s
    pub fn concat(&self, next: &HuffmanBlock) -> Result<HuffmanBlock> {
        let mut tokens = Vec::with_capacity(self.tokens.len() + next.tokens.len());
        tokens.extend(self.tokens.iter().filter(|t| **t != LitLen::EndOfBlock).cloned());
        tokens.extend(next.tokens.iter().cloned());

        let mut data = Vec::with_capacity(self.data.len() + next.data.len());
        data.extend_from_slice(&self.data);
        data.extend_from_slice(&next.data);

        let mut block = Self {
            block_type: BlockType::DynamicHuffman,
            litlen: self.litlen.clone(),
            dist: self.dist.clone(),
            header: None,
            tokens: Arc::new(tokens),
            data: data.into(),
            token_bits: 0,
        };
        block.recode_huffman()?;
        Ok(block)
    }

    fn token_cost(&self) -> u64 {
        self.tokens.iter().map(|t| t.cost(&self.litlen, &self.dist)).sum()
    }

    fn write_tokens(&self, writer: &mut BitWriter) -> Result<()> {
        for token in self.tokens.iter() {
            let sym = token.litlen();
            let len = self.litlen.sym_len(sym);
            if len == 0 {
                return Err(Error::MissingCode(sym));
            }
            writer.write_bits(self.litlen.sym(sym) as u64, len);

            if let LitLen::Backref { length, distance, .. } = token {
                let (_, extra, extra_bits) =
                    encode_length(*length).ok_or(Error::InvalidLengthCode(sym))?;
                if extra_bits > 0 {
                    writer.write_bits(extra as u64, extra_bits);
                }

                let (code, extra, extra_bits) =
                    encode_distance(*distance).ok_or(Error::InvalidDistanceCode(0))?;
                let len = self.dist.sym_len(code);
                if len == 0 {
                    return Err(Error::MissingCode(code));
                }
                writer.write_bits(self.dist.sym(code) as u64, len);
                if extra_bits > 0 {
                    writer.write_bits(extra as u64, extra_bits);
                }
            }
        }
        Ok(())
    }
}

fn trim_trailing_zeros(freq: &mut Vec<u32>) {
    while freq.last() == Some(&0) {
        freq.pop();
    }
}

impl DeflateBlock for HuffmanBlock {
    fn parse(
        bits: &mut BitReader<'_>,
        block_type: BlockType,
        history: &History<'_>,
    ) -> Result<Self> {
        let (litlen, dist, header) = match block_type {
            BlockType::FixedHuffman => (Huffman::fixed_litlen(), Huffman::fixed_distance(), None),
            BlockType::DynamicHuffman => {
                let (header, lengths) = DynamicHeader::parse(bits)?;
                let litlen = Arc::new(Huffman::from_lengths(&lengths.litlen)?);
                let dist = Arc::new(Huffman::from_lengths(&lengths.dist)?);
                (litlen, dist, Some(header))
            }
            BlockType::Stored => {
                return Err(Error::Internal("stored block parsed as Huffman".into()));
            }
        };

        let mut data: Vec<u8> = Vec::new();
        let mut tokens = Vec::new();
        let mut token_bits = 0u64;

        loop {
            let decoded = litlen.read_sym(bits)?;
            let sym = decoded.symbol;
            token_bits += decoded.len as u64;

            match sym {
                0..=255 => {
                    data.push(sym as u8);
                    tokens.push(LitLen::Literal(sym as u8));
                }
                END_OF_BLOCK => {
                    tokens.push(LitLen::EndOfBlock);
                    break;
                }
                LENGTH_CODE_OFFSET..=MAX_LITLEN_SYMBOL => {
                    let extra_bits = length_extra_bits(sym);
                    let extra = bits.read_bits(extra_bits)? as u32;
                    let length = decode_length(sym, extra).ok_or(Error::InvalidLengthCode(sym))?;

                    let dist_decoded = dist.read_sym(bits)?;
                    let dist_sym = dist_decoded.symbol;
                    if dist_sym > MAX_DISTANCE_SYMBOL {
                        return Err(Error::InvalidDistanceCode(dist_sym));
                    }
                    let dist_extra_bits = distance_extra_bits(dist_sym);
                    let dist_extra = bits.read_bits(dist_extra_bits)? as u32;
                    let distance = decode_distance(dist_sym, dist_extra)
                        .ok_or(Error::InvalidDistanceCode(dist_sym))?;

                    token_bits += extra_bits as u64 + dist_decoded.len as u64 + dist_extra_bits as u64;

                    let payload = resolve_backref(&data, history, distance, length)?;
                    data.extend_from_slice(&payload);
                    tokens.push(LitLen::Backref { length, distance, payload: payload.into() });
                }
                _ => return Err(Error::InvalidLengthCode(sym)),
            }
        }

        Ok(Self {
            block_type,
            litlen,
            dist,
            header,
            tokens: Arc::new(tokens),
            data: data.into(),
            token_bits,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<()> {
        if let Some(header) = &self.header {
            header.write(writer)?;
        }
        self.write_tokens(writer)
    }

    fn size_bits(&self, _position: u64) -> u64 {
        self.total_bits()
    }

    fn uncompressed_data(&self) -> &[u8] {
        &self.data
    }

    fn block_type(&self) -> BlockType {
        self.block_type
    }

    /// Replace unprofitable matches, then tidy the header
    fn optimise(&mut self) -> u64 {
        if !self.is_dynamic() {
            return 0;
        }
        self.replace_backrefs_with_literals(false) + self.optimise_header()
    }
}
