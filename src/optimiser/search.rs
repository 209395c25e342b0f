//! Candidate generation for a single block
//!
//! Every candidate is derived from a copy of the block, scored at the block's
//! bit position, and only a strictly smaller one replaces the original.

use crate::deflate::block::{Block, BlockType, DeflateBlock, BLOCK_HEADER_BITS};
use crate::deflate::huffman_block::{HuffmanBlock, PruneMode};
use crate::deflate::tokens::LitLen;
use crate::error::Result;
use crate::huffman::PackOptions;
use crate::optimiser::diagnostics::Diagnostics;
use crate::OptimiseConfig;

/// Scores candidates and keeps the smallest
struct Search<'a> {
    position: u64,
    best_bits: u64,
    best: Option<Block>,
    headers: Vec<PackOptions>,
    diagnostics: &'a mut dyn Diagnostics,
}

impl<'a> Search<'a> {
    fn new(
        position: u64,
        original_bits: u64,
        config: &OptimiseConfig,
        diagnostics: &'a mut dyn Diagnostics,
    ) -> Self {
        let headers = if config.exhaustive_headers {
            PackOptions::variants()
        } else {
            vec![PackOptions::default()]
        };
        Self { position, best_bits: original_bits, best: None, headers, diagnostics }
    }

    fn offer(&mut self, label: &'static str, block: impl Into<Block>) {
        let block = block.into();
        let bits = block.size_bits(self.position);
        self.diagnostics.candidate(label, bits);
        if bits < self.best_bits {
            self.best_bits = bits;
            self.best = Some(block);
        }
    }

    /// Keep a candidate built by a fallible transformation
    fn offer_result(&mut self, label: &'static str, block: Result<HuffmanBlock>) {
        match block {
            Ok(block) => self.offer(label, block),
            Err(e) => log::trace!("candidate {label} skipped: {e}"),
        }
    }

    /// Every header packing of `base`, with and without pruned header runs
    fn header_variants(&mut self, base: &HuffmanBlock) {
        if base.block_type() != BlockType::DynamicHuffman {
            return;
        }
        let headers = std::mem::take(&mut self.headers);
        for opts in &headers {
            for prune in [false, true] {
                let variant = with(base, |b| {
                    b.rewrite_header(opts)?;
                    if prune {
                        b.recode_header_to_less_rle_matches()?;
                    }
                    b.optimise_header();
                    Ok(())
                });
                self.offer_result("header", variant);
            }
        }
        self.headers = headers;
    }

    /// Header packings over the optimised block and its re-derived tables
    fn add_optimised_recoded(&mut self, block: &HuffmanBlock) {
        self.header_variants(&optimised(block));

        if let Ok(recoded) = with(block, HuffmanBlock::recode_huffman) {
            self.header_variants(&optimised(&recoded));
        }

        if let Ok(pruned) = with(block, HuffmanBlock::recode_huffman_less_matches) {
            self.header_variants(&optimised(&pruned));
            if let Ok(full) = pruned_full(block) {
                if full != pruned {
                    self.header_variants(&optimised(&full));
                }
            }
        }
    }

    fn run_opt(&mut self, block: &HuffmanBlock) {
        if let Ok(post) = with(block, HuffmanBlock::recode_header) {
            self.offer("recoded header", post.clone());
            self.offer("recoded header, optimised", optimised(&post));
            self.add_optimised_recoded(&post);
        }

        if let Ok(pruned) = with(block, HuffmanBlock::recode_header_to_less_rle_matches) {
            self.offer("pruned header", pruned.clone());
            self.offer("pruned header, optimised", optimised(&pruned));
            self.add_optimised_recoded(&pruned);
        }

        for mode in [PruneMode::LeastExpensive, PruneMode::LeastSeen] {
            if let Some(pruned) = without_length(block, mode) {
                self.add_optimised_recoded(&pruned);
            }
        }
    }

    fn multi(&mut self, block: &HuffmanBlock) {
        self.offer("base", block.clone());
        self.run_opt(block);

        if let Ok(recoded) = with(block, HuffmanBlock::recode_huffman) {
            self.offer("recoded", recoded.clone());
            self.run_opt(&recoded);
        }

        if let Ok(pruned) = with(block, HuffmanBlock::recode_huffman_less_matches) {
            self.offer("recoded, fewer matches", pruned.clone());
            self.run_opt(&pruned);

            if let Ok(full) = pruned_full(block) {
                if full != pruned {
                    self.offer("recoded, fewest matches", full.clone());
                    self.run_opt(&full);
                }
            }
        }
    }

    fn huffman(&mut self, origin: &HuffmanBlock) {
        let mut optimised_origin = origin.clone();
        if DeflateBlock::optimise(&mut optimised_origin) > 0 {
            self.offer("optimised", optimised_origin.clone());
        }
        if let Some(stored) = origin.to_stored() {
            self.offer("uncompressed", stored);
        }

        let (base, optimised_huffman) = if origin.block_type() == BlockType::DynamicHuffman {
            (origin.clone(), optimised_origin)
        } else {
            match with(origin, HuffmanBlock::recode_huffman) {
                Ok(base) => {
                    let optimised_base = optimised(&base);
                    (base, optimised_base)
                }
                Err(e) => {
                    log::trace!("block cannot be recoded: {e}");
                    return;
                }
            }
        };

        self.multi(&base);
        self.multi(&optimised_huffman);

        if origin.block_type() != BlockType::FixedHuffman {
            let mut fixed = base.clone();
            fixed.recode_to_fixed();
            DeflateBlock::optimise(&mut fixed);
            self.offer("fixed", fixed);
        }

        for mode in [PruneMode::LeastExpensive, PruneMode::LeastSeen] {
            if let Some(pruned) = without_length(&base, mode) {
                self.multi(&pruned);
            }
        }
    }

    /// A stored block tried as literals under fixed and derived tables
    fn stored(&mut self, data: &[u8]) {
        let mut tokens: Vec<LitLen> = data.iter().map(|&b| LitLen::Literal(b)).collect();
        tokens.push(LitLen::EndOfBlock);
        let base = match HuffmanBlock::from_tokens(tokens) {
            Ok(block) => block,
            Err(e) => {
                log::trace!("stored block cannot be recoded: {e}");
                return;
            }
        };

        let mut fixed = base.clone();
        fixed.recode_to_fixed();
        self.offer("fixed", fixed);
        self.offer("literals", base.clone());
        self.run_opt(&base);
    }
}

/// Copy `block`, apply `f`, and return the copy
fn with<F>(block: &HuffmanBlock, f: F) -> Result<HuffmanBlock>
where
    F: FnOnce(&mut HuffmanBlock) -> Result<()>,
{
    let mut copy = block.clone();
    f(&mut copy)?;
    Ok(copy)
}

fn optimised(block: &HuffmanBlock) -> HuffmanBlock {
    let mut copy = block.clone();
    DeflateBlock::optimise(&mut copy);
    copy
}

fn without_length(block: &HuffmanBlock, mode: PruneMode) -> Option<HuffmanBlock> {
    let mut copy = block.clone();
    copy.remove_least_expensive_length(mode).then_some(copy)
}

/// Repeat recoding with fewer matches while the block keeps shrinking
fn pruned_full(block: &HuffmanBlock) -> Result<HuffmanBlock> {
    let mut current = with(block, HuffmanBlock::recode_huffman_less_matches)?;
    loop {
        let next = with(&current, HuffmanBlock::recode_huffman_less_matches)?;
        if next.size_bits(0) < current.size_bits(0) {
            current = next;
        } else {
            return Ok(current);
        }
    }
}

/// The smallest encoding found for `block` at bit `position`, if it beats the block
pub fn optimise_block(
    block: &Block,
    position: u64,
    config: &OptimiseConfig,
    diagnostics: &mut dyn Diagnostics,
) -> Option<Block> {
    let mut search = Search::new(position, block.size_bits(position), config, diagnostics);
    match block {
        Block::Huffman(huffman) => search.huffman(huffman),
        Block::Stored(stored) => search.stored(stored.data()),
    }
    search.best
}

/// One block standing in for `first` followed by `second`, if that is smaller
///
/// `position` is where `first` starts, after its block header.
pub fn merge_blocks(
    first: &Block,
    second: &Block,
    position: u64,
    config: &OptimiseConfig,
    diagnostics: &mut dyn Diagnostics,
) -> Option<Block> {
    let first_bits = first.size_bits(position);
    let second_bits = second.size_bits(position + first_bits + BLOCK_HEADER_BITS);
    let separate = first_bits + BLOCK_HEADER_BITS + second_bits;

    let merged: Block = match (first, second) {
        (Block::Huffman(a), Block::Huffman(b)) => match a.concat(b) {
            Ok(block) => block.into(),
            Err(e) => {
                log::trace!("merge skipped: {e}");
                return None;
            }
        },
        (Block::Stored(a), Block::Stored(b)) => a.concat(b)?.into(),
        _ => return None,
    };

    let merged = optimise_block(&merged, position, config, diagnostics).unwrap_or(merged);
    (merged.size_bits(position) < separate).then_some(merged)
}
