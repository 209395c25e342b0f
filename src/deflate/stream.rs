use std::fmt;
use std::sync::Arc;

use super::block::{Block, BlockType, DeflateBlock, BLOCK_HEADER_BITS};
use super::slice::History;
use crate::bits::{BitReader, BitWriter};
use crate::error::{Error, Result};
use crate::optimiser::diagnostics::{Diagnostics, NoopDiagnostics};
use crate::optimiser::search::{merge_blocks, optimise_block};
use crate::OptimiseConfig;

/// Stable handle to a block in a [`Stream`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(usize);

#[derive(Clone, Debug)]
struct Node {
    block: Block,
    prev: Option<BlockId>,
    next: Option<BlockId>,
}

/// A raw DEFLATE stream held as a chain of blocks
///
/// Blocks live in an arena and link to their neighbours by [`BlockId`], so
/// replacing or unlinking one block leaves every other handle valid. The
/// last block in the chain is the final block.
#[derive(Clone, Debug, Default)]
pub struct Stream {
    nodes: Vec<Option<Node>>,
    first: Option<BlockId>,
    last: Option<BlockId>,
    len: usize,
    name: String,
}

/// Summary of one block, as listed by [`Stream::block_info`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    pub index: usize,
    /// Bit offset of the block header
    pub position: u64,
    /// Size including the block header
    pub size_bits: u64,
    pub block_type: BlockType,
    pub uncompressed_len: usize,
}

impl fmt::Display for BlockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "block {:>4} @ bit {:>10}: {:<7} {:>10} bits, {:>6} bytes",
            self.index, self.position, self.block_type, self.size_bits, self.uncompressed_len
        )
    }
}

impl Stream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a complete raw DEFLATE stream
    ///
    /// Parsing stops after the block with the final flag set; bytes after it
    /// are ignored.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        Self::parse_named(bytes, "")
    }

    /// Parse, tagging the stream with a name used in diagnostics
    pub fn parse_named(bytes: &[u8], name: impl Into<String>) -> Result<Self> {
        let mut stream = Self { name: name.into(), ..Self::default() };
        let mut bits = BitReader::new(bytes);
        let mut payloads: Vec<Arc<[u8]>> = Vec::new();

        loop {
            let is_final = bits.read_bit()?;
            let block_type = BlockType::from_bits(bits.read_bits(2)? as u8)?;

            let history = History::from_blocks(payloads.iter().map(|p| &p[..]));
            let block = Block::parse(&mut bits, block_type, &history)?;
            payloads.push(Arc::clone(block.data()));
            stream.push_back(block);

            if is_final {
                break;
            }
        }

        log::debug!(
            "{}: parsed {} blocks, {} bits",
            stream.name,
            stream.len(),
            stream.size_bits()
        );
        Ok(stream)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn first(&self) -> Option<BlockId> {
        self.first
    }

    pub fn last(&self) -> Option<BlockId> {
        self.last
    }

    pub fn next(&self, id: BlockId) -> Option<BlockId> {
        self.node(id).and_then(|n| n.next)
    }

    pub fn prev(&self, id: BlockId) -> Option<BlockId> {
        self.node(id).and_then(|n| n.prev)
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.node(id).map(|n| &n.block)
    }

    fn node(&self, id: BlockId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: BlockId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Append a block at the end of the chain
    pub fn push_back(&mut self, block: Block) -> BlockId {
        let id = BlockId(self.nodes.len());
        self.nodes.push(Some(Node { block, prev: self.last, next: None }));
        match self.last {
            Some(last) => {
                if let Some(node) = self.node_mut(last) {
                    node.next = Some(id);
                }
            }
            None => self.first = Some(id),
        }
        self.last = Some(id);
        self.len += 1;
        id
    }

    /// Swap in a new block in place, returning the old one
    pub fn replace(&mut self, id: BlockId, block: Block) -> Option<Block> {
        self.node_mut(id).map(|node| std::mem::replace(&mut node.block, block))
    }

    /// Unlink a block from the chain
    pub fn remove(&mut self, id: BlockId) -> Option<Block> {
        let node = self.nodes.get_mut(id.0)?.take()?;

        match node.prev {
            Some(prev) => {
                if let Some(p) = self.node_mut(prev) {
                    p.next = node.next;
                }
            }
            None => self.first = node.next,
        }
        match node.next {
            Some(next) => {
                if let Some(n) = self.node_mut(next) {
                    n.prev = node.prev;
                }
            }
            None => self.last = node.prev,
        }

        self.len -= 1;
        Some(node.block)
    }

    /// Blocks in stream order
    pub fn iter(&self) -> impl Iterator<Item = (BlockId, &Block)> + '_ {
        let mut cursor = self.first;
        std::iter::from_fn(move || {
            let id = cursor?;
            let node = self.node(id)?;
            cursor = node.next;
            Some((id, &node.block))
        })
    }

    /// Serialise the chain; the last block carries the final flag
    pub fn write(&self) -> Result<Vec<u8>> {
        if self.is_empty() {
            return Err(Error::EmptyStream);
        }

        let mut writer = BitWriter::with_capacity((self.size_bits() / 8 + 1) as usize);
        for (id, block) in self.iter() {
            let is_final = self.next(id).is_none();
            writer.write_bit(is_final);
            writer.write_bits(block.block_type().bits() as u64, 2);
            block.write(&mut writer)?;
        }
        Ok(writer.finish())
    }

    /// Exact encoded size in bits, block headers and stored-block padding included
    pub fn size_bits(&self) -> u64 {
        self.iter().fold(0, |position, (_, block)| {
            let start = position + BLOCK_HEADER_BITS;
            start + block.size_bits(start)
        })
    }

    /// Decoded bytes of every block, in order
    pub fn uncompressed_data(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (_, block) in self.iter() {
            out.extend_from_slice(block.uncompressed_data());
        }
        out
    }

    pub fn block_info(&self) -> Vec<BlockInfo> {
        let mut position = 0;
        self.iter()
            .enumerate()
            .map(|(index, (_, block))| {
                let body = block.size_bits(position + BLOCK_HEADER_BITS);
                let info = BlockInfo {
                    index,
                    position,
                    size_bits: body + BLOCK_HEADER_BITS,
                    block_type: block.block_type(),
                    uncompressed_len: block.uncompressed_data().len(),
                };
                position += info.size_bits;
                info
            })
            .collect()
    }

    /// Re-encode every block in place until a full pass changes nothing
    ///
    /// Returns bits saved.
    pub fn optimise(&mut self) -> u64 {
        self.optimise_with(&OptimiseConfig::default(), &mut NoopDiagnostics)
    }

    pub fn optimise_with(
        &mut self,
        config: &OptimiseConfig,
        diagnostics: &mut dyn Diagnostics,
    ) -> u64 {
        let initial = self.size_bits();
        let mut pass = 0;

        loop {
            pass += 1;
            let changed = self.optimise_pass(config, diagnostics);
            diagnostics.pass_finished(pass, changed);
            if !changed || (config.max_passes > 0 && pass >= config.max_passes) {
                break;
            }
        }

        let saved = initial.saturating_sub(self.size_bits());
        log::debug!("{}: saved {} bits in {} passes", self.name, saved, pass);
        saved
    }

    /// One left-to-right pass; returns whether any block changed
    fn optimise_pass(&mut self, config: &OptimiseConfig, diagnostics: &mut dyn Diagnostics) -> bool {
        let mut changed = false;
        let mut position = 0u64;
        let mut index = 0usize;
        let mut cursor = self.first;

        while let Some(id) = cursor {
            let Some(block) = self.block(id) else { break };

            if block.is_empty() && self.len > 1 {
                let bits = BLOCK_HEADER_BITS + block.size_bits(position + BLOCK_HEADER_BITS);
                cursor = self.next(id);
                self.remove(id);
                diagnostics.block_removed(index, bits);
                changed = true;
                continue;
            }

            let start = position + BLOCK_HEADER_BITS;
            let old_bits = block.size_bits(start);

            if let Some(better) = optimise_block(block, start, config, diagnostics) {
                let new_bits = better.size_bits(start);
                diagnostics.block_replaced(index, old_bits, new_bits);
                self.replace(id, better);
                changed = true;
                // Same block again with its new encoding
                continue;
            }

            if config.merge_blocks {
                if let Some(merged) = self.try_merge(id, start, config, diagnostics) {
                    let new_bits = merged.size_bits(start);
                    diagnostics.blocks_merged(index, old_bits, new_bits);
                    if let Some(next) = self.next(id) {
                        self.remove(next);
                    }
                    self.replace(id, merged);
                    changed = true;
                    continue;
                }
            }

            position = start + old_bits;
            index += 1;
            cursor = self.next(id);
        }

        changed
    }

    fn try_merge(
        &self,
        id: BlockId,
        start: u64,
        config: &OptimiseConfig,
        diagnostics: &mut dyn Diagnostics,
    ) -> Option<Block> {
        let first = self.block(id)?;
        let second = self.block(self.next(id)?)?;
        merge_blocks(first, second, start, config, diagnostics)
    }
}
