use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use super::table::HuffmanTable;
use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug)]
enum NodeKind {
    Leaf { symbol: usize },
    Internal { left: usize, right: usize },
}

#[derive(Clone, Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<usize>,
}

/// Depth-limited Huffman tree built from symbol frequencies
///
/// Nodes live in an arena and refer to each other by index. Leaves deeper
/// than the limit are folded back up by repeatedly moving the first deepest
/// leaf next to the first leaf at a shallower level.
#[derive(Clone, Debug)]
pub struct HuffmanTree {
    nodes: Vec<Node>,
    root: usize,
    num_symbols: usize,
    /// Leaf node ids grouped by depth, in left-to-right order
    depth_map: BTreeMap<usize, Vec<usize>>,
    max_depth: usize,
}

impl HuffmanTree {
    /// Build a tree over `freq` whose depth does not exceed `limit`
    ///
    /// At least two leaves are always present: unused symbols with the lowest
    /// indices are added with weight 1 when fewer than two have a frequency.
    pub fn new(freq: &[u32], limit: u8) -> Result<Self> {
        let num_symbols = freq.len();
        let mut nodes: Vec<Node> = Vec::with_capacity(num_symbols * 2);

        // (weight, insertion order) keeps equal weights first-in first-out
        let mut queue: BinaryHeap<Reverse<(u64, usize, usize)>> = BinaryHeap::new();
        let mut seq = 0usize;

        let mut push_leaf = |nodes: &mut Vec<Node>,
                             queue: &mut BinaryHeap<Reverse<(u64, usize, usize)>>,
                             symbol: usize,
                             weight: u64| {
            nodes.push(Node { kind: NodeKind::Leaf { symbol }, parent: None });
            queue.push(Reverse((weight, seq, nodes.len() - 1)));
            seq += 1;
        };

        for (symbol, &f) in freq.iter().enumerate() {
            if f > 0 {
                push_leaf(&mut nodes, &mut queue, symbol, f as u64);
            }
        }

        let mut index = 0;
        while queue.len() < 2 && index < num_symbols {
            if freq[index] == 0 {
                push_leaf(&mut nodes, &mut queue, index, 1);
            }
            index += 1;
        }

        if queue.len() < 2 {
            return Err(Error::EmptyHuffmanTable);
        }

        while queue.len() > 1 {
            let Some(Reverse((w_left, _, left))) = queue.pop() else { break };
            let Some(Reverse((w_right, _, right))) = queue.pop() else { break };
            nodes.push(Node { kind: NodeKind::Internal { left, right }, parent: None });
            let id = nodes.len() - 1;
            nodes[left].parent = Some(id);
            nodes[right].parent = Some(id);
            queue.push(Reverse((w_left + w_right, seq, id)));
            seq += 1;
        }

        let root = match queue.pop() {
            Some(Reverse((_, _, root))) => root,
            None => return Err(Error::EmptyHuffmanTable),
        };

        let mut tree =
            Self { nodes, root, num_symbols, depth_map: BTreeMap::new(), max_depth: 0 };
        tree.traverse();
        tree.limit_depth(limit as usize)?;
        Ok(tree)
    }

    /// Maximum leaf depth
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Rebuild the depth map from the root
    fn traverse(&mut self) {
        self.depth_map.clear();
        self.max_depth = 0;

        let mut stack = vec![(self.root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            self.max_depth = self.max_depth.max(depth);
            match self.nodes[id].kind {
                NodeKind::Internal { left, right } => {
                    // Right first so the left subtree is visited first
                    stack.push((right, depth + 1));
                    stack.push((left, depth + 1));
                }
                NodeKind::Leaf { .. } => {
                    self.depth_map.entry(depth).or_default().push(id);
                }
            }
        }
    }

    /// Point `parent`'s child slot holding `old` at `new`
    fn replace_child(&mut self, parent: usize, old: usize, new: usize) {
        if let NodeKind::Internal { left, right } = &mut self.nodes[parent].kind {
            if *left == old {
                *left = new;
            } else {
                debug_assert_eq!(*right, old);
                *right = new;
            }
        }
        self.nodes[new].parent = Some(parent);
    }

    fn limit_depth(&mut self, limit: usize) -> Result<()> {
        while self.max_depth > limit {
            let overflow = || Error::Internal("cannot balance Huffman tree".into());

            // Pick a leaf over the limit
            let leaf_a = *self
                .depth_map
                .get(&self.max_depth)
                .and_then(|leaves| leaves.first())
                .ok_or_else(overflow)?;
            let parent1 = self.nodes[leaf_a].parent.ok_or_else(overflow)?;
            let leaf_b = match self.nodes[parent1].kind {
                NodeKind::Internal { left, right } => {
                    if left == leaf_a {
                        right
                    } else {
                        left
                    }
                }
                NodeKind::Leaf { .. } => return Err(overflow()),
            };

            // Move the sibling up in place of the shared parent
            let parent2 = self.nodes[parent1].parent.ok_or_else(overflow)?;
            self.replace_child(parent2, parent1, leaf_b);

            // Reinsert the evicted leaf next to the first leaf that has room
            let leaf_c = (1..self.max_depth.saturating_sub(1))
                .rev()
                .find_map(|depth| self.depth_map.get(&depth).and_then(|l| l.first().copied()))
                .ok_or_else(overflow)?;
            let parent3 = self.nodes[leaf_c].parent.ok_or_else(overflow)?;

            // Reuse the detached parent node as the new internal node
            self.nodes[parent1].kind = NodeKind::Internal { left: leaf_a, right: leaf_c };
            self.nodes[leaf_a].parent = Some(parent1);
            self.replace_child(parent3, leaf_c, parent1);
            self.nodes[leaf_c].parent = Some(parent1);

            self.traverse();
        }
        Ok(())
    }

    /// Canonical table: per depth, leaves sorted by symbol get consecutive codes
    pub fn table(&self) -> HuffmanTable {
        let mut table = HuffmanTable::new(self.num_symbols);
        let mut next_code = 0u32;
        let mut last_shift = 0usize;

        for (&depth, leaves) in &self.depth_map {
            next_code <<= depth - last_shift;
            last_shift = depth;

            let mut symbols: Vec<usize> = leaves
                .iter()
                .filter_map(|&id| match self.nodes[id].kind {
                    NodeKind::Leaf { symbol } => Some(symbol),
                    NodeKind::Internal { .. } => None,
                })
                .collect();
            symbols.sort_unstable();

            for symbol in symbols {
                table.code[symbol] = next_code as u16;
                table.code_len[symbol] = depth as u8;
                next_code += 1;
            }
        }

        table
    }

    /// Code lengths only
    pub fn lengths(&self) -> Vec<u8> {
        self.table().code_len
    }
}
