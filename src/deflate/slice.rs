use super::tables::MAX_DISTANCE;
use crate::error::{Error, Result};

/// Decoded bytes of the blocks preceding the one being parsed, newest first
///
/// Only as many blocks as are needed to cover the 32 KiB window are kept.
#[derive(Clone, Debug, Default)]
pub struct History<'a> {
    blocks: Vec<&'a [u8]>,
    available: usize,
}

impl<'a> History<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from block payloads in stream order
    pub fn from_blocks<I>(blocks: I) -> Self
    where
        I: IntoIterator<Item = &'a [u8]>,
        I::IntoIter: DoubleEndedIterator,
    {
        let mut history = Self::new();
        for data in blocks.into_iter().rev() {
            if history.is_full() {
                break;
            }
            history.push_older(data);
        }
        history
    }

    /// Append the payload of an earlier block
    pub fn push_older(&mut self, data: &'a [u8]) {
        self.available += data.len();
        self.blocks.push(data);
    }

    /// Whether the window is covered
    pub fn is_full(&self) -> bool {
        self.available >= MAX_DISTANCE
    }

    /// Total bytes reachable through this history
    pub fn available(&self) -> usize {
        self.available
    }

    /// Append `count` bytes starting `back` bytes before the end of the history
    pub fn copy_tail(&self, back: usize, count: usize, out: &mut Vec<u8>) -> Result<()> {
        if back > self.available {
            return Err(Error::Internal(format!(
                "history holds {} bytes, {} requested",
                self.available, back
            )));
        }

        // Newest blocks first until the start of the range is covered
        let mut chunks = Vec::new();
        let mut covered = 0;
        for &block in &self.blocks {
            if covered >= back {
                break;
            }
            chunks.push(block);
            covered += block.len();
        }

        let mut skip = covered - back;
        let mut remaining = count.min(back);
        for chunk in chunks.iter().rev() {
            if remaining == 0 {
                break;
            }
            if skip >= chunk.len() {
                skip -= chunk.len();
                continue;
            }
            let take = (chunk.len() - skip).min(remaining);
            out.extend_from_slice(&chunk[skip..skip + take]);
            remaining -= take;
            skip = 0;
        }
        Ok(())
    }
}

/// Materialise the bytes of a back-reference
///
/// `current` is what the block has decoded so far. Sources before its start
/// come from `history`; sources at or past its end come from bytes produced
/// earlier in this same copy, one byte at a time.
pub fn resolve_backref(
    current: &[u8],
    history: &History<'_>,
    distance: u16,
    length: u16,
) -> Result<Vec<u8>> {
    let distance = distance as usize;
    let length = length as usize;
    let available = current.len() + history.available();

    if distance == 0 || distance > available || distance > MAX_DISTANCE {
        return Err(Error::InvalidBackReference { distance: distance as u16, available });
    }

    let mut out = Vec::with_capacity(length);

    // Part of the source lying in earlier blocks
    if distance > current.len() {
        let back = distance - current.len();
        history.copy_tail(back, length, &mut out)?;
    }

    while out.len() < length {
        let i = out.len();
        // Source position relative to the start of `current`
        let src = current.len() + i - distance;
        let byte = if src < current.len() { current[src] } else { out[src - current.len()] };
        out.push(byte);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Straightforward LZ77 copy over a single flat buffer
    fn reference_copy(window: &[u8], distance: usize, length: usize) -> Vec<u8> {
        let mut buf = window.to_vec();
        for _ in 0..length {
            buf.push(buf[buf.len() - distance]);
        }
        buf[window.len()..].to_vec()
    }

    #[test]
    fn test_simple_copy() {
        let out = resolve_backref(b"abcdef", &History::new(), 4, 3).unwrap();
        assert_eq!(out, b"cde");
    }

    #[test]
    fn test_overlapping_run() {
        let out = resolve_backref(b"A", &History::new(), 1, 10).unwrap();
        assert_eq!(out, b"AAAAAAAAAA");

        let out = resolve_backref(b"xyab", &History::new(), 2, 7).unwrap();
        assert_eq!(out, reference_copy(b"xyab", 2, 7));
        assert_eq!(out, b"abababa");
    }

    #[test]
    fn test_cross_block() {
        let older = b"hello ".to_vec();
        let history = History::from_blocks([older.as_slice()]);
        let out = resolve_backref(b"wor", &history, 9, 5).unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn test_chain_of_blocks() {
        let a = b"0123".to_vec();
        let b = b"45".to_vec();
        let c = b"678".to_vec();
        let history = History::from_blocks([a.as_slice(), b.as_slice(), c.as_slice()]);
        assert_eq!(history.available(), 9);

        let current = b"9";
        let flat = b"0123456789";
        for distance in 1..=10usize {
            for length in 3..=14usize {
                let out =
                    resolve_backref(current, &history, distance as u16, length as u16).unwrap();
                assert_eq!(out, reference_copy(flat, distance, length), "d={distance} l={length}");
            }
        }
    }

    #[test]
    fn test_overlap_spanning_history() {
        // Source starts in the previous block and runs into the copy itself
        let prev = b"ab".to_vec();
        let history = History::from_blocks([prev.as_slice()]);
        let out = resolve_backref(b"", &history, 2, 6).unwrap();
        assert_eq!(out, b"ababab");
    }

    #[test]
    fn test_distance_too_far() {
        let prev = b"abc".to_vec();
        let history = History::from_blocks([prev.as_slice()]);
        assert!(matches!(
            resolve_backref(b"de", &history, 6, 3),
            Err(Error::InvalidBackReference { distance: 6, available: 5 })
        ));
        assert!(resolve_backref(b"", &History::new(), 1, 3).is_err());
    }
}
