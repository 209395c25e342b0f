/// Observer for what the optimiser tries and keeps
///
/// Every method defaults to doing nothing, so implementors only override the
/// events they care about.
pub trait Diagnostics {
    /// A candidate encoding of a block was scored
    fn candidate(&mut self, _label: &'static str, _size_bits: u64) {}

    /// The block at `index` was replaced by a smaller encoding
    fn block_replaced(&mut self, _index: usize, _old_bits: u64, _new_bits: u64) {}

    /// An empty block at `index` was dropped
    fn block_removed(&mut self, _index: usize, _bits: u64) {}

    /// The blocks at `index` and `index + 1` were merged
    fn blocks_merged(&mut self, _index: usize, _old_bits: u64, _new_bits: u64) {}

    /// A full pass over the stream ended
    fn pass_finished(&mut self, _pass: usize, _changed: bool) {}
}

/// Discards every event
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopDiagnostics;

impl Diagnostics for NoopDiagnostics {}

/// Forwards events to the `log` facade
#[derive(Clone, Debug, Default)]
pub struct LogDiagnostics {
    name: String,
}

impl LogDiagnostics {
    /// Tag every message with `name`, e.g. the input file
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Diagnostics for LogDiagnostics {
    fn candidate(&mut self, label: &'static str, size_bits: u64) {
        log::trace!("{}: candidate {label}: {size_bits} bits", self.name);
    }

    fn block_replaced(&mut self, index: usize, old_bits: u64, new_bits: u64) {
        log::debug!(
            "{}: block {index} re-encoded, {old_bits} -> {new_bits} bits",
            self.name
        );
    }

    fn block_removed(&mut self, index: usize, bits: u64) {
        log::debug!("{}: empty block {index} removed, {bits} bits", self.name);
    }

    fn blocks_merged(&mut self, index: usize, old_bits: u64, new_bits: u64) {
        log::debug!(
            "{}: blocks {index} and {} merged, {old_bits} -> {new_bits} bits",
            self.name,
            index + 1
        );
    }

    fn pass_finished(&mut self, pass: usize, changed: bool) {
        log::debug!("{}: pass {pass} finished, changed: {changed}", self.name);
    }
}
