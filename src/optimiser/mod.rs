pub mod diagnostics;
pub mod parallel;
pub mod search;

pub use diagnostics::{Diagnostics, LogDiagnostics, NoopDiagnostics};
pub use parallel::{BatchOptimiser, BatchResult};
pub use search::{merge_blocks, optimise_block};
