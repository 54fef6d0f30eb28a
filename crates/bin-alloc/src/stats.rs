//! Heap bookkeeping counters.

use core::fmt;

/// A snapshot of a heap's bookkeeping.
///
/// Byte counts refer to payload bytes unless stated otherwise; headers are
/// only included in [`bytes_acquired`](Self::bytes_acquired).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapStats {
    /// Regions obtained from the page provider.
    pub regions_acquired: usize,
    /// Total bytes of all acquired regions.
    pub bytes_acquired: usize,
    /// Blocks currently handed out.
    pub live_blocks: usize,
    /// Payload bytes of the blocks currently handed out, including slack
    /// absorbed when a split was not possible.
    pub live_bytes: usize,
    /// Blocks currently linked into a bin.
    pub free_blocks: usize,
    /// Payload bytes of the blocks currently linked into a bin.
    pub free_bytes: usize,
    /// Blocks created by splitting.
    pub splits: usize,
}

impl HeapStats {
    /// Live payload bytes as a percentage of all acquired bytes.
    #[must_use]
    pub fn utilization_percent(&self) -> usize {
        if self.bytes_acquired == 0 {
            return 0;
        }
        self.live_bytes.saturating_mul(100) / self.bytes_acquired
    }
}

impl fmt::Display for HeapStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} regions ({} bytes), {} live blocks ({} bytes, {}% utilization), {} free blocks \
             ({} bytes), {} splits",
            self.regions_acquired,
            self.bytes_acquired,
            self.live_blocks,
            self.live_bytes,
            self.utilization_percent(),
            self.free_blocks,
            self.free_bytes,
            self.splits,
        )
    }
}
