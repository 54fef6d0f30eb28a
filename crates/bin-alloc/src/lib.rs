//! A binned best-fit memory allocator over page-granular regions.
//!
//! The heap serves requests of a fixed size range (8 to 4000 bytes by
//! default) from per-size-class free lists ("bins"). Memory is obtained in
//! fixed-size regions from a pluggable [`PageProvider`](page::PageProvider)
//! and carved into blocks on demand. The crate is `no_std` compatible; the
//! `mmap`-backed provider is only available on unix.
//!
//! # Overview
//!
//! - [`BinHeap`]: the single-threaded allocator core.
//! - [`LockedBinHeap`]: a spin-locked wrapper implementing
//!   [`GlobalAlloc`](core::alloc::GlobalAlloc).
//! - [`HeapConfig`] and [`SizeClasses`](size_class::SizeClasses): region
//!   size, accepted request range and the bin ladder.
//! - [`page`]: region providers ([`PagePool`](page::PagePool) over a
//!   caller-owned buffer, [`SystemPages`](page::SystemPages) over `mmap`).
//! - [`HeapStats`]: counters for diagnostics and utilization measurements.
//!
//! # Characteristics
//!
//! | Operation | Cost | Notes |
//! |-----------|------|-------|
//! | `allocate` | O(n) | n is the length of the first bin with a fit, plus empty bins skipped |
//! | `release` | O(1) | push onto the head of one bin |
//! | refill | one provider call | at most once per allocation |
//!
//! Each block carries a [`HEADER_SIZE`]-byte header. Adjacent free blocks
//! are never merged and regions are never returned, so the heap only grows.
//!
//! # Usage Examples
//!
//! ```rust
//! use bin_alloc::{BinHeap, HeapConfig, page::SystemPages};
//!
//! let mut heap = BinHeap::new(SystemPages::new(), HeapConfig::DEFAULT).unwrap();
//!
//! let a = heap.allocate(64);
//! let b = heap.allocate(1024);
//! unsafe {
//!     a.write_bytes(0, 64);
//!     heap.release(a);
//!     heap.release(b);
//! }
//!
//! let stats = heap.finalize();
//! assert_eq!(stats.regions_acquired, 1);
//! assert_eq!(stats.live_blocks, 0);
//! ```
//!
//! ## Custom Configuration
//!
//! ```rust
//! use bin_alloc::{BinHeap, HeapConfig, page::PagePool, size_class::SizeClasses};
//!
//! let config = HeapConfig::DEFAULT
//!     .with_region_size(1024)
//!     .with_request_bounds(16, 512)
//!     .with_size_classes(SizeClasses::new(&[0, 64, 256]).unwrap());
//!
//! let mut buffer = vec![0_u64; 512];
//! let len = buffer.len() * size_of::<u64>();
//! let pool = PagePool::new(unsafe {
//!     core::slice::from_raw_parts_mut(buffer.as_mut_ptr().cast::<u8>(), len)
//! });
//! let mut heap = BinHeap::new(pool, config).unwrap();
//!
//! assert!(heap.try_allocate(8).is_err());
//! let ptr = heap.allocate(512);
//! assert_eq!(heap.free_block_sizes(2).collect::<Vec<_>>(), [1024 - 16 - 512 - 16]);
//! unsafe { heap.release(ptr) };
//! ```

#![cfg_attr(not(test), no_std)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub use self::{
    block::{BLOCK_ALIGN, HEADER_SIZE},
    config::{ConfigError, HeapConfig},
    free_list::Sizes,
    heap::{AllocError, BinHeap},
    locked::LockedBinHeap,
    stats::HeapStats,
};

mod block;
mod config;
mod free_list;
mod heap;
mod locked;
pub mod page;
pub mod size_class;
mod stats;
