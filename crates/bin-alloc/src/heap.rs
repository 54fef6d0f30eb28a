//! The binned best-fit heap.
//!
//! # Algorithm
//!
//! - **Bins**: free blocks are kept in one singly linked list per size
//!   class. A block always lives in the bin of its own usable size.
//! - **Allocation**: the search starts at the bin of the requested size and
//!   moves to larger bins until one holds a block that is large enough.
//!   Within that bin the smallest sufficient block wins (best fit); larger
//!   bins are not consulted once a fit is found.
//! - **Splitting**: if the chosen block is larger than the request by more
//!   than one header, the tail is split off and filed into its own bin.
//!   Smaller slack stays inside the allocation.
//! - **Refill**: when no bin can serve a request, one region is obtained
//!   from the [`PageProvider`], carved into a single free block, and the
//!   search is repeated once.
//! - **Release**: the header sits right before the payload, so a released
//!   block is pushed onto the head of the bin for its stored size.
//!
//! Physically adjacent free blocks are **not** coalesced, and regions are
//! never returned to the provider. A pattern that frees many neighbouring
//! small blocks and then asks for a large one will therefore acquire a new
//! region even though enough contiguous free memory exists.
//!
//! # Memory Layout
//!
//! ```text
//! Region after allocate(64) on a fresh 4096-byte region:
//! ┌────────┬──────────────┬────────┬──────────────────────────────────┐
//! │ header │ payload (64) │ header │ free payload (4096 - 16 - 64 - 16)│
//! └────────┴──────────────┴────────┴──────────────────────────────────┘
//!          ^ returned pointer       (filed into bin 7)
//! ```

use core::ptr::NonNull;

use log::{debug, info, trace, warn};
use snafu::{Location, ResultExt as _, Snafu, ensure};

use crate::{
    block::{BLOCK_ALIGN, FreeBlock, UsedBlock},
    config::{ConfigError, HeapConfig},
    free_list::{Fit, FreeList, Sizes},
    page::{PageError, PageProvider},
    size_class::MAX_SIZE_CLASSES,
    stats::HeapStats,
};

/// Errors returned by [`BinHeap::try_allocate`].
#[derive(Debug, Snafu)]
pub enum AllocError {
    #[snafu(display(
        "invalid request of {size} bytes: expected a multiple of {BLOCK_ALIGN} in \
         [{min_request}, {max_request}]"
    ))]
    InvalidSize {
        size: usize,
        min_request: usize,
        max_request: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to acquire a {region_size}-byte region: {source}"))]
    PageProvider {
        region_size: usize,
        source: PageError,
        #[snafu(implicit)]
        location: Location,
    },
}

/// A heap that serves fixed-range requests from size-class bins.
///
/// See the [module documentation](self) for the allocation policy.
///
/// # Thread Safety
///
/// The heap is `Send` if its provider is, but not `Sync`. Wrap it in a
/// [`LockedBinHeap`](crate::LockedBinHeap) to share it between threads.
///
/// # Examples
///
/// ```
/// use bin_alloc::{BinHeap, HeapConfig, page::PagePool};
///
/// let mut buffer = vec![0_u64; 1024];
/// let len = buffer.len() * size_of::<u64>();
/// let pool = PagePool::new(unsafe {
///     core::slice::from_raw_parts_mut(buffer.as_mut_ptr().cast::<u8>(), len)
/// });
/// let mut heap = BinHeap::new(pool, HeapConfig::DEFAULT).unwrap();
///
/// let ptr = heap.allocate(64);
/// unsafe {
///     ptr.write_bytes(0xab, 64);
///     heap.release(ptr);
/// }
/// assert_eq!(heap.allocate(64), ptr);
/// ```
#[derive(Debug)]
pub struct BinHeap<P> {
    provider: P,
    config: HeapConfig,
    bins: [FreeList; MAX_SIZE_CLASSES],
    stats: HeapStats,
}

unsafe impl<P> Send for BinHeap<P> where P: Send {}

impl<P> BinHeap<P>
where
    P: PageProvider,
{
    /// Creates an empty heap that draws regions from `provider`.
    pub fn new(provider: P, config: HeapConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_config_unchecked(provider, config))
    }

    /// Creates an empty heap with [`HeapConfig::DEFAULT`].
    ///
    /// Usable in `static` initializers.
    #[must_use]
    pub const fn with_default_config(provider: P) -> Self {
        Self::with_config_unchecked(provider, HeapConfig::DEFAULT)
    }

    const fn with_config_unchecked(provider: P, config: HeapConfig) -> Self {
        Self {
            provider,
            config,
            bins: [const { FreeList::new() }; MAX_SIZE_CLASSES],
            stats: HeapStats {
                regions_acquired: 0,
                bytes_acquired: 0,
                live_blocks: 0,
                live_bytes: 0,
                free_blocks: 0,
                free_bytes: 0,
                splits: 0,
            },
        }
    }

    /// Returns the configuration the heap was created with.
    #[must_use]
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Returns the page provider.
    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Returns a snapshot of the heap's counters.
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        self.stats
    }

    /// Returns the sizes of the free blocks in `bin`, head first.
    ///
    /// # Panics
    ///
    /// Panics if `bin` is not a bin of the configured size classes.
    #[must_use]
    pub fn free_block_sizes(&self, bin: usize) -> Sizes<'_> {
        assert!(
            bin < self.config.size_classes.len(),
            "bin index out of range"
        );
        self.bins[bin].iter()
    }

    /// Empties every bin.
    ///
    /// Blocks that were free or allocated before the reset are forgotten;
    /// their regions stay acquired but are no longer used. Calling this on a
    /// fresh heap has no effect.
    pub fn initialize(&mut self) {
        let forgotten = self.bins.iter().map(FreeList::len).sum::<usize>();
        for bin in &mut self.bins {
            bin.clear();
        }
        self.stats = HeapStats {
            regions_acquired: self.stats.regions_acquired,
            bytes_acquired: self.stats.bytes_acquired,
            ..HeapStats::default()
        };
        debug!(
            "reset {} bins, forgetting {forgotten} free blocks",
            self.config.size_classes.len()
        );
    }

    /// Allocates a block of at least `size` bytes.
    ///
    /// `size` must be accepted by [`HeapConfig::accepts`]. The returned
    /// pointer is aligned to [`BLOCK_ALIGN`](crate::BLOCK_ALIGN).
    pub fn try_allocate(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        let HeapConfig {
            min_request,
            max_request,
            ..
        } = self.config;
        ensure!(
            self.config.accepts(size),
            InvalidSizeSnafu {
                size,
                min_request,
                max_request,
            }
        );

        let start = self.config.size_classes.classify(size);
        let (bin, fit) = match self.find_fit(start, size) {
            Some(found) => found,
            None => {
                self.acquire_region()?;
                let Some(found) = self.find_fit(start, size) else {
                    warn!("no fit for {size} bytes after acquiring a region");
                    panic!(
                        "fresh {}-byte region cannot hold a {size}-byte request",
                        self.config.region_size
                    );
                };
                found
            }
        };

        let mut block = unsafe { self.bins[bin].remove(fit.block, fit.prev) };
        self.stats.free_blocks -= 1;
        self.stats.free_bytes -= fit.size;

        if let Some(tail) = block.split(size) {
            trace!("split {}-byte block: {size} + {} bytes", fit.size, tail.size());
            self.stats.splits += 1;
            self.push_free(tail);
        }

        self.stats.live_blocks += 1;
        self.stats.live_bytes += block.size();
        Ok(block.payload())
    }

    /// Allocates a block of at least `size` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `size` is not accepted by the configuration or if the page
    /// provider cannot supply another region.
    #[track_caller]
    pub fn allocate(&mut self, size: usize) -> NonNull<u8> {
        match self.try_allocate(size) {
            Ok(ptr) => ptr,
            Err(err) => panic!("allocation of {size} bytes failed: {err}"),
        }
    }

    /// Returns a block to its bin.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// - `ptr` was returned by [`allocate`](Self::allocate) or
    ///   [`try_allocate`](Self::try_allocate) on this heap, after the last
    ///   call to [`initialize`](Self::initialize)
    /// - `ptr` has not been released before
    /// - the block is not accessed after this call
    pub unsafe fn release(&mut self, ptr: NonNull<u8>) {
        let block = unsafe { UsedBlock::from_payload(ptr) };
        let size = block.size();
        trace!("release {size} bytes at {ptr:p}");

        debug_assert!(
            self.stats.live_blocks > 0 && self.stats.live_bytes >= size,
            "released block was not allocated since the last reset"
        );
        self.stats.live_blocks -= 1;
        self.stats.live_bytes -= size;
        self.push_free(block.into_free());
    }

    /// Reports final statistics.
    ///
    /// Acquired regions are kept; the heap stays usable afterwards.
    pub fn finalize(&self) -> HeapStats {
        info!("heap finalized: {}", self.stats);
        self.stats
    }

    /// Searches `start` and every larger bin, stopping at the first bin that
    /// holds a fit.
    fn find_fit(&self, start: usize, size: usize) -> Option<(usize, Fit)> {
        self.bins[start..self.config.size_classes.len()]
            .iter()
            .enumerate()
            .filter(|(_, list)| !list.is_empty())
            .find_map(|(offset, list)| list.best_fit(size).map(|fit| (start + offset, fit)))
    }

    fn acquire_region(&mut self) -> Result<(), AllocError> {
        let region_size = self.config.region_size;
        let region = self
            .provider
            .acquire_region(region_size)
            .context(PageProviderSnafu { region_size })?;
        let block = unsafe { FreeBlock::carve(region, region_size) };

        self.stats.regions_acquired += 1;
        self.stats.bytes_acquired += region_size;
        debug!(
            "acquired region #{} at {region:p} ({region_size} bytes)",
            self.stats.regions_acquired
        );

        self.push_free(block);
        Ok(())
    }

    fn push_free(&mut self, block: FreeBlock) {
        let size = block.size();
        let bin = self.config.size_classes.classify(size);
        self.bins[bin].push_front(block);
        self.stats.free_blocks += 1;
        self.stats.free_bytes += size;
    }
}
