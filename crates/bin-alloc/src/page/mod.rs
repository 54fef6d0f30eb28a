//! Sources of raw memory regions.
//!
//! A [`BinHeap`](crate::BinHeap) never manages address space itself. When
//! its bins cannot satisfy a request it asks a [`PageProvider`] for one more
//! fixed-size region and carves it into blocks. Regions are kept for the
//! lifetime of the heap, so [`PageProvider::release_region`] is available to
//! owners of a provider but never called by the heap.
//!
//! Two providers are included:
//!
//! - [`PagePool`]: hands out consecutive slices of a caller-owned buffer.
//!   Works in `no_std` environments and makes exhaustion easy to reproduce.
//! - [`SystemPages`] (unix only): maps one anonymous private mapping per
//!   region.

use core::ptr::NonNull;

use snafu::{Location, Snafu};

pub use self::pool::PagePool;
#[cfg(unix)]
pub use self::system::SystemPages;

mod pool;
#[cfg(unix)]
mod system;

/// Failure to obtain or give back a region.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PageError {
    #[snafu(display("page pool exhausted: {requested} bytes requested, {remaining} remaining"))]
    PoolExhausted {
        requested: usize,
        remaining: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to map {size} bytes (errno {errno})"))]
    Map {
        size: usize,
        errno: i32,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to unmap {size} bytes (errno {errno})"))]
    Unmap {
        size: usize,
        errno: i32,
        #[snafu(implicit)]
        location: Location,
    },
}

/// A capability that supplies raw memory regions.
///
/// # Safety
///
/// Implementations must return regions that are valid for reads and writes
/// of the requested size, aligned to at least
/// [`BLOCK_ALIGN`](crate::BLOCK_ALIGN), not overlapping any other region
/// still handed out, and that stay valid until released or until the
/// provider is dropped.
pub unsafe trait PageProvider {
    /// Returns a fresh region of at least `size` bytes.
    fn acquire_region(&mut self, size: usize) -> Result<NonNull<u8>, PageError>;

    /// Gives a region back to the provider.
    ///
    /// # Safety
    ///
    /// `region` must have been returned by
    /// [`acquire_region`](Self::acquire_region) with the same `size`, and no
    /// block inside it may be used afterwards.
    unsafe fn release_region(&mut self, region: NonNull<u8>, size: usize) -> Result<(), PageError>;
}

unsafe impl<P> PageProvider for &mut P
where
    P: PageProvider + ?Sized,
{
    fn acquire_region(&mut self, size: usize) -> Result<NonNull<u8>, PageError> {
        (**self).acquire_region(size)
    }

    unsafe fn release_region(&mut self, region: NonNull<u8>, size: usize) -> Result<(), PageError> {
        unsafe { (**self).release_region(region, size) }
    }
}
