//! Regions carved from a caller-owned buffer.

use core::{marker::PhantomData, ptr::NonNull};

use snafu::ensure;

use super::{PageError, PageProvider, PoolExhaustedSnafu};
use crate::block::BLOCK_ALIGN;

/// A [`PageProvider`] that carves regions out of a borrowed buffer.
///
/// Regions are handed out front to back, each rounded up to
/// [`BLOCK_ALIGN`]. Released regions are not reused.
///
/// # Examples
///
/// ```
/// use bin_alloc::page::{PagePool, PageProvider as _};
///
/// let mut buffer = [0_u64; 1024];
/// let len = size_of_val(&buffer);
/// let mut pool = PagePool::new(unsafe {
///     core::slice::from_raw_parts_mut(buffer.as_mut_ptr().cast::<u8>(), len)
/// });
/// let first = pool.acquire_region(4096).unwrap();
/// let second = pool.acquire_region(4096).unwrap();
/// assert_eq!(second.addr().get() - first.addr().get(), 4096);
/// assert!(pool.acquire_region(8).is_err());
/// ```
#[derive(Debug)]
pub struct PagePool<'a> {
    start: NonNull<u8>,
    len: usize,
    offset: usize,
    regions: usize,
    _buffer: PhantomData<&'a mut [u8]>,
}

unsafe impl Send for PagePool<'_> {}

impl<'a> PagePool<'a> {
    /// Creates a pool over `buffer`.
    ///
    /// Leading bytes needed to reach [`BLOCK_ALIGN`] are skipped.
    #[must_use]
    pub fn new(buffer: &'a mut [u8]) -> Self {
        let len = buffer.len();
        let start = NonNull::from(buffer).cast::<u8>();
        let offset = start.as_ptr().align_offset(BLOCK_ALIGN).min(len);
        Self {
            start,
            len,
            offset,
            regions: 0,
            _buffer: PhantomData,
        }
    }

    /// Bytes still available for new regions.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.len - self.offset
    }

    /// Number of regions handed out so far.
    #[must_use]
    pub fn regions_handed_out(&self) -> usize {
        self.regions
    }

    /// Returns `true` if `ptr` lies inside the pool's buffer.
    #[must_use]
    pub fn contains(&self, ptr: *const u8) -> bool {
        let start = self.start.as_ptr().cast_const();
        ptr >= start && ptr.addr() - start.addr() < self.len
    }
}

unsafe impl PageProvider for PagePool<'_> {
    fn acquire_region(&mut self, size: usize) -> Result<NonNull<u8>, PageError> {
        let remaining = self.remaining();
        ensure!(
            size <= remaining,
            PoolExhaustedSnafu {
                requested: size,
                remaining,
            }
        );

        let region = unsafe { self.start.add(self.offset) };
        self.offset = size
            .checked_next_multiple_of(BLOCK_ALIGN)
            .map_or(self.len, |step| self.offset.saturating_add(step).min(self.len));
        self.regions += 1;
        Ok(region)
    }

    unsafe fn release_region(
        &mut self,
        _region: NonNull<u8>,
        _size: usize,
    ) -> Result<(), PageError> {
        Ok(())
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use core::alloc::Layout;

    use super::*;

    fn with_test_buffer<F>(len: usize, align: usize, test_fn: F)
    where
        F: FnOnce(&mut [u8]),
    {
        unsafe {
            let layout = Layout::from_size_align(len, align).unwrap();
            let start = std::alloc::alloc(layout);
            test_fn(core::slice::from_raw_parts_mut(start, len));
            std::alloc::dealloc(start, layout);
        }
    }

    #[test]
    fn test_sequential_regions() {
        with_test_buffer(8192, 16, |buffer| {
            let base = buffer.as_ptr().addr();
            let mut pool = PagePool::new(buffer);
            assert_eq!(pool.remaining(), 8192);

            let first = pool.acquire_region(4096).unwrap();
            let second = pool.acquire_region(4096).unwrap();
            assert_eq!(first.addr().get(), base);
            assert_eq!(second.addr().get(), base + 4096);
            assert_eq!(pool.regions_handed_out(), 2);
            assert_eq!(pool.remaining(), 0);
            assert!(pool.contains(second.as_ptr()));
        });
    }

    #[test]
    fn test_exhaustion() {
        with_test_buffer(4096, 16, |buffer| {
            let mut pool = PagePool::new(buffer);
            pool.acquire_region(4000).unwrap();
            let err = pool.acquire_region(4000).unwrap_err();
            assert!(matches!(
                err,
                PageError::PoolExhausted {
                    requested: 4000,
                    remaining: 96,
                    ..
                }
            ));
            assert_eq!(pool.regions_handed_out(), 1);
        });
    }

    #[test]
    fn test_unaligned_buffer() {
        with_test_buffer(256, 16, |buffer| {
            let base = buffer.as_ptr().addr();
            let mut pool = PagePool::new(&mut buffer[3..]);
            assert_eq!(pool.remaining(), 256 - 8);

            // odd sizes are rounded up so the next region stays aligned
            let first = pool.acquire_region(13).unwrap();
            let second = pool.acquire_region(8).unwrap();
            assert_eq!(first.addr().get(), base + 8);
            assert_eq!(second.addr().get(), base + 24);
            assert!(second.as_ptr().cast::<u64>().is_aligned());
        });
    }

    #[test]
    fn test_empty_buffer() {
        let mut pool = PagePool::new(&mut []);
        assert_eq!(pool.remaining(), 0);
        assert!(!pool.contains(core::ptr::null()));
        assert!(pool.acquire_region(8).is_err());
    }

    #[test]
    fn test_release_is_accepted() {
        with_test_buffer(128, 16, |buffer| unsafe {
            let mut pool = PagePool::new(buffer);
            let region = pool.acquire_region(64).unwrap();
            pool.release_region(region, 64).unwrap();
            assert_eq!(pool.remaining(), 64);
        });
    }
}
