//! Regions backed by anonymous `mmap` mappings.

use core::ptr::{self, NonNull};

use log::trace;
use snafu::{OptionExt as _, ensure};

use super::{MapSnafu, PageError, PageProvider, UnmapSnafu};

/// A [`PageProvider`] backed by anonymous private `mmap` mappings.
///
/// Each region is its own mapping, so regions are page aligned and never
/// overlap. The mappings are not unmapped on drop: blocks carved from them
/// may still be referenced by the heap that owns this provider.
#[derive(Debug, Default)]
pub struct SystemPages {
    mapped: usize,
}

impl SystemPages {
    /// Creates a provider that has not mapped anything yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { mapped: 0 }
    }

    /// Number of mappings currently held.
    #[must_use]
    pub fn mapped_regions(&self) -> usize {
        self.mapped
    }
}

unsafe impl PageProvider for SystemPages {
    fn acquire_region(&mut self, size: usize) -> Result<NonNull<u8>, PageError> {
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANON,
                -1,
                0,
            )
        };
        ensure!(addr != libc::MAP_FAILED, MapSnafu { size, errno: errno() });
        let region = NonNull::new(addr.cast::<u8>()).context(MapSnafu { size, errno: 0 })?;

        self.mapped += 1;
        trace!("mapped {size} bytes at {region:p}");
        Ok(region)
    }

    unsafe fn release_region(&mut self, region: NonNull<u8>, size: usize) -> Result<(), PageError> {
        let rc = unsafe { libc::munmap(region.as_ptr().cast(), size) };
        ensure!(rc == 0, UnmapSnafu { size, errno: errno() });

        self.mapped = self.mapped.saturating_sub(1);
        trace!("unmapped {size} bytes at {region:p}");
        Ok(())
    }
}

#[cfg(any(target_os = "linux", target_os = "emscripten"))]
fn errno() -> i32 {
    unsafe { *libc::__errno_location() }
}

#[cfg(target_os = "android")]
fn errno() -> i32 {
    unsafe { *libc::__errno() }
}

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "dragonfly"
))]
fn errno() -> i32 {
    unsafe { *libc::__error() }
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "emscripten",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "dragonfly"
)))]
fn errno() -> i32 {
    0
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_and_unmap() {
        let mut pages = SystemPages::new();
        unsafe {
            let region = pages.acquire_region(4096).unwrap();
            assert_eq!(pages.mapped_regions(), 1);
            assert!(region.as_ptr().cast::<usize>().is_aligned());

            region.write_bytes(0x5a, 4096);
            assert_eq!(region.add(4095).read(), 0x5a);

            pages.release_region(region, 4096).unwrap();
            assert_eq!(pages.mapped_regions(), 0);
        }
    }

    #[test]
    fn test_regions_do_not_overlap() {
        let mut pages = SystemPages::new();
        let first = pages.acquire_region(4096).unwrap();
        let second = pages.acquire_region(4096).unwrap();
        let (low, high) = if first < second {
            (first, second)
        } else {
            (second, first)
        };
        assert!(high.addr().get() - low.addr().get() >= 4096);
        unsafe {
            pages.release_region(first, 4096).unwrap();
            pages.release_region(second, 4096).unwrap();
        }
    }

    #[test]
    fn test_map_failure() {
        let mut pages = SystemPages::new();
        let err = pages.acquire_region(usize::MAX).unwrap_err();
        assert!(matches!(err, PageError::Map { size: usize::MAX, .. }));
        assert_eq!(pages.mapped_regions(), 0);
    }
}
