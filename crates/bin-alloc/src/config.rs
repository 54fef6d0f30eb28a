//! Heap configuration.

use core::alloc::Layout;

use snafu::{Location, Snafu, ensure};

use crate::{
    block::{BLOCK_ALIGN, HEADER_SIZE},
    size_class::SizeClasses,
};

/// Reasons [`HeapConfig::validate`] rejects a configuration.
#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display(
        "invalid request bounds [{min_request}, {max_request}]: both must be non-zero multiples \
         of {BLOCK_ALIGN} in ascending order"
    ))]
    RequestBounds {
        min_request: usize,
        max_request: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display(
        "region size {region_size} must be a multiple of {BLOCK_ALIGN} and hold a header plus \
         {max_request} bytes"
    ))]
    RegionSize {
        region_size: usize,
        max_request: usize,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Tunables of a [`BinHeap`](crate::BinHeap).
///
/// The defaults match the classic malloc-challenge setting: 4096-byte
/// regions, requests of 8 to 4000 bytes in steps of 8, and eight bins.
///
/// # Examples
///
/// ```
/// use bin_alloc::{HeapConfig, size_class::SizeClasses};
///
/// let config = HeapConfig::DEFAULT
///     .with_region_size(8192)
///     .with_request_bounds(16, 8000)
///     .with_size_classes(SizeClasses::new(&[0, 64, 1024]).unwrap());
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapConfig {
    /// Bytes requested from the page provider whenever the bins run dry.
    pub region_size: usize,
    /// Smallest accepted request.
    pub min_request: usize,
    /// Largest accepted request.
    pub max_request: usize,
    /// Bin ladder free blocks are filed by.
    pub size_classes: SizeClasses,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl HeapConfig {
    /// 4096-byte regions, requests of 8 to 4000 bytes, and
    /// [`SizeClasses::DEFAULT`].
    pub const DEFAULT: Self = Self {
        region_size: 4096,
        min_request: 8,
        max_request: 4000,
        size_classes: SizeClasses::DEFAULT,
    };

    /// Sets the number of bytes acquired per region.
    #[must_use]
    pub const fn with_region_size(mut self, region_size: usize) -> Self {
        self.region_size = region_size;
        self
    }

    /// Sets the smallest and largest accepted request.
    #[must_use]
    pub const fn with_request_bounds(mut self, min_request: usize, max_request: usize) -> Self {
        self.min_request = min_request;
        self.max_request = max_request;
        self
    }

    /// Replaces the bin ladder.
    #[must_use]
    pub const fn with_size_classes(mut self, size_classes: SizeClasses) -> Self {
        self.size_classes = size_classes;
        self
    }

    /// Checks that every accepted request can be served from a single fresh
    /// region.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let Self {
            region_size,
            min_request,
            max_request,
            size_classes: _,
        } = *self;

        ensure!(
            min_request > 0
                && min_request <= max_request
                && min_request.is_multiple_of(BLOCK_ALIGN)
                && max_request.is_multiple_of(BLOCK_ALIGN),
            RequestBoundsSnafu {
                min_request,
                max_request,
            }
        );
        ensure!(
            region_size.is_multiple_of(BLOCK_ALIGN)
                && region_size
                    .checked_sub(HEADER_SIZE)
                    .is_some_and(|usable| usable >= max_request),
            RegionSizeSnafu {
                region_size,
                max_request,
            }
        );
        Ok(())
    }

    /// Returns `true` if `size` is a valid argument to
    /// [`BinHeap::allocate`](crate::BinHeap::allocate).
    #[must_use]
    pub fn accepts(&self, size: usize) -> bool {
        (self.min_request..=self.max_request).contains(&size) && size.is_multiple_of(BLOCK_ALIGN)
    }

    /// Maps an arbitrary layout onto an accepted request size.
    ///
    /// The size is rounded up to a multiple of [`BLOCK_ALIGN`] and to at
    /// least [`min_request`](Self::min_request). Returns `None` for layouts
    /// that need stricter alignment than [`BLOCK_ALIGN`] or that exceed
    /// [`max_request`](Self::max_request).
    #[must_use]
    pub fn request_size(&self, layout: Layout) -> Option<usize> {
        if layout.align() > BLOCK_ALIGN {
            return None;
        }
        let size = layout
            .size()
            .max(self.min_request)
            .checked_next_multiple_of(BLOCK_ALIGN)?;
        (size <= self.max_request).then_some(size)
    }
}
