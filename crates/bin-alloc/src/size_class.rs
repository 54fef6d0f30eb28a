//! Size classes for free blocks.
//!
//! Every free block lives in exactly one *bin*, chosen by its usable size. A
//! bin is described by its lower threshold; the upper bound is the next bin's
//! threshold (the last bin is unbounded). Requests start their search in the
//! bin their own size maps to and move upwards from there.
//!
//! ```text
//! bin:        0     1      2      3      4      5       6       7
//! sizes:   [0,16) [16,64) [64,128) ... [512,1024) [1024,2048) [2048,∞)
//! ```

use snafu::Snafu;

/// Maximum number of bins a [`SizeClasses`] ladder may hold.
pub const MAX_SIZE_CLASSES: usize = 16;

/// Lower thresholds of the default ladder.
const DEFAULT_THRESHOLDS: [usize; 8] = [0, 16, 64, 128, 256, 512, 1024, 2048];

/// Reasons a threshold list does not form a valid ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
pub enum SizeClassError {
    #[snafu(display("size class ladder is empty"))]
    Empty,
    #[snafu(display("size class ladder has {len} entries, at most {MAX_SIZE_CLASSES} allowed"))]
    TooMany { len: usize },
    #[snafu(display("first size class must start at 0, not {first}"))]
    NonZeroStart { first: usize },
    #[snafu(display("size class thresholds must be strictly ascending (entry {index})"))]
    NotAscending { index: usize },
}

/// An ascending ladder of size-class thresholds.
///
/// The mapping from size to bin is total and monotonic: every size maps to
/// exactly one bin, and a larger size never maps to a smaller bin.
///
/// # Examples
///
/// ```
/// use bin_alloc::size_class::SizeClasses;
///
/// let classes = SizeClasses::DEFAULT;
/// assert_eq!(classes.classify(0), 0);
/// assert_eq!(classes.classify(16), 1);
/// assert_eq!(classes.classify(4080), 7);
///
/// let coarse = SizeClasses::new(&[0, 256]).unwrap();
/// assert_eq!(coarse.classify(255), 0);
/// assert_eq!(coarse.classify(256), 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SizeClasses {
    thresholds: [usize; MAX_SIZE_CLASSES],
    len: usize,
}

impl Default for SizeClasses {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl SizeClasses {
    /// The eight-bin ladder `0, 16, 64, 128, 256, 512, 1024, 2048`.
    pub const DEFAULT: Self = match Self::new(&DEFAULT_THRESHOLDS) {
        Ok(classes) => classes,
        Err(_) => panic!("invalid default size classes"),
    };

    /// Builds a ladder from its lower thresholds.
    ///
    /// The first threshold must be `0` so that every size has a bin, and the
    /// thresholds must be strictly ascending.
    pub const fn new(thresholds: &[usize]) -> Result<Self, SizeClassError> {
        if thresholds.is_empty() {
            return Err(SizeClassError::Empty);
        }
        if thresholds.len() > MAX_SIZE_CLASSES {
            return Err(SizeClassError::TooMany {
                len: thresholds.len(),
            });
        }
        if thresholds[0] != 0 {
            return Err(SizeClassError::NonZeroStart {
                first: thresholds[0],
            });
        }

        let mut array = [0; MAX_SIZE_CLASSES];
        let mut i = 1;
        while i < thresholds.len() {
            if thresholds[i] <= thresholds[i - 1] {
                return Err(SizeClassError::NotAscending { index: i });
            }
            array[i] = thresholds[i];
            i += 1;
        }

        Ok(Self {
            thresholds: array,
            len: thresholds.len(),
        })
    }

    /// Returns the number of bins.
    #[must_use]
    #[expect(clippy::len_without_is_empty, reason = "a ladder is never empty")]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns the lower thresholds, one per bin.
    #[must_use]
    pub fn thresholds(&self) -> &[usize] {
        &self.thresholds[..self.len]
    }

    /// Returns the bin index for a block or request of `size` bytes.
    #[must_use]
    pub fn classify(&self, size: usize) -> usize {
        // thresholds[0] == 0, so at least one threshold is <= size
        self.thresholds().partition_point(|&threshold| threshold <= size) - 1
    }

    /// Returns the half-open size range covered by `bin`.
    ///
    /// The last bin has no upper bound.
    ///
    /// # Panics
    ///
    /// Panics if `bin` is out of range.
    #[must_use]
    pub fn bounds(&self, bin: usize) -> (usize, Option<usize>) {
        assert!(bin < self.len, "bin index out of range");
        let upper = (bin + 1 < self.len).then(|| self.thresholds[bin + 1]);
        (self.thresholds[bin], upper)
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ladder() {
        let classes = SizeClasses::DEFAULT;
        assert_eq!(classes.len(), 8);

        let cases = [
            (0, 0),
            (8, 0),
            (15, 0),
            (16, 1),
            (63, 1),
            (64, 2),
            (127, 2),
            (128, 3),
            (255, 3),
            (256, 4),
            (511, 4),
            (512, 5),
            (1023, 5),
            (1024, 6),
            (2047, 6),
            (2048, 7),
            (4080, 7),
            (usize::MAX, 7),
        ];
        for (size, bin) in cases {
            assert_eq!(classes.classify(size), bin, "size {size}");
        }
    }

    #[test]
    fn test_classify_is_monotonic() {
        let classes = SizeClasses::DEFAULT;
        let mut prev = 0;
        for size in 0..5000 {
            let bin = classes.classify(size);
            assert!(bin >= prev);
            assert!(bin < classes.len());
            prev = bin;
        }
    }

    #[test]
    fn test_bounds() {
        let classes = SizeClasses::DEFAULT;
        assert_eq!(classes.bounds(0), (0, Some(16)));
        assert_eq!(classes.bounds(3), (128, Some(256)));
        assert_eq!(classes.bounds(7), (2048, None));
    }

    #[test]
    #[should_panic = "bin index out of range"]
    fn test_bounds_out_of_range() {
        let _ = SizeClasses::DEFAULT.bounds(8);
    }

    #[test]
    fn test_custom_ladder() {
        let classes = SizeClasses::new(&[0, 32, 1000]).unwrap();
        assert_eq!(classes.len(), 3);
        assert_eq!(classes.thresholds(), &[0, 32, 1000]);
        assert_eq!(classes.classify(31), 0);
        assert_eq!(classes.classify(32), 1);
        assert_eq!(classes.classify(999), 1);
        assert_eq!(classes.classify(1000), 2);

        let single = SizeClasses::new(&[0]).unwrap();
        assert_eq!(single.classify(0), 0);
        assert_eq!(single.classify(1 << 20), 0);
    }

    #[test]
    fn test_invalid_ladders() {
        assert_eq!(SizeClasses::new(&[]), Err(SizeClassError::Empty));
        assert_eq!(
            SizeClasses::new(&[8, 16]),
            Err(SizeClassError::NonZeroStart { first: 8 })
        );
        assert_eq!(
            SizeClasses::new(&[0, 64, 64]),
            Err(SizeClassError::NotAscending { index: 2 })
        );
        assert_eq!(
            SizeClasses::new(&[0, 64, 32]),
            Err(SizeClassError::NotAscending { index: 2 })
        );
        let too_many: [usize; MAX_SIZE_CLASSES + 1] = core::array::from_fn(|i| i * 8);
        assert_eq!(
            SizeClasses::new(&too_many),
            Err(SizeClassError::TooMany {
                len: MAX_SIZE_CLASSES + 1
            })
        );
    }
}
