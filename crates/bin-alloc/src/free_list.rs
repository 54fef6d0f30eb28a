//! Singly linked list of free blocks for one bin.
//!
//! The list is threaded through the `next` field of each free block's
//! header, so it needs no storage of its own besides the head pointer.
//! Insertion is always at the head. Removal needs the predecessor, which the
//! best-fit walk records as it goes.

use core::{iter::FusedIterator, marker::PhantomData, ptr::NonNull};

use crate::block::{BlockHeader, FreeBlock, UsedBlock};

/// The best candidate found by [`FreeList::best_fit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Fit {
    pub(crate) block: NonNull<BlockHeader>,
    /// Block linked right before `block`, or `None` if `block` is the head.
    pub(crate) prev: Option<NonNull<BlockHeader>>,
    pub(crate) size: usize,
}

#[derive(Debug)]
pub(crate) struct FreeList {
    head: *mut BlockHeader,
    len: usize,
}

impl Default for FreeList {
    fn default() -> Self {
        Self::new()
    }
}

impl FreeList {
    pub(crate) const fn new() -> Self {
        Self {
            head: core::ptr::null_mut(),
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_null()
    }

    /// Forgets every block in the list.
    ///
    /// The blocks themselves are left untouched.
    pub(crate) fn clear(&mut self) {
        self.head = core::ptr::null_mut();
        self.len = 0;
    }

    /// Links `block` in front of the current head.
    pub(crate) fn push_front(&mut self, block: FreeBlock) {
        let header = block.header().as_ptr();
        unsafe {
            debug_assert!((*header).next.is_null(), "Free block must not be already linked");
            debug_assert!(!core::ptr::eq(header, self.head), "Free block is already the head");
            (*header).next = self.head;
        }
        self.head = header;
        self.len += 1;
    }

    /// Finds the smallest block that can hold `size` bytes.
    ///
    /// Blocks are visited from head to tail and the first block of the
    /// smallest sufficient size wins.
    pub(crate) fn best_fit(&self, size: usize) -> Option<Fit> {
        let mut best: Option<Fit> = None;
        let mut prev = None;
        let mut current = NonNull::new(self.head);
        while let Some(block) = current {
            let block_size = unsafe { block.as_ref().size };
            if block_size >= size && best.is_none_or(|best| block_size < best.size) {
                best = Some(Fit {
                    block,
                    prev,
                    size: block_size,
                });
                if block_size == size {
                    break;
                }
            }
            prev = Some(block);
            current = NonNull::new(unsafe { block.as_ref().next });
        }
        best
    }

    /// Unlinks `block` from the list.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `block` is linked into this list and
    /// that `prev` is its predecessor (`None` if `block` is the head).
    pub(crate) unsafe fn remove(
        &mut self,
        block: NonNull<BlockHeader>,
        prev: Option<NonNull<BlockHeader>>,
    ) -> UsedBlock {
        unsafe {
            let next = (*block.as_ptr()).next;
            match prev {
                Some(prev) => {
                    debug_assert!(core::ptr::eq(prev.as_ref().next, block.as_ptr()));
                    (*prev.as_ptr()).next = next;
                }
                None => {
                    debug_assert!(core::ptr::eq(self.head, block.as_ptr()));
                    self.head = next;
                }
            }
            (*block.as_ptr()).next = core::ptr::null_mut();
            self.len -= 1;
            UsedBlock::from_unlinked(block)
        }
    }

    /// Returns an iterator over the sizes of the blocks, head first.
    pub(crate) fn iter(&self) -> Sizes<'_> {
        Sizes {
            current: NonNull::new(self.head),
            _list: PhantomData,
        }
    }
}

/// Iterator over the block sizes of one bin, head first.
#[derive(Debug, Clone)]
pub struct Sizes<'a> {
    current: Option<NonNull<BlockHeader>>,
    _list: PhantomData<&'a FreeList>,
}

impl Iterator for Sizes<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.current?;
        unsafe {
            self.current = NonNull::new(block.as_ref().next);
            Some(block.as_ref().size)
        }
    }
}

impl FusedIterator for Sizes<'_> {}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use core::alloc::Layout;

    use super::*;
    use crate::block::HEADER_SIZE;

    /// Carves one free block per entry of `sizes`, each in its own 128-byte
    /// slot, and passes them to `test_fn` in order.
    fn with_test_blocks<F>(sizes: &[usize], test_fn: F)
    where
        F: FnOnce(Vec<FreeBlock>),
    {
        const SLOT: usize = 128;
        unsafe {
            let len = SLOT * sizes.len().max(1);
            let layout = Layout::from_size_align(len, 16).unwrap();
            let start = NonNull::new(std::alloc::alloc(layout)).unwrap();
            start.write_bytes(0x11, len);
            let blocks = sizes
                .iter()
                .enumerate()
                .map(|(i, &size)| {
                    assert!(HEADER_SIZE + size <= SLOT);
                    FreeBlock::carve(start.add(i * SLOT), HEADER_SIZE + size)
                })
                .collect();
            test_fn(blocks);
            std::alloc::dealloc(start.as_ptr(), layout);
        }
    }

    fn list_of(blocks: Vec<FreeBlock>) -> FreeList {
        let mut list = FreeList::new();
        for block in blocks {
            list.push_front(block);
        }
        list
    }

    #[test]
    fn test_empty_list() {
        let list = FreeList::new();
        assert!(list.is_empty());
        assert_eq!(list.len(), 0);
        assert!(list.best_fit(8).is_none());
        assert_eq!(list.iter().count(), 0);
    }

    #[test]
    fn test_push_front_order() {
        with_test_blocks(&[24, 40, 56], |blocks| {
            let list = list_of(blocks);
            assert!(!list.is_empty());
            assert_eq!(list.len(), 3);
            assert_eq!(list.iter().collect::<Vec<_>>(), [56, 40, 24]);
        });
    }

    #[test]
    fn test_best_fit_picks_smallest_sufficient() {
        // pushed in order, so the list reads 17, 50, 20 from the head
        with_test_blocks(&[20, 50, 17], |blocks| {
            let list = list_of(blocks);
            let fit = list.best_fit(16).unwrap();
            assert_eq!(fit.size, 17);
            assert!(fit.prev.is_none());

            let fit = list.best_fit(18).unwrap();
            assert_eq!(fit.size, 20);
            assert_eq!(fit.prev.map(|prev| unsafe { prev.as_ref().size }), Some(50));

            assert_eq!(list.best_fit(50).unwrap().size, 50);
            assert!(list.best_fit(51).is_none());
        });
    }

    #[test]
    fn test_best_fit_ties_go_to_first() {
        with_test_blocks(&[32, 64, 32], |blocks| {
            let first_pushed = blocks[0].header();
            let last_pushed = blocks[2].header();
            let list = list_of(blocks);
            let fit = list.best_fit(24).unwrap();
            assert_eq!(fit.block, last_pushed);
            assert_ne!(fit.block, first_pushed);
        });
    }

    #[test]
    fn test_remove_head_middle_tail() {
        with_test_blocks(&[8, 16, 24, 32], |blocks| unsafe {
            let mut list = list_of(blocks);
            // head -> 32 -> 24 -> 16 -> 8

            let fit = list.best_fit(24).unwrap();
            let used = list.remove(fit.block, fit.prev);
            assert_eq!(used.size(), 24);
            assert_eq!(list.iter().collect::<Vec<_>>(), [32, 16, 8]);

            let fit = list.best_fit(32).unwrap();
            assert!(fit.prev.is_none());
            let used = list.remove(fit.block, fit.prev);
            assert_eq!(used.size(), 32);
            assert_eq!(list.iter().collect::<Vec<_>>(), [16, 8]);

            let fit = list.best_fit(8).unwrap();
            let used = list.remove(fit.block, fit.prev);
            assert_eq!(used.size(), 8);
            assert_eq!(list.iter().collect::<Vec<_>>(), [16]);
            assert_eq!(list.len(), 1);

            // a removed block can be pushed again
            list.push_front(used.into_free());
            assert_eq!(list.iter().collect::<Vec<_>>(), [8, 16]);
        });
    }

    #[test]
    fn test_clear() {
        with_test_blocks(&[8, 16], |blocks| {
            let mut list = list_of(blocks);
            list.clear();
            assert!(list.is_empty());
            assert_eq!(list.len(), 0);
            assert!(list.best_fit(8).is_none());
        });
    }
}
