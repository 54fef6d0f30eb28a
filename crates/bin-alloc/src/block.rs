//! Block headers and block carving.
//!
//! A block is a header followed by its payload. The payload start is the
//! pointer handed out to callers, so the header can always be recovered by
//! stepping back [`HEADER_SIZE`] bytes.
//!
//! ```text
//! ... | BlockHeader | payload (size bytes) | BlockHeader | payload | ...
//!     ^             ^
//!     header        payload pointer
//! ```
//!
//! Two handle types encode where a block currently is:
//!
//! - [`FreeBlock`]: an unlinked block that is about to enter a free list.
//!   [`FreeList::push_front`](crate::free_list::FreeList::push_front) consumes
//!   it, so the same handle cannot be linked twice.
//! - [`UsedBlock`]: a block detached from every free list, owned by a caller.

use core::ptr::{self, NonNull};

/// Alignment guaranteed for every header and payload.
///
/// Request sizes are multiples of this value, which keeps split points
/// aligned.
pub const BLOCK_ALIGN: usize = 8;

/// Size in bytes of the metadata that precedes every payload.
pub const HEADER_SIZE: usize = size_of::<BlockHeader>();

const _: () = {
    assert!(align_of::<BlockHeader>() <= BLOCK_ALIGN);
    assert!(HEADER_SIZE.is_multiple_of(BLOCK_ALIGN));
};

/// Metadata stored immediately before every payload.
#[repr(C)]
#[derive(Debug)]
pub(crate) struct BlockHeader {
    /// Usable payload bytes, excluding this header.
    pub(crate) size: usize,
    /// Next free block in the same bin. Null while the block is allocated or
    /// is the tail of its list.
    pub(crate) next: *mut Self,
}

impl BlockHeader {
    /// Returns the payload start of the block at `header`.
    fn payload(header: NonNull<Self>) -> NonNull<u8> {
        unsafe { header.cast::<u8>().add(HEADER_SIZE) }
    }
}

/// A block that is not linked into any free list.
#[derive(Debug)]
pub(crate) struct FreeBlock {
    header: NonNull<BlockHeader>,
}

impl FreeBlock {
    /// Turns `len` bytes at `start` into a single free block.
    ///
    /// The resulting block has `len - HEADER_SIZE` usable bytes.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// - `start..start + len` is valid for writes and not in use
    /// - the range stays valid for as long as the block is reachable
    pub(crate) unsafe fn carve(start: NonNull<u8>, len: usize) -> Self {
        let header = start.cast::<BlockHeader>();
        assert!(header.is_aligned(), "Block start must be properly aligned");
        assert!(len > HEADER_SIZE, "Block must be larger than its header");

        unsafe {
            header.write(BlockHeader {
                size: len - HEADER_SIZE,
                next: ptr::null_mut(),
            });
        }
        Self { header }
    }

    /// Usable payload bytes of this block.
    pub(crate) fn size(&self) -> usize {
        unsafe { self.header.as_ref().size }
    }

    pub(crate) fn header(&self) -> NonNull<BlockHeader> {
        self.header
    }

    #[cfg(test)]
    pub(crate) fn payload(&self) -> NonNull<u8> {
        BlockHeader::payload(self.header)
    }
}

/// A block that has been taken out of its free list.
#[derive(Debug)]
pub(crate) struct UsedBlock {
    header: NonNull<BlockHeader>,
}

impl UsedBlock {
    /// Wraps a header that was just unlinked from a free list.
    ///
    /// # Safety
    ///
    /// `header` must point to a valid header that is not reachable from any
    /// free list.
    pub(crate) unsafe fn from_unlinked(header: NonNull<BlockHeader>) -> Self {
        unsafe {
            debug_assert!(header.as_ref().next.is_null(), "Block must be unlinked");
        }
        Self { header }
    }

    /// Recovers the block from a payload pointer returned earlier.
    ///
    /// # Safety
    ///
    /// `payload` must have been produced by [`UsedBlock::payload`] and the
    /// block must not have been released since.
    pub(crate) unsafe fn from_payload(payload: NonNull<u8>) -> Self {
        let header = unsafe { payload.sub(HEADER_SIZE) }.cast::<BlockHeader>();
        unsafe { Self::from_unlinked(header) }
    }

    /// Usable payload bytes of this block.
    pub(crate) fn size(&self) -> usize {
        unsafe { self.header.as_ref().size }
    }

    pub(crate) fn payload(&self) -> NonNull<u8> {
        BlockHeader::payload(self.header)
    }

    /// Splits off the bytes beyond the first `size` payload bytes.
    ///
    /// The tail becomes a new free block only if it can hold a header plus
    /// at least one payload byte. Otherwise the block keeps its full size and
    /// the slack stays inside the allocation.
    ///
    /// # Panics
    ///
    /// Panics if `size` exceeds the block size or is not a multiple of
    /// [`BLOCK_ALIGN`].
    pub(crate) fn split(&mut self, size: usize) -> Option<FreeBlock> {
        let total = self.size();
        assert!(size <= total, "Split point must lie within the block");
        assert!(
            size.is_multiple_of(BLOCK_ALIGN),
            "Split point must be properly aligned"
        );

        let remaining = total - size;
        if remaining <= HEADER_SIZE {
            return None;
        }

        unsafe {
            (*self.header.as_ptr()).size = size;
            let tail = self.payload().add(size);
            Some(FreeBlock::carve(tail, remaining))
        }
    }

    /// Hands the block back for insertion into a free list.
    pub(crate) fn into_free(self) -> FreeBlock {
        unsafe {
            assert!(
                self.header.as_ref().next.is_null(),
                "Block must not be already linked"
            );
        }
        FreeBlock {
            header: self.header,
        }
    }
}
