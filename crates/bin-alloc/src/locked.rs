//! A spin-locked heap for use as the global allocator.

use core::{
    alloc::{GlobalAlloc, Layout},
    ptr::{self, NonNull},
};

use spin::{Mutex, MutexGuard};

use crate::{BinHeap, page::PageProvider};

/// A [`BinHeap`] behind a spin lock, usable as a [`GlobalAlloc`].
///
/// Layouts are mapped onto heap requests with
/// [`HeapConfig::request_size`](crate::HeapConfig::request_size); layouts
/// that cannot be served make [`alloc`](GlobalAlloc::alloc) return null.
///
/// When installed as the global allocator, no logger that allocates may be
/// enabled for this crate's log records: they are emitted while the lock is
/// held.
///
/// # Examples
///
/// ```
/// use core::alloc::{GlobalAlloc as _, Layout};
///
/// use bin_alloc::{LockedBinHeap, page::SystemPages};
///
/// static HEAP: LockedBinHeap<SystemPages> = LockedBinHeap::new(SystemPages::new());
///
/// let layout = Layout::new::<[u64; 4]>();
/// unsafe {
///     let ptr = HEAP.alloc(layout);
///     assert!(!ptr.is_null());
///     HEAP.dealloc(ptr, layout);
/// }
/// assert_eq!(HEAP.lock().stats().live_blocks, 0);
/// ```
#[derive(Debug)]
pub struct LockedBinHeap<P> {
    heap: Mutex<BinHeap<P>>,
}

impl<P> LockedBinHeap<P>
where
    P: PageProvider,
{
    /// Wraps a heap with the default configuration.
    #[must_use]
    pub const fn new(provider: P) -> Self {
        Self::from_heap(BinHeap::with_default_config(provider))
    }

    /// Wraps an already configured heap.
    #[must_use]
    pub const fn from_heap(heap: BinHeap<P>) -> Self {
        Self {
            heap: Mutex::new(heap),
        }
    }

    /// Locks the heap for direct use.
    pub fn lock(&self) -> MutexGuard<'_, BinHeap<P>> {
        self.heap.lock()
    }
}

unsafe impl<P> GlobalAlloc for LockedBinHeap<P>
where
    P: PageProvider,
{
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let mut heap = self.heap.lock();
        let Some(size) = heap.config().request_size(layout) else {
            return ptr::null_mut();
        };
        heap.try_allocate(size).map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        if let Some(ptr) = NonNull::new(ptr) {
            unsafe { self.heap.lock().release(ptr) }
        }
    }
}
