//! Node storage providers.
//!
//! Every node of a map lives in one arena vector whose buffer is obtained
//! from the map's allocator `A` (the `allocator-api2` trait, so `Global`,
//! `&bumpalo::Bump` and any other implementor plug in). `NodePool` is a
//! fixed-capacity bump region: it is carved out once, never grows, and can
//! back several maps at the same time by cloning the handle. Freed blocks go
//! back to the region only when they are the most recent allocation; the
//! rest is reclaimed when the last handle drops.

use allocator_api2::alloc::{AllocError as RawAllocError, Allocator, Layout};
use bumpalo::Bump;
use core::cell::Cell;
use core::fmt;
use core::ptr::NonNull;
use std::rc::Rc;

pub use allocator_api2::alloc::Global;

struct PoolState {
    arena: Bump,
    capacity: usize,
    live: Cell<usize>,
}

/// Fixed-capacity memory region shared by every clone of the handle.
#[derive(Clone)]
pub struct NodePool {
    state: Rc<PoolState>,
}

impl NodePool {
    /// A region of `bytes` bytes, reserved up front. No request is ever
    /// served from outside it.
    pub fn with_capacity(bytes: usize) -> Self {
        let arena = Bump::with_capacity(bytes);
        arena.set_allocation_limit(Some(arena.allocated_bytes()));
        Self {
            state: Rc::new(PoolState {
                arena,
                capacity: bytes,
                live: Cell::new(0),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.state.capacity
    }

    /// Bytes currently handed out and not yet returned.
    pub fn used(&self) -> usize {
        self.state.live.get()
    }

    /// True when both handles draw from the same region.
    pub fn shares_with(&self, other: &NodePool) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    fn arena(&self) -> &Bump {
        &self.state.arena
    }

    fn refused(&self, layout: Layout) -> RawAllocError {
        log::warn!(
            "node pool refused {} bytes: {} of {} in use",
            layout.size(),
            self.used(),
            self.capacity()
        );
        RawAllocError
    }
}

unsafe impl Allocator for NodePool {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, RawAllocError> {
        let block = <&Bump as Allocator>::allocate(&self.arena(), layout)
            .map_err(|_| self.refused(layout))?;
        self.state.live.set(self.used() + layout.size());
        Ok(block)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.state.live.set(self.used().saturating_sub(layout.size()));
        <&Bump as Allocator>::deallocate(&self.arena(), ptr, layout)
    }

    unsafe fn grow(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> Result<NonNull<[u8]>, RawAllocError> {
        let block = <&Bump as Allocator>::grow(&self.arena(), ptr, old_layout, new_layout)
            .map_err(|_| self.refused(new_layout))?;
        self.state
            .live
            .set(self.used() + new_layout.size() - old_layout.size());
        Ok(block)
    }

    unsafe fn shrink(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> Result<NonNull<[u8]>, RawAllocError> {
        let block = <&Bump as Allocator>::shrink(&self.arena(), ptr, old_layout, new_layout)?;
        self.state
            .live
            .set(self.used().saturating_sub(old_layout.size() - new_layout.size()));
        Ok(block)
    }
}

impl fmt::Debug for NodePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodePool")
            .field("capacity", &self.capacity())
            .field("used", &self.used())
            .finish()
    }
}

impl PartialEq for NodePool {
    fn eq(&self, other: &Self) -> bool {
        self.shares_with(other)
    }
}

impl Eq for NodePool {}
