use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::{self, NonNull};

use super::control_block::ControlBlock;
use super::shared_ptr::SharedPtr;

/// A non-owning observer of a payload held by [`SharedPtr`]s.
///
/// A `WeakPtr` keeps the control block alive but not the payload. It never
/// hands out a borrow of the payload; use [`WeakPtr::lock`] to obtain an
/// owning pointer first.
pub struct WeakPtr<T> {
    block: Option<NonNull<ControlBlock<T>>>,
    _marker: PhantomData<T>,
}

impl<T> WeakPtr<T> {
    /// Observes the payload of `shared`. An unbound `shared` yields an
    /// unbound `WeakPtr`.
    pub fn new(shared: &SharedPtr<T>) -> WeakPtr<T> {
        let block = shared.block();
        if let Some(block) = block {
            // Safety: `shared` holds a strong unit, so the block is live.
            unsafe { block.as_ref() }.inc_weak();
        }
        WeakPtr {
            block,
            _marker: PhantomData,
        }
    }

    /// An unbound `WeakPtr`.
    pub const fn empty() -> WeakPtr<T> {
        WeakPtr {
            block: None,
            _marker: PhantomData,
        }
    }

    fn data(&self) -> Option<&ControlBlock<T>> {
        // Safety: a bound WeakPtr holds a weak unit, so the block is live.
        self.block.as_ref().map(|block| unsafe { block.as_ref() })
    }

    #[cfg(test)]
    pub(crate) fn block(&self) -> Option<NonNull<ControlBlock<T>>> {
        self.block
    }

    pub fn is_bound(&self) -> bool {
        self.block.is_some()
    }

    /// True if this pointer is unbound or its payload has been dropped.
    pub fn expired(&self) -> bool {
        self.data().map_or(true, |data| data.strong() == 0)
    }

    /// The payload address, or null if expired. The pointer is only valid
    /// for as long as some `SharedPtr` keeps the payload alive.
    pub fn as_ptr(&self) -> *const T {
        match self.data() {
            Some(data) if data.strong() != 0 => data.value().as_ptr(),
            _ => ptr::null(),
        }
    }

    /// Produces a new owner of the payload, or an unbound `SharedPtr` if it
    /// has already been dropped.
    pub fn lock(&self) -> SharedPtr<T> {
        match self.block {
            Some(block) if !self.expired() => {
                // Safety: not expired, so the block and payload are live.
                unsafe { block.as_ref() }.inc_strong();
                SharedPtr::from_block(block)
            }
            _ => SharedPtr::empty(),
        }
    }

    /// Like [`WeakPtr::lock`], but reports expiry as `None`.
    pub fn upgrade(&self) -> Option<SharedPtr<T>> {
        let shared = self.lock();
        if shared.is_bound() {
            Some(shared)
        } else {
            None
        }
    }

    /// Releases this pointer's weak unit and leaves it unbound.
    pub fn reset(&mut self) {
        if let Some(block) = self.block.take() {
            // Safety: the weak unit being released belonged to `self`.
            unsafe { ControlBlock::release_weak(block) };
        }
    }

    /// Moves the binding out, leaving `self` unbound. No count changes.
    pub fn take(&mut self) -> WeakPtr<T> {
        mem::take(self)
    }

    pub fn strong_count(&self) -> usize {
        self.data().map_or(0, ControlBlock::strong)
    }

    pub fn weak_count(&self) -> usize {
        self.data().map_or(0, ControlBlock::weak)
    }
}

impl<T> Default for WeakPtr<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> From<&SharedPtr<T>> for WeakPtr<T> {
    fn from(shared: &SharedPtr<T>) -> Self {
        Self::new(shared)
    }
}

impl<T> Clone for WeakPtr<T> {
    fn clone(&self) -> Self {
        if let Some(data) = self.data() {
            data.inc_weak();
        }
        WeakPtr {
            block: self.block,
            _marker: PhantomData,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        if self.block == source.block {
            return;
        }
        self.reset();
        *self = source.clone();
    }
}

impl<T> Drop for WeakPtr<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T> fmt::Debug for WeakPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(WeakPtr)")
    }
}
