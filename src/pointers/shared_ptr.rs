use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::Deref;
use std::ptr::{self, NonNull};

use super::control_block::ControlBlock;
use super::weak_ptr::WeakPtr;

/// A single-threaded shared owner of a heap-allocated `T`.
///
/// Every bound `SharedPtr` holds one strong unit of its control block. The
/// payload is dropped when the last strong unit is released; the block
/// itself lives on until the last [`WeakPtr`] is gone as well.
///
/// A `SharedPtr` may also be unbound (see [`SharedPtr::empty`]), in which
/// case it refers to no block and owns nothing. Dereferencing an unbound
/// pointer panics.
pub struct SharedPtr<T> {
    block: Option<NonNull<ControlBlock<T>>>,
    _marker: PhantomData<T>,
}

impl<T> SharedPtr<T> {
    /// Moves `value` to the heap and binds a fresh control block to it.
    pub fn new(value: T) -> SharedPtr<T> {
        Self::from_box(Box::new(value))
    }

    /// Binds a fresh control block to an already boxed payload. The payload
    /// keeps its address, so [`SharedPtr::as_ptr`] returns the same pointer
    /// the box held.
    pub fn from_box(value: Box<T>) -> SharedPtr<T> {
        SharedPtr {
            block: Some(ControlBlock::allocate(value)),
            _marker: PhantomData,
        }
    }

    /// Takes ownership of a raw payload pointer. A null pointer produces an
    /// unbound `SharedPtr` and allocates nothing.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must come from [`Box::into_raw`] and must not be
    /// owned by anything else.
    pub unsafe fn from_raw(ptr: *mut T) -> SharedPtr<T> {
        if ptr.is_null() {
            Self::empty()
        } else {
            Self::from_box(Box::from_raw(ptr))
        }
    }

    /// An unbound `SharedPtr`.
    pub const fn empty() -> SharedPtr<T> {
        SharedPtr {
            block: None,
            _marker: PhantomData,
        }
    }

    /// Wraps a strong unit the caller has already added to `block`.
    pub(crate) fn from_block(block: NonNull<ControlBlock<T>>) -> SharedPtr<T> {
        SharedPtr {
            block: Some(block),
            _marker: PhantomData,
        }
    }

    pub(crate) fn block(&self) -> Option<NonNull<ControlBlock<T>>> {
        self.block
    }

    fn data(&self) -> Option<&ControlBlock<T>> {
        // Safety: a bound SharedPtr holds a strong unit, so the block is live.
        self.block.as_ref().map(|block| unsafe { block.as_ref() })
    }

    pub fn is_bound(&self) -> bool {
        self.block.is_some()
    }

    /// Borrows the payload, or returns `None` if this pointer is unbound.
    pub fn get(&self) -> Option<&T> {
        // Safety: the strong unit held by `self` keeps the payload alive.
        self.data().map(|data| unsafe { data.value().as_ref() })
    }

    /// The payload address, or null if this pointer is unbound.
    pub fn as_ptr(&self) -> *const T {
        match self.data() {
            Some(data) => data.value().as_ptr(),
            None => ptr::null(),
        }
    }

    /// Mutably borrows the payload if this is its only owner and no weak
    /// pointers observe it.
    ///
    /// An associated function, so that it never shadows a `get_mut` method of
    /// the payload reached through `Deref`.
    pub fn get_mut(this: &mut Self) -> Option<&mut T> {
        let data = this.data()?;
        if data.strong() == 1 && data.weak() == 0 {
            let value = data.value();
            // Safety: no other SharedPtr or WeakPtr can reach the payload,
            // and `this` is exclusively borrowed.
            unsafe { Some(&mut *value.as_ptr()) }
        } else {
            None
        }
    }

    /// Releases this pointer's strong unit and leaves it unbound.
    ///
    /// Releasing the last strong unit drops the payload. The control block
    /// is freed too if no weak pointers remain.
    pub fn reset(&mut self) {
        if let Some(block) = self.block.take() {
            // Safety: the strong unit being released belonged to `self`.
            unsafe { ControlBlock::release_strong(block) };
        }
    }

    /// Moves the binding out, leaving `self` unbound. No count changes.
    pub fn take(&mut self) -> SharedPtr<T> {
        mem::take(self)
    }

    /// Creates a [`WeakPtr`] observing the same payload.
    pub fn downgrade(this: &Self) -> WeakPtr<T> {
        WeakPtr::new(this)
    }

    /// Number of `SharedPtr`s bound to this pointer's block, or 0 if unbound.
    pub fn strong_count(&self) -> usize {
        self.data().map_or(0, ControlBlock::strong)
    }

    /// Number of `WeakPtr`s bound to this pointer's block, or 0 if unbound.
    pub fn weak_count(&self) -> usize {
        self.data().map_or(0, ControlBlock::weak)
    }

    /// Whether both pointers refer to the same payload.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        ptr::eq(this.as_ptr(), other.as_ptr())
    }
}

impl<T> Default for SharedPtr<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> From<Box<T>> for SharedPtr<T> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T> Clone for SharedPtr<T> {
    fn clone(&self) -> Self {
        if let Some(data) = self.data() {
            data.inc_strong();
        }
        SharedPtr {
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

impl<T> Deref for SharedPtr<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self.get() {
            Some(value) => value,
            None => panic!("dereferenced an empty SharedPtr"),
        }
    }
}

impl<T> Drop for SharedPtr<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T> PartialEq for SharedPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl<T> Eq for SharedPtr<T> {}

impl<T> PartialEq<*const T> for SharedPtr<T> {
    fn eq(&self, other: &*const T) -> bool {
        ptr::eq(self.as_ptr(), *other)
    }
}

impl<T> PartialEq<*mut T> for SharedPtr<T> {
    fn eq(&self, other: &*mut T) -> bool {
        ptr::eq(self.as_ptr(), *other)
    }
}

impl<T> PartialEq<SharedPtr<T>> for *const T {
    fn eq(&self, other: &SharedPtr<T>) -> bool {
        ptr::eq(*self, other.as_ptr())
    }
}

impl<T> PartialEq<SharedPtr<T>> for *mut T {
    fn eq(&self, other: &SharedPtr<T>) -> bool {
        ptr::eq(*self, other.as_ptr())
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f.debug_tuple("SharedPtr").field(value).finish(),
            None => f.write_str("SharedPtr(<empty>)"),
        }
    }
}

impl<T> fmt::Pointer for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.as_ptr(), f)
    }
}
