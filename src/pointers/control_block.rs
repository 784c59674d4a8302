use std::cell::Cell;
use std::ptr::NonNull;

const MAX_REFCOUNT: usize = isize::MAX as usize;

#[cfg(test)]
thread_local! {
    static LIVE_BLOCKS: Cell<usize> = Cell::new(0);
}

/// Number of control blocks allocated on this thread and not yet freed.
#[cfg(test)]
pub(crate) fn live_blocks() -> usize {
    LIVE_BLOCKS.with(Cell::get)
}

/// Bookkeeping shared by every `SharedPtr` and `WeakPtr` bound to one payload.
pub(crate) struct ControlBlock<T> {
    /// Number of `SharedPtr`s.
    strong: Cell<usize>,
    /// Number of `WeakPtr`s.
    weak: Cell<usize>,
    /// Set while the payload destructor runs. The block must not be freed
    /// underneath it, even if the payload drops the last `WeakPtr`.
    dropping: Cell<bool>,
    /// The payload. Dangling once `strong` has reached zero.
    value: NonNull<T>,
}

impl<T> ControlBlock<T> {
    /// Takes ownership of `value` and returns a block with one strong unit.
    pub(crate) fn allocate(value: Box<T>) -> NonNull<ControlBlock<T>> {
        #[cfg(test)]
        LIVE_BLOCKS.with(|n| n.set(n.get() + 1));
        NonNull::from(Box::leak(Box::new(ControlBlock {
            strong: Cell::new(1),
            weak: Cell::new(0),
            dropping: Cell::new(false),
            value: NonNull::from(Box::leak(value)),
        })))
    }

    pub(crate) fn strong(&self) -> usize {
        self.strong.get()
    }

    pub(crate) fn weak(&self) -> usize {
        self.weak.get()
    }

    pub(crate) fn value(&self) -> NonNull<T> {
        self.value
    }

    pub(crate) fn inc_strong(&self) {
        let n = self.strong.get();
        if n >= MAX_REFCOUNT {
            std::process::abort();
        }
        self.strong.set(n + 1);
    }

    pub(crate) fn inc_weak(&self) {
        let n = self.weak.get();
        if n >= MAX_REFCOUNT {
            std::process::abort();
        }
        self.weak.set(n + 1);
    }

    /// Gives back one strong unit, destroying the payload on the last one.
    ///
    /// Safety: `block` must be live and the caller must own the strong unit
    /// it is releasing.
    pub(crate) unsafe fn release_strong(block: NonNull<Self>) {
        let data = block.as_ref();
        let n = data.strong.get() - 1;
        data.strong.set(n);
        if n != 0 {
            return;
        }
        data.dropping.set(true);
        // Runs on unwind too, so a panicking payload destructor still
        // leaves the counts exact and the block freeable.
        let _finish = FinishDrop { block };
        let value = data.value;
        drop(Box::from_raw(value.as_ptr()));
        log::trace!("payload {:p} destroyed", value);
    }

    /// Gives back one weak unit, freeing the block once both counts are zero.
    ///
    /// Safety: `block` must be live and the caller must own the weak unit
    /// it is releasing.
    pub(crate) unsafe fn release_weak(block: NonNull<Self>) {
        let data = block.as_ref();
        data.weak.set(data.weak.get() - 1);
        Self::free_if_unused(block);
    }

    /// Safety: `block` must be live, and must not be used again by the
    /// caller if both counts are zero.
    unsafe fn free_if_unused(block: NonNull<Self>) {
        let data = block.as_ref();
        if data.strong.get() == 0 && data.weak.get() == 0 && !data.dropping.get() {
            log::trace!("control block {:p} freed", block);
            drop(Box::from_raw(block.as_ptr()));
            #[cfg(test)]
            LIVE_BLOCKS.with(|n| n.set(n.get() - 1));
        }
    }
}

/// Ends the payload-destruction phase of a block whose strong count is zero.
struct FinishDrop<T> {
    block: NonNull<ControlBlock<T>>,
}

impl<T> Drop for FinishDrop<T> {
    fn drop(&mut self) {
        // Safety: `dropping` kept the block alive until now, and nothing
        // touches it after this guard.
        unsafe {
            self.block.as_ref().dropping.set(false);
            ControlBlock::free_if_unused(self.block);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{live_blocks, ControlBlock};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering::Relaxed;

    #[test]
    fn test_allocate_starts_with_one_strong_unit() {
        let value = Box::new(3);
        let raw: *const i32 = &*value;
        let before = live_blocks();
        let block = ControlBlock::allocate(value);
        let data = unsafe { block.as_ref() };
        assert_eq!(data.strong(), 1);
        assert_eq!(data.weak(), 0);
        assert_eq!(data.value().as_ptr() as *const i32, raw);
        assert_eq!(live_blocks(), before + 1);
        unsafe { ControlBlock::release_strong(block) };
        assert_eq!(live_blocks(), before);
    }

    #[test]
    fn test_payload_dropped_once_while_weak_units_keep_block() {
        static NUM_DROPS: AtomicUsize = AtomicUsize::new(0);
        struct DetectDrop;
        impl Drop for DetectDrop {
            fn drop(&mut self) {
                NUM_DROPS.fetch_add(1, Relaxed);
            }
        }

        let before = live_blocks();
        let block = ControlBlock::allocate(Box::new(DetectDrop));
        let data = unsafe { block.as_ref() };
        data.inc_strong();
        data.inc_weak();
        assert_eq!((data.strong(), data.weak()), (2, 1));

        unsafe { ControlBlock::release_strong(block) };
        assert_eq!(NUM_DROPS.load(Relaxed), 0);

        unsafe { ControlBlock::release_strong(block) };
        assert_eq!(NUM_DROPS.load(Relaxed), 1);
        // The block survives for the outstanding weak unit.
        let data = unsafe { block.as_ref() };
        assert_eq!((data.strong(), data.weak()), (0, 1));
        assert_eq!(live_blocks(), before + 1);

        unsafe { ControlBlock::release_weak(block) };
        assert_eq!(NUM_DROPS.load(Relaxed), 1);
        assert_eq!(live_blocks(), before);
    }

    #[test]
    fn test_last_weak_release_before_strong_keeps_block() {
        let before = live_blocks();
        let block = ControlBlock::allocate(Box::new(7));
        let data = unsafe { block.as_ref() };
        data.inc_weak();
        unsafe { ControlBlock::release_weak(block) };
        // The payload still has an owner, so the block stays.
        assert_eq!(live_blocks(), before + 1);
        assert_eq!((data.strong(), data.weak()), (1, 0));

        unsafe { ControlBlock::release_strong(block) };
        assert_eq!(live_blocks(), before);
    }
}
