//! Single-threaded shared ownership through a manually counted control block.
//!
//! A [`SharedPtr<T>`] owns one strong unit of a control block that tracks a
//! heap-allocated `T`. A [`WeakPtr<T>`] owns one weak unit: it keeps the
//! block alive, but not the payload. The payload is dropped when the strong
//! count reaches zero, and the block is freed once both counts are zero,
//! by whichever pointer releases last.
//!
//! Counts are plain integers, so neither pointer is `Send` or `Sync`.
//!
//! ```
//! use shared_weak::{SharedPtr, WeakPtr};
//!
//! let mut owner = SharedPtr::new(3);
//! let observer = WeakPtr::new(&owner);
//! assert_eq!(*observer.lock(), 3);
//!
//! owner.reset();
//! assert!(observer.expired());
//! assert!(observer.lock().as_ptr().is_null());
//! ```

pub mod pointers;

pub use crate::pointers::SharedPtr;
pub use crate::pointers::WeakPtr;
