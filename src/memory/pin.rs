//! Scoped pinning of memory backing storage.
//!
//! Pinning guarantees that the address of a backing buffer stays valid and fixed
//! until the pin is released. A [`MemoryHandle`] owns one pin and releases it when
//! dropped or disposed, so every acquisition has exactly one release.

use std::{fmt, ptr, sync::Arc};

use crate::memory::{
    array::{ManagedArray, ManagedString},
    manager::MemoryManager,
};

/// Something that can release a pin taken on it.
pub trait Pinnable {
    /// Releases one pin
    fn unpin(&self);
}

/// A pinned address plus the pin that keeps it valid.
///
/// # Examples
///
/// ```rust
/// use dotcorelib::memory::{ManagedArray, Memory};
///
/// let array = ManagedArray::from_vec(vec![1u32, 2, 3, 4]);
/// let memory = Memory::from(array.clone()).slice_from(2)?;
/// {
///     let handle = memory.pin()?;
///     assert_eq!(array.pin_count(), 1);
///     assert_eq!(unsafe { *handle.pointer().cast::<u32>() }, 3);
/// }
/// assert_eq!(array.pin_count(), 0);
/// # Ok::<(), dotcorelib::Error>(())
/// ```
pub struct MemoryHandle {
    pointer: *mut u8,
    pinnable: Option<Box<dyn Pinnable>>,
}

impl MemoryHandle {
    /// Creates a handle over `pointer` released through `pinnable`
    #[must_use]
    pub fn new(pointer: *mut u8, pinnable: Option<Box<dyn Pinnable>>) -> Self {
        MemoryHandle { pointer, pinnable }
    }

    /// A handle that pins nothing
    #[must_use]
    pub fn empty() -> Self {
        MemoryHandle {
            pointer: ptr::null_mut(),
            pinnable: None,
        }
    }

    /// The pinned address; null for an empty or disposed handle
    #[must_use]
    pub fn pointer(&self) -> *mut u8 {
        self.pointer
    }

    /// Returns true while the handle still holds a pin
    #[must_use]
    pub fn is_pinned(&self) -> bool {
        self.pinnable.is_some()
    }

    /// Releases the pin early. Calling it again is a no-op.
    pub fn dispose(&mut self) {
        if let Some(pinnable) = self.pinnable.take() {
            pinnable.unpin();
        }
        self.pointer = ptr::null_mut();
    }
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for MemoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryHandle")
            .field("pointer", &self.pointer)
            .field("pinned", &self.is_pinned())
            .finish()
    }
}

pub(crate) struct ArrayPin<T>(pub(crate) ManagedArray<T>);

impl<T> Pinnable for ArrayPin<T> {
    fn unpin(&self) {
        self.0.unpin();
    }
}

pub(crate) struct StringPin(pub(crate) ManagedString);

impl Pinnable for StringPin {
    fn unpin(&self) {
        self.0.unpin();
    }
}

pub(crate) struct ManagerPin<T>(pub(crate) Arc<dyn MemoryManager<T>>);

impl<T> Pinnable for ManagerPin<T> {
    fn unpin(&self) {
        self.0.unpin();
    }
}
