//! Custom backing storage for [`Memory`](crate::memory::Memory).
//!
//! A [`MemoryManager`] owns a buffer that is not a managed array or string, for
//! example native memory or a pooled buffer. Memory handles over a manager ask it
//! for its current buffer on every access, so a manager whose buffer shrinks makes
//! previously valid handles fail at their next access instead of reading stale
//! memory.
//!
//! The buffer is a [`SharedBuffer`], which checks views at run time: handles over
//! the same manager can never hold overlapping mutable views.

use std::{
    ptr::NonNull,
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::{
    memory::borrow::{SharedBuffer, SpanMut, SpanRef},
    Result,
};

/// Owner of a buffer that memory handles can view and pin.
pub trait MemoryManager<T> {
    /// The manager's current buffer.
    fn buffer(&self) -> &SharedBuffer<T>;

    /// Pins the buffer and returns the address of `element_index`.
    ///
    /// `element_index` may equal the buffer length, yielding the one-past-the-end
    /// address.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ArgumentOutOfRange`] if `element_index` exceeds the buffer.
    fn pin(&self, element_index: usize) -> Result<NonNull<T>>;

    /// Releases one pin taken by [`pin`](Self::pin).
    fn unpin(&self);
}

/// A fixed-capacity native buffer with an adjustable logical length.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use dotcorelib::memory::{Memory, NativeMemoryManager};
///
/// let manager = Arc::new(NativeMemoryManager::<u8>::new(16));
/// let memory = Memory::from_manager(manager.clone(), 4, 8)?;
/// assert_eq!(memory.span()?.len(), 8);
///
/// manager.set_len(6)?;
/// assert!(memory.span().is_err());
/// # Ok::<(), dotcorelib::Error>(())
/// ```
pub struct NativeMemoryManager<T> {
    buffer: SharedBuffer<T>,
    pins: AtomicUsize,
}

impl<T> NativeMemoryManager<T> {
    /// Allocates `capacity` default elements; the logical length starts at capacity
    #[must_use]
    pub fn new(capacity: usize) -> Self
    where
        T: Default,
    {
        Self::from_vec(std::iter::repeat_with(T::default).take(capacity).collect())
    }

    /// Takes ownership of `values` as the buffer
    #[must_use]
    pub fn from_vec(values: Vec<T>) -> Self {
        NativeMemoryManager {
            buffer: SharedBuffer::from_vec(values),
            pins: AtomicUsize::new(0),
        }
    }

    /// Allocated element count
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Current logical length
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if the logical length is zero
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Changes the logical length.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ArgumentOutOfRange`] if `len` exceeds the capacity.
    pub fn set_len(&self, len: usize) -> Result<()> {
        self.buffer.set_len(len)
    }

    /// Exclusive view over the current buffer.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::BufferBorrowed`] if any other view is alive.
    pub fn span(&self) -> Result<SpanMut<'_, T>> {
        self.buffer.span()
    }

    /// Shared view over the current buffer.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::BufferBorrowed`] if a mutable view is alive.
    pub fn read_only_span(&self) -> Result<SpanRef<'_, T>> {
        self.buffer.read_only_span()
    }

    /// Number of outstanding pins
    #[must_use]
    pub fn pin_count(&self) -> usize {
        self.pins.load(Ordering::Acquire)
    }
}

impl<T> MemoryManager<T> for NativeMemoryManager<T> {
    fn buffer(&self) -> &SharedBuffer<T> {
        &self.buffer
    }

    fn pin(&self, element_index: usize) -> Result<NonNull<T>> {
        let len = self.len();
        if element_index > len {
            return Err(out_of_range!(
                "element_index",
                "element index {} exceeds length {}",
                element_index,
                len
            ));
        }
        self.pins.fetch_add(1, Ordering::AcqRel);
        // SAFETY: element_index <= len <= capacity
        let address = unsafe { self.buffer.as_mut_ptr().add(element_index) };
        Ok(NonNull::new(address).unwrap_or(NonNull::dangling()))
    }

    fn unpin(&self) {
        self.pins.fetch_sub(1, Ordering::AcqRel);
    }
}
