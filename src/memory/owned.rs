//! Storable handles over contiguous memory.
//!
//! A [`Memory`] is a (backing object, index, length) triple. Unlike a
//! [`Span`](crate::memory::Span) it can be stored in fields and collections; it is
//! turned into a view on demand with [`Memory::span`]. The view is recomputed from the backing object on every
//! access, so handles over a [`MemoryManager`] whose buffer shrank fail at access
//! time rather than at construction.
//!
//! Views are borrowed from the backing object, not from the handle. Two handles
//! over the same array or manager share one borrow flag, so a mutable view from
//! either of them excludes every other view until it is dropped.
//!
//! # Backing Objects
//!
//! | Backing | Created from |
//! |---------|--------------|
//! | Managed array | [`ManagedArray`], [`ArraySegment`] |
//! | Managed string | [`ManagedString`] (read-only UTF-16 memory only) |
//! | Memory manager | [`Memory::from_manager`] |
//!
//! # Equality
//!
//! Two handles are equal when they refer to the same backing object (by identity)
//! with the same index and length. Contents are never compared.
//!
//! # Thread Affinity
//!
//! Handles are storable but bound to the thread that created their backing object.
//! Managed arrays and memory managers hand out views through shared references
//! without locking, so neither they nor handles over them are `Send` or `Sync`.
//! A handle may be kept across suspension points of a future that stays on one
//! thread.
//!
//! ```compile_fail
//! fn assert_send<T: Send>() {}
//! assert_send::<dotcorelib::memory::Memory<u8>>();
//! ```

use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use crate::{
    memory::{
        array::{ArraySegment, ManagedArray, ManagedString},
        borrow::{validate_window, SpanMut, SpanRef},
        buffer::move_within,
        manager::MemoryManager,
        pin::{ArrayPin, ManagerPin, MemoryHandle, StringPin},
    },
    Error, Result,
};

enum Backing<T> {
    Array(ManagedArray<T>),
    // only constructed for T = u16
    String(ManagedString),
    Manager(Arc<dyn MemoryManager<T>>),
}

impl<T> Clone for Backing<T> {
    fn clone(&self) -> Self {
        match self {
            Backing::Array(array) => Backing::Array(array.clone()),
            Backing::String(string) => Backing::String(string.clone()),
            Backing::Manager(manager) => Backing::Manager(Arc::clone(manager)),
        }
    }
}

impl<T> Backing<T> {
    fn identity(&self) -> usize {
        match self {
            Backing::Array(array) => array.identity(),
            Backing::String(string) => string.identity(),
            Backing::Manager(manager) => Arc::as_ptr(manager) as *const () as usize,
        }
    }

    fn read(&self, start: usize, length: usize) -> Result<SpanRef<'_, T>> {
        match self {
            Backing::Array(array) => array.buffer().read_window(start, length),
            Backing::String(string) => {
                validate_window(start, length, string.len())?;
                // SAFETY: string backing only exists for T = u16, strings are never written,
                // and the window was validated against the string
                Ok(unsafe {
                    SpanRef::from_immutable(string.as_ptr().add(start).cast::<T>(), length)
                })
            }
            Backing::Manager(manager) => manager.buffer().read_window(start, length),
        }
    }

    fn write(&self, start: usize, length: usize) -> Result<SpanMut<'_, T>> {
        match self {
            Backing::Array(array) => array.buffer().write_window(start, length),
            Backing::String(_) => Err(Error::NotSupported("writing to string memory")),
            Backing::Manager(manager) => manager.buffer().write_window(start, length),
        }
    }
}

/// A storable handle to a window of an array or custom buffer.
///
/// # Examples
///
/// ```rust
/// use dotcorelib::memory::{ManagedArray, Memory};
///
/// let array = ManagedArray::from_vec(vec![1, 2, 3, 4, 5]);
/// let memory = Memory::from(array.clone()).slice(1, 3)?;
/// memory.span()?.fill(0);
/// assert_eq!(array.to_vec()?, vec![1, 0, 0, 0, 5]);
/// assert_eq!(memory, Memory::from(array).slice(1, 3)?);
/// # Ok::<(), dotcorelib::Error>(())
/// ```
pub struct Memory<T> {
    backing: Option<Backing<T>>,
    index: usize,
    length: usize,
}

impl<T> Memory<T> {
    /// A handle over nothing
    #[must_use]
    pub fn empty() -> Self {
        Memory {
            backing: None,
            index: 0,
            length: 0,
        }
    }

    /// Handle over `length` elements of `array` starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ArgumentOutOfRange`] if the window exceeds the array.
    pub fn from_array_range(array: ManagedArray<T>, start: usize, length: usize) -> Result<Self> {
        validate_window(start, length, array.len())?;
        Ok(Memory {
            backing: Some(Backing::Array(array)),
            index: start,
            length,
        })
    }

    /// Handle over `length` elements of a manager's buffer starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ArgumentOutOfRange`] if the window exceeds the
    /// manager's current buffer.
    pub fn from_manager<M>(manager: Arc<M>, start: usize, length: usize) -> Result<Self>
    where
        M: MemoryManager<T> + 'static,
    {
        validate_window(start, length, manager.buffer().len())?;
        Ok(Memory {
            backing: Some(Backing::Manager(manager)),
            index: start,
            length,
        })
    }

    /// Number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns true if the handle covers no elements
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Projects the handle into an exclusive view.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArgumentOutOfRange`] if a manager's buffer no longer
    /// covers the handle's window, or [`Error::BufferBorrowed`] if any view of the
    /// backing object is alive.
    pub fn span(&self) -> Result<SpanMut<'_, T>> {
        match &self.backing {
            None => Ok(SpanMut::empty()),
            Some(backing) => backing.write(self.index, self.length),
        }
    }

    /// Projects the handle into a shared view.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArgumentOutOfRange`] if a manager's buffer no longer
    /// covers the handle's window, or [`Error::BufferBorrowed`] if a mutable view
    /// of the backing object is alive.
    pub fn read_only_span(&self) -> Result<SpanRef<'_, T>> {
        match &self.backing {
            None => Ok(SpanRef::empty()),
            Some(backing) => backing.read(self.index, self.length),
        }
    }

    /// Handle over the elements from `start` to the end.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ArgumentOutOfRange`] if `start > len()`.
    pub fn slice_from(&self, start: usize) -> Result<Self> {
        validate_window(start, 0, self.length)?;
        self.slice(start, self.length - start)
    }

    /// Handle over `length` elements starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ArgumentOutOfRange`] if the window exceeds the handle.
    pub fn slice(&self, start: usize, length: usize) -> Result<Self> {
        validate_window(start, length, self.length)?;
        Ok(Memory {
            backing: self.backing.clone(),
            index: self.index + start,
            length,
        })
    }

    /// Pins the backing storage and returns the address of the first element.
    ///
    /// # Errors
    ///
    /// Returns the manager's error if a manager-backed pin fails.
    pub fn pin(&self) -> Result<MemoryHandle>
    where
        T: 'static,
    {
        match &self.backing {
            None => Ok(MemoryHandle::empty()),
            Some(Backing::Array(array)) => {
                array.pin();
                // SAFETY: index <= array length
                let pointer = unsafe { array.buffer().as_mut_ptr().add(self.index) };
                Ok(MemoryHandle::new(
                    pointer.cast::<u8>(),
                    Some(Box::new(ArrayPin(array.clone()))),
                ))
            }
            Some(Backing::String(string)) => {
                string.pin();
                // SAFETY: index <= string length
                let pointer = unsafe { string.as_ptr().add(self.index) };
                Ok(MemoryHandle::new(
                    pointer.cast::<u8>().cast_mut(),
                    Some(Box::new(StringPin(string.clone()))),
                ))
            }
            Some(Backing::Manager(manager)) => {
                let pointer = manager.pin(self.index)?;
                Ok(MemoryHandle::new(
                    pointer.as_ptr().cast::<u8>(),
                    Some(Box::new(ManagerPin(Arc::clone(manager)))),
                ))
            }
        }
    }

    /// Copies the elements into a new vector.
    ///
    /// # Errors
    ///
    /// Fails like [`read_only_span`](Self::read_only_span).
    pub fn to_array(&self) -> Result<Vec<T>>
    where
        T: Clone,
    {
        Ok(self.read_only_span()?.to_vec())
    }

    /// Copies this handle's elements into `destination`, correct for any overlap.
    ///
    /// When both handles share a backing object, one exclusive view covering both
    /// windows is taken and the elements are moved within it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DestinationTooShort`] if `destination` is shorter,
    /// or the projection error of either handle.
    pub fn copy_to(&self, destination: &Memory<T>) -> Result<()>
    where
        T: Copy,
    {
        if destination.length < self.length {
            return Err(Error::DestinationTooShort {
                required: self.length,
                available: destination.length,
            });
        }

        match (&self.backing, &destination.backing) {
            (Some(source), Some(target)) if source.identity() == target.identity() => {
                let start = self.index.min(destination.index);
                let end = (self.index + self.length).max(destination.index + self.length);
                let mut view = target.write(start, end - start)?;
                move_within(
                    &mut view,
                    self.index - start,
                    destination.index - start,
                    self.length,
                )
            }
            _ => {
                let source = self.read_only_span()?;
                let mut target = destination.span()?;
                source.span().copy_to(&mut target.span())
            }
        }
    }

    /// Non-failing [`copy_to`](Self::copy_to)
    pub fn try_copy_to(&self, destination: &Memory<T>) -> bool
    where
        T: Copy,
    {
        self.copy_to(destination).is_ok()
    }

    fn identity(&self) -> usize {
        self.backing.as_ref().map_or(0, Backing::identity)
    }
}

impl<T> Clone for Memory<T> {
    fn clone(&self) -> Self {
        Memory {
            backing: self.backing.clone(),
            index: self.index,
            length: self.length,
        }
    }
}

impl<T> Default for Memory<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> PartialEq for Memory<T> {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
            && self.index == other.index
            && self.length == other.length
    }
}

impl<T> Eq for Memory<T> {}

impl<T> Hash for Memory<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
        self.index.hash(state);
        self.length.hash(state);
    }
}

impl<T> fmt::Debug for Memory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Memory<{}>[{}]", std::any::type_name::<T>(), self.length)
    }
}

impl<T> From<ManagedArray<T>> for Memory<T> {
    fn from(array: ManagedArray<T>) -> Self {
        let length = array.len();
        Memory {
            backing: Some(Backing::Array(array)),
            index: 0,
            length,
        }
    }
}

impl<T> From<ArraySegment<T>> for Memory<T> {
    fn from(segment: ArraySegment<T>) -> Self {
        Memory {
            index: segment.offset(),
            length: segment.count(),
            backing: Some(Backing::Array(segment.array().clone())),
        }
    }
}

/// A read-only storable handle.
///
/// # Examples
///
/// ```rust
/// use dotcorelib::memory::{ManagedString, ReadOnlyMemory};
///
/// let text = ManagedString::new("hello world");
/// let word = ReadOnlyMemory::from(text).slice(6, 5)?;
/// assert_eq!(String::from_utf16_lossy(&word.to_array()?), "world");
/// # Ok::<(), dotcorelib::Error>(())
/// ```
pub struct ReadOnlyMemory<T> {
    inner: Memory<T>,
}

impl<T> ReadOnlyMemory<T> {
    /// A handle over nothing
    #[must_use]
    pub fn empty() -> Self {
        ReadOnlyMemory {
            inner: Memory::empty(),
        }
    }

    /// Number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if the handle covers no elements
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Projects the handle into a shared view.
    ///
    /// # Errors
    ///
    /// Fails like [`Memory::read_only_span`].
    pub fn span(&self) -> Result<SpanRef<'_, T>> {
        self.inner.read_only_span()
    }

    /// Handle over the elements from `start` to the end.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ArgumentOutOfRange`] if `start > len()`.
    pub fn slice_from(&self, start: usize) -> Result<Self> {
        Ok(ReadOnlyMemory {
            inner: self.inner.slice_from(start)?,
        })
    }

    /// Handle over `length` elements starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ArgumentOutOfRange`] if the window exceeds the handle.
    pub fn slice(&self, start: usize, length: usize) -> Result<Self> {
        Ok(ReadOnlyMemory {
            inner: self.inner.slice(start, length)?,
        })
    }

    /// Pins the backing storage.
    ///
    /// # Errors
    ///
    /// Fails like [`Memory::pin`].
    pub fn pin(&self) -> Result<MemoryHandle>
    where
        T: 'static,
    {
        self.inner.pin()
    }

    /// Copies the elements into a new vector.
    ///
    /// # Errors
    ///
    /// Fails like [`Memory::read_only_span`].
    pub fn to_array(&self) -> Result<Vec<T>>
    where
        T: Clone,
    {
        self.inner.to_array()
    }

    /// Copies this handle's elements into `destination`.
    ///
    /// # Errors
    ///
    /// Fails like [`Memory::copy_to`].
    pub fn copy_to(&self, destination: &Memory<T>) -> Result<()>
    where
        T: Copy,
    {
        self.inner.copy_to(destination)
    }
}

impl<T> Clone for ReadOnlyMemory<T> {
    fn clone(&self) -> Self {
        ReadOnlyMemory {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for ReadOnlyMemory<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> PartialEq for ReadOnlyMemory<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<T> Eq for ReadOnlyMemory<T> {}

impl<T> Hash for ReadOnlyMemory<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.hash(state);
    }
}

impl<T> fmt::Debug for ReadOnlyMemory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ReadOnlyMemory<{}>[{}]",
            std::any::type_name::<T>(),
            self.len()
        )
    }
}

impl<T> From<Memory<T>> for ReadOnlyMemory<T> {
    fn from(inner: Memory<T>) -> Self {
        ReadOnlyMemory { inner }
    }
}

impl<T> From<ManagedArray<T>> for ReadOnlyMemory<T> {
    fn from(array: ManagedArray<T>) -> Self {
        Memory::from(array).into()
    }
}

impl From<ManagedString> for ReadOnlyMemory<u16> {
    fn from(string: ManagedString) -> Self {
        let length = string.len();
        ReadOnlyMemory {
            inner: Memory {
                backing: Some(Backing::String(string)),
                index: 0,
                length,
            },
        }
    }
}
