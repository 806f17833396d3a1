//! Run-time checked views over shared buffers.
//!
//! Managed arrays and memory managers are reached through reference-counted
//! handles, so the borrow checker cannot see that two handles lead to the same
//! elements. Their storage is a [`SharedBuffer`], which tracks live views the way a
//! `RefCell` tracks borrows: any number of [`SpanRef`]s, or exactly one [`SpanMut`].
//! A request that conflicts with a live view fails with
//! [`Error::BufferBorrowed`](crate::Error::BufferBorrowed) instead of aliasing.
//!
//! The guards dereference to slices and convert into [`Span`] / [`ReadOnlySpan`]
//! views whose lifetime is bounded by the guard, so a view can never outlive the
//! borrow that produced it.

use std::{
    cell::{Cell, Ref, RefCell, RefMut, UnsafeCell},
    fmt,
    marker::PhantomData,
    ops::{Deref, DerefMut},
    ptr::NonNull,
    slice,
};

use crate::{
    memory::span::{ReadOnlySpan, Span},
    Error, Result,
};

pub(crate) fn validate_window(start: usize, length: usize, available: usize) -> Result<()> {
    if start > available {
        return Err(out_of_range!(
            "start",
            "start {} exceeds length {}",
            start,
            available
        ));
    }
    if length > available - start {
        return Err(out_of_range!(
            "length",
            "length {} exceeds the {} elements after start {}",
            length,
            available - start,
            start
        ));
    }
    Ok(())
}

/// Heap storage shared between handles, with a logical length and a view borrow flag.
///
/// # Examples
///
/// ```rust
/// use dotcorelib::memory::SharedBuffer;
///
/// let buffer = SharedBuffer::from_vec(vec![1, 2, 3]);
/// {
///     let mut view = buffer.span()?;
///     view[0] = 10;
///     assert!(buffer.read_only_span().is_err());
/// }
/// let first = buffer.read_only_span()?;
/// let second = buffer.read_only_span()?;
/// assert_eq!(&*first, &*second);
/// assert!(buffer.span().is_err());
/// # Ok::<(), dotcorelib::Error>(())
/// ```
pub struct SharedBuffer<T> {
    cells: Box<[UnsafeCell<T>]>,
    len: Cell<usize>,
    views: RefCell<()>,
}

impl<T> SharedBuffer<T> {
    /// Takes ownership of `values`; the logical length starts at their count
    #[must_use]
    pub fn from_vec(values: Vec<T>) -> Self {
        let len = values.len();
        SharedBuffer {
            cells: values.into_iter().map(UnsafeCell::new).collect(),
            len: Cell::new(len),
            views: RefCell::new(()),
        }
    }

    /// Allocated element count
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Current logical length
    #[must_use]
    pub fn len(&self) -> usize {
        self.len.get()
    }

    /// Returns true if the logical length is zero
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Changes the logical length.
    ///
    /// Live views keep the length they were created with; the storage itself is
    /// never reallocated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArgumentOutOfRange`] if `len` exceeds the capacity.
    pub fn set_len(&self, len: usize) -> Result<()> {
        if len > self.capacity() {
            return Err(out_of_range!(
                "len",
                "length {} exceeds capacity {}",
                len,
                self.capacity()
            ));
        }
        self.len.set(len);
        Ok(())
    }

    /// Returns true if any view of the buffer is alive
    #[must_use]
    pub fn is_borrowed(&self) -> bool {
        self.views.try_borrow_mut().is_err()
    }

    /// Exclusive view over the logical length.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BufferBorrowed`] if any other view is alive.
    pub fn span(&self) -> Result<SpanMut<'_, T>> {
        self.write_window(0, self.len())
    }

    /// Shared view over the logical length.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BufferBorrowed`] if a mutable view is alive.
    pub fn read_only_span(&self) -> Result<SpanRef<'_, T>> {
        self.read_window(0, self.len())
    }

    pub(crate) fn read_window(&self, start: usize, length: usize) -> Result<SpanRef<'_, T>> {
        validate_window(start, length, self.len())?;
        let borrow = self
            .views
            .try_borrow()
            .map_err(|_| Error::BufferBorrowed { mutably: true })?;
        Ok(SpanRef {
            ptr: self.cell_ptr(start),
            len: length,
            _borrow: Some(borrow),
            _marker: PhantomData,
        })
    }

    pub(crate) fn write_window(&self, start: usize, length: usize) -> Result<SpanMut<'_, T>> {
        validate_window(start, length, self.len())?;
        let borrow = self.views.try_borrow_mut().map_err(|_| Error::BufferBorrowed {
            mutably: self.views.try_borrow().is_err(),
        })?;
        Ok(SpanMut {
            ptr: self.cell_ptr(start),
            len: length,
            _borrow: Some(borrow),
            _marker: PhantomData,
        })
    }

    /// Address of the first element, for pinning.
    ///
    /// Writing through the pointer is only sound while no view of the written
    /// elements is alive.
    #[must_use]
    pub fn as_mut_ptr(&self) -> *mut T {
        UnsafeCell::raw_get(self.cells.as_ptr())
    }

    fn cell_ptr(&self, start: usize) -> NonNull<T> {
        // start <= len <= capacity, so this is at most one past the end
        NonNull::from(&self.cells[start..]).cast::<T>()
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.read_only_span() {
            Ok(view) => f.debug_list().entries(view.iter()).finish(),
            Err(_) => f.write_str("[<borrowed>]"),
        }
    }
}

/// A shared view of a [`SharedBuffer`] window, released on drop.
pub struct SpanRef<'a, T> {
    ptr: NonNull<T>,
    len: usize,
    _borrow: Option<Ref<'a, ()>>,
    _marker: PhantomData<&'a [T]>,
}

impl<'a, T> SpanRef<'a, T> {
    /// A view over nothing
    #[must_use]
    pub fn empty() -> Self {
        SpanRef {
            ptr: NonNull::dangling(),
            len: 0,
            _borrow: None,
            _marker: PhantomData,
        }
    }

    /// View over immutable storage that needs no borrow tracking.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads of `len` elements for `'a`, and nothing may
    /// write to them during `'a`.
    pub(crate) unsafe fn from_immutable(ptr: *const T, len: usize) -> Self {
        SpanRef {
            ptr: NonNull::new(ptr.cast_mut()).unwrap_or(NonNull::dangling()),
            len,
            _borrow: None,
            _marker: PhantomData,
        }
    }

    /// The view as a [`ReadOnlySpan`] bounded by this guard
    #[must_use]
    pub fn span(&self) -> ReadOnlySpan<'_, T> {
        ReadOnlySpan::new(self)
    }
}

impl<T> Deref for SpanRef<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        // SAFETY: the window was validated and no mutable view exists while the borrow lives
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl<'a, T> From<&'a SpanRef<'_, T>> for ReadOnlySpan<'a, T> {
    fn from(view: &'a SpanRef<'_, T>) -> Self {
        view.span()
    }
}

impl<T: fmt::Debug> fmt::Debug for SpanRef<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// An exclusive view of a [`SharedBuffer`] window, released on drop.
pub struct SpanMut<'a, T> {
    ptr: NonNull<T>,
    len: usize,
    _borrow: Option<RefMut<'a, ()>>,
    _marker: PhantomData<&'a mut [T]>,
}

impl<'a, T> SpanMut<'a, T> {
    /// A view over nothing
    #[must_use]
    pub fn empty() -> Self {
        SpanMut {
            ptr: NonNull::dangling(),
            len: 0,
            _borrow: None,
            _marker: PhantomData,
        }
    }

    /// The view as a [`Span`] bounded by this guard
    #[must_use]
    pub fn span(&mut self) -> Span<'_, T> {
        Span::new(self)
    }

    /// The view as a [`ReadOnlySpan`] bounded by this guard
    #[must_use]
    pub fn read_only(&self) -> ReadOnlySpan<'_, T> {
        ReadOnlySpan::new(self)
    }
}

impl<T> Deref for SpanMut<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        // SAFETY: the window was validated and this guard holds the only borrow
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl<T> DerefMut for SpanMut<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        // SAFETY: as for deref, and &mut self makes the slice unique
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<'a, T> From<&'a mut SpanMut<'_, T>> for Span<'a, T> {
    fn from(view: &'a mut SpanMut<'_, T>) -> Self {
        view.span()
    }
}

impl<T: fmt::Debug> fmt::Debug for SpanMut<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
