//! Bounds-checked views over contiguous memory.
//!
//! [`Span`] and [`ReadOnlySpan`] are non-owning windows over elements that live
//! somewhere else: a Rust slice, a [`ManagedArray`](crate::memory::ManagedArray),
//! a [`ManagedString`](crate::memory::ManagedString), or native memory. They are
//! tied to the lifetime of the storage they were created from and never outlive it.
//!
//! # Contract Violations
//!
//! Indexing or slicing outside the view is a programming error and panics, exactly
//! like slice indexing. [`Span::get`] and [`Span::try_slice`] are the non-panicking
//! lookups. Construction from a range and [`Span::copy_to`] report failures as
//! [`Result`] errors instead.
//!
//! # Equality
//!
//! `==` on views compares the origin pointer and the length, not the elements. Use
//! [`Span::sequence_equal`] to compare contents. Views are not hashable, and the
//! object-style [`Span::equals`] / [`Span::get_hash_code`] always fail.
//!
//! # Overlap
//!
//! Safe code cannot hold a mutable view that overlaps another view: views of
//! shared storage are checked by [`SharedBuffer`](crate::memory::SharedBuffer).
//! Views built with `from_raw_parts` may still alias, and [`Span::copy_to`] is
//! correct for any overlap between them.
//!
//! # Thread Safety
//!
//! Views are neither `Send` nor `Sync`. They are meant to live on the stack of the
//! thread that created them.

use std::{
    fmt,
    marker::PhantomData,
    ops::{Index, IndexMut},
    ptr::NonNull,
    slice,
};

use crate::{memory::buffer::bulk_move, Error, Result};

#[cold]
#[inline(never)]
#[track_caller]
fn throw_index_out_of_range(index: usize, len: usize) -> ! {
    panic!(
        "index {} is out of range for a view of length {}",
        index, len
    )
}

#[cold]
#[inline(never)]
#[track_caller]
fn throw_slice_out_of_range(start: usize, length: usize, len: usize) -> ! {
    panic!(
        "range {}+{} is out of range for a view of length {}",
        start, length, len
    )
}

#[inline]
fn range_fits(start: usize, length: usize, len: usize) -> bool {
    start <= len && length <= len - start
}

fn check_range(start: usize, length: usize, len: usize) -> Result<()> {
    if start > len {
        return Err(out_of_range!(
            "start",
            "start {} exceeds length {}",
            start,
            len
        ));
    }
    if length > len - start {
        return Err(out_of_range!(
            "length",
            "length {} exceeds the {} elements after start {}",
            length,
            len - start,
            start
        ));
    }
    Ok(())
}

fn byte_ranges_overlap<T>(a: *const T, a_len: usize, b: *const T, b_len: usize) -> bool {
    if a_len == 0 || b_len == 0 {
        return false;
    }
    let size = std::mem::size_of::<T>().max(1);
    let a_start = a as usize;
    let b_start = b as usize;
    a_start < b_start + b_len * size && b_start < a_start + a_len * size
}

/// A mutable view over contiguous elements.
///
/// # Examples
///
/// ```rust
/// use dotcorelib::memory::Span;
///
/// let mut values = [10, 20, 30, 40, 50];
/// let mut span = Span::new(&mut values);
/// {
///     let mut middle = span.slice(1, 3);
///     middle.fill(0);
/// }
/// assert_eq!(span.to_array(), vec![10, 0, 0, 0, 50]);
/// assert!(span.try_slice(1, 5).is_err());
/// ```
pub struct Span<'a, T> {
    ptr: NonNull<T>,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

impl<'a, T> Span<'a, T> {
    /// Creates a view over the whole slice
    #[must_use]
    pub fn new(values: &'a mut [T]) -> Self {
        let len = values.len();
        // SAFETY: a slice pointer is non-null and valid for `len` elements for 'a
        unsafe { Self::from_raw_parts(values.as_mut_ptr(), len) }
    }

    /// Creates a view over `length` elements of `values` starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArgumentOutOfRange`] if the range exceeds the slice.
    pub fn from_array_range(values: &'a mut [T], start: usize, length: usize) -> Result<Self> {
        check_range(start, length, values.len())?;
        // SAFETY: the range was validated against the slice
        Ok(unsafe { Self::from_raw_parts(values.as_mut_ptr().add(start), length) })
    }

    /// Creates a view over raw memory.
    ///
    /// A null pointer is accepted only together with a zero length.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `len` elements of `T` for `'a`,
    /// and properly aligned.
    #[must_use]
    pub unsafe fn from_raw_parts(ptr: *mut T, len: usize) -> Self {
        Span {
            ptr: NonNull::new(ptr).unwrap_or(NonNull::dangling()),
            len,
            _marker: PhantomData,
        }
    }

    /// An empty view
    #[must_use]
    pub fn empty() -> Self {
        Span {
            ptr: NonNull::dangling(),
            len: 0,
            _marker: PhantomData,
        }
    }

    /// Number of elements in the view
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the view has no elements
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Pointer to the first element
    #[must_use]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    /// Mutable pointer to the first element
    #[must_use]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// The elements as a slice
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: ptr is valid for len elements for 'a, which outlives &self
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// The elements as a mutable slice
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: as above, and &mut self gives exclusive access through this view
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Element at `index`, or `None` if out of range
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    /// Mutable element at `index`, or `None` if out of range
    #[must_use]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.as_mut_slice().get_mut(index)
    }

    /// View of the elements from `start` to the end.
    ///
    /// # Panics
    ///
    /// Panics if `start > len()`.
    #[track_caller]
    pub fn slice_from(&mut self, start: usize) -> Span<'_, T> {
        if start > self.len {
            throw_slice_out_of_range(start, 0, self.len);
        }
        let length = self.len - start;
        // SAFETY: start is within the view
        unsafe { Span::from_raw_parts(self.ptr.as_ptr().add(start), length) }
    }

    /// View of `length` elements starting at `start`.
    ///
    /// # Panics
    ///
    /// Panics if `start + length > len()`.
    #[track_caller]
    pub fn slice(&mut self, start: usize, length: usize) -> Span<'_, T> {
        if !range_fits(start, length, self.len) {
            throw_slice_out_of_range(start, length, self.len);
        }
        // SAFETY: the range fits inside the view
        unsafe { Span::from_raw_parts(self.ptr.as_ptr().add(start), length) }
    }

    /// Non-panicking [`slice`](Self::slice).
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArgumentOutOfRange`] if the range exceeds the view.
    pub fn try_slice(&mut self, start: usize, length: usize) -> Result<Span<'_, T>> {
        check_range(start, length, self.len)?;
        // SAFETY: the range was validated
        Ok(unsafe { Span::from_raw_parts(self.ptr.as_ptr().add(start), length) })
    }

    /// Read-only view of the same elements
    #[must_use]
    pub fn as_read_only(&self) -> ReadOnlySpan<'_, T> {
        // SAFETY: the shared borrow of self keeps the elements valid and unmodified
        unsafe { ReadOnlySpan::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Assigns `value` to every element
    pub fn fill(&mut self, value: T)
    where
        T: Clone,
    {
        self.as_mut_slice().fill(value);
    }

    /// Resets every element to its default value
    pub fn clear(&mut self)
    where
        T: Default,
    {
        self.as_mut_slice().fill_with(T::default);
    }

    /// Reverses the elements in place
    pub fn reverse(&mut self) {
        self.as_mut_slice().reverse();
    }

    /// Copies the elements into a new vector
    #[must_use]
    pub fn to_array(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.as_slice().to_vec()
    }

    /// Copies this view into `destination`.
    ///
    /// The views may overlap; the result is as if the source had been copied to a
    /// temporary buffer first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DestinationTooShort`] if `destination` is shorter than this view.
    pub fn copy_to(&self, destination: &mut Span<'_, T>) -> Result<()>
    where
        T: Copy,
    {
        self.as_read_only().copy_to(destination)
    }

    /// Non-failing [`copy_to`](Self::copy_to); returns false if the destination is too short
    pub fn try_copy_to(&self, destination: &mut Span<'_, T>) -> bool
    where
        T: Copy,
    {
        self.copy_to(destination).is_ok()
    }

    /// Returns true if the two views share any memory
    #[must_use]
    pub fn overlaps(&self, other: ReadOnlySpan<'_, T>) -> bool {
        self.as_read_only().overlaps(other)
    }

    /// Element-wise comparison
    #[must_use]
    pub fn sequence_equal(&self, other: ReadOnlySpan<'_, T>) -> bool
    where
        T: PartialEq,
    {
        self.as_slice() == other.as_slice()
    }

    /// Iterator over the elements
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    /// Mutable iterator over the elements
    pub fn iter_mut(&mut self) -> slice::IterMut<'_, T> {
        self.as_mut_slice().iter_mut()
    }

    /// Object-style equality is not supported on views.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::NotSupported`]. Use `==` for identity or
    /// [`sequence_equal`](Self::sequence_equal) for contents.
    #[deprecated(note = "views cannot be compared as objects; use == or sequence_equal")]
    pub fn equals(&self, _other: &Span<'_, T>) -> Result<bool> {
        Err(Error::NotSupported("Span::equals"))
    }

    /// Object-style hashing is not supported on views.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::NotSupported`].
    #[deprecated(note = "views cannot be hashed")]
    pub fn get_hash_code(&self) -> Result<i32> {
        Err(Error::NotSupported("Span::get_hash_code"))
    }
}

impl<T> Index<usize> for Span<'_, T> {
    type Output = T;

    #[track_caller]
    fn index(&self, index: usize) -> &T {
        if index >= self.len {
            throw_index_out_of_range(index, self.len);
        }
        // SAFETY: index < len
        unsafe { &*self.ptr.as_ptr().add(index) }
    }
}

impl<T> IndexMut<usize> for Span<'_, T> {
    #[track_caller]
    fn index_mut(&mut self, index: usize) -> &mut T {
        if index >= self.len {
            throw_index_out_of_range(index, self.len);
        }
        // SAFETY: index < len, exclusive through &mut self
        unsafe { &mut *self.ptr.as_ptr().add(index) }
    }
}

impl<T> PartialEq for Span<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr && self.len == other.len
    }
}

impl<T> Eq for Span<'_, T> {}

impl<T: fmt::Debug> fmt::Debug for Span<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<T> fmt::Display for Span<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span<{}>[{}]", std::any::type_name::<T>(), self.len)
    }
}

impl<'s, T> IntoIterator for &'s Span<'_, T> {
    type Item = &'s T;
    type IntoIter = slice::Iter<'s, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T> From<&'a mut [T]> for Span<'a, T> {
    fn from(values: &'a mut [T]) -> Self {
        Span::new(values)
    }
}

impl<'a, T, const N: usize> From<&'a mut [T; N]> for Span<'a, T> {
    fn from(values: &'a mut [T; N]) -> Self {
        Span::new(values.as_mut_slice())
    }
}

impl<'a, T> From<&'a mut Vec<T>> for Span<'a, T> {
    fn from(values: &'a mut Vec<T>) -> Self {
        Span::new(values.as_mut_slice())
    }
}

/// A read-only view over contiguous elements.
///
/// Unlike [`Span`], a `ReadOnlySpan` is `Copy` and its sub-views keep the full
/// lifetime of the underlying storage.
///
/// # Examples
///
/// ```rust
/// use dotcorelib::memory::ReadOnlySpan;
///
/// let values = [1, 2, 3, 4];
/// let span = ReadOnlySpan::new(&values);
/// let tail = span.slice_from(2);
/// assert_eq!(tail.as_slice(), &[3, 4]);
/// assert!(span.overlaps(tail));
/// ```
pub struct ReadOnlySpan<'a, T> {
    ptr: NonNull<T>,
    len: usize,
    _marker: PhantomData<&'a [T]>,
}

impl<T> Clone for ReadOnlySpan<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ReadOnlySpan<'_, T> {}

impl<'a, T> ReadOnlySpan<'a, T> {
    /// Creates a view over the whole slice
    #[must_use]
    pub fn new(values: &'a [T]) -> Self {
        // SAFETY: a slice pointer is non-null and valid for its length for 'a
        unsafe { Self::from_raw_parts(values.as_ptr(), values.len()) }
    }

    /// Creates a view over `length` elements of `values` starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArgumentOutOfRange`] if the range exceeds the slice.
    pub fn from_array_range(values: &'a [T], start: usize, length: usize) -> Result<Self> {
        check_range(start, length, values.len())?;
        // SAFETY: the range was validated against the slice
        Ok(unsafe { Self::from_raw_parts(values.as_ptr().add(start), length) })
    }

    /// Creates a view over raw memory.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads of `len` elements of `T` for `'a`, properly
    /// aligned, and not mutated through other pointers while the view is used.
    #[must_use]
    pub unsafe fn from_raw_parts(ptr: *const T, len: usize) -> Self {
        ReadOnlySpan {
            ptr: NonNull::new(ptr.cast_mut()).unwrap_or(NonNull::dangling()),
            len,
            _marker: PhantomData,
        }
    }

    /// An empty view
    #[must_use]
    pub fn empty() -> Self {
        ReadOnlySpan {
            ptr: NonNull::dangling(),
            len: 0,
            _marker: PhantomData,
        }
    }

    /// Number of elements in the view
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the view has no elements
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Pointer to the first element
    #[must_use]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    /// The elements as a slice with the view's full lifetime
    #[must_use]
    pub fn as_slice(&self) -> &'a [T] {
        // SAFETY: ptr is valid for len elements for 'a
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Element at `index`, or `None` if out of range
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&'a T> {
        self.as_slice().get(index)
    }

    /// View of the elements from `start` to the end.
    ///
    /// # Panics
    ///
    /// Panics if `start > len()`.
    #[track_caller]
    #[must_use]
    pub fn slice_from(&self, start: usize) -> ReadOnlySpan<'a, T> {
        if start > self.len {
            throw_slice_out_of_range(start, 0, self.len);
        }
        // SAFETY: start is within the view
        unsafe { ReadOnlySpan::from_raw_parts(self.ptr.as_ptr().add(start), self.len - start) }
    }

    /// View of `length` elements starting at `start`.
    ///
    /// # Panics
    ///
    /// Panics if `start + length > len()`.
    #[track_caller]
    #[must_use]
    pub fn slice(&self, start: usize, length: usize) -> ReadOnlySpan<'a, T> {
        if !range_fits(start, length, self.len) {
            throw_slice_out_of_range(start, length, self.len);
        }
        // SAFETY: the range fits inside the view
        unsafe { ReadOnlySpan::from_raw_parts(self.ptr.as_ptr().add(start), length) }
    }

    /// Non-panicking [`slice`](Self::slice).
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArgumentOutOfRange`] if the range exceeds the view.
    pub fn try_slice(&self, start: usize, length: usize) -> Result<ReadOnlySpan<'a, T>> {
        check_range(start, length, self.len)?;
        // SAFETY: the range was validated
        Ok(unsafe { ReadOnlySpan::from_raw_parts(self.ptr.as_ptr().add(start), length) })
    }

    /// Copies the elements into a new vector
    #[must_use]
    pub fn to_array(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.as_slice().to_vec()
    }

    /// Copies this view into `destination`, correct for any overlap.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DestinationTooShort`] if `destination` is shorter than this view.
    pub fn copy_to(&self, destination: &mut Span<'_, T>) -> Result<()>
    where
        T: Copy,
    {
        if destination.len() < self.len {
            return Err(Error::DestinationTooShort {
                required: self.len,
                available: destination.len(),
            });
        }
        // SAFETY: both views are valid for len elements; bulk_move handles overlap
        unsafe { bulk_move(destination.as_mut_ptr(), self.ptr.as_ptr(), self.len) };
        Ok(())
    }

    /// Non-failing [`copy_to`](Self::copy_to)
    pub fn try_copy_to(&self, destination: &mut Span<'_, T>) -> bool
    where
        T: Copy,
    {
        self.copy_to(destination).is_ok()
    }

    /// Returns true if the two views share any memory
    #[must_use]
    pub fn overlaps(&self, other: ReadOnlySpan<'_, T>) -> bool {
        byte_ranges_overlap(self.as_ptr(), self.len, other.as_ptr(), other.len)
    }

    /// Element-wise comparison
    #[must_use]
    pub fn sequence_equal(&self, other: ReadOnlySpan<'_, T>) -> bool
    where
        T: PartialEq,
    {
        self.as_slice() == other.as_slice()
    }

    /// Iterator over the elements
    pub fn iter(&self) -> slice::Iter<'a, T> {
        self.as_slice().iter()
    }

    /// Object-style equality is not supported on views.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::NotSupported`].
    #[deprecated(note = "views cannot be compared as objects; use == or sequence_equal")]
    pub fn equals(&self, _other: &ReadOnlySpan<'_, T>) -> Result<bool> {
        Err(Error::NotSupported("ReadOnlySpan::equals"))
    }

    /// Object-style hashing is not supported on views.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::NotSupported`].
    #[deprecated(note = "views cannot be hashed")]
    pub fn get_hash_code(&self) -> Result<i32> {
        Err(Error::NotSupported("ReadOnlySpan::get_hash_code"))
    }
}

impl<T> Index<usize> for ReadOnlySpan<'_, T> {
    type Output = T;

    #[track_caller]
    fn index(&self, index: usize) -> &T {
        if index >= self.len {
            throw_index_out_of_range(index, self.len);
        }
        // SAFETY: index < len
        unsafe { &*self.ptr.as_ptr().add(index) }
    }
}

impl<T> PartialEq for ReadOnlySpan<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr && self.len == other.len
    }
}

impl<T> Eq for ReadOnlySpan<'_, T> {}

impl<T: fmt::Debug> fmt::Debug for ReadOnlySpan<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<T> fmt::Display for ReadOnlySpan<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReadOnlySpan<{}>[{}]", std::any::type_name::<T>(), self.len)
    }
}

impl<'a, T> IntoIterator for ReadOnlySpan<'a, T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

impl<'a, T> From<Span<'a, T>> for ReadOnlySpan<'a, T> {
    fn from(span: Span<'a, T>) -> Self {
        // SAFETY: the span is consumed, so nothing writes through it for 'a
        unsafe { ReadOnlySpan::from_raw_parts(span.ptr.as_ptr(), span.len) }
    }
}

impl<'a, T> From<&'a [T]> for ReadOnlySpan<'a, T> {
    fn from(values: &'a [T]) -> Self {
        ReadOnlySpan::new(values)
    }
}

impl<'a, T, const N: usize> From<&'a [T; N]> for ReadOnlySpan<'a, T> {
    fn from(values: &'a [T; N]) -> Self {
        ReadOnlySpan::new(values.as_slice())
    }
}
