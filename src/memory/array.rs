//! Managed arrays and strings.
//!
//! [`ManagedArray`] and [`ManagedString`] are the reference-typed backing objects
//! that [`Memory`](crate::memory::Memory) handles point at. Cloning either one
//! clones the reference, not the elements: all clones are the same object, share
//! the same storage and the same pin count.
//!
//! Views of a managed array are borrowed from its [`SharedBuffer`], so every clone
//! of the array sees the same live views: a mutable view from one handle blocks
//! every other view from all of them. The array is neither `Send` nor `Sync`.
//! Strings are immutable and can be shared across threads.

use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use widestring::U16String;

use crate::{
    memory::{
        borrow::{SharedBuffer, SpanMut, SpanRef},
        span::ReadOnlySpan,
    },
    Error, Result,
};

struct ArrayObject<T> {
    elements: SharedBuffer<T>,
    pins: AtomicUsize,
}

/// A fixed-length, reference-semantics array.
///
/// # Examples
///
/// ```rust
/// use dotcorelib::memory::ManagedArray;
///
/// let array = ManagedArray::from_vec(vec![1, 2, 3]);
/// let alias = array.clone();
/// array.span()?[0] = 10;
/// assert_eq!(alias.to_vec()?, vec![10, 2, 3]);
/// assert!(ManagedArray::ptr_eq(&array, &alias));
///
/// let view = array.span()?;
/// assert!(alias.span().is_err());
/// drop(view);
/// # Ok::<(), dotcorelib::Error>(())
/// ```
pub struct ManagedArray<T> {
    inner: Arc<ArrayObject<T>>,
}

impl<T> ManagedArray<T> {
    /// Creates an array holding `values`
    #[must_use]
    pub fn from_vec(values: Vec<T>) -> Self {
        ManagedArray {
            inner: Arc::new(ArrayObject {
                elements: SharedBuffer::from_vec(values),
                pins: AtomicUsize::new(0),
            }),
        }
    }

    /// Creates an array of `len` default elements
    #[must_use]
    pub fn with_len(len: usize) -> Self
    where
        T: Default,
    {
        Self::from_vec(std::iter::repeat_with(T::default).take(len).collect())
    }

    /// Number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.elements.len()
    }

    /// Returns true if the array has no elements
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.elements.is_empty()
    }

    /// Exclusive view over every element.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::BufferBorrowed`] if any view of the array, taken
    /// through this handle or a clone of it, is still alive.
    pub fn span(&self) -> Result<SpanMut<'_, T>> {
        self.inner.elements.span()
    }

    /// Shared view over every element.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::BufferBorrowed`] if a mutable view of the array is alive.
    pub fn read_only_span(&self) -> Result<SpanRef<'_, T>> {
        self.inner.elements.read_only_span()
    }

    /// Copies the elements into a new vector.
    ///
    /// # Errors
    ///
    /// Fails like [`read_only_span`](Self::read_only_span).
    pub fn to_vec(&self) -> Result<Vec<T>>
    where
        T: Clone,
    {
        Ok(self.read_only_span()?.to_vec())
    }

    /// Returns true if both handles refer to the same array object
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.inner, &other.inner)
    }

    /// Number of outstanding pins
    #[must_use]
    pub fn pin_count(&self) -> usize {
        self.inner.pins.load(Ordering::Acquire)
    }

    pub(crate) fn buffer(&self) -> &SharedBuffer<T> {
        &self.inner.elements
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const u8 as usize
    }

    pub(crate) fn pin(&self) {
        self.inner.pins.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn unpin(&self) {
        self.inner.pins.fetch_sub(1, Ordering::AcqRel);
    }
}

impl<T> Clone for ManagedArray<T> {
    fn clone(&self) -> Self {
        ManagedArray {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ManagedArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner.elements, f)
    }
}

impl<T> From<Vec<T>> for ManagedArray<T> {
    fn from(values: Vec<T>) -> Self {
        ManagedArray::from_vec(values)
    }
}

/// A validated window of a [`ManagedArray`].
#[derive(Clone, Debug)]
pub struct ArraySegment<T> {
    array: ManagedArray<T>,
    offset: usize,
    count: usize,
}

impl<T> ArraySegment<T> {
    /// Creates a segment of `count` elements starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ArgumentOutOfRange`] if the window exceeds the array.
    pub fn new(array: ManagedArray<T>, offset: usize, count: usize) -> Result<Self> {
        let len = array.len();
        if offset > len {
            return Err(out_of_range!(
                "offset",
                "offset {} exceeds array length {}",
                offset,
                len
            ));
        }
        if count > len - offset {
            return Err(out_of_range!(
                "count",
                "count {} exceeds the {} elements after offset {}",
                count,
                len - offset,
                offset
            ));
        }
        Ok(ArraySegment {
            array,
            offset,
            count,
        })
    }

    /// The underlying array
    #[must_use]
    pub fn array(&self) -> &ManagedArray<T> {
        &self.array
    }

    /// Index of the first element in the array
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of elements in the segment
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Exclusive view over the segment.
    ///
    /// # Errors
    ///
    /// Fails like [`ManagedArray::span`].
    pub fn span(&self) -> Result<SpanMut<'_, T>> {
        self.array.buffer().write_window(self.offset, self.count)
    }

    /// Shared view over the segment.
    ///
    /// # Errors
    ///
    /// Fails like [`ManagedArray::read_only_span`].
    pub fn read_only_span(&self) -> Result<SpanRef<'_, T>> {
        self.array.buffer().read_window(self.offset, self.count)
    }
}

impl<'a, T> TryFrom<&'a ManagedArray<T>> for SpanMut<'a, T> {
    type Error = Error;

    fn try_from(array: &'a ManagedArray<T>) -> Result<Self> {
        array.span()
    }
}

impl<'a, T> TryFrom<&'a ManagedArray<T>> for SpanRef<'a, T> {
    type Error = Error;

    fn try_from(array: &'a ManagedArray<T>) -> Result<Self> {
        array.read_only_span()
    }
}

impl<'a, T> TryFrom<&'a ArraySegment<T>> for SpanMut<'a, T> {
    type Error = Error;

    fn try_from(segment: &'a ArraySegment<T>) -> Result<Self> {
        segment.span()
    }
}

impl<'a, T> TryFrom<&'a ArraySegment<T>> for SpanRef<'a, T> {
    type Error = Error;

    fn try_from(segment: &'a ArraySegment<T>) -> Result<Self> {
        segment.read_only_span()
    }
}

impl<T> From<ManagedArray<T>> for ArraySegment<T> {
    fn from(array: ManagedArray<T>) -> Self {
        let count = array.len();
        ArraySegment {
            array,
            offset: 0,
            count,
        }
    }
}

struct StringObject {
    chars: U16String,
    pins: AtomicUsize,
}

/// An immutable UTF-16 string with reference identity.
///
/// `==` compares contents; [`ManagedString::ptr_eq`] compares identity.
///
/// # Examples
///
/// ```rust
/// use dotcorelib::memory::{ManagedString, ReadOnlySpan};
///
/// let text = ManagedString::new("hello");
/// let span = ReadOnlySpan::from(&text);
/// assert_eq!(span.len(), 5);
/// assert_eq!(span[0], u16::from(b'h'));
/// assert_eq!(text, ManagedString::new("hello"));
/// assert!(!ManagedString::ptr_eq(&text, &ManagedString::new("hello")));
/// ```
#[derive(Clone)]
pub struct ManagedString {
    inner: Arc<StringObject>,
}

impl ManagedString {
    /// Creates a string from UTF-8 text
    #[must_use]
    pub fn new(value: &str) -> Self {
        Self::from_u16_string(U16String::from_str(value))
    }

    /// Creates a string from UTF-16 code units
    #[must_use]
    pub fn from_utf16(units: Vec<u16>) -> Self {
        Self::from_u16_string(U16String::from_vec(units))
    }

    fn from_u16_string(chars: U16String) -> Self {
        ManagedString {
            inner: Arc::new(StringObject {
                chars,
                pins: AtomicUsize::new(0),
            }),
        }
    }

    /// Number of UTF-16 code units
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.chars.len()
    }

    /// Returns true for the empty string
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.chars.is_empty()
    }

    /// The code units
    #[must_use]
    pub fn as_slice(&self) -> &[u16] {
        self.inner.chars.as_slice()
    }

    /// Pointer to the first code unit
    #[must_use]
    pub fn as_ptr(&self) -> *const u16 {
        self.inner.chars.as_ptr()
    }

    /// Read-only view over the code units
    #[must_use]
    pub fn as_span(&self) -> ReadOnlySpan<'_, u16> {
        ReadOnlySpan::new(self.as_slice())
    }

    /// Lossy conversion to a Rust string
    #[must_use]
    pub fn to_string_lossy(&self) -> String {
        self.inner.chars.to_string_lossy()
    }

    /// Returns true if both handles refer to the same string object
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.inner, &other.inner)
    }

    /// Number of outstanding pins
    #[must_use]
    pub fn pin_count(&self) -> usize {
        self.inner.pins.load(Ordering::Acquire)
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const u8 as usize
    }

    pub(crate) fn pin(&self) {
        self.inner.pins.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn unpin(&self) {
        self.inner.pins.fetch_sub(1, Ordering::AcqRel);
    }
}

impl PartialEq for ManagedString {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for ManagedString {}

impl Hash for ManagedString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state);
    }
}

impl fmt::Debug for ManagedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ManagedString({:?})", self.to_string_lossy())
    }
}

impl fmt::Display for ManagedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_lossy())
    }
}

impl From<&str> for ManagedString {
    fn from(value: &str) -> Self {
        ManagedString::new(value)
    }
}

impl<'a> From<&'a ManagedString> for ReadOnlySpan<'a, u16> {
    fn from(value: &'a ManagedString) -> Self {
        value.as_span()
    }
}
