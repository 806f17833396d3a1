//! Views and handles over contiguous memory.
//!
//! # Key Components
//!
//! - [`Span`] / [`ReadOnlySpan`] - Non-owning, bounds-checked views
//! - [`Memory`] / [`ReadOnlyMemory`] - Storable handles projected into views on demand
//! - [`ManagedArray`], [`ManagedString`], [`ArraySegment`] - Reference-semantics backing objects
//! - [`SharedBuffer`], [`SpanRef`], [`SpanMut`] - Run-time checked views of shared storage
//! - [`MemoryManager`] / [`NativeMemoryManager`] - Custom backing buffers
//! - [`MemoryHandle`] - Scoped pin released on drop
//! - [`memmove`] / [`move_within`] - The overlap-safe bulk move behind every copy
//!
//! # Example
//!
//! ```rust
//! use dotcorelib::memory::{ManagedArray, Memory};
//!
//! let array = ManagedArray::from_vec(vec![1, 2, 3, 4, 5, 6]);
//! let memory = Memory::from(array.clone());
//!
//! let source = memory.slice(0, 4)?;
//! let target = memory.slice(2, 4)?;
//! source.copy_to(&target)?;
//! assert_eq!(array.to_vec()?, vec![1, 2, 1, 2, 3, 4]);
//! # Ok::<(), dotcorelib::Error>(())
//! ```

mod array;
mod borrow;
mod buffer;
mod manager;
mod owned;
mod pin;
mod span;

pub use array::{ArraySegment, ManagedArray, ManagedString};
pub use borrow::{SharedBuffer, SpanMut, SpanRef};
pub use buffer::{bulk_move, memmove, move_within, BULK_COPY_THRESHOLD};
pub use manager::{MemoryManager, NativeMemoryManager};
pub use owned::{Memory, ReadOnlyMemory};
pub use pin::{MemoryHandle, Pinnable};
pub use span::{ReadOnlySpan, Span};
