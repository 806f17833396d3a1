// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![warn(missing_docs)]
#![allow(clippy::too_many_arguments)]
// - 'memory/buffer.rs' moves raw bytes with unaligned block reads and writes
// - 'memory/span.rs' builds views from raw pointers
// - 'memory/array.rs' and 'memory/manager.rs' hand out interior-mutable element storage

//! # dotcorelib
//!
//! Core class library primitives for a managed runtime, written in pure Rust.
//! `dotcorelib` provides the substrate a virtual machine needs before it can run user
//! code: callable bindings and their multicast invocation lists, bounds-checked views
//! and owning handles over contiguous memory, and the runtime's random number engines.
//!
//! ## Features
//!
//! - **Delegates** - Closed, static, open-instance, virtual and unmanaged bindings with
//!   the runtime's equality and hashing rules
//! - **Multicast invocation lists** - Combine/Remove algebra over ordered bindings with
//!   geometric slot storage reused across combinations
//! - **Spans and memory handles** - Zero-copy views over arrays, strings, and native
//!   buffers, with an overlap-aware bulk move and scoped pinning
//! - **Random numbers** - The legacy seeded generator for reproducible sequences and a
//!   xoshiro256** generator backing a lock-free thread-local shared instance
//!
//! ## Quick Start
//!
//! ```rust
//! use dotcorelib::prelude::*;
//!
//! let mut values = [10, 20, 30, 40, 50];
//! let mut span = Span::new(&mut values);
//! let view = span.slice(1, 3);
//! assert_eq!(view.len(), 3);
//! assert_eq!(view[0], 20);
//! assert_eq!(view[2], 40);
//!
//! let mut random = Random::with_seed(42);
//! let roll = random.next_in_range(1, 7)?;
//! assert!((1..7).contains(&roll));
//! # Ok::<(), dotcorelib::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`metadata`] - Tokens, signatures, method descriptions and the type registry that
//!   resolves methods for delegate binding
//! - [`runtime`] - Runtime values, the managed heap, configuration, the application
//!   context and the [`runtime::RuntimeContext`] that ties them together
//! - [`delegate`] - [`delegate::Delegate`] and [`delegate::MulticastDelegate`]
//! - [`memory`] - [`memory::Span`], [`memory::ReadOnlySpan`], [`memory::Memory`],
//!   [`memory::ReadOnlyMemory`] and their backing storage
//! - [`random`] - [`random::Random`], the algorithm implementations and
//!   [`random::SharedRandom`]
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`] with the crate-wide [`Error`] type.
//! Indexing or slicing a view outside its bounds is a contract violation and panics,
//! mirroring slice indexing; the `get`/`try_slice` lookups are the non-panicking variants.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types
pub mod prelude;

/// Tokens, signatures, method descriptions and the type registry
pub mod metadata;

/// Runtime values, heap, configuration and the runtime context
pub mod runtime;

/// Delegates and multicast invocation lists
pub mod delegate;

/// Spans, owning memory handles and their backing storage
pub mod memory;

/// Random number engines
pub mod random;

/// `dotcorelib` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`Error`]. Used consistently throughout the crate for all fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `dotcorelib` Error type
///
/// The main error type for all operations in this crate. See [`Error`] for the full
/// list of variants.
pub use error::Error;
