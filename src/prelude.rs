//! # dotcorelib Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the dotcorelib library. Import this module to get quick access to the runtime
//! context, delegates, spans and memory handles, and the random engines.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dotcorelib operations
pub use crate::Error;

/// The result type used throughout dotcorelib
pub use crate::Result;

// ================================================================================================
// Runtime
// ================================================================================================

/// Runtime context and its configuration
pub use crate::runtime::{
    HashingConfig, HeapConfig, RandomConfig, RuntimeConfig, RuntimeContext, RuntimeContextBuilder,
};

/// Values and the managed heap
pub use crate::runtime::{HeapObject, HeapRef, ManagedHeap, Value};

/// Process-wide switches and lifetime events
pub use crate::runtime::AppContext;

// ================================================================================================
// Metadata
// ================================================================================================

/// Metadata token type for referencing types and methods
pub use crate::metadata::token::{Token, TokenTable};

/// Method signatures and value kinds
pub use crate::metadata::signature::{MethodSignature, ValueKind};

/// Method descriptions
pub use crate::metadata::method::{CodeAddress, MethodDesc, MethodDescRc};

/// Type registry and builders
pub use crate::metadata::registry::{
    MethodBuilder, TypeBuilder, TypeDesc, TypeDescRc, TypeRegistry,
};

/// Reflection services used by delegate binding
pub use crate::metadata::resolver::{MethodLookup, MethodResolver};

// ================================================================================================
// Delegates
// ================================================================================================

/// Single bindings and their dispatch
pub use crate::delegate::{Delegate, DelegateRc, Dispatch, DispatchKind};

/// Delegate types and binding options
pub use crate::delegate::{
    BindOptions, DelegateBindingFlags, DelegateType, DelegateTypeRc, NativeFunction,
};

/// Invocation lists
pub use crate::delegate::{InvocationList, MulticastDelegate};

// ================================================================================================
// Memory
// ================================================================================================

/// Stack-only views over contiguous elements
pub use crate::memory::{ReadOnlySpan, Span};

/// Owning handles over arrays, strings and custom managers
pub use crate::memory::{Memory, ReadOnlyMemory};

/// Backing storage
pub use crate::memory::{
    ArraySegment, ManagedArray, ManagedString, MemoryManager, NativeMemoryManager, SharedBuffer,
};

/// Run-time checked views of shared storage
pub use crate::memory::{SpanMut, SpanRef};

/// Pinning
pub use crate::memory::{MemoryHandle, Pinnable};

/// Bulk element moves
pub use crate::memory::{bulk_move, memmove, move_within};

// ================================================================================================
// Random Numbers
// ================================================================================================

/// Generator front-end and algorithm selection
pub use crate::random::{Random, RandomAlgorithm, RandomImpl};

/// Shared per-thread generator
pub use crate::random::SharedRandom;

/// Entropy sources
pub use crate::random::{EntropySource, OsEntropy, SplitMixEntropy};
