//! Runtime state: values, the managed heap, configuration and the context that owns them.
//!
//! # Key Components
//!
//! - [`RuntimeContext`] / [`RuntimeContextBuilder`] - Explicit owner of all process-wide state
//! - [`RuntimeConfig`] - Heap, entropy, hashing and switch configuration
//! - [`ManagedHeap`] - Handle-based object arena with the runtime intrinsics
//! - [`AppContext`] - Switches, data and the `ProcessExit` event
//! - [`Value`] / [`HeapRef`] - Values flowing through invocations

mod appcontext;
mod config;
mod context;
mod heap;
pub(crate) mod value;

pub use appcontext::AppContext;
pub use config::{HashingConfig, HeapConfig, RandomConfig, RuntimeConfig};
pub use context::{RuntimeContext, RuntimeContextBuilder};
pub use heap::{HeapObject, ManagedHeap};
pub use value::{HeapRef, Value};
