//! Type and method metadata used for delegate binding.
//!
//! This module holds the reflection side of the runtime: the identities, shapes and
//! vtables that binding operations consult. Nothing here executes on the invoke path
//! except vtable lookups for virtual dispatch.
//!
//! # Key Components
//!
//! - [`token`] - Metadata tokens identifying types and methods
//! - [`signature`] - Value kinds and method signatures with assignability rules
//! - [`method`] - Method descriptions, modifiers and executable bodies
//! - [`resolver`] - The [`resolver::MethodResolver`] trait and lookup filters
//! - [`registry`] - [`registry::TypeRegistry`], the in-crate resolver

/// Method descriptions, modifier flags and bodies
pub mod method;
/// Type registry and builders
pub mod registry;
/// Reflection services consumed by delegate binding
pub mod resolver;
/// Value kinds and method signatures
pub mod signature;
/// Metadata tokens
pub mod token;
