//! Runtime values passed through delegate invocations and stored in object fields.
//!
//! # Type Mapping
//!
//! | Managed type | Value variant |
//! |--------------|---------------|
//! | `void` | [`Value::Void`] |
//! | `bool` | [`Value::Bool`] |
//! | `char` | [`Value::Char`] |
//! | `int32` | [`Value::I32`] |
//! | `int64` | [`Value::I64`] |
//! | `float64` | [`Value::F64`] |
//! | `string` | [`Value::String`] |
//! | Object reference | [`Value::ObjectRef`] |
//! | `null` | [`Value::Null`] |
//!
//! # Equality
//!
//! `==` compares primitives by value and strings by content. Reference identity,
//! as used by delegate equality and by value-type bitwise comparison, is
//! [`Value::identity_eq`].

use std::fmt;

use crate::{memory::ManagedString, metadata::signature::ValueKind};

/// Reference to a heap-allocated object.
///
/// `HeapRef` is an opaque handle that identifies an object on the
/// [`ManagedHeap`](crate::runtime::ManagedHeap). Two `HeapRef` values are equal
/// if they point to the same heap object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapRef(pub(crate) u64);

impl HeapRef {
    /// Creates a new heap reference with the given ID.
    #[must_use]
    pub fn new(id: u64) -> Self {
        HeapRef(id)
    }

    /// Returns the internal ID of this heap reference.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HeapRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HeapRef({})", self.0)
    }
}

/// A runtime value.
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// No value; the result of a void method.
    #[default]
    Void,

    /// Null reference.
    ///
    /// Distinguished from [`Value::Void`], which is the absence of any value.
    Null,

    /// Boolean value.
    Bool(bool),

    /// UTF-16 code unit.
    Char(u16),

    /// 32-bit signed integer.
    I32(i32),

    /// 64-bit signed integer.
    I64(i64),

    /// 64-bit floating point.
    F64(f64),

    /// Immutable string; cloning shares the same string object.
    String(ManagedString),

    /// Managed reference to a heap object.
    ObjectRef(HeapRef),
}

impl Value {
    /// Creates a string value
    #[must_use]
    pub fn string(value: &str) -> Self {
        Value::String(ManagedString::new(value))
    }

    /// Default value of a field or local of `kind`
    #[must_use]
    pub fn default_for(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Void => Value::Void,
            ValueKind::Bool => Value::Bool(false),
            ValueKind::Char => Value::Char(0),
            ValueKind::I32 => Value::I32(0),
            ValueKind::I64 => Value::I64(0),
            ValueKind::F64 => Value::F64(0.0),
            ValueKind::String | ValueKind::Object => Value::Null,
        }
    }

    /// Kind of this value; `Null` reports [`ValueKind::Object`]
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Void => ValueKind::Void,
            Value::Null | Value::ObjectRef(_) => ValueKind::Object,
            Value::Bool(_) => ValueKind::Bool,
            Value::Char(_) => ValueKind::Char,
            Value::I32(_) => ValueKind::I32,
            Value::I64(_) => ValueKind::I64,
            Value::F64(_) => ValueKind::F64,
            Value::String(_) => ValueKind::String,
        }
    }

    /// Returns true for `Null`
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the heap reference, if this is an object reference
    #[must_use]
    pub fn as_object(&self) -> Option<HeapRef> {
        match self {
            Value::ObjectRef(heap_ref) => Some(*heap_ref),
            _ => None,
        }
    }

    /// Returns the integer, if this is an `I32`
    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(value) => Some(*value),
            _ => None,
        }
    }

    /// Reference identity for references, bit identity for primitives.
    ///
    /// Floats compare by bit pattern, so `NaN` is identical to itself and `0.0`
    /// differs from `-0.0`.
    #[must_use]
    pub fn identity_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Void, Value::Void) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => ManagedString::ptr_eq(a, b),
            (Value::ObjectRef(a), Value::ObjectRef(b)) => a == b,
            _ => false,
        }
    }

    /// Hash consistent with [`identity_eq`](Self::identity_eq); `0` for null and void.
    #[must_use]
    pub fn identity_hash(&self) -> u64 {
        match self {
            Value::Void | Value::Null => 0,
            Value::Bool(value) => mix64(u64::from(*value)),
            Value::Char(value) => mix64(u64::from(*value)),
            Value::I32(value) => mix64(*value as u32 as u64),
            Value::I64(value) => mix64(*value as u64),
            Value::F64(value) => mix64(value.to_bits()),
            Value::String(value) => mix64(value.as_ptr() as usize as u64),
            Value::ObjectRef(heap_ref) => mix64(heap_ref.id()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            _ => self.identity_eq(other),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::I32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::I64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::F64(value)
    }
}

impl From<HeapRef> for Value {
    fn from(value: HeapRef) -> Self {
        Value::ObjectRef(value)
    }
}

impl From<ManagedString> for Value {
    fn from(value: ManagedString) -> Self {
        Value::String(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "void"),
            Value::Null => write!(f, "null"),
            Value::Bool(value) => write!(f, "{}", value),
            Value::Char(value) => write!(f, "'\\u{{{:04x}}}'", value),
            Value::I32(value) => write!(f, "{}", value),
            Value::I64(value) => write!(f, "{}L", value),
            Value::F64(value) => write!(f, "{}", value),
            Value::String(value) => write!(f, "\"{}\"", value),
            Value::ObjectRef(heap_ref) => write!(f, "{}", heap_ref),
        }
    }
}

/// SplitMix64 finalizer
pub(crate) fn mix64(value: u64) -> u64 {
    let mut z = value.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
