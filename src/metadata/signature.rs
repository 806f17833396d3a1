//! Method signatures expressed over runtime value kinds.
//!
//! Signatures here are deliberately flat: every parameter and return slot is one of
//! the [`ValueKind`]s a [`Value`] can carry. Reference types other than strings are
//! all [`ValueKind::Object`], and assignability follows the managed rule that any
//! reference (or null) may flow into an `Object` slot.

use std::fmt;

use strum::{Display, EnumIter};

use crate::{runtime::Value, Result};

/// The kind of a value slot in a [`MethodSignature`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum ValueKind {
    /// No value; only valid as a return kind
    Void,
    /// `bool`
    Bool,
    /// UTF-16 code unit
    Char,
    /// 32-bit signed integer
    I32,
    /// 64-bit signed integer
    I64,
    /// 64-bit floating point
    F64,
    /// Immutable UTF-16 string reference
    String,
    /// Any object reference
    Object,
}

impl ValueKind {
    /// Returns true if this is a reference kind that can hold null.
    #[must_use]
    pub fn is_reference(self) -> bool {
        matches!(self, ValueKind::String | ValueKind::Object)
    }

    /// Returns true if a value of kind `source` may be stored in a slot of this kind.
    #[must_use]
    pub fn is_assignable_from(self, source: ValueKind) -> bool {
        self == source || (self == ValueKind::Object && source.is_reference())
    }

    /// Returns true if `value` may be passed for a slot of this kind.
    ///
    /// `Null` is accepted by every reference kind.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match value {
            Value::Null => self.is_reference(),
            other => self.is_assignable_from(other.kind()),
        }
    }
}

/// Parameter and return kinds of a method or delegate type.
///
/// For instance methods the implicit receiver is NOT part of `params`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    /// Kind of the returned value
    pub return_kind: ValueKind,
    /// Kinds of the declared parameters, in order
    pub params: Vec<ValueKind>,
}

impl MethodSignature {
    /// Creates a signature from a return kind and parameter kinds
    #[must_use]
    pub fn new(return_kind: ValueKind, params: impl Into<Vec<ValueKind>>) -> Self {
        MethodSignature {
            return_kind,
            params: params.into(),
        }
    }

    /// Shorthand for a signature returning nothing
    #[must_use]
    pub fn void(params: impl Into<Vec<ValueKind>>) -> Self {
        Self::new(ValueKind::Void, params)
    }

    /// Number of declared parameters
    #[must_use]
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Returns true if a method with `target_params` returning `target_return` can
    /// stand behind a callable with `self`'s shape.
    ///
    /// Parameters are contravariant: each argument the caller supplies must be
    /// assignable to the target's parameter. The return is covariant.
    #[must_use]
    pub fn is_bindable_to(&self, target_params: &[ValueKind], target_return: ValueKind) -> bool {
        self.params.len() == target_params.len()
            && self
                .params
                .iter()
                .zip(target_params)
                .all(|(supplied, expected)| expected.is_assignable_from(*supplied))
            && self.return_kind.is_assignable_from(target_return)
    }

    /// Validates an argument list against the declared parameters.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ParameterCount`] if the argument count differs and
    /// [`crate::Error::Argument`] if an argument has an incompatible kind.
    pub fn check_arguments(&self, args: &[Value]) -> Result<()> {
        if args.len() != self.params.len() {
            return Err(crate::Error::ParameterCount {
                expected: self.params.len(),
                found: args.len(),
            });
        }

        for (position, (kind, arg)) in self.params.iter().zip(args).enumerate() {
            if !kind.accepts(arg) {
                return Err(argument_error!(
                    "argument {} of kind {} cannot be passed as {}",
                    position,
                    arg.kind(),
                    kind
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.return_kind)?;
        for (index, param) in self.params.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ")")
    }
}
