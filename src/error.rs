use thiserror::Error;

use crate::metadata::token::Token;

fn borrow_kind(mutably: &bool) -> &'static str {
    if *mutably {
        "by a mutable view"
    } else {
        "by a read-only view"
    }
}

/// Builds an [`Error::ArgumentOutOfRange`] for the named parameter.
///
/// ```rust, ignore
/// return Err(out_of_range!("start", "start {} exceeds length {}", start, len));
/// ```
macro_rules! out_of_range {
    // Single string version
    ($param:expr, $msg:expr) => {
        crate::Error::ArgumentOutOfRange {
            param: $param,
            message: $msg.to_string(),
        }
    };

    // Format string with arguments version
    ($param:expr, $fmt:expr, $($arg:tt)*) => {
        crate::Error::ArgumentOutOfRange {
            param: $param,
            message: format!($fmt, $($arg)*),
        }
    };
}

/// Builds an [`Error::Argument`] carrying a formatted message.
///
/// ```rust, ignore
/// return Err(argument_error!("choices must not be empty"));
/// ```
macro_rules! argument_error {
    ($msg:expr) => {
        crate::Error::Argument($msg.to_string())
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Argument(format!($fmt, $($arg)*))
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every fallible operation in the crate reports failure through this enum. Failures are
/// returned to the immediate caller and are never retried or logged internally; an operation
/// that fails leaves all of its inputs unmodified.
///
/// # Error Categories
///
/// ## Contract Violations
/// - [`Error::ArgumentOutOfRange`] - An index, length or bound is outside the permitted range
/// - [`Error::ArgumentNull`] - A required argument was missing
/// - [`Error::Argument`] - An argument was invalid for another reason
/// - [`Error::DestinationTooShort`] - A copy destination cannot hold the source
/// - [`Error::DelegateTypeMismatch`] - Delegates of different types were combined or removed
/// - [`Error::ParameterCount`] - An invocation supplied the wrong number of arguments
/// - [`Error::NullReference`] - An open delegate was invoked with a null receiver
///
/// ## Resolution Failures
/// - [`Error::MethodNotFound`] - No method matched a lookup
/// - [`Error::AmbiguousMatch`] - More than one method matched a lookup
/// - [`Error::DelegateBind`] - A method could not be bound to a delegate type
///
/// ## Type System Errors
/// - [`Error::TypeNotFound`] - Requested type not registered
/// - [`Error::TypeInsert`] - A type could not be registered
/// - [`Error::TypeMissingParent`] - A type names a parent that is not registered
///
/// ## Runtime Errors
/// - [`Error::InvalidHeapReference`] - A heap handle does not refer to a live object
/// - [`Error::HeapMemoryLimitExceeded`] - An allocation would exceed the heap budget
/// - [`Error::NotSupported`] - The operation is deliberately unsupported
/// - [`Error::InvalidOperation`] - The operation is invalid in the current state
/// - [`Error::Entropy`] - The entropy source failed
/// - [`Error::BufferBorrowed`] - A view over a shared buffer conflicts with a live view
///
/// # Examples
///
/// ```rust
/// use dotcorelib::{Error, random::Random};
///
/// let mut random = Random::with_seed(42);
/// match random.next_in_range(10, 1) {
///     Err(Error::ArgumentOutOfRange { param, .. }) => assert_eq!(param, "min_value"),
///     other => panic!("unexpected {:?}", other),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    // Contract violations
    /// An argument was outside the range of valid values.
    ///
    /// Raised for negative or inverted random bounds, view or handle ranges that
    /// exceed their backing storage, and owning handles whose manager has shrunk
    /// below the handle's range.
    ///
    /// # Fields
    ///
    /// * `param` - Name of the offending parameter
    /// * `message` - Description of the violated bound
    #[error("Argument '{param}' out of range: {message}")]
    ArgumentOutOfRange {
        /// The name of the parameter that was out of range
        param: &'static str,
        /// The description of the violated bound
        message: String,
    },

    /// A required argument was not provided.
    #[error("Argument '{0}' must not be null")]
    ArgumentNull(&'static str),

    /// An argument was invalid.
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// The destination of a copy is shorter than the source.
    #[error("Destination is too short: {required} elements required, {available} available")]
    DestinationTooShort {
        /// Number of elements the copy needs to write
        required: usize,
        /// Number of elements the destination can hold
        available: usize,
    },

    /// A method could not be bound to the requested delegate type.
    ///
    /// Covers signature mismatches, receivers of the wrong type, and lookups that
    /// found no method or more than one method. Only produced when the caller asked
    /// for bind failures to be reported; otherwise binding yields `None`.
    #[error("Cannot bind to the target method '{method}': {reason}")]
    DelegateBind {
        /// The name of the method that failed to bind
        method: String,
        /// Why the binding was rejected
        reason: String,
    },

    /// Two delegates of different delegate types were combined or removed.
    #[error("Delegates must be of the same type: '{left}' and '{right}'")]
    DelegateTypeMismatch {
        /// The delegate type of the left-hand operand
        left: String,
        /// The delegate type of the right-hand operand
        right: String,
    },

    /// An invocation did not supply the number of arguments the signature declares.
    #[error("Parameter count mismatch: expected {expected}, found {found}")]
    ParameterCount {
        /// Number of parameters declared by the signature
        expected: usize,
        /// Number of arguments actually supplied
        found: usize,
    },

    /// An instance method was invoked without a receiver.
    #[error("Object reference not set to an instance of an object")]
    NullReference,

    // Resolution failures
    /// No method on the type (or its parents) matched the lookup.
    #[error("Method '{name}' not found on type '{type_name}'")]
    MethodNotFound {
        /// Name of the type that was searched
        type_name: String,
        /// Name of the method that was looked up
        name: String,
    },

    /// More than one method on the type matched the lookup.
    #[error("Ambiguous match for method '{name}' on type '{type_name}'")]
    AmbiguousMatch {
        /// Name of the type that was searched
        type_name: String,
        /// Name of the method that was looked up
        name: String,
    },

    // Type system errors
    /// The requested type has not been registered.
    #[error("Failed to find type - {0}")]
    TypeNotFound(Token),

    /// Failed to register a type.
    ///
    /// The token is already taken, or the name collides with a registered type.
    #[error("Failed to insert new type - {0}")]
    TypeInsert(Token),

    /// The parent of a type being registered is unknown.
    #[error("Type {0} names a parent that is not registered")]
    TypeMissingParent(Token),

    // Runtime errors
    /// A heap handle does not refer to a live object.
    #[error("Invalid heap reference: {0}")]
    InvalidHeapReference(u64),

    /// Allocating would exceed the configured heap budget.
    #[error("Heap memory limit exceeded: {current} of {limit} bytes in use")]
    HeapMemoryLimitExceeded {
        /// Bytes in use before the failed allocation
        current: usize,
        /// Configured limit in bytes
        limit: usize,
    },

    /// The operation is not supported.
    ///
    /// Returned by the value-equality and hashing entry points of non-owning views,
    /// which compare by identity only.
    #[error("Operation not supported: {0}")]
    NotSupported(&'static str),

    /// The operation is not valid in the current state.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The entropy source failed to produce random bytes.
    #[error("Entropy source failure: {0}")]
    Entropy(String),

    /// A view over a shared buffer conflicts with a view that is still alive.
    ///
    /// Any number of read-only views may coexist, but a mutable view needs the
    /// buffer to itself.
    #[error("Buffer is already borrowed {}", borrow_kind(.mutably))]
    BufferBorrowed {
        /// True if the live view is a mutable one
        mutably: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_macro() {
        let error = out_of_range!("start", "start {} exceeds length {}", 7, 5);
        match error {
            Error::ArgumentOutOfRange { param, message } => {
                assert_eq!(param, "start");
                assert_eq!(message, "start 7 exceeds length 5");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_argument_error_display() {
        let error = argument_error!("choices must not be empty");
        assert_eq!(
            error.to_string(),
            "Invalid argument: choices must not be empty"
        );
    }

    #[test]
    fn test_buffer_borrowed_display() {
        assert_eq!(
            Error::BufferBorrowed { mutably: true }.to_string(),
            "Buffer is already borrowed by a mutable view"
        );
        assert_eq!(
            Error::BufferBorrowed { mutably: false }.to_string(),
            "Buffer is already borrowed by a read-only view"
        );
    }

    #[test]
    fn test_type_not_found_display() {
        let error = Error::TypeNotFound(Token::new(0x0200_0003));
        assert_eq!(error.to_string(), "Failed to find type - 0x02000003");
    }
}
