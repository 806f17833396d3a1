//! Delegate types, bind options and native function pointers.

use std::{fmt, sync::Arc};

use bitflags::bitflags;
use strum::{Display, EnumIter};

use crate::{
    metadata::{method::CodeAddress, signature::MethodSignature, token::Token},
    runtime::Value,
    Result,
};

/// A reference to a `DelegateType`
pub type DelegateTypeRc = Arc<DelegateType>;

/// The declared shape of a delegate: its type identity and invoke signature.
///
/// Two delegate types are the same type if and only if their tokens are equal.
#[derive(Clone, Debug)]
pub struct DelegateType {
    /// Type definition token of the delegate type
    pub token: Token,
    /// Display name, e.g. `System.EventHandler`
    pub name: String,
    /// Parameters and return kind of `Invoke`
    pub signature: MethodSignature,
}

impl DelegateType {
    /// Creates a delegate type
    #[must_use]
    pub fn new(token: Token, name: impl Into<String>, signature: MethodSignature) -> Self {
        DelegateType {
            token,
            name: name.into(),
            signature,
        }
    }

    /// Number of arguments `Invoke` takes
    #[must_use]
    pub fn arity(&self) -> usize {
        self.signature.arity()
    }
}

impl PartialEq for DelegateType {
    fn eq(&self, other: &Self) -> bool {
        self.token == other.token
    }
}

impl Eq for DelegateType {}

impl fmt::Display for DelegateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Constraints applied while binding a method to a delegate type
    pub struct DelegateBindingFlags: u32 {
        /// Only static methods may bind
        const STATIC_METHOD_ONLY = 0x0001;
        /// Only instance methods may bind
        const INSTANCE_METHOD_ONLY = 0x0002;
        /// The binding must capture a first argument
        const CLOSED_DELEGATE_ONLY = 0x0008;
        /// Method names compare without regard to ASCII case
        const CASE_INSENSITIVE = 0x0020;
    }
}

/// Options for the name-based binding entry points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BindOptions {
    /// Match the method name without regard to ASCII case
    pub ignore_case: bool,
    /// Report bind failures as [`crate::Error::DelegateBind`] instead of `Ok(None)`
    pub throw_on_bind_failure: bool,
}

impl BindOptions {
    /// Case-sensitive lookup that reports failures as errors
    #[must_use]
    pub fn new() -> Self {
        BindOptions {
            ignore_case: false,
            throw_on_bind_failure: true,
        }
    }

    /// Sets case-insensitive name matching
    #[must_use]
    pub fn ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    /// Sets whether failures are reported as errors
    #[must_use]
    pub fn throw_on_bind_failure(mut self, throw: bool) -> Self {
        self.throw_on_bind_failure = throw;
        self
    }

    /// The flags these options imply for a name-based bind
    #[must_use]
    pub fn flags(&self, static_only: bool) -> DelegateBindingFlags {
        let mut flags = if static_only {
            DelegateBindingFlags::STATIC_METHOD_ONLY
        } else {
            DelegateBindingFlags::INSTANCE_METHOD_ONLY | DelegateBindingFlags::CLOSED_DELEGATE_ONLY
        };
        flags.set(DelegateBindingFlags::CASE_INSENSITIVE, self.ignore_case);
        flags
    }
}

impl Default for BindOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Which dispatch variant a [`Delegate`](crate::delegate::Delegate) uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum DispatchKind {
    /// Receiver or first argument captured at bind time
    Closed,
    /// Static method, no captured argument
    Static,
    /// Receiver supplied as the first invocation argument
    OpenInstance,
    /// Receiver supplied at invocation, implementation found through its vtable
    Virtual,
    /// Native function pointer
    Unmanaged,
}

/// Signature of a native function body
pub type NativeBody = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// An unmanaged function pointer.
///
/// Identified solely by its address; two `NativeFunction`s with the same address
/// are the same function.
#[derive(Clone)]
pub struct NativeFunction {
    address: CodeAddress,
    body: NativeBody,
}

impl NativeFunction {
    /// Wraps `body` as the function at `address`
    pub fn new<F>(address: CodeAddress, body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        NativeFunction {
            address,
            body: Arc::new(body),
        }
    }

    /// The function's address
    #[must_use]
    pub fn address(&self) -> CodeAddress {
        self.address
    }

    /// Calls the function.
    ///
    /// # Errors
    ///
    /// Returns whatever the function body returns.
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        (self.body)(args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction(0x{:x})", self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delegate_type_identity_is_token() {
        let a = DelegateType::new(
            Token::type_def(0x10),
            "A",
            MethodSignature::void(Vec::new()),
        );
        let renamed = DelegateType::new(
            Token::type_def(0x10),
            "Renamed",
            MethodSignature::void(Vec::new()),
        );
        let other = DelegateType::new(
            Token::type_def(0x11),
            "A",
            MethodSignature::void(Vec::new()),
        );
        assert_eq!(a, renamed);
        assert_ne!(a, other);
        assert_eq!(a.to_string(), "A");
    }

    #[test]
    fn test_bind_options_flags() {
        let options = BindOptions::new().ignore_case(true);
        let flags = options.flags(false);
        assert!(flags.contains(DelegateBindingFlags::INSTANCE_METHOD_ONLY));
        assert!(flags.contains(DelegateBindingFlags::CASE_INSENSITIVE));
        assert!(!flags.contains(DelegateBindingFlags::STATIC_METHOD_ONLY));

        let flags = BindOptions::default().flags(true);
        assert_eq!(flags, DelegateBindingFlags::STATIC_METHOD_ONLY);
    }

    #[test]
    fn test_native_function_calls_body() {
        let function = NativeFunction::new(0xdead_0000, |args| match args {
            [Value::I32(a), Value::I32(b)] => Ok(Value::I32(a * b)),
            _ => Ok(Value::Void),
        });
        assert_eq!(function.address(), 0xdead_0000);
        assert_eq!(
            function.call(&[Value::I32(6), Value::I32(7)]).unwrap(),
            Value::I32(42)
        );
        assert_eq!(format!("{:?}", function), "NativeFunction(0xdead0000)");
    }
}
