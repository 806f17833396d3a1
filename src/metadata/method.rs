//! Method descriptions consumed by delegate binding.
//!
//! A [`MethodDesc`] is the runtime's view of one method: identity ([`Token`]),
//! declaring type, signature, modifiers, the code address assigned at registration,
//! and the callable body. Instance bodies receive their receiver as `args[0]`.

use std::{fmt, sync::Arc};

use bitflags::bitflags;

use crate::{
    metadata::{signature::MethodSignature, token::Token},
    runtime::{RuntimeContext, Value},
    Result,
};

/// Opaque code address handed out by the type registry.
///
/// Addresses of managed entry points and of the shared dispatch thunks never collide.
pub type CodeAddress = usize;

/// Executable body of a managed method.
///
/// Instance methods receive the receiver as the first element of the argument slice.
pub type MethodBody = Arc<dyn Fn(&RuntimeContext, &[Value]) -> Result<Value> + Send + Sync>;

/// A reference to a `MethodDesc`
pub type MethodDescRc = Arc<MethodDesc>;

/// Mask selecting the access bits of the raw method flags
pub const METHOD_ACCESS_MASK: u32 = 0x0007;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Method access flags
    pub struct MethodAccessFlags: u32 {
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by sub-types only in this assembly
        const FAM_AND_ASSEM = 0x0002;
        /// Accessible by anyone in the assembly
        const ASSEM = 0x0003;
        /// Accessible only by type and sub-types
        const FAMILY = 0x0004;
        /// Accessible by sub-types anywhere, plus anyone in the assembly
        const FAM_OR_ASSEM = 0x0005;
        /// Accessible by anyone who has visibility to this scope
        const PUBLIC = 0x0006;
    }
}

impl MethodAccessFlags {
    /// Extract access flags from raw method attributes
    #[must_use]
    pub fn from_method_flags(flags: u32) -> Self {
        Self::from_bits_truncate(flags & METHOD_ACCESS_MASK)
    }

    /// Returns true for public access
    #[must_use]
    pub fn is_public(self) -> bool {
        self == MethodAccessFlags::PUBLIC
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Method modifiers and vtable layout
    pub struct MethodModifiers: u32 {
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Method may not be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method hides by name and signature, else just by name
        const HIDE_BY_SIG = 0x0080;
        /// Method always gets a new slot in the vtable
        const NEW_SLOT = 0x0100;
        /// Method does not provide an implementation
        const ABSTRACT = 0x0400;
    }
}

/// Runtime description of a registered method.
pub struct MethodDesc {
    /// Method definition token
    pub token: Token,
    /// Simple name
    pub name: String,
    /// Token of the declaring type
    pub declaring_type: Token,
    /// Parameter and return kinds, excluding any receiver
    pub signature: MethodSignature,
    /// Static/virtual/abstract modifiers and vtable layout
    pub modifiers: MethodModifiers,
    /// Visibility
    pub access: MethodAccessFlags,
    /// Code address of the entry point
    pub entry_point: CodeAddress,
    /// Slot in the declaring type's vtable, for virtual methods
    pub vtable_slot: Option<usize>,
    /// Executable body, `None` for abstract methods
    pub body: Option<MethodBody>,
}

impl MethodDesc {
    /// Returns true if the method has no receiver
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.modifiers.contains(MethodModifiers::STATIC)
    }

    /// Returns true if calls through a base reference dispatch on the receiver type
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.modifiers.contains(MethodModifiers::VIRTUAL)
    }

    /// Returns true if the method is virtual and may still be overridden
    #[must_use]
    pub fn is_overridable(&self) -> bool {
        self.is_virtual() && !self.modifiers.contains(MethodModifiers::FINAL)
    }

    /// Returns true if the method has no body
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.modifiers.contains(MethodModifiers::ABSTRACT)
    }

    /// Number of values the body expects, including the receiver of instance methods
    #[must_use]
    pub fn physical_arity(&self) -> usize {
        self.signature.arity() + usize::from(!self.is_static())
    }

    /// Runs the method body.
    ///
    /// `args` must already contain the receiver for instance methods.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidOperation`] for abstract methods, and whatever
    /// the body itself returns.
    pub fn call(&self, ctx: &RuntimeContext, args: &[Value]) -> Result<Value> {
        match &self.body {
            Some(body) => body(ctx, args),
            None => Err(crate::Error::InvalidOperation(format!(
                "cannot call abstract method '{}'",
                self.name
            ))),
        }
    }
}

impl fmt::Debug for MethodDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDesc")
            .field("token", &self.token)
            .field("name", &self.name)
            .field("declaring_type", &self.declaring_type)
            .field("signature", &self.signature)
            .field("modifiers", &self.modifiers)
            .field("access", &self.access)
            .field("entry_point", &format_args!("0x{:x}", self.entry_point))
            .field("vtable_slot", &self.vtable_slot)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for MethodDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}{}", self.declaring_type, self.name, self.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_flags_from_raw() {
        assert_eq!(
            MethodAccessFlags::from_method_flags(0x0086),
            MethodAccessFlags::PUBLIC
        );
        assert!(MethodAccessFlags::from_method_flags(0x0006).is_public());
        assert!(!MethodAccessFlags::from_method_flags(0x0001).is_public());
    }

    #[test]
    fn test_modifiers_overridable() {
        let virtual_only = MethodModifiers::VIRTUAL | MethodModifiers::HIDE_BY_SIG;
        assert!(virtual_only.contains(MethodModifiers::VIRTUAL));

        let sealed = MethodModifiers::VIRTUAL | MethodModifiers::FINAL;
        assert!(sealed.contains(MethodModifiers::FINAL));
        assert_eq!(MethodModifiers::NEW_SLOT.bits(), 0x0100);
    }
}
