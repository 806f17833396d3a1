//! The reflection seam between delegate binding and the type system.
//!
//! Delegates never inspect type metadata directly. Everything they need at bind time
//! (method lookup, vtable slots, thunk addresses, type relationships) and the single
//! thing they need at invoke time (the vtable entry behind a virtual slot) goes through
//! [`MethodResolver`]. [`TypeRegistry`](crate::metadata::registry::TypeRegistry) is the
//! in-crate implementation.

use bitflags::bitflags;

use crate::{
    metadata::{
        method::{CodeAddress, MethodDesc, MethodDescRc},
        registry::TypeDescRc,
        signature::MethodSignature,
        token::Token,
    },
    Result,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Filters applied by [`MethodResolver::resolve_method`]
    pub struct BindingFlags: u32 {
        /// Compare names without regard to ASCII case
        const IGNORE_CASE = 0x0001;
        /// Only search the named type, not its parents
        const DECLARED_ONLY = 0x0002;
        /// Include instance methods
        const INSTANCE = 0x0004;
        /// Include static methods
        const STATIC = 0x0008;
        /// Include public methods
        const PUBLIC = 0x0010;
        /// Include non-public methods
        const NON_PUBLIC = 0x0020;
    }
}

/// A method lookup request.
#[derive(Debug, Clone, Copy)]
pub struct MethodLookup<'a> {
    /// Name to look for
    pub name: &'a str,
    /// Search filters
    pub flags: BindingFlags,
    /// Optional shape the method must be bindable to
    pub signature: Option<&'a MethodSignature>,
}

impl<'a> MethodLookup<'a> {
    /// Creates a lookup for `name` over public and non-public instance methods
    #[must_use]
    pub fn instance(name: &'a str) -> Self {
        MethodLookup {
            name,
            flags: BindingFlags::INSTANCE | BindingFlags::PUBLIC | BindingFlags::NON_PUBLIC,
            signature: None,
        }
    }

    /// Creates a lookup for `name` over public and non-public static methods
    #[must_use]
    pub fn static_method(name: &'a str) -> Self {
        MethodLookup {
            name,
            flags: BindingFlags::STATIC | BindingFlags::PUBLIC | BindingFlags::NON_PUBLIC,
            signature: None,
        }
    }

    /// Restricts the lookup to methods bindable to `signature`
    #[must_use]
    pub fn with_signature(mut self, signature: &'a MethodSignature) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Switches to case-insensitive name matching when `ignore_case` is set
    #[must_use]
    pub fn ignore_case(mut self, ignore_case: bool) -> Self {
        self.flags.set(BindingFlags::IGNORE_CASE, ignore_case);
        self
    }

    /// Returns true if `method`'s name, kind, visibility and shape satisfy this lookup
    #[must_use]
    pub fn matches(&self, method: &MethodDesc) -> bool {
        let name_matches = if self.flags.contains(BindingFlags::IGNORE_CASE) {
            method.name.eq_ignore_ascii_case(self.name)
        } else {
            method.name == self.name
        };
        if !name_matches {
            return false;
        }

        let kind_matches = if method.is_static() {
            self.flags.contains(BindingFlags::STATIC)
        } else {
            self.flags.contains(BindingFlags::INSTANCE)
        };
        let visibility_matches = if method.access.is_public() {
            self.flags.contains(BindingFlags::PUBLIC)
        } else {
            self.flags.contains(BindingFlags::NON_PUBLIC)
        };

        kind_matches
            && visibility_matches
            && self.signature.map_or(true, |signature| {
                signature.is_bindable_to(&method.signature.params, method.signature.return_kind)
            })
    }
}

/// Reflection services used by delegate binding.
///
/// Binding calls these at construction time only. Invocation reads nothing but
/// [`vtable_entry`](MethodResolver::vtable_entry), and only for virtual bindings.
pub trait MethodResolver: Send + Sync {
    /// Returns the description of a registered type.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::TypeNotFound`] for unknown tokens.
    fn type_desc(&self, type_token: Token) -> Result<TypeDescRc>;

    /// Resolves a method on `type_token` or, unless `DECLARED_ONLY` is set, its parents.
    ///
    /// A derived method hides a parent method with the same name and parameters.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MethodNotFound`] if nothing matches and
    /// [`crate::Error::AmbiguousMatch`] if more than one visible method matches.
    fn resolve_method(&self, type_token: Token, lookup: &MethodLookup<'_>) -> Result<MethodDescRc>;

    /// Returns the method whose entry point is `address`, if any.
    fn method_by_address(&self, address: CodeAddress) -> Option<MethodDescRc>;

    /// Returns the vtable slot of `method`, if it has one.
    fn virtual_slot(&self, method: &MethodDesc) -> Option<usize> {
        method.vtable_slot
    }

    /// Returns the implementation occupying `slot` in the vtable of `type_token`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::TypeNotFound`] for unknown types and
    /// [`crate::Error::MethodNotFound`] for slots beyond the vtable.
    fn vtable_entry(&self, type_token: Token, slot: usize) -> Result<MethodDescRc>;

    /// Address of the shared thunk that moves the first argument into the receiver
    /// position for open bindings of the given delegate arity.
    fn shuffle_thunk(&self, arity: usize) -> CodeAddress;

    /// Address of the shared thunk that dispatches through vtable slot `slot`.
    fn virtual_dispatch_thunk(&self, slot: usize) -> CodeAddress;

    /// Returns true if `type_token` is `base` or derives from it.
    fn is_assignable_to(&self, type_token: Token, base: Token) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        method::{MethodAccessFlags, MethodModifiers},
        signature::ValueKind,
    };

    fn method(name: &str, modifiers: MethodModifiers, access: MethodAccessFlags) -> MethodDesc {
        MethodDesc {
            token: Token::method_def(1),
            name: name.to_string(),
            declaring_type: Token::type_def(1),
            signature: MethodSignature::new(ValueKind::I32, [ValueKind::I32]),
            modifiers,
            access,
            entry_point: 0x1000,
            vtable_slot: None,
            body: None,
        }
    }

    #[test]
    fn test_lookup_name_case() {
        let target = method("Add", MethodModifiers::STATIC, MethodAccessFlags::PUBLIC);
        assert!(MethodLookup::static_method("Add").matches(&target));
        assert!(!MethodLookup::static_method("add").matches(&target));
        assert!(MethodLookup::static_method("add")
            .ignore_case(true)
            .matches(&target));
    }

    #[test]
    fn test_lookup_kind_and_visibility() {
        let instance = method("Run", MethodModifiers::empty(), MethodAccessFlags::PRIVATE);
        assert!(MethodLookup::instance("Run").matches(&instance));
        assert!(!MethodLookup::static_method("Run").matches(&instance));

        let public_only = MethodLookup {
            name: "Run",
            flags: BindingFlags::INSTANCE | BindingFlags::PUBLIC,
            signature: None,
        };
        assert!(!public_only.matches(&instance));
    }

    #[test]
    fn test_lookup_signature() {
        let target = method("Add", MethodModifiers::STATIC, MethodAccessFlags::PUBLIC);
        let matching = MethodSignature::new(ValueKind::I32, [ValueKind::I32]);
        let other = MethodSignature::new(ValueKind::I32, [ValueKind::String]);
        assert!(MethodLookup::static_method("Add")
            .with_signature(&matching)
            .matches(&target));
        assert!(!MethodLookup::static_method("Add")
            .with_signature(&other)
            .matches(&target));
    }
}
