//! Registry of runtime types, methods and code addresses.
//!
//! [`TypeRegistry`] is the in-crate [`MethodResolver`]. Types are described with
//! [`TypeBuilder`] and [`MethodBuilder`] and registered once; registration assigns
//! tokens, code addresses and vtable slots, and the resulting [`TypeDesc`] is
//! immutable from then on.
//!
//! # Vtable Layout
//!
//! A derived type starts from a copy of its parent's vtable. Each virtual method
//! either overrides the parent slot with the same name and signature, or appends a
//! new slot when it is marked `NEW_SLOT` or no parent slot matches.
//!
//! # Concurrency Design
//!
//! - Primary storage uses `SkipMap` keyed by [`Token`]
//! - Secondary indices (names, entry points, thunks) use `DashMap`
//! - Rows and code addresses come from atomic counters
//!
//! # Examples
//!
//! ```rust
//! use dotcorelib::metadata::{
//!     registry::{MethodBuilder, TypeBuilder, TypeRegistry},
//!     resolver::{MethodLookup, MethodResolver},
//!     signature::{MethodSignature, ValueKind},
//! };
//! use dotcorelib::runtime::Value;
//!
//! let registry = TypeRegistry::new();
//! let math = registry.register(
//!     TypeBuilder::class("Demo", "Math").method(
//!         MethodBuilder::new("Twice", MethodSignature::new(ValueKind::I32, [ValueKind::I32]))
//!             .static_method()
//!             .body(|_, args| match args {
//!                 [Value::I32(v)] => Ok(Value::I32(v * 2)),
//!                 _ => Ok(Value::Void),
//!             }),
//!     ),
//! )?;
//!
//! let twice = registry.resolve_method(math.token, &MethodLookup::static_method("Twice"))?;
//! assert_eq!(twice.name, "Twice");
//! # Ok::<(), dotcorelib::Error>(())
//! ```

use std::sync::{
    atomic::{AtomicU32, AtomicUsize, Ordering},
    Arc,
};

use crossbeam_skiplist::SkipMap;
use dashmap::{mapref::entry::Entry, DashMap};

use crate::{
    metadata::{
        method::{
            CodeAddress, MethodAccessFlags, MethodBody, MethodDesc, MethodDescRc, MethodModifiers,
        },
        resolver::{BindingFlags, MethodLookup, MethodResolver},
        signature::{MethodSignature, ValueKind},
        token::Token,
    },
    runtime::{RuntimeContext, Value},
    Error, Result,
};

/// A reference to a `TypeDesc`
pub type TypeDescRc = Arc<TypeDesc>;

/// Methods declared by one type, in declaration order
pub type MethodList = Arc<boxcar::Vec<MethodDescRc>>;

/// Token-ordered map of registered types
pub type TypeMap = SkipMap<Token, TypeDescRc>;

/// Token-ordered map of registered methods
pub type MethodMap = SkipMap<Token, MethodDescRc>;

/// First code address handed out; lower addresses are never valid entry points
const CODE_BASE: CodeAddress = 0x1000;

/// Spacing between consecutive code addresses
const CODE_ALIGN: CodeAddress = 0x10;

/// A field slot in an object layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDesc {
    /// Field name
    pub name: String,
    /// Kind of the stored value
    pub kind: ValueKind,
}

/// Immutable description of a registered type.
#[derive(Debug)]
pub struct TypeDesc {
    /// Type definition token
    pub token: Token,
    /// Namespace, possibly empty
    pub namespace: String,
    /// Simple name
    pub name: String,
    /// Parent type, `None` for roots
    pub parent: Option<Token>,
    /// True for value types, whose equality compares fields
    pub is_value_type: bool,
    /// Field layout, inherited fields first
    pub fields: Vec<FieldDesc>,
    /// Declared methods
    pub methods: MethodList,
    /// Virtual method table, inherited slots first
    pub vtable: Vec<MethodDescRc>,
}

impl TypeDesc {
    /// `namespace.name`, or just `name` without a namespace
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Default value for each field, in layout order
    #[must_use]
    pub fn default_fields(&self) -> Vec<Value> {
        self.fields
            .iter()
            .map(|field| Value::default_for(field.kind))
            .collect()
    }
}

/// Describes a method to be registered with its declaring type.
pub struct MethodBuilder {
    name: String,
    signature: MethodSignature,
    modifiers: MethodModifiers,
    access: MethodAccessFlags,
    body: Option<MethodBody>,
}

impl MethodBuilder {
    /// Starts a public, non-virtual instance method
    #[must_use]
    pub fn new(name: impl Into<String>, signature: MethodSignature) -> Self {
        MethodBuilder {
            name: name.into(),
            signature,
            modifiers: MethodModifiers::HIDE_BY_SIG,
            access: MethodAccessFlags::PUBLIC,
            body: None,
        }
    }

    /// Makes the method static
    #[must_use]
    pub fn static_method(mut self) -> Self {
        self.modifiers |= MethodModifiers::STATIC;
        self
    }

    /// Makes the method virtual
    #[must_use]
    pub fn virtual_method(mut self) -> Self {
        self.modifiers |= MethodModifiers::VIRTUAL;
        self
    }

    /// Forbids further overrides
    #[must_use]
    pub fn sealed(mut self) -> Self {
        self.modifiers |= MethodModifiers::FINAL;
        self
    }

    /// Gives the method its own vtable slot instead of overriding
    #[must_use]
    pub fn new_slot(mut self) -> Self {
        self.modifiers |= MethodModifiers::NEW_SLOT;
        self
    }

    /// Declares an abstract virtual method without a body
    #[must_use]
    pub fn abstract_method(mut self) -> Self {
        self.modifiers |= MethodModifiers::VIRTUAL | MethodModifiers::ABSTRACT;
        self
    }

    /// Sets the visibility
    #[must_use]
    pub fn access(mut self, access: MethodAccessFlags) -> Self {
        self.access = access;
        self
    }

    /// Sets the executable body
    #[must_use]
    pub fn body<F>(mut self, body: F) -> Self
    where
        F: Fn(&RuntimeContext, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.body = Some(Arc::new(body));
        self
    }
}

/// Describes a type to be registered.
pub struct TypeBuilder {
    namespace: String,
    name: String,
    parent: Option<Token>,
    is_value_type: bool,
    fields: Vec<FieldDesc>,
    methods: Vec<MethodBuilder>,
}

impl TypeBuilder {
    /// Starts a reference type
    #[must_use]
    pub fn class(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        TypeBuilder {
            namespace: namespace.into(),
            name: name.into(),
            parent: None,
            is_value_type: false,
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Starts a value type
    #[must_use]
    pub fn value_type(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        TypeBuilder {
            is_value_type: true,
            ..Self::class(namespace, name)
        }
    }

    /// Sets the parent type
    #[must_use]
    pub fn extends(mut self, parent: Token) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Appends a field
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.fields.push(FieldDesc {
            name: name.into(),
            kind,
        });
        self
    }

    /// Appends a method
    #[must_use]
    pub fn method(mut self, method: MethodBuilder) -> Self {
        self.methods.push(method);
        self
    }

    fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

/// Registry of types and methods, and the allocator of code addresses.
pub struct TypeRegistry {
    /// Primary type storage indexed by token
    types: TypeMap,
    /// All registered methods indexed by token
    methods: MethodMap,
    /// Secondary index: types by full name
    types_by_fullname: DashMap<String, Token>,
    /// Secondary index: methods by entry point
    methods_by_address: DashMap<CodeAddress, MethodDescRc>,
    /// Shuffle thunk per delegate arity
    shuffle_thunks: DashMap<usize, CodeAddress>,
    /// Virtual dispatch thunk per vtable slot
    dispatch_thunks: DashMap<usize, CodeAddress>,
    next_type_row: AtomicU32,
    next_method_row: AtomicU32,
    next_address: AtomicUsize,
}

impl TypeRegistry {
    /// Creates an empty registry
    #[must_use]
    pub fn new() -> Self {
        TypeRegistry {
            types: SkipMap::new(),
            methods: SkipMap::new(),
            types_by_fullname: DashMap::new(),
            methods_by_address: DashMap::new(),
            shuffle_thunks: DashMap::new(),
            dispatch_thunks: DashMap::new(),
            next_type_row: AtomicU32::new(1),
            next_method_row: AtomicU32::new(1),
            next_address: AtomicUsize::new(CODE_BASE),
        }
    }

    fn next_code_address(&self) -> CodeAddress {
        self.next_address.fetch_add(CODE_ALIGN, Ordering::Relaxed)
    }

    /// Registers a type and its methods.
    ///
    /// # Errors
    ///
    /// - [`Error::TypeInsert`] if a type with the same full name exists
    /// - [`Error::TypeMissingParent`] if the parent is not registered
    /// - [`Error::InvalidOperation`] if a method overrides a sealed slot, or a
    ///   non-abstract method has no body
    pub fn register(&self, builder: TypeBuilder) -> Result<TypeDescRc> {
        let full_name = builder.full_name();
        let vacant = match self.types_by_fullname.entry(full_name) {
            Entry::Occupied(existing) => return Err(Error::TypeInsert(*existing.get())),
            Entry::Vacant(vacant) => vacant,
        };

        let token = Token::type_def(self.next_type_row.fetch_add(1, Ordering::Relaxed));
        let parent = match builder.parent {
            Some(parent_token) => match self.types.get(&parent_token) {
                Some(entry) => Some(entry.value().clone()),
                None => return Err(Error::TypeMissingParent(parent_token)),
            },
            None => None,
        };

        let mut fields = parent
            .as_ref()
            .map(|parent| parent.fields.clone())
            .unwrap_or_default();
        fields.extend(builder.fields);

        let mut vtable = parent
            .as_ref()
            .map(|parent| parent.vtable.clone())
            .unwrap_or_default();
        let inherited_slots = vtable.len();

        let mut declared = Vec::with_capacity(builder.methods.len());
        for method in builder.methods {
            if method.body.is_none() && !method.modifiers.contains(MethodModifiers::ABSTRACT) {
                return Err(Error::InvalidOperation(format!(
                    "method '{}' on '{}' has no body",
                    method.name, builder.name
                )));
            }

            let vtable_slot = if method.modifiers.contains(MethodModifiers::VIRTUAL) {
                let overridden = if method.modifiers.contains(MethodModifiers::NEW_SLOT) {
                    None
                } else {
                    vtable[..inherited_slots].iter().position(|existing| {
                        existing.name == method.name && existing.signature == method.signature
                    })
                };

                match overridden {
                    Some(slot) if vtable[slot].modifiers.contains(MethodModifiers::FINAL) => {
                        return Err(Error::InvalidOperation(format!(
                            "method '{}' on '{}' overrides a sealed method",
                            method.name, builder.name
                        )));
                    }
                    Some(slot) => Some(slot),
                    None => Some(vtable.len()),
                }
            } else {
                None
            };

            let desc = Arc::new(MethodDesc {
                token: Token::method_def(self.next_method_row.fetch_add(1, Ordering::Relaxed)),
                name: method.name,
                declaring_type: token,
                signature: method.signature,
                modifiers: method.modifiers,
                access: method.access,
                entry_point: self.next_code_address(),
                vtable_slot,
                body: method.body,
            });

            if let Some(slot) = vtable_slot {
                if slot == vtable.len() {
                    vtable.push(desc.clone());
                } else {
                    vtable[slot] = desc.clone();
                }
            }
            declared.push(desc);
        }

        let methods: MethodList = Arc::new(boxcar::Vec::new());
        for desc in declared {
            self.methods.insert(desc.token, desc.clone());
            self.methods_by_address.insert(desc.entry_point, desc.clone());
            methods.push(desc);
        }

        let type_desc = Arc::new(TypeDesc {
            token,
            namespace: builder.namespace,
            name: builder.name,
            parent: parent.as_ref().map(|parent| parent.token),
            is_value_type: builder.is_value_type,
            fields,
            methods,
            vtable,
        });

        self.types.insert(token, type_desc.clone());
        vacant.insert(token);

        log::debug!(
            "registered type {} as {} ({} methods, {} vtable slots)",
            type_desc.full_name(),
            token,
            type_desc.methods.count(),
            type_desc.vtable.len()
        );
        Ok(type_desc)
    }

    /// Looks up a type by `namespace.name`
    #[must_use]
    pub fn get_by_fullname(&self, full_name: &str) -> Option<TypeDescRc> {
        let token = *self.types_by_fullname.get(full_name)?;
        self.types.get(&token).map(|entry| entry.value().clone())
    }

    /// Looks up a method by token
    #[must_use]
    pub fn method(&self, token: Token) -> Option<MethodDescRc> {
        self.methods.get(&token).map(|entry| entry.value().clone())
    }

    /// Number of registered types
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if no type is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn type_name(&self, token: Token) -> String {
        self.types
            .get(&token)
            .map(|entry| entry.value().full_name())
            .unwrap_or_else(|| token.to_string())
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MethodResolver for TypeRegistry {
    fn type_desc(&self, type_token: Token) -> Result<TypeDescRc> {
        self.types
            .get(&type_token)
            .map(|entry| entry.value().clone())
            .ok_or(Error::TypeNotFound(type_token))
    }

    fn resolve_method(&self, type_token: Token, lookup: &MethodLookup<'_>) -> Result<MethodDescRc> {
        let mut found: Vec<MethodDescRc> = Vec::new();
        let mut current = Some(type_token);

        while let Some(token) = current {
            let desc = self.type_desc(token)?;
            for (_, method) in desc.methods.iter() {
                if !lookup.matches(method) {
                    continue;
                }

                // hidden by a more derived declaration
                let hidden = found.iter().any(|visible| {
                    visible.name == method.name
                        && visible.signature.params == method.signature.params
                });
                if !hidden {
                    found.push(method.clone());
                }
            }

            if lookup.flags.contains(BindingFlags::DECLARED_ONLY) {
                break;
            }
            current = desc.parent;
        }

        match found.len() {
            0 => Err(Error::MethodNotFound {
                type_name: self.type_name(type_token),
                name: lookup.name.to_string(),
            }),
            1 => Ok(found.swap_remove(0)),
            _ => Err(Error::AmbiguousMatch {
                type_name: self.type_name(type_token),
                name: lookup.name.to_string(),
            }),
        }
    }

    fn method_by_address(&self, address: CodeAddress) -> Option<MethodDescRc> {
        self.methods_by_address
            .get(&address)
            .map(|entry| entry.value().clone())
    }

    fn vtable_entry(&self, type_token: Token, slot: usize) -> Result<MethodDescRc> {
        let desc = self.type_desc(type_token)?;
        desc.vtable
            .get(slot)
            .cloned()
            .ok_or_else(|| Error::MethodNotFound {
                type_name: desc.full_name(),
                name: format!("vtable slot {}", slot),
            })
    }

    fn shuffle_thunk(&self, arity: usize) -> CodeAddress {
        *self
            .shuffle_thunks
            .entry(arity)
            .or_insert_with(|| self.next_code_address())
    }

    fn virtual_dispatch_thunk(&self, slot: usize) -> CodeAddress {
        *self
            .dispatch_thunks
            .entry(slot)
            .or_insert_with(|| self.next_code_address())
    }

    fn is_assignable_to(&self, type_token: Token, base: Token) -> bool {
        let mut current = Some(type_token);
        while let Some(token) = current {
            if token == base {
                return true;
            }
            current = self
                .types
                .get(&token)
                .and_then(|entry| entry.value().parent);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{sample_registry, Recorder};

    #[test]
    fn test_registry_assigns_tokens_and_addresses() {
        let recorder = Recorder::new();
        let (registry, types) = sample_registry(&recorder);

        assert_eq!(types.animal.token.table(), Token::TYPE_DEF);
        assert!(types.dog.token > types.animal.token);

        let speak = registry
            .resolve_method(types.animal.token, &MethodLookup::instance("Speak"))
            .unwrap();
        assert!(speak.entry_point >= CODE_BASE);
        assert_eq!(
            registry.method_by_address(speak.entry_point).unwrap().token,
            speak.token
        );
        assert_eq!(registry.method(speak.token).unwrap().name, "Speak");
    }

    #[test]
    fn test_registry_duplicate_name() {
        let registry = TypeRegistry::new();
        let first = registry.register(TypeBuilder::class("Demo", "Thing")).unwrap();
        match registry.register(TypeBuilder::class("Demo", "Thing")) {
            Err(Error::TypeInsert(token)) => assert_eq!(token, first.token),
            other => panic!("unexpected {:?}", other.map(|t| t.token)),
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_missing_parent() {
        let registry = TypeRegistry::new();
        let missing = Token::type_def(0x42);
        assert!(matches!(
            registry.register(TypeBuilder::class("Demo", "Orphan").extends(missing)),
            Err(Error::TypeMissingParent(token)) if token == missing
        ));
        assert!(registry.get_by_fullname("Demo.Orphan").is_none());
    }

    #[test]
    fn test_registry_override_reuses_slot() {
        let recorder = Recorder::new();
        let (registry, types) = sample_registry(&recorder);

        let base_speak = registry
            .resolve_method(types.animal.token, &MethodLookup::instance("Speak"))
            .unwrap();
        let dog_speak = registry
            .resolve_method(types.dog.token, &MethodLookup::instance("Speak"))
            .unwrap();

        assert_eq!(base_speak.vtable_slot, dog_speak.vtable_slot);
        assert_eq!(dog_speak.declaring_type, types.dog.token);

        let slot = base_speak.vtable_slot.unwrap();
        assert_eq!(
            registry.vtable_entry(types.dog.token, slot).unwrap().token,
            dog_speak.token
        );
        assert_eq!(
            registry.vtable_entry(types.animal.token, slot).unwrap().token,
            base_speak.token
        );
    }

    #[test]
    fn test_registry_new_slot_does_not_override() {
        let signature = MethodSignature::void(Vec::new());
        let registry = TypeRegistry::new();
        let base = registry
            .register(TypeBuilder::class("Demo", "Base").method(
                MethodBuilder::new("Run", signature.clone())
                    .virtual_method()
                    .body(|_, _| Ok(Value::Void)),
            ))
            .unwrap();
        let derived = registry
            .register(
                TypeBuilder::class("Demo", "Derived").extends(base.token).method(
                    MethodBuilder::new("Run", signature)
                        .virtual_method()
                        .new_slot()
                        .body(|_, _| Ok(Value::Void)),
                ),
            )
            .unwrap();

        assert_eq!(base.vtable.len(), 1);
        assert_eq!(derived.vtable.len(), 2);
        assert_eq!(derived.vtable[0].declaring_type, base.token);
    }

    #[test]
    fn test_registry_sealed_override_rejected() {
        let signature = MethodSignature::void(Vec::new());
        let registry = TypeRegistry::new();
        let base = registry
            .register(TypeBuilder::class("Demo", "Sealed").method(
                MethodBuilder::new("Run", signature.clone())
                    .virtual_method()
                    .sealed()
                    .body(|_, _| Ok(Value::Void)),
            ))
            .unwrap();

        let result = registry.register(
            TypeBuilder::class("Demo", "Breaker").extends(base.token).method(
                MethodBuilder::new("Run", signature)
                    .virtual_method()
                    .body(|_, _| Ok(Value::Void)),
            ),
        );
        assert!(matches!(result, Err(Error::InvalidOperation(_))));
    }

    #[test]
    fn test_registry_method_without_body_rejected() {
        let registry = TypeRegistry::new();
        let result = registry.register(
            TypeBuilder::class("Demo", "Empty")
                .method(MethodBuilder::new("Run", MethodSignature::void(Vec::new()))),
        );
        assert!(matches!(result, Err(Error::InvalidOperation(_))));
    }

    #[test]
    fn test_resolve_not_found_and_ambiguous() {
        let registry = TypeRegistry::new();
        let desc = registry
            .register(
                TypeBuilder::class("Demo", "Overloads")
                    .method(
                        MethodBuilder::new("Parse", MethodSignature::void([ValueKind::I32]))
                            .static_method()
                            .body(|_, _| Ok(Value::Void)),
                    )
                    .method(
                        MethodBuilder::new("Parse", MethodSignature::void([ValueKind::String]))
                            .static_method()
                            .body(|_, _| Ok(Value::Void)),
                    ),
            )
            .unwrap();

        assert!(matches!(
            registry.resolve_method(desc.token, &MethodLookup::static_method("Missing")),
            Err(Error::MethodNotFound { .. })
        ));
        assert!(matches!(
            registry.resolve_method(desc.token, &MethodLookup::static_method("Parse")),
            Err(Error::AmbiguousMatch { .. })
        ));

        let by_string = MethodSignature::void([ValueKind::String]);
        let resolved = registry
            .resolve_method(
                desc.token,
                &MethodLookup::static_method("Parse").with_signature(&by_string),
            )
            .unwrap();
        assert_eq!(resolved.signature.params, vec![ValueKind::String]);
    }

    #[test]
    fn test_resolve_declared_only() {
        let recorder = Recorder::new();
        let (registry, types) = sample_registry(&recorder);

        let mut lookup = MethodLookup::instance("Describe");
        assert!(registry.resolve_method(types.dog.token, &lookup).is_ok());

        lookup.flags |= BindingFlags::DECLARED_ONLY;
        assert!(registry.resolve_method(types.dog.token, &lookup).is_err());
    }

    #[test]
    fn test_thunks_are_shared_and_distinct() {
        let registry = TypeRegistry::new();
        let one = registry.shuffle_thunk(1);
        assert_eq!(one, registry.shuffle_thunk(1));
        assert_ne!(one, registry.shuffle_thunk(2));
        assert_ne!(one, registry.virtual_dispatch_thunk(0));
        assert_eq!(
            registry.virtual_dispatch_thunk(3),
            registry.virtual_dispatch_thunk(3)
        );
    }

    #[test]
    fn test_is_assignable_to() {
        let recorder = Recorder::new();
        let (registry, types) = sample_registry(&recorder);

        assert!(registry.is_assignable_to(types.dog.token, types.animal.token));
        assert!(registry.is_assignable_to(types.animal.token, types.animal.token));
        assert!(!registry.is_assignable_to(types.animal.token, types.dog.token));
        assert!(!registry.is_assignable_to(types.math.token, types.animal.token));
    }

    #[test]
    fn test_fields_inherit_in_order() {
        let registry = TypeRegistry::new();
        let base = registry
            .register(TypeBuilder::class("Demo", "Point2").field("x", ValueKind::I32))
            .unwrap();
        let derived = registry
            .register(
                TypeBuilder::class("Demo", "Point3")
                    .extends(base.token)
                    .field("z", ValueKind::F64),
            )
            .unwrap();

        let names: Vec<&str> = derived.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["x", "z"]);
        assert_eq!(
            derived.default_fields(),
            vec![Value::I32(0), Value::F64(0.0)]
        );
        assert_eq!(derived.full_name(), "Demo.Point3");
    }
}
