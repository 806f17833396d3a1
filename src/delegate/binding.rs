//! Single callable bindings.
//!
//! A [`Delegate`] pairs a [`DelegateType`](crate::delegate::DelegateType) with one
//! resolved callable. Everything that depends on metadata (method lookup, signature
//! compatibility, receiver type checks, override resolution for closed virtual calls)
//! happens at bind time. Invocation only matches on [`Dispatch`] and, for virtual
//! bindings, reads one vtable entry of the receiver's type.
//!
//! # Code Addresses
//!
//! Each binding carries the `(target, method_ptr, method_ptr_aux)` triple its
//! equality is defined over:
//!
//! | Dispatch | `method_ptr` | `method_ptr_aux` |
//! |----------|--------------|------------------|
//! | Closed | entry point | `0` |
//! | Static | entry point | `0` |
//! | OpenInstance | shuffle thunk for the delegate arity | entry point |
//! | Virtual | shuffle thunk for the delegate arity | dispatch thunk for the slot |
//! | Unmanaged | native address | `0` |

use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use crate::{
    delegate::types::{
        BindOptions, DelegateBindingFlags, DelegateTypeRc, DispatchKind, NativeFunction,
    },
    metadata::{
        method::{CodeAddress, MethodDescRc},
        resolver::MethodLookup,
        signature::{MethodSignature, ValueKind},
        token::Token,
    },
    runtime::{value::mix64, RuntimeContext, Value},
    Error, Result,
};

/// A reference to a `Delegate`
pub type DelegateRc = Arc<Delegate>;

/// How a [`Delegate`] reaches its code.
#[derive(Clone, Debug)]
pub enum Dispatch {
    /// `target` is passed ahead of the invocation arguments. For instance methods it
    /// is the receiver; for static methods it fills the first parameter.
    Closed {
        /// Captured receiver or first argument
        target: Value,
        /// Method called, already resolved through the receiver's vtable
        method: MethodDescRc,
    },
    /// Arguments are passed through unchanged
    Static {
        /// Method called
        method: MethodDescRc,
    },
    /// The first invocation argument is the receiver
    OpenInstance {
        /// Method called
        method: MethodDescRc,
    },
    /// The first invocation argument is the receiver, and the implementation is the
    /// entry in `slot` of the receiver type's vtable
    Virtual {
        /// Vtable slot dispatched through
        slot: usize,
        /// The virtual method that was bound
        method: MethodDescRc,
    },
    /// A native function called with the invocation arguments
    Unmanaged {
        /// The native function
        function: NativeFunction,
    },
}

impl Dispatch {
    /// The variant tag
    #[must_use]
    pub fn kind(&self) -> DispatchKind {
        match self {
            Dispatch::Closed { .. } => DispatchKind::Closed,
            Dispatch::Static { .. } => DispatchKind::Static,
            Dispatch::OpenInstance { .. } => DispatchKind::OpenInstance,
            Dispatch::Virtual { .. } => DispatchKind::Virtual,
            Dispatch::Unmanaged { .. } => DispatchKind::Unmanaged,
        }
    }
}

fn bind_failure(method: &str, reason: impl Into<String>, throw: bool) -> Result<Option<Delegate>> {
    if throw {
        Err(Error::DelegateBind {
            method: method.to_string(),
            reason: reason.into(),
        })
    } else {
        Ok(None)
    }
}

// `shape` with its first parameter removed
fn drop_first_param(shape: &MethodSignature) -> MethodSignature {
    MethodSignature::new(shape.return_kind, shape.params[1..].to_vec())
}

/// A callable bound to a delegate type.
///
/// Immutable once constructed. Cloning a `Delegate` produces an equal binding;
/// multicast lists share bindings through [`DelegateRc`].
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use dotcorelib::delegate::{Delegate, DelegateType, NativeFunction};
/// use dotcorelib::metadata::{signature::{MethodSignature, ValueKind}, token::Token};
/// use dotcorelib::runtime::{RuntimeContext, Value};
///
/// let ctx = RuntimeContext::new()?;
/// let square_type = Arc::new(DelegateType::new(
///     Token::type_def(0x100),
///     "Square",
///     MethodSignature::new(ValueKind::I32, [ValueKind::I32]),
/// ));
/// let square = Delegate::from_native(
///     &square_type,
///     NativeFunction::new(0x7000_0000, |args| match args {
///         [Value::I32(v)] => Ok(Value::I32(v * v)),
///         _ => Ok(Value::Void),
///     }),
/// );
/// assert_eq!(square.invoke(&ctx, &[Value::I32(9)])?, Value::I32(81));
/// # Ok::<(), dotcorelib::Error>(())
/// ```
#[derive(Clone)]
pub struct Delegate {
    delegate_type: DelegateTypeRc,
    method_ptr: CodeAddress,
    method_ptr_aux: CodeAddress,
    dispatch: Dispatch,
}

impl Delegate {
    /// Binds the instance method `name` of `target`'s runtime type, closed over `target`.
    ///
    /// The method is looked up on the receiver's type and its parents, restricted to
    /// methods whose signature the delegate type can call.
    ///
    /// # Errors
    ///
    /// - [`Error::ArgumentNull`] if `target` is null
    /// - [`Error::DelegateBind`] if no single compatible method exists and
    ///   `options.throw_on_bind_failure` is set; `Ok(None)` otherwise
    /// - [`Error::InvalidHeapReference`] if `target` is not a live object
    pub fn bind(
        ctx: &RuntimeContext,
        delegate_type: &DelegateTypeRc,
        target: &Value,
        name: &str,
        options: BindOptions,
    ) -> Result<Option<Delegate>> {
        let throw = options.throw_on_bind_failure;
        let flags = options.flags(false);
        let receiver = match target {
            Value::ObjectRef(receiver) => *receiver,
            Value::Null => return Err(Error::ArgumentNull("target")),
            other => {
                return bind_failure(
                    name,
                    format!("a target of kind {} has no instance methods", other.kind()),
                    throw,
                )
            }
        };

        let type_token = ctx.heap().type_of(receiver)?;
        let lookup = MethodLookup::instance(name)
            .with_signature(&delegate_type.signature)
            .ignore_case(flags.contains(DelegateBindingFlags::CASE_INSENSITIVE));
        let method = match ctx.resolver().resolve_method(type_token, &lookup) {
            Ok(method) => method,
            Err(error @ (Error::MethodNotFound { .. } | Error::AmbiguousMatch { .. })) => {
                return bind_failure(name, error.to_string(), throw)
            }
            Err(error) => return Err(error),
        };

        Self::bind_method(
            ctx,
            delegate_type,
            Some(target.clone()),
            &method,
            flags,
            throw,
        )
    }

    /// Binds the static method `name` declared on `target_type` or its parents.
    ///
    /// # Errors
    ///
    /// - [`Error::TypeNotFound`] if `target_type` is not registered
    /// - [`Error::DelegateBind`] if no single compatible method exists and
    ///   `options.throw_on_bind_failure` is set; `Ok(None)` otherwise
    pub fn bind_static(
        ctx: &RuntimeContext,
        delegate_type: &DelegateTypeRc,
        target_type: Token,
        name: &str,
        options: BindOptions,
    ) -> Result<Option<Delegate>> {
        let throw = options.throw_on_bind_failure;
        let flags = options.flags(true);
        let lookup = MethodLookup::static_method(name)
            .with_signature(&delegate_type.signature)
            .ignore_case(flags.contains(DelegateBindingFlags::CASE_INSENSITIVE));
        let method = match ctx.resolver().resolve_method(target_type, &lookup) {
            Ok(method) => method,
            Err(error @ (Error::MethodNotFound { .. } | Error::AmbiguousMatch { .. })) => {
                return bind_failure(name, error.to_string(), throw)
            }
            Err(error) => return Err(error),
        };

        Self::bind_method(ctx, delegate_type, None, &method, flags, throw)
    }

    /// Binds an already resolved method.
    ///
    /// The dispatch variant follows from the method and `first_argument`:
    ///
    /// - instance method with a first argument: closed over it as the receiver
    /// - instance method without: open, or virtual if the method can be overridden;
    ///   the delegate's first parameter must be an `Object` receiver slot
    /// - static method taking one more parameter than the delegate, with a first
    ///   argument: closed over it as the first parameter (null is allowed for
    ///   reference parameters)
    /// - static method with the delegate's parameters: static
    ///
    /// Instance methods are never closed over null.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DelegateBind`] if no variant fits and `throw_on_bind_failure`
    /// is set (`Ok(None)` otherwise), and [`Error::InvalidHeapReference`] for a dead
    /// receiver.
    pub fn from_method(
        ctx: &RuntimeContext,
        delegate_type: &DelegateTypeRc,
        first_argument: Option<Value>,
        method: &MethodDescRc,
        throw_on_bind_failure: bool,
    ) -> Result<Option<Delegate>> {
        Self::bind_method(
            ctx,
            delegate_type,
            first_argument,
            method,
            DelegateBindingFlags::empty(),
            throw_on_bind_failure,
        )
    }

    /// Binds an unmanaged function pointer
    #[must_use]
    pub fn from_native(delegate_type: &DelegateTypeRc, function: NativeFunction) -> Delegate {
        Delegate {
            delegate_type: delegate_type.clone(),
            method_ptr: function.address(),
            method_ptr_aux: 0,
            dispatch: Dispatch::Unmanaged { function },
        }
    }

    fn bind_method(
        ctx: &RuntimeContext,
        delegate_type: &DelegateTypeRc,
        first_argument: Option<Value>,
        method: &MethodDescRc,
        flags: DelegateBindingFlags,
        throw: bool,
    ) -> Result<Option<Delegate>> {
        if method.is_static() {
            if flags.contains(DelegateBindingFlags::INSTANCE_METHOD_ONLY) {
                return bind_failure(&method.name, "static methods cannot bind here", throw);
            }
            Self::bind_static_method(delegate_type, first_argument, method, throw)
        } else {
            if flags.contains(DelegateBindingFlags::STATIC_METHOD_ONLY) {
                return bind_failure(&method.name, "instance methods cannot bind here", throw);
            }
            match first_argument {
                Some(target) => Self::bind_closed_instance(ctx, delegate_type, target, method, throw),
                None if flags.contains(DelegateBindingFlags::CLOSED_DELEGATE_ONLY) => {
                    bind_failure(&method.name, "a receiver is required", throw)
                }
                None => Self::bind_open_instance(ctx, delegate_type, method, throw),
            }
        }
    }

    fn bind_closed_instance(
        ctx: &RuntimeContext,
        delegate_type: &DelegateTypeRc,
        target: Value,
        method: &MethodDescRc,
        throw: bool,
    ) -> Result<Option<Delegate>> {
        let shape = &delegate_type.signature;
        if !shape.is_bindable_to(&method.signature.params, method.signature.return_kind) {
            return bind_failure(
                &method.name,
                format!("{} cannot call {}", shape, method.signature),
                throw,
            );
        }

        let receiver = match &target {
            Value::ObjectRef(receiver) => *receiver,
            Value::Null => {
                return bind_failure(&method.name, "cannot close over a null receiver", throw)
            }
            other => {
                return bind_failure(
                    &method.name,
                    format!("a receiver of kind {} is not an object", other.kind()),
                    throw,
                )
            }
        };

        let resolver = ctx.resolver();
        let receiver_type = ctx.heap().type_of(receiver)?;
        if !resolver.is_assignable_to(receiver_type, method.declaring_type) {
            return bind_failure(
                &method.name,
                format!(
                    "receiver type {} does not derive from {}",
                    receiver_type, method.declaring_type
                ),
                throw,
            );
        }

        let bound = match resolver.virtual_slot(method) {
            Some(slot) if method.is_overridable() => resolver.vtable_entry(receiver_type, slot)?,
            _ => method.clone(),
        };
        if bound.is_abstract() {
            return bind_failure(&method.name, "the receiver's implementation is abstract", throw);
        }

        Ok(Some(Delegate {
            delegate_type: delegate_type.clone(),
            method_ptr: bound.entry_point,
            method_ptr_aux: 0,
            dispatch: Dispatch::Closed {
                target,
                method: bound,
            },
        }))
    }

    fn bind_open_instance(
        ctx: &RuntimeContext,
        delegate_type: &DelegateTypeRc,
        method: &MethodDescRc,
        throw: bool,
    ) -> Result<Option<Delegate>> {
        let shape = &delegate_type.signature;
        let receiver_slot = shape.params.first().copied();
        if receiver_slot != Some(ValueKind::Object)
            || !drop_first_param(shape)
                .is_bindable_to(&method.signature.params, method.signature.return_kind)
        {
            return bind_failure(
                &method.name,
                format!("{} cannot call {} with an explicit receiver", shape, method.signature),
                throw,
            );
        }

        let resolver = ctx.resolver();
        let method_ptr = resolver.shuffle_thunk(shape.arity());
        let (method_ptr_aux, dispatch) = match resolver.virtual_slot(method) {
            Some(slot) if method.is_overridable() => (
                resolver.virtual_dispatch_thunk(slot),
                Dispatch::Virtual {
                    slot,
                    method: method.clone(),
                },
            ),
            _ => (
                method.entry_point,
                Dispatch::OpenInstance {
                    method: method.clone(),
                },
            ),
        };

        Ok(Some(Delegate {
            delegate_type: delegate_type.clone(),
            method_ptr,
            method_ptr_aux,
            dispatch,
        }))
    }

    fn bind_static_method(
        delegate_type: &DelegateTypeRc,
        first_argument: Option<Value>,
        method: &MethodDescRc,
        throw: bool,
    ) -> Result<Option<Delegate>> {
        let shape = &delegate_type.signature;
        let params = &method.signature.params;

        let dispatch = match first_argument {
            Some(argument) if params.len() == shape.arity() + 1 => {
                if !params[0].accepts(&argument) {
                    return bind_failure(
                        &method.name,
                        format!(
                            "first argument of kind {} cannot be passed as {}",
                            argument.kind(),
                            params[0]
                        ),
                        throw,
                    );
                }
                if !shape.is_bindable_to(&params[1..], method.signature.return_kind) {
                    return bind_failure(
                        &method.name,
                        format!("{} cannot call {} after its first argument", shape, method.signature),
                        throw,
                    );
                }
                Dispatch::Closed {
                    target: argument,
                    method: method.clone(),
                }
            }
            Some(argument) if !argument.is_null() => {
                return bind_failure(
                    &method.name,
                    "the method has no parameter left for the first argument",
                    throw,
                );
            }
            _ => {
                if !shape.is_bindable_to(params, method.signature.return_kind) {
                    return bind_failure(
                        &method.name,
                        format!("{} cannot call {}", shape, method.signature),
                        throw,
                    );
                }
                Dispatch::Static {
                    method: method.clone(),
                }
            }
        };

        Ok(Some(Delegate {
            delegate_type: delegate_type.clone(),
            method_ptr: method.entry_point,
            method_ptr_aux: 0,
            dispatch,
        }))
    }

    /// Calls the bound callable.
    ///
    /// Returns [`Value::Void`] for void methods.
    ///
    /// # Errors
    ///
    /// - [`Error::ParameterCount`] or [`Error::Argument`] if `args` does not match the
    ///   delegate type's signature
    /// - [`Error::NullReference`] if an open or virtual binding receives a null receiver
    /// - any error returned by the callee
    pub fn invoke(&self, ctx: &RuntimeContext, args: &[Value]) -> Result<Value> {
        self.delegate_type.signature.check_arguments(args)?;

        match &self.dispatch {
            Dispatch::Closed { target, method } => {
                let mut call_args = Vec::with_capacity(args.len() + 1);
                call_args.push(target.clone());
                call_args.extend_from_slice(args);
                method.call(ctx, &call_args)
            }
            Dispatch::Static { method } => method.call(ctx, args),
            Dispatch::OpenInstance { method } => match args.first() {
                Some(Value::Null) | None => Err(Error::NullReference),
                Some(_) => method.call(ctx, args),
            },
            Dispatch::Virtual { slot, method } => {
                let implementation = match args.first() {
                    Some(Value::ObjectRef(receiver)) => {
                        let receiver_type = ctx.heap().type_of(*receiver)?;
                        ctx.resolver().vtable_entry(receiver_type, *slot)?
                    }
                    Some(Value::Null) | None => return Err(Error::NullReference),
                    Some(_) => method.clone(),
                };
                implementation.call(ctx, args)
            }
            Dispatch::Unmanaged { function } => function.call(args),
        }
    }

    /// The delegate type this binding was created for
    #[must_use]
    pub fn delegate_type(&self) -> &DelegateTypeRc {
        &self.delegate_type
    }

    /// The dispatch variant and its data
    #[must_use]
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// The dispatch variant tag
    #[must_use]
    pub fn dispatch_kind(&self) -> DispatchKind {
        self.dispatch.kind()
    }

    /// The bound method; `None` for unmanaged bindings.
    ///
    /// For virtual bindings this is the method that was bound, not the override that
    /// a particular receiver will run.
    #[must_use]
    pub fn method(&self) -> Option<&MethodDescRc> {
        match &self.dispatch {
            Dispatch::Closed { method, .. }
            | Dispatch::Static { method }
            | Dispatch::OpenInstance { method }
            | Dispatch::Virtual { method, .. } => Some(method),
            Dispatch::Unmanaged { .. } => None,
        }
    }

    /// The captured receiver or first argument of a closed binding
    #[must_use]
    pub fn target(&self) -> Option<&Value> {
        match &self.dispatch {
            Dispatch::Closed { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Primary code address
    #[must_use]
    pub fn method_ptr(&self) -> CodeAddress {
        self.method_ptr
    }

    /// Secondary code address; `0` for closed, static and unmanaged bindings
    #[must_use]
    pub fn method_ptr_aux(&self) -> CodeAddress {
        self.method_ptr_aux
    }

    fn same_target(&self, other: &Delegate) -> bool {
        match (self.target(), other.target()) {
            (Some(a), Some(b)) => a.identity_eq(b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Returns true if both bindings have the identical target and code addresses.
    ///
    /// Stricter than `==`, which also accepts bindings of the same method reached
    /// through different addresses. A native function never matches a managed
    /// binding, even at the same address.
    #[must_use]
    pub fn same_binding(&self, other: &Delegate) -> bool {
        self.is_unmanaged() == other.is_unmanaged()
            && self.method_ptr == other.method_ptr
            && self.method_ptr_aux == other.method_ptr_aux
            && self.same_target(other)
    }

    fn is_unmanaged(&self) -> bool {
        matches!(self.dispatch, Dispatch::Unmanaged { .. })
    }

    fn same_method(&self, other: &Delegate) -> bool {
        match (self.method(), other.method()) {
            (Some(a), Some(b)) => a.token == b.token,
            _ => false,
        }
    }

    /// Hash consistent with `==`.
    ///
    /// Closed, static and unmanaged bindings mix the target identity (or the native
    /// address) with the delegate type; open and virtual bindings hash the delegate
    /// type alone.
    #[must_use]
    pub fn hash_code(&self) -> u64 {
        let type_hash = mix64(u64::from(self.delegate_type.token.value()));
        match &self.dispatch {
            Dispatch::Unmanaged { .. } => {
                mix64(self.method_ptr as u64 ^ (self.method_ptr_aux as u64).rotate_left(32))
                    .wrapping_add(type_hash)
            }
            _ if self.method_ptr_aux == 0 => self
                .target()
                .map_or(0, Value::identity_hash)
                .wrapping_mul(33)
                .wrapping_add(type_hash),
            _ => type_hash,
        }
    }
}

impl PartialEq for Delegate {
    fn eq(&self, other: &Self) -> bool {
        if *self.delegate_type != *other.delegate_type {
            return false;
        }
        if self.same_binding(other) {
            return true;
        }

        if self.method_ptr_aux == 0 {
            if other.method_ptr_aux != 0 || !self.same_target(other) {
                return false;
            }
        } else {
            if other.method_ptr_aux == 0 {
                return false;
            }
            if self.method_ptr_aux == other.method_ptr_aux {
                return true;
            }
        }

        // shared thunks can hide the same method behind different addresses
        self.same_method(other)
    }
}

impl Eq for Delegate {}

impl Hash for Delegate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_code());
    }
}

impl fmt::Debug for Delegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegate")
            .field("delegate_type", &self.delegate_type.name)
            .field("dispatch", &self.dispatch_kind())
            .field("method_ptr", &format_args!("0x{:x}", self.method_ptr))
            .field("method_ptr_aux", &format_args!("0x{:x}", self.method_ptr_aux))
            .field("target", &self.target())
            .finish()
    }
}

impl fmt::Display for Delegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.method() {
            Some(method) => write!(
                f,
                "{} -> {} ({})",
                self.delegate_type,
                method.name,
                self.dispatch_kind()
            ),
            None => write!(f, "{} -> native 0x{:x}", self.delegate_type, self.method_ptr),
        }
    }
}
