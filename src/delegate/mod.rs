//! Delegates: typed, invocable references to methods.
//!
//! A [`Delegate`] is one binding of a method to a [`DelegateType`]. How it dispatches
//! is fixed when it is bound and described by [`Dispatch`]:
//!
//! - **Closed** - a receiver (or, for a static method, the first argument) is captured
//! - **Static** - a static method called with exactly the invocation arguments
//! - **OpenInstance** - the first invocation argument is the receiver
//! - **Virtual** - as open, but the implementation is looked up in the receiver's vtable
//! - **Unmanaged** - a [`NativeFunction`]
//!
//! [`MulticastDelegate`] chains bindings into an immutable invocation list with
//! `combine`/`remove` semantics.
//!
//! # Binding
//!
//! Methods bind by name against a receiver ([`Delegate::bind`]) or a type
//! ([`Delegate::bind_static`]), or directly from a resolved
//! [`MethodDesc`](crate::metadata::method::MethodDesc) ([`Delegate::from_method`]).
//! Name-based binding is controlled by [`BindOptions`]; a failure is either an
//! [`Error::DelegateBind`](crate::Error::DelegateBind) or `Ok(None)`.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use dotcorelib::prelude::*;
//!
//! let registry = Arc::new(TypeRegistry::new());
//! let dog = registry.register(TypeBuilder::class("Zoo", "Dog").method(
//!     MethodBuilder::new("Speak", MethodSignature::new(ValueKind::String, Vec::new()))
//!         .virtual_method()
//!         .body(|_, _| Ok(Value::string("Woof"))),
//! ))?;
//! let ctx = RuntimeContextBuilder::new().resolver(registry).build()?;
//!
//! let func_of_string = Arc::new(DelegateType::new(
//!     Token::type_def(0x100),
//!     "System.Func<string>",
//!     MethodSignature::new(ValueKind::String, Vec::new()),
//! ));
//! let receiver = Value::ObjectRef(ctx.new_object(dog.token)?);
//! let speak = Delegate::bind(&ctx, &func_of_string, &receiver, "Speak", BindOptions::new())?
//!     .unwrap();
//! assert_eq!(speak.invoke(&ctx, &[])?, Value::string("Woof"));
//! # Ok::<(), dotcorelib::Error>(())
//! ```

mod binding;
mod multicast;
mod types;

pub use binding::{Delegate, DelegateRc, Dispatch};
pub use multicast::{InvocationList, MulticastDelegate};
pub use types::{
    BindOptions, DelegateBindingFlags, DelegateType, DelegateTypeRc, DispatchKind, NativeBody,
    NativeFunction,
};
