//! Process-wide application context.
//!
//! [`AppContext`] holds the state that managed code reaches through
//! `System.AppContext`: named feature switches, an untyped data store, and the
//! `ProcessExit` event. It is owned by a [`RuntimeContext`] rather than being a
//! global, so independent runtimes in one process never observe each other.
//!
//! # Events
//!
//! `ProcessExit` subscribers are stored as a single [`MulticastDelegate`].
//! Subscribing and unsubscribing replace it with the result of
//! [`MulticastDelegate::combine`] and [`MulticastDelegate::remove`], so handlers run
//! in subscription order and removing an unknown handler is a no-op.
//!
//! # Examples
//!
//! ```rust
//! use dotcorelib::runtime::{RuntimeConfig, RuntimeContextBuilder, Value};
//!
//! let ctx = RuntimeContextBuilder::new()
//!     .config(RuntimeConfig::deterministic(1).with_switch("Feature.Enabled", true))
//!     .build()?;
//!
//! assert_eq!(ctx.app_context().try_get_switch("Feature.Enabled"), Some(true));
//! ctx.app_context().set_data("Answer", Value::I32(42));
//! assert_eq!(ctx.app_context().get_data("Answer"), Some(Value::I32(42)));
//! # Ok::<(), dotcorelib::Error>(())
//! ```

use std::sync::RwLock;

use dashmap::DashMap;

use crate::{
    delegate::{DelegateRc, MulticastDelegate},
    runtime::{RuntimeContext, Value},
    Result,
};

/// Switches, data and the `ProcessExit` event of one runtime.
pub struct AppContext {
    switches: DashMap<String, bool>,
    data: DashMap<String, Value>,
    process_exit: RwLock<Option<MulticastDelegate>>,
}

impl AppContext {
    /// Creates an empty application context
    #[must_use]
    pub fn new() -> Self {
        AppContext {
            switches: DashMap::new(),
            data: DashMap::new(),
            process_exit: RwLock::new(None),
        }
    }

    /// Sets a feature switch
    pub fn set_switch(&self, name: impl Into<String>, enabled: bool) {
        self.switches.insert(name.into(), enabled);
    }

    /// Returns the switch value, or `None` if it was never set
    #[must_use]
    pub fn try_get_switch(&self, name: &str) -> Option<bool> {
        self.switches.get(name).map(|entry| *entry.value())
    }

    /// Stores a value under `name`, replacing any previous value
    pub fn set_data(&self, name: impl Into<String>, value: Value) {
        self.data.insert(name.into(), value);
    }

    /// Returns the value stored under `name`
    #[must_use]
    pub fn get_data(&self, name: &str) -> Option<Value> {
        self.data.get(name).map(|entry| entry.value().clone())
    }

    /// Subscribes a handler to `ProcessExit`.
    ///
    /// Handlers are invoked with two null arguments (sender and event args).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Argument`] if the handler does not take two reference
    /// arguments and [`crate::Error::DelegateTypeMismatch`] if it has a different
    /// delegate type than the handlers already subscribed.
    pub fn add_process_exit(&self, handler: &MulticastDelegate) -> Result<()> {
        let signature = &handler.delegate_type().signature;
        if signature.arity() != 2 || !signature.params.iter().all(|kind| kind.is_reference()) {
            return Err(argument_error!(
                "ProcessExit handlers take (sender, args), found {}",
                signature
            ));
        }

        let mut current = write_lock!(self.process_exit);
        *current = MulticastDelegate::combine(current.as_ref(), Some(handler))?;
        Ok(())
    }

    /// Unsubscribes the last subscription of `handler` from `ProcessExit`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DelegateTypeMismatch`] if the handler's delegate type
    /// differs from the subscribed handlers.
    pub fn remove_process_exit(&self, handler: &MulticastDelegate) -> Result<()> {
        let mut current = write_lock!(self.process_exit);
        *current = MulticastDelegate::remove(current.as_ref(), Some(handler))?;
        Ok(())
    }

    /// Snapshot of the current `ProcessExit` subscribers
    #[must_use]
    pub fn process_exit_handlers(&self) -> Vec<DelegateRc> {
        read_lock!(self.process_exit)
            .as_ref()
            .map(MulticastDelegate::invocation_list)
            .unwrap_or_default()
    }

    /// Invokes every `ProcessExit` subscriber in order.
    ///
    /// The subscriber list is captured before invocation, so handlers may
    /// unsubscribe themselves without affecting this raise.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first handler error.
    pub fn raise_process_exit(&self, ctx: &RuntimeContext) -> Result<()> {
        let handlers = read_lock!(self.process_exit).clone();
        if let Some(handlers) = handlers {
            handlers.invoke(ctx, &[Value::Null, Value::Null])?;
        }
        Ok(())
    }
}

impl Default for AppContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        delegate::Delegate,
        test::{event_handler_type, sample_context, unary_int_type},
        Error,
    };

    #[test]
    fn test_switches_and_data() {
        let app = AppContext::new();
        assert_eq!(app.try_get_switch("Missing"), None);

        app.set_switch("Flag", true);
        app.set_switch("Flag", false);
        assert_eq!(app.try_get_switch("Flag"), Some(false));

        app.set_data("Key", Value::string("v"));
        assert_eq!(app.get_data("Key"), Some(Value::string("v")));
        assert_eq!(app.get_data("Other"), None);
    }

    #[test]
    fn test_process_exit_order_and_removal() {
        let fixture = sample_context();
        let ctx = &fixture.ctx;
        let handler_type = event_handler_type();

        let first = MulticastDelegate::from(
            Delegate::from_method(ctx, &handler_type, None, &fixture.on_exit_a, true)
                .unwrap()
                .unwrap(),
        );
        let second = MulticastDelegate::from(
            Delegate::from_method(ctx, &handler_type, None, &fixture.on_exit_b, true)
                .unwrap()
                .unwrap(),
        );

        ctx.app_context().add_process_exit(&first).unwrap();
        ctx.app_context().add_process_exit(&second).unwrap();
        ctx.app_context().add_process_exit(&first).unwrap();
        assert_eq!(ctx.app_context().process_exit_handlers().len(), 3);

        ctx.app_context().remove_process_exit(&first).unwrap();
        ctx.app_context().raise_process_exit(ctx).unwrap();
        assert_eq!(fixture.recorder.take(), vec!["exit-a", "exit-b"]);
    }

    #[test]
    fn test_process_exit_rejects_wrong_shape() {
        let fixture = sample_context();
        let ctx = &fixture.ctx;

        let unary = MulticastDelegate::from(
            Delegate::from_method(ctx, &unary_int_type(), None, &fixture.negate, true)
                .unwrap()
                .unwrap(),
        );
        assert!(matches!(
            ctx.app_context().add_process_exit(&unary),
            Err(Error::Argument(_))
        ));
        assert!(ctx.app_context().process_exit_handlers().is_empty());
    }

    #[test]
    fn test_raise_without_handlers() {
        let fixture = sample_context();
        assert!(fixture
            .ctx
            .app_context()
            .raise_process_exit(&fixture.ctx)
            .is_ok());
    }
}
