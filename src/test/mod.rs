//! Shared fixtures for unit tests.
//!
//! [`sample_registry`] registers a small type system:
//!
//! - `Zoo.Animal` with a `Name` field, virtual `Speak`, and non-virtual `Describe`/`Rename`
//! - `Zoo.Dog` and `Zoo.Cat` overriding `Speak`
//! - `Zoo.Math` with static `Negate` and `Add`
//! - `Zoo.Events` with static `ProcessExit` handlers
//!
//! Every body pushes a marker onto a [`Recorder`] so tests can assert invocation order.

use std::sync::{Arc, Mutex};

use crate::{
    delegate::{DelegateType, DelegateTypeRc},
    metadata::{
        method::MethodDescRc,
        registry::{MethodBuilder, TypeBuilder, TypeDescRc, TypeRegistry},
        resolver::{MethodLookup, MethodResolver},
        signature::{MethodSignature, ValueKind},
        token::Token,
    },
    runtime::{RuntimeConfig, RuntimeContext, RuntimeContextBuilder, Value},
};

/// Collects markers pushed by method bodies
#[derive(Clone, Default)]
pub(crate) struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, marker: impl Into<String>) {
        self.0.lock().unwrap().push(marker.into());
    }

    /// Returns the markers recorded so far and clears them
    pub(crate) fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

pub(crate) struct SampleTypes {
    pub(crate) animal: TypeDescRc,
    pub(crate) dog: TypeDescRc,
    pub(crate) cat: TypeDescRc,
    pub(crate) math: TypeDescRc,
    pub(crate) events: TypeDescRc,
}

fn recording(
    builder: MethodBuilder,
    recorder: &Recorder,
    marker: &'static str,
    result: Value,
) -> MethodBuilder {
    let recorder = recorder.clone();
    builder.body(move |_, _| {
        recorder.push(marker);
        Ok(result.clone())
    })
}

pub(crate) fn sample_registry(recorder: &Recorder) -> (Arc<TypeRegistry>, SampleTypes) {
    let registry = Arc::new(TypeRegistry::new());
    let speak = MethodSignature::new(ValueKind::String, Vec::new());

    let animal = registry
        .register(
            TypeBuilder::class("Zoo", "Animal")
                .field("Name", ValueKind::String)
                .method(recording(
                    MethodBuilder::new("Speak", speak.clone()).virtual_method(),
                    recorder,
                    "animal-speak",
                    Value::string("..."),
                ))
                .method(recording(
                    MethodBuilder::new("Describe", MethodSignature::void(Vec::new())),
                    recorder,
                    "describe",
                    Value::Void,
                ))
                .method(
                    MethodBuilder::new("Rename", MethodSignature::void([ValueKind::String])).body(
                        |ctx, args| match args {
                            [Value::ObjectRef(receiver), name] => {
                                ctx.heap().set_field(*receiver, 0, name.clone())?;
                                Ok(Value::Void)
                            }
                            _ => Err(crate::Error::NullReference),
                        },
                    ),
                ),
        )
        .unwrap();

    let dog = registry
        .register(
            TypeBuilder::class("Zoo", "Dog")
                .extends(animal.token)
                .method(recording(
                    MethodBuilder::new("Speak", speak.clone()).virtual_method(),
                    recorder,
                    "dog-speak",
                    Value::string("Woof"),
                )),
        )
        .unwrap();

    let cat = registry
        .register(
            TypeBuilder::class("Zoo", "Cat")
                .extends(animal.token)
                .method(recording(
                    MethodBuilder::new("Speak", speak).virtual_method(),
                    recorder,
                    "cat-speak",
                    Value::string("Meow"),
                )),
        )
        .unwrap();

    let negate_recorder = recorder.clone();
    let math = registry
        .register(
            TypeBuilder::class("Zoo", "Math")
                .method(
                    MethodBuilder::new("Negate", MethodSignature::new(ValueKind::I32, [ValueKind::I32]))
                        .static_method()
                        .body(move |_, args| {
                            negate_recorder.push("negate");
                            match args {
                                [Value::I32(value)] => Ok(Value::I32(value.wrapping_neg())),
                                _ => Ok(Value::Void),
                            }
                        }),
                )
                .method(
                    MethodBuilder::new(
                        "Add",
                        MethodSignature::new(ValueKind::I32, [ValueKind::I32, ValueKind::I32]),
                    )
                    .static_method()
                    .body(|_, args| match args {
                        [Value::I32(a), Value::I32(b)] => Ok(Value::I32(a.wrapping_add(*b))),
                        _ => Ok(Value::Void),
                    }),
                ),
        )
        .unwrap();

    let handler = MethodSignature::void([ValueKind::Object, ValueKind::Object]);
    let events = registry
        .register(
            TypeBuilder::class("Zoo", "Events")
                .method(recording(
                    MethodBuilder::new("OnExitA", handler.clone()).static_method(),
                    recorder,
                    "exit-a",
                    Value::Void,
                ))
                .method(recording(
                    MethodBuilder::new("OnExitB", handler).static_method(),
                    recorder,
                    "exit-b",
                    Value::Void,
                )),
        )
        .unwrap();

    (
        registry,
        SampleTypes {
            animal,
            dog,
            cat,
            math,
            events,
        },
    )
}

pub(crate) struct SampleContext {
    pub(crate) ctx: RuntimeContext,
    pub(crate) registry: Arc<TypeRegistry>,
    pub(crate) types: SampleTypes,
    pub(crate) recorder: Recorder,
    pub(crate) speak: MethodDescRc,
    pub(crate) describe: MethodDescRc,
    pub(crate) negate: MethodDescRc,
    pub(crate) add: MethodDescRc,
    pub(crate) on_exit_a: MethodDescRc,
    pub(crate) on_exit_b: MethodDescRc,
}

pub(crate) fn sample_context() -> SampleContext {
    let recorder = Recorder::new();
    let (registry, types) = sample_registry(&recorder);
    let ctx = RuntimeContextBuilder::new()
        .config(RuntimeConfig::deterministic(42))
        .resolver(registry.clone())
        .build()
        .unwrap();

    let instance = |owner: &TypeDescRc, name: &str| {
        registry
            .resolve_method(owner.token, &MethodLookup::instance(name))
            .unwrap()
    };
    let static_method = |owner: &TypeDescRc, name: &str| {
        registry
            .resolve_method(owner.token, &MethodLookup::static_method(name))
            .unwrap()
    };

    let speak = instance(&types.animal, "Speak");
    let describe = instance(&types.animal, "Describe");
    let negate = static_method(&types.math, "Negate");
    let add = static_method(&types.math, "Add");
    let on_exit_a = static_method(&types.events, "OnExitA");
    let on_exit_b = static_method(&types.events, "OnExitB");

    SampleContext {
        speak,
        describe,
        negate,
        add,
        on_exit_a,
        on_exit_b,
        ctx,
        registry,
        types,
        recorder,
    }
}

fn delegate_type(row: u32, name: &str, signature: MethodSignature) -> DelegateTypeRc {
    Arc::new(DelegateType::new(Token::type_def(0x8000 | row), name, signature))
}

/// `void (object sender, object args)`
pub(crate) fn event_handler_type() -> DelegateTypeRc {
    delegate_type(
        1,
        "System.EventHandler",
        MethodSignature::void([ValueKind::Object, ValueKind::Object]),
    )
}

/// `int (int)`
pub(crate) fn unary_int_type() -> DelegateTypeRc {
    delegate_type(
        2,
        "System.Func<int, int>",
        MethodSignature::new(ValueKind::I32, [ValueKind::I32]),
    )
}

/// `int (int, int)`
pub(crate) fn binary_int_type() -> DelegateTypeRc {
    delegate_type(
        3,
        "System.Func<int, int, int>",
        MethodSignature::new(ValueKind::I32, [ValueKind::I32, ValueKind::I32]),
    )
}

/// `string ()`
pub(crate) fn string_func_type() -> DelegateTypeRc {
    delegate_type(
        4,
        "System.Func<string>",
        MethodSignature::new(ValueKind::String, Vec::new()),
    )
}

/// `string (object)`, the open form of `Animal.Speak`
pub(crate) fn open_speak_type() -> DelegateTypeRc {
    delegate_type(
        5,
        "System.Func<object, string>",
        MethodSignature::new(ValueKind::String, [ValueKind::Object]),
    )
}

/// `void ()`
pub(crate) fn action_type() -> DelegateTypeRc {
    delegate_type(6, "System.Action", MethodSignature::void(Vec::new()))
}
