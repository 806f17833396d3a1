//! The runtime context that owns all process-wide state.
//!
//! [`RuntimeContext`] is the explicit home of everything that a managed runtime
//! would keep in globals:
//!
//! ```text
//! +---------------------+
//! |   RuntimeContext    |
//! +----------+----------+
//!            |
//!    +-------+-------+----------+-----------+
//!    |       |       |          |           |
//!    v       v       v          v           v
//!  Heap  Resolver AppContext  Entropy  SharedRandom
//! ```
//!
//! # Lifecycle
//!
//! - **Init**: [`RuntimeContextBuilder::build`] applies the configured switches, picks
//!   the entropy source and draws the process hash seed.
//! - **Teardown**: [`RuntimeContext::shutdown`] raises `ProcessExit` and drops the
//!   calling thread's shared random instance. Other threads purge theirs on their next
//!   shared draw, or drop them when they exit.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use dotcorelib::metadata::registry::{TypeBuilder, TypeRegistry};
//! use dotcorelib::metadata::signature::ValueKind;
//! use dotcorelib::runtime::{RuntimeConfig, RuntimeContextBuilder, Value};
//!
//! let registry = Arc::new(TypeRegistry::new());
//! let point = registry.register(
//!     TypeBuilder::value_type("Demo", "Point")
//!         .field("X", ValueKind::I32)
//!         .field("Y", ValueKind::I32),
//! )?;
//!
//! let ctx = RuntimeContextBuilder::new()
//!     .config(RuntimeConfig::deterministic(3))
//!     .resolver(registry)
//!     .build()?;
//!
//! let object = ctx.new_object(point.token)?;
//! assert_eq!(ctx.heap().get_field(object, 1)?, Value::I32(0));
//! ctx.shutdown()?;
//! # Ok::<(), dotcorelib::Error>(())
//! ```
//!
//! # Thread Safety
//!
//! `RuntimeContext` is `Send + Sync`. The heap and the registry synchronize
//! internally; the shared random instance is partitioned per thread.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use crate::{
    metadata::{registry::TypeRegistry, resolver::MethodResolver, token::Token},
    random::{EntropySource, OsEntropy, Random, SharedRandom, SplitMixEntropy},
    runtime::{value::mix64, AppContext, HeapRef, ManagedHeap, RuntimeConfig, Value},
    Result,
};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Owner of the heap, reflection services, AppContext and random state.
pub struct RuntimeContext {
    id: u64,
    config: Arc<RuntimeConfig>,
    heap: ManagedHeap,
    resolver: Arc<dyn MethodResolver>,
    app_context: AppContext,
    entropy: Arc<dyn EntropySource>,
    shared_random: SharedRandom,
    hash_seed: u64,
}

impl RuntimeContext {
    /// Builds a context with default configuration and an empty type registry.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Entropy`] if the OS entropy source fails.
    pub fn new() -> Result<Self> {
        RuntimeContextBuilder::new().build()
    }

    /// Unique identifier of this context within the process
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The configuration this context was built with
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The managed heap
    #[must_use]
    pub fn heap(&self) -> &ManagedHeap {
        &self.heap
    }

    /// The reflection collaborator used for binding and virtual dispatch
    #[must_use]
    pub fn resolver(&self) -> &dyn MethodResolver {
        self.resolver.as_ref()
    }

    /// Switches, data and `ProcessExit`
    #[must_use]
    pub fn app_context(&self) -> &AppContext {
        &self.app_context
    }

    /// The entropy source used to seed modern generators
    #[must_use]
    pub fn entropy(&self) -> &dyn EntropySource {
        self.entropy.as_ref()
    }

    /// The thread-partitioned shared random instance
    #[must_use]
    pub fn shared_random(&self) -> &SharedRandom {
        &self.shared_random
    }

    /// The process hash seed
    #[must_use]
    pub fn hash_seed(&self) -> u64 {
        self.hash_seed
    }

    /// Creates an unseeded generator from this context's entropy source.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Entropy`] if no non-zero state could be drawn.
    pub fn new_random(&self) -> Result<Random> {
        Random::from_source(self.entropy.as_ref(), self.config.random.entropy_retry_limit)
    }

    /// Allocates an instance of `type_token` with default-initialized fields.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::TypeNotFound`] for unknown types and
    /// [`crate::Error::HeapMemoryLimitExceeded`] when the heap is full.
    pub fn new_object(&self, type_token: Token) -> Result<HeapRef> {
        let type_desc = self.resolver.type_desc(type_token)?;
        self.heap.alloc_object(
            type_token,
            type_desc.default_fields(),
            type_desc.is_value_type,
        )
    }

    /// Identity hash of a value, salted with the process hash seed.
    ///
    /// Stable for the lifetime of the context; differs between contexts unless
    /// the hash seed is fixed.
    #[must_use]
    pub fn identity_hash(&self, value: &Value) -> i32 {
        match value {
            Value::ObjectRef(heap_ref) => self.heap.identity_hash(*heap_ref, self.hash_seed),
            Value::Void | Value::Null => 0,
            other => mix64(other.identity_hash() ^ self.hash_seed) as i32,
        }
    }

    /// Tears the context down.
    ///
    /// Raises `ProcessExit`, then drops the calling thread's shared random instance.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a `ProcessExit` handler; the shared
    /// random instance is released regardless.
    pub fn shutdown(self) -> Result<()> {
        let raised = self.app_context.raise_process_exit(&self);
        self.shared_random.reset_current_thread();
        log::info!(
            "runtime context {} shut down ({} heap objects live)",
            self.id,
            self.heap.object_count()
        );
        raised
    }
}

/// Builder for [`RuntimeContext`].
///
/// # Examples
///
/// ```rust
/// use dotcorelib::runtime::{RuntimeConfig, RuntimeContextBuilder};
///
/// let ctx = RuntimeContextBuilder::new()
///     .config(RuntimeConfig::minimal())
///     .build()?;
/// assert_eq!(ctx.heap().max_size(), 4 * 1024 * 1024);
/// # Ok::<(), dotcorelib::Error>(())
/// ```
pub struct RuntimeContextBuilder {
    config: RuntimeConfig,
    resolver: Option<Arc<dyn MethodResolver>>,
    entropy: Option<Arc<dyn EntropySource>>,
}

impl RuntimeContextBuilder {
    /// Creates a builder with [`RuntimeConfig::default()`]
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            resolver: None,
            entropy: None,
        }
    }

    /// Sets the runtime configuration.
    #[must_use]
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the reflection collaborator.
    ///
    /// Defaults to an empty [`TypeRegistry`].
    #[must_use]
    pub fn resolver(mut self, resolver: Arc<dyn MethodResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Overrides the entropy source.
    ///
    /// Takes precedence over `random.deterministic_seed` in the configuration.
    #[must_use]
    pub fn entropy(mut self, entropy: Arc<dyn EntropySource>) -> Self {
        self.entropy = Some(entropy);
        self
    }

    /// Builds the [`RuntimeContext`].
    ///
    /// This method:
    /// 1. Selects the entropy source (explicit, seeded SplitMix64, or the OS)
    /// 2. Fixes or draws the process hash seed
    /// 3. Applies the configured AppContext switches in order
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Entropy`] if the hash seed cannot be drawn.
    pub fn build(self) -> Result<RuntimeContext> {
        let config = self.config;

        let entropy: Arc<dyn EntropySource> = match (self.entropy, config.random.deterministic_seed)
        {
            (Some(entropy), _) => entropy,
            (None, Some(seed)) => Arc::new(SplitMixEntropy::new(seed)),
            (None, None) => Arc::new(OsEntropy),
        };

        let hash_seed = match config.hashing.fixed_seed {
            Some(seed) => seed,
            None => {
                let mut bytes = [0u8; 8];
                entropy.fill_random_bytes(&mut bytes)?;
                u64::from_le_bytes(bytes)
            }
        };

        let app_context = AppContext::new();
        for (name, enabled) in &config.switches {
            app_context.set_switch(name.clone(), *enabled);
        }

        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(TypeRegistry::new()));

        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        let shared_random = SharedRandom::new(entropy.clone(), config.random.entropy_retry_limit);

        log::debug!(
            "runtime context {} initialized: heap limit {} bytes, {} switches, deterministic entropy: {}",
            id,
            config.heap.max_heap_bytes,
            config.switches.len(),
            config.random.deterministic_seed.is_some()
        );

        Ok(RuntimeContext {
            id,
            heap: ManagedHeap::new(config.heap.max_heap_bytes),
            config: Arc::new(config),
            resolver,
            app_context,
            entropy,
            shared_random,
            hash_seed,
        })
    }
}

impl Default for RuntimeContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
