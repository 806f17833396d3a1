//! Runtime configuration types.
//!
//! Configuration is organized into several small structures:
//!
//! - [`RuntimeConfig`] - Top-level configuration container
//! - [`HeapConfig`] - Managed heap budget
//! - [`RandomConfig`] - Entropy and shared random settings
//! - [`HashingConfig`] - Process hash seed selection
//!
//! # Configuration Presets
//!
//! - [`RuntimeConfig::default()`] - OS entropy, randomized hashing, 256 MB heap
//! - [`RuntimeConfig::minimal()`] - Small heap for embedding and tests
//! - [`RuntimeConfig::deterministic()`] - Reproducible entropy and hash seed
//!
//! # Example
//!
//! ```rust
//! use dotcorelib::runtime::{HeapConfig, RuntimeConfig};
//!
//! // Use a preset
//! let config = RuntimeConfig::deterministic(7);
//! assert_eq!(config.hashing.fixed_seed, Some(7));
//!
//! // Or customize
//! let config = RuntimeConfig {
//!     heap: HeapConfig::new().with_max_heap_bytes(1024 * 1024),
//!     ..RuntimeConfig::default()
//! }
//! .with_switch("System.Globalization.Invariant", true);
//! assert_eq!(config.switches.len(), 1);
//! ```

/// Top-level runtime configuration.
///
/// # Default Configuration
///
/// | Setting | Default |
/// |---------|---------|
/// | `heap.max_heap_bytes` | 256 MB |
/// | `random.entropy_retry_limit` | 16 |
/// | `random.deterministic_seed` | `None` (OS entropy) |
/// | `hashing.fixed_seed` | `None` (drawn from entropy) |
/// | `switches` | empty |
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Managed heap settings.
    pub heap: HeapConfig,

    /// Random number generation settings.
    pub random: RandomConfig,

    /// Process hash seed settings.
    pub hashing: HashingConfig,

    /// AppContext switches set during initialization.
    ///
    /// Applied in order, so a later entry for the same name wins.
    pub switches: Vec<(String, bool)>,
}

/// Managed heap settings.
#[derive(Clone, Debug)]
pub struct HeapConfig {
    /// Maximum estimated heap size in bytes.
    pub max_heap_bytes: usize,
}

/// Entropy and shared random settings.
#[derive(Clone, Debug)]
pub struct RandomConfig {
    /// How many times an all-zero xoshiro state is re-drawn before giving up.
    ///
    /// A healthy entropy source practically never yields 32 zero bytes, so
    /// exhausting the limit indicates a broken source.
    pub entropy_retry_limit: usize,

    /// Replaces OS entropy with a seeded SplitMix64 stream.
    ///
    /// Makes the shared random instance and unseeded [`Random`](crate::random::Random)
    /// instances built from the context reproducible across runs.
    pub deterministic_seed: Option<u64>,
}

/// Process hash seed settings.
#[derive(Clone, Debug, Default)]
pub struct HashingConfig {
    /// Uses this seed instead of drawing one from the entropy source.
    pub fixed_seed: Option<u64>,
}

impl Default for RuntimeConfig {
    /// Creates a default runtime configuration.
    ///
    /// See the struct documentation for default values.
    fn default() -> Self {
        Self {
            heap: HeapConfig::default(),
            random: RandomConfig::default(),
            hashing: HashingConfig::default(),
            switches: Vec::new(),
        }
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            max_heap_bytes: 256 * 1024 * 1024, // 256 MB
        }
    }
}

impl Default for RandomConfig {
    fn default() -> Self {
        Self {
            entropy_retry_limit: 16,
            deterministic_seed: None,
        }
    }
}

impl RuntimeConfig {
    /// Small footprint configuration.
    ///
    /// - 4 MB heap
    /// - OS entropy and randomized hashing as in the default
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            heap: HeapConfig::new().with_max_heap_bytes(4 * 1024 * 1024),
            ..Self::default()
        }
    }

    /// Fully reproducible configuration.
    ///
    /// Entropy comes from a SplitMix64 stream seeded with `seed`, and the process
    /// hash seed is fixed to `seed`.
    #[must_use]
    pub fn deterministic(seed: u64) -> Self {
        Self {
            random: RandomConfig {
                deterministic_seed: Some(seed),
                ..RandomConfig::default()
            },
            hashing: HashingConfig {
                fixed_seed: Some(seed),
            },
            ..Self::default()
        }
    }

    /// Adds an AppContext switch applied at initialization.
    #[must_use]
    pub fn with_switch(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.switches.push((name.into(), enabled));
        self
    }
}

impl HeapConfig {
    /// Creates the default heap configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum heap size in bytes.
    #[must_use]
    pub fn with_max_heap_bytes(mut self, max: usize) -> Self {
        self.max_heap_bytes = max;
        self
    }
}

impl RandomConfig {
    /// Creates the default random configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the all-zero state retry limit.
    #[must_use]
    pub fn with_entropy_retry_limit(mut self, limit: usize) -> Self {
        self.entropy_retry_limit = limit;
        self
    }

    /// Seeds entropy deterministically.
    #[must_use]
    pub fn with_deterministic_seed(mut self, seed: u64) -> Self {
        self.deterministic_seed = Some(seed);
        self
    }
}
