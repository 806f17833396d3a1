//! Random number generation.
//!
//! [`Random`] is the user-facing generator. Constructing it with a seed selects the
//! legacy lagged-Fibonacci algorithm, whose output is reproducible across releases;
//! constructing it without one selects xoshiro256** seeded from an [`EntropySource`].
//! [`SharedRandom`] hands every thread its own xoshiro256** instance.
//!
//! # Examples
//!
//! ```rust
//! use dotcorelib::random::{Random, RandomAlgorithm};
//!
//! let mut seeded = Random::with_seed(42);
//! assert_eq!(seeded.algorithm(), RandomAlgorithm::Legacy);
//! assert_eq!(seeded.next_below(100)?, 66);
//!
//! let mut unseeded = Random::from_entropy()?;
//! assert_eq!(unseeded.algorithm(), RandomAlgorithm::Xoshiro256StarStar);
//! assert!((0.0..1.0).contains(&unseeded.next_f64()));
//! # Ok::<(), dotcorelib::Error>(())
//! ```

pub(crate) mod engine;
pub(crate) mod entropy;
mod legacy;
mod shared;
mod xoshiro;

pub use engine::{Random, RandomAlgorithm, RandomImpl, DEFAULT_ENTROPY_RETRY_LIMIT};
pub use entropy::{EntropySource, OsEntropy, SplitMixEntropy};
pub use legacy::LegacyRandom;
pub use shared::SharedRandom;
pub use xoshiro::XoshiroRandom;
