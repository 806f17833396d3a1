//! The public random number API.
//!
//! [`Random`] validates arguments and forwards to one of two algorithms:
//!
//! | Constructor | Algorithm | Reproducible |
//! |-------------|-----------|--------------|
//! | [`Random::with_seed`] | [`LegacyRandom`] (lagged Fibonacci) | yes, across releases |
//! | [`Random::new`] / [`Random::from_entropy`] | [`XoshiroRandom`] (xoshiro256**) | no |
//!
//! Arguments are validated before any draw, so a rejected call never advances the
//! generator.

use strum::{Display, EnumIter};

use crate::{
    memory::{ReadOnlySpan, Span},
    random::{
        entropy::{EntropySource, OsEntropy},
        legacy::LegacyRandom,
        xoshiro::XoshiroRandom,
    },
    Result,
};

/// Default number of all-zero state re-draws before giving up
pub const DEFAULT_ENTROPY_RETRY_LIMIT: usize = 16;

/// Unchecked algorithm interface.
///
/// Implementations may assume their arguments were validated by [`Random`]:
/// bounds are non-negative and `min_value <= max_value`.
pub trait RandomImpl {
    /// Uniform value in `[0, 1)` as used by the algorithm's derived operations
    fn sample(&mut self) -> f64;

    /// Value in `[0, i32::MAX)`
    fn next(&mut self) -> i32;

    /// Value in `[0, max_value)`, or 0 when `max_value <= 1`
    fn next_below(&mut self, max_value: i32) -> i32;

    /// Value in `[min_value, max_value)`, or `min_value` for an empty range
    fn next_in_range(&mut self, min_value: i32, max_value: i32) -> i32;

    /// Value in `[0, i64::MAX)`
    fn next_i64(&mut self) -> i64;

    /// Value in `[0, max_value)`, or 0 when `max_value <= 1`
    fn next_i64_below(&mut self, max_value: i64) -> i64;

    /// Value in `[min_value, max_value)`, or `min_value` for an empty range
    fn next_i64_in_range(&mut self, min_value: i64, max_value: i64) -> i64;

    /// Value in `[0, 1)`
    fn next_f64(&mut self) -> f64;

    /// Value in `[0, 1)`
    fn next_f32(&mut self) -> f32;

    /// Fills `buffer` with random bytes
    fn next_bytes(&mut self, buffer: &mut [u8]);
}

/// Which algorithm a [`Random`] runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumIter)]
pub enum RandomAlgorithm {
    /// Seeded lagged-Fibonacci generator
    Legacy,
    /// xoshiro256** seeded from entropy
    #[strum(serialize = "xoshiro256**")]
    Xoshiro256StarStar,
}

/// A pseudo-random number generator.
///
/// Not thread-safe; use [`SharedRandom`](crate::random::SharedRandom) to draw from
/// multiple threads.
///
/// # Examples
///
/// ```rust
/// use dotcorelib::random::Random;
///
/// let mut a = Random::with_seed(42);
/// let mut b = Random::with_seed(42);
/// assert_eq!(a.next_below(100)?, b.next_below(100)?);
///
/// let mut unseeded = Random::from_entropy()?;
/// let value = unseeded.next_in_range(-10, 10)?;
/// assert!((-10..10).contains(&value));
/// # Ok::<(), dotcorelib::Error>(())
/// ```
#[derive(Clone)]
pub enum Random {
    /// Seeded, reproducible
    Legacy(LegacyRandom),
    /// Entropy-seeded
    Xoshiro(XoshiroRandom),
}

impl Random {
    /// Reproducible generator for `seed`
    #[must_use]
    pub fn with_seed(seed: i32) -> Self {
        Random::Legacy(LegacyRandom::new(seed))
    }

    /// Generator seeded from `source`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Entropy`] if the source fails.
    pub fn new(source: &dyn EntropySource) -> Result<Self> {
        Self::from_source(source, DEFAULT_ENTROPY_RETRY_LIMIT)
    }

    /// Generator seeded from `source` with an explicit all-zero retry limit.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Entropy`] if the source fails or keeps producing zeros.
    pub fn from_source(source: &dyn EntropySource, retry_limit: usize) -> Result<Self> {
        Ok(Random::Xoshiro(XoshiroRandom::from_entropy_source(
            source,
            retry_limit,
        )?))
    }

    /// Generator seeded from the operating system.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Entropy`] if the OS source fails.
    pub fn from_entropy() -> Result<Self> {
        Self::new(&OsEntropy)
    }

    /// The algorithm behind this generator
    #[must_use]
    pub fn algorithm(&self) -> RandomAlgorithm {
        match self {
            Random::Legacy(_) => RandomAlgorithm::Legacy,
            Random::Xoshiro(_) => RandomAlgorithm::Xoshiro256StarStar,
        }
    }

    fn inner(&mut self) -> &mut dyn RandomImpl {
        match self {
            Random::Legacy(legacy) => legacy,
            Random::Xoshiro(xoshiro) => xoshiro,
        }
    }

    /// Uniform value in `[0, 1)`
    pub fn sample(&mut self) -> f64 {
        self.inner().sample()
    }

    /// Non-negative value less than `i32::MAX`
    pub fn next(&mut self) -> i32 {
        self.inner().next()
    }

    /// Value in `[0, max_value)`; 0 when `max_value` is 0 or 1.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ArgumentOutOfRange`] if `max_value` is negative.
    pub fn next_below(&mut self, max_value: i32) -> Result<i32> {
        if max_value < 0 {
            return Err(out_of_range!(
                "max_value",
                "max_value {} must be non-negative",
                max_value
            ));
        }
        Ok(self.inner().next_below(max_value))
    }

    /// Value in `[min_value, max_value)`; `min_value` when they are equal.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ArgumentOutOfRange`] if `min_value > max_value`.
    pub fn next_in_range(&mut self, min_value: i32, max_value: i32) -> Result<i32> {
        if min_value > max_value {
            return Err(out_of_range!(
                "min_value",
                "min_value {} is greater than max_value {}",
                min_value,
                max_value
            ));
        }
        Ok(self.inner().next_in_range(min_value, max_value))
    }

    /// Non-negative value less than `i64::MAX`
    pub fn next_i64(&mut self) -> i64 {
        self.inner().next_i64()
    }

    /// Value in `[0, max_value)`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ArgumentOutOfRange`] if `max_value` is negative.
    pub fn next_i64_below(&mut self, max_value: i64) -> Result<i64> {
        if max_value < 0 {
            return Err(out_of_range!(
                "max_value",
                "max_value {} must be non-negative",
                max_value
            ));
        }
        Ok(self.inner().next_i64_below(max_value))
    }

    /// Value in `[min_value, max_value)`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ArgumentOutOfRange`] if `min_value > max_value`.
    pub fn next_i64_in_range(&mut self, min_value: i64, max_value: i64) -> Result<i64> {
        if min_value > max_value {
            return Err(out_of_range!(
                "min_value",
                "min_value {} is greater than max_value {}",
                min_value,
                max_value
            ));
        }
        Ok(self.inner().next_i64_in_range(min_value, max_value))
    }

    /// Value in `[0, 1)`
    pub fn next_f64(&mut self) -> f64 {
        self.inner().next_f64()
    }

    /// Value in `[0, 1)`
    pub fn next_f32(&mut self) -> f32 {
        self.inner().next_f32()
    }

    /// Fills `buffer` with random bytes
    pub fn next_bytes(&mut self, buffer: &mut [u8]) {
        self.inner().next_bytes(buffer);
    }

    /// Shuffles `values` in place (Fisher-Yates).
    pub fn shuffle<T>(&mut self, values: &mut Span<'_, T>) {
        let n = values.len();
        if n < 2 {
            return;
        }
        let slice = values.as_mut_slice();
        for i in 0..n - 1 {
            let j = if n <= i32::MAX as usize {
                self.inner().next_in_range(i as i32, n as i32) as usize
            } else {
                self.inner().next_i64_in_range(i as i64, n as i64) as usize
            };
            if j != i {
                slice.swap(i, j);
            }
        }
    }

    /// Fills `destination` with elements chosen uniformly from `choices`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Argument`] if `choices` is empty and `destination` is not.
    pub fn get_items<T: Clone>(
        &mut self,
        choices: ReadOnlySpan<'_, T>,
        destination: &mut Span<'_, T>,
    ) -> Result<()> {
        if destination.is_empty() {
            return Ok(());
        }
        if choices.is_empty() {
            return Err(argument_error!("choices must not be empty"));
        }

        let count = choices.len();
        for slot in destination.iter_mut() {
            let index = if count <= i32::MAX as usize {
                self.inner().next_below(count as i32) as usize
            } else {
                self.inner().next_i64_below(count as i64) as usize
            };
            *slot = choices[index].clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;
    use crate::{random::entropy::SplitMixEntropy, Error};

    fn generators() -> Vec<Random> {
        vec![
            Random::with_seed(42),
            Random::new(&SplitMixEntropy::new(42)).unwrap(),
        ]
    }

    #[test]
    fn test_seeded_determinism() {
        let mut a = Random::with_seed(42);
        let mut b = Random::with_seed(42);
        for _ in 0..1_000 {
            assert_eq!(a.next(), b.next());
            assert_eq!(a.next_f64().to_bits(), b.next_f64().to_bits());
        }
        assert_eq!(a.algorithm(), RandomAlgorithm::Legacy);
    }

    #[test]
    fn test_unseeded_differs() {
        let mut a = Random::from_entropy().unwrap();
        let mut b = Random::from_entropy().unwrap();
        let left: Vec<i64> = (0..8).map(|_| a.next_i64()).collect();
        let right: Vec<i64> = (0..8).map(|_| b.next_i64()).collect();
        assert_ne!(left, right);
        assert_eq!(a.algorithm(), RandomAlgorithm::Xoshiro256StarStar);
    }

    #[test]
    fn test_validation_before_draw() {
        for mut random in generators() {
            let mut untouched = random.clone();

            assert!(matches!(
                random.next_below(-1),
                Err(Error::ArgumentOutOfRange { param: "max_value", .. })
            ));
            assert!(matches!(
                random.next_in_range(5, 4),
                Err(Error::ArgumentOutOfRange { param: "min_value", .. })
            ));
            assert!(matches!(
                random.next_i64_below(-1),
                Err(Error::ArgumentOutOfRange { param: "max_value", .. })
            ));
            assert!(matches!(
                random.next_i64_in_range(1, 0),
                Err(Error::ArgumentOutOfRange { param: "min_value", .. })
            ));

            assert_eq!(random.next(), untouched.next());
        }
    }

    #[test]
    fn test_degenerate_bounds() {
        for mut random in generators() {
            assert_eq!(random.next_below(0).unwrap(), 0);
            assert_eq!(random.next_below(1).unwrap(), 0);
            assert_eq!(random.next_in_range(7, 7).unwrap(), 7);
            assert_eq!(random.next_in_range(7, 8).unwrap(), 7);
            assert_eq!(random.next_i64_in_range(-3, -3).unwrap(), -3);
        }
    }

    #[test]
    fn test_shuffle_is_permutation() {
        for mut random in generators() {
            let mut values: Vec<u32> = (0..50).collect();
            random.shuffle(&mut Span::new(&mut values));
            let mut sorted = values.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, (0..50).collect::<Vec<u32>>());
            assert_ne!(values, sorted);
        }
    }

    #[test]
    fn test_seeded_shuffle_reproducible() {
        let mut first: Vec<u8> = (0..20).collect();
        let mut second = first.clone();
        Random::with_seed(1).shuffle(&mut Span::new(&mut first));
        Random::with_seed(1).shuffle(&mut Span::new(&mut second));
        assert_eq!(first, second);
    }

    #[test]
    fn test_get_items() {
        let mut random = Random::with_seed(3);
        let choices = ["a", "b", "c"];
        let mut picked = [""; 32];
        random
            .get_items(ReadOnlySpan::new(&choices), &mut Span::new(&mut picked))
            .unwrap();
        assert!(picked.iter().all(|item| choices.contains(item)));

        let mut empty_destination: [&str; 0] = [];
        assert!(random
            .get_items(ReadOnlySpan::empty(), &mut Span::new(&mut empty_destination))
            .is_ok());
        assert!(matches!(
            random.get_items(ReadOnlySpan::<&str>::empty(), &mut Span::new(&mut picked)),
            Err(Error::Argument(_))
        ));
    }

    #[test]
    fn test_algorithm_names() {
        let names: Vec<String> = RandomAlgorithm::iter().map(|a| a.to_string()).collect();
        assert_eq!(names, vec!["Legacy", "xoshiro256**"]);
    }
}
