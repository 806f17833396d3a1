//! xoshiro256** generator.
//!
//! The generator behind unseeded [`Random`](crate::random::Random) instances and
//! [`SharedRandom`](crate::random::SharedRandom). Bounded draws use rejection
//! sampling over the smallest power-of-two range covering the bound, so every
//! result is exactly uniform.
//!
//! # State
//!
//! Four 64-bit words. The all-zero state is a fixed point of the update and is
//! never allowed: seeding re-draws from the entropy source until at least one
//! word is non-zero.

use crate::{
    random::{engine::RandomImpl, entropy::EntropySource},
    Error, Result,
};

/// The xoshiro256** generator state.
///
/// # Examples
///
/// ```rust
/// use dotcorelib::random::XoshiroRandom;
///
/// let mut a = XoshiroRandom::from_state([1, 2, 3, 4])?;
/// let mut b = XoshiroRandom::from_state([1, 2, 3, 4])?;
/// assert_eq!(a.next_u64(), b.next_u64());
/// assert!(XoshiroRandom::from_state([0; 4]).is_err());
/// # Ok::<(), dotcorelib::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct XoshiroRandom {
    s0: u64,
    s1: u64,
    s2: u64,
    s3: u64,
}

impl XoshiroRandom {
    /// Seeds the state from `source`.
    ///
    /// An all-zero draw is retried up to `retry_limit` times.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Entropy`] if the source fails or keeps producing zero state.
    pub fn from_entropy_source(source: &dyn EntropySource, retry_limit: usize) -> Result<Self> {
        let mut bytes = [0u8; 32];
        for attempt in 0..=retry_limit {
            source.fill_random_bytes(&mut bytes)?;
            let mut words = [0u64; 4];
            for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(8)) {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(chunk);
                *word = u64::from_le_bytes(raw);
            }

            if words.iter().any(|&word| word != 0) {
                return Ok(Self::from_words(words));
            }
            log::warn!(
                "entropy source produced an all-zero xoshiro state (attempt {} of {})",
                attempt + 1,
                retry_limit + 1
            );
        }

        Err(Error::Entropy(format!(
            "all-zero state after {} draws",
            retry_limit + 1
        )))
    }

    /// Creates a generator from explicit state words.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Argument`] for the all-zero state.
    pub fn from_state(state: [u64; 4]) -> Result<Self> {
        if state == [0; 4] {
            return Err(argument_error!("xoshiro256** state must not be all zero"));
        }
        Ok(Self::from_words(state))
    }

    fn from_words(words: [u64; 4]) -> Self {
        XoshiroRandom {
            s0: words[0],
            s1: words[1],
            s2: words[2],
            s3: words[3],
        }
    }

    /// The raw 64-bit output
    pub fn next_u64(&mut self) -> u64 {
        let result = self.s1.wrapping_mul(5).rotate_left(7).wrapping_mul(9);
        let t = self.s1 << 17;

        self.s2 ^= self.s0;
        self.s3 ^= self.s1;
        self.s1 ^= self.s2;
        self.s0 ^= self.s3;

        self.s2 ^= t;
        self.s3 = self.s3.rotate_left(45);

        result
    }

    /// Uniform value in `[0, exclusive_range)` for `exclusive_range > 1`
    fn next_u64_below(&mut self, exclusive_range: u64) -> u64 {
        let bits = 64 - (exclusive_range - 1).leading_zeros();
        loop {
            let result = self.next_u64() >> (64 - bits);
            if result < exclusive_range {
                return result;
            }
        }
    }
}

impl RandomImpl for XoshiroRandom {
    fn sample(&mut self) -> f64 {
        self.next_f64()
    }

    fn next(&mut self) -> i32 {
        loop {
            let result = self.next_u64() >> 33;
            if result != i32::MAX as u64 {
                return result as i32;
            }
        }
    }

    fn next_below(&mut self, max_value: i32) -> i32 {
        if max_value > 1 {
            self.next_u64_below(max_value as u64) as i32
        } else {
            0
        }
    }

    fn next_in_range(&mut self, min_value: i32, max_value: i32) -> i32 {
        let exclusive_range = (i64::from(max_value) - i64::from(min_value)) as u64;
        if exclusive_range > 1 {
            (self.next_u64_below(exclusive_range) as i64 + i64::from(min_value)) as i32
        } else {
            min_value
        }
    }

    fn next_i64(&mut self) -> i64 {
        loop {
            let result = self.next_u64() >> 1;
            if result != i64::MAX as u64 {
                return result as i64;
            }
        }
    }

    fn next_i64_below(&mut self, max_value: i64) -> i64 {
        if max_value > 1 {
            self.next_u64_below(max_value as u64) as i64
        } else {
            0
        }
    }

    fn next_i64_in_range(&mut self, min_value: i64, max_value: i64) -> i64 {
        let exclusive_range = max_value.wrapping_sub(min_value) as u64;
        if exclusive_range > 1 {
            (self.next_u64_below(exclusive_range) as i64).wrapping_add(min_value)
        } else {
            min_value
        }
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 * (1.0 / (1u32 << 24) as f32)
    }

    fn next_bytes(&mut self, buffer: &mut [u8]) {
        let mut chunks = buffer.chunks_exact_mut(8);
        for chunk in &mut chunks {
            chunk.copy_from_slice(&self.next_u64().to_le_bytes());
        }

        let tail = chunks.into_remainder();
        if !tail.is_empty() {
            let bytes = self.next_u64().to_le_bytes();
            tail.copy_from_slice(&bytes[..tail.len()]);
        }
    }
}
