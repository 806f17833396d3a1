//! Entropy sources for seeding generators.
//!
//! Entropy is consumed in exactly two places: when a modern generator draws its
//! initial state, and once per [`RuntimeContext`](crate::runtime::RuntimeContext)
//! for the process hash seed.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::{rngs::OsRng, TryRngCore};

use crate::{runtime::value::mix64, Error, Result};

/// A source of random bytes.
pub trait EntropySource: Send + Sync {
    /// Fills `buffer` with random bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Entropy`] if the source cannot produce bytes.
    fn fill_random_bytes(&self, buffer: &mut [u8]) -> Result<()>;
}

/// The operating system's secure random source.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill_random_bytes(&self, buffer: &mut [u8]) -> Result<()> {
        OsRng
            .try_fill_bytes(buffer)
            .map_err(|e| Error::Entropy(e.to_string()))
    }
}

/// A reproducible SplitMix64 stream.
///
/// Used by deterministic runtime configurations. Safe to share between threads;
/// concurrent callers each receive distinct words of the stream.
#[derive(Debug)]
pub struct SplitMixEntropy {
    state: AtomicU64,
}

impl SplitMixEntropy {
    /// Creates a stream starting at `seed`
    #[must_use]
    pub fn new(seed: u64) -> Self {
        SplitMixEntropy {
            state: AtomicU64::new(seed),
        }
    }

    fn next_word(&self) -> u64 {
        let previous = self.state.fetch_add(0x9E37_79B9_7F4A_7C15, Ordering::Relaxed);
        mix64(previous)
    }
}

impl EntropySource for SplitMixEntropy {
    fn fill_random_bytes(&self, buffer: &mut [u8]) -> Result<()> {
        for chunk in buffer.chunks_mut(8) {
            let bytes = self.next_word().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splitmix_reproducible() {
        let a = SplitMixEntropy::new(42);
        let b = SplitMixEntropy::new(42);
        let mut left = [0u8; 21];
        let mut right = [0u8; 21];
        a.fill_random_bytes(&mut left).unwrap();
        b.fill_random_bytes(&mut right).unwrap();
        assert_eq!(left, right);
        assert_ne!(left, [0u8; 21]);

        let mut next = [0u8; 21];
        a.fill_random_bytes(&mut next).unwrap();
        assert_ne!(left, next);
    }

    #[test]
    fn test_os_entropy_fills() {
        let mut first = [0u8; 32];
        let mut second = [0u8; 32];
        OsEntropy.fill_random_bytes(&mut first).unwrap();
        OsEntropy.fill_random_bytes(&mut second).unwrap();
        assert_ne!(first, second);
    }
}
