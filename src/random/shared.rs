//! Thread-partitioned shared generator.
//!
//! [`SharedRandom`] is the runtime's `Random.Shared`: one logical generator that
//! any thread may draw from without locking. Each OS thread lazily builds its own
//! xoshiro256** instance from the context's entropy source on first use, so draws
//! on different threads never contend and never observe each other's state.
//!
//! Instances are keyed by the owning `SharedRandom`, so two runtime contexts on one
//! thread keep independent generators. Each entry holds a weak liveness token of
//! its owner; entries whose owner has been dropped, on whatever thread, are purged
//! the next time the thread draws from any shared generator.

use std::{
    cell::RefCell,
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
};

use crate::{
    random::{engine::Random, entropy::EntropySource},
    Result,
};

static NEXT_SHARED_ID: AtomicU64 = AtomicU64::new(1);

struct ThreadInstance {
    owner: Weak<()>,
    random: Random,
}

thread_local! {
    static INSTANCES: RefCell<HashMap<u64, ThreadInstance>> = RefCell::new(HashMap::new());
}

/// A lock-free generator shared by every thread of a runtime context.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use dotcorelib::random::{SharedRandom, SplitMixEntropy};
///
/// let shared = SharedRandom::new(Arc::new(SplitMixEntropy::new(1)), 16);
/// std::thread::scope(|scope| {
///     for _ in 0..4 {
///         scope.spawn(|| {
///             let value = shared.next_below(10).unwrap();
///             assert!((0..10).contains(&value));
///         });
///     }
/// });
/// ```
pub struct SharedRandom {
    id: u64,
    liveness: Arc<()>,
    entropy: Arc<dyn EntropySource>,
    retry_limit: usize,
}

impl SharedRandom {
    /// Creates a shared generator seeding per-thread instances from `entropy`
    #[must_use]
    pub fn new(entropy: Arc<dyn EntropySource>, retry_limit: usize) -> Self {
        SharedRandom {
            id: NEXT_SHARED_ID.fetch_add(1, Ordering::Relaxed),
            liveness: Arc::new(()),
            entropy,
            retry_limit,
        }
    }

    /// Runs `f` with the calling thread's instance, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Entropy`] if the instance cannot be seeded.
    pub fn with<R>(&self, f: impl FnOnce(&mut Random) -> R) -> Result<R> {
        // taken out of the map while `f` runs so a nested draw cannot double-borrow
        let existing = INSTANCES.with(|instances| instances.borrow_mut().remove(&self.id));
        let mut random = match existing {
            Some(instance) => instance.random,
            None => {
                log::trace!(
                    "creating shared random instance {} on thread {:?}",
                    self.id,
                    std::thread::current().id()
                );
                Random::from_source(self.entropy.as_ref(), self.retry_limit)?
            }
        };

        let result = f(&mut random);
        INSTANCES.with(|instances| {
            let mut instances = instances.borrow_mut();
            let before = instances.len();
            instances.retain(|_, instance| instance.owner.strong_count() > 0);
            if instances.len() < before {
                log::trace!(
                    "purged {} shared random instances of dropped owners on thread {:?}",
                    before - instances.len(),
                    std::thread::current().id()
                );
            }
            instances.insert(
                self.id,
                ThreadInstance {
                    owner: Arc::downgrade(&self.liveness),
                    random,
                },
            );
        });
        Ok(result)
    }

    #[cfg(test)]
    fn thread_instance_count() -> usize {
        INSTANCES.with(|instances| instances.borrow().len())
    }

    /// Returns true if the calling thread has already built its instance
    #[must_use]
    pub fn is_initialized_on_current_thread(&self) -> bool {
        INSTANCES
            .try_with(|instances| instances.borrow().contains_key(&self.id))
            .unwrap_or(false)
    }

    /// Drops the calling thread's instance; the next draw builds a fresh one
    pub fn reset_current_thread(&self) {
        let _ = INSTANCES.try_with(|instances| instances.borrow_mut().remove(&self.id));
    }

    /// See [`Random::next`].
    ///
    /// # Errors
    ///
    /// Fails only if the thread's instance cannot be seeded.
    pub fn next(&self) -> Result<i32> {
        self.with(Random::next)
    }

    /// See [`Random::next_below`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ArgumentOutOfRange`] for a negative bound.
    pub fn next_below(&self, max_value: i32) -> Result<i32> {
        self.with(|random| random.next_below(max_value))?
    }

    /// See [`Random::next_in_range`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ArgumentOutOfRange`] if `min_value > max_value`.
    pub fn next_in_range(&self, min_value: i32, max_value: i32) -> Result<i32> {
        self.with(|random| random.next_in_range(min_value, max_value))?
    }

    /// See [`Random::next_i64`].
    ///
    /// # Errors
    ///
    /// Fails only if the thread's instance cannot be seeded.
    pub fn next_i64(&self) -> Result<i64> {
        self.with(Random::next_i64)
    }

    /// See [`Random::next_f64`].
    ///
    /// # Errors
    ///
    /// Fails only if the thread's instance cannot be seeded.
    pub fn next_f64(&self) -> Result<f64> {
        self.with(Random::next_f64)
    }

    /// See [`Random::next_bytes`].
    ///
    /// # Errors
    ///
    /// Fails only if the thread's instance cannot be seeded.
    pub fn next_bytes(&self, buffer: &mut [u8]) -> Result<()> {
        self.with(|random| random.next_bytes(buffer))
    }
}

impl Drop for SharedRandom {
    fn drop(&mut self) {
        self.reset_current_thread();
    }
}

impl fmt::Debug for SharedRandom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedRandom")
            .field("id", &self.id)
            .field("retry_limit", &self.retry_limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::mpsc};

    use rayon::prelude::*;

    use super::*;
    use crate::{
        random::entropy::{OsEntropy, SplitMixEntropy},
        Error,
    };

    #[test]
    fn test_lazy_per_thread_instance() {
        let shared = SharedRandom::new(Arc::new(SplitMixEntropy::new(7)), 16);
        assert!(!shared.is_initialized_on_current_thread());
        shared.next().unwrap();
        assert!(shared.is_initialized_on_current_thread());

        std::thread::scope(|scope| {
            scope.spawn(|| {
                assert!(!shared.is_initialized_on_current_thread());
                shared.next_f64().unwrap();
                assert!(shared.is_initialized_on_current_thread());
            });
        });

        shared.reset_current_thread();
        assert!(!shared.is_initialized_on_current_thread());
    }

    #[test]
    fn test_instances_keyed_per_owner() {
        let a = SharedRandom::new(Arc::new(SplitMixEntropy::new(1)), 16);
        let b = SharedRandom::new(Arc::new(SplitMixEntropy::new(1)), 16);
        // identical entropy streams give identical first draws only if state is not shared
        assert_eq!(a.next_i64().unwrap(), b.next_i64().unwrap());
        a.reset_current_thread();
        assert!(b.is_initialized_on_current_thread());
    }

    #[test]
    fn test_threads_get_distinct_streams() {
        let shared = SharedRandom::new(Arc::new(OsEntropy), 16);
        let firsts: HashSet<i64> = (0..8)
            .into_par_iter()
            .map(|_| {
                shared.reset_current_thread();
                shared.next_i64().unwrap()
            })
            .collect();
        assert!(firsts.len() > 1);
    }

    #[test]
    fn test_validation_passes_through() {
        let shared = SharedRandom::new(Arc::new(SplitMixEntropy::new(2)), 16);
        assert!(matches!(
            shared.next_in_range(3, 2),
            Err(Error::ArgumentOutOfRange { param: "min_value", .. })
        ));
        let mut buffer = [0u8; 9];
        shared.next_bytes(&mut buffer).unwrap();
    }

    #[test]
    fn test_owners_dropped_elsewhere_are_purged() {
        let keeper = Arc::new(SharedRandom::new(Arc::new(SplitMixEntropy::new(5)), 16));
        let owners: Vec<Arc<SharedRandom>> = (0..64)
            .map(|seed| Arc::new(SharedRandom::new(Arc::new(SplitMixEntropy::new(seed)), 16)))
            .collect();
        let worker_owners: Vec<Arc<SharedRandom>> = owners.iter().map(Arc::clone).collect();
        let worker_keeper = Arc::clone(&keeper);
        let (used_tx, used_rx) = mpsc::channel();
        let (dropped_tx, dropped_rx) = mpsc::channel::<()>();

        let worker = std::thread::spawn(move || {
            worker_keeper.next().unwrap();
            for shared in &worker_owners {
                shared.next().unwrap();
            }
            used_tx.send(SharedRandom::thread_instance_count()).unwrap();
            drop(worker_owners);

            dropped_rx.recv().unwrap();
            worker_keeper.next().unwrap();
            SharedRandom::thread_instance_count()
        });

        assert_eq!(used_rx.recv().unwrap(), 65);
        // the last owners go away on this thread, not on the worker
        drop(owners);
        dropped_tx.send(()).unwrap();
        assert_eq!(worker.join().unwrap(), 1);
        assert!(!keeper.is_initialized_on_current_thread());
    }

    #[test]
    fn test_nested_use_does_not_panic() {
        let shared = SharedRandom::new(Arc::new(SplitMixEntropy::new(3)), 16);
        let nested = shared
            .with(|outer| {
                let inner = shared.next().unwrap();
                (outer.next(), inner)
            })
            .unwrap();
        assert!(nested.0 >= 0 && nested.1 >= 0);
    }
}
