//! The legacy seeded generator.
//!
//! A subtractive lagged-Fibonacci generator (Knuth's `ran3`) over a 56-word table.
//! Every seeded [`Random`](crate::random::Random) uses it, and its output for a given
//! seed is a compatibility contract: the same seed must yield the same sequence on
//! every platform and every release.
//!
//! # Algorithm
//!
//! - **Seeding**: word 55 gets `MSEED - |seed|`; the other 54 words are filled in a
//!   stride-21 order from a subtractive recurrence, then four mixing passes subtract
//!   the word 31 positions ahead.
//! - **Drawing**: two cursors start at 0 and 21 and advance within `[1, 55]`. The
//!   draw is `table[inext] - table[inextp]`, folded into `[0, i32::MAX)` and written
//!   back to `table[inext]`.
//!
//! Derived operations scale [`sample`](LegacyRandom::sample) rather than using
//! rejection, so small bounds carry the historical bias. That bias is part of the
//! reproducibility contract.

use crate::random::engine::RandomImpl;

const MSEED: i32 = 161_803_398;
const TABLE_LEN: usize = 56;

/// The legacy seeded generator state.
#[derive(Clone)]
pub struct LegacyRandom {
    seed_array: [i32; TABLE_LEN],
    inext: usize,
    inextp: usize,
}

impl LegacyRandom {
    /// Seeds the table from `seed`; negative seeds use their absolute value
    #[must_use]
    pub fn new(seed: i32) -> Self {
        let mut seed_array = [0i32; TABLE_LEN];

        let subtraction = if seed == i32::MIN {
            i32::MAX
        } else {
            seed.abs()
        };
        let mut mj = MSEED.wrapping_sub(subtraction);
        seed_array[55] = mj;
        let mut mk: i32 = 1;
        let mut ii = 0usize;

        for _ in 1..55 {
            ii += 21;
            if ii >= 55 {
                ii -= 55;
            }
            seed_array[ii] = mk;
            mk = mj.wrapping_sub(mk);
            if mk < 0 {
                mk = mk.wrapping_add(i32::MAX);
            }
            mj = seed_array[ii];
        }

        for _ in 1..5 {
            for i in 1..56 {
                let mut n = i + 30;
                if n >= 55 {
                    n -= 55;
                }
                seed_array[i] = seed_array[i].wrapping_sub(seed_array[1 + n]);
                if seed_array[i] < 0 {
                    seed_array[i] = seed_array[i].wrapping_add(i32::MAX);
                }
            }
        }

        LegacyRandom {
            seed_array,
            inext: 0,
            inextp: 21,
        }
    }

    fn internal_sample(&mut self) -> i32 {
        let mut inext = self.inext + 1;
        if inext >= TABLE_LEN {
            inext = 1;
        }
        let mut inextp = self.inextp + 1;
        if inextp >= TABLE_LEN {
            inextp = 1;
        }

        let mut value = self.seed_array[inext].wrapping_sub(self.seed_array[inextp]);
        if value == i32::MAX {
            value -= 1;
        }
        if value < 0 {
            value = value.wrapping_add(i32::MAX);
        }

        self.seed_array[inext] = value;
        self.inext = inext;
        self.inextp = inextp;
        value
    }

    // two draws: magnitude, then sign from the parity of the second
    fn sample_for_large_range(&mut self) -> f64 {
        let mut result = self.internal_sample();
        if self.internal_sample() % 2 == 0 {
            result = -result;
        }
        let mut d = f64::from(result);
        d += f64::from(i32::MAX - 1);
        d /= 2.0 * f64::from(i32::MAX) - 1.0;
        d
    }

    fn next_u64(&mut self) -> u64 {
        let low = self.next_below(1 << 22) as u32 as u64;
        let middle = self.next_below(1 << 22) as u32 as u64;
        let high = self.next_below(1 << 20) as u32 as u64;
        low | (middle << 22) | (high << 44)
    }

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

impl RandomImpl for LegacyRandom {
    fn sample(&mut self) -> f64 {
        f64::from(self.internal_sample()) * (1.0 / f64::from(i32::MAX))
    }

    fn next(&mut self) -> i32 {
        self.internal_sample()
    }

    fn next_below(&mut self, max_value: i32) -> i32 {
        (self.sample() * f64::from(max_value)) as i32
    }

    fn next_in_range(&mut self, min_value: i32, max_value: i32) -> i32 {
        let range = i64::from(max_value) - i64::from(min_value);
        if range <= i64::from(i32::MAX) {
            (self.sample() * range as f64) as i32 + min_value
        } else {
            ((self.sample_for_large_range() * range as f64) as i64 + i64::from(min_value)) as i32
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
        self.sample()
    }

    fn next_f32(&mut self) -> f32 {
        loop {
            let value = self.sample() as f32;
            // rounding to f32 can produce exactly 1.0
            if value < 1.0 {
                return value;
            }
        }
    }

    fn next_bytes(&mut self, buffer: &mut [u8]) {
        for byte in buffer.iter_mut() {
            *byte = self.internal_sample() as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_sequences() {
        let mut zero = LegacyRandom::new(0);
        let values: Vec<i32> = (0..3).map(|_| zero.next()).collect();
        assert_eq!(values, vec![1_559_595_546, 1_755_192_844, 1_649_316_166]);

        let mut forty_two = LegacyRandom::new(42);
        let values: Vec<i32> = (0..5).map(|_| forty_two.next()).collect();
        assert_eq!(
            values,
            vec![1_434_747_710, 302_596_119, 269_548_474, 1_122_627_734, 361_709_742]
        );
    }

    #[test]
    fn test_bounded_sequence() {
        let mut random = LegacyRandom::new(42);
        let values: Vec<i32> = (0..10).map(|_| random.next_below(100)).collect();
        assert_eq!(values, vec![66, 14, 12, 52, 16, 26, 72, 51, 17, 76]);
    }

    #[test]
    fn test_negative_seed_uses_magnitude() {
        let mut positive = LegacyRandom::new(17);
        let mut negative = LegacyRandom::new(-17);
        for _ in 0..100 {
            assert_eq!(positive.next(), negative.next());
        }

        let mut min = LegacyRandom::new(i32::MIN);
        let mut max = LegacyRandom::new(i32::MAX);
        for _ in 0..100 {
            assert_eq!(min.next(), max.next());
        }
    }

    #[test]
    fn test_cursor_wraparound() {
        let mut random = LegacyRandom::new(7);
        for _ in 0..1_000 {
            let value = random.next();
            assert!((0..i32::MAX).contains(&value));
        }
        assert!((1..TABLE_LEN).contains(&random.inext));
        assert!((1..TABLE_LEN).contains(&random.inextp));
    }

    #[test]
    fn test_large_range() {
        let mut random = LegacyRandom::new(3);
        for _ in 0..1_000 {
            let value = random.next_in_range(i32::MIN, i32::MAX);
            assert!(value < i32::MAX);
        }
    }

    #[test]
    fn test_i64_and_floats_in_range() {
        let mut random = LegacyRandom::new(11);
        for _ in 0..1_000 {
            assert!(random.next_i64() >= 0);
            assert!((0..1_000_000_000_000).contains(&random.next_i64_below(1_000_000_000_000)));
            assert!((-5..5).contains(&random.next_i64_in_range(-5, 5)));
            assert!((0.0..1.0).contains(&random.next_f64()));
            assert!((0.0..1.0).contains(&random.next_f32()));
        }
        assert_eq!(random.next_i64_below(1), 0);
        assert_eq!(random.next_i64_in_range(9, 9), 9);
    }

    #[test]
    fn test_next_bytes_reproducible() {
        let mut a = LegacyRandom::new(5);
        let mut b = LegacyRandom::new(5);
        let mut left = [0u8; 33];
        let mut right = [0u8; 33];
        a.next_bytes(&mut left);
        b.next_bytes(&mut right);
        assert_eq!(left, right);
    }
}
