// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

/// Stateful `xoroshiro128+` pseudo-random number generator for scene sampling.
///
/// * Not cryptographically secure.
/// * Every sampling operation takes `&mut Prng` explicitly; there is no
///   ambient generator. Matching seeds yield identical sequences across
///   supported platforms as long as draws happen in the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prng {
    state: [u64; 2],
}

impl Prng {
    /// Constructs a PRNG from two 64-bit seeds.
    pub fn from_seed(seed0: u64, seed1: u64) -> Self {
        let mut state = [seed0, seed1];
        if state[0] == 0 && state[1] == 0 {
            state[0] = 0x9e37_79b9_7f4a_7c15;
        }
        Self { state }
    }

    /// Constructs a PRNG from a single 64-bit seed via SplitMix64 expansion.
    pub fn from_seed_u64(seed: u64) -> Self {
        fn splitmix64(state: &mut u64) -> u64 {
            *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
            let mut z = *state;
            z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
            z ^ (z >> 31)
        }

        let mut sm_state = seed;
        let mut state = [splitmix64(&mut sm_state), splitmix64(&mut sm_state)];
        if state[0] == 0 && state[1] == 0 {
            state[0] = 0x9e37_79b9_7f4a_7c15;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(55) ^ s1 ^ (s1 << 14);
        self.state[1] = s1.rotate_left(36);

        result
    }

    /// Returns the next float in `[0, 1)`.
    ///
    /// Uses the high 23 bits of the state to fill the mantissa.
    pub fn next_f32(&mut self) -> f32 {
        let raw = self.next_u64();
        let bits = ((raw >> 41) as u32) | 0x3f80_0000;
        f32::from_bits(bits) - 1.0
    }

    /// Returns a float drawn uniformly from `[lo, hi)`; `lo` when the range is empty.
    ///
    /// # Panics
    /// Panics if `lo > hi`.
    pub fn uniform(&mut self, lo: f32, hi: f32) -> f32 {
        assert!(lo <= hi, "invalid range: {lo}..{hi}");
        let t = self.next_f32();
        (lo + (hi - lo) * t).min(hi)
    }

    /// Returns a fair coin flip.
    pub fn next_bool(&mut self) -> bool {
        self.next_u64() >> 63 == 1
    }

    /// Returns the next integer in the inclusive range `[min, max]`.
    ///
    /// Uses rejection sampling to avoid modulo bias.
    ///
    /// # Panics
    /// Panics if `min > max`.
    pub fn next_int(&mut self, min: i32, max: i32) -> i32 {
        assert!(min <= max, "invalid range: {min}..={max}");
        let span = (i64::from(max) - i64::from(min)) as u64 + 1;
        if span == 1 {
            return min;
        }
        let value = self.next_below(span);
        let offset = value as i64 + i64::from(min);
        offset as i32
    }

    /// Returns an index drawn uniformly from `0..len`, or `None` when `len == 0`.
    pub fn next_index(&mut self, len: usize) -> Option<usize> {
        match len {
            0 => None,
            1 => Some(0),
            n => Some(self.next_below(n as u64) as usize),
        }
    }

    /// Picks an index with probability proportional to `weights[i]`.
    ///
    /// Returns `None` when every weight is zero.
    pub fn choose_weighted(&mut self, weights: &[usize]) -> Option<usize> {
        let total: u64 = weights.iter().map(|w| *w as u64).sum();
        if total == 0 {
            return None;
        }
        let mut ticket = self.next_below(total);
        for (idx, w) in weights.iter().enumerate() {
            let w = *w as u64;
            if ticket < w {
                return Some(idx);
            }
            ticket -= w;
        }
        None
    }

    fn next_below(&mut self, span: u64) -> u64 {
        if span.is_power_of_two() {
            self.next_u64() & (span - 1)
        } else {
            let bound = u64::MAX - u64::MAX % span;
            loop {
                let candidate = self.next_u64();
                if candidate < bound {
                    break candidate % span;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn next_int_returns_single_value_for_equal_bounds() {
        let mut prng = Prng::from_seed(42, 99);
        assert_eq!(prng.next_int(7, 7), 7);
    }

    #[test]
    fn next_int_handles_full_i32_range() {
        let mut prng = Prng::from_seed(0xDEADBEEF, 0xFACEFEED);
        let values: Vec<i32> = (0..3).map(|_| prng.next_int(i32::MIN, i32::MAX)).collect();
        assert_eq!(values, vec![1501347292, 1946982111, -117316573]);
    }

    #[test]
    fn next_int_handles_negative_ranges() {
        let mut prng = Prng::from_seed(123, 456);
        let values: Vec<i32> = (0..3).map(|_| prng.next_int(-10, -3)).collect();
        assert_eq!(values, vec![-7, -7, -7]);
    }

    #[test]
    fn uniform_stays_inside_bounds() {
        let mut prng = Prng::from_seed_u64(7);
        for _ in 0..1000 {
            let v = prng.uniform(0.40, 0.50);
            assert!((0.40..=0.50).contains(&v), "{v}");
        }
    }

    #[test]
    fn choose_weighted_skips_zero_weights() {
        let mut prng = Prng::from_seed_u64(11);
        for _ in 0..200 {
            let idx = prng.choose_weighted(&[0, 3, 0, 1]);
            assert!(matches!(idx, Some(1) | Some(3)));
        }
        assert_eq!(prng.choose_weighted(&[0, 0]), None);
    }

    #[test]
    fn next_index_handles_empty_and_singleton() {
        let mut prng = Prng::from_seed_u64(1);
        assert_eq!(prng.next_index(0), None);
        assert_eq!(prng.next_index(1), Some(0));
    }
}
