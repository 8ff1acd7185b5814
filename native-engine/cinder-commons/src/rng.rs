// Copyright 2024 The Cinder Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use rand::rand_core::impls;
use rand::RngCore;

const GOLDEN_GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;

/// Fast non-cryptographic generator used by the sampling passes.
///
/// xorshift64* core with a SplitMix64-style finalizer on the seed, so the
/// small nearby seeds produced by the per-partition derivation land in
/// unrelated states. Identical seeds yield identical streams.
#[derive(Debug, Clone)]
pub struct XorShiftRandom {
    state: u64,
}

impl XorShiftRandom {
    pub fn new(seed: u64) -> Self {
        let state = scramble(seed);
        Self {
            // xorshift has a fixed point at zero
            state: if state == 0 { GOLDEN_GAMMA } else { state },
        }
    }

    pub fn from_seed32(seed: u32) -> Self {
        Self::new(seed as u64)
    }
}

#[inline]
fn scramble(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(GOLDEN_GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

impl RngCore for XorShiftRandom {
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_f491_4f6c_dd1d)
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        impls::fill_bytes_via_next(self, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn same_seed_same_stream() {
        let mut a = XorShiftRandom::from_seed32(42);
        let mut b = XorShiftRandom::from_seed32(42);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn nearby_seeds_decorrelate() {
        let mut a = XorShiftRandom::from_seed32(0);
        let mut b = XorShiftRandom::from_seed32(1);
        let matches = (0..64).filter(|_| a.next_u64() == b.next_u64()).count();
        assert_eq!(matches, 0);
    }

    #[test]
    fn zero_seed_is_usable() {
        let mut rng = XorShiftRandom::new(0);
        assert_ne!(rng.next_u64(), rng.next_u64());
    }

    #[test]
    fn unit_doubles_are_roughly_uniform() {
        let mut rng = XorShiftRandom::from_seed32(7);
        let n = 10_000;
        let mean = (0..n).map(|_| rng.random::<f64>()).sum::<f64>() / n as f64;
        assert!((mean - 0.5).abs() < 0.02, "mean {mean} too far from 0.5");
    }

    #[test]
    fn range_draws_stay_in_range() {
        let mut rng = XorShiftRandom::from_seed32(9);
        for i in 0u64..1000 {
            let j = rng.random_range(0..=i);
            assert!(j <= i);
        }
    }
}
