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

//! Single-pass samplers over key streams of unknown length.

use rand::Rng;

use crate::rng::XorShiftRandom;

/// Uniform without-replacement sampler with an exact count of items seen
/// (Vitter's algorithm R).
///
/// The first `cap` items fill the reservoir; the `i`-th item after that
/// replaces slot `j` when a draw over `[0, i]` lands below `cap`. A stream
/// shorter than `cap` comes back whole, in arrival order.
#[derive(Debug, Clone)]
pub struct ReservoirSampler<T> {
    cap: usize,
    reservoir: Vec<T>,
    seen: u64,
    rng: XorShiftRandom,
}

impl<T> ReservoirSampler<T> {
    pub fn new(cap: usize, seed: u32) -> Self {
        Self {
            cap,
            reservoir: Vec::with_capacity(cap.min(1024)),
            seen: 0,
            rng: XorShiftRandom::from_seed32(seed),
        }
    }

    pub fn update(&mut self, item: T) {
        if self.cap > 0 {
            if self.reservoir.len() < self.cap {
                self.reservoir.push(item);
            } else {
                let j = self.rng.random_range(0..=self.seen);
                if j < self.cap as u64 {
                    self.reservoir[j as usize] = item;
                }
            }
        }
        self.seen += 1;
    }

    /// Items seen so far, including the ones that fell out of the sample.
    pub fn seen(&self) -> u64 {
        self.seen
    }

    pub fn finish(self) -> (Vec<T>, u64) {
        (self.reservoir, self.seen)
    }
}

/// Drain `iter` through a [`ReservoirSampler`], returning the sample and the
/// exact stream length.
pub fn sample_iter<T>(
    iter: impl IntoIterator<Item = T>,
    cap: usize,
    seed: u32,
) -> (Vec<T>, u64) {
    let mut sampler = ReservoirSampler::new(cap, seed);
    for item in iter {
        sampler.update(item);
    }
    sampler.finish()
}

/// Per-item coin with fixed acceptance probability.
#[derive(Debug, Clone)]
pub struct BernoulliSampler {
    fraction: f64,
    rng: XorShiftRandom,
}

impl BernoulliSampler {
    pub fn new(fraction: f64, seed: u32) -> Self {
        Self {
            fraction,
            rng: XorShiftRandom::from_seed32(seed),
        }
    }

    pub fn accept(&mut self) -> bool {
        self.rng.random::<f64>() < self.fraction
    }
}

/// Keep each item independently with probability `fraction`.
pub fn bernoulli_filter<T>(
    iter: impl IntoIterator<Item = T>,
    fraction: f64,
    seed: u32,
) -> Vec<T> {
    let mut sampler = BernoulliSampler::new(fraction, seed);
    iter.into_iter().filter(|_| sampler.accept()).collect()
}
