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

use std::cmp::Reverse;
use std::hash::Hash;
use std::sync::Arc;

use cinder_commons::config::ShuffleConfig;

use crate::source::KeyedSource;

/// A deterministic mapping from keys to output buckets, plus the declared
/// bucket count. Implementations are read-only values; `partition` is safe
/// to call concurrently.
pub trait Partitioner<K>: Send + Sync {
    fn num_partitions(&self) -> usize;

    fn partition(&self, key: &K) -> usize;
}

/// Non-negative modulo over a signed hash.
pub fn pmod(hash: i64, n: usize) -> usize {
    debug_assert!(n > 0);
    let r = hash % n as i64;
    if r < 0 {
        (r + n as i64) as usize
    } else {
        r as usize
    }
}

/// Modulo-of-hash partitioner. Buckets carry no ordering; equal keys always
/// co-locate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HashPartitioner {
    partitions: usize,
}

impl HashPartitioner {
    pub fn new(partitions: usize) -> Self {
        Self { partitions }
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions
    }
}

impl<K: Hash> Partitioner<K> for HashPartitioner {
    fn num_partitions(&self) -> usize {
        self.partitions
    }

    fn partition(&self, key: &K) -> usize {
        pmod(fxhash::hash64(key) as i64, self.partitions)
    }
}

/// Choose the partitioner for a join-like operation over `first` and
/// `rest`.
///
/// The widest input that already carries a partitioner wins. Otherwise keys
/// are hashed into `config.default_parallelism` buckets when that is set,
/// else into as many buckets as the widest input has partitions. The
/// two-argument surface keeps "at least one input" a compile-time fact.
pub fn default_partitioner<K: Hash + 'static>(
    first: &Arc<dyn KeyedSource<K>>,
    rest: &[Arc<dyn KeyedSource<K>>],
    config: &ShuffleConfig,
) -> Arc<dyn Partitioner<K>> {
    let mut sources: Vec<&Arc<dyn KeyedSource<K>>> =
        std::iter::once(first).chain(rest.iter()).collect();
    sources.sort_by_key(|source| Reverse(source.num_partitions()));

    for source in &sources {
        if let Some(partitioner) = source.partitioner() {
            if partitioner.num_partitions() > 0 {
                return partitioner;
            }
        }
    }

    let buckets = config
        .default_parallelism
        .unwrap_or_else(|| sources[0].num_partitions());
    Arc::new(HashPartitioner::new(buckets))
}
