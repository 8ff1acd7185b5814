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

//! The seam to the execution engine: partitioned key sources and the two
//! driver-side primitives the partitioner consumes (map-partitions-collect
//! and pruned Bernoulli sampling).

use std::sync::Arc;

use cinder_commons::sampling::BernoulliSampler;
use cinder_commons::{Result, ShuffleError};
use futures::future::try_join_all;
use tokio::task;

use crate::partitioning::Partitioner;

/// Single-pass iterator over one partition's keys. Upstream read failures
/// surface as `Err` items and abort the consuming pass.
pub type KeyIter<K> = Box<dyn Iterator<Item = Result<K>> + Send>;

/// Driver-side view of a partitioned collection of keys.
pub trait KeyedSource<K>: Send + Sync {
    /// Stable identifier of the underlying collection; sampling seeds
    /// derive from it.
    fn source_id(&self) -> i32;

    /// Number of source partitions.
    fn num_partitions(&self) -> usize;

    /// Open one partition for a single pass. `partition` must be below
    /// `num_partitions()`.
    fn partition_iter(&self, partition: usize) -> Result<KeyIter<K>>;

    /// The partitioner this collection is already laid out by, if any.
    fn partitioner(&self) -> Option<Arc<dyn Partitioner<K>>> {
        None
    }
}

/// Run `f` against every partition in parallel and collect the results
/// tagged with their partition index, in partition-index order.
pub async fn map_partitions_collect<K, R, F>(
    source: &Arc<dyn KeyedSource<K>>,
    f: F,
) -> Result<Vec<(u32, R)>>
where
    K: Send + 'static,
    R: Send + 'static,
    F: Fn(u32, KeyIter<K>) -> Result<R> + Send + Sync + 'static,
{
    let f = Arc::new(f);
    let tasks = (0..source.num_partitions())
        .map(|partition| {
            let source = Arc::clone(source);
            let f = Arc::clone(&f);
            task::spawn_blocking(move || -> Result<(u32, R)> {
                let iter = source.partition_iter(partition)?;
                Ok((partition as u32, f(partition as u32, iter)?))
            })
        })
        .collect::<Vec<_>>();

    try_join_all(tasks)
        .await
        .map_err(|e| ShuffleError::Execution(format!("partition task failed: {e:?}")))?
        .into_iter()
        .collect()
}

/// Lazy view exposing only the retained partitions of a source. Partitions
/// are renumbered densely; no data moves.
pub struct PrunedKeySource<K> {
    inner: Arc<dyn KeyedSource<K>>,
    retained: Vec<usize>,
}

impl<K> PrunedKeySource<K> {
    pub fn new(inner: Arc<dyn KeyedSource<K>>, keep: impl Fn(u32) -> bool) -> Self {
        let retained = (0..inner.num_partitions())
            .filter(|&p| keep(p as u32))
            .collect();
        Self { inner, retained }
    }

    /// Source partition index backing view partition `partition`.
    pub fn parent_partition(&self, partition: usize) -> usize {
        self.retained[partition]
    }
}

impl<K> KeyedSource<K> for PrunedKeySource<K> {
    fn source_id(&self) -> i32 {
        self.inner.source_id()
    }

    fn num_partitions(&self) -> usize {
        self.retained.len()
    }

    fn partition_iter(&self, partition: usize) -> Result<KeyIter<K>> {
        self.inner.partition_iter(self.retained[partition])
    }
}

/// Materialise a uniform Bernoulli sample of the whole source. Each
/// partition draws from an independent generator seeded with `seed` plus
/// its position, so the pass is reproducible for a fixed layout.
pub async fn bernoulli_collect<K>(
    source: &Arc<dyn KeyedSource<K>>,
    fraction: f64,
    seed: u32,
) -> Result<Vec<K>>
where
    K: Send + 'static,
{
    let collected = map_partitions_collect(source, move |partition, iter| {
        let mut sampler = BernoulliSampler::new(fraction, seed.wrapping_add(partition));
        let mut kept = Vec::new();
        for key in iter {
            let key = key?;
            if sampler.accept() {
                kept.push(key);
            }
        }
        Ok(kept)
    })
    .await?;

    Ok(collected.into_iter().flat_map(|(_, keys)| keys).collect())
}

/// In-memory [`KeyedSource`] with an explicit partition layout.
pub struct MemoryKeySource<K> {
    source_id: i32,
    partitions: Vec<Vec<K>>,
    partitioner: Option<Arc<dyn Partitioner<K>>>,
}

impl<K: Clone + Send + Sync + 'static> MemoryKeySource<K> {
    pub fn new(source_id: i32, partitions: Vec<Vec<K>>) -> Self {
        Self {
            source_id,
            partitions,
            partitioner: None,
        }
    }

    pub fn with_partitioner(mut self, partitioner: Arc<dyn Partitioner<K>>) -> Self {
        self.partitioner = Some(partitioner);
        self
    }
}

impl<K: Clone + Send + Sync + 'static> KeyedSource<K> for MemoryKeySource<K> {
    fn source_id(&self) -> i32 {
        self.source_id
    }

    fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    fn partition_iter(&self, partition: usize) -> Result<KeyIter<K>> {
        let keys = self.partitions.get(partition).cloned().ok_or_else(|| {
            ShuffleError::Execution(format!("partition {partition} out of range"))
        })?;
        Ok(Box::new(keys.into_iter().map(Ok)))
    }

    fn partitioner(&self) -> Option<Arc<dyn Partitioner<K>>> {
        self.partitioner.clone()
    }
}
