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

//! Parallel reservoir pass over a partitioned key source.

use std::sync::Arc;

use cinder_commons::sampling::ReservoirSampler;
use cinder_commons::Result;

use crate::source::{map_partitions_collect, KeyedSource};

/// Per-partition outcome of the sampling pass.
#[derive(Debug, Clone)]
pub struct Sketch<K> {
    pub partition: u32,
    /// Exact number of items in the partition.
    pub items: u64,
    /// Uniform without-replacement sample, at most the per-partition cap.
    pub sample: Vec<K>,
}

/// Sampling seed for one partition. Decorrelated across partitions and
/// collections, reproducible across runs. The arithmetic keeps the 32-bit
/// wrapping semantics the original drivers emit on the wire.
pub fn partition_seed(source_id: i32, partition: u32) -> u32 {
    ((partition as i32) ^ source_id.wrapping_shl(16)).swap_bytes() as u32
}

/// Seed for the follow-up Bernoulli pass over skewed partitions.
pub fn resample_seed(source_id: i32) -> u32 {
    source_id.wrapping_neg().wrapping_sub(1).swap_bytes() as u32
}

/// Draw a capped uniform sample from every partition in parallel.
///
/// Returns the exact total item count and one [`Sketch`] per source
/// partition, in partition-index order. Any partition failure fails the
/// whole pass.
pub async fn sketch<K>(
    source: &Arc<dyn KeyedSource<K>>,
    sample_size_per_partition: usize,
) -> Result<(u64, Vec<Sketch<K>>)>
where
    K: Send + 'static,
{
    let source_id = source.source_id();
    let collected = map_partitions_collect(source, move |partition, iter| {
        let seed = partition_seed(source_id, partition);
        let mut sampler = ReservoirSampler::new(sample_size_per_partition, seed);
        for key in iter {
            sampler.update(key?);
        }
        Ok(sampler.finish())
    })
    .await?;

    let mut total = 0u64;
    let mut sketches = Vec::with_capacity(collected.len());
    for (partition, (sample, items)) in collected {
        total += items;
        sketches.push(Sketch {
            partition,
            items,
            sample,
        });
    }
    Ok((total, sketches))
}
