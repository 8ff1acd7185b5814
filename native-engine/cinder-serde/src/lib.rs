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

//! Wire form of the shuffle partitioners.
//!
//! A partitioner ships as data: direction, ordering descriptor, bounds and
//! bucket count. The receiving side rebuilds the live value, resolving the
//! comparator through the ordering registry; nothing executable crosses
//! the wire.

use cinder_commons::{Result, ShuffleError};
use cinder_partition::ordering::{ShuffleKey, SortOrdering};
use cinder_partition::partitioning::HashPartitioner;
use cinder_partition::range_partitioner::RangePartitioner;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Serializable state of a partitioner. `K` is only populated by the range
/// form; the hash form carries nothing but its bucket count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PartitionerProto<K> {
    Hash {
        partitions: u64,
    },
    Range {
        ascending: bool,
        ordering: SortOrdering,
        bounds: Vec<K>,
        partitions: u64,
    },
}

impl<K> PartitionerProto<K> {
    pub fn from_hash(partitioner: &HashPartitioner) -> Self {
        PartitionerProto::Hash {
            partitions: partitioner.num_partitions() as u64,
        }
    }

    pub fn into_hash(self) -> Result<HashPartitioner> {
        match self {
            PartitionerProto::Hash { partitions } => {
                Ok(HashPartitioner::new(partitions as usize))
            }
            PartitionerProto::Range { .. } => Err(ShuffleError::Serialization(
                "expected a hash partitioner, found a range partitioner".to_string(),
            )),
        }
    }
}

impl<K: ShuffleKey> PartitionerProto<K> {
    pub fn from_range(partitioner: &RangePartitioner<K>) -> Self {
        PartitionerProto::Range {
            ascending: partitioner.ascending(),
            ordering: partitioner.ordering().clone(),
            bounds: partitioner.bounds().to_vec(),
            partitions: cinder_partition::Partitioner::num_partitions(partitioner) as u64,
        }
    }

    pub fn into_range(self) -> Result<RangePartitioner<K>> {
        match self {
            PartitionerProto::Range {
                ascending,
                ordering,
                bounds,
                partitions,
            } => RangePartitioner::from_parts(ascending, ordering, bounds, partitions as usize),
            PartitionerProto::Hash { .. } => Err(ShuffleError::Serialization(
                "expected a range partitioner, found a hash partitioner".to_string(),
            )),
        }
    }
}

/// Encode a partitioner proto to bytes.
pub fn to_bytes<K: Serialize>(proto: &PartitionerProto<K>) -> Result<Vec<u8>> {
    bincode::serialize(proto).map_err(|e| ShuffleError::Serialization(e.to_string()))
}

/// Decode a partitioner proto from bytes.
pub fn from_bytes<K: DeserializeOwned>(bytes: &[u8]) -> Result<PartitionerProto<K>> {
    bincode::deserialize(bytes).map_err(|e| ShuffleError::Serialization(e.to_string()))
}

/// Serialize a range partitioner for another node.
pub fn serialize_range<K: ShuffleKey>(partitioner: &RangePartitioner<K>) -> Result<Vec<u8>> {
    to_bytes(&PartitionerProto::from_range(partitioner))
}

/// Rebuild a range partitioner shipped by [`serialize_range`].
pub fn deserialize_range<K: ShuffleKey>(bytes: &[u8]) -> Result<RangePartitioner<K>> {
    from_bytes::<K>(bytes)?.into_range()
}

/// Serialize a hash partitioner for another node.
pub fn serialize_hash(partitioner: &HashPartitioner) -> Result<Vec<u8>> {
    to_bytes::<()>(&PartitionerProto::from_hash(partitioner))
}

/// Rebuild a hash partitioner shipped by [`serialize_hash`].
pub fn deserialize_hash(bytes: &[u8]) -> Result<HashPartitioner> {
    from_bytes::<()>(bytes)?.into_hash()
}
