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

//! Partitioners for the cinder native shuffle stage.
//!
//! The range partitioner samples a partitioned key source on the driver,
//! picks weight-balanced bucket boundaries and answers key-to-bucket
//! lookups on workers; the hash partitioner and the default-partitioner
//! selector cover the join-side plumbing around it.

pub mod ordering;
pub mod partitioning;
pub mod range_partitioner;
pub mod sketch;
pub mod source;

pub use cinder_commons::config::ShuffleConfig;
pub use cinder_commons::{Result, ShuffleError};
pub use ordering::{register_ordering, ShuffleKey, SortOrdering, TotalF64};
pub use partitioning::{default_partitioner, HashPartitioner, Partitioner};
pub use range_partitioner::RangePartitioner;
pub use source::{KeyedSource, MemoryKeySource, PrunedKeySource};
