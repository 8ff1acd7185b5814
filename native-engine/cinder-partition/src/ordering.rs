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

//! Key orderings that survive a trip across the wire.
//!
//! A partitioner never ships its comparator as code. It ships a
//! [`SortOrdering`] descriptor; the receiving side rebuilds the comparator
//! from the descriptor, either as the key type's natural order or through a
//! process-global registry of named comparators. Only plain function
//! pointers are registrable, so no captured state ever needs to transfer.

use std::any::Any;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use cinder_commons::{Result, ShuffleError};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Comparator shape accepted by the registry.
pub type KeyCompare<K> = fn(&K, &K) -> Ordering;

/// Keys that can be range-partitioned and shipped between tasks.
pub trait ShuffleKey:
    Clone + Debug + Hash + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Natural total order of the key type.
    fn natural_cmp(&self, other: &Self) -> Ordering;
}

macro_rules! ord_shuffle_key {
    ($($t:ty),* $(,)?) => {$(
        impl ShuffleKey for $t {
            fn natural_cmp(&self, other: &Self) -> Ordering {
                self.cmp(other)
            }
        }
    )*};
}

ord_shuffle_key!(i8, i16, i32, i64, u8, u16, u32, u64, bool, char, String, Vec<u8>);

impl<A: ShuffleKey, B: ShuffleKey> ShuffleKey for (A, B) {
    fn natural_cmp(&self, other: &Self) -> Ordering {
        self.0
            .natural_cmp(&other.0)
            .then_with(|| self.1.natural_cmp(&other.1))
    }
}

impl<A: ShuffleKey, B: ShuffleKey, C: ShuffleKey> ShuffleKey for (A, B, C) {
    fn natural_cmp(&self, other: &Self) -> Ordering {
        self.0
            .natural_cmp(&other.0)
            .then_with(|| self.1.natural_cmp(&other.1))
            .then_with(|| self.2.natural_cmp(&other.2))
    }
}

/// `f64` under the IEEE-754 total order, usable as a shuffle key.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TotalF64(pub f64);

impl PartialEq for TotalF64 {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for TotalF64 {}

impl Hash for TotalF64 {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl ShuffleKey for TotalF64 {
    fn natural_cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Names the comparator a partitioner was built with.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrdering {
    /// The key type's `natural_cmp`.
    Natural,
    /// A comparator registered under this id on every node.
    Registered(String),
}

impl SortOrdering {
    pub fn registered(id: impl Into<String>) -> Self {
        SortOrdering::Registered(id.into())
    }

    /// Resolve to a comparator for `K`. Fails when the id is unknown on
    /// this node or was registered for a different key type.
    pub fn resolve<K: ShuffleKey>(&self) -> Result<KeyCompare<K>> {
        match self {
            SortOrdering::Natural => Ok(natural_compare::<K>),
            SortOrdering::Registered(id) => {
                let registry = ORDERING_REGISTRY.read();
                let entry = registry.get(id).ok_or_else(|| {
                    ShuffleError::Serialization(format!(
                        "ordering '{id}' is not registered on this node"
                    ))
                })?;
                entry
                    .downcast_ref::<KeyCompare<K>>()
                    .copied()
                    .ok_or_else(|| {
                        ShuffleError::Serialization(format!(
                            "ordering '{id}' was registered for a different key type"
                        ))
                    })
            }
        }
    }
}

fn natural_compare<K: ShuffleKey>(a: &K, b: &K) -> Ordering {
    a.natural_cmp(b)
}

static ORDERING_REGISTRY: Lazy<RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Register `cmp` under `id` for later resolution on this node.
/// Re-registering an id replaces the previous comparator.
pub fn register_ordering<K: ShuffleKey>(id: impl Into<String>, cmp: KeyCompare<K>) {
    ORDERING_REGISTRY.write().insert(id.into(), Arc::new(cmp));
}
