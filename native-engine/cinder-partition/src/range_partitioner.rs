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

//! Range partitioning with sampled boundaries: roughly weight-balanced
//! buckets over an ordered key domain, cheap lookups, shippable state.

use std::cmp::Ordering;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use cinder_commons::config::ShuffleConfig;
use cinder_commons::{Result, ShuffleError};
use itertools::Itertools;

use crate::ordering::{KeyCompare, ShuffleKey, SortOrdering};
use crate::partitioning::Partitioner;
use crate::sketch::{resample_seed, sketch};
use crate::source::{bernoulli_collect, KeyedSource, PrunedKeySource};

/// Bound counts up to this scan linearly; larger arrays binary search.
/// Either path returns the same bucket.
const LINEAR_LOOKUP_MAX_BOUNDS: usize = 128;

/// Buckets keys by sampled range boundaries so buckets come out at roughly
/// equal weight. Buckets are ordered between themselves (ascending or
/// descending); contents within a bucket are unordered.
///
/// Built once on the driver, shipped to workers, consulted read-only.
#[derive(Clone)]
pub struct RangePartitioner<K> {
    ascending: bool,
    ordering: SortOrdering,
    cmp: KeyCompare<K>,
    bounds: Vec<K>,
    num_partitions: usize,
}

impl<K: ShuffleKey> RangePartitioner<K> {
    /// Build a partitioner with up to `partitions` buckets over the keys of
    /// `source`.
    ///
    /// Samples every source partition with a capped reservoir, re-samples
    /// the partitions whose share of a proportional sample would blow the
    /// per-partition cap, and picks weight-balanced boundaries from the
    /// pooled candidates. Fewer than `partitions` buckets come out when the
    /// sampled keys carry too few distinct values.
    pub async fn try_new(
        partitions: usize,
        source: &Arc<dyn KeyedSource<K>>,
        ordering: SortOrdering,
        ascending: bool,
        config: &ShuffleConfig,
    ) -> Result<Self> {
        config.validate()?;
        let cmp = ordering.resolve::<K>()?;

        if partitions <= 1 {
            return Ok(Self::from_bounds(partitions, ordering, cmp, ascending, vec![]));
        }

        // hard cap on keys pulled to the driver, with a per-partition
        // over-sampling hedge against imbalanced layouts
        let sample_size = (config.sample_size_multiplier as f64 * partitions as f64)
            .min(config.sample_size_cap as f64);
        let source_partitions = source.num_partitions().max(1);
        let sample_size_per_partition = (config.over_sample_factor as f64 * sample_size
            / source_partitions as f64)
            .ceil() as usize;

        let (total_items, sketches) = sketch(source, sample_size_per_partition).await?;
        log::debug!(
            "sketched {} partitions: {} items total, cap {} per partition",
            sketches.len(),
            total_items,
            sample_size_per_partition,
        );
        if total_items == 0 {
            return Ok(Self::from_bounds(partitions, ordering, cmp, ascending, vec![]));
        }

        // A partition is skewed when its proportional share of the sample
        // exceeds the per-partition cap: its reservoir under-sampled it, so
        // it goes through a second, fraction-exact pass.
        let fraction = (sample_size / total_items.max(1) as f64).min(1.0);
        let mut candidates: Vec<(K, f32)> = Vec::new();
        let mut skewed: Vec<u32> = Vec::new();
        for s in &sketches {
            if fraction * s.items as f64 > sample_size_per_partition as f64 {
                skewed.push(s.partition);
            } else if !s.sample.is_empty() {
                let weight = (s.items as f64 / s.sample.len() as f64) as f32;
                candidates.extend(s.sample.iter().cloned().map(|key| (key, weight)));
            }
        }

        if !skewed.is_empty() {
            log::info!(
                "re-sampling {} skewed partition(s) of source {} at fraction {:.6}",
                skewed.len(),
                source.source_id(),
                fraction,
            );
            let view: Arc<dyn KeyedSource<K>> = Arc::new(PrunedKeySource::new(
                Arc::clone(source),
                move |p| skewed.binary_search(&p).is_ok(),
            ));
            let weight = (1.0 / fraction) as f32;
            let seed = resample_seed(source.source_id());
            for key in bernoulli_collect(&view, fraction, seed).await? {
                candidates.push((key, weight));
            }
        }

        let bounds = determine_bounds(candidates, partitions, cmp);
        Ok(Self::from_bounds(partitions, ordering, cmp, ascending, bounds))
    }

    fn from_bounds(
        requested: usize,
        ordering: SortOrdering,
        cmp: KeyCompare<K>,
        ascending: bool,
        bounds: Vec<K>,
    ) -> Self {
        // requesting zero buckets is a degenerate terminal case: no bounds,
        // zero partitions, lookups are meaningless
        let num_partitions = if requested == 0 { 0 } else { bounds.len() + 1 };
        Self {
            ascending,
            ordering,
            cmp,
            bounds,
            num_partitions,
        }
    }

    /// Rebuild a partitioner from shipped state. Fails when the ordering
    /// cannot be resolved on this side or the state is inconsistent.
    pub fn from_parts(
        ascending: bool,
        ordering: SortOrdering,
        bounds: Vec<K>,
        num_partitions: usize,
    ) -> Result<Self> {
        if num_partitions != 0 && num_partitions != bounds.len() + 1 {
            return Err(ShuffleError::Serialization(format!(
                "partition count {} does not match {} bounds",
                num_partitions,
                bounds.len(),
            )));
        }
        let cmp = ordering.resolve::<K>()?;
        Ok(Self {
            ascending,
            ordering,
            cmp,
            bounds,
            num_partitions,
        })
    }

    pub fn ascending(&self) -> bool {
        self.ascending
    }

    pub fn ordering(&self) -> &SortOrdering {
        &self.ordering
    }

    pub fn bounds(&self) -> &[K] {
        &self.bounds
    }

    /// Bucket index under the ascending orientation: the number of bounds
    /// strictly below `key`, so keys equal to a bound stay on its lower
    /// side and equal keys always co-locate.
    fn ascending_bucket(&self, key: &K) -> usize {
        let bounds = &self.bounds;
        if bounds.len() <= LINEAR_LOOKUP_MAX_BOUNDS {
            let mut bucket = 0;
            while bucket < bounds.len()
                && (self.cmp)(key, &bounds[bucket]) == Ordering::Greater
            {
                bucket += 1;
            }
            bucket
        } else {
            match bounds.binary_search_by(|bound| (self.cmp)(bound, key)) {
                Ok(found) => found,
                Err(insertion) => insertion,
            }
        }
    }
}

impl<K: ShuffleKey> Partitioner<K> for RangePartitioner<K> {
    fn num_partitions(&self) -> usize {
        self.num_partitions
    }

    fn partition(&self, key: &K) -> usize {
        if self.bounds.is_empty() {
            return 0;
        }
        let bucket = self.ascending_bucket(key);
        if self.ascending {
            bucket
        } else {
            self.bounds.len() - bucket
        }
    }
}

impl<K: ShuffleKey> PartialEq for RangePartitioner<K> {
    fn eq(&self, other: &Self) -> bool {
        self.ascending == other.ascending
            && self.ordering == other.ordering
            && self.num_partitions == other.num_partitions
            && self.bounds.len() == other.bounds.len()
            && self
                .bounds
                .iter()
                .zip(&other.bounds)
                .all(|(a, b)| (self.cmp)(a, b) == Ordering::Equal)
    }
}

impl<K: ShuffleKey> Eq for RangePartitioner<K> {}

impl<K: ShuffleKey> Hash for RangePartitioner<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ascending.hash(state);
        self.num_partitions.hash(state);
        for bound in &self.bounds {
            bound.hash(state);
        }
    }
}

impl<K: ShuffleKey> Debug for RangePartitioner<K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RangePartitioner")
            .field("ascending", &self.ascending)
            .field("ordering", &self.ordering)
            .field("num_partitions", &self.num_partitions)
            .field("num_bounds", &self.bounds.len())
            .finish()
    }
}

/// Pick up to `partitions - 1` strictly increasing boundaries from weighted
/// candidates, so that the cumulative weight between consecutive boundaries
/// approaches `total_weight / partitions`.
///
/// Weights are the number of source items each candidate stands for; the
/// weighted sweep is what keeps re-sampled skewed partitions from dragging
/// the boundaries. Duplicate keys never produce duplicate bounds, which can
/// leave fewer than `partitions - 1` of them.
pub fn determine_bounds<K: Clone>(
    mut candidates: Vec<(K, f32)>,
    partitions: usize,
    cmp: KeyCompare<K>,
) -> Vec<K> {
    if partitions <= 1 {
        return vec![];
    }
    candidates.sort_by(|a, b| cmp(&a.0, &b.0));

    let sum_weights: f64 = candidates.iter().map(|(_, w)| *w as f64).sum();
    let step = sum_weights / partitions as f64;
    let mut cum_weight = 0.0;
    let mut target = step;
    let mut bounds: Vec<K> = Vec::with_capacity(partitions - 1);
    let mut previous: Option<&K> = None;

    for (key, weight) in &candidates {
        cum_weight += *weight as f64;
        if cum_weight >= target {
            // skip duplicate values
            if previous.map_or(true, |p| cmp(key, p) == Ordering::Greater) {
                bounds.push(key.clone());
                target += step;
                previous = Some(key);
                if bounds.len() >= partitions - 1 {
                    break;
                }
            }
        }
    }

    debug_assert!(bounds
        .iter()
        .tuple_windows()
        .all(|(a, b)| cmp(a, b) == Ordering::Less));
    bounds
}

#[cfg(test)]
mod tests {
    use super::*;

    fn natural(a: &i64, b: &i64) -> Ordering {
        a.cmp(b)
    }

    fn unit_candidates(keys: impl IntoIterator<Item = i64>) -> Vec<(i64, f32)> {
        keys.into_iter().map(|k| (k, 1.0)).collect()
    }

    #[test]
    fn bounds_split_uniform_weight_evenly() {
        let bounds = determine_bounds(unit_candidates(1..=100), 4, natural);
        assert_eq!(bounds, vec![25, 50, 75]);
    }

    #[test]
    fn bounds_ignore_input_order() {
        let mut keys: Vec<i64> = (1..=100).collect();
        keys.reverse();
        let bounds = determine_bounds(unit_candidates(keys), 4, natural);
        assert_eq!(bounds, vec![25, 50, 75]);
    }

    #[test]
    fn duplicate_keys_never_duplicate_bounds() {
        let bounds = determine_bounds(unit_candidates(std::iter::repeat(7).take(100)), 4, natural);
        assert_eq!(bounds, vec![7]);
    }

    #[test]
    fn low_diversity_yields_fewer_bounds() {
        let keys = std::iter::repeat(1)
            .take(50)
            .chain(std::iter::repeat(2).take(50));
        let bounds = determine_bounds(unit_candidates(keys), 8, natural);
        assert_eq!(bounds, vec![1, 2]);
    }

    #[test]
    fn weights_shift_the_boundaries() {
        // key 10 stands for 900 items, keys 1..=9 for one each
        let mut candidates = vec![(10i64, 900.0f32)];
        candidates.extend((1..=9).map(|k| (k, 1.0)));
        let bounds = determine_bounds(candidates, 3, natural);
        // every target lands inside the heavy key; only one bound survives
        assert_eq!(bounds, vec![10]);
    }

    #[test]
    fn degenerate_requests_have_no_bounds() {
        assert!(determine_bounds(unit_candidates(1..=10), 1, natural).is_empty());
        assert!(determine_bounds(unit_candidates(1..=10), 0, natural).is_empty());
        assert!(determine_bounds(Vec::<(i64, f32)>::new(), 4, natural).is_empty());
    }

    fn partitioner_with_bounds(bounds: Vec<i64>, ascending: bool) -> RangePartitioner<i64> {
        let count = bounds.len() + 1;
        RangePartitioner::from_parts(ascending, SortOrdering::Natural, bounds, count).unwrap()
    }

    #[test]
    fn lookup_counts_bounds_below_the_key() {
        let partitioner = partitioner_with_bounds(vec![10, 20, 30], true);
        assert_eq!(partitioner.num_partitions(), 4);
        assert_eq!(partitioner.partition(&0), 0);
        assert_eq!(partitioner.partition(&10), 0);
        assert_eq!(partitioner.partition(&11), 1);
        assert_eq!(partitioner.partition(&20), 1);
        assert_eq!(partitioner.partition(&25), 2);
        assert_eq!(partitioner.partition(&30), 2);
        assert_eq!(partitioner.partition(&31), 3);
        assert_eq!(partitioner.partition(&i64::MAX), 3);
    }

    #[test]
    fn descending_mirrors_ascending() {
        let ascending = partitioner_with_bounds(vec![10, 20, 30], true);
        let descending = partitioner_with_bounds(vec![10, 20, 30], false);
        assert_eq!(descending.num_partitions(), 4);
        for key in [i64::MIN, 0, 10, 11, 20, 25, 30, 31, i64::MAX] {
            assert_eq!(
                descending.partition(&key),
                3 - ascending.partition(&key),
                "key {key}"
            );
        }
    }

    #[test]
    fn binary_search_path_matches_linear_path() {
        // enough bounds to take the binary-search branch
        let wide: Vec<i64> = (0..400).map(|i| i * 10).collect();
        let narrow: Vec<i64> = (0..100).map(|i| i * 10).collect();
        let wide = partitioner_with_bounds(wide, true);
        let narrow = partitioner_with_bounds(narrow, true);

        for key in [-5i64, 0, 1, 9, 10, 11, 555, 990, 995, 5000] {
            let expected = (0..narrow.bounds().len())
                .filter(|&i| key > narrow.bounds()[i])
                .count();
            assert_eq!(narrow.partition(&key), expected, "narrow key {key}");

            let expected = (0..wide.bounds().len())
                .filter(|&i| key > wide.bounds()[i])
                .count();
            assert_eq!(wide.partition(&key), expected, "wide key {key}");
        }
    }

    #[test]
    fn empty_bounds_send_everything_to_bucket_zero() {
        let partitioner = partitioner_with_bounds(vec![], true);
        assert_eq!(partitioner.num_partitions(), 1);
        assert_eq!(partitioner.partition(&i64::MIN), 0);
        assert_eq!(partitioner.partition(&i64::MAX), 0);
    }

    #[test]
    fn equality_and_hash_follow_bounds_and_direction() {
        use std::collections::hash_map::DefaultHasher;

        let a = partitioner_with_bounds(vec![10, 20], true);
        let b = partitioner_with_bounds(vec![10, 20], true);
        let c = partitioner_with_bounds(vec![10, 21], true);
        let d = partitioner_with_bounds(vec![10, 20], false);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);

        let hash_of = |p: &RangePartitioner<i64>| {
            let mut hasher = DefaultHasher::new();
            p.hash(&mut hasher);
            hasher.finish()
        };
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(hash_of(&a), hash_of(&d));
    }

    #[test]
    fn from_parts_rejects_inconsistent_state() {
        let err =
            RangePartitioner::<i64>::from_parts(true, SortOrdering::Natural, vec![1, 2], 5)
                .unwrap_err();
        assert!(matches!(err, ShuffleError::Serialization(_)));
    }
}
