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

use crate::{Result, ShuffleError};

/// Tuning knobs consumed when a partitioner is constructed. The library has
/// no CLI, files or environment variables; callers pass this struct in.
#[derive(Debug, Clone, PartialEq)]
pub struct ShuffleConfig {
    /// Bucket count for the fallback hash partitioner when no input carries
    /// a partitioner of its own. `None` falls back to the widest input.
    pub default_parallelism: Option<usize>,
    /// Hard cap on the number of keys moved to the driver while sampling.
    pub sample_size_cap: u64,
    /// Sampled keys requested per output partition.
    pub sample_size_multiplier: u32,
    /// Per-partition over-sampling hedge against imbalanced inputs.
    pub over_sample_factor: f32,
}

impl Default for ShuffleConfig {
    fn default() -> Self {
        Self {
            default_parallelism: None,
            sample_size_cap: 1_000_000,
            sample_size_multiplier: 20,
            over_sample_factor: 3.0,
        }
    }
}

impl ShuffleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_parallelism == Some(0) {
            return Err(ShuffleError::InvalidArgument(
                "default_parallelism must be at least 1".to_string(),
            ));
        }
        if self.sample_size_cap == 0 {
            return Err(ShuffleError::InvalidArgument(
                "sample_size_cap must be positive".to_string(),
            ));
        }
        if self.sample_size_multiplier == 0 {
            return Err(ShuffleError::InvalidArgument(
                "sample_size_multiplier must be at least 1".to_string(),
            ));
        }
        if !(self.over_sample_factor >= 1.0) {
            return Err(ShuffleError::InvalidArgument(format!(
                "over_sample_factor must be at least 1.0, got {}",
                self.over_sample_factor
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn default_config_is_valid() {
        assert!(ShuffleConfig::default().validate().is_ok());
    }

    #[rstest]
    #[case(ShuffleConfig { default_parallelism: Some(0), ..Default::default() })]
    #[case(ShuffleConfig { sample_size_cap: 0, ..Default::default() })]
    #[case(ShuffleConfig { sample_size_multiplier: 0, ..Default::default() })]
    #[case(ShuffleConfig { over_sample_factor: 0.5, ..Default::default() })]
    #[case(ShuffleConfig { over_sample_factor: f32::NAN, ..Default::default() })]
    fn bad_config_is_rejected(#[case] config: ShuffleConfig) {
        assert!(matches!(
            config.validate(),
            Err(ShuffleError::InvalidArgument(_))
        ));
    }
}
