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

use thiserror::Error;

/// Error type shared by every cinder crate.
#[derive(Debug, Error)]
pub enum ShuffleError {
    /// Caller handed over something unusable (bad configuration values).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A sampling or pruning pass failed upstream. Construction that hits
    /// this fails as a whole; there is no partial partitioner.
    #[error("execution error: {0}")]
    Execution(String),

    /// Partitioner state could not be encoded, decoded, or rebuilt on the
    /// receiving side.
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T, E = ShuffleError> = std::result::Result<T, E>;
