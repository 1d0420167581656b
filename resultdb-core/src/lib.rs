// Copyright 2025 Sushanth (https://github.com/sushanthpy)
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

//! ResultDB Core
//!
//! Records, error taxonomy, filter translation and record mapping for the
//! experiment results database, plus the [`ExperimentBackend`] trait that
//! remote and local backends implement.

pub mod backend;
pub mod config;
pub mod error;
pub mod filter;
pub mod model;
pub mod tabular;
pub mod time;
pub mod wire;

pub use backend::{ExperimentBackend, Page};
pub use config::{
    LocalStoreConfig, RemoteSettings, ServiceOptions, DEFAULT_AUTH_URL, DEFAULT_LIST_LIMIT,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_WORKERS,
};
pub use error::{Result, ResultDbError};
pub use filter::{
    AnalysisResultFilter, AnalysisResultQuery, ExperimentFilter, ExperimentQuery, ParamValue,
    QualityInput,
};
pub use model::{
    AnalysisResultRecord, DeviceComponent, ExperimentRecord, Metadata, ResultQuality, ShareLevel,
};
pub use tabular::{ResultRow, ResultTable};
pub use wire::{
    decode_analysis_result, decode_experiment, encode_analysis_result, encode_experiment,
    DeviceComponentEntry, FileEntry, WireAnalysisResult, WireExperiment,
};
