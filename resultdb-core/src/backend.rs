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

//! The seam between the service and a concrete database.
//!
//! Both the HTTP backend and the local store implement [`ExperimentBackend`].
//! Everything crossing this trait is already in wire form; filter
//! validation and record mapping happen above it.

use crate::error::Result;
use crate::filter::{AnalysisResultQuery, ExperimentQuery};
use crate::wire::{DeviceComponentEntry, FileEntry, WireAnalysisResult, WireExperiment};

/// One page of a list call.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Continuation marker; `None` once the listing is exhausted.
    pub marker: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, marker: Option<String>) -> Self {
        Self { items, marker }
    }

    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            marker: None,
        }
    }
}

/// CRUD contract of the experiment results database.
///
/// Failures must use [`crate::ResultDbError::EntryExists`] for conflicting
/// creates and [`crate::ResultDbError::EntryNotFound`] for missing entries.
pub trait ExperimentBackend: Send + Sync {
    /// Devices known to the database.
    fn devices(&self) -> Result<Vec<serde_json::Value>>;

    /// Components of one device, or of all devices.
    fn device_components(&self, backend_name: Option<&str>) -> Result<Vec<DeviceComponentEntry>>;

    fn experiments(
        &self,
        query: &ExperimentQuery,
        limit: Option<usize>,
        marker: Option<&str>,
    ) -> Result<Page<WireExperiment>>;

    fn experiment_get(&self, experiment_id: &str) -> Result<WireExperiment>;

    /// Create an experiment; the response carries server-assigned fields.
    fn experiment_upload(&self, experiment: &WireExperiment) -> Result<WireExperiment>;

    fn experiment_update(
        &self,
        experiment_id: &str,
        experiment: &WireExperiment,
    ) -> Result<WireExperiment>;

    fn experiment_delete(&self, experiment_id: &str) -> Result<()>;

    /// Store a new figure; fails with `EntryExists` when the name is taken.
    fn figure_upload(&self, experiment_id: &str, figure_name: &str, figure: &[u8]) -> Result<()>;

    /// Replace an existing figure; fails with `EntryNotFound` when absent.
    fn figure_update(&self, experiment_id: &str, figure_name: &str, figure: &[u8]) -> Result<()>;

    fn figure_get(&self, experiment_id: &str, figure_name: &str) -> Result<Vec<u8>>;

    fn figure_delete(&self, experiment_id: &str, figure_name: &str) -> Result<()>;

    fn analysis_results(
        &self,
        query: &AnalysisResultQuery,
        limit: Option<usize>,
        marker: Option<&str>,
    ) -> Result<Page<WireAnalysisResult>>;

    fn analysis_result_get(&self, result_id: &str) -> Result<WireAnalysisResult>;

    fn analysis_result_create(&self, result: &WireAnalysisResult) -> Result<WireAnalysisResult>;

    fn analysis_result_update(
        &self,
        result_id: &str,
        result: &WireAnalysisResult,
    ) -> Result<WireAnalysisResult>;

    /// Apply several updates; entries are matched by `uuid`.
    fn bulk_analysis_result_update(
        &self,
        results: &[WireAnalysisResult],
    ) -> Result<Vec<WireAnalysisResult>>;

    fn analysis_result_delete(&self, result_id: &str) -> Result<()>;

    fn files(&self, experiment_id: &str) -> Result<Vec<FileEntry>>;

    fn file_upload(&self, experiment_id: &str, file_name: &str, contents: &str) -> Result<()>;

    fn file_download(&self, experiment_id: &str, file_name: &str) -> Result<serde_json::Value>;
}
