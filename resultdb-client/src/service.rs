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

//! Experiment Service
//!
//! Typed front end of the results database. Validates and encodes filters,
//! drives pagination, maps records to and from the wire format and attaches
//! operation context to backend errors. The backend (remote or local) is
//! chosen at construction.

use chrono::Local;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use resultdb_core::{
    decode_analysis_result, decode_experiment, encode_analysis_result, encode_experiment,
    AnalysisResultFilter, AnalysisResultRecord, ExperimentBackend, ExperimentFilter,
    ExperimentRecord, FileEntry, LocalStoreConfig, Page, RemoteSettings, Result,
    ResultTable, ServiceOptions,
};
use resultdb_storage::LocalStore;

use crate::bulk::{spawn_bulk_save, BulkSaveHandle, SaveStatus};
use crate::confirm::{Confirm, StdinConfirm};
use crate::pagination::paginate;
use crate::reconcile::create_or_update;
use crate::remote::RemoteBackend;

const DELETE_EXPERIMENT_PROMPT: &str = "Are you sure you want to delete the experiment? \
     Results and plots for the experiment will also be deleted. [y/N]: ";
const DELETE_RESULT_PROMPT: &str = "Are you sure you want to delete the analysis result? [y/N]: ";
const DELETE_FIGURE_PROMPT: &str = "Are you sure you want to delete the experiment plot? [y/N]: ";

const FIGURE_SUFFIX: &str = ".svg";
const DATA_FILE_SUFFIXES: &[&str] = &[".json", ".yaml"];

/// Figure contents, given directly or as a file to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FigureSource {
    Bytes(Vec<u8>),
    Path(PathBuf),
}

impl FigureSource {
    fn default_name(&self) -> String {
        match self {
            FigureSource::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.to_string_lossy().into_owned()),
            FigureSource::Bytes(_) => format!(
                "figure_{}{}",
                Local::now().format("%Y-%m-%dT%H:%M:%S%.6f"),
                FIGURE_SUFFIX
            ),
        }
    }

    fn read(&self) -> Result<Vec<u8>> {
        match self {
            FigureSource::Bytes(bytes) => Ok(bytes.clone()),
            FigureSource::Path(path) => Ok(fs::read(path)?),
        }
    }
}

impl From<Vec<u8>> for FigureSource {
    fn from(bytes: Vec<u8>) -> Self {
        FigureSource::Bytes(bytes)
    }
}

impl From<&[u8]> for FigureSource {
    fn from(bytes: &[u8]) -> Self {
        FigureSource::Bytes(bytes.to_vec())
    }
}

impl From<PathBuf> for FigureSource {
    fn from(path: PathBuf) -> Self {
        FigureSource::Path(path)
    }
}

impl From<&Path> for FigureSource {
    fn from(path: &Path) -> Self {
        FigureSource::Path(path.to_path_buf())
    }
}

/// Contents of a data file.
#[derive(Debug, Clone, PartialEq)]
pub enum FileData {
    /// Serialized before upload.
    Json(Value),
    /// Uploaded as is.
    Text(String),
}

impl FileData {
    fn into_text(self) -> Result<String> {
        match self {
            FileData::Json(value) => Ok(serde_json::to_string(&value)?),
            FileData::Text(text) => Ok(text),
        }
    }
}

impl From<Value> for FileData {
    fn from(value: Value) -> Self {
        FileData::Json(value)
    }
}

impl From<String> for FileData {
    fn from(text: String) -> Self {
        FileData::Text(text)
    }
}

impl From<&str> for FileData {
    fn from(text: &str) -> Self {
        FileData::Text(text.to_string())
    }
}

/// Figure queued for a bulk save.
pub type FigureUpload = (FigureSource, Option<String>);

/// Client of the experiment results database.
#[derive(Clone)]
pub struct ExperimentService {
    backend: Arc<dyn ExperimentBackend>,
    options: ServiceOptions,
    confirm: Arc<dyn Confirm>,
    local: bool,
}

impl std::fmt::Debug for ExperimentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExperimentService")
            .field("options", &self.options)
            .field("local", &self.local)
            .finish_non_exhaustive()
    }
}

impl ExperimentService {
    /// Service over an arbitrary backend.
    pub fn with_backend(backend: Arc<dyn ExperimentBackend>, local: bool, options: ServiceOptions) -> Self {
        Self {
            backend,
            options,
            confirm: Arc::new(StdinConfirm),
            local,
        }
    }

    /// Service over the hosted database.
    pub fn remote(settings: &RemoteSettings, options: ServiceOptions) -> Result<Self> {
        let backend = RemoteBackend::connect(settings, options.requests_timeout())?;
        Ok(Self::with_backend(Arc::new(backend), false, options))
    }

    /// Service over a local store.
    pub fn local(config: LocalStoreConfig, options: ServiceOptions) -> Result<Self> {
        let store = LocalStore::open(config)?;
        Ok(Self::with_backend(Arc::new(store), true, options))
    }

    /// Replace the delete confirmation.
    pub fn with_confirm(mut self, confirm: Arc<dyn Confirm>) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn is_local(&self) -> bool {
        self.local
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: ServiceOptions) {
        self.options = options;
    }

    // ------------------------------------------------------------------
    // Devices
    // ------------------------------------------------------------------

    /// Devices usable for experiments.
    pub fn backends(&self) -> Result<Vec<Value>> {
        self.backend.devices()
    }

    /// Component types of one device.
    pub fn device_components(&self, backend_name: &str) -> Result<Vec<String>> {
        let mut grouped = self.grouped_components(Some(backend_name))?;
        Ok(grouped.remove(backend_name).unwrap_or_default())
    }

    /// Component types of every device, keyed by device name.
    pub fn all_device_components(&self) -> Result<BTreeMap<String, Vec<String>>> {
        self.grouped_components(None)
    }

    fn grouped_components(&self, backend_name: Option<&str>) -> Result<BTreeMap<String, Vec<String>>> {
        let context = match backend_name {
            Some(name) => format!("Device components call for backend {} failed.", name),
            None => "Device components call failed.".to_string(),
        };
        let entries = self
            .backend
            .device_components(backend_name)
            .map_err(|err| err.with_context(&context))?;
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for entry in entries {
            grouped
                .entry(entry.device_name)
                .or_default()
                .push(entry.component_type);
        }
        Ok(grouped)
    }

    // ------------------------------------------------------------------
    // Experiments
    // ------------------------------------------------------------------

    /// Create an experiment; returns the record as stored.
    pub fn create_experiment(&self, record: &ExperimentRecord) -> Result<ExperimentRecord> {
        let mut record = record.clone();
        if let Some((hub, group, project)) = self.options.hub_group_project()? {
            record.hub = Some(hub);
            record.group = Some(group);
            record.project = Some(project);
        }
        let wire = encode_experiment(&record).for_create();
        if !self.local && (wire.hub_id.is_none() || wire.group_id.is_none() || wire.project_id.is_none()) {
            warn!("create_experiment() called without hub/group/project data");
        }
        let created = self
            .backend
            .experiment_upload(&wire)
            .map_err(|err| {
                err.with_context(format!("Experiment {} creation failed.", record.experiment_id))
            })?;
        decode_experiment(created)
    }

    /// Update an experiment. Identity, location, type and start time are
    /// never sent. Returns `None` when nothing is left to update.
    pub fn update_experiment(&self, record: &ExperimentRecord) -> Result<Option<ExperimentRecord>> {
        let wire = encode_experiment(record).for_update();
        if wire.is_empty() {
            warn!("update_experiment() called with nothing to update.");
            return Ok(None);
        }
        let updated = self
            .backend
            .experiment_update(&record.experiment_id, &wire)
            .map_err(|err| {
                err.with_context(format!("Experiment {} update failed.", record.experiment_id))
            })?;
        decode_experiment(updated).map(Some)
    }

    pub fn create_or_update_experiment(
        &self,
        record: &ExperimentRecord,
        create: bool,
    ) -> Result<Option<ExperimentRecord>> {
        create_or_update(
            || self.create_experiment(record).map(Some),
            || self.update_experiment(record),
            create,
            self.options.max_attempts,
        )
    }

    pub fn experiment(&self, experiment_id: &str) -> Result<ExperimentRecord> {
        let wire = self
            .backend
            .experiment_get(experiment_id)
            .map_err(|err| err.with_context(format!("Experiment {} not found.", experiment_id)))?;
        decode_experiment(wire)
    }

    /// List experiments matching `filter`, at most `limit` (`None`: all).
    pub fn experiments(&self, filter: &ExperimentFilter, limit: Option<usize>) -> Result<Vec<ExperimentRecord>> {
        let query = filter.to_query()?;
        paginate(limit, |remaining, marker| {
            let page = self
                .backend
                .experiments(&query, remaining, marker)
                .map_err(|err| err.with_context("Request failed."))?;
            let items = page
                .items
                .into_iter()
                .map(decode_experiment)
                .collect::<Result<Vec<_>>>()?;
            Ok(Page::new(items, page.marker))
        })
    }

    /// Delete an experiment with its results and figures.
    ///
    /// Prompts first unless `prompt_for_delete` is off. A missing experiment
    /// is logged and ignored.
    pub fn delete_experiment(&self, experiment_id: &str) -> Result<()> {
        if !self.confirm_delete(DELETE_EXPERIMENT_PROMPT) {
            return Ok(());
        }
        match self.backend.experiment_delete(experiment_id) {
            Err(err) if err.is_entry_not_found() => {
                warn!("Experiment {} not found.", experiment_id);
                Ok(())
            }
            other => other.map_err(|err| {
                err.with_context(format!("Experiment {} deletion failed.", experiment_id))
            }),
        }
    }

    // ------------------------------------------------------------------
    // Analysis results
    // ------------------------------------------------------------------

    /// Create an analysis result; returns its id.
    pub fn create_analysis_result(&self, record: &AnalysisResultRecord) -> Result<String> {
        let wire = encode_analysis_result(record).for_create();
        let created = self
            .backend
            .analysis_result_create(&wire)
            .map_err(|err| {
                err.with_context(format!("Analysis result {} creation failed.", record.result_id))
            })?;
        Ok(created.uuid.unwrap_or_else(|| record.result_id.clone()))
    }

    /// Update an analysis result. Its experiment, components and type are
    /// never sent.
    pub fn update_analysis_result(&self, record: &AnalysisResultRecord) -> Result<()> {
        let wire = encode_analysis_result(record).for_update();
        self.backend
            .analysis_result_update(&record.result_id, &wire)
            .map_err(|err| {
                err.with_context(format!("Analysis result {} update failed.", record.result_id))
            })?;
        Ok(())
    }

    /// Returns the id of the created or updated result.
    pub fn create_or_update_analysis_result(&self, record: &AnalysisResultRecord, create: bool) -> Result<String> {
        self.upsert_analysis_result(record, create, self.options.max_attempts)
    }

    fn upsert_analysis_result(
        &self,
        record: &AnalysisResultRecord,
        create: bool,
        max_attempts: u32,
    ) -> Result<String> {
        create_or_update(
            || self.create_analysis_result(record),
            || {
                self.update_analysis_result(record)
                    .map(|_| record.result_id.clone())
            },
            create,
            max_attempts,
        )
    }

    /// Update several results in one request.
    pub fn bulk_update_analysis_results(&self, records: &[AnalysisResultRecord]) -> Result<()> {
        let wires: Vec<_> = records
            .iter()
            .map(|record| encode_analysis_result(record).for_bulk_update())
            .collect();
        self.backend
            .bulk_analysis_result_update(&wires)
            .map_err(|err| err.with_context("Bulk analysis result update failed."))?;
        Ok(())
    }

    /// Save many results concurrently; returns without waiting.
    ///
    /// Each result goes through create-or-update starting with create.
    pub fn create_analysis_results(
        &self,
        records: Vec<AnalysisResultRecord>,
        max_workers: Option<usize>,
    ) -> BulkSaveHandle<AnalysisResultRecord, String> {
        let service = self.clone();
        let max_attempts = self.options.max_attempts;
        let workers = max_workers.unwrap_or(self.options.max_workers);
        spawn_bulk_save(records, workers, move |record: &AnalysisResultRecord| {
            service.upsert_analysis_result(record, true, max_attempts)
        })
    }

    /// [`Self::create_analysis_results`], waiting for every save.
    pub fn create_analysis_results_blocking(
        &self,
        records: Vec<AnalysisResultRecord>,
        max_workers: Option<usize>,
    ) -> SaveStatus<AnalysisResultRecord> {
        self.create_analysis_results(records, max_workers).wait()
    }

    /// Save the rows of a result table concurrently.
    pub fn create_analysis_results_from_table(
        &self,
        table: &ResultTable,
        max_workers: Option<usize>,
    ) -> Result<BulkSaveHandle<AnalysisResultRecord, String>> {
        Ok(self.create_analysis_results(table.to_results()?, max_workers))
    }

    pub fn analysis_result(&self, result_id: &str) -> Result<AnalysisResultRecord> {
        let wire = self
            .backend
            .analysis_result_get(result_id)
            .map_err(|err| err.with_context(format!("Analysis result {} not found.", result_id)))?;
        decode_analysis_result(wire)
    }

    /// List analysis results matching `filter`, at most `limit` (`None`: all).
    pub fn analysis_results(
        &self,
        filter: &AnalysisResultFilter,
        limit: Option<usize>,
    ) -> Result<Vec<AnalysisResultRecord>> {
        let query = filter.to_query()?;
        paginate(limit, |remaining, marker| {
            let page = self
                .backend
                .analysis_results(&query, remaining, marker)
                .map_err(|err| err.with_context("Request failed."))?;
            let items = page
                .items
                .into_iter()
                .map(decode_analysis_result)
                .collect::<Result<Vec<_>>>()?;
            Ok(Page::new(items, page.marker))
        })
    }

    /// [`Self::analysis_results`] as a table.
    pub fn analysis_results_table(
        &self,
        filter: &AnalysisResultFilter,
        limit: Option<usize>,
    ) -> Result<ResultTable> {
        Ok(ResultTable::from_results(&self.analysis_results(filter, limit)?))
    }

    /// Delete an analysis result; prompts like [`Self::delete_experiment`].
    pub fn delete_analysis_result(&self, result_id: &str) -> Result<()> {
        if !self.confirm_delete(DELETE_RESULT_PROMPT) {
            return Ok(());
        }
        match self.backend.analysis_result_delete(result_id) {
            Err(err) if err.is_entry_not_found() => {
                warn!("Analysis result {} not found.", result_id);
                Ok(())
            }
            other => other.map_err(|err| {
                err.with_context(format!("Analysis result {} deletion failed.", result_id))
            }),
        }
    }

    // ------------------------------------------------------------------
    // Figures
    // ------------------------------------------------------------------

    /// Store a new figure. Returns the stored name and size in bytes.
    ///
    /// Without a name, a path's file name or a timestamped name is used.
    /// Names always end in `.svg`.
    pub fn create_figure(
        &self,
        experiment_id: &str,
        figure: impl Into<FigureSource>,
        figure_name: Option<&str>,
    ) -> Result<(String, usize)> {
        let figure = figure.into();
        let name = figure_name_for(&figure, figure_name);
        let bytes = figure.read()?;
        self.backend
            .figure_upload(experiment_id, &name, &bytes)
            .map_err(|err| err.with_context(format!("Figure {} creation failed.", name)))?;
        Ok((name, bytes.len()))
    }

    /// Replace an existing figure. Naming follows [`Self::create_figure`].
    pub fn update_figure(
        &self,
        experiment_id: &str,
        figure: impl Into<FigureSource>,
        figure_name: Option<&str>,
    ) -> Result<(String, usize)> {
        let figure = figure.into();
        let name = figure_name_for(&figure, figure_name);
        let bytes = figure.read()?;
        self.backend
            .figure_update(experiment_id, &name, &bytes)
            .map_err(|err| err.with_context(format!("Figure {} update failed.", name)))?;
        Ok((name, bytes.len()))
    }

    pub fn create_or_update_figure(
        &self,
        experiment_id: &str,
        figure: impl Into<FigureSource>,
        figure_name: Option<&str>,
        create: bool,
    ) -> Result<(String, usize)> {
        self.upsert_figure(experiment_id, &figure.into(), figure_name, create, self.options.max_attempts)
    }

    fn upsert_figure(
        &self,
        experiment_id: &str,
        figure: &FigureSource,
        figure_name: Option<&str>,
        create: bool,
        max_attempts: u32,
    ) -> Result<(String, usize)> {
        // Resolve the name once so a generated name stays stable across attempts.
        let name = figure_name_for(figure, figure_name);
        create_or_update(
            || self.create_figure(experiment_id, figure.clone(), Some(&name)),
            || self.update_figure(experiment_id, figure.clone(), Some(&name)),
            create,
            max_attempts,
        )
    }

    /// Save many figures concurrently; returns without waiting.
    pub fn create_figures(
        &self,
        experiment_id: &str,
        figures: Vec<FigureUpload>,
        max_workers: Option<usize>,
    ) -> BulkSaveHandle<FigureUpload, (String, usize)> {
        let service = self.clone();
        let experiment_id = experiment_id.to_string();
        let max_attempts = self.options.max_attempts;
        let workers = max_workers.unwrap_or(self.options.max_workers);
        spawn_bulk_save(figures, workers, move |(figure, name): &FigureUpload| {
            service.upsert_figure(&experiment_id, figure, name.as_deref(), true, max_attempts)
        })
    }

    pub fn figure(&self, experiment_id: &str, figure_name: &str) -> Result<Vec<u8>> {
        self.backend
            .figure_get(experiment_id, figure_name)
            .map_err(|err| err.with_context(format!("Figure {} not found.", figure_name)))
    }

    /// Write a figure to `path`; returns the number of bytes written.
    pub fn figure_to_file(&self, experiment_id: &str, figure_name: &str, path: &Path) -> Result<usize> {
        let bytes = self.figure(experiment_id, figure_name)?;
        fs::write(path, &bytes)?;
        debug!(path = %path.display(), size = bytes.len(), "Saved figure");
        Ok(bytes.len())
    }

    /// Delete a figure; prompts like [`Self::delete_experiment`].
    pub fn delete_figure(&self, experiment_id: &str, figure_name: &str) -> Result<()> {
        if !self.confirm_delete(DELETE_FIGURE_PROMPT) {
            return Ok(());
        }
        match self.backend.figure_delete(experiment_id, figure_name) {
            Err(err) if err.is_entry_not_found() => {
                warn!("Figure {} not found.", figure_name);
                Ok(())
            }
            other => other
                .map_err(|err| err.with_context(format!("Figure {} deletion failed.", figure_name))),
        }
    }

    // ------------------------------------------------------------------
    // Data files
    // ------------------------------------------------------------------

    pub fn files(&self, experiment_id: &str) -> Result<Vec<FileEntry>> {
        self.backend.files(experiment_id).map_err(|err| {
            err.with_context(format!("Experiment {} file list not received.", experiment_id))
        })
    }

    /// Upload a data file. `.json` is appended unless the name already
    /// carries an accepted suffix.
    pub fn file_upload(&self, experiment_id: &str, file_name: &str, data: impl Into<FileData>) -> Result<()> {
        let name = data_file_name(file_name);
        let contents = data.into().into_text()?;
        self.backend
            .file_upload(experiment_id, &name, &contents)
            .map_err(|err| err.with_context(format!("File {} upload failed.", name)))
    }

    /// Download and parse a data file; naming follows [`Self::file_upload`].
    pub fn file_download(&self, experiment_id: &str, file_name: &str) -> Result<Value> {
        let name = data_file_name(file_name);
        self.backend
            .file_download(experiment_id, &name)
            .map_err(|err| err.with_context(format!("File {} download failed.", name)))
    }

    pub fn experiment_has_file(&self, experiment_id: &str, file_name: &str) -> Result<bool> {
        Ok(self
            .files(experiment_id)?
            .iter()
            .any(|entry| entry.key == file_name))
    }

    fn confirm_delete(&self, prompt: &str) -> bool {
        if !self.options.prompt_for_delete {
            return true;
        }
        let confirmed = self.confirm.confirm(prompt);
        if !confirmed {
            info!("Deletion cancelled");
        }
        confirmed
    }
}

fn figure_name_for(figure: &FigureSource, figure_name: Option<&str>) -> String {
    let mut name = match figure_name {
        Some(name) => name.to_string(),
        None => figure.default_name(),
    };
    if !name.ends_with(FIGURE_SUFFIX) {
        name.push_str(FIGURE_SUFFIX);
    }
    name
}

fn data_file_name(file_name: &str) -> String {
    if DATA_FILE_SUFFIXES.iter().any(|suffix| file_name.ends_with(suffix)) {
        file_name.to_string()
    } else {
        format!("{}.json", file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_figure_names() {
        let bytes = FigureSource::from(vec![1, 2, 3]);
        assert_eq!(figure_name_for(&bytes, Some("fit")), "fit.svg");
        assert_eq!(figure_name_for(&bytes, Some("fit.svg")), "fit.svg");
        let generated = figure_name_for(&bytes, None);
        assert!(generated.starts_with("figure_") && generated.ends_with(".svg"));

        let path = FigureSource::from(PathBuf::from("/tmp/plots/ramsey.svg"));
        assert_eq!(figure_name_for(&path, None), "ramsey.svg");
        let png = FigureSource::from(PathBuf::from("plot.png"));
        assert_eq!(figure_name_for(&png, None), "plot.png.svg");
    }

    #[test]
    fn test_data_file_names() {
        assert_eq!(data_file_name("params"), "params.json");
        assert_eq!(data_file_name("params.json"), "params.json");
        assert_eq!(data_file_name("params.yaml"), "params.yaml");
        assert_eq!(data_file_name("params.txt"), "params.txt.json");
    }

    #[test]
    fn test_file_data_serialization() {
        let data = FileData::from(serde_json::json!({"a": [1, 2]}));
        assert_eq!(data.into_text().unwrap(), r#"{"a":[1,2]}"#);
        assert_eq!(FileData::from("raw").into_text().unwrap(), "raw");
    }
}
