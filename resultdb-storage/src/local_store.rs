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

//! Local Experiment Store
//!
//! In-process implementation of [`ExperimentBackend`] for offline work and
//! tests. All state sits behind one lock; with persistence enabled each
//! mutation is written through to the store directory (see [`crate::persist`]).
//!
//! Memory is updated before disk, so a failed write leaves the in-memory
//! state ahead of the files until the next successful save.

use chrono::Utc;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

use resultdb_core::{
    AnalysisResultQuery, DeviceComponentEntry, ExperimentBackend, ExperimentQuery, FileEntry,
    LocalStoreConfig, Page, Result, ResultDbError, WireAnalysisResult, WireExperiment,
};

use crate::persist::{check_blob_name, file_entry, timestamp, BlobKind, BlobMap, StoreFiles};
use crate::query::{
    experiment_sort_keys, experiment_sort_value, result_sort_keys, result_sort_value,
    sort_and_page, AnalysisResultMatcher, ExperimentMatcher,
};

#[derive(Debug, Default)]
struct StoreState {
    experiments: BTreeMap<String, WireExperiment>,
    results: BTreeMap<String, WireAnalysisResult>,
    figures: BlobMap,
    files: BTreeMap<String, BTreeMap<String, String>>,
    file_index: BTreeMap<String, Vec<FileEntry>>,
}

impl StoreState {
    fn figure_names(&self, experiment_id: &str) -> Vec<String> {
        self.figures
            .get(experiment_id)
            .map(|figures| figures.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn with_plot_names(&self, experiment: &WireExperiment) -> WireExperiment {
        let mut out = experiment.clone();
        let names = experiment
            .uuid
            .as_deref()
            .map(|id| self.figure_names(id))
            .unwrap_or_default();
        out.plot_names = if names.is_empty() { None } else { Some(names) };
        out
    }

    fn require_experiment(&self, experiment_id: &str) -> Result<()> {
        if self.experiments.contains_key(experiment_id) {
            Ok(())
        } else {
            Err(experiment_not_found(experiment_id))
        }
    }

    /// Stored result `result_id` with `update` laid over it. Leaves the
    /// state untouched.
    fn merged_result(&self, result_id: &str, update: &WireAnalysisResult) -> Result<WireAnalysisResult> {
        let current = self
            .results
            .get(result_id)
            .ok_or_else(|| result_not_found(result_id))?;
        let mut merged = overlay(current, update)?;
        merged.uuid = Some(result_id.to_string());
        merged.updated_at = Some(timestamp(Utc::now()));
        Ok(merged)
    }
}

/// Experiment store kept in memory, optionally mirrored to disk.
pub struct LocalStore {
    config: LocalStoreConfig,
    disk: Option<StoreFiles>,
    state: RwLock<StoreState>,
}

impl LocalStore {
    /// Open a store, loading any previously saved state.
    pub fn open(config: LocalStoreConfig) -> Result<Self> {
        let disk = match config.save_dir() {
            Some(dir) => Some(StoreFiles::open(dir)?),
            None => None,
        };
        let state = match &disk {
            Some(disk) => load_state(disk)?,
            None => StoreState::default(),
        };
        if let Some(disk) = &disk {
            info!(
                path = %disk.root().display(),
                experiments = state.experiments.len(),
                results = state.results.len(),
                "Opened local experiment store"
            );
        }
        let store = Self {
            config,
            disk,
            state: RwLock::new(state),
        };
        store.save_documents(&store.state.read())?;
        Ok(store)
    }

    /// Store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            config: LocalStoreConfig::in_memory(),
            disk: None,
            state: RwLock::new(StoreState::default()),
        }
    }

    pub fn config(&self) -> &LocalStoreConfig {
        &self.config
    }

    pub fn is_persistent(&self) -> bool {
        self.disk.is_some()
    }

    pub fn experiment_count(&self) -> usize {
        self.state.read().experiments.len()
    }

    pub fn analysis_result_count(&self) -> usize {
        self.state.read().results.len()
    }

    fn save_documents(&self, state: &StoreState) -> Result<()> {
        if let Some(disk) = &self.disk {
            disk.save_experiments(state.experiments.values())?;
            disk.save_results(state.results.values())?;
        }
        Ok(())
    }

    fn write_blob(&self, kind: BlobKind, experiment_id: &str, name: &str, bytes: &[u8]) -> Result<()> {
        match &self.disk {
            Some(disk) => disk.write_blob(kind, experiment_id, name, bytes),
            None => Ok(()),
        }
    }

    fn remove_blob(&self, kind: BlobKind, experiment_id: &str, name: &str) -> Result<()> {
        match &self.disk {
            Some(disk) => disk.remove_blob(kind, experiment_id, name),
            None => Ok(()),
        }
    }

    fn remove_experiment_blobs(&self, experiment_id: &str) -> Result<()> {
        match &self.disk {
            Some(disk) if check_blob_name("experiment id", experiment_id).is_ok() => {
                disk.remove_experiment_blobs(BlobKind::Figure, experiment_id)?;
                disk.remove_experiment_blobs(BlobKind::File, experiment_id)
            }
            _ => Ok(()),
        }
    }
}

impl ExperimentBackend for LocalStore {
    fn devices(&self) -> Result<Vec<Value>> {
        Ok(Vec::new())
    }

    fn device_components(&self, _backend_name: Option<&str>) -> Result<Vec<DeviceComponentEntry>> {
        Ok(Vec::new())
    }

    fn experiments(
        &self,
        query: &ExperimentQuery,
        limit: Option<usize>,
        marker: Option<&str>,
    ) -> Result<Page<WireExperiment>> {
        let matcher = ExperimentMatcher::compile(query, &self.config.user)?;
        let keys = experiment_sort_keys(query)?;
        let state = self.state.read();
        let matched: Vec<WireExperiment> = state
            .experiments
            .values()
            .filter(|exp| matcher.matches(exp))
            .map(|exp| state.with_plot_names(exp))
            .collect();
        debug!(matched = matched.len(), "Evaluated experiment query");
        sort_and_page(matched, &keys, experiment_sort_value, limit, marker)
    }

    fn experiment_get(&self, experiment_id: &str) -> Result<WireExperiment> {
        let state = self.state.read();
        state
            .experiments
            .get(experiment_id)
            .map(|exp| state.with_plot_names(exp))
            .ok_or_else(|| experiment_not_found(experiment_id))
    }

    fn experiment_upload(&self, experiment: &WireExperiment) -> Result<WireExperiment> {
        let now = timestamp(Utc::now());
        let mut created = experiment.clone();
        let experiment_id = created
            .uuid
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .clone();
        created.start_time.get_or_insert_with(|| now.clone());
        created.tags.get_or_insert_with(Vec::new);
        created.owner.get_or_insert_with(|| self.config.user.clone());
        created.created_at = Some(now.clone());
        created.updated_at = Some(now);

        let mut state = self.state.write();
        if state.experiments.contains_key(&experiment_id) {
            return Err(ResultDbError::EntryExists(format!(
                "Experiment {} already exists",
                experiment_id
            )));
        }
        state.experiments.insert(experiment_id.clone(), created.clone());
        self.save_documents(&state)?;
        debug!(experiment_id = %experiment_id, "Stored experiment");
        Ok(created)
    }

    fn experiment_update(
        &self,
        experiment_id: &str,
        experiment: &WireExperiment,
    ) -> Result<WireExperiment> {
        let mut state = self.state.write();
        let current = state
            .experiments
            .get(experiment_id)
            .ok_or_else(|| experiment_not_found(experiment_id))?;
        let mut merged = overlay(current, experiment)?;
        merged.uuid = Some(experiment_id.to_string());
        merged.updated_at = Some(timestamp(Utc::now()));
        state.experiments.insert(experiment_id.to_string(), merged.clone());
        self.save_documents(&state)?;
        Ok(state.with_plot_names(&merged))
    }

    fn experiment_delete(&self, experiment_id: &str) -> Result<()> {
        let mut state = self.state.write();
        if state.experiments.remove(experiment_id).is_none() {
            return Err(experiment_not_found(experiment_id));
        }
        let before = state.results.len();
        state
            .results
            .retain(|_, result| result.experiment_uuid.as_deref() != Some(experiment_id));
        let removed_results = before - state.results.len();
        let figures = state.figures.remove(experiment_id).unwrap_or_default();
        let files = state.files.remove(experiment_id).unwrap_or_default();
        state.file_index.remove(experiment_id);

        self.save_documents(&state)?;
        self.remove_experiment_blobs(experiment_id)?;
        debug!(
            experiment_id = %experiment_id,
            results = removed_results,
            figures = figures.len(),
            files = files.len(),
            "Deleted experiment"
        );
        Ok(())
    }

    fn figure_upload(&self, experiment_id: &str, figure_name: &str, figure: &[u8]) -> Result<()> {
        let mut state = self.state.write();
        state.require_experiment(experiment_id)?;
        check_blob_name("experiment id", experiment_id)?;
        check_blob_name("figure name", figure_name)?;
        if state.figure_names(experiment_id).iter().any(|name| name == figure_name) {
            return Err(ResultDbError::EntryExists(format!(
                "Figure {} already exists",
                figure_name
            )));
        }
        self.write_blob(BlobKind::Figure, experiment_id, figure_name, figure)?;
        state
            .figures
            .entry(experiment_id.to_string())
            .or_default()
            .insert(figure_name.to_string(), figure.to_vec());
        Ok(())
    }

    fn figure_update(&self, experiment_id: &str, figure_name: &str, figure: &[u8]) -> Result<()> {
        let mut state = self.state.write();
        let stored = state
            .figures
            .get_mut(experiment_id)
            .and_then(|figures| figures.get_mut(figure_name))
            .ok_or_else(|| figure_not_found(figure_name))?;
        *stored = figure.to_vec();
        self.write_blob(BlobKind::Figure, experiment_id, figure_name, figure)
    }

    fn figure_get(&self, experiment_id: &str, figure_name: &str) -> Result<Vec<u8>> {
        self.state
            .read()
            .figures
            .get(experiment_id)
            .and_then(|figures| figures.get(figure_name))
            .cloned()
            .ok_or_else(|| figure_not_found(figure_name))
    }

    fn figure_delete(&self, experiment_id: &str, figure_name: &str) -> Result<()> {
        let mut state = self.state.write();
        state
            .figures
            .get_mut(experiment_id)
            .and_then(|figures| figures.remove(figure_name))
            .ok_or_else(|| figure_not_found(figure_name))?;
        self.remove_blob(BlobKind::Figure, experiment_id, figure_name)
    }

    fn analysis_results(
        &self,
        query: &AnalysisResultQuery,
        limit: Option<usize>,
        marker: Option<&str>,
    ) -> Result<Page<WireAnalysisResult>> {
        let matcher = AnalysisResultMatcher::compile(query)?;
        let keys = result_sort_keys(query)?;
        let matched: Vec<WireAnalysisResult> = self
            .state
            .read()
            .results
            .values()
            .filter(|result| matcher.matches(result))
            .cloned()
            .collect();
        debug!(matched = matched.len(), "Evaluated analysis result query");
        sort_and_page(matched, &keys, result_sort_value, limit, marker)
    }

    fn analysis_result_get(&self, result_id: &str) -> Result<WireAnalysisResult> {
        self.state
            .read()
            .results
            .get(result_id)
            .cloned()
            .ok_or_else(|| result_not_found(result_id))
    }

    fn analysis_result_create(&self, result: &WireAnalysisResult) -> Result<WireAnalysisResult> {
        let experiment_id = result.experiment_uuid.clone().ok_or_else(|| {
            ResultDbError::request_failed("Cannot create analysis result without experiment id")
        })?;
        let mut state = self.state.write();
        let device_name = state
            .experiments
            .get(&experiment_id)
            .ok_or_else(|| {
                ResultDbError::EntryNotFound(format!("Experiment {} not found", experiment_id))
            })?
            .device_name
            .clone();

        let now = timestamp(Utc::now());
        let mut created = result.clone();
        let result_id = created
            .uuid
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .clone();
        if state.results.contains_key(&result_id) {
            return Err(ResultDbError::EntryExists(format!(
                "Analysis result {} already exists",
                result_id
            )));
        }
        created.device_name = device_name;
        created.created_at = Some(now.clone());
        created.updated_at = Some(now);
        state.results.insert(result_id.clone(), created.clone());
        self.save_documents(&state)?;
        debug!(result_id = %result_id, experiment_id = %experiment_id, "Stored analysis result");
        Ok(created)
    }

    fn analysis_result_update(
        &self,
        result_id: &str,
        result: &WireAnalysisResult,
    ) -> Result<WireAnalysisResult> {
        let mut state = self.state.write();
        let updated = state.merged_result(result_id, result)?;
        state.results.insert(result_id.to_string(), updated.clone());
        self.save_documents(&state)?;
        Ok(updated)
    }

    fn bulk_analysis_result_update(
        &self,
        results: &[WireAnalysisResult],
    ) -> Result<Vec<WireAnalysisResult>> {
        let mut state = self.state.write();
        // Every entry is merged before any is stored, so a bad entry leaves
        // the whole batch unapplied.
        let mut updated = Vec::with_capacity(results.len());
        for entry in results {
            let result_id = entry.uuid.as_deref().ok_or_else(|| {
                ResultDbError::request_failed("Bulk update entry is missing its uuid")
            })?;
            updated.push(state.merged_result(result_id, entry)?);
        }
        for merged in &updated {
            if let Some(result_id) = &merged.uuid {
                state.results.insert(result_id.clone(), merged.clone());
            }
        }
        self.save_documents(&state)?;
        Ok(updated)
    }

    fn analysis_result_delete(&self, result_id: &str) -> Result<()> {
        let mut state = self.state.write();
        if state.results.remove(result_id).is_none() {
            return Err(result_not_found(result_id));
        }
        self.save_documents(&state)
    }

    fn files(&self, experiment_id: &str) -> Result<Vec<FileEntry>> {
        Ok(self
            .state
            .read()
            .file_index
            .get(experiment_id)
            .cloned()
            .unwrap_or_default())
    }

    fn file_upload(&self, experiment_id: &str, file_name: &str, contents: &str) -> Result<()> {
        let mut state = self.state.write();
        state.require_experiment(experiment_id)?;
        check_blob_name("experiment id", experiment_id)?;
        check_blob_name("file name", file_name)?;
        self.write_blob(BlobKind::File, experiment_id, file_name, contents.as_bytes())?;
        state
            .files
            .entry(experiment_id.to_string())
            .or_default()
            .insert(file_name.to_string(), contents.to_string());
        let index = state.file_index.entry(experiment_id.to_string()).or_default();
        index.retain(|entry| entry.key != file_name);
        index.push(file_entry(file_name, contents.len(), Utc::now()));
        Ok(())
    }

    fn file_download(&self, experiment_id: &str, file_name: &str) -> Result<Value> {
        let state = self.state.read();
        let contents = state
            .files
            .get(experiment_id)
            .and_then(|files| files.get(file_name))
            .ok_or_else(|| {
                ResultDbError::EntryNotFound(format!(
                    "File {} not found for experiment {}",
                    file_name, experiment_id
                ))
            })?;
        Ok(serde_json::from_str(contents)?)
    }
}

fn load_state(disk: &StoreFiles) -> Result<StoreState> {
    let mut state = StoreState::default();
    for exp in disk.load_experiments()? {
        if let Some(id) = exp.uuid.clone() {
            state.experiments.insert(id, exp);
        }
    }
    for result in disk.load_results()? {
        if let Some(id) = result.uuid.clone() {
            state.results.insert(id, result);
        }
    }
    let ids: Vec<String> = state.experiments.keys().cloned().collect();
    for id in ids {
        if check_blob_name("experiment id", &id).is_err() {
            // Such an experiment can never have had blobs written for it.
            continue;
        }
        let figures: BTreeMap<String, Vec<u8>> = disk
            .load_blobs(BlobKind::Figure, &id)?
            .into_iter()
            .map(|blob| (blob.name, blob.bytes))
            .collect();
        if !figures.is_empty() {
            state.figures.insert(id.clone(), figures);
        }

        let mut files = BTreeMap::new();
        let mut index = Vec::new();
        for blob in disk.load_blobs(BlobKind::File, &id)? {
            let contents = String::from_utf8(blob.bytes).map_err(|err| {
                ResultDbError::Serialization(format!("data file {} is not UTF-8: {}", blob.name, err))
            })?;
            index.push(file_entry(
                &blob.name,
                contents.len(),
                blob.modified.unwrap_or_else(Utc::now),
            ));
            files.insert(blob.name, contents);
        }
        if !files.is_empty() {
            state.files.insert(id.clone(), files);
            state.file_index.insert(id, index);
        }
    }
    Ok(state)
}

/// Replace every field present in `update` on a copy of `current`.
fn overlay<T: Serialize + DeserializeOwned>(current: &T, update: &T) -> Result<T> {
    let mut base = serde_json::to_value(current)?;
    if let (Value::Object(base), Value::Object(patch)) = (&mut base, serde_json::to_value(update)?) {
        for (key, value) in patch {
            base.insert(key, value);
        }
    }
    Ok(serde_json::from_value(base)?)
}

fn experiment_not_found(experiment_id: &str) -> ResultDbError {
    ResultDbError::EntryNotFound(format!("Experiment {} not found", experiment_id))
}

fn result_not_found(result_id: &str) -> ResultDbError {
    ResultDbError::EntryNotFound(format!("Analysis result {} not found", result_id))
}

fn figure_not_found(figure_name: &str) -> ResultDbError {
    ResultDbError::EntryNotFound(format!("Figure {} not found", figure_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use resultdb_core::{AnalysisResultFilter, ExperimentFilter};

    fn experiment(id: &str, kind: &str, device: &str) -> WireExperiment {
        WireExperiment {
            uuid: Some(id.to_string()),
            experiment_type: Some(kind.to_string()),
            device_name: Some(device.to_string()),
            ..Default::default()
        }
    }

    fn result(id: &str, experiment_id: &str, kind: &str) -> WireAnalysisResult {
        WireAnalysisResult {
            uuid: Some(id.to_string()),
            experiment_uuid: Some(experiment_id.to_string()),
            result_type: Some(kind.to_string()),
            quality: Some("Good".to_string()),
            verified: Some(false),
            ..Default::default()
        }
    }

    #[test]
    fn test_upload_assigns_defaults() {
        let store = LocalStore::in_memory();
        let created = store.experiment_upload(&WireExperiment::default()).unwrap();
        assert!(created.uuid.is_some());
        assert!(created.start_time.is_some());
        assert_eq!(created.tags, Some(vec![]));
        assert_eq!(created.owner.as_deref(), Some("local"));
    }

    #[test]
    fn test_duplicate_experiment_rejected() {
        let store = LocalStore::in_memory();
        store.experiment_upload(&experiment("e1", "T1", "B1")).unwrap();
        let err = store.experiment_upload(&experiment("e1", "T1", "B1")).unwrap_err();
        assert!(err.is_entry_exists());
    }

    #[test]
    fn test_update_overlays_present_fields() {
        let store = LocalStore::in_memory();
        store.experiment_upload(&experiment("e1", "T1", "B1")).unwrap();
        let update = WireExperiment {
            notes: Some("calibrated".into()),
            ..Default::default()
        };
        let updated = store.experiment_update("e1", &update).unwrap();
        assert_eq!(updated.notes.as_deref(), Some("calibrated"));
        assert_eq!(updated.experiment_type.as_deref(), Some("T1"));

        let err = store.experiment_update("missing", &update).unwrap_err();
        assert!(err.is_entry_not_found());
    }

    #[test]
    fn test_result_requires_existing_experiment() {
        let store = LocalStore::in_memory();
        let orphan = WireAnalysisResult::default();
        let err = store.analysis_result_create(&orphan).unwrap_err();
        assert!(matches!(err, ResultDbError::RequestFailed { status: None, .. }));

        let err = store.analysis_result_create(&result("r1", "nope", "T1")).unwrap_err();
        assert!(err.is_entry_not_found());

        store.experiment_upload(&experiment("e1", "T1", "B1")).unwrap();
        let created = store.analysis_result_create(&result("r1", "e1", "T1")).unwrap();
        assert_eq!(created.device_name.as_deref(), Some("B1"));
    }

    #[test]
    fn test_bulk_update_matches_by_uuid() {
        let store = LocalStore::in_memory();
        store.experiment_upload(&experiment("e1", "T1", "B1")).unwrap();
        store.analysis_result_create(&result("r1", "e1", "T1")).unwrap();
        store.analysis_result_create(&result("r2", "e1", "T1")).unwrap();

        let updates = vec![
            WireAnalysisResult {
                uuid: Some("r1".into()),
                verified: Some(true),
                ..Default::default()
            },
            WireAnalysisResult {
                uuid: Some("r2".into()),
                quality: Some("Bad".into()),
                ..Default::default()
            },
        ];
        store.bulk_analysis_result_update(&updates).unwrap();
        assert_eq!(store.analysis_result_get("r1").unwrap().verified, Some(true));
        assert_eq!(store.analysis_result_get("r2").unwrap().quality.as_deref(), Some("Bad"));
    }

    #[test]
    fn test_bulk_update_is_all_or_nothing() {
        let store = LocalStore::in_memory();
        store.experiment_upload(&experiment("e1", "T1", "B1")).unwrap();
        store.analysis_result_create(&result("r1", "e1", "T1")).unwrap();

        let updates = vec![
            WireAnalysisResult {
                uuid: Some("r1".into()),
                verified: Some(true),
                ..Default::default()
            },
            WireAnalysisResult {
                uuid: Some("r2".into()),
                quality: Some("Bad".into()),
                ..Default::default()
            },
        ];
        let err = store.bulk_analysis_result_update(&updates).unwrap_err();
        assert!(err.is_entry_not_found());
        assert_eq!(store.analysis_result_get("r1").unwrap().verified, Some(false));

        let missing_uuid = vec![updates[0].clone(), WireAnalysisResult::default()];
        assert!(store.bulk_analysis_result_update(&missing_uuid).is_err());
        assert_eq!(store.analysis_result_get("r1").unwrap().verified, Some(false));
    }

    #[test]
    fn test_blob_uploads_require_experiment() {
        let store = LocalStore::in_memory();
        let err = store.figure_upload("ghost", "a.svg", b"x").unwrap_err();
        assert!(err.is_entry_not_found());
        let err = store.file_upload("ghost", "a.json", "{}").unwrap_err();
        assert!(err.is_entry_not_found());
        assert!(store.figure_get("ghost", "a.svg").unwrap_err().is_entry_not_found());
        assert!(store.files("ghost").unwrap().is_empty());
    }

    #[test]
    fn test_blob_names_must_be_plain() {
        let store = LocalStore::in_memory();
        store.experiment_upload(&experiment("e1", "T1", "B1")).unwrap();
        let err = store.figure_upload("e1", "../a.svg", b"x").unwrap_err();
        assert!(matches!(err, ResultDbError::InvalidArgument(_)));
        let err = store.file_upload("e1", "sub/a.json", "{}").unwrap_err();
        assert!(matches!(err, ResultDbError::InvalidArgument(_)));
        assert_eq!(store.experiment_get("e1").unwrap().plot_names, None);
        assert!(store.files("e1").unwrap().is_empty());
    }

    #[test]
    fn test_figure_conflicts() {
        let store = LocalStore::in_memory();
        store.experiment_upload(&experiment("e1", "T1", "B1")).unwrap();
        store.figure_upload("e1", "a.svg", b"one").unwrap();
        assert!(store.figure_upload("e1", "a.svg", b"two").unwrap_err().is_entry_exists());
        assert!(store.figure_update("e1", "b.svg", b"two").unwrap_err().is_entry_not_found());
        store.figure_update("e1", "a.svg", b"two").unwrap();
        assert_eq!(store.figure_get("e1", "a.svg").unwrap(), b"two");
        store.figure_delete("e1", "a.svg").unwrap();
        assert!(store.figure_get("e1", "a.svg").unwrap_err().is_entry_not_found());
    }

    #[test]
    fn test_plot_names_reported_on_get() {
        let store = LocalStore::in_memory();
        store.experiment_upload(&experiment("e1", "T1", "B1")).unwrap();
        store.figure_upload("e1", "fit.svg", b"<svg/>").unwrap();
        let exp = store.experiment_get("e1").unwrap();
        assert_eq!(exp.plot_names, Some(vec!["fit.svg".to_string()]));
    }

    #[test]
    fn test_file_upload_replaces_index_entry() {
        let store = LocalStore::in_memory();
        store.experiment_upload(&experiment("e1", "T1", "B1")).unwrap();
        store.file_upload("e1", "data.json", r#"{"a": 1}"#).unwrap();
        store.file_upload("e1", "data.json", r#"{"a": 22}"#).unwrap();
        let index = store.files("e1").unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].size, 9);
        assert_eq!(store.file_download("e1", "data.json").unwrap()["a"], 22);
        assert!(store.file_download("e1", "other.json").unwrap_err().is_entry_not_found());
    }

    #[test]
    fn test_experiment_device_component_filter_unsupported() {
        let store = LocalStore::in_memory();
        let query = ExperimentFilter::new()
            .device_components(["Q0"])
            .to_query()
            .unwrap();
        let err = store.experiments(&query, None, None).unwrap_err();
        assert!(matches!(err, ResultDbError::InvalidFilter(_)));
    }

    #[test]
    fn test_result_quality_filter() {
        let store = LocalStore::in_memory();
        store.experiment_upload(&experiment("e1", "T1", "B1")).unwrap();
        store.analysis_result_create(&result("r1", "e1", "T1")).unwrap();
        let mut bad = result("r2", "e1", "T1");
        bad.quality = Some("Bad".into());
        store.analysis_result_create(&bad).unwrap();

        let query = AnalysisResultFilter::new().quality("bad").to_query().unwrap();
        let page = store.analysis_results(&query, None, None).unwrap();
        let ids: Vec<_> = page.items.iter().filter_map(|r| r.uuid.clone()).collect();
        assert_eq!(ids, vec!["r2"]);
    }
}
