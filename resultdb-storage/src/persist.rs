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

//! On-disk layout of the local store.
//!
//! ```text
//! {main_dir}/experiments.json
//! {main_dir}/results.json
//! {main_dir}/figures/{experiment_id}/{figure_name}
//! {main_dir}/files/{experiment_id}/{file_name}
//! ```
//!
//! The two JSON documents are rewritten whole after every mutation. Figures
//! and data files are written one file at a time. Experiment ids and blob
//! names become path components, so [`check_blob_name`] must accept both
//! before anything touches the disk.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use resultdb_core::{FileEntry, Result, ResultDbError, WireAnalysisResult, WireExperiment};

const EXPERIMENTS_FILE: &str = "experiments.json";
const RESULTS_FILE: &str = "results.json";
const FIGURES_DIR: &str = "figures";
const FILES_DIR: &str = "files";

/// Which blob directory an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlobKind {
    Figure,
    File,
}

impl BlobKind {
    fn dir_name(self) -> &'static str {
        match self {
            BlobKind::Figure => FIGURES_DIR,
            BlobKind::File => FILES_DIR,
        }
    }
}

/// Blob read back from disk.
#[derive(Debug, Clone)]
pub(crate) struct StoredBlob {
    pub name: String,
    pub bytes: Vec<u8>,
    pub modified: Option<DateTime<Utc>>,
}

/// Handle on a store directory.
#[derive(Debug, Clone)]
pub(crate) struct StoreFiles {
    root: PathBuf,
}

impl StoreFiles {
    /// Open `root`, creating it and the blob directories when missing.
    pub(crate) fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root.join(FIGURES_DIR))?;
        fs::create_dir_all(root.join(FILES_DIR))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn load_experiments(&self) -> Result<Vec<WireExperiment>> {
        self.load_document(EXPERIMENTS_FILE)
    }

    pub(crate) fn load_results(&self) -> Result<Vec<WireAnalysisResult>> {
        self.load_document(RESULTS_FILE)
    }

    pub(crate) fn save_experiments<'a, I>(&self, experiments: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a WireExperiment>,
    {
        let all: Vec<&WireExperiment> = experiments.into_iter().collect();
        self.save_document(EXPERIMENTS_FILE, &all)
    }

    pub(crate) fn save_results<'a, I>(&self, results: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a WireAnalysisResult>,
    {
        let all: Vec<&WireAnalysisResult> = results.into_iter().collect();
        self.save_document(RESULTS_FILE, &all)
    }

    /// Blobs stored for `experiment_id`.
    pub(crate) fn load_blobs(&self, kind: BlobKind, experiment_id: &str) -> Result<Vec<StoredBlob>> {
        check_blob_name("experiment id", experiment_id)?;
        let dir = self.blob_dir(kind, experiment_id);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut blobs = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified().ok().map(DateTime::<Utc>::from);
            blobs.push(StoredBlob {
                name: entry.file_name().to_string_lossy().into_owned(),
                bytes: fs::read(entry.path())?,
                modified,
            });
        }
        blobs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(blobs)
    }

    pub(crate) fn write_blob(
        &self,
        kind: BlobKind,
        experiment_id: &str,
        name: &str,
        bytes: &[u8],
    ) -> Result<()> {
        let path = self.blob_path(kind, experiment_id, name)?;
        fs::create_dir_all(self.blob_dir(kind, experiment_id))?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Remove a blob; an already missing file is not an error.
    pub(crate) fn remove_blob(&self, kind: BlobKind, experiment_id: &str, name: &str) -> Result<()> {
        ignore_missing(fs::remove_file(self.blob_path(kind, experiment_id, name)?))
    }

    /// Remove every blob of one kind stored for `experiment_id`.
    pub(crate) fn remove_experiment_blobs(&self, kind: BlobKind, experiment_id: &str) -> Result<()> {
        check_blob_name("experiment id", experiment_id)?;
        ignore_missing(fs::remove_dir_all(self.blob_dir(kind, experiment_id)))
    }

    fn blob_dir(&self, kind: BlobKind, experiment_id: &str) -> PathBuf {
        self.root.join(kind.dir_name()).join(experiment_id)
    }

    fn blob_path(&self, kind: BlobKind, experiment_id: &str, name: &str) -> Result<PathBuf> {
        check_blob_name("experiment id", experiment_id)?;
        check_blob_name("name", name)?;
        Ok(self.blob_dir(kind, experiment_id).join(name))
    }

    fn load_document<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>> {
        let path = self.root.join(file);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&path)?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn save_document<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        fs::write(self.root.join(file), json)?;
        Ok(())
    }
}

/// Reject a value that cannot be used as a single path component.
///
/// `label` names the value in the error message.
pub(crate) fn check_blob_name(label: &str, value: &str) -> Result<()> {
    let invalid = value.is_empty()
        || value == "."
        || value.contains("..")
        || value.contains(['/', '\\', '\0']);
    if invalid {
        return Err(ResultDbError::InvalidArgument(format!(
            "Invalid {} {:?}: it must be a plain file name.",
            label, value
        )));
    }
    Ok(())
}

fn ignore_missing(outcome: std::io::Result<()>) -> Result<()> {
    match outcome {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Index entry for a data file.
pub(crate) fn file_entry(name: &str, size: usize, modified: DateTime<Utc>) -> FileEntry {
    FileEntry {
        key: name.to_string(),
        size: size as u64,
        last_modified: serde_json::Value::String(timestamp(modified)),
    }
}

/// Timestamp format used for everything the store assigns.
pub(crate) fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Map of `experiment_id -> name -> bytes` plus a file index, as loaded.
pub(crate) type BlobMap = BTreeMap<String, BTreeMap<String, Vec<u8>>>;
