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

//! Wire representation of records and the mapping to and from domain records.
//!
//! Encoding is sparse: empty strings, empty collections and unset options
//! are never sent, so an update only touches the fields the caller filled in.
//! Decoding fills missing collections with empty containers and ignores
//! fields the client does not know about.

use serde::{Deserialize, Serialize};

use crate::error::{ResultDbError, Result};
use crate::model::{
    AnalysisResultRecord, DeviceComponent, ExperimentRecord, Metadata, ResultQuality, ShareLevel,
};
use crate::time::{local_to_utc_str, utc_to_local};

/// Experiment as exchanged with the results database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireExperiment {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub experiment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_experiment_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hub_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    // Server-assigned; never part of a create or update body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plot_names: Option<Vec<String>>,
}

impl WireExperiment {
    /// Body for a create request.
    pub fn for_create(mut self) -> Self {
        self.created_at = None;
        self.updated_at = None;
        self.owner = None;
        self.plot_names = None;
        self
    }

    /// Body for an update request; identity and placement are immutable.
    pub fn for_update(self) -> Self {
        let mut out = self.for_create();
        out.uuid = None;
        out.device_name = None;
        out.group_id = None;
        out.hub_id = None;
        out.project_id = None;
        out.experiment_type = None;
        out.start_time = None;
        out
    }

    pub fn is_empty(&self) -> bool {
        *self == WireExperiment::default()
    }
}

/// Analysis result as exchanged with the results database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireAnalysisResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_components: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit: Option<Metadata>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub result_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chisq: Option<f64>,
    // Server-assigned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl WireAnalysisResult {
    /// Body for a create request.
    pub fn for_create(mut self) -> Self {
        self.device_name = None;
        self.created_at = None;
        self.updated_at = None;
        self
    }

    /// Body for a single update request.
    pub fn for_update(self) -> Self {
        let mut out = self.for_bulk_update();
        out.uuid = None;
        out
    }

    /// Entry of a bulk update envelope; keeps `uuid` so the server can match it.
    pub fn for_bulk_update(self) -> Self {
        let mut out = self.for_create();
        out.experiment_uuid = None;
        out.device_components = None;
        out.result_type = None;
        out
    }
}

/// Wire spelling of result quality.
///
/// Distinct from the tabular spelling in [`crate::tabular`].
pub fn quality_to_api(quality: ResultQuality) -> &'static str {
    match quality {
        ResultQuality::Good => "Good",
        ResultQuality::Bad => "Bad",
        ResultQuality::Unknown => "No Information",
    }
}

pub fn quality_from_api(value: &str) -> Result<ResultQuality> {
    match value {
        "Good" => Ok(ResultQuality::Good),
        "Bad" => Ok(ResultQuality::Bad),
        "No Information" => Ok(ResultQuality::Unknown),
        other => Err(ResultDbError::Serialization(format!(
            "unknown quality value '{}' in server response",
            other
        ))),
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn non_empty_opt(value: &Option<String>) -> Option<String> {
    value.as_deref().and_then(non_empty)
}

fn non_empty_vec<T: Clone>(values: &[T]) -> Option<Vec<T>> {
    if values.is_empty() {
        None
    } else {
        Some(values.to_vec())
    }
}

fn convert_dt(
    value: Option<&str>,
) -> Result<Option<chrono::DateTime<chrono::FixedOffset>>> {
    match value {
        Some(text) if !text.is_empty() => Ok(Some(utc_to_local(text)?)),
        _ => Ok(None),
    }
}

/// Encode an experiment into its sparse wire form.
pub fn encode_experiment(record: &ExperimentRecord) -> WireExperiment {
    WireExperiment {
        experiment_type: non_empty(&record.experiment_type),
        device_name: non_empty(&record.backend),
        extra: if record.metadata.is_empty() {
            None
        } else {
            Some(record.metadata.clone())
        },
        uuid: non_empty(&record.experiment_id),
        parent_experiment_uuid: non_empty_opt(&record.parent_id),
        hub_id: non_empty_opt(&record.hub),
        group_id: non_empty_opt(&record.group),
        project_id: non_empty_opt(&record.project),
        visibility: record.share_level.map(|level| level.as_str().to_string()),
        tags: non_empty_vec(&record.tags),
        jobs: non_empty_vec(&record.job_ids),
        notes: non_empty_opt(&record.notes),
        start_time: record.start_datetime.as_ref().map(local_to_utc_str),
        end_time: record.end_datetime.as_ref().map(local_to_utc_str),
        created_at: record.creation_datetime.as_ref().map(local_to_utc_str),
        updated_at: record.updated_datetime.as_ref().map(local_to_utc_str),
        owner: non_empty_opt(&record.owner),
        plot_names: non_empty_vec(&record.figure_names),
    }
}

/// Decode a wire experiment into a full record.
pub fn decode_experiment(wire: WireExperiment) -> Result<ExperimentRecord> {
    let experiment_id = wire.uuid.ok_or_else(|| {
        ResultDbError::Serialization("experiment payload has no 'uuid'".to_string())
    })?;
    let share_level = match wire.visibility.as_deref() {
        Some(text) if !text.is_empty() => Some(text.parse::<ShareLevel>().map_err(|_| {
            ResultDbError::Serialization(format!("unknown visibility '{}'", text))
        })?),
        _ => None,
    };

    Ok(ExperimentRecord {
        experiment_id,
        parent_id: wire.parent_experiment_uuid,
        experiment_type: wire.experiment_type.unwrap_or_default(),
        backend: wire.device_name.unwrap_or_default(),
        tags: wire.tags.unwrap_or_default(),
        job_ids: wire.jobs.unwrap_or_default(),
        share_level,
        metadata: wire.extra.unwrap_or_default(),
        figure_names: wire.plot_names.unwrap_or_default(),
        notes: wire.notes,
        hub: wire.hub_id,
        group: wire.group_id,
        project: wire.project_id,
        owner: wire.owner,
        creation_datetime: convert_dt(wire.created_at.as_deref())?,
        start_datetime: convert_dt(wire.start_time.as_deref())?,
        end_datetime: convert_dt(wire.end_time.as_deref())?,
        updated_datetime: convert_dt(wire.updated_at.as_deref())?,
    })
}

/// Encode an analysis result into its sparse wire form.
///
/// `quality` and `verified` are always present. `chisq` is sent only when
/// the record has one.
pub fn encode_analysis_result(record: &AnalysisResultRecord) -> WireAnalysisResult {
    WireAnalysisResult {
        experiment_uuid: non_empty(&record.experiment_id),
        device_components: if record.device_components.is_empty() {
            None
        } else {
            Some(
                record
                    .device_components
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            )
        },
        fit: if record.result_data.is_empty() {
            None
        } else {
            Some(record.result_data.clone())
        },
        result_type: non_empty(&record.result_type),
        tags: non_empty_vec(&record.tags),
        quality: Some(quality_to_api(record.quality).to_string()),
        verified: Some(record.verified),
        uuid: non_empty(&record.result_id),
        chisq: record.chisq,
        device_name: non_empty_opt(&record.backend_name),
        created_at: record.creation_datetime.as_ref().map(local_to_utc_str),
        updated_at: record.updated_datetime.as_ref().map(local_to_utc_str),
    }
}

/// Decode a wire analysis result into a full record.
pub fn decode_analysis_result(wire: WireAnalysisResult) -> Result<AnalysisResultRecord> {
    let result_id = wire.uuid.ok_or_else(|| {
        ResultDbError::Serialization("analysis result payload has no 'uuid'".to_string())
    })?;
    let quality = match wire.quality.as_deref() {
        Some(text) if !text.is_empty() => quality_from_api(text)?,
        _ => ResultQuality::Unknown,
    };

    Ok(AnalysisResultRecord {
        result_id,
        experiment_id: wire.experiment_uuid.unwrap_or_default(),
        result_type: wire.result_type.unwrap_or_default(),
        result_data: wire.fit.unwrap_or_default(),
        device_components: wire
            .device_components
            .unwrap_or_default()
            .iter()
            .map(|c| DeviceComponent::parse(c))
            .collect(),
        quality,
        verified: wire.verified.unwrap_or(false),
        tags: wire.tags.unwrap_or_default(),
        backend_name: wire.device_name.filter(|name| !name.is_empty()),
        chisq: wire.chisq,
        creation_datetime: convert_dt(wire.created_at.as_deref())?,
        updated_datetime: convert_dt(wire.updated_at.as_deref())?,
    })
}

/// `GET /experiments` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperimentsEnvelope {
    #[serde(default)]
    pub experiments: Vec<WireExperiment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
}

/// `GET /analysis_results` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisResultsEnvelope {
    #[serde(default)]
    pub analysis_results: Vec<WireAnalysisResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
}

/// Request and response body of the bulk update endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkUpdateEnvelope {
    pub analysis_results: Vec<WireAnalysisResult>,
}

/// One entry of an experiment's data file listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Size")]
    pub size: u64,
    #[serde(rename = "LastModified")]
    pub last_modified: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilesEnvelope {
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

/// One component of a device, as listed by `GET /device_components`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceComponentEntry {
    pub device_name: String,
    #[serde(rename = "type")]
    pub component_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceComponentsEnvelope {
    #[serde(default)]
    pub device_components: Vec<DeviceComponentEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DevicesEnvelope {
    #[serde(default)]
    pub devices: Vec<serde_json::Value>,
}

/// Presigned upload location returned by the upload endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadUrl {
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_experiment_encoding_is_sparse() {
        let record = ExperimentRecord::new("rb", "dev1").with_id("e1");
        let value = serde_json::to_value(encode_experiment(&record)).unwrap();
        assert_eq!(value, json!({"type": "rb", "device_name": "dev1", "uuid": "e1"}));
    }

    #[test]
    fn test_experiment_update_strips_immutable_fields() {
        let start = chrono::DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z").unwrap();
        let record = ExperimentRecord::new("rb", "dev1")
            .with_id("e1")
            .with_location("h", "g", "p")
            .with_tags(["x"])
            .with_start(start)
            .with_share_level(ShareLevel::Project);
        let wire = encode_experiment(&record).for_update();
        let value = serde_json::to_value(&wire).unwrap();
        assert_eq!(value, json!({"tags": ["x"], "visibility": "project"}));
    }

    #[test]
    fn test_experiment_decode_defaults() {
        let wire: WireExperiment = serde_json::from_value(json!({
            "uuid": "e1",
            "type": "T1",
            "device_name": "B1",
            "tags": null,
            "jobs": ["j1"],
            "start_time": "2024-01-02T03:04:05Z",
            "surprise": 42
        }))
        .unwrap();
        let record = decode_experiment(wire).unwrap();
        assert!(record.tags.is_empty());
        assert!(record.metadata.is_empty());
        assert_eq!(record.job_ids, vec!["j1".to_string()]);
        assert_eq!(
            record.start_datetime.unwrap(),
            chrono::DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z").unwrap()
        );
    }

    #[test]
    fn test_result_encoding() {
        let record = AnalysisResultRecord::new("e1", "T1")
            .with_id("r1")
            .with_components(["Q0", "Q1"])
            .with_quality(ResultQuality::Good);
        let value = serde_json::to_value(encode_analysis_result(&record)).unwrap();
        assert_eq!(
            value,
            json!({
                "experiment_uuid": "e1",
                "device_components": ["Q0", "Q1"],
                "type": "T1",
                "quality": "Good",
                "verified": false,
                "uuid": "r1"
            })
        );
    }

    #[test]
    fn test_chisq_sent_only_when_set() {
        let mut record = AnalysisResultRecord::new("e1", "T1").with_id("r1");
        let value = serde_json::to_value(encode_analysis_result(&record)).unwrap();
        assert!(value.get("chisq").is_none());

        record.chisq = Some(0.0);
        let value = serde_json::to_value(encode_analysis_result(&record)).unwrap();
        assert_eq!(value["chisq"], json!(0.0));
    }

    #[test]
    fn test_result_update_variants() {
        let record = AnalysisResultRecord::new("e1", "T1").with_id("r1");
        let bulk = encode_analysis_result(&record).for_bulk_update();
        assert_eq!(bulk.uuid.as_deref(), Some("r1"));
        assert!(bulk.experiment_uuid.is_none() && bulk.result_type.is_none());
        let single = encode_analysis_result(&record).for_update();
        assert!(single.uuid.is_none());
    }

    #[test]
    fn test_quality_from_api() {
        assert_eq!(quality_from_api("No Information").unwrap(), ResultQuality::Unknown);
        assert!(quality_from_api("unknown").is_err());
        let wire = WireAnalysisResult {
            uuid: Some("r1".into()),
            quality: Some("Bad".into()),
            ..Default::default()
        };
        assert_eq!(decode_analysis_result(wire).unwrap().quality, ResultQuality::Bad);
    }

    #[test]
    fn test_decode_requires_uuid() {
        assert!(decode_experiment(WireExperiment::default()).is_err());
        assert!(decode_analysis_result(WireAnalysisResult::default()).is_err());
    }
}
