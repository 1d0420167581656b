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

//! Tabular (row/column) form of analysis results for bulk export and import.
//!
//! Uses its own column vocabulary and its own lowercase quality spelling.
//! Nothing here is shared with the wire mapping in [`crate::wire`].

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ResultDbError, Result};
use crate::model::{AnalysisResultRecord, DeviceComponent, ResultQuality};
use crate::time::utc_to_local;

/// Column name -> key inside `result_data`.
pub const RESULT_DATA_COLUMNS: &[(&str, &str)] = &[
    ("value", "_value"),
    ("_source", "_source"),
    ("_extra", "_extra"),
    ("experiment", "_experiment"),
];

pub const QUALITY_COLUMN: &str = "quality";

/// Tabular spelling of result quality.
pub fn quality_to_tabular(quality: ResultQuality) -> &'static str {
    match quality {
        ResultQuality::Good => "good",
        ResultQuality::Bad => "bad",
        ResultQuality::Unknown => "unknown",
    }
}

pub fn quality_from_tabular(value: &str) -> Result<ResultQuality> {
    match value {
        "good" => Ok(ResultQuality::Good),
        "bad" => Ok(ResultQuality::Bad),
        "unknown" => Ok(ResultQuality::Unknown),
        other => Err(ResultDbError::InvalidArgument(format!(
            "'{}' is not a valid quality column value",
            other
        ))),
    }
}

/// One row of a result table.
pub type ResultRow = Map<String, Value>;

/// Flatten a record into a table row.
pub fn result_to_row(record: &AnalysisResultRecord) -> ResultRow {
    let mut row = Map::new();
    row.insert("name".into(), Value::String(record.result_type.clone()));
    row.insert(
        "components".into(),
        Value::Array(
            record
                .device_components
                .iter()
                .map(|c| Value::String(c.to_string()))
                .collect(),
        ),
    );
    row.insert("_result_id".into(), Value::String(record.result_id.clone()));
    row.insert(
        "_experiment_id".into(),
        Value::String(record.experiment_id.clone()),
    );
    row.insert(
        "_tags".into(),
        Value::Array(record.tags.iter().cloned().map(Value::String).collect()),
    );
    row.insert(
        "chisq".into(),
        record.chisq.map(Value::from).unwrap_or(Value::Null),
    );
    row.insert(
        "created_time".into(),
        record
            .creation_datetime
            .map(|dt| Value::String(dt.to_rfc3339()))
            .unwrap_or(Value::Null),
    );
    for (column, key) in RESULT_DATA_COLUMNS {
        row.insert(
            (*column).to_string(),
            record.result_data.get(*key).cloned().unwrap_or(Value::Null),
        );
    }
    row.insert(
        QUALITY_COLUMN.into(),
        Value::String(quality_to_tabular(record.quality).to_string()),
    );
    row.insert(
        "backend".into(),
        record
            .backend_name
            .clone()
            .map(Value::String)
            .unwrap_or(Value::Null),
    );
    row
}

/// Rebuild a record from a table row.
///
/// A row without `_result_id` gets a fresh id; a missing quality is unknown.
pub fn row_to_result(row: &ResultRow) -> Result<AnalysisResultRecord> {
    let text = |column: &str| -> Option<String> {
        row.get(column).and_then(Value::as_str).map(ToString::to_string)
    };
    let list = |column: &str| -> Result<Vec<String>> {
        match row.get(column) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Ok(other.to_string()),
                })
                .collect(),
            Some(Value::String(single)) => Ok(vec![single.clone()]),
            Some(other) => Err(ResultDbError::InvalidArgument(format!(
                "column '{}' must be a list, found {}",
                column, other
            ))),
        }
    };

    let mut record = AnalysisResultRecord::new(
        text("_experiment_id").unwrap_or_default(),
        text("name").unwrap_or_default(),
    );
    if let Some(result_id) = text("_result_id") {
        record.result_id = result_id;
    }
    record.device_components = list("components")?
        .iter()
        .map(|c| DeviceComponent::parse(c))
        .collect();
    record.tags = list("_tags")?;
    record.chisq = row.get("chisq").and_then(Value::as_f64);
    record.creation_datetime = match text("created_time") {
        Some(created) => Some(parse_created_time(&created)?),
        None => None,
    };
    record.backend_name = text("backend");
    for (column, key) in RESULT_DATA_COLUMNS {
        if let Some(value) = row.get(*column).filter(|v| !v.is_null()) {
            record.result_data.insert((*key).to_string(), value.clone());
        }
    }
    record.quality = quality_from_tabular(text(QUALITY_COLUMN).as_deref().unwrap_or("unknown"))?;
    Ok(record)
}

fn parse_created_time(value: &str) -> Result<DateTime<FixedOffset>> {
    match DateTime::parse_from_rfc3339(value) {
        Ok(dt) => Ok(dt),
        Err(_) => utc_to_local(value),
    }
}

/// A table of analysis results, one row per result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultTable {
    pub rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn from_results(results: &[AnalysisResultRecord]) -> Self {
        Self {
            rows: results.iter().map(result_to_row).collect(),
        }
    }

    pub fn to_results(&self) -> Result<Vec<AnalysisResultRecord>> {
        self.rows.iter().map(row_to_result).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All column names, in first-seen order.
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for row in &self.rows {
            for key in row.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
        columns
    }

    /// Values of one column; rows without it yield `Null`.
    pub fn column(&self, name: &str) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| row.get(name).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// Records-oriented JSON (an array of row objects).
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.rows)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self {
            rows: serde_json::from_str(json)?,
        })
    }
}
