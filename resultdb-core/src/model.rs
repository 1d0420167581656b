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

//! Domain records for experiments and analysis results.
//!
//! Records carry timestamps in local time with the offset attached.
//! Equality on timestamps compares instants, so a record read back from
//! the wire compares equal even when its textual offset differs.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ResultDbError;

/// JSON-serializable metadata attached to an experiment or carried as result data.
pub type Metadata = HashMap<String, serde_json::Value>;

/// Visibility tier of an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareLevel {
    /// Only visible to its owner.
    Private,
    /// Shared within its project.
    Project,
    /// Shared within its group.
    Group,
    /// Shared within its hub.
    Hub,
    /// Shared with everybody regardless of provider.
    Public,
}

impl ShareLevel {
    pub const ALL: [ShareLevel; 5] = [
        ShareLevel::Private,
        ShareLevel::Project,
        ShareLevel::Group,
        ShareLevel::Hub,
        ShareLevel::Public,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShareLevel::Private => "private",
            ShareLevel::Project => "project",
            ShareLevel::Group => "group",
            ShareLevel::Hub => "hub",
            ShareLevel::Public => "public",
        }
    }
}

impl fmt::Display for ShareLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ShareLevel {
    type Err = ResultDbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "private" => Ok(ShareLevel::Private),
            "project" => Ok(ShareLevel::Project),
            "group" => Ok(ShareLevel::Group),
            "hub" => Ok(ShareLevel::Hub),
            "public" => Ok(ShareLevel::Public),
            _ => Err(ResultDbError::InvalidArgument(format!(
                "'{}' is not a valid share level",
                s
            ))),
        }
    }
}

/// Quality of an analysis result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResultQuality {
    Bad,
    Good,
    #[default]
    Unknown,
}

impl ResultQuality {
    pub const ALL: [ResultQuality; 3] =
        [ResultQuality::Bad, ResultQuality::Good, ResultQuality::Unknown];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResultQuality::Bad => "BAD",
            ResultQuality::Good => "GOOD",
            ResultQuality::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ResultQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResultQuality {
    type Err = ResultDbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BAD" => Ok(ResultQuality::Bad),
            "GOOD" => Ok(ResultQuality::Good),
            "UNKNOWN" => Ok(ResultQuality::Unknown),
            _ => Err(ResultDbError::InvalidArgument(format!(
                "'{}' is not a valid result quality",
                s
            ))),
        }
    }
}

/// Physical sub-unit of a backend device.
///
/// Always travels as a string on the wire: `Q<n>` for qubits,
/// `R<n>` for resonators, anything else verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum DeviceComponent {
    Qubit(u32),
    Resonator(u32),
    Unknown(String),
}

impl DeviceComponent {
    pub fn parse(value: &str) -> Self {
        let indexed = |prefix: char| {
            value
                .strip_prefix(prefix)
                .filter(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|rest| rest.parse::<u32>().ok())
        };
        if let Some(index) = indexed('Q') {
            DeviceComponent::Qubit(index)
        } else if let Some(index) = indexed('R') {
            DeviceComponent::Resonator(index)
        } else {
            DeviceComponent::Unknown(value.to_string())
        }
    }
}

impl fmt::Display for DeviceComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceComponent::Qubit(index) => write!(f, "Q{}", index),
            DeviceComponent::Resonator(index) => write!(f, "R{}", index),
            DeviceComponent::Unknown(name) => write!(f, "{}", name),
        }
    }
}

impl From<String> for DeviceComponent {
    fn from(value: String) -> Self {
        DeviceComponent::parse(&value)
    }
}

impl From<&str> for DeviceComponent {
    fn from(value: &str) -> Self {
        DeviceComponent::parse(value)
    }
}

impl From<DeviceComponent> for String {
    fn from(value: DeviceComponent) -> Self {
        value.to_string()
    }
}

/// An experiment and its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    /// Globally unique id, generated on construction.
    pub experiment_id: String,
    pub parent_id: Option<String>,
    pub experiment_type: String,
    /// Device name the experiment ran on.
    pub backend: String,
    pub tags: Vec<String>,
    pub job_ids: Vec<String>,
    pub share_level: Option<ShareLevel>,
    pub metadata: Metadata,
    pub figure_names: Vec<String>,
    pub notes: Option<String>,
    pub hub: Option<String>,
    pub group: Option<String>,
    pub project: Option<String>,
    pub owner: Option<String>,
    pub creation_datetime: Option<DateTime<FixedOffset>>,
    pub start_datetime: Option<DateTime<FixedOffset>>,
    pub end_datetime: Option<DateTime<FixedOffset>>,
    pub updated_datetime: Option<DateTime<FixedOffset>>,
}

impl ExperimentRecord {
    /// Create a record with a fresh id and empty collections.
    pub fn new(experiment_type: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            experiment_id: uuid::Uuid::new_v4().to_string(),
            parent_id: None,
            experiment_type: experiment_type.into(),
            backend: backend.into(),
            tags: Vec::new(),
            job_ids: Vec::new(),
            share_level: None,
            metadata: HashMap::new(),
            figure_names: Vec::new(),
            notes: None,
            hub: None,
            group: None,
            project: None,
            owner: None,
            creation_datetime: None,
            start_datetime: None,
            end_datetime: None,
            updated_datetime: None,
        }
    }

    pub fn with_id(mut self, experiment_id: impl Into<String>) -> Self {
        self.experiment_id = experiment_id.into();
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_share_level(mut self, share_level: ShareLevel) -> Self {
        self.share_level = Some(share_level);
        self
    }

    pub fn with_start(mut self, start: DateTime<FixedOffset>) -> Self {
        self.start_datetime = Some(start);
        self
    }

    /// Set hub, group and project together.
    pub fn with_location(
        mut self,
        hub: impl Into<String>,
        group: impl Into<String>,
        project: impl Into<String>,
    ) -> Self {
        self.hub = Some(hub.into());
        self.group = Some(group.into());
        self.project = Some(project.into());
        self
    }
}

impl fmt::Display for ExperimentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Experiment {} [{}] on {}",
            self.experiment_id, self.experiment_type, self.backend
        )?;
        if let Some(parent) = &self.parent_id {
            write!(f, " (parent {})", parent)?;
        }
        if !self.tags.is_empty() {
            write!(f, " tags={}", self.tags.join(","))?;
        }
        if let Some(start) = &self.start_datetime {
            write!(f, " started {}", start.format("%Y-%m-%d %H:%M:%S %:z"))?;
        }
        Ok(())
    }
}

/// A single analysis result belonging to an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResultRecord {
    pub result_id: String,
    pub experiment_id: String,
    pub result_type: String,
    pub result_data: Metadata,
    pub device_components: Vec<DeviceComponent>,
    pub quality: ResultQuality,
    pub verified: bool,
    pub tags: Vec<String>,
    pub backend_name: Option<String>,
    /// Reduced chi-squared of the fit, if any.
    pub chisq: Option<f64>,
    pub creation_datetime: Option<DateTime<FixedOffset>>,
    pub updated_datetime: Option<DateTime<FixedOffset>>,
}

impl AnalysisResultRecord {
    /// Create a result with a fresh id and unknown quality.
    pub fn new(experiment_id: impl Into<String>, result_type: impl Into<String>) -> Self {
        Self {
            result_id: uuid::Uuid::new_v4().to_string(),
            experiment_id: experiment_id.into(),
            result_type: result_type.into(),
            result_data: HashMap::new(),
            device_components: Vec::new(),
            quality: ResultQuality::Unknown,
            verified: false,
            tags: Vec::new(),
            backend_name: None,
            chisq: None,
            creation_datetime: None,
            updated_datetime: None,
        }
    }

    pub fn with_id(mut self, result_id: impl Into<String>) -> Self {
        self.result_id = result_id.into();
        self
    }

    pub fn with_quality(mut self, quality: ResultQuality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_components<I, C>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<DeviceComponent>,
    {
        self.device_components = components.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.result_data.insert(key.into(), value);
        self
    }
}

impl fmt::Display for AnalysisResultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let components: Vec<String> =
            self.device_components.iter().map(ToString::to_string).collect();
        write!(
            f,
            "Analysis result {} [{}] of experiment {}: quality={}, verified={}",
            self.result_id, self.result_type, self.experiment_id, self.quality, self.verified
        )?;
        if !components.is_empty() {
            write!(f, ", components={}", components.join(","))?;
        }
        if let Some(chisq) = self.chisq {
            write!(f, ", chisq={}", chisq)?;
        }
        Ok(())
    }
}
