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

//! Filter and sort translation.
//!
//! Typed filters are validated and encoded into the flat string vocabulary
//! of the results database list endpoints:
//!
//! | Filter            | Encoding                               |
//! |-------------------|----------------------------------------|
//! | tags OR / AND     | `any:a,b` / `contains:a,b`             |
//! | device components | repeated values, or `contains:c1,c2`   |
//! | type              | verbatim, or `like:<value>`            |
//! | time range        | `ge:<utc>` and/or `le:<utc>`           |
//! | quality           | scalar, or `in:q1,q2`                  |
//! | sort              | `key:dir,key:dir` with renamed keys    |
//!
//! Every check here runs before a backend is touched. The second half of the
//! module parses the same vocabulary back, for backends that evaluate
//! queries themselves.

use chrono::{DateTime, FixedOffset, Utc};

use crate::error::{ResultDbError, Result};
use crate::model::{DeviceComponent, ResultQuality};
use crate::time::{local_to_utc_str, str_to_utc};
use crate::wire::{quality_from_api, quality_to_api};

/// Domain sort keys accepted for experiments, with their wire names.
pub const EXPERIMENT_SORT_KEYS: &[(&str, &str)] = &[
    ("start_datetime", "start_time"),
    ("start_time", "start_time"),
    ("experiment_type", "type"),
];

/// Domain sort keys accepted for analysis results, with their wire names.
pub const ANALYSIS_RESULT_SORT_KEYS: &[(&str, &str)] = &[
    ("creation_datetime", "created_at"),
    ("device_components", "device_components"),
    ("result_type", "type"),
];

/// Ordering applied when a caller does not ask for one.
pub const DEFAULT_EXPERIMENT_SORT: &str = "start_time:desc";
pub const DEFAULT_ANALYSIS_RESULT_SORT: &str = "created_at:desc";
/// Secondary key appended to every ordering for stable pagination.
pub const ID_TIEBREAK: &str = "uuid:asc";

/// Value of an encoded query parameter. `Many` repeats the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    One(String),
    Many(Vec<String>),
}

impl ParamValue {
    fn push_into(&self, key: &'static str, params: &mut Vec<(&'static str, String)>) {
        match self {
            ParamValue::One(value) => params.push((key, value.clone())),
            ParamValue::Many(values) => {
                params.extend(values.iter().map(|value| (key, value.clone())))
            }
        }
    }
}

/// Encode a tag filter. `OR` matches any tag, `AND` requires all of them.
pub fn encode_tags<S: AsRef<str>>(tags: &[S], operator: &str) -> Result<String> {
    let joined = join(tags);
    match operator.to_uppercase().as_str() {
        "OR" => Ok(format!("any:{}", joined)),
        "AND" => Ok(format!("contains:{}", joined)),
        _ => Err(ResultDbError::InvalidFilter(format!(
            "{} is not a valid `tags_operator`. Valid values are \"AND\" and \"OR\".",
            operator
        ))),
    }
}

/// Encode a device component filter.
///
/// Without an operator the server requires an exact set match.
pub fn encode_device_components<S: AsRef<str>>(
    components: &[S],
    operator: Option<&str>,
) -> Result<ParamValue> {
    match operator {
        None => Ok(ParamValue::Many(
            components.iter().map(|c| c.as_ref().to_string()).collect(),
        )),
        Some("contains") => Ok(ParamValue::One(format!("contains:{}", join(components)))),
        Some(other) => Err(ResultDbError::InvalidFilter(format!(
            "{} is not a valid device_components_operator value. Valid values are None and \"contains\"",
            other
        ))),
    }
}

/// Encode an experiment or result type filter; `like` is a substring match.
pub fn encode_type(value: &str, operator: Option<&str>) -> Result<String> {
    match operator {
        None => Ok(value.to_string()),
        Some("like") => Ok(format!("like:{}", value)),
        Some(other) => Err(ResultDbError::InvalidFilter(format!(
            "\"{}\" is not a valid type operator value. Valid values are None and \"like\".",
            other
        ))),
    }
}

/// Translate `key:direction` entries into the wire sort string.
///
/// Keys are matched case-insensitively against `key_map` and renamed;
/// directions must be `asc` or `desc`. Returns `None` for an empty list.
pub fn translate_sort<S: AsRef<str>>(
    sort_by: &[S],
    key_map: &[(&str, &str)],
) -> Result<Option<String>> {
    if sort_by.is_empty() {
        return Ok(None);
    }
    let mut entries = Vec::with_capacity(sort_by.len());
    for sorter in sort_by {
        let sorter = sorter.as_ref();
        let (key, direction) = split_sort_entry(sorter)?;
        let key = key.to_lowercase();
        let wire_key = key_map
            .iter()
            .find(|(domain, _)| *domain == key)
            .map(|(_, wire)| *wire)
            .ok_or_else(|| {
                let valid: Vec<&str> = key_map.iter().map(|(domain, _)| *domain).collect();
                ResultDbError::InvalidSort(format!(
                    "\"{}\" is not a valid sort key. Valid sort keys are {}",
                    key,
                    valid.join(", ")
                ))
            })?;
        entries.push(format!("{}:{}", wire_key, direction));
    }
    Ok(Some(entries.join(",")))
}

fn split_sort_entry(sorter: &str) -> Result<(&str, &str)> {
    let mut parts = sorter.split(':');
    let (key, direction) = match (parts.next(), parts.next(), parts.next()) {
        (Some(key), Some(direction), None) => (key.trim(), direction.trim()),
        _ => {
            return Err(ResultDbError::InvalidSort(format!(
                "\"{}\" is not of the form <key>:<direction>",
                sorter
            )))
        }
    };
    if direction != "asc" && direction != "desc" {
        return Err(ResultDbError::InvalidSort(format!(
            "\"{}\" is not a valid sorting direction. Valid directions are \"asc\" and \"desc\".",
            direction
        )));
    }
    Ok((key, direction))
}

/// Encode inclusive time bounds.
pub fn encode_time_range(
    after: Option<&DateTime<FixedOffset>>,
    before: Option<&DateTime<FixedOffset>>,
) -> Vec<String> {
    let mut bounds = Vec::new();
    if let Some(after) = after {
        bounds.push(format!("ge:{}", local_to_utc_str(after)));
    }
    if let Some(before) = before {
        bounds.push(format!("le:{}", local_to_utc_str(before)));
    }
    bounds
}

/// A quality filter value, either typed or as caller-supplied text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QualityInput {
    Quality(ResultQuality),
    Text(String),
}

impl QualityInput {
    pub fn resolve(&self) -> Result<ResultQuality> {
        match self {
            QualityInput::Quality(quality) => Ok(*quality),
            QualityInput::Text(text) => text.parse::<ResultQuality>().map_err(|_| {
                ResultDbError::InvalidFilter(format!("'{}' is not a valid quality", text))
            }),
        }
    }
}

impl From<ResultQuality> for QualityInput {
    fn from(value: ResultQuality) -> Self {
        QualityInput::Quality(value)
    }
}

impl From<&str> for QualityInput {
    fn from(value: &str) -> Self {
        QualityInput::Text(value.to_string())
    }
}

impl From<String> for QualityInput {
    fn from(value: String) -> Self {
        QualityInput::Text(value)
    }
}

/// Encode a quality filter.
///
/// Duplicates collapse; the full set of qualities means no restriction.
pub fn encode_quality(values: &[QualityInput]) -> Result<Option<String>> {
    let mut api_values: Vec<&'static str> = Vec::new();
    for value in values {
        let api_value = quality_to_api(value.resolve()?);
        if !api_values.contains(&api_value) {
            api_values.push(api_value);
        }
    }
    Ok(match api_values.len() {
        0 => None,
        1 => Some(api_values[0].to_string()),
        n if n == ResultQuality::ALL.len() => None,
        _ => Some(format!("in:{}", api_values.join(","))),
    })
}

/// Project requires group and hub; group requires hub.
pub fn validate_location(
    hub: Option<&str>,
    group: Option<&str>,
    project: Option<&str>,
) -> Result<()> {
    let levels = [("project", project), ("group", group), ("hub", hub)];
    for (idx, (name, value)) in levels.iter().enumerate() {
        if value.is_none() {
            continue;
        }
        let missing: Vec<&str> = levels[idx + 1..]
            .iter()
            .filter(|(_, parent)| parent.is_none())
            .map(|(parent_name, _)| *parent_name)
            .collect();
        if !missing.is_empty() {
            return Err(ResultDbError::InvalidArgument(format!(
                "If {} is specified, {} must also be specified.",
                name,
                missing.join(" and ")
            )));
        }
    }
    Ok(())
}

fn validate_exclusive(first: (&str, bool), second: (&str, bool)) -> Result<()> {
    if first.1 && second.1 {
        return Err(ResultDbError::InvalidArgument(format!(
            "{} and {} cannot both be True",
            first.0, second.0
        )));
    }
    Ok(())
}

/// Reject a zero limit; `None` means unlimited.
pub fn validate_limit(limit: Option<usize>) -> Result<()> {
    match limit {
        Some(0) => Err(ResultDbError::InvalidArgument(
            "0 is not a valid `limit`, which has to be a positive integer.".to_string(),
        )),
        _ => Ok(()),
    }
}

fn join<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(|v| v.as_ref())
        .collect::<Vec<_>>()
        .join(",")
}

/// Filters for listing experiments.
#[derive(Debug, Clone)]
pub struct ExperimentFilter {
    pub experiment_type: Option<String>,
    pub experiment_type_operator: Option<String>,
    pub backend_name: Option<String>,
    pub device_components: Vec<DeviceComponent>,
    pub device_components_operator: Option<String>,
    pub tags: Vec<String>,
    pub tags_operator: String,
    pub start_datetime_after: Option<DateTime<FixedOffset>>,
    pub start_datetime_before: Option<DateTime<FixedOffset>>,
    pub hub: Option<String>,
    pub group: Option<String>,
    pub project: Option<String>,
    pub exclude_public: bool,
    pub public_only: bool,
    pub exclude_mine: bool,
    pub mine_only: bool,
    /// Only children of this experiment. There is no way to ask for
    /// experiments without a parent.
    pub parent_id: Option<String>,
    pub sort_by: Vec<String>,
}

impl Default for ExperimentFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl ExperimentFilter {
    pub fn new() -> Self {
        Self {
            experiment_type: None,
            experiment_type_operator: None,
            backend_name: None,
            device_components: Vec::new(),
            device_components_operator: None,
            tags: Vec::new(),
            tags_operator: "OR".to_string(),
            start_datetime_after: None,
            start_datetime_before: None,
            hub: None,
            group: None,
            project: None,
            exclude_public: false,
            public_only: false,
            exclude_mine: false,
            mine_only: false,
            parent_id: None,
            sort_by: Vec::new(),
        }
    }

    /// Exact experiment type match.
    pub fn experiment_type(mut self, experiment_type: impl Into<String>) -> Self {
        self.experiment_type = Some(experiment_type.into());
        self
    }

    /// Set the type operator (`like` for substring matches).
    pub fn experiment_type_operator(mut self, operator: impl Into<String>) -> Self {
        self.experiment_type_operator = Some(operator.into());
        self
    }

    pub fn backend_name(mut self, backend_name: impl Into<String>) -> Self {
        self.backend_name = Some(backend_name.into());
        self
    }

    pub fn device_components<I, C>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<DeviceComponent>,
    {
        self.device_components = components.into_iter().map(Into::into).collect();
        self
    }

    pub fn device_components_operator(mut self, operator: impl Into<String>) -> Self {
        self.device_components_operator = Some(operator.into());
        self
    }

    /// Filter by tags with `AND` / `OR` semantics.
    pub fn tags<I, S>(mut self, tags: I, operator: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self.tags_operator = operator.into();
        self
    }

    pub fn start_after(mut self, after: DateTime<FixedOffset>) -> Self {
        self.start_datetime_after = Some(after);
        self
    }

    pub fn start_before(mut self, before: DateTime<FixedOffset>) -> Self {
        self.start_datetime_before = Some(before);
        self
    }

    pub fn hub(mut self, hub: impl Into<String>) -> Self {
        self.hub = Some(hub.into());
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn exclude_public(mut self) -> Self {
        self.exclude_public = true;
        self
    }

    pub fn public_only(mut self) -> Self {
        self.public_only = true;
        self
    }

    pub fn exclude_mine(mut self) -> Self {
        self.exclude_mine = true;
        self
    }

    pub fn mine_only(mut self) -> Self {
        self.mine_only = true;
        self
    }

    pub fn parent_id(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Append a `key:direction` sort entry.
    pub fn sort_by(mut self, entry: impl Into<String>) -> Self {
        self.sort_by.push(entry.into());
        self
    }

    /// Validate and encode into wire parameters.
    pub fn to_query(&self) -> Result<ExperimentQuery> {
        validate_location(
            self.hub.as_deref(),
            self.group.as_deref(),
            self.project.as_deref(),
        )?;
        validate_exclusive(
            ("exclude_public", self.exclude_public),
            ("public_only", self.public_only),
        )?;
        validate_exclusive(("exclude_mine", self.exclude_mine), ("mine_only", self.mine_only))?;

        let tags = if self.tags.is_empty() {
            None
        } else {
            Some(encode_tags(&self.tags, &self.tags_operator)?)
        };
        let device_components = if self.device_components.is_empty() {
            None
        } else {
            let names: Vec<String> =
                self.device_components.iter().map(ToString::to_string).collect();
            Some(encode_device_components(
                &names,
                self.device_components_operator.as_deref(),
            )?)
        };
        let experiment_type = match &self.experiment_type {
            Some(value) => Some(encode_type(value, self.experiment_type_operator.as_deref())?),
            None => None,
        };

        Ok(ExperimentQuery {
            experiment_type,
            device_name: self.backend_name.clone(),
            device_components,
            tags,
            start_time: encode_time_range(
                self.start_datetime_after.as_ref(),
                self.start_datetime_before.as_ref(),
            ),
            hub_id: self.hub.clone(),
            group_id: self.group.clone(),
            project_id: self.project.clone(),
            parent_experiment_uuid: self.parent_id.clone(),
            visibility: if self.exclude_public {
                Some("!public".to_string())
            } else if self.public_only {
                Some("public".to_string())
            } else {
                None
            },
            owner: if self.exclude_mine {
                Some("!me".to_string())
            } else if self.mine_only {
                Some("me".to_string())
            } else {
                None
            },
            sort: translate_sort(&self.sort_by, EXPERIMENT_SORT_KEYS)?,
        })
    }
}

/// Encoded experiment list parameters, identical for every page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExperimentQuery {
    pub experiment_type: Option<String>,
    pub device_name: Option<String>,
    pub device_components: Option<ParamValue>,
    pub tags: Option<String>,
    pub start_time: Vec<String>,
    pub hub_id: Option<String>,
    pub group_id: Option<String>,
    pub project_id: Option<String>,
    pub parent_experiment_uuid: Option<String>,
    pub visibility: Option<String>,
    pub owner: Option<String>,
    pub sort: Option<String>,
}

impl ExperimentQuery {
    /// Query string pairs for one page request.
    pub fn to_params(&self, limit: Option<usize>, marker: Option<&str>) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        push_opt(&mut params, "device_name", &self.device_name);
        push_opt(&mut params, "type", &self.experiment_type);
        params.extend(self.start_time.iter().map(|bound| ("start_time", bound.clone())));
        if let Some(components) = &self.device_components {
            components.push_into("device_components", &mut params);
        }
        push_opt(&mut params, "tags", &self.tags);
        push_page(&mut params, limit, marker);
        push_opt(&mut params, "hub_id", &self.hub_id);
        push_opt(&mut params, "group_id", &self.group_id);
        push_opt(&mut params, "project_id", &self.project_id);
        push_opt(&mut params, "parent_experiment_uuid", &self.parent_experiment_uuid);
        push_opt(&mut params, "visibility", &self.visibility);
        push_opt(&mut params, "owner", &self.owner);
        push_opt(&mut params, "sort", &self.sort);
        params
    }
}

/// Filters for listing analysis results.
#[derive(Debug, Clone)]
pub struct AnalysisResultFilter {
    pub experiment_id: Option<String>,
    pub result_type: Option<String>,
    pub result_type_operator: Option<String>,
    pub backend_name: Option<String>,
    pub device_components: Vec<DeviceComponent>,
    pub device_components_operator: Option<String>,
    pub quality: Vec<QualityInput>,
    pub verified: Option<bool>,
    pub tags: Vec<String>,
    pub tags_operator: String,
    pub creation_datetime_after: Option<DateTime<FixedOffset>>,
    pub creation_datetime_before: Option<DateTime<FixedOffset>>,
    pub sort_by: Vec<String>,
}

impl Default for AnalysisResultFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisResultFilter {
    pub fn new() -> Self {
        Self {
            experiment_id: None,
            result_type: None,
            result_type_operator: None,
            backend_name: None,
            device_components: Vec::new(),
            device_components_operator: None,
            quality: Vec::new(),
            verified: None,
            tags: Vec::new(),
            tags_operator: "OR".to_string(),
            creation_datetime_after: None,
            creation_datetime_before: None,
            sort_by: Vec::new(),
        }
    }

    pub fn experiment_id(mut self, experiment_id: impl Into<String>) -> Self {
        self.experiment_id = Some(experiment_id.into());
        self
    }

    pub fn result_type(mut self, result_type: impl Into<String>) -> Self {
        self.result_type = Some(result_type.into());
        self
    }

    pub fn result_type_operator(mut self, operator: impl Into<String>) -> Self {
        self.result_type_operator = Some(operator.into());
        self
    }

    pub fn backend_name(mut self, backend_name: impl Into<String>) -> Self {
        self.backend_name = Some(backend_name.into());
        self
    }

    pub fn device_components<I, C>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<DeviceComponent>,
    {
        self.device_components = components.into_iter().map(Into::into).collect();
        self
    }

    pub fn device_components_operator(mut self, operator: impl Into<String>) -> Self {
        self.device_components_operator = Some(operator.into());
        self
    }

    /// Add one accepted quality.
    pub fn quality(mut self, quality: impl Into<QualityInput>) -> Self {
        self.quality.push(quality.into());
        self
    }

    /// Add several accepted qualities.
    pub fn qualities<I, Q>(mut self, qualities: I) -> Self
    where
        I: IntoIterator<Item = Q>,
        Q: Into<QualityInput>,
    {
        self.quality.extend(qualities.into_iter().map(Into::into));
        self
    }

    pub fn verified(mut self, verified: bool) -> Self {
        self.verified = Some(verified);
        self
    }

    pub fn tags<I, S>(mut self, tags: I, operator: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self.tags_operator = operator.into();
        self
    }

    pub fn created_after(mut self, after: DateTime<FixedOffset>) -> Self {
        self.creation_datetime_after = Some(after);
        self
    }

    pub fn created_before(mut self, before: DateTime<FixedOffset>) -> Self {
        self.creation_datetime_before = Some(before);
        self
    }

    pub fn sort_by(mut self, entry: impl Into<String>) -> Self {
        self.sort_by.push(entry.into());
        self
    }

    /// Validate and encode into wire parameters.
    pub fn to_query(&self) -> Result<AnalysisResultQuery> {
        let quality = encode_quality(&self.quality)?;
        let tags = if self.tags.is_empty() {
            None
        } else {
            Some(encode_tags(&self.tags, &self.tags_operator)?)
        };
        let device_components = if self.device_components.is_empty() {
            None
        } else {
            let names: Vec<String> =
                self.device_components.iter().map(ToString::to_string).collect();
            Some(encode_device_components(
                &names,
                self.device_components_operator.as_deref(),
            )?)
        };
        let result_type = match &self.result_type {
            Some(value) => Some(encode_type(value, self.result_type_operator.as_deref())?),
            None => None,
        };

        Ok(AnalysisResultQuery {
            device_name: self.backend_name.clone(),
            device_components,
            experiment_uuid: self.experiment_id.clone(),
            quality,
            result_type,
            verified: self.verified,
            tags,
            created_at: encode_time_range(
                self.creation_datetime_after.as_ref(),
                self.creation_datetime_before.as_ref(),
            ),
            sort: translate_sort(&self.sort_by, ANALYSIS_RESULT_SORT_KEYS)?,
        })
    }
}

/// Encoded analysis result list parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisResultQuery {
    pub device_name: Option<String>,
    pub device_components: Option<ParamValue>,
    pub experiment_uuid: Option<String>,
    pub quality: Option<String>,
    pub result_type: Option<String>,
    pub verified: Option<bool>,
    pub tags: Option<String>,
    pub created_at: Vec<String>,
    pub sort: Option<String>,
}

impl AnalysisResultQuery {
    pub fn to_params(&self, limit: Option<usize>, marker: Option<&str>) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        push_opt(&mut params, "device_name", &self.device_name);
        if let Some(components) = &self.device_components {
            components.push_into("device_components", &mut params);
        }
        push_opt(&mut params, "experiment_uuid", &self.experiment_uuid);
        push_opt(&mut params, "quality", &self.quality);
        push_opt(&mut params, "type", &self.result_type);
        push_page(&mut params, limit, marker);
        if let Some(verified) = self.verified {
            params.push(("verified", verified.to_string()));
        }
        push_opt(&mut params, "tags", &self.tags);
        params.extend(self.created_at.iter().map(|bound| ("created_at", bound.clone())));
        push_opt(&mut params, "sort", &self.sort);
        params
    }
}

fn push_opt(params: &mut Vec<(&'static str, String)>, key: &'static str, value: &Option<String>) {
    if let Some(value) = value {
        params.push((key, value.clone()));
    }
}

fn push_page(params: &mut Vec<(&'static str, String)>, limit: Option<usize>, marker: Option<&str>) {
    if let Some(limit) = limit {
        params.push(("limit", limit.to_string()));
    }
    if let Some(marker) = marker {
        params.push(("marker", marker.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Interpreting encoded parameters
// ---------------------------------------------------------------------------

/// Decoded tag filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagMatch {
    Any(Vec<String>),
    All(Vec<String>),
}

impl TagMatch {
    pub fn parse(encoded: &str) -> Result<Self> {
        if let Some(rest) = encoded.strip_prefix("any:") {
            Ok(TagMatch::Any(split_list(rest)))
        } else if let Some(rest) = encoded.strip_prefix("contains:") {
            Ok(TagMatch::All(split_list(rest)))
        } else {
            Err(ResultDbError::InvalidFilter(format!(
                "Unrecognized tags operator in '{}'",
                encoded
            )))
        }
    }

    pub fn matches(&self, tags: &[String]) -> bool {
        match self {
            TagMatch::Any(wanted) => wanted.iter().any(|t| tags.contains(t)),
            TagMatch::All(wanted) => wanted.iter().all(|t| tags.contains(t)),
        }
    }
}

/// Decoded type filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextMatch {
    Exact(String),
    Like(String),
}

impl TextMatch {
    pub fn parse(encoded: &str) -> Self {
        match encoded.strip_prefix("like:") {
            Some(rest) => TextMatch::Like(rest.to_string()),
            None => TextMatch::Exact(encoded.to_string()),
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            TextMatch::Exact(wanted) => value == wanted,
            TextMatch::Like(fragment) => value.contains(fragment.as_str()),
        }
    }
}

/// Decoded device component filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentsMatch {
    /// Same set of components, order ignored.
    Exact(Vec<String>),
    Contains(Vec<String>),
}

impl ComponentsMatch {
    pub fn parse(value: &ParamValue) -> Self {
        match value {
            ParamValue::One(single) => match single.strip_prefix("contains:") {
                Some(rest) => ComponentsMatch::Contains(split_list(rest)),
                None => ComponentsMatch::Exact(vec![single.clone()]),
            },
            ParamValue::Many(values) => ComponentsMatch::Exact(values.clone()),
        }
    }

    pub fn matches(&self, components: &[String]) -> bool {
        match self {
            ComponentsMatch::Exact(wanted) => {
                let mut a: Vec<&String> = wanted.iter().collect();
                let mut b: Vec<&String> = components.iter().collect();
                a.sort();
                a.dedup();
                b.sort();
                b.dedup();
                a == b
            }
            ComponentsMatch::Contains(wanted) => wanted.iter().all(|c| components.contains(c)),
        }
    }
}

/// Decoded inclusive time bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn parse<S: AsRef<str>>(bounds: &[S]) -> Result<Self> {
        let mut range = TimeRange::default();
        for bound in bounds {
            let bound = bound.as_ref();
            if let Some(rest) = bound.strip_prefix("ge:") {
                range.after = Some(str_to_utc(rest)?);
            } else if let Some(rest) = bound.strip_prefix("le:") {
                range.before = Some(str_to_utc(rest)?);
            } else {
                return Err(ResultDbError::InvalidFilter(format!(
                    "'{}' is not a valid time bound",
                    bound
                )));
            }
        }
        Ok(range)
    }

    pub fn is_unbounded(&self) -> bool {
        self.after.is_none() && self.before.is_none()
    }

    /// A missing timestamp only passes an unbounded range.
    pub fn contains(&self, value: Option<DateTime<Utc>>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some(value) = value else {
            return false;
        };
        self.after.map_or(true, |after| value >= after)
            && self.before.map_or(true, |before| value <= before)
    }
}

/// Decode an encoded quality filter into the accepted set.
pub fn parse_quality_filter(encoded: &str) -> Result<Vec<ResultQuality>> {
    match encoded.strip_prefix("in:") {
        Some(rest) => split_list(rest).iter().map(|q| quality_from_api(q)).collect(),
        None => Ok(vec![quality_from_api(encoded)?]),
    }
}

/// Decode a wire sort string into `(key, ascending)` pairs.
pub fn parse_sort(encoded: &str) -> Result<Vec<(String, bool)>> {
    encoded
        .split(',')
        .filter(|entry| !entry.trim().is_empty())
        .map(|entry| {
            let (key, direction) = split_sort_entry(entry)?;
            Ok((key.to_string(), direction == "asc"))
        })
        .collect()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_encoding() {
        assert_eq!(encode_tags(&["a", "b"], "OR").unwrap(), "any:a,b");
        assert_eq!(encode_tags(&["a", "b"], "AND").unwrap(), "contains:a,b");
        assert_eq!(encode_tags(&["a"], "and").unwrap(), "contains:a");
        assert!(matches!(
            encode_tags(&["a", "b"], "XOR"),
            Err(ResultDbError::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_device_components_encoding() {
        assert_eq!(
            encode_device_components(&["Q0", "Q1"], None).unwrap(),
            ParamValue::Many(vec!["Q0".into(), "Q1".into()])
        );
        assert_eq!(
            encode_device_components(&["Q0", "Q1"], Some("contains")).unwrap(),
            ParamValue::One("contains:Q0,Q1".into())
        );
        assert!(encode_device_components(&["Q0"], Some("like")).is_err());
    }

    #[test]
    fn test_type_encoding() {
        assert_eq!(encode_type("foo", None).unwrap(), "foo");
        assert_eq!(encode_type("foo", Some("like")).unwrap(), "like:foo");
        assert!(encode_type("foo", Some("contains")).is_err());
        assert!(TextMatch::parse("like:foo").matches("1foo2"));
        assert!(!TextMatch::parse("foo").matches("1foo2"));
    }

    #[test]
    fn test_sort_translation() {
        let sort = translate_sort(&["experiment_type:asc", "Start_Datetime:desc"], EXPERIMENT_SORT_KEYS)
            .unwrap();
        assert_eq!(sort.as_deref(), Some("type:asc,start_time:desc"));

        let sort = translate_sort(&["result_type: asc"], ANALYSIS_RESULT_SORT_KEYS).unwrap();
        assert_eq!(sort.as_deref(), Some("type:asc"));

        assert_eq!(translate_sort::<&str>(&[], EXPERIMENT_SORT_KEYS).unwrap(), None);
        assert!(matches!(
            translate_sort(&["backend:asc"], EXPERIMENT_SORT_KEYS),
            Err(ResultDbError::InvalidSort(_))
        ));
        assert!(translate_sort(&["start_time:up"], EXPERIMENT_SORT_KEYS).is_err());
        assert!(translate_sort(&["start_time"], EXPERIMENT_SORT_KEYS).is_err());
        assert!(translate_sort(&["start_time:asc:x"], EXPERIMENT_SORT_KEYS).is_err());
    }

    #[test]
    fn test_time_range_encoding() {
        let after = DateTime::parse_from_rfc3339("2024-01-01T01:00:00+01:00").unwrap();
        let before = DateTime::parse_from_rfc3339("2024-02-01T00:00:00Z").unwrap();
        assert_eq!(
            encode_time_range(Some(&after), Some(&before)),
            vec!["ge:2024-01-01T00:00:00Z", "le:2024-02-01T00:00:00Z"]
        );
        assert_eq!(encode_time_range(None, Some(&before)).len(), 1);
        assert!(encode_time_range(None, None).is_empty());

        let range = TimeRange::parse(&encode_time_range(Some(&after), Some(&before))).unwrap();
        assert!(range.contains(Some(after.with_timezone(&Utc))));
        assert!(!range.contains(None));
    }

    #[test]
    fn test_quality_collapse() {
        let all = [
            QualityInput::from(ResultQuality::Good),
            QualityInput::from("bad"),
            QualityInput::from("UNKNOWN"),
        ];
        assert_eq!(encode_quality(&all).unwrap(), None);

        let one = [QualityInput::from("good"), QualityInput::from(ResultQuality::Good)];
        assert_eq!(encode_quality(&one).unwrap().as_deref(), Some("Good"));

        let two = [QualityInput::from("good"), QualityInput::from("unknown")];
        assert_eq!(
            encode_quality(&two).unwrap().as_deref(),
            Some("in:Good,No Information")
        );

        assert!(encode_quality(&[QualityInput::from("great")]).is_err());
        assert_eq!(encode_quality(&[]).unwrap(), None);
    }

    #[test]
    fn test_location_hierarchy() {
        let err = validate_location(None, None, Some("p")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("hub") && msg.contains("group"));

        let err = validate_location(None, Some("g"), None).unwrap_err();
        assert!(err.to_string().contains("group is specified, hub must"));

        let err = validate_location(Some("h"), None, Some("p")).unwrap_err();
        assert!(err.to_string().ends_with("group must also be specified."));

        assert!(validate_location(Some("h"), Some("g"), Some("p")).is_ok());
        assert!(validate_location(Some("h"), None, None).is_ok());
    }

    #[test]
    fn test_mutually_exclusive_toggles() {
        let err = ExperimentFilter::new()
            .exclude_public()
            .public_only()
            .to_query()
            .unwrap_err();
        assert!(matches!(err, ResultDbError::InvalidArgument(_)));
        assert!(ExperimentFilter::new().exclude_mine().mine_only().to_query().is_err());
        assert!(ExperimentFilter::new().exclude_public().mine_only().to_query().is_ok());
    }

    #[test]
    fn test_experiment_query_params() {
        let query = ExperimentFilter::new()
            .experiment_type("T")
            .experiment_type_operator("like")
            .backend_name("B1")
            .tags(["a"], "OR")
            .exclude_public()
            .mine_only()
            .sort_by("start_time:asc")
            .to_query()
            .unwrap();
        let params = query.to_params(Some(5), Some("m1"));
        assert!(params.contains(&("type", "like:T".to_string())));
        assert!(params.contains(&("device_name", "B1".to_string())));
        assert!(params.contains(&("tags", "any:a".to_string())));
        assert!(params.contains(&("visibility", "!public".to_string())));
        assert!(params.contains(&("owner", "me".to_string())));
        assert!(params.contains(&("sort", "start_time:asc".to_string())));
        assert!(params.contains(&("limit", "5".to_string())));
        assert!(params.contains(&("marker", "m1".to_string())));
    }

    #[test]
    fn test_result_query_params_repeat_components() {
        let query = AnalysisResultFilter::new()
            .device_components(["Q0", "Q1"])
            .verified(false)
            .to_query()
            .unwrap();
        let params = query.to_params(None, None);
        let components: Vec<_> = params
            .iter()
            .filter(|(k, _)| *k == "device_components")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(components, vec!["Q0", "Q1"]);
        assert!(params.contains(&("verified", "false".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "limit"));
    }

    #[test]
    fn test_decoders() {
        assert!(TagMatch::parse("any:a,b").unwrap().matches(&["b".to_string()]));
        assert!(!TagMatch::parse("contains:a,b").unwrap().matches(&["b".to_string()]));
        assert!(TagMatch::parse("a,b").is_err());

        let exact = ComponentsMatch::parse(&ParamValue::Many(vec!["Q1".into(), "Q0".into()]));
        assert!(exact.matches(&["Q0".to_string(), "Q1".to_string()]));
        assert!(!exact.matches(&["Q0".to_string()]));
        let contains = ComponentsMatch::parse(&ParamValue::One("contains:Q0".into()));
        assert!(contains.matches(&["Q0".to_string(), "Q1".to_string()]));

        assert_eq!(
            parse_quality_filter("in:Good,Bad").unwrap(),
            vec![ResultQuality::Good, ResultQuality::Bad]
        );
        assert_eq!(
            parse_sort("type:asc,uuid:asc").unwrap(),
            vec![("type".to_string(), true), ("uuid".to_string(), true)]
        );
    }
}
