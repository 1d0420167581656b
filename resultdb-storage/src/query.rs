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

//! Query evaluation for the local store.
//!
//! Interprets the same encoded parameters the HTTP backend sends, so a
//! caller sees identical filtering and ordering from either backend.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

use resultdb_core::filter::{
    parse_quality_filter, parse_sort, ComponentsMatch, TagMatch, TextMatch, TimeRange,
    DEFAULT_ANALYSIS_RESULT_SORT, DEFAULT_EXPERIMENT_SORT, ID_TIEBREAK,
};
use resultdb_core::time::str_to_utc;
use resultdb_core::wire::quality_from_api;
use resultdb_core::{
    AnalysisResultQuery, ExperimentQuery, Page, ResultDbError, ResultQuality, Result, ShareLevel,
    WireAnalysisResult, WireExperiment,
};

/// Comparable value of one sort column.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum SortValue {
    Time(DateTime<Utc>),
    Text(String),
}

fn time_value(value: &Option<String>) -> Option<SortValue> {
    value
        .as_deref()
        .and_then(|text| str_to_utc(text).ok())
        .map(SortValue::Time)
}

fn text_value(value: &Option<String>) -> Option<SortValue> {
    value.clone().map(SortValue::Text)
}

/// Compiled experiment filter.
pub(crate) struct ExperimentMatcher {
    experiment_type: Option<TextMatch>,
    device_name: Option<String>,
    tags: Option<TagMatch>,
    start_time: TimeRange,
    hub_id: Option<String>,
    group_id: Option<String>,
    project_id: Option<String>,
    // Only ever selects children; root experiments cannot be asked for.
    parent: Option<String>,
    visibility: Option<(bool, ShareLevel)>,
    owner: Option<(bool, String)>,
}

impl ExperimentMatcher {
    pub(crate) fn compile(query: &ExperimentQuery, user: &str) -> Result<Self> {
        if query.device_components.is_some() {
            return Err(ResultDbError::InvalidFilter(
                "The local store does not support filtering experiments on device components"
                    .to_string(),
            ));
        }
        Ok(Self {
            experiment_type: query.experiment_type.as_deref().map(TextMatch::parse),
            device_name: query.device_name.clone(),
            tags: query.tags.as_deref().map(TagMatch::parse).transpose()?,
            start_time: TimeRange::parse(&query.start_time)?,
            hub_id: query.hub_id.clone(),
            group_id: query.group_id.clone(),
            project_id: query.project_id.clone(),
            parent: query.parent_experiment_uuid.clone(),
            visibility: query.visibility.as_deref().map(parse_visibility).transpose()?,
            owner: query
                .owner
                .as_deref()
                .map(|value| parse_owner(value, user))
                .transpose()?,
        })
    }

    pub(crate) fn matches(&self, exp: &WireExperiment) -> bool {
        if let Some(type_match) = &self.experiment_type {
            if !type_match.matches(exp.experiment_type.as_deref().unwrap_or("")) {
                return false;
            }
        }
        if !eq_opt(&self.device_name, &exp.device_name)
            || !eq_opt(&self.hub_id, &exp.hub_id)
            || !eq_opt(&self.group_id, &exp.group_id)
            || !eq_opt(&self.project_id, &exp.project_id)
            || !eq_opt(&self.parent, &exp.parent_experiment_uuid)
        {
            return false;
        }
        if let Some(tags) = &self.tags {
            if !tags.matches(exp.tags.as_deref().unwrap_or(&[])) {
                return false;
            }
        }
        if !self
            .start_time
            .contains(exp.start_time.as_deref().and_then(|t| str_to_utc(t).ok()))
        {
            return false;
        }
        if let Some((negated, level)) = &self.visibility {
            let is_level = exp.visibility.as_deref() == Some(level.as_str());
            if is_level == *negated {
                return false;
            }
        }
        if let Some((negated, user)) = &self.owner {
            let is_owner = exp.owner.as_deref() == Some(user.as_str());
            if is_owner == *negated {
                return false;
            }
        }
        true
    }
}

pub(crate) fn experiment_sort_value(exp: &WireExperiment, key: &str) -> Result<Option<SortValue>> {
    Ok(match key {
        "start_time" => time_value(&exp.start_time),
        "end_time" => time_value(&exp.end_time),
        "created_at" => time_value(&exp.created_at),
        "updated_at" => time_value(&exp.updated_at),
        "type" => text_value(&exp.experiment_type),
        "device_name" => text_value(&exp.device_name),
        "uuid" => text_value(&exp.uuid),
        other => {
            return Err(ResultDbError::InvalidSort(format!(
                "cannot sort experiments by '{}'",
                other
            )))
        }
    })
}

/// Compiled analysis result filter.
pub(crate) struct AnalysisResultMatcher {
    experiment_uuid: Option<String>,
    result_type: Option<TextMatch>,
    device_name: Option<String>,
    device_components: Option<ComponentsMatch>,
    quality: Option<Vec<ResultQuality>>,
    verified: Option<bool>,
    tags: Option<TagMatch>,
    created_at: TimeRange,
}

impl AnalysisResultMatcher {
    pub(crate) fn compile(query: &AnalysisResultQuery) -> Result<Self> {
        Ok(Self {
            experiment_uuid: query.experiment_uuid.clone(),
            result_type: query.result_type.as_deref().map(TextMatch::parse),
            device_name: query.device_name.clone(),
            device_components: query.device_components.as_ref().map(ComponentsMatch::parse),
            quality: query
                .quality
                .as_deref()
                .map(parse_quality_filter)
                .transpose()?,
            verified: query.verified,
            tags: query.tags.as_deref().map(TagMatch::parse).transpose()?,
            created_at: TimeRange::parse(&query.created_at)?,
        })
    }

    pub(crate) fn matches(&self, result: &WireAnalysisResult) -> bool {
        if !eq_opt(&self.experiment_uuid, &result.experiment_uuid)
            || !eq_opt(&self.device_name, &result.device_name)
        {
            return false;
        }
        if let Some(type_match) = &self.result_type {
            if !type_match.matches(result.result_type.as_deref().unwrap_or("")) {
                return false;
            }
        }
        if let Some(components) = &self.device_components {
            if !components.matches(result.device_components.as_deref().unwrap_or(&[])) {
                return false;
            }
        }
        if let Some(accepted) = &self.quality {
            let quality = result
                .quality
                .as_deref()
                .and_then(|q| quality_from_api(q).ok())
                .unwrap_or(ResultQuality::Unknown);
            if !accepted.contains(&quality) {
                return false;
            }
        }
        if let Some(verified) = self.verified {
            if result.verified.unwrap_or(false) != verified {
                return false;
            }
        }
        if let Some(tags) = &self.tags {
            if !tags.matches(result.tags.as_deref().unwrap_or(&[])) {
                return false;
            }
        }
        self.created_at
            .contains(result.created_at.as_deref().and_then(|t| str_to_utc(t).ok()))
    }
}

pub(crate) fn result_sort_value(result: &WireAnalysisResult, key: &str) -> Result<Option<SortValue>> {
    Ok(match key {
        "created_at" => time_value(&result.created_at),
        "updated_at" => time_value(&result.updated_at),
        "type" => text_value(&result.result_type),
        "device_components" => result
            .device_components
            .as_ref()
            .map(|c| SortValue::Text(c.join(","))),
        "uuid" => text_value(&result.uuid),
        other => {
            return Err(ResultDbError::InvalidSort(format!(
                "cannot sort analysis results by '{}'",
                other
            )))
        }
    })
}

/// Sort keys for a list call: the requested order (or the default) with the
/// id tiebreak appended.
pub(crate) fn sort_keys(requested: Option<&str>, default: &str) -> Result<Vec<(String, bool)>> {
    let order = format!("{},{}", requested.unwrap_or(default), ID_TIEBREAK);
    parse_sort(&order)
}

pub(crate) fn experiment_sort_keys(query: &ExperimentQuery) -> Result<Vec<(String, bool)>> {
    sort_keys(query.sort.as_deref(), DEFAULT_EXPERIMENT_SORT)
}

pub(crate) fn result_sort_keys(query: &AnalysisResultQuery) -> Result<Vec<(String, bool)>> {
    sort_keys(query.sort.as_deref(), DEFAULT_ANALYSIS_RESULT_SORT)
}

/// Sort `items` by `keys` and cut one page out of them.
///
/// Missing values sort last in either direction. The marker is the offset
/// of the next item.
pub(crate) fn sort_and_page<T, F>(
    items: Vec<T>,
    keys: &[(String, bool)],
    sort_value: F,
    limit: Option<usize>,
    marker: Option<&str>,
) -> Result<Page<T>>
where
    F: Fn(&T, &str) -> Result<Option<SortValue>>,
{
    let mut keyed = Vec::with_capacity(items.len());
    for item in items {
        let values = keys
            .iter()
            .map(|(key, _)| sort_value(&item, key))
            .collect::<Result<Vec<_>>>()?;
        keyed.push((values, item));
    }
    keyed.sort_by(|(a, _), (b, _)| {
        for ((left, right), (_, ascending)) in a.iter().zip(b.iter()).zip(keys) {
            let ord = compare(left, right, *ascending);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });

    let offset = match marker {
        Some(marker) => marker.parse::<usize>().map_err(|_| {
            ResultDbError::InvalidArgument(format!("'{}' is not a valid marker", marker))
        })?,
        None => 0,
    };
    let total = keyed.len();
    let end = match limit {
        Some(limit) => offset.saturating_add(limit).min(total),
        None => total,
    };
    let items: Vec<T> = keyed
        .into_iter()
        .skip(offset)
        .take(end.saturating_sub(offset))
        .map(|(_, item)| item)
        .collect();
    let next = if end < total { Some(end.to_string()) } else { None };
    Ok(Page::new(items, next))
}

fn compare(left: &Option<SortValue>, right: &Option<SortValue>, ascending: bool) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            if ascending {
                a.cmp(b)
            } else {
                b.cmp(a)
            }
        }
    }
}

fn eq_opt(wanted: &Option<String>, actual: &Option<String>) -> bool {
    match wanted {
        Some(wanted) => actual.as_deref() == Some(wanted.as_str()),
        None => true,
    }
}

fn parse_visibility(value: &str) -> Result<(bool, ShareLevel)> {
    let (negated, level) = negatable(value)?;
    Ok((negated, level.parse()?))
}

fn parse_owner(value: &str, user: &str) -> Result<(bool, String)> {
    match negatable(value)? {
        (negated, "me") => Ok((negated, user.to_string())),
        (_, other) => Err(ResultDbError::InvalidFilter(format!(
            "unsupported owner filter '{}'",
            other
        ))),
    }
}

fn negatable(value: &str) -> Result<(bool, &str)> {
    match value.strip_prefix('!') {
        Some(rest) if !rest.is_empty() => Ok((true, rest)),
        None if !value.is_empty() => Ok((false, value)),
        _ => Err(ResultDbError::InvalidFilter(format!(
            "'{}' is not a valid filter value",
            value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exp(id: &str, start: Option<&str>) -> WireExperiment {
        WireExperiment {
            uuid: Some(id.to_string()),
            start_time: start.map(ToString::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_order_is_newest_first_with_id_tiebreak() {
        let items = vec![
            exp("b", Some("2024-01-01T00:00:00Z")),
            exp("c", None),
            exp("a", Some("2024-01-01T00:00:00Z")),
            exp("d", Some("2024-06-01T00:00:00Z")),
        ];
        let keys = experiment_sort_keys(&ExperimentQuery::default()).unwrap();
        let page = sort_and_page(items, &keys, experiment_sort_value, None, None).unwrap();
        let ids: Vec<_> = page.items.iter().map(|e| e.uuid.clone().unwrap()).collect();
        assert_eq!(ids, vec!["d", "a", "b", "c"]);
        assert_eq!(page.marker, None);
    }

    #[test]
    fn test_paging_by_offset_marker() {
        let items: Vec<_> = (0..5).map(|i| exp(&format!("e{}", i), None)).collect();
        let keys = sort_keys(Some("uuid:asc"), DEFAULT_EXPERIMENT_SORT).unwrap();
        let first = sort_and_page(items.clone(), &keys, experiment_sort_value, Some(2), None).unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.marker.as_deref(), Some("2"));
        let last = sort_and_page(items, &keys, experiment_sort_value, Some(2), Some("4")).unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.marker, None);
    }

    #[test]
    fn test_visibility_and_owner() {
        let query = ExperimentQuery {
            visibility: Some("!public".into()),
            owner: Some("me".into()),
            ..Default::default()
        };
        let matcher = ExperimentMatcher::compile(&query, "alice").unwrap();
        let mut mine = exp("e1", None);
        mine.owner = Some("alice".into());
        mine.visibility = Some("private".into());
        assert!(matcher.matches(&mine));
        mine.visibility = Some("public".into());
        assert!(!matcher.matches(&mine));
        let mut theirs = exp("e2", None);
        theirs.owner = Some("bob".into());
        assert!(!matcher.matches(&theirs));
    }

    #[test]
    fn test_unknown_sort_key_rejected() {
        let keys = sort_keys(Some("owner:asc"), DEFAULT_EXPERIMENT_SORT).unwrap();
        let err = sort_and_page(vec![exp("a", None)], &keys, experiment_sort_value, None, None)
            .unwrap_err();
        assert!(matches!(err, ResultDbError::InvalidSort(_)));
    }
}
