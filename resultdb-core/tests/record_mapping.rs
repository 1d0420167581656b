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

//! Round-trip properties of the wire and tabular record mappings.

use chrono::{DateTime, FixedOffset, TimeZone};
use proptest::prelude::*;
use resultdb_core::tabular::{result_to_row, row_to_result};
use resultdb_core::{
    decode_analysis_result, decode_experiment, encode_analysis_result, encode_experiment,
    AnalysisResultRecord, DeviceComponent, ExperimentRecord, Metadata, ResultQuality, ShareLevel,
    WireAnalysisResult, WireExperiment,
};

fn timestamp() -> impl Strategy<Value = DateTime<FixedOffset>> {
    (
        1_500_000_000i64..2_000_000_000i64,
        0u32..1_000_000u32,
        -(12 * 60)..(14 * 60i32),
    )
        .prop_map(|(secs, micros, offset_minutes)| {
            let offset = FixedOffset::east_opt(offset_minutes * 60).unwrap();
            offset.timestamp_opt(secs, micros * 1_000).unwrap()
        })
}

fn name() -> impl Strategy<Value = String> {
    "[a-z0-9_-]{1,12}"
}

fn metadata() -> impl Strategy<Value = Metadata> {
    prop::collection::hash_map(
        "[a-z]{1,6}",
        prop_oneof![
            any::<i64>().prop_map(serde_json::Value::from),
            "[a-zA-Z ]{0,10}".prop_map(serde_json::Value::from),
            any::<bool>().prop_map(serde_json::Value::from),
        ],
        0..4,
    )
}

fn share_level() -> impl Strategy<Value = ShareLevel> {
    prop::sample::select(ShareLevel::ALL.to_vec())
}

fn quality() -> impl Strategy<Value = ResultQuality> {
    prop::sample::select(ResultQuality::ALL.to_vec())
}

fn component() -> impl Strategy<Value = DeviceComponent> {
    prop_oneof![
        (0u32..128).prop_map(DeviceComponent::Qubit),
        (0u32..16).prop_map(DeviceComponent::Resonator),
        "[a-z]{2,6}".prop_map(DeviceComponent::Unknown),
    ]
}

prop_compose! {
    fn experiment()(
        experiment_id in name(),
        parent_id in prop::option::of(name()),
        kind in (name(), name()),
        tags in prop::collection::vec(name(), 0..4),
        job_ids in prop::collection::vec(name(), 0..3),
        share_level in prop::option::of(share_level()),
        metadata in metadata(),
        figure_names in prop::collection::vec(name(), 0..3),
        notes in prop::option::of(name()),
        location in prop::option::of((name(), name(), name())),
        owner in prop::option::of(name()),
        times in (
            prop::option::of(timestamp()),
            prop::option::of(timestamp()),
            prop::option::of(timestamp()),
            prop::option::of(timestamp()),
        ),
    ) -> ExperimentRecord {
        let (hub, group, project) = match location {
            Some((h, g, p)) => (Some(h), Some(g), Some(p)),
            None => (None, None, None),
        };
        let (experiment_type, backend) = kind;
        ExperimentRecord {
            experiment_id,
            parent_id,
            experiment_type,
            backend,
            tags,
            job_ids,
            share_level,
            metadata,
            figure_names,
            notes,
            hub,
            group,
            project,
            owner,
            creation_datetime: times.0,
            start_datetime: times.1,
            end_datetime: times.2,
            updated_datetime: times.3,
        }
    }
}

prop_compose! {
    fn analysis_result()(
        result_id in name(),
        experiment_id in name(),
        result_type in name(),
        result_data in metadata(),
        device_components in prop::collection::vec(component(), 0..4),
        quality in quality(),
        verified in any::<bool>(),
        tags in prop::collection::vec(name(), 0..4),
        backend_name in prop::option::of(name()),
        chisq in prop::option::of((0u32..4000).prop_map(|n| n as f64 / 8.0)),
        times in (prop::option::of(timestamp()), prop::option::of(timestamp())),
    ) -> AnalysisResultRecord {
        let (creation_datetime, updated_datetime) = times;
        AnalysisResultRecord {
            result_id,
            experiment_id,
            result_type,
            result_data,
            device_components,
            quality,
            verified,
            tags,
            backend_name,
            chisq,
            creation_datetime,
            updated_datetime,
        }
    }
}

proptest! {
    #[test]
    fn experiment_survives_wire_round_trip(record in experiment()) {
        let json = serde_json::to_string(&encode_experiment(&record)).unwrap();
        let wire: WireExperiment = serde_json::from_str(&json).unwrap();
        let decoded = decode_experiment(wire).unwrap();
        prop_assert_eq!(decoded, record);
    }

    #[test]
    fn analysis_result_survives_wire_round_trip(record in analysis_result()) {
        let json = serde_json::to_string(&encode_analysis_result(&record)).unwrap();
        let wire: WireAnalysisResult = serde_json::from_str(&json).unwrap();
        let decoded = decode_analysis_result(wire).unwrap();
        prop_assert_eq!(decoded, record);
    }

    #[test]
    fn wire_never_carries_empty_values(record in experiment()) {
        let value = serde_json::to_value(encode_experiment(&record)).unwrap();
        for (key, field) in value.as_object().unwrap() {
            prop_assert!(!field.is_null(), "{} sent as null", key);
            if let Some(items) = field.as_array() {
                prop_assert!(!items.is_empty(), "{} sent empty", key);
            }
        }
    }

    #[test]
    fn tabular_row_keeps_tabular_fields(record in analysis_result()) {
        let back = row_to_result(&result_to_row(&record)).unwrap();
        prop_assert_eq!(back.result_id, record.result_id);
        prop_assert_eq!(back.experiment_id, record.experiment_id);
        prop_assert_eq!(back.quality, record.quality);
        prop_assert_eq!(back.device_components, record.device_components);
        prop_assert_eq!(back.tags, record.tags);
        prop_assert_eq!(back.chisq, record.chisq);
        prop_assert_eq!(back.creation_datetime, record.creation_datetime);
    }
}

#[test]
fn timestamps_come_back_in_local_time_with_same_instant() {
    let start = DateTime::parse_from_rfc3339("2024-05-06T07:08:09.5+05:30").unwrap();
    let record = ExperimentRecord::new("T1", "B1").with_start(start);
    let wire = encode_experiment(&record);
    assert_eq!(wire.start_time.as_deref(), Some("2024-05-06T01:38:09.500Z"));
    let decoded = decode_experiment(wire).unwrap();
    assert_eq!(decoded.start_datetime.unwrap(), start);
}
