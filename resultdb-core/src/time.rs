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

//! Timestamp conversion between the wire (UTC, `Z` suffix) and records
//! (local time with the offset attached).

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};

use crate::error::{ResultDbError, Result};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse a timestamp string into UTC.
///
/// Strings without an offset are taken to be UTC already.
pub fn str_to_utc(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(ResultDbError::Serialization(format!(
        "'{}' is not a recognized timestamp",
        value
    )))
}

/// Convert a wire timestamp into local time.
pub fn utc_to_local(value: &str) -> Result<DateTime<FixedOffset>> {
    Ok(str_to_utc(value)?.with_timezone(&Local).fixed_offset())
}

/// Render a timestamp as UTC ISO-8601 with a `Z` suffix.
pub fn local_to_utc_str(value: &DateTime<FixedOffset>) -> String {
    value
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Current time in the local zone.
pub fn now_local() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}
