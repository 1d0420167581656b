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

//! Marker-driven pagination.

use tracing::debug;

use resultdb_core::filter::validate_limit;
use resultdb_core::{Page, Result};

/// Fetch pages until `limit` items are collected or the backend runs out.
///
/// `fetch` receives the number of items still wanted (`None` when
/// unlimited) and the marker of the previous page. A page without a marker
/// ends the walk, and so does an empty page.
pub fn paginate<T, F>(limit: Option<usize>, mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(Option<usize>, Option<&str>) -> Result<Page<T>>,
{
    validate_limit(limit)?;

    let mut items = Vec::new();
    let mut remaining = limit;
    let mut marker: Option<String> = None;
    let mut pages = 0usize;
    loop {
        let page = fetch(remaining, marker.as_deref())?;
        pages += 1;
        let count = page.items.len();
        items.extend(page.items);

        if let Some(left) = remaining.as_mut() {
            *left = left.saturating_sub(count);
            if *left == 0 {
                break;
            }
        }
        match page.marker {
            Some(next) if count > 0 => marker = Some(next),
            _ => break,
        }
    }
    if let Some(limit) = limit {
        items.truncate(limit);
    }
    debug!(pages, items = items.len(), "Finished paginated listing");
    Ok(items)
}
