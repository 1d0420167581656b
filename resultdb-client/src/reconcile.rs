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

//! Create-or-update reconciliation.
//!
//! The database only offers strict create (fails when the entry exists) and
//! strict update (fails when it does not). [`create_or_update`] flips
//! between the two on those specific failures until one succeeds or the
//! attempts run out.

use tracing::debug;

use resultdb_core::{Result, ResultDbError};

/// Which call the next attempt makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertStep {
    Create,
    Update,
}

impl UpsertStep {
    pub fn initial(create: bool) -> Self {
        if create {
            UpsertStep::Create
        } else {
            UpsertStep::Update
        }
    }
}

/// Run `create` or `update`, switching on `EntryExists` / `EntryNotFound`.
///
/// Any other error is returned immediately. After `max_attempts` calls the
/// last switching error is returned.
pub fn create_or_update<T, C, U>(
    mut create: C,
    mut update: U,
    start_with_create: bool,
    max_attempts: u32,
) -> Result<T>
where
    C: FnMut() -> Result<T>,
    U: FnMut() -> Result<T>,
{
    if max_attempts == 0 {
        return Err(ResultDbError::InvalidArgument(
            "max_attempts has to be a positive integer".to_string(),
        ));
    }

    let mut step = UpsertStep::initial(start_with_create);
    let mut last_error = None;
    for attempt in 1..=max_attempts {
        let outcome = match step {
            UpsertStep::Create => create(),
            UpsertStep::Update => update(),
        };
        match outcome {
            Ok(value) => return Ok(value),
            Err(err) if step == UpsertStep::Create && err.is_entry_exists() => {
                debug!(attempt, "Entry exists, switching to update");
                step = UpsertStep::Update;
                last_error = Some(err);
            }
            Err(err) if step == UpsertStep::Update && err.is_entry_not_found() => {
                debug!(attempt, "Entry missing, switching to create");
                step = UpsertStep::Create;
                last_error = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    Err(last_error.unwrap_or_else(|| {
        ResultDbError::request_failed("create or update gave up without an attempt")
    }))
}
