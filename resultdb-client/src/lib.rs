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

//! ResultDB Client
//!
//! [`ExperimentService`] over either the hosted results database
//! ([`RemoteBackend`]) or a local store, plus the pieces it is built from:
//! marker pagination, create-or-update reconciliation and the concurrent
//! bulk saver.
//!
//! # Example
//!
//! ```no_run
//! use resultdb_client::ExperimentService;
//! use resultdb_core::{ExperimentFilter, ExperimentRecord, LocalStoreConfig, ServiceOptions};
//!
//! fn main() -> resultdb_core::Result<()> {
//!     let service = ExperimentService::local(
//!         LocalStoreConfig::persistent("./resultdb"),
//!         ServiceOptions::unattended(),
//!     )?;
//!     let created = service.create_experiment(&ExperimentRecord::new("T1", "device_a"))?;
//!     let found = service.experiments(&ExperimentFilter::new().experiment_type("T1"), Some(10))?;
//!     assert!(found.iter().any(|e| e.experiment_id == created.experiment_id));
//!     Ok(())
//! }
//! ```

pub mod bulk;
pub mod confirm;
pub mod pagination;
pub mod reconcile;
pub mod remote;
pub mod service;

pub use bulk::{spawn_bulk_save, BulkSaveHandle, FailedSave, SaveStatus};
pub use confirm::{AlwaysConfirm, Confirm, StdinConfirm};
pub use pagination::paginate;
pub use reconcile::{create_or_update, UpsertStep};
pub use remote::{RemoteBackend, RemoteConfig};
pub use service::{ExperimentService, FigureSource, FigureUpload, FileData};
