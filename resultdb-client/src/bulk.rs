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

//! Concurrent bulk saver.
//!
//! Fans independent save operations out over a bounded pool of OS threads.
//! Item indices are queued on a crossbeam channel that the workers drain.
//! Each item ends up done or failed on its own; one failure never stops
//! its siblings.

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

use resultdb_core::{Result, ResultDbError};

/// An item whose save failed, with the error it failed on.
#[derive(Debug, Clone)]
pub struct FailedSave<I> {
    pub input: I,
    pub error: ResultDbError,
}

/// Partition of a bulk save by item state.
#[derive(Debug, Clone)]
pub struct SaveStatus<I> {
    /// Queued or in flight.
    pub running: Vec<I>,
    pub done: Vec<I>,
    pub failed: Vec<FailedSave<I>>,
}

impl<I> SaveStatus<I> {
    pub fn is_complete(&self) -> bool {
        self.running.is_empty()
    }

    pub fn is_success(&self) -> bool {
        self.running.is_empty() && self.failed.is_empty()
    }
}

#[derive(Debug)]
enum Slot<O> {
    Pending,
    Done(O),
    Failed(ResultDbError),
}

struct Shared<I, O> {
    inputs: Vec<I>,
    slots: Mutex<Vec<Slot<O>>>,
}

/// Handle on a running bulk save.
pub struct BulkSaveHandle<I, O> {
    shared: Arc<Shared<I, O>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<I: Clone, O: Clone> BulkSaveHandle<I, O> {
    /// Point-in-time partition of the items.
    ///
    /// Items are read one after another under a single lock, but workers
    /// keep running: an item reported as running may complete right after
    /// the snapshot is taken.
    pub fn status(&self) -> SaveStatus<I> {
        let slots = self.shared.slots.lock();
        let mut status = SaveStatus {
            running: Vec::new(),
            done: Vec::new(),
            failed: Vec::new(),
        };
        for (input, slot) in self.shared.inputs.iter().zip(slots.iter()) {
            match slot {
                Slot::Pending => status.running.push(input.clone()),
                Slot::Done(_) => status.done.push(input.clone()),
                Slot::Failed(error) => status.failed.push(FailedSave {
                    input: input.clone(),
                    error: error.clone(),
                }),
            }
        }
        status
    }

    /// Outputs of the items that completed, in input order.
    pub fn outputs(&self) -> Vec<O> {
        self.shared
            .slots
            .lock()
            .iter()
            .filter_map(|slot| match slot {
                Slot::Done(output) => Some(output.clone()),
                _ => None,
            })
            .collect()
    }

    /// Wait for every worker to exit.
    pub fn block_for_save(&self) {
        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for worker in workers {
            if worker.join().is_err() {
                warn!("Bulk save worker terminated abnormally");
            }
        }
    }

    /// Block, then return the final status.
    pub fn wait(self) -> SaveStatus<I> {
        self.block_for_save();
        self.status()
    }

    pub fn len(&self) -> usize {
        self.shared.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.inputs.is_empty()
    }
}

/// Start saving `inputs` with `task` on at most `max_workers` threads.
///
/// Returns immediately; use [`BulkSaveHandle::block_for_save`] or
/// [`BulkSaveHandle::wait`] to wait for completion.
pub fn spawn_bulk_save<I, O, F>(inputs: Vec<I>, max_workers: usize, task: F) -> BulkSaveHandle<I, O>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
    F: Fn(&I) -> Result<O> + Send + Sync + 'static,
{
    let count = inputs.len();
    let shared = Arc::new(Shared {
        slots: Mutex::new((0..count).map(|_| Slot::Pending).collect()),
        inputs,
    });
    let task = Arc::new(task);

    let (jobs, queue) = crossbeam_channel::unbounded::<usize>();
    for index in 0..count {
        // The receiver is alive, so the send cannot fail.
        let _ = jobs.send(index);
    }
    drop(jobs);

    let worker_count = max_workers.max(1).min(count);
    debug!(items = count, workers = worker_count, "Starting bulk save");

    let mut workers = Vec::with_capacity(worker_count);
    for index in 0..worker_count {
        let shared_for_worker = Arc::clone(&shared);
        let task_for_worker = Arc::clone(&task);
        let queue_for_worker = queue.clone();
        let spawned = thread::Builder::new()
            .name(format!("resultdb-save-{}", index))
            .spawn(move || {
                drain_queue(&queue_for_worker, &shared_for_worker, task_for_worker.as_ref())
            });
        match spawned {
            Ok(handle) => workers.push(handle),
            Err(err) => {
                warn!(error = %err, "Could not start bulk save worker");
                break;
            }
        }
    }
    if workers.is_empty() && count > 0 {
        // No thread could be started; save on the caller's thread instead.
        drain_queue(&queue, &shared, task.as_ref());
    }

    BulkSaveHandle {
        shared,
        workers: Mutex::new(workers),
    }
}

/// Save queued items until the channel is empty and closed.
fn drain_queue<I, O, F>(queue: &Receiver<usize>, shared: &Shared<I, O>, task: &F)
where
    F: Fn(&I) -> Result<O>,
{
    for index in queue.iter() {
        let Some(input) = shared.inputs.get(index) else {
            continue;
        };
        let outcome = match catch_unwind(AssertUnwindSafe(|| task(input))) {
            Ok(Ok(output)) => Slot::Done(output),
            Ok(Err(error)) => Slot::Failed(error),
            Err(_) => Slot::Failed(ResultDbError::request_failed("save task panicked")),
        };
        if let Slot::Failed(error) = &outcome {
            debug!(item = index, error = %error, "Bulk save item failed");
        }
        shared.slots.lock()[index] = outcome;
    }
}
