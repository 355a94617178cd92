// Copyright 2025 eraflo
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

//! Bounds how many Jobs' completion orchestrations run concurrently.
//!
//! A Job's own pipelines already run their own worker pools; this only
//! caps how many Jobs are simultaneously walking their (a)-(e) shutdown
//! sequence, per the `job_scheduler_width` setting (default 4).

use dsr_core::error::ResourceError;
use dsr_pipeline::Job;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// A fixed-width gate on concurrent Job completions.
///
/// Unlike the hand-rolled thread pools in `dsr-pipeline::pool` (which drain
/// a plain function over a `crossbeam_channel`), a Job's `complete()` is
/// itself an async future that spawns further tasks onto the host's tokio
/// runtime; gating it with a `Semaphore` keeps that runtime's own executor
/// in charge of actually running the work.
pub struct JobScheduler {
    semaphore: Arc<Semaphore>,
}

impl JobScheduler {
    /// Builds a scheduler admitting up to `width` concurrent Job
    /// completions.
    pub fn new(width: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(width.max(1))),
        }
    }

    /// Spawns `job.complete()`, waiting for a free slot first. Returns a
    /// handle the Manager polls (non-blocking) to learn when the Job has
    /// finished.
    pub fn spawn_completion(&self, job: Arc<Job>) -> JoinHandle<Result<(), ResourceError>> {
        let semaphore = self.semaphore.clone();
        tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
            job.complete().await
        })
    }
}
