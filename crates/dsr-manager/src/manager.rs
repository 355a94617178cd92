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

//! The Manager: the single owner of the Database, the queues that feed it,
//! and the Jobs currently in flight. `tick()` is the only method the host
//! calls once per UI frame.

use crate::scheduler::JobScheduler;
use dsr_core::access::AccessLevel;
use dsr_core::config::ResourceLoaderConfig;
use dsr_core::db::Database;
use dsr_core::kind::ResourceKind;
use dsr_core::observer::{ObserverTag, ResourceObserver};
use dsr_core::path::VirtualPath;
use dsr_core::request::LoadReply;
use dsr_pipeline::job::{Job, JobDependencies};
use dsr_pipeline::JobBuilder;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// One queued `observe` call, waiting for the next tick's step 1.
pub struct ObservationRequest {
    /// The virtual path to observe.
    pub path: VirtualPath,
    /// The kind the handle should be created under, if it doesn't exist.
    pub kind: ResourceKind,
    /// The weakly-held observer to register.
    pub observer: Weak<dyn ResourceObserver>,
    /// The access level this observer requires before being notified.
    pub required_access: AccessLevel,
    /// Caller-chosen token handed back verbatim on notification.
    pub tag: ObserverTag,
}

/// One queued unload request, waiting for the next tick's step 2.
pub struct UnloadRequest {
    /// The virtual path to unload.
    pub path: VirtualPath,
    /// If `true`, unload regardless of reference count; otherwise only if
    /// `ref_count == 0`.
    pub unconditional: bool,
}

/// A hook for flushing pending GPU geometry staging once every active Job
/// has finished. The renderer this talks to is out of this subsystem's
/// scope, so the Manager only calls it if the host supplied one.
pub type StagingFlush = Arc<dyn Fn() + Send + Sync>;

/// One Job the Manager is tracking: its façade, and the replies drained
/// from it so far but not yet installed.
///
/// Replies are held back until the Job finishes rather than installed as
/// they arrive, so a Job that ends up fatal (strict-mode descriptor
/// exhaustion) never leaves a partially-installed texture behind (§8
/// scenario 6) — the whole batch is installed or discarded together.
struct ActiveJob {
    builder: Arc<JobBuilder>,
    pending: Vec<LoadReply>,
}

/// Owns the Database, the in-flight set, the active-job registry, the
/// unload/observation queues, and the Job scheduler.
pub struct Manager {
    db: Database,
    deps: JobDependencies,
    config: ResourceLoaderConfig,
    in_flight: Arc<Mutex<HashSet<VirtualPath>>>,
    active_jobs: Mutex<Vec<ActiveJob>>,
    unload_queue: Mutex<VecDeque<UnloadRequest>>,
    observation_queue: Mutex<VecDeque<ObservationRequest>>,
    scheduler: JobScheduler,
    staging_flush: Option<StagingFlush>,
    udsfm_pending: AtomicBool,
    unloaded_textures_pending: AtomicBool,
    had_active_jobs_last_tick: AtomicBool,
}

impl Manager {
    /// Builds a Manager around its external collaborators and configuration.
    pub fn new(deps: JobDependencies, config: ResourceLoaderConfig) -> Self {
        Self {
            db: Database::new(),
            deps,
            config,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            active_jobs: Mutex::new(Vec::new()),
            unload_queue: Mutex::new(VecDeque::new()),
            observation_queue: Mutex::new(VecDeque::new()),
            scheduler: JobScheduler::new(config.job_scheduler_width),
            staging_flush: None,
            udsfm_pending: AtomicBool::new(false),
            unloaded_textures_pending: AtomicBool::new(false),
            had_active_jobs_last_tick: AtomicBool::new(false),
        }
    }

    /// Installs the GPU geometry staging flush hook, called once every
    /// active Job has finished (tick step 4).
    pub fn with_staging_flush(mut self, flush: StagingFlush) -> Self {
        self.staging_flush = Some(flush);
        self
    }

    /// The database this Manager owns.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Queues an `observe` call for the next tick's step 1.
    pub fn queue_observation(&self, req: ObservationRequest) {
        self.observation_queue.lock().unwrap().push_back(req);
    }

    /// Queues an unload request for the next tick's step 2.
    pub fn queue_unload(&self, req: UnloadRequest) {
        self.unload_queue.lock().unwrap().push_back(req);
    }

    /// Marks the one-shot UDSFM texture refresh to run on a future tick
    /// once no Jobs are active.
    pub fn request_udsfm_refresh(&self) {
        self.udsfm_pending.store(true, Ordering::SeqCst);
    }

    /// Marks the one-shot unloaded-texture refresh to run on a future tick
    /// once no Jobs are active.
    pub fn request_unloaded_textures_refresh(&self) {
        self.unloaded_textures_pending.store(true, Ordering::SeqCst);
    }

    /// Creates a new Job and its façade, registers it as active, and
    /// returns the builder for the caller to post work onto. The Job stays
    /// open (no shutdown sequence runs) until [`Self::finish_job`] is
    /// called.
    pub fn start_job(&self, name: impl Into<String>) -> Arc<JobBuilder> {
        let job = Arc::new(Job::new(name, self.deps.clone(), self.config));
        let builder = Arc::new(JobBuilder::new(
            job,
            self.deps.asset_locator.clone(),
            self.in_flight.clone(),
        ));
        self.active_jobs.lock().unwrap().push(ActiveJob {
            builder: builder.clone(),
            pending: Vec::new(),
        });
        builder
    }

    /// Closes `builder`'s Job for further posts and schedules its (a)-(e)
    /// shutdown orchestration on the Job scheduler. Call once the caller
    /// has posted everything it intends to for this batch.
    ///
    /// The completion handle is awaited (not dropped) by a supervisor task
    /// so a fatal error or an outright panic inside `complete()` is logged
    /// rather than silently lost; the fatal/non-fatal outcome itself is
    /// read back off the Job by `drain_replies_and_reap_finished_jobs`,
    /// which gates installation on it.
    pub fn finish_job(&self, builder: &Arc<JobBuilder>) {
        let handle = self.scheduler.spawn_completion(builder.job().clone());
        let name = builder.job().name().to_string();
        tokio::spawn(async move {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => log::error!("job '{name}' completed with a fatal error: {err}"),
                Err(join_err) => log::error!("job '{name}' completion task panicked: {join_err}"),
            }
        });
    }

    /// Runs one frame's worth of work. Non-blocking: every queue drain is
    /// a try-receive/try-pop and every action is bounded.
    pub fn tick(&self) {
        self.drain_observations();

        let jobs_active_before = !self.active_jobs.lock().unwrap().is_empty();
        if !jobs_active_before {
            self.in_flight.lock().unwrap().clear();
            self.drain_unloads();
        }

        self.drain_replies_and_reap_finished_jobs();

        let jobs_active_after = !self.active_jobs.lock().unwrap().is_empty();
        if !jobs_active_after {
            if let Some(flush) = &self.staging_flush {
                flush();
            }
            self.run_refreshes_if_flagged();
        }

        if self.had_active_jobs_last_tick.load(Ordering::SeqCst) && !jobs_active_after {
            self.sweep_unused();
        }
        self.had_active_jobs_last_tick
            .store(jobs_active_after, Ordering::SeqCst);
    }

    fn drain_observations(&self) {
        let queued: Vec<_> = {
            let mut q = self.observation_queue.lock().unwrap();
            q.drain(..).collect()
        };
        for req in queued {
            if let Err(err) = self
                .db
                .observe(&req.path, req.kind, req.observer, req.required_access, req.tag)
            {
                panic!("fatal resource error observing {}: {err}", req.path);
            }
        }
    }

    fn drain_unloads(&self) {
        let queued: Vec<_> = {
            let mut q = self.unload_queue.lock().unwrap();
            q.drain(..).collect()
        };
        for req in queued {
            let Some(handle) = self.db.lookup(&req.path) else {
                continue;
            };
            if req.unconditional || handle.ref_count() == 0 {
                handle.unload();
                if handle.ref_count() == 0 {
                    self.db.remove(&req.path);
                }
            }
        }
    }

    fn drain_replies_and_reap_finished_jobs(&self) {
        let mut jobs = self.active_jobs.lock().unwrap();
        for entry in jobs.iter_mut() {
            let job = entry.builder.job();
            for reply in job.drain_replies() {
                job.metrics().bump_progress();
                entry.pending.push(reply);
            }
        }
        jobs.retain_mut(|entry| {
            let job = entry.builder.job();
            if !job.is_finished() {
                return true;
            }
            if job.is_fatal() {
                log::error!(
                    "job '{}' ended fatally; discarding {} pending repl{} instead of installing them",
                    job.name(),
                    entry.pending.len(),
                    if entry.pending.len() == 1 { "y" } else { "ies" },
                );
            } else {
                for reply in entry.pending.drain(..) {
                    let kind = reply.resource.kind();
                    match self.db.get_or_create(kind, &reply.path) {
                        Ok(handle) => handle.install(reply.resource, reply.access),
                        Err(err) => panic!("fatal resource error installing {}: {err}", reply.path),
                    }
                }
            }
            log::trace!("job '{}' finished", job.name());
            false
        });
        log::trace!("jobs active: {}", jobs.len());
    }

    fn run_refreshes_if_flagged(&self) {
        if self.udsfm_pending.swap(false, Ordering::SeqCst) {
            let builder = self.start_job("udsfm-refresh");
            builder.load_udsfm_textures(&self.db);
            self.finish_job(&builder);
        }
        if self.unloaded_textures_pending.swap(false, Ordering::SeqCst) {
            let builder = self.start_job("unloaded-textures-refresh");
            builder.load_unloaded_textures(&self.db);
            self.finish_job(&builder);
        }
    }

    fn sweep_unused(&self) {
        log::trace!("sweep run");
        for handle in self.db.snapshot() {
            if handle.ref_count() == 0 && handle.is_loaded() {
                handle.unload();
                if handle.ref_count() == 0 {
                    self.db.remove(handle.virtual_path());
                }
            }
        }
    }
}
