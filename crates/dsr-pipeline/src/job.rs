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

//! A named batch of load work: one instance of every kind pipeline, the
//! two front-end expansion stages, and the reply buffer they all publish
//! into.

use crate::archive_expansion::ArchiveExpansionStage;
use crate::pipeline::Pipeline;
use crate::texture_pipeline::TexturePipeline;
use dsr_core::error::ResourceError;
use dsr_core::interfaces::{AssetLocator, BinderReaderFactory, Decoder, GpuDescriptorAllocator, GpuUploadQueue, TextureContainerReader};
use dsr_core::request::{LoadReply, LoadRequest};
use dsr_core::resource::{CollisionPayload, FlverPayload, NavmeshHkxPayload, NavmeshPayload};
use dsr_core::ResourceLoaderConfig;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Thread-safe progress counters shared between a `Job` and the stages
/// that feed it, so the container-expansion stage can bump the estimate
/// without holding a reference back to the whole `Job`.
#[derive(Clone)]
pub struct JobMetrics {
    inner: Arc<JobMetricsInner>,
}

struct JobMetricsInner {
    estimate: AtomicU64,
    course_estimate: AtomicU64,
    progress: AtomicU64,
}

impl JobMetrics {
    /// Creates a fresh set of zeroed counters.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(JobMetricsInner {
                estimate: AtomicU64::new(0),
                course_estimate: AtomicU64::new(0),
                progress: AtomicU64::new(0),
            }),
        }
    }

    /// Bumps the fine-grained estimate by `n`.
    pub fn bump_estimate(&self, n: u64) {
        self.inner.estimate.fetch_add(n, Ordering::SeqCst);
    }

    /// Bumps the coarse estimate (used before a precise count is known,
    /// e.g. while an archive is still being opened) by `n`.
    pub fn bump_course_estimate(&self, n: u64) {
        self.inner.course_estimate.fetch_add(n, Ordering::SeqCst);
    }

    /// `max(estimate, course_estimate)`.
    pub fn estimated_size(&self) -> u64 {
        self.inner
            .estimate
            .load(Ordering::SeqCst)
            .max(self.inner.course_estimate.load(Ordering::SeqCst))
    }

    /// Replies processed by the Manager for this job so far.
    pub fn progress(&self) -> u64 {
        self.inner.progress.load(Ordering::SeqCst)
    }

    /// Records one more successfully installed reply. Called by the
    /// Manager's tick, never by the pipelines themselves.
    pub fn bump_progress(&self) {
        self.inner.progress.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for JobMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// The external collaborators a `Job` needs to build its pipelines and
/// expansion stages, bundled so `Job::new` doesn't take a dozen
/// parameters.
///
/// `Clone` because the Manager holds one template and hands a fresh clone
/// (every field is an `Arc`) to each Job it starts.
#[derive(Clone)]
pub struct JobDependencies {
    /// Resolves virtual paths and joins binder entry names.
    pub asset_locator: Arc<dyn AssetLocator>,
    /// Opens binder/container files.
    pub binder_factory: Arc<dyn BinderReaderFactory>,
    /// Decodes FLVER models.
    pub flver_decoder: Arc<dyn Decoder<FlverPayload>>,
    /// Decodes Havok collision meshes.
    pub collision_decoder: Arc<dyn Decoder<CollisionPayload>>,
    /// Decodes legacy navmeshes.
    pub navmesh_decoder: Arc<dyn Decoder<NavmeshPayload>>,
    /// Decodes Havok navmeshes.
    pub navmesh_hkx_decoder: Arc<dyn Decoder<NavmeshHkxPayload>>,
    /// Reads texture containers into slots.
    pub texture_container_reader: Arc<dyn TextureContainerReader>,
    /// Allocates GPU texture descriptors.
    pub descriptor_allocator: Arc<dyn GpuDescriptorAllocator>,
    /// Enqueues low-priority GPU uploads.
    pub upload_queue: Arc<dyn GpuUploadQueue>,
}

/// A named batch: one instance of each kind pipeline, the archive- and
/// container-expansion front-end stages, and the shared reply buffer.
pub struct Job {
    name: String,
    metrics: JobMetrics,
    finished: AtomicBool,
    reply_tx: crossbeam_channel::Sender<LoadReply>,
    reply_rx: crossbeam_channel::Receiver<LoadReply>,
    archive: ArchiveExpansionStage,
    flver: Arc<Pipeline<FlverPayload>>,
    collision: Arc<Pipeline<CollisionPayload>>,
    navmesh: Arc<Pipeline<NavmeshPayload>>,
    navmesh_hkx: Arc<Pipeline<NavmeshHkxPayload>>,
    texture: Arc<TexturePipeline>,
}

impl Job {
    /// Builds a Job's pipelines and expansion stages around its
    /// collaborators and the subsystem's configuration.
    pub fn new(name: impl Into<String>, deps: JobDependencies, config: ResourceLoaderConfig) -> Self {
        let (reply_tx, reply_rx) = crossbeam_channel::unbounded();
        let metrics = JobMetrics::new();
        let parallelism = config.pipeline_port_parallelism;

        let flver = Arc::new(Pipeline::new(
            DecoderAdapter(deps.flver_decoder.clone()),
            dsr_core::resource::ResourceValue::Flver,
            reply_tx.clone(),
            parallelism,
        ));
        let collision = Arc::new(Pipeline::new(
            DecoderAdapter(deps.collision_decoder.clone()),
            dsr_core::resource::ResourceValue::Collision,
            reply_tx.clone(),
            parallelism,
        ));
        let navmesh = Arc::new(Pipeline::new(
            DecoderAdapter(deps.navmesh_decoder.clone()),
            dsr_core::resource::ResourceValue::Navmesh,
            reply_tx.clone(),
            parallelism,
        ));
        let navmesh_hkx = Arc::new(Pipeline::new(
            DecoderAdapter(deps.navmesh_hkx_decoder.clone()),
            dsr_core::resource::ResourceValue::NavmeshHkx,
            reply_tx.clone(),
            parallelism,
        ));
        let texture = Arc::new(TexturePipeline::new(
            deps.texture_container_reader.clone(),
            deps.descriptor_allocator.clone(),
            deps.upload_queue.clone(),
            config,
            reply_tx.clone(),
            parallelism,
        ));

        let archive = ArchiveExpansionStage::new(
            deps.asset_locator,
            deps.binder_factory,
            config,
            metrics.clone(),
            flver.clone(),
            collision.clone(),
            navmesh.clone(),
            navmesh_hkx.clone(),
            texture.clone(),
        );

        Self {
            name: name.into(),
            metrics,
            finished: AtomicBool::new(false),
            reply_tx,
            reply_rx,
            archive,
            flver,
            collision,
            navmesh,
            navmesh_hkx,
            texture,
        }
    }

    /// The Job's name, for logging/diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` if the texture pipeline hit a strict-mode descriptor
    /// exhaustion. Only authoritative once [`Self::is_finished`] is true:
    /// the flag can still flip after a caller checks it mid-run.
    pub fn is_fatal(&self) -> bool {
        self.texture.is_fatal()
    }

    /// Forwards a `LoadArchive` request to the archive-expansion stage.
    pub fn post_archive(&self, req: crate::archive_expansion::LoadArchiveRequest) -> bool {
        self.archive.post(req)
    }

    /// Posts a single file-level or bytes-level request directly to the
    /// pipeline selected by `kind`.
    pub fn post_request(&self, kind: dsr_core::kind::ResourceKind, req: LoadRequest) -> bool {
        use dsr_core::kind::ResourceKind;
        let post_to_port = |pipeline_post_bytes: bool, req: LoadRequest| match kind {
            ResourceKind::Flver => {
                if pipeline_post_bytes {
                    self.flver.post_bytes(req)
                } else {
                    self.flver.post_file(req)
                }
            }
            ResourceKind::CollisionHkx => {
                if pipeline_post_bytes {
                    self.collision.post_bytes(req)
                } else {
                    self.collision.post_file(req)
                }
            }
            ResourceKind::Navmesh => {
                if pipeline_post_bytes {
                    self.navmesh.post_bytes(req)
                } else {
                    self.navmesh.post_file(req)
                }
            }
            ResourceKind::NavmeshHkx => {
                if pipeline_post_bytes {
                    self.navmesh_hkx.post_bytes(req)
                } else {
                    self.navmesh_hkx.post_file(req)
                }
            }
            ResourceKind::Texture => {
                log::warn!("texture requests must use post_container, not post_request");
                false
            }
        };
        match &req {
            LoadRequest::Bytes { .. } => post_to_port(true, req),
            LoadRequest::File { .. } => post_to_port(false, req),
            LoadRequest::TextureSlot { .. } => self.texture.post_slot(req),
        }
    }

    /// Forwards a container-expansion request to the texture pipeline.
    pub fn post_container(&self, req: crate::texture_pipeline::ExpandContainerRequest) -> bool {
        self.texture.post_container(req)
    }

    /// The Job's shared progress/estimate counters.
    pub fn metrics(&self) -> &JobMetrics {
        &self.metrics
    }

    /// `true` once `complete()` has fully resolved.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Non-blocking drain of everything currently queued on the reply
    /// buffer. Called by the Manager's tick.
    pub fn drain_replies(&self) -> Vec<LoadReply> {
        self.reply_rx.try_iter().collect()
    }

    /// Runs the mandatory (a)-(e) shutdown ordering, then flips
    /// `finished`. Returns `Err` if a strict-mode descriptor exhaustion
    /// occurred anywhere in the texture pipeline.
    pub async fn complete(&self) -> Result<(), ResourceError> {
        // (a) archive expansion first: it's the only producer of bytes/file
        // requests into the kind pipelines and of container-expansion
        // requests into the texture pipeline.
        let _ = self.archive.complete().await;

        // (b) each non-texture pipeline's bytes/file ports.
        let flver_done = self.flver.complete();
        let collision_done = self.collision.complete();
        let navmesh_done = self.navmesh.complete();
        let navmesh_hkx_done = self.navmesh_hkx.complete();
        let _ = flver_done.await;
        let _ = collision_done.await;
        let _ = navmesh_done.await;
        let _ = navmesh_hkx_done.await;

        // (c) container expansion, the only producer of slot requests.
        let _ = self.texture.complete_container().await;

        // (d) the slot loader itself.
        let _ = self.texture.complete_slot().await;

        // (e) every port has now drained.
        self.finished.store(true, Ordering::SeqCst);

        if self.texture.is_fatal() {
            return Err(ResourceError::ResourceExhausted {
                path: dsr_core::path::VirtualPath::new(format!("job:{}", self.name)),
            });
        }
        Ok(())
    }

    /// Exposes a clone of the reply sender, for request sources (e.g.
    /// direct texture slot posts that bypass the archive stage) that need
    /// to publish without going through a pipeline's own port.
    pub(crate) fn reply_sender(&self) -> crossbeam_channel::Sender<LoadReply> {
        self.reply_tx.clone()
    }
}

/// Adapts an `Arc<dyn Decoder<P>>` into a concrete `Decoder<P>` impl, so
/// `Pipeline::new` (which takes `D: Decoder<P> + 'static` by value) can be
/// handed a trait object without `Pipeline` itself needing to know about
/// `Arc`.
struct DecoderAdapter<P>(Arc<dyn Decoder<P>>);

impl<P: dsr_core::resource::Payload> Decoder<P> for DecoderAdapter<P> {
    fn decode_bytes(
        &self,
        buf: &[u8],
        access: dsr_core::access::AccessLevel,
        game: dsr_core::interfaces::GameFamily,
    ) -> Result<P, ResourceError> {
        self.0.decode_bytes(buf, access, game)
    }

    fn decode_file(
        &self,
        path: &std::path::Path,
        access: dsr_core::access::AccessLevel,
        game: dsr_core::interfaces::GameFamily,
    ) -> Result<P, ResourceError> {
        self.0.decode_file(path, access, game)
    }
}
