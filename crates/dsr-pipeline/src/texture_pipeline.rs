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

//! The texture pipeline: container expansion (unbounded) feeding a
//! bounded slot-loader stage that allocates GPU descriptors and enqueues
//! uploads.

use crate::job::JobMetrics;
use crate::pool::{BoundedPool, UnboundedStage};
use dsr_core::access::AccessLevel;
use dsr_core::config::ResourceLoaderConfig;
use dsr_core::interfaces::{GameFamily, GpuDescriptorAllocator, GpuUploadQueue, TextureContainerReader};
use dsr_core::path::VirtualPath;
use dsr_core::request::{LoadReply, LoadRequest};
use dsr_core::resource::{ResourceValue, TexturePayload};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Where a container-expansion request reads its bytes from.
#[derive(Debug)]
pub enum ContainerSource {
    /// Read the container from a real file on disk.
    File(PathBuf),
    /// The container's bytes are already in memory (e.g. a binder entry).
    Bytes(Vec<u8>),
}

/// A request to expand one texture container into its constituent slots.
///
/// Mirrors the spec's `ExpandContainer{path_base, container_or_file,
/// access, game, job}`; `job` is narrowed to the [`JobMetrics`] handle the
/// stage actually needs (bumping the estimate), avoiding a dependency
/// cycle back onto the owning `Job`.
pub struct ExpandContainerRequest {
    /// The virtual path slots are joined onto (already normalised for
    /// map-texture naming by the caller).
    pub path_base: VirtualPath,
    /// Where to read the container's bytes from.
    pub source: ContainerSource,
    /// The access level every slot is decoded for.
    pub access: AccessLevel,
    /// The game family whose decoding quirks apply.
    pub game: GameFamily,
    /// The owning Job's shared progress counters.
    pub metrics: JobMetrics,
}

/// Distinct from [`crate::pipeline::Pipeline`]: a texture container fans
/// out into many subresource slots, and slot installation requires a GPU
/// descriptor rather than just a decoded buffer.
pub struct TexturePipeline {
    container_stage: UnboundedStage<ExpandContainerRequest>,
    slot_stage: Arc<BoundedPool<LoadRequest>>,
    /// Set when a strict-mode descriptor allocation failure occurs; the
    /// owning Job checks this after `complete()` to decide whether to
    /// surface a fatal `ResourceExhausted`.
    pub fatal: Arc<AtomicBool>,
}

impl TexturePipeline {
    /// Builds the texture pipeline around its container reader, GPU
    /// descriptor allocator, and upload queue.
    pub fn new(
        container_reader: Arc<dyn TextureContainerReader>,
        descriptor_allocator: Arc<dyn GpuDescriptorAllocator>,
        upload_queue: Arc<dyn GpuUploadQueue>,
        config: ResourceLoaderConfig,
        reply_tx: crossbeam_channel::Sender<LoadReply>,
        parallelism: usize,
    ) -> Self {
        let fatal = Arc::new(AtomicBool::new(false));

        let slot_fatal = fatal.clone();
        let slot_reply = reply_tx;
        let slot_stage = Arc::new(BoundedPool::new(parallelism, parallelism * 2, move |req| {
            Self::process_slot(&descriptor_allocator, &upload_queue, config, &slot_reply, &slot_fatal, req);
        }));

        let container_slot_stage = slot_stage.clone();
        let container_stage = UnboundedStage::new(move |req: ExpandContainerRequest| {
            Self::process_container(&container_reader, config, &container_slot_stage, req);
        });

        Self {
            container_stage,
            slot_stage,
            fatal,
        }
    }

    fn process_container(
        container_reader: &Arc<dyn TextureContainerReader>,
        config: ResourceLoaderConfig,
        slot_stage: &BoundedPool<LoadRequest>,
        req: ExpandContainerRequest,
    ) {
        if !config.textures_enabled {
            return;
        }
        let slots = match &req.source {
            ContainerSource::File(path) => container_reader.read_file(path),
            ContainerSource::Bytes(bytes) => container_reader.read_bytes(bytes),
        };
        let slots = match slots {
            Ok(slots) => slots,
            Err(err) => {
                log::warn!("dropping texture container {}: {err}", req.path_base);
                return;
            }
        };
        req.metrics.bump_estimate(slots.len() as u64);
        for slot in slots {
            let slot_path = req.path_base.join(&slot.name);
            slot_stage.post(LoadRequest::TextureSlot {
                path: slot_path,
                bytes: slot.bytes,
                is_cube: slot.is_cube,
                game: req.game,
            });
        }
    }

    fn process_slot(
        descriptor_allocator: &Arc<dyn GpuDescriptorAllocator>,
        upload_queue: &Arc<dyn GpuUploadQueue>,
        config: ResourceLoaderConfig,
        reply_tx: &crossbeam_channel::Sender<LoadReply>,
        fatal: &Arc<AtomicBool>,
        req: LoadRequest,
    ) {
        let LoadRequest::TextureSlot {
            path, bytes, is_cube, ..
        } = req
        else {
            log::warn!("texture slot stage received a non-slot request");
            return;
        };

        let Some(descriptor) = descriptor_allocator.allocate(is_cube) else {
            if config.strict_resource_checking {
                fatal.store(true, Ordering::SeqCst);
                log::error!("descriptor pool exhausted for {path}: strict mode, aborting Job");
            } else {
                log::warn!("descriptor pool exhausted for {path}, dropping slot");
            }
            return;
        };

        upload_queue.enqueue_low_priority_upload(Box::new(move |_device, _cmd_list| {
            drop(bytes);
        }));

        let reply = LoadReply {
            path,
            access: AccessLevel::GpuOptimizedOnly,
            resource: ResourceValue::Texture(TexturePayload { descriptor }),
        };
        if reply_tx.send(reply).is_err() {
            log::warn!("reply buffer closed while posting a texture slot");
        }
    }

    /// Posts a container-expansion request.
    pub fn post_container(&self, req: ExpandContainerRequest) -> bool {
        self.container_stage.post(req)
    }

    /// Posts a slot request directly (used when a caller already has raw
    /// slot bytes in hand, bypassing container expansion).
    pub fn post_slot(&self, req: LoadRequest) -> bool {
        self.slot_stage.post(req)
    }

    /// `true` if a strict-mode descriptor allocation failure has occurred.
    pub fn is_fatal(&self) -> bool {
        self.fatal.load(Ordering::SeqCst)
    }

    /// Closes the container-expansion stage. This is the Job's shutdown
    /// step (c): must be awaited before [`Self::complete_slot`] (step d),
    /// and only after every other pipeline's ports are closed (step b).
    pub fn complete_container(&self) -> oneshot::Receiver<()> {
        self.container_stage.complete()
    }

    /// Closes the slot-loader stage. The Job's shutdown step (d).
    pub fn complete_slot(&self) -> oneshot::Receiver<()> {
        self.slot_stage.complete()
    }

    /// Closes container expansion then the slot stage in order, for
    /// standalone use outside a `Job`'s orchestrated shutdown.
    pub fn complete(&self) -> oneshot::Receiver<()> {
        let container_done = self.complete_container();
        let slot_stage = self.slot_stage.clone();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let _ = container_done.await;
            let slot_done = slot_stage.complete();
            let _ = slot_done.await;
            let _ = tx.send(());
        });
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsr_core::interfaces::{DescriptorHandle, TextureSlotDescriptor, UploadTask};
    use dsr_core::error::ResourceError;
    use std::sync::atomic::AtomicU64;

    struct FakeReader;
    impl TextureContainerReader for FakeReader {
        fn read_file(&self, _path: &std::path::Path) -> Result<Vec<TextureSlotDescriptor>, ResourceError> {
            unreachable!("tests only exercise read_bytes")
        }
        fn read_bytes(&self, bytes: &[u8]) -> Result<Vec<TextureSlotDescriptor>, ResourceError> {
            Ok(vec![
                TextureSlotDescriptor {
                    name: "tex0".into(),
                    is_cube: false,
                    bytes: bytes.to_vec(),
                },
                TextureSlotDescriptor {
                    name: "tex1".into(),
                    is_cube: false,
                    bytes: bytes.to_vec(),
                },
            ])
        }
    }

    struct FakeAllocator {
        next: AtomicU64,
        fail_after: Option<u64>,
    }
    impl GpuDescriptorAllocator for FakeAllocator {
        fn allocate(&self, _cube: bool) -> Option<DescriptorHandle> {
            let n = self.next.fetch_add(1, Ordering::SeqCst);
            if self.fail_after.is_some_and(|limit| n >= limit) {
                None
            } else {
                Some(DescriptorHandle(n))
            }
        }
    }

    struct FakeUploadQueue;
    impl GpuUploadQueue for FakeUploadQueue {
        fn enqueue_low_priority_upload(&self, task: UploadTask) {
            task(&(), &());
        }
    }

    #[tokio::test]
    async fn container_with_zero_slots_yields_zero_replies_and_zero_estimate() {
        struct EmptyReader;
        impl TextureContainerReader for EmptyReader {
            fn read_file(&self, _path: &std::path::Path) -> Result<Vec<TextureSlotDescriptor>, ResourceError> {
                Ok(vec![])
            }
            fn read_bytes(&self, _bytes: &[u8]) -> Result<Vec<TextureSlotDescriptor>, ResourceError> {
                Ok(vec![])
            }
        }

        let (reply_tx, reply_rx) = crossbeam_channel::unbounded();
        let metrics = JobMetrics::new();
        let pipeline = TexturePipeline::new(
            Arc::new(EmptyReader),
            Arc::new(FakeAllocator {
                next: AtomicU64::new(0),
                fail_after: None,
            }),
            Arc::new(FakeUploadQueue),
            ResourceLoaderConfig::default(),
            reply_tx,
            2,
        );
        pipeline.post_container(ExpandContainerRequest {
            path_base: VirtualPath::new("chr/c0001/c0001"),
            source: ContainerSource::Bytes(vec![]),
            access: AccessLevel::GpuOptimizedOnly,
            game: GameFamily::EldenRing,
            metrics: metrics.clone(),
        });
        pipeline.complete().await.unwrap();
        assert_eq!(metrics.estimated_size(), 0);
        assert!(reply_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn container_expansion_bumps_estimate_and_emits_one_reply_per_slot() {
        let (reply_tx, reply_rx) = crossbeam_channel::unbounded();
        let metrics = JobMetrics::new();
        let pipeline = TexturePipeline::new(
            Arc::new(FakeReader),
            Arc::new(FakeAllocator {
                next: AtomicU64::new(0),
                fail_after: None,
            }),
            Arc::new(FakeUploadQueue),
            ResourceLoaderConfig::default(),
            reply_tx,
            2,
        );
        pipeline.post_container(ExpandContainerRequest {
            path_base: VirtualPath::new("chr/c0001/c0001"),
            source: ContainerSource::Bytes(b"tpf".to_vec()),
            access: AccessLevel::GpuOptimizedOnly,
            game: GameFamily::EldenRing,
            metrics: metrics.clone(),
        });
        pipeline.complete().await.unwrap();
        assert_eq!(metrics.estimated_size(), 2);
        let mut replies = 0;
        while reply_rx.try_recv().is_ok() {
            replies += 1;
        }
        assert_eq!(replies, 2);
        assert!(!pipeline.is_fatal());
    }

    #[tokio::test]
    async fn strict_mode_descriptor_exhaustion_marks_fatal() {
        let (reply_tx, _reply_rx) = crossbeam_channel::unbounded();
        let metrics = JobMetrics::new();
        let mut config = ResourceLoaderConfig::default();
        config.strict_resource_checking = true;
        let pipeline = TexturePipeline::new(
            Arc::new(FakeReader),
            Arc::new(FakeAllocator {
                next: AtomicU64::new(0),
                fail_after: Some(0),
            }),
            Arc::new(FakeUploadQueue),
            config,
            reply_tx,
            1,
        );
        pipeline.post_container(ExpandContainerRequest {
            path_base: VirtualPath::new("chr/c0001/c0001"),
            source: ContainerSource::Bytes(b"tpf".to_vec()),
            access: AccessLevel::GpuOptimizedOnly,
            game: GameFamily::EldenRing,
            metrics: metrics.clone(),
        });
        pipeline.complete().await.unwrap();
        assert!(pipeline.is_fatal());
    }
}
