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

// Resource loading subsystem sandbox
// Drives a Manager against in-memory stand-ins for the archive/decoder/GPU
// backends, which live outside this subsystem.

use anyhow::Result;
use dsr_core::access::AccessLevel;
use dsr_core::config::ResourceLoaderConfig;
use dsr_core::error::ResourceError;
use dsr_core::interfaces::{
    AetTextureDescription, AssetLocator, BinderDialect, BinderReader, BinderReaderFactory,
    Decoder, DescriptorHandle, GameFamily, GpuDescriptorAllocator, GpuUploadQueue, ResolvedPath,
    TextureContainerReader, TextureSlotDescriptor, UploadTask,
};
use dsr_core::kind::ResourceKind;
use dsr_core::observer::{ObserverTag, ResourceObserver};
use dsr_core::path::VirtualPath;
use dsr_core::resource::{CollisionPayload, FlverPayload, NavmeshHkxPayload, NavmeshPayload, Payload};
use dsr_manager::{Manager, ObservationRequest};
use dsr_pipeline::JobDependencies;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Resolves every virtual path to itself; this sandbox never touches a
/// real archive tree.
struct SandboxLocator;

impl AssetLocator for SandboxLocator {
    fn virtual_to_real(&self, vp: &VirtualPath) -> ResolvedPath {
        ResolvedPath {
            real_path: Some(PathBuf::from(vp.as_str())),
            nested_binder_hint: None,
        }
    }

    fn join_binder(&self, parent_vp: &VirtualPath, entry_name: &str) -> VirtualPath {
        parent_vp.join(entry_name)
    }

    fn game_type(&self) -> GameFamily {
        GameFamily::EldenRing
    }

    fn game_root(&self) -> PathBuf {
        PathBuf::from(".")
    }

    fn get_aet_texture(&self, _aet_id: &str) -> Option<AetTextureDescription> {
        None
    }

    fn full_map_list(&self) -> Vec<VirtualPath> {
        vec![]
    }
}

/// Never actually opens a binder; there's nothing on disk to open.
struct SandboxBinderFactory;

impl BinderReaderFactory for SandboxBinderFactory {
    fn open_single(
        &self,
        real_path: &Path,
        _dialect: BinderDialect,
    ) -> Result<Box<dyn BinderReader>, ResourceError> {
        Err(ResourceError::NotFound {
            path: VirtualPath::new(real_path.to_string_lossy()),
        })
    }

    fn open_split(
        &self,
        header_path: &Path,
        _data_path: &Path,
        _dialect: BinderDialect,
    ) -> Result<Box<dyn BinderReader>, ResourceError> {
        Err(ResourceError::NotFound {
            path: VirtualPath::new(header_path.to_string_lossy()),
        })
    }
}

/// Decodes everything to a default payload, as if every load always
/// produced an empty resource. Good enough to exercise the tick loop.
struct SandboxDecoder<P>(std::marker::PhantomData<P>);

impl<P> SandboxDecoder<P> {
    fn new() -> Self {
        Self(std::marker::PhantomData)
    }
}

impl<P: Payload + Default> Decoder<P> for SandboxDecoder<P> {
    fn decode_bytes(&self, _buf: &[u8], _access: AccessLevel, _game: GameFamily) -> Result<P, ResourceError> {
        Ok(P::default())
    }

    fn decode_file(&self, _path: &Path, _access: AccessLevel, _game: GameFamily) -> Result<P, ResourceError> {
        Ok(P::default())
    }
}

struct SandboxTextureReader;

impl TextureContainerReader for SandboxTextureReader {
    fn read_file(&self, _path: &Path) -> Result<Vec<TextureSlotDescriptor>, ResourceError> {
        Ok(vec![])
    }

    fn read_bytes(&self, _bytes: &[u8]) -> Result<Vec<TextureSlotDescriptor>, ResourceError> {
        Ok(vec![])
    }
}

struct SandboxAllocator;

impl GpuDescriptorAllocator for SandboxAllocator {
    fn allocate(&self, _cube: bool) -> Option<DescriptorHandle> {
        None
    }
}

struct SandboxUploadQueue;

impl GpuUploadQueue for SandboxUploadQueue {
    fn enqueue_low_priority_upload(&self, _task: UploadTask) {}
}

/// Logs every load/unload notification it receives.
struct LoggingObserver;

impl ResourceObserver for LoggingObserver {
    fn on_loaded(&self, handle: &Arc<dsr_core::handle::ResourceHandle>, tag: ObserverTag) {
        log::info!("loaded: {} (tag {})", handle.virtual_path(), tag.0);
    }

    fn on_unloaded(&self, handle: &Arc<dsr_core::handle::ResourceHandle>, tag: ObserverTag) {
        log::info!("unloaded: {} (tag {})", handle.virtual_path(), tag.0);
    }
}

fn build_manager() -> Manager {
    let deps = JobDependencies {
        asset_locator: Arc::new(SandboxLocator),
        binder_factory: Arc::new(SandboxBinderFactory),
        flver_decoder: Arc::new(SandboxDecoder::<FlverPayload>::new()),
        collision_decoder: Arc::new(SandboxDecoder::<CollisionPayload>::new()),
        navmesh_decoder: Arc::new(SandboxDecoder::<NavmeshPayload>::new()),
        navmesh_hkx_decoder: Arc::new(SandboxDecoder::<NavmeshHkxPayload>::new()),
        texture_container_reader: Arc::new(SandboxTextureReader),
        descriptor_allocator: Arc::new(SandboxAllocator),
        upload_queue: Arc::new(SandboxUploadQueue),
    };
    Manager::new(deps, ResourceLoaderConfig::default())
}

#[tokio::main]
async fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let manager = build_manager();
    let observer: Arc<dyn ResourceObserver> = Arc::new(LoggingObserver);

    let watched = VirtualPath::new("chr/c0000/c0000.flver");
    manager.queue_observation(ObservationRequest {
        path: watched.clone(),
        kind: ResourceKind::Flver,
        observer: Arc::downgrade(&observer),
        required_access: AccessLevel::Full,
        tag: ObserverTag(1),
    });

    let builder = manager.start_job("startup-batch");
    builder.load_archive(watched.clone(), AccessLevel::Full, false, None, None);
    manager.finish_job(&builder);

    // The sandbox locator resolves every path but the binder factory never
    // actually finds an archive on disk, so this job always fails the
    // entry open and finishes with nothing installed. Tick until it's
    // reaped, then report what's in the database.
    for frame in 0..1000 {
        manager.tick();
        if builder.job().is_finished() {
            log::info!("frame {frame}: startup-batch finished");
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    match manager.database().lookup(&watched) {
        Some(handle) => log::info!("{watched}: {:?}", handle.access_level()),
        None => log::info!("{watched}: no handle (archive never resolved)"),
    }

    Ok(())
}
