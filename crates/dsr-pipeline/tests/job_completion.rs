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

//! End-to-end scenarios against a real `Job`, backed by fake archive and
//! decoder collaborators, reading actual bytes off disk via `tempfile`.

use dsr_core::access::AccessLevel;
use dsr_core::config::ResourceLoaderConfig;
use dsr_core::error::ResourceError;
use dsr_core::interfaces::{
    AetTextureDescription, AssetLocator, BinderDialect, BinderEntry, BinderReader,
    BinderReaderFactory, Decoder, DescriptorHandle, GameFamily, GpuDescriptorAllocator,
    GpuUploadQueue, ResolvedPath, TextureContainerReader, TextureSlotDescriptor, UploadTask,
};
use dsr_core::path::VirtualPath;
use dsr_core::resource::{CollisionPayload, FlverPayload, NavmeshHkxPayload, NavmeshPayload, Payload};
use dsr_pipeline::{Job, JobBuilder, JobDependencies};
use std::collections::HashMap;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Resolves every virtual path to a fixed, caller-chosen real path.
struct FixedLocator {
    real_path: PathBuf,
}

impl AssetLocator for FixedLocator {
    fn virtual_to_real(&self, _vp: &VirtualPath) -> ResolvedPath {
        ResolvedPath {
            real_path: Some(self.real_path.clone()),
            nested_binder_hint: None,
        }
    }
    fn join_binder(&self, parent_vp: &VirtualPath, entry_name: &str) -> VirtualPath {
        // Strips the archive's own extension before joining, the way a
        // real locator maps "chr/c0001.chrbnd" + "c0001.flv" onto
        // "chr/c0001/c0001.flv" rather than nesting under the archive name.
        let raw = parent_vp.as_str();
        let stem = raw.rsplit_once('/').map_or(raw, |(_, last)| {
            let cut = raw.len() - last.len();
            match last.find('.') {
                Some(i) => &raw[..cut + i],
                None => raw,
            }
        });
        VirtualPath::new(format!("{stem}/{entry_name}"))
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

/// A binder reader that hands back a fixed entry list, regardless of which
/// real path it was "opened" from.
struct FixedBinderReader(Vec<BinderEntry>);

impl BinderReader for FixedBinderReader {
    fn entries(&self) -> Result<Vec<BinderEntry>, ResourceError> {
        Ok(self.0.clone())
    }
}

struct FixedBinderFactory {
    entries: Vec<BinderEntry>,
}

impl BinderReaderFactory for FixedBinderFactory {
    fn open_single(
        &self,
        _real_path: &Path,
        _dialect: BinderDialect,
    ) -> Result<Box<dyn BinderReader>, ResourceError> {
        Ok(Box::new(FixedBinderReader(self.entries.clone())))
    }
    fn open_split(
        &self,
        _header_path: &Path,
        _data_path: &Path,
        _dialect: BinderDialect,
    ) -> Result<Box<dyn BinderReader>, ResourceError> {
        Ok(Box::new(FixedBinderReader(self.entries.clone())))
    }
}

/// Decodes to a default payload, recording every path it was asked to
/// decode so a test can assert on which requests actually reached it.
struct RecordingDecoder<P> {
    seen: Arc<Mutex<Vec<String>>>,
    _marker: std::marker::PhantomData<P>,
}

impl<P> RecordingDecoder<P> {
    fn new(seen: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            seen,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<P: Payload + Default> Decoder<P> for RecordingDecoder<P> {
    fn decode_bytes(&self, _buf: &[u8], _access: AccessLevel, _game: GameFamily) -> Result<P, ResourceError> {
        Ok(P::default())
    }
    fn decode_file(&self, path: &Path, _access: AccessLevel, _game: GameFamily) -> Result<P, ResourceError> {
        self.seen.lock().unwrap().push(path.display().to_string());
        Ok(P::default())
    }
}

struct FixedTextureReader {
    slots: Vec<TextureSlotDescriptor>,
}

impl TextureContainerReader for FixedTextureReader {
    fn read_file(&self, _path: &Path) -> Result<Vec<TextureSlotDescriptor>, ResourceError> {
        Ok(self.slots.clone())
    }
    fn read_bytes(&self, _bytes: &[u8]) -> Result<Vec<TextureSlotDescriptor>, ResourceError> {
        Ok(self.slots.clone())
    }
}

struct CountingAllocator {
    next: Mutex<u64>,
}

impl GpuDescriptorAllocator for CountingAllocator {
    fn allocate(&self, _cube: bool) -> Option<DescriptorHandle> {
        let mut n = self.next.lock().unwrap();
        *n += 1;
        Some(DescriptorHandle(*n))
    }
}

struct NullUploadQueue;

impl GpuUploadQueue for NullUploadQueue {
    fn enqueue_low_priority_upload(&self, _task: UploadTask) {}
}

fn deps(locator: Arc<dyn AssetLocator>, binder: Arc<dyn BinderReaderFactory>, flver_seen: Arc<Mutex<Vec<String>>>) -> JobDependencies {
    JobDependencies {
        asset_locator: locator,
        binder_factory: binder,
        flver_decoder: Arc::new(RecordingDecoder::<FlverPayload>::new(flver_seen)),
        collision_decoder: Arc::new(RecordingDecoder::<CollisionPayload>::new(Arc::new(Mutex::new(vec![])))),
        navmesh_decoder: Arc::new(RecordingDecoder::<NavmeshPayload>::new(Arc::new(Mutex::new(vec![])))),
        navmesh_hkx_decoder: Arc::new(RecordingDecoder::<NavmeshHkxPayload>::new(Arc::new(Mutex::new(vec![])))),
        texture_container_reader: Arc::new(FixedTextureReader { slots: vec![] }),
        descriptor_allocator: Arc::new(CountingAllocator { next: Mutex::new(0) }),
        upload_queue: Arc::new(NullUploadQueue),
    }
}

// Scenario 1: single model load.
#[tokio::test]
async fn single_file_load_installs_one_reply_and_bumps_estimate() {
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("c0001.flv");
    std::fs::write(&file_path, b"flver-bytes").unwrap();

    let flver_seen = Arc::new(Mutex::new(vec![]));
    let locator: Arc<dyn AssetLocator> = Arc::new(FixedLocator { real_path: file_path.clone() });
    let binder: Arc<dyn BinderReaderFactory> = Arc::new(FixedBinderFactory { entries: vec![] });
    let job = Arc::new(Job::new(
        "single-model",
        deps(locator.clone(), binder, flver_seen.clone()),
        ResourceLoaderConfig::default(),
    ));
    let builder = JobBuilder::new(job.clone(), locator, Arc::new(Mutex::new(HashSet::new())));

    builder.load_file(VirtualPath::new("chr/c0001/c0001.flv"), AccessLevel::EditOnly);
    job.complete().await.unwrap();

    let replies = job.drain_replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].path, VirtualPath::new("chr/c0001/c0001.flv"));
    assert_eq!(replies[0].access, AccessLevel::EditOnly);
    assert_eq!(job.metrics().estimated_size(), 1);
    assert_eq!(flver_seen.lock().unwrap().as_slice(), &[file_path.display().to_string()]);
}

// Scenario 2 (trimmed to the non-texture half): an archive containing a
// FLVER and an HKX collision mesh routes each entry to its own pipeline.
#[tokio::test]
async fn archive_with_mixed_content_routes_each_entry_to_its_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let archive_path = dir.path().join("c0001.chrbnd");
    std::fs::write(&archive_path, b"archive-bytes").unwrap();

    let entries = vec![
        BinderEntry { name: "c0001.flv".into(), bytes: b"flver".to_vec() },
        BinderEntry { name: "c0001.hkx".into(), bytes: b"collision".to_vec() },
    ];
    let flver_seen = Arc::new(Mutex::new(vec![]));
    let locator: Arc<dyn AssetLocator> = Arc::new(FixedLocator { real_path: archive_path });
    let binder: Arc<dyn BinderReaderFactory> = Arc::new(FixedBinderFactory { entries });
    let job = Arc::new(Job::new(
        "mixed-archive",
        deps(locator.clone(), binder, flver_seen),
        ResourceLoaderConfig::default(),
    ));
    let builder = JobBuilder::new(job.clone(), locator, Arc::new(Mutex::new(HashSet::new())));

    builder.load_archive(
        VirtualPath::new("chr/c0001.chrbnd"),
        AccessLevel::GpuOptimizedOnly,
        false,
        None,
        None,
    );
    job.complete().await.unwrap();

    let replies: HashMap<_, _> = job
        .drain_replies()
        .into_iter()
        .map(|r| (r.path.as_str().to_string(), r.resource.kind()))
        .collect();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies["chr/c0001/c0001.flv"], dsr_core::kind::ResourceKind::Flver);
    assert_eq!(replies["chr/c0001/c0001.hkx"], dsr_core::kind::ResourceKind::CollisionHkx);
    assert_eq!(job.metrics().estimated_size(), 2);
}

// P4: posting the same archive twice while a job is active dedupes to one
// expansion task.
#[tokio::test]
async fn duplicate_archive_posts_while_in_flight_yield_one_set_of_replies() {
    let dir = tempfile::tempdir().unwrap();
    let archive_path = dir.path().join("m10_00_00_00.msb.dcx");
    std::fs::write(&archive_path, b"archive-bytes").unwrap();

    let entries = vec![BinderEntry { name: "c0001.flv".into(), bytes: b"flver".to_vec() }];
    let flver_seen = Arc::new(Mutex::new(vec![]));
    let locator: Arc<dyn AssetLocator> = Arc::new(FixedLocator { real_path: archive_path });
    let binder: Arc<dyn BinderReaderFactory> = Arc::new(FixedBinderFactory { entries });
    let job = Arc::new(Job::new(
        "dedup",
        deps(locator.clone(), binder, flver_seen),
        ResourceLoaderConfig::default(),
    ));
    let in_flight = Arc::new(Mutex::new(HashSet::new()));
    let builder = JobBuilder::new(job.clone(), locator, in_flight);

    let vp = VirtualPath::new("map/m10_00_00_00.msb.dcx");
    builder.load_archive(vp.clone(), AccessLevel::Full, false, None, None);
    builder.load_archive(vp, AccessLevel::Full, false, None, None);
    job.complete().await.unwrap();

    let replies = job.drain_replies();
    assert_eq!(replies.len(), 1, "duplicate in-flight posts must not double-expand the archive");
}
