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

//! A narrow façade in front of a [`Job`], matching the operations the
//! Manager actually needs: archive/file loading guarded by the in-flight
//! set, and the two one-shot texture refresh scans.

use crate::archive_expansion::{normalize_map_texture_path, LoadArchiveRequest};
use crate::job::{Job, JobMetrics};
use crate::texture_pipeline::{ContainerSource, ExpandContainerRequest};
use dsr_core::access::AccessLevel;
use dsr_core::db::Database;
use dsr_core::interfaces::AssetLocator;
use dsr_core::kind::{KindFilter, ResourceKind};
use dsr_core::path::VirtualPath;
use dsr_core::request::LoadRequest;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

fn route_extension(name: &str) -> Option<ResourceKind> {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".flver") || lower.ends_with(".flv") || lower.ends_with(".flv.dcx") {
        Some(ResourceKind::Flver)
    } else if lower.ends_with(".nvm") {
        Some(ResourceKind::Navmesh)
    } else if lower.ends_with(".hkx") || lower.ends_with(".hkx.dcx") {
        Some(ResourceKind::CollisionHkx)
    } else {
        None
    }
}

fn is_texture_container_extension(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".tpf") || lower.ends_with(".tpf.dcx")
}

/// Wraps a `Job` with the Manager-facing operations: archive/file load
/// dispatch, the in-flight re-entry guard, and the UDSFM/unloaded-texture
/// refresh scans.
pub struct JobBuilder {
    job: Arc<Job>,
    asset_locator: Arc<dyn AssetLocator>,
    in_flight: Arc<Mutex<HashSet<VirtualPath>>>,
}

impl JobBuilder {
    /// Wraps `job`, sharing the Manager's in-flight set so `load_archive`
    /// re-entry guarding is visible across every builder using the same Job.
    pub fn new(
        job: Arc<Job>,
        asset_locator: Arc<dyn AssetLocator>,
        in_flight: Arc<Mutex<HashSet<VirtualPath>>>,
    ) -> Self {
        Self {
            job,
            asset_locator,
            in_flight,
        }
    }

    /// Posts an archive-expansion request, guarded against re-entry: if
    /// `vp` is already in the in-flight set, this is a no-op.
    pub fn load_archive(
        &self,
        vp: VirtualPath,
        access: AccessLevel,
        populate_only: bool,
        filter: Option<KindFilter>,
        whitelist: Option<Vec<VirtualPath>>,
    ) {
        {
            let mut guard = self.in_flight.lock().unwrap();
            if !guard.insert(vp.clone()) {
                return;
            }
        }
        self.job.post_archive(LoadArchiveRequest {
            virtual_path: vp,
            access,
            populate_only,
            kind_filter: filter.unwrap_or_default(),
            whitelist,
            metrics: self.job.metrics().clone(),
        });
    }

    /// Resolves `vp` and dispatches it to the correct pipeline by
    /// extension, applying the same map-texture normalisation as archive
    /// expansion for texture-container paths.
    pub fn load_file(&self, vp: VirtualPath, access: AccessLevel) {
        let resolved = self.asset_locator.virtual_to_real(&vp);
        let Some(real_path) = resolved.real_path else {
            log::warn!("load_file: {vp} did not resolve to a real path");
            return;
        };
        let game = self.asset_locator.game_type();

        if is_texture_container_extension(vp.as_str()) {
            let path_base = normalize_map_texture_path(&vp);
            self.job.post_container(ExpandContainerRequest {
                path_base,
                source: ContainerSource::File(real_path),
                access,
                game,
                metrics: self.job.metrics().clone(),
            });
            return;
        }

        let Some(kind) = route_extension(vp.as_str()) else {
            log::warn!("load_file: {vp} has no recognised extension, dropping");
            return;
        };
        self.job.metrics().bump_estimate(1);
        self.job.post_request(
            kind,
            LoadRequest::File {
                path: vp,
                real_path,
                access,
                game,
            },
        );
    }

    /// Scans `db` for unloaded `map/tex`-prefixed handles and, for each,
    /// looks for a loose `.tpf` under `<game_root>/map/tx/<basename>.tpf`,
    /// queueing a container expansion when one is found.
    pub fn load_udsfm_textures(&self, db: &Database) {
        let game_root = self.asset_locator.game_root();
        for handle in db.snapshot() {
            if handle.access_level() != AccessLevel::Unloaded {
                continue;
            }
            let vp = handle.virtual_path();
            if !vp.starts_with("map/tex") {
                continue;
            }
            let basename = vp
                .as_str()
                .rsplit('/')
                .next()
                .unwrap_or(vp.as_str())
                .to_string();
            let tpf_path = game_root.join("map/tx").join(format!("{basename}.tpf"));
            if !tpf_path.is_file() {
                continue;
            }
            self.job.post_container(ExpandContainerRequest {
                path_base: normalize_map_texture_path(vp),
                source: ContainerSource::File(tpf_path),
                access: AccessLevel::GpuOptimizedOnly,
                game: self.asset_locator.game_type(),
                metrics: self.job.metrics().clone(),
            });
        }
    }

    /// Scans `db` for unloaded `aet/`-prefixed handles, extracts each
    /// asset id, asks `AssetLocator` for its texture container, de-dupes
    /// per id, and queues one container expansion per id.
    pub fn load_unloaded_textures(&self, db: &Database) {
        let mut seen = HashSet::new();
        for handle in db.snapshot() {
            if handle.access_level() != AccessLevel::Unloaded {
                continue;
            }
            let vp = handle.virtual_path();
            if !vp.starts_with("aet/") {
                continue;
            }
            let Some(aet_id) = extract_aet_id(vp.as_str()) else {
                continue;
            };
            if !seen.insert(aet_id.clone()) {
                continue;
            }
            let Some(desc) = self.asset_locator.get_aet_texture(&aet_id) else {
                continue;
            };
            let resolved = self.asset_locator.virtual_to_real(&desc.container_path);
            let Some(real_path) = resolved.real_path else {
                continue;
            };
            self.job.post_container(ExpandContainerRequest {
                path_base: normalize_map_texture_path(&desc.container_path),
                source: ContainerSource::File(real_path),
                access: AccessLevel::GpuOptimizedOnly,
                game: self.asset_locator.game_type(),
                metrics: self.job.metrics().clone(),
            });
        }
    }

    /// The wrapped Job's completion future.
    pub async fn complete(&self) -> Result<(), dsr_core::error::ResourceError> {
        self.job.complete().await
    }

    /// The wrapped Job, for callers (the Manager) that need direct access
    /// (progress, draining replies).
    pub fn job(&self) -> &Arc<Job> {
        &self.job
    }
}

fn extract_aet_id(vp: &str) -> Option<String> {
    vp.strip_prefix("aet/")
        .and_then(|rest| rest.split('/').next())
        .map(|s| s.to_string())
}
