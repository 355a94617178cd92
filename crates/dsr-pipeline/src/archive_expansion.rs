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

//! The unbounded-parallelism front-end stage that opens an archive,
//! enumerates its entries, and routes each one to the pipeline or
//! container-expansion stage its extension selects.

use crate::job::JobMetrics;
use crate::pipeline::Pipeline;
use crate::pool::UnboundedStage;
use crate::texture_pipeline::{ContainerSource, ExpandContainerRequest, TexturePipeline};
use dsr_core::access::AccessLevel;
use dsr_core::config::ResourceLoaderConfig;
use dsr_core::interfaces::{is_split_binder, paired_data_path, AssetLocator, BinderReaderFactory};
use dsr_core::kind::KindFilter;
use dsr_core::path::VirtualPath;
use dsr_core::request::LoadRequest;
use dsr_core::resource::{CollisionPayload, FlverPayload, NavmeshHkxPayload, NavmeshPayload};
use std::sync::Arc;
use tokio::sync::oneshot;

/// One archive to open and expand into per-entry requests.
///
/// Mirrors `LoadArchive{virtual_path, access, populate_only, kind_filter,
/// whitelist, job}`; `job` is narrowed to [`JobMetrics`] for the same
/// reason as [`ExpandContainerRequest`].
pub struct LoadArchiveRequest {
    /// The archive's virtual path.
    pub virtual_path: VirtualPath,
    /// The access level every decoded entry is decoded for.
    pub access: AccessLevel,
    /// If `true`, handles are created (via later `observe`/`install` calls)
    /// but no decode work is posted yet.
    pub populate_only: bool,
    /// Which kinds to expand; entries of other kinds are skipped.
    pub kind_filter: KindFilter,
    /// If set, only entries whose virtual path appears here are expanded.
    pub whitelist: Option<Vec<VirtualPath>>,
    /// The owning Job's shared progress counters.
    pub metrics: JobMetrics,
}

/// Trims the trailing numeric suffix from a `map/tex` container path, per
/// the map-texture virtual-path normalisation rule (§6): a trailing
/// four-digit suffix is stripped (5 characters including its separator);
/// failing that, a bare `tex` suffix has its last 4 characters stripped.
pub fn normalize_map_texture_path(vp: &VirtualPath) -> VirtualPath {
    let s = vp.as_str();
    if !s.starts_with("map/tex") {
        return vp.clone();
    }
    let tail = &s[s.len().saturating_sub(4)..];
    if tail.len() == 4 && tail.bytes().all(|b| b.is_ascii_digit()) && s.len() >= 5 {
        VirtualPath::new(&s[..s.len() - 5])
    } else if s.ends_with("tex") {
        VirtualPath::new(&s[..s.len() - 4])
    } else {
        vp.clone()
    }
}

fn is_texture_container_extension(entry_name: &str) -> bool {
    let lower = entry_name.to_ascii_lowercase();
    lower.ends_with(".tpf") || lower.ends_with(".tpf.dcx")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoutedKind {
    Flver,
    Collision,
    Navmesh,
    NavmeshHkx,
}

fn route_by_extension(entry_name: &str, kind_filter: KindFilter) -> Option<RoutedKind> {
    use dsr_core::kind::ResourceKind;
    let lower = entry_name.to_ascii_lowercase();
    if (lower.ends_with(".flver") || lower.ends_with(".flv") || lower.ends_with(".flv.dcx"))
        && kind_filter.contains(ResourceKind::Flver)
    {
        return Some(RoutedKind::Flver);
    }
    if lower.ends_with(".nvm") && kind_filter.contains(ResourceKind::Navmesh) {
        return Some(RoutedKind::Navmesh);
    }
    if lower.ends_with(".hkx") || lower.ends_with(".hkx.dcx") {
        return if kind_filter.has_both_hkx_kinds() {
            Some(RoutedKind::Collision)
        } else if kind_filter.contains(ResourceKind::CollisionHkx) {
            Some(RoutedKind::Collision)
        } else if kind_filter.contains(ResourceKind::NavmeshHkx) {
            Some(RoutedKind::NavmeshHkx)
        } else {
            None
        };
    }
    None
}

/// The archive-expansion worker: one unbounded-parallelism stage shared by
/// a Job, holding `Arc`s to every pipeline it might route an entry into.
pub struct ArchiveExpansionStage {
    stage: UnboundedStage<LoadArchiveRequest>,
}

impl ArchiveExpansionStage {
    /// Builds the stage around the locator, binder factory, and the
    /// Job's pipelines to route decoded entries into.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        asset_locator: Arc<dyn AssetLocator>,
        binder_factory: Arc<dyn BinderReaderFactory>,
        config: ResourceLoaderConfig,
        metrics: JobMetrics,
        flver: Arc<Pipeline<FlverPayload>>,
        collision: Arc<Pipeline<CollisionPayload>>,
        navmesh: Arc<Pipeline<NavmeshPayload>>,
        navmesh_hkx: Arc<Pipeline<NavmeshHkxPayload>>,
        texture: Arc<TexturePipeline>,
    ) -> Self {
        let stage = UnboundedStage::new(move |req: LoadArchiveRequest| {
            Self::process(
                &asset_locator,
                &binder_factory,
                config,
                &flver,
                &collision,
                &navmesh,
                &navmesh_hkx,
                &texture,
                req,
            );
        });
        Self { stage }
    }

    #[allow(clippy::too_many_arguments)]
    fn process(
        asset_locator: &Arc<dyn AssetLocator>,
        binder_factory: &Arc<dyn BinderReaderFactory>,
        config: ResourceLoaderConfig,
        flver: &Pipeline<FlverPayload>,
        collision: &Pipeline<CollisionPayload>,
        navmesh: &Pipeline<NavmeshPayload>,
        navmesh_hkx: &Pipeline<NavmeshHkxPayload>,
        texture: &TexturePipeline,
        req: LoadArchiveRequest,
    ) {
        let resolved = asset_locator.virtual_to_real(&req.virtual_path);
        let Some(real_path) = resolved.real_path else {
            log::warn!("archive {} did not resolve to a real path", req.virtual_path);
            return;
        };

        let dialect = dsr_core::interfaces::binder_dialect_for(asset_locator.game_type());
        let opened = if is_split_binder(&real_path) {
            let data_path = paired_data_path(&real_path);
            binder_factory.open_split(&real_path, &data_path, dialect)
        } else {
            binder_factory.open_single(&real_path, dialect)
        };
        let reader = match opened {
            Ok(reader) => reader,
            Err(err) => {
                log::warn!("dropping archive {}: {err}", req.virtual_path);
                return;
            }
        };
        let entries = match reader.entries() {
            Ok(entries) => entries,
            Err(err) => {
                log::warn!("dropping archive {}: {err}", req.virtual_path);
                return;
            }
        };

        for entry in entries {
            let child_vp = asset_locator.join_binder(&req.virtual_path, &entry.name);
            if let Some(whitelist) = &req.whitelist {
                if !whitelist.contains(&child_vp) {
                    continue;
                }
            }

            if is_texture_container_extension(&entry.name) {
                if !req.kind_filter.contains(dsr_core::kind::ResourceKind::Texture) {
                    continue;
                }
                let path_base = normalize_map_texture_path(&child_vp);
                if req.populate_only {
                    continue;
                }
                texture.post_container(ExpandContainerRequest {
                    path_base,
                    source: ContainerSource::Bytes(entry.bytes),
                    access: req.access,
                    game: asset_locator.game_type(),
                    metrics: req.metrics.clone(),
                });
                continue;
            }

            let Some(routed) = route_by_extension(&entry.name, req.kind_filter) else {
                continue;
            };
            if req.populate_only {
                continue;
            }
            req.metrics.bump_estimate(1);
            let game = asset_locator.game_type();
            let bytes_req = |path: VirtualPath| LoadRequest::Bytes {
                path,
                bytes: entry.bytes,
                access: req.access,
                game,
            };
            match routed {
                RoutedKind::Flver => {
                    flver.post_bytes(bytes_req(child_vp));
                }
                RoutedKind::Collision => {
                    collision.post_bytes(bytes_req(child_vp));
                }
                RoutedKind::Navmesh => {
                    navmesh.post_bytes(bytes_req(child_vp));
                }
                RoutedKind::NavmeshHkx => {
                    navmesh_hkx.post_bytes(bytes_req(child_vp));
                }
            }
        }
    }

    /// Posts a `LoadArchive` request.
    pub fn post(&self, req: LoadArchiveRequest) -> bool {
        self.stage.post(req)
    }

    /// Closes the stage and awaits drain. The Job's shutdown step (a).
    pub fn complete(&self) -> oneshot::Receiver<()> {
        self.stage.complete()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_tex_strips_trailing_four_digit_suffix() {
        let vp = VirtualPath::new("map/tex/m10_0000");
        assert_eq!(normalize_map_texture_path(&vp).as_str(), "map/tex/m10");
    }

    #[test]
    fn map_tex_strips_bare_tex_suffix() {
        let vp = VirtualPath::new("map/tex/m10tex");
        assert_eq!(normalize_map_texture_path(&vp).as_str(), "map/tex/m10");
    }

    #[test]
    fn non_map_tex_path_is_unchanged() {
        let vp = VirtualPath::new("chr/c0001/c0001");
        assert_eq!(normalize_map_texture_path(&vp).as_str(), "chr/c0001/c0001");
    }

    #[test]
    fn hkx_tie_break_prefers_collision() {
        let both = KindFilter::only(dsr_core::kind::ResourceKind::CollisionHkx)
            | KindFilter::only(dsr_core::kind::ResourceKind::NavmeshHkx);
        assert_eq!(route_by_extension("c0001.hkx", both), Some(RoutedKind::Collision));
    }

    #[test]
    fn hkx_routes_to_navmesh_when_only_navmesh_bit_set() {
        let only_navmesh = KindFilter::only(dsr_core::kind::ResourceKind::NavmeshHkx);
        assert_eq!(
            route_by_extension("c0001.hkx", only_navmesh),
            Some(RoutedKind::NavmeshHkx)
        );
    }

    #[test]
    fn flver_extension_variants_all_route() {
        for name in ["c.flver", "c.flv", "c.flv.dcx"] {
            assert_eq!(route_by_extension(name, KindFilter::ALL), Some(RoutedKind::Flver));
        }
    }

    #[test]
    fn texture_container_extension_detected() {
        assert!(is_texture_container_extension("c0001.tpf"));
        assert!(is_texture_container_extension("c0001.TPF.DCX"));
        assert!(!is_texture_container_extension("c0001.flv"));
    }
}
