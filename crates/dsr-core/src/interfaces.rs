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

//! Trait contracts for the external collaborators this subsystem consumes
//! but does not implement: the asset locator, format decoders, binder
//! readers, texture containers, and the GPU backend.

use crate::access::AccessLevel;
use crate::error::ResourceError;
use crate::path::VirtualPath;
use crate::resource::Payload;
use std::path::{Path, PathBuf};

/// The FromSoftware game family a loaded archive or file belongs to.
///
/// Selects both the binder dialect (see [`binder_dialect_for`]) and any
/// game-specific decoding quirks the out-of-scope decoders apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameFamily {
    /// Demon's Souls.
    DemonsSouls,
    /// Dark Souls 1, original PC/console release.
    DarkSouls1Ptde,
    /// Dark Souls 1, Remastered.
    DarkSouls1Remaster,
    /// Dark Souls 2.
    DarkSouls2,
    /// Dark Souls 3.
    DarkSouls3,
    /// Bloodborne.
    Bloodborne,
    /// Sekiro: Shadows Die Twice.
    Sekiro,
    /// Elden Ring.
    EldenRing,
    /// Armored Core IV.
    ArmoredCoreIv,
    /// Armored Core: For Answer.
    ArmoredCoreFa,
    /// Armored Core V.
    ArmoredCoreV,
    /// Armored Core: Verdict Day.
    ArmoredCoreVd,
    /// Armored Core VI: Fires of Rubicon.
    ArmoredCoreVi,
}

/// The two binder container dialects in use across the supported games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinderDialect {
    /// The older, pre-v4 binder layout.
    Legacy,
    /// The v4 binder layout used by every other supported game.
    V4,
}

/// Selects the binder dialect for a game family, per spec: Demon's Souls,
/// DS1 PTDE, DS1 Remastered, and Armored Core Verdict Day use the legacy
/// dialect; every other supported game uses v4.
pub fn binder_dialect_for(game: GameFamily) -> BinderDialect {
    match game {
        GameFamily::DemonsSouls
        | GameFamily::DarkSouls1Ptde
        | GameFamily::DarkSouls1Remaster
        | GameFamily::ArmoredCoreVd => BinderDialect::Legacy,
        _ => BinderDialect::V4,
    }
}

/// Returns `true` if `real_path` names a split header file (`.bhd`,
/// case-insensitive) that must be paired with a `.bdt` data file of the
/// same stem.
pub fn is_split_binder(real_path: &Path) -> bool {
    real_path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("bhd"))
}

/// Returns the `.bdt` data-file path paired with a `.bhd` header path.
pub fn paired_data_path(header_path: &Path) -> PathBuf {
    header_path.with_extension("bdt")
}

/// Where `AssetLocator::virtual_to_real` resolved a virtual path to.
#[derive(Debug, Clone)]
pub struct ResolvedPath {
    /// The real filesystem path, or `None` if the path resolves to nothing.
    pub real_path: Option<PathBuf>,
    /// A hint that the resolved path is itself nested inside another binder.
    pub nested_binder_hint: Option<VirtualPath>,
}

/// Describes where an `.aet` id's texture container lives.
#[derive(Debug, Clone)]
pub struct AetTextureDescription {
    /// The virtual path of the texture container for this `.aet` id.
    pub container_path: VirtualPath,
}

/// Translates virtual asset paths into concrete filesystem paths.
///
/// Implemented outside this subsystem; consumed by archive expansion, the
/// Job Builder's `load_file`, and the UDSFM/unloaded-texture refresh scans.
pub trait AssetLocator: Send + Sync {
    /// Resolves a virtual path to a real filesystem path.
    fn virtual_to_real(&self, vp: &VirtualPath) -> ResolvedPath;

    /// Forms a child virtual path for a binder entry.
    fn join_binder(&self, parent_vp: &VirtualPath, entry_name: &str) -> VirtualPath;

    /// The active game family.
    fn game_type(&self) -> GameFamily;

    /// The absolute path to the active game's root directory.
    fn game_root(&self) -> PathBuf;

    /// Resolves an `.aet` asset id to its texture container description.
    fn get_aet_texture(&self, aet_id: &str) -> Option<AetTextureDescription>;

    /// Returns every known map virtual path. Used only by tests that
    /// exercise the UDSFM/unloaded-texture refresh scans end to end.
    fn full_map_list(&self) -> Vec<VirtualPath>;
}

/// A stateless decoder for one resource payload type.
///
/// Each implementation is specialized to a single `Payload` type, mirroring
/// the one-loader-per-asset-type pattern; a pipeline holds exactly one
/// `Decoder<P>` for its kind.
pub trait Decoder<P: Payload>: Send + Sync {
    /// Decodes a payload from an in-memory buffer.
    fn decode_bytes(
        &self,
        buf: &[u8],
        access: AccessLevel,
        game: GameFamily,
    ) -> Result<P, ResourceError>;

    /// Decodes a payload directly from a file on disk.
    fn decode_file(
        &self,
        path: &Path,
        access: AccessLevel,
        game: GameFamily,
    ) -> Result<P, ResourceError>;
}

/// One subresource slot inside a texture container.
#[derive(Debug, Clone)]
pub struct TextureSlotDescriptor {
    /// The slot's name within the container (joined onto the container's
    /// virtual path to form the slot's own virtual path).
    pub name: String,
    /// `true` if the slot is a cube map and must be allocated from the
    /// cube descriptor pool.
    pub is_cube: bool,
    /// Raw, still-encoded slot bytes, handed to the texture decoder.
    pub bytes: Vec<u8>,
}

/// Reads a texture container (TPF or equivalent) into its constituent slots.
pub trait TextureContainerReader: Send + Sync {
    /// Reads a texture container from a file on disk.
    fn read_file(&self, path: &Path) -> Result<Vec<TextureSlotDescriptor>, ResourceError>;

    /// Reads a texture container from an in-memory buffer.
    fn read_bytes(&self, bytes: &[u8]) -> Result<Vec<TextureSlotDescriptor>, ResourceError>;
}

/// One entry inside an opened binder/container.
#[derive(Debug, Clone)]
pub struct BinderEntry {
    /// The entry's name as stored in the container (not a virtual path).
    pub name: String,
    /// The entry's decompressed bytes.
    pub bytes: Vec<u8>,
}

/// A container opened by a [`BinderReaderFactory`].
pub trait BinderReader: Send {
    /// Lists every entry in the container.
    fn entries(&self) -> Result<Vec<BinderEntry>, ResourceError>;
}

/// Selects and opens the correct binder reader for a game family and real
/// path, per the dialect and split-header rules in [`binder_dialect_for`]
/// and [`is_split_binder`].
pub trait BinderReaderFactory: Send + Sync {
    /// Opens a single-file binder.
    fn open_single(
        &self,
        real_path: &Path,
        dialect: BinderDialect,
    ) -> Result<Box<dyn BinderReader>, ResourceError>;

    /// Opens a split header+data binder pair.
    fn open_split(
        &self,
        header_path: &Path,
        data_path: &Path,
        dialect: BinderDialect,
    ) -> Result<Box<dyn BinderReader>, ResourceError>;
}

/// An opaque GPU-side handle representing an allocated texture descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorHandle(pub u64);

/// Allocates texture descriptors from the GPU backend's global pools.
///
/// Mirrors `GlobalTexturePool`/`GlobalCubeTexturePool`: a single trait
/// parameterised by whether the slot is a cube map, since both pools share
/// the same allocate-or-fail shape.
pub trait GpuDescriptorAllocator: Send + Sync {
    /// Allocates a descriptor, or returns `None` if the pool is exhausted.
    fn allocate(&self, cube: bool) -> Option<DescriptorHandle>;
}

/// A unit of GPU upload work, invoked on the uploader thread once its
/// turn comes up. The device/command-list parameters are out of scope for
/// this subsystem and erased behind `&dyn std::any::Any`.
pub type UploadTask = Box<dyn FnOnce(&dyn std::any::Any, &dyn std::any::Any) + Send>;

/// The GPU backend's asynchronous, low-priority upload queue.
pub trait GpuUploadQueue: Send + Sync {
    /// Enqueues a task to run on the uploader thread.
    fn enqueue_low_priority_upload(&self, task: UploadTask);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_dialect_games() {
        assert_eq!(
            binder_dialect_for(GameFamily::DemonsSouls),
            BinderDialect::Legacy
        );
        assert_eq!(
            binder_dialect_for(GameFamily::DarkSouls1Ptde),
            BinderDialect::Legacy
        );
        assert_eq!(
            binder_dialect_for(GameFamily::DarkSouls1Remaster),
            BinderDialect::Legacy
        );
        assert_eq!(
            binder_dialect_for(GameFamily::ArmoredCoreVd),
            BinderDialect::Legacy
        );
    }

    #[test]
    fn v4_dialect_games() {
        assert_eq!(binder_dialect_for(GameFamily::EldenRing), BinderDialect::V4);
        assert_eq!(binder_dialect_for(GameFamily::DarkSouls3), BinderDialect::V4);
        assert_eq!(binder_dialect_for(GameFamily::Sekiro), BinderDialect::V4);
    }

    #[test]
    fn bhd_suffix_detected_case_insensitively() {
        assert!(is_split_binder(Path::new("chr/c0001.BHD")));
        assert!(is_split_binder(Path::new("chr/c0001.bhd")));
        assert!(!is_split_binder(Path::new("chr/c0001.chrbnd")));
    }

    #[test]
    fn paired_data_path_swaps_extension() {
        assert_eq!(
            paired_data_path(Path::new("chr/c0001.bhd")),
            PathBuf::from("chr/c0001.bdt")
        );
    }
}
