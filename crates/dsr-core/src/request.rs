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

//! The work items posted into a pipeline's ports, and the replies that
//! come back out.

use crate::access::AccessLevel;
use crate::interfaces::GameFamily;
use crate::path::VirtualPath;
use crate::resource::ResourceValue;
use std::path::PathBuf;

/// One unit of decode work posted to a kind pipeline's bytes or file port.
///
/// `Bytes` and `File` cover the two ports every kind pipeline exposes;
/// `TextureSlot` is specific to the texture pipeline's second stage, where
/// the container-expansion stage has already carved a slot's bytes out of
/// its parent container and a GPU descriptor still needs allocating.
#[derive(Debug)]
pub enum LoadRequest {
    /// Decode from an in-memory buffer already read off disk or out of a
    /// binder entry.
    Bytes {
        /// The virtual path the decoded resource will be installed under.
        path: VirtualPath,
        /// The raw, still-encoded bytes.
        bytes: Vec<u8>,
        /// The access level to decode for.
        access: AccessLevel,
        /// The game family whose decoding quirks apply.
        game: GameFamily,
    },
    /// Decode directly from a file on disk, bypassing an in-memory copy.
    File {
        /// The virtual path the decoded resource will be installed under.
        path: VirtualPath,
        /// The real filesystem path to decode from.
        real_path: PathBuf,
        /// The access level to decode for.
        access: AccessLevel,
        /// The game family whose decoding quirks apply.
        game: GameFamily,
    },
    /// Decode and GPU-upload one texture slot already extracted from its
    /// container by the archive expansion stage.
    TextureSlot {
        /// The virtual path the decoded slot will be installed under.
        path: VirtualPath,
        /// The slot's raw, still-encoded bytes.
        bytes: Vec<u8>,
        /// `true` if the slot must be allocated from the cube descriptor pool.
        is_cube: bool,
        /// The game family whose decoding quirks apply.
        game: GameFamily,
    },
}

impl LoadRequest {
    /// The virtual path this request will install its result under.
    pub fn path(&self) -> &VirtualPath {
        match self {
            LoadRequest::Bytes { path, .. } => path,
            LoadRequest::File { path, .. } => path,
            LoadRequest::TextureSlot { path, .. } => path,
        }
    }
}

/// A successfully decoded [`LoadRequest`], handed back on a Job's reply
/// buffer.
///
/// Recoverable decode errors never reach a `LoadReply`: the worker that hit
/// them logs and drops the request in place (§7). Only `KindMismatch` and
/// `RefCountUnderflow`, which surface later when the Manager installs the
/// reply, abort the owning Job.
#[derive(Debug)]
pub struct LoadReply {
    /// The virtual path the request was for.
    pub path: VirtualPath,
    /// The access level the resource was decoded at.
    pub access: AccessLevel,
    /// The decoded payload.
    pub resource: ResourceValue,
}
