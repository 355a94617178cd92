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

//! Error kinds for the resource loading subsystem.

use crate::path::VirtualPath;
use thiserror::Error;

/// Errors raised while resolving, reading, or decoding a resource.
///
/// [`ResourceError::KindMismatch`] and [`ResourceError::RefCountUnderflow`]
/// are programming errors and are always fatal; every other variant is
/// recoverable — the caller logs it and drops the request.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The virtual path could not be resolved, or the resolved file is missing.
    #[error("resource not found: {path}")]
    NotFound {
        /// The virtual path that failed to resolve.
        path: VirtualPath,
    },

    /// The decoder rejected the input (corrupt data, layout mismatch).
    #[error("format error decoding {path}: {source}")]
    FormatError {
        /// The virtual path being decoded.
        path: VirtualPath,
        /// The underlying decoder error.
        #[source]
        source: anyhow::Error,
    },

    /// The binder/container could not be opened or read.
    #[error("container error opening {path}: {source}")]
    ContainerError {
        /// The virtual path of the archive.
        path: VirtualPath,
        /// The underlying container error.
        #[source]
        source: anyhow::Error,
    },

    /// GPU descriptor allocation failed.
    #[error("descriptor allocation exhausted for {path}")]
    ResourceExhausted {
        /// The virtual path of the texture slot.
        path: VirtualPath,
    },

    /// `get_or_create` was called with a kind that disagrees with the
    /// kind a handle was already created under. Always fatal.
    #[error("kind mismatch at {path}: handle is {existing:?}, requested {requested:?}")]
    KindMismatch {
        /// The virtual path of the handle.
        path: VirtualPath,
        /// The kind the handle was originally created with.
        existing: crate::kind::ResourceKind,
        /// The kind requested by this call.
        requested: crate::kind::ResourceKind,
    },

    /// `release()` was called on a handle whose `ref_count` was already
    /// zero. Always fatal.
    #[error("reference count underflow releasing {path}")]
    RefCountUnderflow {
        /// The virtual path of the handle.
        path: VirtualPath,
    },
}

impl ResourceError {
    /// Returns `true` for the error kinds that always abort the owning
    /// Job (and, per spec, the process): `KindMismatch` and
    /// `RefCountUnderflow`.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ResourceError::KindMismatch { .. } | ResourceError::RefCountUnderflow { .. }
        )
    }
}
