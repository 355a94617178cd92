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

//! The shared map from virtual path to [`ResourceHandle`].

use crate::error::ResourceError;
use crate::handle::ResourceHandle;
use crate::kind::ResourceKind;
use crate::observer::{ObserverTag, ResourceObserver};
use crate::path::VirtualPath;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

/// The process-wide map from canonical virtual path to resource handle.
///
/// Concurrent reads (`lookup`) are lock-free after the initial map lookup
/// (the returned `Arc<ResourceHandle>` is cloned out); concurrent
/// mutations of the map itself (insertion, removal) are serialized behind
/// a single mutex, per §5's shared-resource policy. Mutation of a handle's
/// own state happens behind that handle's own mutex (see
/// [`crate::handle::ResourceHandle`]) and is not serialized against other
/// handles.
#[derive(Clone, Default)]
pub struct Database {
    inner: Arc<Mutex<HashMap<VirtualPath, Arc<ResourceHandle>>>>,
}

impl Database {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a handle without creating one. Pure read, no mutation.
    pub fn lookup(&self, path: &VirtualPath) -> Option<Arc<ResourceHandle>> {
        self.inner.lock().unwrap().get(path).cloned()
    }

    /// Returns the handle at `path`, creating an `Unloaded` handle of the
    /// given `kind` if one doesn't exist yet.
    ///
    /// If a handle already exists under a different kind, this is a
    /// programming error: `get_or_create` never silently coerces or
    /// replaces an existing handle's kind (H2), it reports
    /// [`ResourceError::KindMismatch`].
    pub fn get_or_create(
        &self,
        kind: ResourceKind,
        path: &VirtualPath,
    ) -> Result<Arc<ResourceHandle>, ResourceError> {
        let mut map = self.inner.lock().unwrap();
        if let Some(existing) = map.get(path) {
            if existing.kind() != kind {
                return Err(ResourceError::KindMismatch {
                    path: path.clone(),
                    existing: existing.kind(),
                    requested: kind,
                });
            }
            return Ok(existing.clone());
        }
        let handle = ResourceHandle::new(path.clone(), kind);
        map.insert(path.clone(), handle.clone());
        Ok(handle)
    }

    /// Creates the handle if absent, registers the weak observer, and
    /// delivers an immediate `on_loaded` if already satisfied (see
    /// [`ResourceHandle::observe`]).
    pub fn observe(
        &self,
        path: &VirtualPath,
        kind: ResourceKind,
        observer: Weak<dyn ResourceObserver>,
        required_access: crate::access::AccessLevel,
        tag: ObserverTag,
    ) -> Result<(), ResourceError> {
        let handle = self.get_or_create(kind, path)?;
        handle.observe(observer, required_access, tag);
        Ok(())
    }

    /// Removes a handle from the database.
    ///
    /// Per H3, this must only be called when `ref_count == 0` and the
    /// payload is absent; per §9's resolved open question, callers must
    /// only do so from the Manager's single-threaded tick, never
    /// concurrently with `observe`.
    pub fn remove(&self, path: &VirtualPath) -> Option<Arc<ResourceHandle>> {
        self.inner.lock().unwrap().remove(path)
    }

    /// A point-in-time snapshot of every handle currently in the database,
    /// for the Manager's sweep and the Job Builder's UDSFM/unloaded-texture
    /// scans.
    pub fn snapshot(&self) -> Vec<Arc<ResourceHandle>> {
        self.inner.lock().unwrap().values().cloned().collect()
    }

    /// Number of handles currently tracked.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// Returns `true` if the database has no handles.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}
