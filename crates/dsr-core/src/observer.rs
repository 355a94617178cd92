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

//! Weakly-held observers of a [`crate::handle::ResourceHandle`].

use crate::handle::ResourceHandle;
use std::sync::Arc;

/// A caller-supplied token handed back verbatim to `on_loaded`/`on_unloaded`,
/// so one observer can distinguish which of several registrations fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverTag(pub u64);

/// Notified when a handle's payload is installed or released.
///
/// Held weakly by the handle: an observer never has its lifetime extended
/// by being registered, and a dead weak link is silently skipped rather
/// than treated as an error.
pub trait ResourceObserver: Send + Sync {
    /// Called after a resource is installed at an access level that
    /// satisfies this observer's requested level.
    fn on_loaded(&self, handle: &Arc<ResourceHandle>, tag: ObserverTag);

    /// Called after a resource is unloaded (including the unload half of a
    /// re-load, per H4).
    fn on_unloaded(&self, handle: &Arc<ResourceHandle>, tag: ObserverTag);
}
