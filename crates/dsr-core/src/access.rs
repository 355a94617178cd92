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

//! Resource access levels and the satisfaction predicate.

/// The intended capability of a loaded resource.
///
/// Ordered by capability: `Unloaded < EditOnly, GpuOptimizedOnly < Full`.
/// `Full` is the only level that satisfies every request; `EditOnly` and
/// `GpuOptimizedOnly` are incomparable with each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessLevel {
    /// No payload is resident.
    Unloaded,
    /// CPU-mutable data only, no GPU upload.
    EditOnly,
    /// GPU-resident data only, no CPU-editable copy.
    GpuOptimizedOnly,
    /// Both CPU-editable and GPU-resident.
    Full,
}

impl AccessLevel {
    /// Returns `true` if a resource actually loaded at `self` satisfies a
    /// request for `requested`.
    ///
    /// `Unloaded` never satisfies anything, including a request for
    /// `Unloaded` itself — there is nothing to observe or acquire.
    pub fn satisfies(self, requested: AccessLevel) -> bool {
        match self {
            AccessLevel::Unloaded => false,
            AccessLevel::Full => true,
            actual => actual == requested,
        }
    }
}
