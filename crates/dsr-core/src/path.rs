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

//! Case-insensitive virtual asset paths.

use std::fmt;

/// A stable, game-independent identifier for an asset.
///
/// Construction always canonicalizes to lowercase, so every `VirtualPath`
/// in the database compares and hashes identically regardless of the
/// casing a caller used to build it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VirtualPath(String);

impl VirtualPath {
    /// Builds a canonical virtual path from any string-like input.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().to_lowercase())
    }

    /// Returns the canonical (lowercase) path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Joins a binder entry name onto this path the way `join_binder` does,
    /// for call sites that don't go through `AssetLocator`.
    pub fn join(&self, entry_name: impl AsRef<str>) -> Self {
        Self::new(format!("{}/{}", self.0, entry_name.as_ref()))
    }

    /// Returns `true` if the canonical path starts with the given
    /// (case-insensitive) prefix.
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(&prefix.to_lowercase())
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VirtualPath {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for VirtualPath {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}
