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

//! Resource kinds and the bitmask filter used by archive expansion.

use std::ops::{BitOr, BitOrAssign};

/// The kind of resource a handle or a load request refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// FLVER model geometry.
    Flver,
    /// Havok collision mesh (`.hkx`).
    CollisionHkx,
    /// Legacy navmesh (`.nvm`).
    Navmesh,
    /// Havok navmesh (`.hkx`).
    NavmeshHkx,
    /// Texture slot decoded from a texture container.
    Texture,
}

/// A bitmask selecting a subset of [`ResourceKind`]s for archive expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KindFilter(u8);

impl KindFilter {
    const FLVER: u8 = 1 << 0;
    const COLLISION_HKX: u8 = 1 << 1;
    const NAVMESH: u8 = 1 << 2;
    const NAVMESH_HKX: u8 = 1 << 3;
    const TEXTURE: u8 = 1 << 4;

    /// Selects every resource kind.
    pub const ALL: KindFilter = KindFilter(
        Self::FLVER | Self::COLLISION_HKX | Self::NAVMESH | Self::NAVMESH_HKX | Self::TEXTURE,
    );

    /// An empty filter matching no kind.
    pub const NONE: KindFilter = KindFilter(0);

    /// Builds a filter selecting exactly one kind.
    pub fn only(kind: ResourceKind) -> Self {
        KindFilter(Self::bit(kind))
    }

    fn bit(kind: ResourceKind) -> u8 {
        match kind {
            ResourceKind::Flver => Self::FLVER,
            ResourceKind::CollisionHkx => Self::COLLISION_HKX,
            ResourceKind::Navmesh => Self::NAVMESH,
            ResourceKind::NavmeshHkx => Self::NAVMESH_HKX,
            ResourceKind::Texture => Self::TEXTURE,
        }
    }

    /// Returns `true` if `kind` is selected by this filter.
    pub fn contains(self, kind: ResourceKind) -> bool {
        self.0 & Self::bit(kind) != 0
    }

    /// Returns `true` if both Collision and NavmeshHkx are selected, the
    /// ambiguous case the `.hkx` extension tie-break has to resolve.
    pub fn has_both_hkx_kinds(self) -> bool {
        self.contains(ResourceKind::CollisionHkx) && self.contains(ResourceKind::NavmeshHkx)
    }
}

impl BitOr for KindFilter {
    type Output = KindFilter;
    fn bitor(self, rhs: Self) -> Self::Output {
        KindFilter(self.0 | rhs.0)
    }
}

impl BitOrAssign for KindFilter {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl Default for KindFilter {
    fn default() -> Self {
        KindFilter::ALL
    }
}
