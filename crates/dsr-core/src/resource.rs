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

//! The decoded payload types a handle may carry.

use crate::kind::ResourceKind;

/// Marker trait for types that can be installed as a resource payload.
///
/// Mirrors the engine-wide `Asset` marker: a payload must be safely
/// shareable across the worker pools that decode it and the tick thread
/// that installs it.
pub trait Payload: Send + Sync + std::fmt::Debug + 'static {}

/// Decoded FLVER model geometry. Opaque at this layer; the real vertex/
/// material buffers are owned by the out-of-scope renderer.
#[derive(Debug, Default)]
pub struct FlverPayload {
    /// Raw decoded bytes, stood in for the real geometry buffers.
    pub bytes: Vec<u8>,
}
impl Payload for FlverPayload {}

/// Decoded Havok collision mesh.
#[derive(Debug, Default)]
pub struct CollisionPayload {
    /// Raw decoded bytes, stood in for the real collision tree.
    pub bytes: Vec<u8>,
}
impl Payload for CollisionPayload {}

/// Decoded legacy (`.nvm`) navmesh.
#[derive(Debug, Default)]
pub struct NavmeshPayload {
    /// Raw decoded bytes, stood in for the real navmesh graph.
    pub bytes: Vec<u8>,
}
impl Payload for NavmeshPayload {}

/// Decoded Havok (`.hkx`) navmesh.
#[derive(Debug, Default)]
pub struct NavmeshHkxPayload {
    /// Raw decoded bytes, stood in for the real navmesh graph.
    pub bytes: Vec<u8>,
}
impl Payload for NavmeshHkxPayload {}

/// A texture slot after GPU upload has been enqueued.
///
/// Owns the GPU descriptor; dropping it must release the descriptor back
/// to its pool (left as a no-op here since descriptor pool release is part
/// of the out-of-scope GPU backend).
#[derive(Debug)]
pub struct TexturePayload {
    /// Opaque descriptor handle allocated from the GPU backend.
    pub descriptor: crate::interfaces::DescriptorHandle,
}
impl Payload for TexturePayload {}

/// The decoded payload of a resource, tagged by [`ResourceKind`].
///
/// A tagged enum rather than a trait object: the manager's tick needs to
/// recover a handle's kind from a freshly arrived reply without any
/// runtime-type machinery, so every variant corresponds 1:1 with a
/// `ResourceKind`.
#[derive(Debug)]
pub enum ResourceValue {
    /// See [`FlverPayload`].
    Flver(FlverPayload),
    /// See [`CollisionPayload`].
    Collision(CollisionPayload),
    /// See [`NavmeshPayload`].
    Navmesh(NavmeshPayload),
    /// See [`NavmeshHkxPayload`].
    NavmeshHkx(NavmeshHkxPayload),
    /// See [`TexturePayload`].
    Texture(TexturePayload),
}

impl ResourceValue {
    /// Returns the [`ResourceKind`] this payload belongs to.
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceValue::Flver(_) => ResourceKind::Flver,
            ResourceValue::Collision(_) => ResourceKind::CollisionHkx,
            ResourceValue::Navmesh(_) => ResourceKind::Navmesh,
            ResourceValue::NavmeshHkx(_) => ResourceKind::NavmeshHkx,
            ResourceValue::Texture(_) => ResourceKind::Texture,
        }
    }
}
