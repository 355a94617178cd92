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

//! # dsr-core
//!
//! Foundational crate for the resource loading subsystem: the shared
//! vocabulary (virtual paths, access levels, resource kinds), the handle
//! and database that own loaded resources, and the narrow trait contracts
//! through which this subsystem consumes its external collaborators
//! (the asset locator, format decoders, and the GPU backend).

pub mod access;
pub mod config;
pub mod db;
pub mod error;
pub mod handle;
pub mod interfaces;
pub mod kind;
pub mod observer;
pub mod path;
pub mod request;
pub mod resource;

pub use access::AccessLevel;
pub use config::ResourceLoaderConfig;
pub use db::Database;
pub use error::ResourceError;
pub use handle::ResourceHandle;
pub use kind::{KindFilter, ResourceKind};
pub use observer::{ObserverTag, ResourceObserver};
pub use path::VirtualPath;
pub use request::{LoadReply, LoadRequest};
pub use resource::ResourceValue;
