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

//! # dsr-pipeline
//!
//! The worker-pool pipelines, the texture pipeline, the archive-expansion
//! front-end stage, the Job Builder, and the Job that ties them all
//! together around one batch of load work.

pub mod archive_expansion;
pub mod builder;
pub mod job;
pub mod pipeline;
pub mod pool;
pub mod texture_pipeline;

pub use archive_expansion::{ArchiveExpansionStage, LoadArchiveRequest};
pub use builder::JobBuilder;
pub use job::{Job, JobDependencies, JobMetrics};
pub use pipeline::Pipeline;
pub use pool::{BoundedPool, UnboundedStage};
pub use texture_pipeline::{ContainerSource, ExpandContainerRequest, TexturePipeline};
