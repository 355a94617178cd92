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

//! The handful of configuration knobs this subsystem reads.
//!
//! Loading a config file or parsing CLI flags is out of scope; the host
//! application is responsible for populating this struct however it likes
//! and handing it to [`crate::db::Database`]/the job scheduler.

/// Configuration recognised by the resource loading subsystem.
#[derive(Debug, Clone, Copy)]
pub struct ResourceLoaderConfig {
    /// When `false`, texture container expansion discards work silently.
    pub textures_enabled: bool,
    /// When `true`, GPU descriptor allocation failure is fatal rather than dropped.
    pub strict_resource_checking: bool,
    /// Width of the Job scheduler's thread pool.
    pub job_scheduler_width: usize,
    /// Max parallelism per pipeline port (bytes / file / slot-loader).
    pub pipeline_port_parallelism: usize,
}

impl Default for ResourceLoaderConfig {
    fn default() -> Self {
        Self {
            textures_enabled: true,
            strict_resource_checking: false,
            job_scheduler_width: 4,
            pipeline_port_parallelism: 6,
        }
    }
}
