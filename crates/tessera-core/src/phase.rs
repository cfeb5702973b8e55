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

//! Execution roles, per-frame phases, and the reserved lifecycle topic names.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Topic names of the built-in singleton lifecycle hooks.
pub mod topics {
    /// Init hook, awaited as the first startup barrier.
    pub const ON_INIT: &str = "onInit";
    /// Start hook, awaited as the second startup barrier.
    pub const ON_START: &str = "onStart";
    /// Continuous hook bound to [`FramePhase::PostSimulation`](super::FramePhase::PostSimulation).
    pub const ON_TICK: &str = "onTick";
    /// Continuous hook bound to [`FramePhase::PreSimulation`](super::FramePhase::PreSimulation).
    pub const ON_PHYSICS: &str = "onPhysics";
    /// Continuous hook bound to [`FramePhase::PreRender`](super::FramePhase::PreRender).
    pub const ON_RENDER: &str = "onRender";

    /// Every hook prefix must start with this.
    pub const HOOK_PREFIX: &str = "on";

    /// The two startup hooks, which are never published as topics.
    pub const STARTUP: [&str; 2] = [ON_INIT, ON_START];

    /// Returns `true` if `name` is one of the built-in hook names.
    pub fn is_builtin(name: &str) -> bool {
        matches!(name, ON_INIT | ON_START | ON_TICK | ON_PHYSICS | ON_RENDER)
    }
}

/// The role the current process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionRole {
    /// Authoritative simulation, no presentation.
    #[default]
    Server,
    /// Presentation side, owns the render phase.
    Client,
}

impl fmt::Display for ExecutionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionRole::Server => write!(f, "server"),
            ExecutionRole::Client => write!(f, "client"),
        }
    }
}

/// One of the host's per-frame signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FramePhase {
    /// Fires before the physics step.
    PreSimulation,
    /// Fires after the physics step.
    PostSimulation,
    /// Fires before a frame is rendered. Client only.
    PreRender,
}

impl FramePhase {
    /// All phases, in the order the host fires them within one frame.
    pub const ALL: [FramePhase; 3] = [
        FramePhase::PreSimulation,
        FramePhase::PostSimulation,
        FramePhase::PreRender,
    ];

    /// The singleton hook topic bound to this phase.
    pub fn singleton_topic(self) -> &'static str {
        match self {
            FramePhase::PreSimulation => topics::ON_PHYSICS,
            FramePhase::PostSimulation => topics::ON_TICK,
            FramePhase::PreRender => topics::ON_RENDER,
        }
    }

    /// Maps a singleton hook topic back to its phase.
    pub fn from_singleton_topic(topic: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|phase| phase.singleton_topic() == topic)
    }

    /// The only role this phase exists in, if it is restricted.
    pub fn required_role(self) -> Option<ExecutionRole> {
        match self {
            FramePhase::PreRender => Some(ExecutionRole::Client),
            _ => None,
        }
    }

    /// Returns `true` if the phase is delivered under `role`.
    pub fn available_in(self, role: ExecutionRole) -> bool {
        self.required_role().map_or(true, |required| required == role)
    }
}

impl fmt::Display for FramePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
