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

//! A manually stepped source of per-frame signals.

use std::cell::Cell;
use tessera_core::host::FrameSignals;
use tessera_core::{ExecutionRole, FramePhase, Signal};

/// Number of scheduler yields granted after each phase by [`FrameDriver::run_frame`].
const YIELDS_PER_PHASE: usize = 4;

/// Fires the three frame-phase signals on demand.
///
/// The render phase only exists for [`ExecutionRole::Client`].
#[derive(Debug)]
pub struct FrameDriver {
    role: ExecutionRole,
    pre_simulation: Signal<f64>,
    post_simulation: Signal<f64>,
    pre_render: Signal<f64>,
    frames: Cell<u64>,
}

impl FrameDriver {
    /// Creates a driver for a process running as `role`.
    #[must_use]
    pub fn new(role: ExecutionRole) -> Self {
        Self {
            role,
            pre_simulation: Signal::new(),
            post_simulation: Signal::new(),
            pre_render: Signal::new(),
            frames: Cell::new(0),
        }
    }

    /// The role this driver was created for.
    pub fn role(&self) -> ExecutionRole {
        self.role
    }

    /// Number of complete frames stepped so far.
    pub fn frame_count(&self) -> u64 {
        self.frames.get()
    }

    fn signal(&self, phase: FramePhase) -> &Signal<f64> {
        match phase {
            FramePhase::PreSimulation => &self.pre_simulation,
            FramePhase::PostSimulation => &self.post_simulation,
            FramePhase::PreRender => &self.pre_render,
        }
    }

    /// Fires a single phase. Returns `false` if the phase does not exist in
    /// this role.
    pub fn fire(&self, phase: FramePhase, dt: f64) -> bool {
        if !phase.available_in(self.role) {
            log::trace!("FrameDriver: {phase} is not delivered in the {} role", self.role);
            return false;
        }
        self.signal(phase).fire(&dt);
        true
    }

    /// Fires every available phase, in frame order, synchronously.
    ///
    /// Hooks that suspend only make progress once the caller yields; use
    /// [`run_frame`](Self::run_frame) from async code.
    pub fn step(&self, dt: f64) {
        for phase in FramePhase::ALL {
            self.fire(phase, dt);
        }
        self.frames.set(self.frames.get() + 1);
    }

    /// Fires every available phase and yields to the local scheduler after
    /// each one, so the hooks of a phase get to run before the next phase fires.
    ///
    /// Must be awaited from inside a `tokio` `LocalSet`.
    pub async fn run_frame(&self, dt: f64) {
        for phase in FramePhase::ALL {
            if self.fire(phase, dt) {
                settle().await;
            }
        }
        self.frames.set(self.frames.get() + 1);
    }
}

impl FrameSignals for FrameDriver {
    fn phase(&self, phase: FramePhase) -> Option<Signal<f64>> {
        phase
            .available_in(self.role)
            .then(|| self.signal(phase).clone())
    }
}

/// Yields to the local scheduler a few times so freshly spawned local tasks
/// can run to their first real suspension point.
pub async fn settle() {
    for _ in 0..YIELDS_PER_PHASE {
        tokio::task::yield_now().await;
    }
}
