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

//! The one-shot singleton startup sequence and the frame bindings it leaves
//! behind.
//!
//! Startup runs in this order:
//!
//! 1. Registered singletons are sorted by load order.
//! 2. The three continuous-phase topics are subscribed; every producer of
//!    `onPhysics`, `onTick` or `onRender` becomes a frame binding.
//! 3. Every `onInit` runs concurrently; all of them are awaited.
//! 4. The host's frame signals are connected to the bindings.
//! 5. Every `onStart` runs concurrently; all of them are awaited.
//!
//! Deferred listener deliveries are flushed at each barrier boundary and at
//! the start of every frame dispatch. Frame hooks run inside the signal
//! delivery that triggers them, up to their first suspension point. Must be
//! driven from inside a `tokio` `LocalSet`.

use crate::registry::SingletonRegistry;
use crate::singleton::Singleton;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tessera_core::phase::topics;
use tessera_core::task::{self, PhaseReport, TaskBarrier};
use tessera_core::telemetry::ProfileSink;
use tessera_core::{
    ExecutionPool, FramePhase, FrameSignals, Host, HookFuture, PendingRun, RuntimeError,
    SingletonLookup, Teardown,
};

/// Outcome of [`LifecycleOrchestrator::startup`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupReport {
    /// The `onInit` barrier.
    pub init: PhaseReport,
    /// The `onStart` barrier.
    pub start: PhaseReport,
    /// Number of frame bindings in place when startup finished.
    pub frame_bindings: usize,
}

impl StartupReport {
    /// Total number of failed startup hooks.
    pub fn failure_count(&self) -> usize {
        self.init.failures.len() + self.start.failures.len()
    }

    /// Returns `true` if every startup hook succeeded.
    pub fn is_clean(&self) -> bool {
        self.failure_count() == 0
    }
}

/// A snapshot of one frame binding, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingInfo {
    /// Name of the bound singleton.
    pub singleton: String,
    /// Phase the binding runs on.
    pub phase: FramePhase,
    /// Execution contexts the binding's pool has spawned so far.
    pub contexts_spawned: usize,
    /// Execution contexts currently alive.
    pub live_contexts: usize,
}

/// A singleton's continuous hook, bound to one frame phase.
struct FrameBinding {
    singleton: Rc<Singleton>,
    phase: FramePhase,
    hook: Rc<dyn Fn(f64) -> HookFuture>,
    pool: ExecutionPool,
}

impl FrameBinding {
    /// Runs the hook on the binding's pool. A hook that does not suspend has
    /// finished when this returns. Failures are logged by the pool.
    fn dispatch(&self, dt: f64) {
        let hook = Rc::clone(&self.hook);
        let _unobserved: PendingRun = self.pool.run(move || async move { hook(dt).await });
    }
}

#[derive(Default)]
struct FrameTable {
    closed: Cell<bool>,
    bindings: RefCell<Vec<Rc<FrameBinding>>>,
}

impl FrameTable {
    fn due(&self, phase: FramePhase) -> Vec<Rc<FrameBinding>> {
        self.bindings
            .borrow()
            .iter()
            .filter(|binding| binding.phase == phase)
            .cloned()
            .collect()
    }
}

/// Drives singleton startup and the continuous hooks afterwards.
pub struct LifecycleOrchestrator {
    registry: SingletonRegistry,
    host: Rc<dyn Host>,
    profiler: Option<ProfileSink>,
    started: Cell<bool>,
    frames: Rc<FrameTable>,
    connections: RefCell<Teardown>,
}

impl LifecycleOrchestrator {
    /// Creates an orchestrator for the singletons in `registry`, driven by
    /// the frame signals of `host`.
    #[must_use]
    pub fn new(registry: SingletonRegistry, host: Rc<dyn Host>) -> Self {
        Self {
            registry,
            host,
            profiler: None,
            started: Cell::new(false),
            frames: Rc::new(FrameTable::default()),
            connections: RefCell::new(Teardown::new()),
        }
    }

    /// Times every frame hook and startup hook into `sink`.
    #[must_use]
    pub fn with_profiler(mut self, sink: ProfileSink) -> Self {
        self.profiler = Some(sink);
        self
    }

    /// The registry this orchestrator starts.
    pub fn registry(&self) -> &SingletonRegistry {
        &self.registry
    }

    /// Returns `true` once [`startup`](Self::startup) has been called.
    pub fn is_started(&self) -> bool {
        self.started.get()
    }

    fn pool(&self, label: String) -> ExecutionPool {
        match &self.profiler {
            Some(sink) => ExecutionPool::with_profiler(label, sink.clone()),
            None => ExecutionPool::new(label),
        }
    }

    /// Runs the startup sequence. Can only be called once.
    ///
    /// Hook failures are logged and reported; they never abort the sequence
    /// or affect sibling hooks.
    pub async fn startup(&self) -> Result<StartupReport, RuntimeError> {
        if self.started.replace(true) {
            return Err(RuntimeError::AlreadyStarted);
        }
        let role = self.registry.role();
        let ordered = self.registry.sorted();
        log::info!(
            "LifecycleOrchestrator: starting {} singleton(s) as {role}",
            ordered.len()
        );

        for phase in FramePhase::ALL {
            if phase.available_in(role) {
                self.bind_topic(phase);
            }
        }
        self.flush();

        let init = self.run_init(&ordered).await;
        self.flush();

        self.connect_frames();

        let start = self.run_start(&ordered).await;
        self.flush();

        let report = StartupReport {
            init,
            start,
            frame_bindings: self.frames.bindings.borrow().len(),
        };
        log::info!(
            "LifecycleOrchestrator: startup complete ({} frame binding(s), {} failed hook(s))",
            report.frame_bindings,
            report.failure_count()
        );
        Ok(report)
    }

    fn bind_topic(&self, phase: FramePhase) {
        let frames = Rc::downgrade(&self.frames);
        let profiler = self.profiler.clone();
        self.registry.listeners().subscribe(
            phase.singleton_topic(),
            move |singleton: &Rc<Singleton>, topic: &str| {
                let Some(frames) = frames.upgrade() else {
                    return;
                };
                if frames.closed.get() {
                    return;
                }
                let Some(hook) = singleton.frame_hook(phase) else {
                    return;
                };
                let label = format!("{}::{topic}", singleton.name());
                let pool = match &profiler {
                    Some(sink) => ExecutionPool::with_profiler(label, sink.clone()),
                    None => ExecutionPool::new(label),
                };
                log::debug!("LifecycleOrchestrator: bound '{}'", pool.label());
                frames.bindings.borrow_mut().push(Rc::new(FrameBinding {
                    singleton: Rc::clone(singleton),
                    phase,
                    hook,
                    pool,
                }));
            },
        );
    }

    async fn run_init(&self, ordered: &[Rc<Singleton>]) -> PhaseReport {
        let peers: Rc<dyn SingletonLookup> = Rc::new(self.registry.clone());
        let mut barrier = TaskBarrier::new(topics::ON_INIT);
        for singleton in ordered.iter().filter(|s| s.has_hook(topics::ON_INIT)) {
            let owner = Rc::clone(singleton);
            let peers = Rc::clone(&peers);
            barrier.spawn(
                singleton.name(),
                task::boxed(async move {
                    match owner.init_hook(peers) {
                        Some(hook) => hook.await,
                        None => Ok(()),
                    }
                }),
            );
        }
        barrier.settle().await
    }

    async fn run_start(&self, ordered: &[Rc<Singleton>]) -> PhaseReport {
        let pool = self.pool(format!("startup::{}", topics::ON_START));
        let runs: Vec<(String, PendingRun)> = ordered
            .iter()
            .filter(|s| s.has_hook(topics::ON_START))
            .map(|singleton| {
                let owner = Rc::clone(singleton);
                let run = pool.run(move || async move {
                    match owner.start_hook() {
                        Some(hook) => hook.await,
                        None => Ok(()),
                    }
                });
                (singleton.name().to_string(), run)
            })
            .collect();

        let mut report = PhaseReport::new(topics::ON_START);
        report.launched = runs.len();
        for (identity, run) in runs {
            if let Err(error) = run.wait().await {
                report.record_failure(&identity, &error);
            }
        }
        report
    }

    fn connect_frames(&self) {
        let mut connections = self.connections.borrow_mut();
        for phase in FramePhase::ALL {
            let Some(signal) = self.host.phase(phase) else {
                continue;
            };
            let frames: Weak<FrameTable> = Rc::downgrade(&self.frames);
            let listeners = Rc::downgrade(self.registry.listeners());
            let connection = signal.connect(move |dt: &f64| {
                if let Some(listeners) = listeners.upgrade() {
                    listeners.flush();
                }
                let Some(frames) = frames.upgrade() else {
                    return;
                };
                for binding in frames.due(phase) {
                    binding.dispatch(*dt);
                }
            });
            connections.add_connection(connection);
        }
    }

    /// Delivers deferred listener notifications.
    pub fn flush(&self) -> usize {
        self.registry.listeners().flush()
    }

    /// Every frame binding, in dispatch order.
    pub fn bindings(&self) -> Vec<BindingInfo> {
        self.frames
            .bindings
            .borrow()
            .iter()
            .map(|binding| BindingInfo {
                singleton: binding.singleton.name().to_string(),
                phase: binding.phase,
                contexts_spawned: binding.pool.contexts_spawned(),
                live_contexts: binding.pool.live_contexts(),
            })
            .collect()
    }

    /// Disconnects the frame signals and releases every binding's idle context.
    ///
    /// Hooks already running finish on their own.
    pub fn shutdown(&self) {
        self.connections.borrow_mut().release();
        self.frames.closed.set(true);
        let bindings: Vec<Rc<FrameBinding>> = self.frames.bindings.borrow_mut().drain(..).collect();
        for binding in &bindings {
            binding.pool.release_idle();
        }
        log::info!(
            "LifecycleOrchestrator: shut down, released {} frame binding(s)",
            bindings.len()
        );
    }
}
