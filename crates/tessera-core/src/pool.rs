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

//! Reusable execution contexts for hot, repeated hook invocations.
//!
//! [`ExecutionPool::run`] starts every job inline, on the caller's stack, and
//! drives it up to its first suspension point. A job that finishes there never
//! leaves the caller: a frame signal handler that runs a pooled hook has run
//! that hook by the time it returns.
//!
//! A job that suspends is handed to an execution context: a local task parked
//! on a channel, which resumes the job and finishes it. The pool keeps at most
//! one *idle* context. `run` claims the idle context when there is one and
//! spawns a new one otherwise; a context whose job is done either returns to
//! the idle slot or, if another context already took it, exits.
//!
//! Under steady per-frame pressure a pool therefore spawns exactly one context
//! for its whole lifetime. Jobs that stay suspended across frames cause extra
//! contexts to exist until they finish.

use crate::task::{self, HookResult, Isolated};
use crate::telemetry::{ProfileSample, ProfileSink};
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};
use std::time::Instant;
use tokio::sync::oneshot;

/// A handle to one execution context. Dropping the last handle lets the
/// context's task exit.
type ContextHandle = flume::Sender<Suspended>;

/// A job that suspended during its inline start.
struct Suspended {
    future: Isolated,
    started: Instant,
    done: oneshot::Sender<HookResult>,
    home: ContextHandle,
}

struct Shared {
    label: Rc<str>,
    idle: RefCell<Option<ContextHandle>>,
    spawned: Cell<usize>,
    live: Cell<usize>,
    profiler: Option<ProfileSink>,
}

/// A pool of reusable execution contexts for one callback identity.
///
/// Must be used from inside a `tokio` `LocalSet`.
pub struct ExecutionPool {
    shared: Rc<Shared>,
}

impl ExecutionPool {
    /// Creates a pool whose runs are labelled `label` in logs.
    pub fn new(label: impl Into<String>) -> Self {
        Self::build(label.into(), None)
    }

    /// Creates a pool that also records a [`ProfileSample`] per run.
    pub fn with_profiler(label: impl Into<String>, profiler: ProfileSink) -> Self {
        Self::build(label.into(), Some(profiler))
    }

    fn build(label: String, profiler: Option<ProfileSink>) -> Self {
        Self {
            shared: Rc::new(Shared {
                label: Rc::from(label),
                idle: RefCell::new(None),
                spawned: Cell::new(0),
                live: Cell::new(0),
                profiler,
            }),
        }
    }

    /// The label used for logs and profiling samples.
    pub fn label(&self) -> &str {
        &self.shared.label
    }

    /// Runs `job` on an execution context.
    ///
    /// The job starts immediately and runs inline until it completes or first
    /// suspends; only a suspended job continues on a later scheduling tick.
    /// Its outcome can be awaited through the returned [`PendingRun`]. If that
    /// handle is dropped, a failure is logged instead.
    pub fn run<F, Fut>(&self, job: F) -> PendingRun
    where
        F: FnOnce() -> Fut + 'static,
        Fut: Future<Output = HookResult> + 'static,
    {
        let (done, receiver) = oneshot::channel();
        let pending = PendingRun {
            label: Rc::clone(&self.shared.label),
            receiver: Some(receiver),
        };
        let context = self.claim_context();
        let started = Instant::now();

        // The job is called inside the isolated future so a panic while
        // building the future is caught as well.
        let mut future = task::isolate(task::boxed(async move { job().await }));
        let mut cx = Context::from_waker(Waker::noop());
        match Pin::new(&mut future).poll(&mut cx) {
            Poll::Ready(result) => {
                finish(&self.shared, started, result, done);
                park(&self.shared, context);
            }
            Poll::Pending => {
                log::trace!(
                    "ExecutionPool '{}': job suspended, resuming it on a context",
                    self.shared.label
                );
                let suspended = Suspended {
                    future,
                    started,
                    done,
                    home: context.clone(),
                };
                if context.send(suspended).is_err() {
                    log::warn!(
                        "ExecutionPool '{}': context is gone, dropping suspended job",
                        self.shared.label
                    );
                }
            }
        }
        pending
    }

    fn claim_context(&self) -> ContextHandle {
        let idle = self.shared.idle.borrow_mut().take();
        match idle {
            Some(context) => {
                log::trace!("ExecutionPool '{}': reused idle context", self.shared.label);
                context
            }
            None => spawn_context(&self.shared),
        }
    }

    /// Total number of contexts this pool has ever spawned.
    pub fn contexts_spawned(&self) -> usize {
        self.shared.spawned.get()
    }

    /// Number of contexts currently alive (running or idle).
    pub fn live_contexts(&self) -> usize {
        self.shared.live.get()
    }

    /// Returns `true` if a context is parked waiting for work.
    pub fn has_idle(&self) -> bool {
        self.shared.idle.borrow().is_some()
    }

    /// Lets the idle context, if any, exit on its next poll.
    pub fn release_idle(&self) {
        self.shared.idle.borrow_mut().take();
    }
}

impl Drop for ExecutionPool {
    fn drop(&mut self) {
        self.release_idle();
    }
}

impl std::fmt::Debug for ExecutionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionPool")
            .field("label", &self.shared.label)
            .field("spawned", &self.shared.spawned.get())
            .field("live", &self.shared.live.get())
            .finish()
    }
}

/// The eventual outcome of one [`ExecutionPool::run`].
#[derive(Debug)]
pub struct PendingRun {
    label: Rc<str>,
    receiver: Option<oneshot::Receiver<HookResult>>,
}

impl PendingRun {
    /// Waits for the job to finish and returns its result.
    pub async fn wait(mut self) -> HookResult {
        let Some(receiver) = self.receiver.take() else {
            return Err(anyhow::anyhow!("run outcome was already taken"));
        };
        match receiver.await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!(
                "execution context was dropped before the job completed"
            )),
        }
    }
}

impl Drop for PendingRun {
    fn drop(&mut self) {
        // A job that finished inline already delivered its result here.
        if let Some(mut receiver) = self.receiver.take() {
            if let Ok(Err(error)) = receiver.try_recv() {
                task::log_hook_failure(&self.label, "pooled", &error);
            }
        }
    }
}

fn spawn_context(shared: &Rc<Shared>) -> ContextHandle {
    let (handle, receiver) = flume::bounded::<Suspended>(1);
    shared.spawned.set(shared.spawned.get() + 1);
    shared.live.set(shared.live.get() + 1);
    log::trace!(
        "ExecutionPool '{}': spawning context #{}",
        shared.label,
        shared.spawned.get()
    );

    let shared = Rc::clone(shared);
    tokio::task::spawn_local(async move {
        while let Ok(suspended) = receiver.recv_async().await {
            let Suspended {
                future,
                started,
                done,
                home,
            } = suspended;
            let result = future.await;
            finish(&shared, started, result, done);
            park(&shared, home);
        }
        shared.live.set(shared.live.get() - 1);
    });
    handle
}

/// Returns a context to the idle slot, or drops it if the slot is taken.
fn park(shared: &Shared, context: ContextHandle) {
    let mut idle = shared.idle.borrow_mut();
    if idle.is_none() {
        *idle = Some(context);
    }
}

fn finish(shared: &Shared, started: Instant, result: HookResult, done: oneshot::Sender<HookResult>) {
    if let Some(profiler) = &shared.profiler {
        profiler.record(ProfileSample {
            label: shared.label.to_string(),
            duration: started.elapsed(),
            succeeded: result.is_ok(),
        });
    }

    if done.is_closed() {
        if let Err(error) = &result {
            task::log_hook_failure(&shared.label, "pooled", error);
        }
    } else {
        let _ = done.send(result);
    }
}
