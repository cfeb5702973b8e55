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

//! The asynchronous task primitive used by the lifecycle barriers.
//!
//! Every hook runs as a local task on the current `tokio` [`LocalSet`]. A hook
//! fails either by returning `Err` or by panicking; [`Isolated`] turns both
//! into an `Err` so a failing hook can never unwind into its siblings, its
//! barrier, or the frame loop.
//!
//! [`LocalSet`]: tokio::task::LocalSet

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::task::JoinSet;

/// Result of a user-supplied lifecycle hook.
pub type HookResult = anyhow::Result<()>;

/// A boxed, non-`Send` hook future.
pub type HookFuture = Pin<Box<dyn Future<Output = HookResult>>>;

/// Boxes a hook future.
pub fn boxed<F>(future: F) -> HookFuture
where
    F: Future<Output = HookResult> + 'static,
{
    Box::pin(future)
}

/// Extracts a readable message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Runs a synchronous hook, converting a panic into an error.
pub fn call_isolated(hook: impl FnOnce() -> HookResult) -> HookResult {
    match panic::catch_unwind(AssertUnwindSafe(hook)) {
        Ok(result) => result,
        Err(payload) => Err(anyhow::anyhow!(
            "hook panicked: {}",
            panic_message(payload.as_ref())
        )),
    }
}

/// A hook future whose panics are reported as errors.
pub struct Isolated {
    inner: HookFuture,
}

impl Future for Isolated {
    type Output = HookResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match panic::catch_unwind(AssertUnwindSafe(|| this.inner.as_mut().poll(cx))) {
            Ok(poll) => poll,
            Err(payload) => Poll::Ready(Err(anyhow::anyhow!(
                "hook panicked: {}",
                panic_message(payload.as_ref())
            ))),
        }
    }
}

/// Wraps `future` so a panic inside it resolves to `Err` instead of unwinding.
pub fn isolate(future: HookFuture) -> Isolated {
    Isolated { inner: future }
}

/// A hook that failed, with the identity of the descriptor that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookFailure {
    /// Name or tag of the owning descriptor.
    pub identity: String,
    /// The formatted error chain.
    pub message: String,
}

/// Summary of one concurrent lifecycle barrier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseReport {
    /// Hook topic the barrier ran (`onInit`, `onStart`).
    pub phase: String,
    /// Number of hooks launched.
    pub launched: usize,
    /// Hooks that failed. Their siblings were unaffected.
    pub failures: Vec<HookFailure>,
}

impl PhaseReport {
    /// Creates an empty report for `phase`.
    pub fn new(phase: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            ..Self::default()
        }
    }

    /// Number of hooks that completed without error.
    pub fn succeeded(&self) -> usize {
        self.launched - self.failures.len()
    }

    /// Logs and records a failed hook.
    pub fn record_failure(&mut self, identity: &str, error: &anyhow::Error) {
        log_hook_failure(identity, &self.phase, error);
        self.failures.push(HookFailure {
            identity: identity.to_string(),
            message: format!("{error:#}"),
        });
    }
}

/// Logs a hook failure with the owning descriptor and the full error chain.
pub fn log_hook_failure(identity: &str, hook: &str, error: &anyhow::Error) {
    log::error!("{hook} hook of '{identity}' failed: {error:?}");
}

/// A set of concurrently running hooks that is awaited as one barrier.
///
/// Must be used from inside a `tokio` `LocalSet`.
pub struct TaskBarrier {
    phase: String,
    tasks: JoinSet<(String, HookResult)>,
    launched: usize,
}

impl TaskBarrier {
    /// Creates an empty barrier for `phase`.
    pub fn new(phase: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            tasks: JoinSet::new(),
            launched: 0,
        }
    }

    /// Launches `future` as a concurrent local task owned by `identity`.
    pub fn spawn(&mut self, identity: impl Into<String>, future: HookFuture) {
        let identity = identity.into();
        let isolated = isolate(future);
        self.tasks.spawn_local(async move { (identity, isolated.await) });
        self.launched += 1;
    }

    /// Number of tasks launched so far.
    pub fn launched(&self) -> usize {
        self.launched
    }

    /// Waits for every task to settle. Failures are logged and collected;
    /// they never cut the wait short.
    pub async fn settle(mut self) -> PhaseReport {
        let mut report = PhaseReport::new(self.phase.clone());
        report.launched = self.launched;

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((identity, Err(error))) => report.record_failure(&identity, &error),
                Err(join_error) => {
                    let error = anyhow::anyhow!("task did not complete: {join_error}");
                    report.record_failure("<unknown>", &error);
                }
            }
        }

        report
    }
}
