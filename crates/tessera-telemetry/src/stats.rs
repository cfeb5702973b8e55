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

//! Per-label hook statistics.

use serde::Serialize;
use std::time::Duration;
use tessera_core::telemetry::ProfileSample;

/// Running totals for one profiling label.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HookStats {
    /// Number of completed runs.
    pub calls: u64,
    /// Runs that returned an error or panicked.
    pub failures: u64,
    /// Sum of every run's duration.
    pub total: Duration,
    /// Duration of the most recent run.
    pub last: Duration,
    /// Longest run seen.
    pub max: Duration,
}

impl HookStats {
    /// Folds one sample into the totals.
    pub fn record(&mut self, sample: &ProfileSample) {
        self.calls += 1;
        if !sample.succeeded {
            self.failures += 1;
        }
        self.total += sample.duration;
        self.last = sample.duration;
        self.max = self.max.max(sample.duration);
    }

    /// Mean run duration, zero before the first run.
    pub fn average(&self) -> Duration {
        match u32::try_from(self.calls) {
            Ok(0) => Duration::ZERO,
            Ok(calls) => self.total / calls,
            Err(_) => Duration::from_secs_f64(self.total.as_secs_f64() / self.calls as f64),
        }
    }
}
