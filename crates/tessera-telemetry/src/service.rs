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

//! Service that drains profiling samples and keeps per-label statistics.

use crate::stats::HookStats;
use crossbeam_channel::Receiver;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tessera_core::telemetry::{ProfileSample, ProfileSink};

/// Service for aggregating hook profiling samples.
#[derive(Debug)]
pub struct TelemetryService {
    samples: Receiver<ProfileSample>,
    stats: BTreeMap<String, HookStats>,
    last_report: Instant,
    report_interval: Duration,
}

impl TelemetryService {
    /// Creates a service reading from `samples`, logging a summary at most
    /// once per `report_interval`.
    pub fn new(samples: Receiver<ProfileSample>, report_interval: Duration) -> Self {
        Self {
            samples,
            stats: BTreeMap::new(),
            last_report: Instant::now(),
            report_interval,
        }
    }

    /// Creates a service together with the sink that feeds it.
    ///
    /// At most `capacity` samples are buffered between ticks; the rest are
    /// dropped.
    pub fn with_capacity(capacity: usize, report_interval: Duration) -> (Self, ProfileSink) {
        let (sink, samples) = ProfileSink::bounded(capacity);
        (Self::new(samples, report_interval), sink)
    }

    /// Should be called periodically (e.g., once per frame).
    /// Drains pending samples and logs a summary if the interval has passed.
    /// Returns how many samples were ingested.
    pub fn tick(&mut self) -> usize {
        let mut ingested = 0;
        while let Ok(sample) = self.samples.try_recv() {
            self.stats
                .entry(sample.label.clone())
                .or_default()
                .record(&sample);
            ingested += 1;
        }

        if self.last_report.elapsed() >= self.report_interval {
            log::trace!("Telemetry: ingested {ingested} sample(s) this tick");
            self.log_summary();
            self.last_report = Instant::now();
        }
        ingested
    }

    /// Statistics for `label`, if any sample carried it.
    pub fn stats(&self, label: &str) -> Option<&HookStats> {
        self.stats.get(label)
    }

    /// Every label seen so far, sorted.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.stats.keys().map(String::as_str)
    }

    /// Serializes every label's statistics as a JSON object.
    pub fn snapshot_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.stats)
    }

    /// Logs one line per label at debug level.
    pub fn log_summary(&self) {
        if self.stats.is_empty() {
            return;
        }
        log::debug!("--- Hook Profile ---");
        for (label, stats) in &self.stats {
            log::debug!(
                "  {label}: calls={} failures={} avg={:?} last={:?} max={:?}",
                stats.calls,
                stats.failures,
                stats.average(),
                stats.last,
                stats.max
            );
        }
        log::debug!("--------------------");
    }
}
