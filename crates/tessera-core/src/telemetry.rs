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

//! Abstract profiling samples emitted around hook invocations.
//!
//! The runtime only produces samples; aggregation lives in `tessera-telemetry`.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::time::Duration;

/// One timed hook invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSample {
    /// Profiling label, usually `"<identity>::<hook>"`.
    pub label: String,
    /// Wall time between the start of the run and its completion.
    pub duration: Duration,
    /// `false` if the hook returned an error or panicked.
    pub succeeded: bool,
}

/// Sending half for profiling samples.
///
/// Cloning is cheap. When the channel is full or the receiver is gone the
/// sample is dropped; profiling never blocks a hook.
#[derive(Debug, Clone)]
pub struct ProfileSink {
    sender: Sender<ProfileSample>,
}

impl ProfileSink {
    /// Creates a bounded sample channel.
    pub fn bounded(capacity: usize) -> (Self, Receiver<ProfileSample>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        (Self { sender }, receiver)
    }

    /// Records a sample, dropping it if the channel cannot take it.
    pub fn record(&self, sample: ProfileSample) {
        match self.sender.try_send(sample) {
            Ok(()) => {}
            Err(TrySendError::Full(sample)) => {
                log::trace!("ProfileSink: buffer full, dropping sample '{}'", sample.label);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_drops_when_full() {
        let (sink, receiver) = ProfileSink::bounded(1);
        for i in 0..3 {
            sink.record(ProfileSample {
                label: format!("s{i}"),
                duration: Duration::from_micros(10),
                succeeded: true,
            });
        }
        let drained: Vec<ProfileSample> = receiver.try_iter().collect();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].label, "s0");
    }

    #[test]
    fn test_sink_ignores_disconnected_receiver() {
        let (sink, receiver) = ProfileSink::bounded(4);
        drop(receiver);
        sink.record(ProfileSample {
            label: "orphan".into(),
            duration: Duration::ZERO,
            succeeded: false,
        });
    }
}
