// Copyright 2025 Chris Custine
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

//! Sweep reassembly.
//!
//! `rtl_power` reports a wide sweep as a series of hops that share one
//! timestamp. This module stitches those hops into a single buffer and
//! decides when the buffer covers the full configured range.

use serde::{Deserialize, Serialize};

use crate::process::SweepConfig;
use crate::protocol::ParsedLine;

/// One sweep across the configured range, assembled from hops.
///
/// Serializes as `{"timestamp": ..., "x": [...], "y": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepBuffer {
    /// Timestamp shared by every hop of this sweep.
    pub timestamp: String,
    /// Frequency axis in Hz, LNB-corrected, ascending.
    #[serde(rename = "x")]
    pub frequencies: Vec<f64>,
    /// Power values in dB, one per frequency.
    #[serde(rename = "y")]
    pub powers: Vec<f64>,
}

impl SweepBuffer {
    fn from_line(line: ParsedLine) -> Self {
        Self {
            timestamp: line.timestamp,
            frequencies: line.frequencies,
            powers: line.powers,
        }
    }

    /// Number of bins in the sweep.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    /// Check if the sweep holds no bins.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }
}

/// When a completed sweep is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionPolicy {
    /// Report completion once per timestamp (default).
    #[default]
    OncePerTimestamp,
    /// Report every hop that reaches the end of the range, even if the
    /// sweep was already reported.
    EveryMatch,
}

/// Result of feeding one hop to the accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ingest {
    /// The hop started a new buffer (new timestamp).
    pub new_sweep: bool,
    /// The buffer is ready to publish.
    pub completed: bool,
}

/// Stitches hops into sweeps and detects completion.
#[derive(Debug, Clone)]
pub struct SweepAccumulator {
    stop_mhz: f64,
    lnb_lo_hz: f64,
    policy: CompletionPolicy,
    current: Option<SweepBuffer>,
    published: bool,
}

impl SweepAccumulator {
    /// Create an accumulator for a run with the given parameters.
    #[must_use]
    pub fn new(config: &SweepConfig) -> Self {
        Self::with_policy(config, CompletionPolicy::default())
    }

    /// Create an accumulator with an explicit completion policy.
    #[must_use]
    pub fn with_policy(config: &SweepConfig, policy: CompletionPolicy) -> Self {
        Self {
            stop_mhz: config.stop_mhz(),
            lnb_lo_hz: config.lnb_lo_hz(),
            policy,
            current: None,
            published: false,
        }
    }

    /// Feed one parsed hop.
    ///
    /// A hop with a new timestamp replaces the current buffer, discarding it
    /// even if it never completed. Hops with the same timestamp are
    /// appended as-is; they arrive in ascending frequency order.
    pub fn ingest(&mut self, line: ParsedLine) -> Ingest {
        let reaches_end = self.reaches_end(&line);

        let new_sweep = match &mut self.current {
            Some(buffer) if buffer.timestamp == line.timestamp => {
                buffer.frequencies.extend(line.frequencies);
                buffer.powers.extend(line.powers);
                false
            }
            current => {
                *current = Some(SweepBuffer::from_line(line));
                self.published = false;
                true
            }
        };

        let completed = match self.policy {
            CompletionPolicy::EveryMatch => reaches_end,
            CompletionPolicy::OncePerTimestamp => reaches_end && !self.published,
        };
        if completed {
            self.published = true;
        }

        Ingest {
            new_sweep,
            completed,
        }
    }

    /// The hop's stop frequency lies within one step of the configured stop.
    ///
    /// Compared in the tool's own (pre-LNB) frequency domain. An exact
    /// equality test would be correct but old `rtl_power` builds overshoot
    /// or undershoot the last hop.
    #[allow(
        clippy::cast_precision_loss,
        reason = "Hz values fit comfortably in f64"
    )]
    fn reaches_end(&self, line: &ParsedLine) -> bool {
        let stop_hz = (self.stop_mhz - self.lnb_lo_hz / 1e6) * 1e6;
        line.segment_stop as f64 > stop_hz - line.step
    }

    /// The sweep currently being assembled.
    #[must_use]
    pub fn buffer(&self) -> Option<&SweepBuffer> {
        self.current.as_ref()
    }

    /// Copy of the current buffer, for handing to a sink.
    #[must_use]
    pub fn snapshot(&self) -> Option<SweepBuffer> {
        self.current.clone()
    }

    /// Drop the current buffer.
    pub fn reset(&mut self) {
        self.current = None;
        self.published = false;
    }
}
