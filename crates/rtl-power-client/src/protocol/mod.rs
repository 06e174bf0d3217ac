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

//! Protocol layer for sweep output parsing.
//!
//! This module provides a trait-based abstraction over the textual output of
//! sweep-capture tools. Currently implements the `rtl_power` CSV format.

mod rtl_power;

pub use rtl_power::RtlPowerParser;

use thiserror::Error;

/// Errors that can occur while parsing one output line.
///
/// All variants are recoverable: the offending line is dropped and the
/// acquisition continues with the next one.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for field '{field}': {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// Record of an axis/power length disagreement that was reconciled by
/// truncating the longer sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthMismatch {
    /// Axis length computed from the segment bounds and step.
    pub axis_len: usize,
    /// Number of power values present on the line.
    pub power_len: usize,
}

/// One parsed hop of a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    /// Date and time fields joined with a single space.
    pub timestamp: String,
    /// Segment start frequency in tool units (Hz), before LNB correction.
    pub segment_start: i64,
    /// Segment stop frequency in tool units (Hz), before LNB correction.
    pub segment_stop: i64,
    /// Frequency step in Hz.
    pub step: f64,
    /// Sample count declared by the tool. Informational only.
    pub samples: f64,
    /// LNB-corrected frequency axis, ascending.
    pub frequencies: Vec<f64>,
    /// Power values in dB, same length as `frequencies`.
    pub powers: Vec<f64>,
    /// Set when the line needed length reconciliation.
    pub length_mismatch: Option<LengthMismatch>,
}

/// Trait for sweep output parsers.
///
/// Implement this trait to add support for other capture tool formats.
pub trait Protocol {
    /// The message type produced by this parser.
    type Message;
    /// The error type for parsing failures.
    type Error;

    /// Parse a single output line.
    ///
    /// Returns `Ok(Some(message))` if parsing succeeded,
    /// `Ok(None)` if the line is valid but carries no data (e.g. blank),
    /// or `Err(error)` if parsing failed.
    fn parse(&mut self, line: &str) -> Result<Option<Self::Message>, Self::Error>;
}
