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

//! `rtl_power` CSV output parser.
//!
//! Each line reports one hop of a sweep:
//! ```text
//! <date>, <time>, <start Hz>, <stop Hz>, <step Hz>, <samples>, <dB>, <dB>, ...
//! ```

use log::warn;

use super::{LengthMismatch, ParseError, ParsedLine, Protocol};

/// Index of the first power value on a line.
const FIRST_POWER_FIELD: usize = 6;

/// Parser for `rtl_power` output lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct RtlPowerParser {
    lnb_offset_hz: f64,
}

impl RtlPowerParser {
    /// Create a new parser that shifts the reconstructed axis by the given
    /// LNB local-oscillator offset (Hz).
    #[must_use]
    pub fn new(lnb_offset_hz: f64) -> Self {
        Self { lnb_offset_hz }
    }

    /// The LNB offset this parser applies.
    #[must_use]
    pub fn lnb_offset_hz(&self) -> f64 {
        self.lnb_offset_hz
    }
}

impl Protocol for RtlPowerParser {
    type Message = ParsedLine;
    type Error = ParseError;

    fn parse(&mut self, line: &str) -> Result<Option<ParsedLine>, ParseError> {
        parse_rtl_power_line(line, self.lnb_offset_hz)
    }
}

fn parse_field<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, ParseError> {
    value.parse::<T>().map_err(|_| ParseError::InvalidValue {
        field,
        value: value.to_string(),
    })
}

/// Number of bins a hop spans, `round_half_even((stop - start) / step)`.
///
/// Saturates instead of overflowing when corrupted bounds or step make the
/// count unrepresentable.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    reason = "float-to-int casts saturate, Hz values fit comfortably in f64"
)]
fn bin_count(start: i64, stop: i64, step: f64) -> usize {
    let width = stop as f64 - start as f64;
    (width / step).round_ties_even().max(0.0) as usize
}

/// Rebuild the first `len` points of a hop's evenly spaced axis.
///
/// The tool never prints the axis itself, so it is derived from the segment
/// bounds. Points are `start + i * width / count` for `i in 0..count`.
#[allow(
    clippy::cast_precision_loss,
    reason = "bin counts and Hz values fit comfortably in f64"
)]
fn frequency_axis(start: i64, stop: i64, count: usize, len: usize, lnb_offset_hz: f64) -> Vec<f64> {
    if count == 0 {
        return Vec::new();
    }

    let spacing = (stop as f64 - start as f64) / count as f64;
    let origin = start as f64 + lnb_offset_hz;
    (0..len.min(count)).map(|i| origin + i as f64 * spacing).collect()
}

/// Parse a single `rtl_power` output line.
fn parse_rtl_power_line(line: &str, lnb_offset_hz: f64) -> Result<Option<ParsedLine>, ParseError> {
    if line.trim().is_empty() {
        return Ok(None);
    }

    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() < FIRST_POWER_FIELD {
        return Err(ParseError::MissingField(match parts.len() {
            1 => "time",
            2 => "start frequency",
            3 => "stop frequency",
            4 => "step",
            _ => "samples",
        }));
    }

    let timestamp = parts[..2].join(" ");
    let segment_start: i64 = parse_field("start frequency", parts[2])?;
    let segment_stop: i64 = parse_field("stop frequency", parts[3])?;
    let step: f64 = parse_field("step", parts[4])?;
    let samples: f64 = parse_field("samples", parts[5])?;

    if !step.is_finite() || step <= 0.0 {
        return Err(ParseError::InvalidValue {
            field: "step",
            value: parts[4].to_string(),
        });
    }

    let mut powers = parts[FIRST_POWER_FIELD..]
        .iter()
        .map(|value| parse_field::<f64>("power", value))
        .collect::<Result<Vec<_>, _>>()?;

    // The axis never needs more points than there are power values
    let axis_len = bin_count(segment_start, segment_stop, step);
    let frequencies = frequency_axis(
        segment_start,
        segment_stop,
        axis_len,
        powers.len(),
        lnb_offset_hz,
    );

    let mut length_mismatch = None;
    if axis_len != powers.len() {
        let mismatch = LengthMismatch {
            axis_len,
            power_len: powers.len(),
        };
        if axis_len > powers.len() {
            warn!(
                "Hop {}-{} Hz at {}: axis has {} bins but {} power values, \
                 trimming axis (upgrade rtl_power)",
                segment_start, segment_stop, timestamp, mismatch.axis_len, mismatch.power_len
            );
        } else {
            warn!(
                "Hop {}-{} Hz at {}: axis has {} bins but {} power values, \
                 trimming powers (upgrade rtl_power)",
                segment_start, segment_stop, timestamp, mismatch.axis_len, mismatch.power_len
            );
            powers.truncate(axis_len);
        }
        length_mismatch = Some(mismatch);
    }

    Ok(Some(ParsedLine {
        timestamp,
        segment_start,
        segment_stop,
        step,
        samples,
        frequencies,
        powers,
        length_mismatch,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hop_line(start: i64, stop: i64, step: u32, powers: usize) -> String {
        let mut fields = vec![
            "2024-01-01".to_string(),
            "00:00:00".to_string(),
            start.to_string(),
            stop.to_string(),
            step.to_string(),
            "16".to_string(),
        ];
        fields.extend((0..powers).map(|i| format!("-{}.5", 40 + i % 7)));
        fields.join(", ")
    }

    #[test]
    fn test_parse_hop() {
        let mut parser = RtlPowerParser::new(0.0);
        let line = hop_line(100_000, 150_000, 1000, 50);
        let parsed = parser.parse(&line).unwrap().unwrap();

        assert_eq!(parsed.timestamp, "2024-01-01 00:00:00");
        assert_eq!(parsed.segment_start, 100_000);
        assert_eq!(parsed.segment_stop, 150_000);
        assert!((parsed.step - 1000.0).abs() < f64::EPSILON);
        assert!((parsed.samples - 16.0).abs() < f64::EPSILON);
        assert_eq!(parsed.frequencies.len(), 50);
        assert_eq!(parsed.powers.len(), 50);
        assert!((parsed.frequencies[0] - 100_000.0).abs() < 1e-6);
        assert!((parsed.frequencies[49] - 149_000.0).abs() < 1e-6);
        assert!((parsed.powers[0] - (-40.5)).abs() < 1e-9);
        assert!(parsed.length_mismatch.is_none());
    }

    #[test]
    fn test_axis_is_ascending_and_even() {
        let mut parser = RtlPowerParser::new(0.0);
        let parsed = parser
            .parse(&hop_line(24_000_000, 25_000_000, 4000, 250))
            .unwrap()
            .unwrap();

        for pair in parsed.frequencies.windows(2) {
            assert!((pair[1] - pair[0] - 4000.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_lnb_offset_shifts_axis() {
        let mut parser = RtlPowerParser::new(9_750_000_000.0);
        let parsed = parser
            .parse(&hop_line(100_000, 150_000, 1000, 50))
            .unwrap()
            .unwrap();

        assert!((parsed.frequencies[0] - 9_750_100_000.0).abs() < 1e-3);
        assert_eq!(parsed.segment_start, 100_000);
    }

    #[test]
    fn test_short_power_list_trims_axis() {
        let mut parser = RtlPowerParser::new(0.0);
        let parsed = parser
            .parse(&hop_line(100_000, 150_000, 1000, 48))
            .unwrap()
            .unwrap();

        assert_eq!(parsed.frequencies.len(), 48);
        assert_eq!(parsed.powers.len(), 48);
        assert_eq!(
            parsed.length_mismatch,
            Some(LengthMismatch {
                axis_len: 50,
                power_len: 48
            })
        );
    }

    #[test]
    fn test_long_power_list_trims_powers() {
        let mut parser = RtlPowerParser::new(0.0);
        let parsed = parser
            .parse(&hop_line(100_000, 150_000, 1000, 53))
            .unwrap()
            .unwrap();

        assert_eq!(parsed.frequencies.len(), 50);
        assert_eq!(parsed.powers.len(), 50);
        assert!((parsed.frequencies[49] - 149_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_lengths_always_match() {
        let mut parser = RtlPowerParser::new(0.0);
        for powers in [0, 1, 10, 49, 50, 51, 200] {
            let parsed = parser
                .parse(&hop_line(100_000, 150_000, 1000, powers))
                .unwrap()
                .unwrap();
            assert_eq!(parsed.frequencies.len(), parsed.powers.len());
        }
    }

    #[test]
    fn test_non_numeric_frequency() {
        let mut parser = RtlPowerParser::new(0.0);
        let result = parser.parse("2024-01-01, 00:00:00, 10O000, 150000, 1000, 16, -40.0");
        assert!(matches!(
            result,
            Err(ParseError::InvalidValue { field: "start frequency", value }) if value == "10O000"
        ));
    }

    #[test]
    fn test_corrupted_power_value() {
        let mut parser = RtlPowerParser::new(0.0);
        let result = parser.parse("2024-01-01, 00:00:00, 100000, 102000, 1000, 16, -40.0, -4");
        assert!(result.unwrap().is_some());

        let result = parser.parse("2024-01-01, 00:00:00, 100000, 102000, 1000, 16, -40.0, -4x");
        assert!(matches!(result, Err(ParseError::InvalidValue { field: "power", .. })));
    }

    #[test]
    fn test_truncated_line() {
        let mut parser = RtlPowerParser::new(0.0);
        let result = parser.parse("2024-01-01, 00:00:00, 100000");
        assert!(matches!(result, Err(ParseError::MissingField("stop frequency"))));
    }

    #[test]
    fn test_zero_step_rejected() {
        let mut parser = RtlPowerParser::new(0.0);
        let result = parser.parse("2024-01-01, 00:00:00, 100000, 150000, 0, 16, -40.0");
        assert!(matches!(result, Err(ParseError::InvalidValue { field: "step", .. })));
    }

    #[test]
    fn test_huge_bin_count_does_not_allocate_axis() {
        let mut parser = RtlPowerParser::new(0.0);
        let parsed = parser
            .parse("2024-01-01, 00:00:00, 0, 9000000000000000000, 0.5, 16, -40.0")
            .unwrap()
            .unwrap();

        assert_eq!(parsed.frequencies, vec![0.0]);
        assert_eq!(parsed.powers, vec![-40.0]);
        assert_eq!(parsed.length_mismatch.map(|m| m.power_len), Some(1));
        assert!(parsed.length_mismatch.unwrap().axis_len > 1_000_000_000);
    }

    #[test]
    fn test_extreme_bounds_do_not_overflow() {
        let mut parser = RtlPowerParser::new(0.0);
        let line = concat!(
            "2024-01-01, 00:00:00, -9223372036854775808, ",
            "9223372036854775807, 1e30, 16, -40.0"
        );
        let parsed = parser.parse(line).unwrap().unwrap();

        assert!(parsed.frequencies.is_empty());
        assert!(parsed.powers.is_empty());
        assert_eq!(
            parsed.length_mismatch,
            Some(LengthMismatch {
                axis_len: 0,
                power_len: 1
            })
        );
    }

    #[test]
    fn test_parse_empty_line() {
        let mut parser = RtlPowerParser::new(0.0);
        assert!(parser.parse("").unwrap().is_none());
        assert!(parser.parse("   \r").unwrap().is_none());
    }
}
