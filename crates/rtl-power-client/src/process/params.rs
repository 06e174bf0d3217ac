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

//! Sweep parameters and their validation.

use thiserror::Error;

/// Largest bin size (kHz) that `rtl_power` handles reliably.
pub const MAX_BIN_SIZE_KHZ: f64 = 2800.0;

/// Errors raised when sweep parameters are inconsistent.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("stop frequency {stop_mhz} MHz must be above start frequency {start_mhz} MHz")]
    InvalidRange { start_mhz: f64, stop_mhz: f64 },

    #[error("bin size must be positive, got {0} kHz")]
    NonPositiveBinSize(f64),

    #[error("scan interval must be positive, got {0} s")]
    InvalidInterval(f64),

    #[error("crop must be in [0, 1), got {0}")]
    InvalidCrop(f64),
}

/// Tuner gain setting.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Gain {
    /// Let the capture tool choose.
    #[default]
    Auto,
    /// Fixed gain in dB.
    Manual(f64),
}

impl Gain {
    /// Map the conventional "negative means auto" value to a gain setting.
    #[must_use]
    pub fn from_sentinel(value: f64) -> Self {
        if value >= 0.0 {
            Self::Manual(value)
        } else {
            Self::Auto
        }
    }
}

/// Raw, unvalidated sweep parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepParams {
    /// Start frequency in MHz.
    pub start_mhz: f64,
    /// Stop frequency in MHz.
    pub stop_mhz: f64,
    /// Bin size in kHz. Clamped to [`MAX_BIN_SIZE_KHZ`].
    pub bin_size_khz: f64,
    /// Integration interval in seconds.
    pub interval_secs: f64,
    /// Tuner gain.
    pub gain: Gain,
    /// Frequency correction in PPM.
    pub ppm: i32,
    /// Fraction of each hop's edges to discard.
    pub crop: f64,
    /// Stop the tool after a single sweep.
    pub single_shot: bool,
    /// Device index.
    pub device: u32,
    /// LNB local-oscillator offset in Hz.
    pub lnb_lo_hz: f64,
}

impl Default for SweepParams {
    fn default() -> Self {
        Self {
            start_mhz: 88.0,
            stop_mhz: 108.0,
            bin_size_khz: 10.0,
            interval_secs: 10.0,
            gain: Gain::Auto,
            ppm: 0,
            crop: 0.0,
            single_shot: false,
            device: 0,
            lnb_lo_hz: 0.0,
        }
    }
}

/// Validated, immutable parameters of one acquisition run.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    params: SweepParams,
}

impl SweepConfig {
    /// Validate `params`, clamping the bin size to [`MAX_BIN_SIZE_KHZ`].
    pub fn new(mut params: SweepParams) -> Result<Self, ConfigError> {
        if params.stop_mhz.is_nan()
            || params.start_mhz.is_nan()
            || params.stop_mhz <= params.start_mhz
        {
            return Err(ConfigError::InvalidRange {
                start_mhz: params.start_mhz,
                stop_mhz: params.stop_mhz,
            });
        }
        if params.bin_size_khz.is_nan() || params.bin_size_khz <= 0.0 {
            return Err(ConfigError::NonPositiveBinSize(params.bin_size_khz));
        }
        if params.interval_secs.is_nan() || params.interval_secs <= 0.0 {
            return Err(ConfigError::InvalidInterval(params.interval_secs));
        }
        if !(0.0..1.0).contains(&params.crop) {
            return Err(ConfigError::InvalidCrop(params.crop));
        }

        params.bin_size_khz = params.bin_size_khz.min(MAX_BIN_SIZE_KHZ);
        // Negative or NaN manual gain means auto
        if let Gain::Manual(gain) = params.gain {
            params.gain = Gain::from_sentinel(gain);
        }
        Ok(Self { params })
    }

    #[must_use]
    pub fn start_mhz(&self) -> f64 {
        self.params.start_mhz
    }

    #[must_use]
    pub fn stop_mhz(&self) -> f64 {
        self.params.stop_mhz
    }

    #[must_use]
    pub fn bin_size_khz(&self) -> f64 {
        self.params.bin_size_khz
    }

    #[must_use]
    pub fn interval_secs(&self) -> f64 {
        self.params.interval_secs
    }

    #[must_use]
    pub fn gain(&self) -> Gain {
        self.params.gain
    }

    #[must_use]
    pub fn ppm(&self) -> i32 {
        self.params.ppm
    }

    #[must_use]
    pub fn crop(&self) -> f64 {
        self.params.crop
    }

    #[must_use]
    pub fn single_shot(&self) -> bool {
        self.params.single_shot
    }

    #[must_use]
    pub fn device(&self) -> u32 {
        self.params.device
    }

    #[must_use]
    pub fn lnb_lo_hz(&self) -> f64 {
        self.params.lnb_lo_hz
    }

    /// Start frequency handed to the tool (MHz), compensated for the LNB.
    #[must_use]
    pub fn tuned_start_mhz(&self) -> f64 {
        self.params.start_mhz - self.params.lnb_lo_hz / 1e6
    }

    /// Stop frequency handed to the tool (MHz), compensated for the LNB.
    #[must_use]
    pub fn tuned_stop_mhz(&self) -> f64 {
        self.params.stop_mhz - self.params.lnb_lo_hz / 1e6
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_size_clamped() {
        let config = SweepConfig::new(SweepParams {
            bin_size_khz: 5000.0,
            ..Default::default()
        })
        .unwrap();
        assert!((config.bin_size_khz() - MAX_BIN_SIZE_KHZ).abs() < f64::EPSILON);
    }

    #[test]
    fn test_inverted_range_rejected() {
        let result = SweepConfig::new(SweepParams {
            start_mhz: 108.0,
            stop_mhz: 88.0,
            ..Default::default()
        });
        assert!(matches!(result, Err(ConfigError::InvalidRange { .. })));

        let result = SweepConfig::new(SweepParams {
            start_mhz: 100.0,
            stop_mhz: 100.0,
            ..Default::default()
        });
        assert!(matches!(result, Err(ConfigError::InvalidRange { .. })));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bin = SweepConfig::new(SweepParams {
            bin_size_khz: 0.0,
            ..Default::default()
        });
        assert_eq!(bin, Err(ConfigError::NonPositiveBinSize(0.0)));

        let interval = SweepConfig::new(SweepParams {
            interval_secs: -1.0,
            ..Default::default()
        });
        assert_eq!(interval, Err(ConfigError::InvalidInterval(-1.0)));

        let crop = SweepConfig::new(SweepParams {
            crop: 1.0,
            ..Default::default()
        });
        assert_eq!(crop, Err(ConfigError::InvalidCrop(1.0)));
    }

    #[test]
    fn test_gain_sentinel() {
        assert_eq!(Gain::from_sentinel(-1.0), Gain::Auto);
        assert_eq!(Gain::from_sentinel(0.0), Gain::Manual(0.0));
        assert_eq!(Gain::from_sentinel(49.6), Gain::Manual(49.6));
        assert_eq!(Gain::from_sentinel(f64::NAN), Gain::Auto);
    }

    #[test]
    fn test_invalid_manual_gain_becomes_auto() {
        for gain in [-5.0, f64::NAN] {
            let config = SweepConfig::new(SweepParams {
                gain: Gain::Manual(gain),
                ..Default::default()
            })
            .unwrap();
            assert_eq!(config.gain(), Gain::Auto);
        }
        let config = SweepConfig::new(SweepParams {
            gain: Gain::Manual(0.0),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(config.gain(), Gain::Manual(0.0));
    }

    #[test]
    fn test_tuned_range_removes_lnb() {
        let config = SweepConfig::new(SweepParams {
            start_mhz: 10_700.0,
            stop_mhz: 11_700.0,
            lnb_lo_hz: 9_750_000_000.0,
            ..Default::default()
        })
        .unwrap();
        assert!((config.tuned_start_mhz() - 950.0).abs() < 1e-9);
        assert!((config.tuned_stop_mhz() - 1950.0).abs() < 1e-9);
    }
}
