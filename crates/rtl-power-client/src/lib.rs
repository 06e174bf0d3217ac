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

//! Spectrum sweep acquisition via `rtl_power`.
//!
//! This library drives `rtl_power` as a subprocess and turns its streamed CSV
//! output into complete, frequency-ordered sweeps. It is split into layers
//! that can be used independently or composed together:
//!
//! - **Protocol layer**: Line parsing (`rtl_power` CSV)
//! - **Sweep layer**: Multi-hop stitching and completion detection
//! - **Process layer**: Command-line construction and subprocess lifecycle
//! - **Acquisition layer**: The read-parse-publish loop and its task handle
//!
//! # Quick Start
//!
//! Use the [`Acquisition`] type for full-stack operation:
//!
//! ```no_run
//! use rtl_power_client::{Acquisition, BackendSettings, SweepConfig, SweepParams};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SweepConfig::new(SweepParams {
//!         start_mhz: 88.0,
//!         stop_mhz: 108.0,
//!         bin_size_khz: 10.0,
//!         ..Default::default()
//!     })?;
//!
//!     let (_acquisition, mut sweeps) =
//!         Acquisition::channel(config, &BackendSettings::default(), 16)?;
//!
//!     while let Some(sweep) = sweeps.recv().await {
//!         println!("{}: {} bins", sweep.timestamp, sweep.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Using Individual Layers
//!
//! ## Protocol Layer Only
//!
//! ```
//! use rtl_power_client::protocol::{Protocol, RtlPowerParser};
//!
//! let mut parser = RtlPowerParser::new(0.0);
//! let line = "2024-01-01, 12:00:00, 100000000, 100002000, 1000, 8, -40.1, -41.7";
//! if let Ok(Some(hop)) = parser.parse(line) {
//!     println!("{} bins at {}", hop.powers.len(), hop.timestamp);
//! }
//! ```
//!
//! ## Sweep Layer Only
//!
//! ```
//! use rtl_power_client::protocol::{Protocol, RtlPowerParser};
//! use rtl_power_client::{SweepAccumulator, SweepConfig, SweepParams};
//!
//! let config = SweepConfig::new(SweepParams {
//!     start_mhz: 100.0,
//!     stop_mhz: 100.002,
//!     ..Default::default()
//! })
//! .unwrap();
//! let mut accumulator = SweepAccumulator::new(&config);
//! let mut parser = RtlPowerParser::new(0.0);
//!
//! let line = "2024-01-01, 12:00:00, 100000000, 100002000, 1000, 8, -40.1, -41.7";
//! let hop = parser.parse(line).unwrap().unwrap();
//! if accumulator.ingest(hop).completed {
//!     println!("Sweep ready: {:?}", accumulator.buffer());
//! }
//! ```

pub mod acquisition;
pub mod process;
pub mod protocol;
pub mod sweep;

pub use acquisition::{run_acquisition, Acquisition, AcquisitionSummary, ExitReason, SweepSink};
pub use process::{
    build_command_line, BackendSettings, ConfigError, Gain, LaunchError, LineSource, PowerProcess,
    SweepConfig, SweepParams, DEFAULT_EXECUTABLE, MAX_BIN_SIZE_KHZ,
};
pub use protocol::{LengthMismatch, ParseError, ParsedLine, Protocol, RtlPowerParser};
pub use sweep::{CompletionPolicy, Ingest, SweepAccumulator, SweepBuffer};
