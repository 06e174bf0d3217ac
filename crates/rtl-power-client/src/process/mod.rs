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

//! Capture tool process lifecycle.
//!
//! Builds the `rtl_power` command line from sweep parameters, launches the
//! tool with its stdout wired for line reading, and terminates it on demand.

mod params;

pub use params::{ConfigError, Gain, SweepConfig, SweepParams, MAX_BIN_SIZE_KHZ};

use std::future::Future;
use std::io;
use std::process::{ExitStatus, Stdio};

use log::{info, warn};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};

/// Default capture tool executable.
pub const DEFAULT_EXECUTABLE: &str = "rtl_power";

/// Errors that prevent the capture tool from starting.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("no executable configured")]
    EmptyCommand,

    #[error("cannot tokenize {setting} setting: {value}")]
    InvalidArguments { setting: &'static str, value: String },

    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("capture tool stdout was not captured")]
    MissingStdout,
}

/// String-valued backend settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    /// Executable, optionally followed by leading arguments.
    pub executable: String,
    /// Extra arguments appended after the generated ones.
    pub params: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            executable: DEFAULT_EXECUTABLE.to_string(),
            params: String::new(),
        }
    }
}

fn split_setting(setting: &'static str, value: &str) -> Result<Vec<String>, LaunchError> {
    shlex::split(value).ok_or_else(|| LaunchError::InvalidArguments {
        setting,
        value: value.to_string(),
    })
}

/// Build the full command line (program first) for one acquisition run.
///
/// The sample-rate flag is never emitted; current `rtl_power` builds
/// reject it.
pub fn build_command_line(
    config: &SweepConfig,
    settings: &BackendSettings,
) -> Result<Vec<String>, LaunchError> {
    let mut cmdline = split_setting("executable", &settings.executable)?;
    if cmdline.is_empty() {
        return Err(LaunchError::EmptyCommand);
    }

    cmdline.extend([
        "-f".to_string(),
        format!(
            "{}M:{}M:{}k",
            config.tuned_start_mhz(),
            config.tuned_stop_mhz(),
            config.bin_size_khz()
        ),
        "-i".to_string(),
        config.interval_secs().to_string(),
        "-d".to_string(),
        config.device().to_string(),
        "-p".to_string(),
        config.ppm().to_string(),
        "-c".to_string(),
        config.crop().to_string(),
    ]);

    if let Gain::Manual(gain) = config.gain() {
        cmdline.extend(["-g".to_string(), gain.to_string()]);
    }
    if config.single_shot() {
        cmdline.push("-1".to_string());
    }

    cmdline.extend(split_setting("params", &settings.params)?);
    Ok(cmdline)
}

/// A source of text lines, one hop per line.
///
/// Returns `Ok(None)` once the stream is exhausted.
pub trait LineSource {
    fn next_line(&mut self) -> impl Future<Output = io::Result<Option<String>>> + Send;
}

impl<R> LineSource for Lines<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    fn next_line(&mut self) -> impl Future<Output = io::Result<Option<String>>> + Send {
        Lines::next_line(self)
    }
}

/// Handle to the capture tool subprocess.
///
/// Owns the child exclusively. The child is killed when the handle is
/// dropped.
#[derive(Debug, Default)]
pub struct PowerProcess {
    config: Option<SweepConfig>,
    child: Option<Child>,
    stdout: Option<Lines<BufReader<ChildStdout>>>,
}

impl PowerProcess {
    /// Create an idle handle with no sweep parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a handle ready to start with `config`.
    #[must_use]
    pub fn with_config(config: SweepConfig) -> Self {
        Self {
            config: Some(config),
            ..Self::default()
        }
    }

    /// Replace the sweep parameters used by the next [`start`](Self::start).
    pub fn setup(&mut self, config: SweepConfig) {
        self.config = Some(config);
    }

    /// Sweep parameters of this handle, if set.
    #[must_use]
    pub fn config(&self) -> Option<&SweepConfig> {
        self.config.as_ref()
    }

    /// Launch the capture tool.
    ///
    /// Does nothing if the tool is already running or no parameters are set.
    pub fn start(&mut self, settings: &BackendSettings) -> Result<(), LaunchError> {
        if self.child.is_some() {
            return Ok(());
        }
        let Some(config) = self.config.as_ref() else {
            return Ok(());
        };

        let cmdline = build_command_line(config, settings)?;
        info!("Starting backend: {}", cmdline.join(" "));

        let mut child = Command::new(&cmdline[0])
            .args(&cmdline[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                program: cmdline[0].clone(),
                source,
            })?;

        let Some(stdout) = child.stdout.take() else {
            if let Err(e) = child.start_kill() {
                warn!("Failed to kill backend: {}", e);
            }
            return Err(LaunchError::MissingStdout);
        };

        self.stdout = Some(BufReader::new(stdout).lines());
        self.child = Some(child);
        Ok(())
    }

    /// Terminate the capture tool. Safe to call when not running.
    pub async fn stop(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            info!("Stopping backend (pid {:?})", child.id());
            if let Err(e) = child.kill().await {
                warn!("Failed to kill backend: {}", e);
            }
        }
    }

    /// Whether the tool has been started and has not exited yet.
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Reap the tool after its output has closed.
    ///
    /// Returns `None` if the tool was not running or its status could not be
    /// collected.
    pub async fn wait(&mut self) -> Option<ExitStatus> {
        self.stdout = None;
        // The child stays in place until reaped so a dropped wait can still be stopped
        let result = self.child.as_mut()?.wait().await;
        self.child = None;
        match result {
            Ok(status) => {
                if status.success() {
                    info!("Backend exited: {}", status);
                } else {
                    warn!("Backend exited: {}", status);
                }
                Some(status)
            }
            Err(e) => {
                warn!("Failed to collect backend exit status: {}", e);
                None
            }
        }
    }
}

impl LineSource for PowerProcess {
    fn next_line(&mut self) -> impl Future<Output = io::Result<Option<String>>> + Send {
        async move {
            match self.stdout.as_mut() {
                Some(lines) => lines.next_line().await,
                None => Ok(None),
            }
        }
    }
}
