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

//! Acquisition loop.
//!
//! Reads capture tool output one line at a time, parses each hop, stitches
//! hops into sweeps and publishes completed sweeps to a sink. Runs on its
//! own task and stops on cancellation or when the output stream closes.

use std::process::ExitStatus;

use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::process::{BackendSettings, LaunchError, LineSource, PowerProcess, SweepConfig};
use crate::protocol::{ParsedLine, Protocol, RtlPowerParser};
use crate::sweep::{CompletionPolicy, SweepAccumulator, SweepBuffer};

/// Receiver of completed sweeps.
///
/// Each call hands over an owned copy; the acquisition keeps nothing that
/// the sink can observe. A sink may see several sweeps with the same
/// timestamp under [`CompletionPolicy::EveryMatch`].
pub trait SweepSink {
    fn update(&mut self, sweep: SweepBuffer);
}

impl SweepSink for Vec<SweepBuffer> {
    fn update(&mut self, sweep: SweepBuffer) {
        self.push(sweep);
    }
}

impl SweepSink for mpsc::Sender<SweepBuffer> {
    fn update(&mut self, sweep: SweepBuffer) {
        // Never block the reader on a slow consumer
        if let Err(e) = self.try_send(sweep) {
            debug!("Dropping sweep: {}", e);
        }
    }
}

impl<K: SweepSink + ?Sized> SweepSink for &mut K {
    fn update(&mut self, sweep: SweepBuffer) {
        (**self).update(sweep);
    }
}

/// Why an acquisition ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// Stopped on request.
    Cancelled,
    /// The capture tool closed its output, with its exit status if known.
    StreamClosed(Option<ExitStatus>),
    /// Reading the output failed.
    ReadError(String),
}

/// Counters for one acquisition run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionSummary {
    /// Lines received from the source, including dropped ones.
    pub lines_read: u64,
    /// Lines discarded because they failed to parse.
    pub lines_dropped: u64,
    /// Sweeps handed to the sink.
    pub sweeps_published: u64,
    /// How the run ended.
    pub exit: ExitReason,
}

/// Run the read-parse-accumulate-publish cycle until cancelled or the
/// source is exhausted.
///
/// Parse errors only drop the offending line. Cancellation is checked before
/// every read and also interrupts a pending read.
pub async fn run_acquisition<S, P, K>(
    source: &mut S,
    parser: &mut P,
    accumulator: &mut SweepAccumulator,
    sink: &mut K,
    cancel_token: &CancellationToken,
) -> AcquisitionSummary
where
    S: LineSource,
    P: Protocol<Message = ParsedLine>,
    P::Error: std::fmt::Display,
    K: SweepSink,
{
    let mut lines_read = 0;
    let mut lines_dropped = 0;
    let mut sweeps_published = 0;

    let exit = loop {
        if cancel_token.is_cancelled() {
            break ExitReason::Cancelled;
        }

        let line = tokio::select! {
            biased;

            () = cancel_token.cancelled() => break ExitReason::Cancelled,

            line_result = source.next_line() => match line_result {
                Ok(Some(line)) => line,
                Ok(None) => {
                    info!("Backend output closed");
                    break ExitReason::StreamClosed(None);
                }
                Err(e) => {
                    error!("Failed to read backend output: {}", e);
                    break ExitReason::ReadError(e.to_string());
                }
            },
        };
        lines_read += 1;

        let parsed = match parser.parse(&line) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => continue,
            Err(e) => {
                lines_dropped += 1;
                warn!("Dropping malformed line ({}): {:?}", e, line);
                continue;
            }
        };

        if accumulator.ingest(parsed).completed {
            if let Some(sweep) = accumulator.snapshot() {
                debug!("Sweep {} complete: {} bins", sweep.timestamp, sweep.len());
                sink.update(sweep);
                sweeps_published += 1;
            }
        }
    };

    AcquisitionSummary {
        lines_read,
        lines_dropped,
        sweeps_published,
        exit,
    }
}

/// Handle to a running acquisition.
///
/// The capture tool and the loop run in a background task. Dropping the
/// handle stops both.
pub struct Acquisition {
    cancel_token: CancellationToken,
    task: Option<JoinHandle<AcquisitionSummary>>,
}

impl std::fmt::Debug for Acquisition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Acquisition")
            .field("cancel_token", &self.cancel_token)
            .finish_non_exhaustive()
    }
}

impl Acquisition {
    /// Launch the capture tool and start publishing sweeps to `sink`.
    ///
    /// Must be called from within a tokio runtime. Launch failures are
    /// returned here; everything after launch ends up in the summary.
    pub fn spawn<K>(
        config: SweepConfig,
        settings: &BackendSettings,
        sink: K,
    ) -> Result<Self, LaunchError>
    where
        K: SweepSink + Send + 'static,
    {
        Self::spawn_with_policy(config, settings, CompletionPolicy::default(), sink)
    }

    /// Like [`spawn`](Self::spawn) with an explicit completion policy.
    pub fn spawn_with_policy<K>(
        config: SweepConfig,
        settings: &BackendSettings,
        policy: CompletionPolicy,
        mut sink: K,
    ) -> Result<Self, LaunchError>
    where
        K: SweepSink + Send + 'static,
    {
        let mut parser = RtlPowerParser::new(config.lnb_lo_hz());
        let mut accumulator = SweepAccumulator::with_policy(&config, policy);

        let mut process = PowerProcess::with_config(config);
        process.start(settings)?;

        let cancel_token = CancellationToken::new();
        let task_cancel = cancel_token.clone();

        let task = tokio::spawn(async move {
            let mut summary = run_acquisition(
                &mut process,
                &mut parser,
                &mut accumulator,
                &mut sink,
                &task_cancel,
            )
            .await;

            match summary.exit {
                ExitReason::StreamClosed(_) => {
                    // The tool may close stdout and keep running
                    tokio::select! {
                        biased;

                        () = task_cancel.cancelled() => {
                            info!("Backend still running after closing its output");
                            process.stop().await;
                            summary.exit = ExitReason::Cancelled;
                        }

                        status = process.wait() => {
                            summary.exit = ExitReason::StreamClosed(status);
                        }
                    }
                }
                ExitReason::Cancelled | ExitReason::ReadError(_) => process.stop().await,
            }

            info!(
                "Acquisition finished: {} lines, {} dropped, {} sweeps ({:?})",
                summary.lines_read, summary.lines_dropped, summary.sweeps_published, summary.exit
            );
            summary
        });

        Ok(Self {
            cancel_token,
            task: Some(task),
        })
    }

    /// Launch with a bounded channel sink and return its receiver.
    ///
    /// Sweeps are dropped while the channel is full.
    pub fn channel(
        config: SweepConfig,
        settings: &BackendSettings,
        capacity: usize,
    ) -> Result<(Self, mpsc::Receiver<SweepBuffer>), LaunchError> {
        let (tx, rx) = mpsc::channel(capacity);
        let acquisition = Self::spawn(config, settings, tx)?;
        Ok((acquisition, rx))
    }

    /// Stop the acquisition and kill the capture tool.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }

    /// Whether the background task has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the acquisition to end.
    ///
    /// Returns `None` if it was already waited on or the task panicked.
    pub async fn wait(&mut self) -> Option<AcquisitionSummary> {
        let task = self.task.take()?;
        match task.await {
            Ok(summary) => Some(summary),
            Err(e) => {
                error!("Acquisition task failed: {}", e);
                None
            }
        }
    }
}

impl Drop for Acquisition {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
