// src/runner/test_runner.rs

//! Drives one test from validated options to final results.

use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{Result, SpeedwatchError};
use crate::exec::SupervisedProcess;
use crate::progress::ProgressBroadcaster;
use crate::runner::backend::{plan, select_backend, targets, Invocation, RunnerSettings};
use crate::runner::parse::Measurement;
use crate::runner::slot::ExecutionSlot;
use crate::runner::tracker::ProgressTracker;
use crate::types::{BackendKind, TestOptions, TestResult};

/// Runs measurement tools and reports progress to a broadcaster.
///
/// At most one test runs at a time: the runner owns the execution slot, and
/// a second caller gets [`SpeedwatchError::AlreadyRunning`] instead of
/// queueing.
#[derive(Debug)]
pub struct TestRunner {
    settings: RunnerSettings,
    slot: ExecutionSlot,
    broadcaster: ProgressBroadcaster,
}

impl TestRunner {
    pub fn new(settings: RunnerSettings, broadcaster: ProgressBroadcaster) -> Self {
        Self {
            settings,
            slot: ExecutionSlot::new(),
            broadcaster,
        }
    }

    pub fn is_running(&self) -> bool {
        self.slot.is_busy()
    }

    /// Run a complete test.
    ///
    /// Returns one result per tested server. Options are validated before
    /// the slot is taken or anything is spawned. On cancellation the
    /// running process group is killed and [`SpeedwatchError::Cancelled`]
    /// is returned.
    pub async fn run_test(
        &self,
        options: &TestOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<TestResult>> {
        let backend = select_backend(options)?;
        let _guard = self.slot.try_acquire()?;

        info!(
            %backend,
            scheduled = options.is_scheduled,
            servers = ?options.server_ids,
            "starting test"
        );

        let mut tracker =
            ProgressTracker::new(backend, options.is_scheduled, self.settings.progress_interval);

        match self.run_backend(backend, options, &mut tracker, cancel).await {
            Ok(results) => {
                let last = results.last();
                let speed = last
                    .and_then(|r| r.upload_mbps.or(r.download_mbps))
                    .unwrap_or(0.0);
                let latency = last.and_then(|r| r.latency_ms);
                let loss = last.and_then(|r| r.packet_loss_percent);
                self.broadcaster.publish(tracker.complete(speed, latency, loss));
                info!(%backend, results = results.len(), "test complete");
                Ok(results)
            }
            Err(err) => {
                self.broadcaster.clear();
                if err.is_cancelled() {
                    info!(%backend, "test cancelled");
                } else {
                    warn!(%backend, error = %err, "test failed");
                }
                Err(err)
            }
        }
    }

    async fn run_backend(
        &self,
        backend: BackendKind,
        options: &TestOptions,
        tracker: &mut ProgressTracker,
        cancel: &CancellationToken,
    ) -> Result<Vec<TestResult>> {
        let mut results = Vec::new();

        for target in targets(backend, options) {
            let label = target.clone().unwrap_or_else(|| "auto".to_string());
            self.broadcaster.publish(tracker.begin_server(label.clone()));

            let mut measurement = Measurement::default();
            for invocation in plan(backend, options, target.as_deref(), &self.settings)? {
                if cancel.is_cancelled() {
                    return Err(SpeedwatchError::Cancelled);
                }
                let m = self.run_invocation(invocation, tracker, cancel).await?;
                measurement.merge(m);
            }

            results.push(build_result(backend, options, target, &label, measurement));
        }

        Ok(results)
    }

    async fn run_invocation(
        &self,
        invocation: Invocation,
        tracker: &mut ProgressTracker,
        cancel: &CancellationToken,
    ) -> Result<Measurement> {
        let Invocation {
            phase,
            spec,
            mut parser,
        } = invocation;

        if let Some(p) = phase.and_then(|phase| tracker.enter(phase)) {
            self.broadcaster.publish(p);
        }

        let mut process = SupervisedProcess::spawn(&spec)?;
        let broadcaster = &self.broadcaster;
        let program = spec.program.as_str();
        let mut usable_lines = 0usize;

        let status = process
            .run(self.settings.process_timeout, cancel, |line| {
                match parser.parse_line(line) {
                    Ok(samples) => {
                        usable_lines += 1;
                        let now = Instant::now();
                        for sample in &samples {
                            if let Some(progress) = tracker.observe(sample, now) {
                                broadcaster.publish(progress);
                            }
                        }
                    }
                    Err(reason) => {
                        debug!(program, %reason, "skipping unparsable output line");
                    }
                }
            })
            .await?;

        let measurement = parser.finish();

        if !status.success() {
            return Err(SpeedwatchError::ProcessFailed {
                program: spec.program.clone(),
                code: status.code(),
            });
        }

        measurement.ok_or_else(|| {
            debug!(program, usable_lines, "process produced no measurement");
            SpeedwatchError::EmptyOutput(spec.program.clone())
        })
    }
}

fn build_result(
    backend: BackendKind,
    options: &TestOptions,
    target: Option<String>,
    label: &str,
    m: Measurement,
) -> TestResult {
    let keep = |enabled: bool, v: Option<f64>| if enabled { v } else { None };

    TestResult {
        backend,
        server_id: target.or(m.server_id),
        server_name: m.server_name.unwrap_or_else(|| label.to_string()),
        download_mbps: keep(options.enable_download, m.download_mbps),
        upload_mbps: keep(options.enable_upload, m.upload_mbps),
        latency_ms: m.latency_ms,
        jitter_ms: keep(options.enable_jitter, m.jitter_ms),
        packet_loss_percent: keep(
            options.enable_packet_loss || backend == BackendKind::Ping,
            m.packet_loss_percent,
        ),
        result_url: m.result_url,
        is_scheduled: options.is_scheduled,
        created_at: Utc::now(),
    }
}
