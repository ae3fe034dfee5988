// src/engine/scheduler.rs

//! Recurring due-check loop around the pure decisions in [`super::core`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::clock::Clock;
use crate::engine::core::{due_schedules, reschedule};
use crate::engine::service::TestExecutor;
use crate::errors::{Result, SpeedwatchError};
use crate::store::Store;
use crate::types::Schedule;

/// Grace period for a timed-out run to wind down after cancellation.
const CANCEL_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Gap between due-checks.
    pub tick_interval: Duration,
    /// Hard limit for one scheduled run.
    pub run_timeout: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            run_timeout: Duration::from_secs(5 * 60),
        }
    }
}

struct SchedulerInner {
    store: Arc<dyn Store>,
    executor: Arc<dyn TestExecutor>,
    clock: Arc<dyn Clock>,
    options: SchedulerOptions,
}

#[derive(Debug)]
struct LoopHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

/// Fires saved schedules when they are due.
///
/// States: stopped -> running -> stopped. `start` while running is a
/// no-op; `stop` while stopped is a no-op. Each due schedule runs in its
/// own task; failures leave the schedule due so it is retried on the next
/// tick.
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
    state: Mutex<Option<LoopHandle>>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("options", &self.inner.options)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn Store>,
        executor: Arc<dyn TestExecutor>,
        clock: Arc<dyn Clock>,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                store,
                executor,
                clock,
                options,
            }),
            state: Mutex::new(None),
        }
    }

    /// Start the tick loop under `parent`.
    ///
    /// Runs a due-check immediately and then every `tick_interval` until
    /// `parent` is cancelled or [`stop`](Self::stop) is called. Returns
    /// `false` if the loop was already running.
    pub fn start(&self, parent: &CancellationToken) -> bool {
        let mut state = self.lock_state();

        if let Some(handle) = state.as_ref() {
            if !handle.join.is_finished() && !handle.token.is_cancelled() {
                debug!("scheduler already running; start ignored");
                return false;
            }
        }

        let token = parent.child_token();
        let join = tokio::spawn(run_loop(Arc::clone(&self.inner), token.clone()));
        *state = Some(LoopHandle { token, join });

        info!(
            tick = ?self.inner.options.tick_interval,
            run_timeout = ?self.inner.options.run_timeout,
            "scheduler started"
        );
        true
    }

    /// Signal the loop (and any in-flight scheduled runs) to stop.
    ///
    /// Does not wait; callable from any thread; a second call does nothing.
    pub fn stop(&self) {
        let handle = self.lock_state().take();
        match handle {
            Some(handle) => {
                handle.token.cancel();
                info!("scheduler stop requested");
            }
            None => debug!("scheduler not running; stop ignored"),
        }
    }

    /// Stop and wait for the loop task to exit.
    pub async fn shutdown(&self) {
        let handle = self.lock_state().take();
        if let Some(handle) = handle {
            handle.token.cancel();
            if let Err(e) = handle.join.await {
                warn!(error = %e, "scheduler loop ended abnormally");
            }
            info!("scheduler shut down");
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_state()
            .as_ref()
            .map(|h| !h.join.is_finished() && !h.token.is_cancelled())
            .unwrap_or(false)
    }

    /// Run one due-check now.
    ///
    /// Returns the handles of the runs it spawned. Runs are tied to the
    /// loop's cancellation when the loop is running.
    pub async fn check_due(&self) -> Result<Vec<JoinHandle<()>>> {
        let token = self
            .lock_state()
            .as_ref()
            .map(|h| h.token.clone())
            .unwrap_or_default();
        self.inner.check_due(&token).await
    }

    fn lock_state(&self) -> MutexGuard<'_, Option<LoopHandle>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn run_loop(inner: Arc<SchedulerInner>, token: CancellationToken) {
    let mut ticker = tokio::time::interval(inner.options.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            // The first tick completes immediately.
            _ = ticker.tick() => {
                if let Err(err) = inner.check_due(&token).await {
                    error!(error = %err, "due-check failed");
                }
            }
        }
    }

    info!("scheduler loop exited");
}

impl SchedulerInner {
    async fn check_due(self: &Arc<Self>, token: &CancellationToken) -> Result<Vec<JoinHandle<()>>> {
        let schedules = self.store.get_schedules().await?;
        let now = self.clock.now();
        let due = due_schedules(&schedules, now);

        debug!(total = schedules.len(), due = due.len(), "due-check");

        let handles = due
            .into_iter()
            .map(|schedule| {
                let inner = Arc::clone(self);
                let run_token = token.child_token();
                tokio::spawn(async move { inner.run_scheduled(schedule, run_token).await })
            })
            .collect();

        Ok(handles)
    }

    async fn run_scheduled(&self, schedule: Schedule, token: CancellationToken) {
        info!(schedule = %schedule.id, interval = %schedule.interval, "running scheduled test");

        let options = schedule.run_options();
        let timeout = self.options.run_timeout;

        let run = self.executor.execute(options, token.clone());
        tokio::pin!(run);

        let outcome = tokio::select! {
            res = &mut run => res,
            _ = tokio::time::sleep(timeout) => {
                warn!(schedule = %schedule.id, ?timeout, "scheduled test timed out; cancelling");
                token.cancel();
                if tokio::time::timeout(CANCEL_GRACE, &mut run).await.is_err() {
                    warn!(schedule = %schedule.id, "scheduled test ignored cancellation; abandoning it");
                }
                Err(SpeedwatchError::Timeout {
                    program: format!("schedule {}", schedule.id),
                    after: timeout,
                })
            }
        };

        match outcome {
            Ok(results) => {
                debug!(schedule = %schedule.id, results = results.len(), "scheduled test succeeded");
                self.advance(&schedule).await;
            }
            Err(err) if err.is_cancelled() => {
                info!(schedule = %schedule.id, "scheduled test cancelled");
            }
            Err(err) => {
                // next_run stays in the past: retried on the next tick.
                error!(
                    schedule = %schedule.id,
                    error = %err,
                    "scheduled test failed; schedule not advanced"
                );
            }
        }
    }

    async fn advance(&self, schedule: &Schedule) {
        let now = self.clock.now();
        let updated = match reschedule(schedule, now) {
            Ok(updated) => updated,
            Err(err) => {
                error!(
                    schedule = %schedule.id,
                    error = %err,
                    "cannot reschedule; fix the stored interval"
                );
                return;
            }
        };

        let next_run = updated.next_run;
        match self.store.update_schedule(updated).await {
            Ok(()) => info!(schedule = %schedule.id, %next_run, "schedule advanced"),
            Err(err) => error!(
                schedule = %schedule.id,
                error = %err,
                "failed to persist rescheduled run"
            ),
        }
    }
}
