// src/engine/service.rs

//! Engine facade used by the CLI and, in a larger deployment, an API layer.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::errors::Result;
use crate::progress::{ProgressBroadcaster, ProgressSubscription};
use crate::runner::{RunnerSettings, TestRunner};
use crate::store::Store;
use crate::types::{Progress, TestOptions, TestResult};

/// How the scheduler triggers a test.
///
/// Production code uses [`SpeedTestService`]; tests can provide their own
/// implementation that doesn't spawn real processes.
pub trait TestExecutor: Send + Sync {
    fn execute(
        &self,
        options: TestOptions,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<TestResult>>> + Send + '_>>;
}

/// Runner, store and broadcaster wired together at construction.
pub struct SpeedTestService {
    runner: TestRunner,
    store: Arc<dyn Store>,
    broadcaster: ProgressBroadcaster,
}

impl std::fmt::Debug for SpeedTestService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeedTestService")
            .field("runner", &self.runner)
            .finish_non_exhaustive()
    }
}

impl SpeedTestService {
    pub fn new(settings: RunnerSettings, store: Arc<dyn Store>) -> Self {
        let broadcaster = ProgressBroadcaster::new();
        Self {
            runner: TestRunner::new(settings, broadcaster.clone()),
            store,
            broadcaster,
        }
    }

    /// Run a test that can only end by finishing, failing or timing out.
    pub async fn run_test(&self, options: TestOptions) -> Result<Vec<TestResult>> {
        self.run_test_with_cancel(options, CancellationToken::new()).await
    }

    /// Run a test and persist its results.
    ///
    /// Results are written only after every server finished; a failed or
    /// cancelled run persists nothing.
    pub async fn run_test_with_cancel(
        &self,
        options: TestOptions,
        cancel: CancellationToken,
    ) -> Result<Vec<TestResult>> {
        let results = self.runner.run_test(&options, &cancel).await?;

        for result in &results {
            if let Err(err) = self.store.save_result(result.clone()).await {
                error!(error = %err, server = %result.server_name, "failed to persist test result");
                return Err(err);
            }
        }
        debug!(count = results.len(), "results persisted");

        Ok(results)
    }

    /// Latest snapshot of the in-flight test, if any.
    pub fn get_status(&self) -> Option<Progress> {
        self.broadcaster.latest()
    }

    pub fn subscribe(&self) -> ProgressSubscription {
        self.broadcaster.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.runner.is_running()
    }
}

impl TestExecutor for SpeedTestService {
    fn execute(
        &self,
        options: TestOptions,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<TestResult>>> + Send + '_>> {
        Box::pin(self.run_test_with_cancel(options, cancel))
    }
}
