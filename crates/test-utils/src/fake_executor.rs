use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use speedwatch::engine::TestExecutor;
use speedwatch::errors::{Result, SpeedwatchError};
use speedwatch::types::{BackendKind, TestOptions, TestResult};

/// What a fake run does.
#[derive(Debug, Clone)]
pub enum FakeOutcome {
    /// One successful result per run.
    Succeed,
    /// Return a process failure.
    Fail,
    /// Panic inside the run task.
    Panic,
    /// Wait this long (or until cancelled), then succeed.
    Hang(Duration),
}

/// A fake executor that:
/// - records the options of every run
/// - resolves each run according to an outcome keyed by the first server id
///   (falling back to a default outcome).
#[derive(Clone)]
pub struct FakeExecutor {
    default: FakeOutcome,
    by_server: Arc<Mutex<HashMap<String, FakeOutcome>>>,
    calls: Arc<Mutex<Vec<TestOptions>>>,
}

impl FakeExecutor {
    pub fn new(default: FakeOutcome) -> Self {
        Self {
            default,
            by_server: Arc::default(),
            calls: Arc::default(),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(FakeOutcome::Succeed)
    }

    pub fn with_server_outcome(self, server: &str, outcome: FakeOutcome) -> Self {
        self.by_server
            .lock()
            .unwrap()
            .insert(server.to_string(), outcome);
        self
    }

    pub fn calls(&self) -> Vec<TestOptions> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn outcome_for(&self, options: &TestOptions) -> FakeOutcome {
        options
            .server_ids
            .iter()
            .next()
            .and_then(|s| self.by_server.lock().unwrap().get(s).cloned())
            .unwrap_or_else(|| self.default.clone())
    }
}

fn result_for(options: &TestOptions) -> TestResult {
    let server = options.server_ids.first().cloned();
    TestResult {
        backend: BackendKind::Speedtest,
        server_name: server.clone().unwrap_or_else(|| "auto".to_string()),
        server_id: server,
        download_mbps: Some(100.0),
        upload_mbps: Some(20.0),
        latency_ms: Some(10.0),
        jitter_ms: Some(1.0),
        packet_loss_percent: None,
        result_url: None,
        is_scheduled: options.is_scheduled,
        created_at: Utc::now(),
    }
}

impl TestExecutor for FakeExecutor {
    fn execute(
        &self,
        options: TestOptions,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<TestResult>>> + Send + '_>> {
        self.calls.lock().unwrap().push(options.clone());
        let outcome = self.outcome_for(&options);

        Box::pin(async move {
            match outcome {
                FakeOutcome::Succeed => Ok(vec![result_for(&options)]),
                FakeOutcome::Fail => Err(SpeedwatchError::ProcessFailed {
                    program: "fake".to_string(),
                    code: Some(1),
                }),
                FakeOutcome::Panic => panic!("fake executor asked to panic"),
                FakeOutcome::Hang(d) => {
                    tokio::select! {
                        _ = cancel.cancelled() => Err(SpeedwatchError::Cancelled),
                        _ = tokio::time::sleep(d) => Ok(vec![result_for(&options)]),
                    }
                }
            }
        })
    }
}
