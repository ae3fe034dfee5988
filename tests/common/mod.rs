#![allow(dead_code)]

use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use speedwatch::engine::SpeedTestService;
use speedwatch::runner::RunnerSettings;
use speedwatch::store::MemoryStore;
use speedwatch_test_utils::FakeBin;

pub use speedwatch_test_utils::{init_tracing, t0, with_timeout};

pub type TestReturn = Result<(), Box<dyn Error>>;

/// Runner settings pointing every tool at scripts in `bin`.
pub fn fake_settings(bin: &FakeBin) -> RunnerSettings {
    let path = |name: &str| bin.path().join(name).to_string_lossy().into_owned();
    RunnerSettings {
        speedtest_bin: path("speedtest"),
        librespeed_bin: path("librespeed-cli"),
        iperf3_bin: path("iperf3"),
        ping_bin: path("ping"),
        iperf_duration: Duration::from_secs(1),
        ping_count: 4,
        process_timeout: Duration::from_secs(10),
        progress_interval: Duration::ZERO,
    }
}

pub fn service(bin: &FakeBin) -> (Arc<SpeedTestService>, MemoryStore) {
    let store = MemoryStore::new();
    let service = SpeedTestService::new(fake_settings(bin), Arc::new(store.clone()));
    (Arc::new(service), store)
}

/// Shell snippet that appends to `file` until killed. Run from a fake tool
/// to leave a background process in its group.
pub fn heartbeat(file: &Path) -> String {
    format!(
        "( while true; do echo x >> '{}'; sleep 0.05; done ) &",
        file.display()
    )
}

pub fn file_len(file: &Path) -> u64 {
    std::fs::metadata(file).map(|m| m.len()).unwrap_or(0)
}

/// Wait until the heartbeat has written at least once.
pub async fn wait_for_heartbeat(file: &Path) {
    with_timeout(async {
        while file_len(file) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
}

/// Assert the heartbeat writing to `file` has stopped.
pub async fn assert_heartbeat_stopped(file: &Path) {
    tokio::time::sleep(Duration::from_millis(200)).await;
    let before = file_len(file);
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(before, file_len(file), "background process still running");
}
