// src/types.rs

//! Shared data model: test options, live progress, final results and
//! persisted schedules.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which measurement tool drives a run.
///
/// The serialized tag doubles as Progress `backendKind`, so presentation
/// code can reconstruct what the numbers mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Ookla speedtest CLI (default bandwidth backend).
    Speedtest,
    /// librespeed-cli (alternate bandwidth backend).
    Librespeed,
    /// iperf3 against a directly addressed host.
    Iperf3,
    /// Path-quality check using `ping`.
    Ping,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Speedtest => "speedtest",
            BackendKind::Librespeed => "librespeed",
            BackendKind::Iperf3 => "iperf3",
            BackendKind::Ping => "ping",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for a single test run. Immutable once the run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOptions {
    #[serde(default = "default_true")]
    pub enable_download: bool,
    #[serde(default = "default_true")]
    pub enable_upload: bool,
    #[serde(default)]
    pub enable_packet_loss: bool,
    #[serde(default = "default_true")]
    pub enable_jitter: bool,
    #[serde(default)]
    pub multi_server: bool,
    #[serde(default)]
    pub use_iperf: bool,
    #[serde(default)]
    pub use_librespeed: bool,
    /// Server identifiers in the order they are tested (ping: hosts to
    /// ping). Duplicates are dropped by [`dedup_servers`].
    #[serde(default)]
    pub server_ids: Vec<String>,
    /// Direct `host:port` for the iperf3 backend.
    #[serde(default)]
    pub server_host: Option<String>,
    #[serde(default)]
    pub is_scheduled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            enable_download: true,
            enable_upload: true,
            enable_packet_loss: false,
            enable_jitter: true,
            multi_server: false,
            use_iperf: false,
            use_librespeed: false,
            server_ids: Vec::new(),
            server_host: None,
            is_scheduled: false,
        }
    }
}

/// Drop repeated server ids, keeping the first occurrence of each.
pub fn dedup_servers<I, S>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut out: Vec<String> = Vec::new();
    for id in ids {
        let id = id.into();
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

/// Phase reported by a Progress snapshot.
///
/// Declaration order is the monotonic order a run moves through; the runner
/// never reports a phase that sorts before the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressKind {
    Running,
    Ping,
    Download,
    Upload,
    Complete,
}

/// Point-in-time snapshot of the in-flight test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    #[serde(rename = "type")]
    pub kind: ProgressKind,
    pub current_server: String,
    /// Mbps.
    pub speed: f64,
    /// 0..=100.
    pub progress_percent: f64,
    pub latency_ms: Option<f64>,
    pub packet_loss_percent: Option<f64>,
    pub is_complete: bool,
    pub backend_kind: BackendKind,
    pub is_scheduled: bool,
}

impl Progress {
    pub fn new(kind: ProgressKind, backend: BackendKind, server: impl Into<String>) -> Self {
        Self {
            kind,
            current_server: server.into(),
            speed: 0.0,
            progress_percent: 0.0,
            latency_ms: None,
            packet_loss_percent: None,
            is_complete: kind == ProgressKind::Complete,
            backend_kind: backend,
            is_scheduled: false,
        }
    }
}

/// Immutable record of a successfully completed test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub backend: BackendKind,
    pub server_id: Option<String>,
    pub server_name: String,
    pub download_mbps: Option<f64>,
    pub upload_mbps: Option<f64>,
    pub latency_ms: Option<f64>,
    pub jitter_ms: Option<f64>,
    pub packet_loss_percent: Option<f64>,
    #[serde(default)]
    pub result_url: Option<String>,
    pub is_scheduled: bool,
    pub created_at: DateTime<Utc>,
}

/// Persisted recurring test definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    #[serde(default)]
    pub server_ids: Vec<String>,
    /// Go-style duration string, e.g. `"1h"` or `"30m"`.
    pub interval: String,
    pub next_run: DateTime<Utc>,
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
    pub enabled: bool,
    pub options: TestOptions,
}

impl Schedule {
    /// Options used when the scheduler fires this schedule.
    ///
    /// The schedule's own server list wins over whatever the stored options
    /// carry, and the run is always tagged as scheduled.
    pub fn run_options(&self) -> TestOptions {
        let mut options = self.options.clone();
        if !self.server_ids.is_empty() {
            options.server_ids = self.server_ids.clone();
        }
        options.is_scheduled = true;
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_kind_order_is_monotonic_run_order() {
        assert!(ProgressKind::Running < ProgressKind::Ping);
        assert!(ProgressKind::Ping < ProgressKind::Download);
        assert!(ProgressKind::Download < ProgressKind::Upload);
        assert!(ProgressKind::Upload < ProgressKind::Complete);
    }

    #[test]
    fn progress_serializes_with_wire_names() {
        let p = Progress::new(ProgressKind::Download, BackendKind::Iperf3, "lab");
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["type"], "download");
        assert_eq!(json["backendKind"], "iperf3");
        assert_eq!(json["currentServer"], "lab");
        assert_eq!(json["isComplete"], false);
    }

    #[test]
    fn run_options_tags_scheduled_and_prefers_schedule_servers() {
        let mut options = TestOptions::default();
        options.server_ids.push("stale".into());
        let schedule = Schedule {
            id: "s1".into(),
            server_ids: vec!["1234".to_string()],
            interval: "1h".into(),
            next_run: Utc::now(),
            last_run: None,
            enabled: true,
            options,
        };

        let run = schedule.run_options();
        assert!(run.is_scheduled);
        assert_eq!(run.server_ids, vec!["1234"]);
    }

    #[test]
    fn dedup_servers_keeps_first_seen_order() {
        assert_eq!(dedup_servers(["9", "10", "9", "2"]), vec!["9", "10", "2"]);
        assert!(dedup_servers(Vec::<String>::new()).is_empty());
    }
}
