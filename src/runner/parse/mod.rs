// src/runner/parse/mod.rs

//! Incremental parsers that turn tool output into a common shape.
//!
//! Each backend gets its own [`OutputParser`]. The runner feeds it one
//! stdout line at a time as the tool prints it:
//!
//! - `parse_line` returns zero or more [`Sample`]s for live progress, or an
//!   error for a line it cannot use. Errors are logged and skipped.
//! - `finish` returns the final [`Measurement`] once stdout is exhausted, or
//!   `None` when nothing usable was ever seen.

pub mod iperf;
pub mod librespeed;
pub mod ping;
pub mod speedtest;

use crate::types::ProgressKind;

pub use iperf::IperfParser;
pub use librespeed::LibrespeedParser;
pub use ping::PingParser;
pub use speedtest::SpeedtestParser;

/// A live update from a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub kind: ProgressKind,
    /// Mbps; zero for latency-only samples.
    pub speed_mbps: f64,
    /// 0..=100 within the current phase.
    pub percent: f64,
    pub latency_ms: Option<f64>,
    pub packet_loss_percent: Option<f64>,
}

impl Sample {
    pub fn speed(kind: ProgressKind, speed_mbps: f64, percent: f64) -> Self {
        Self {
            kind,
            speed_mbps,
            percent: clamp_percent(percent),
            latency_ms: None,
            packet_loss_percent: None,
        }
    }

    pub fn latency(latency_ms: f64, percent: f64) -> Self {
        Self {
            kind: ProgressKind::Ping,
            speed_mbps: 0.0,
            percent: clamp_percent(percent),
            latency_ms: Some(latency_ms),
            packet_loss_percent: None,
        }
    }
}

/// Final numbers reported by one tool invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Measurement {
    pub download_mbps: Option<f64>,
    pub upload_mbps: Option<f64>,
    pub latency_ms: Option<f64>,
    pub jitter_ms: Option<f64>,
    pub packet_loss_percent: Option<f64>,
    pub server_id: Option<String>,
    pub server_name: Option<String>,
    pub result_url: Option<String>,
}

impl Measurement {
    /// Fill gaps in `self` from `other`; values already present win.
    pub fn merge(&mut self, other: Measurement) {
        fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
            if slot.is_none() {
                *slot = value;
            }
        }
        fill(&mut self.download_mbps, other.download_mbps);
        fill(&mut self.upload_mbps, other.upload_mbps);
        fill(&mut self.latency_ms, other.latency_ms);
        fill(&mut self.jitter_ms, other.jitter_ms);
        fill(&mut self.packet_loss_percent, other.packet_loss_percent);
        fill(&mut self.server_id, other.server_id);
        fill(&mut self.server_name, other.server_name);
        fill(&mut self.result_url, other.result_url);
    }
}

pub trait OutputParser: Send {
    fn parse_line(&mut self, line: &str) -> Result<Vec<Sample>, String>;
    fn finish(&mut self) -> Option<Measurement>;
}

/// Bytes per second to megabits per second.
pub fn bytes_per_sec_to_mbps(bytes_per_sec: f64) -> f64 {
    bytes_per_sec * 8.0 / 1_000_000.0
}

/// Bits per second to megabits per second.
pub fn bits_per_sec_to_mbps(bits_per_sec: f64) -> f64 {
    bits_per_sec / 1_000_000.0
}

pub fn clamp_percent(p: f64) -> f64 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 100.0) }
}
