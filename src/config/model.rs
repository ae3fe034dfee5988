// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::runner::RunnerSettings;
use crate::types::{dedup_servers, Schedule, TestOptions};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// tick_interval = "1m"
/// scheduled_timeout = "5m"
/// store_path = "speedwatch.json"
///
/// [backend]
/// speedtest = "/usr/local/bin/speedtest"
/// ping_count = 5
///
/// [schedule.hourly]
/// interval = "1h"
/// servers = ["12345"]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub backend: BackendSection,

    /// Keys are schedule ids.
    #[serde(default)]
    pub schedule: BTreeMap<String, ScheduleConfig>,
}

/// `[config]` section. Durations are Go-style strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    #[serde(default = "default_tick_interval")]
    pub tick_interval: String,

    /// Hard limit for one scheduled run.
    #[serde(default = "default_scheduled_timeout")]
    pub scheduled_timeout: String,

    /// Minimum gap between two progress pushes of the same type.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: String,

    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

fn default_tick_interval() -> String {
    "1m".to_string()
}

fn default_scheduled_timeout() -> String {
    "5m".to_string()
}

fn default_progress_interval() -> String {
    "1s".to_string()
}

fn default_store_path() -> PathBuf {
    PathBuf::from("speedwatch.json")
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            tick_interval: default_tick_interval(),
            scheduled_timeout: default_scheduled_timeout(),
            progress_interval: default_progress_interval(),
            store_path: default_store_path(),
        }
    }
}

/// `[backend]` section: where the measurement tools live and how long
/// they may run.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendSection {
    #[serde(default = "default_speedtest")]
    pub speedtest: String,
    #[serde(default = "default_librespeed")]
    pub librespeed: String,
    #[serde(default = "default_iperf3")]
    pub iperf3: String,
    #[serde(default = "default_ping")]
    pub ping: String,
    #[serde(default = "default_iperf_duration")]
    pub iperf_duration: String,
    #[serde(default = "default_ping_count")]
    pub ping_count: u32,
    #[serde(default = "default_process_timeout")]
    pub process_timeout: String,
}

fn default_speedtest() -> String {
    "speedtest".to_string()
}

fn default_librespeed() -> String {
    "librespeed-cli".to_string()
}

fn default_iperf3() -> String {
    "iperf3".to_string()
}

fn default_ping() -> String {
    "ping".to_string()
}

fn default_iperf_duration() -> String {
    "10s".to_string()
}

fn default_ping_count() -> u32 {
    10
}

fn default_process_timeout() -> String {
    "2m".to_string()
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            speedtest: default_speedtest(),
            librespeed: default_librespeed(),
            iperf3: default_iperf3(),
            ping: default_ping(),
            iperf_duration: default_iperf_duration(),
            ping_count: default_ping_count(),
            process_timeout: default_process_timeout(),
        }
    }
}

/// `[schedule.<id>]` section.
///
/// Metric flags default to download + upload + jitter, matching a manual
/// run with no flags.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    pub interval: String,

    /// Server ids, or hosts to ping for packet-loss-only schedules.
    #[serde(default)]
    pub servers: Vec<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub download: bool,
    #[serde(default = "default_true")]
    pub upload: bool,
    #[serde(default)]
    pub packet_loss: bool,
    #[serde(default = "default_true")]
    pub jitter: bool,

    /// Test every listed server instead of only the first.
    #[serde(default)]
    pub multi_server: bool,

    #[serde(default)]
    pub iperf: bool,
    #[serde(default)]
    pub librespeed: bool,

    /// `host:port` for iperf schedules.
    #[serde(default)]
    pub host: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ScheduleConfig {
    pub fn test_options(&self) -> TestOptions {
        TestOptions {
            enable_download: self.download,
            enable_upload: self.upload,
            enable_packet_loss: self.packet_loss,
            enable_jitter: self.jitter,
            multi_server: self.multi_server,
            use_iperf: self.iperf,
            use_librespeed: self.librespeed,
            server_ids: self.server_list(),
            server_host: self.host.clone(),
            is_scheduled: true,
        }
    }

    fn server_list(&self) -> Vec<String> {
        dedup_servers(self.servers.iter().cloned())
    }

    /// Stored form of this schedule, first due at `now`.
    pub fn to_schedule(&self, id: &str, now: DateTime<Utc>) -> Schedule {
        Schedule {
            id: id.to_string(),
            server_ids: self.server_list(),
            interval: self.interval.clone(),
            next_run: now,
            last_run: None,
            enabled: self.enabled,
            options: self.test_options(),
        }
    }
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (or
/// [`ConfigFile::new_unchecked`] in tests), so every duration in here has
/// already been parsed.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub tick_interval: Duration,
    pub scheduled_timeout: Duration,
    pub store_path: PathBuf,
    pub runner: RunnerSettings,
    pub schedules: BTreeMap<String, ScheduleConfig>,
}

impl ConfigFile {
    pub fn new_unchecked(
        tick_interval: Duration,
        scheduled_timeout: Duration,
        store_path: PathBuf,
        runner: RunnerSettings,
        schedules: BTreeMap<String, ScheduleConfig>,
    ) -> Self {
        Self {
            tick_interval,
            scheduled_timeout,
            store_path,
            runner,
            schedules,
        }
    }

    /// Schedules to upsert into the store at startup.
    pub fn schedule_seeds(&self, now: DateTime<Utc>) -> Vec<Schedule> {
        self.schedules
            .iter()
            .map(|(id, cfg)| cfg.to_schedule(id, now))
            .collect()
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(
            Duration::from_secs(60),
            Duration::from_secs(5 * 60),
            default_store_path(),
            RunnerSettings::default(),
            BTreeMap::new(),
        )
    }
}
