#![allow(dead_code)]

use chrono::{DateTime, Utc};
use speedwatch::types::{Schedule, TestOptions};

/// Builder for `Schedule` to simplify test setup.
///
/// Defaults: hourly, enabled, due at `crate::t0()`, never run.
pub struct ScheduleBuilder {
    schedule: Schedule,
}

impl ScheduleBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            schedule: Schedule {
                id: id.to_string(),
                server_ids: Default::default(),
                interval: "1h".to_string(),
                next_run: crate::t0(),
                last_run: None,
                enabled: true,
                options: TestOptions::default(),
            },
        }
    }

    pub fn interval(mut self, interval: &str) -> Self {
        self.schedule.interval = interval.to_string();
        self
    }

    pub fn next_run(mut self, at: DateTime<Utc>) -> Self {
        self.schedule.next_run = at;
        self
    }

    pub fn enabled(mut self, val: bool) -> Self {
        self.schedule.enabled = val;
        self
    }

    pub fn server(mut self, id: &str) -> Self {
        if !self.schedule.server_ids.iter().any(|s| s == id) {
            self.schedule.server_ids.push(id.to_string());
        }
        self
    }

    pub fn build(self) -> Schedule {
        self.schedule
    }
}

/// Builder for `TestOptions`.
pub struct TestOptionsBuilder {
    options: TestOptions,
}

impl TestOptionsBuilder {
    pub fn new() -> Self {
        Self {
            options: TestOptions::default(),
        }
    }

    /// Packet-loss only, probing `host`.
    pub fn ping(host: &str) -> Self {
        Self::new()
            .download(false)
            .upload(false)
            .packet_loss(true)
            .server(host)
    }

    pub fn download(mut self, val: bool) -> Self {
        self.options.enable_download = val;
        self
    }

    pub fn upload(mut self, val: bool) -> Self {
        self.options.enable_upload = val;
        self
    }

    pub fn packet_loss(mut self, val: bool) -> Self {
        self.options.enable_packet_loss = val;
        self
    }

    pub fn jitter(mut self, val: bool) -> Self {
        self.options.enable_jitter = val;
        self
    }

    pub fn multi_server(mut self, val: bool) -> Self {
        self.options.multi_server = val;
        self
    }

    pub fn librespeed(mut self) -> Self {
        self.options.use_librespeed = true;
        self
    }

    pub fn server(mut self, id: &str) -> Self {
        if !self.options.server_ids.iter().any(|s| s == id) {
            self.options.server_ids.push(id.to_string());
        }
        self
    }

    pub fn scheduled(mut self) -> Self {
        self.options.is_scheduled = true;
        self
    }

    pub fn build(self) -> TestOptions {
        self.options
    }
}

impl Default for TestOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
