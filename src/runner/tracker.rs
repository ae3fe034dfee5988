// src/runner/tracker.rs

//! Per-run progress state: monotonic phase tracking plus throttling.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::runner::parse::Sample;
use crate::types::{BackendKind, Progress, ProgressKind};

/// Rate limiter keyed by progress type.
///
/// Each type is its own metric stream: the first push of a type always
/// passes, later ones only once `interval` has elapsed since the last
/// accepted push of that type. `Complete` is never throttled.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: Duration,
    last: HashMap<ProgressKind, Instant>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: HashMap::new(),
        }
    }

    pub fn allow(&mut self, kind: ProgressKind, now: Instant) -> bool {
        if kind == ProgressKind::Complete {
            return true;
        }
        match self.last.get(&kind) {
            Some(prev) if now.saturating_duration_since(*prev) < self.interval => false,
            _ => {
                self.last.insert(kind, now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last.clear();
    }
}

/// Turns parser samples into Progress snapshots for one run.
///
/// The phase only moves forward within a server: samples from an earlier
/// phase than the current one are dropped.
#[derive(Debug)]
pub struct ProgressTracker {
    backend: BackendKind,
    is_scheduled: bool,
    server: String,
    phase: ProgressKind,
    throttle: ProgressThrottle,
}

impl ProgressTracker {
    pub fn new(backend: BackendKind, is_scheduled: bool, interval: Duration) -> Self {
        Self {
            backend,
            is_scheduled,
            server: String::new(),
            phase: ProgressKind::Running,
            throttle: ProgressThrottle::new(interval),
        }
    }

    pub fn phase(&self) -> ProgressKind {
        self.phase
    }

    /// Start measuring a new server: phase goes back to `Running`.
    pub fn begin_server(&mut self, server: impl Into<String>) -> Progress {
        self.server = server.into();
        self.phase = ProgressKind::Running;
        self.throttle.reset();
        self.snapshot(ProgressKind::Running)
    }

    /// Announce a phase before its process starts. Returns `None` if that
    /// would move backwards.
    pub fn enter(&mut self, phase: ProgressKind) -> Option<Progress> {
        if phase < self.phase {
            return None;
        }
        self.phase = phase;
        // Counts as the first push of this stream.
        self.throttle.allow(phase, Instant::now());
        Some(self.snapshot(phase))
    }

    /// Snapshot to publish for `sample`, if it is neither stale nor
    /// throttled.
    pub fn observe(&mut self, sample: &Sample, now: Instant) -> Option<Progress> {
        if sample.kind < self.phase {
            return None;
        }
        self.phase = sample.kind;
        if !self.throttle.allow(sample.kind, now) {
            return None;
        }

        let mut p = self.snapshot(sample.kind);
        p.speed = sample.speed_mbps;
        p.progress_percent = sample.percent;
        p.latency_ms = sample.latency_ms;
        p.packet_loss_percent = sample.packet_loss_percent;
        Some(p)
    }

    /// Final snapshot; always produced.
    pub fn complete(&mut self, speed: f64, latency_ms: Option<f64>, loss: Option<f64>) -> Progress {
        self.phase = ProgressKind::Complete;
        let mut p = self.snapshot(ProgressKind::Complete);
        p.speed = speed;
        p.progress_percent = 100.0;
        p.latency_ms = latency_ms;
        p.packet_loss_percent = loss;
        p
    }

    fn snapshot(&self, kind: ProgressKind) -> Progress {
        let mut p = Progress::new(kind, self.backend, self.server.clone());
        p.is_scheduled = self.is_scheduled;
        p
    }
}
