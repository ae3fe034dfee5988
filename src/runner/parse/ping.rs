// src/runner/parse/ping.rs

//! `ping -c COUNT HOST` output (iputils, BSD and busybox flavours).

use std::sync::LazyLock;

use regex::Regex;

use super::{Measurement, OutputParser, Sample};

static REPLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"time[=<]\s*([0-9.]+)\s*ms").expect("valid reply regex"));

static LOSS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+) packets transmitted, (\d+) (?:packets )?received.*?([0-9.]+)% packet loss")
        .expect("valid loss regex")
});

static RTT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:rtt|round-trip) min/avg/max/(?:mdev|stddev) = ([0-9.]+)/([0-9.]+)/([0-9.]+)/([0-9.]+) ms",
    )
    .expect("valid rtt regex")
});

#[derive(Debug)]
pub struct PingParser {
    count: u32,
    host: String,
    replies: Vec<f64>,
    loss_percent: Option<f64>,
    avg_ms: Option<f64>,
    mdev_ms: Option<f64>,
}

impl PingParser {
    pub fn new(count: u32, host: impl Into<String>) -> Self {
        Self {
            count: count.max(1),
            host: host.into(),
            replies: Vec::new(),
            loss_percent: None,
            avg_ms: None,
            mdev_ms: None,
        }
    }

    fn fallback_stats(&self) -> (Option<f64>, Option<f64>) {
        if self.replies.is_empty() {
            return (None, None);
        }
        let n = self.replies.len() as f64;
        let avg = self.replies.iter().sum::<f64>() / n;
        let var = self.replies.iter().map(|r| (r - avg).powi(2)).sum::<f64>() / n;
        (Some(avg), Some(var.sqrt()))
    }
}

fn number(caps: &regex::Captures<'_>, idx: usize) -> Result<f64, String> {
    caps[idx]
        .parse::<f64>()
        .map_err(|e| format!("bad number '{}': {e}", &caps[idx]))
}

impl OutputParser for PingParser {
    fn parse_line(&mut self, line: &str) -> Result<Vec<Sample>, String> {
        let line = line.trim();

        if let Some(caps) = REPLY.captures(line) {
            let ms = number(&caps, 1)?;
            self.replies.push(ms);
            let percent = self.replies.len() as f64 / self.count as f64 * 100.0;
            return Ok(vec![Sample::latency(ms, percent)]);
        }

        if let Some(caps) = LOSS.captures(line) {
            let loss = number(&caps, 3)?;
            self.loss_percent = Some(loss);
            let mut sample = Sample::latency(0.0, 100.0);
            sample.latency_ms = self.fallback_stats().0;
            sample.packet_loss_percent = Some(loss);
            return Ok(vec![sample]);
        }

        if let Some(caps) = RTT.captures(line) {
            self.avg_ms = Some(number(&caps, 2)?);
            self.mdev_ms = Some(number(&caps, 4)?);
            return Ok(Vec::new());
        }

        if line.is_empty() || line.starts_with("PING") || line.starts_with("---") {
            return Ok(Vec::new());
        }

        Err(format!("unrecognised ping output: {line}"))
    }

    fn finish(&mut self) -> Option<Measurement> {
        if self.replies.is_empty() && self.loss_percent.is_none() {
            return None;
        }

        let (fallback_avg, fallback_jitter) = self.fallback_stats();
        let loss = self.loss_percent.unwrap_or_else(|| {
            let received = self.replies.len().min(self.count as usize) as f64;
            (1.0 - received / self.count as f64) * 100.0
        });

        Some(Measurement {
            latency_ms: self.avg_ms.or(fallback_avg),
            jitter_ms: self.mdev_ms.or(fallback_jitter),
            packet_loss_percent: Some(loss),
            server_id: Some(self.host.clone()),
            server_name: Some(self.host.clone()),
            ..Default::default()
        })
    }
}
