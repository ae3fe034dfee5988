// src/runner/parse/iperf.rs

//! `iperf3 --json-stream` output.
//!
//! Each line is `{"event": ..., "data": ...}`. `interval` events carry a
//! running `sum` and drive progress; the `end` event carries the totals.
//! One parser instance covers one direction (one process).

use serde::Deserialize;
use serde_json::Value;

use super::{bits_per_sec_to_mbps, Measurement, OutputParser, Sample};
use crate::types::ProgressKind;

#[derive(Debug, Deserialize)]
struct Event {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct IntervalData {
    sum: IntervalSum,
}

#[derive(Debug, Deserialize)]
struct IntervalSum {
    end: f64,
    bits_per_second: f64,
    #[serde(default)]
    omitted: bool,
}

#[derive(Debug, Deserialize)]
struct EndData {
    #[serde(default)]
    sum_received: Option<EndSum>,
    #[serde(default)]
    sum_sent: Option<EndSum>,
    #[serde(default)]
    sum: Option<EndSum>,
}

#[derive(Debug, Deserialize)]
struct EndSum {
    bits_per_second: f64,
    #[serde(default)]
    jitter_ms: Option<f64>,
    #[serde(default)]
    lost_percent: Option<f64>,
}

#[derive(Debug)]
pub struct IperfParser {
    direction: ProgressKind,
    duration_secs: f64,
    server: String,
    result: Option<Measurement>,
}

impl IperfParser {
    /// `direction` is [`ProgressKind::Download`] (reverse mode) or
    /// [`ProgressKind::Upload`].
    pub fn new(direction: ProgressKind, duration_secs: f64, server: impl Into<String>) -> Self {
        Self {
            direction,
            duration_secs,
            server: server.into(),
            result: None,
        }
    }

    fn on_end(&mut self, data: EndData) -> Result<Vec<Sample>, String> {
        // The receiving side's number is what the link delivered.
        let sum = data
            .sum_received
            .or(data.sum_sent)
            .or(data.sum)
            .ok_or("end event without totals")?;
        let mbps = bits_per_sec_to_mbps(sum.bits_per_second);

        let mut m = Measurement {
            jitter_ms: sum.jitter_ms,
            packet_loss_percent: sum.lost_percent,
            server_id: Some(self.server.clone()),
            server_name: Some(self.server.clone()),
            ..Default::default()
        };
        if self.direction == ProgressKind::Download {
            m.download_mbps = Some(mbps);
        } else {
            m.upload_mbps = Some(mbps);
        }
        self.result = Some(m);

        Ok(vec![Sample::speed(self.direction, mbps, 100.0)])
    }
}

impl OutputParser for IperfParser {
    fn parse_line(&mut self, line: &str) -> Result<Vec<Sample>, String> {
        let event: Event = serde_json::from_str(line.trim()).map_err(|e| e.to_string())?;

        match event.event.as_str() {
            "interval" => {
                let data: IntervalData =
                    serde_json::from_value(event.data).map_err(|e| e.to_string())?;
                if data.sum.omitted {
                    return Ok(Vec::new());
                }
                let percent = if self.duration_secs > 0.0 {
                    data.sum.end / self.duration_secs * 100.0
                } else {
                    0.0
                };
                Ok(vec![Sample::speed(
                    self.direction,
                    bits_per_sec_to_mbps(data.sum.bits_per_second),
                    percent,
                )])
            }
            "end" => {
                let data: EndData =
                    serde_json::from_value(event.data).map_err(|e| e.to_string())?;
                self.on_end(data)
            }
            "error" => Err(format!("iperf3 reported error: {}", event.data)),
            "start" | "server_output_text" => Ok(Vec::new()),
            other => Err(format!("unknown iperf3 event '{other}'")),
        }
    }

    fn finish(&mut self) -> Option<Measurement> {
        self.result.take()
    }
}
