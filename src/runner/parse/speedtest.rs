// src/runner/parse/speedtest.rs

//! Ookla `speedtest --format=jsonl --progress=yes` output.
//!
//! One JSON object per line, tagged by `type`: `testStart`, `ping`,
//! `download`, `upload`, `result` (and `log`, which is ignored). Bandwidth
//! is in bytes/s and `progress` is a 0..1 fraction.

use serde::Deserialize;
use serde_json::Value;

use super::{bytes_per_sec_to_mbps, Measurement, OutputParser, Sample};
use crate::types::ProgressKind;

#[derive(Debug, Deserialize)]
struct Line {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    ping: Option<PingBlock>,
    #[serde(default)]
    download: Option<BandwidthBlock>,
    #[serde(default)]
    upload: Option<BandwidthBlock>,
    #[serde(default, rename = "packetLoss")]
    packet_loss: Option<f64>,
    #[serde(default)]
    server: Option<ServerBlock>,
    #[serde(default)]
    result: Option<ResultBlock>,
}

#[derive(Debug, Deserialize)]
struct PingBlock {
    jitter: Option<f64>,
    latency: Option<f64>,
    progress: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct BandwidthBlock {
    bandwidth: Option<f64>,
    progress: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ServerBlock {
    id: Option<Value>,
    name: Option<String>,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResultBlock {
    url: Option<String>,
}

#[derive(Debug, Default)]
pub struct SpeedtestParser {
    server_id: Option<String>,
    server_name: Option<String>,
    result: Option<Measurement>,
}

impl SpeedtestParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn remember_server(&mut self, server: &ServerBlock) {
        if let Some(id) = &server.id {
            self.server_id = Some(match id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });
        }
        if let Some(name) = &server.name {
            self.server_name = Some(match &server.location {
                Some(loc) if !loc.is_empty() => format!("{name} ({loc})"),
                _ => name.clone(),
            });
        }
    }
}

impl OutputParser for SpeedtestParser {
    fn parse_line(&mut self, line: &str) -> Result<Vec<Sample>, String> {
        let parsed: Line = serde_json::from_str(line.trim()).map_err(|e| e.to_string())?;

        if let Some(server) = &parsed.server {
            self.remember_server(server);
        }

        match parsed.kind.as_str() {
            "ping" => {
                let ping = parsed.ping.ok_or("ping line without ping block")?;
                let latency = ping.latency.ok_or("ping line without latency")?;
                let percent = ping.progress.unwrap_or(0.0) * 100.0;
                Ok(vec![Sample::latency(latency, percent)])
            }
            "download" | "upload" => {
                let (kind, block) = if parsed.kind == "download" {
                    (ProgressKind::Download, parsed.download)
                } else {
                    (ProgressKind::Upload, parsed.upload)
                };
                let block = block.ok_or_else(|| format!("{} line without data", parsed.kind))?;
                let bandwidth = block.bandwidth.ok_or("bandwidth missing")?;
                let percent = block.progress.unwrap_or(0.0) * 100.0;
                Ok(vec![Sample::speed(kind, bytes_per_sec_to_mbps(bandwidth), percent)])
            }
            "result" => {
                let (latency, jitter) = parsed
                    .ping
                    .map(|p| (p.latency, p.jitter))
                    .unwrap_or((None, None));
                self.result = Some(Measurement {
                    download_mbps: parsed
                        .download
                        .and_then(|b| b.bandwidth)
                        .map(bytes_per_sec_to_mbps),
                    upload_mbps: parsed
                        .upload
                        .and_then(|b| b.bandwidth)
                        .map(bytes_per_sec_to_mbps),
                    latency_ms: latency,
                    jitter_ms: jitter,
                    packet_loss_percent: parsed.packet_loss,
                    server_id: self.server_id.clone(),
                    server_name: self.server_name.clone(),
                    result_url: parsed.result.and_then(|r| r.url),
                });
                Ok(Vec::new())
            }
            "testStart" | "log" => Ok(Vec::new()),
            other => Err(format!("unknown speedtest line type '{other}'")),
        }
    }

    fn finish(&mut self) -> Option<Measurement> {
        self.result.take()
    }
}
