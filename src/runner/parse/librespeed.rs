// src/runner/parse/librespeed.rs

//! `librespeed-cli --json` output.
//!
//! The tool prints nothing until the test is over and then emits a JSON
//! array with one object per server. Speeds are already in Mbps. The
//! document may be pretty-printed over several lines, so partial JSON is
//! buffered until it parses.

use serde::Deserialize;

use super::{Measurement, OutputParser, Sample};
use crate::types::ProgressKind;

#[derive(Debug, Deserialize)]
struct Report {
    #[serde(default)]
    server: Option<Server>,
    #[serde(default)]
    ping: Option<f64>,
    #[serde(default)]
    jitter: Option<f64>,
    #[serde(default)]
    download: Option<f64>,
    #[serde(default)]
    upload: Option<f64>,
    #[serde(default)]
    share: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Server {
    name: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Document {
    Many(Vec<Report>),
    One(Report),
}

#[derive(Debug, Default)]
pub struct LibrespeedParser {
    buffer: String,
    result: Option<Measurement>,
}

impl LibrespeedParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn accept(&mut self, report: Report) -> Vec<Sample> {
        let mut samples = Vec::new();
        if let Some(ping) = report.ping {
            samples.push(Sample::latency(ping, 100.0));
        }
        if let Some(dl) = report.download {
            samples.push(Sample::speed(ProgressKind::Download, dl, 100.0));
        }
        if let Some(ul) = report.upload {
            samples.push(Sample::speed(ProgressKind::Upload, ul, 100.0));
        }

        let (server_name, server_id) = match report.server {
            Some(s) => (s.name, s.url),
            None => (None, None),
        };

        self.result = Some(Measurement {
            download_mbps: report.download,
            upload_mbps: report.upload,
            latency_ms: report.ping,
            jitter_ms: report.jitter,
            packet_loss_percent: None,
            server_id,
            server_name,
            result_url: report.share.filter(|s| !s.is_empty()),
        });
        samples
    }
}

impl OutputParser for LibrespeedParser {
    fn parse_line(&mut self, line: &str) -> Result<Vec<Sample>, String> {
        let line = line.trim();
        if self.buffer.is_empty() && !(line.starts_with('[') || line.starts_with('{')) {
            return Err("not part of a JSON report".to_string());
        }
        self.buffer.push_str(line);

        match serde_json::from_str::<Document>(&self.buffer) {
            Ok(doc) => {
                self.buffer.clear();
                let report = match doc {
                    Document::Many(mut reports) => {
                        if reports.is_empty() {
                            return Err("empty librespeed report".to_string());
                        }
                        reports.remove(0)
                    }
                    Document::One(report) => report,
                };
                Ok(self.accept(report))
            }
            // Untagged enums lose the EOF classification, so re-parse as Value.
            Err(e) => match serde_json::from_str::<serde_json::Value>(&self.buffer) {
                Err(inner) if inner.is_eof() => Ok(Vec::new()),
                _ => {
                    self.buffer.clear();
                    Err(e.to_string())
                }
            },
        }
    }

    fn finish(&mut self) -> Option<Measurement> {
        self.result.take()
    }
}
