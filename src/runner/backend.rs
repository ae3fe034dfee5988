// src/runner/backend.rs

//! Backend selection and command planning.
//!
//! Nothing here spawns anything: options are validated and turned into a
//! list of [`Invocation`]s that the runner executes in order.

use std::time::Duration;

use crate::errors::{Result, SpeedwatchError};
use crate::exec::ProcessSpec;
use crate::runner::parse::{
    IperfParser, LibrespeedParser, OutputParser, PingParser, SpeedtestParser,
};
use crate::types::{dedup_servers, BackendKind, ProgressKind, TestOptions};

const DEFAULT_IPERF_PORT: u16 = 5201;

/// Binaries and tuning knobs for the measurement tools.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerSettings {
    pub speedtest_bin: String,
    pub librespeed_bin: String,
    pub iperf3_bin: String,
    pub ping_bin: String,
    pub iperf_duration: Duration,
    pub ping_count: u32,
    /// Deadline for each spawned process.
    pub process_timeout: Duration,
    /// Minimum gap between two progress pushes of the same type.
    pub progress_interval: Duration,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            speedtest_bin: "speedtest".to_string(),
            librespeed_bin: "librespeed-cli".to_string(),
            iperf3_bin: "iperf3".to_string(),
            ping_bin: "ping".to_string(),
            iperf_duration: Duration::from_secs(10),
            ping_count: 10,
            process_timeout: Duration::from_secs(120),
            progress_interval: Duration::from_secs(1),
        }
    }
}

/// One process to run as part of a test.
pub struct Invocation {
    /// Phase announced before the process starts, for tools that cover a
    /// single phase. `None` when the tool reports its own phases.
    pub phase: Option<ProgressKind>,
    pub spec: ProcessSpec,
    pub parser: Box<dyn OutputParser>,
}

impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("phase", &self.phase)
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

/// Pick exactly one backend for `options`, or reject them.
pub fn select_backend(options: &TestOptions) -> Result<BackendKind> {
    let invalid = |msg: &str| Err(SpeedwatchError::Validation(msg.to_string()));

    if options.use_iperf && options.use_librespeed {
        return invalid("use_iperf and use_librespeed are mutually exclusive");
    }

    let wants_bandwidth = options.enable_download || options.enable_upload;

    if !wants_bandwidth {
        if !options.enable_packet_loss {
            return invalid("no measurement enabled (download, upload or packet loss)");
        }
        if options.use_iperf || options.use_librespeed {
            return invalid("packet-loss-only tests run on the ping backend, not iperf or librespeed");
        }
        if options.server_ids.is_empty() {
            return invalid("ping tests need at least one host in server_ids");
        }
        return Ok(BackendKind::Ping);
    }

    if options.multi_server && options.server_ids.is_empty() {
        return invalid("multi_server requires at least one server id");
    }

    if options.use_iperf {
        match options.server_host.as_deref() {
            Some(host) if !host.trim().is_empty() => {
                split_host_port(host)?;
            }
            _ => return invalid("iperf tests need server_host"),
        }
        return Ok(BackendKind::Iperf3);
    }

    if options.use_librespeed {
        return Ok(BackendKind::Librespeed);
    }

    Ok(BackendKind::Speedtest)
}

/// Servers to test, in order. `None` lets the tool pick a server itself.
pub fn targets(kind: BackendKind, options: &TestOptions) -> Vec<Option<String>> {
    match kind {
        BackendKind::Iperf3 => vec![options.server_host.clone()],
        _ if options.multi_server => dedup_servers(options.server_ids.iter().cloned())
            .into_iter()
            .map(Some)
            .collect(),
        _ => vec![options.server_ids.first().cloned()],
    }
}

/// Build the processes needed to test one server.
pub fn plan(
    kind: BackendKind,
    options: &TestOptions,
    target: Option<&str>,
    settings: &RunnerSettings,
) -> Result<Vec<Invocation>> {
    let mut out = Vec::new();

    match kind {
        BackendKind::Speedtest => {
            let mut spec = ProcessSpec::new(&settings.speedtest_bin).args([
                "--format=jsonl",
                "--progress=yes",
                "--accept-license",
                "--accept-gdpr",
            ]);
            if let Some(id) = target {
                spec = spec.arg(format!("--server-id={id}"));
            }
            out.push(Invocation {
                phase: None,
                spec,
                parser: Box::new(SpeedtestParser::new()),
            });
        }
        BackendKind::Librespeed => {
            let mut spec = ProcessSpec::new(&settings.librespeed_bin).arg("--json");
            if let Some(id) = target {
                spec = spec.args(["--server", id]);
            }
            if !options.enable_download {
                spec = spec.arg("--no-download");
            }
            if !options.enable_upload {
                spec = spec.arg("--no-upload");
            }
            out.push(Invocation {
                phase: None,
                spec,
                parser: Box::new(LibrespeedParser::new()),
            });
        }
        BackendKind::Iperf3 => {
            let host = target.ok_or_else(|| {
                SpeedwatchError::Validation("iperf tests need server_host".to_string())
            })?;
            let (addr, port) = split_host_port(host)?;
            let secs = settings.iperf_duration.as_secs().max(1);

            // Download (reverse mode) first so phases stay monotonic.
            let directions = [
                (options.enable_download, ProgressKind::Download),
                (options.enable_upload, ProgressKind::Upload),
            ];
            for (enabled, direction) in directions {
                if !enabled {
                    continue;
                }
                let mut spec = ProcessSpec::new(&settings.iperf3_bin).args([
                    "-c".to_string(),
                    addr.clone(),
                    "-p".to_string(),
                    port.to_string(),
                    "-t".to_string(),
                    secs.to_string(),
                    "--json-stream".to_string(),
                ]);
                if direction == ProgressKind::Download {
                    spec = spec.arg("-R");
                }
                out.push(Invocation {
                    phase: Some(direction),
                    spec,
                    parser: Box::new(IperfParser::new(direction, secs as f64, host)),
                });
            }
        }
        BackendKind::Ping => {
            let host = target.ok_or_else(|| {
                SpeedwatchError::Validation("ping tests need a host".to_string())
            })?;
            let spec = ProcessSpec::new(&settings.ping_bin).args([
                "-c".to_string(),
                settings.ping_count.to_string(),
                host.to_string(),
            ]);
            out.push(Invocation {
                phase: Some(ProgressKind::Ping),
                spec,
                parser: Box::new(PingParser::new(settings.ping_count, host)),
            });
        }
    }

    Ok(out)
}

/// Split `host:port` (or `[v6]:port`); a missing port means iperf3's default.
pub fn split_host_port(s: &str) -> Result<(String, u16)> {
    let s = s.trim();
    let bad = |why: &str| SpeedwatchError::Validation(format!("invalid server_host '{s}': {why}"));

    if let Some(rest) = s.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(|| bad("unclosed '['"))?;
        let port = match tail.strip_prefix(':') {
            Some(p) => p.parse().map_err(|_| bad("bad port"))?,
            None if tail.is_empty() => DEFAULT_IPERF_PORT,
            None => return Err(bad("unexpected text after ']'")),
        };
        return Ok((host.to_string(), port));
    }

    match s.rsplit_once(':') {
        // A bare IPv6 address has several colons and no port.
        Some((host, _)) if host.contains(':') => Ok((s.to_string(), DEFAULT_IPERF_PORT)),
        Some((host, port)) => {
            if host.is_empty() {
                return Err(bad("empty host"));
            }
            let port = port.parse().map_err(|_| bad("bad port"))?;
            Ok((host.to_string(), port))
        }
        None => Ok((s.to_string(), DEFAULT_IPERF_PORT)),
    }
}
