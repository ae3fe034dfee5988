// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::{dedup_servers, BackendKind, TestOptions};

/// Command-line arguments for `speedwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "speedwatch",
    version,
    about = "Run scheduled internet speed and path-quality tests.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Speedwatch.toml` in the current working directory. A
    /// missing default file means built-in defaults.
    #[arg(long, value_name = "PATH", default_value = "Speedwatch.toml")]
    pub config: String,

    /// Run one manual test, print the results and exit.
    #[arg(long)]
    pub once: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SPEEDWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print config and stored schedules, run nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Measurement backend for `--once`.
    #[arg(long, value_enum, value_name = "BACKEND", default_value = "speedtest")]
    pub backend: BackendArg,

    /// Server id (or host for `--backend ping`). Repeat to test several.
    #[arg(long = "server", value_name = "ID")]
    pub servers: Vec<String>,

    /// `host:port` for `--backend iperf`.
    #[arg(long, value_name = "HOST:PORT")]
    pub host: Option<String>,

    #[arg(long)]
    pub no_download: bool,

    #[arg(long)]
    pub no_upload: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Speedtest,
    Librespeed,
    Iperf,
    Ping,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Speedtest => BackendKind::Speedtest,
            BackendArg::Librespeed => BackendKind::Librespeed,
            BackendArg::Iperf => BackendKind::Iperf3,
            BackendArg::Ping => BackendKind::Ping,
        }
    }
}

impl CliArgs {
    /// Options for a `--once` run.
    pub fn test_options(&self) -> TestOptions {
        let servers = dedup_servers(self.servers.iter().cloned());
        let mut options = TestOptions {
            enable_download: !self.no_download,
            enable_upload: !self.no_upload,
            multi_server: servers.len() > 1,
            server_ids: servers,
            server_host: self.host.clone(),
            ..TestOptions::default()
        };

        match self.backend {
            BackendArg::Speedtest => {}
            BackendArg::Librespeed => options.use_librespeed = true,
            BackendArg::Iperf => options.use_iperf = true,
            BackendArg::Ping => {
                options.enable_download = false;
                options.enable_upload = false;
                options.enable_packet_loss = true;
            }
        }

        options
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
