// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{BackendSection, ConfigFile, RawConfigFile, ScheduleConfig};
use crate::duration::{parse_duration, parse_positive_duration};
use crate::errors::{Result, SpeedwatchError};
use crate::runner::{select_backend, RunnerSettings};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::SpeedwatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let tick_interval = positive("[config].tick_interval", &raw.config.tick_interval)?;
        let scheduled_timeout =
            positive("[config].scheduled_timeout", &raw.config.scheduled_timeout)?;
        let progress_interval = parse_duration(&raw.config.progress_interval).map_err(|e| {
            SpeedwatchError::ConfigError(format!("[config].progress_interval: {e}"))
        })?;

        let runner = runner_settings(&raw.backend, progress_interval)?;

        for (id, schedule) in raw.schedule.iter() {
            validate_schedule(id, schedule)?;
        }

        Ok(ConfigFile::new_unchecked(
            tick_interval,
            scheduled_timeout,
            raw.config.store_path,
            runner,
            raw.schedule,
        ))
    }
}

fn positive(field: &str, value: &str) -> Result<Duration> {
    parse_positive_duration(value)
        .map_err(|e| SpeedwatchError::ConfigError(format!("{field}: {e}")))
}

fn runner_settings(backend: &BackendSection, progress_interval: Duration) -> Result<RunnerSettings> {
    if backend.ping_count == 0 {
        return Err(SpeedwatchError::ConfigError(
            "[backend].ping_count must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(RunnerSettings {
        speedtest_bin: backend.speedtest.clone(),
        librespeed_bin: backend.librespeed.clone(),
        iperf3_bin: backend.iperf3.clone(),
        ping_bin: backend.ping.clone(),
        iperf_duration: positive("[backend].iperf_duration", &backend.iperf_duration)?,
        ping_count: backend.ping_count,
        process_timeout: positive("[backend].process_timeout", &backend.process_timeout)?,
        progress_interval,
    })
}

fn validate_schedule(id: &str, schedule: &ScheduleConfig) -> Result<()> {
    if id.trim().is_empty() {
        return Err(SpeedwatchError::ConfigError(
            "schedule ids must not be empty".to_string(),
        ));
    }

    parse_positive_duration(&schedule.interval).map_err(|e| {
        SpeedwatchError::ConfigError(format!("schedule '{id}' has invalid interval: {e}"))
    })?;

    select_backend(&schedule.test_options()).map_err(|e| {
        SpeedwatchError::ConfigError(format!("schedule '{id}' has invalid options: {e}"))
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Result<ConfigFile> {
        let raw: RawConfigFile = toml::from_str(toml)?;
        ConfigFile::try_from(raw)
    }

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg.tick_interval, Duration::from_secs(60));
        assert_eq!(cfg.scheduled_timeout, Duration::from_secs(300));
        assert_eq!(cfg.runner, RunnerSettings::default());
        assert!(cfg.schedules.is_empty());
    }

    #[test]
    fn backend_overrides_reach_runner_settings() {
        let cfg = parse(
            r#"
            [config]
            progress_interval = "250ms"

            [backend]
            ping = "/bin/ping"
            ping_count = 3
            process_timeout = "30s"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.runner.ping_bin, "/bin/ping");
        assert_eq!(cfg.runner.ping_count, 3);
        assert_eq!(cfg.runner.process_timeout, Duration::from_secs(30));
        assert_eq!(cfg.runner.progress_interval, Duration::from_millis(250));
    }

    #[test]
    fn zero_ping_count_is_rejected() {
        let err = parse("[backend]\nping_count = 0\n").unwrap_err();
        assert!(matches!(err, SpeedwatchError::ConfigError(_)));
    }

    #[test]
    fn bad_durations_are_rejected() {
        assert!(parse("[config]\ntick_interval = \"soon\"\n").is_err());
        assert!(parse("[config]\nscheduled_timeout = \"0s\"\n").is_err());
        assert!(parse("[schedule.a]\ninterval = \"-1h\"\n").is_err());
    }

    #[test]
    fn contradictory_schedule_options_are_rejected() {
        let err = parse(
            r#"
            [schedule.both]
            interval = "1h"
            iperf = true
            librespeed = true
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("both"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse("[config]\nqueue_length = 1\n").is_err());
    }

    #[test]
    fn ping_schedule_seeds_store_row() {
        let cfg = parse(
            r#"
            [schedule.loss]
            interval = "15m"
            servers = ["1.1.1.1"]
            download = false
            upload = false
            packet_loss = true
            "#,
        )
        .unwrap();
        let now = chrono::Utc::now();
        let seeds = cfg.schedule_seeds(now);
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].id, "loss");
        assert_eq!(seeds[0].next_run, now);
        assert!(seeds[0].options.is_scheduled);
        assert_eq!(
            select_backend(&seeds[0].options).unwrap(),
            crate::types::BackendKind::Ping
        );
    }
}
