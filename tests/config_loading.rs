// tests/config_loading.rs

mod common;
use crate::common::{init_tracing, TestReturn};

use std::io::Write;
use std::time::Duration;

use speedwatch::config::{load_and_validate, load_or_default};
use speedwatch::errors::SpeedwatchError;
use speedwatch::store::{JsonFileStore, Store};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn full_config_loads() -> TestReturn {
    init_tracing();
    let file = write_config(
        r#"
        [config]
        tick_interval = "30s"
        scheduled_timeout = "1m30s"
        store_path = "/var/lib/speedwatch/store.json"

        [backend]
        librespeed = "/opt/librespeed-cli"
        iperf_duration = "5s"

        [schedule.nightly]
        interval = "24h"
        servers = ["1234", "5678"]
        multi_server = true

        [schedule.lab]
        interval = "30m"
        iperf = true
        host = "10.0.0.2:5201"
        enabled = false
        "#,
    );

    let cfg = load_and_validate(file.path())?;

    assert_eq!(cfg.tick_interval, Duration::from_secs(30));
    assert_eq!(cfg.scheduled_timeout, Duration::from_secs(90));
    assert_eq!(cfg.runner.librespeed_bin, "/opt/librespeed-cli");
    assert_eq!(cfg.runner.iperf_duration, Duration::from_secs(5));
    assert_eq!(cfg.schedules.len(), 2);

    let seeds = cfg.schedule_seeds(chrono::Utc::now());
    let lab = seeds.iter().find(|s| s.id == "lab").expect("lab seeded");
    assert!(!lab.enabled);
    assert!(lab.options.use_iperf);
    assert_eq!(lab.options.server_host.as_deref(), Some("10.0.0.2:5201"));
    Ok(())
}

#[test]
fn missing_explicit_file_is_io_error() {
    init_tracing();
    let dir = tempfile::tempdir().expect("temp dir");
    let err = load_or_default(dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, SpeedwatchError::IoError(_)));
}

#[test]
fn malformed_toml_is_toml_error() {
    init_tracing();
    let file = write_config("[config\ntick_interval = ");
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, SpeedwatchError::TomlError(_)));
}

#[test]
fn iperf_schedule_without_host_is_config_error() {
    init_tracing();
    let file = write_config(
        r#"
        [schedule.lab]
        interval = "1h"
        iperf = true
        "#,
    );
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, SpeedwatchError::ConfigError(ref m) if m.contains("lab")));
}

#[tokio::test]
async fn reseeding_keeps_stored_bookkeeping() -> TestReturn {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let store = JsonFileStore::new(dir.path().join("store.json"));

    let file = write_config("[schedule.hourly]\ninterval = \"1h\"\n");
    let cfg = load_and_validate(file.path())?;
    let first = chrono::Utc::now();
    for s in cfg.schedule_seeds(first) {
        store.upsert_schedule(s).await?;
    }

    // Pretend the scheduler ran it.
    let mut ran = store.get_schedules().await?.remove(0);
    ran.last_run = Some(first);
    ran.next_run = first + chrono::Duration::hours(1);
    store.update_schedule(ran.clone()).await?;

    // Restart with a changed interval.
    let file = write_config("[schedule.hourly]\ninterval = \"2h\"\n");
    let cfg = load_and_validate(file.path())?;
    for s in cfg.schedule_seeds(first + chrono::Duration::minutes(5)) {
        store.upsert_schedule(s).await?;
    }

    let stored = store.get_schedules().await?;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].interval, "2h");
    assert_eq!(stored[0].next_run, ran.next_run);
    assert_eq!(stored[0].last_run, ran.last_run);
    Ok(())
}
