// tests/runner_fake_tools.rs
#![cfg(unix)]

mod common;
use crate::common::{
    assert_heartbeat_stopped, heartbeat, init_tracing, service, with_timeout, TestReturn,
};

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use speedwatch::errors::SpeedwatchError;
use speedwatch::store::Store;
use speedwatch::types::{BackendKind, ProgressKind};
use speedwatch_test_utils::{FakeBin, TestOptionsBuilder};

const SPEEDTEST_HEAD: &str = r#"echo '{"type":"testStart","server":{"id":42,"name":"Oslo","location":"Norway"}}'
echo '{"type":"ping","ping":{"jitter":0.5,"latency":7.5,"progress":1.0}}'
echo '{"type":"download","download":{"bandwidth":12500000,"progress":0.5}}'
echo 'not json at all'
echo '{"type":"download","download":{"bandwidth":12500000,"progress":1.0}}'"#;

const SPEEDTEST_TAIL: &str = r#"echo '{"type":"upload","upload":{"bandwidth":2500000,"progress":1.0}}'
echo '{"type":"result","ping":{"jitter":0.5,"latency":7.5},"download":{"bandwidth":12500000},"upload":{"bandwidth":2500000},"packetLoss":0,"result":{"url":"https://results.example/1"}}'"#;

const PING_OUTPUT: &str = r#"echo 'PING 9.9.9.9 (9.9.9.9) 56(84) bytes of data.'
echo '64 bytes from 9.9.9.9: icmp_seq=1 ttl=57 time=10.0 ms'
echo '64 bytes from 9.9.9.9: icmp_seq=2 ttl=57 time=12.0 ms'
echo '64 bytes from 9.9.9.9: icmp_seq=3 ttl=57 time=11.0 ms'
echo ''
echo '--- 9.9.9.9 ping statistics ---'
echo '4 packets transmitted, 3 received, 25% packet loss, time 3004ms'
echo 'rtt min/avg/max/mdev = 10.000/11.000/12.000/0.816 ms'"#;

const LIBRESPEED_REPORT: &str = r#"[{"timestamp":"2024-05-01T10:00:00Z","server":{"name":"Amsterdam","url":"https://ams.example/"},"ping":12.5,"jitter":1.5,"upload":45.2,"download":180.9}]"#;

#[tokio::test]
async fn speedtest_run_produces_and_persists_result() -> TestReturn {
    init_tracing();
    let bin = FakeBin::new();
    bin.script("speedtest", &format!("{SPEEDTEST_HEAD}\n{SPEEDTEST_TAIL}"));
    let (service, store) = service(&bin);

    let results = with_timeout(service.run_test(TestOptionsBuilder::new().build())).await?;

    assert_eq!(results.len(), 1);
    let r = &results[0];
    assert_eq!(r.backend, BackendKind::Speedtest);
    assert_eq!(r.server_id.as_deref(), Some("42"));
    assert_eq!(r.server_name, "Oslo (Norway)");
    assert_eq!(r.download_mbps, Some(100.0));
    assert_eq!(r.upload_mbps, Some(20.0));
    assert_eq!(r.latency_ms, Some(7.5));
    assert_eq!(r.jitter_ms, Some(0.5));
    assert_eq!(r.packet_loss_percent, None);
    assert_eq!(r.result_url.as_deref(), Some("https://results.example/1"));
    assert!(!r.is_scheduled);

    assert_eq!(store.results().await?, results);

    let last = service.get_status().expect("final snapshot kept");
    assert_eq!(last.kind, ProgressKind::Complete);
    assert!(last.is_complete);
    assert!(!service.is_running());
    Ok(())
}

#[tokio::test]
async fn progress_phases_never_go_backwards() -> TestReturn {
    init_tracing();
    let bin = FakeBin::new();
    // An out-of-order download line after upload must be dropped.
    bin.script(
        "speedtest",
        &format!(
            "{SPEEDTEST_HEAD}\n{}\necho '{}'\n{}",
            "echo '{\"type\":\"upload\",\"upload\":{\"bandwidth\":2500000,\"progress\":0.2}}'",
            r#"{"type":"download","download":{"bandwidth":1,"progress":0.1}}"#,
            SPEEDTEST_TAIL
        ),
    );
    let (service, _store) = service(&bin);

    let mut sub = service.subscribe();
    let collector = tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Some(p) = sub.next().await {
            let done = p.is_complete;
            seen.push(p.kind);
            if done {
                break;
            }
        }
        seen
    });

    with_timeout(service.run_test(TestOptionsBuilder::new().build())).await?;
    let seen = with_timeout(collector).await?;

    assert_eq!(seen.last(), Some(&ProgressKind::Complete));
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "phases: {seen:?}");
    Ok(())
}

#[tokio::test]
async fn ping_run_reports_path_quality() -> TestReturn {
    init_tracing();
    let bin = FakeBin::new();
    bin.script("ping", PING_OUTPUT);
    let (service, store) = service(&bin);

    let options = TestOptionsBuilder::ping("9.9.9.9").build();
    let results = with_timeout(service.run_test(options)).await?;

    let r = &results[0];
    assert_eq!(r.backend, BackendKind::Ping);
    assert_eq!(r.server_id.as_deref(), Some("9.9.9.9"));
    assert_eq!(r.download_mbps, None);
    assert_eq!(r.upload_mbps, None);
    assert_eq!(r.latency_ms, Some(11.0));
    assert_eq!(r.packet_loss_percent, Some(25.0));
    assert_eq!(store.result_count(), 1);
    Ok(())
}

#[tokio::test]
async fn ping_leaving_a_helper_behind_still_succeeds() -> TestReturn {
    init_tracing();
    let bin = FakeBin::new();
    bin.script("ping", &format!("{PING_OUTPUT}\n(sleep 30) &\nexit 0"));
    let (service, store) = service(&bin);

    let options = TestOptionsBuilder::ping("9.9.9.9").build();
    let results = with_timeout(service.run_test(options)).await?;

    assert_eq!(results[0].latency_ms, Some(11.0));
    assert_eq!(results[0].packet_loss_percent, Some(25.0));
    assert_eq!(store.result_count(), 1);
    Ok(())
}

#[tokio::test]
async fn scheduled_librespeed_run_is_tagged() -> TestReturn {
    init_tracing();
    let bin = FakeBin::new();
    bin.script("librespeed-cli", &format!("echo '{LIBRESPEED_REPORT}'"));
    let (service, store) = service(&bin);

    let options = TestOptionsBuilder::new().librespeed().scheduled().build();
    let results = with_timeout(service.run_test(options)).await?;

    let r = &results[0];
    assert_eq!(r.backend, BackendKind::Librespeed);
    assert!(r.is_scheduled);
    assert_eq!(r.download_mbps, Some(180.9));
    assert_eq!(r.upload_mbps, Some(45.2));
    assert_eq!(store.result_count(), 1);
    Ok(())
}

#[tokio::test]
async fn multi_server_runs_each_server_in_order() -> TestReturn {
    init_tracing();
    let bin = FakeBin::new();
    bin.script(
        "speedtest",
        r#"id=auto
for a in "$@"; do
  case "$a" in --server-id=*) id="${a#--server-id=}" ;; esac
done
echo "{\"type\":\"testStart\",\"server\":{\"id\":\"$id\",\"name\":\"srv-$id\"}}"
echo '{"type":"result","ping":{"jitter":1.0,"latency":5.0},"download":{"bandwidth":1250000},"upload":{"bandwidth":125000}}'"#,
    );
    let (service, store) = service(&bin);

    let options = TestOptionsBuilder::new()
        .multi_server(true)
        .server("9")
        .server("10")
        .build();
    let results = with_timeout(service.run_test(options)).await?;

    let names: Vec<_> = results.iter().map(|r| r.server_name.as_str()).collect();
    assert_eq!(names, vec!["srv-9", "srv-10"]);
    assert_eq!(results[1].download_mbps, Some(10.0));
    assert_eq!(store.result_count(), 2);
    Ok(())
}

#[tokio::test]
async fn failing_tool_persists_nothing() -> TestReturn {
    init_tracing();
    let bin = FakeBin::new();
    bin.script("speedtest", &format!("{SPEEDTEST_HEAD}\nexit 2"));
    let (service, store) = service(&bin);

    let err = with_timeout(service.run_test(TestOptionsBuilder::new().build()))
        .await
        .unwrap_err();

    assert!(matches!(err, SpeedwatchError::ProcessFailed { code: Some(2), .. }));
    assert_eq!(store.result_count(), 0);
    assert!(service.get_status().is_none());
    Ok(())
}

#[tokio::test]
async fn tool_without_result_is_empty_output() -> TestReturn {
    init_tracing();
    let bin = FakeBin::new();
    bin.script("speedtest", "echo garbage\nexit 0");
    let (service, store) = service(&bin);

    let err = with_timeout(service.run_test(TestOptionsBuilder::new().build()))
        .await
        .unwrap_err();

    assert!(matches!(err, SpeedwatchError::EmptyOutput(_)));
    assert_eq!(store.result_count(), 0);
    Ok(())
}

#[tokio::test]
async fn invalid_options_spawn_nothing() -> TestReturn {
    init_tracing();
    let bin = FakeBin::new();
    let marker = bin.path().join("spawned");
    bin.script("speedtest", &format!("touch '{}'", marker.display()));
    let (service, _store) = service(&bin);

    let options = TestOptionsBuilder::new()
        .download(false)
        .upload(false)
        .jitter(false)
        .build();
    let err = service.run_test(options).await.unwrap_err();

    assert!(matches!(err, SpeedwatchError::Validation(_)));
    assert!(!marker.exists());
    Ok(())
}

#[tokio::test]
async fn cancel_mid_upload_kills_tool_and_persists_nothing() -> TestReturn {
    init_tracing();
    let bin = FakeBin::new();
    let beat = bin.path().join("beat");
    bin.script(
        "speedtest",
        &format!(
            "{}\n{SPEEDTEST_HEAD}\necho '{}'\nsleep 30",
            heartbeat(&beat),
            r#"{"type":"upload","upload":{"bandwidth":2500000,"progress":0.3}}"#
        ),
    );
    let (service, store) = service(&bin);

    let cancel = CancellationToken::new();
    let mut sub = service.subscribe();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        while let Some(p) = sub.next().await {
            if p.kind == ProgressKind::Upload {
                trigger.cancel();
                break;
            }
        }
    });

    let err = with_timeout(
        service.run_test_with_cancel(TestOptionsBuilder::new().build(), cancel),
    )
    .await
    .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(store.result_count(), 0);
    assert!(service.get_status().is_none());
    assert!(!service.is_running());
    assert_heartbeat_stopped(&beat).await;
    Ok(())
}

#[tokio::test]
async fn second_caller_gets_already_running() -> TestReturn {
    init_tracing();
    let bin = FakeBin::new();
    bin.script("speedtest", &format!("{SPEEDTEST_HEAD}\nsleep 30"));
    let (service, _store) = service(&bin);

    let cancel = CancellationToken::new();
    let first = {
        let service = service.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            service
                .run_test_with_cancel(TestOptionsBuilder::new().build(), cancel)
                .await
        })
    };

    with_timeout(async {
        while !service.is_running() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    let err = service
        .run_test(TestOptionsBuilder::new().build())
        .await
        .unwrap_err();
    assert!(matches!(err, SpeedwatchError::AlreadyRunning));

    cancel.cancel();
    let first = with_timeout(first).await?;
    assert!(first.unwrap_err().is_cancelled());

    // The slot is free again.
    assert!(!service.is_running());
    Ok(())
}
