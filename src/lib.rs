// src/lib.rs

pub mod cli;
pub mod config;
pub mod duration;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod progress;
pub mod runner;
pub mod store;
pub mod types;

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_or_default;
use crate::config::model::ConfigFile;
use crate::engine::{Scheduler, SchedulerOptions, SpeedTestService, SystemClock};
use crate::progress::ProgressSubscription;
use crate::store::{JsonFileStore, MemoryStore, Store};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the store and the speed test service
/// - the scheduler (daemon mode) or a single manual run (`--once`)
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_or_default(&args.config)?;

    if args.dry_run {
        let store = JsonFileStore::new(&cfg.store_path);
        print_dry_run(&cfg, &store).await?;
        return Ok(());
    }

    let root = CancellationToken::new();
    spawn_ctrl_c(root.clone());

    if args.once {
        return run_once(&args, &cfg, &root).await;
    }

    run_daemon(&cfg, &root).await
}

async fn run_once(args: &CliArgs, cfg: &ConfigFile, root: &CancellationToken) -> Result<()> {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let service = SpeedTestService::new(cfg.runner.clone(), store);

    let logger = tokio::spawn(log_progress(service.subscribe(), root.child_token()));

    let options = args.test_options();
    info!(?options, "running one manual test");
    let outcome = service.run_test_with_cancel(options, root.child_token()).await;
    logger.abort();

    let results = outcome?;
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

async fn run_daemon(cfg: &ConfigFile, root: &CancellationToken) -> Result<()> {
    let store: Arc<dyn Store> = Arc::new(JsonFileStore::new(&cfg.store_path));

    let seeds = cfg.schedule_seeds(chrono::Utc::now());
    info!(count = seeds.len(), store = ?cfg.store_path, "seeding configured schedules");
    for schedule in seeds {
        store.upsert_schedule(schedule).await?;
    }

    let service = Arc::new(SpeedTestService::new(cfg.runner.clone(), Arc::clone(&store)));
    let logger = tokio::spawn(log_progress(service.subscribe(), root.clone()));

    let scheduler = Scheduler::new(
        store,
        service,
        Arc::new(SystemClock),
        SchedulerOptions {
            tick_interval: cfg.tick_interval,
            run_timeout: cfg.scheduled_timeout,
        },
    );
    scheduler.start(root);

    root.cancelled().await;
    info!("shutdown requested");
    scheduler.shutdown().await;
    if let Err(e) = logger.await {
        warn!(error = %e, "progress logger ended abnormally");
    }

    Ok(())
}

fn spawn_ctrl_c(root: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("failed to listen for Ctrl+C: {e}");
            return;
        }
        root.cancel();
    });
}

/// Log each progress snapshot until `token` fires.
async fn log_progress(mut sub: ProgressSubscription, token: CancellationToken) {
    loop {
        let progress = tokio::select! {
            _ = token.cancelled() => break,
            p = sub.next() => p,
        };
        let Some(p) = progress else { break };
        info!(
            phase = ?p.kind,
            backend = %p.backend_kind,
            server = %p.current_server,
            speed_mbps = p.speed,
            percent = p.progress_percent,
            latency_ms = ?p.latency_ms,
            scheduled = p.is_scheduled,
            "progress"
        );
    }
}

/// Print effective config and stored schedules without running anything.
async fn print_dry_run(cfg: &ConfigFile, store: &JsonFileStore) -> Result<()> {
    println!("speedwatch dry-run");
    println!("  config.tick_interval = {:?}", cfg.tick_interval);
    println!("  config.scheduled_timeout = {:?}", cfg.scheduled_timeout);
    println!("  config.store_path = {}", cfg.store_path.display());
    println!("  backend.speedtest = {}", cfg.runner.speedtest_bin);
    println!("  backend.librespeed = {}", cfg.runner.librespeed_bin);
    println!("  backend.iperf3 = {}", cfg.runner.iperf3_bin);
    println!("  backend.ping = {} (count {})", cfg.runner.ping_bin, cfg.runner.ping_count);
    println!();

    println!("configured schedules ({}):", cfg.schedules.len());
    for (id, s) in cfg.schedules.iter() {
        println!("  - {id}");
        println!("      interval: {}", s.interval);
        if !s.servers.is_empty() {
            println!("      servers: {:?}", s.servers);
        }
        if !s.enabled {
            println!("      enabled: false");
        }
        if let Some(ref host) = s.host {
            println!("      host: {host}");
        }
    }
    println!();

    let stored = store.get_schedules().await?;
    println!("stored schedules ({}):", stored.len());
    for s in stored.iter() {
        let last = s
            .last_run
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "  - {} every {} (next {}, last {}, enabled {})",
            s.id,
            s.interval,
            s.next_run.to_rfc3339(),
            last,
            s.enabled
        );
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
