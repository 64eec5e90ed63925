//! Binary entry point (§10 "CLI"): parses the CLI, loads configuration,
//! initializes logging, wires every collaborator built across the
//! workspace into one `Dispatcher`, rebuilds the scheduler's view of the
//! store, and serves the wire protocol until an interrupt is received.
//!
//! Mirrors the reference crate's own `bin/backend/src/main.rs`: a thin
//! binary that composes library crates rather than containing logic
//! itself, modulo the TCP listener this service needs instead of an HTTP
//! server (see `SPEC_FULL.md`/`DESIGN.md` for that transport swap).

mod cli;
mod config;
mod files;
mod listener;
mod logging;
mod startup;

use clap::Parser;
use host_arbiter::Arbiter;
use host_core::{Clock, ScaledClock};
use host_domain::{GameDomain, NullForum, NullMailQueue, NullSessionRouter, PlayerDomain, ScheduleDomain, ToolCatalog, TurnDomain};
use host_dispatch::Dispatcher;
use host_scheduler::Scheduler;
use host_store::{GameStoreView, MemoryStore, RedisStore, Store};
use host_subprocess::ProcessRunner;
use std::sync::Arc;
use tokio::sync::Mutex;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let config = config::Config::load(&cli)?;
    logging::init(&config)?;

    log::info!(
        "[main] starting hoststation, workdir={}, backups={:?}",
        config.workdir.display(),
        config.backups
    );
    std::fs::create_dir_all(&config.workdir)?;
    if let Some(bindir) = &config.bindir {
        // §6 "BINDIR ... exported to child processes": the subprocess
        // runner spawns engine/checker/master binaries with this on PATH.
        let path = std::env::var("PATH").unwrap_or_default();
        // SAFETY: single-threaded at this point in startup, before any
        // subprocess is spawned or any other thread reads the environment.
        unsafe {
            std::env::set_var("PATH", format!("{bindir}:{path}"));
        }
    }

    let mut reconnectable: Vec<Arc<dyn host_dispatch::Reconnectable>> = Vec::new();
    let store: Arc<dyn Store> = match &config.redis_url {
        Some(url) => {
            log::info!("[main] using redis store at {url}");
            let redis = Arc::new(RedisStore::new(url)?);
            reconnectable.push(redis.clone() as Arc<dyn host_dispatch::Reconnectable>);
            redis
        }
        None => {
            log::warn!("[main] no REDIS.URL configured, using in-memory store (state will not survive a restart)");
            Arc::new(MemoryStore::new())
        }
    };
    let store = Arc::new(GameStoreView::new(store));

    let host_files = Arc::new(files::LocalFileService::new(config.workdir.join("hostfiles"))?);
    let user_files = Arc::new(files::LocalFileService::new(config.workdir.join("userfiles"))?);
    let host_files_dyn: Arc<dyn host_domain::FileService> = host_files.clone();
    let user_files_dyn: Arc<dyn host_domain::FileService> = user_files.clone();

    let clock: Arc<dyn Clock> = Arc::new(ScaledClock::new(config.timescale));
    let arbiter = Arc::new(Arbiter::new());
    let checker = Arc::new(ProcessRunner::new());
    let engine_runner = Arc::new(ProcessRunner::new());
    let random = Arc::new(host_core::Random::from_entropy());

    let games = Arc::new(GameDomain::new(
        store.clone(),
        Arc::new(NullForum),
        Arc::new(NullSessionRouter),
        // Replaced below with the real scheduler once it exists (both sides
        // need an `Arc` to the other; the scheduler is built first and
        // handed in here instead, since `ScheduleNotifier` is the only
        // cross-cutting trait and `Scheduler` already implements it).
        Arc::new(host_domain::NullScheduleNotifier),
    ));
    let catalog = Arc::new(ToolCatalog::new(store.clone(), host_files_dyn.clone()));
    // The one global service mutex (§5): shared, not merely mirrored,
    // between the dispatcher and the scheduler worker.
    let service_lock = Arc::new(Mutex::new(()));
    let scheduler = Arc::new(Scheduler::new(
        store.clone(),
        arbiter.clone(),
        engine_runner,
        clock.clone(),
        games.clone(),
        catalog.clone(),
        service_lock.clone(),
    ));

    let games = Arc::new(GameDomain::new(
        store.clone(),
        Arc::new(NullForum),
        Arc::new(NullSessionRouter),
        scheduler.clone(),
    ));
    let players = Arc::new(PlayerDomain::new(store.clone(), user_files_dyn.clone(), scheduler.clone()));
    let turns = Arc::new(TurnDomain::new(
        store.clone(),
        host_files_dyn.clone(),
        checker,
        config.checker_program.clone(),
        scheduler.clone(),
    ));
    let schedules = Arc::new(ScheduleDomain::new(store.clone(), random));
    let _mail = Arc::new(NullMailQueue);

    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        games,
        players,
        turns,
        schedules,
        catalog,
        arbiter,
        scheduler.clone(),
        host_files_dyn,
        clock.clone(),
        reconnectable,
        service_lock,
    ));

    startup::rebuild(&store, &scheduler, &clock, config.initial_suspend).await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let scheduler_task = if cli.nocron {
        log::warn!("[main] --nocron set, scheduler worker disabled");
        None
    } else {
        let scheduler = scheduler.clone();
        Some(tokio::spawn(async move { scheduler.run().await }))
    };

    let ctrl_c_shutdown = shutdown_tx.clone();
    let ctrl_c_scheduler = scheduler.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("[main] interrupt received, shutting down");
            let _ = ctrl_c_shutdown.send(true);
            ctrl_c_scheduler.request_shutdown();
        }
    });

    listener::serve(&config.bind_addr, dispatcher, shutdown_rx).await?;
    if let Some(task) = scheduler_task {
        let _ = task.await;
    }
    log::info!("[main] shut down cleanly");
    Ok(())
}
