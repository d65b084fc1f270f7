// src/lib.rs

pub mod batch;
pub mod cli;
pub mod config;
pub mod deps;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod queue;
pub mod recovery;
pub mod registry;
pub mod resources;
pub mod sched;
pub mod task;
pub mod types;

use std::path::PathBuf;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::{Runtime, RuntimeEvent, RuntimeOptions};
use crate::errors::SchedulerError;
use crate::exec::RealWorkerBackend;
use crate::recovery::RecoveryLog;
use crate::sched::SchedulerCore;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - scheduler core / worker pool / runtime
/// - (optional) recovery-log restore
/// - Ctrl-C handling
///
/// The workload from the config file is seeded synchronously before the
/// event loop starts, so admission errors surface immediately; the runtime
/// then runs the workload to completion and exits when idle.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let scheduler_cfg = cfg.scheduler().clone();
    let mut core = SchedulerCore::new(scheduler_cfg.clone(), cfg.resources());

    let recovery = scheduler_cfg
        .recovery_log
        .as_ref()
        .map(RecoveryLog::new);

    if args.resume {
        let Some(log) = &recovery else {
            anyhow::bail!("--resume requires [scheduler].recovery_log to be set");
        };
        let records = log.recover()?;
        info!(records = records.len(), "resuming from recovery log");
        core.restore(records)?;
        // Compact: rewrite the log from the reconstructed state so corrupt
        // lines do not survive into the next restart.
        log.persist(&core.snapshot())?;
    }

    // Seed the workload. On --resume, identities already restored from the
    // log are skipped rather than re-admitted.
    for spec in cfg.task_specs() {
        match core.submit(spec) {
            Ok(id) => debug!(task = %id, "workload task seeded"),
            Err(SchedulerError::DuplicateIdentity(id)) if args.resume => {
                debug!(task = %id, "already present from recovery, skipping")
            }
            Err(err) => return Err(err.into()),
        }
    }

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    // Worker pool backend (real implementation in production).
    let workers = RealWorkerBackend::new(
        rt_tx.clone(),
        scheduler_cfg.max_workers,
        scheduler_cfg.cost_unit_ms,
    );

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let options = RuntimeOptions {
        exit_when_idle: true,
        recovery,
    };

    let runtime = Runtime::new(core, rt_rx, workers, options);
    runtime.run().await?;
    Ok(())
}

/// Simple dry-run output: print scheduler settings and the workload.
fn print_dry_run(cfg: &ConfigFile) {
    let sched = cfg.scheduler();
    println!("batchdag dry-run");
    println!("  scheduler.max_workers = {}", sched.max_workers);
    println!("  scheduler.max_batch_capacity = {}", sched.max_batch_capacity);
    println!("  scheduler.max_retries = {}", sched.max_retries);
    println!(
        "  scheduler.non_batchable_kinds = {:?}",
        sched.non_batchable_kinds
    );
    println!();

    if !cfg.resources().is_empty() {
        println!("resources:");
        for (name, total) in cfg.resources().iter() {
            println!("  - {name}: {total}");
        }
        println!();
    }

    println!("tasks ({}):", cfg.tasks().len());
    for (name, task) in cfg.tasks().iter() {
        println!("  - {name}");
        println!("      kind: {}", task.kind);
        println!("      cost: {}", task.cost);
        if task.priority != 0 {
            println!("      priority: {}", task.priority);
        }
        if !task.requires.is_empty() {
            println!("      requires: {:?}", task.requires);
        }
        if !task.after.is_empty() {
            println!("      after: {:?}", task.after);
        }
        if let Some(ms) = task.deadline_ms {
            println!("      deadline_ms: {ms}");
        }
    }

    debug!("dry-run complete (no execution)");
}
