//! taskpool CLI - remote endpoint and scheduling demo.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use taskpool_core::{DependentTask, Priority, SharedTask, Task};
use taskpool_execution::{Scheduler, Worker};
use taskpool_monitor::{PerformanceMonitor, TracingAlertSink};
use taskpool_remote::{remote_worker, RemoteEndpoint};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "taskpool")]
#[command(about = "Priority task scheduling across local and remote workers", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the remote execution endpoint until Ctrl-C
    Serve {
        /// Address to listen on
        #[arg(long)]
        bind: Option<String>,
        /// Simulated failure chance for received tasks (0.0 to 1.0)
        #[arg(long)]
        failure_rate: Option<f64>,
    },
    /// Schedule the sample workload on a local and a remote worker
    Demo {
        /// Remote endpoint as HOST:PORT
        #[arg(long)]
        remote: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind, failure_rate } => {
            if let Some(bind) = bind {
                config.endpoint.bind = bind;
            }
            if let Some(rate) = failure_rate {
                config.endpoint.failure_rate = rate;
            }
            serve(&config).await?;
        }
        Commands::Demo { remote } => {
            if let Some(address) = remote {
                config.set_remote_address(&address)?;
            }
            demo(&config).await?;
        }
    }

    Ok(())
}

async fn serve(config: &AppConfig) -> Result<()> {
    let endpoint = RemoteEndpoint::bind(&config.endpoint)
        .await
        .with_context(|| format!("failed to bind {}", config.endpoint.bind))?;
    println!("Listening on {}", endpoint.local_addr()?);
    endpoint.serve().await?;
    Ok(())
}

async fn demo(config: &AppConfig) -> Result<()> {
    let monitor = Arc::new(PerformanceMonitor::new(config.monitor, Arc::new(TracingAlertSink)));

    let local = Arc::new(
        Worker::local(config.retry)
            .with_config(config.worker)
            .with_observer(monitor.clone()),
    );
    let remote = Arc::new(
        remote_worker(config.remote.clone(), config.retry)
            .with_config(config.worker)
            .with_observer(monitor.clone()),
    );

    let scheduler = Scheduler::with_config(config.scheduler);
    scheduler.add_server(local.clone()).await?;
    scheduler.add_server(remote.clone()).await?;

    for task in sample_workload() {
        let id = task.id().clone();
        match scheduler.schedule_task(task).await {
            Ok(worker) => info!(task = %id, %worker, "Scheduled"),
            Err(e) => warn!(task = %id, "Could not schedule: {}", e),
        }
    }

    match scheduler.execute().await {
        Ok(report) => {
            for (worker, err) in report.failures() {
                error!(%worker, "Batch failed: {}", err);
            }
        }
        Err(e) => error!("Run aborted: {}", e),
    }

    for worker in [&local, &remote] {
        print_worker(worker).await;
        println!("{}", monitor.statistics(&worker.stats().await));
        println!();
    }

    Ok(())
}

/// A 7000ms task that always misses its 5000ms deadline, then the A, B, C chain.
fn sample_workload() -> Vec<SharedTask> {
    let slow = DependentTask::new(7000, Priority::Low).with_timeout(5000);
    let a = DependentTask::new(3000, Priority::High).with_timeout(5000);
    let b = DependentTask::new(3000, Priority::Medium)
        .with_timeout(5000)
        .with_dependency(a.id().clone());
    let c = DependentTask::new(2000, Priority::Low)
        .with_timeout(5000)
        .with_dependency(b.id().clone());

    [slow, a, b, c]
        .into_iter()
        .map(|task| Arc::new(task) as SharedTask)
        .collect()
}

async fn print_worker(worker: &Worker) {
    println!("== Worker {} ({}) ==", worker.label(), worker.id());

    println!("Pending:");
    for task in worker.pending_tasks().await {
        println!("  {} ({}ms, {})", task.id(), task.duration_ms(), task.priority());
    }

    println!("Completed:");
    for task in worker.completed_tasks().await {
        println!("  {} ({}ms, {})", task.id(), task.duration_ms(), task.priority());
    }

    println!("Failed:");
    for failure in worker.failure_log().await {
        println!(
            "  {} at {}: {}",
            failure.task.id(),
            failure.failed_at.format("%H:%M:%S"),
            failure.reason
        );
    }
}
