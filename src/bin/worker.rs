use clap::Parser;
use dotenvy::dotenv;
use taskqueue_core::retry::retry_scheduler_service;
use taskqueue_core::worker::{worker_loop_service, QueueSelector, WorkerMode};
use taskqueue_core::{Platform, PlatformConfig};
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Queue this worker polls: "fifo" or "priority".
    #[arg(long, default_value = "fifo")]
    queue: String,

    /// Execution mode: "simple" (always succeeds) or "retry" (failure injection).
    #[arg(long, default_value = "simple")]
    mode: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let args = Args::parse();
    let selector = QueueSelector::parse(&args.queue)
        .ok_or_else(|| anyhow::anyhow!("--queue must be 'fifo' or 'priority', got '{}'", args.queue))?;
    let mode = WorkerMode::parse(&args.mode)
        .ok_or_else(|| anyhow::anyhow!("--mode must be 'simple' or 'retry', got '{}'", args.mode))?;

    let config = PlatformConfig::load()?;
    let mut platform = Platform::new(config);
    platform.register_service(worker_loop_service(selector, mode));
    platform.register_service(retry_scheduler_service());

    let runtime = platform.start().await?;
    info!(queue = args.queue, mode = args.mode, "worker started");

    tokio::signal::ctrl_c().await?;
    info!("shutting down worker");
    runtime.shutdown().await?;

    Ok(())
}
