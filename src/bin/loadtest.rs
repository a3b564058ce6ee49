//! Load-test driver: submits a batch of tasks against a running submission
//! endpoint and reports how long the backlog takes to clear.

use std::time::{Duration, Instant};

use clap::Parser;
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the submission endpoint.
    #[arg(long, default_value = "http://localhost:8080")]
    api_endpoint: String,

    /// Total number of tasks to submit.
    #[arg(long, default_value_t = 200)]
    total: usize,

    /// Fraction (0-100) of tasks submitted as "long" rather than "short".
    #[arg(long, default_value_t = 20)]
    long_percent: u64,

    /// Poll interval while waiting for the backlog to clear.
    #[arg(long, default_value_t = 500)]
    poll_interval_ms: u64,
}

#[derive(Debug, Serialize)]
struct SubmitBody {
    job_type: String,
    payload: String,
}

#[derive(Debug, Deserialize)]
struct QueueStatus {
    total_backlog: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;

    let fifo_url = format!("{}/task/fifo", args.api_endpoint);
    let pq_url = format!("{}/task/pq", args.api_endpoint);
    let status_url = format!("{}/queue/status", args.api_endpoint);

    info!(total = args.total, "submitting tasks");
    let submit_start = Instant::now();

    for i in 0..args.total {
        let job_type = if (i as u64) % 100 < args.long_percent { "long" } else { "short" };
        let url = if i % 2 == 0 { &fifo_url } else { &pq_url };

        let body = SubmitBody {
            job_type: job_type.to_string(),
            payload: format!("loadtest-{i}"),
        };

        match client.post(url).json(&body).send().await {
            Ok(resp) => info!(index = i, url, status = %resp.status(), "submitted"),
            Err(err) => info!(index = i, url, %err, "submission failed"),
        }
    }

    info!("waiting for backlog to clear");
    loop {
        match fetch_backlog(&client, &status_url).await {
            Ok(0) => break,
            Ok(backlog) => info!(backlog, "backlog remaining"),
            Err(err) => info!(%err, "status poll failed"),
        }
        tokio::time::sleep(Duration::from_millis(args.poll_interval_ms)).await;
    }

    let clearance = submit_start.elapsed();
    let throughput = args.total as f64 / clearance.as_secs_f64();

    println!("tasks: {}", args.total);
    println!("clearance time: {clearance:?}");
    println!("throughput: {throughput:.2} tasks/sec");

    Ok(())
}

async fn fetch_backlog(client: &reqwest::Client, status_url: &str) -> anyhow::Result<i64> {
    let status: QueueStatus = client.get(status_url).send().await?.json().await?;
    Ok(status.total_backlog)
}
