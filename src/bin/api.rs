use dotenvy::dotenv;
use taskqueue_core::http;
use taskqueue_core::{Platform, PlatformConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = PlatformConfig::load()?;
    let bind_addr = config.http.bind_addr.clone();

    let platform = Platform::new(config);
    let runtime = platform.start().await?;

    let app = http::router(runtime.context());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(%bind_addr, "submission endpoint listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down submission endpoint");
        })
        .await?;

    runtime.shutdown().await?;
    Ok(())
}
