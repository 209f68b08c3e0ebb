//! Stagwell Runner server.
//!
//! Runs the cron-scheduled batches and the HTTP trigger surface.
//!
//! Environment variables:
//! - `STAGWELL_WEB_PORT` - Server port (default: 8080)
//! - `STAGWELL_WEB_USER` - Basic auth username (default: "admin")
//! - `STAGWELL_WEB_PASS` - Basic auth password (auth disabled if not set)

use std::sync::Arc;

use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = stagwell_runner::init_logging();

    info!("Starting Stagwell Runner");

    if let Some(dir) = stagwell_runner::log_dir() {
        info!("Log files saved to: {}", dir.display());
    }

    let port: u16 = std::env::var("STAGWELL_WEB_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    if std::env::var("STAGWELL_WEB_PASS")
        .map(|p| !p.is_empty())
        .unwrap_or(false)
    {
        let user = std::env::var("STAGWELL_WEB_USER").unwrap_or_else(|_| "admin".to_string());
        info!("Basic auth enabled (user: {})", user);
    } else {
        info!("Basic auth disabled (set STAGWELL_WEB_PASS to enable)");
    }

    let state = Arc::new(stagwell_runner::AppState::new());

    // Keep the scheduler handle alive for the lifetime of the server.
    let _scheduler = stagwell_runner::scheduler::start(state.clone()).await?;

    stagwell_runner::web::start_server(state, port).await?;

    Ok(())
}
