use anyhow::Context;
use tracing::info;

use page_canvas::app::{app, AppState};
use page_canvas::auth::Authenticator;
use page_canvas::config::config;
use page_canvas::provider::source_provider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, GIT_REPO_PATH, etc.
    let _ = dotenvy::dotenv();

    let config = config();
    page_canvas::init_tracing(if config.server.enable_request_logging {
        "info,tower_http=debug"
    } else {
        "info"
    });
    info!("Starting Page Canvas API in {:?} mode", config.environment);

    let provider = source_provider().context("failed to initialize source provider")?;
    let auth = Authenticator::from_config(&config.auth).context("failed to initialize authentication")?;

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!("Page Canvas API listening on http://{}", bind_addr);
    axum::serve(listener, app(AppState::new(provider, auth))).await?;
    Ok(())
}
