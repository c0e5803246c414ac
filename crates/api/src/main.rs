use std::time::Duration;

use anyhow::Result;
use hakach_api::{build_router, build_state, AppConfig};
use hakach_observability::init_tracing;

const PURGE_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("hakach_api");

    let config = AppConfig::from_env();
    let bind = config.bind.clone();
    let knowledge = config.knowledge.describe();

    let state = build_state(config).await?;

    let assistant = state.assistant.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            match assistant.purge_expired_sessions().await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "expired sessions purged"),
                Err(err) => tracing::warn!(error = %err, "session purge failed"),
            }
        }
    });

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(bind = %bind, knowledge = %knowledge, "hakach support api started");

    axum::serve(listener, app).await?;
    Ok(())
}
