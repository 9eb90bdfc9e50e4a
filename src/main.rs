use anyhow::Context;
use lockdesk::{api, config::Config, HttpLedger, LockDesk, StaticSession};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("Configuration error")?;
    let port = config.port;

    let ledger = Arc::new(HttpLedger::new(
        config.ledger_api_url.clone(),
        config.request_timeout,
    ));
    let session = Arc::new(StaticSession::new(config.account.clone()));
    let desk = Arc::new(LockDesk::from_ledger(
        ledger,
        session,
        config.default_reinvest_duration_secs,
    ));

    match desk.refresh().await {
        Ok(snapshot) => tracing::info!(
            generation = snapshot.generation,
            groups = snapshot.groups.len(),
            "Initial lock snapshot loaded"
        ),
        Err(e) => tracing::warn!(
            error = %e,
            "Initial refresh failed, starting with an empty snapshot"
        ),
    }

    let app = api::create_router(api::AppState::new(desk));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
