use clap::Parser;
use ledger_node::{config::Config, router, AppState};
use std::net::SocketAddr;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    let state = AppState::from_config(&config)?;
    let ledger = state.ledger.clone();
    info!(
        length = ledger.chain_length(),
        peers = ledger.nodes().len(),
        "ledger ready"
    );

    let addr: SocketAddr = config.listen_addr().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("ledger-node listening on http://{addr}");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(err) = ledger.save() {
        warn!(error = %err, "final chain flush failed");
    }
    info!("ledger-node stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "could not install ctrl-c handler");
        std::future::pending::<()>().await;
    }
}
