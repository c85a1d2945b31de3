use anyhow::Result;
use flicksearch::config::CoordinatorConfig;
use flicksearch::coordinator::Coordinator;
use flicksearch::server::{coordinator_app, serve};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = CoordinatorConfig::from_env()?;
    info!(
        shard_groups = config.shard_groups.len(),
        "starting coordinator"
    );

    let coordinator = Coordinator::new(config.shard_groups)?;
    coordinator.spawn_heartbeat().await;

    let result = serve(coordinator_app(Arc::clone(&coordinator)), config.port).await;

    coordinator.shutdown().await;
    result
}
