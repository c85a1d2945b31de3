use anyhow::Result;
use flicksearch::config::RouterConfig;
use flicksearch::router::Router;
use flicksearch::server::{router_app, serve};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = RouterConfig::from_env()?;
    info!(
        coordinators = config.coordinator_urls.len(),
        "starting router"
    );

    let router = Router::new(config.coordinator_urls)?;
    router.spawn_health_loop().await;

    let result = serve(router_app(Arc::clone(&router)), config.port).await;

    router.shutdown().await;
    result
}
