use anyhow::Result;
use flicksearch::config::ShardConfig;
use flicksearch::search::lexicon::{SynonymSource, TableSynonyms};
use flicksearch::search::shard::ShardNode;
use flicksearch::server::{serve, shard_app};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ShardConfig::from_env();
    info!(
        shard_id = config.shard_id,
        num_shards = config.num_shards,
        replica_id = config.replica_id,
        corpus = %config.corpus_path.display(),
        "starting shard replica"
    );

    let synonyms: Arc<dyn SynonymSource + Send + Sync> = match &config.synonyms_path {
        Some(path) => Arc::new(TableSynonyms::from_path(path)?),
        None => Arc::new(TableSynonyms::empty()),
    };

    let node = Arc::new(ShardNode::start(
        &config.corpus_path,
        config.shard_id,
        config.num_shards,
        config.replica_id,
        synonyms,
    )?);

    serve(shard_app(node), config.port).await
}
