use flicksearch::config::ShardGroups;
use flicksearch::coordinator::Coordinator;
use flicksearch::models::Document;
use flicksearch::search::lexicon::TableSynonyms;
use flicksearch::search::shard::ShardNode;
use flicksearch::server::{coordinator_app, shard_app};
use std::sync::Arc;
use tokio::net::TcpListener;

pub fn movie(id: u64, title: &str, cast: &[&str]) -> Document {
    Document {
        id,
        title: title.to_string(),
        cast: cast.iter().map(|c| c.to_string()).collect(),
        year: Some(2000),
        ..Document::default()
    }
}

/// Serves a shard replica over the given partition on an ephemeral port and
/// returns its base URL.
pub async fn spawn_shard(documents: Vec<Document>, shard_id: u32, num_shards: u32) -> String {
    let node = Arc::new(ShardNode::from_documents(
        documents,
        shard_id,
        num_shards,
        0,
        Arc::new(TableSynonyms::empty()),
    ));
    spawn_app(shard_app(node)).await
}

/// Serves a coordinator over the given topology on an ephemeral port.
/// The heartbeat is NOT started; tests that need membership state drive it
/// explicitly or start it themselves.
pub async fn spawn_coordinator(shard_groups: ShardGroups) -> (Arc<Coordinator>, String) {
    let coordinator = Coordinator::new(shard_groups).expect("coordinator construction");
    let base = spawn_app(coordinator_app(Arc::clone(&coordinator))).await;
    (coordinator, base)
}

pub async fn spawn_app(app: axum::Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server task");
    });
    format!("http://{addr}")
}

/// A base URL nothing listens on (the port is bound and released).
pub fn dead_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}

pub fn groups(entries: &[(u32, Vec<String>)]) -> ShardGroups {
    entries.iter().cloned().collect()
}
