use crate::corpus::load_corpus;
use crate::errors::SearchError;
use crate::models::{Document, SearchResponse};
use crate::search::engine::QueryEngine;
use crate::search::index::Indexer;
use crate::search::lexicon::SynonymSource;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Fields projected into the inverted index, in scoring-relevance order
pub const INDEXED_FIELDS: &[&str] = &[
    "title",
    "year",
    "genres",
    "description",
    "cast",
    "director",
    "rating",
];

/// One replica of one corpus partition: an inverted index plus its query
/// engine, bound to a shard id.
///
/// The node is built once at startup and read-only afterwards; `search` is
/// safe to call from any number of tasks concurrently.
pub struct ShardNode {
    indexer: Arc<Indexer>,
    engine: QueryEngine,
    shard_id: u32,
    num_shards: u32,
    replica_id: u32,
    is_ready: bool,
}

impl ShardNode {
    /// Loads the corpus file, retains this shard's partition and builds the
    /// index.
    pub fn start(
        corpus_path: &Path,
        shard_id: u32,
        num_shards: u32,
        replica_id: u32,
        synonyms: Arc<dyn SynonymSource + Send + Sync>,
    ) -> anyhow::Result<Self> {
        let load_start = Instant::now();
        let documents = load_corpus(corpus_path)?;
        let loaded = documents.len();
        info!(
            count = loaded,
            took_ms = load_start.elapsed().as_millis() as u64,
            "corpus loaded"
        );

        Ok(Self::from_documents(
            documents, shard_id, num_shards, replica_id, synonyms,
        ))
    }

    /// Builds a node directly from documents; the partition filter still
    /// applies.
    pub fn from_documents(
        mut documents: Vec<Document>,
        shard_id: u32,
        num_shards: u32,
        replica_id: u32,
        synonyms: Arc<dyn SynonymSource + Send + Sync>,
    ) -> Self {
        if num_shards > 1 {
            let before = documents.len();
            documents.retain(|doc| doc.id % num_shards as u64 == shard_id as u64);
            info!(
                shard_id,
                num_shards,
                kept = documents.len(),
                of = before,
                "partitioned corpus"
            );
        }

        let index_start = Instant::now();
        let mut indexer = Indexer::new();
        indexer.build(documents, INDEXED_FIELDS);
        info!(
            total_documents = indexer.total_documents(),
            vocabulary_size = indexer.vocabulary_size(),
            took_ms = index_start.elapsed().as_millis() as u64,
            "index built"
        );

        let indexer = Arc::new(indexer);
        let engine = QueryEngine::new(Arc::clone(&indexer), synonyms);

        ShardNode {
            indexer,
            engine,
            shard_id,
            num_shards,
            replica_id,
            is_ready: true,
        }
    }

    pub fn shard_id(&self) -> u32 {
        self.shard_id
    }

    pub fn num_shards(&self) -> u32 {
        self.num_shards
    }

    pub fn replica_id(&self) -> u32 {
        self.replica_id
    }

    /// True once the index has been built.
    pub fn is_ready(&self) -> bool {
        self.is_ready
    }

    pub fn total_documents(&self) -> usize {
        self.indexer.total_documents()
    }

    /// Searches this partition. The engine always runs in debug mode
    /// because the coordinator needs scores to merge shard pages; the
    /// caller's `debug` flag only controls what the projection keeps.
    pub fn search(
        &self,
        query: &str,
        page: usize,
        page_size: usize,
        debug: bool,
    ) -> Result<SearchResponse, SearchError> {
        if !self.is_ready || self.indexer.total_documents() == 0 {
            return Err(SearchError::IndexNotReady);
        }
        if query.trim().is_empty() {
            return Err(SearchError::invalid_query(serde_json::json!({
                "query": query
            })));
        }
        if page < 1 {
            return Err(SearchError::invalid_query(serde_json::json!({
                "page": page
            })));
        }

        let raw_results = self.engine.search(query, true);
        let total_hits = raw_results.len();

        let start = (page - 1) * page_size;
        let end = (start + page_size).min(total_hits);
        let page_results: &[_] = raw_results.get(start..end).unwrap_or(&[]);

        let results = page_results
            .iter()
            .cloned()
            .map(|mut item| {
                if !debug {
                    item.score = None;
                    item.explanations = None;
                }
                item
            })
            .collect();

        Ok(SearchResponse {
            query: query.to_string(),
            total_hits,
            page,
            page_size,
            results,
        })
    }

    /// Liveness snapshot for the internal health endpoint.
    pub fn health(&self) -> serde_json::Value {
        serde_json::json!({
            "total_documents": self.indexer.total_documents(),
            "vocabulary_size": self.indexer.vocabulary_size(),
            "status": "ok",
        })
    }
}
