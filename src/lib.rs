//! # Flicksearch
//!
//! A small distributed full-text search engine over a fixed movie corpus.
//!
//! The corpus is partitioned by document id across shard nodes, each holding
//! an in-memory inverted index with per-field term frequencies. A
//! coordinator fans keyword queries out to every shard group, picks replicas
//! by heartbeat-derived health, merges the partial pages into a global
//! `(-score, doc_id)` order and paginates. An optional router tier
//! round-robins across coordinators.
//!
//! ## Searching one partition
//!
//! ```no_run
//! use flicksearch::models::Document;
//! use flicksearch::search::lexicon::TableSynonyms;
//! use flicksearch::search::shard::ShardNode;
//! use std::sync::Arc;
//!
//! let documents = vec![Document {
//!     id: 1,
//!     title: "Mission Impossible".to_string(),
//!     cast: vec!["Tom Cruise".to_string()],
//!     ..Document::default()
//! }];
//! let node = ShardNode::from_documents(
//!     documents,
//!     0,
//!     1,
//!     0,
//!     Arc::new(TableSynonyms::empty()),
//! );
//! let page = node.search("mission", 1, 10, false).unwrap();
//! println!("{} hits", page.total_hits);
//! ```

pub mod config;
pub mod coordinator;
pub mod corpus;
pub mod errors;
pub mod models;
pub mod router;
pub mod search;
pub mod server;

// Re-export commonly used types for convenience
pub use coordinator::Coordinator;
pub use errors::SearchError;
pub use models::{ApiResponse, Document, SearchItem, SearchResponse};
pub use search::{Indexer, QueryEngine, ShardNode};

// Tests are defined in their respective modules with #[cfg(test)]
