use crate::models::Document;
use crate::search::tokenization::tokenize;
use ahash::{AHashMap, AHashSet};
use rayon::prelude::*;

// Replace standard collections with ahash versions for better performance
type HashMap<K, V> = AHashMap<K, V>;
type HashSet<T> = AHashSet<T>;

/// Default cap on fuzzy candidates returned from the trigram prefilter
pub const DEFAULT_MAX_CANDIDATES: usize = 400;

/// Per-(token, document) record: which fields the token appears in and how
/// often, per field and in total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub fields: AHashSet<String>,
    pub tf: u32,
    pub tf_by_field: AHashMap<String, u32>,
}

impl Posting {
    fn new() -> Self {
        Posting {
            fields: HashSet::new(),
            tf: 0,
            tf_by_field: HashMap::new(),
        }
    }

    fn record(&mut self, field: &str) {
        self.tf += 1;
        *self.tf_by_field.entry(field.to_string()).or_insert(0) += 1;
        self.fields.insert(field.to_string());
    }
}

/// In-memory inverted index over one partition of the corpus.
///
/// `build` is single-shot: the index is computed once from a document batch
/// and read-only afterwards, so concurrent lookups need no locking.
#[derive(Debug, Default)]
pub struct Indexer {
    index: HashMap<String, HashMap<u64, Posting>>,
    doc_freq: HashMap<String, u32>,
    documents: HashMap<u64, Document>,
    total_documents: usize,
    // Vocabulary in sorted order; the trigram index refers into it so that
    // candidate accumulation order is reproducible across runs.
    vocabulary: Vec<String>,
    ngram_index: HashMap<String, Vec<u32>>,
}

impl Indexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the index from `documents` projected over `fields`, replacing
    /// any existing state. Tokenization runs per document in parallel; the
    /// merge into the inverted structure is sequential and deterministic.
    pub fn build(&mut self, documents: Vec<Document>, fields: &[&str]) {
        *self = Self::default();

        // token streams per (doc, field), computed in parallel
        let tokenized: Vec<(u64, Vec<(String, Vec<String>)>)> = documents
            .par_iter()
            .map(|doc| {
                let per_field = fields
                    .iter()
                    .filter_map(|field| {
                        doc.field_text(field)
                            .map(|text| (field.to_string(), tokenize(&text)))
                    })
                    .collect();
                (doc.id, per_field)
            })
            .collect();

        for (doc, (doc_id, per_field)) in documents.into_iter().zip(tokenized) {
            self.total_documents += 1;

            let mut seen_tokens: HashSet<&str> = HashSet::new();
            for (field, tokens) in &per_field {
                for token in tokens {
                    self.index
                        .entry(token.clone())
                        .or_default()
                        .entry(doc_id)
                        .or_insert_with(Posting::new)
                        .record(field);
                }
            }
            // doc_freq counts each distinct token once per document
            for (_, tokens) in &per_field {
                for token in tokens {
                    if seen_tokens.insert(token) {
                        *self.doc_freq.entry(token.clone()).or_insert(0) += 1;
                    }
                }
            }

            self.documents.insert(doc_id, doc);
        }

        self.build_ngram_index();
    }

    fn build_ngram_index(&mut self) {
        let mut vocabulary: Vec<String> = self.index.keys().cloned().collect();
        vocabulary.sort();

        let mut ngram_index: HashMap<String, Vec<u32>> = HashMap::new();
        for (token_id, token) in vocabulary.iter().enumerate() {
            for gram in character_ngrams(token) {
                ngram_index.entry(gram).or_default().push(token_id as u32);
            }
        }

        self.vocabulary = vocabulary;
        self.ngram_index = ngram_index;
    }

    /// Returns the postings for `token` as a defensive copy: callers may
    /// mutate the returned map without affecting the index.
    pub fn lookup(&self, token: &str) -> HashMap<u64, Posting> {
        self.index.get(token).cloned().unwrap_or_default()
    }

    /// True when the token occurs anywhere in this partition.
    pub fn contains_token(&self, token: &str) -> bool {
        self.index.contains_key(token)
    }

    /// Inverse document frequency: `ln(total_documents / (doc_freq + 1))`.
    /// Unknown tokens have `doc_freq = 0`; the value goes negative once
    /// `doc_freq + 1` exceeds the document count.
    pub fn idf(&self, token: &str) -> f64 {
        let df = self.doc_freq.get(token).copied().unwrap_or(0);
        (self.total_documents as f64 / (df as f64 + 1.0)).ln()
    }

    pub fn doc_freq(&self, token: &str) -> u32 {
        self.doc_freq.get(token).copied().unwrap_or(0)
    }

    pub fn total_documents(&self) -> usize {
        self.total_documents
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn document(&self, doc_id: u64) -> Option<&Document> {
        self.documents.get(&doc_id)
    }

    /// Vocabulary tokens that share character n-grams with `token`, ordered
    /// by overlap count descending (first-seen order on ties) and truncated
    /// to `max_candidates`. Tokens of six or more characters must share at
    /// least two grams; shorter ones just one.
    pub fn fuzzy_candidates(&self, token: &str, max_candidates: usize) -> Vec<String> {
        let grams = character_ngrams(token);
        if grams.is_empty() {
            return vec![];
        }

        // overlap count and first-seen rank per candidate token id
        let mut counts: HashMap<u32, (usize, usize)> = HashMap::new();
        let mut next_rank = 0usize;
        for gram in &grams {
            if let Some(token_ids) = self.ngram_index.get(gram) {
                for &token_id in token_ids {
                    let entry = counts.entry(token_id).or_insert_with(|| {
                        let rank = next_rank;
                        next_rank += 1;
                        (0, rank)
                    });
                    entry.0 += 1;
                }
            }
        }

        let min_overlap = if token.chars().count() >= 6 { 2 } else { 1 };

        let mut candidates: Vec<(u32, usize, usize)> = counts
            .into_iter()
            .filter(|(_, (count, _))| *count >= min_overlap)
            .map(|(token_id, (count, rank))| (token_id, count, rank))
            .collect();
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
        candidates.truncate(max_candidates);

        candidates
            .into_iter()
            .map(|(token_id, _, _)| self.vocabulary[token_id as usize].clone())
            .collect()
    }
}

/// Character n-grams used by the fuzzy prefilter: trigrams normally,
/// bigrams for two-character tokens, the token itself below that.
fn character_ngrams(token: &str) -> Vec<String> {
    let chars: Vec<char> = token.chars().collect();
    let n = match chars.len() {
        0 => return vec![],
        1 => return vec![token.to_string()],
        2 => 2,
        _ => 3,
    };
    chars
        .windows(n)
        .map(|window| window.iter().collect())
        .collect()
}
