use crate::models::{Explanation, SearchItem};
use crate::search::index::Indexer;
use crate::search::lexicon::SynonymSource;
use crate::search::tokenization::tokenize;
use ahash::{AHashMap, AHashSet};
use std::cmp::Ordering;
use std::sync::Arc;

// Fuzzy guardrails
pub const FUZZY_MIN_TOKEN_LEN: usize = 4;
pub const FUZZY_MAX_TOKENS_PER_QUERY: usize = 3;
/// Minimum edit similarity (normalized indel ratio) a fuzzy match must reach
pub const FUZZY_SCORE_THRESHOLD: f64 = 0.80;
pub const FUZZY_NON_TITLE_PENALTY: f64 = 0.6;
pub const FUZZY_DESCRIPTION_PENALTY: f64 = 0.8;
/// Candidate pool requested from the trigram prefilter per fuzzy token
const FUZZY_CANDIDATE_POOL: usize = 300;
/// Fuzzy matches kept per token after similarity ranking
const FUZZY_KEEP_TOP: usize = 3;

// Synonym guardrails
pub const SYN_MAX_PER_BASE_TOKEN: usize = 5;
pub const SYN_SKIP_SHORT_TOKENS_LEN: usize = 3;

/// Scoring weight of a document field. Fields outside the known set carry
/// zero weight but still show up in explanations.
pub fn field_weight(field: &str) -> f64 {
    match field {
        "title" => 5.0,
        "cast" => 4.0,
        "director" => 3.0,
        "genres" => 3.0,
        "description" => 1.0,
        "year" => 0.5,
        "rating" => 0.1,
        _ => 0.0,
    }
}

fn is_pure_digits(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}

/// Ranks documents of one partition against a keyword query.
///
/// Scoring is weighted TF-IDF over the posting fields, with bounded synonym
/// expansion for recall and trigram-prefiltered fuzzy matching for typos.
/// Fuzzy contributions are penalized outside the title field.
pub struct QueryEngine {
    indexer: Arc<Indexer>,
    synonyms: Arc<dyn SynonymSource + Send + Sync>,
}

impl QueryEngine {
    pub fn new(indexer: Arc<Indexer>, synonyms: Arc<dyn SynonymSource + Send + Sync>) -> Self {
        QueryEngine { indexer, synonyms }
    }

    /// Searches the partition and returns rendered items sorted by
    /// `(-score, doc_id)`. With `debug` the items carry their score and
    /// per-token explanation records.
    pub fn search(&self, query: &str, debug: bool) -> Vec<SearchItem> {
        if query.is_empty() {
            return vec![];
        }

        let tokens = tokenize(query);
        if tokens.is_empty() {
            return vec![];
        }

        // unique base tokens in first-appearance order; expansions append
        let mut seen: AHashSet<String> = AHashSet::new();
        let base_tokens: Vec<String> = tokens
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect();
        let base_count = base_tokens.len();
        let expanded = self.expand_tokens(base_tokens, &mut seen);

        let mut scores: AHashMap<u64, f64> = AHashMap::new();
        let mut explanations: AHashMap<u64, Vec<Explanation>> = AHashMap::new();

        let mut fuzzy_budget = FUZZY_MAX_TOKENS_PER_QUERY;

        for (i, token) in expanded.iter().enumerate() {
            let is_base = i < base_count;

            let matches: Vec<(String, f64)> = if self.indexer.contains_token(token) {
                vec![(token.clone(), 1.0)]
            } else {
                // expansions never trigger fuzzy matching; they exist for
                // recall, not typo correction
                if !is_base
                    || is_pure_digits(token)
                    || token.chars().count() < FUZZY_MIN_TOKEN_LEN
                    || fuzzy_budget == 0
                {
                    continue;
                }
                let candidates = self.indexer.fuzzy_candidates(token, FUZZY_CANDIDATE_POOL);
                // the budget pays for the attempt, not the outcome
                fuzzy_budget -= 1;
                self.closest_tokens(token, &candidates)
            };

            for (match_token, similarity) in &matches {
                self.score_token_match(
                    token,
                    match_token,
                    *similarity,
                    debug,
                    &mut scores,
                    &mut explanations,
                );
            }
        }

        let mut ranked: Vec<(u64, f64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| match b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal) {
            Ordering::Equal => a.0.cmp(&b.0),
            other => other,
        });

        ranked
            .into_iter()
            .filter_map(|(doc_id, score)| {
                self.indexer.document(doc_id).map(|doc| SearchItem {
                    doc_id,
                    title: doc.title.clone(),
                    director: doc.director.clone(),
                    cast: doc.cast.clone(),
                    year: doc.year.map(|y| y.to_string()).unwrap_or_default(),
                    rating: doc.rating.map(|r| r.to_string()).unwrap_or_default(),
                    score: debug.then_some(score),
                    explanations: if debug {
                        Some(explanations.remove(&doc_id).unwrap_or_default())
                    } else {
                        None
                    },
                })
            })
            .collect()
    }

    /// Appends up to `SYN_MAX_PER_BASE_TOKEN` synonym tokens per base token.
    /// Digit tokens and tokens of three characters or fewer are not
    /// expanded, and a lemma that re-tokenizes to the base token is skipped.
    fn expand_tokens(&self, base_tokens: Vec<String>, seen: &mut AHashSet<String>) -> Vec<String> {
        let mut expanded = base_tokens.clone();

        for token in &base_tokens {
            if is_pure_digits(token) || token.chars().count() <= SYN_SKIP_SHORT_TOKENS_LEN {
                continue;
            }

            let mut added = 0usize;
            'senses: for sense in self.synonyms.senses(token) {
                for lemma in sense {
                    let raw = lemma.replace('_', " ").to_lowercase();
                    for normalized in tokenize(&raw) {
                        if &normalized == token {
                            continue;
                        }
                        if seen.insert(normalized.clone()) {
                            expanded.push(normalized);
                        }
                        added += 1;
                        if added >= SYN_MAX_PER_BASE_TOKEN {
                            break 'senses;
                        }
                    }
                }
            }
        }

        expanded
    }

    /// Ranks the candidate tokens by edit similarity to `token`, keeping the
    /// top matches at or above the similarity threshold.
    fn closest_tokens(&self, token: &str, candidates: &[String]) -> Vec<(String, f64)> {
        let mut scored: Vec<(usize, f64)> = candidates
            .iter()
            .enumerate()
            .map(|(i, candidate)| (i, rapidfuzz::fuzz::ratio(token.chars(), candidate.chars())))
            .collect();
        scored.sort_by(|a, b| match b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal) {
            Ordering::Equal => a.0.cmp(&b.0),
            other => other,
        });

        scored
            .into_iter()
            .take(FUZZY_KEEP_TOP)
            .filter(|(_, similarity)| *similarity >= FUZZY_SCORE_THRESHOLD)
            .map(|(i, similarity)| (candidates[i].clone(), similarity))
            .collect()
    }

    fn score_token_match(
        &self,
        query_token: &str,
        match_token: &str,
        similarity: f64,
        debug: bool,
        scores: &mut AHashMap<u64, f64>,
        explanations: &mut AHashMap<u64, Vec<Explanation>>,
    ) {
        let idf_eff = self.indexer.idf(match_token) * similarity;
        let postings = self.indexer.lookup(match_token);

        let mut doc_ids: Vec<u64> = postings.keys().copied().collect();
        doc_ids.sort_unstable();

        for doc_id in doc_ids {
            let posting = &postings[&doc_id];
            // a matched document enters the score table even when every
            // field contribution turns out to be zero
            let score = scores.entry(doc_id).or_insert(0.0);
            let mut doc_explanations = if debug {
                Some(explanations.entry(doc_id).or_default())
            } else {
                None
            };

            let mut fields: Vec<&String> = posting.fields.iter().collect();
            fields.sort();

            for field in fields {
                let field_tf = posting.tf_by_field.get(field).copied().unwrap_or(0);
                if field_tf == 0 {
                    continue;
                }
                let weight = field_weight(field);
                let mut contribution = weight * field_tf as f64 * idf_eff;

                if similarity < 1.0 {
                    if field == "description" {
                        contribution *= FUZZY_DESCRIPTION_PENALTY;
                    } else if field != "title" {
                        contribution *= FUZZY_NON_TITLE_PENALTY;
                    }
                }

                *score += contribution;

                if let Some(list) = doc_explanations.as_mut() {
                    list.push(Explanation {
                        token: query_token.to_string(),
                        field: field.clone(),
                        weight,
                        tf_by_field: field_tf,
                        idf: idf_eff,
                        similarity,
                        contribution,
                    });
                }
            }
        }
    }
}
