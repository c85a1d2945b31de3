use ahash::AHashMap;
use once_cell::sync::Lazy;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

/// Static set of common English stop words
static ENGLISH_STOP_WORDS: Lazy<HashSet<String>> = Lazy::new(|| {
    vec![
        "a",
        "about",
        "above",
        "after",
        "again",
        "against",
        "all",
        "am",
        "an",
        "and",
        "any",
        "are",
        "aren't",
        "as",
        "at",
        "be",
        "because",
        "been",
        "before",
        "being",
        "below",
        "between",
        "both",
        "but",
        "by",
        "can't",
        "cannot",
        "could",
        "couldn't",
        "did",
        "didn't",
        "do",
        "does",
        "doesn't",
        "doing",
        "don't",
        "down",
        "during",
        "each",
        "few",
        "for",
        "from",
        "further",
        "had",
        "hadn't",
        "has",
        "hasn't",
        "have",
        "haven't",
        "having",
        "he",
        "he'd",
        "he'll",
        "he's",
        "her",
        "here",
        "here's",
        "hers",
        "herself",
        "him",
        "himself",
        "his",
        "how",
        "how's",
        "i",
        "i'd",
        "i'll",
        "i'm",
        "i've",
        "if",
        "in",
        "into",
        "is",
        "isn't",
        "it",
        "it's",
        "its",
        "itself",
        "let's",
        "me",
        "more",
        "most",
        "mustn't",
        "my",
        "myself",
        "no",
        "nor",
        "not",
        "of",
        "off",
        "on",
        "once",
        "only",
        "or",
        "other",
        "ought",
        "our",
        "ours",
        "ourselves",
        "out",
        "over",
        "own",
        "same",
        "shan't",
        "she",
        "she'd",
        "she'll",
        "she's",
        "should",
        "shouldn't",
        "so",
        "some",
        "such",
        "than",
        "that",
        "that's",
        "the",
        "their",
        "theirs",
        "them",
        "themselves",
        "then",
        "there",
        "there's",
        "these",
        "they",
        "they'd",
        "they'll",
        "they're",
        "they've",
        "this",
        "those",
        "through",
        "to",
        "too",
        "under",
        "until",
        "up",
        "very",
        "was",
        "wasn't",
        "we",
        "we'd",
        "we'll",
        "we're",
        "we've",
        "were",
        "weren't",
        "what",
        "what's",
        "when",
        "when's",
        "where",
        "where's",
        "which",
        "while",
        "who",
        "who's",
        "whom",
        "why",
        "why's",
        "with",
        "won't",
        "would",
        "wouldn't",
        "you",
        "you'd",
        "you'll",
        "you're",
        "you've",
        "your",
        "yours",
        "yourself",
        "yourselves",
    ]
    .into_iter()
    .map(String::from)
    .collect()
});

/// Returns the English stop-word set shared by indexing and querying
pub fn stop_words() -> &'static HashSet<String> {
    &ENGLISH_STOP_WORDS
}

/// Checks whether a lower-cased token is an English stop word
pub fn is_stop_word(token: &str) -> bool {
    ENGLISH_STOP_WORDS.contains(token)
}

/// Returns a reference to the global stemmer instance
///
/// One stemmer serves both index- and query-side tokenization so surface
/// forms always collapse to the same lemma.
pub fn get_stemmer() -> &'static Stemmer {
    static STEMMER: OnceLock<Stemmer> = OnceLock::new();
    STEMMER.get_or_init(|| Stemmer::create(Algorithm::English))
}

/// Source of synonym lemmas for query expansion.
///
/// A sense is an ordered list of lemma strings; multi-word lemmas use
/// underscores the way lexical databases write them ("motion_picture").
/// The query engine only consumes this trait and never sees the backing
/// storage.
pub trait SynonymSource {
    /// Returns the senses recorded for `token`, most common sense first.
    /// Unknown tokens yield an empty slice.
    fn senses(&self, token: &str) -> &[Vec<String>];
}

/// Synonym table loaded into memory, keyed by lower-cased token.
///
/// The on-disk format is one token per line:
/// `token<TAB>lemma,lemma;lemma,lemma` where `;` separates senses and `,`
/// separates the lemmas of one sense. Blank lines and `#` comments are
/// skipped.
#[derive(Debug, Default)]
pub struct TableSynonyms {
    entries: AHashMap<String, Vec<Vec<String>>>,
}

impl TableSynonyms {
    /// Creates an empty table; expansion becomes a no-op.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads a table from the TSV resource file at `path`.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(Self::parse(&raw))
    }

    fn parse(raw: &str) -> Self {
        let mut entries: AHashMap<String, Vec<Vec<String>>> = AHashMap::new();
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((token, rest)) = line.split_once('\t') else {
                continue;
            };
            let senses: Vec<Vec<String>> = rest
                .split(';')
                .map(|sense| {
                    sense
                        .split(',')
                        .map(|lemma| lemma.trim().to_lowercase())
                        .filter(|lemma| !lemma.is_empty())
                        .collect::<Vec<String>>()
                })
                .filter(|sense: &Vec<String>| !sense.is_empty())
                .collect();
            if !senses.is_empty() {
                entries.insert(token.trim().to_lowercase(), senses);
            }
        }
        Self { entries }
    }

    /// Records `senses` for `token`, replacing any previous entry.
    pub fn insert(&mut self, token: &str, senses: Vec<Vec<String>>) {
        self.entries.insert(token.to_lowercase(), senses);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SynonymSource for TableSynonyms {
    fn senses(&self, token: &str) -> &[Vec<String>] {
        self.entries.get(token).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_words_contains_common_words() {
        assert!(is_stop_word("the"));
        assert!(is_stop_word("in"));
        assert!(is_stop_word("and"));
        assert!(!is_stop_word("movie"));
        assert!(!is_stop_word("cruise"));
    }

    #[test]
    fn test_stemmer_collapses_surface_forms() {
        let stemmer = get_stemmer();
        assert_eq!(stemmer.stem("running").to_string(), "run");
        assert_eq!(stemmer.stem("run").to_string(), "run");
    }

    #[test]
    fn test_table_synonyms_parse() {
        let table = TableSynonyms::parse(
            "# comment\n\
             film\tmovie,picture;flick\n\
             car\tauto,motor_car\n\
             \n\
             broken-line-without-tab\n",
        );
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.senses("film"),
            &[
                vec!["movie".to_string(), "picture".to_string()],
                vec!["flick".to_string()]
            ]
        );
        assert_eq!(table.senses("car")[0][1], "motor_car");
        assert!(table.senses("unknown").is_empty());
    }

    #[test]
    fn test_table_synonyms_lowercases_keys_and_lemmas() {
        let table = TableSynonyms::parse("Film\tMovie,Picture\n");
        assert_eq!(table.senses("film")[0], vec!["movie", "picture"]);
    }
}
