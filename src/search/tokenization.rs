use crate::search::lexicon::{get_stemmer, stop_words};
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Matches maximal runs of Unicode punctuation
static PUNCTUATION_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\p{P}+").expect("punctuation pattern is valid"));

/// Decomposes text (NFKD) and drops combining marks, stripping accents:
/// `café` becomes `cafe`.
pub fn normalize_unicode(text: &str) -> String {
    text.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Replaces every maximal run of Unicode punctuation with a single space.
pub fn clean_punctuation(text: &str) -> String {
    PUNCTUATION_RUNS.replace_all(text, " ").into_owned()
}

/// Returns true for tokens worth keeping in a bare-bones pipeline: at least
/// two characters, not a stop word, not a pure number. The main `tokenize`
/// path intentionally does NOT apply the length or digit rules (years and
/// ratings index as digit tokens); this predicate exists for callers and
/// tests that want the stricter filter.
pub fn basic_token_filter(token: &str) -> bool {
    if token.chars().count() < 2 {
        return false;
    }
    if stop_words().contains(token) {
        return false;
    }
    if token.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    true
}

/// Tokenizes text into normalized terms, applying lemmatization.
///
/// Steps, in order: lowercase, unicode normalization, punctuation removal,
/// whitespace split, stop-word removal, lemmatization. Order and duplicates
/// of the surviving tokens are preserved.
pub fn tokenize(text: &str) -> Vec<String> {
    tokenize_with(text, true)
}

/// Tokenizes text, optionally skipping the lemmatization step.
pub fn tokenize_with(text: &str, use_lemmatization: bool) -> Vec<String> {
    if text.is_empty() {
        return vec![];
    }

    let text = text.to_lowercase();
    let text = normalize_unicode(&text);
    let text = clean_punctuation(&text);

    let stop = stop_words();
    let stemmer = get_stemmer();

    text.split_ascii_whitespace()
        .filter(|t| !stop.contains(*t))
        .map(|t| {
            if use_lemmatization {
                stemmer.stem(t).to_string()
            } else {
                t.to_string()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unicode_strips_accents() {
        assert_eq!(normalize_unicode("café"), "cafe");
        assert_eq!(normalize_unicode("Beyoncé Müller"), "Beyonce Muller");
        assert_eq!(normalize_unicode("plain"), "plain");
    }

    #[test]
    fn test_clean_punctuation_replaces_runs_with_one_space() {
        assert_eq!(clean_punctuation("hello, world!"), "hello  world ");
        assert_eq!(clean_punctuation("a--b...c"), "a b c");
        assert_eq!(clean_punctuation("no punctuation"), "no punctuation");
    }

    #[test]
    fn test_tokenize_full_pipeline() {
        assert_eq!(
            tokenize("Café running in 2025, hello world!"),
            vec!["cafe", "run", "2025", "hello", "world"]
        );
    }

    #[test]
    fn test_tokenize_empty_input() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_tokenize_all_stop_words() {
        assert!(tokenize("the and of").is_empty());
    }

    #[test]
    fn test_tokenize_preserves_order_and_duplicates() {
        assert_eq!(tokenize("cars cars trucks"), vec!["car", "car", "truck"]);
    }

    #[test]
    fn test_tokenize_keeps_digit_tokens() {
        assert_eq!(tokenize("1999"), vec!["1999"]);
    }

    #[test]
    fn test_tokenize_without_lemmatization() {
        assert_eq!(
            tokenize_with("running cars", false),
            vec!["running", "cars"]
        );
    }

    #[test]
    fn test_tokenize_determinism() {
        let input = "The MATRIX: reloaded (2003) — science-fiction!";
        assert_eq!(tokenize(input), tokenize(input));
    }

    #[test]
    fn test_basic_token_filter() {
        assert!(!basic_token_filter("a"));
        assert!(!basic_token_filter("the"));
        assert!(!basic_token_filter("123"));
        assert!(basic_token_filter("hello"));
    }
}
