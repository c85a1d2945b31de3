use crate::errors::DocumentError;
use crate::models::Document;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

const MIN_YEAR: i32 = 1888;
const RATING_MIN: f64 = 0.0;
const RATING_MAX: f64 = 10.0;

fn current_year() -> i32 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    // Julian-year approximation; the upper bound carries five years of slack
    1970 + (secs / 31_557_600) as i32
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_id(value: &Value) -> Result<u64, DocumentError> {
    let id = match value {
        Value::Number(n) => n.as_u64().ok_or(DocumentError::InvalidId)?,
        Value::String(s) => {
            if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
                return Err(DocumentError::InvalidId);
            }
            s.parse().map_err(|_| DocumentError::InvalidId)?
        }
        _ => return Err(DocumentError::InvalidId),
    };
    if id == 0 {
        return Err(DocumentError::InvalidId);
    }
    Ok(id)
}

fn normalize_title(value: &Value) -> Result<String, DocumentError> {
    let title = value.as_str().unwrap_or("");
    let title = collapse_whitespace(title).to_lowercase();
    if title.is_empty() {
        return Err(DocumentError::MissingTitle);
    }
    Ok(title)
}

fn normalize_year(value: &Value) -> Result<i32, DocumentError> {
    let year = match value {
        Value::Number(n) => {
            if let Some(y) = n.as_i64() {
                y as i32
            } else {
                let f = n.as_f64().unwrap_or(f64::NAN);
                if !f.is_finite() || f.fract() != 0.0 {
                    return Err(DocumentError::InvalidYear {
                        reason: "year is not an integer".to_string(),
                    });
                }
                f as i32
            }
        }
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
                return Err(DocumentError::InvalidYear {
                    reason: "year is not numeric".to_string(),
                });
            }
            s.parse().map_err(|_| DocumentError::InvalidYear {
                reason: "year is not numeric".to_string(),
            })?
        }
        Value::Null => {
            return Err(DocumentError::InvalidYear {
                reason: "missing year".to_string(),
            })
        }
        _ => {
            return Err(DocumentError::InvalidYear {
                reason: "year is not an integer".to_string(),
            })
        }
    };
    if !(MIN_YEAR..=current_year() + 5).contains(&year) {
        return Err(DocumentError::InvalidYear {
            reason: "year out of bounds".to_string(),
        });
    }
    Ok(year)
}

/// Genres and cast accept either a comma-separated string or a list of
/// strings; entries are trimmed, lower-cased and de-duplicated preserving
/// first appearance.
fn normalize_string_list(value: &Value, field: &'static str) -> Result<Vec<String>, DocumentError> {
    let entries: Vec<String> = match value {
        Value::Null => return Ok(vec![]),
        Value::String(s) => s.split(',').map(|e| e.trim().to_lowercase()).collect(),
        Value::Array(items) => {
            let mut entries = Vec::with_capacity(items.len());
            for item in items {
                let Some(s) = item.as_str() else {
                    return Err(DocumentError::InvalidStringList { field });
                };
                entries.push(s.trim().to_lowercase());
            }
            entries
        }
        _ => return Err(DocumentError::InvalidStringList { field }),
    };

    let mut seen = std::collections::HashSet::new();
    Ok(entries
        .into_iter()
        .filter(|e| !e.is_empty() && seen.insert(e.clone()))
        .collect())
}

fn normalize_rating(value: &Value) -> Result<Option<f64>, DocumentError> {
    let rating = match value {
        Value::Null => return Ok(None),
        Value::String(s) if s.is_empty() => return Ok(None),
        Value::String(s) => s.parse().map_err(|_| DocumentError::InvalidRating)?,
        Value::Number(n) => n.as_f64().ok_or(DocumentError::InvalidRating)?,
        _ => return Err(DocumentError::InvalidRating),
    };
    if !(RATING_MIN..=RATING_MAX).contains(&rating) {
        return Err(DocumentError::InvalidRating);
    }
    Ok(Some(rating))
}

/// Validates and normalizes one raw corpus record into a `Document`.
pub fn normalize_record(value: &Value) -> Result<Document, DocumentError> {
    let id = normalize_id(value.get("id").unwrap_or(&Value::Null))?;
    let title = normalize_title(value.get("title").unwrap_or(&Value::Null))?;
    let year = normalize_year(value.get("year").unwrap_or(&Value::Null))?;
    let genres = normalize_string_list(value.get("genres").unwrap_or(&Value::Null), "genres")?;
    let cast = normalize_string_list(value.get("cast").unwrap_or(&Value::Null), "cast")?;
    let description = collapse_whitespace(
        value
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or(""),
    );
    let director = value
        .get("director")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_string();
    let rating = normalize_rating(value.get("rating").unwrap_or(&Value::Null))?;

    Ok(Document {
        id,
        title,
        year: Some(year),
        genres,
        description,
        cast,
        director,
        rating,
    })
}

/// Loads the corpus file at `path`: line-delimited JSON for `.jsonl`, a JSON
/// array otherwise. Records that fail normalization are skipped and counted.
pub fn load_corpus(path: &Path) -> Result<Vec<Document>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading corpus file {}", path.display()))?;

    let values: Vec<Value> = if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
        let mut values = Vec::new();
        for (line_no, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value = serde_json::from_str(line)
                .with_context(|| format!("parsing corpus line {}", line_no + 1))?;
            values.push(value);
        }
        values
    } else {
        serde_json::from_str(&raw).context("parsing corpus JSON array")?
    };

    let mut documents = Vec::with_capacity(values.len());
    let mut invalid = 0usize;
    for value in &values {
        match normalize_record(value) {
            Ok(doc) => documents.push(doc),
            Err(err) => {
                invalid += 1;
                warn!(error = %err, "skipping invalid corpus record");
            }
        }
    }

    if invalid > 0 {
        warn!(invalid, kept = documents.len(), "corpus contained invalid records");
    }
    info!(count = documents.len(), path = %path.display(), "corpus loaded");

    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_normalize_record_full() {
        let doc = normalize_record(&json!({
            "id": 7,
            "title": "  The   Matrix ",
            "year": 1999,
            "genres": ["Sci-Fi", "Action", "Sci-Fi"],
            "description": "  A hacker  learns the truth. ",
            "cast": "Keanu Reeves, Carrie-Anne Moss",
            "director": " Wachowski ",
            "rating": 8.7
        }))
        .unwrap();

        assert_eq!(doc.id, 7);
        assert_eq!(doc.title, "the matrix");
        assert_eq!(doc.year, Some(1999));
        assert_eq!(doc.genres, vec!["sci-fi", "action"]);
        assert_eq!(doc.description, "A hacker learns the truth.");
        assert_eq!(doc.cast, vec!["keanu reeves", "carrie-anne moss"]);
        assert_eq!(doc.director, "Wachowski");
        assert_eq!(doc.rating, Some(8.7));
    }

    #[test]
    fn test_normalize_id_accepts_digit_strings() {
        let doc = normalize_record(&json!({"id": "42", "title": "Heat", "year": 1995})).unwrap();
        assert_eq!(doc.id, 42);
    }

    #[test]
    fn test_normalize_id_rejects_zero_and_garbage() {
        for id in [json!(0), json!(-3), json!("12a"), json!(null)] {
            let record = json!({"id": id, "title": "Heat", "year": 1995});
            assert!(normalize_record(&record).is_err(), "id {id:?} accepted");
        }
    }

    #[test]
    fn test_normalize_title_required() {
        assert!(normalize_record(&json!({"id": 1, "year": 1995})).is_err());
        assert!(normalize_record(&json!({"id": 1, "title": "   ", "year": 1995})).is_err());
    }

    #[test]
    fn test_normalize_year_bounds_and_types() {
        assert!(normalize_record(&json!({"id": 1, "title": "Old", "year": 1800})).is_err());
        assert!(normalize_record(&json!({"id": 1, "title": "Future", "year": 3000})).is_err());
        assert!(normalize_record(&json!({"id": 1, "title": "Bad", "year": "19x5"})).is_err());
        assert!(normalize_record(&json!({"id": 1, "title": "Frac", "year": 1995.5})).is_err());

        let from_string =
            normalize_record(&json!({"id": 1, "title": "Heat", "year": " 1995 "})).unwrap();
        assert_eq!(from_string.year, Some(1995));
        let from_float =
            normalize_record(&json!({"id": 1, "title": "Heat", "year": 1995.0})).unwrap();
        assert_eq!(from_float.year, Some(1995));
    }

    #[test]
    fn test_normalize_rating_optional_and_bounded() {
        let none = normalize_record(&json!({"id": 1, "title": "Heat", "year": 1995})).unwrap();
        assert_eq!(none.rating, None);

        let empty =
            normalize_record(&json!({"id": 1, "title": "Heat", "year": 1995, "rating": ""}))
                .unwrap();
        assert_eq!(empty.rating, None);

        let parsed =
            normalize_record(&json!({"id": 1, "title": "Heat", "year": 1995, "rating": "8.3"}))
                .unwrap();
        assert_eq!(parsed.rating, Some(8.3));

        assert!(
            normalize_record(&json!({"id": 1, "title": "Heat", "year": 1995, "rating": 11.0}))
                .is_err()
        );
    }

    #[test]
    fn test_normalize_string_list_rejects_mixed_types() {
        let record = json!({"id": 1, "title": "Heat", "year": 1995, "genres": ["crime", 7]});
        assert!(normalize_record(&record).is_err());
    }

    #[test]
    fn test_load_corpus_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movies.jsonl");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, r#"{{"id": 1, "title": "Heat", "year": 1995}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"id": 2, "title": "Alien", "year": 1979}}"#).unwrap();

        let docs = load_corpus(&path).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].title, "alien");
    }

    #[test]
    fn test_load_corpus_json_array_skips_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movies.json");
        std::fs::write(
            &path,
            r#"[
                {"id": 1, "title": "Heat", "year": 1995},
                {"id": 0, "title": "Broken", "year": 1995},
                {"id": 3, "title": "Alien", "year": 1979}
            ]"#,
        )
        .unwrap();

        let docs = load_corpus(&path).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, 1);
        assert_eq!(docs[1].id, 3);
    }

    #[test]
    fn test_load_corpus_missing_file() {
        assert!(load_corpus(Path::new("/nonexistent/movies.json")).is_err());
    }
}
