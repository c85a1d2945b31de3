use serde::{Deserialize, Serialize};

/// One movie record, retained whole for result rendering.
///
/// List fields flatten to space-joined text when indexed; scalar non-string
/// fields are rendered with `to_string`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cast: Vec<String>,
    #[serde(default)]
    pub director: String,
    #[serde(default)]
    pub rating: Option<f64>,
}

impl Document {
    /// Text projection of one field for indexing. Unknown fields and absent
    /// optionals yield `None`.
    pub fn field_text(&self, field: &str) -> Option<String> {
        match field {
            "title" => Some(self.title.clone()),
            "year" => self.year.map(|y| y.to_string()),
            "genres" => Some(self.genres.join(" ")),
            "description" => Some(self.description.clone()),
            "cast" => Some(self.cast.join(" ")),
            "director" => Some(self.director.clone()),
            "rating" => self.rating.map(|r| r.to_string()),
            _ => None,
        }
    }
}

/// Per-token, per-field scoring record emitted in debug mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Explanation {
    /// The query token that produced the contribution (the original token,
    /// not the fuzzy-matched vocabulary token)
    pub token: String,
    pub field: String,
    pub weight: f64,
    pub tf_by_field: u32,
    /// Effective IDF: raw IDF scaled by the match similarity
    pub idf: f64,
    pub similarity: f64,
    pub contribution: f64,
}

/// One rendered search hit in transport shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchItem {
    pub doc_id: u64,
    pub title: String,
    pub director: String,
    pub cast: Vec<String>,
    pub year: String,
    pub rating: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanations: Option<Vec<Explanation>>,
}

/// Body of one shard-level search response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub total_hits: usize,
    pub page: usize,
    pub page_size: usize,
    pub results: Vec<SearchItem>,
}

/// Shard wire request: `POST /internal/search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalSearchRequest {
    pub q: String,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub debug: bool,
}

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    10
}

/// Machine-readable error payload inside the response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Outcome of one replica attempt during fan-out, kept for response metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptMeta {
    pub replica: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub took_ms: f64,
    pub replica_status: String,
}

/// Per-shard-group fan-out summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardMeta {
    pub shard_id: u32,
    pub ok: bool,
    pub chosen_replica: Option<String>,
    pub attempts: Vec<AttemptMeta>,
}

/// Timing and shard metadata attached to coordinator responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Meta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_hits: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub took_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shards: Option<Vec<ShardMeta>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Uniform response envelope: `status` is `"ok"`, `"partial"` or `"error"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub data: Option<T>,
    pub meta: Option<Meta>,
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            status: "ok".to_string(),
            data: Some(data),
            meta: None,
            error: None,
        }
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn error(error: ApiError) -> Self {
        ApiResponse {
            status: "error".to_string(),
            data: None,
            meta: None,
            error: Some(error),
        }
    }
}

/// Rounds a duration in milliseconds to two decimals for response metadata.
pub fn round_ms(ms: f64) -> f64 {
    (ms * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_text_joins_lists() {
        let doc = Document {
            id: 1,
            title: "Heat".to_string(),
            genres: vec!["Crime".to_string(), "Drama".to_string()],
            cast: vec!["Al Pacino".to_string(), "Robert De Niro".to_string()],
            year: Some(1995),
            rating: Some(8.3),
            ..Document::default()
        };
        assert_eq!(doc.field_text("genres").as_deref(), Some("Crime Drama"));
        assert_eq!(
            doc.field_text("cast").as_deref(),
            Some("Al Pacino Robert De Niro")
        );
        assert_eq!(doc.field_text("year").as_deref(), Some("1995"));
        assert_eq!(doc.field_text("rating").as_deref(), Some("8.3"));
        assert_eq!(doc.field_text("unknown"), None);
    }

    #[test]
    fn test_field_text_absent_optionals() {
        let doc = Document {
            id: 1,
            title: "Heat".to_string(),
            ..Document::default()
        };
        assert_eq!(doc.field_text("year"), None);
        assert_eq!(doc.field_text("rating"), None);
    }

    #[test]
    fn test_search_item_omits_debug_fields() {
        let item = SearchItem {
            doc_id: 1,
            title: "Heat".to_string(),
            director: String::new(),
            cast: vec![],
            year: String::new(),
            rating: String::new(),
            score: None,
            explanations: None,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert!(json.get("score").is_none());
        assert!(json.get("explanations").is_none());
    }

    #[test]
    fn test_internal_search_request_defaults() {
        let req: InternalSearchRequest = serde_json::from_str(r#"{"q":"heat"}"#).unwrap();
        assert_eq!(req.page, 1);
        assert_eq!(req.page_size, 10);
        assert!(!req.debug);
    }

    #[test]
    fn test_round_ms() {
        assert_eq!(round_ms(12.3456), 12.35);
        assert_eq!(round_ms(0.0), 0.0);
    }
}
