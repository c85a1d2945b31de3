use crate::models::ApiError;

/// Domain failures surfaced to callers of the search path.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("the search index is not ready yet")]
    IndexNotReady,
    #[error("the search query is invalid")]
    InvalidQuery { details: serde_json::Value },
}

impl SearchError {
    pub fn invalid_query(details: serde_json::Value) -> Self {
        SearchError::InvalidQuery { details }
    }

    /// Stable machine-readable code used in the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            SearchError::IndexNotReady => "INDEX_NOT_READY",
            SearchError::InvalidQuery { .. } => "INVALID_QUERY",
        }
    }

    pub fn to_api_error(&self) -> ApiError {
        ApiError {
            code: self.code().to_string(),
            message: self.to_string(),
            details: match self {
                SearchError::InvalidQuery { details } => Some(details.clone()),
                SearchError::IndexNotReady => None,
            },
        }
    }
}

/// Corpus records that fail normalization are rejected with the offending
/// field named.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("invalid document: missing or non-positive id")]
    InvalidId,
    #[error("invalid document: missing title")]
    MissingTitle,
    #[error("invalid document: {reason}")]
    InvalidYear { reason: String },
    #[error("invalid document: {field} must be a string or a list of strings")]
    InvalidStringList { field: &'static str },
    #[error("invalid document: rating out of bounds")]
    InvalidRating,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_error_codes() {
        assert_eq!(SearchError::IndexNotReady.code(), "INDEX_NOT_READY");
        assert_eq!(
            SearchError::invalid_query(serde_json::json!({"page": 0})).code(),
            "INVALID_QUERY"
        );
    }

    #[test]
    fn test_to_api_error_carries_details() {
        let err = SearchError::invalid_query(serde_json::json!({"query": ""}));
        let api = err.to_api_error();
        assert_eq!(api.code, "INVALID_QUERY");
        assert_eq!(api.details.unwrap()["query"], "");
    }
}
