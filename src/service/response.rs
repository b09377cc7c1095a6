use crate::core::{AggregateOutcome, MediaResult, ProbeSummary, ResolveError, SearchCandidate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchCandidate>,
}

/// `{success: true, downloads}` or `{success: false, error, diagnostics}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<Vec<MediaResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Vec<ProbeSummary>>,
}

impl ResolveResponse {
    pub fn from_error(err: &ResolveError) -> Self {
        Self {
            success: false,
            downloads: None,
            error: Some(err.to_string()),
            diagnostics: None,
        }
    }
}

impl From<AggregateOutcome> for ResolveResponse {
    fn from(outcome: AggregateOutcome) -> Self {
        match outcome.failure() {
            None => Self {
                success: true,
                downloads: Some(outcome.results),
                error: None,
                diagnostics: None,
            },
            Some(reason) => Self {
                success: false,
                downloads: None,
                error: Some(reason.to_string()),
                diagnostics: Some(outcome.diagnostics),
            },
        }
    }
}

/// Output of the search-then-resolve flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResponse {
    pub video: SearchCandidate,
    #[serde(flatten)]
    pub resolution: ResolveResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl From<&ResolveError> for ErrorResponse {
    fn from(err: &ResolveError) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}
