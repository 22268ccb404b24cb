//! Prerequisite scoring service

use tracing::info;

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::prereq::{process_request, PrmRequest, PrmResponse};

/// Scores prerequisite candidates for JSON requests.
#[derive(Debug, Default)]
pub struct ScoreService;

impl ScoreService {
    pub fn new() -> Self {
        Self
    }

    /// Parse a request, score it and return the response.
    pub fn score_json(&self, content: &str) -> ApplicationResult<PrmResponse> {
        let request: PrmRequest = serde_json::from_str(content)
            .map_err(|e| ApplicationError::serialization("parse scoring request", e))?;
        let response = process_request(&request);
        info!(pairs = request.pairs.len(), scored = response.count, "scored request");
        Ok(response)
    }

    pub fn render(response: &PrmResponse) -> ApplicationResult<String> {
        serde_json::to_string_pretty(response)
            .map_err(|e| ApplicationError::serialization("serialize scoring response", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_request_is_serialization_error() {
        let result = ScoreService::new().score_json("{ not json");
        assert!(matches!(result, Err(ApplicationError::Serialization { .. })));
    }

    #[test]
    fn test_empty_request_scores_nothing() {
        let response = ScoreService::new().score_json("{}").unwrap();
        assert!(response.success);
        assert_eq!(response.count, 0);
    }
}
