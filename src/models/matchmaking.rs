use crate::models::mood::MoodKind;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

pub const DEFAULT_SUGGESTION_LIMIT: u8 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SuggestionRequest {
    #[validate(length(min = 1, max = 50))]
    pub game: String,
    #[validate(range(min = 1, max = 10))]
    pub limit: Option<u8>,
}

impl SuggestionRequest {
    pub fn limit(&self) -> usize {
        usize::from(self.limit.unwrap_or(DEFAULT_SUGGESTION_LIMIT))
    }
}

/// A player who could be suggested as a teammate.
#[derive(Debug, Clone, FromRow)]
pub struct Candidate {
    pub id: Uuid,
    pub username: String,
    pub mood: Option<MoodKind>,
    pub mood_intensity: Option<i16>,
    pub behavior_score: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionSource {
    Llm,
    Heuristic,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Suggestion {
    pub user_id: Uuid,
    pub username: String,
    pub score: f64,
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuggestionsResponse {
    pub source: SuggestionSource,
    pub suggestions: Vec<Suggestion>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_default_and_bounds() {
        let req: SuggestionRequest = serde_json::from_str(r#"{"game":"Apex Legends"}"#).unwrap();
        assert_eq!(req.limit(), 5);
        assert!(req.validate().is_ok());

        let req = SuggestionRequest { limit: Some(11), ..req };
        assert!(req.validate().is_err());
        let req = SuggestionRequest { limit: Some(0), ..req };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_source_serialization() {
        assert_eq!(serde_json::to_string(&SuggestionSource::Llm).unwrap(), "\"llm\"");
    }
}
