use crate::api_error::ApiError;
use crate::config::LlmConfig;
use crate::db::DbPool;
use crate::middleware::RateLimiter;
use crate::models::matchmaking::{
    Candidate, Suggestion, SuggestionRequest, SuggestionSource, SuggestionsResponse,
};
use crate::models::mood::{compatibility, MoodCompatibility, MoodKind, SetMoodRequest};
use crate::models::user::{User, UserProfile};
use crate::service::user_service::find_user;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

const MIN_CANDIDATE_SCORE: f64 = 50.0;
const MAX_CANDIDATES: i64 = 50;
/// Candidates forwarded to the model, best heuristic score first.
const LLM_SHORTLIST: usize = 20;
const UNKNOWN_MOOD_SCORE: f64 = 50.0;
const MOOD_WEIGHT: f64 = 0.6;
const BEHAVIOR_WEIGHT: f64 = 0.4;
const SUGGESTIONS_PER_HOUR: u32 = 10;
const LLM_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
    #[error("response had no usable content")]
    EmptyResponse,
}

// ============================================================================
// RANKING
// ============================================================================

/// Mood component of a candidate's score, 0-100.
fn mood_score(me: Option<(MoodKind, i16)>, candidate: &Candidate) -> (f64, Option<MoodCompatibility>) {
    let pair = me.zip(candidate.mood.zip(candidate.mood_intensity));
    match pair {
        Some(((my_mood, my_intensity), (their_mood, their_intensity))) => {
            match compatibility(my_mood, my_intensity, their_mood, their_intensity) {
                Ok(result) => (f64::from(result.score), Some(result)),
                Err(_) => (UNKNOWN_MOOD_SCORE, None),
            }
        }
        None => (UNKNOWN_MOOD_SCORE, None),
    }
}

/// Rank candidates by `mood * 0.6 + behavior * 0.4`, best first.
pub fn rank_candidates(
    me: Option<(MoodKind, i16)>,
    candidates: &[Candidate],
    game: &str,
) -> Vec<Suggestion> {
    let mut ranked: Vec<Suggestion> = candidates
        .iter()
        .map(|candidate| {
            let (mood, compat) = mood_score(me, candidate);
            let score = mood * MOOD_WEIGHT + candidate.behavior_score * BEHAVIOR_WEIGHT;
            let reason = match compat {
                Some(c) => format!("{} in {}", c.reason, game),
                None => format!(
                    "Plays {} with a behavior score of {:.0}",
                    game, candidate.behavior_score
                ),
            };
            Suggestion {
                user_id: candidate.id,
                username: candidate.username.clone(),
                score: (score * 10.0).round() / 10.0,
                reason,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}

#[derive(Debug, Deserialize)]
struct LlmPick {
    user_id: Uuid,
    reason: String,
}

/// Extract the model's picks, keeping only known candidates and dropping duplicates.
fn parse_llm_picks(
    content: &str,
    ranked: &[Suggestion],
    limit: usize,
) -> Vec<Suggestion> {
    let json = match (content.find('['), content.rfind(']')) {
        (Some(start), Some(end)) if start < end => &content[start..=end],
        _ => return Vec::new(),
    };

    let picks: Vec<LlmPick> = match serde_json::from_str(json) {
        Ok(picks) => picks,
        Err(_) => return Vec::new(),
    };

    let by_id: HashMap<Uuid, &Suggestion> = ranked.iter().map(|s| (s.user_id, s)).collect();
    let mut seen = std::collections::HashSet::new();

    picks
        .into_iter()
        .filter(|pick| seen.insert(pick.user_id))
        .filter_map(|pick| {
            by_id.get(&pick.user_id).map(|known| Suggestion {
                reason: pick.reason,
                ..(*known).clone()
            })
        })
        .take(limit)
        .collect()
}

// ============================================================================
// LLM CLIENT
// ============================================================================

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

fn build_prompt(game: &str, me: &User, shortlist: &[Suggestion], candidates: &HashMap<Uuid, &Candidate>, limit: usize) -> String {
    let my_mood = me
        .mood
        .map(|m| format!("{:?} (intensity {})", m, me.mood_intensity.unwrap_or(3)))
        .unwrap_or_else(|| "unknown".to_string());

    let lines: Vec<String> = shortlist
        .iter()
        .map(|s| {
            let mood = candidates
                .get(&s.user_id)
                .and_then(|c| c.mood)
                .map(|m| format!("{:?}", m))
                .unwrap_or_else(|| "unknown".to_string());
            format!(
                "- user_id: {}, username: {}, mood: {}, heuristic_score: {}",
                s.user_id, s.username, mood, s.score
            )
        })
        .collect();

    format!(
        "A player wants teammates for {game}. Their mood is {my_mood}.\n\
         Candidates:\n{}\n\n\
         Pick up to {limit} candidates who would make the best teammates. \
         Respond with only a JSON array of objects with \"user_id\" and a one sentence \"reason\".",
        lines.join("\n")
    )
}

// ============================================================================
// SERVICE
// ============================================================================

#[derive(Clone)]
pub struct MatchmakingService {
    db_pool: DbPool,
    client: Client,
    llm: LlmConfig,
    rate_limiter: RateLimiter,
}

impl MatchmakingService {
    pub fn new(
        db_pool: DbPool,
        llm: LlmConfig,
        rate_limiter: RateLimiter,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(LLM_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            db_pool,
            client,
            llm,
            rate_limiter,
        })
    }

    /// Set the caller's current mood.
    pub async fn set_mood(&self, user_id: Uuid, request: SetMoodRequest) -> Result<UserProfile, ApiError> {
        request.validate()?;

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET mood = $2, mood_intensity = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(request.mood)
        .bind(request.intensity)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

        info!(user_id = %user_id, mood = ?request.mood, intensity = request.intensity, "Mood updated");

        Ok(UserProfile::from(user))
    }

    /// Compatibility between the caller's mood and another player's.
    pub async fn compatibility_with(&self, user_id: Uuid, other_id: Uuid) -> Result<MoodCompatibility, ApiError> {
        let me = find_user(&self.db_pool, user_id).await?;
        let other = find_user(&self.db_pool, other_id).await?;

        let (my_mood, my_intensity) = me
            .mood
            .zip(me.mood_intensity)
            .ok_or_else(|| ApiError::not_found("Set your mood first"))?;
        let (their_mood, their_intensity) = other
            .mood
            .zip(other.mood_intensity)
            .ok_or_else(|| ApiError::not_found("That player has not set a mood"))?;

        compatibility(my_mood, my_intensity, their_mood, their_intensity)
            .map_err(|e| ApiError::internal_error(e.to_string()))
    }

    /// Suggest teammates for `game`, using the LLM when configured.
    pub async fn suggest(&self, user_id: Uuid, request: SuggestionRequest) -> Result<SuggestionsResponse, ApiError> {
        request.validate()?;

        self.rate_limiter
            .check(&format!("suggestions:{}", user_id), SUGGESTIONS_PER_HOUR, 3600)
            .await?;

        let me = find_user(&self.db_pool, user_id).await?;

        let candidates = sqlx::query_as::<_, Candidate>(
            r#"
            SELECT id, username, mood, mood_intensity, behavior_score
            FROM users
            WHERE $1 = ANY(favorite_games)
              AND id <> $2
              AND is_active
              AND behavior_score >= $3
            ORDER BY behavior_score DESC
            LIMIT $4
            "#,
        )
        .bind(&request.game)
        .bind(user_id)
        .bind(MIN_CANDIDATE_SCORE)
        .bind(MAX_CANDIDATES)
        .fetch_all(&self.db_pool)
        .await?;

        let ranked = rank_candidates(me.mood.zip(me.mood_intensity), &candidates, &request.game);
        let limit = request.limit();

        if ranked.is_empty() || self.llm.api_key.is_none() {
            return Ok(heuristic(ranked, limit));
        }

        let shortlist = &ranked[..ranked.len().min(LLM_SHORTLIST)];
        let by_id: HashMap<Uuid, &Candidate> = candidates.iter().map(|c| (c.id, c)).collect();
        let prompt = build_prompt(&request.game, &me, shortlist, &by_id, limit);

        match self.ask_llm(prompt).await {
            Ok(content) => {
                let picks = parse_llm_picks(&content, shortlist, limit);
                if picks.is_empty() {
                    warn!(user_id = %user_id, "LLM returned no usable suggestions, using heuristic");
                    return Ok(heuristic(ranked, limit));
                }
                info!(user_id = %user_id, count = picks.len(), "LLM suggestions generated");
                Ok(SuggestionsResponse {
                    source: SuggestionSource::Llm,
                    suggestions: picks,
                })
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "LLM request failed, using heuristic");
                Ok(heuristic(ranked, limit))
            }
        }
    }

    async fn ask_llm(&self, prompt: String) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.llm.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You match gamers with compatible teammates. Only answer with JSON.".to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.3,
        };

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.llm.base_url.trim_end_matches('/')))
            .json(&request);
        if let Some(api_key) = &self.llm.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(LlmError::Status(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

fn heuristic(mut ranked: Vec<Suggestion>, limit: usize) -> SuggestionsResponse {
    ranked.truncate(limit);
    SuggestionsResponse {
        source: SuggestionSource::Heuristic,
        suggestions: ranked,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, mood: Option<(MoodKind, i16)>, behavior: f64) -> Candidate {
        Candidate {
            id: Uuid::new_v4(),
            username: name.to_string(),
            mood: mood.map(|m| m.0),
            mood_intensity: mood.map(|m| m.1),
            behavior_score: behavior,
        }
    }

    #[test]
    fn test_rank_prefers_compatible_moods() {
        let chill = candidate("chill", Some((MoodKind::Chill, 3)), 80.0);
        let tryhard = candidate("tryhard", Some((MoodKind::Competitive, 3)), 80.0);
        let ranked = rank_candidates(
            Some((MoodKind::Casual, 3)),
            &[tryhard.clone(), chill.clone()],
            "Minecraft",
        );

        assert_eq!(ranked[0].user_id, chill.id);
        // casual/chill = 85 -> 85*0.6 + 80*0.4
        assert!((ranked[0].score - 83.0).abs() < 1e-9);
        assert!((ranked[1].score - 59.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_mood_scores_fifty() {
        let c = candidate("quiet", None, 100.0);
        let ranked = rank_candidates(Some((MoodKind::Social, 2)), &[c], "Valorant");
        assert!((ranked[0].score - 70.0).abs() < 1e-9);
        assert!(ranked[0].reason.contains("Valorant"));

        let c = candidate("moody", Some((MoodKind::Social, 2)), 100.0);
        let ranked = rank_candidates(None, &[c], "Valorant");
        assert!((ranked[0].score - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_llm_picks_filters_unknown_ids() {
        let a = candidate("a", None, 90.0);
        let b = candidate("b", None, 80.0);
        let ranked = rank_candidates(None, &[a.clone(), b.clone()], "Halo");
        let stranger = Uuid::new_v4();

        let content = format!(
            "Here you go:\n```json\n[{{\"user_id\":\"{}\",\"reason\":\"Great comms\"}},{{\"user_id\":\"{}\",\"reason\":\"??\"}},{{\"user_id\":\"{}\",\"reason\":\"dup\"}}]\n```",
            b.id, stranger, b.id
        );
        let picks = parse_llm_picks(&content, &ranked, 5);

        assert_eq!(picks.len(), 1);
        assert_eq!(picks[0].user_id, b.id);
        assert_eq!(picks[0].reason, "Great comms");
        assert_eq!(picks[0].username, "b");
    }

    #[test]
    fn test_parse_llm_picks_garbage() {
        assert!(parse_llm_picks("I cannot help with that", &[], 5).is_empty());
        assert!(parse_llm_picks("[not json]", &[], 5).is_empty());
    }

    #[test]
    fn test_parse_llm_picks_respects_limit() {
        let field: Vec<Candidate> = (0..4).map(|i| candidate(&i.to_string(), None, 90.0)).collect();
        let ranked = rank_candidates(None, &field, "Halo");
        let content = serde_json::to_string(
            &field
                .iter()
                .map(|c| serde_json::json!({"user_id": c.id, "reason": "ok"}))
                .collect::<Vec<_>>(),
        )
        .unwrap();
        assert_eq!(parse_llm_picks(&content, &ranked, 2).len(), 2);
    }

    #[test]
    fn test_heuristic_truncates() {
        let field: Vec<Candidate> = (0..8).map(|i| candidate(&i.to_string(), None, 90.0)).collect();
        let response = heuristic(rank_candidates(None, &field, "Halo"), 3);
        assert_eq!(response.source, SuggestionSource::Heuristic);
        assert_eq!(response.suggestions.len(), 3);
    }
}
