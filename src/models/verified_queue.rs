use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Minimum behavior score required to enter the verified queue.
pub const VERIFIED_QUEUE_MIN_SCORE: f64 = 70.0;
/// Score every new account starts with.
pub const INITIAL_BEHAVIOR_SCORE: f64 = 100.0;
pub const MAX_BEHAVIOR_SCORE: f64 = 100.0;
pub const MIN_BEHAVIOR_SCORE: f64 = 0.0;

/// Weight never drops below this, so veterans can still move their score.
const MIN_WEIGHT: f64 = 0.1;
const WEIGHT_DECAY_INTERACTIONS: f64 = 1000.0;

/// Apply a point change to a behavior score.
///
/// Each interaction counts for less the more interactions a player already has:
/// `weight = max(0.1, 1 - total_interactions / 1000)`. The result is clamped to
/// `[0, 100]`.
pub fn calculate_new_score(current_score: f64, point_change: f64, total_interactions: i64) -> f64 {
    let weight = (1.0 - total_interactions.max(0) as f64 / WEIGHT_DECAY_INTERACTIONS).max(MIN_WEIGHT);
    (current_score + point_change * weight).clamp(MIN_BEHAVIOR_SCORE, MAX_BEHAVIOR_SCORE)
}

pub fn is_eligible(score: f64) -> bool {
    score >= VERIFIED_QUEUE_MIN_SCORE
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportReason {
    Cheating,
    Harassment,
    Toxicity,
    Griefing,
    Afk,
    Spam,
    Other,
}

impl ReportReason {
    pub fn points(&self) -> f64 {
        match self {
            ReportReason::Cheating => -25.0,
            ReportReason::Harassment => -15.0,
            ReportReason::Toxicity => -10.0,
            ReportReason::Griefing => -8.0,
            ReportReason::Afk => -5.0,
            ReportReason::Spam => -3.0,
            ReportReason::Other => -2.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportReason::Cheating => "cheating",
            ReportReason::Harassment => "harassment",
            ReportReason::Toxicity => "toxicity",
            ReportReason::Griefing => "griefing",
            ReportReason::Afk => "afk",
            ReportReason::Spam => "spam",
            ReportReason::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EndorsementCategory {
    Leadership,
    Teamwork,
    Communication,
    Skill,
    PositiveAttitude,
}

impl EndorsementCategory {
    pub fn points(&self) -> f64 {
        match self {
            EndorsementCategory::Leadership => 2.0,
            EndorsementCategory::Teamwork => 2.0,
            EndorsementCategory::Communication => 2.0,
            EndorsementCategory::Skill => 1.0,
            EndorsementCategory::PositiveAttitude => 3.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EndorsementCategory::Leadership => "leadership",
            EndorsementCategory::Teamwork => "teamwork",
            EndorsementCategory::Communication => "communication",
            EndorsementCategory::Skill => "skill",
            EndorsementCategory::PositiveAttitude => "positive_attitude",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    Report,
    Endorsement,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Report => "report",
            InteractionKind::Endorsement => "endorsement",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QueueEntry {
    pub user_id: Uuid,
    pub game: String,
    pub region: Option<String>,
    pub play_style: Option<String>,
    pub joined_at: DateTime<Utc>,
}

/// Queue entry with the player's name and score merged in.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QueueListing {
    pub user_id: Uuid,
    pub username: String,
    pub behavior_score: f64,
    pub game: String,
    pub region: Option<String>,
    pub play_style: Option<String>,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct JoinQueueRequest {
    #[validate(length(min = 1, max = 50))]
    pub game: String,
    #[validate(length(max = 32))]
    pub region: Option<String>,
    #[validate(length(max = 32))]
    pub play_style: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueListQuery {
    pub game: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReportPlayerRequest {
    pub reported_user_id: Uuid,
    pub reason: ReportReason,
    #[validate(length(max = 1000))]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndorsePlayerRequest {
    pub endorsed_user_id: Uuid,
    pub category: EndorsementCategory,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueueStatusResponse {
    pub behavior_score: f64,
    pub threshold: f64,
    pub eligible: bool,
    pub total_interactions: i32,
    pub entry: Option<QueueEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InteractionResponse {
    pub subject_id: Uuid,
    pub points: f64,
    pub new_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_weight_for_new_players() {
        assert_eq!(calculate_new_score(80.0, -10.0, 0), 70.0);
        assert_eq!(calculate_new_score(80.0, 3.0, 0), 83.0);
    }

    #[test]
    fn test_weight_decays_with_interactions() {
        let score = calculate_new_score(80.0, -10.0, 500);
        assert!((score - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_weight_floor() {
        let at_floor = calculate_new_score(80.0, -10.0, 900);
        let beyond = calculate_new_score(80.0, -10.0, 50_000);
        assert!((at_floor - 79.0).abs() < 1e-9);
        assert!((beyond - 79.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_is_clamped() {
        assert_eq!(calculate_new_score(99.0, 3.0, 0), MAX_BEHAVIOR_SCORE);
        assert_eq!(calculate_new_score(10.0, -25.0, 0), MIN_BEHAVIOR_SCORE);
    }

    #[test]
    fn test_negative_interaction_count_treated_as_zero() {
        assert_eq!(calculate_new_score(50.0, -10.0, -5), 40.0);
    }

    #[test]
    fn test_eligibility_threshold() {
        assert!(is_eligible(70.0));
        assert!(is_eligible(INITIAL_BEHAVIOR_SCORE));
        assert!(!is_eligible(69.99));
    }

    #[test]
    fn test_report_points_are_negative() {
        let reasons = [
            ReportReason::Cheating,
            ReportReason::Harassment,
            ReportReason::Toxicity,
            ReportReason::Griefing,
            ReportReason::Afk,
            ReportReason::Spam,
            ReportReason::Other,
        ];
        assert!(reasons.iter().all(|r| r.points() < 0.0));
        assert_eq!(ReportReason::Cheating.points(), -25.0);
    }

    #[test]
    fn test_endorsement_parsing() {
        let req: EndorsePlayerRequest = serde_json::from_str(
            r#"{"endorsed_user_id":"6f1c1b0e-8f7a-4a57-9a8e-2b1d4c2f3a10","category":"positive_attitude"}"#,
        )
        .unwrap();
        assert_eq!(req.category, EndorsementCategory::PositiveAttitude);
        assert_eq!(req.category.points(), 3.0);
        assert_eq!(req.category.as_str(), "positive_attitude");
    }
}
