use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "tournament_format", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TournamentFormat {
    SingleElimination,
    DoubleElimination,
    RoundRobin,
}

impl TournamentFormat {
    /// Whether match results alone decide the champion. Double elimination
    /// runs its losers bracket and grand final outside the recorded matches.
    pub fn crowns_automatically(self) -> bool {
        !matches!(self, TournamentFormat::DoubleElimination)
    }
}

impl std::fmt::Display for TournamentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TournamentFormat::SingleElimination => write!(f, "single_elimination"),
            TournamentFormat::DoubleElimination => write!(f, "double_elimination"),
            TournamentFormat::RoundRobin => write!(f, "round_robin"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "tournament_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    RegistrationOpen,
    InProgress,
    Completed,
    Cancelled,
}

impl TournamentStatus {
    pub fn can_transition_to(&self, next: TournamentStatus) -> bool {
        use TournamentStatus::*;
        matches!(
            (self, next),
            (RegistrationOpen, InProgress)
                | (InProgress, Completed)
                | (RegistrationOpen, Cancelled)
                | (InProgress, Cancelled)
        )
    }
}

impl std::fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TournamentStatus::RegistrationOpen => write!(f, "registration_open"),
            TournamentStatus::InProgress => write!(f, "in_progress"),
            TournamentStatus::Completed => write!(f, "completed"),
            TournamentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "match_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tournament {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub game: String,
    pub format: TournamentFormat,
    pub status: TournamentStatus,
    pub max_participants: i32,
    pub start_time: DateTime<Utc>,
    pub registration_deadline: DateTime<Utc>,
    pub rules: Option<String>,
    pub clan_id: Option<Uuid>,
    pub organizer_id: Uuid,
    pub winner_id: Option<Uuid>,
    pub bracket_generated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tournament {
    pub fn is_registration_open(&self, now: DateTime<Utc>) -> bool {
        self.status == TournamentStatus::RegistrationOpen
            && self.bracket_generated_at.is_none()
            && now <= self.registration_deadline
    }

    /// Reason the organizer cannot declare a winner, if any.
    pub fn finalize_blocker(&self) -> Option<&'static str> {
        if !self.status.can_transition_to(TournamentStatus::Completed) {
            return Some("Only tournaments in progress can be finalized");
        }
        if self.format.crowns_automatically() {
            return Some("This format decides its winner from match results");
        }
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TournamentParticipant {
    pub tournament_id: Uuid,
    pub user_id: Uuid,
    pub seed: i32,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantResponse {
    pub user_id: Uuid,
    pub username: String,
    pub seed: i32,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TournamentMatch {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub round_number: i32,
    pub match_number: i32,
    pub player1_id: Option<Uuid>,
    pub player2_id: Option<Uuid>,
    pub player1_score: Option<i32>,
    pub player2_score: Option<i32>,
    pub winner_id: Option<Uuid>,
    pub status: MatchStatus,
    pub is_bye: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TournamentMatch {
    pub fn has_player(&self, user_id: Uuid) -> bool {
        self.player1_id == Some(user_id) || self.player2_id == Some(user_id)
    }
}

/// Tournament row with its participant count merged in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentSummary {
    #[serde(flatten)]
    pub tournament: Tournament,
    pub participant_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentDetailResponse {
    #[serde(flatten)]
    pub tournament: Tournament,
    pub participants: Vec<ParticipantResponse>,
    pub matches: Vec<TournamentMatch>,
}

fn validate_future(time: &DateTime<Utc>) -> Result<(), ValidationError> {
    if *time <= Utc::now() {
        return Err(ValidationError::new("must_be_in_future"));
    }
    Ok(())
}

fn validate_schedule(req: &CreateTournamentRequest) -> Result<(), ValidationError> {
    if req.registration_deadline > req.start_time {
        return Err(ValidationError::new("deadline_after_start"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_schedule"))]
pub struct CreateTournamentRequest {
    #[validate(length(min = 3, max = 255))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub game: String,
    pub format: TournamentFormat,
    #[validate(range(min = 2, max = 256))]
    pub max_participants: i32,
    #[validate(custom(function = "validate_future"))]
    pub start_time: DateTime<Utc>,
    pub registration_deadline: DateTime<Utc>,
    #[validate(length(max = 5000))]
    pub rules: Option<String>,
    pub clan_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateTournamentRequest {
    #[validate(length(min = 3, max = 255))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 2, max = 256))]
    pub max_participants: Option<i32>,
    #[validate(custom(function = "validate_future"))]
    pub start_time: Option<DateTime<Utc>>,
    pub registration_deadline: Option<DateTime<Utc>>,
    #[validate(length(max = 5000))]
    pub rules: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TournamentListQuery {
    pub status: Option<TournamentStatus>,
    pub game: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReportMatchResultRequest {
    #[validate(range(min = 0))]
    pub player1_score: i32,
    #[validate(range(min = 0))]
    pub player2_score: i32,
    pub winner_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeTournamentRequest {
    pub winner_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn tournament(format: TournamentFormat, status: TournamentStatus) -> Tournament {
        let start = Utc::now();
        Tournament {
            id: Uuid::new_v4(),
            name: "Friday Night Brawl".to_string(),
            description: None,
            game: "Tekken 8".to_string(),
            format,
            status,
            max_participants: 8,
            start_time: start,
            registration_deadline: start - Duration::hours(1),
            rules: None,
            clan_id: None,
            organizer_id: Uuid::new_v4(),
            winner_id: None,
            bracket_generated_at: Some(start),
            created_at: start,
            updated_at: start,
        }
    }

    fn create_request() -> CreateTournamentRequest {
        let start = Utc::now() + Duration::days(7);
        CreateTournamentRequest {
            name: "Friday Night Brawl".to_string(),
            description: None,
            game: "Tekken 8".to_string(),
            format: TournamentFormat::SingleElimination,
            max_participants: 16,
            start_time: start,
            registration_deadline: start - Duration::hours(1),
            rules: None,
            clan_id: None,
        }
    }

    #[test]
    fn test_create_request_valid() {
        assert!(create_request().validate().is_ok());
    }

    #[test]
    fn test_start_time_must_be_future() {
        let mut req = create_request();
        req.start_time = Utc::now() - Duration::hours(1);
        req.registration_deadline = req.start_time - Duration::hours(1);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_deadline_after_start_rejected() {
        let mut req = create_request();
        req.registration_deadline = req.start_time + Duration::minutes(1);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_participant_bounds() {
        let mut req = create_request();
        req.max_participants = 1;
        assert!(req.validate().is_err());
        req.max_participants = 257;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_status_transitions() {
        use TournamentStatus::*;
        assert!(RegistrationOpen.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(InProgress));
    }

    #[test]
    fn test_only_running_double_elimination_is_finalized_by_hand() {
        use TournamentFormat::*;
        use TournamentStatus::*;

        assert!(tournament(DoubleElimination, InProgress).finalize_blocker().is_none());
        assert!(tournament(DoubleElimination, RegistrationOpen).finalize_blocker().is_some());
        assert!(tournament(DoubleElimination, Completed).finalize_blocker().is_some());
        assert!(tournament(DoubleElimination, Cancelled).finalize_blocker().is_some());
        assert!(tournament(SingleElimination, InProgress).finalize_blocker().is_some());
        assert!(tournament(RoundRobin, InProgress).finalize_blocker().is_some());
    }

    #[test]
    fn test_format_parsing() {
        let format: TournamentFormat = serde_json::from_str("\"round_robin\"").unwrap();
        assert_eq!(format, TournamentFormat::RoundRobin);
        assert_eq!(TournamentFormat::DoubleElimination.to_string(), "double_elimination");
    }

    #[test]
    fn test_negative_score_rejected() {
        let req = ReportMatchResultRequest {
            player1_score: -1,
            player2_score: 2,
            winner_id: Uuid::new_v4(),
        };
        assert!(req.validate().is_err());
    }
}
