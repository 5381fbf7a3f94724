use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "hunt_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HuntStatus {
    Recruiting,
    InProgress,
    Completed,
    Cancelled,
}

impl HuntStatus {
    /// Completed and cancelled hunts are frozen.
    pub fn is_active(self) -> bool {
        matches!(self, HuntStatus::Recruiting | HuntStatus::InProgress)
    }

    pub fn accepts_ready_changes(self) -> bool {
        self == HuntStatus::Recruiting
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "hunt_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HuntRole {
    Leader,
    Member,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Hunt {
    pub id: Uuid,
    pub game: String,
    pub achievement_name: String,
    pub description: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub max_members: i32,
    pub status: HuntStatus,
    pub created_by: Uuid,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HuntMember {
    pub hunt_id: Uuid,
    pub user_id: Uuid,
    pub role: HuntRole,
    pub is_ready: bool,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HuntMemberResponse {
    pub user_id: Uuid,
    pub username: String,
    pub role: HuntRole,
    pub is_ready: bool,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HuntSummary {
    #[serde(flatten)]
    pub hunt: Hunt,
    pub member_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HuntDetailResponse {
    #[serde(flatten)]
    pub hunt: Hunt,
    pub members: Vec<HuntMemberResponse>,
}

/// Reason a hunt cannot start yet, if any.
pub fn start_blocker(members: &[HuntMember]) -> Option<&'static str> {
    if members.len() < 2 {
        return Some("A hunt needs at least 2 members to start");
    }
    if members.iter().any(|m| !m.is_ready) {
        return Some("All members must be ready");
    }
    None
}

/// Member who inherits leadership: the earliest joiner other than `leaving`.
pub fn next_leader(members: &[HuntMember], leaving: Uuid) -> Option<Uuid> {
    members
        .iter()
        .filter(|m| m.user_id != leaving)
        .min_by_key(|m| m.joined_at)
        .map(|m| m.user_id)
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateHuntRequest {
    #[validate(length(min = 1, max = 50))]
    pub game: String,
    #[validate(length(min = 3, max = 200))]
    pub achievement_name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    #[validate(range(min = 2, max = 16))]
    pub max_members: i32,
}

impl CreateHuntRequest {
    pub fn trimmed(mut self) -> Self {
        self.game = self.game.trim().to_string();
        self.achievement_name = self.achievement_name.trim().to_string();
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetReadyRequest {
    pub ready: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HuntListQuery {
    pub game: Option<String>,
    pub status: Option<HuntStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn member(joined_minutes_ago: i64, ready: bool) -> HuntMember {
        HuntMember {
            hunt_id: Uuid::nil(),
            user_id: Uuid::new_v4(),
            role: HuntRole::Member,
            is_ready: ready,
            joined_at: Utc::now() - Duration::minutes(joined_minutes_ago),
        }
    }

    #[test]
    fn test_start_requires_two_ready_members() {
        assert!(start_blocker(&[member(5, true)]).is_some());
        assert!(start_blocker(&[member(5, true), member(3, false)]).is_some());
        assert!(start_blocker(&[member(5, true), member(3, true)]).is_none());
    }

    #[test]
    fn test_leadership_goes_to_earliest_member() {
        let leader = member(30, true);
        let veteran = member(20, false);
        let newcomer = member(1, false);
        let members = vec![leader.clone(), newcomer, veteran.clone()];
        assert_eq!(next_leader(&members, leader.user_id), Some(veteran.user_id));
    }

    #[test]
    fn test_no_successor_when_alone() {
        let leader = member(10, true);
        assert_eq!(next_leader(&[leader.clone()], leader.user_id), None);
    }

    #[test]
    fn test_finished_hunts_are_frozen() {
        assert!(HuntStatus::Recruiting.is_active());
        assert!(HuntStatus::InProgress.is_active());
        assert!(!HuntStatus::Completed.is_active());
        assert!(!HuntStatus::Cancelled.is_active());

        assert!(HuntStatus::Recruiting.accepts_ready_changes());
        assert!(!HuntStatus::InProgress.accepts_ready_changes());
        assert!(!HuntStatus::Completed.accepts_ready_changes());
        assert!(!HuntStatus::Cancelled.accepts_ready_changes());
    }

    #[test]
    fn test_member_cap_bounds() {
        let req = CreateHuntRequest {
            game: "Destiny 2".to_string(),
            achievement_name: "Flawless raid".to_string(),
            description: None,
            scheduled_at: None,
            max_members: 17,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_whitespace_achievement_name_is_rejected() {
        let req = CreateHuntRequest {
            game: " Destiny 2 ".to_string(),
            achievement_name: "  a  ".to_string(),
            description: None,
            scheduled_at: None,
            max_members: 4,
        };
        assert!(req.validate().is_ok());

        let req = req.trimmed();
        assert_eq!(req.game, "Destiny 2");
        assert!(req.validate().is_err());
    }
}
