use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "clan_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ClanRole {
    Leader,
    CoLeader,
    Officer,
    Member,
}

impl ClanRole {
    pub fn rank(&self) -> u8 {
        match self {
            ClanRole::Leader => 3,
            ClanRole::CoLeader => 2,
            ClanRole::Officer => 1,
            ClanRole::Member => 0,
        }
    }

    pub fn outranks(&self, other: &ClanRole) -> bool {
        self.rank() > other.rank()
    }

    pub fn can_manage_settings(&self) -> bool {
        matches!(self, ClanRole::Leader | ClanRole::CoLeader)
    }

    /// Officers and above may remove members they outrank.
    pub fn can_kick(&self, target: &ClanRole) -> bool {
        self.rank() >= ClanRole::Officer.rank() && self.outranks(target)
    }

    pub fn can_host_tournaments(&self) -> bool {
        self.rank() >= ClanRole::Officer.rank()
    }
}

impl std::fmt::Display for ClanRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClanRole::Leader => write!(f, "leader"),
            ClanRole::CoLeader => write!(f, "co_leader"),
            ClanRole::Officer => write!(f, "officer"),
            ClanRole::Member => write!(f, "member"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Clan {
    pub id: Uuid,
    pub name: String,
    pub tag: String,
    pub description: Option<String>,
    pub primary_game: Option<String>,
    pub is_public: bool,
    pub max_members: i32,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClanMember {
    pub clan_id: Uuid,
    pub user_id: Uuid,
    pub role: ClanRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClanMemberResponse {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub role: ClanRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClanSummary {
    #[serde(flatten)]
    pub clan: Clan,
    pub member_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClanDetailResponse {
    #[serde(flatten)]
    pub clan: Clan,
    pub member_count: i64,
    pub members: Vec<ClanMemberResponse>,
}

pub fn validate_clan_tag(tag: &str) -> Result<(), ValidationError> {
    if !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::new("clan_tag_charset"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateClanRequest {
    #[validate(length(min = 3, max = 50))]
    pub name: String,
    #[validate(length(min = 2, max = 6), custom(function = "validate_clan_tag"))]
    pub tag: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub primary_game: Option<String>,
    #[serde(default = "default_true")]
    pub is_public: bool,
    #[validate(range(min = 2, max = 100))]
    pub max_members: Option<i32>,
}

impl CreateClanRequest {
    /// Strip surrounding whitespace so length rules see the stored value.
    pub fn trimmed(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.tag = self.tag.trim().to_string();
        self.primary_game = self.primary_game.map(|g| g.trim().to_string());
        self
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateClanRequest {
    #[validate(length(min = 3, max = 50))]
    pub name: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub primary_game: Option<String>,
    pub is_public: Option<bool>,
    #[validate(range(min = 2, max = 100))]
    pub max_members: Option<i32>,
}

impl UpdateClanRequest {
    pub fn trimmed(mut self) -> Self {
        self.name = self.name.map(|n| n.trim().to_string());
        self.primary_game = self.primary_game.map(|g| g.trim().to_string());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMemberRoleRequest {
    pub role: ClanRole,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClanListQuery {
    pub search: Option<String>,
    pub game: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ordering() {
        assert!(ClanRole::Leader.outranks(&ClanRole::CoLeader));
        assert!(ClanRole::CoLeader.outranks(&ClanRole::Officer));
        assert!(ClanRole::Officer.outranks(&ClanRole::Member));
        assert!(!ClanRole::Member.outranks(&ClanRole::Member));
    }

    #[test]
    fn test_settings_permission() {
        assert!(ClanRole::Leader.can_manage_settings());
        assert!(ClanRole::CoLeader.can_manage_settings());
        assert!(!ClanRole::Officer.can_manage_settings());
        assert!(!ClanRole::Member.can_manage_settings());
    }

    #[test]
    fn test_kick_permission() {
        assert!(ClanRole::Leader.can_kick(&ClanRole::CoLeader));
        assert!(ClanRole::Officer.can_kick(&ClanRole::Member));
        assert!(!ClanRole::Officer.can_kick(&ClanRole::Officer));
        assert!(!ClanRole::Member.can_kick(&ClanRole::Member));
        assert!(!ClanRole::CoLeader.can_kick(&ClanRole::Leader));
    }

    #[test]
    fn test_create_clan_validation() {
        let req: CreateClanRequest =
            serde_json::from_str(r#"{"name":"Night Owls","tag":"NOWL"}"#).unwrap();
        assert!(req.is_public);
        assert!(req.validate().is_ok());

        let bad_tag = CreateClanRequest {
            tag: "N-OWL".to_string(),
            ..req.clone()
        };
        assert!(bad_tag.validate().is_err());

        let long_tag = CreateClanRequest {
            tag: "NIGHTOWL".to_string(),
            ..req.clone()
        };
        assert!(long_tag.validate().is_err());

        let tiny_clan = CreateClanRequest {
            max_members: Some(1),
            ..req
        };
        assert!(tiny_clan.validate().is_err());
    }

    #[test]
    fn test_padding_does_not_satisfy_length_rules() {
        let req: CreateClanRequest =
            serde_json::from_str(r#"{"name":"  ab  ","tag":"NOWL"}"#).unwrap();
        assert!(req.validate().is_ok());

        let req = req.trimmed();
        assert_eq!(req.name, "ab");
        assert!(req.validate().is_err());

        let padded_tag: CreateClanRequest =
            serde_json::from_str(r#"{"name":"Night Owls","tag":" NOWL "}"#).unwrap();
        assert!(padded_tag.trimmed().validate().is_ok());

        let update = UpdateClanRequest {
            name: Some("   x   ".to_string()),
            ..Default::default()
        }
        .trimmed();
        assert_eq!(update.name.as_deref(), Some("x"));
        assert!(update.validate().is_err());

        let fine: CreateClanRequest =
            serde_json::from_str(r#"{"name":" Night Owls ","tag":"NOWL"}"#).unwrap();
        assert_eq!(fine.trimmed().name, "Night Owls");
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&ClanRole::CoLeader).unwrap(), "\"co_leader\"");
        assert_eq!(ClanRole::CoLeader.to_string(), "co_leader");
    }
}
