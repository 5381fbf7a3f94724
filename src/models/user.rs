use crate::models::mood::MoodKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Moderator,
    Admin,
}

impl UserRole {
    /// Role names carried in token claims.
    pub fn claim_roles(&self) -> Vec<String> {
        match self {
            UserRole::User => vec!["user".to_string()],
            UserRole::Moderator => vec!["user".to_string(), "moderator".to_string()],
            UserRole::Admin => vec!["user".to_string(), "admin".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub favorite_games: Vec<String>,
    pub xbox_gamertag: Option<String>,
    pub psn_id: Option<String>,
    pub nintendo_id: Option<String>,
    pub discord_handle: Option<String>,
    pub mood: Option<MoodKind>,
    pub mood_intensity: Option<i16>,
    pub behavior_score: f64,
    pub total_interactions: i32,
    pub is_verified: bool,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile returned to the account owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub favorite_games: Vec<String>,
    pub xbox_gamertag: Option<String>,
    pub psn_id: Option<String>,
    pub nintendo_id: Option<String>,
    pub discord_handle: Option<String>,
    pub mood: Option<MoodKind>,
    pub mood_intensity: Option<i16>,
    pub behavior_score: f64,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            display_name: user.display_name,
            bio: user.bio,
            favorite_games: user.favorite_games,
            xbox_gamertag: user.xbox_gamertag,
            psn_id: user.psn_id,
            nintendo_id: user.nintendo_id,
            discord_handle: user.discord_handle,
            mood: user.mood,
            mood_intensity: user.mood_intensity,
            behavior_score: user.behavior_score,
            is_verified: user.is_verified,
            created_at: user.created_at,
        }
    }
}

/// Profile visible to other players; no email or role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicProfile {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub favorite_games: Vec<String>,
    pub xbox_gamertag: Option<String>,
    pub psn_id: Option<String>,
    pub nintendo_id: Option<String>,
    pub discord_handle: Option<String>,
    pub mood: Option<MoodKind>,
    pub mood_intensity: Option<i16>,
    pub behavior_score: f64,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for PublicProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            bio: user.bio,
            favorite_games: user.favorite_games,
            xbox_gamertag: user.xbox_gamertag,
            psn_id: user.psn_id,
            nintendo_id: user.nintendo_id,
            discord_handle: user.discord_handle,
            mood: user.mood,
            mood_intensity: user.mood_intensity,
            behavior_score: user.behavior_score,
            is_verified: user.is_verified,
            created_at: user.created_at,
        }
    }
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let valid_chars = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid_chars {
        return Err(ValidationError::new("username_charset"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 32), custom(function = "validate_username"))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 50))]
    pub display_name: Option<String>,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    #[validate(length(max = 10))]
    pub favorite_games: Option<Vec<String>>,
    #[validate(length(max = 64))]
    pub xbox_gamertag: Option<String>,
    #[validate(length(max = 64))]
    pub psn_id: Option<String>,
    #[validate(length(max = 64))]
    pub nintendo_id: Option<String>,
    #[validate(length(max = 64))]
    pub discord_handle: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_validation() {
        let ok = CreateUserRequest {
            username: "Frag_Master99".to_string(),
            email: "frag@example.com".to_string(),
            password: "supersecret".to_string(),
        };
        assert!(ok.validate().is_ok());

        let bad_chars = CreateUserRequest {
            username: "frag master".to_string(),
            ..ok.clone()
        };
        assert!(bad_chars.validate().is_err());

        let too_short = CreateUserRequest {
            username: "ab".to_string(),
            ..ok.clone()
        };
        assert!(too_short.validate().is_err());

        let short_password = CreateUserRequest {
            password: "short".to_string(),
            ..ok
        };
        assert!(short_password.validate().is_err());
    }

    #[test]
    fn test_profile_update_limits() {
        let too_many_games = UpdateProfileRequest {
            favorite_games: Some((0..11).map(|i| format!("game-{}", i)).collect()),
            ..Default::default()
        };
        assert!(too_many_games.validate().is_err());

        let empty_display_name = UpdateProfileRequest {
            display_name: Some(String::new()),
            ..Default::default()
        };
        assert!(empty_display_name.validate().is_err());

        assert!(UpdateProfileRequest::default().validate().is_ok());
    }

    #[test]
    fn test_claim_roles() {
        assert_eq!(UserRole::User.claim_roles(), vec!["user"]);
        assert!(UserRole::Admin.claim_roles().contains(&"admin".to_string()));
        assert!(UserRole::Moderator
            .claim_roles()
            .contains(&"moderator".to_string()));
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            username: "p1".to_string(),
            email: "p1@example.com".to_string(),
            password_hash: "$2b$secret".to_string(),
            role: UserRole::User,
            display_name: None,
            bio: None,
            favorite_games: vec![],
            xbox_gamertag: None,
            psn_id: None,
            nintendo_id: None,
            discord_handle: None,
            mood: None,
            mood_intensity: None,
            behavior_score: 100.0,
            total_interactions: 0,
            is_verified: false,
            is_active: true,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret"));
    }
}
