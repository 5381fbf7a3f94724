use crate::api_error::ApiError;
use crate::db::DbPool;
use crate::models::common::UserSummary;
use crate::models::user::{PublicProfile, UpdateProfileRequest, User, UserProfile};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Load name info for `ids` so listings can merge authors in application code.
pub async fn fetch_user_summaries(
    pool: &DbPool,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, UserSummary>, ApiError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut unique = ids.to_vec();
    unique.sort_unstable();
    unique.dedup();

    let rows = sqlx::query_as::<_, UserSummary>(
        "SELECT id, username, display_name FROM users WHERE id = ANY($1)",
    )
    .bind(&unique)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|u| (u.id, u)).collect())
}

pub async fn find_user(pool: &DbPool, user_id: Uuid) -> Result<User, ApiError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

pub async fn user_exists(pool: &DbPool, user_id: Uuid) -> Result<bool, ApiError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1 AND is_active)")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

#[derive(Clone)]
pub struct UserService {
    db_pool: DbPool,
}

impl UserService {
    pub fn new(db_pool: DbPool) -> Self {
        Self { db_pool }
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<UserProfile, ApiError> {
        find_user(&self.db_pool, user_id).await.map(UserProfile::from)
    }

    pub async fn get_public_profile(&self, user_id: Uuid) -> Result<PublicProfile, ApiError> {
        let user = find_user(&self.db_pool, user_id).await?;
        if !user.is_active {
            return Err(ApiError::not_found("User not found"));
        }
        Ok(PublicProfile::from(user))
    }

    /// Apply a partial profile update; absent fields are left untouched.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdateProfileRequest,
    ) -> Result<UserProfile, ApiError> {
        request.validate()?;

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                display_name = COALESCE($2, display_name),
                bio = COALESCE($3, bio),
                favorite_games = COALESCE($4, favorite_games),
                xbox_gamertag = COALESCE($5, xbox_gamertag),
                psn_id = COALESCE($6, psn_id),
                nintendo_id = COALESCE($7, nintendo_id),
                discord_handle = COALESCE($8, discord_handle),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&request.display_name)
        .bind(&request.bio)
        .bind(&request.favorite_games)
        .bind(&request.xbox_gamertag)
        .bind(&request.psn_id)
        .bind(&request.nintendo_id)
        .bind(&request.discord_handle)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

        info!(user_id = %user_id, "Profile updated");

        Ok(UserProfile::from(user))
    }
}
