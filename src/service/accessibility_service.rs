use crate::api_error::ApiError;
use crate::db::DbPool;
use crate::models::accessibility::{AccessibilitySettings, UpdateAccessibilityRequest};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct AccessibilityService {
    db_pool: DbPool,
}

impl AccessibilityService {
    pub fn new(db_pool: DbPool) -> Self {
        Self { db_pool }
    }

    /// Stored settings, or the defaults when the user never saved any.
    pub async fn get(&self, user_id: Uuid) -> Result<AccessibilitySettings, ApiError> {
        let settings = sqlx::query_as::<_, AccessibilitySettings>(
            "SELECT * FROM accessibility_settings WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(settings.unwrap_or_else(|| AccessibilitySettings::defaults_for(user_id)))
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        request: UpdateAccessibilityRequest,
    ) -> Result<AccessibilitySettings, ApiError> {
        request.validate()?;

        let settings = sqlx::query_as::<_, AccessibilitySettings>(
            r#"
            INSERT INTO accessibility_settings (
                user_id, high_contrast, reduced_motion, screen_reader_hints,
                caption_voice_chat, font_scale, colorblind_mode
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id) DO UPDATE SET
                high_contrast = EXCLUDED.high_contrast,
                reduced_motion = EXCLUDED.reduced_motion,
                screen_reader_hints = EXCLUDED.screen_reader_hints,
                caption_voice_chat = EXCLUDED.caption_voice_chat,
                font_scale = EXCLUDED.font_scale,
                colorblind_mode = EXCLUDED.colorblind_mode,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(request.high_contrast)
        .bind(request.reduced_motion)
        .bind(request.screen_reader_hints)
        .bind(request.caption_voice_chat)
        .bind(request.font_scale)
        .bind(&request.colorblind_mode)
        .fetch_one(&self.db_pool)
        .await?;

        info!(user_id = %user_id, "Accessibility settings saved");

        Ok(settings)
    }
}
