use crate::api_error::ApiError;
use crate::db::DbPool;
use crate::models::discord::{
    DiscordSetting, NotificationType, UpsertDiscordSettingRequest, WebhookPayload,
};
use reqwest::Client;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

const WEBHOOK_TIMEOUT_SECS: u64 = 10;
/// Discord rejects message content longer than this.
const MAX_CONTENT_LEN: usize = 2000;

#[derive(Clone)]
pub struct DiscordService {
    db_pool: DbPool,
}

impl DiscordService {
    pub fn new(db_pool: DbPool) -> Self {
        Self { db_pool }
    }

    pub async fn get_settings(&self, user_id: Uuid) -> Result<Vec<DiscordSetting>, ApiError> {
        let settings = sqlx::query_as::<_, DiscordSetting>(
            "SELECT * FROM discord_settings WHERE user_id = $1 ORDER BY notification_type",
        )
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(settings)
    }

    /// Insert or replace the setting for `(user_id, notification_type)`.
    pub async fn upsert_setting(
        &self,
        user_id: Uuid,
        request: UpsertDiscordSettingRequest,
    ) -> Result<DiscordSetting, ApiError> {
        request.validate()?;

        let setting = sqlx::query_as::<_, DiscordSetting>(
            r#"
            INSERT INTO discord_settings (user_id, notification_type, enabled, webhook_url, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (user_id, notification_type) DO UPDATE SET
                enabled = EXCLUDED.enabled,
                webhook_url = EXCLUDED.webhook_url,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(request.notification_type.as_str())
        .bind(request.enabled)
        .bind(&request.webhook_url)
        .fetch_one(&self.db_pool)
        .await?;

        info!(
            user_id = %user_id,
            notification_type = %setting.notification_type,
            enabled = setting.enabled,
            "Discord setting saved"
        );

        Ok(setting)
    }
}

/// Sends Discord webhook notifications without blocking the request.
#[derive(Clone)]
pub struct DiscordNotifier {
    db_pool: DbPool,
    client: Client,
}

impl DiscordNotifier {
    pub fn new(db_pool: DbPool) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
            .build()?;
        Ok(Self { db_pool, client })
    }

    /// Fire-and-forget: runs in a spawned task and only logs failures.
    pub fn notify(&self, user_ids: Vec<Uuid>, notification_type: NotificationType, content: String) {
        if user_ids.is_empty() {
            return;
        }
        let notifier = self.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.deliver(&user_ids, notification_type, &content).await {
                error!(
                    error = %e,
                    notification_type = notification_type.as_str(),
                    "Failed to load Discord webhooks"
                );
            }
        });
    }

    async fn deliver(
        &self,
        user_ids: &[Uuid],
        notification_type: NotificationType,
        content: &str,
    ) -> Result<(), sqlx::Error> {
        let webhooks: Vec<(Uuid, String)> = sqlx::query_as(
            r#"
            SELECT user_id, webhook_url FROM discord_settings
            WHERE user_id = ANY($1) AND notification_type = $2
              AND enabled AND webhook_url IS NOT NULL
            "#,
        )
        .bind(user_ids)
        .bind(notification_type.as_str())
        .fetch_all(&self.db_pool)
        .await?;

        let content = truncate_content(content);
        for (user_id, url) in webhooks {
            let result = self
                .client
                .post(&url)
                .json(&WebhookPayload { content: &content })
                .send()
                .await
                .and_then(|r| r.error_for_status());

            if let Err(e) = result {
                warn!(user_id = %user_id, error = %e, "Discord webhook delivery failed");
            }
        }

        Ok(())
    }
}

fn truncate_content(content: &str) -> String {
    if content.chars().count() <= MAX_CONTENT_LEN {
        return content.to_string();
    }
    let mut truncated: String = content.chars().take(MAX_CONTENT_LEN - 1).collect();
    truncated.push('…');
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_content_untouched() {
        assert_eq!(truncate_content("Match ready!"), "Match ready!");
    }

    #[test]
    fn test_long_content_truncated() {
        let long = "a".repeat(MAX_CONTENT_LEN + 50);
        let out = truncate_content(&long);
        assert_eq!(out.chars().count(), MAX_CONTENT_LEN);
        assert!(out.ends_with('…'));
    }
}
