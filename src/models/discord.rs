use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

const WEBHOOK_PREFIXES: [&str; 2] = [
    "https://discord.com/api/webhooks/",
    "https://discordapp.com/api/webhooks/",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    TournamentStart,
    MatchReady,
    ClanActivity,
    HuntReminder,
    DirectMessage,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::TournamentStart => "tournament_start",
            NotificationType::MatchReady => "match_ready",
            NotificationType::ClanActivity => "clan_activity",
            NotificationType::HuntReminder => "hunt_reminder",
            NotificationType::DirectMessage => "direct_message",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DiscordSetting {
    pub user_id: Uuid,
    pub notification_type: String,
    pub enabled: bool,
    pub webhook_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

pub fn validate_webhook_url(url: &str) -> Result<(), ValidationError> {
    let long_enough = WEBHOOK_PREFIXES
        .iter()
        .any(|prefix| url.starts_with(prefix) && url.len() > prefix.len());
    if !long_enough {
        return Err(ValidationError::new("discord_webhook_url"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpsertDiscordSettingRequest {
    pub notification_type: NotificationType,
    pub enabled: bool,
    #[validate(length(max = 512), custom(function = "validate_webhook_url"))]
    pub webhook_url: Option<String>,
}

/// Body posted to a Discord webhook.
#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    pub content: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_hosts() {
        assert!(validate_webhook_url("https://discord.com/api/webhooks/123/abc").is_ok());
        assert!(validate_webhook_url("https://discordapp.com/api/webhooks/123/abc").is_ok());
        assert!(validate_webhook_url("https://discord.com/api/webhooks/").is_err());
        assert!(validate_webhook_url("http://discord.com/api/webhooks/123/abc").is_err());
        assert!(validate_webhook_url("https://evil.example/api/webhooks/123").is_err());
    }

    #[test]
    fn test_upsert_without_url_is_valid() {
        let req: UpsertDiscordSettingRequest =
            serde_json::from_str(r#"{"notification_type":"direct_message","enabled":false}"#).unwrap();
        assert_eq!(req.notification_type, NotificationType::DirectMessage);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_type_names_match_serde() {
        for t in [
            NotificationType::TournamentStart,
            NotificationType::MatchReady,
            NotificationType::ClanActivity,
            NotificationType::HuntReminder,
            NotificationType::DirectMessage,
        ] {
            assert_eq!(serde_json::to_string(&t).unwrap(), format!("\"{}\"", t.as_str()));
        }
    }
}
