use crate::models::common::UserSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub body: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// The other participant from `me`'s point of view.
    pub fn partner_of(&self, me: Uuid) -> Uuid {
        if self.sender_id == me {
            self.recipient_id
        } else {
            self.sender_id
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub partner: Option<UserSummary>,
    pub partner_id: Uuid,
    pub last_message: Message,
    pub unread_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SendMessageRequest {
    pub recipient_id: Uuid,
    #[validate(length(min = 1, max = 2000))]
    pub body: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkReadResponse {
    pub marked: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partner_of() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let msg = Message {
            id: Uuid::new_v4(),
            sender_id: a,
            recipient_id: b,
            body: "gg".to_string(),
            read_at: None,
            created_at: Utc::now(),
        };
        assert_eq!(msg.partner_of(a), b);
        assert_eq!(msg.partner_of(b), a);
    }

    #[test]
    fn test_body_length() {
        let req = SendMessageRequest {
            recipient_id: Uuid::new_v4(),
            body: "x".repeat(2001),
        };
        assert!(req.validate().is_err());
    }
}
