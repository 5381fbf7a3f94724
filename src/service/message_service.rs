use crate::api_error::ApiError;
use crate::db::DbPool;
use crate::middleware::RateLimiter;
use crate::models::common::{ListResponse, PageQuery};
use crate::models::discord::NotificationType;
use crate::models::message::{Conversation, MarkReadResponse, Message, SendMessageRequest};
use crate::service::discord_service::DiscordNotifier;
use crate::service::live_hub::{user_topic, LiveHub};
use crate::service::user_service::{fetch_user_summaries, user_exists};
use serde_json::json;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

const MESSAGES_PER_MINUTE: u32 = 30;
const CONVERSATION_SCAN_LIMIT: i64 = 1000;

#[derive(Clone)]
pub struct MessageService {
    db_pool: DbPool,
    rate_limiter: RateLimiter,
    live: LiveHub,
    notifier: DiscordNotifier,
}

impl MessageService {
    pub fn new(db_pool: DbPool, rate_limiter: RateLimiter, live: LiveHub, notifier: DiscordNotifier) -> Self {
        Self {
            db_pool,
            rate_limiter,
            live,
            notifier,
        }
    }

    pub async fn send(&self, sender_id: Uuid, request: SendMessageRequest) -> Result<Message, ApiError> {
        request.validate()?;

        if sender_id == request.recipient_id {
            return Err(ApiError::bad_request("You cannot message yourself"));
        }

        self.rate_limiter
            .check(&format!("messages:{}", sender_id), MESSAGES_PER_MINUTE, 60)
            .await?;

        if !user_exists(&self.db_pool, request.recipient_id).await? {
            return Err(ApiError::not_found("Recipient not found"));
        }

        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (id, sender_id, recipient_id, body)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(sender_id)
        .bind(request.recipient_id)
        .bind(&request.body)
        .fetch_one(&self.db_pool)
        .await?;

        info!(message_id = %message.id, sender_id = %sender_id, recipient_id = %message.recipient_id, "Message sent");

        self.live.publish(
            user_topic(message.recipient_id),
            json!({ "type": "message_created", "message": &message }),
        );

        let sender_name = fetch_user_summaries(&self.db_pool, &[sender_id])
            .await?
            .remove(&sender_id)
            .map(|u| u.username)
            .unwrap_or_else(|| "Someone".to_string());
        self.notifier.notify(
            vec![message.recipient_id],
            NotificationType::DirectMessage,
            format!("New message from {}", sender_name),
        );

        Ok(message)
    }

    /// One entry per partner with the latest message, newest conversation first.
    pub async fn conversations(&self, user_id: Uuid) -> Result<Vec<Conversation>, ApiError> {
        let recent = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE sender_id = $1 OR recipient_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(CONVERSATION_SCAN_LIMIT)
        .fetch_all(&self.db_pool)
        .await?;

        let unread: HashMap<Uuid, i64> = sqlx::query_as::<_, (Uuid, i64)>(
            r#"
            SELECT sender_id, COUNT(*) FROM messages
            WHERE recipient_id = $1 AND read_at IS NULL
            GROUP BY sender_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?
        .into_iter()
        .collect();

        let mut latest: Vec<Message> = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for message in recent {
            if seen.insert(message.partner_of(user_id)) {
                latest.push(message);
            }
        }

        let partner_ids: Vec<Uuid> = latest.iter().map(|m| m.partner_of(user_id)).collect();
        let partners = fetch_user_summaries(&self.db_pool, &partner_ids).await?;

        Ok(latest
            .into_iter()
            .map(|last_message| {
                let partner_id = last_message.partner_of(user_id);
                Conversation {
                    partner: partners.get(&partner_id).cloned(),
                    partner_id,
                    unread_count: unread.get(&partner_id).copied().unwrap_or(0),
                    last_message,
                }
            })
            .collect())
    }

    pub async fn thread(
        &self,
        user_id: Uuid,
        partner_id: Uuid,
        page: &PageQuery,
    ) -> Result<ListResponse<Message>, ApiError> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE (sender_id = $1 AND recipient_id = $2) OR (sender_id = $2 AND recipient_id = $1)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(partner_id)
        .bind(page.per_page())
        .bind(page.offset())
        .fetch_all(&self.db_pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM messages
            WHERE (sender_id = $1 AND recipient_id = $2) OR (sender_id = $2 AND recipient_id = $1)
            "#,
        )
        .bind(user_id)
        .bind(partner_id)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(ListResponse::new(messages, total, page))
    }

    pub async fn mark_read(&self, user_id: Uuid, partner_id: Uuid) -> Result<MarkReadResponse, ApiError> {
        let result = sqlx::query(
            r#"
            UPDATE messages SET read_at = NOW()
            WHERE recipient_id = $1 AND sender_id = $2 AND read_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(partner_id)
        .execute(&self.db_pool)
        .await?;

        let marked = result.rows_affected();
        if marked > 0 {
            info!(user_id = %user_id, partner_id = %partner_id, marked = marked, "Messages marked read");
        }

        Ok(MarkReadResponse { marked })
    }
}
