use crate::models::common::UserSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ForumCategory {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub position: i32,
    pub thread_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ForumThread {
    pub id: Uuid,
    pub category_id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub body: String,
    pub is_locked: bool,
    pub is_pinned: bool,
    pub reply_count: i32,
    pub last_activity_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ForumPost {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadListItem {
    #[serde(flatten)]
    pub thread: ForumThread,
    pub author: Option<UserSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    #[serde(flatten)]
    pub post: ForumPost,
    pub author: Option<UserSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ThreadDetailResponse {
    #[serde(flatten)]
    pub thread: ForumThread,
    pub author: Option<UserSummary>,
    pub posts: Vec<PostResponse>,
    pub total_posts: i64,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateThreadRequest {
    pub category_id: Uuid,
    #[validate(length(min = 3, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 10000))]
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(min = 1, max = 10000))]
    pub body: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModerateThreadRequest {
    pub is_locked: Option<bool>,
    pub is_pinned: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_title_bounds() {
        let req = CreateThreadRequest {
            category_id: Uuid::new_v4(),
            title: "GG".to_string(),
            body: "short title".to_string(),
        };
        assert!(req.validate().is_err());

        let req = CreateThreadRequest {
            title: "LFG ranked tonight".to_string(),
            ..req
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_empty_post_rejected() {
        let req = CreatePostRequest { body: String::new() };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_moderate_request_partial() {
        let req: ModerateThreadRequest = serde_json::from_str(r#"{"is_locked":true}"#).unwrap();
        assert_eq!(req.is_locked, Some(true));
        assert_eq!(req.is_pinned, None);
    }
}
