use crate::models::common::UserSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

const SLUG_MAX_BASE_LEN: usize = 80;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BlogPost {
    pub id: Uuid,
    pub author_id: Uuid,
    pub slug: String,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub is_published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BlogComment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogPostResponse {
    #[serde(flatten)]
    pub post: BlogPost,
    pub author: Option<UserSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentResponse {
    #[serde(flatten)]
    pub comment: BlogComment,
    pub author: Option<UserSummary>,
}

/// Kebab-case a title: lowercase ASCII alphanumerics joined by single dashes.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let mut slug = slug.trim_end_matches('-').to_string();
    if slug.len() > SLUG_MAX_BASE_LEN {
        slug.truncate(SLUG_MAX_BASE_LEN);
        slug = slug.trim_end_matches('-').to_string();
    }
    if slug.is_empty() {
        slug.push_str("post");
    }
    slug
}

/// `slugify(title)` plus a 6 hex character suffix.
pub fn slug_with_suffix(title: &str, suffix: u32) -> String {
    format!("{}-{:06x}", slugify(title), suffix & 0x00ff_ffff)
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateBlogPostRequest {
    #[validate(length(min = 3, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 50000))]
    pub body: String,
    #[serde(default)]
    #[validate(length(max = 10))]
    pub tags: Vec<String>,
    #[serde(default)]
    pub published: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateBlogPostRequest {
    #[validate(length(min = 3, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 50000))]
    pub body: Option<String>,
    #[validate(length(max = 10))]
    pub tags: Option<Vec<String>>,
    pub published: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, max = 2000))]
    pub body: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlogListQuery {
    pub tag: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("My First Clutch!"), "my-first-clutch");
        assert_eq!(slugify("  Patch 1.2  --  Notes "), "patch-1-2-notes");
        assert_eq!(slugify("!!!"), "post");
    }

    #[test]
    fn test_slug_suffix_is_six_hex_chars() {
        let slug = slug_with_suffix("Tier List", 0xab);
        assert_eq!(slug, "tier-list-0000ab");

        let slug = slug_with_suffix("Tier List", u32::MAX);
        assert_eq!(slug, "tier-list-ffffff");
    }

    #[test]
    fn test_long_titles_are_truncated() {
        let title = "word ".repeat(40);
        let slug = slugify(&title);
        assert!(slug.len() <= 80);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn test_create_request_defaults() {
        let req: CreateBlogPostRequest =
            serde_json::from_str(r#"{"title":"Season recap","body":"It was wild."}"#).unwrap();
        assert!(!req.published);
        assert!(req.tags.is_empty());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_too_many_tags() {
        let req = CreateBlogPostRequest {
            title: "Tags galore".to_string(),
            body: "body".to_string(),
            tags: (0..11).map(|i| i.to_string()).collect(),
            published: true,
        };
        assert!(req.validate().is_err());
    }
}
