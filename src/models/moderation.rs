use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "report_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Open,
    Resolved,
    Dismissed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "verification_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportTargetType {
    User,
    ForumPost,
    BlogPost,
    BlogComment,
    Message,
    Clan,
}

impl ReportTargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportTargetType::User => "user",
            ReportTargetType::ForumPost => "forum_post",
            ReportTargetType::BlogPost => "blog_post",
            ReportTargetType::BlogComment => "blog_comment",
            ReportTargetType::Message => "message",
            ReportTargetType::Clan => "clan",
        }
    }

    /// Table holding the reported row, used to check that the target exists.
    pub fn table(&self) -> &'static str {
        match self {
            ReportTargetType::User => "users",
            ReportTargetType::ForumPost => "forum_posts",
            ReportTargetType::BlogPost => "blog_posts",
            ReportTargetType::BlogComment => "blog_comments",
            ReportTargetType::Message => "messages",
            ReportTargetType::Clan => "clans",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Xbox,
    Playstation,
    Nintendo,
    Steam,
    Discord,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Xbox => "xbox",
            Platform::Playstation => "playstation",
            Platform::Nintendo => "nintendo",
            Platform::Steam => "steam",
            Platform::Discord => "discord",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContentReport {
    pub id: Uuid,
    pub reporter_id: Uuid,
    pub target_type: String,
    pub target_id: Uuid,
    pub reason: String,
    pub details: Option<String>,
    pub status: ReportStatus,
    pub resolved_by: Option<Uuid>,
    pub resolution_note: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VerificationRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub platform: String,
    pub gamertag: String,
    pub evidence_url: String,
    pub status: VerificationStatus,
    pub reviewed_by: Option<Uuid>,
    pub review_note: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateReportRequest {
    pub target_type: ReportTargetType,
    pub target_id: Uuid,
    #[validate(length(min = 3, max = 100))]
    pub reason: String,
    #[validate(length(max = 2000))]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportListQuery {
    pub status: Option<ReportStatus>,
}

fn validate_resolution(status: &ReportStatus) -> Result<(), ValidationError> {
    if *status == ReportStatus::Open {
        return Err(ValidationError::new("resolution_status"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ResolveReportRequest {
    #[validate(custom(function = "validate_resolution"))]
    pub status: ReportStatus,
    #[validate(length(max = 2000))]
    pub resolution_note: Option<String>,
}

fn validate_https(url: &str) -> Result<(), ValidationError> {
    if !url.starts_with("https://") {
        return Err(ValidationError::new("https_required"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateVerificationRequest {
    pub platform: Platform,
    #[validate(length(min = 1, max = 64))]
    pub gamertag: String,
    #[validate(url, custom(function = "validate_https"))]
    pub evidence_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReviewVerificationRequest {
    pub approved: bool,
    #[validate(length(max = 2000))]
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_reason_bounds() {
        let req = CreateReportRequest {
            target_type: ReportTargetType::ForumPost,
            target_id: Uuid::new_v4(),
            reason: "no".to_string(),
            details: None,
        };
        assert!(req.validate().is_err());
        let req = CreateReportRequest {
            reason: "spam links".to_string(),
            ..req
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_resolution_cannot_reopen() {
        let req = ResolveReportRequest {
            status: ReportStatus::Open,
            resolution_note: None,
        };
        assert!(req.validate().is_err());
        let req = ResolveReportRequest {
            status: ReportStatus::Dismissed,
            resolution_note: Some("not a violation".into()),
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_evidence_must_be_https() {
        let req = CreateVerificationRequest {
            platform: Platform::Steam,
            gamertag: "gabe".to_string(),
            evidence_url: "http://steamcommunity.com/id/gabe".to_string(),
        };
        assert!(req.validate().is_err());
        let req = CreateVerificationRequest {
            evidence_url: "https://steamcommunity.com/id/gabe".to_string(),
            ..req
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_target_type_parsing() {
        let t: ReportTargetType = serde_json::from_str("\"blog_comment\"").unwrap();
        assert_eq!(t, ReportTargetType::BlogComment);
        assert_eq!(t.table(), "blog_comments");
    }
}
