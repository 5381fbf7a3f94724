use crate::api_error::ApiError;
use crate::db::DbPool;
use crate::models::common::{ListResponse, PageQuery};
use crate::models::moderation::{
    ContentReport, CreateReportRequest, CreateVerificationRequest, ReportListQuery, ReportStatus,
    ResolveReportRequest, ReviewVerificationRequest, VerificationRequest, VerificationStatus,
};
use crate::service::user_service::find_user;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

const MY_VERIFICATIONS_LIMIT: i64 = 20;
const PENDING_VERIFICATIONS_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct ModerationService {
    db_pool: DbPool,
}

impl ModerationService {
    pub fn new(db_pool: DbPool) -> Self {
        Self { db_pool }
    }

    // ========================================================================
    // CONTENT REPORTS
    // ========================================================================

    pub async fn create_report(&self, reporter_id: Uuid, request: CreateReportRequest) -> Result<ContentReport, ApiError> {
        request.validate()?;

        // Table names come from a closed enum, never from input
        let exists: bool = sqlx::query_scalar(&format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
            request.target_type.table()
        ))
        .bind(request.target_id)
        .fetch_one(&self.db_pool)
        .await?;

        if !exists {
            return Err(ApiError::not_found("Reported content not found"));
        }

        let report = sqlx::query_as::<_, ContentReport>(
            r#"
            INSERT INTO content_reports (id, reporter_id, target_type, target_id, reason, details)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(reporter_id)
        .bind(request.target_type.as_str())
        .bind(request.target_id)
        .bind(request.reason.trim())
        .bind(&request.details)
        .fetch_one(&self.db_pool)
        .await
        .map_err(|e| ApiError::from_db_with_conflict(e, "You already have an open report on this content"))?;

        info!(
            report_id = %report.id,
            reporter_id = %reporter_id,
            target_type = request.target_type.as_str(),
            target_id = %request.target_id,
            "Content reported"
        );

        Ok(report)
    }

    pub async fn list_reports(
        &self,
        filter: &ReportListQuery,
        page: &PageQuery,
    ) -> Result<ListResponse<ContentReport>, ApiError> {
        let reports = sqlx::query_as::<_, ContentReport>(
            r#"
            SELECT * FROM content_reports
            WHERE ($1::report_status IS NULL OR status = $1)
            ORDER BY created_at ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(filter.status)
        .bind(page.per_page())
        .bind(page.offset())
        .fetch_all(&self.db_pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM content_reports WHERE ($1::report_status IS NULL OR status = $1)",
        )
        .bind(filter.status)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(ListResponse::new(reports, total, page))
    }

    pub async fn resolve_report(
        &self,
        report_id: Uuid,
        moderator_id: Uuid,
        request: ResolveReportRequest,
    ) -> Result<ContentReport, ApiError> {
        request.validate()?;

        let report = sqlx::query_as::<_, ContentReport>(
            r#"
            UPDATE content_reports SET
                status = $2, resolution_note = $3, resolved_by = $4, resolved_at = NOW()
            WHERE id = $1 AND status = $5
            RETURNING *
            "#,
        )
        .bind(report_id)
        .bind(request.status)
        .bind(&request.resolution_note)
        .bind(moderator_id)
        .bind(ReportStatus::Open)
        .fetch_optional(&self.db_pool)
        .await?;

        match report {
            Some(report) => {
                info!(report_id = %report_id, moderator_id = %moderator_id, status = ?report.status, "Report resolved");
                Ok(report)
            }
            None => {
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM content_reports WHERE id = $1)")
                        .bind(report_id)
                        .fetch_one(&self.db_pool)
                        .await?;
                if exists {
                    Err(ApiError::conflict("Report is no longer open"))
                } else {
                    Err(ApiError::not_found("Report not found"))
                }
            }
        }
    }

    // ========================================================================
    // PLATFORM VERIFICATION
    // ========================================================================

    pub async fn request_verification(
        &self,
        user_id: Uuid,
        request: CreateVerificationRequest,
    ) -> Result<VerificationRequest, ApiError> {
        request.validate()?;

        let user = find_user(&self.db_pool, user_id).await?;
        if user.is_verified {
            return Err(ApiError::conflict("Account is already verified"));
        }

        let pending: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM verification_requests WHERE user_id = $1 AND status = $2)",
        )
        .bind(user_id)
        .bind(VerificationStatus::Pending)
        .fetch_one(&self.db_pool)
        .await?;
        if pending {
            return Err(ApiError::conflict("A verification request is already pending"));
        }

        let verification = sqlx::query_as::<_, VerificationRequest>(
            r#"
            INSERT INTO verification_requests (id, user_id, platform, gamertag, evidence_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(request.platform.as_str())
        .bind(request.gamertag.trim())
        .bind(&request.evidence_url)
        .fetch_one(&self.db_pool)
        .await?;

        info!(request_id = %verification.id, user_id = %user_id, platform = request.platform.as_str(), "Verification requested");

        Ok(verification)
    }

    pub async fn my_verifications(&self, user_id: Uuid) -> Result<Vec<VerificationRequest>, ApiError> {
        let requests = sqlx::query_as::<_, VerificationRequest>(
            "SELECT * FROM verification_requests WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(MY_VERIFICATIONS_LIMIT)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(requests)
    }

    pub async fn pending_verifications(&self) -> Result<Vec<VerificationRequest>, ApiError> {
        let requests = sqlx::query_as::<_, VerificationRequest>(
            "SELECT * FROM verification_requests WHERE status = $1 ORDER BY created_at ASC LIMIT $2",
        )
        .bind(VerificationStatus::Pending)
        .bind(PENDING_VERIFICATIONS_LIMIT)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(requests)
    }

    /// Approve or reject a pending request; approval marks the account verified.
    pub async fn review_verification(
        &self,
        request_id: Uuid,
        admin_id: Uuid,
        request: ReviewVerificationRequest,
    ) -> Result<VerificationRequest, ApiError> {
        request.validate()?;

        let mut tx = self.db_pool.begin().await?;

        let current = sqlx::query_as::<_, VerificationRequest>(
            "SELECT * FROM verification_requests WHERE id = $1 FOR UPDATE",
        )
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Verification request not found"))?;

        if current.status != VerificationStatus::Pending {
            return Err(ApiError::conflict("Verification request was already reviewed"));
        }

        let status = if request.approved {
            VerificationStatus::Approved
        } else {
            VerificationStatus::Rejected
        };

        let reviewed = sqlx::query_as::<_, VerificationRequest>(
            r#"
            UPDATE verification_requests SET
                status = $2, reviewed_by = $3, review_note = $4, reviewed_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(request_id)
        .bind(status)
        .bind(admin_id)
        .bind(&request.note)
        .fetch_one(&mut *tx)
        .await?;

        if request.approved {
            sqlx::query("UPDATE users SET is_verified = TRUE, updated_at = NOW() WHERE id = $1")
                .bind(current.user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        info!(
            request_id = %request_id,
            user_id = %current.user_id,
            admin_id = %admin_id,
            approved = request.approved,
            "Verification reviewed"
        );

        Ok(reviewed)
    }
}
