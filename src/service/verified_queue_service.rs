use crate::api_error::ApiError;
use crate::db::DbPool;
use crate::middleware::RateLimiter;
use crate::models::verified_queue::{
    calculate_new_score, is_eligible, EndorsePlayerRequest, InteractionKind,
    InteractionResponse, JoinQueueRequest, QueueEntry, QueueListing, QueueStatusResponse,
    ReportPlayerRequest, VERIFIED_QUEUE_MIN_SCORE,
};
use crate::service::user_service::find_user;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

const REPORTS_PER_HOUR: u32 = 20;
const QUEUE_LIST_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct VerifiedQueueService {
    db_pool: DbPool,
    rate_limiter: RateLimiter,
}

impl VerifiedQueueService {
    pub fn new(db_pool: DbPool, rate_limiter: RateLimiter) -> Self {
        Self {
            db_pool,
            rate_limiter,
        }
    }

    // ========================================================================
    // QUEUE
    // ========================================================================

    /// Enter the verified queue; requires a behavior score at or above the threshold.
    pub async fn join(&self, user_id: Uuid, request: JoinQueueRequest) -> Result<QueueEntry, ApiError> {
        request.validate()?;

        let user = find_user(&self.db_pool, user_id).await?;
        if !is_eligible(user.behavior_score) {
            return Err(ApiError::forbidden(format!(
                "Behavior score {:.1} is below the required {:.0}",
                user.behavior_score, VERIFIED_QUEUE_MIN_SCORE
            )));
        }

        let entry = sqlx::query_as::<_, QueueEntry>(
            r#"
            INSERT INTO verified_queue_entries (user_id, game, region, play_style)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&request.game)
        .bind(&request.region)
        .bind(&request.play_style)
        .fetch_one(&self.db_pool)
        .await
        .map_err(|e| ApiError::from_db_with_conflict(e, "Already in the verified queue"))?;

        info!(user_id = %user_id, game = %entry.game, "Joined verified queue");

        Ok(entry)
    }

    pub async fn leave(&self, user_id: Uuid) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM verified_queue_entries WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db_pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::not_found("Not in the verified queue"));
        }

        info!(user_id = %user_id, "Left verified queue");
        Ok(())
    }

    pub async fn status(&self, user_id: Uuid) -> Result<QueueStatusResponse, ApiError> {
        let user = find_user(&self.db_pool, user_id).await?;
        let entry = sqlx::query_as::<_, QueueEntry>(
            "SELECT * FROM verified_queue_entries WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(QueueStatusResponse {
            behavior_score: user.behavior_score,
            threshold: VERIFIED_QUEUE_MIN_SCORE,
            eligible: is_eligible(user.behavior_score),
            total_interactions: user.total_interactions,
            entry,
        })
    }

    /// Queued players for a game, best behavior first.
    pub async fn list(&self, game: &str) -> Result<Vec<QueueListing>, ApiError> {
        let entries = sqlx::query_as::<_, QueueListing>(
            r#"
            SELECT q.user_id, u.username, u.behavior_score, q.game, q.region, q.play_style, q.joined_at
            FROM verified_queue_entries q
            JOIN users u ON u.id = q.user_id
            WHERE q.game = $1 AND u.behavior_score >= $2
            ORDER BY u.behavior_score DESC, q.joined_at ASC
            LIMIT $3
            "#,
        )
        .bind(game)
        .bind(VERIFIED_QUEUE_MIN_SCORE)
        .bind(QUEUE_LIST_LIMIT)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(entries)
    }

    // ========================================================================
    // INTERACTIONS
    // ========================================================================

    pub async fn report(&self, reporter_id: Uuid, request: ReportPlayerRequest) -> Result<InteractionResponse, ApiError> {
        request.validate()?;

        if reporter_id == request.reported_user_id {
            return Err(ApiError::bad_request("You cannot report yourself"));
        }

        self.rate_limiter
            .check(&format!("player_reports:{}", reporter_id), REPORTS_PER_HOUR, 3600)
            .await?;

        let response = self
            .apply_interaction(
                reporter_id,
                request.reported_user_id,
                InteractionKind::Report,
                request.reason.as_str(),
                request.reason.points(),
                request.details.as_deref(),
            )
            .await?;

        info!(
            reporter_id = %reporter_id,
            reported_user_id = %request.reported_user_id,
            reason = request.reason.as_str(),
            new_score = response.new_score,
            "Player reported"
        );

        Ok(response)
    }

    pub async fn endorse(&self, endorser_id: Uuid, request: EndorsePlayerRequest) -> Result<InteractionResponse, ApiError> {
        if endorser_id == request.endorsed_user_id {
            return Err(ApiError::bad_request("You cannot endorse yourself"));
        }

        let response = self
            .apply_interaction(
                endorser_id,
                request.endorsed_user_id,
                InteractionKind::Endorsement,
                request.category.as_str(),
                request.category.points(),
                None,
            )
            .await?;

        info!(
            endorser_id = %endorser_id,
            endorsed_user_id = %request.endorsed_user_id,
            category = request.category.as_str(),
            new_score = response.new_score,
            "Player endorsed"
        );

        Ok(response)
    }

    /// Record an interaction and update the subject's score in one transaction.
    async fn apply_interaction(
        &self,
        actor_id: Uuid,
        subject_id: Uuid,
        kind: InteractionKind,
        category: &str,
        points: f64,
        details: Option<&str>,
    ) -> Result<InteractionResponse, ApiError> {
        let mut tx = self.db_pool.begin().await?;

        // Lock the subject row so concurrent interactions apply sequentially
        let subject: Option<(f64, i32)> = sqlx::query_as(
            "SELECT behavior_score, total_interactions FROM users WHERE id = $1 AND is_active FOR UPDATE",
        )
        .bind(subject_id)
        .fetch_optional(&mut *tx)
        .await?;
        let (current, total) = subject.ok_or_else(|| ApiError::not_found("Player not found"))?;

        let recent: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM behavior_interactions
                WHERE actor_id = $1 AND subject_id = $2 AND kind = $3
                  AND created_at > NOW() - INTERVAL '24 hours'
            )
            "#,
        )
        .bind(actor_id)
        .bind(subject_id)
        .bind(kind.as_str())
        .fetch_one(&mut *tx)
        .await?;

        if recent {
            return Err(ApiError::conflict(format!(
                "You already submitted a {} for this player in the last 24 hours",
                kind.as_str()
            )));
        }

        let new_score = calculate_new_score(current, points, i64::from(total));

        sqlx::query(
            r#"
            INSERT INTO behavior_interactions
                (id, actor_id, subject_id, kind, category, points, score_before, score_after, details)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(actor_id)
        .bind(subject_id)
        .bind(kind.as_str())
        .bind(category)
        .bind(points)
        .bind(current)
        .bind(new_score)
        .bind(details)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE users SET behavior_score = $2, total_interactions = total_interactions + 1, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(subject_id)
        .bind(new_score)
        .execute(&mut *tx)
        .await?;

        // Players who drop below the threshold leave the queue
        if !is_eligible(new_score) {
            sqlx::query("DELETE FROM verified_queue_entries WHERE user_id = $1")
                .bind(subject_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(InteractionResponse {
            subject_id,
            points,
            new_score,
        })
    }
}
