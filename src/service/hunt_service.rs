use crate::api_error::ApiError;
use crate::db::DbPool;
use crate::models::common::{ListResponse, PageQuery};
use crate::models::discord::NotificationType;
use crate::models::hunt::{
    next_leader, start_blocker, CreateHuntRequest, Hunt, HuntDetailResponse, HuntListQuery,
    HuntMember, HuntMemberResponse, HuntRole, HuntStatus, HuntSummary, SetReadyRequest,
};
use crate::service::discord_service::DiscordNotifier;
use crate::service::user_service::fetch_user_summaries;
use sqlx::{Postgres, Transaction};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct HuntService {
    db_pool: DbPool,
    notifier: DiscordNotifier,
}

impl HuntService {
    pub fn new(db_pool: DbPool, notifier: DiscordNotifier) -> Self {
        Self { db_pool, notifier }
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub async fn list_hunts(
        &self,
        filter: &HuntListQuery,
        page: &PageQuery,
    ) -> Result<ListResponse<HuntSummary>, ApiError> {
        let hunts = sqlx::query_as::<_, Hunt>(
            r#"
            SELECT * FROM hunts
            WHERE ($1::TEXT IS NULL OR game = $1)
              AND ($2::hunt_status IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(&filter.game)
        .bind(filter.status)
        .bind(page.per_page())
        .bind(page.offset())
        .fetch_all(&self.db_pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM hunts
            WHERE ($1::TEXT IS NULL OR game = $1)
              AND ($2::hunt_status IS NULL OR status = $2)
            "#,
        )
        .bind(&filter.game)
        .bind(filter.status)
        .fetch_one(&self.db_pool)
        .await?;

        let ids: Vec<Uuid> = hunts.iter().map(|h| h.id).collect();
        let counts: HashMap<Uuid, i64> = sqlx::query_as::<_, (Uuid, i64)>(
            "SELECT hunt_id, COUNT(*) FROM hunt_members WHERE hunt_id = ANY($1) GROUP BY hunt_id",
        )
        .bind(&ids)
        .fetch_all(&self.db_pool)
        .await?
        .into_iter()
        .collect();

        let items = hunts
            .into_iter()
            .map(|hunt| HuntSummary {
                member_count: counts.get(&hunt.id).copied().unwrap_or(0),
                hunt,
            })
            .collect();

        Ok(ListResponse::new(items, total, page))
    }

    pub async fn get_hunt(&self, hunt_id: Uuid) -> Result<HuntDetailResponse, ApiError> {
        let hunt = self.find_hunt(hunt_id).await?;
        let members = self.members(hunt_id).await?;

        let user_ids: Vec<Uuid> = members.iter().map(|m| m.user_id).collect();
        let users = fetch_user_summaries(&self.db_pool, &user_ids).await?;

        let members = members
            .into_iter()
            .map(|m| HuntMemberResponse {
                username: users
                    .get(&m.user_id)
                    .map(|u| u.username.clone())
                    .unwrap_or_default(),
                user_id: m.user_id,
                role: m.role,
                is_ready: m.is_ready,
                joined_at: m.joined_at,
            })
            .collect();

        Ok(HuntDetailResponse { hunt, members })
    }

    async fn find_hunt(&self, hunt_id: Uuid) -> Result<Hunt, ApiError> {
        sqlx::query_as::<_, Hunt>("SELECT * FROM hunts WHERE id = $1")
            .bind(hunt_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Hunt not found"))
    }

    async fn members(&self, hunt_id: Uuid) -> Result<Vec<HuntMember>, ApiError> {
        let members = sqlx::query_as::<_, HuntMember>(
            "SELECT * FROM hunt_members WHERE hunt_id = $1 ORDER BY joined_at ASC",
        )
        .bind(hunt_id)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(members)
    }

    async fn require_leader(&self, hunt_id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
        let role: Option<HuntRole> = sqlx::query_scalar(
            "SELECT role FROM hunt_members WHERE hunt_id = $1 AND user_id = $2",
        )
        .bind(hunt_id)
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await?;

        if role != Some(HuntRole::Leader) {
            return Err(ApiError::forbidden("Only the hunt leader can do this"));
        }
        Ok(())
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    pub async fn create_hunt(&self, user_id: Uuid, request: CreateHuntRequest) -> Result<Hunt, ApiError> {
        let request = request.trimmed();
        request.validate()?;

        let mut tx = self.db_pool.begin().await?;

        let hunt = sqlx::query_as::<_, Hunt>(
            r#"
            INSERT INTO hunts (id, game, achievement_name, description, scheduled_at, max_members, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.game)
        .bind(&request.achievement_name)
        .bind(&request.description)
        .bind(request.scheduled_at)
        .bind(request.max_members)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO hunt_members (hunt_id, user_id, role, is_ready) VALUES ($1, $2, $3, FALSE)",
        )
        .bind(hunt.id)
        .bind(user_id)
        .bind(HuntRole::Leader)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(hunt_id = %hunt.id, user_id = %user_id, game = %hunt.game, "Hunt created");

        Ok(hunt)
    }

    pub async fn join_hunt(&self, hunt_id: Uuid, user_id: Uuid) -> Result<HuntMember, ApiError> {
        let mut tx = self.db_pool.begin().await?;
        let hunt = lock_hunt(&mut tx, hunt_id).await?;

        if hunt.status != HuntStatus::Recruiting {
            return Err(ApiError::bad_request("Hunt is not recruiting"));
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM hunt_members WHERE hunt_id = $1")
            .bind(hunt_id)
            .fetch_one(&mut *tx)
            .await?;
        if count >= i64::from(hunt.max_members) {
            return Err(ApiError::conflict("Hunt is full"));
        }

        let member = sqlx::query_as::<_, HuntMember>(
            r#"
            INSERT INTO hunt_members (hunt_id, user_id, role, is_ready)
            VALUES ($1, $2, $3, FALSE)
            RETURNING *
            "#,
        )
        .bind(hunt_id)
        .bind(user_id)
        .bind(HuntRole::Member)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| ApiError::from_db_with_conflict(e, "Already a member of this hunt"))?;

        tx.commit().await?;

        info!(hunt_id = %hunt_id, user_id = %user_id, "Joined hunt");
        Ok(member)
    }

    /// Leaders hand over to the earliest remaining member; the last member out cancels the hunt.
    pub async fn leave_hunt(&self, hunt_id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
        let mut tx = self.db_pool.begin().await?;
        let hunt = lock_hunt(&mut tx, hunt_id).await?;
        if !hunt.status.is_active() {
            return Err(ApiError::conflict("Hunt has already ended"));
        }

        let members = sqlx::query_as::<_, HuntMember>("SELECT * FROM hunt_members WHERE hunt_id = $1")
            .bind(hunt_id)
            .fetch_all(&mut *tx)
            .await?;

        let leaving = members
            .iter()
            .find(|m| m.user_id == user_id)
            .ok_or_else(|| ApiError::not_found("You are not a member of this hunt"))?;

        sqlx::query("DELETE FROM hunt_members WHERE hunt_id = $1 AND user_id = $2")
            .bind(hunt_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        match next_leader(&members, user_id) {
            None => {
                sqlx::query("UPDATE hunts SET status = $2 WHERE id = $1")
                    .bind(hunt_id)
                    .bind(HuntStatus::Cancelled)
                    .execute(&mut *tx)
                    .await?;
                info!(hunt_id = %hunt_id, "Last member left, hunt cancelled");
            }
            Some(successor) if leaving.role == HuntRole::Leader => {
                sqlx::query("UPDATE hunt_members SET role = $3 WHERE hunt_id = $1 AND user_id = $2")
                    .bind(hunt_id)
                    .bind(successor)
                    .bind(HuntRole::Leader)
                    .execute(&mut *tx)
                    .await?;
                info!(hunt_id = %hunt_id, new_leader = %successor, "Hunt leadership transferred");
            }
            Some(_) => {}
        }

        tx.commit().await?;

        info!(hunt_id = %hunt_id, user_id = %user_id, "Left hunt");
        Ok(())
    }

    pub async fn set_ready(&self, hunt_id: Uuid, user_id: Uuid, request: SetReadyRequest) -> Result<HuntMember, ApiError> {
        let mut tx = self.db_pool.begin().await?;
        let hunt = lock_hunt(&mut tx, hunt_id).await?;
        if !hunt.status.accepts_ready_changes() {
            return Err(ApiError::conflict("Readiness can only change while the hunt is recruiting"));
        }

        let member = sqlx::query_as::<_, HuntMember>(
            r#"
            UPDATE hunt_members SET is_ready = $3
            WHERE hunt_id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(hunt_id)
        .bind(user_id)
        .bind(request.ready)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::forbidden("Only hunt members can change readiness"))?;

        tx.commit().await?;

        info!(hunt_id = %hunt_id, user_id = %user_id, ready = request.ready, "Hunt readiness changed");
        Ok(member)
    }

    pub async fn start_hunt(&self, hunt_id: Uuid, user_id: Uuid) -> Result<Hunt, ApiError> {
        self.require_leader(hunt_id, user_id).await?;

        let hunt = self.find_hunt(hunt_id).await?;
        if hunt.status != HuntStatus::Recruiting {
            return Err(ApiError::bad_request("Hunt is not recruiting"));
        }

        let members = self.members(hunt_id).await?;
        if let Some(reason) = start_blocker(&members) {
            return Err(ApiError::bad_request(reason));
        }

        let hunt = sqlx::query_as::<_, Hunt>(
            "UPDATE hunts SET status = $2, started_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(hunt_id)
        .bind(HuntStatus::InProgress)
        .fetch_one(&self.db_pool)
        .await?;

        info!(hunt_id = %hunt_id, members = members.len(), "Hunt started");

        self.notifier.notify(
            members.iter().map(|m| m.user_id).collect(),
            NotificationType::HuntReminder,
            format!("Your hunt for \"{}\" in {} is starting now.", hunt.achievement_name, hunt.game),
        );

        Ok(hunt)
    }

    pub async fn complete_hunt(&self, hunt_id: Uuid, user_id: Uuid) -> Result<Hunt, ApiError> {
        self.require_leader(hunt_id, user_id).await?;

        let hunt = sqlx::query_as::<_, Hunt>(
            r#"
            UPDATE hunts SET status = $2, completed_at = NOW()
            WHERE id = $1 AND status = $3
            RETURNING *
            "#,
        )
        .bind(hunt_id)
        .bind(HuntStatus::Completed)
        .bind(HuntStatus::InProgress)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ApiError::bad_request("Only hunts in progress can be completed"))?;

        info!(hunt_id = %hunt_id, "Hunt completed");
        Ok(hunt)
    }

    pub async fn cancel_hunt(&self, hunt_id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
        self.require_leader(hunt_id, user_id).await?;

        let hunt = self.find_hunt(hunt_id).await?;
        if hunt.status == HuntStatus::Completed {
            return Err(ApiError::conflict("Completed hunts cannot be cancelled"));
        }

        sqlx::query("UPDATE hunts SET status = $2 WHERE id = $1")
            .bind(hunt_id)
            .bind(HuntStatus::Cancelled)
            .execute(&self.db_pool)
            .await?;

        info!(hunt_id = %hunt_id, user_id = %user_id, "Hunt cancelled");
        Ok(())
    }
}

async fn lock_hunt(tx: &mut Transaction<'_, Postgres>, hunt_id: Uuid) -> Result<Hunt, ApiError> {
    sqlx::query_as::<_, Hunt>("SELECT * FROM hunts WHERE id = $1 FOR UPDATE")
        .bind(hunt_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Hunt not found"))
}
