use crate::api_error::ApiError;
use crate::db::DbPool;
use crate::models::clan::{
    Clan, ClanDetailResponse, ClanListQuery, ClanMember, ClanMemberResponse, ClanRole,
    ClanSummary, CreateClanRequest, UpdateClanRequest,
};
use crate::models::common::{ListResponse, PageQuery};
use crate::models::discord::NotificationType;
use crate::service::discord_service::DiscordNotifier;
use crate::service::user_service::fetch_user_summaries;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

const DEFAULT_MAX_MEMBERS: i32 = 50;

#[derive(Clone)]
pub struct ClanService {
    db_pool: DbPool,
    notifier: DiscordNotifier,
}

impl ClanService {
    pub fn new(db_pool: DbPool, notifier: DiscordNotifier) -> Self {
        Self { db_pool, notifier }
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub async fn list_clans(
        &self,
        filter: &ClanListQuery,
        page: &PageQuery,
    ) -> Result<ListResponse<ClanSummary>, ApiError> {
        let search = filter.search.as_ref().map(|s| format!("%{}%", s.trim()));

        let clans = sqlx::query_as::<_, Clan>(
            r#"
            SELECT * FROM clans
            WHERE ($1::TEXT IS NULL OR name ILIKE $1)
              AND ($2::TEXT IS NULL OR primary_game = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(&search)
        .bind(&filter.game)
        .bind(page.per_page())
        .bind(page.offset())
        .fetch_all(&self.db_pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM clans
            WHERE ($1::TEXT IS NULL OR name ILIKE $1)
              AND ($2::TEXT IS NULL OR primary_game = $2)
            "#,
        )
        .bind(&search)
        .bind(&filter.game)
        .fetch_one(&self.db_pool)
        .await?;

        let ids: Vec<Uuid> = clans.iter().map(|c| c.id).collect();
        let counts = self.member_counts(&ids).await?;

        let items = clans
            .into_iter()
            .map(|clan| ClanSummary {
                member_count: counts.get(&clan.id).copied().unwrap_or(0),
                clan,
            })
            .collect();

        Ok(ListResponse::new(items, total, page))
    }

    async fn member_counts(&self, clan_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>, ApiError> {
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            "SELECT clan_id, COUNT(*) FROM clan_members WHERE clan_id = ANY($1) GROUP BY clan_id",
        )
        .bind(clan_ids)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    pub async fn get_clan(&self, clan_id: Uuid) -> Result<ClanDetailResponse, ApiError> {
        let clan = self.find_clan(clan_id).await?;

        let members = sqlx::query_as::<_, ClanMember>(
            "SELECT * FROM clan_members WHERE clan_id = $1 ORDER BY joined_at ASC",
        )
        .bind(clan_id)
        .fetch_all(&self.db_pool)
        .await?;

        let user_ids: Vec<Uuid> = members.iter().map(|m| m.user_id).collect();
        let users = fetch_user_summaries(&self.db_pool, &user_ids).await?;

        let mut members: Vec<ClanMemberResponse> = members
            .into_iter()
            .filter_map(|m| {
                users.get(&m.user_id).map(|u| ClanMemberResponse {
                    user_id: m.user_id,
                    username: u.username.clone(),
                    display_name: u.display_name.clone(),
                    role: m.role,
                    joined_at: m.joined_at,
                })
            })
            .collect();
        members.sort_by(|a, b| b.role.rank().cmp(&a.role.rank()).then(a.joined_at.cmp(&b.joined_at)));

        Ok(ClanDetailResponse {
            member_count: members.len() as i64,
            clan,
            members,
        })
    }

    async fn find_clan(&self, clan_id: Uuid) -> Result<Clan, ApiError> {
        sqlx::query_as::<_, Clan>("SELECT * FROM clans WHERE id = $1")
            .bind(clan_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Clan not found"))
    }

    /// Role of `user_id` in the clan, if a member.
    pub async fn member_role(&self, clan_id: Uuid, user_id: Uuid) -> Result<Option<ClanRole>, ApiError> {
        let role: Option<ClanRole> = sqlx::query_scalar(
            "SELECT role FROM clan_members WHERE clan_id = $1 AND user_id = $2",
        )
        .bind(clan_id)
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await?;
        Ok(role)
    }

    async fn require_role(&self, clan_id: Uuid, user_id: Uuid) -> Result<ClanRole, ApiError> {
        self.member_role(clan_id, user_id)
            .await?
            .ok_or_else(|| ApiError::forbidden("You are not a member of this clan"))
    }

    // ========================================================================
    // CLAN LIFECYCLE
    // ========================================================================

    /// Create a clan with the creator as leader, in one transaction.
    pub async fn create_clan(&self, user_id: Uuid, request: CreateClanRequest) -> Result<Clan, ApiError> {
        let request = request.trimmed();
        request.validate()?;

        let mut tx = self.db_pool.begin().await?;

        let clan = sqlx::query_as::<_, Clan>(
            r#"
            INSERT INTO clans (id, name, tag, description, primary_game, is_public, max_members, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(request.tag.to_uppercase())
        .bind(&request.description)
        .bind(&request.primary_game)
        .bind(request.is_public)
        .bind(request.max_members.unwrap_or(DEFAULT_MAX_MEMBERS))
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| ApiError::from_db_with_conflict(e, "Clan name or tag is already taken"))?;

        sqlx::query("INSERT INTO clan_members (clan_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(clan.id)
            .bind(user_id)
            .bind(ClanRole::Leader)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(clan_id = %clan.id, tag = %clan.tag, leader_id = %user_id, "Clan created");

        Ok(clan)
    }

    pub async fn update_clan(
        &self,
        clan_id: Uuid,
        user_id: Uuid,
        request: UpdateClanRequest,
    ) -> Result<Clan, ApiError> {
        let request = request.trimmed();
        request.validate()?;
        self.find_clan(clan_id).await?;

        let role = self.require_role(clan_id, user_id).await?;
        if !role.can_manage_settings() {
            return Err(ApiError::forbidden("Only the leader or co-leaders can update clan settings"));
        }

        if let Some(max_members) = request.max_members {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clan_members WHERE clan_id = $1")
                .bind(clan_id)
                .fetch_one(&self.db_pool)
                .await?;
            if i64::from(max_members) < count {
                return Err(ApiError::bad_request("max_members cannot be below the current member count"));
            }
        }

        let clan = sqlx::query_as::<_, Clan>(
            r#"
            UPDATE clans SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                primary_game = COALESCE($4, primary_game),
                is_public = COALESCE($5, is_public),
                max_members = COALESCE($6, max_members),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(clan_id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(&request.primary_game)
        .bind(request.is_public)
        .bind(request.max_members)
        .fetch_one(&self.db_pool)
        .await
        .map_err(|e| ApiError::from_db_with_conflict(e, "Clan name is already taken"))?;

        info!(clan_id = %clan_id, user_id = %user_id, "Clan updated");

        Ok(clan)
    }

    pub async fn delete_clan(&self, clan_id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
        self.find_clan(clan_id).await?;
        let role = self.require_role(clan_id, user_id).await?;
        if role != ClanRole::Leader {
            return Err(ApiError::forbidden("Only the leader can delete the clan"));
        }

        sqlx::query("DELETE FROM clans WHERE id = $1")
            .bind(clan_id)
            .execute(&self.db_pool)
            .await?;

        info!(clan_id = %clan_id, user_id = %user_id, "Clan deleted");
        Ok(())
    }

    // ========================================================================
    // MEMBERSHIP
    // ========================================================================

    pub async fn join_clan(&self, clan_id: Uuid, user_id: Uuid) -> Result<ClanMember, ApiError> {
        let mut tx = self.db_pool.begin().await?;

        // Row lock serializes concurrent joins against the capacity check
        let clan = sqlx::query_as::<_, Clan>("SELECT * FROM clans WHERE id = $1 FOR UPDATE")
            .bind(clan_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ApiError::not_found("Clan not found"))?;

        if !clan.is_public {
            return Err(ApiError::forbidden("This clan is invite-only"));
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clan_members WHERE clan_id = $1")
            .bind(clan_id)
            .fetch_one(&mut *tx)
            .await?;
        if count >= i64::from(clan.max_members) {
            return Err(ApiError::conflict("Clan is full"));
        }

        let member = sqlx::query_as::<_, ClanMember>(
            "INSERT INTO clan_members (clan_id, user_id, role) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(clan_id)
        .bind(user_id)
        .bind(ClanRole::Member)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| ApiError::from_db_with_conflict(e, "Already a member of this clan"))?;

        tx.commit().await?;

        info!(clan_id = %clan_id, user_id = %user_id, "Joined clan");
        self.notify_officers(clan_id, user_id, format!("A new member joined [{}] {}", clan.tag, clan.name))
            .await;

        Ok(member)
    }

    /// Leave a clan. A sole leader leaving dissolves the clan.
    pub async fn leave_clan(&self, clan_id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
        self.find_clan(clan_id).await?;
        let role = self
            .member_role(clan_id, user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("You are not a member of this clan"))?;

        if role == ClanRole::Leader {
            let others: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM clan_members WHERE clan_id = $1 AND user_id <> $2",
            )
            .bind(clan_id)
            .bind(user_id)
            .fetch_one(&self.db_pool)
            .await?;

            if others > 0 {
                return Err(ApiError::bad_request(
                    "Transfer leadership before leaving the clan",
                ));
            }

            sqlx::query("DELETE FROM clans WHERE id = $1")
                .bind(clan_id)
                .execute(&self.db_pool)
                .await?;
            info!(clan_id = %clan_id, user_id = %user_id, "Last member left, clan dissolved");
            return Ok(());
        }

        sqlx::query("DELETE FROM clan_members WHERE clan_id = $1 AND user_id = $2")
            .bind(clan_id)
            .bind(user_id)
            .execute(&self.db_pool)
            .await?;

        info!(clan_id = %clan_id, user_id = %user_id, "Left clan");
        Ok(())
    }

    /// Change a member's role. Promoting to leader hands over leadership.
    pub async fn change_member_role(
        &self,
        clan_id: Uuid,
        actor_id: Uuid,
        target_id: Uuid,
        new_role: ClanRole,
    ) -> Result<ClanMember, ApiError> {
        if actor_id == target_id {
            return Err(ApiError::bad_request("You cannot change your own role"));
        }

        self.find_clan(clan_id).await?;
        let actor_role = self.require_role(clan_id, actor_id).await?;
        if actor_role != ClanRole::Leader {
            return Err(ApiError::forbidden("Only the leader can change member roles"));
        }
        self.member_role(clan_id, target_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Member not found"))?;

        let mut tx = self.db_pool.begin().await?;

        if new_role == ClanRole::Leader {
            sqlx::query("UPDATE clan_members SET role = $3 WHERE clan_id = $1 AND user_id = $2")
                .bind(clan_id)
                .bind(actor_id)
                .bind(ClanRole::CoLeader)
                .execute(&mut *tx)
                .await?;
        }

        let member = sqlx::query_as::<_, ClanMember>(
            "UPDATE clan_members SET role = $3 WHERE clan_id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(clan_id)
        .bind(target_id)
        .bind(new_role)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            clan_id = %clan_id,
            actor_id = %actor_id,
            target_id = %target_id,
            role = %new_role,
            "Clan member role changed"
        );

        Ok(member)
    }

    /// Remove a member the actor strictly outranks.
    pub async fn kick_member(&self, clan_id: Uuid, actor_id: Uuid, target_id: Uuid) -> Result<(), ApiError> {
        self.find_clan(clan_id).await?;
        let actor_role = self.require_role(clan_id, actor_id).await?;
        let target_role = self
            .member_role(clan_id, target_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Member not found"))?;

        if !actor_role.can_kick(&target_role) {
            return Err(ApiError::forbidden("You cannot remove this member"));
        }

        sqlx::query("DELETE FROM clan_members WHERE clan_id = $1 AND user_id = $2")
            .bind(clan_id)
            .bind(target_id)
            .execute(&self.db_pool)
            .await?;

        info!(clan_id = %clan_id, actor_id = %actor_id, target_id = %target_id, "Member kicked");
        Ok(())
    }

    async fn notify_officers(&self, clan_id: Uuid, except: Uuid, content: String) {
        let officers: Result<Vec<Uuid>, sqlx::Error> = sqlx::query_scalar(
            r#"
            SELECT user_id FROM clan_members
            WHERE clan_id = $1 AND user_id <> $2 AND role IN ('leader', 'co_leader', 'officer')
            "#,
        )
        .bind(clan_id)
        .bind(except)
        .fetch_all(&self.db_pool)
        .await;

        match officers {
            Ok(ids) => self.notifier.notify(ids, NotificationType::ClanActivity, content),
            Err(e) => tracing::warn!(clan_id = %clan_id, error = %e, "Could not load clan officers"),
        }
    }
}
