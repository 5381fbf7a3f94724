use crate::api_error::ApiError;
use crate::db::DbPool;
use crate::models::battle_pass::{
    current_tier, AwardXpRequest, CheckoutResponse, Claim, ClaimResponse, ClaimRewardRequest,
    CurrentSeasonResponse, Progress, ProgressView, RewardTrack, Season, Tier,
};
use crate::service::billing_service::{BillingService, CheckoutItem, CheckoutKind};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct BattlePassService {
    db_pool: DbPool,
    billing: BillingService,
}

impl BattlePassService {
    pub fn new(db_pool: DbPool, billing: BillingService) -> Self {
        Self { db_pool, billing }
    }

    /// The season running right now; 404 between seasons.
    async fn active_season(&self) -> Result<Season, ApiError> {
        sqlx::query_as::<_, Season>(
            r#"
            SELECT * FROM battle_pass_seasons
            WHERE starts_at <= NOW() AND ends_at > NOW()
            ORDER BY starts_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ApiError::not_found("No active battle pass season"))
    }

    async fn tiers(&self, season_id: Uuid) -> Result<Vec<Tier>, ApiError> {
        let tiers = sqlx::query_as::<_, Tier>(
            "SELECT * FROM battle_pass_tiers WHERE season_id = $1 ORDER BY tier ASC",
        )
        .bind(season_id)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(tiers)
    }

    async fn progress(&self, season_id: Uuid, user_id: Uuid) -> Result<Option<Progress>, ApiError> {
        let progress = sqlx::query_as::<_, Progress>(
            "SELECT * FROM battle_pass_progress WHERE season_id = $1 AND user_id = $2",
        )
        .bind(season_id)
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await?;
        Ok(progress)
    }

    pub async fn current(&self, user_id: Uuid) -> Result<CurrentSeasonResponse, ApiError> {
        let season = self.active_season().await?;
        let tiers = self.tiers(season.id).await?;
        let progress = self.progress(season.id, user_id).await?;

        let claims = sqlx::query_as::<_, Claim>(
            r#"
            SELECT tier, track, claimed_at FROM battle_pass_claims
            WHERE season_id = $1 AND user_id = $2
            ORDER BY tier ASC, track ASC
            "#,
        )
        .bind(season.id)
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;

        let progress = progress.map(|p| ProgressView {
            current_tier: current_tier(&tiers, p.xp),
            xp: p.xp,
            is_premium: p.is_premium,
        });

        Ok(CurrentSeasonResponse {
            season,
            tiers,
            progress,
            claims,
        })
    }

    pub async fn award_xp(&self, admin_id: Uuid, request: AwardXpRequest) -> Result<ProgressView, ApiError> {
        request.validate()?;

        let season = self.active_season().await?;
        let progress = sqlx::query_as::<_, Progress>(
            r#"
            INSERT INTO battle_pass_progress (season_id, user_id, xp)
            VALUES ($1, $2, $3)
            ON CONFLICT (season_id, user_id) DO UPDATE SET
                xp = battle_pass_progress.xp + EXCLUDED.xp,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(season.id)
        .bind(request.user_id)
        .bind(request.amount)
        .fetch_one(&self.db_pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.code().as_deref() == Some("23503") => {
                ApiError::not_found("User not found")
            }
            other => ApiError::from(other),
        })?;

        let tiers = self.tiers(season.id).await?;

        info!(
            season_id = %season.id,
            user_id = %request.user_id,
            amount = request.amount,
            xp = progress.xp,
            awarded_by = %admin_id,
            "Battle pass XP awarded"
        );

        Ok(ProgressView {
            current_tier: current_tier(&tiers, progress.xp),
            xp: progress.xp,
            is_premium: progress.is_premium,
        })
    }

    pub async fn claim(&self, user_id: Uuid, request: ClaimRewardRequest) -> Result<ClaimResponse, ApiError> {
        request.validate()?;

        let season = self.active_season().await?;
        let tiers = self.tiers(season.id).await?;
        let progress = self.progress(season.id, user_id).await?;

        let tier = tiers
            .iter()
            .find(|t| t.tier == request.tier)
            .ok_or_else(|| ApiError::not_found("Tier not found"))?;

        let xp = progress.as_ref().map(|p| p.xp).unwrap_or(0);
        if xp < tier.xp_required {
            return Err(ApiError::bad_request(format!(
                "Tier {} requires {} XP, you have {}",
                tier.tier, tier.xp_required, xp
            )));
        }

        let reward = tier
            .reward(request.track)
            .ok_or_else(|| ApiError::not_found("This tier has no reward on that track"))?
            .to_string();

        if request.track == RewardTrack::Premium && !progress.as_ref().is_some_and(|p| p.is_premium) {
            return Err(ApiError::forbidden("Premium rewards require the premium pass"));
        }

        sqlx::query(
            r#"
            INSERT INTO battle_pass_claims (season_id, user_id, tier, track)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(season.id)
        .bind(user_id)
        .bind(tier.tier)
        .bind(request.track.as_str())
        .execute(&self.db_pool)
        .await
        .map_err(|e| ApiError::from_db_with_conflict(e, "Reward already claimed"))?;

        info!(
            season_id = %season.id,
            user_id = %user_id,
            tier = tier.tier,
            track = request.track.as_str(),
            "Battle pass reward claimed"
        );

        Ok(ClaimResponse {
            tier: tier.tier,
            track: request.track,
            reward,
        })
    }

    /// Start a Stripe checkout for the active season's premium pass.
    pub async fn premium_checkout(&self, user_id: Uuid) -> Result<CheckoutResponse, ApiError> {
        if !self.billing.is_enabled() {
            return Err(ApiError::ServiceUnavailable("Billing is not configured".to_string()));
        }

        let season = self.active_season().await?;
        let progress = self.progress(season.id, user_id).await?;
        if progress.is_some_and(|p| p.is_premium) {
            return Err(ApiError::conflict("You already own the premium pass"));
        }

        let item = CheckoutItem {
            kind: CheckoutKind::BattlePassPremium,
            ref_id: season.id,
            user_id,
            amount_cents: season.premium_price_cents,
            product_name: format!("{} premium pass", season.name),
            return_path: "/battle-pass".to_string(),
        };
        let session = self.billing.create_checkout(&item).await?;

        info!(season_id = %season.id, user_id = %user_id, session_id = %session.id, "Premium checkout started");

        Ok(CheckoutResponse {
            checkout_url: session.url,
        })
    }
}
