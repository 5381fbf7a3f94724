use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RewardTrack {
    Free,
    Premium,
}

impl RewardTrack {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardTrack::Free => "free",
            RewardTrack::Premium => "premium",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Season {
    pub id: Uuid,
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub premium_price_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tier {
    pub season_id: Uuid,
    pub tier: i32,
    pub xp_required: i32,
    pub free_reward: Option<String>,
    pub premium_reward: Option<String>,
}

impl Tier {
    pub fn reward(&self, track: RewardTrack) -> Option<&str> {
        match track {
            RewardTrack::Free => self.free_reward.as_deref(),
            RewardTrack::Premium => self.premium_reward.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Progress {
    pub season_id: Uuid,
    pub user_id: Uuid,
    pub xp: i32,
    pub is_premium: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Claim {
    pub tier: i32,
    pub track: String,
    pub claimed_at: DateTime<Utc>,
}

/// Highest tier whose XP requirement is met, or 0.
pub fn current_tier(tiers: &[Tier], xp: i32) -> i32 {
    tiers
        .iter()
        .filter(|t| t.xp_required <= xp)
        .map(|t| t.tier)
        .max()
        .unwrap_or(0)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressView {
    pub xp: i32,
    pub is_premium: bool,
    pub current_tier: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CurrentSeasonResponse {
    pub season: Season,
    pub tiers: Vec<Tier>,
    pub progress: Option<ProgressView>,
    pub claims: Vec<Claim>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AwardXpRequest {
    pub user_id: Uuid,
    #[validate(range(min = 1, max = 10000))]
    pub amount: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ClaimRewardRequest {
    #[validate(range(min = 1))]
    pub tier: i32,
    pub track: RewardTrack,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClaimResponse {
    pub tier: i32,
    pub track: RewardTrack,
    pub reward: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub checkout_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(tier: i32, xp_required: i32) -> Tier {
        Tier {
            season_id: Uuid::nil(),
            tier,
            xp_required,
            free_reward: Some(format!("spray-{}", tier)),
            premium_reward: if tier % 2 == 0 { Some(format!("skin-{}", tier)) } else { None },
        }
    }

    #[test]
    fn test_current_tier() {
        let tiers = vec![tier(1, 0), tier(2, 1000), tier(3, 2500)];
        assert_eq!(current_tier(&tiers, 0), 1);
        assert_eq!(current_tier(&tiers, 999), 1);
        assert_eq!(current_tier(&tiers, 1000), 2);
        assert_eq!(current_tier(&tiers, 99_999), 3);
    }

    #[test]
    fn test_current_tier_without_free_tier() {
        let tiers = vec![tier(1, 100)];
        assert_eq!(current_tier(&tiers, 50), 0);
    }

    #[test]
    fn test_reward_by_track() {
        let t = tier(2, 1000);
        assert_eq!(t.reward(RewardTrack::Free), Some("spray-2"));
        assert_eq!(t.reward(RewardTrack::Premium), Some("skin-2"));
        assert_eq!(tier(3, 0).reward(RewardTrack::Premium), None);
    }

    #[test]
    fn test_claim_request_parsing() {
        let req: ClaimRewardRequest = serde_json::from_str(r#"{"tier":3,"track":"premium"}"#).unwrap();
        assert_eq!(req.track, RewardTrack::Premium);
        assert!(req.validate().is_ok());
    }
}
