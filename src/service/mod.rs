// Service layer
pub mod accessibility_service;
pub mod auth_service;
pub mod battle_pass_service;
pub mod billing_service;
pub mod blog_service;
pub mod bracket;
pub mod clan_service;
pub mod coaching_service;
pub mod discord_service;
pub mod forum_service;
pub mod hunt_service;
pub mod live_hub;
pub mod matchmaking_service;
pub mod message_service;
pub mod moderation_service;
pub mod tournament_service;
pub mod user_service;
pub mod verified_queue_service;

#[cfg(test)]
mod bracket_test;

pub use accessibility_service::AccessibilityService;
pub use auth_service::AuthService;
pub use battle_pass_service::BattlePassService;
pub use billing_service::BillingService;
pub use blog_service::BlogService;
pub use clan_service::ClanService;
pub use coaching_service::CoachingService;
pub use discord_service::{DiscordNotifier, DiscordService};
pub use forum_service::ForumService;
pub use hunt_service::HuntService;
pub use live_hub::LiveHub;
pub use matchmaking_service::MatchmakingService;
pub use message_service::MessageService;
pub use moderation_service::ModerationService;
pub use tournament_service::TournamentService;
pub use user_service::UserService;
pub use verified_queue_service::VerifiedQueueService;
