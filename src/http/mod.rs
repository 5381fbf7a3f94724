pub mod auth_handler;
pub mod battle_pass_handler;
pub mod billing_handler;
pub mod blog_handler;
pub mod cache;
pub mod clan_handler;
pub mod coaching_handler;
pub mod forum_handler;
pub mod health;
pub mod hunt_handler;
pub mod live_ws_handler;
pub mod matchmaking_handler;
pub mod message_handler;
pub mod moderation_handler;
pub mod settings_handler;
pub mod tournament_handler;
pub mod user_handler;
pub mod verified_queue_handler;
