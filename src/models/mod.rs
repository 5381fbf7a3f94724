// Domain models and request/response DTOs
pub mod accessibility;
pub mod battle_pass;
pub mod blog;
pub mod clan;
pub mod coaching;
pub mod common;
pub mod discord;
pub mod forum;
pub mod hunt;
pub mod matchmaking;
pub mod message;
pub mod moderation;
pub mod mood;
pub mod tournament;
pub mod user;
pub mod verified_queue;

// Re-export commonly used types
pub use common::{ListResponse, PageQuery, UserSummary};
