//! Shared helpers for unit tests.

pub mod fake_redis;

pub use fake_redis::fake_redis;

use crate::auth::jwt_service::{JwtConfig, JwtService};
use chrono::Duration;
use jsonwebtoken::Algorithm;

pub const TEST_JWT_SECRET: &str = "test_secret_key_for_unit_tests_only";

pub fn test_jwt_config() -> JwtConfig {
    JwtConfig {
        secret_key: TEST_JWT_SECRET.to_string(),
        access_token_expiry: Duration::minutes(15),
        refresh_token_expiry: Duration::days(7),
        algorithm: Algorithm::HS256,
    }
}

/// A `JwtService` whose sessions live in an in-process fake Redis.
pub async fn test_jwt_service() -> JwtService {
    JwtService::new(test_jwt_config(), fake_redis().await)
}
