use crate::api_error::ApiError;
use crate::config::AuthConfig;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use redis::{aio::ConnectionManager, AsyncCommands};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub const ISSUER: &str = "gamerhub";

/// JWT-related errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Token generation failed: {0}")]
    TokenGeneration(String),

    #[error("Token validation failed: {0}")]
    TokenValidation(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token blacklisted")]
    TokenBlacklisted,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Redis error: {0}")]
    RedisError(String),
}

impl From<redis::RedisError> for JwtError {
    fn from(err: redis::RedisError) -> Self {
        JwtError::RedisError(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::TokenExpired,
            _ => JwtError::TokenValidation(err.to_string()),
        }
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::TokenGeneration(e) => ApiError::internal_error(e),
            JwtError::RedisError(e) => ApiError::RedisError(e),
            JwtError::TokenBlacklisted => ApiError::unauthorized("Token has been revoked"),
            JwtError::TokenExpired => ApiError::unauthorized("Token expired"),
            JwtError::SessionNotFound => ApiError::unauthorized("Session expired or invalid"),
            JwtError::TokenValidation(_) | JwtError::InvalidToken => {
                ApiError::unauthorized("Invalid token")
            }
        }
    }
}

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
    pub jti: String,
    pub token_type: TokenType,
    pub session_id: String,
    pub roles: Vec<String>,
}

impl Claims {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role("admin")
    }

    /// Admins implicitly hold moderator rights.
    pub fn is_moderator(&self) -> bool {
        self.has_role("moderator") || self.is_admin()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret_key: String,
    pub access_token_expiry: Duration,
    pub refresh_token_expiry: Duration,
    pub algorithm: Algorithm,
}

impl From<&AuthConfig> for JwtConfig {
    fn from(config: &AuthConfig) -> Self {
        Self {
            secret_key: config.jwt_secret.clone(),
            access_token_expiry: Duration::minutes(config.access_ttl_minutes),
            refresh_token_expiry: Duration::days(config.refresh_ttl_days),
            algorithm: Algorithm::HS256,
        }
    }
}

/// Session record stored in Redis, shared by the access and refresh token of one login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: Uuid,
    pub session_id: String,
    pub created_at: i64,
    pub last_activity: i64,
}

pub fn encode_claims(claims: &Claims, config: &JwtConfig) -> Result<String, JwtError> {
    let key = EncodingKey::from_secret(config.secret_key.as_bytes());
    encode(&Header::new(config.algorithm), claims, &key)
        .map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

pub fn decode_claims(token: &str, config: &JwtConfig) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(config.algorithm);
    validation.set_issuer(&[ISSUER]);

    let key = DecodingKey::from_secret(config.secret_key.as_bytes());
    let token_data = decode::<Claims>(token, &key, &validation)?;

    Ok(token_data.claims)
}

#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    redis: ConnectionManager,
}

impl JwtService {
    pub fn new(config: JwtConfig, redis: ConnectionManager) -> Self {
        Self { config, redis }
    }

    fn build_claims(
        &self,
        user_id: Uuid,
        roles: Vec<String>,
        session_id: &str,
        token_type: TokenType,
    ) -> Claims {
        let now = Utc::now();
        let expiry = match token_type {
            TokenType::Access => self.config.access_token_expiry,
            TokenType::Refresh => self.config.refresh_token_expiry,
        };

        Claims {
            sub: user_id.to_string(),
            exp: (now + expiry).timestamp(),
            iat: now.timestamp(),
            iss: ISSUER.to_string(),
            jti: Uuid::new_v4().to_string(),
            token_type,
            session_id: session_id.to_string(),
            roles,
        }
    }

    /// Generate an access + refresh pair bound to a fresh session.
    pub async fn generate_token_pair(
        &self,
        user_id: Uuid,
        roles: Vec<String>,
    ) -> Result<TokenPair, JwtError> {
        let session_id = Uuid::new_v4().to_string();

        let access = self.build_claims(user_id, roles.clone(), &session_id, TokenType::Access);
        let refresh = self.build_claims(user_id, roles, &session_id, TokenType::Refresh);

        let access_token = encode_claims(&access, &self.config)?;
        let refresh_token = encode_claims(&refresh, &self.config)?;

        self.store_session(&session_id, user_id).await?;

        info!(user_id = %user_id, session_id = %session_id, "Token pair generated");

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.config.access_token_expiry.num_seconds(),
            token_type: "Bearer".to_string(),
        })
    }

    /// Validate token signature, blacklist and session, returning its claims.
    pub async fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = decode_claims(token, &self.config)?;
        self.ensure_active(&claims).await?;
        Ok(claims)
    }

    /// Validate a token presented as a request credential. Refresh tokens are refused.
    pub async fn validate_access_token(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = decode_claims(token, &self.config)?;
        if claims.token_type != TokenType::Access {
            return Err(JwtError::InvalidToken);
        }
        self.ensure_active(&claims).await?;
        Ok(claims)
    }

    async fn ensure_active(&self, claims: &Claims) -> Result<(), JwtError> {
        let mut conn = self.redis.clone();
        let blacklisted: bool = conn.exists(blacklist_key(&claims.jti)).await?;
        if blacklisted {
            return Err(JwtError::TokenBlacklisted);
        }

        if !self.session_exists(&claims.session_id).await? {
            return Err(JwtError::SessionNotFound);
        }

        Ok(())
    }

    /// Exchange a refresh token for a new pair; the old session is retired.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, JwtError> {
        let claims = self.validate_token(refresh_token).await?;

        if claims.token_type != TokenType::Refresh {
            return Err(JwtError::InvalidToken);
        }

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|e| JwtError::TokenValidation(e.to_string()))?;

        self.revoke_session(&claims.session_id).await?;
        self.blacklist_claims(&claims, "refreshed").await?;

        self.generate_token_pair(user_id, claims.roles).await
    }

    /// Blacklist a token and drop its session.
    pub async fn blacklist_token(&self, token: &str, reason: &str) -> Result<(), JwtError> {
        let claims = decode_claims(token, &self.config)?;

        self.blacklist_claims(&claims, reason).await?;
        self.revoke_session(&claims.session_id).await
    }

    async fn blacklist_claims(&self, claims: &Claims, reason: &str) -> Result<(), JwtError> {
        let remaining = claims.exp - Utc::now().timestamp();
        if remaining <= 0 {
            return Ok(());
        }

        let mut conn = self.redis.clone();
        let _: () = conn
            .set_ex(blacklist_key(&claims.jti), reason, remaining as u64)
            .await?;

        warn!(jti = %claims.jti, reason = %reason, "Token blacklisted");

        Ok(())
    }

    async fn store_session(&self, session_id: &str, user_id: Uuid) -> Result<(), JwtError> {
        let now = Utc::now().timestamp();
        let session = SessionData {
            user_id,
            session_id: session_id.to_string(),
            created_at: now,
            last_activity: now,
        };

        let session_json =
            serde_json::to_string(&session).map_err(|e| JwtError::RedisError(e.to_string()))?;
        let ttl = self.config.refresh_token_expiry.num_seconds();

        let mut conn = self.redis.clone();
        let _: () = conn
            .set_ex(session_key(session_id), session_json, ttl as u64)
            .await?;

        Ok(())
    }

    async fn session_exists(&self, session_id: &str) -> Result<bool, JwtError> {
        let mut conn = self.redis.clone();
        let exists: bool = conn.exists(session_key(session_id)).await?;
        Ok(exists)
    }

    async fn revoke_session(&self, session_id: &str) -> Result<(), JwtError> {
        let mut conn = self.redis.clone();
        let _: () = conn.del(session_key(session_id)).await?;
        Ok(())
    }
}

fn session_key(session_id: &str) -> String {
    format!("session:{}", session_id)
}

fn blacklist_key(jti: &str) -> String {
    format!("blacklist:{}", jti)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret_key: "test_secret_key_for_testing_purposes_only".to_string(),
            access_token_expiry: Duration::minutes(15),
            refresh_token_expiry: Duration::days(7),
            algorithm: Algorithm::HS256,
        }
    }

    fn claims(exp_offset: Duration) -> Claims {
        let now = Utc::now();
        Claims {
            sub: Uuid::new_v4().to_string(),
            exp: (now + exp_offset).timestamp(),
            iat: now.timestamp(),
            iss: ISSUER.to_string(),
            jti: Uuid::new_v4().to_string(),
            token_type: TokenType::Access,
            session_id: Uuid::new_v4().to_string(),
            roles: vec!["user".to_string()],
        }
    }

    #[test]
    fn test_token_type_serialization() {
        assert_eq!(serde_json::to_string(&TokenType::Access).unwrap(), "\"access\"");
        assert_eq!(serde_json::to_string(&TokenType::Refresh).unwrap(), "\"refresh\"");
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let config = test_config();
        let original = claims(Duration::minutes(5));

        let token = encode_claims(&original, &config).unwrap();
        let decoded = decode_claims(&token, &config).unwrap();

        assert_eq!(decoded.sub, original.sub);
        assert_eq!(decoded.session_id, original.session_id);
        assert_eq!(decoded.token_type, TokenType::Access);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let config = test_config();
        let token = encode_claims(&claims(Duration::minutes(-10)), &config).unwrap();

        assert!(matches!(
            decode_claims(&token, &config),
            Err(JwtError::TokenExpired)
        ));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let config = test_config();
        let token = encode_claims(&claims(Duration::minutes(5)), &config).unwrap();

        let other = JwtConfig {
            secret_key: "a_completely_different_secret_value".to_string(),
            ..test_config()
        };
        assert!(matches!(
            decode_claims(&token, &other),
            Err(JwtError::TokenValidation(_))
        ));
    }

    #[test]
    fn test_wrong_issuer_is_rejected() {
        let config = test_config();
        let mut foreign = claims(Duration::minutes(5));
        foreign.iss = "someone-else".to_string();
        let token = encode_claims(&foreign, &config).unwrap();

        assert!(decode_claims(&token, &config).is_err());
    }

    #[test]
    fn test_role_helpers() {
        let mut c = claims(Duration::minutes(5));
        assert!(!c.is_moderator());

        c.roles.push("admin".to_string());
        assert!(c.is_admin());
        assert!(c.is_moderator());
    }

    #[test]
    fn test_config_from_auth_config() {
        let auth = AuthConfig {
            jwt_secret: "x".repeat(32),
            access_ttl_minutes: 30,
            refresh_ttl_days: 14,
        };
        let config = JwtConfig::from(&auth);
        assert_eq!(config.access_token_expiry.num_minutes(), 30);
        assert_eq!(config.refresh_token_expiry.num_days(), 14);
        assert_eq!(config.algorithm, Algorithm::HS256);
    }
}
