use crate::api_error::ApiError;
use crate::auth::jwt_service::{JwtService, TokenPair};
use crate::db::DbPool;
use crate::middleware::RateLimiter;
use crate::models::user::{AuthResponse, CreateUserRequest, LoginRequest, User, UserProfile};
use crate::models::verified_queue::INITIAL_BEHAVIOR_SCORE;
use bcrypt::{hash, verify, DEFAULT_COST};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

const LOGIN_ATTEMPTS_PER_WINDOW: u32 = 10;
const LOGIN_WINDOW_SECS: u64 = 15 * 60;

/// Authentication Service with JWT integration
#[derive(Clone)]
pub struct AuthService {
    pool: DbPool,
    jwt_service: JwtService,
    rate_limiter: RateLimiter,
}

impl AuthService {
    pub fn new(pool: DbPool, jwt_service: JwtService, rate_limiter: RateLimiter) -> Self {
        Self {
            pool,
            jwt_service,
            rate_limiter,
        }
    }

    /// Register a new user
    pub async fn register(&self, request: CreateUserRequest) -> Result<AuthResponse, ApiError> {
        request.validate()?;
        let email = request.email.trim().to_lowercase();

        // Hashing is CPU bound; keep it off the async workers
        let password = request.password.clone();
        let password_hash = tokio::task::spawn_blocking(move || hash(password, DEFAULT_COST))
            .await
            .map_err(|e| ApiError::internal_error(format!("Hashing task failed: {}", e)))?
            .map_err(|e| ApiError::internal_error(format!("Password hashing failed: {}", e)))?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, password_hash, behavior_score)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.username)
        .bind(&email)
        .bind(&password_hash)
        .bind(INITIAL_BEHAVIOR_SCORE)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            ApiError::from_db_with_conflict(e, "User with this email or username already exists")
        })?;

        let token_pair = self
            .jwt_service
            .generate_token_pair(user.id, user.role.claim_roles())
            .await?;

        info!(user_id = %user.id, username = %user.username, "User registered successfully");

        Ok(auth_response(token_pair, user))
    }

    /// Login user and return JWT tokens
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, ApiError> {
        request.validate()?;
        let email = request.email.trim().to_lowercase();

        self.rate_limiter
            .check(&format!("login:{}", email), LOGIN_ATTEMPTS_PER_WINDOW, LOGIN_WINDOW_SECS)
            .await?;

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

        let password = request.password.clone();
        let stored_hash = user.password_hash.clone();
        let valid = tokio::task::spawn_blocking(move || verify(password, &stored_hash))
            .await
            .map_err(|e| ApiError::internal_error(format!("Verification task failed: {}", e)))?
            .map_err(|e| ApiError::internal_error(format!("Password verification failed: {}", e)))?;

        if !valid {
            warn!(user_id = %user.id, "Failed login attempt");
            return Err(ApiError::unauthorized("Invalid email or password"));
        }

        if !user.is_active {
            return Err(ApiError::forbidden("Account is deactivated"));
        }

        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(user.id)
            .execute(&self.pool)
            .await?;

        let token_pair = self
            .jwt_service
            .generate_token_pair(user.id, user.role.claim_roles())
            .await?;

        info!(user_id = %user.id, username = %user.username, "User logged in successfully");

        Ok(auth_response(token_pair, user))
    }

    /// Refresh access token
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        Ok(self.jwt_service.refresh_token(refresh_token).await?)
    }

    /// Logout user (blacklist token)
    pub async fn logout(&self, token: &str) -> Result<(), ApiError> {
        self.jwt_service.blacklist_token(token, "User logout").await?;

        info!("User logged out successfully");

        Ok(())
    }
}

fn auth_response(token_pair: TokenPair, user: User) -> AuthResponse {
    AuthResponse {
        token: token_pair.access_token,
        refresh_token: token_pair.refresh_token,
        expires_in: token_pair.expires_in,
        user: UserProfile::from(user),
    }
}
