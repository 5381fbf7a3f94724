use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub server: ServerConfig,
    pub rate_limit: RateLimitConfig,
    pub llm: LlmConfig,
    pub billing: BillingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub rust_log: String,
    pub cors_allowed_origin: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    pub requests: u32,
    pub window: u64,
}

/// OpenAI-compatible chat completion endpoint used for teammate suggestions.
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BillingConfig {
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub public_base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")?;
        let max_connections: u32 = var_or("DATABASE_MAX_CONNECTIONS", "10").parse()?;
        let redis_url = env::var("REDIS_URL")?;
        let jwt_secret = env::var("JWT_SECRET")?;
        let access_ttl_minutes: i64 = var_or("JWT_ACCESS_TTL_MINUTES", "15").parse()?;
        let refresh_ttl_days: i64 = var_or("JWT_REFRESH_TTL_DAYS", "7").parse()?;
        let port: u16 = var_or("PORT", "8080").parse()?;
        let host = var_or("HOST", "0.0.0.0");
        let rust_log = var_or("RUST_LOG", "info");
        let cors_allowed_origin = optional_var("CORS_ALLOWED_ORIGIN");
        let rate_limit_requests: u32 = var_or("RATE_LIMIT_REQUESTS", "60").parse()?;
        let rate_limit_window: u64 = var_or("RATE_LIMIT_WINDOW", "60").parse()?;

        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters");
        }

        Ok(Config {
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            redis: RedisConfig { url: redis_url },
            auth: AuthConfig {
                jwt_secret,
                access_ttl_minutes,
                refresh_ttl_days,
            },
            server: ServerConfig {
                port,
                host,
                rust_log,
                cors_allowed_origin,
            },
            rate_limit: RateLimitConfig {
                requests: rate_limit_requests,
                window: rate_limit_window,
            },
            llm: LlmConfig {
                api_key: optional_var("OPENAI_API_KEY"),
                base_url: var_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
                model: var_or("OPENAI_MODEL", "gpt-4o-mini"),
            },
            billing: BillingConfig {
                stripe_secret_key: optional_var("STRIPE_SECRET_KEY"),
                stripe_webhook_secret: optional_var("STRIPE_WEBHOOK_SECRET"),
                public_base_url: var_or("PUBLIC_BASE_URL", "http://localhost:3000"),
            },
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Unset and blank values are both treated as absent.
fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
