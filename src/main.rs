use actix_web::{web, App, HttpServer};
use std::io;
use tokio::signal;

mod api_error;
mod auth;
mod config;
mod db;
mod http;
mod middleware;
mod models;
mod service;
mod telemetry;

#[cfg(test)]
mod test_support;

use crate::auth::{AuthMiddleware, JwtConfig, JwtService};
use crate::config::Config;
use crate::db::{create_pool, run_migrations};
use crate::middleware::{cors_middleware, RateLimitMiddleware, RateLimiter};
use crate::service::{
    AccessibilityService, AuthService, BattlePassService, BillingService, BlogService,
    ClanService, CoachingService, DiscordNotifier, DiscordService, ForumService, HuntService,
    LiveHub, MatchmakingService, MessageService, ModerationService, TournamentService,
    UserService, VerifiedQueueService,
};
use crate::telemetry::init_telemetry;

fn startup_error(context: &str, e: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, e))
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let config = Config::from_env().map_err(|e| startup_error("Failed to load configuration", e))?;

    init_telemetry(&config.server.rust_log);

    let db_pool = create_pool(&config)
        .await
        .map_err(|e| startup_error("Failed to create database pool", e))?;
    run_migrations(&db_pool)
        .await
        .map_err(|e| startup_error("Failed to run migrations", e))?;

    let redis_client = redis::Client::open(config.redis.url.clone())
        .map_err(|e| startup_error("Invalid Redis URL", e))?;
    let redis = redis::aio::ConnectionManager::new(redis_client)
        .await
        .map_err(|e| startup_error("Failed to connect to Redis", e))?;

    let jwt_service = JwtService::new(JwtConfig::from(&config.auth), redis.clone());
    let rate_limiter = RateLimiter::new(redis.clone());
    let live_hub = LiveHub::new();
    let notifier = DiscordNotifier::new(db_pool.clone())
        .map_err(|e| startup_error("Failed to build Discord client", e))?;
    let billing_service = BillingService::new(db_pool.clone(), config.billing.clone())
        .map_err(|e| startup_error("Failed to build billing client", e))?;
    let matchmaking_service =
        MatchmakingService::new(db_pool.clone(), config.llm.clone(), rate_limiter.clone())
            .map_err(|e| startup_error("Failed to build LLM client", e))?;

    if !billing_service.is_enabled() {
        tracing::warn!("Stripe is not configured; checkout endpoints will return 503");
    }

    let auth_service = AuthService::new(db_pool.clone(), jwt_service.clone(), rate_limiter.clone());
    let user_service = UserService::new(db_pool.clone());
    let clan_service = ClanService::new(db_pool.clone(), notifier.clone());
    let tournament_service =
        TournamentService::new(db_pool.clone(), live_hub.clone(), notifier.clone());
    let verified_queue_service = VerifiedQueueService::new(db_pool.clone(), rate_limiter.clone());
    let forum_service = ForumService::new(db_pool.clone());
    let blog_service = BlogService::new(db_pool.clone());
    let hunt_service = HuntService::new(db_pool.clone(), notifier.clone());
    let coaching_service = CoachingService::new(db_pool.clone(), billing_service.clone());
    let battle_pass_service = BattlePassService::new(db_pool.clone(), billing_service.clone());
    let message_service = MessageService::new(
        db_pool.clone(),
        rate_limiter.clone(),
        live_hub.clone(),
        notifier.clone(),
    );
    let discord_service = DiscordService::new(db_pool.clone());
    let accessibility_service = AccessibilityService::new(db_pool.clone());
    let moderation_service = ModerationService::new(db_pool.clone());

    let server_config = config.server.clone();
    let rate_limit = config.rate_limit.clone();

    tracing::info!(
        "Starting GamerHub backend server on {}:{}",
        config.server.host,
        config.server.port
    );

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(web::Data::new(redis.clone()))
            .app_data(web::Data::new(jwt_service.clone()))
            .app_data(web::Data::new(live_hub.clone()))
            .app_data(web::Data::new(auth_service.clone()))
            .app_data(web::Data::new(user_service.clone()))
            .app_data(web::Data::new(clan_service.clone()))
            .app_data(web::Data::new(tournament_service.clone()))
            .app_data(web::Data::new(verified_queue_service.clone()))
            .app_data(web::Data::new(matchmaking_service.clone()))
            .app_data(web::Data::new(forum_service.clone()))
            .app_data(web::Data::new(blog_service.clone()))
            .app_data(web::Data::new(hunt_service.clone()))
            .app_data(web::Data::new(coaching_service.clone()))
            .app_data(web::Data::new(billing_service.clone()))
            .app_data(web::Data::new(battle_pass_service.clone()))
            .app_data(web::Data::new(message_service.clone()))
            .app_data(web::Data::new(discord_service.clone()))
            .app_data(web::Data::new(accessibility_service.clone()))
            .app_data(web::Data::new(moderation_service.clone()))
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .wrap(RateLimitMiddleware::new(
                rate_limiter.clone(),
                rate_limit.requests,
                rate_limit.window,
            ))
            .wrap(cors_middleware(&server_config))
            .wrap(actix_web::middleware::Logger::default())
            .configure(http::health::configure_routes)
            .configure(http::auth_handler::configure_routes)
            .configure(http::user_handler::configure_routes)
            .configure(http::clan_handler::configure_routes)
            .configure(http::tournament_handler::configure_routes)
            .configure(http::verified_queue_handler::configure_routes)
            .configure(http::matchmaking_handler::configure_routes)
            .configure(http::forum_handler::configure_routes)
            .configure(http::blog_handler::configure_routes)
            .configure(http::hunt_handler::configure_routes)
            .configure(http::coaching_handler::configure_routes)
            .configure(http::billing_handler::configure_routes)
            .configure(http::battle_pass_handler::configure_routes)
            .configure(http::message_handler::configure_routes)
            .configure(http::settings_handler::configure_routes)
            .configure(http::moderation_handler::configure_routes)
            .configure(http::live_ws_handler::configure_routes)
    })
    .bind((config.server.host.clone(), config.server.port))?
    .run();

    // Graceful shutdown
    let server_handle = server.handle();
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received, stopping server...");
        server_handle.stop(true).await;
    });

    server.await
}
