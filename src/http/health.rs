use crate::api_error::ApiError;
use crate::db::DbPool;
use actix_web::{web, HttpResponse, Result};
use redis::aio::ConnectionManager;
use tracing::error;

pub async fn health_check(
    db_pool: web::Data<DbPool>,
    redis: web::Data<ConnectionManager>,
) -> Result<HttpResponse, ApiError> {
    crate::db::health_check(&db_pool).await.map_err(|e| {
        error!(error = %e, "Database health check failed");
        e
    })?;

    let mut conn = redis.get_ref().clone();
    let pong: String = redis::cmd("PING").query_async(&mut conn).await.map_err(|e| {
        error!(error = %e, "Redis health check failed");
        ApiError::from(e)
    })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "database": "ok",
        "redis": pong.to_lowercase(),
    })))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/health", web::get().to(health_check));
}
