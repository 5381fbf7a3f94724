//! Per-user settings: Discord notifications and accessibility.

use crate::api_error::ApiError;
use crate::auth::middleware::ClaimsExt;
use crate::models::accessibility::UpdateAccessibilityRequest;
use crate::models::discord::UpsertDiscordSettingRequest;
use crate::service::accessibility_service::AccessibilityService;
use crate::service::discord_service::DiscordService;
use actix_web::{web, HttpRequest, HttpResponse, Responder};

/// GET /api/discord/settings
pub async fn get_discord_settings(
    discord_service: web::Data<DiscordService>,
    req: HttpRequest,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let settings = discord_service.get_settings(user_id).await?;
    Ok(HttpResponse::Ok().json(settings))
}

/// PUT /api/discord/settings
pub async fn put_discord_setting(
    discord_service: web::Data<DiscordService>,
    req: HttpRequest,
    request: web::Json<UpsertDiscordSettingRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let setting = discord_service
        .upsert_setting(user_id, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(setting))
}

/// GET /api/accessibility
pub async fn get_accessibility(
    accessibility_service: web::Data<AccessibilityService>,
    req: HttpRequest,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let settings = accessibility_service.get(user_id).await?;
    Ok(HttpResponse::Ok().json(settings))
}

/// PUT /api/accessibility
pub async fn put_accessibility(
    accessibility_service: web::Data<AccessibilityService>,
    req: HttpRequest,
    request: web::Json<UpdateAccessibilityRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let settings = accessibility_service
        .update(user_id, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(settings))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/discord")
            .route("/settings", web::get().to(get_discord_settings))
            .route("/settings", web::put().to(put_discord_setting)),
    )
    .service(
        web::scope("/api/accessibility")
            .route("", web::get().to(get_accessibility))
            .route("", web::put().to(put_accessibility)),
    );
}
