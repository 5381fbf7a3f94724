use crate::api_error::ApiError;
use crate::auth::middleware::ClaimsExt;
use crate::models::battle_pass::{AwardXpRequest, ClaimRewardRequest};
use crate::service::battle_pass_service::BattlePassService;
use actix_web::{web, HttpRequest, HttpResponse, Responder};

/// GET /api/battle-pass/current
pub async fn current(
    battle_pass_service: web::Data<BattlePassService>,
    req: HttpRequest,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let season = battle_pass_service.current(user_id).await?;
    Ok(HttpResponse::Ok().json(season))
}

/// POST /api/battle-pass/xp
pub async fn award_xp(
    battle_pass_service: web::Data<BattlePassService>,
    req: HttpRequest,
    request: web::Json<AwardXpRequest>,
) -> Result<impl Responder, ApiError> {
    let admin_id = req.require_admin()?;
    let progress = battle_pass_service
        .award_xp(admin_id, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(progress))
}

/// POST /api/battle-pass/claim
pub async fn claim(
    battle_pass_service: web::Data<BattlePassService>,
    req: HttpRequest,
    request: web::Json<ClaimRewardRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let claimed = battle_pass_service.claim(user_id, request.into_inner()).await?;
    Ok(HttpResponse::Created().json(claimed))
}

/// POST /api/battle-pass/premium
pub async fn premium(
    battle_pass_service: web::Data<BattlePassService>,
    req: HttpRequest,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let checkout = battle_pass_service.premium_checkout(user_id).await?;
    Ok(HttpResponse::Ok().json(checkout))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/battle-pass")
            .route("/current", web::get().to(current))
            .route("/xp", web::post().to(award_xp))
            .route("/claim", web::post().to(claim))
            .route("/premium", web::post().to(premium)),
    );
}
