use crate::api_error::ApiError;
use crate::auth::middleware::ClaimsExt;
use crate::models::matchmaking::SuggestionRequest;
use crate::models::mood::SetMoodRequest;
use crate::service::matchmaking_service::MatchmakingService;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use tracing::info;
use uuid::Uuid;

/// PUT /api/moods/me
pub async fn set_mood(
    matchmaking_service: web::Data<MatchmakingService>,
    req: HttpRequest,
    request: web::Json<SetMoodRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;

    let profile = matchmaking_service
        .set_mood(user_id, request.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(profile))
}

/// GET /api/moods/compatibility/{user_id}
pub async fn compatibility(
    matchmaking_service: web::Data<MatchmakingService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;

    let result = matchmaking_service
        .compatibility_with(user_id, path.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(result))
}

/// POST /api/matchmaking/suggestions
pub async fn suggestions(
    matchmaking_service: web::Data<MatchmakingService>,
    req: HttpRequest,
    request: web::Json<SuggestionRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    info!(user_id = %user_id, game = %request.game, "Matchmaking suggestions requested");

    let response = matchmaking_service
        .suggest(user_id, request.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(response))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/moods")
            .route("/me", web::put().to(set_mood))
            .route("/compatibility/{user_id}", web::get().to(compatibility)),
    )
    .service(web::scope("/api/matchmaking").route("/suggestions", web::post().to(suggestions)));
}
