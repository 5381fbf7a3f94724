use crate::api_error::ApiError;
use crate::auth::middleware::ClaimsExt;
use crate::models::verified_queue::{
    EndorsePlayerRequest, JoinQueueRequest, QueueListQuery, ReportPlayerRequest,
};
use crate::service::verified_queue_service::VerifiedQueueService;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use tracing::info;

/// POST /api/verified-queue/join
pub async fn join(
    queue_service: web::Data<VerifiedQueueService>,
    req: HttpRequest,
    request: web::Json<JoinQueueRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    info!(user_id = %user_id, game = %request.game, "Verified queue join requested");

    let entry = queue_service.join(user_id, request.into_inner()).await?;

    Ok(HttpResponse::Created().json(entry))
}

/// POST /api/verified-queue/leave
pub async fn leave(
    queue_service: web::Data<VerifiedQueueService>,
    req: HttpRequest,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    queue_service.leave(user_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/verified-queue/status
pub async fn status(
    queue_service: web::Data<VerifiedQueueService>,
    req: HttpRequest,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let status = queue_service.status(user_id).await?;
    Ok(HttpResponse::Ok().json(status))
}

/// GET /api/verified-queue?game=
pub async fn list(
    queue_service: web::Data<VerifiedQueueService>,
    query: web::Query<QueueListQuery>,
) -> Result<impl Responder, ApiError> {
    let entries = queue_service.list(&query.game).await?;
    Ok(HttpResponse::Ok().json(entries))
}

/// POST /api/verified-queue/report
pub async fn report(
    queue_service: web::Data<VerifiedQueueService>,
    req: HttpRequest,
    request: web::Json<ReportPlayerRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let response = queue_service.report(user_id, request.into_inner()).await?;
    Ok(HttpResponse::Created().json(response))
}

/// POST /api/verified-queue/endorse
pub async fn endorse(
    queue_service: web::Data<VerifiedQueueService>,
    req: HttpRequest,
    request: web::Json<EndorsePlayerRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let response = queue_service.endorse(user_id, request.into_inner()).await?;
    Ok(HttpResponse::Created().json(response))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/verified-queue")
            .route("", web::get().to(list))
            .route("/join", web::post().to(join))
            .route("/leave", web::post().to(leave))
            .route("/status", web::get().to(status))
            .route("/report", web::post().to(report))
            .route("/endorse", web::post().to(endorse)),
    );
}
