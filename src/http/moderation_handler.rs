use crate::api_error::ApiError;
use crate::auth::middleware::ClaimsExt;
use crate::models::common::PageQuery;
use crate::models::moderation::{
    CreateReportRequest, CreateVerificationRequest, ReportListQuery, ResolveReportRequest,
    ReviewVerificationRequest,
};
use crate::service::moderation_service::ModerationService;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use uuid::Uuid;

/// POST /api/moderation/reports
pub async fn create_report(
    moderation_service: web::Data<ModerationService>,
    req: HttpRequest,
    request: web::Json<CreateReportRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let report = moderation_service
        .create_report(user_id, request.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(report))
}

/// GET /api/moderation/reports
pub async fn list_reports(
    moderation_service: web::Data<ModerationService>,
    req: HttpRequest,
    filter: web::Query<ReportListQuery>,
    page: web::Query<PageQuery>,
) -> Result<impl Responder, ApiError> {
    req.require_moderator()?;
    let reports = moderation_service.list_reports(&filter, &page).await?;
    Ok(HttpResponse::Ok().json(reports))
}

/// PATCH /api/moderation/reports/{id}
pub async fn resolve_report(
    moderation_service: web::Data<ModerationService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    request: web::Json<ResolveReportRequest>,
) -> Result<impl Responder, ApiError> {
    let moderator_id = req.require_moderator()?;
    let report = moderation_service
        .resolve_report(path.into_inner(), moderator_id, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(report))
}

/// POST /api/verification
pub async fn request_verification(
    moderation_service: web::Data<ModerationService>,
    req: HttpRequest,
    request: web::Json<CreateVerificationRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let verification = moderation_service
        .request_verification(user_id, request.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(verification))
}

/// GET /api/verification/me
pub async fn my_verifications(
    moderation_service: web::Data<ModerationService>,
    req: HttpRequest,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let requests = moderation_service.my_verifications(user_id).await?;
    Ok(HttpResponse::Ok().json(requests))
}

/// GET /api/verification/pending
pub async fn pending_verifications(
    moderation_service: web::Data<ModerationService>,
    req: HttpRequest,
) -> Result<impl Responder, ApiError> {
    req.require_admin()?;
    let requests = moderation_service.pending_verifications().await?;
    Ok(HttpResponse::Ok().json(requests))
}

/// PATCH /api/verification/{id}
pub async fn review_verification(
    moderation_service: web::Data<ModerationService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    request: web::Json<ReviewVerificationRequest>,
) -> Result<impl Responder, ApiError> {
    let admin_id = req.require_admin()?;
    let reviewed = moderation_service
        .review_verification(path.into_inner(), admin_id, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(reviewed))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/moderation")
            .route("/reports", web::post().to(create_report))
            .route("/reports", web::get().to(list_reports))
            .route("/reports/{id}", web::patch().to(resolve_report)),
    )
    .service(
        web::scope("/api/verification")
            .route("", web::post().to(request_verification))
            .route("/me", web::get().to(my_verifications))
            .route("/pending", web::get().to(pending_verifications))
            .route("/{id}", web::patch().to(review_verification)),
    );
}

