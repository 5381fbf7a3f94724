use crate::api_error::ApiError;
use crate::auth::middleware::ClaimsExt;
use crate::http::cache::cached_json;
use crate::models::coaching::{
    CoachListQuery, CreateBookingRequest, CreateReviewRequest, UpdateBookingRequest,
    UpsertCoachProfileRequest,
};
use crate::service::coaching_service::CoachingService;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use tracing::info;
use uuid::Uuid;

/// GET /api/coaching/coaches
pub async fn list_coaches(
    coaching_service: web::Data<CoachingService>,
    req: HttpRequest,
    filter: web::Query<CoachListQuery>,
) -> Result<HttpResponse, ApiError> {
    let coaches = coaching_service.list_coaches(&filter).await?;
    cached_json(&req, &coaches)
}

/// PUT /api/coaching/coaches/me
pub async fn upsert_profile(
    coaching_service: web::Data<CoachingService>,
    req: HttpRequest,
    request: web::Json<UpsertCoachProfileRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let profile = coaching_service
        .upsert_profile(user_id, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// GET /api/coaching/coaches/{id}
pub async fn get_coach(
    coaching_service: web::Data<CoachingService>,
    path: web::Path<Uuid>,
) -> Result<impl Responder, ApiError> {
    let coach = coaching_service.get_coach(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(coach))
}

/// POST /api/coaching/coaches/{id}/reviews
pub async fn review_coach(
    coaching_service: web::Data<CoachingService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    request: web::Json<CreateReviewRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let review = coaching_service
        .review_coach(path.into_inner(), user_id, request.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(review))
}

/// POST /api/coaching/bookings
pub async fn create_booking(
    coaching_service: web::Data<CoachingService>,
    req: HttpRequest,
    request: web::Json<CreateBookingRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    info!(user_id = %user_id, coach_id = %request.coach_id, "Booking request received");

    let booking = coaching_service
        .create_booking(user_id, request.into_inner())
        .await?;

    Ok(HttpResponse::Created().json(booking))
}

/// GET /api/coaching/bookings
pub async fn list_bookings(
    coaching_service: web::Data<CoachingService>,
    req: HttpRequest,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let bookings = coaching_service.list_bookings(user_id).await?;
    Ok(HttpResponse::Ok().json(bookings))
}

/// PATCH /api/coaching/bookings/{id}
pub async fn update_booking(
    coaching_service: web::Data<CoachingService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    request: web::Json<UpdateBookingRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let booking = coaching_service
        .update_booking(path.into_inner(), user_id, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(booking))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/coaching")
            .route("/coaches", web::get().to(list_coaches))
            .route("/coaches/me", web::put().to(upsert_profile))
            .route("/coaches/{id}", web::get().to(get_coach))
            .route("/coaches/{id}/reviews", web::post().to(review_coach))
            .route("/bookings", web::post().to(create_booking))
            .route("/bookings", web::get().to(list_bookings))
            .route("/bookings/{id}", web::patch().to(update_booking)),
    );
}
