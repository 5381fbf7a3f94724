use crate::api_error::ApiError;
use crate::auth::middleware::ClaimsExt;
use crate::models::user::UpdateProfileRequest;
use crate::service::user_service::UserService;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use tracing::info;
use uuid::Uuid;

/// GET /api/users/{id}
pub async fn get_user(
    user_service: web::Data<UserService>,
    path: web::Path<Uuid>,
) -> Result<impl Responder, ApiError> {
    let profile = user_service.get_public_profile(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// PATCH /api/users/me
pub async fn update_me(
    user_service: web::Data<UserService>,
    req: HttpRequest,
    request: web::Json<UpdateProfileRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;

    info!(user_id = %user_id, "Profile update request received");

    let profile = user_service.update_profile(user_id, request.into_inner()).await?;

    Ok(HttpResponse::Ok().json(profile))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/users")
            .route("/me", web::patch().to(update_me))
            .route("/{id}", web::get().to(get_user)),
    );
}
