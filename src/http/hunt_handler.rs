use crate::api_error::ApiError;
use crate::auth::middleware::ClaimsExt;
use crate::models::common::PageQuery;
use crate::models::hunt::{CreateHuntRequest, HuntListQuery, SetReadyRequest};
use crate::service::hunt_service::HuntService;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use uuid::Uuid;

/// GET /api/hunts
pub async fn list_hunts(
    hunt_service: web::Data<HuntService>,
    filter: web::Query<HuntListQuery>,
    page: web::Query<PageQuery>,
) -> Result<impl Responder, ApiError> {
    let hunts = hunt_service.list_hunts(&filter, &page).await?;
    Ok(HttpResponse::Ok().json(hunts))
}

/// POST /api/hunts
pub async fn create_hunt(
    hunt_service: web::Data<HuntService>,
    req: HttpRequest,
    request: web::Json<CreateHuntRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let hunt = hunt_service.create_hunt(user_id, request.into_inner()).await?;
    Ok(HttpResponse::Created().json(hunt))
}

/// GET /api/hunts/{id}
pub async fn get_hunt(
    hunt_service: web::Data<HuntService>,
    path: web::Path<Uuid>,
) -> Result<impl Responder, ApiError> {
    let hunt = hunt_service.get_hunt(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(hunt))
}

/// POST /api/hunts/{id}/join
pub async fn join_hunt(
    hunt_service: web::Data<HuntService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let member = hunt_service.join_hunt(path.into_inner(), user_id).await?;
    Ok(HttpResponse::Created().json(member))
}

/// POST /api/hunts/{id}/leave
pub async fn leave_hunt(
    hunt_service: web::Data<HuntService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    hunt_service.leave_hunt(path.into_inner(), user_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/hunts/{id}/ready
pub async fn set_ready(
    hunt_service: web::Data<HuntService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    request: web::Json<SetReadyRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let member = hunt_service
        .set_ready(path.into_inner(), user_id, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(member))
}

/// POST /api/hunts/{id}/start
pub async fn start_hunt(
    hunt_service: web::Data<HuntService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let hunt = hunt_service.start_hunt(path.into_inner(), user_id).await?;
    Ok(HttpResponse::Ok().json(hunt))
}

/// POST /api/hunts/{id}/complete
pub async fn complete_hunt(
    hunt_service: web::Data<HuntService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let hunt = hunt_service.complete_hunt(path.into_inner(), user_id).await?;
    Ok(HttpResponse::Ok().json(hunt))
}

/// DELETE /api/hunts/{id}
pub async fn cancel_hunt(
    hunt_service: web::Data<HuntService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    hunt_service.cancel_hunt(path.into_inner(), user_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/hunts")
            .route("", web::get().to(list_hunts))
            .route("", web::post().to(create_hunt))
            .route("/{id}", web::get().to(get_hunt))
            .route("/{id}", web::delete().to(cancel_hunt))
            .route("/{id}/join", web::post().to(join_hunt))
            .route("/{id}/leave", web::post().to(leave_hunt))
            .route("/{id}/ready", web::post().to(set_ready))
            .route("/{id}/start", web::post().to(start_hunt))
            .route("/{id}/complete", web::post().to(complete_hunt)),
    );
}
