use crate::api_error::ApiError;
use crate::auth::middleware::ClaimsExt;
use crate::http::cache::cached_json;
use crate::models::clan::{CreateClanRequest, ClanListQuery, UpdateClanRequest, UpdateMemberRoleRequest};
use crate::models::common::PageQuery;
use crate::service::clan_service::ClanService;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use tracing::info;
use uuid::Uuid;

/// GET /api/clans
pub async fn list_clans(
    clan_service: web::Data<ClanService>,
    req: HttpRequest,
    filter: web::Query<ClanListQuery>,
    page: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    let clans = clan_service.list_clans(&filter, &page).await?;
    cached_json(&req, &clans)
}

/// POST /api/clans
pub async fn create_clan(
    clan_service: web::Data<ClanService>,
    req: HttpRequest,
    request: web::Json<CreateClanRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    info!(user_id = %user_id, name = %request.name, "Create clan request received");

    let clan = clan_service.create_clan(user_id, request.into_inner()).await?;

    Ok(HttpResponse::Created().json(clan))
}

/// GET /api/clans/{id}
pub async fn get_clan(
    clan_service: web::Data<ClanService>,
    path: web::Path<Uuid>,
) -> Result<impl Responder, ApiError> {
    let clan = clan_service.get_clan(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(clan))
}

/// PATCH /api/clans/{id}
pub async fn update_clan(
    clan_service: web::Data<ClanService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    request: web::Json<UpdateClanRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;

    let clan = clan_service
        .update_clan(path.into_inner(), user_id, request.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(clan))
}

/// DELETE /api/clans/{id}
pub async fn delete_clan(
    clan_service: web::Data<ClanService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    clan_service.delete_clan(path.into_inner(), user_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/clans/{id}/join
pub async fn join_clan(
    clan_service: web::Data<ClanService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let member = clan_service.join_clan(path.into_inner(), user_id).await?;
    Ok(HttpResponse::Created().json(member))
}

/// POST /api/clans/{id}/leave
pub async fn leave_clan(
    clan_service: web::Data<ClanService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    clan_service.leave_clan(path.into_inner(), user_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// PATCH /api/clans/{id}/members/{user_id}
pub async fn change_member_role(
    clan_service: web::Data<ClanService>,
    req: HttpRequest,
    path: web::Path<(Uuid, Uuid)>,
    request: web::Json<UpdateMemberRoleRequest>,
) -> Result<impl Responder, ApiError> {
    let actor_id = req.require_user()?;
    let (clan_id, target_id) = path.into_inner();

    let member = clan_service
        .change_member_role(clan_id, actor_id, target_id, request.role)
        .await?;

    Ok(HttpResponse::Ok().json(member))
}

/// DELETE /api/clans/{id}/members/{user_id}
pub async fn kick_member(
    clan_service: web::Data<ClanService>,
    req: HttpRequest,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<impl Responder, ApiError> {
    let actor_id = req.require_user()?;
    let (clan_id, target_id) = path.into_inner();

    clan_service.kick_member(clan_id, actor_id, target_id).await?;

    Ok(HttpResponse::NoContent().finish())
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/clans")
            .route("", web::get().to(list_clans))
            .route("", web::post().to(create_clan))
            .route("/{id}", web::get().to(get_clan))
            .route("/{id}", web::patch().to(update_clan))
            .route("/{id}", web::delete().to(delete_clan))
            .route("/{id}/join", web::post().to(join_clan))
            .route("/{id}/leave", web::post().to(leave_clan))
            .route("/{id}/members/{user_id}", web::patch().to(change_member_role))
            .route("/{id}/members/{user_id}", web::delete().to(kick_member)),
    );
}
