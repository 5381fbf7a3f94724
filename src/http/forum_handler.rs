use crate::api_error::ApiError;
use crate::auth::middleware::ClaimsExt;
use crate::http::cache::cached_json;
use crate::models::common::PageQuery;
use crate::models::forum::{CreatePostRequest, CreateThreadRequest, ModerateThreadRequest};
use crate::service::forum_service::ForumService;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use uuid::Uuid;

/// GET /api/forums/categories
pub async fn list_categories(
    forum_service: web::Data<ForumService>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let categories = forum_service.list_categories().await?;
    cached_json(&req, &categories)
}

/// GET /api/forums/categories/{id}/threads
pub async fn list_threads(
    forum_service: web::Data<ForumService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    page: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    let threads = forum_service.list_threads(path.into_inner(), &page).await?;
    cached_json(&req, &threads)
}

/// POST /api/forums/threads
pub async fn create_thread(
    forum_service: web::Data<ForumService>,
    req: HttpRequest,
    request: web::Json<CreateThreadRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let thread = forum_service.create_thread(user_id, request.into_inner()).await?;
    Ok(HttpResponse::Created().json(thread))
}

/// GET /api/forums/threads/{id}
pub async fn get_thread(
    forum_service: web::Data<ForumService>,
    path: web::Path<Uuid>,
    page: web::Query<PageQuery>,
) -> Result<impl Responder, ApiError> {
    let thread = forum_service.get_thread(path.into_inner(), &page).await?;
    Ok(HttpResponse::Ok().json(thread))
}

/// POST /api/forums/threads/{id}/posts
pub async fn reply(
    forum_service: web::Data<ForumService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    request: web::Json<CreatePostRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let post = forum_service
        .reply(path.into_inner(), user_id, request.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(post))
}

/// PATCH /api/forums/threads/{id}
pub async fn moderate_thread(
    forum_service: web::Data<ForumService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    request: web::Json<ModerateThreadRequest>,
) -> Result<impl Responder, ApiError> {
    let moderator_id = req.require_moderator()?;
    let thread = forum_service
        .moderate_thread(path.into_inner(), moderator_id, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(thread))
}

/// DELETE /api/forums/posts/{id}
pub async fn delete_post(
    forum_service: web::Data<ForumService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let is_moderator = req.claims().is_some_and(|c| c.is_moderator());

    forum_service
        .delete_post(path.into_inner(), user_id, is_moderator)
        .await?;

    Ok(HttpResponse::NoContent().finish())
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/forums")
            .route("/categories", web::get().to(list_categories))
            .route("/categories/{id}/threads", web::get().to(list_threads))
            .route("/threads", web::post().to(create_thread))
            .route("/threads/{id}", web::get().to(get_thread))
            .route("/threads/{id}", web::patch().to(moderate_thread))
            .route("/threads/{id}/posts", web::post().to(reply))
            .route("/posts/{id}", web::delete().to(delete_post)),
    );
}
