use crate::api_error::ApiError;
use crate::auth::middleware::ClaimsExt;
use crate::http::cache::cached_json;
use crate::models::blog::{BlogListQuery, CreateBlogPostRequest, CreateCommentRequest, UpdateBlogPostRequest};
use crate::models::common::PageQuery;
use crate::service::blog_service::BlogService;
use actix_web::{web, HttpRequest, HttpResponse, Responder};

/// GET /api/blogs
pub async fn list_posts(
    blog_service: web::Data<BlogService>,
    req: HttpRequest,
    filter: web::Query<BlogListQuery>,
    page: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    let posts = blog_service.list_published(&filter, &page).await?;
    cached_json(&req, &posts)
}

/// POST /api/blogs
pub async fn create_post(
    blog_service: web::Data<BlogService>,
    req: HttpRequest,
    request: web::Json<CreateBlogPostRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let post = blog_service.create_post(user_id, request.into_inner()).await?;
    Ok(HttpResponse::Created().json(post))
}

/// GET /api/blogs/{slug}
pub async fn get_post(
    blog_service: web::Data<BlogService>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<impl Responder, ApiError> {
    let post = blog_service.get_post(&path, req.user_id()).await?;
    Ok(HttpResponse::Ok().json(post))
}

/// PATCH /api/blogs/{slug}
pub async fn update_post(
    blog_service: web::Data<BlogService>,
    req: HttpRequest,
    path: web::Path<String>,
    request: web::Json<UpdateBlogPostRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let post = blog_service
        .update_post(&path, user_id, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(post))
}

/// DELETE /api/blogs/{slug}
pub async fn delete_post(
    blog_service: web::Data<BlogService>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let is_admin = req.claims().is_some_and(|c| c.is_admin());

    blog_service.delete_post(&path, user_id, is_admin).await?;

    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/blogs/{slug}/comments
pub async fn list_comments(
    blog_service: web::Data<BlogService>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<impl Responder, ApiError> {
    let comments = blog_service.list_comments(&path, req.user_id()).await?;
    Ok(HttpResponse::Ok().json(comments))
}

/// POST /api/blogs/{slug}/comments
pub async fn add_comment(
    blog_service: web::Data<BlogService>,
    req: HttpRequest,
    path: web::Path<String>,
    request: web::Json<CreateCommentRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let comment = blog_service
        .add_comment(&path, user_id, request.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(comment))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/blogs")
            .route("", web::get().to(list_posts))
            .route("", web::post().to(create_post))
            .route("/{slug}", web::get().to(get_post))
            .route("/{slug}", web::patch().to(update_post))
            .route("/{slug}", web::delete().to(delete_post))
            .route("/{slug}/comments", web::get().to(list_comments))
            .route("/{slug}/comments", web::post().to(add_comment)),
    );
}
