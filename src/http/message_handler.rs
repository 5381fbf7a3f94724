use crate::api_error::ApiError;
use crate::auth::middleware::ClaimsExt;
use crate::models::common::PageQuery;
use crate::models::message::SendMessageRequest;
use crate::service::message_service::MessageService;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use uuid::Uuid;

/// POST /api/messages
pub async fn send_message(
    message_service: web::Data<MessageService>,
    req: HttpRequest,
    request: web::Json<SendMessageRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let message = message_service.send(user_id, request.into_inner()).await?;
    Ok(HttpResponse::Created().json(message))
}

/// GET /api/messages/conversations
pub async fn conversations(
    message_service: web::Data<MessageService>,
    req: HttpRequest,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let conversations = message_service.conversations(user_id).await?;
    Ok(HttpResponse::Ok().json(conversations))
}

/// GET /api/messages/{user_id}
pub async fn thread(
    message_service: web::Data<MessageService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    page: web::Query<PageQuery>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let messages = message_service
        .thread(user_id, path.into_inner(), &page)
        .await?;
    Ok(HttpResponse::Ok().json(messages))
}

/// POST /api/messages/{user_id}/read
pub async fn mark_read(
    message_service: web::Data<MessageService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;
    let marked = message_service.mark_read(user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(marked))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/messages")
            .route("", web::post().to(send_message))
            .route("/conversations", web::get().to(conversations))
            .route("/{user_id}", web::get().to(thread))
            .route("/{user_id}/read", web::post().to(mark_read)),
    );
}
