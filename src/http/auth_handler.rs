use crate::api_error::ApiError;
use crate::auth::middleware::ClaimsExt;
use crate::models::user::{CreateUserRequest, LoginRequest};
use crate::service::auth_service::AuthService;
use crate::service::user_service::UserService;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use tracing::info;

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// POST /api/auth/register
pub async fn register(
    auth_service: web::Data<AuthService>,
    request: web::Json<CreateUserRequest>,
) -> Result<impl Responder, ApiError> {
    info!(username = %request.username, "Registration request received");

    let response = auth_service.register(request.into_inner()).await?;

    Ok(HttpResponse::Created().json(response))
}

/// POST /api/auth/login
pub async fn login(
    auth_service: web::Data<AuthService>,
    request: web::Json<LoginRequest>,
) -> Result<impl Responder, ApiError> {
    info!(email = %request.email, "Login request received");

    let response = auth_service.login(request.into_inner()).await?;

    Ok(HttpResponse::Ok().json(response))
}

/// POST /api/auth/refresh
pub async fn refresh_token(
    auth_service: web::Data<AuthService>,
    request: web::Json<RefreshTokenRequest>,
) -> Result<impl Responder, ApiError> {
    info!("Token refresh request received");

    let token_pair = auth_service.refresh_token(&request.refresh_token).await?;

    Ok(HttpResponse::Ok().json(token_pair))
}

/// POST /api/auth/logout
/// Blacklists the presented access token.
pub async fn logout(
    auth_service: web::Data<AuthService>,
    req: HttpRequest,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;

    let token = bearer_token(&req)
        .ok_or_else(|| ApiError::bad_request("Missing or invalid Authorization header"))?;

    auth_service.logout(token).await?;

    info!(user_id = %user_id, "User logged out");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Logged out successfully"
    })))
}

/// GET /api/auth/me
pub async fn get_current_user(
    user_service: web::Data<UserService>,
    req: HttpRequest,
) -> Result<impl Responder, ApiError> {
    let user_id = req.require_user()?;

    let profile = user_service.get_profile(user_id).await?;

    Ok(HttpResponse::Ok().json(profile))
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/auth")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/refresh", web::post().to(refresh_token))
            .route("/logout", web::post().to(logout))
            .route("/me", web::get().to(get_current_user)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_request_deserialization() {
        let json = r#"{"refresh_token":"test_token"}"#;
        let req: RefreshTokenRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.refresh_token, "test_token");
    }

    #[test]
    fn test_bearer_token_extraction() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer abc.def.ghi"))
            .to_http_request();
        assert_eq!(bearer_token(&req), Some("abc.def.ghi"));

        let req = TestRequest::default()
            .insert_header(("Authorization", "Basic dXNlcjpwYXNz"))
            .to_http_request();
        assert_eq!(bearer_token(&req), None);

        let req = TestRequest::default().to_http_request();
        assert_eq!(bearer_token(&req), None);
    }
}
