use crate::api_error::ApiError;
use crate::auth::jwt_service::{Claims, JwtError, JwtService};
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorForbidden, ErrorUnauthorized},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Authenticates bearer tokens when present.
///
/// Requests without an `Authorization` header pass through anonymously so
/// public routes keep working; handlers that need a user call
/// [`ClaimsExt::require_user`]. A header carrying a bad token is rejected.
pub struct AuthMiddleware {
    jwt_service: Rc<JwtService>,
}

impl AuthMiddleware {
    pub fn new(jwt_service: JwtService) -> Self {
        Self {
            jwt_service: Rc::new(jwt_service),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
            jwt_service: self.jwt_service.clone(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
    jwt_service: Rc<JwtService>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let jwt_service = self.jwt_service.clone();
        let service = self.service.clone();

        Box::pin(async move {
            let auth_header = req
                .headers()
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .map(str::to_string);

            let Some(auth_value) = auth_header else {
                return service.call(req).await;
            };

            let Some(token) = auth_value.strip_prefix("Bearer ") else {
                warn!("Invalid authorization header format");
                return Err(ErrorUnauthorized("Invalid authorization header format"));
            };

            match jwt_service.validate_access_token(token).await {
                Ok(claims) => {
                    debug!(user_id = %claims.sub, "Request authenticated");
                    req.extensions_mut().insert(claims);
                    service.call(req).await
                }
                Err(JwtError::TokenExpired) => {
                    warn!("Token expired");
                    Err(ErrorUnauthorized("Token expired"))
                }
                Err(JwtError::TokenBlacklisted) => {
                    warn!("Token blacklisted");
                    Err(ErrorForbidden("Token has been revoked"))
                }
                Err(JwtError::SessionNotFound) => {
                    warn!("Session not found");
                    Err(ErrorUnauthorized("Session expired or invalid"))
                }
                Err(JwtError::RedisError(e)) => Err(ApiError::RedisError(e).into()),
                Err(e) => {
                    warn!(error = %e, "Token validation failed");
                    Err(ErrorUnauthorized("Invalid token"))
                }
            }
        })
    }
}

/// Access to the authenticated caller from route handlers.
pub trait ClaimsExt {
    fn claims(&self) -> Option<Claims>;
    fn user_id(&self) -> Option<Uuid>;

    /// The caller's id, or 401.
    fn require_user(&self) -> Result<Uuid, ApiError> {
        self.user_id()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }

    fn require_moderator(&self) -> Result<Uuid, ApiError> {
        let claims = self
            .claims()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
        if !claims.is_moderator() {
            return Err(ApiError::forbidden("Moderator access required"));
        }
        self.require_user()
    }

    fn require_admin(&self) -> Result<Uuid, ApiError> {
        let claims = self
            .claims()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
        if !claims.is_admin() {
            return Err(ApiError::forbidden("Admin access required"));
        }
        self.require_user()
    }
}

impl ClaimsExt for actix_web::HttpRequest {
    fn claims(&self) -> Option<Claims> {
        self.extensions().get::<Claims>().cloned()
    }

    fn user_id(&self) -> Option<Uuid> {
        self.claims().and_then(|c| Uuid::parse_str(&c.sub).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt_service::{TokenType, ISSUER};
    use actix_web::test::TestRequest;

    fn claims_with_roles(roles: &[&str]) -> Claims {
        Claims {
            sub: Uuid::new_v4().to_string(),
            exp: 0,
            iat: 0,
            iss: ISSUER.to_string(),
            jti: "jti".to_string(),
            token_type: TokenType::Access,
            session_id: "session".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn test_anonymous_request_has_no_user() {
        let req = TestRequest::default().to_http_request();
        assert!(req.user_id().is_none());
        assert!(matches!(req.require_user(), Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn test_claims_in_extensions_resolve_user() {
        let req = TestRequest::default().to_http_request();
        let claims = claims_with_roles(&["user"]);
        let expected = Uuid::parse_str(&claims.sub).unwrap();
        req.extensions_mut().insert(claims);

        assert_eq!(req.require_user().unwrap(), expected);
        assert!(matches!(req.require_moderator(), Err(ApiError::Forbidden(_))));
    }

    #[test]
    fn test_admin_passes_moderator_check() {
        let req = TestRequest::default().to_http_request();
        req.extensions_mut().insert(claims_with_roles(&["user", "admin"]));

        assert!(req.require_moderator().is_ok());
        assert!(req.require_admin().is_ok());
    }

    async fn whoami(req: actix_web::HttpRequest) -> Result<actix_web::HttpResponse, ApiError> {
        let user_id = req.require_user()?;
        Ok(actix_web::HttpResponse::Ok().body(user_id.to_string()))
    }

    async fn status_of<S, R, B>(app: &S, req: R) -> actix_web::http::StatusCode
    where
        S: Service<R, Response = ServiceResponse<B>, Error = Error>,
    {
        match actix_web::test::try_call_service(app, req).await {
            Ok(resp) => resp.status(),
            Err(e) => e.as_response_error().status_code(),
        }
    }

    #[actix_web::test]
    async fn test_bearer_tokens_through_middleware() {
        use actix_web::{http::StatusCode, test, web, App};

        let jwt_service = crate::test_support::test_jwt_service().await;
        let user_id = Uuid::new_v4();
        let pair = jwt_service
            .generate_token_pair(user_id, vec!["user".to_string()])
            .await
            .unwrap();

        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(jwt_service))
                .route("/api/whoami", web::get().to(whoami)),
        )
        .await;

        let anonymous = test::TestRequest::get().uri("/api/whoami").to_request();
        assert_eq!(status_of(&app, anonymous).await, StatusCode::UNAUTHORIZED);

        let refresh = test::TestRequest::get()
            .uri("/api/whoami")
            .insert_header(("Authorization", format!("Bearer {}", pair.refresh_token)))
            .to_request();
        assert_eq!(status_of(&app, refresh).await, StatusCode::UNAUTHORIZED);

        let malformed = test::TestRequest::get()
            .uri("/api/whoami")
            .insert_header(("Authorization", format!("Token {}", pair.access_token)))
            .to_request();
        assert_eq!(status_of(&app, malformed).await, StatusCode::UNAUTHORIZED);

        let access = test::TestRequest::get()
            .uri("/api/whoami")
            .insert_header(("Authorization", format!("Bearer {}", pair.access_token)))
            .to_request();
        let body = test::call_and_read_body(&app, access).await;
        assert_eq!(body, user_id.to_string().as_bytes());
    }
}
