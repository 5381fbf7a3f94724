use crate::api_error::ApiError;
use crate::config::ServerConfig;
use actix_cors::Cors;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::LocalBoxFuture;
use redis::{aio::ConnectionManager, AsyncCommands};
use std::future::{ready, Ready};
use std::rc::Rc;
use tracing::warn;

pub fn cors_middleware(config: &ServerConfig) -> Cors {
    let cors = match config.cors_allowed_origin {
        Some(ref origin) => Cors::default().allowed_origin(origin).supports_credentials(),
        None => Cors::default().allow_any_origin(),
    };

    cors.allow_any_method().allow_any_header().max_age(3600)
}

/// Fixed-window request counter backed by Redis.
#[derive(Clone)]
pub struct RateLimiter {
    redis: ConnectionManager,
}

impl RateLimiter {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    /// Count one hit against `key`; errors with 429 once `limit` is exceeded inside the window.
    pub async fn check(&self, key: &str, limit: u32, window_secs: u64) -> Result<(), ApiError> {
        let redis_key = format!("ratelimit:{}", key);
        let mut conn = self.redis.clone();

        let count: u64 = conn.incr(&redis_key, 1u64).await?;
        if count == 1 {
            let _: () = conn.expire(&redis_key, window_secs as i64).await?;
        }

        if exceeds_limit(count, limit) {
            warn!(key = %key, count = count, limit = limit, "Rate limit exceeded");
            return Err(ApiError::too_many_requests(format!(
                "Too many requests, try again in {} seconds",
                window_secs
            )));
        }

        Ok(())
    }
}

pub fn exceeds_limit(count: u64, limit: u32) -> bool {
    count > u64::from(limit)
}

/// Per-client-IP limit applied to every API request except the health probe.
pub struct RateLimitMiddleware {
    limiter: Rc<RateLimiter>,
    requests: u32,
    window: u64,
}

impl RateLimitMiddleware {
    pub fn new(limiter: RateLimiter, requests: u32, window: u64) -> Self {
        Self {
            limiter: Rc::new(limiter),
            requests,
            window,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
            requests: self.requests,
            window: self.window,
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    limiter: Rc<RateLimiter>,
    requests: u32,
    window: u64,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
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
        let service = self.service.clone();
        let limiter = self.limiter.clone();
        let requests = self.requests;
        let window = self.window;

        Box::pin(async move {
            if req.path() == "/api/health" {
                return service.call(req).await;
            }

            let client_ip = req
                .connection_info()
                .realip_remote_addr()
                .unwrap_or("unknown")
                .to_string();

            limiter
                .check(&format!("ip:{}", client_ip), requests, window)
                .await?;

            service.call(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exceeds_limit_boundary() {
        assert!(!exceeds_limit(1, 10));
        assert!(!exceeds_limit(10, 10));
        assert!(exceeds_limit(11, 10));
        assert!(exceeds_limit(1, 0));
    }

    #[test]
    fn test_cors_builds_for_both_modes() {
        let open = ServerConfig {
            port: 8080,
            host: "127.0.0.1".to_string(),
            rust_log: "info".to_string(),
            cors_allowed_origin: None,
        };
        let _ = cors_middleware(&open);

        let locked = ServerConfig {
            cors_allowed_origin: Some("https://gamerhub.example".to_string()),
            ..open
        };
        let _ = cors_middleware(&locked);
    }
}
