use crate::api_error::ApiError;
use crate::service::billing_service::{BillingService, WebhookOutcome};
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use tracing::info;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// POST /api/billing/stripe/webhook
/// The raw body is needed to verify the signature.
pub async fn stripe_webhook(
    billing_service: web::Data<BillingService>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<impl Responder, ApiError> {
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok());

    let outcome = billing_service.handle_webhook(&body, signature).await?;

    let handled = match outcome {
        WebhookOutcome::BookingConfirmed(booking_id) => {
            info!(booking_id = %booking_id, "Webhook confirmed booking");
            true
        }
        WebhookOutcome::PremiumActivated { season_id, user_id } => {
            info!(season_id = %season_id, user_id = %user_id, "Webhook activated premium pass");
            true
        }
        WebhookOutcome::Ignored => false,
    };

    Ok(HttpResponse::Ok().json(serde_json::json!({ "received": true, "handled": handled })))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/api/billing").route("/stripe/webhook", web::post().to(stripe_webhook)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BillingConfig;
    use crate::service::billing_service::compute_signature;
    use actix_web::{http::StatusCode, test, App};
    use sqlx::postgres::PgPoolOptions;

    const SECRET: &str = "whsec_handler_test";

    // The pool never connects: these paths return before touching the database.
    fn billing(webhook_secret: Option<&str>) -> BillingService {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let config = BillingConfig {
            stripe_secret_key: None,
            stripe_webhook_secret: webhook_secret.map(str::to_string),
            public_base_url: "http://localhost:3000".to_string(),
        };
        BillingService::new(pool, config).unwrap()
    }

    #[actix_web::test]
    async fn test_webhook_rejects_bad_signature() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(billing(Some(SECRET))))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/billing/stripe/webhook")
            .insert_header((SIGNATURE_HEADER, "t=1,v1=deadbeef"))
            .set_payload(r#"{"type":"checkout.session.completed"}"#)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_webhook_ignores_other_events() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(billing(Some(SECRET))))
                .configure(configure_routes),
        )
        .await;

        let payload = r#"{"type":"customer.created","data":{"object":{"id":"cus_1","metadata":{}}}}"#;
        let now = chrono::Utc::now().timestamp();
        let header = format!("t={},v1={}", now, compute_signature(SECRET, now, payload.as_bytes()));

        let req = test::TestRequest::post()
            .uri("/api/billing/stripe/webhook")
            .insert_header((SIGNATURE_HEADER, header))
            .set_payload(payload)
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["received"], true);
        assert_eq!(body["handled"], false);
    }

    #[actix_web::test]
    async fn test_webhook_unconfigured_is_unavailable() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(billing(None)))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/billing/stripe/webhook")
            .set_payload("{}")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
