use crate::api_error::ApiError;
use crate::config::BillingConfig;
use crate::db::DbPool;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const STRIPE_CHECKOUT_URL: &str = "https://api.stripe.com/v1/checkout/sessions";
const STRIPE_TIMEOUT_SECS: u64 = 15;
/// Maximum age of a webhook signature timestamp.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutKind {
    CoachingBooking,
    BattlePassPremium,
}

impl CheckoutKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutKind::CoachingBooking => "coaching_booking",
            CheckoutKind::BattlePassPremium => "battle_pass_premium",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "coaching_booking" => Some(CheckoutKind::CoachingBooking),
            "battle_pass_premium" => Some(CheckoutKind::BattlePassPremium),
            _ => None,
        }
    }
}

/// What a checkout pays for.
#[derive(Debug, Clone)]
pub struct CheckoutItem {
    pub kind: CheckoutKind,
    pub ref_id: Uuid,
    pub user_id: Uuid,
    pub amount_cents: i64,
    pub product_name: String,
    /// Path on the public site the buyer returns to.
    pub return_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum SignatureError {
    #[error("Missing signature header")]
    MissingHeader,
    #[error("Malformed signature header")]
    Malformed,
    #[error("Signature timestamp outside tolerance")]
    Expired,
    #[error("No matching signature")]
    Mismatch,
}

impl From<SignatureError> for ApiError {
    fn from(err: SignatureError) -> Self {
        ApiError::bad_request(format!("Invalid webhook signature: {}", err))
    }
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`.
#[cfg(test)]
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Check a `Stripe-Signature` header of the form `t=<unix>,v1=<hex>[,v1=<hex>...]`.
pub fn verify_signature(
    payload: &[u8],
    header: Option<&str>,
    secret: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::MissingHeader)?;

    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(value.parse::<i64>().map_err(|_| SignatureError::Malformed)?)
            }
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if candidates.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if now.abs_diff(timestamp) > SIGNATURE_TOLERANCE_SECS.unsigned_abs() {
        return Err(SignatureError::Expired);
    }

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Mismatch)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = candidates.iter().any(|candidate| {
        hex::decode(candidate)
            .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    object: SessionObject,
}

#[derive(Debug, Deserialize)]
struct SessionObject {
    id: Option<String>,
    #[serde(default)]
    metadata: std::collections::HashMap<String, String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    BookingConfirmed(Uuid),
    PremiumActivated { season_id: Uuid, user_id: Uuid },
    Ignored,
}

/// Stripe Checkout integration.
#[derive(Clone)]
pub struct BillingService {
    db_pool: DbPool,
    client: Client,
    config: BillingConfig,
}

impl BillingService {
    pub fn new(db_pool: DbPool, config: BillingConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(STRIPE_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            db_pool,
            client,
            config,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.stripe_secret_key.is_some()
    }

    /// Create a Stripe Checkout Session; 503 when billing is not configured.
    pub async fn create_checkout(&self, item: &CheckoutItem) -> Result<CheckoutSession, ApiError> {
        let secret_key = self
            .config
            .stripe_secret_key
            .as_deref()
            .ok_or_else(|| ApiError::ServiceUnavailable("Billing is not configured".to_string()))?;

        let base = self.config.public_base_url.trim_end_matches('/');
        let form = checkout_form(item, base);

        let response = self
            .client
            .post(STRIPE_CHECKOUT_URL)
            .bearer_auth(secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Stripe request failed");
                ApiError::external("Stripe", e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Stripe rejected checkout session");
            return Err(ApiError::external("Stripe", format!("status {}", status)));
        }

        let session: CheckoutSession = response
            .json()
            .await
            .map_err(|e| ApiError::external("Stripe", e.to_string()))?;

        info!(
            session_id = %session.id,
            kind = item.kind.as_str(),
            ref_id = %item.ref_id,
            "Checkout session created"
        );

        Ok(session)
    }

    /// Verify and apply a Stripe webhook delivery.
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, ApiError> {
        let secret = self
            .config
            .stripe_webhook_secret
            .as_deref()
            .ok_or_else(|| ApiError::ServiceUnavailable("Billing is not configured".to_string()))?;

        verify_signature(payload, signature, secret, chrono::Utc::now().timestamp())?;

        let event: WebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| ApiError::bad_request(format!("Invalid webhook payload: {}", e)))?;

        if event.event_type != "checkout.session.completed" {
            info!(event_type = %event.event_type, "Ignoring Stripe event");
            return Ok(WebhookOutcome::Ignored);
        }

        let object = event.data.object;
        let kind = object.metadata.get("kind").and_then(|k| CheckoutKind::parse(k));
        let ref_id = object
            .metadata
            .get("ref_id")
            .and_then(|id| Uuid::parse_str(id).ok());
        let user_id = object
            .metadata
            .get("user_id")
            .and_then(|id| Uuid::parse_str(id).ok());

        match (kind, ref_id) {
            (Some(CheckoutKind::CoachingBooking), Some(booking_id)) => {
                let result = sqlx::query(
                    r#"
                    UPDATE coaching_bookings SET status = 'confirmed', updated_at = NOW()
                    WHERE id = $1 AND status = 'pending_payment'
                    "#,
                )
                .bind(booking_id)
                .execute(&self.db_pool)
                .await?;

                if result.rows_affected() == 0 {
                    warn!(booking_id = %booking_id, "Paid booking was not pending payment");
                }
                info!(booking_id = %booking_id, session_id = ?object.id, "Booking paid");
                Ok(WebhookOutcome::BookingConfirmed(booking_id))
            }
            (Some(CheckoutKind::BattlePassPremium), Some(season_id)) => {
                let user_id = user_id
                    .ok_or_else(|| ApiError::bad_request("Checkout metadata is missing user_id"))?;

                sqlx::query(
                    r#"
                    INSERT INTO battle_pass_progress (season_id, user_id, xp, is_premium, updated_at)
                    VALUES ($1, $2, 0, TRUE, NOW())
                    ON CONFLICT (season_id, user_id) DO UPDATE SET is_premium = TRUE, updated_at = NOW()
                    "#,
                )
                .bind(season_id)
                .bind(user_id)
                .execute(&self.db_pool)
                .await?;

                info!(season_id = %season_id, user_id = %user_id, "Premium battle pass activated");
                Ok(WebhookOutcome::PremiumActivated { season_id, user_id })
            }
            _ => {
                warn!(session_id = ?object.id, "Checkout completed without recognizable metadata");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }
}

fn checkout_form(item: &CheckoutItem, base_url: &str) -> Vec<(&'static str, String)> {
    vec![
        ("mode", "payment".to_string()),
        ("success_url", format!("{}{}?checkout=success", base_url, item.return_path)),
        ("cancel_url", format!("{}{}?checkout=cancelled", base_url, item.return_path)),
        ("client_reference_id", item.ref_id.to_string()),
        ("line_items[0][quantity]", "1".to_string()),
        ("line_items[0][price_data][currency]", "usd".to_string()),
        ("line_items[0][price_data][unit_amount]", item.amount_cents.to_string()),
        ("line_items[0][price_data][product_data][name]", item.product_name.clone()),
        ("metadata[kind]", item.kind.as_str().to_string()),
        ("metadata[ref_id]", item.ref_id.to_string()),
        ("metadata[user_id]", item.user_id.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    fn header_for(payload: &[u8], timestamp: i64) -> String {
        format!("t={},v1={}", timestamp, compute_signature(SECRET, timestamp, payload))
    }

    #[test]
    fn test_valid_signature() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let now = 1_700_000_000;
        let header = header_for(payload, now - 10);
        assert_eq!(verify_signature(payload, Some(&header), SECRET, now), Ok(()));
    }

    #[test]
    fn test_any_v1_may_match() {
        let payload = b"{}";
        let now = 1_700_000_000;
        let good = compute_signature(SECRET, now, payload);
        let header = format!("t={},v1=deadbeef,v0=ignored,v1={}", now, good);
        assert_eq!(verify_signature(payload, Some(&header), SECRET, now), Ok(()));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let now = 1_700_000_000;
        let header = header_for(b"{\"amount\":100}", now);
        assert_eq!(
            verify_signature(b"{\"amount\":1}", Some(&header), SECRET, now),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = b"{}";
        let now = 1_700_000_000;
        let header = header_for(payload, now - SIGNATURE_TOLERANCE_SECS - 1);
        assert_eq!(
            verify_signature(payload, Some(&header), SECRET, now),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn test_malformed_headers() {
        assert_eq!(
            verify_signature(b"{}", None, SECRET, 0),
            Err(SignatureError::MissingHeader)
        );
        assert_eq!(
            verify_signature(b"{}", Some("v1=abc"), SECRET, 0),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_signature(b"{}", Some("t=abc,v1=abc"), SECRET, 0),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_signature(b"{}", Some("t=0"), SECRET, 0),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_signature(b"{}", Some("t=-9223372036854775808,v1=00"), SECRET, 1_700_000_000),
            Err(SignatureError::Expired)
        );
        assert_eq!(
            verify_signature(b"{}", Some("t=9223372036854775807,v1=00"), SECRET, -1_700_000_000),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn test_checkout_form_metadata() {
        let item = CheckoutItem {
            kind: CheckoutKind::CoachingBooking,
            ref_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            amount_cents: 4500,
            product_name: "Coaching session".to_string(),
            return_path: "/coaching/bookings".to_string(),
        };
        let form = checkout_form(&item, "https://gamerhub.example");
        let get = |key: &str| form.iter().find(|(k, _)| *k == key).map(|(_, v)| v.clone());

        assert_eq!(get("metadata[kind]").as_deref(), Some("coaching_booking"));
        assert_eq!(get("metadata[ref_id]"), Some(item.ref_id.to_string()));
        assert_eq!(get("line_items[0][price_data][unit_amount]").as_deref(), Some("4500"));
        assert_eq!(
            get("success_url").as_deref(),
            Some("https://gamerhub.example/coaching/bookings?checkout=success")
        );
    }

    #[test]
    fn test_checkout_kind_parse() {
        assert_eq!(CheckoutKind::parse("battle_pass_premium"), Some(CheckoutKind::BattlePassPremium));
        assert_eq!(CheckoutKind::parse("subscription"), None);
    }
}
