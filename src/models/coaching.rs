use crate::models::common::UserSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Requested,
    PendingPayment,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

/// Which side of a booking the caller is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingParty {
    Coach,
    Student,
}

/// Whether `party` may move a booking from `current` to `next`.
pub fn booking_transition_allowed(party: BookingParty, current: BookingStatus, next: BookingStatus) -> bool {
    use BookingStatus::*;

    if current.is_terminal() {
        return false;
    }
    match party {
        BookingParty::Student => next == Cancelled,
        BookingParty::Coach => match next {
            Confirmed => matches!(current, Requested | PendingPayment),
            Completed => current == Confirmed,
            Cancelled => true,
            Requested | PendingPayment => false,
        },
    }
}

/// Price for a session, rounded down to whole cents.
pub fn session_price_cents(hourly_rate_cents: i64, duration_minutes: i32) -> i64 {
    hourly_rate_cents * i64::from(duration_minutes) / 60
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CoachProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub headline: String,
    pub bio: Option<String>,
    pub games: Vec<String>,
    pub hourly_rate_cents: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CoachRating {
    pub coach_id: Uuid,
    pub average_rating: Option<f64>,
    pub review_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachListItem {
    #[serde(flatten)]
    pub profile: CoachProfile,
    pub coach: Option<UserSummary>,
    pub average_rating: Option<f64>,
    pub review_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CoachReview {
    pub id: Uuid,
    pub coach_id: Uuid,
    pub student_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachDetailResponse {
    #[serde(flatten)]
    pub item: CoachListItem,
    pub reviews: Vec<CoachReview>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub coach_id: Uuid,
    pub student_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub price_cents: i64,
    pub status: BookingStatus,
    pub checkout_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookingResponse {
    #[serde(flatten)]
    pub booking: Booking,
    pub checkout_url: Option<String>,
}

fn validate_future(time: &DateTime<Utc>) -> Result<(), ValidationError> {
    if *time <= Utc::now() {
        return Err(ValidationError::new("must_be_in_future"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpsertCoachProfileRequest {
    #[validate(length(min = 3, max = 120))]
    pub headline: String,
    #[validate(length(max = 2000))]
    pub bio: Option<String>,
    #[validate(length(min = 1, max = 10))]
    pub games: Vec<String>,
    #[validate(range(min = 500, max = 100000))]
    pub hourly_rate_cents: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub coach_id: Uuid,
    #[validate(custom(function = "validate_future"))]
    pub scheduled_at: DateTime<Utc>,
    #[validate(range(min = 30, max = 240))]
    pub duration_minutes: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateBookingRequest {
    pub status: BookingStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateReviewRequest {
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,
    #[validate(length(max = 1000))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoachListQuery {
    pub game: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_session_price() {
        assert_eq!(session_price_cents(6000, 60), 6000);
        assert_eq!(session_price_cents(6000, 90), 9000);
        assert_eq!(session_price_cents(2500, 45), 1875);
        assert_eq!(session_price_cents(1001, 30), 500);
    }

    #[test]
    fn test_student_may_only_cancel() {
        use BookingStatus::*;
        assert!(booking_transition_allowed(BookingParty::Student, Requested, Cancelled));
        assert!(!booking_transition_allowed(BookingParty::Student, Requested, Confirmed));
        assert!(!booking_transition_allowed(BookingParty::Student, Confirmed, Completed));
    }

    #[test]
    fn test_coach_transitions() {
        use BookingStatus::*;
        assert!(booking_transition_allowed(BookingParty::Coach, Requested, Confirmed));
        assert!(booking_transition_allowed(BookingParty::Coach, Confirmed, Completed));
        assert!(!booking_transition_allowed(BookingParty::Coach, Requested, Completed));
        assert!(!booking_transition_allowed(BookingParty::Coach, Completed, Cancelled));
        assert!(!booking_transition_allowed(BookingParty::Coach, Cancelled, Confirmed));
    }

    #[test]
    fn test_rating_bounds() {
        for rating in [0, 6] {
            let req = CreateReviewRequest { rating, comment: None };
            assert!(req.validate().is_err());
        }
        let req = CreateReviewRequest { rating: 5, comment: Some("Great VOD review".into()) };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_booking_must_be_in_future() {
        let req = CreateBookingRequest {
            coach_id: Uuid::new_v4(),
            scheduled_at: Utc::now() - Duration::hours(1),
            duration_minutes: 60,
        };
        assert!(req.validate().is_err());

        let req = CreateBookingRequest {
            scheduled_at: Utc::now() + Duration::days(1),
            ..req
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_hourly_rate_bounds() {
        let req = UpsertCoachProfileRequest {
            headline: "Immortal Valorant coach".to_string(),
            bio: None,
            games: vec!["Valorant".to_string()],
            hourly_rate_cents: 499,
            is_active: true,
        };
        assert!(req.validate().is_err());
    }
}
