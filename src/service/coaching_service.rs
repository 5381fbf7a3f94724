use crate::api_error::ApiError;
use crate::db::DbPool;
use crate::models::coaching::{
    booking_transition_allowed, session_price_cents, Booking, BookingParty, BookingResponse,
    BookingStatus, CoachDetailResponse, CoachListItem, CoachListQuery, CoachProfile, CoachRating,
    CoachReview, CreateBookingRequest, CreateReviewRequest, UpdateBookingRequest,
    UpsertCoachProfileRequest,
};
use crate::service::billing_service::{BillingService, CheckoutItem, CheckoutKind};
use crate::service::user_service::fetch_user_summaries;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

const LATEST_REVIEWS: i64 = 20;
const COACH_LIST_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct CoachingService {
    db_pool: DbPool,
    billing: BillingService,
}

impl CoachingService {
    pub fn new(db_pool: DbPool, billing: BillingService) -> Self {
        Self { db_pool, billing }
    }

    // ========================================================================
    // COACHES
    // ========================================================================

    pub async fn list_coaches(&self, filter: &CoachListQuery) -> Result<Vec<CoachListItem>, ApiError> {
        let profiles = sqlx::query_as::<_, CoachProfile>(
            r#"
            SELECT * FROM coach_profiles
            WHERE is_active AND ($1::TEXT IS NULL OR $1 = ANY(games))
            ORDER BY updated_at DESC
            LIMIT $2
            "#,
        )
        .bind(&filter.game)
        .bind(COACH_LIST_LIMIT)
        .fetch_all(&self.db_pool)
        .await?;

        self.decorate(profiles).await
    }

    /// Merge coach usernames and rating aggregates into the profiles.
    async fn decorate(&self, profiles: Vec<CoachProfile>) -> Result<Vec<CoachListItem>, ApiError> {
        let coach_ids: Vec<Uuid> = profiles.iter().map(|p| p.id).collect();
        let user_ids: Vec<Uuid> = profiles.iter().map(|p| p.user_id).collect();

        let ratings: HashMap<Uuid, CoachRating> = sqlx::query_as::<_, CoachRating>(
            r#"
            SELECT coach_id, AVG(rating)::DOUBLE PRECISION AS average_rating, COUNT(*) AS review_count
            FROM coach_reviews
            WHERE coach_id = ANY($1)
            GROUP BY coach_id
            "#,
        )
        .bind(&coach_ids)
        .fetch_all(&self.db_pool)
        .await?
        .into_iter()
        .map(|r| (r.coach_id, r))
        .collect();

        let users = fetch_user_summaries(&self.db_pool, &user_ids).await?;

        Ok(profiles
            .into_iter()
            .map(|profile| {
                let rating = ratings.get(&profile.id);
                CoachListItem {
                    coach: users.get(&profile.user_id).cloned(),
                    average_rating: rating.and_then(|r| r.average_rating),
                    review_count: rating.map(|r| r.review_count).unwrap_or(0),
                    profile,
                }
            })
            .collect())
    }

    pub async fn upsert_profile(
        &self,
        user_id: Uuid,
        request: UpsertCoachProfileRequest,
    ) -> Result<CoachProfile, ApiError> {
        request.validate()?;

        let profile = sqlx::query_as::<_, CoachProfile>(
            r#"
            INSERT INTO coach_profiles (id, user_id, headline, bio, games, hourly_rate_cents, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id) DO UPDATE SET
                headline = EXCLUDED.headline,
                bio = EXCLUDED.bio,
                games = EXCLUDED.games,
                hourly_rate_cents = EXCLUDED.hourly_rate_cents,
                is_active = EXCLUDED.is_active,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(request.headline.trim())
        .bind(&request.bio)
        .bind(&request.games)
        .bind(request.hourly_rate_cents)
        .bind(request.is_active)
        .fetch_one(&self.db_pool)
        .await?;

        info!(coach_id = %profile.id, user_id = %user_id, is_active = profile.is_active, "Coach profile saved");

        Ok(profile)
    }

    pub async fn get_coach(&self, coach_id: Uuid) -> Result<CoachDetailResponse, ApiError> {
        let profile = self.find_coach(coach_id).await?;

        let reviews = sqlx::query_as::<_, CoachReview>(
            "SELECT * FROM coach_reviews WHERE coach_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(coach_id)
        .bind(LATEST_REVIEWS)
        .fetch_all(&self.db_pool)
        .await?;

        let item = self
            .decorate(vec![profile])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::not_found("Coach not found"))?;

        Ok(CoachDetailResponse { item, reviews })
    }

    async fn find_coach(&self, coach_id: Uuid) -> Result<CoachProfile, ApiError> {
        sqlx::query_as::<_, CoachProfile>("SELECT * FROM coach_profiles WHERE id = $1")
            .bind(coach_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Coach not found"))
    }

    // ========================================================================
    // BOOKINGS
    // ========================================================================

    /// Book a session. With billing configured the student pays through Stripe first.
    pub async fn create_booking(
        &self,
        student_id: Uuid,
        request: CreateBookingRequest,
    ) -> Result<BookingResponse, ApiError> {
        request.validate()?;

        let coach = self.find_coach(request.coach_id).await?;
        if !coach.is_active {
            return Err(ApiError::not_found("Coach not found"));
        }
        if coach.user_id == student_id {
            return Err(ApiError::bad_request("You cannot book yourself"));
        }

        let booking_id = Uuid::new_v4();
        let price_cents = session_price_cents(coach.hourly_rate_cents, request.duration_minutes);

        let checkout = if self.billing.is_enabled() {
            let item = CheckoutItem {
                kind: CheckoutKind::CoachingBooking,
                ref_id: booking_id,
                user_id: student_id,
                amount_cents: price_cents,
                product_name: format!("Coaching session: {}", coach.headline),
                return_path: "/coaching/bookings".to_string(),
            };
            Some(self.billing.create_checkout(&item).await?)
        } else {
            None
        };

        let status = if checkout.is_some() {
            BookingStatus::PendingPayment
        } else {
            BookingStatus::Requested
        };

        let booking = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO coaching_bookings
                (id, coach_id, student_id, scheduled_at, duration_minutes, price_cents, status, checkout_session_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(booking_id)
        .bind(coach.id)
        .bind(student_id)
        .bind(request.scheduled_at)
        .bind(request.duration_minutes)
        .bind(price_cents)
        .bind(status)
        .bind(checkout.as_ref().map(|c| c.id.as_str()))
        .fetch_one(&self.db_pool)
        .await?;

        info!(
            booking_id = %booking.id,
            coach_id = %coach.id,
            student_id = %student_id,
            price_cents = price_cents,
            status = ?booking.status,
            "Coaching session booked"
        );

        Ok(BookingResponse {
            booking,
            checkout_url: checkout.map(|c| c.url),
        })
    }

    /// Bookings where the user is the student or the coach.
    pub async fn list_bookings(&self, user_id: Uuid) -> Result<Vec<Booking>, ApiError> {
        let bookings = sqlx::query_as::<_, Booking>(
            r#"
            SELECT b.* FROM coaching_bookings b
            JOIN coach_profiles c ON c.id = b.coach_id
            WHERE b.student_id = $1 OR c.user_id = $1
            ORDER BY b.scheduled_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(bookings)
    }

    pub async fn update_booking(
        &self,
        booking_id: Uuid,
        user_id: Uuid,
        request: UpdateBookingRequest,
    ) -> Result<Booking, ApiError> {
        let mut tx = self.db_pool.begin().await?;

        let booking = sqlx::query_as::<_, Booking>(
            "SELECT * FROM coaching_bookings WHERE id = $1 FOR UPDATE",
        )
        .bind(booking_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Booking not found"))?;

        let coach_user_id: Uuid =
            sqlx::query_scalar("SELECT user_id FROM coach_profiles WHERE id = $1")
                .bind(booking.coach_id)
                .fetch_one(&mut *tx)
                .await?;

        let party = if coach_user_id == user_id {
            BookingParty::Coach
        } else if booking.student_id == user_id {
            BookingParty::Student
        } else {
            return Err(ApiError::not_found("Booking not found"));
        };

        if !booking_transition_allowed(party, booking.status, request.status) {
            return Err(ApiError::forbidden(format!(
                "Cannot move booking from {:?} to {:?}",
                booking.status, request.status
            )));
        }

        let updated = sqlx::query_as::<_, Booking>(
            "UPDATE coaching_bookings SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(booking_id)
        .bind(request.status)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(booking_id = %booking_id, user_id = %user_id, party = ?party, status = ?updated.status, "Booking updated");

        Ok(updated)
    }

    // ========================================================================
    // REVIEWS
    // ========================================================================

    /// One review per student per coach; resubmitting replaces it.
    pub async fn review_coach(
        &self,
        coach_id: Uuid,
        student_id: Uuid,
        request: CreateReviewRequest,
    ) -> Result<CoachReview, ApiError> {
        request.validate()?;

        self.find_coach(coach_id).await?;

        let has_session: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM coaching_bookings
                WHERE coach_id = $1 AND student_id = $2 AND status = $3
            )
            "#,
        )
        .bind(coach_id)
        .bind(student_id)
        .bind(BookingStatus::Completed)
        .fetch_one(&self.db_pool)
        .await?;

        if !has_session {
            return Err(ApiError::forbidden(
                "You can only review coaches after a completed session",
            ));
        }

        let review = sqlx::query_as::<_, CoachReview>(
            r#"
            INSERT INTO coach_reviews (id, coach_id, student_id, rating, comment)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (coach_id, student_id) DO UPDATE SET
                rating = EXCLUDED.rating,
                comment = EXCLUDED.comment,
                created_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(coach_id)
        .bind(student_id)
        .bind(request.rating)
        .bind(&request.comment)
        .fetch_one(&self.db_pool)
        .await?;

        info!(coach_id = %coach_id, student_id = %student_id, rating = review.rating, "Coach reviewed");

        Ok(review)
    }
}
