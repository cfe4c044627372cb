// Booking accessor: booking form submission, per-user history and the
// agent back-office status changes

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;
use thiserror::Error;
use tracing::info;

use crate::{
    catalog::discounted_price,
    models::{Booking, BookingStatus, EntityId, PaymentStatus, Tour},
    repository::{AccessError, Query, Repository, Synced},
};

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("A booking needs at least one person")]
    InvalidPersons,

    #[error("Cannot move booking from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("Payment is already {0}")]
    InvalidPayment(PaymentStatus),

    #[error(transparent)]
    Access(#[from] AccessError),
}

impl BookingStatus {
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Completed)
        )
    }
}

// What the booking form submits
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: EntityId,
    pub tour_id: EntityId,
    pub persons: u32,
    pub travel_date: NaiveDate,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub special_requests: Option<String>,
}

impl NewBooking {
    pub fn new(user_id: EntityId, tour_id: EntityId, persons: u32, travel_date: NaiveDate) -> Self {
        Self {
            user_id,
            tour_id,
            persons,
            travel_date,
            contact_name: None,
            contact_email: None,
            contact_phone: None,
            special_requests: None,
        }
    }
}

// Discounted unit price times head count
pub fn booking_total(tour: &Tour, persons: u32) -> f64 {
    discounted_price(tour) * persons as f64
}

// Timestamp-suffixed, not unique across concurrent writers
pub fn generate_booking_number(now: DateTime<Utc>) -> String {
    format!("BK-{}", now.timestamp_millis())
}

#[derive(Clone)]
pub struct BookingService {
    bookings: Repository<Booking>,
    tours: Repository<Tour>,
}

impl BookingService {
    pub fn new(bookings: Repository<Booking>, tours: Repository<Tour>) -> Self {
        Self { bookings, tours }
    }

    // Not idempotent: submitting the same form twice books twice
    pub async fn create_booking(&self, request: NewBooking) -> Result<Synced<Booking>, BookingError> {
        if request.persons == 0 {
            return Err(BookingError::InvalidPersons);
        }

        let tour = self.tours.get(&request.tour_id).await?.into_inner();
        let now = Utc::now();

        let booking = Booking {
            id: None,
            user_id: request.user_id,
            tour_id: request.tour_id,
            booking_number: generate_booking_number(now),
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            persons: request.persons,
            total_price: booking_total(&tour, request.persons),
            travel_date: request.travel_date,
            booking_date: now,
            tour_title: tour.title.clone(),
            tour_image: tour.image.clone(),
            contact_name: request.contact_name,
            contact_email: request.contact_email,
            contact_phone: request.contact_phone,
            special_requests: request.special_requests,
        };

        let created = self.bookings.create(booking).await?;
        info!(
            booking_number = %created.data.booking_number,
            total = created.data.total_price,
            local_only = created.is_local_only(),
            "booking created"
        );
        Ok(created)
    }

    pub async fn list_bookings(&self) -> Result<Synced<Vec<Booking>>, BookingError> {
        Ok(self.bookings.list().await?)
    }

    pub async fn bookings_for_user(&self, user_id: &EntityId) -> Result<Synced<Vec<Booking>>, BookingError> {
        let query = Query::new().filter_eq("userId", user_id);
        Ok(self.bookings.find(&query).await?)
    }

    pub async fn get_booking(&self, id: &EntityId) -> Result<Synced<Booking>, BookingError> {
        Ok(self.bookings.get(id).await?)
    }

    // pending|confirmed -> cancelled, payment refunded
    pub async fn cancel_booking(&self, id: &EntityId) -> Result<Synced<Booking>, BookingError> {
        self.transition(id, BookingStatus::Cancelled, Some(PaymentStatus::Refunded))
            .await
    }

    pub async fn confirm_booking(&self, id: &EntityId) -> Result<Synced<Booking>, BookingError> {
        self.transition(id, BookingStatus::Confirmed, None).await
    }

    pub async fn complete_booking(&self, id: &EntityId) -> Result<Synced<Booking>, BookingError> {
        self.transition(id, BookingStatus::Completed, None).await
    }

    pub async fn mark_paid(&self, id: &EntityId) -> Result<Synced<Booking>, BookingError> {
        let current = self.bookings.get(id).await?.into_inner();
        if current.payment_status != PaymentStatus::Pending || current.status == BookingStatus::Cancelled {
            return Err(BookingError::InvalidPayment(current.payment_status));
        }
        let changes = json!({ "paymentStatus": PaymentStatus::Paid });
        Ok(self.bookings.patch(id, changes).await?)
    }

    pub async fn delete_booking(&self, id: &EntityId) -> Result<Synced<()>, BookingError> {
        Ok(self.bookings.delete(id).await?)
    }

    async fn transition(
        &self,
        id: &EntityId,
        to: BookingStatus,
        payment: Option<PaymentStatus>,
    ) -> Result<Synced<Booking>, BookingError> {
        let current = self.bookings.get(id).await?.into_inner();
        if !current.status.can_transition_to(to) {
            return Err(BookingError::InvalidTransition {
                from: current.status,
                to,
            });
        }

        let mut changes = json!({ "status": to });
        if let Some(payment) = payment {
            changes["paymentStatus"] = json!(payment);
        }

        let updated = self.bookings.patch(id, changes).await?;
        info!(id = %id, from = %current.status, to = %to, "booking status changed");
        Ok(updated)
    }
}
