//! Typed contracts for the facility-scheduling GraphQL API.
//!
//! Every query has explicit request and response shapes; records are converted
//! into the crate's model types at this boundary so nothing downstream relies on
//! the wire layout.

mod cache;
mod error;
mod graphql;

pub use cache::CatalogCache;
pub use error::ApiError;
pub use graphql::GraphqlClient;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::model::*;

pub type SharedApi = Arc<dyn SchedulingApi>;

#[async_trait]
pub trait SchedulingApi: Send + Sync {
    /// Facility catalog with rooms.
    async fn facilities(&self) -> Result<Vec<FacilityRecord>, ApiError>;

    /// Free slots per room for the day starting at `day_start`.
    async fn empty_slots(
        &self,
        room_ids: &[ResourceId],
        day_start: DateTime<FixedOffset>,
    ) -> Result<Vec<RoomSlotsRecord>, ApiError>;

    /// Bookings referencing one slot.
    async fn appointments_by_slot(&self, slot_id: &str) -> Result<Vec<AppointmentRecord>, ApiError>;

    async fn create_booking(&self, input: &BookingInput) -> Result<BookingPayload, ApiError>;
}

// ── Catalog ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRecord {
    pub id: String,
    pub title: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilityRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub rooms: Vec<RoomRecord>,
}

impl From<FacilityRecord> for Facility {
    fn from(record: FacilityRecord) -> Self {
        Facility {
            id: record.id,
            title: record.title,
            resources: record
                .rooms
                .into_iter()
                .map(|room| Resource {
                    id: room.id,
                    title: room.title,
                    active: room.is_active,
                })
                .collect(),
        }
    }
}

// ── Slots ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotRecord {
    pub id: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub capacity: u32,
    /// Signed: the backend is not trusted to keep it in range.
    pub free_places: i64,
    pub is_available: bool,
}

impl SlotRecord {
    /// Convert into a model slot owned by `resource_id`.
    /// Returns `None` for an empty or inverted time window.
    pub fn into_slot(self, resource_id: &str) -> Option<Slot> {
        let start = self.start.timestamp_millis();
        let end = self.end.timestamp_millis();
        if start >= end {
            return None;
        }
        let free_places = self.free_places.clamp(0, i64::from(self.capacity)) as u32;
        Some(Slot {
            id: self.id,
            resource_id: resource_id.to_string(),
            span: Span::new(start, end),
            capacity: self.capacity,
            free_places,
            available: self.is_available,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSlotsRecord {
    pub room_id: String,
    #[serde(default)]
    pub slots: Vec<SlotRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRecord {
    pub id: String,
    pub slot_id: String,
    #[serde(default)]
    pub status: Option<BookingStatus>,
}

// ── Booking mutation ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Paid,
    Cancelled,
}

/// Exactly one of the two fields is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snils: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingInput {
    pub slot_ids: Vec<String>,
    pub client: ClientInput,
    pub aggregator_id: String,
    pub status: BookingStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRecord {
    pub id: String,
    pub status: BookingStatus,
    #[serde(default)]
    pub slot_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    #[serde(default)]
    pub field: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingPayload {
    #[serde(default)]
    pub booking: Option<BookingRecord>,
    #[serde(default)]
    pub errors: Vec<FieldError>,
}
