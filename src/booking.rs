use futures::future::join_all;
use tracing::{info, warn};

use crate::api::{ApiError, BookingInput, BookingStatus, ClientInput, FieldError, SharedApi};
use crate::client_id::{self, ClientId};
use crate::limits::{MAX_AGGREGATOR_ID_LEN, MAX_SLOTS_PER_BOOKING};
use crate::model::{Notification, SlotId};
use crate::observability;
use crate::schedule::{ScheduleError, ScheduleHandle};

/// What the booking form submits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    /// Phone number or SNILS as typed.
    pub client: String,
    pub primary_slot: SlotId,
    /// Extra same-day slots picked in the slot picker.
    pub extra_slots: Vec<SlotId>,
    pub aggregator_id: String,
    pub status: BookingStatus,
}

impl BookingRequest {
    /// Primary slot first, then extras, without duplicates.
    pub fn slot_ids(&self) -> Vec<SlotId> {
        let mut ids: Vec<SlotId> = Vec::with_capacity(1 + self.extra_slots.len());
        for id in std::iter::once(&self.primary_slot).chain(&self.extra_slots) {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }

    /// Check required fields and build the mutation input.
    pub fn validate(&self) -> Result<BookingInput, BookingError> {
        if self.primary_slot.trim().is_empty() {
            return Err(BookingError::invalid("slot", "no slot selected"));
        }
        let slot_ids = self.slot_ids();
        if slot_ids.len() > MAX_SLOTS_PER_BOOKING {
            return Err(BookingError::invalid(
                "slots",
                format!("at most {MAX_SLOTS_PER_BOOKING} slots per booking"),
            ));
        }

        let client = client_id::classify(&self.client).map_err(|e| BookingError::invalid("client", e.to_string()))?;

        let aggregator_id = self.aggregator_id.trim();
        if aggregator_id.is_empty() {
            return Err(BookingError::invalid("aggregator", "aggregator is required"));
        }
        if aggregator_id.len() > MAX_AGGREGATOR_ID_LEN {
            return Err(BookingError::invalid("aggregator", "aggregator id too long"));
        }

        Ok(BookingInput {
            slot_ids,
            client: client_input(client),
            aggregator_id: aggregator_id.to_string(),
            status: self.status,
        })
    }
}

fn client_input(client: ClientId) -> ClientInput {
    match client {
        ClientId::Snils(digits) => ClientInput {
            phone: None,
            snils: Some(digits),
        },
        ClientId::Phone(digits) => ClientInput {
            phone: Some(digits),
            snils: None,
        },
    }
}

#[derive(Debug)]
pub enum BookingError {
    /// A form field is missing or malformed; shown inline, never as a toast.
    Validation { field: &'static str, message: String },
    /// The backend answered with mutation-level errors.
    Rejected(Vec<FieldError>),
    Api(ApiError),
    Schedule(ScheduleError),
}

impl BookingError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        BookingError::Validation {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::Validation { field, message } => write!(f, "{field}: {message}"),
            BookingError::Rejected(errors) => {
                let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
                write!(f, "booking rejected: {}", messages.join("; "))
            }
            BookingError::Api(e) => write!(f, "booking failed: {e}"),
            BookingError::Schedule(e) => write!(f, "booking failed: {e}"),
        }
    }
}

impl std::error::Error for BookingError {}

impl From<ApiError> for BookingError {
    fn from(e: ApiError) -> Self {
        BookingError::Api(e)
    }
}

impl From<ScheduleError> for BookingError {
    fn from(e: ScheduleError) -> Self {
        BookingError::Schedule(e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingConfirmation {
    pub booking_id: String,
    pub status: BookingStatus,
    pub slot_ids: Vec<SlotId>,
}

/// Turns a booking form submission into one reservation and reconciles the result.
pub struct BookingFlow {
    api: SharedApi,
    schedule: ScheduleHandle,
}

impl BookingFlow {
    pub fn new(api: SharedApi, schedule: ScheduleHandle) -> Self {
        Self { api, schedule }
    }

    /// Submit one reservation covering every selected slot. No retries.
    ///
    /// Validation errors come back without a toast; submission failures publish
    /// one error toast. Success leaves the form and publishes a success toast,
    /// but does not touch slot capacity; see [`BookingFlow::refresh_occupancy`].
    pub async fn submit(&self, request: &BookingRequest) -> Result<BookingConfirmation, BookingError> {
        let input = match request.validate() {
            Ok(input) => input,
            Err(e) => {
                metrics::counter!(observability::BOOKINGS_TOTAL, "status" => "invalid").increment(1);
                return Err(e);
            }
        };

        let outcome = match self.api.create_booking(&input).await {
            Ok(payload) if payload.errors.is_empty() => payload.booking.ok_or_else(|| {
                BookingError::Rejected(vec![FieldError {
                    field: None,
                    message: "no booking returned".into(),
                }])
            }),
            Ok(payload) => Err(BookingError::Rejected(payload.errors)),
            Err(e) => Err(BookingError::Api(e)),
        };

        let hub = self.schedule.hub();
        match outcome {
            Ok(record) => {
                metrics::counter!(observability::BOOKINGS_TOTAL, "status" => "ok").increment(1);
                info!("booking {} created for {} slots", record.id, input.slot_ids.len());
                self.schedule.booking_succeeded().await?;
                hub.notify(Notification::success(format!("Booking {} created", record.id)));
                Ok(BookingConfirmation {
                    booking_id: record.id,
                    status: record.status,
                    slot_ids: input.slot_ids,
                })
            }
            Err(e) => {
                metrics::counter!(observability::BOOKINGS_TOTAL, "status" => "failed").increment(1);
                warn!("booking submission failed: {e}");
                hub.notify(Notification::error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Re-read appointments for `slot_ids` and push the recomputed free places
    /// into the schedule. Returns the stored values; slots that are no longer
    /// shown or whose lookup failed are skipped.
    pub async fn refresh_occupancy(&self, slot_ids: &[SlotId]) -> Result<Vec<(SlotId, u32)>, BookingError> {
        let view = self.schedule.view().await?;
        let targets: Vec<(SlotId, u32)> = slot_ids
            .iter()
            .filter_map(|id| view.slot(id).map(|s| (s.id.clone(), s.capacity)))
            .collect();

        let lookups = join_all(
            targets
                .iter()
                .map(|(id, _)| self.api.appointments_by_slot(id)),
        )
        .await;

        let mut updated = Vec::with_capacity(targets.len());
        for ((slot_id, capacity), lookup) in targets.into_iter().zip(lookups) {
            let appointments = match lookup {
                Ok(list) => list,
                Err(e) => {
                    warn!("occupancy refresh for slot {slot_id} failed: {e}");
                    continue;
                }
            };
            let taken = appointments
                .iter()
                .filter(|a| a.status != Some(BookingStatus::Cancelled))
                .count() as i64;
            match self
                .schedule
                .capacity_updated(slot_id.clone(), i64::from(capacity) - taken)
                .await
            {
                Ok(free) => updated.push((slot_id, free)),
                // Selection changed while the lookup ran.
                Err(ScheduleError::SlotNotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(updated)
    }

    /// Submit, then run the occupancy refresh for the booked slots.
    pub async fn submit_and_refresh(&self, request: &BookingRequest) -> Result<BookingConfirmation, BookingError> {
        let confirmation = self.submit(request).await?;
        self.refresh_occupancy(&confirmation.slot_ids).await?;
        Ok(confirmation)
    }
}
