use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use tokio_test::{assert_err, assert_ok};

use arenaslot::api::*;
use arenaslot::booking::{BookingError, BookingFlow, BookingRequest};
use arenaslot::config::{AppConfig, AppContext};
use arenaslot::fetcher::SlotFetcher;
use arenaslot::model::{NotificationLevel, Phase};
use arenaslot::notify::ViewHub;
use arenaslot::picker::SlotPicker;
use arenaslot::schedule::ScheduleHandle;

// ── Test infrastructure ──────────────────────────────────────

/// In-memory backend: one facility, one room, two morning slots.
/// Slot S has capacity 10 with 7 live appointments.
struct Backend {
    appointments: Mutex<HashMap<String, Vec<AppointmentRecord>>>,
    bookings: Mutex<Vec<BookingInput>>,
    reject_with: Option<String>,
}

impl Backend {
    fn new() -> Arc<Self> {
        Self::build(None)
    }

    fn rejecting(message: &str) -> Arc<Self> {
        Self::build(Some(message.to_string()))
    }

    fn build(reject_with: Option<String>) -> Arc<Self> {
        let mut appointments = HashMap::new();
        let mut taken: Vec<AppointmentRecord> = (0..7).map(|i| appointment(i, "S", BookingStatus::Confirmed)).collect();
        taken.push(appointment(99, "S", BookingStatus::Cancelled));
        appointments.insert("S".to_string(), taken);
        Arc::new(Self {
            appointments: Mutex::new(appointments),
            bookings: Mutex::new(Vec::new()),
            reject_with,
        })
    }
}

fn appointment(n: usize, slot_id: &str, status: BookingStatus) -> AppointmentRecord {
    AppointmentRecord {
        id: format!("a{n}"),
        slot_id: slot_id.to_string(),
        status: Some(status),
    }
}

fn slot_record(id: &str, hour: u32, free_places: i64) -> SlotRecord {
    SlotRecord {
        id: id.to_string(),
        start: format!("2024-05-01T{hour:02}:00:00+03:00").parse().unwrap(),
        end: format!("2024-05-01T{:02}:00:00+03:00", hour + 1).parse().unwrap(),
        capacity: 10,
        free_places,
        is_available: true,
    }
}

#[async_trait]
impl SchedulingApi for Backend {
    async fn facilities(&self) -> Result<Vec<FacilityRecord>, ApiError> {
        Ok(vec![FacilityRecord {
            id: "F".into(),
            title: "Arena".into(),
            rooms: vec![RoomRecord {
                id: "R".into(),
                title: "Court 1".into(),
                is_active: true,
            }],
        }])
    }

    async fn empty_slots(
        &self,
        room_ids: &[String],
        _day_start: DateTime<FixedOffset>,
    ) -> Result<Vec<RoomSlotsRecord>, ApiError> {
        Ok(room_ids
            .iter()
            .filter(|id| id.as_str() == "R")
            .map(|id| RoomSlotsRecord {
                room_id: id.clone(),
                slots: vec![slot_record("S", 10, 3), slot_record("S2", 11, 5)],
            })
            .collect())
    }

    async fn appointments_by_slot(&self, slot_id: &str) -> Result<Vec<AppointmentRecord>, ApiError> {
        Ok(self
            .appointments
            .lock()
            .unwrap()
            .get(slot_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_booking(&self, input: &BookingInput) -> Result<BookingPayload, ApiError> {
        if let Some(message) = &self.reject_with {
            return Ok(BookingPayload {
                booking: None,
                errors: vec![FieldError {
                    field: Some("slotIds".into()),
                    message: message.clone(),
                }],
            });
        }
        let mut appointments = self.appointments.lock().unwrap();
        for slot_id in &input.slot_ids {
            let list = appointments.entry(slot_id.clone()).or_default();
            let n = 100 + list.len();
            list.push(appointment(n, slot_id, input.status));
        }
        self.bookings.lock().unwrap().push(input.clone());
        Ok(BookingPayload {
            booking: Some(BookingRecord {
                id: "B1".into(),
                status: input.status,
                slot_ids: input.slot_ids.clone(),
            }),
            errors: vec![],
        })
    }
}

async fn start(backend: Arc<Backend>) -> (ScheduleHandle, BookingFlow) {
    let config = AppConfig::from_lookup(|_| None).unwrap();
    let ctx = AppContext::with_api(config, backend);
    let catalog = ctx.catalog().facilities().await.unwrap();
    let schedule = ScheduleHandle::spawn(
        catalog,
        Arc::new(SlotFetcher::new(ctx.api())),
        Arc::new(ViewHub::new()),
    );
    let booking = BookingFlow::new(ctx.api(), schedule.clone());

    schedule.set_facility("F").await.unwrap();
    schedule
        .set_date(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
        .await
        .unwrap();
    schedule.wait_for(|v| v.phase == Phase::Loaded).await.unwrap();
    (schedule, booking)
}

fn request(extra: Vec<String>) -> BookingRequest {
    BookingRequest {
        client: "+7 (999) 123-45-67".into(),
        primary_slot: "S".into(),
        extra_slots: extra,
        aggregator_id: "front-desk".into(),
        status: BookingStatus::Confirmed,
    }
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn book_a_slot_end_to_end() {
    let (schedule, booking) = start(Backend::new()).await;
    let mut toasts = schedule.hub().subscribe_notifications();

    let view = schedule.view().await.unwrap();
    let slot = view.slot("S").unwrap();
    assert_eq!(slot.label(), "10:00 - 11:00 (3 мест)");

    let modal = schedule.slot_clicked("S").await.unwrap();
    assert_eq!(modal.occupied_places, 7);
    assert_eq!(modal.room_title, "Court 1");
    assert_eq!(modal.facility_title, "Arena");

    schedule.open_booking_form().await.unwrap();
    let confirmation = assert_ok!(booking.submit(&request(vec![])).await);
    assert_eq!(confirmation.booking_id, "B1");
    assert_eq!(confirmation.slot_ids, vec!["S"]);

    let toast = toasts.try_recv().unwrap();
    assert_eq!(toast.level, NotificationLevel::Success);

    // Form is done but the modal stays up for the occupancy refresh.
    let modal = schedule.view().await.unwrap().modal.unwrap();
    assert!(!modal.form_open);
    assert_eq!(modal.occupied_places, 7);

    assert_eq!(schedule.capacity_updated("S", 2).await.unwrap(), 2);
    let view = schedule.view().await.unwrap();
    assert_eq!(view.modal.as_ref().unwrap().occupied_places, 8);
    assert_eq!(view.slot("S").unwrap().label(), "10:00 - 11:00 (2 мест)");
}

#[tokio::test]
async fn occupancy_refresh_counts_live_appointments() {
    let backend = Backend::new();
    let (schedule, booking) = start(backend.clone()).await;

    schedule.slot_clicked("S").await.unwrap();
    schedule.open_booking_form().await.unwrap();
    booking.submit_and_refresh(&request(vec![])).await.unwrap();

    // 7 confirmed + 1 new; the cancelled one does not count.
    let view = schedule.view().await.unwrap();
    assert_eq!(view.slot("S").unwrap().free_places, 2);
    assert_eq!(view.modal.as_ref().unwrap().occupied_places, 8);
    assert_eq!(backend.bookings.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn extra_slots_from_picker_are_booked_together() {
    let backend = Backend::new();
    let (schedule, booking) = start(backend.clone()).await;

    let modal = schedule.slot_clicked("S").await.unwrap();
    let mut picker = SlotPicker::from_modal(&modal);
    picker.begin_edit();
    assert!(picker.toggle("S2"));
    picker.confirm();
    assert_eq!(picker.additional(), vec!["S2"]);

    schedule.open_booking_form().await.unwrap();
    let confirmation = booking.submit(&request(picker.additional())).await.unwrap();
    assert_eq!(confirmation.slot_ids, vec!["S", "S2"]);

    let bookings = backend.bookings.lock().unwrap();
    assert_eq!(bookings[0].slot_ids, vec!["S", "S2"]);
    assert_eq!(bookings[0].client.phone.as_deref(), Some("79991234567"));
}

#[tokio::test]
async fn rejected_booking_shows_one_error_toast() {
    let (schedule, booking) = start(Backend::rejecting("slot is full")).await;
    let mut toasts = schedule.hub().subscribe_notifications();

    schedule.slot_clicked("S").await.unwrap();
    schedule.open_booking_form().await.unwrap();
    let err = assert_err!(booking.submit(&request(vec![])).await);
    assert!(matches!(err, BookingError::Rejected(_)));

    let toast = toasts.try_recv().unwrap();
    assert_eq!(toast.level, NotificationLevel::Error);
    assert!(toast.message.contains("slot is full"));
    assert!(toasts.try_recv().is_err());

    // The form stays open so the user can fix and resubmit.
    assert!(schedule.view().await.unwrap().modal.unwrap().form_open);
}

#[tokio::test]
async fn invalid_form_is_reported_inline_only() {
    let backend = Backend::new();
    let (schedule, booking) = start(backend.clone()).await;
    let mut toasts = schedule.hub().subscribe_notifications();

    schedule.slot_clicked("S").await.unwrap();
    let mut req = request(vec![]);
    req.client = String::new();
    let err = assert_err!(booking.submit(&req).await);
    assert!(matches!(err, BookingError::Validation { field: "client", .. }));

    assert!(toasts.try_recv().is_err());
    assert!(backend.bookings.lock().unwrap().is_empty());
}
