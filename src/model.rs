use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds, the internal time type. ISO strings only exist at the API edge.
pub type Ms = i64;

pub type FacilityId = String;
pub type ResourceId = String;
pub type SlotId = String;

/// Europe/Moscow has had a fixed UTC+03:00 offset since 2014.
pub const MOSCOW_OFFSET_SECS: i32 = 3 * 3600;

pub fn moscow() -> FixedOffset {
    FixedOffset::east_opt(MOSCOW_OFFSET_SECS).expect("UTC+03:00 is a valid offset")
}

/// Midnight of `date` in Moscow, carrying the explicit offset.
pub fn moscow_day_start(date: NaiveDate) -> DateTime<FixedOffset> {
    let local = date.and_time(NaiveTime::MIN);
    let utc = local - TimeDelta::seconds(i64::from(MOSCOW_OFFSET_SECS));
    DateTime::from_naive_utc_and_offset(utc, moscow())
}

pub fn to_moscow(ms: Ms) -> Option<DateTime<FixedOffset>> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.with_timezone(&moscow()))
}

/// `HH:MM` in Moscow time regardless of the host time zone.
pub fn format_hm(ms: Ms) -> String {
    to_moscow(ms)
        .map(|dt| dt.format("%H:%M").to_string())
        .unwrap_or_default()
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    /// Calendar day of the span start, in Moscow time.
    pub fn moscow_date(&self) -> Option<NaiveDate> {
        to_moscow(self.start).map(|dt| dt.date_naive())
    }
}

/// A bookable room inside a facility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub title: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facility {
    pub id: FacilityId,
    pub title: String,
    pub resources: Vec<Resource>,
}

impl Facility {
    pub fn active_resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(|r| r.active)
    }

    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == id)
    }
}

/// A bookable time window on one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: SlotId,
    pub resource_id: ResourceId,
    pub span: Span,
    pub capacity: u32,
    /// Always within `0..=capacity`.
    pub free_places: u32,
    pub available: bool,
}

impl Slot {
    /// Clamp an arbitrary (possibly negative or oversized) free-place count into `[0, capacity]`.
    pub fn clamp_free(&self, free_places: i64) -> u32 {
        free_places.clamp(0, i64::from(self.capacity)) as u32
    }

    pub fn occupied_places(&self) -> u32 {
        self.capacity - self.free_places
    }

    pub fn is_busy(&self) -> bool {
        self.free_places == 0
    }

    /// `HH:MM - HH:MM`, used for search.
    pub fn time_label(&self) -> String {
        format!("{} - {}", format_hm(self.span.start), format_hm(self.span.end))
    }

    /// Time label plus free places, as shown on the calendar.
    pub fn label(&self) -> String {
        format!("{} ({} мест)", self.time_label(), self.free_places)
    }
}

/// Facility and date the calendar is showing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub facility: Option<FacilityId>,
    pub date: Option<NaiveDate>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.facility.is_none() && self.date.is_none()
    }

    pub fn is_complete(&self) -> bool {
        self.facility.is_some() && self.date.is_some()
    }
}

/// Identifies the selection a load request was issued for.
/// The generation increases on every selection change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSignature {
    pub generation: u64,
    pub selection: Selection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NoSelection,
    SelectionIncomplete,
    Loading,
    Loaded,
}

/// Transient state of the booking modal. Created on slot click, dropped on close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingModalState {
    pub slot: Slot,
    pub room_title: String,
    pub facility_title: String,
    pub occupied_places: u32,
    /// Same-day slots of the same room, including `slot`, ordered by start.
    pub siblings: Vec<Slot>,
    pub form_open: bool,
}

/// Snapshot of the schedule broadcast to observers after each change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleView {
    pub phase: Phase,
    pub selection: Selection,
    /// Active resources of the selected facility.
    pub resources: Vec<Resource>,
    pub slots: Vec<Slot>,
    pub modal: Option<BookingModalState>,
    pub last_fetch_failed: bool,
}

impl ScheduleView {
    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    pub fn slot(&self, id: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationLevel {
    Success,
    Error,
}

/// A user-facing toast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Ulid,
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            id: Ulid::new(),
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            id: Ulid::new(),
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: Ms = 3_600_000;

    fn slot(capacity: u32, free_places: u32) -> Slot {
        // 2024-05-01T07:00:00Z == 10:00 Moscow
        let start = 1_714_546_800_000;
        Slot {
            id: "s1".into(),
            resource_id: "r1".into(),
            span: Span::new(start, start + H),
            capacity,
            free_places,
            available: true,
        }
    }

    #[test]
    fn day_start_is_moscow_midnight() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let start = moscow_day_start(date);
        assert_eq!(start.to_rfc3339(), "2024-05-01T00:00:00+03:00");
        assert_eq!(start.timestamp_millis(), 1_714_510_800_000);
    }

    #[test]
    fn labels_use_moscow_time() {
        let s = slot(10, 3);
        assert_eq!(s.time_label(), "10:00 - 11:00");
        assert_eq!(s.label(), "10:00 - 11:00 (3 мест)");
    }

    #[test]
    fn moscow_date_of_late_utc_evening() {
        // 2024-04-30T22:30:00Z is already May 1st in Moscow
        let span = Span::new(1_714_516_200_000, 1_714_516_200_000 + H);
        assert_eq!(span.moscow_date(), NaiveDate::from_ymd_opt(2024, 5, 1));
    }

    #[test]
    fn clamp_free_bounds() {
        let s = slot(10, 3);
        assert_eq!(s.clamp_free(-4), 0);
        assert_eq!(s.clamp_free(7), 7);
        assert_eq!(s.clamp_free(25), 10);
    }

    #[test]
    fn occupancy_and_busy() {
        assert_eq!(slot(10, 3).occupied_places(), 7);
        assert!(!slot(10, 3).is_busy());
        assert!(slot(10, 0).is_busy());
    }

    #[test]
    fn selection_completeness() {
        let mut sel = Selection::default();
        assert!(sel.is_empty());
        sel.facility = Some("f".into());
        assert!(!sel.is_empty());
        assert!(!sel.is_complete());
        sel.date = NaiveDate::from_ymd_opt(2024, 5, 1);
        assert!(sel.is_complete());
    }
}
