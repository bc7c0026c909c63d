use std::collections::HashSet;
use std::time::Instant;

use chrono::NaiveDate;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::api::{RoomSlotsRecord, SharedApi};
use crate::limits::MAX_RESOURCES_PER_FETCH;
use crate::model::*;
use crate::observability;

/// Result of one slot fetch.
///
/// A failed fetch still carries an (empty) slot list so the calendar renders an
/// empty day; `failed` lets callers tell it apart from a genuinely empty day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOutcome {
    pub slots: Vec<Slot>,
    pub failed: bool,
}

impl FetchOutcome {
    pub fn loaded(slots: Vec<Slot>) -> Self {
        Self { slots, failed: false }
    }

    pub fn failed() -> Self {
        Self {
            slots: Vec::new(),
            failed: true,
        }
    }
}

/// Turns `(rooms, date)` into normalized, display-ready slots.
pub struct SlotFetcher {
    api: SharedApi,
}

impl SlotFetcher {
    pub fn new(api: SharedApi) -> Self {
        Self { api }
    }

    /// Returns `None` without touching the network when there is nothing to fetch.
    pub async fn fetch(&self, resource_ids: &[ResourceId], date: Option<NaiveDate>) -> Option<FetchOutcome> {
        let date = date?;
        if resource_ids.is_empty() {
            return None;
        }

        let day_start = moscow_day_start(date);
        let started = Instant::now();
        let responses = join_all(
            resource_ids
                .chunks(MAX_RESOURCES_PER_FETCH)
                .map(|chunk| self.api.empty_slots(chunk, day_start)),
        )
        .await;
        metrics::histogram!(observability::SLOT_FETCH_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        let mut records = Vec::new();
        for response in responses {
            match response {
                Ok(batch) => records.extend(batch),
                Err(e) => {
                    warn!("slot fetch for {date} failed, showing empty day: {e}");
                    metrics::counter!(observability::SLOT_FETCHES_TOTAL, "status" => "error").increment(1);
                    return Some(FetchOutcome::failed());
                }
            }
        }

        metrics::counter!(observability::SLOT_FETCHES_TOTAL, "status" => "ok").increment(1);
        let slots = normalize(resource_ids, records);
        debug!("fetched {} slots for {} rooms on {date}", slots.len(), resource_ids.len());
        Some(FetchOutcome::loaded(slots))
    }
}

/// Keep available slots of requested rooms, drop malformed and duplicate
/// records, and order by start time then room.
pub fn normalize(resource_ids: &[ResourceId], records: Vec<RoomSlotsRecord>) -> Vec<Slot> {
    let requested: HashSet<&str> = resource_ids.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    let mut slots = Vec::new();

    for room in records {
        if !requested.contains(room.room_id.as_str()) {
            warn!("ignoring slots for unrequested room {}", room.room_id);
            continue;
        }
        for record in room.slots {
            if !record.is_available {
                continue;
            }
            let id = record.id.clone();
            let Some(slot) = record.into_slot(&room.room_id) else {
                warn!("ignoring slot {id} with empty time window");
                continue;
            };
            if seen.insert(slot.id.clone()) {
                slots.push(slot);
            }
        }
    }

    slots.sort_by(|a, b| {
        a.span
            .start
            .cmp(&b.span.start)
            .then_with(|| a.resource_id.cmp(&b.resource_id))
            .then_with(|| a.id.cmp(&b.id))
    });
    slots
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, FixedOffset};

    use super::*;
    use crate::api::*;

    fn record(id: &str, start: &str, end: &str, free: i64, available: bool) -> SlotRecord {
        SlotRecord {
            id: id.into(),
            start: start.parse().unwrap(),
            end: end.parse().unwrap(),
            capacity: 10,
            free_places: free,
            is_available: available,
        }
    }

    #[derive(Default)]
    struct FakeApi {
        fail: bool,
        calls: Mutex<Vec<(Vec<String>, String)>>,
    }

    #[async_trait]
    impl SchedulingApi for FakeApi {
        async fn facilities(&self) -> Result<Vec<FacilityRecord>, ApiError> {
            Ok(vec![])
        }

        async fn empty_slots(
            &self,
            room_ids: &[String],
            day_start: DateTime<FixedOffset>,
        ) -> Result<Vec<RoomSlotsRecord>, ApiError> {
            self.calls
                .lock()
                .unwrap()
                .push((room_ids.to_vec(), day_start.to_rfc3339()));
            if self.fail {
                return Err(ApiError::Status(502));
            }
            Ok(room_ids
                .iter()
                .map(|room| RoomSlotsRecord {
                    room_id: room.clone(),
                    slots: vec![
                        record(
                            &format!("{room}-a"),
                            "2024-05-01T10:00:00+03:00",
                            "2024-05-01T11:00:00+03:00",
                            3,
                            true,
                        ),
                        record(
                            &format!("{room}-b"),
                            "2024-05-01T09:00:00+03:00",
                            "2024-05-01T10:00:00+03:00",
                            0,
                            false,
                        ),
                    ],
                })
                .collect())
        }

        async fn appointments_by_slot(&self, _slot_id: &str) -> Result<Vec<AppointmentRecord>, ApiError> {
            Ok(vec![])
        }

        async fn create_booking(&self, _input: &BookingInput) -> Result<BookingPayload, ApiError> {
            Err(ApiError::MissingData("CreateBooking"))
        }
    }

    fn may_first() -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2024, 5, 1)
    }

    #[tokio::test]
    async fn missing_input_is_noop() {
        let api = Arc::new(FakeApi::default());
        let fetcher = SlotFetcher::new(api.clone());

        assert!(fetcher.fetch(&[], may_first()).await.is_none());
        assert!(fetcher.fetch(&["r1".into()], None).await.is_none());
        assert!(api.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_filters_unavailable_and_sends_moscow_day() {
        let api = Arc::new(FakeApi::default());
        let fetcher = SlotFetcher::new(api.clone());

        let outcome = fetcher
            .fetch(&["r2".into(), "r1".into()], may_first())
            .await
            .unwrap();
        assert!(!outcome.failed);
        let ids: Vec<_> = outcome.slots.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["r1-a", "r2-a"]);

        let calls = api.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, "2024-05-01T00:00:00+03:00");
    }

    #[tokio::test]
    async fn failure_yields_empty_failed_outcome() {
        let api = Arc::new(FakeApi {
            fail: true,
            ..Default::default()
        });
        let fetcher = SlotFetcher::new(api);

        let outcome = fetcher.fetch(&["r1".into()], may_first()).await.unwrap();
        assert!(outcome.failed);
        assert!(outcome.slots.is_empty());
    }

    #[tokio::test]
    async fn large_room_lists_are_chunked() {
        let api = Arc::new(FakeApi::default());
        let fetcher = SlotFetcher::new(api.clone());
        let rooms: Vec<String> = (0..MAX_RESOURCES_PER_FETCH + 1).map(|i| format!("r{i}")).collect();

        let outcome = fetcher.fetch(&rooms, may_first()).await.unwrap();
        assert_eq!(outcome.slots.len(), MAX_RESOURCES_PER_FETCH + 1);
        assert_eq!(api.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn normalize_drops_duplicates_and_foreign_rooms() {
        let dup = record("s1", "2024-05-01T10:00:00+03:00", "2024-05-01T11:00:00+03:00", 3, true);
        let records = vec![
            RoomSlotsRecord {
                room_id: "r1".into(),
                slots: vec![dup.clone(), dup.clone()],
            },
            RoomSlotsRecord {
                room_id: "other".into(),
                slots: vec![record("x", "2024-05-01T08:00:00+03:00", "2024-05-01T09:00:00+03:00", 1, true)],
            },
        ];
        let slots = normalize(&["r1".into()], records);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].id, "s1");
        assert_eq!(slots[0].resource_id, "r1");
    }
}
