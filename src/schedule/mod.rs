mod error;
mod service;

pub use error::ScheduleError;
pub use service::ScheduleHandle;

use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::fetcher::FetchOutcome;
use crate::model::*;
use crate::observability;

/// A fetch the state machine wants issued. Its result must come back with the
/// same signature or it is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub signature: SelectionSignature,
    pub resource_ids: Vec<ResourceId>,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadApplied {
    Applied,
    /// Same payload as already shown; nothing changed.
    Unchanged,
    /// Issued for a superseded selection.
    Stale,
}

/// Single owner of the selection, slot list and booking modal.
///
/// Pure and synchronous; [`ScheduleHandle`] runs it on a task and feeds it intents.
pub struct ScheduleState {
    catalog: Vec<Facility>,
    selection: Selection,
    generation: u64,
    phase: Phase,
    slots: Vec<Slot>,
    modal: Option<BookingModalState>,
    last_fetch_failed: bool,
}

impl ScheduleState {
    pub fn new(catalog: Vec<Facility>) -> Self {
        Self {
            catalog,
            selection: Selection::default(),
            generation: 0,
            phase: Phase::NoSelection,
            slots: Vec::new(),
            modal: None,
            last_fetch_failed: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn modal(&self) -> Option<&BookingModalState> {
        self.modal.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    pub fn last_fetch_failed(&self) -> bool {
        self.last_fetch_failed
    }

    pub fn signature(&self) -> SelectionSignature {
        SelectionSignature {
            generation: self.generation,
            selection: self.selection.clone(),
        }
    }

    fn selected_facility(&self) -> Option<&Facility> {
        let id = self.selection.facility.as_deref()?;
        self.catalog.iter().find(|f| f.id == id)
    }

    pub fn view(&self) -> ScheduleView {
        ScheduleView {
            phase: self.phase,
            selection: self.selection.clone(),
            resources: self
                .selected_facility()
                .map(|f| f.active_resources().cloned().collect())
                .unwrap_or_default(),
            slots: self.slots.clone(),
            modal: self.modal.clone(),
            last_fetch_failed: self.last_fetch_failed,
        }
    }

    // ── Selection ────────────────────────────────────────────────

    pub fn set_facility(&mut self, id: FacilityId) -> Result<Option<LoadRequest>, ScheduleError> {
        if !self.catalog.iter().any(|f| f.id == id) {
            return Err(ScheduleError::FacilityNotFound(id));
        }
        if self.selection.facility.as_deref() == Some(id.as_str()) {
            return Ok(None);
        }
        self.selection.facility = Some(id);
        Ok(self.invalidate())
    }

    pub fn set_date(&mut self, date: NaiveDate) -> Option<LoadRequest> {
        if self.selection.date == Some(date) {
            return None;
        }
        self.selection.date = Some(date);
        self.invalidate()
    }

    /// Re-fetch the current selection.
    pub fn reload(&mut self) -> Option<LoadRequest> {
        self.invalidate()
    }

    /// Swap in a refreshed catalog. A selected facility that disappeared is deselected.
    pub fn replace_catalog(&mut self, catalog: Vec<Facility>) -> Option<LoadRequest> {
        self.catalog = catalog;
        if let Some(id) = &self.selection.facility
            && !self.catalog.iter().any(|f| &f.id == id)
        {
            self.selection.facility = None;
        }
        self.invalidate()
    }

    /// Drop slots and modal, bump the signature and work out the next phase.
    fn invalidate(&mut self) -> Option<LoadRequest> {
        self.generation += 1;
        self.slots.clear();
        self.modal = None;
        self.last_fetch_failed = false;

        if self.selection.is_empty() {
            self.phase = Phase::NoSelection;
            return None;
        }
        let Some(date) = self.selection.date else {
            self.phase = Phase::SelectionIncomplete;
            return None;
        };
        let resource_ids: Vec<ResourceId> = match self.selected_facility() {
            Some(f) => f.active_resources().map(|r| r.id.clone()).collect(),
            None => {
                self.phase = Phase::SelectionIncomplete;
                return None;
            }
        };
        if resource_ids.is_empty() {
            // Nothing to fetch: an empty day, not a pending load.
            self.phase = Phase::Loaded;
            return None;
        }

        self.phase = Phase::Loading;
        Some(LoadRequest {
            signature: self.signature(),
            resource_ids,
            date,
        })
    }

    // ── Loading ──────────────────────────────────────────────────

    pub fn on_slots_loaded(&mut self, signature: &SelectionSignature, outcome: FetchOutcome) -> LoadApplied {
        if *signature != self.signature() {
            debug!(
                "discarding stale slot load (generation {} != {})",
                signature.generation, self.generation
            );
            metrics::counter!(observability::STALE_LOADS_DISCARDED_TOTAL).increment(1);
            return LoadApplied::Stale;
        }

        let mut seen = HashSet::new();
        let mut slots: Vec<Slot> = outcome
            .slots
            .into_iter()
            .filter(|s| seen.insert(s.id.clone()))
            .map(|mut s| {
                s.free_places = s.free_places.min(s.capacity);
                s
            })
            .collect();
        slots.sort_by(|a, b| (a.span.start, &a.resource_id, &a.id).cmp(&(b.span.start, &b.resource_id, &b.id)));

        if self.phase == Phase::Loaded && self.slots == slots && self.last_fetch_failed == outcome.failed {
            return LoadApplied::Unchanged;
        }

        self.slots = slots;
        self.last_fetch_failed = outcome.failed;
        self.phase = Phase::Loaded;
        LoadApplied::Applied
    }

    // ── Booking modal ────────────────────────────────────────────

    /// Open the booking modal for a clicked calendar event.
    /// Unresolvable clicks are reported and leave the modal closed.
    pub fn on_slot_clicked(&mut self, slot_id: &str) -> Result<&BookingModalState, ScheduleError> {
        let modal = self.resolve_click(slot_id).inspect_err(|e| {
            warn!("ignoring calendar click: {e}");
            metrics::counter!(observability::UNRESOLVED_CLICKS_TOTAL).increment(1);
        })?;
        Ok(self.modal.insert(modal))
    }

    fn resolve_click(&self, slot_id: &str) -> Result<BookingModalState, ScheduleError> {
        if self.phase != Phase::Loaded {
            return Err(ScheduleError::NotLoaded);
        }
        let slot = self
            .slots
            .iter()
            .find(|s| s.id == slot_id)
            .ok_or_else(|| ScheduleError::SlotNotFound(slot_id.to_string()))?;
        let not_found = || ScheduleError::ResourceNotFound {
            slot_id: slot.id.clone(),
            resource_id: slot.resource_id.clone(),
        };
        let facility = self.selected_facility().ok_or_else(not_found)?;
        let room = facility
            .resource(&slot.resource_id)
            .filter(|r| r.active)
            .ok_or_else(not_found)?;

        let day = slot.span.moscow_date();
        let siblings = self
            .slots
            .iter()
            .filter(|s| s.resource_id == slot.resource_id && s.span.moscow_date() == day)
            .cloned()
            .collect();

        Ok(BookingModalState {
            slot: slot.clone(),
            room_title: room.title.clone(),
            facility_title: facility.title.clone(),
            occupied_places: slot.occupied_places(),
            siblings,
            form_open: false,
        })
    }

    pub fn open_booking_form(&mut self) -> Result<(), ScheduleError> {
        let modal = self.modal.as_mut().ok_or(ScheduleError::ModalClosed)?;
        modal.form_open = true;
        Ok(())
    }

    /// A reservation went through: leave the form, keep the modal for the occupancy refresh.
    pub fn on_booking_succeeded(&mut self) -> bool {
        match self.modal.as_mut() {
            Some(modal) if modal.form_open => {
                modal.form_open = false;
                true
            }
            _ => false,
        }
    }

    /// Discard modal state unconditionally. Returns whether a modal was open.
    pub fn close_modal(&mut self) -> bool {
        self.modal.take().is_some()
    }

    // ── Capacity ─────────────────────────────────────────────────

    /// Apply a server-derived free-place count in place, clamped to `[0, capacity]`.
    /// Returns the value actually stored.
    pub fn on_capacity_updated(&mut self, slot_id: &str, free_places: i64) -> Result<u32, ScheduleError> {
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.id == slot_id)
            .ok_or_else(|| ScheduleError::SlotNotFound(slot_id.to_string()))?;
        let clamped = slot.clamp_free(free_places);
        slot.free_places = clamped;

        if let Some(modal) = self.modal.as_mut() {
            if modal.slot.id == slot_id {
                modal.slot.free_places = clamped;
                modal.occupied_places = modal.slot.occupied_places();
            }
            if let Some(sibling) = modal.siblings.iter_mut().find(|s| s.id == slot_id) {
                sibling.free_places = clamped;
            }
        }

        metrics::counter!(observability::CAPACITY_UPDATES_TOTAL).increment(1);
        Ok(clamped)
    }
}
