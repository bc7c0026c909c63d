use std::collections::HashSet;

use crate::model::{BookingModalState, Slot, SlotId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerOption {
    pub slot_id: SlotId,
    /// Time label with occupancy, e.g. `10:00 - 11:00 (3 мест)`.
    pub label: String,
    /// Always selected, rendered disabled.
    pub mandatory: bool,
}

impl PickerOption {
    fn from_slot(slot: &Slot, mandatory: bool) -> Self {
        Self {
            slot_id: slot.id.clone(),
            label: slot.label(),
            mandatory,
        }
    }

    fn matches(&self, needle_lower: &str) -> bool {
        needle_lower.is_empty() || strip_occupancy(&self.label).to_lowercase().contains(needle_lower)
    }
}

/// Drop a trailing `(N мест)` so searches only see the time range.
pub fn strip_occupancy(label: &str) -> &str {
    match label.rfind(" (") {
        Some(pos) if label.ends_with(')') => &label[..pos],
        _ => label,
    }
}

/// Multi-slot picker with an edit buffer: edits go to a working copy that is
/// committed or discarded as a whole.
#[derive(Debug, Clone)]
pub struct SlotPicker {
    options: Vec<PickerOption>,
    committed: HashSet<SlotId>,
    working: HashSet<SlotId>,
    filter: String,
}

impl SlotPicker {
    pub fn new(options: Vec<PickerOption>) -> Self {
        let mandatory: HashSet<SlotId> = options
            .iter()
            .filter(|o| o.mandatory)
            .map(|o| o.slot_id.clone())
            .collect();
        Self {
            options,
            committed: mandatory.clone(),
            working: mandatory,
            filter: String::new(),
        }
    }

    /// Options are the modal's same-day siblings; the clicked slot is mandatory.
    /// Full siblings are left out since they cannot be booked.
    pub fn from_modal(modal: &BookingModalState) -> Self {
        let options = modal
            .siblings
            .iter()
            .filter_map(|s| {
                let mandatory = s.id == modal.slot.id;
                (mandatory || !s.is_busy()).then(|| PickerOption::from_slot(s, mandatory))
            })
            .collect();
        Self::new(options)
    }

    pub fn options(&self) -> &[PickerOption] {
        &self.options
    }

    /// Start editing from the committed selection.
    pub fn begin_edit(&mut self) {
        self.working = self.committed.clone();
        self.filter.clear();
    }

    pub fn set_filter(&mut self, filter: impl Into<String>) {
        self.filter = filter.into();
    }

    pub fn visible(&self) -> Vec<&PickerOption> {
        let needle = self.filter.trim().to_lowercase();
        self.options.iter().filter(|o| o.matches(&needle)).collect()
    }

    /// Flip one option in the working copy. Mandatory and unknown ids are ignored.
    pub fn toggle(&mut self, slot_id: &str) -> bool {
        let Some(option) = self.options.iter().find(|o| o.slot_id == slot_id) else {
            return false;
        };
        if option.mandatory {
            return false;
        }
        if !self.working.remove(slot_id) {
            self.working.insert(option.slot_id.clone());
        }
        true
    }

    pub fn select_all(&mut self) {
        let visible: Vec<SlotId> = self.visible().into_iter().map(|o| o.slot_id.clone()).collect();
        let mandatory: Vec<SlotId> = self.mandatory_ids().collect();
        self.working.extend(visible);
        self.working.extend(mandatory);
    }

    /// Back to just the mandatory slot(s).
    pub fn clear(&mut self) {
        self.working = self.mandatory_ids().collect();
    }

    pub fn confirm(&mut self) {
        self.committed = self.working.clone();
    }

    pub fn cancel(&mut self) {
        self.working = self.committed.clone();
    }

    pub fn is_dirty(&self) -> bool {
        self.working != self.committed
    }

    /// Working selection in option order.
    pub fn working(&self) -> Vec<SlotId> {
        self.ordered(&self.working)
    }

    /// Committed selection in option order.
    pub fn committed(&self) -> Vec<SlotId> {
        self.ordered(&self.committed)
    }

    /// Committed slots beyond the mandatory one, for a booking's extra slot list.
    pub fn additional(&self) -> Vec<SlotId> {
        self.options
            .iter()
            .filter(|o| !o.mandatory && self.committed.contains(&o.slot_id))
            .map(|o| o.slot_id.clone())
            .collect()
    }

    fn mandatory_ids(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.options
            .iter()
            .filter(|o| o.mandatory)
            .map(|o| o.slot_id.clone())
    }

    fn ordered(&self, set: &HashSet<SlotId>) -> Vec<SlotId> {
        self.options
            .iter()
            .filter(|o| set.contains(&o.slot_id))
            .map(|o| o.slot_id.clone())
            .collect()
    }
}
