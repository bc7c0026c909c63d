use crate::model::{ResourceId, SlotId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    FacilityNotFound(String),
    SlotNotFound(SlotId),
    ResourceNotFound {
        slot_id: SlotId,
        resource_id: ResourceId,
    },
    /// The operation needs loaded slots.
    NotLoaded,
    ModalClosed,
    /// The schedule task has shut down.
    Stopped,
}

impl std::fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleError::FacilityNotFound(id) => write!(f, "facility not found: {id}"),
            ScheduleError::SlotNotFound(id) => write!(f, "slot not found: {id}"),
            ScheduleError::ResourceNotFound {
                slot_id,
                resource_id,
            } => write!(f, "room {resource_id} of slot {slot_id} not found"),
            ScheduleError::NotLoaded => write!(f, "slots are not loaded"),
            ScheduleError::ModalClosed => write!(f, "booking modal is not open"),
            ScheduleError::Stopped => write!(f, "schedule task stopped"),
        }
    }
}

impl std::error::Error for ScheduleError {}
