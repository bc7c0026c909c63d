/// Upper bound on room ids sent in a single empty-slots query.
pub const MAX_RESOURCES_PER_FETCH: usize = 64;

/// Upper bound on slot ids in one reservation.
pub const MAX_SLOTS_PER_BOOKING: usize = 32;

pub const MAX_CLIENT_INPUT_LEN: usize = 64;

pub const MAX_AGGREGATOR_ID_LEN: usize = 128;

/// Capacity of the intent channel feeding the schedule task.
pub const INTENT_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the view/notification broadcast channels.
pub const BROADCAST_CAPACITY: usize = 64;
