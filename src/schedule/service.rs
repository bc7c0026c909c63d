use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};

use crate::fetcher::{FetchOutcome, SlotFetcher};
use crate::limits::INTENT_CHANNEL_CAPACITY;
use crate::model::*;
use crate::notify::ViewHub;

use super::{LoadApplied, LoadRequest, ScheduleError, ScheduleState};

type Reply<T> = oneshot::Sender<Result<T, ScheduleError>>;

/// Everything that can change the schedule. Applied strictly in arrival order.
enum Intent {
    SetFacility { id: FacilityId, response: Reply<()> },
    SetDate { date: NaiveDate, response: Reply<()> },
    Reload { response: Reply<()> },
    ReplaceCatalog { catalog: Vec<Facility>, response: Reply<()> },
    SlotsLoaded { signature: SelectionSignature, outcome: FetchOutcome },
    SlotClicked { slot_id: SlotId, response: Reply<BookingModalState> },
    OpenBookingForm { response: Reply<()> },
    BookingSucceeded { response: Reply<()> },
    CapacityUpdated { slot_id: SlotId, free_places: i64, response: Reply<u32> },
    CloseModal { response: Reply<()> },
    View { response: oneshot::Sender<ScheduleView> },
}

/// Background task that owns the [`ScheduleState`].
/// 1. Receive the next intent.
/// 2. Apply it to the state.
/// 3. Spawn a fetch if the selection now needs slots.
/// 4. Publish the new view if anything changed, then answer the caller.
struct ScheduleTask {
    state: ScheduleState,
    fetcher: Arc<SlotFetcher>,
    hub: Arc<ViewHub>,
    /// Weak so that dropping every handle ends the task.
    loopback: mpsc::WeakSender<Intent>,
}

impl ScheduleTask {
    async fn run(mut self, mut rx: mpsc::Receiver<Intent>) {
        while let Some(intent) = rx.recv().await {
            self.apply(intent);
        }
        debug!("schedule task stopped");
    }

    /// Views are published before the caller is answered, so a caller that
    /// subscribes after its request returns never sees a view older than its change.
    fn apply(&mut self, intent: Intent) {
        match intent {
            Intent::SetFacility { id, response } => {
                let before = self.state.signature();
                let result = self.state.set_facility(id);
                let result = result.map(|request| self.dispatch(request));
                self.publish_if(before != self.state.signature());
                let _ = response.send(result);
            }
            Intent::SetDate { date, response } => {
                let before = self.state.signature();
                let request = self.state.set_date(date);
                self.dispatch(request);
                self.publish_if(before != self.state.signature());
                let _ = response.send(Ok(()));
            }
            Intent::Reload { response } => {
                let request = self.state.reload();
                self.dispatch(request);
                self.publish_if(true);
                let _ = response.send(Ok(()));
            }
            Intent::ReplaceCatalog { catalog, response } => {
                let request = self.state.replace_catalog(catalog);
                self.dispatch(request);
                self.publish_if(true);
                let _ = response.send(Ok(()));
            }
            Intent::SlotsLoaded { signature, outcome } => {
                let applied = self.state.on_slots_loaded(&signature, outcome);
                self.publish_if(applied == LoadApplied::Applied);
            }
            Intent::SlotClicked { slot_id, response } => {
                let result = self.state.on_slot_clicked(&slot_id).cloned();
                self.publish_if(result.is_ok());
                let _ = response.send(result);
            }
            Intent::OpenBookingForm { response } => {
                let result = self.state.open_booking_form();
                self.publish_if(result.is_ok());
                let _ = response.send(result);
            }
            Intent::BookingSucceeded { response } => {
                let changed = self.state.on_booking_succeeded();
                self.publish_if(changed);
                let _ = response.send(Ok(()));
            }
            Intent::CapacityUpdated {
                slot_id,
                free_places,
                response,
            } => {
                let result = self.state.on_capacity_updated(&slot_id, free_places);
                self.publish_if(result.is_ok());
                let _ = response.send(result);
            }
            Intent::CloseModal { response } => {
                let changed = self.state.close_modal();
                self.publish_if(changed);
                let _ = response.send(Ok(()));
            }
            Intent::View { response } => {
                let _ = response.send(self.state.view());
            }
        }
    }

    fn publish_if(&self, changed: bool) {
        if changed {
            self.hub.publish_view(self.state.view());
        }
    }

    /// Issue the fetch on its own task; the result comes back as an intent.
    fn dispatch(&self, request: Option<LoadRequest>) {
        let Some(request) = request else { return };
        let fetcher = self.fetcher.clone();
        let loopback = self.loopback.clone();
        debug!(
            "loading slots for {} rooms on {} (generation {})",
            request.resource_ids.len(),
            request.date,
            request.signature.generation
        );
        tokio::spawn(async move {
            let outcome = fetcher
                .fetch(&request.resource_ids, Some(request.date))
                .await
                .unwrap_or_default();
            if let Some(tx) = loopback.upgrade() {
                let _ = tx
                    .send(Intent::SlotsLoaded {
                        signature: request.signature,
                        outcome,
                    })
                    .await;
            }
        });
    }
}

/// Cloneable front end to the schedule task.
#[derive(Clone)]
pub struct ScheduleHandle {
    tx: mpsc::Sender<Intent>,
    hub: Arc<ViewHub>,
}

impl ScheduleHandle {
    /// Start the schedule task over `catalog`.
    pub fn spawn(catalog: Vec<Facility>, fetcher: Arc<SlotFetcher>, hub: Arc<ViewHub>) -> Self {
        let (tx, rx) = mpsc::channel(INTENT_CHANNEL_CAPACITY);
        info!("schedule task started with {} facilities", catalog.len());
        let task = ScheduleTask {
            state: ScheduleState::new(catalog),
            fetcher,
            hub: hub.clone(),
            loopback: tx.downgrade(),
        };
        tokio::spawn(task.run(rx));
        Self { tx, hub }
    }

    pub fn hub(&self) -> &Arc<ViewHub> {
        &self.hub
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Intent) -> Result<T, ScheduleError> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(make(tx)).await.map_err(|_| ScheduleError::Stopped)?;
        rx.await.map_err(|_| ScheduleError::Stopped)?
    }

    pub async fn set_facility(&self, id: impl Into<FacilityId>) -> Result<(), ScheduleError> {
        let id = id.into();
        self.request(|response| Intent::SetFacility { id, response }).await
    }

    pub async fn set_date(&self, date: NaiveDate) -> Result<(), ScheduleError> {
        self.request(|response| Intent::SetDate { date, response }).await
    }

    pub async fn reload(&self) -> Result<(), ScheduleError> {
        self.request(|response| Intent::Reload { response }).await
    }

    pub async fn replace_catalog(&self, catalog: Vec<Facility>) -> Result<(), ScheduleError> {
        self.request(|response| Intent::ReplaceCatalog { catalog, response })
            .await
    }

    pub async fn slot_clicked(&self, slot_id: impl Into<SlotId>) -> Result<BookingModalState, ScheduleError> {
        let slot_id = slot_id.into();
        self.request(|response| Intent::SlotClicked { slot_id, response })
            .await
    }

    pub async fn open_booking_form(&self) -> Result<(), ScheduleError> {
        self.request(|response| Intent::OpenBookingForm { response }).await
    }

    pub async fn booking_succeeded(&self) -> Result<(), ScheduleError> {
        self.request(|response| Intent::BookingSucceeded { response }).await
    }

    pub async fn capacity_updated(&self, slot_id: impl Into<SlotId>, free_places: i64) -> Result<u32, ScheduleError> {
        let slot_id = slot_id.into();
        self.request(|response| Intent::CapacityUpdated {
            slot_id,
            free_places,
            response,
        })
        .await
    }

    pub async fn close_modal(&self) -> Result<(), ScheduleError> {
        self.request(|response| Intent::CloseModal { response }).await
    }

    pub async fn view(&self) -> Result<ScheduleView, ScheduleError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Intent::View { response: tx })
            .await
            .map_err(|_| ScheduleError::Stopped)?;
        rx.await.map_err(|_| ScheduleError::Stopped)
    }

    /// Wait until a published view satisfies `pred`. Checks the current view first.
    pub async fn wait_for(&self, pred: impl Fn(&ScheduleView) -> bool) -> Result<ScheduleView, ScheduleError> {
        // Subscribe before reading the current view so no publication is missed.
        let mut rx = self.hub.subscribe_views();
        let current = self.view().await?;
        if pred(&current) {
            return Ok(current);
        }
        loop {
            match rx.recv().await {
                Ok(view) if pred(&view) => return Ok(view),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return Err(ScheduleError::Stopped),
            }
        }
    }
}
