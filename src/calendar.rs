//! Adapter between the schedule and whatever draws the calendar grid.
//! The renderer only sees rooms, events and a loading flag; clicks come back
//! as [`CalendarClick`] messages.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use crate::model::*;
use crate::schedule::{ScheduleError, ScheduleHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarResource {
    pub id: ResourceId,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub id: SlotId,
    pub resource_id: ResourceId,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub title: String,
    /// No free places left.
    pub busy: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarClick {
    pub slot_id: SlotId,
}

pub trait CalendarRenderer: Send + Sync {
    fn set_resources(&self, resources: &[CalendarResource]);
    fn set_events(&self, events: &[CalendarEvent]);
    /// Blocking spinner overlay while a fetch is outstanding.
    fn set_loading(&self, loading: bool);
}

pub fn calendar_resources(view: &ScheduleView) -> Vec<CalendarResource> {
    view.resources
        .iter()
        .map(|r| CalendarResource {
            id: r.id.clone(),
            title: r.title.clone(),
        })
        .collect()
}

pub fn calendar_events(view: &ScheduleView) -> Vec<CalendarEvent> {
    view.slots
        .iter()
        .filter_map(|slot| {
            Some(CalendarEvent {
                id: slot.id.clone(),
                resource_id: slot.resource_id.clone(),
                start: to_moscow(slot.span.start)?,
                end: to_moscow(slot.span.end)?,
                title: slot.label(),
                busy: slot.is_busy(),
            })
        })
        .collect()
}

pub fn render(renderer: &dyn CalendarRenderer, view: &ScheduleView) {
    renderer.set_loading(view.is_loading());
    renderer.set_resources(&calendar_resources(view));
    renderer.set_events(&calendar_events(view));
}

/// Render every published view until the hub goes away.
pub async fn drive_calendar(renderer: Arc<dyn CalendarRenderer>, mut views: broadcast::Receiver<ScheduleView>) {
    loop {
        match views.recv().await {
            Ok(view) => render(renderer.as_ref(), &view),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("calendar skipped {skipped} intermediate views");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Feed calendar clicks into the schedule. Unresolvable clicks are already
/// reported by the schedule and do not stop the loop.
pub async fn forward_clicks(handle: ScheduleHandle, mut clicks: mpsc::Receiver<CalendarClick>) {
    while let Some(click) = clicks.recv().await {
        match handle.slot_clicked(click.slot_id).await {
            Ok(modal) => debug!("booking modal opened for slot {}", modal.slot.id),
            Err(ScheduleError::Stopped) => break,
            Err(_) => {}
        }
    }
}

/// Renderer that writes the grid to the log; used by the headless driver.
pub struct TracingCalendar;

impl CalendarRenderer for TracingCalendar {
    fn set_resources(&self, resources: &[CalendarResource]) {
        let titles: Vec<&str> = resources.iter().map(|r| r.title.as_str()).collect();
        info!("rooms: {}", titles.join(", "));
    }

    fn set_events(&self, events: &[CalendarEvent]) {
        for event in events {
            let marker = if event.busy { " [busy]" } else { "" };
            info!("  {} @ {}: {}{marker}", event.id, event.resource_id, event.title);
        }
    }

    fn set_loading(&self, loading: bool) {
        if loading {
            info!("loading slots...");
        }
    }
}
