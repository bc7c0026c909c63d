use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::limits::BROADCAST_CAPACITY;
use crate::model::{Notification, NotificationLevel, ScheduleView};

/// Broadcast hub for schedule views and user-facing toasts.
pub struct ViewHub {
    views: broadcast::Sender<ScheduleView>,
    notifications: broadcast::Sender<Notification>,
}

impl ViewHub {
    pub fn new() -> Self {
        Self {
            views: broadcast::channel(BROADCAST_CAPACITY).0,
            notifications: broadcast::channel(BROADCAST_CAPACITY).0,
        }
    }

    pub fn subscribe_views(&self) -> broadcast::Receiver<ScheduleView> {
        self.views.subscribe()
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Publish a view. No-op if nobody is listening.
    pub fn publish_view(&self, view: ScheduleView) {
        let _ = self.views.send(view);
    }

    /// Publish a toast. Also logged so headless runs keep a record.
    pub fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => info!("notification: {}", notification.message),
            NotificationLevel::Error => warn!("notification: {}", notification.message),
        }
        let _ = self.notifications.send(notification);
    }
}

impl Default for ViewHub {
    fn default() -> Self {
        Self::new()
    }
}
