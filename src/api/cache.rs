use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::info;

use super::{ApiError, SharedApi};
use crate::model::{Facility, FacilityId};

/// Facility catalog, fetched once per session and refreshed on demand.
pub struct CatalogCache {
    api: SharedApi,
    facilities: DashMap<FacilityId, Facility>,
    loaded: AtomicBool,
    /// Serializes refreshes so concurrent first calls issue one query.
    refresh_lock: Mutex<()>,
}

impl CatalogCache {
    pub fn new(api: SharedApi) -> Self {
        Self {
            api,
            facilities: DashMap::new(),
            loaded: AtomicBool::new(false),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Cached catalog, loading it on first use.
    pub async fn facilities(&self) -> Result<Vec<Facility>, ApiError> {
        if !self.loaded.load(Ordering::Acquire) {
            let _guard = self.refresh_lock.lock().await;
            if !self.loaded.load(Ordering::Acquire) {
                self.reload().await?;
            }
        }
        Ok(self.snapshot())
    }

    /// Re-query the catalog unconditionally.
    pub async fn refresh(&self) -> Result<Vec<Facility>, ApiError> {
        let _guard = self.refresh_lock.lock().await;
        self.reload().await?;
        Ok(self.snapshot())
    }

    pub fn get(&self, id: &str) -> Option<Facility> {
        self.facilities.get(id).map(|e| e.value().clone())
    }

    async fn reload(&self) -> Result<(), ApiError> {
        let records = self.api.facilities().await?;
        self.facilities.clear();
        for record in records {
            let facility = Facility::from(record);
            self.facilities.insert(facility.id.clone(), facility);
        }
        self.loaded.store(true, Ordering::Release);
        info!("facility catalog loaded: {} facilities", self.facilities.len());
        Ok(())
    }

    /// Facilities ordered by title, then id.
    fn snapshot(&self) -> Vec<Facility> {
        let mut list: Vec<Facility> = self.facilities.iter().map(|e| e.value().clone()).collect();
        list.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        list
    }
}
