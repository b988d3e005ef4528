// src/services/nearby_cabs.rs
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing;

use crate::{
    errors::ClientResult,
    models::{driver::NearbyCab, ride::Coordinate},
    services::api_client::BackendApi,
    utils::{geo::haversine_km, periodic::PeriodicTask},
};

/// Cabs around the rider's map center. Informational only; nothing in the
/// booking flow waits on it.
pub struct NearbyCabsPoller {
    api: Arc<dyn BackendApi>,
    cabs: Arc<Mutex<Vec<NearbyCab>>>,
    polling: Mutex<Option<PeriodicTask>>,
}

impl NearbyCabsPoller {
    pub fn new(api: Arc<dyn BackendApi>) -> Self {
        Self {
            api,
            cabs: Arc::new(Mutex::new(Vec::new())),
            polling: Mutex::new(None),
        }
    }

    /// Last successfully fetched list, nearest first.
    pub fn cabs(&self) -> Vec<NearbyCab> {
        self.cabs.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Fetch once. On failure the displayed list is kept and the error returned.
    pub async fn start(&self, center: Coordinate, radius_km: f64) -> ClientResult<usize> {
        refresh(self.api.as_ref(), &self.cabs, center, radius_km).await
    }

    /// Refresh every `every`, starting now. Replaces any previous polling task.
    pub fn start_polling(&self, center: Coordinate, radius_km: f64, every: Duration) {
        let api = self.api.clone();
        let cabs = self.cabs.clone();
        let task = PeriodicTask::spawn("nearby-cabs", every, move || {
            let api = api.clone();
            let cabs = cabs.clone();
            async move {
                // Errors are already logged; the next tick is the retry.
                let _ = refresh(api.as_ref(), &cabs, center, radius_km).await;
            }
        });

        let previous = self
            .polling
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.stop();
        }
    }

    pub fn stop_polling(&self) {
        let task = self
            .polling
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.stop();
        }
    }

    pub fn is_polling(&self) -> bool {
        self.polling
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(PeriodicTask::is_running)
    }
}

async fn refresh(
    api: &dyn BackendApi,
    cabs: &Mutex<Vec<NearbyCab>>,
    center: Coordinate,
    radius_km: f64,
) -> ClientResult<usize> {
    match api.nearby_cabs(center, radius_km).await {
        Ok(mut found) => {
            found.sort_by(|a, b| {
                haversine_km(center, a.position()).total_cmp(&haversine_km(center, b.position()))
            });
            let count = found.len();
            tracing::debug!("Found {} cabs within {} km", count, radius_km);
            *cabs.lock().unwrap_or_else(PoisonError::into_inner) = found;
            Ok(count)
        }
        Err(e) => {
            tracing::warn!("Failed to fetch nearby cabs: {}", e);
            Err(e)
        }
    }
}
