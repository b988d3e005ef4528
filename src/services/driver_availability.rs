// src/services/driver_availability.rs
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing;

use crate::{
    errors::{ClientError as AppError, ClientResult},
    models::driver::{DriverState, DriverStatus, RideRequest},
    services::{api_client::BackendApi, geolocation::GeolocationSource},
    utils::periodic::PeriodicTask,
};

#[derive(Debug, Default)]
struct LoopState {
    driver: DriverState,
    queue: VecDeque<RideRequest>,
    current_request: Option<RideRequest>,
    disposed: bool,
}

/// Driver availability: status pushes, the location heartbeat while
/// AVAILABLE, and the local queue of incoming ride requests.
pub struct DriverAvailabilityLoop {
    api: Arc<dyn BackendApi>,
    geolocation: Arc<dyn GeolocationSource>,
    heartbeat_interval: Duration,
    state: Arc<Mutex<LoopState>>,
    heartbeat: Mutex<Option<PeriodicTask>>,
    request_stream: Mutex<Option<JoinHandle<()>>>,
    // Serializes status pushes so two toggles cannot interleave.
    transition: tokio::sync::Mutex<()>,
}

impl DriverAvailabilityLoop {
    pub fn new(
        api: Arc<dyn BackendApi>,
        geolocation: Arc<dyn GeolocationSource>,
        heartbeat_interval: Duration,
    ) -> Self {
        Self {
            api,
            geolocation,
            heartbeat_interval,
            state: Arc::new(Mutex::new(LoopState::default())),
            heartbeat: Mutex::new(None),
            request_stream: Mutex::new(None),
            transition: tokio::sync::Mutex::new(()),
        }
    }

    fn state(&self) -> MutexGuard<'_, LoopState> {
        lock(&self.state)
    }

    pub fn status(&self) -> DriverStatus {
        self.state().driver.status
    }

    pub fn snapshot(&self) -> DriverState {
        self.state().driver.clone()
    }

    pub fn pending_requests(&self) -> Vec<RideRequest> {
        self.state().queue.iter().cloned().collect()
    }

    pub fn current_request(&self) -> Option<RideRequest> {
        self.state().current_request.clone()
    }

    pub fn has_heartbeat(&self) -> bool {
        lock(&self.heartbeat)
            .as_ref()
            .is_some_and(PeriodicTask::is_running)
    }

    /// OFFLINE <-> AVAILABLE. The server is told first; local state only
    /// changes once it acknowledges.
    pub async fn toggle(&self) -> ClientResult<DriverStatus> {
        let _gate = self.transition.lock().await;

        let next = {
            let state = self.state();
            if state.disposed {
                return Err(AppError::Disposed);
            }
            match state.driver.status {
                DriverStatus::Offline => DriverStatus::Available,
                DriverStatus::Available => DriverStatus::Offline,
                DriverStatus::Busy => {
                    return Err(AppError::invalid_state("toggle availability", DriverStatus::Busy));
                }
            }
        };

        self.push_status(next).await?;
        self.commit_status(next)?;
        Ok(next)
    }

    /// Finish the current ride and go back to AVAILABLE.
    pub async fn complete_ride(&self, fare: f64) -> ClientResult<()> {
        let _gate = self.transition.lock().await;
        {
            let state = self.state();
            if state.disposed {
                return Err(AppError::Disposed);
            }
            if state.driver.status != DriverStatus::Busy {
                return Err(AppError::invalid_state("complete a ride", state.driver.status));
            }
        }

        self.push_status(DriverStatus::Available).await?;
        self.commit_status(DriverStatus::Available)?;
        let mut state = self.state();
        state.driver.today_rides += 1;
        state.driver.today_earnings += fare;
        state.current_request = None;
        Ok(())
    }

    async fn push_status(&self, status: DriverStatus) -> ClientResult<()> {
        self.api.update_status(status).await.map_err(|e| {
            tracing::warn!("Failed to update driver status to {:?}: {}", status, e);
            e
        })
    }

    // Validated against the live state: the loop may have been disposed or
    // moved on while the push was outstanding.
    fn commit_status(&self, status: DriverStatus) -> ClientResult<()> {
        {
            let mut state = self.state();
            if state.disposed {
                tracing::debug!("Driver loop disposed during status push, not committing {:?}", status);
                return Err(AppError::Disposed);
            }
            if !state.driver.status.can_transition_to(status) {
                return Err(AppError::invalid_state("commit driver status", state.driver.status));
            }
            state.driver.status = status;
        }
        tracing::info!("Driver is now {:?}", status);
        if status == DriverStatus::Available {
            self.start_heartbeat();
        } else {
            self.stop_heartbeat();
        }
        Ok(())
    }

    fn start_heartbeat(&self) {
        let api = self.api.clone();
        let geolocation = self.geolocation.clone();
        let task = PeriodicTask::spawn("driver-heartbeat", self.heartbeat_interval, move || {
            let api = api.clone();
            let geolocation = geolocation.clone();
            async move {
                let position = match geolocation.current_position().await {
                    Ok(position) => position,
                    Err(e) => {
                        tracing::warn!("Skipping location heartbeat: {}", e);
                        return;
                    }
                };
                if let Err(e) = api.update_location(position).await {
                    tracing::warn!("Failed to push driver location: {}", e);
                }
            }
        });

        let previous = lock(&self.heartbeat).replace(task);
        if let Some(previous) = previous {
            previous.stop();
        }
        // dispose() marks the loop before taking the task; whichever side runs
        // second stops it.
        if self.state().disposed {
            self.stop_heartbeat();
        }
    }

    fn stop_heartbeat(&self) {
        let task = lock(&self.heartbeat).take();
        if let Some(task) = task {
            task.stop();
        }
    }

    /// Queue a dispatched ride request for the driver to accept or reject.
    pub fn enqueue(&self, request: RideRequest) {
        push_request(&self.state, request);
    }

    /// Feed the queue from a dispatch channel until it closes. Replaces any
    /// previously attached stream.
    pub fn attach_request_stream(&self, mut requests: mpsc::Receiver<RideRequest>) {
        let state = self.state.clone();
        let handle = tokio::spawn(async move {
            while let Some(request) = requests.recv().await {
                push_request(&state, request);
            }
            tracing::debug!("Ride request stream closed");
        });

        let previous = lock(&self.request_stream).replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Take a queued request; AVAILABLE -> BUSY and the heartbeat stops.
    /// Refused while a status push is outstanding.
    pub fn accept(&self, request_id: &str) -> ClientResult<RideRequest> {
        let Ok(_gate) = self.transition.try_lock() else {
            return Err(AppError::invalid_state("accept a ride request", "status update pending"));
        };
        let request = {
            let mut state = self.state();
            if state.disposed {
                return Err(AppError::Disposed);
            }
            if state.driver.status != DriverStatus::Available {
                return Err(AppError::invalid_state("accept a ride request", state.driver.status));
            }
            let request = take_request(&mut state.queue, request_id)?;
            state.driver.status = DriverStatus::Busy;
            state.current_request = Some(request.clone());
            request
        };

        self.stop_heartbeat();
        tracing::info!("Accepted ride request {}", request.id);
        Ok(request)
    }

    pub fn reject(&self, request_id: &str) -> ClientResult<RideRequest> {
        let request = take_request(&mut self.state().queue, request_id)?;
        tracing::debug!("Rejected ride request {}", request.id);
        Ok(request)
    }

    /// Stop the heartbeat and the request stream. The loop accepts no
    /// further transitions.
    pub fn dispose(&self) {
        self.state().disposed = true;
        self.stop_heartbeat();
        if let Some(stream) = lock(&self.request_stream).take() {
            stream.abort();
        }
    }
}

impl Drop for DriverAvailabilityLoop {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn push_request(state: &Mutex<LoopState>, request: RideRequest) {
    let mut state = lock(state);
    if state.disposed {
        return;
    }
    tracing::debug!("Queued ride request {}", request.id);
    state.queue.push_back(request);
}

fn take_request(queue: &mut VecDeque<RideRequest>, request_id: &str) -> ClientResult<RideRequest> {
    let position = queue
        .iter()
        .position(|r| r.id == request_id)
        .ok_or_else(|| AppError::RideRequestNotFound(request_id.to_string()))?;
    queue
        .remove(position)
        .ok_or_else(|| AppError::RideRequestNotFound(request_id.to_string()))
}
