// src/state.rs
use std::sync::Arc;

use crate::{
    config::ClientConfig,
    errors::ClientResult,
    services::{
        api_client::{BackendApi, HttpBackend},
        booking::BookingStateMachine,
        driver_availability::DriverAvailabilityLoop,
        geolocation::{FixedGeolocation, GeolocationSource},
        nearby_cabs::NearbyCabsPoller,
        ride_history::RideHistoryPager,
        session::{FileSessionPersistence, SessionPersistence, SessionStore},
    },
};

/// Process-wide wiring: one session and one backend shared by every
/// component the screens create.
pub struct AppState {
    pub session: Arc<SessionStore>,
    pub api: Arc<dyn BackendApi>,
    pub geolocation: Arc<dyn GeolocationSource>,
    pub config: ClientConfig,
}

impl AppState {
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let persistence: Arc<dyn SessionPersistence> =
            Arc::new(FileSessionPersistence::new(config.session_dir.clone()));
        let session = Arc::new(SessionStore::new(persistence));
        let api: Arc<dyn BackendApi> = Arc::new(HttpBackend::new(&config, session.clone())?);

        let geolocation: Arc<dyn GeolocationSource> = match config.device_position {
            Some(position) => Arc::new(FixedGeolocation::at(position)),
            None => {
                tracing::warn!("CABRIDE_DEVICE_POSITION not set, location heartbeats will be skipped");
                Arc::new(FixedGeolocation::denied())
            }
        };

        Ok(Self::with_services(config, session, api, geolocation))
    }

    pub fn with_services(
        config: ClientConfig,
        session: Arc<SessionStore>,
        api: Arc<dyn BackendApi>,
        geolocation: Arc<dyn GeolocationSource>,
    ) -> Self {
        Self {
            session,
            api,
            geolocation,
            config,
        }
    }

    pub fn booking(&self) -> BookingStateMachine {
        BookingStateMachine::new(self.api.clone())
    }

    pub fn nearby_cabs(&self) -> NearbyCabsPoller {
        NearbyCabsPoller::new(self.api.clone())
    }

    pub fn ride_history(&self) -> RideHistoryPager {
        RideHistoryPager::new(self.api.clone(), self.config.page_size)
    }

    pub fn driver_availability(&self) -> DriverAvailabilityLoop {
        DriverAvailabilityLoop::new(
            self.api.clone(),
            self.geolocation.clone(),
            self.config.heartbeat_interval,
        )
    }
}
