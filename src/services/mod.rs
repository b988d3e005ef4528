// src/services/mod.rs
pub mod api_client;
pub mod booking;
pub mod driver_availability;
pub mod fare_quote;
pub mod geolocation;
#[cfg(test)]
pub mod mock_backend;
pub mod nearby_cabs;
pub mod ride_history;
pub mod session;

pub use api_client::{BackendApi, HttpBackend};
pub use booking::{BookingPhase, BookingStateMachine, BookingView};
pub use driver_availability::DriverAvailabilityLoop;
pub use fare_quote::{FareQuoteCoordinator, QuoteOutcome};
pub use geolocation::{FixedGeolocation, GeolocationSource};
pub use nearby_cabs::NearbyCabsPoller;
pub use ride_history::RideHistoryPager;
pub use session::{FileSessionPersistence, MemorySessionPersistence, SessionPersistence, SessionStore};
