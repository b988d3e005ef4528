// src/services/ride_history.rs
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing;

use crate::{
    errors::{ClientError as AppError, ClientResult},
    models::ride::{apply_cancel, apply_rating, Ride, RideId},
    services::api_client::BackendApi,
};

#[derive(Debug, Default)]
struct HistoryState {
    rides: Vec<Ride>,
    loaded_page: Option<u32>,
    last_page_seen: bool,
    in_flight: Option<u32>,
    // Rides with a cancel or rate request outstanding.
    mutating: HashSet<RideId>,
}

/// The rider's ride history, loaded a page at a time.
pub struct RideHistoryPager {
    api: Arc<dyn BackendApi>,
    page_size: u32,
    state: Mutex<HistoryState>,
}

// Clears the in-flight marker however the fetch ends, including cancellation.
struct InFlight<'a> {
    state: &'a Mutex<HistoryState>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .in_flight = None;
    }
}

struct Mutating<'a> {
    state: &'a Mutex<HistoryState>,
    ride_id: RideId,
}

impl Drop for Mutating<'_> {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .mutating
            .remove(&self.ride_id);
    }
}

impl RideHistoryPager {
    pub fn new(api: Arc<dyn BackendApi>, page_size: u32) -> Self {
        Self {
            api,
            page_size,
            state: Mutex::new(HistoryState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, HistoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn rides(&self) -> Vec<Ride> {
        self.state().rides.clone()
    }

    pub fn has_more(&self) -> bool {
        !self.state().last_page_seen
    }

    pub fn loaded_page(&self) -> Option<u32> {
        self.state().loaded_page
    }

    pub fn is_loading(&self) -> bool {
        self.state().in_flight.is_some()
    }

    /// Fetch page `page`. Page 0 replaces the list, later pages append.
    /// Returns the number of rides received.
    pub async fn load_page(&self, page: u32) -> ClientResult<usize> {
        {
            let mut state = self.state();
            if let Some(in_flight) = state.in_flight {
                return Err(AppError::PageFetchInProgress {
                    requested: page,
                    in_flight,
                });
            }
            state.in_flight = Some(page);
        }
        let _in_flight = InFlight { state: &self.state };

        tracing::debug!("Loading ride history page {} (size {})", page, self.page_size);
        let fetched = match self.api.list_rides(page, self.page_size).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::warn!("Failed to load ride history page {}: {}", page, e);
                return Err(e);
            }
        };

        let count = fetched.content.len();
        let mut state = self.state();
        if page == 0 {
            state.rides = fetched.content;
        } else {
            state.rides.extend(fetched.content);
        }
        state.loaded_page = Some(page);
        state.last_page_seen = fetched.last;
        Ok(count)
    }

    /// Fetch the page after the last one loaded. No-op once the last page is in.
    pub async fn load_more(&self) -> ClientResult<usize> {
        let next = {
            let state = self.state();
            if state.last_page_seen {
                return Ok(0);
            }
            state.loaded_page.map_or(0, |p| p + 1)
        };
        self.load_page(next).await
    }

    /// Cancel a ride that no driver has picked up yet.
    pub async fn cancel(&self, ride_id: RideId) -> ClientResult<()> {
        let _mutating = self.claim(ride_id, "cancel a ride", Ride::can_cancel)?;

        if let Err(e) = self.api.cancel_ride(ride_id).await {
            tracing::warn!("Failed to cancel ride {}: {}", ride_id, e);
            return Err(e);
        }

        apply_cancel(&mut self.state().rides, ride_id);
        tracing::info!("Ride {} cancelled", ride_id);
        Ok(())
    }

    /// Rate a completed ride, once.
    pub async fn rate(&self, ride_id: RideId, rating: u8) -> ClientResult<()> {
        if !(1..=5).contains(&rating) {
            return Err(AppError::validation_error(
                "rating",
                "Rating must be between 1 and 5",
            ));
        }
        let _mutating = self.claim(ride_id, "rate a ride", Ride::can_rate)?;

        if let Err(e) = self.api.rate_ride(ride_id, rating).await {
            tracing::warn!("Failed to rate ride {}: {}", ride_id, e);
            return Err(e);
        }

        apply_rating(&mut self.state().rides, ride_id, rating);
        tracing::info!("Ride {} rated {}", ride_id, rating);
        Ok(())
    }

    // One outstanding mutation per ride; a second caller is refused until the
    // first settles.
    fn claim(
        &self,
        ride_id: RideId,
        operation: &'static str,
        allowed: fn(&Ride) -> bool,
    ) -> ClientResult<Mutating<'_>> {
        let mut state = self.state();
        let ride = find(&state.rides, ride_id)?;
        if !allowed(ride) {
            return Err(AppError::invalid_state(operation, ride.status));
        }
        if !state.mutating.insert(ride_id) {
            return Err(AppError::invalid_state(operation, "update already pending"));
        }
        Ok(Mutating {
            state: &self.state,
            ride_id,
        })
    }
}

fn find(rides: &[Ride], ride_id: RideId) -> ClientResult<&Ride> {
    rides
        .iter()
        .find(|r| r.id == ride_id)
        .ok_or(AppError::RideNotFound(ride_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ride::{sample_ride, RideStatus};
    use crate::services::mock_backend::{ApiCall, Endpoint, MockBackend};
    use std::time::Duration;

    fn rides(ids: std::ops::Range<RideId>, status: RideStatus) -> Vec<Ride> {
        ids.map(|id| sample_ride(id, status)).collect()
    }

    fn pager(api: &Arc<MockBackend>) -> RideHistoryPager {
        RideHistoryPager::new(api.clone(), 10)
    }

    #[tokio::test]
    async fn test_two_pages_concatenate() {
        let api = Arc::new(MockBackend::new());
        api.set_page(0, rides(1..11, RideStatus::Completed), false);
        api.set_page(1, rides(11..15, RideStatus::Completed), true);
        let pager = pager(&api);

        assert_eq!(pager.load_page(0).await.unwrap(), 10);
        assert!(pager.has_more());
        assert_eq!(pager.load_page(1).await.unwrap(), 4);

        assert_eq!(pager.rides().len(), 14);
        assert!(!pager.has_more());
        assert_eq!(
            api.calls_to(Endpoint::ListRides),
            vec![
                ApiCall::ListRides { page: 0, size: 10 },
                ApiCall::ListRides { page: 1, size: 10 },
            ]
        );
    }

    #[tokio::test]
    async fn test_reloading_first_page_replaces() {
        let api = Arc::new(MockBackend::new());
        api.set_page(0, rides(1..4, RideStatus::Completed), true);
        let pager = pager(&api);

        pager.load_page(0).await.unwrap();
        pager.load_page(0).await.unwrap();
        assert_eq!(pager.rides().len(), 3);
    }

    #[tokio::test]
    async fn test_load_more_walks_pages_and_stops_at_last() {
        let api = Arc::new(MockBackend::new());
        api.set_page(0, rides(1..11, RideStatus::Completed), false);
        api.set_page(1, rides(11..13, RideStatus::Completed), true);
        let pager = pager(&api);

        pager.load_more().await.unwrap();
        pager.load_more().await.unwrap();
        assert_eq!(pager.load_more().await.unwrap(), 0);

        assert_eq!(pager.rides().len(), 12);
        assert_eq!(api.count(Endpoint::ListRides), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_page_fetch_is_rejected() {
        let api = Arc::new(MockBackend::new());
        api.set_page(0, rides(1..11, RideStatus::Completed), false);
        api.set_page(1, rides(11..15, RideStatus::Completed), true);
        api.delay(Endpoint::ListRides, Duration::from_secs(2));
        let pager = pager(&api);

        let (first, second) = tokio::join!(pager.load_page(0), pager.load_page(1));
        assert_eq!(first.unwrap(), 10);
        assert!(matches!(
            second,
            Err(AppError::PageFetchInProgress { requested: 1, in_flight: 0 })
        ));
        assert!(!pager.is_loading());
        assert_eq!(api.count(Endpoint::ListRides), 1);
    }

    #[tokio::test]
    async fn test_failed_page_leaves_list_and_allows_retry() {
        let api = Arc::new(MockBackend::new());
        api.set_page(0, rides(1..11, RideStatus::Completed), false);
        api.set_page(1, rides(11..15, RideStatus::Completed), true);
        let pager = pager(&api);
        pager.load_page(0).await.unwrap();

        api.fail(Endpoint::ListRides, 1);
        assert!(pager.load_more().await.is_err());
        assert_eq!(pager.rides().len(), 10);
        assert!(!pager.is_loading());

        pager.load_more().await.unwrap();
        assert_eq!(pager.rides().len(), 14);
    }

    #[tokio::test]
    async fn test_cancel_patches_locally_without_refetch() {
        let api = Arc::new(MockBackend::new());
        api.set_page(0, vec![sample_ride(1, RideStatus::Requested)], true);
        let pager = pager(&api);
        pager.load_page(0).await.unwrap();

        pager.cancel(1).await.unwrap();

        assert_eq!(pager.rides()[0].status, RideStatus::Cancelled);
        assert_eq!(api.count(Endpoint::CancelRide), 1);
        assert_eq!(api.count(Endpoint::ListRides), 1);
    }

    #[tokio::test]
    async fn test_cancel_rules() {
        let api = Arc::new(MockBackend::new());
        api.set_page(
            0,
            vec![
                sample_ride(1, RideStatus::InProgress),
                sample_ride(2, RideStatus::Accepted),
            ],
            true,
        );
        let pager = pager(&api);
        pager.load_page(0).await.unwrap();

        assert!(matches!(pager.cancel(1).await, Err(AppError::InvalidState { .. })));
        assert!(matches!(pager.cancel(99).await, Err(AppError::RideNotFound(99))));
        assert_eq!(api.count(Endpoint::CancelRide), 0);

        api.fail(Endpoint::CancelRide, 1);
        assert!(pager.cancel(2).await.is_err());
        assert_eq!(pager.rides()[1].status, RideStatus::Accepted);
    }

    #[tokio::test]
    async fn test_rating_is_write_once() {
        let api = Arc::new(MockBackend::new());
        api.set_page(0, vec![sample_ride(5, RideStatus::Completed)], true);
        let pager = pager(&api);
        pager.load_page(0).await.unwrap();

        pager.rate(5, 4).await.unwrap();
        assert_eq!(pager.rides()[0].rating, Some(4));

        assert!(pager.rate(5, 5).await.is_err());
        assert_eq!(pager.rides()[0].rating, Some(4));
        assert_eq!(api.count(Endpoint::RateRide), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_ratings_send_one_request() {
        let api = Arc::new(MockBackend::new());
        api.set_page(0, vec![sample_ride(5, RideStatus::Completed)], true);
        api.delay(Endpoint::RateRide, Duration::from_secs(1));
        let pager = pager(&api);
        pager.load_page(0).await.unwrap();

        let (first, second) = tokio::join!(pager.rate(5, 4), pager.rate(5, 1));
        assert!(first.is_ok());
        assert!(matches!(second, Err(AppError::InvalidState { .. })));
        assert_eq!(
            api.calls_to(Endpoint::RateRide),
            vec![ApiCall::RateRide { ride_id: 5, rating: 4 }]
        );
        assert_eq!(pager.rides()[0].rating, Some(4));

        // Settled: the ride is rated, so a later attempt is refused by state.
        assert!(pager.rate(5, 2).await.is_err());
        assert_eq!(api.count(Endpoint::RateRide), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cancel_releases_the_ride() {
        let api = Arc::new(MockBackend::new());
        api.set_page(0, vec![sample_ride(1, RideStatus::Requested)], true);
        api.delay(Endpoint::CancelRide, Duration::from_secs(1));
        api.fail(Endpoint::CancelRide, 1);
        let pager = pager(&api);
        pager.load_page(0).await.unwrap();

        let (first, second) = tokio::join!(pager.cancel(1), pager.cancel(1));
        assert!(first.is_err() && second.is_err());
        assert_eq!(api.count(Endpoint::CancelRide), 1);

        pager.cancel(1).await.unwrap();
        assert_eq!(pager.rides()[0].status, RideStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_rating_validation_and_failure() {
        let api = Arc::new(MockBackend::new());
        api.set_page(
            0,
            vec![
                sample_ride(5, RideStatus::Completed),
                sample_ride(6, RideStatus::Cancelled),
            ],
            true,
        );
        let pager = pager(&api);
        pager.load_page(0).await.unwrap();

        assert!(matches!(pager.rate(5, 0).await, Err(AppError::ValidationFailed(_))));
        assert!(matches!(pager.rate(5, 6).await, Err(AppError::ValidationFailed(_))));
        assert!(matches!(pager.rate(6, 3).await, Err(AppError::InvalidState { .. })));

        api.fail(Endpoint::RateRide, 1);
        assert!(pager.rate(5, 3).await.is_err());
        assert_eq!(pager.rides()[0].rating, None);
        assert_eq!(api.count(Endpoint::RateRide), 1);
    }
}
