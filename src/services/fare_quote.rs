// src/services/fare_quote.rs
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing;

use crate::{
    errors::ClientResult,
    models::{
        fare::{FareQuote, FareRequest, RouteRequest, RouteResult},
        ride::{Coordinate, QuoteKey, VehicleType},
    },
    services::api_client::BackendApi,
};

/// Result of one quote generation.
#[derive(Debug)]
pub struct QuoteOutcome {
    pub generation: u64,
    pub key: QuoteKey,
    pub result: ClientResult<(FareQuote, RouteResult)>,
}

/// Issues fare + route lookups and decides which response is still wanted.
///
/// Every request takes a new generation. Only the latest generation is
/// current; callers must drop any outcome for which [`Self::is_current`] is
/// false, however late or early it arrives.
pub struct FareQuoteCoordinator {
    api: Arc<dyn BackendApi>,
    latest: AtomicU64,
}

impl FareQuoteCoordinator {
    pub fn new(api: Arc<dyn BackendApi>) -> Self {
        Self {
            api,
            latest: AtomicU64::new(0),
        }
    }

    pub async fn request_quote(
        &self,
        pickup: Coordinate,
        dropoff: Coordinate,
        vehicle_type: VehicleType,
    ) -> QuoteOutcome {
        let key = QuoteKey {
            pickup,
            dropoff,
            vehicle_type,
        };
        let generation = self.begin();
        self.fetch(generation, key).await
    }

    /// Claim the next generation, superseding everything issued before it.
    pub fn begin(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Supersede outstanding requests without issuing a new one.
    pub fn invalidate(&self) {
        self.begin();
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == generation
    }

    /// Run the fare and route lookups for `generation` concurrently.
    pub async fn fetch(&self, generation: u64, key: QuoteKey) -> QuoteOutcome {
        tracing::debug!(generation, vehicle = key.vehicle_type.as_str(), "Requesting fare quote");

        let fare_request = FareRequest::from(&key);
        let route_request = RouteRequest::from(&key);
        let result = futures::future::try_join(
            self.api.calculate_fare(&fare_request),
            self.api.get_route(&route_request),
        )
        .await;

        match &result {
            Ok((quote, _)) => tracing::debug!(generation, total = quote.total_amount, "Fare quote resolved"),
            Err(e) => tracing::warn!(generation, "Fare quote failed: {}", e),
        }

        QuoteOutcome {
            generation,
            key,
            result,
        }
    }
}
