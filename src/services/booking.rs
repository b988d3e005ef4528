// src/services/booking.rs
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing;

use crate::{
    errors::{ClientError as AppError, ClientResult},
    models::{
        fare::{FareQuote, RouteResult},
        ride::{Coordinate, QuoteKey, Ride, RideDraft, VehicleType},
    },
    services::{api_client::BackendApi, fare_quote::FareQuoteCoordinator},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingPhase {
    Draft,     // No confirmed booking, quote absent
    Quoting,   // Fare/route lookup in flight
    Quoted,    // Quote shown, awaiting confirmation
    Searching, // Booking submitted
    Confirmed,
    Failed,    // Booking rejected, draft kept for retry
}

/// What the booking screen renders.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingView {
    pub phase: BookingPhase,
    pub draft: RideDraft,
    pub quote: Option<FareQuote>,
    pub route: Option<RouteResult>,
    pub ride: Option<Ride>,
    pub last_error: Option<String>,
}

#[derive(Debug)]
struct BookingState {
    phase: BookingPhase,
    draft: RideDraft,
    quote: Option<FareQuote>,
    route: Option<RouteResult>,
    ride: Option<Ride>,
    last_error: Option<String>,
    // Inputs of the most recent quote request; edits that keep them are not re-quoted.
    requested_key: Option<QuoteKey>,
    pending_quote: Option<u64>,
    booking_attempt: u64,
    disposed: bool,
}

impl BookingState {
    fn fresh(booking_attempt: u64, disposed: bool) -> Self {
        Self {
            phase: BookingPhase::Draft,
            draft: RideDraft::default(),
            quote: None,
            route: None,
            ride: None,
            last_error: None,
            requested_key: None,
            pending_quote: None,
            booking_attempt,
            disposed,
        }
    }
}

/// Rider booking lifecycle: draft, quote, confirm.
pub struct BookingStateMachine {
    api: Arc<dyn BackendApi>,
    quotes: FareQuoteCoordinator,
    state: Mutex<BookingState>,
}

impl BookingStateMachine {
    pub fn new(api: Arc<dyn BackendApi>) -> Self {
        Self {
            quotes: FareQuoteCoordinator::new(api.clone()),
            api,
            state: Mutex::new(BookingState::fresh(0, false)),
        }
    }

    fn state(&self) -> MutexGuard<'_, BookingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn coordinator(&self) -> &FareQuoteCoordinator {
        &self.quotes
    }

    pub fn phase(&self) -> BookingPhase {
        self.state().phase
    }

    pub fn snapshot(&self) -> BookingView {
        let state = self.state();
        BookingView {
            phase: state.phase,
            draft: state.draft.clone(),
            quote: state.quote.clone(),
            route: state.route.clone(),
            ride: state.ride.clone(),
            last_error: state.last_error.clone(),
        }
    }

    /// Set the pickup point. Without an address the coordinates are used.
    pub async fn set_pickup(&self, position: Coordinate, address: Option<String>) -> ClientResult<()> {
        let address = address.unwrap_or_else(|| position.fallback_address());
        self.edit_and_quote(move |draft| {
            draft.pickup = Some(position);
            draft.pickup_address = address;
        })
        .await
    }

    pub async fn set_dropoff(&self, position: Coordinate, address: Option<String>) -> ClientResult<()> {
        let address = address.unwrap_or_else(|| position.fallback_address());
        self.edit_and_quote(move |draft| {
            draft.dropoff = Some(position);
            draft.dropoff_address = address;
        })
        .await
    }

    pub async fn set_vehicle_type(&self, vehicle_type: VehicleType) -> ClientResult<()> {
        self.edit_and_quote(move |draft| draft.vehicle_type = vehicle_type)
            .await
    }

    /// Map click: fills pickup first, then dropoff; ignored once both are set.
    pub async fn pick_on_map(&self, position: Coordinate) -> ClientResult<()> {
        let (has_pickup, has_dropoff) = {
            let state = self.state();
            (state.draft.pickup.is_some(), state.draft.dropoff.is_some())
        };
        match (has_pickup, has_dropoff) {
            (false, _) => self.set_pickup(position, None).await,
            (true, false) => self.set_dropoff(position, None).await,
            (true, true) => Ok(()),
        }
    }

    async fn edit_and_quote<F>(&self, edit: F) -> ClientResult<()>
    where
        F: FnOnce(&mut RideDraft),
    {
        let ticket = {
            let mut state = self.state();
            if state.disposed {
                return Err(AppError::Disposed);
            }
            if matches!(state.phase, BookingPhase::Searching | BookingPhase::Confirmed) {
                return Err(AppError::invalid_state("edit the ride draft", state.phase));
            }

            edit(&mut state.draft);

            match state.draft.quote_key() {
                Some(key) if state.requested_key != Some(key) => {
                    let generation = self.quotes.begin();
                    state.requested_key = Some(key);
                    state.pending_quote = Some(generation);
                    state.quote = None;
                    state.route = None;
                    state.phase = BookingPhase::Quoting;
                    Some((generation, key))
                }
                _ => None,
            }
        };

        if let Some((generation, key)) = ticket {
            let outcome = self.quotes.fetch(generation, key).await;
            match outcome.result {
                Ok((quote, route)) => {
                    self.on_quote_result(outcome.generation, quote, route);
                }
                Err(_) => {
                    self.on_quote_error(outcome.generation);
                }
            }
        }
        Ok(())
    }

    fn accepts_quote(&self, state: &BookingState, generation: u64) -> bool {
        !state.disposed
            && state.pending_quote == Some(generation)
            && self.quotes.is_current(generation)
    }

    /// Apply a resolved quote. Returns false when the generation was superseded.
    pub fn on_quote_result(&self, generation: u64, quote: FareQuote, route: RouteResult) -> bool {
        let mut state = self.state();
        if !self.accepts_quote(&state, generation) {
            tracing::debug!(generation, "Discarding superseded fare quote");
            return false;
        }
        state.quote = Some(quote);
        state.route = Some(route);
        state.pending_quote = None;
        state.phase = BookingPhase::Quoted;
        true
    }

    /// Drop back to `Draft` keeping the locations; the next edit re-quotes.
    pub fn on_quote_error(&self, generation: u64) -> bool {
        let mut state = self.state();
        if !self.accepts_quote(&state, generation) {
            tracing::debug!(generation, "Discarding superseded fare quote failure");
            return false;
        }
        state.quote = None;
        state.route = None;
        state.pending_quote = None;
        state.requested_key = None;
        state.phase = BookingPhase::Draft;
        true
    }

    /// Submit the quoted draft as a booking. Exactly one request per call.
    pub async fn confirm(&self) -> ClientResult<Ride> {
        let (attempt, request) = {
            let mut state = self.state();
            if state.disposed {
                return Err(AppError::Disposed);
            }
            if !matches!(state.phase, BookingPhase::Quoted | BookingPhase::Failed) || state.quote.is_none() {
                return Err(AppError::invalid_state("confirm a booking", state.phase));
            }
            let request = state
                .draft
                .to_booking_request()
                .ok_or(AppError::MissingLocations)?;
            state.booking_attempt += 1;
            state.phase = BookingPhase::Searching;
            state.last_error = None;
            (state.booking_attempt, request)
        };

        tracing::info!(
            vehicle = request.vehicle_type.as_str(),
            "Booking ride from {} to {}",
            request.pickup_address,
            request.dropoff_address
        );
        let result = self.api.book_ride(&request).await;

        let mut state = self.state();
        if state.disposed || state.booking_attempt != attempt {
            tracing::debug!("Booking response arrived after the screen moved on, ignoring");
            return result;
        }
        match result {
            Ok(ride) => {
                tracing::info!("Ride {} confirmed", ride.id);
                state.ride = Some(ride.clone());
                state.phase = BookingPhase::Confirmed;
                Ok(ride)
            }
            Err(e) => {
                tracing::warn!("Booking failed: {}", e);
                state.last_error = Some(e.to_string());
                state.phase = BookingPhase::Failed;
                Err(e)
            }
        }
    }

    /// Clear the draft and quote. Valid from any phase.
    pub fn reset(&self) {
        self.quotes.invalidate();
        let mut state = self.state();
        let next_attempt = state.booking_attempt + 1;
        let disposed = state.disposed;
        *state = BookingState::fresh(next_attempt, disposed);
        tracing::debug!("Booking draft reset");
    }

    /// Abandon in-flight requests when the booking screen goes away.
    pub fn dispose(&self) {
        self.quotes.invalidate();
        let mut state = self.state();
        state.disposed = true;
        state.booking_attempt += 1;
        state.pending_quote = None;
    }
}
