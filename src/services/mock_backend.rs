// src/services/mock_backend.rs
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::{
    errors::ClientError as AppError,
    models::{
        driver::{DriverStatus, NearbyCab},
        fare::{FareQuote, FareRequest, RouteRequest, RouteResult},
        ride::{BookRideRequest, Coordinate, Ride, RideId, RidePage, RideStatus, VehicleType},
        user::{AuthResponse, LoginRequest, RegisterRequest, UserIdentity, UserRole},
    },
    services::api_client::BackendApi,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Login,
    Register,
    Logout,
    Profile,
    BookRide,
    ListRides,
    CancelRide,
    RateRide,
    NearbyCabs,
    UpdateLocation,
    UpdateStatus,
    CalculateFare,
    Route,
}

/// A call as the backend saw it.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    Login(String),
    Register(String),
    Logout,
    Profile,
    BookRide(BookRideRequest),
    ListRides { page: u32, size: u32 },
    CancelRide(RideId),
    RateRide { ride_id: RideId, rating: u8 },
    NearbyCabs { center: Coordinate, radius_km: f64 },
    UpdateLocation(Coordinate),
    UpdateStatus(DriverStatus),
    CalculateFare(FareRequest),
    Route(RouteRequest),
}

impl ApiCall {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            ApiCall::Login(_) => Endpoint::Login,
            ApiCall::Register(_) => Endpoint::Register,
            ApiCall::Logout => Endpoint::Logout,
            ApiCall::Profile => Endpoint::Profile,
            ApiCall::BookRide(_) => Endpoint::BookRide,
            ApiCall::ListRides { .. } => Endpoint::ListRides,
            ApiCall::CancelRide(_) => Endpoint::CancelRide,
            ApiCall::RateRide { .. } => Endpoint::RateRide,
            ApiCall::NearbyCabs { .. } => Endpoint::NearbyCabs,
            ApiCall::UpdateLocation(_) => Endpoint::UpdateLocation,
            ApiCall::UpdateStatus(_) => Endpoint::UpdateStatus,
            ApiCall::CalculateFare(_) => Endpoint::CalculateFare,
            ApiCall::Route(_) => Endpoint::Route,
        }
    }
}

#[derive(Default)]
struct Script {
    calls: Vec<ApiCall>,
    failures: HashMap<Endpoint, usize>,
    delays: HashMap<Endpoint, Duration>,
    fare_delays: HashMap<VehicleType, Duration>,
    pages: HashMap<u32, RidePage>,
    nearby: Vec<NearbyCab>,
    next_ride_id: RideId,
}

/// Scripted in-process `BackendApi`: canned responses, injectable failures and
/// latencies, and a log of every call received.
#[derive(Default)]
pub struct MockBackend {
    script: Mutex<Script>,
}

impl MockBackend {
    pub const TOKEN: &'static str = "mock-token";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn identity() -> UserIdentity {
        UserIdentity {
            id: 7,
            first_name: "Asha".to_string(),
            last_name: "Rao".to_string(),
            email: Some("asha@example.com".to_string()),
            phone: None,
            role: UserRole::Rider,
        }
    }

    /// Default billing response, distinct per vehicle class.
    pub fn sample_quote(vehicle: VehicleType) -> FareQuote {
        let base_fare = match vehicle {
            VehicleType::Mini => 40.0,
            VehicleType::Sedan => 50.0,
            VehicleType::Suv => 80.0,
            VehicleType::Premium => 120.0,
        };
        let distance_charge = 42.0;
        let time_charge = 12.0;
        let surge_charge = 6.0;
        FareQuote {
            base_fare,
            distance_charge,
            time_charge,
            surge_multiplier: 1.1,
            surge_charge,
            discount: None,
            tax: None,
            total_amount: base_fare + distance_charge + time_charge + surge_charge,
            estimated_distance_km: 4.2,
            estimated_duration_minutes: 12,
        }
    }

    pub fn sample_route() -> RouteResult {
        RouteResult {
            polyline: vec![
                Coordinate::new(19.0760, 72.8777),
                Coordinate::new(19.0880, 72.8890),
                Coordinate::new(19.10, 72.90),
            ],
            distance_km: Some(4.2),
            duration_minutes: Some(12),
        }
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the next `times` calls to `endpoint` with a server error.
    pub fn fail(&self, endpoint: Endpoint, times: usize) {
        *self.script().failures.entry(endpoint).or_default() += times;
    }

    pub fn delay(&self, endpoint: Endpoint, latency: Duration) {
        self.script().delays.insert(endpoint, latency);
    }

    pub fn delay_fare(&self, vehicle: VehicleType, latency: Duration) {
        self.script().fare_delays.insert(vehicle, latency);
    }

    pub fn set_page(&self, page: u32, content: Vec<Ride>, last: bool) {
        self.script().pages.insert(
            page,
            RidePage {
                content,
                last,
                number: Some(page),
                total_elements: None,
            },
        );
    }

    pub fn set_nearby(&self, cabs: Vec<NearbyCab>) {
        self.script().nearby = cabs;
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.script().calls.clone()
    }

    pub fn calls_to(&self, endpoint: Endpoint) -> Vec<ApiCall> {
        self.script()
            .calls
            .iter()
            .filter(|c| c.endpoint() == endpoint)
            .cloned()
            .collect()
    }

    pub fn count(&self, endpoint: Endpoint) -> usize {
        self.calls_to(endpoint).len()
    }

    async fn record(&self, call: ApiCall) -> Result<(), AppError> {
        let endpoint = call.endpoint();
        let (latency, failure) = {
            let mut script = self.script();
            let latency = match &call {
                ApiCall::CalculateFare(request) => script
                    .fare_delays
                    .get(&request.vehicle_type)
                    .or_else(|| script.delays.get(&endpoint))
                    .copied(),
                _ => script.delays.get(&endpoint).copied(),
            };
            script.calls.push(call);
            let failure = match script.failures.get_mut(&endpoint) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            };
            (latency, failure)
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if failure {
            return Err(AppError::server(500, format!("{:?} failed", endpoint)));
        }
        Ok(())
    }

    fn auth_response() -> AuthResponse {
        AuthResponse {
            access_token: Self::TOKEN.to_string(),
            refresh_token: None,
            token_type: Some("Bearer".to_string()),
            expires_in: Some(3600),
            user: Self::identity(),
        }
    }
}

#[async_trait]
impl BackendApi for MockBackend {
    async fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse, AppError> {
        self.record(ApiCall::Login(credentials.email.clone())).await?;
        Ok(Self::auth_response())
    }

    async fn register(&self, registration: &RegisterRequest) -> Result<AuthResponse, AppError> {
        self.record(ApiCall::Register(registration.email.clone())).await?;
        let mut response = Self::auth_response();
        response.user.role = registration.role;
        Ok(response)
    }

    async fn logout(&self) -> Result<(), AppError> {
        self.record(ApiCall::Logout).await
    }

    async fn get_profile(&self) -> Result<UserIdentity, AppError> {
        self.record(ApiCall::Profile).await?;
        Ok(Self::identity())
    }

    async fn book_ride(&self, request: &BookRideRequest) -> Result<Ride, AppError> {
        self.record(ApiCall::BookRide(request.clone())).await?;
        let id = {
            let mut script = self.script();
            script.next_ride_id += 1;
            script.next_ride_id
        };
        Ok(Ride {
            id,
            status: RideStatus::Requested,
            pickup_address: Some(request.pickup_address.clone()),
            dropoff_address: Some(request.dropoff_address.clone()),
            vehicle_type: Some(request.vehicle_type),
            distance_km: None,
            estimated_fare: None,
            actual_fare: None,
            driver_info: None,
            rating: None,
            created_at: None,
        })
    }

    async fn list_rides(&self, page: u32, size: u32) -> Result<RidePage, AppError> {
        self.record(ApiCall::ListRides { page, size }).await?;
        self.script()
            .pages
            .get(&page)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("page {}", page)))
    }

    async fn cancel_ride(&self, ride_id: RideId) -> Result<(), AppError> {
        self.record(ApiCall::CancelRide(ride_id)).await
    }

    async fn rate_ride(&self, ride_id: RideId, rating: u8) -> Result<(), AppError> {
        self.record(ApiCall::RateRide { ride_id, rating }).await
    }

    async fn nearby_cabs(&self, center: Coordinate, radius_km: f64) -> Result<Vec<NearbyCab>, AppError> {
        self.record(ApiCall::NearbyCabs { center, radius_km }).await?;
        Ok(self.script().nearby.clone())
    }

    async fn update_location(&self, position: Coordinate) -> Result<(), AppError> {
        self.record(ApiCall::UpdateLocation(position)).await
    }

    async fn update_status(&self, status: DriverStatus) -> Result<(), AppError> {
        self.record(ApiCall::UpdateStatus(status)).await
    }

    async fn calculate_fare(&self, request: &FareRequest) -> Result<FareQuote, AppError> {
        self.record(ApiCall::CalculateFare(request.clone())).await?;
        Ok(Self::sample_quote(request.vehicle_type))
    }

    async fn get_route(&self, request: &RouteRequest) -> Result<RouteResult, AppError> {
        self.record(ApiCall::Route(request.clone())).await?;
        Ok(Self::sample_route())
    }
}
