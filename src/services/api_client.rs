// src/services/api_client.rs
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing;
use uuid::Uuid;

use crate::{
    config::ClientConfig,
    errors::{ClientError as AppError, ClientResult},
    models::{
        driver::{DriverStatus, LocationUpdate, NearbyCab, StatusUpdate},
        fare::{FareQuote, FareRequest, RouteRequest, RouteResult},
        ride::{BookRideRequest, Coordinate, RateRideRequest, Ride, RideId, RidePage},
        user::{AuthResponse, LoginRequest, RegisterRequest, UserIdentity},
    },
    services::session::SessionStore,
};

/// HTTP contract of the backend services the client orchestrates.
#[async_trait]
pub trait BackendApi: Send + Sync {
    async fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse, AppError>;
    async fn register(&self, registration: &RegisterRequest) -> Result<AuthResponse, AppError>;
    async fn logout(&self) -> Result<(), AppError>;
    async fn get_profile(&self) -> Result<UserIdentity, AppError>;

    async fn book_ride(&self, request: &BookRideRequest) -> Result<Ride, AppError>;
    async fn list_rides(&self, page: u32, size: u32) -> Result<RidePage, AppError>;
    async fn cancel_ride(&self, ride_id: RideId) -> Result<(), AppError>;
    async fn rate_ride(&self, ride_id: RideId, rating: u8) -> Result<(), AppError>;

    async fn nearby_cabs(&self, center: Coordinate, radius_km: f64) -> Result<Vec<NearbyCab>, AppError>;
    async fn update_location(&self, position: Coordinate) -> Result<(), AppError>;
    async fn update_status(&self, status: DriverStatus) -> Result<(), AppError>;

    async fn calculate_fare(&self, request: &FareRequest) -> Result<FareQuote, AppError>;
    async fn get_route(&self, request: &RouteRequest) -> Result<RouteResult, AppError>;
}

/// `BackendApi` over HTTP through the API gateway.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig, session: Arc<SessionStore>) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            session,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let request_id = Uuid::new_v4();
        tracing::debug!(%request_id, "{} {}", method, url);

        let mut builder = self
            .client
            .request(method, url)
            .header("X-Request-Id", request_id.to_string());
        if let Some(token) = self.session.token() {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn execute(&self, builder: RequestBuilder) -> ClientResult<reqwest::Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let error = AppError::from_status(status, &body);
        if error.is_auth_failure() {
            self.session.handle_unauthorized().await;
        }
        tracing::debug!("Backend returned {}: {}", status, error);
        Err(error)
    }

    async fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ClientResult<T> {
        let response = self.execute(builder).await?;
        Ok(response.json::<T>().await?)
    }

    // Acknowledgement bodies are not part of the contract.
    async fn send(&self, builder: RequestBuilder) -> ClientResult<()> {
        self.execute(builder).await.map(|_| ())
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse, AppError> {
        self.fetch(self.request(Method::POST, "/users/auth/login").json(credentials))
            .await
    }

    async fn register(&self, registration: &RegisterRequest) -> Result<AuthResponse, AppError> {
        self.fetch(self.request(Method::POST, "/users/auth/register").json(registration))
            .await
    }

    async fn logout(&self) -> Result<(), AppError> {
        self.send(self.request(Method::POST, "/users/auth/logout")).await
    }

    async fn get_profile(&self) -> Result<UserIdentity, AppError> {
        self.fetch(self.request(Method::GET, "/users/profile")).await
    }

    async fn book_ride(&self, request: &BookRideRequest) -> Result<Ride, AppError> {
        self.fetch(self.request(Method::POST, "/rides").json(request)).await
    }

    async fn list_rides(&self, page: u32, size: u32) -> Result<RidePage, AppError> {
        let builder = self
            .request(Method::GET, "/rides")
            .query(&[("page", page), ("size", size)]);
        self.fetch(builder).await
    }

    async fn cancel_ride(&self, ride_id: RideId) -> Result<(), AppError> {
        self.send(self.request(Method::POST, &format!("/rides/{}/cancel", ride_id)))
            .await
    }

    async fn rate_ride(&self, ride_id: RideId, rating: u8) -> Result<(), AppError> {
        let builder = self
            .request(Method::POST, &format!("/rides/{}/rate", ride_id))
            .json(&RateRideRequest { rating });
        self.send(builder).await
    }

    async fn nearby_cabs(&self, center: Coordinate, radius_km: f64) -> Result<Vec<NearbyCab>, AppError> {
        let builder = self.request(Method::GET, "/cabs/nearby").query(&[
            ("latitude", center.latitude),
            ("longitude", center.longitude),
            ("radiusKm", radius_km),
        ]);
        self.fetch(builder).await
    }

    async fn update_location(&self, position: Coordinate) -> Result<(), AppError> {
        let builder = self
            .request(Method::PUT, "/cabs/location")
            .json(&LocationUpdate::from(position));
        self.send(builder).await
    }

    async fn update_status(&self, status: DriverStatus) -> Result<(), AppError> {
        let builder = self
            .request(Method::PUT, "/cabs/status")
            .json(&StatusUpdate { status });
        self.send(builder).await
    }

    async fn calculate_fare(&self, request: &FareRequest) -> Result<FareQuote, AppError> {
        self.fetch(self.request(Method::POST, "/billing/calculate-fare").json(request))
            .await
    }

    async fn get_route(&self, request: &RouteRequest) -> Result<RouteResult, AppError> {
        self.fetch(self.request(Method::POST, "/routing/route").json(request))
            .await
    }
}
