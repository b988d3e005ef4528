// src/models/driver.rs
use serde::{Deserialize, Serialize};

use crate::models::ride::Coordinate;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverStatus {
    #[default]
    Offline,   // Not accepting dispatch
    Available, // Online and sending location heartbeats
    Busy,      // On an accepted ride
}

impl DriverStatus {
    pub fn can_transition_to(&self, next: DriverStatus) -> bool {
        use DriverStatus::*;
        matches!(
            (self, next),
            (Offline, Available) | (Available, Offline) | (Available, Busy) | (Busy, Available)
        )
    }
}

/// Driver dashboard state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverState {
    pub status: DriverStatus,
    pub today_rides: u32,
    pub today_earnings: f64,
    pub rating: f64,
}

/// Incoming dispatch offer shown to an available driver.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RideRequest {
    pub id: String,
    pub pickup_address: String,
    pub dropoff_address: String,
    pub distance_to_pickup: f64,
    pub estimated_fare: f64,
}

/// A cab returned by `GET /cabs/nearby`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NearbyCab {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(alias = "currentLatitude")]
    pub latitude: f64,
    #[serde(alias = "currentLongitude")]
    pub longitude: f64,
    #[serde(default)]
    pub driver_name: Option<String>,
}

impl NearbyCab {
    pub fn position(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    pub fn label(&self) -> &str {
        self.driver_name.as_deref().unwrap_or("Available Cab")
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LocationUpdate {
    pub latitude: f64,
    pub longitude: f64,
}

impl From<Coordinate> for LocationUpdate {
    fn from(position: Coordinate) -> Self {
        LocationUpdate {
            latitude: position.latitude,
            longitude: position.longitude,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: DriverStatus,
}
