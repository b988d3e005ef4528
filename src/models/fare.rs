// src/models/fare.rs
use serde::{Deserialize, Serialize};

use crate::models::ride::{Coordinate, QuoteKey, VehicleType};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FareRequest {
    pub pickup_latitude: f64,
    pub pickup_longitude: f64,
    pub dropoff_latitude: f64,
    pub dropoff_longitude: f64,
    pub vehicle_type: VehicleType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promo_code: Option<String>,
}

impl From<&QuoteKey> for FareRequest {
    fn from(key: &QuoteKey) -> Self {
        FareRequest {
            pickup_latitude: key.pickup.latitude,
            pickup_longitude: key.pickup.longitude,
            dropoff_latitude: key.dropoff.latitude,
            dropoff_longitude: key.dropoff.longitude,
            vehicle_type: key.vehicle_type,
            promo_code: None,
        }
    }
}

/// Fare estimate as computed by the billing service.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FareQuote {
    pub base_fare: f64,
    pub distance_charge: f64,
    pub time_charge: f64,
    #[serde(default = "unit_multiplier")]
    pub surge_multiplier: f64,
    #[serde(default)]
    pub surge_charge: f64,
    #[serde(default)]
    pub discount: Option<f64>,
    #[serde(default)]
    pub tax: Option<f64>,
    pub total_amount: f64,
    pub estimated_distance_km: f64,
    pub estimated_duration_minutes: u32,
}

fn unit_multiplier() -> f64 {
    1.0
}

impl FareQuote {
    /// Sum of the itemised charges, before discount and tax.
    pub fn itemised_total(&self) -> f64 {
        self.base_fare + self.distance_charge + self.time_charge + self.surge_charge
    }

    pub fn has_surge(&self) -> bool {
        self.surge_charge > 0.0
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequest {
    pub start_latitude: f64,
    pub start_longitude: f64,
    pub end_latitude: f64,
    pub end_longitude: f64,
    pub vehicle_type: VehicleType,
}

impl From<&QuoteKey> for RouteRequest {
    fn from(key: &QuoteKey) -> Self {
        RouteRequest {
            start_latitude: key.pickup.latitude,
            start_longitude: key.pickup.longitude,
            end_latitude: key.dropoff.latitude,
            end_longitude: key.dropoff.longitude,
            vehicle_type: key.vehicle_type,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RouteResult {
    #[serde(default)]
    pub polyline: Vec<Coordinate>,
    #[serde(default)]
    pub distance_km: Option<f64>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}
