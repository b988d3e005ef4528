// src/models/ride.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

pub type RideId = i64;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Address shown for a map-picked point that has no geocoded address.
    pub fn fallback_address(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleType {
    Mini,
    #[default]
    Sedan,
    Suv,
    Premium,
}

impl VehicleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Mini => "MINI",
            VehicleType::Sedan => "SEDAN",
            VehicleType::Suv => "SUV",
            VehicleType::Premium => "PREMIUM",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    Requested,       // Booking accepted by the ride service
    SearchingDriver, // Matching in progress
    Accepted,        // Driver assigned
    #[serde(alias = "ARRIVED")]
    DriverArrived,   // Driver waiting at pickup
    InProgress,
    Completed,
    Cancelled,
}

impl RideStatus {
    /// Successor set of the ride lifecycle. Transitions never go backwards.
    pub fn successors(&self) -> &'static [RideStatus] {
        use RideStatus::*;
        match self {
            Requested => &[SearchingDriver, Accepted, Cancelled],
            SearchingDriver => &[Accepted, Cancelled],
            Accepted => &[DriverArrived, Cancelled],
            DriverArrived => &[InProgress, Cancelled],
            InProgress => &[Completed],
            Completed | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: RideStatus) -> bool {
        self.successors().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }

    /// Riders may cancel until a driver is on the way to them.
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            RideStatus::Requested | RideStatus::SearchingDriver | RideStatus::Accepted
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            RideStatus::Requested | RideStatus::SearchingDriver => "Looking for driver",
            RideStatus::Accepted => "Driver assigned",
            RideStatus::DriverArrived => "Driver arrived",
            RideStatus::InProgress => "In progress",
            RideStatus::Completed => "Completed",
            RideStatus::Cancelled => "Cancelled",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverInfo {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub vehicle_number: Option<String>,
    #[serde(default)]
    pub vehicle_model: Option<String>,
    #[serde(default)]
    pub vehicle_color: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ride {
    pub id: RideId,
    pub status: RideStatus,
    #[serde(default)]
    pub pickup_address: Option<String>,
    #[serde(default)]
    pub dropoff_address: Option<String>,
    #[serde(default)]
    pub vehicle_type: Option<VehicleType>,
    #[serde(default)]
    pub distance_km: Option<f64>,
    #[serde(default)]
    pub estimated_fare: Option<f64>,
    #[serde(default)]
    pub actual_fare: Option<f64>,
    #[serde(default, alias = "driver")]
    pub driver_info: Option<DriverInfo>,
    #[serde(default, alias = "customerRating", deserialize_with = "rating_from_number")]
    pub rating: Option<u8>,
    #[serde(default, alias = "requestedAt")]
    pub created_at: Option<NaiveDateTime>,
}

impl Ride {
    pub fn can_cancel(&self) -> bool {
        self.status.is_cancellable()
    }

    /// Rating is write-once and only offered for completed rides.
    pub fn can_rate(&self) -> bool {
        self.status == RideStatus::Completed && self.rating.is_none()
    }

    pub fn fare(&self) -> Option<f64> {
        self.actual_fare.or(self.estimated_fare)
    }
}

// The ride service reports ratings as decimals ("4.0"). Anything that does
// not round into 1..=5 is treated as unrated.
fn rating_from_number<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<f64> = Option::deserialize(deserializer)?;
    Ok(value
        .map(f64::round)
        .filter(|r| (1.0..=5.0).contains(r))
        .map(|r| r as u8))
}

/// One page of `GET /rides`.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RidePage {
    pub content: Vec<Ride>,
    pub last: bool,
    #[serde(default)]
    pub number: Option<u32>,
    #[serde(default)]
    pub total_elements: Option<u64>,
}

/// Rider-side booking draft.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RideDraft {
    pub pickup: Option<Coordinate>,
    pub dropoff: Option<Coordinate>,
    pub pickup_address: String,
    pub dropoff_address: String,
    pub vehicle_type: VehicleType,
}

impl RideDraft {
    /// The inputs a fare quote depends on, once both ends are known.
    pub fn quote_key(&self) -> Option<QuoteKey> {
        Some(QuoteKey {
            pickup: self.pickup?,
            dropoff: self.dropoff?,
            vehicle_type: self.vehicle_type,
        })
    }

    pub fn to_booking_request(&self) -> Option<BookRideRequest> {
        let key = self.quote_key()?;
        Some(BookRideRequest {
            pickup_latitude: key.pickup.latitude,
            pickup_longitude: key.pickup.longitude,
            dropoff_latitude: key.dropoff.latitude,
            dropoff_longitude: key.dropoff.longitude,
            pickup_address: self.pickup_address.clone(),
            dropoff_address: self.dropoff_address.clone(),
            vehicle_type: key.vehicle_type,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuoteKey {
    pub pickup: Coordinate,
    pub dropoff: Coordinate,
    pub vehicle_type: VehicleType,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookRideRequest {
    pub pickup_latitude: f64,
    pub pickup_longitude: f64,
    pub dropoff_latitude: f64,
    pub dropoff_longitude: f64,
    pub pickup_address: String,
    pub dropoff_address: String,
    pub vehicle_type: VehicleType,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RateRideRequest {
    pub rating: u8,
}

/// Set the matching ride to CANCELLED. Returns whether a ride was patched.
pub fn apply_cancel(rides: &mut [Ride], ride_id: RideId) -> bool {
    match rides.iter_mut().find(|r| r.id == ride_id) {
        Some(ride) if ride.status.can_transition_to(RideStatus::Cancelled) => {
            ride.status = RideStatus::Cancelled;
            true
        }
        _ => false,
    }
}

/// Record a rating on the matching ride unless it already has one.
pub fn apply_rating(rides: &mut [Ride], ride_id: RideId, rating: u8) -> bool {
    match rides.iter_mut().find(|r| r.id == ride_id) {
        Some(ride) if ride.can_rate() => {
            ride.rating = Some(rating);
            true
        }
        _ => false,
    }
}

#[cfg(test)]
pub(crate) fn sample_ride(id: RideId, status: RideStatus) -> Ride {
    Ride {
        id,
        status,
        pickup_address: Some("Gateway of India".to_string()),
        dropoff_address: Some("Bandra".to_string()),
        vehicle_type: Some(VehicleType::Sedan),
        distance_km: Some(12.4),
        estimated_fare: Some(310.0),
        actual_fare: None,
        driver_info: None,
        rating: None,
        created_at: None,
    }
}
