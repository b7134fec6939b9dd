//! Ride, status ledger and coordinate models.
//!
//! The lifecycle is `MATCHING -> ENROUTE -> PICKUP -> CARRYING -> ARRIVED -> COMPLETED`,
//! with `CANCELED` reachable from any non-terminal state.

use serde::{Deserialize, Serialize};

/// A point on the integer grid. Equality is exact; there is no proximity radius.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Coordinate {
    pub latitude: i64,
    pub longitude: i64,
}

/// Lifecycle state of a ride, as recorded in the status ledger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    /// Requested; waiting for or freshly bound to a vehicle.
    Matching,
    Enroute,
    Pickup,
    Carrying,
    Arrived,
    Completed,
    Canceled,
}

impl RideStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Matching => "MATCHING",
            RideStatus::Enroute => "ENROUTE",
            RideStatus::Pickup => "PICKUP",
            RideStatus::Carrying => "CARRYING",
            RideStatus::Arrived => "ARRIVED",
            RideStatus::Completed => "COMPLETED",
            RideStatus::Canceled => "CANCELED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "MATCHING" => Some(RideStatus::Matching),
            "ENROUTE" => Some(RideStatus::Enroute),
            "PICKUP" => Some(RideStatus::Pickup),
            "CARRYING" => Some(RideStatus::Carrying),
            "ARRIVED" => Some(RideStatus::Arrived),
            "COMPLETED" => Some(RideStatus::Completed),
            "CANCELED" => Some(RideStatus::Canceled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Canceled)
    }

    /// Parse a status a driver is allowed to post explicitly.
    pub fn parse_driver_transition(s: &str) -> Option<Self> {
        match Self::parse(s) {
            Some(status @ (RideStatus::Enroute | RideStatus::Carrying)) => Some(status),
            _ => None,
        }
    }

    /// The status this one requires as the ride's latest status, if any.
    /// Statuses without one only require a non-terminal ride.
    pub fn required_predecessor(&self) -> Option<RideStatus> {
        match self {
            RideStatus::Pickup => Some(RideStatus::Enroute),
            RideStatus::Carrying => Some(RideStatus::Pickup),
            RideStatus::Arrived => Some(RideStatus::Carrying),
            RideStatus::Completed => Some(RideStatus::Arrived),
            _ => None,
        }
    }

    /// Automatic transition fired by a position report, if any.
    ///
    /// `PICKUP` needs an exact hit on the pickup point while `ENROUTE`;
    /// `ARRIVED` needs an exact hit on the destination while `CARRYING`.
    pub fn advance_on_position(
        &self,
        reported: Coordinate,
        pickup: Coordinate,
        destination: Coordinate,
    ) -> Option<RideStatus> {
        match self {
            RideStatus::Enroute if reported == pickup => Some(RideStatus::Pickup),
            RideStatus::Carrying if reported == destination => Some(RideStatus::Arrived),
            _ => None,
        }
    }
}

impl std::fmt::Display for RideStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trip request and its current binding.
#[derive(Debug, Clone, Serialize)]
pub struct Ride {
    pub id: String,
    pub user_id: String,
    /// Set exactly once, by the dispatcher.
    pub chair_id: Option<String>,
    pub pickup_coordinate: Coordinate,
    pub destination_coordinate: Coordinate,
    pub status: RideStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One appended lifecycle event.
#[derive(Debug, Clone, Serialize)]
pub struct StatusEvent {
    pub id: String,
    pub ride_id: String,
    pub status: RideStatus,
    pub created_at: i64,
    /// Stamped once, by the notification poll that delivered it.
    pub chair_sent_at: Option<i64>,
}

/// A ride together with its ordered status history.
#[derive(Debug, Clone, Serialize)]
pub struct RideDetail {
    #[serde(flatten)]
    pub ride: Ride,
    pub history: Vec<StatusEvent>,
    /// Latest reported position of the assigned vehicle.
    pub chair_position: Option<Coordinate>,
}

/// Request body for requesting a ride.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRideRequest {
    pub pickup_coordinate: Coordinate,
    pub destination_coordinate: Coordinate,
}

/// Response body after requesting a ride.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRideResponse {
    pub ride_id: String,
}
