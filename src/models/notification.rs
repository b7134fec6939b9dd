//! Notification poll payloads.

use serde::Serialize;

use super::{Coordinate, RideStatus};

/// Rider summary included in a vehicle notification.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SimpleUser {
    pub id: String,
    pub name: String,
}

/// One delivered status event together with the ride it belongs to.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NotificationData {
    pub ride_id: String,
    pub user: SimpleUser,
    pub pickup_coordinate: Coordinate,
    pub destination_coordinate: Coordinate,
    pub status: RideStatus,
}

/// Short-poll response; `data` is null when nothing is pending.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationResponse {
    pub data: Option<NotificationData>,
    pub retry_after_ms: u64,
}
