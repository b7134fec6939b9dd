//! Vehicle ("chair") models.

use serde::{Deserialize, Serialize};

/// Identity record of a vehicle, as resolved from its bearer token.
///
/// This is also the value stored in the identity cache, so every field here
/// may be stale by up to the cache TTL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chair {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub model: String,
    pub is_active: bool,
}

/// Request body for registering a new vehicle.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterChairRequest {
    pub name: String,
    pub model: String,
    pub chair_register_token: String,
}

/// Response body after registering a vehicle.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterChairResponse {
    pub id: String,
    pub owner_id: String,
    pub access_token: String,
}

/// Request body for toggling the active flag.
#[derive(Debug, Clone, Deserialize)]
pub struct ChairActivityRequest {
    pub is_active: bool,
}

/// Response body after recording a position report.
#[derive(Debug, Clone, Serialize)]
pub struct RecordCoordinateResponse {
    /// Epoch milliseconds.
    pub recorded_at: i64,
}

/// Request body for an explicit driver status transition.
#[derive(Debug, Clone, Deserialize)]
pub struct PostRideStatusRequest {
    pub status: String,
}
