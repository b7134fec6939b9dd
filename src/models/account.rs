//! Owner and rider account models.
//!
//! Owners only exist to hand out `chair_register_token`s, so they have no
//! read model beyond the registration response.

use serde::{Deserialize, Serialize};

/// A rider requesting trips.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub firstname: String,
    pub lastname: String,
}

/// Request body for registering an owner.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterOwnerRequest {
    pub name: String,
}

/// Response body after registering an owner.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterOwnerResponse {
    pub id: String,
    pub chair_register_token: String,
    pub access_token: String,
}

/// Request body for registering a rider.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterUserRequest {
    pub username: String,
    pub firstname: String,
    pub lastname: String,
}

/// Response body after registering a rider.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterUserResponse {
    pub id: String,
    pub access_token: String,
}
