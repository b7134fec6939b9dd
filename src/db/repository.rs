//! Database repository for accounts and ride requests.
//!
//! The dispatch, ledger, coordinate, vacancy and notification operations live
//! in sibling modules as further `impl Repository` blocks.

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::ledger::insert_status;
use super::now_micros;
use crate::errors::AppError;
use crate::models::{
    Chair, Coordinate, CreateRideRequest, CreateRideResponse, RegisterChairRequest,
    RegisterChairResponse, RegisterOwnerRequest, RegisterOwnerResponse, RegisterUserRequest,
    RegisterUserResponse, Ride, RideDetail, RideStatus, User,
};

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pub(super) pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ==================== OWNER OPERATIONS ====================

    /// Register a fleet owner.
    pub async fn create_owner(
        &self,
        request: &RegisterOwnerRequest,
    ) -> Result<RegisterOwnerResponse, AppError> {
        let id = Uuid::new_v4().to_string();
        let access_token = secure_token();
        let chair_register_token = secure_token();

        let result = sqlx::query(
            "INSERT INTO owners (id, name, access_token, chair_register_token, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&request.name)
        .bind(&access_token)
        .bind(&chair_register_token)
        .bind(now_micros())
        .execute(&self.pool)
        .await;

        if let Err(sqlx::Error::Database(db_err)) = &result {
            if db_err.is_unique_violation() {
                return Err(AppError::Conflict(format!(
                    "Owner {} already exists",
                    request.name
                )));
            }
        }
        result?;

        Ok(RegisterOwnerResponse {
            id,
            chair_register_token,
            access_token,
        })
    }

    // ==================== CHAIR OPERATIONS ====================

    /// Register a vehicle under the owner holding `chair_register_token`.
    ///
    /// New vehicles start inactive and therefore outside the vacancy set.
    pub async fn create_chair(
        &self,
        request: &RegisterChairRequest,
    ) -> Result<RegisterChairResponse, AppError> {
        let owner = sqlx::query("SELECT id FROM owners WHERE chair_register_token = ?")
            .bind(&request.chair_register_token)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::Unauthorized("invalid chair_register_token".to_string()))?;
        let owner_id: String = owner.get("id");

        let id = Uuid::new_v4().to_string();
        let access_token = secure_token();

        sqlx::query(
            "INSERT INTO chairs (id, owner_id, name, model, is_active, access_token, created_at) VALUES (?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(&id)
        .bind(&owner_id)
        .bind(&request.name)
        .bind(&request.model)
        .bind(&access_token)
        .bind(now_micros())
        .execute(&self.pool)
        .await?;

        tracing::info!(chair_id = %id, owner_id = %owner_id, "Registered chair");

        Ok(RegisterChairResponse {
            id,
            owner_id,
            access_token,
        })
    }

    /// Look up a vehicle by its bearer token. This is the primary-store path
    /// behind the identity cache.
    pub async fn find_chair_by_token(&self, access_token: &str) -> Result<Option<Chair>, AppError> {
        let row = sqlx::query(
            "SELECT id, owner_id, name, model, is_active FROM chairs WHERE access_token = ?",
        )
        .bind(access_token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(chair_from_row))
    }

    // ==================== USER OPERATIONS ====================

    /// Register a rider.
    pub async fn create_user(
        &self,
        request: &RegisterUserRequest,
    ) -> Result<RegisterUserResponse, AppError> {
        let id = Uuid::new_v4().to_string();
        let access_token = secure_token();

        let result = sqlx::query(
            "INSERT INTO users (id, username, firstname, lastname, access_token, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&request.username)
        .bind(&request.firstname)
        .bind(&request.lastname)
        .bind(&access_token)
        .bind(now_micros())
        .execute(&self.pool)
        .await;

        if let Err(sqlx::Error::Database(db_err)) = &result {
            if db_err.is_unique_violation() {
                return Err(AppError::Conflict(format!(
                    "User {} already exists",
                    request.username
                )));
            }
        }
        result?;

        Ok(RegisterUserResponse { id, access_token })
    }

    /// Look up a rider by bearer token.
    pub async fn find_user_by_token(&self, access_token: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(
            "SELECT id, username, firstname, lastname FROM users WHERE access_token = ?",
        )
        .bind(access_token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| User {
            id: row.get("id"),
            username: row.get("username"),
            firstname: row.get("firstname"),
            lastname: row.get("lastname"),
        }))
    }

    // ==================== RIDE OPERATIONS ====================

    /// Request a ride. Appends the initial `MATCHING` event in the same
    /// transaction; the dispatcher picks the ride up from there.
    pub async fn create_ride(
        &self,
        user_id: &str,
        request: &CreateRideRequest,
    ) -> Result<CreateRideResponse, AppError> {
        let ride_id = Uuid::new_v4().to_string();
        let now = now_micros();

        let mut tx = self.pool.begin().await?;

        // One open ride per user; the check and the insert are one statement.
        let inserted = sqlx::query(
            r#"INSERT INTO rides (
                id, user_id, chair_id,
                pickup_latitude, pickup_longitude,
                destination_latitude, destination_longitude,
                created_at, updated_at
            )
            SELECT ?, ?, NULL, ?, ?, ?, ?, ?, ?
            WHERE NOT EXISTS (
                SELECT 1 FROM ride_latest_status l
                WHERE l.user_id = ? AND l.status NOT IN ('COMPLETED', 'CANCELED')
            )"#,
        )
        .bind(&ride_id)
        .bind(user_id)
        .bind(request.pickup_coordinate.latitude)
        .bind(request.pickup_coordinate.longitude)
        .bind(request.destination_coordinate.latitude)
        .bind(request.destination_coordinate.longitude)
        .bind(now)
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(AppError::Conflict("ride already exists".to_string()));
        }

        insert_status(&mut *tx, &ride_id, RideStatus::Matching).await?;

        tx.commit().await?;

        tracing::info!(ride_id = %ride_id, user_id = %user_id, "Ride requested");

        Ok(CreateRideResponse { ride_id })
    }

    /// Get a ride with its current status.
    pub async fn get_ride(&self, ride_id: &str) -> Result<Option<Ride>, AppError> {
        let row = sqlx::query(
            r#"SELECT r.id, r.user_id, r.chair_id,
                      r.pickup_latitude, r.pickup_longitude,
                      r.destination_latitude, r.destination_longitude,
                      r.created_at, r.updated_at, l.status
               FROM rides r
               JOIN ride_latest_status l ON l.ride_id = r.id
               WHERE r.id = ?"#,
        )
        .bind(ride_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(ride_from_row))
    }

    /// Get a ride, its history and its vehicle's position, visible only to the rider who requested it.
    pub async fn get_ride_for_user(
        &self,
        user_id: &str,
        ride_id: &str,
    ) -> Result<RideDetail, AppError> {
        let ride = self.owned_ride(user_id, ride_id).await?;
        let history = self.ride_history(ride_id).await?;
        let chair_position = match ride.chair_id.as_deref() {
            Some(chair_id) => self.current_position(chair_id).await?,
            None => None,
        };
        Ok(RideDetail {
            ride,
            history,
            chair_position,
        })
    }

    /// Fetch a ride that must belong to `user_id`; anything else is not found.
    pub(super) async fn owned_ride(&self, user_id: &str, ride_id: &str) -> Result<Ride, AppError> {
        self.get_ride(ride_id)
            .await?
            .filter(|ride| ride.user_id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("Ride {} not found", ride_id)))
    }
}

/// Random 128-bit token rendered as 32 hex characters.
fn secure_token() -> String {
    Uuid::new_v4().simple().to_string()
}

// Helper functions for row conversion

fn chair_from_row(row: &sqlx::sqlite::SqliteRow) -> Chair {
    let is_active: i32 = row.get("is_active");
    Chair {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        name: row.get("name"),
        model: row.get("model"),
        is_active: is_active != 0,
    }
}

fn ride_from_row(row: &sqlx::sqlite::SqliteRow) -> Ride {
    let status: Option<String> = row.get("status");
    Ride {
        id: row.get("id"),
        user_id: row.get("user_id"),
        chair_id: row.get("chair_id"),
        pickup_coordinate: Coordinate {
            latitude: row.get("pickup_latitude"),
            longitude: row.get("pickup_longitude"),
        },
        destination_coordinate: Coordinate {
            latitude: row.get("destination_latitude"),
            longitude: row.get("destination_longitude"),
        },
        status: parse_status(status.as_deref()),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// A ride always carries at least its `MATCHING` event, so a missing or
/// unknown value only appears for rows written outside this service.
pub(super) fn parse_status(status: Option<&str>) -> RideStatus {
    status
        .and_then(RideStatus::parse)
        .unwrap_or(RideStatus::Matching)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_token_shape() {
        let a = secure_token();
        let b = secure_token();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_status_defaults_to_matching() {
        assert_eq!(parse_status(Some("PICKUP")), RideStatus::Pickup);
        assert_eq!(parse_status(None), RideStatus::Matching);
        assert_eq!(parse_status(Some("bogus")), RideStatus::Matching);
    }
}
