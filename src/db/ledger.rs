//! Status ledger: append-only ride lifecycle events.
//!
//! The latest entry of a ride is its current status. Guarded transitions are
//! a single `INSERT ... SELECT ... WHERE <latest status matches>` so the
//! precondition and the append cannot interleave with another writer.

use sqlx::{Row, SqliteExecutor};
use uuid::Uuid;

use super::repository::parse_status;
use super::vacancy::admit_chair;
use super::{now_micros, Repository};
use crate::errors::AppError;
use crate::models::{RideStatus, StatusEvent};

/// Precondition on a ride's latest status for a guarded append.
#[derive(Debug, Clone, Copy)]
enum Guard {
    Exactly(RideStatus),
    NotTerminal,
}

impl Guard {
    fn for_status(status: RideStatus) -> Self {
        match status.required_predecessor() {
            Some(required) => Guard::Exactly(required),
            None => Guard::NotTerminal,
        }
    }
}

/// Append an event unconditionally. Returns the new event id.
pub(crate) async fn insert_status<'e, E>(
    executor: E,
    ride_id: &str,
    status: RideStatus,
) -> Result<String, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let id = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO ride_statuses (id, ride_id, status, created_at) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(ride_id)
        .bind(status.as_str())
        .bind(now_micros())
        .execute(executor)
        .await?;
    Ok(id)
}

/// Append an event only if the ride's latest status satisfies `guard`.
/// Returns whether a row was appended.
async fn insert_status_guarded<'e, E>(
    executor: E,
    ride_id: &str,
    status: RideStatus,
    guard: Guard,
) -> Result<bool, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let id = Uuid::new_v4().to_string();
    let sql = match guard {
        Guard::Exactly(_) => {
            r#"INSERT INTO ride_statuses (id, ride_id, status, created_at)
               SELECT ?, ?, ?, ?
               WHERE (SELECT status FROM ride_latest_status WHERE ride_id = ?) = ?"#
        }
        Guard::NotTerminal => {
            r#"INSERT INTO ride_statuses (id, ride_id, status, created_at)
               SELECT ?, ?, ?, ?
               WHERE (SELECT status FROM ride_latest_status WHERE ride_id = ?)
                     NOT IN ('COMPLETED', 'CANCELED')"#
        }
    };

    let mut query = sqlx::query(sql)
        .bind(id)
        .bind(ride_id)
        .bind(status.as_str())
        .bind(now_micros())
        .bind(ride_id);
    if let Guard::Exactly(required) = guard {
        query = query.bind(required.as_str());
    }

    let result = query.execute(executor).await?;
    Ok(result.rows_affected() == 1)
}

impl Repository {
    /// Append an automatic transition outside the coordinate transaction.
    ///
    /// The ride may have moved on since the report was recorded, so the
    /// append only happens if the latest status is still the one the
    /// transition fires from. Returns whether it was appended.
    pub async fn append_transition(
        &self,
        ride_id: &str,
        status: RideStatus,
    ) -> Result<bool, AppError> {
        let appended =
            insert_status_guarded(&self.pool, ride_id, status, Guard::for_status(status)).await?;
        Ok(appended)
    }

    /// Ordered event history of a ride.
    pub async fn ride_history(&self, ride_id: &str) -> Result<Vec<StatusEvent>, AppError> {
        let rows = sqlx::query(
            r#"SELECT id, ride_id, status, created_at, chair_sent_at
               FROM ride_statuses
               WHERE ride_id = ?
               ORDER BY seq ASC"#,
        )
        .bind(ride_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let status: String = row.get("status");
                StatusEvent {
                    id: row.get("id"),
                    ride_id: row.get("ride_id"),
                    status: parse_status(Some(&status)),
                    created_at: row.get("created_at"),
                    chair_sent_at: row.get("chair_sent_at"),
                }
            })
            .collect())
    }

    /// Explicit driver transition (`ENROUTE` or `CARRYING`).
    ///
    /// The vehicle must be the ride's assigned vehicle. `CARRYING` requires the
    /// latest status to be exactly `PICKUP`; a rejected transition appends nothing.
    pub async fn post_ride_status(
        &self,
        chair_id: &str,
        ride_id: &str,
        requested: RideStatus,
    ) -> Result<(), AppError> {
        let ride = self
            .get_ride(ride_id)
            .await?
            .ok_or_else(|| AppError::NotFound("ride not found".to_string()))?;

        if ride.chair_id.as_deref() != Some(chair_id) {
            return Err(AppError::Conflict("not assigned to this ride".to_string()));
        }
        if ride.status.is_terminal() {
            return Err(AppError::Conflict("ride already finished".to_string()));
        }

        let guard = Guard::for_status(requested);

        if !insert_status_guarded(&self.pool, ride_id, requested, guard).await? {
            let message = match guard {
                Guard::Exactly(RideStatus::Pickup) => "chair has not arrived yet".to_string(),
                Guard::Exactly(required) => format!("ride is not {}", required),
                Guard::NotTerminal => "ride already finished".to_string(),
            };
            return Err(AppError::Conflict(message));
        }

        tracing::info!(ride_id = %ride_id, chair_id = %chair_id, status = %requested, "Driver transition");
        Ok(())
    }

    /// Rider completes an `ARRIVED` ride; the vehicle rejoins the vacancy set.
    pub async fn complete_ride(&self, user_id: &str, ride_id: &str) -> Result<(), AppError> {
        self.owned_ride(user_id, ride_id).await?;
        self.finish_ride(
            ride_id,
            RideStatus::Completed,
            Guard::Exactly(RideStatus::Arrived),
        )
        .await
    }

    /// Rider cancels a non-terminal ride; an assigned vehicle rejoins the vacancy set.
    pub async fn cancel_ride(&self, user_id: &str, ride_id: &str) -> Result<(), AppError> {
        self.owned_ride(user_id, ride_id).await?;
        self.finish_ride(
            ride_id,
            RideStatus::Canceled,
            Guard::NotTerminal,
        )
        .await
    }

    /// Append a terminal event and re-admit the vehicle in one transaction.
    async fn finish_ride(
        &self,
        ride_id: &str,
        terminal: RideStatus,
        guard: Guard,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        if !insert_status_guarded(&mut *tx, ride_id, terminal, guard).await? {
            let message = match guard {
                Guard::Exactly(required) => format!("ride is not {}", required),
                Guard::NotTerminal => "ride already finished".to_string(),
            };
            return Err(AppError::Conflict(message));
        }

        // Re-read under the write lock; a dispatch cycle may have bound it since.
        let chair_id: Option<String> = sqlx::query("SELECT chair_id FROM rides WHERE id = ?")
            .bind(ride_id)
            .fetch_one(&mut *tx)
            .await?
            .get("chair_id");

        let readmitted = match chair_id.as_deref() {
            Some(chair_id) => admit_chair(&mut *tx, chair_id).await?,
            None => false,
        };

        tx.commit().await?;

        tracing::info!(
            ride_id = %ride_id,
            status = %terminal,
            chair_readmitted = readmitted,
            "Ride finished"
        );
        Ok(())
    }
}
