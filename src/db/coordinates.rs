//! Coordinate store: immutable vehicle position reports.
//!
//! Recording a report also derives whether the vehicle's current ride moves
//! to `PICKUP` or `ARRIVED` (exact integer match, see [`RideStatus::advance_on_position`]).

use sqlx::Row;
use uuid::Uuid;

use super::ledger::insert_status;
use super::repository::parse_status;
use super::{now_micros, Repository};
use crate::config::StatusAppendMode;
use crate::errors::AppError;
use crate::models::{Coordinate, RideStatus};

/// Automatic transition derived from a position report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoTransition {
    pub ride_id: String,
    pub status: RideStatus,
}

/// Outcome of recording one position report.
#[derive(Debug, Clone)]
pub struct RecordedCoordinate {
    /// Epoch milliseconds.
    pub recorded_at: i64,
    /// Set when the report triggers a transition. With
    /// [`StatusAppendMode::Inline`] it has already been appended; with
    /// [`StatusAppendMode::Background`] the caller must append it.
    pub transition: Option<AutoTransition>,
}

impl Repository {
    /// Append a position report for `chair_id`.
    pub async fn record_coordinate(
        &self,
        chair_id: &str,
        coordinate: Coordinate,
        mode: StatusAppendMode,
    ) -> Result<RecordedCoordinate, AppError> {
        let now = now_micros();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO chair_locations (id, chair_id, latitude, longitude, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(chair_id)
        .bind(coordinate.latitude)
        .bind(coordinate.longitude)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        // The vehicle's most recently touched ride and its current status.
        let ride = sqlx::query(
            r#"SELECT r.id, r.pickup_latitude, r.pickup_longitude,
                      r.destination_latitude, r.destination_longitude, l.status
               FROM rides r
               JOIN ride_latest_status l ON l.ride_id = r.id
               WHERE r.chair_id = ?
               ORDER BY r.updated_at DESC, r.rowid DESC
               LIMIT 1"#,
        )
        .bind(chair_id)
        .fetch_optional(&mut *tx)
        .await?;

        let transition = ride.and_then(|row| {
            let status: Option<String> = row.get("status");
            let pickup = Coordinate {
                latitude: row.get("pickup_latitude"),
                longitude: row.get("pickup_longitude"),
            };
            let destination = Coordinate {
                latitude: row.get("destination_latitude"),
                longitude: row.get("destination_longitude"),
            };
            parse_status(status.as_deref())
                .advance_on_position(coordinate, pickup, destination)
                .map(|status| AutoTransition {
                    ride_id: row.get("id"),
                    status,
                })
        });

        if let (Some(transition), StatusAppendMode::Inline) = (&transition, mode) {
            insert_status(&mut *tx, &transition.ride_id, transition.status).await?;
        }

        tx.commit().await?;

        if let Some(transition) = &transition {
            tracing::info!(
                chair_id = %chair_id,
                ride_id = %transition.ride_id,
                status = %transition.status,
                "Position report triggered transition"
            );
        }

        Ok(RecordedCoordinate {
            recorded_at: now / 1000,
            transition,
        })
    }

    /// Latest reported position of a vehicle.
    pub async fn current_position(&self, chair_id: &str) -> Result<Option<Coordinate>, AppError> {
        let row = sqlx::query(
            r#"SELECT latitude, longitude FROM chair_locations
               WHERE chair_id = ?
               ORDER BY rowid DESC
               LIMIT 1"#,
        )
        .bind(chair_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Coordinate {
            latitude: row.get("latitude"),
            longitude: row.get("longitude"),
        }))
    }
}
