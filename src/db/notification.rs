//! Notification poller: at-most-once delivery of status events to a vehicle.

use sqlx::Row;

use super::repository::parse_status;
use super::{now_micros, Repository};
use crate::errors::AppError;
use crate::models::{Coordinate, NotificationData, SimpleUser};

impl Repository {
    /// Deliver the oldest undelivered event of the vehicle's most recently
    /// touched ride, stamping it delivered in the same transaction.
    ///
    /// The stamp is the first statement and is conditional on
    /// `chair_sent_at IS NULL`, so concurrent polls serialize on the write lock
    /// and a given event is returned at most once.
    pub async fn poll_notification(
        &self,
        chair_id: &str,
    ) -> Result<Option<NotificationData>, AppError> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            r#"UPDATE ride_statuses SET chair_sent_at = ?
               WHERE chair_sent_at IS NULL
                 AND id = (
                     SELECT rs.id FROM ride_statuses rs
                     WHERE rs.chair_sent_at IS NULL
                       AND rs.ride_id = (
                           SELECT r.id FROM rides r
                           WHERE r.chair_id = ?
                           ORDER BY r.updated_at DESC, r.rowid DESC
                           LIMIT 1
                       )
                     ORDER BY rs.seq ASC
                     LIMIT 1
                 )
               RETURNING ride_id, status"#,
        )
        .bind(now_micros())
        .bind(chair_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(claimed) = claimed else {
            tx.rollback().await?;
            return Ok(None);
        };
        let ride_id: String = claimed.get("ride_id");
        let status: String = claimed.get("status");

        let ride = sqlx::query(
            r#"SELECT r.user_id, u.firstname, u.lastname,
                      r.pickup_latitude, r.pickup_longitude,
                      r.destination_latitude, r.destination_longitude
               FROM rides r
               JOIN users u ON u.id = r.user_id
               WHERE r.id = ?"#,
        )
        .bind(&ride_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let firstname: String = ride.get("firstname");
        let lastname: String = ride.get("lastname");

        tracing::debug!(chair_id = %chair_id, ride_id = %ride_id, status = %status, "Delivered notification");

        Ok(Some(NotificationData {
            ride_id,
            user: SimpleUser {
                id: ride.get("user_id"),
                name: format!("{} {}", firstname, lastname),
            },
            pickup_coordinate: Coordinate {
                latitude: ride.get("pickup_latitude"),
                longitude: ride.get("pickup_longitude"),
            },
            destination_coordinate: Coordinate {
                latitude: ride.get("destination_latitude"),
                longitude: ride.get("destination_longitude"),
            },
            status: parse_status(Some(&status)),
        }))
    }
}
