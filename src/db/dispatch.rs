//! Dispatcher: binds the oldest waiting ride to one vacant vehicle.
//!
//! A cycle reads the oldest unbound ride, then in one transaction claims a
//! vacancy row (`DELETE ... RETURNING`, issued first so the write lock is held
//! before the vacancy set is read) and binds the ride with a compare-and-swap
//! on `chair_id IS NULL`. Losing the ride race rolls the claim back, which
//! restores the vacancy, and the cycle moves on to the next oldest ride.

use sqlx::Row;

use super::{now_micros, Repository};
use crate::errors::AppError;

/// Attempts per cycle before yielding to the next trigger.
const MAX_MATCH_ATTEMPTS: usize = 3;

/// Result of one dispatch cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Matched { ride_id: String, chair_id: String },
    NoneAvailable,
}

impl Repository {
    /// Run one dispatch cycle.
    pub async fn try_match(&self) -> Result<MatchOutcome, AppError> {
        for attempt in 1..=MAX_MATCH_ATTEMPTS {
            let Some(ride_id) = self.oldest_waiting_ride().await? else {
                tracing::debug!("No waiting rides");
                return Ok(MatchOutcome::NoneAvailable);
            };

            let mut tx = self.pool.begin().await?;

            let claimed = sqlx::query(
                r#"DELETE FROM chair_vacancies
                   WHERE chair_id = (SELECT chair_id FROM chair_vacancies LIMIT 1)
                   RETURNING chair_id"#,
            )
            .fetch_optional(&mut *tx)
            .await?;

            let Some(claimed) = claimed else {
                tx.rollback().await?;
                tracing::debug!(ride_id = %ride_id, "No vacant chairs");
                return Ok(MatchOutcome::NoneAvailable);
            };
            let chair_id: String = claimed.get("chair_id");

            let bound = sqlx::query(
                r#"UPDATE rides SET chair_id = ?, updated_at = ?
                   WHERE id = ?
                     AND chair_id IS NULL
                     AND NOT EXISTS (
                         SELECT 1 FROM ride_statuses rs
                         WHERE rs.ride_id = rides.id AND rs.status = 'CANCELED'
                     )"#,
            )
            .bind(&chair_id)
            .bind(now_micros())
            .bind(&ride_id)
            .execute(&mut *tx)
            .await?;

            if bound.rows_affected() == 0 {
                tx.rollback().await?;
                tracing::debug!(ride_id = %ride_id, attempt, "Ride bound or canceled concurrently");
                continue;
            }

            tx.commit().await?;

            tracing::info!(ride_id = %ride_id, chair_id = %chair_id, "Matched ride");
            return Ok(MatchOutcome::Matched { ride_id, chair_id });
        }

        Ok(MatchOutcome::NoneAvailable)
    }

    /// Oldest ride that has no vehicle and was not canceled while waiting.
    async fn oldest_waiting_ride(&self) -> Result<Option<String>, AppError> {
        let row = sqlx::query(
            r#"SELECT r.id FROM rides r
               WHERE r.chair_id IS NULL
                 AND NOT EXISTS (
                     SELECT 1 FROM ride_statuses rs
                     WHERE rs.ride_id = r.id AND rs.status = 'CANCELED'
                 )
               ORDER BY r.created_at ASC, r.rowid ASC
               LIMIT 1"#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| row.get("id")))
    }
}
