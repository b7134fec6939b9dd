//! Vacancy set: vehicles currently eligible for a new assignment.
//!
//! Membership is materialized in `chair_vacancies`. A vehicle belongs there iff
//! it is active and every ride bound to it has reached a terminal status.
//! Rows are inserted when a vehicle becomes idle and deleted by the dispatcher
//! when it claims one.

use sqlx::{Row, SqliteExecutor};

use super::{now_micros, Repository};
use crate::errors::AppError;

/// Insert `chair_id` into the vacancy set if it is active and idle.
/// Returns whether a row was inserted.
pub(crate) async fn admit_chair<'e, E>(executor: E, chair_id: &str) -> Result<bool, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"INSERT OR IGNORE INTO chair_vacancies (chair_id, created_at)
           SELECT c.id, ? FROM chairs c
           WHERE c.id = ?
             AND c.is_active = 1
             AND NOT EXISTS (
                 SELECT 1 FROM ride_latest_status l
                 WHERE l.chair_id = c.id AND l.status NOT IN ('COMPLETED', 'CANCELED')
             )"#,
    )
    .bind(now_micros())
    .bind(chair_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

impl Repository {
    /// Toggle a vehicle's active flag and keep the vacancy set in step.
    pub async fn set_chair_activity(&self, chair_id: &str, is_active: bool) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE chairs SET is_active = ? WHERE id = ?")
            .bind(is_active as i32)
            .bind(chair_id)
            .execute(&mut *tx)
            .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Chair {} not found", chair_id)));
        }

        if is_active {
            admit_chair(&mut *tx, chair_id).await?;
        } else {
            sqlx::query("DELETE FROM chair_vacancies WHERE chair_id = ?")
                .bind(chair_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::info!(chair_id = %chair_id, is_active, "Chair activity changed");
        Ok(())
    }

    /// Vehicles currently in the vacancy set, oldest admission first.
    pub async fn list_vacancies(&self) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query("SELECT chair_id FROM chair_vacancies ORDER BY created_at, rowid")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|row| row.get("chair_id")).collect())
    }

    /// Re-admit every active, idle vehicle missing from the vacancy set.
    ///
    /// Vehicles only go missing when a process dies between claiming a vacancy
    /// and finishing a ride's bookkeeping, so each one found is logged.
    pub async fn reconcile_vacancies(&self) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query(
            r#"INSERT OR IGNORE INTO chair_vacancies (chair_id, created_at)
               SELECT c.id, ? FROM chairs c
               WHERE c.is_active = 1
                 AND NOT EXISTS (SELECT 1 FROM chair_vacancies v WHERE v.chair_id = c.id)
                 AND NOT EXISTS (
                     SELECT 1 FROM ride_latest_status l
                     WHERE l.chair_id = c.id AND l.status NOT IN ('COMPLETED', 'CANCELED')
                 )
               RETURNING chair_id"#,
        )
        .bind(now_micros())
        .fetch_all(&self.pool)
        .await?;

        let readmitted: Vec<String> = rows.iter().map(|row| row.get("chair_id")).collect();
        for chair_id in &readmitted {
            tracing::warn!(chair_id = %chair_id, "Re-admitted stranded chair to vacancy set");
        }

        Ok(readmitted)
    }
}
