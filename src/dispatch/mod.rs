//! In-process dispatch ticker.
//!
//! Runs the same cycle as `GET /api/internal/matching` on a fixed interval.
//! Failed cycles are logged and the ticker keeps going.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::db::{MatchOutcome, Repository};

/// Spawn the ticker. Drains every available match on each tick.
pub fn spawn_dispatch_loop(repo: Arc<Repository>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            loop {
                match repo.try_match().await {
                    Ok(MatchOutcome::Matched { ride_id, chair_id }) => {
                        tracing::debug!(ride_id = %ride_id, chair_id = %chair_id, "Dispatch tick bound ride");
                    }
                    Ok(MatchOutcome::NoneAvailable) => break,
                    Err(e) => {
                        tracing::error!("Dispatch cycle failed: {}", e);
                        break;
                    }
                }
            }
        }
    })
}
