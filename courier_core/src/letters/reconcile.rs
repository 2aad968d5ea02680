//! The decision at the heart of status tracking: merge a repeated label into the latest
//! observation, or append a new one.

use crate::Result;
use crate::letters::models::{
    ReconcileOutcome, Reconciled, StatusObservation, TrackingNumber, truncate_to_micros,
};
use crate::letters::traits::LetterStore;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;

/// What a store must do to record one provider answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilePlan {
    /// Move the latest observation's timestamp; its label is unchanged.
    Touch {
        observation_id: i64,
        observed_at: DateTime<Utc>,
    },
    /// Insert a new observation with the given label.
    Append { observed_at: DateTime<Utc> },
}

impl ReconcilePlan {
    pub fn observed_at(&self) -> DateTime<Utc> {
        match self {
            ReconcilePlan::Touch { observed_at, .. } | ReconcilePlan::Append { observed_at } => {
                *observed_at
            }
        }
    }

    pub fn outcome(&self) -> ReconcileOutcome {
        match self {
            ReconcilePlan::Touch { .. } => ReconcileOutcome::Touched,
            ReconcilePlan::Append { .. } => ReconcileOutcome::Appended,
        }
    }
}

/// Decide how `status` observed at `now` enters a history whose newest entry is `latest`.
///
/// The planned timestamp is strictly after `latest.observed_at`, so the newest observation
/// always carries the label of the most recent reconcile even if the clock stalls or steps
/// backwards.
pub fn plan(
    latest: Option<&StatusObservation>,
    status: &str,
    now: DateTime<Utc>,
) -> ReconcilePlan {
    let now = truncate_to_micros(now);
    match latest {
        Some(latest) => {
            let observed_at = if now > latest.observed_at {
                now
            } else {
                latest.observed_at + TimeDelta::microseconds(1)
            };
            if latest.status == status {
                ReconcilePlan::Touch {
                    observation_id: latest.id,
                    observed_at,
                }
            } else {
                ReconcilePlan::Append { observed_at }
            }
        }
        None => ReconcilePlan::Append { observed_at: now },
    }
}

/// Records provider answers into a store, one atomic transaction per call.
pub struct ReconcileEngine {
    store: Arc<dyn LetterStore>,
}

impl ReconcileEngine {
    pub fn new(store: Arc<dyn LetterStore>) -> Self {
        Self { store }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn reconcile(
        &self,
        tracking_number: &TrackingNumber,
        status: &str,
    ) -> Result<Reconciled> {
        let reconciled = self
            .store
            .reconcile_status(tracking_number, status, Utc::now())
            .await?;
        match reconciled.outcome {
            ReconcileOutcome::Touched => tracing::info!(
                tracking_number = %tracking_number,
                status,
                "latest status unchanged; refreshed its timestamp"
            ),
            ReconcileOutcome::Appended => tracing::info!(
                tracking_number = %tracking_number,
                status,
                "stored new status"
            ),
        }
        Ok(reconciled)
    }
}
