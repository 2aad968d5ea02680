use crate::Result;
use crate::error::ProviderError;
use crate::letters::models::{LetterHistory, Reconciled, TrackingNumber};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Durable storage for letters and their status history.
///
/// Every mutating call is a single atomic transaction scoped to one letter.
#[async_trait]
pub trait LetterStore: Send + Sync {
    /// Create a letter together with its initial `"New"` observation.
    ///
    /// Fails with `Error::DuplicateLetter` if the tracking number is already registered.
    async fn register(
        &self,
        tracking_number: &TrackingNumber,
        now: DateTime<Utc>,
    ) -> Result<LetterHistory>;

    /// Load a letter with its history ordered newest first.
    async fn get(&self, tracking_number: &TrackingNumber) -> Result<Option<LetterHistory>>;

    async fn exists(&self, tracking_number: &TrackingNumber) -> Result<bool>;

    /// Snapshot of every registered tracking number, in registration order.
    async fn list_tracking_numbers(&self) -> Result<Vec<TrackingNumber>>;

    /// Merge a freshly observed status into the letter's history.
    ///
    /// Implementations load the latest observation, apply `reconcile::plan`, and commit the
    /// resulting touch or append in one transaction. Fails with `Error::NotFound` when the
    /// letter does not exist.
    async fn reconcile_status(
        &self,
        tracking_number: &TrackingNumber,
        status: &str,
        now: DateTime<Utc>,
    ) -> Result<Reconciled>;

    /// Delete a letter and every observation it owns. Returns `false` if it did not exist.
    async fn delete(&self, tracking_number: &TrackingNumber) -> Result<bool>;
}

/// An external shipment-tracking capability.
///
/// Implementations are stateless per call and safe to share across tasks.
#[async_trait]
pub trait TrackingProvider: Send + Sync {
    /// Provider identifier used in logs.
    fn id(&self) -> &'static str;

    /// Fetch the latest status label for a tracking number.
    async fn fetch(
        &self,
        tracking_number: &TrackingNumber,
    ) -> std::result::Result<String, ProviderError>;
}
