use crate::letters::locks::KeyedLocks;
use crate::letters::models::{LetterHistory, Reconciled, TrackingNumber};
use crate::letters::reconcile::ReconcileEngine;
use crate::letters::traits::{LetterStore, TrackingProvider};
use crate::{Error, Result};
use chrono::Utc;
use std::sync::Arc;

/// Letter registration, lookup, and single-letter refresh.
///
/// Constructed once at process start and shared by the HTTP handlers and the bulk refresher.
pub struct LetterTracker {
    store: Arc<dyn LetterStore>,
    provider: Arc<dyn TrackingProvider>,
    engine: ReconcileEngine,
    locks: KeyedLocks,
}

impl LetterTracker {
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn new(store: Arc<dyn LetterStore>, provider: Arc<dyn TrackingProvider>) -> Self {
        Self {
            engine: ReconcileEngine::new(store.clone()),
            store,
            provider,
            locks: KeyedLocks::new(),
        }
    }

    #[tracing::instrument(level = "info", skip(self))]
    pub async fn register(&self, tracking_number: &TrackingNumber) -> Result<LetterHistory> {
        let created = self.store.register(tracking_number, Utc::now()).await?;
        tracing::info!(tracking_number = %tracking_number, "letter registered");
        Ok(created)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get(&self, tracking_number: &TrackingNumber) -> Result<LetterHistory> {
        self.store
            .get(tracking_number)
            .await?
            .ok_or_else(|| Error::NotFound(format!("letter '{tracking_number}' not found")))
    }

    /// Fetch the provider's current status and merge it into the letter's history.
    ///
    /// Provider failures propagate unchanged and leave the history untouched.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn refresh_one(&self, tracking_number: &TrackingNumber) -> Result<Reconciled> {
        let guard = self.locks.lock(tracking_number.as_str()).await;
        // Checked under the lock: a delete queued ahead of us may have removed the letter.
        if !self.store.exists(tracking_number).await? {
            drop(guard);
            self.locks.forget(tracking_number.as_str());
            return Err(Error::NotFound(format!("letter '{tracking_number}' not found")));
        }

        let status = self.provider.fetch(tracking_number).await.map_err(|e| {
            tracing::error!(
                provider = self.provider.id(),
                tracking_number = %tracking_number,
                error = %e,
                "tracking provider call failed"
            );
            Error::Provider(e)
        })?;
        self.engine.reconcile(tracking_number, &status).await
    }

    #[tracing::instrument(level = "info", skip(self))]
    pub async fn delete(&self, tracking_number: &TrackingNumber) -> Result<()> {
        let guard = self.locks.lock(tracking_number.as_str()).await;
        let deleted = self.store.delete(tracking_number).await?;
        drop(guard);
        self.locks.forget(tracking_number.as_str());
        if !deleted {
            return Err(Error::NotFound(format!("letter '{tracking_number}' not found")));
        }
        tracing::info!(tracking_number = %tracking_number, "letter deleted");
        Ok(())
    }

    pub async fn tracking_numbers(&self) -> Result<Vec<TrackingNumber>> {
        self.store.list_tracking_numbers().await
    }
}
