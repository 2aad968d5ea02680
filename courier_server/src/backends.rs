//! Wires configuration into the shared tracker and refresher.

use crate::server::AppState;
use courier_core::{BulkRefresher, CourierConfig, LetterTracker, SqliteLetterStore};
use courier_integrations::LaPosteClient;
use std::sync::Arc;

#[tracing::instrument(level = "info", skip_all)]
pub async fn build_state(cfg: &CourierConfig) -> anyhow::Result<AppState> {
    let store = Arc::new(SqliteLetterStore::new(&cfg.store.database_path).await?);
    let provider = Arc::new(LaPosteClient::new(&cfg.la_poste)?);
    let tracker = Arc::new(LetterTracker::new(store, provider));
    let refresher = Arc::new(BulkRefresher::new(
        tracker.clone(),
        cfg.refresh.max_concurrency,
    )?);

    tracing::info!(
        database_path = %cfg.store.database_path.display(),
        endpoint = %cfg.la_poste.endpoint,
        max_concurrency = cfg.refresh.max_concurrency,
        "courier state ready"
    );
    Ok(AppState::new(tracker, refresher))
}
