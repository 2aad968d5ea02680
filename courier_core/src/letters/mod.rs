//! Letter tracking: status history, reconciliation, and refresh.
//!
//! - `LetterStore` persists letters and their status observations (SQLite or in-memory)
//! - `TrackingProvider` fetches a letter's current status from an external service
//! - `reconcile` decides whether an answer touches the latest observation or appends one
//! - `LetterTracker` serves single-letter operations behind per-letter locks
//! - `BulkRefresher` fans refreshes out over a bounded task pool

pub mod locks;
pub mod memory;
pub mod models;
pub mod reconcile;
pub mod refresh;
pub mod sqlite;
pub mod tracker;
pub mod traits;
