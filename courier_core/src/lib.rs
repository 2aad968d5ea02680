//! Courier core library: letter tracking models, stores, and the refresh machinery.

pub mod config;
pub mod error;
pub mod letters;
pub mod o11y;

pub use config::{CourierConfig, LaPosteConfig, LogFormat, RefreshConfig, StoreConfig};
pub use error::{Error, ProviderError, Result};
pub use letters::memory::MemoryLetterStore;
pub use letters::models::{
    Letter, LetterHistory, ReconcileOutcome, Reconciled, StatusObservation, TrackingNumber,
};
pub use letters::refresh::{BulkRefresher, RefreshAck, RefreshStats};
pub use letters::sqlite::SqliteLetterStore;
pub use letters::tracker::LetterTracker;
pub use letters::traits::{LetterStore, TrackingProvider};
