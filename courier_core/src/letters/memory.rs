use crate::letters::models::{
    INITIAL_STATUS, Letter, LetterHistory, Reconciled, StatusObservation, TrackingNumber,
    sort_newest_first, truncate_to_micros,
};
use crate::letters::reconcile::{self, ReconcilePlan};
use crate::letters::traits::LetterStore;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Default)]
struct State {
    next_letter_id: i64,
    next_observation_id: i64,
    letters: BTreeMap<TrackingNumber, LetterHistory>,
}

impl State {
    fn next_letter_id(&mut self) -> i64 {
        self.next_letter_id += 1;
        self.next_letter_id
    }

    fn next_observation_id(&mut self) -> i64 {
        self.next_observation_id += 1;
        self.next_observation_id
    }
}

/// In-memory LetterStore for local development and tests.
///
/// Each call holds one lock for its whole duration, which gives the same
/// all-or-nothing semantics as the SQLite transactions.
#[derive(Clone, Default)]
pub struct MemoryLetterStore {
    state: Arc<Mutex<State>>,
}

impl MemoryLetterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of observations across all letters (primarily for tests).
    pub async fn observation_count(&self) -> usize {
        let state = self.state.lock().await;
        state.letters.values().map(|l| l.history.len()).sum()
    }
}

#[async_trait]
impl LetterStore for MemoryLetterStore {
    async fn register(
        &self,
        tracking_number: &TrackingNumber,
        now: DateTime<Utc>,
    ) -> Result<LetterHistory> {
        let now = truncate_to_micros(now);
        let mut state = self.state.lock().await;
        if state.letters.contains_key(tracking_number) {
            return Err(Error::DuplicateLetter(tracking_number.to_string()));
        }
        let letter = Letter {
            id: state.next_letter_id(),
            tracking_number: tracking_number.clone(),
            created_at: now,
            updated_at: now,
        };
        let initial = StatusObservation {
            id: state.next_observation_id(),
            status: INITIAL_STATUS.to_string(),
            observed_at: now,
        };
        let entry = LetterHistory {
            letter,
            history: vec![initial],
        };
        state.letters.insert(tracking_number.clone(), entry.clone());
        Ok(entry)
    }

    async fn get(&self, tracking_number: &TrackingNumber) -> Result<Option<LetterHistory>> {
        let state = self.state.lock().await;
        Ok(state.letters.get(tracking_number).cloned())
    }

    async fn exists(&self, tracking_number: &TrackingNumber) -> Result<bool> {
        Ok(self.state.lock().await.letters.contains_key(tracking_number))
    }

    async fn list_tracking_numbers(&self) -> Result<Vec<TrackingNumber>> {
        let state = self.state.lock().await;
        let mut letters: Vec<&Letter> = state.letters.values().map(|l| &l.letter).collect();
        letters.sort_by_key(|l| l.id);
        Ok(letters.into_iter().map(|l| l.tracking_number.clone()).collect())
    }

    async fn reconcile_status(
        &self,
        tracking_number: &TrackingNumber,
        status: &str,
        now: DateTime<Utc>,
    ) -> Result<Reconciled> {
        let mut state = self.state.lock().await;
        let next_id = state.next_observation_id + 1;
        let entry = state
            .letters
            .get_mut(tracking_number)
            .ok_or_else(|| Error::NotFound(format!("letter '{tracking_number}' not found")))?;

        let planned = reconcile::plan(entry.current(), status, now);
        let observation = match planned {
            ReconcilePlan::Touch {
                observation_id,
                observed_at,
            } => {
                let obs = entry
                    .history
                    .iter_mut()
                    .find(|o| o.id == observation_id)
                    .ok_or_else(|| {
                        Error::BackendMessage(format!(
                            "observation {observation_id} vanished during reconcile"
                        ))
                    })?;
                obs.observed_at = observed_at;
                obs.clone()
            }
            ReconcilePlan::Append { observed_at } => {
                let obs = StatusObservation {
                    id: next_id,
                    status: status.to_string(),
                    observed_at,
                };
                entry.history.push(obs.clone());
                obs
            }
        };
        sort_newest_first(&mut entry.history);
        entry.letter.updated_at = truncate_to_micros(now);

        if matches!(planned, ReconcilePlan::Append { .. }) {
            state.next_observation_id = next_id;
        }

        Ok(Reconciled {
            tracking_number: tracking_number.clone(),
            observation,
            outcome: planned.outcome(),
        })
    }

    async fn delete(&self, tracking_number: &TrackingNumber) -> Result<bool> {
        let mut state = self.state.lock().await;
        Ok(state.letters.remove(tracking_number).is_some())
    }
}
