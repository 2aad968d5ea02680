#![allow(dead_code)]

use async_trait::async_trait;
use courier_core::{ProviderError, TrackingNumber, TrackingProvider};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

pub enum Answer {
    Status(&'static str),
    Unauthorized,
    Unavailable,
    Panic,
}

/// Provider that replays queued answers per tracking number.
///
/// When a queue runs dry the last answer for that number is repeated.
#[derive(Default)]
pub struct ScriptedProvider {
    answers: Mutex<HashMap<String, VecDeque<Answer>>>,
    last: Mutex<HashMap<String, &'static str>>,
    delay: Option<Duration>,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub async fn push(&self, tracking_number: &str, answer: Answer) {
        self.answers
            .lock()
            .await
            .entry(tracking_number.to_string())
            .or_default()
            .push_back(answer);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrackingProvider for ScriptedProvider {
    fn id(&self) -> &'static str {
        "scripted"
    }

    async fn fetch(&self, tracking_number: &TrackingNumber) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self
            .answers
            .lock()
            .await
            .get_mut(tracking_number.as_str())
            .and_then(|q| q.pop_front());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut last = self.last.lock().await;
        match next {
            Some(Answer::Status(s)) => {
                last.insert(tracking_number.to_string(), s);
                Ok(s.to_string())
            }
            Some(Answer::Unauthorized) => Err(ProviderError::Unauthorized),
            Some(Answer::Unavailable) => Err(ProviderError::unavailable_message("scripted outage")),
            Some(Answer::Panic) => panic!("scripted provider panic"),
            None => match last.get(tracking_number.as_str()) {
                Some(s) => Ok(s.to_string()),
                None => Ok("Unknown status".to_string()),
            },
        }
    }
}

pub fn tn(raw: &str) -> TrackingNumber {
    TrackingNumber::new(raw).unwrap()
}

pub fn provider() -> Arc<ScriptedProvider> {
    Arc::new(ScriptedProvider::new())
}
