use crate::{Error, Result};
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status recorded for every letter at registration time.
pub const INITIAL_STATUS: &str = "New";

/// Label used when a provider answers "not found" without a message of its own.
pub const UNKNOWN_STATUS: &str = "Unknown status";

/// Rendering of `observed_at` in API responses.
pub const MODIFICATION_DATE_FORMAT: &str = "%d.%m.%Y, %H:%M:%S";

/// A validated, trimmed, non-empty tracking number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TrackingNumber(String);

impl TrackingNumber {
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("tracking number is empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Accept a tracking number as clients send it: a non-empty string or a number.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::String(s) => Self::new(s.as_str()),
            serde_json::Value::Number(n) => Self::new(n.to_string()),
            other => Err(Error::InvalidInput(format!(
                "tracking number must be a string or a number, got {other}"
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackingNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TrackingNumber {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<TrackingNumber> for String {
    fn from(value: TrackingNumber) -> Self {
        value.0
    }
}

/// Truncate a timestamp to the precision the stores keep.
pub fn truncate_to_micros(at: DateTime<Utc>) -> DateTime<Utc> {
    at.duration_trunc(TimeDelta::microseconds(1)).unwrap_or(at)
}

/// A tracked letter. Its status observations are owned by it and deleted with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Letter {
    pub id: i64,
    pub tracking_number: TrackingNumber,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One observed status label and the last time it was observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusObservation {
    pub id: i64,
    pub status: String,
    pub observed_at: DateTime<Utc>,
}

impl StatusObservation {
    pub fn modification_date(&self) -> String {
        self.observed_at.format(MODIFICATION_DATE_FORMAT).to_string()
    }
}

/// A letter together with its full status history, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetterHistory {
    pub letter: Letter,
    pub history: Vec<StatusObservation>,
}

impl LetterHistory {
    /// The observation with the greatest timestamp.
    pub fn current(&self) -> Option<&StatusObservation> {
        self.history.first()
    }
}

/// Order observations newest first; on equal timestamps the later write wins.
pub(crate) fn sort_newest_first(history: &mut [StatusObservation]) {
    history.sort_by(|a, b| {
        b.observed_at
            .cmp(&a.observed_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// The latest observation already carried the label; only its timestamp moved.
    Touched,
    /// A new observation was appended to the history.
    Appended,
}

/// Result of reconciling one provider answer into a letter's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconciled {
    pub tracking_number: TrackingNumber,
    pub observation: StatusObservation,
    pub outcome: ReconcileOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn tracking_number_is_trimmed_and_non_empty() {
        assert_eq!(TrackingNumber::new("  6A123 ").unwrap().as_str(), "6A123");
        assert!(matches!(
            TrackingNumber::new("   "),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn tracking_number_from_json_accepts_strings_and_numbers() {
        let n = TrackingNumber::from_json(&serde_json::json!(42)).unwrap();
        assert_eq!(n.as_str(), "42");
        let s = TrackingNumber::from_json(&serde_json::json!("LA123")).unwrap();
        assert_eq!(s.as_str(), "LA123");

        for bad in [
            serde_json::json!(null),
            serde_json::json!(""),
            serde_json::json!(true),
            serde_json::json!(["42"]),
            serde_json::json!({"id": 42}),
        ] {
            assert!(TrackingNumber::from_json(&bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn modification_date_uses_day_first_format() {
        let obs = StatusObservation {
            id: 1,
            status: INITIAL_STATUS.to_string(),
            observed_at: Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 1).unwrap(),
        };
        assert_eq!(obs.modification_date(), "07.03.2024, 09:05:01");
    }

    #[test]
    fn newest_first_breaks_ties_by_id() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut history = vec![
            StatusObservation { id: 1, status: "a".into(), observed_at: at },
            StatusObservation { id: 3, status: "c".into(), observed_at: at - TimeDelta::seconds(5) },
            StatusObservation { id: 2, status: "b".into(), observed_at: at },
        ];
        sort_newest_first(&mut history);
        let ids: Vec<i64> = history.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }
}
