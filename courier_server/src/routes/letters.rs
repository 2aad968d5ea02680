//! `/v1/letters` routes: registration, lookup, and refresh of tracked letters.

use crate::error::ApiError;
use crate::server::AppState;
use axum::Extension;
use axum::Json;
use axum::body::Bytes;
use axum::extract::Path;
use axum::routing::{get, post};
use courier_core::{LetterHistory, TrackingNumber};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

pub const LETTER_CREATED: &str = "Letter has been created";
pub const LETTER_DELETED: &str = "Letter has been deleted";
pub const BULK_UPDATE_STARTED: &str =
    "Update for all letters has started. Results will be available shortly.";

#[tracing::instrument(level = "debug", skip_all)]
pub fn router() -> axum::Router {
    axum::Router::new()
        .route("/letters", post(create_letter).put(refresh_all_letters))
        .route(
            "/letters/{tracking_number}",
            get(get_letter).put(refresh_letter).delete(delete_letter),
        )
}

#[derive(Debug, Serialize)]
pub struct LetterMessage {
    pub tracking_number: Value,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StatusEntry {
    pub status: String,
    pub modification_date: String,
}

#[derive(Debug, Serialize)]
pub struct LetterStatusHistory {
    pub tracking_number: String,
    pub status_history: Vec<StatusEntry>,
}

impl From<LetterHistory> for LetterStatusHistory {
    fn from(value: LetterHistory) -> Self {
        Self {
            tracking_number: value.letter.tracking_number.into(),
            status_history: value
                .history
                .into_iter()
                .map(|o| StatusEntry {
                    modification_date: o.modification_date(),
                    status: o.status,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BulkRefreshResponse {
    pub message: &'static str,
}

/// Pull `tracking_number` out of a request body, keeping the raw JSON value for echoing.
///
/// Missing, empty, or unparsable bodies all count as "not specified".
fn tracking_number_from_body(body: &[u8]) -> Result<(Value, TrackingNumber), ApiError> {
    let parsed: Value =
        serde_json::from_slice(body).map_err(|_| ApiError::MissingTrackingNumber)?;
    let raw = parsed
        .get("tracking_number")
        .cloned()
        .ok_or(ApiError::MissingTrackingNumber)?;
    let tracking_number =
        TrackingNumber::from_json(&raw).map_err(|_| ApiError::MissingTrackingNumber)?;
    Ok((raw, tracking_number))
}

fn tracking_number_from_path(raw: &str) -> Result<TrackingNumber, ApiError> {
    TrackingNumber::new(raw).map_err(|_| ApiError::LetterNotFound(raw.to_string()))
}

#[tracing::instrument(level = "info", skip_all)]
pub async fn create_letter(
    Extension(state): Extension<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<LetterMessage>, ApiError> {
    let (raw, tracking_number) = tracking_number_from_body(&body)?;
    match state.tracker.register(&tracking_number).await {
        Ok(_) => Ok(Json(LetterMessage {
            tracking_number: raw,
            message: LETTER_CREATED.to_string(),
        })),
        Err(courier_core::Error::DuplicateLetter(_)) => Err(ApiError::DuplicateLetter(raw)),
        Err(e) => Err(e.into()),
    }
}

#[tracing::instrument(level = "info", skip_all)]
pub async fn refresh_all_letters(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<BulkRefreshResponse>, ApiError> {
    let ack = state.refresher.refresh_all().await?;
    tracing::debug!(batch_id = %ack.batch_id, scheduled = ack.scheduled, "bulk refresh scheduled");
    Ok(Json(BulkRefreshResponse {
        message: BULK_UPDATE_STARTED,
    }))
}

#[tracing::instrument(level = "debug", skip_all, fields(tracking_number = %raw))]
pub async fn get_letter(
    Extension(state): Extension<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Result<Json<LetterStatusHistory>, ApiError> {
    let tracking_number = tracking_number_from_path(&raw)?;
    let letter = state
        .tracker
        .get(&tracking_number)
        .await
        .map_err(|e| ApiError::for_letter(e, &raw))?;
    Ok(Json(letter.into()))
}

#[tracing::instrument(level = "info", skip_all, fields(tracking_number = %raw))]
pub async fn refresh_letter(
    Extension(state): Extension<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Result<Json<LetterMessage>, ApiError> {
    let tracking_number = tracking_number_from_path(&raw)?;
    let reconciled = state
        .tracker
        .refresh_one(&tracking_number)
        .await
        .map_err(|e| ApiError::for_letter(e, &raw))?;
    Ok(Json(LetterMessage {
        tracking_number: Value::String(raw),
        message: reconciled.observation.status,
    }))
}

#[tracing::instrument(level = "info", skip_all, fields(tracking_number = %raw))]
pub async fn delete_letter(
    Extension(state): Extension<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Result<Json<LetterMessage>, ApiError> {
    let tracking_number = tracking_number_from_path(&raw)?;
    state
        .tracker
        .delete(&tracking_number)
        .await
        .map_err(|e| ApiError::for_letter(e, &raw))?;
    Ok(Json(LetterMessage {
        tracking_number: Value::String(raw),
        message: LETTER_DELETED.to_string(),
    }))
}
