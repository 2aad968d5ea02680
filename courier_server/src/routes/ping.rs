use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub message: &'static str,
}

#[tracing::instrument(level = "debug")]
pub async fn get_ping() -> Json<PingResponse> {
    Json(PingResponse { message: "pong" })
}
