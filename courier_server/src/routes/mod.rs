use axum::Router;
use axum::routing::get;

pub mod letters;
pub mod ping;

#[tracing::instrument(level = "debug", skip_all)]
pub fn router() -> Router {
    Router::new().nest(
        "/v1",
        Router::new()
            .route("/ping", get(ping::get_ping))
            .merge(letters::router()),
    )
}
