use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use courier_core::error as core_error;
use serde_json::{Value, json};

pub const MISSING_TRACKING_NUMBER: &str = "Tracking number should be specified.";
pub const DUPLICATE_LETTER: &str = "Letter is already present in DB.";
pub const LETTER_NOT_FOUND: &str = "Letter is not found.";
pub const UNAUTHORIZED: &str = "Unauthorized error. You need to provide correct API keys.";
pub const PROVIDER_DOWN: &str = "Looks like external tracking API is down. Please, try again later.";
pub const INTERNAL: &str = "Internal server error.";
pub const SHUTTING_DOWN: &str = "Server is shutting down.";

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("tracking number not specified")]
    MissingTrackingNumber,

    /// Carries the tracking number exactly as the client sent it.
    #[error("letter already registered: {0}")]
    DuplicateLetter(Value),

    #[error("letter not found: {0}")]
    LetterNotFound(String),

    #[error("{0}")]
    Core(#[from] courier_core::Error),
}

impl ApiError {
    /// Attach the requested tracking number to letter-level failures.
    pub fn for_letter(err: courier_core::Error, tracking_number: &str) -> Self {
        match err {
            core_error::Error::NotFound(_) => ApiError::LetterNotFound(tracking_number.to_string()),
            core_error::Error::DuplicateLetter(_) => {
                ApiError::DuplicateLetter(Value::String(tracking_number.to_string()))
            }
            other => ApiError::Core(other),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingTrackingNumber | ApiError::DuplicateLetter(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::LetterNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Core(err) => match err {
                core_error::Error::InvalidInput(_) | core_error::Error::DuplicateLetter(_) => {
                    StatusCode::BAD_REQUEST
                }
                core_error::Error::NotFound(_) => StatusCode::NOT_FOUND,
                core_error::Error::Provider(core_error::ProviderError::Unauthorized) => {
                    StatusCode::UNAUTHORIZED
                }
                core_error::Error::Provider(core_error::ProviderError::Unavailable { .. }) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                core_error::Error::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
                core_error::Error::Backend { .. } | core_error::Error::BackendMessage(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    fn body(&self) -> Value {
        match self {
            ApiError::MissingTrackingNumber => {
                json!({ "tracking_number": null, "message": MISSING_TRACKING_NUMBER })
            }
            ApiError::DuplicateLetter(tracking_number) => {
                json!({ "tracking_number": tracking_number, "message": DUPLICATE_LETTER })
            }
            ApiError::LetterNotFound(tracking_number) => {
                json!({ "tracking_number": tracking_number, "message": LETTER_NOT_FOUND })
            }
            ApiError::Core(err) => {
                let message = match err {
                    core_error::Error::InvalidInput(msg) => msg.as_str(),
                    core_error::Error::DuplicateLetter(_) => DUPLICATE_LETTER,
                    core_error::Error::NotFound(_) => LETTER_NOT_FOUND,
                    core_error::Error::Provider(core_error::ProviderError::Unauthorized) => {
                        UNAUTHORIZED
                    }
                    core_error::Error::Provider(_) => PROVIDER_DOWN,
                    core_error::Error::ShuttingDown => SHUTTING_DOWN,
                    core_error::Error::Backend { .. } | core_error::Error::BackendMessage(_) => {
                        INTERNAL
                    }
                };
                json!({ "message": message })
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.status_code();
        if code.is_server_error() {
            tracing::error!(error = %self, status = code.as_u16(), "request failed");
        }
        (code, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::ProviderError;

    #[test]
    fn provider_errors_map_to_fixed_codes() {
        let unauthorized = ApiError::from(courier_core::Error::Provider(ProviderError::Unauthorized));
        assert_eq!(unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(unauthorized.body(), json!({ "message": UNAUTHORIZED }));

        let down = ApiError::from(courier_core::Error::Provider(
            ProviderError::unavailable_message("timeout"),
        ));
        assert_eq!(down.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(down.body(), json!({ "message": PROVIDER_DOWN }));
    }

    #[test]
    fn letter_errors_echo_the_tracking_number() {
        let missing = ApiError::for_letter(courier_core::Error::NotFound("x".into()), "42");
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            missing.body(),
            json!({ "tracking_number": "42", "message": LETTER_NOT_FOUND })
        );

        let backend = ApiError::for_letter(courier_core::Error::BackendMessage("db".into()), "42");
        assert_eq!(backend.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(backend.body(), json!({ "message": INTERNAL }));
    }
}
