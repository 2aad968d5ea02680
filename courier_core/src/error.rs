use std::error::Error as StdError;

/// Common error type for `courier_core`.
///
/// Store backends preserve the underlying error chain via `Error::backend`.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("letter already registered: {0}")]
    DuplicateLetter(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("shutting down")]
    ShuttingDown,

    #[error("backend error: {context}")]
    Backend {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },

    #[error("backend error: {0}")]
    BackendMessage(String),
}

impl Error {
    #[tracing::instrument(level = "debug", name = "courier.error.backend", skip(source))]
    pub fn backend(
        context: impl Into<String> + std::fmt::Debug,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

/// Failures reported by a tracking provider.
///
/// "Not found" style answers are not errors: providers report them as a status label.
#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("tracking provider rejected the api credentials")]
    Unauthorized,

    #[error("tracking provider unavailable: {context}")]
    Unavailable {
        context: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    },
}

impl ProviderError {
    pub fn unavailable(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Unavailable {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn unavailable_message(context: impl Into<String>) -> Self {
        Self::Unavailable {
            context: context.into(),
            source: None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
