use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LA_POSTE_ENDPOINT: &str = "https://api.laposte.fr/suivi/v2";
pub const DEFAULT_LA_POSTE_LANGUAGE: &str = "en_GB";

#[derive(Debug, Clone)]
pub struct LaPosteConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub language: String,
    pub timeout: Duration,
}

impl LaPosteConfig {
    /// The API key, required before talking to La Poste.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            Error::InvalidInput("COURIER_LA_POSTE_API_KEY is required".to_string())
        })
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RefreshConfig {
    pub max_concurrency: usize,
    /// How long shutdown waits for in-flight refresh tasks.
    pub drain_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

/// Process configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct CourierConfig {
    pub la_poste: LaPosteConfig,
    pub store: StoreConfig,
    pub refresh: RefreshConfig,
    pub log_format: LogFormat,
}

impl CourierConfig {
    #[tracing::instrument(level = "debug")]
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |primary: &str, legacy: Option<&str>| {
            lookup(primary)
                .or_else(|| legacy.and_then(&lookup))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let number = |key: &str, default: u64| -> Result<u64> {
            match var(key, None) {
                None => Ok(default),
                Some(v) => v
                    .parse::<u64>()
                    .map_err(|e| Error::InvalidInput(format!("{key} must be an integer: {e}"))),
            }
        };

        let endpoint = var("COURIER_LA_POSTE_API_ENDPOINT", Some("LA_POST_API_ENDPOINT"))
            .unwrap_or_else(|| DEFAULT_LA_POSTE_ENDPOINT.to_string());
        let api_key = var("COURIER_LA_POSTE_API_KEY", Some("LA_POST_API_KEY"));
        let language = var("COURIER_LA_POSTE_LANGUAGE", Some("LA_POST_API_LANGUAGE"))
            .unwrap_or_else(|| DEFAULT_LA_POSTE_LANGUAGE.to_string());
        let timeout_ms = number("COURIER_LA_POSTE_TIMEOUT_MS", 10_000)?;

        let database_path = var("COURIER_DATABASE_PATH", None)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".courier/courier.db"));

        let max_concurrency = number("COURIER_REFRESH_MAX_CONCURRENCY", 16)?;
        let drain_timeout_ms = number("COURIER_REFRESH_DRAIN_TIMEOUT_MS", 30_000)?;

        let log_format = match var("COURIER_LOG_FORMAT", None).as_deref() {
            None | Some("json") => LogFormat::Json,
            Some("text") => LogFormat::Text,
            Some(other) => {
                return Err(Error::InvalidInput(format!(
                    "COURIER_LOG_FORMAT must be 'json' or 'text', got '{other}'"
                )));
            }
        };

        let cfg = Self {
            la_poste: LaPosteConfig {
                endpoint,
                api_key,
                language,
                timeout: Duration::from_millis(timeout_ms),
            },
            store: StoreConfig { database_path },
            refresh: RefreshConfig {
                max_concurrency: max_concurrency as usize,
                drain_timeout: Duration::from_millis(drain_timeout_ms),
            },
            log_format,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub fn validate(&self) -> Result<()> {
        if self.la_poste.endpoint.trim().is_empty() {
            return Err(Error::InvalidInput("la poste endpoint is empty".to_string()));
        }
        if self.la_poste.language.trim().is_empty() {
            return Err(Error::InvalidInput("la poste language is empty".to_string()));
        }
        if self.la_poste.timeout.is_zero() {
            return Err(Error::InvalidInput("la poste timeout must be > 0".to_string()));
        }
        if self.refresh.max_concurrency == 0 {
            return Err(Error::InvalidInput("refresh max_concurrency must be > 0".to_string()));
        }
        Ok(())
    }

    /// Configuration view with secrets masked, for printing.
    pub fn redacted(&self) -> serde_json::Value {
        serde_json::json!({
            "la_poste": {
                "endpoint": self.la_poste.endpoint,
                "api_key": self.la_poste.api_key.as_deref().map(redact),
                "language": self.la_poste.language,
                "timeout_ms": self.la_poste.timeout.as_millis() as u64,
            },
            "store": {
                "database_path": self.store.database_path.display().to_string(),
            },
            "refresh": {
                "max_concurrency": self.refresh.max_concurrency,
                "drain_timeout_ms": self.refresh.drain_timeout.as_millis() as u64,
            },
            "log_format": match self.log_format {
                LogFormat::Json => "json",
                LogFormat::Text => "text",
            },
        })
    }
}

fn redact(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}***{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = CourierConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.la_poste.endpoint, DEFAULT_LA_POSTE_ENDPOINT);
        assert_eq!(cfg.la_poste.language, "en_GB");
        assert_eq!(cfg.la_poste.api_key, None);
        assert_eq!(cfg.la_poste.timeout, Duration::from_secs(10));
        assert_eq!(cfg.refresh.max_concurrency, 16);
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert!(cfg.la_poste.require_api_key().is_err());
    }

    #[test]
    fn prefixed_names_win_over_legacy_names() {
        let cfg = CourierConfig::from_lookup(lookup(&[
            ("COURIER_LA_POSTE_API_KEY", "new-key"),
            ("LA_POST_API_KEY", "old-key"),
            ("LA_POST_API_LANGUAGE", "fr_FR"),
        ]))
        .unwrap();
        assert_eq!(cfg.la_poste.require_api_key().unwrap(), "new-key");
        assert_eq!(cfg.la_poste.language, "fr_FR");
    }

    #[test]
    fn rejects_bad_numbers_and_zero_concurrency() {
        assert!(
            CourierConfig::from_lookup(lookup(&[("COURIER_LA_POSTE_TIMEOUT_MS", "soon")])).is_err()
        );
        assert!(
            CourierConfig::from_lookup(lookup(&[("COURIER_REFRESH_MAX_CONCURRENCY", "0")]))
                .is_err()
        );
        assert!(CourierConfig::from_lookup(lookup(&[("COURIER_LOG_FORMAT", "xml")])).is_err());
    }

    #[test]
    fn redacted_view_masks_the_api_key() {
        let cfg = CourierConfig::from_lookup(lookup(&[(
            "COURIER_LA_POSTE_API_KEY",
            "abcd1234efgh5678",
        )]))
        .unwrap();
        let v = cfg.redacted();
        assert_eq!(v["la_poste"]["api_key"], "abcd***5678");
        assert_eq!(redact("short"), "***");
    }
}
