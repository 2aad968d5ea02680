//! La Poste tracking provider.
//!
//! Calls `GET {endpoint}/idships/{tracking_number}?lang={language}` on the La Poste
//! "suivi" API and extracts the most recent event label.

use async_trait::async_trait;
use courier_core::letters::models::UNKNOWN_STATUS;
use courier_core::{Error, LaPosteConfig, ProviderError, Result, TrackingNumber, TrackingProvider};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::instrument;

const API_KEY_HEADER: &str = "X-Okapi-Key";

#[derive(Debug, Deserialize)]
struct IdshipResponse {
    shipment: Shipment,
}

#[derive(Debug, Deserialize)]
struct Shipment {
    #[serde(default)]
    event: Vec<ShipmentEvent>,
}

#[derive(Debug, Deserialize)]
struct ShipmentEvent {
    label: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "returnMessage")]
    return_message: Option<String>,
}

#[derive(Clone)]
pub struct LaPosteClient {
    client: Client,
    base: Url,
    language: String,
}

impl LaPosteClient {
    #[instrument(level = "debug", skip(cfg))]
    pub fn new(cfg: &LaPosteConfig) -> Result<Self> {
        let api_key = cfg.require_api_key()?;

        let mut key = HeaderValue::from_str(api_key)
            .map_err(|e| Error::backend("la poste api key header", e))?;
        key.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(API_KEY_HEADER, key);

        let client = Client::builder()
            .timeout(cfg.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::backend("build la poste http client", e))?;

        let base = Url::parse(cfg.endpoint.trim_end_matches('/'))
            .map_err(|e| Error::backend("parse la poste endpoint", e))?;
        if base.cannot_be_a_base() {
            return Err(Error::InvalidInput(format!(
                "la poste endpoint '{}' is not a base url",
                cfg.endpoint
            )));
        }

        Ok(Self {
            client,
            base,
            language: cfg.language.clone(),
        })
    }

    fn idship_url(&self, tracking_number: &TrackingNumber) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("idships")
                .push(tracking_number.as_str());
        }
        url.query_pairs_mut().append_pair("lang", &self.language);
        url
    }
}

#[async_trait]
impl TrackingProvider for LaPosteClient {
    fn id(&self) -> &'static str {
        "la_poste"
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch(
        &self,
        tracking_number: &TrackingNumber,
    ) -> std::result::Result<String, ProviderError> {
        let resp = self
            .client
            .get(self.idship_url(tracking_number))
            .send()
            .await
            .map_err(|e| ProviderError::unavailable("la poste request", e))?;

        let status = resp.status();
        match status {
            StatusCode::OK => {
                let body: IdshipResponse = resp
                    .json()
                    .await
                    .map_err(|e| ProviderError::unavailable("decode la poste shipment", e))?;
                body.shipment
                    .event
                    .into_iter()
                    .next()
                    .map(|e| e.label)
                    .ok_or_else(|| {
                        ProviderError::unavailable_message("la poste shipment has no events")
                    })
            }
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => {
                let text = resp
                    .text()
                    .await
                    .map_err(|e| ProviderError::unavailable("read la poste error body", e))?;
                let message = serde_json::from_str::<ErrorBody>(&text)
                    .ok()
                    .and_then(|b| b.return_message)
                    .unwrap_or_else(|| UNKNOWN_STATUS.to_string());
                tracing::debug!(%status, return_message = %message, "la poste does not know the letter");
                Ok(message)
            }
            StatusCode::UNAUTHORIZED => {
                tracing::error!("la poste rejected the api key");
                Err(ProviderError::Unauthorized)
            }
            other => Err(ProviderError::unavailable_message(format!(
                "la poste returned {other}"
            ))),
        }
    }
}
