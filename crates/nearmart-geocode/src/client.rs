//! HTTP client for Nominatim's reverse geocoding endpoint.
//!
//! Wraps `reqwest` with retry on transient failures and maps the JSON
//! payload onto [`PlaceAddress`]. Any Nominatim-compatible server works;
//! point [`NominatimClient::with_base_url`] at a self-hosted instance or a
//! mock server in tests.

use std::time::Duration;

use async_trait::async_trait;
use nearmart_core::{Coordinates, EngineConfig, PlaceAddress};
use nearmart_discovery::{BoxError, ReverseGeocoder};
use reqwest::{Client, StatusCode, Url};

use crate::error::GeocodeError;
use crate::retry::retry_with_backoff;
use crate::types::ReverseResponse;

pub const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org/";

const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;

/// Street-level detail.
const REVERSE_ZOOM: &str = "18";

/// Keep the first three comma-separated parts of a Nominatim
/// `display_name`; shorter names are returned unchanged.
#[must_use]
pub fn format_address(display_name: &str) -> String {
    let parts: Vec<&str> = display_name.split(", ").collect();
    if parts.len() >= 3 {
        parts[..3].join(", ")
    } else {
        display_name.to_string()
    }
}

pub struct NominatimClient {
    client: Client,
    reverse_endpoint: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl NominatimClient {
    /// Creates a client for the public OpenStreetMap instance.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the `reqwest::Client` cannot be
    /// constructed.
    pub fn new(user_agent: &str, timeout_secs: u64, max_retries: u32) -> Result<Self, GeocodeError> {
        Self::with_base_url(DEFAULT_BASE_URL, user_agent, timeout_secs, max_retries)
    }

    /// Creates a client from the `NEARMART_GEOCODER_*` settings.
    ///
    /// # Errors
    ///
    /// See [`NominatimClient::with_base_url`].
    pub fn from_config(config: &EngineConfig) -> Result<Self, GeocodeError> {
        Self::with_base_url(
            &config.geocoder_url,
            &config.geocoder_user_agent,
            config.geocoder_timeout_secs,
            config.geocoder_max_retries,
        )
    }

    /// Creates a client against a custom base URL.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the `reqwest::Client` cannot be
    /// constructed, or [`GeocodeError::InvalidBaseUrl`] if `base_url` does
    /// not parse.
    pub fn with_base_url(
        base_url: &str,
        user_agent: &str,
        timeout_secs: u64,
        max_retries: u32,
    ) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.min(10)))
            .user_agent(user_agent)
            .build()?;

        // Exactly one trailing slash, so `join` appends to a base path such
        // as `/nominatim/` instead of replacing its last segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let invalid = |reason: String| GeocodeError::InvalidBaseUrl {
            url: base_url.to_owned(),
            reason,
        };
        let reverse_endpoint = Url::parse(&normalised)
            .and_then(|base| base.join("reverse"))
            .map_err(|e| invalid(e.to_string()))?;
        if reverse_endpoint.cannot_be_a_base() {
            return Err(invalid("not a hierarchical URL".to_owned()));
        }

        Ok(Self {
            client,
            reverse_endpoint,
            max_retries,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
        })
    }

    /// Override the base back-off delay between retries.
    #[must_use]
    pub fn with_backoff_base_ms(mut self, backoff_base_ms: u64) -> Self {
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    /// Resolve `coordinates` to a place.
    ///
    /// # Errors
    ///
    /// - [`GeocodeError::NoResult`] if the server has no place there.
    /// - [`GeocodeError::RateLimited`] or [`GeocodeError::UnexpectedStatus`]
    ///   once retries are exhausted.
    /// - [`GeocodeError::Http`] on network failure.
    /// - [`GeocodeError::Deserialize`] if the body does not match the
    ///   expected shape.
    pub async fn reverse(&self, coordinates: Coordinates) -> Result<PlaceAddress, GeocodeError> {
        let url = self.reverse_url(coordinates);
        tracing::debug!(lat = coordinates.lat, lng = coordinates.lng, "reverse geocoding");

        let body = retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.request_json(&url)
        })
        .await?;

        if let Some(message) = body.get("error").and_then(serde_json::Value::as_str) {
            return Err(GeocodeError::NoResult(message.to_owned()));
        }

        let response: ReverseResponse =
            serde_json::from_value(body).map_err(|e| GeocodeError::Deserialize {
                context: format!("reverse({coordinates})"),
                source: e,
            })?;

        Ok(response.into_place())
    }

    fn reverse_url(&self, coordinates: Coordinates) -> Url {
        let mut url = self.reverse_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("format", "json")
            .append_pair("lat", &coordinates.lat.to_string())
            .append_pair("lon", &coordinates.lng.to_string())
            .append_pair("zoom", REVERSE_ZOOM)
            .append_pair("addressdetails", "1");
        url
    }

    async fn request_json(&self, url: &Url) -> Result<serde_json::Value, GeocodeError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }
        if !status.is_success() {
            return Err(GeocodeError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| GeocodeError::Deserialize {
            context: url.to_string(),
            source: e,
        })
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimClient {
    async fn reverse_geocode(&self, coordinates: Coordinates) -> Result<PlaceAddress, BoxError> {
        Ok(self.reverse(coordinates).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(base_url: &str) -> NominatimClient {
        NominatimClient::with_base_url(base_url, "nearmart-test", 5, 0)
            .expect("client construction should not fail")
    }

    #[test]
    fn reverse_url_carries_all_query_parameters() {
        let client = test_client("https://nominatim.openstreetmap.org");
        let url = client.reverse_url(Coordinates::new(28.7041, 77.1025));
        assert_eq!(
            url.as_str(),
            "https://nominatim.openstreetmap.org/reverse?format=json&lat=28.7041&lon=77.1025&zoom=18&addressdetails=1"
        );
    }

    #[test]
    fn base_path_is_preserved() {
        let client = test_client("http://localhost:8080/nominatim/");
        let url = client.reverse_url(Coordinates::new(1.5, -2.25));
        assert!(
            url.as_str()
                .starts_with("http://localhost:8080/nominatim/reverse?format=json&lat=1.5&lon=-2.25"),
            "unexpected url: {url}"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = NominatimClient::with_base_url("not a url", "nearmart-test", 5, 0);
        assert!(matches!(result, Err(GeocodeError::InvalidBaseUrl { .. })));
    }

    #[test]
    fn format_address_keeps_first_three_parts() {
        assert_eq!(
            format_address("Rohini, North West Delhi, Delhi, 110085, India"),
            "Rohini, North West Delhi, Delhi"
        );
        assert_eq!(format_address("Delhi, India"), "Delhi, India");
        assert_eq!(format_address(""), "");
    }
}
