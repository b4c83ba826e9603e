//! Flight-price lookup through the Serper Google search API.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::error::ToolError;

const SERPER_SEARCH_URL: &str = "https://google.serper.dev/search";
const GOOGLE_FLIGHTS_PREFIX: &str = "https://www.google.com/travel/flights";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const TOOL_NAME: &str = "flight_search";

/// Text returned when the search produced nothing usable.
pub const NO_FLIGHTS_MESSAGE: &str = "No flight information found for the specified route.";

/// Looks up flight prices for a route and returns a readable summary.
#[async_trait]
pub trait FlightSearch: Send + Sync {
    /// `origin_country_code` is an ISO 3166-1 alpha-2 code such as `pt`.
    /// Cities should include the country, e.g. `Lisbon, Portugal`.
    async fn search(
        &self,
        origin_country_code: &str,
        origin_city: &str,
        arrival_city: &str,
    ) -> Result<String, ToolError>;
}

/// [`FlightSearch`] backed by `google.serper.dev`.
pub struct SerperFlightSearch {
    api_key: SecretString,
    client: reqwest::Client,
    endpoint: String,
}

impl SerperFlightSearch {
    pub fn new(api_key: SecretString) -> Self {
        Self::with_endpoint(api_key, SERPER_SEARCH_URL)
    }

    /// Point the client at a different search endpoint.
    pub fn with_endpoint(api_key: SecretString, endpoint: impl Into<String>) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

fn request_body(origin_country_code: &str, origin_city: &str, arrival_city: &str) -> Value {
    serde_json::json!({
        "q": format!("{origin_city} to {arrival_city} prices of flights"),
        "location": origin_country_code,
        "gl": origin_country_code,
        "engine": "google_flights",
        "departure_id": origin_city,
        "arrival_id": arrival_city,
    })
}

#[async_trait]
impl FlightSearch for SerperFlightSearch {
    async fn search(
        &self,
        origin_country_code: &str,
        origin_city: &str,
        arrival_city: &str,
    ) -> Result<String, ToolError> {
        let params = [
            ("origin_country_code", origin_country_code),
            ("origin_city", origin_city),
            ("arrival_city", arrival_city),
        ];
        if let Some((name, _)) = params.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(ToolError::InvalidParameters {
                name: TOOL_NAME.into(),
                reason: format!("{name} must not be empty"),
            });
        }

        tracing::info!(origin_city, arrival_city, "Searching flight prices");
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", self.api_key.expose_secret())
            .timeout(REQUEST_TIMEOUT)
            .json(&request_body(origin_country_code, origin_city, arrival_city))
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                name: TOOL_NAME.into(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ToolError::AuthRequired {
                name: TOOL_NAME.into(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::ExecutionFailed {
                name: TOOL_NAME.into(),
                reason: format!("search returned {status}: {body}"),
            });
        }

        let body: Value = response.json().await.map_err(|e| ToolError::ExecutionFailed {
            name: TOOL_NAME.into(),
            reason: format!("invalid search response: {e}"),
        })?;
        Ok(format_flight_results(&body))
    }
}

/// Collect result snippets and the first Google Flights link.
pub fn format_flight_results(response: &Value) -> String {
    let mut lines = Vec::new();
    let mut booking_link = None;

    let results = response.get("organic").and_then(Value::as_array);
    for item in results.into_iter().flatten() {
        if booking_link.is_none() {
            if let Some(url) = item
                .get("link")
                .and_then(Value::as_str)
                .filter(|url| url.starts_with(GOOGLE_FLIGHTS_PREFIX))
            {
                booking_link = Some(format!("Get flight details from Google Flights: {url}"));
            }
        }
        if let Some(snippet) = item
            .get("snippet")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
        {
            lines.push(snippet.to_string());
        }
    }
    lines.extend(booking_link);

    if lines.is_empty() {
        NO_FLIGHTS_MESSAGE.to_string()
    } else {
        lines.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn snippets_then_first_flights_link() {
        let response = json!({
            "organic": [
                {"link": "https://example.com/cheap", "snippet": "From $89 one way"},
                {"link": "https://www.google.com/travel/flights?q=LIS-CDG", "snippet": "Nonstop from $120"},
                {"link": "https://www.google.com/travel/flights?q=other", "snippet": ""}
            ]
        });
        let text = format_flight_results(&response);
        assert_eq!(
            text,
            "From $89 one way\n\nNonstop from $120\n\n\
             Get flight details from Google Flights: https://www.google.com/travel/flights?q=LIS-CDG"
        );
    }

    #[test]
    fn empty_results() {
        assert_eq!(format_flight_results(&json!({})), NO_FLIGHTS_MESSAGE);
        assert_eq!(
            format_flight_results(&json!({"organic": [{"link": "https://x.test"}]})),
            NO_FLIGHTS_MESSAGE
        );
    }

    #[test]
    fn request_body_names_the_route() {
        let body = request_body("pt", "Lisbon, Portugal", "Paris, France");
        assert_eq!(body["q"], "Lisbon, Portugal to Paris, France prices of flights");
        assert_eq!(body["gl"], "pt");
        assert_eq!(body["engine"], "google_flights");
    }

    #[tokio::test]
    async fn empty_parameters_are_rejected_before_any_request() {
        let search = SerperFlightSearch::with_endpoint(
            SecretString::from("key"),
            "http://127.0.0.1:9/unreachable",
        );
        let err = search.search("pt", " ", "Paris").await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters { .. }));
    }
}
