use crate::circuit_breaker::{create_provider_circuit_breaker, ProviderCircuitBreaker};
use crate::config::Config;
use crate::errors::AppError;
use crate::models::PartialResult;
use crate::normalizer::CanonicalNumber;
use async_trait::async_trait;
use failsafe::futures::CircuitBreaker;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

pub const CARRIER_SOURCE: &str = "carrier_lookup";
pub const BREACH_SOURCE: &str = "breach_lookup";
pub const REPUTATION_SOURCE: &str = "reputation_lookup";

/// API credentials for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: Option<String>,
}

/// Read-only credential lookup, built once from configuration at startup.
/// Sources whose keys are absent stay registered but report `Unavailable`.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    entries: HashMap<String, Credentials>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Self {
        let mut store = Self::new();
        if let Some(key) = &config.numverify_api_key {
            store.insert(CARRIER_SOURCE, Credentials {
                api_key: key.clone(),
                api_secret: None,
            });
        }
        if let Some(key) = &config.breach_api_key {
            store.insert(BREACH_SOURCE, Credentials {
                api_key: key.clone(),
                api_secret: None,
            });
        }
        if let Some(key) = &config.reputation_api_key {
            store.insert(REPUTATION_SOURCE, Credentials {
                api_key: key.clone(),
                api_secret: config.reputation_api_secret.clone(),
            });
        }
        store
    }

    pub fn insert(&mut self, source_name: impl Into<String>, credentials: Credentials) {
        self.entries.insert(source_name.into(), credentials);
    }

    pub fn get(&self, source_name: &str) -> Option<&Credentials> {
        self.entries.get(source_name)
    }
}

/// Capability shared by every external data source. Implementations own
/// the outbound request shape, response parsing, and the mapping of every
/// provider-specific error condition into a `PartialResult` status; no
/// error crosses this boundary as an `Err`.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn fetch(
        &self,
        canonical: &CanonicalNumber,
        credentials: Option<&Credentials>,
    ) -> PartialResult;
}

fn absorb(source_name: &str, result: Result<PartialResult, failsafe::Error<AppError>>) -> PartialResult {
    match result {
        Ok(partial) => partial,
        Err(failsafe::Error::Rejected) => PartialResult::failed(
            source_name,
            "circuit open; provider call skipped".to_string(),
        ),
        Err(failsafe::Error::Inner(e)) => PartialResult::failed(source_name, e.to_string()),
    }
}

// ============ Carrier / line-type lookup (Numverify-style) ============

pub struct CarrierLookupService {
    client: Client,
    base_url: String,
    breaker: ProviderCircuitBreaker,
}

impl CarrierLookupService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.numverify_base_url.clone(),
            breaker: create_provider_circuit_breaker(),
        }
    }

    async fn validate_number(
        &self,
        canonical: &CanonicalNumber,
        credentials: &Credentials,
    ) -> Result<PartialResult, AppError> {
        // Build URL with proper parameter encoding to prevent injection attacks
        let url = reqwest::Url::parse_with_params(
            &format!("{}/api/validate", self.base_url),
            &[
                ("access_key", credentials.api_key.as_str()),
                ("number", canonical.e164.as_str()),
                ("format", "1"),
            ],
        )
        .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;

        // Redact key from logs to prevent credential exposure
        tracing::debug!(
            "Carrier lookup URL: {}/api/validate?access_key=[REDACTED]&number={}",
            self.base_url,
            canonical.e164
        );

        let response = self.client.get(url).send().await.map_err(|e| {
            AppError::ExternalApiError(format!("Carrier lookup request failed: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Carrier lookup returned status {}: {}",
                status, error_text
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse carrier response: {}", e))
        })?;

        Ok(Self::map_response(&body))
    }

    /// Maps the raw validation payload to the uniform contract. Line types
    /// with a known abuse profile carry a risk signal; unrecognized line
    /// types are reported without one.
    fn map_response(body: &Value) -> PartialResult {
        if body.get("success").and_then(|v| v.as_bool()) == Some(false) {
            let info = body
                .pointer("/error/info")
                .and_then(|v| v.as_str())
                .unwrap_or("carrier API rejected the request");
            return PartialResult::failed(CARRIER_SOURCE, info.to_string());
        }

        let line_type = body
            .get("line_type")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_ascii_lowercase();

        let mut data = Map::new();
        data.insert(
            "carrier".to_string(),
            body.get("carrier").cloned().unwrap_or(Value::Null),
        );
        data.insert("line_type".to_string(), json!(line_type));
        data.insert(
            "location".to_string(),
            body.get("location").cloned().unwrap_or(Value::Null),
        );
        data.insert(
            "valid".to_string(),
            body.get("valid").cloned().unwrap_or(Value::Null),
        );

        let risk = match line_type.as_str() {
            "premium_rate" => Some(80.0),
            "voip" => Some(65.0),
            "mobile" | "landline" | "fixed_line" => Some(10.0),
            _ => None,
        };

        PartialResult::ok(CARRIER_SOURCE, data, risk)
    }
}

#[async_trait]
impl ProviderAdapter for CarrierLookupService {
    async fn fetch(
        &self,
        canonical: &CanonicalNumber,
        credentials: Option<&Credentials>,
    ) -> PartialResult {
        let credentials = match credentials {
            Some(c) if !c.api_key.trim().is_empty() => c,
            _ => {
                return PartialResult::unavailable(
                    CARRIER_SOURCE,
                    "NUMVERIFY_API_KEY not configured",
                )
            }
        };

        let result = self
            .breaker
            .call(self.validate_number(canonical, credentials))
            .await;
        absorb(CARRIER_SOURCE, result)
    }
}

// ============ Breach directory lookup ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreachRecord {
    pub name: String,
    pub domain: Option<String>,
    #[serde(rename = "breachDate")]
    pub breach_date: Option<String>,
}

pub struct BreachLookupService {
    client: Client,
    base_url: String,
    breaker: ProviderCircuitBreaker,
}

impl BreachLookupService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.breach_base_url.clone(),
            breaker: create_provider_circuit_breaker(),
        }
    }

    async fn lookup(
        &self,
        canonical: &CanonicalNumber,
        credentials: &Credentials,
    ) -> Result<PartialResult, AppError> {
        let url = format!("{}/api/phone/{}", self.base_url, canonical.e164);

        tracing::debug!("Breach lookup for {}", canonical.e164);

        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &credentials.api_key)
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalApiError(format!("Breach lookup request failed: {}", e))
            })?;

        // 404 is the documented "no breach records" answer, not an error.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Self::map_records(&[]));
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Breach directory returned status {}: {}",
                status, error_text
            )));
        }

        let records: Vec<BreachRecord> = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse breach response: {}", e))
        })?;

        Ok(Self::map_records(&records))
    }

    /// The signal scales with the number of breaches; a clean record is a
    /// weak positive signal rather than silence.
    fn map_records(records: &[BreachRecord]) -> PartialResult {
        let names: Vec<Value> = records.iter().map(|r| json!(r.name)).collect();

        let mut data = Map::new();
        data.insert("count".to_string(), json!(records.len()));
        data.insert("breaches".to_string(), Value::Array(names));

        let risk = if records.is_empty() {
            5.0
        } else {
            (records.len() as f64 * 30.0).min(90.0)
        };

        PartialResult::ok(BREACH_SOURCE, data, Some(risk))
    }
}

#[async_trait]
impl ProviderAdapter for BreachLookupService {
    async fn fetch(
        &self,
        canonical: &CanonicalNumber,
        credentials: Option<&Credentials>,
    ) -> PartialResult {
        let credentials = match credentials {
            Some(c) if !c.api_key.trim().is_empty() => c,
            _ => {
                return PartialResult::unavailable(BREACH_SOURCE, "BREACH_API_KEY not configured")
            }
        };

        let result = self.breaker.call(self.lookup(canonical, credentials)).await;
        absorb(BREACH_SOURCE, result)
    }
}

// ============ Reputation / spam scoring ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationResponse {
    pub spam_score: f64,
    pub reports: Option<u32>,
    pub category: Option<String>,
}

pub struct ReputationLookupService {
    client: Client,
    base_url: String,
    breaker: ProviderCircuitBreaker,
}

impl ReputationLookupService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.reputation_base_url.clone(),
            breaker: create_provider_circuit_breaker(),
        }
    }

    async fn score(
        &self,
        canonical: &CanonicalNumber,
        credentials: &Credentials,
    ) -> Result<PartialResult, AppError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/v1/reputation", self.base_url),
            &[("number", canonical.e164.as_str())],
        )
        .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;

        tracing::debug!("Reputation lookup for {}", canonical.e164);

        let request = self.client.get(url);
        // Account/secret pairs authenticate with basic auth, plain API keys
        // as a bearer token.
        let request = match &credentials.api_secret {
            Some(secret) => request.basic_auth(&credentials.api_key, Some(secret)),
            None => request.header(
                "Authorization",
                format!("Bearer {}", credentials.api_key),
            ),
        };

        let response = request.send().await.map_err(|e| {
            AppError::ExternalApiError(format!("Reputation request failed: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Reputation API returned status {}: {}",
                status, error_text
            )));
        }

        let reputation: ReputationResponse = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse reputation response: {}", e))
        })?;

        let mut data = Map::new();
        data.insert("spam_score".to_string(), json!(reputation.spam_score));
        data.insert("reports".to_string(), json!(reputation.reports));
        data.insert("category".to_string(), json!(reputation.category));

        // The provider's 0-100 spam score is the risk signal verbatim.
        Ok(PartialResult::ok(
            REPUTATION_SOURCE,
            data,
            Some(reputation.spam_score),
        ))
    }
}

#[async_trait]
impl ProviderAdapter for ReputationLookupService {
    async fn fetch(
        &self,
        canonical: &CanonicalNumber,
        credentials: Option<&Credentials>,
    ) -> PartialResult {
        let credentials = match credentials {
            Some(c) if !c.api_key.trim().is_empty() => c,
            _ => {
                return PartialResult::unavailable(
                    REPUTATION_SOURCE,
                    "REPUTATION_API_KEY not configured",
                )
            }
        };

        let result = self.breaker.call(self.score(canonical, credentials)).await;
        absorb(REPUTATION_SOURCE, result)
    }
}
