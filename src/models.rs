use crate::normalizer::CanonicalNumber;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Terminal state of a single source invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Ok,
    Failed,
    TimedOut,
    Unavailable,
}

/// Whether a registered source is an external provider or a local plugin.
/// The pipeline treats both identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Provider,
    Plugin,
}

/// One configured intelligence source. Built once at startup from
/// configuration; read-only for the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRegistration {
    /// Unique key, matched 1:1 against `PartialResult.source_name`.
    pub name: String,
    /// Relative importance in the weighted score. Must be > 0.
    pub weight: f64,
    pub kind: SourceKind,
    pub enabled: bool,
    /// Per-source invocation deadline enforced by the aggregator.
    pub timeout_ms: u64,
}

/// The outcome of one source invocation. Exactly one is produced per
/// enabled source per analysis run; the aggregator owns it afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialResult {
    pub source_name: String,
    pub status: SourceStatus,
    /// Source-specific payload; shape varies per source.
    pub data: Map<String, Value>,
    /// Risk signal in [0,100]. Present only for `Ok` results from sources
    /// that declare one; absent results are listed but never scored.
    pub risk_contribution: Option<f64>,
    pub latency_ms: u64,
}

impl PartialResult {
    /// Successful invocation, optionally carrying a risk signal.
    /// Contributions are clamped to [0,100].
    pub fn ok(
        source_name: impl Into<String>,
        data: Map<String, Value>,
        risk_contribution: Option<f64>,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            status: SourceStatus::Ok,
            data,
            risk_contribution: risk_contribution.map(|r| r.clamp(0.0, 100.0)),
            latency_ms: 0,
        }
    }

    /// Failure contained at the source boundary. The diagnostic lands in
    /// `data["error"]`, never in an error type that could cross into the
    /// aggregator.
    pub fn failed(source_name: impl Into<String>, error: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert("error".to_string(), Value::String(error.into()));
        Self {
            source_name: source_name.into(),
            status: SourceStatus::Failed,
            data,
            risk_contribution: None,
            latency_ms: 0,
        }
    }

    /// The source exceeded its configured deadline.
    pub fn timed_out(source_name: impl Into<String>, timeout_ms: u64) -> Self {
        let mut data = Map::new();
        data.insert(
            "error".to_string(),
            Value::String(format!("timed out after {}ms", timeout_ms)),
        );
        Self {
            source_name: source_name.into(),
            status: SourceStatus::TimedOut,
            data,
            risk_contribution: None,
            latency_ms: timeout_ms,
        }
    }

    /// The source is configured but cannot be called (e.g. missing
    /// credentials). No network call is attempted.
    pub fn unavailable(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert("reason".to_string(), Value::String(reason.into()));
        Self {
            source_name: source_name.into(),
            status: SourceStatus::Unavailable,
            data,
            risk_contribution: None,
            latency_ms: 0,
        }
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }
}

/// Qualitative indicator of how much of the configured source set
/// actually returned usable data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// The final artifact of an analysis run. Immutable once constructed;
/// this is the sole contract surface offered to reporting and export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskProfile {
    pub canonical_number: CanonicalNumber,
    /// Weighted average of the `Ok` contributions. `None` when no enabled
    /// source produced a usable risk signal; a score is never fabricated.
    pub overall_score: Option<f64>,
    /// Explicit marker for the undefined-score case.
    pub insufficient_data: bool,
    pub confidence: Confidence,
    /// One entry per enabled source, in registration order.
    pub contributions: Vec<PartialResult>,
    pub generated_at: DateTime<Utc>,
}

/// Request body for `POST /api/v1/analyze`.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    pub number: String,
}

/// Request body for `POST /api/v1/analyze/batch`.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchAnalyzeRequest {
    pub numbers: Vec<String>,
}

/// One entry of a batch response; a bad number never fails the batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<RiskProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_clamps_contribution_into_range() {
        let above = PartialResult::ok("spam_db", Map::new(), Some(240.0));
        assert_eq!(above.risk_contribution, Some(100.0));

        let below = PartialResult::ok("spam_db", Map::new(), Some(-3.0));
        assert_eq!(below.risk_contribution, Some(0.0));
    }

    #[test]
    fn failed_carries_diagnostic_in_data() {
        let result = PartialResult::failed("carrier_lookup", "connection refused");
        assert_eq!(result.status, SourceStatus::Failed);
        assert_eq!(
            result.data.get("error").and_then(|v| v.as_str()),
            Some("connection refused")
        );
        assert!(result.risk_contribution.is_none());
    }

    #[test]
    fn timed_out_records_the_deadline_as_latency() {
        let result = PartialResult::timed_out("breach_lookup", 1_500);
        assert_eq!(result.status, SourceStatus::TimedOut);
        assert_eq!(result.latency_ms, 1_500);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&SourceStatus::TimedOut).unwrap();
        assert_eq!(json, "\"timed_out\"");
    }
}
