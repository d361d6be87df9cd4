use crate::audit::{AuditEvent, AuditRecorder};
use crate::errors::AppError;
use crate::models::{Confidence, PartialResult, RiskProfile, SourceRegistration, SourceStatus};
use crate::normalizer::CanonicalNumber;
use crate::providers::{CredentialStore, Credentials};
use crate::registry::{RegisteredSource, SourceBackend, SourceRegistry};
use chrono::Utc;
use serde_json::Map;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Orchestrates one analysis run: concurrent fan-out over every enabled
/// source, isolation of per-source failures, and the deterministic
/// reduction into a [`RiskProfile`].
#[derive(Clone)]
pub struct Aggregator {
    registry: Arc<SourceRegistry>,
    credentials: Arc<CredentialStore>,
    audit: Arc<dyn AuditRecorder>,
}

impl Aggregator {
    pub fn new(
        registry: Arc<SourceRegistry>,
        credentials: Arc<CredentialStore>,
        audit: Arc<dyn AuditRecorder>,
    ) -> Self {
        Self {
            registry,
            credentials,
            audit,
        }
    }

    /// Runs the full pipeline for one canonical number.
    ///
    /// Fails only when zero sources are enabled; every per-source error,
    /// timeout, or missing credential is absorbed into that source's
    /// [`PartialResult`]. Total wall time is bounded by the largest
    /// per-source timeout, not the sum.
    pub async fn run(&self, canonical: &CanonicalNumber) -> Result<RiskProfile, AppError> {
        let enabled: Vec<RegisteredSource> = self.registry.enabled().cloned().collect();
        if enabled.is_empty() {
            return Err(AppError::NoSourcesConfigured);
        }

        let requested: Vec<String> = enabled
            .iter()
            .map(|e| e.registration.name.clone())
            .collect();
        self.audit.record(AuditEvent::started(canonical, &requested));

        tracing::info!(
            "Starting analysis for {} across {} sources",
            canonical.e164,
            enabled.len()
        );

        // One task per source; a slow or panicking source never delays or
        // invalidates the others.
        let mut handles = Vec::with_capacity(enabled.len());
        for entry in &enabled {
            let backend = entry.backend.clone();
            let registration = entry.registration.clone();
            let canonical = canonical.clone();
            let credentials = self.credentials.get(&registration.name).cloned();

            handles.push(tokio::spawn(async move {
                invoke_source(backend, registration, canonical, credentials).await
            }));
        }

        // Awaiting in registration order keeps `contributions` reproducible
        // regardless of arrival order.
        let mut contributions = Vec::with_capacity(enabled.len());
        for (handle, entry) in handles.into_iter().zip(&enabled) {
            let partial = match handle.await {
                Ok(partial) => partial,
                Err(e) => {
                    tracing::error!(
                        "Source task '{}' aborted: {}",
                        entry.registration.name,
                        e
                    );
                    PartialResult::failed(
                        entry.registration.name.clone(),
                        format!("source task aborted: {}", e),
                    )
                }
            };
            contributions.push(partial);
        }

        let registrations: Vec<SourceRegistration> =
            enabled.iter().map(|e| e.registration.clone()).collect();
        let overall_score = weighted_score(&registrations, &contributions);

        let count_ok = contributions
            .iter()
            .filter(|c| c.status == SourceStatus::Ok)
            .count();
        // No usable risk signal means no fabricated score, and confidence
        // drops to Low no matter how many sources answered.
        let confidence = if overall_score.is_some() {
            derive_confidence(count_ok, contributions.len())
        } else {
            Confidence::Low
        };

        let profile = RiskProfile {
            canonical_number: canonical.clone(),
            overall_score,
            insufficient_data: overall_score.is_none(),
            confidence,
            contributions,
            generated_at: Utc::now(),
        };

        self.audit.record(AuditEvent::completed(&profile));

        tracing::info!(
            "Analysis complete for {}: score={:?}, confidence={:?}, ok={}/{}",
            canonical.e164,
            profile.overall_score,
            profile.confidence,
            count_ok,
            profile.contributions.len()
        );

        Ok(profile)
    }
}

/// Drives a single source to a terminal state within its deadline. A late
/// response is discarded, not merged: the task is dropped at timeout and
/// the source is recorded as `TimedOut`.
async fn invoke_source(
    backend: SourceBackend,
    registration: SourceRegistration,
    canonical: CanonicalNumber,
    credentials: Option<Credentials>,
) -> PartialResult {
    let deadline = Duration::from_millis(registration.timeout_ms);
    let started = Instant::now();

    let invocation = async {
        match backend {
            SourceBackend::Provider(provider) => {
                provider.fetch(&canonical, credentials.as_ref()).await
            }
            SourceBackend::Plugin(plugin) => plugin.analyze(&canonical, &Map::new()),
        }
    };

    match tokio::time::timeout(deadline, invocation).await {
        Ok(mut partial) => {
            // The registry key is authoritative for attribution.
            partial.source_name = registration.name;
            partial.with_latency(started.elapsed().as_millis() as u64)
        }
        Err(_) => {
            tracing::warn!(
                "Source '{}' exceeded its {}ms deadline",
                registration.name,
                registration.timeout_ms
            );
            PartialResult::timed_out(registration.name, registration.timeout_ms)
        }
    }
}

/// `Σ(risk_i * weight_i) / Σ(weight_i)` over `Ok` results that declare a
/// risk signal. `None` when no weight contributes; failed or silent
/// sources never count as zero-risk.
pub fn weighted_score(
    registrations: &[SourceRegistration],
    contributions: &[PartialResult],
) -> Option<f64> {
    let mut numerator = 0.0;
    let mut denominator = 0.0;

    for (registration, result) in registrations.iter().zip(contributions) {
        if result.status != SourceStatus::Ok {
            continue;
        }
        if let Some(risk) = result.risk_contribution {
            numerator += risk * registration.weight;
            denominator += registration.weight;
        }
    }

    if denominator > 0.0 {
        Some(numerator / denominator)
    } else {
        None
    }
}

/// Fraction of enabled sources that answered `Ok`, bucketed.
pub fn derive_confidence(count_ok: usize, count_enabled: usize) -> Confidence {
    if count_enabled == 0 {
        return Confidence::Low;
    }
    let fraction = count_ok as f64 / count_enabled as f64;
    if fraction >= 0.75 {
        Confidence::High
    } else if fraction >= 0.4 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}
