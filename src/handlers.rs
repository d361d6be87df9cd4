use crate::aggregator::Aggregator;
use crate::audit::{AuditEvent, MemoryAuditRecorder};
use crate::cache_validator::ValidatedCacheEntry;
use crate::config::Config;
use crate::errors::AppError;
use crate::export;
use crate::models::*;
use crate::normalizer::Normalizer;
use crate::registry::SourceRegistry;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use moka::future::Cache;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Raw-input parser, bound to the configured default region.
    pub normalizer: Normalizer,
    /// The process-wide source table (read-only after startup).
    pub registry: Arc<SourceRegistry>,
    /// Analysis pipeline.
    pub aggregator: Aggregator,
    /// Recent audit events backing `/api/v1/audit/recent`.
    pub audit_log: Arc<MemoryAuditRecorder>,
    /// Profile cache keyed by E.164, storing checksum-validated JSON.
    pub profile_cache: Cache<String, String>,
}

/// Health check endpoint.
///
/// Returns the service status, version, and health information.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "rust-phone-intel-api",
            "version": "0.1.0"
        })),
    )
}

/// Normalizes one raw input and produces its risk profile, going through
/// the validated profile cache on both sides of the pipeline.
async fn run_analysis(state: &Arc<AppState>, raw: &str) -> Result<RiskProfile, AppError> {
    let canonical = state.normalizer.normalize(raw)?;

    if let Some(serialized) = state.profile_cache.get(&canonical.e164).await {
        match ValidatedCacheEntry::deserialize_and_validate(&serialized)
            .and_then(|json| serde_json::from_str::<RiskProfile>(&json).ok())
        {
            Some(profile) => {
                tracing::debug!("Profile cache hit for {}", canonical.e164);
                return Ok(profile);
            }
            None => {
                tracing::warn!(
                    "Discarding corrupted cache entry for {}",
                    canonical.e164
                );
            }
        }
    }

    let profile = state.aggregator.run(&canonical).await?;

    match serde_json::to_string(&profile) {
        Ok(json) => {
            let entry = ValidatedCacheEntry::new(json);
            state
                .profile_cache
                .insert(canonical.e164.clone(), entry.serialize())
                .await;
        }
        Err(e) => tracing::warn!("Failed to serialize profile for caching: {}", e),
    }

    Ok(profile)
}

/// POST /api/v1/analyze
///
/// Runs the full intelligence pipeline for a single number.
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<RiskProfile>, AppError> {
    tracing::info!("POST /analyze");
    let profile = run_analysis(&state, &request.number).await?;
    Ok(Json(profile))
}

/// POST /api/v1/analyze/batch
///
/// Analyzes up to `MAX_BATCH_SIZE` numbers. One bad number yields an
/// error entry; it never fails the batch.
pub async fn analyze_batch(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BatchAnalyzeRequest>,
) -> Result<Json<Vec<BatchEntry>>, AppError> {
    if request.numbers.is_empty() {
        return Err(AppError::BadRequest(
            "At least one number is required".to_string(),
        ));
    }
    if request.numbers.len() > state.config.max_batch_size {
        return Err(AppError::BadRequest(format!(
            "Batch size {} exceeds the limit of {}",
            request.numbers.len(),
            state.config.max_batch_size
        )));
    }

    tracing::info!("POST /analyze/batch - {} numbers", request.numbers.len());

    let mut entries = Vec::with_capacity(request.numbers.len());
    for number in &request.numbers {
        match run_analysis(&state, number).await {
            Ok(profile) => entries.push(BatchEntry {
                input: number.clone(),
                profile: Some(profile),
                error: None,
            }),
            Err(e) => {
                tracing::warn!("Batch entry '{}' failed: {}", number, e);
                entries.push(BatchEntry {
                    input: number.clone(),
                    profile: None,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    pub format: Option<String>,
}

/// POST /api/v1/analyze/export?format=json|csv
///
/// Runs an analysis and returns it as a downloadable document with a
/// timestamped filename.
pub async fn export_analysis(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ExportParams>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Response, AppError> {
    let format = params.format.as_deref().unwrap_or("json");
    let profile = run_analysis(&state, &request.number).await?;

    let (content_type, body, filename) = match format {
        "csv" => (
            "text/csv",
            export::to_csv(&profile),
            export::export_filename(&profile, "csv"),
        ),
        "json" => (
            "application/json",
            export::to_pretty_json(&profile)?,
            export::export_filename(&profile, "json"),
        ),
        other => {
            return Err(AppError::BadRequest(format!(
                "Unsupported export format '{}' (expected json or csv)",
                other
            )))
        }
    };

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response())
}

/// GET /api/v1/sources
///
/// The registration table for the reporting UI: every configured source
/// with its kind, weight, timeout and enabled flag.
pub async fn list_sources(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<SourceRegistration>> {
    Json(state.registry.registrations())
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
}

/// GET /api/v1/audit/recent
///
/// Most recent audit events, newest first. Empty when the audit log is
/// disabled by configuration.
pub async fn recent_audit_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuditQuery>,
) -> Json<Vec<AuditEvent>> {
    let limit = params.limit.unwrap_or(50).min(500);
    Json(state.audit_log.recent(limit))
}
