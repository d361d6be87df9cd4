use crate::models::RiskProfile;
use crate::normalizer::CanonicalNumber;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    Started,
    Completed,
}

/// Immutable record of one analysis lifecycle step.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub kind: AuditEventKind,
    pub timestamp: DateTime<Utc>,
    pub e164: String,
    pub payload: Value,
}

impl AuditEvent {
    /// Emitted once before fan-out, carrying the requested source names.
    pub fn started(canonical: &CanonicalNumber, sources: &[String]) -> Self {
        Self {
            kind: AuditEventKind::Started,
            timestamp: Utc::now(),
            e164: canonical.e164.clone(),
            payload: json!({ "requested_sources": sources }),
        }
    }

    /// Emitted once after reduction, summarizing per-source outcomes.
    pub fn completed(profile: &RiskProfile) -> Self {
        let sources: Vec<Value> = profile
            .contributions
            .iter()
            .map(|c| {
                json!({
                    "source": c.source_name,
                    "status": c.status,
                    "latency_ms": c.latency_ms,
                    "risk_contribution": c.risk_contribution,
                })
            })
            .collect();

        Self {
            kind: AuditEventKind::Completed,
            timestamp: Utc::now(),
            e164: profile.canonical_number.e164.clone(),
            payload: json!({
                "overall_score": profile.overall_score,
                "insufficient_data": profile.insufficient_data,
                "confidence": profile.confidence,
                "sources": sources,
            }),
        }
    }
}

/// Consumed by the aggregator at analysis start and completion.
/// Implementations must not block the pipeline; recording is
/// fire-and-forget from the aggregator's point of view.
pub trait AuditRecorder: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Emits audit events as structured log records under the `audit` target.
/// Default wiring when the in-memory audit view is disabled.
pub struct TracingAuditRecorder;

impl AuditRecorder for TracingAuditRecorder {
    fn record(&self, event: AuditEvent) {
        tracing::info!(
            target: "audit",
            kind = ?event.kind,
            number = %event.e164,
            payload = %event.payload,
            "analysis audit event"
        );
    }
}

/// Bounded in-memory ring of recent audit events. Backs the
/// `/api/v1/audit/recent` view and test assertions; also emits each event
/// to the log like [`TracingAuditRecorder`].
pub struct MemoryAuditRecorder {
    events: Mutex<VecDeque<AuditEvent>>,
    capacity: usize,
}

impl MemoryAuditRecorder {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    /// Most recent events, newest first.
    pub fn recent(&self, limit: usize) -> Vec<AuditEvent> {
        let events = match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        events.iter().rev().take(limit).cloned().collect()
    }
}

impl AuditRecorder for MemoryAuditRecorder {
    fn record(&self, event: AuditEvent) {
        tracing::info!(
            target: "audit",
            kind = ?event.kind,
            number = %event.e164,
            payload = %event.payload,
            "analysis audit event"
        );

        let mut events = match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }
}
