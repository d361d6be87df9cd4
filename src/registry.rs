use crate::config::Config;
use crate::errors::AppError;
use crate::models::{SourceKind, SourceRegistration};
use crate::plugins::{FraudHeuristicPlugin, IntelligencePlugin, FRAUD_SOURCE};
use crate::providers::{
    BreachLookupService, CarrierLookupService, ProviderAdapter, ReputationLookupService,
    BREACH_SOURCE, CARRIER_SOURCE, REPUTATION_SOURCE,
};
use std::sync::Arc;

/// Dispatch handle for one registered source. Network-bound providers and
/// local plugins are interchangeable from the aggregator's point of view.
#[derive(Clone)]
pub enum SourceBackend {
    Provider(Arc<dyn ProviderAdapter>),
    Plugin(Arc<dyn IntelligencePlugin>),
}

/// One registration table entry: the static configuration plus the
/// implementation it dispatches to.
#[derive(Clone)]
pub struct RegisteredSource {
    pub registration: SourceRegistration,
    pub backend: SourceBackend,
}

/// The process-wide source table. Populated once at startup from
/// configuration and shared read-only behind `Arc` for the lifetime of the
/// process; changing the source set requires a restart, never a mid-run
/// mutation.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    entries: Vec<RegisteredSource>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a source to the table.
    ///
    /// Fails with [`AppError::DuplicateSourceName`] when the name is taken,
    /// leaving the table unchanged.
    pub fn register(
        &mut self,
        registration: SourceRegistration,
        backend: SourceBackend,
    ) -> Result<(), AppError> {
        if !registration.weight.is_finite() || registration.weight <= 0.0 {
            return Err(AppError::BadRequest(format!(
                "Source '{}' must have a positive weight",
                registration.name
            )));
        }
        if self
            .entries
            .iter()
            .any(|e| e.registration.name == registration.name)
        {
            return Err(AppError::DuplicateSourceName(registration.name));
        }

        tracing::debug!(
            "Registered source '{}' (kind: {:?}, weight: {}, enabled: {})",
            registration.name,
            registration.kind,
            registration.weight,
            registration.enabled
        );
        self.entries.push(RegisteredSource {
            registration,
            backend,
        });
        Ok(())
    }

    /// Enabled entries in registration order.
    pub fn enabled(&self) -> impl Iterator<Item = &RegisteredSource> {
        self.entries.iter().filter(|e| e.registration.enabled)
    }

    /// The full registration table (for the reporting surface).
    pub fn registrations(&self) -> Vec<SourceRegistration> {
        self.entries.iter().map(|e| e.registration.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds the startup table: the three provider adapters plus the
    /// fraud heuristic plugin, each parameterized and gated by
    /// configuration.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let mut registry = Self::new();

        registry.register(
            SourceRegistration {
                name: CARRIER_SOURCE.to_string(),
                weight: config.carrier_weight,
                kind: SourceKind::Provider,
                enabled: true,
                timeout_ms: config.carrier_timeout_ms,
            },
            SourceBackend::Provider(Arc::new(CarrierLookupService::new(config))),
        )?;

        registry.register(
            SourceRegistration {
                name: BREACH_SOURCE.to_string(),
                weight: config.breach_weight,
                kind: SourceKind::Provider,
                enabled: config.enable_breach_checking,
                timeout_ms: config.breach_timeout_ms,
            },
            SourceBackend::Provider(Arc::new(BreachLookupService::new(config))),
        )?;

        registry.register(
            SourceRegistration {
                name: REPUTATION_SOURCE.to_string(),
                weight: config.reputation_weight,
                kind: SourceKind::Provider,
                enabled: config.enable_reputation_scoring,
                timeout_ms: config.reputation_timeout_ms,
            },
            SourceBackend::Provider(Arc::new(ReputationLookupService::new(config))),
        )?;

        registry.register(
            SourceRegistration {
                name: FRAUD_SOURCE.to_string(),
                weight: config.fraud_weight,
                kind: SourceKind::Plugin,
                enabled: config.enable_fraud_plugin,
                timeout_ms: config.fraud_timeout_ms,
            },
            SourceBackend::Plugin(Arc::new(FraudHeuristicPlugin::new())),
        )?;

        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plugin_backend() -> SourceBackend {
        SourceBackend::Plugin(Arc::new(FraudHeuristicPlugin::new()))
    }

    fn registration(name: &str) -> SourceRegistration {
        SourceRegistration {
            name: name.to_string(),
            weight: 1.0,
            kind: SourceKind::Plugin,
            enabled: true,
            timeout_ms: 1_000,
        }
    }

    #[test]
    fn duplicate_name_is_rejected_and_leaves_the_table_unchanged() {
        let mut registry = SourceRegistry::new();
        registry
            .register(registration("fraud_heuristic"), plugin_backend())
            .unwrap();

        let err = registry
            .register(registration("fraud_heuristic"), plugin_backend())
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateSourceName(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn non_positive_weight_is_rejected() {
        let mut registry = SourceRegistry::new();
        let mut bad = registration("weightless");
        bad.weight = 0.0;

        assert!(registry.register(bad, plugin_backend()).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn from_config_registers_all_known_sources() {
        let registry = SourceRegistry::from_config(&Config::for_tests()).unwrap();
        let names: Vec<String> = registry
            .registrations()
            .into_iter()
            .map(|r| r.name)
            .collect();

        assert_eq!(
            names,
            vec![
                CARRIER_SOURCE.to_string(),
                BREACH_SOURCE.to_string(),
                REPUTATION_SOURCE.to_string(),
                FRAUD_SOURCE.to_string(),
            ]
        );
    }

    #[test]
    fn disabled_sources_are_excluded_from_fanout() {
        let mut config = Config::for_tests();
        config.enable_breach_checking = false;
        config.enable_reputation_scoring = false;

        let registry = SourceRegistry::from_config(&config).unwrap();
        let enabled: Vec<&str> = registry
            .enabled()
            .map(|e| e.registration.name.as_str())
            .collect();

        assert_eq!(enabled, vec![CARRIER_SOURCE, FRAUD_SOURCE]);
        // Disabled sources stay listed in the table.
        assert_eq!(registry.len(), 4);
    }
}
