/// Property-based tests using proptest
/// Tests invariants that should hold for all inputs
use proptest::prelude::*;
use rust_phone_intel_api::aggregator::{derive_confidence, weighted_score};
use rust_phone_intel_api::errors::AppError;
use rust_phone_intel_api::models::{
    Confidence, PartialResult, SourceKind, SourceRegistration, SourceStatus,
};
use rust_phone_intel_api::normalizer::Normalizer;
use serde_json::Map;

fn us_normalizer() -> Normalizer {
    Normalizer::new(Some("US")).unwrap()
}

// Property: normalization should never panic
proptest! {
    #[test]
    fn normalize_never_panics(input in "\\PC*") {
        let _ = us_normalizer().normalize(&input);
    }

    #[test]
    fn short_digit_strings_are_always_invalid(input in "[0-9]{0,6}") {
        let result = us_normalizer().normalize(&input);
        prop_assert!(matches!(result, Err(AppError::InvalidFormat(_))));
    }

    #[test]
    fn extremely_long_digit_strings_are_rejected(input in "[0-9]{18,40}") {
        let result = us_normalizer().normalize(&input);
        prop_assert!(matches!(result, Err(AppError::InvalidFormat(_))));
    }
}

// Property: separators never change the canonical form
proptest! {
    #[test]
    fn formatting_variants_share_one_e164(
        area in 201u32..=989u32,
        exchange in 200u32..=999u32,
        line in 0u32..=9999u32
    ) {
        let normalizer = us_normalizer();
        let plain = format!("{}{}{:04}", area, exchange, line);
        let variants = [
            format!("({}) {}-{:04}", area, exchange, line),
            format!("{}-{}-{:04}", area, exchange, line),
            format!("{}.{}.{:04}", area, exchange, line),
            format!("+1 {} {} {:04}", area, exchange, line),
        ];

        match normalizer.normalize(&plain) {
            Ok(canonical) => {
                for variant in &variants {
                    let other = normalizer.normalize(variant);
                    prop_assert!(other.is_ok(), "variant rejected: {}", variant);
                    prop_assert_eq!(&other.unwrap().e164, &canonical.e164);
                }
            }
            Err(_) => {
                // If the bare digits are unparseable, so are the variants.
                for variant in &variants {
                    prop_assert!(normalizer.normalize(variant).is_err());
                }
            }
        }
    }
}

fn registrations_and_results(
    entries: &[(f64, Option<f64>, bool)],
) -> (Vec<SourceRegistration>, Vec<PartialResult>) {
    let mut registrations = Vec::new();
    let mut results = Vec::new();
    for (i, (weight, risk, ok)) in entries.iter().enumerate() {
        let name = format!("source_{}", i);
        registrations.push(SourceRegistration {
            name: name.clone(),
            weight: *weight,
            kind: SourceKind::Provider,
            enabled: true,
            timeout_ms: 1_000,
        });
        results.push(if *ok {
            PartialResult::ok(name, Map::new(), *risk)
        } else {
            PartialResult::failed(name, "down")
        });
    }
    (registrations, results)
}

// Property: the weighted score stays inside the contributing signals
proptest! {
    #[test]
    fn score_is_bounded_by_its_inputs(
        entries in prop::collection::vec(
            (0.1f64..100.0, prop::option::of(0.0f64..=100.0), any::<bool>()),
            1..8
        )
    ) {
        let (registrations, results) = registrations_and_results(&entries);
        let score = weighted_score(&registrations, &results);

        let contributing: Vec<f64> = results
            .iter()
            .filter(|r| r.status == SourceStatus::Ok)
            .filter_map(|r| r.risk_contribution)
            .collect();

        match score {
            Some(score) => {
                let min = contributing.iter().cloned().fold(f64::INFINITY, f64::min);
                let max = contributing.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                prop_assert!(score >= min - 1e-9 && score <= max + 1e-9,
                    "score {} outside [{}, {}]", score, min, max);
                prop_assert!(score >= 0.0 && score <= 100.0 + 1e-9);
            }
            None => prop_assert!(contributing.is_empty()),
        }
    }

    #[test]
    fn score_ignores_non_ok_sources_entirely(
        ok_risk in 0.0f64..=100.0,
        ok_weight in 0.1f64..10.0,
        noise_weight in 0.1f64..1000.0
    ) {
        let (registrations, results) = registrations_and_results(&[
            (ok_weight, Some(ok_risk), true),
            (noise_weight, Some(99.0), false),
        ]);

        // The failed source's weight and risk must be invisible.
        let score = weighted_score(&registrations, &results).unwrap();
        prop_assert!((score - ok_risk).abs() < 1e-9);
    }
}

// Property: confidence buckets partition the Ok fraction
proptest! {
    #[test]
    fn confidence_matches_the_documented_thresholds(
        count_enabled in 1usize..50,
        ok_seed in 0usize..50
    ) {
        let count_ok = ok_seed % (count_enabled + 1);
        let fraction = count_ok as f64 / count_enabled as f64;
        let expected = if fraction >= 0.75 {
            Confidence::High
        } else if fraction >= 0.4 {
            Confidence::Medium
        } else {
            Confidence::Low
        };

        prop_assert_eq!(derive_confidence(count_ok, count_enabled), expected);
    }
}
