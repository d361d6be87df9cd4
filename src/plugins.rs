use crate::models::PartialResult;
use crate::normalizer::CanonicalNumber;
use regex::Regex;
use serde_json::{json, Map, Value};

pub const FRAUD_SOURCE: &str = "fraud_heuristic";

/// A locally computed data source. Same output contract as a provider
/// adapter, but synchronous and with no network I/O requirement; the
/// pipeline does not distinguish the two beyond dispatch.
pub trait IntelligencePlugin: Send + Sync {
    fn analyze(
        &self,
        canonical: &CanonicalNumber,
        context: &Map<String, Value>,
    ) -> PartialResult;
}

/// Heuristic fraud-probability model.
///
/// Scores a number from static risk indicators: country calling codes with
/// elevated fraud rates, long repeated-digit runs typical of throwaway or
/// fabricated numbers, and numbers that parse but fail full validation.
pub struct FraudHeuristicPlugin {
    repeated_digits: Regex,
}

/// Country calling codes with elevated observed fraud rates.
const HIGH_RISK_CALLING_CODES: &[&str] = &["+234", "+233", "+254"];

impl FraudHeuristicPlugin {
    pub fn new() -> Self {
        Self {
            // Six or more of the same digit in a row. The regex crate has no
            // backreferences, so the run is spelled out per digit.
            repeated_digits: Regex::new("0{6,}|1{6,}|2{6,}|3{6,}|4{6,}|5{6,}|6{6,}|7{6,}|8{6,}|9{6,}")
                .unwrap(),
        }
    }

    fn risk_level(score: f64) -> &'static str {
        if score < 30.0 {
            "low"
        } else if score < 70.0 {
            "medium"
        } else {
            "high"
        }
    }
}

impl Default for FraudHeuristicPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl IntelligencePlugin for FraudHeuristicPlugin {
    fn analyze(
        &self,
        canonical: &CanonicalNumber,
        _context: &Map<String, Value>,
    ) -> PartialResult {
        let mut score: f64 = 10.0;
        let mut indicators: Vec<String> = Vec::new();

        if HIGH_RISK_CALLING_CODES.contains(&canonical.country_code.as_str()) {
            score += 30.0;
            indicators.push("high-risk country code".to_string());
        }

        if self.repeated_digits.is_match(&canonical.national_number) {
            score += 25.0;
            indicators.push("repeated digit run".to_string());
        }

        if canonical.national_number.contains("123456789") {
            score += 15.0;
            indicators.push("sequential digit pattern".to_string());
        }

        if !canonical.is_valid {
            score += 20.0;
            indicators.push("fails full validation for its region".to_string());
        }

        let score = score.min(100.0);

        let mut data = Map::new();
        data.insert("fraud_probability".to_string(), json!(score / 100.0));
        data.insert("risk_level".to_string(), json!(Self::risk_level(score)));
        data.insert("indicators".to_string(), json!(indicators));

        PartialResult::ok(FRAUD_SOURCE, data, Some(score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceStatus;
    use crate::normalizer::Normalizer;

    fn canonical(raw: &str) -> CanonicalNumber {
        Normalizer::new(Some("US")).unwrap().normalize(raw).unwrap()
    }

    #[test]
    fn ordinary_number_scores_low() {
        let plugin = FraudHeuristicPlugin::new();
        let result = plugin.analyze(&canonical("+14155552671"), &Map::new());

        assert_eq!(result.status, SourceStatus::Ok);
        let score = result.risk_contribution.unwrap();
        assert!(score < 30.0, "expected low score, got {}", score);
        assert_eq!(
            result.data.get("risk_level").and_then(|v| v.as_str()),
            Some("low")
        );
    }

    #[test]
    fn high_risk_country_code_raises_the_score() {
        let plugin = FraudHeuristicPlugin::new();
        let baseline = plugin
            .analyze(&canonical("+14155552671"), &Map::new())
            .risk_contribution
            .unwrap();
        let risky = plugin
            .analyze(&canonical("+2348012345678"), &Map::new())
            .risk_contribution
            .unwrap();

        assert!(risky > baseline);
    }

    #[test]
    fn repeated_digit_run_is_flagged() {
        let plugin = FraudHeuristicPlugin::new();
        // 555-5555 style filler numbers parse fine but look fabricated.
        let result = plugin.analyze(&canonical("+14155555555"), &Map::new());

        let indicators = result
            .data
            .get("indicators")
            .and_then(|v| v.as_array())
            .unwrap();
        assert!(indicators
            .iter()
            .any(|i| i.as_str() == Some("repeated digit run")));
    }

    #[test]
    fn score_is_always_in_range() {
        let plugin = FraudHeuristicPlugin::new();
        let result = plugin.analyze(&canonical("+2341111111111"), &Map::new());

        let score = result.risk_contribution.unwrap();
        assert!((0.0..=100.0).contains(&score));
    }
}
