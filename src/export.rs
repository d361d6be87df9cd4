use crate::errors::AppError;
use crate::models::{Confidence, RiskProfile, SourceStatus};

/// Renders a profile as pretty-printed JSON for download.
pub fn to_pretty_json(profile: &RiskProfile) -> Result<String, AppError> {
    serde_json::to_string_pretty(profile)
        .map_err(|e| AppError::InternalError(format!("Failed to serialize profile: {}", e)))
}

fn status_label(status: SourceStatus) -> &'static str {
    match status {
        SourceStatus::Ok => "ok",
        SourceStatus::Failed => "failed",
        SourceStatus::TimedOut => "timed_out",
        SourceStatus::Unavailable => "unavailable",
    }
}

fn confidence_label(confidence: Confidence) -> &'static str {
    match confidence {
        Confidence::High => "high",
        Confidence::Medium => "medium",
        Confidence::Low => "low",
    }
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Flattens a profile to CSV: one row per contribution, profile-level
/// columns repeated. The contribution ordering (registration order) is
/// preserved as-is.
pub fn to_csv(profile: &RiskProfile) -> String {
    let mut out = String::from(
        "e164,overall_score,confidence,insufficient_data,generated_at,source,status,risk_contribution,latency_ms\n",
    );

    let score = profile
        .overall_score
        .map(|s| format!("{:.2}", s))
        .unwrap_or_default();
    let generated_at = profile.generated_at.to_rfc3339();

    for contribution in &profile.contributions {
        let risk = contribution
            .risk_contribution
            .map(|r| format!("{:.2}", r))
            .unwrap_or_default();
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{}\n",
            csv_field(&profile.canonical_number.e164),
            score,
            confidence_label(profile.confidence),
            profile.insufficient_data,
            generated_at,
            csv_field(&contribution.source_name),
            status_label(contribution.status),
            risk,
            contribution.latency_ms,
        ));
    }

    out
}

/// Timestamped download filename, e.g. `phone_analysis_20260807_153012.csv`.
pub fn export_filename(profile: &RiskProfile, extension: &str) -> String {
    format!(
        "phone_analysis_{}.{}",
        profile.generated_at.format("%Y%m%d_%H%M%S"),
        extension
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PartialResult;
    use crate::normalizer::Normalizer;
    use chrono::Utc;
    use serde_json::Map;

    fn sample_profile() -> RiskProfile {
        let canonical = Normalizer::new(Some("US"))
            .unwrap()
            .normalize("+14155552671")
            .unwrap();

        RiskProfile {
            canonical_number: canonical,
            overall_score: Some(42.5),
            insufficient_data: false,
            confidence: Confidence::Medium,
            contributions: vec![
                PartialResult::ok("carrier_lookup", Map::new(), Some(10.0)).with_latency(120),
                PartialResult::failed("breach_lookup", "connection refused").with_latency(45),
            ],
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn csv_has_one_row_per_contribution() {
        let csv = to_csv(&sample_profile());
        let lines: Vec<&str> = csv.trim_end().lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("e164,overall_score,confidence"));
        assert!(lines[1].contains("carrier_lookup"));
        assert!(lines[1].contains("ok"));
        assert!(lines[2].contains("breach_lookup"));
        assert!(lines[2].contains("failed"));
    }

    #[test]
    fn undefined_score_renders_as_empty_field() {
        let mut profile = sample_profile();
        profile.overall_score = None;
        profile.insufficient_data = true;
        profile.confidence = Confidence::Low;

        let csv = to_csv(&profile);
        let first_row = csv.lines().nth(1).unwrap();
        assert!(first_row.starts_with("+14155552671,,low,true,"));
    }

    #[test]
    fn fields_with_commas_are_quoted() {
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn json_round_trips_through_serde() {
        let profile = sample_profile();
        let json = to_pretty_json(&profile).unwrap();
        let parsed: RiskProfile = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.overall_score, profile.overall_score);
        assert_eq!(parsed.contributions.len(), profile.contributions.len());
    }

    #[test]
    fn filename_carries_the_extension() {
        let name = export_filename(&sample_profile(), "csv");
        assert!(name.starts_with("phone_analysis_"));
        assert!(name.ends_with(".csv"));
    }
}
