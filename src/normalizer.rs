use crate::errors::AppError;
use phonenumber::country::Id as CountryId;
use phonenumber::Mode;
use serde::{Deserialize, Serialize};

/// Canonical, validated representation of a phone number. Produced once by
/// the normalizer and shared read-only by every downstream consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalNumber {
    /// Country calling code with a leading `+` (e.g. "+1").
    pub country_code: String,
    /// National significant number as a digit string, leading zeros kept.
    pub national_number: String,
    /// E.164 rendering (e.g. "+14155552671").
    pub e164: String,
    /// International human-readable rendering.
    pub international: String,
    /// National human-readable rendering.
    pub national: String,
    /// Whether the number is valid for its region per libphonenumber rules.
    pub is_valid: bool,
}

/// Parses raw input into a [`CanonicalNumber`].
///
/// Pure function of the input plus the configured default region: inputs
/// without a leading `+` are interpreted in that region, and rejected as
/// ambiguous when none is configured.
#[derive(Debug, Clone)]
pub struct Normalizer {
    default_region: Option<CountryId>,
}

/// Bounds on the digit count of any plausible phone number. E.164 allows
/// at most 15 significant digits; a couple extra cover trunk prefixes.
const MIN_DIGITS: usize = 7;
const MAX_DIGITS: usize = 17;

impl Normalizer {
    /// # Arguments
    ///
    /// * `default_region` - Optional two-letter ISO country code (e.g. "US").
    pub fn new(default_region: Option<&str>) -> anyhow::Result<Self> {
        let default_region = match default_region {
            Some(region) => Some(
                region
                    .parse::<CountryId>()
                    .map_err(|_| anyhow::anyhow!("Unknown region code: {}", region))?,
            ),
            None => None,
        };
        Ok(Self { default_region })
    }

    /// Normalizes raw input, accepting separators (spaces, dashes,
    /// parentheses, dots) and an optional leading `+`.
    ///
    /// Fails with [`AppError::InvalidFormat`] when the input carries no
    /// digit sequence of plausible length, or when it has no `+` prefix
    /// and no default region is configured.
    pub fn normalize(&self, raw: &str) -> Result<CanonicalNumber, AppError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AppError::InvalidFormat("empty input".to_string()));
        }

        let digit_count = trimmed.chars().filter(|c| c.is_ascii_digit()).count();
        if digit_count < MIN_DIGITS {
            return Err(AppError::InvalidFormat(format!(
                "too few digits ({})",
                digit_count
            )));
        }
        if digit_count > MAX_DIGITS {
            return Err(AppError::InvalidFormat(format!(
                "too many digits ({})",
                digit_count
            )));
        }

        let region = if trimmed.starts_with('+') {
            // Country code is explicit in the input.
            None
        } else {
            match self.default_region {
                Some(region) => Some(region),
                None => {
                    return Err(AppError::InvalidFormat(
                        "no country code and no default region configured".to_string(),
                    ))
                }
            }
        };

        let number = phonenumber::parse(region, trimmed)
            .map_err(|e| AppError::InvalidFormat(format!("unparseable number: {:?}", e)))?;

        let national = number.national();
        let mut national_number = "0".repeat(national.zeros() as usize);
        national_number.push_str(&national.value().to_string());

        Ok(CanonicalNumber {
            country_code: format!("+{}", number.code().value()),
            national_number,
            e164: number.format().mode(Mode::E164).to_string(),
            international: number.format().mode(Mode::International).to_string(),
            national: number.format().mode(Mode::National).to_string(),
            is_valid: phonenumber::is_valid(&number),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn us_normalizer() -> Normalizer {
        Normalizer::new(Some("US")).unwrap()
    }

    #[test]
    fn separators_do_not_change_the_canonical_form() {
        let normalizer = us_normalizer();
        let expected = normalizer.normalize("+14155552671").unwrap();

        for input in [
            "(415) 555-2671",
            "415-555-2671",
            "415.555.2671",
            "415 555 2671",
            "+1 415 555 2671",
        ] {
            let canonical = normalizer.normalize(input).unwrap();
            assert_eq!(canonical.e164, expected.e164, "input: {}", input);
        }
    }

    #[test]
    fn canonical_fields_are_consistent() {
        let canonical = us_normalizer().normalize("+14155552671").unwrap();
        assert_eq!(canonical.country_code, "+1");
        assert_eq!(canonical.national_number, "4155552671");
        assert_eq!(canonical.e164, "+14155552671");
    }

    #[test]
    fn too_few_digits_is_invalid_format() {
        let err = us_normalizer().normalize("12345").unwrap_err();
        assert!(matches!(err, AppError::InvalidFormat(_)));
    }

    #[test]
    fn non_numeric_input_is_invalid_format() {
        let err = us_normalizer().normalize("not a number").unwrap_err();
        assert!(matches!(err, AppError::InvalidFormat(_)));
    }

    #[test]
    fn missing_region_makes_local_numbers_ambiguous() {
        let normalizer = Normalizer::new(None).unwrap();

        let err = normalizer.normalize("415 555 2671").unwrap_err();
        assert!(matches!(err, AppError::InvalidFormat(_)));

        // Explicit country code still works without a default region.
        assert!(normalizer.normalize("+14155552671").is_ok());
    }

    #[test]
    fn unknown_region_code_is_rejected_at_construction() {
        assert!(Normalizer::new(Some("XX")).is_err());
    }
}
