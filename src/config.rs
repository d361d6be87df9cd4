use serde::Deserialize;

fn parse_flag(var: &str, default: bool) -> bool {
    std::env::var(var)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

fn parse_weight(var: &str, default: f64) -> anyhow::Result<f64> {
    let weight = match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<f64>()
            .map_err(|_| anyhow::anyhow!("{} must be a number", var))?,
        Err(_) => default,
    };
    if !weight.is_finite() || weight <= 0.0 {
        anyhow::bail!("{} must be a positive number", var);
    }
    Ok(weight)
}

fn parse_timeout_ms(var: &str, default: u64) -> anyhow::Result<u64> {
    let timeout = match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| anyhow::anyhow!("{} must be a number of milliseconds", var))?,
        Err(_) => default,
    };
    if timeout == 0 {
        anyhow::bail!("{} must be greater than zero", var);
    }
    Ok(timeout)
}

fn parse_base_url(var: &str, default: &str) -> anyhow::Result<String> {
    let url = std::env::var(var).unwrap_or_else(|_| default.to_string());
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", var);
    }
    Ok(url.trim_end_matches('/').to_string())
}

fn optional_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|s| !s.trim().is_empty())
}

/// Process-wide configuration, loaded once at startup and passed by
/// reference everywhere. No module reads the environment after this.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// ISO country code used when the input has no leading `+` (e.g. "US").
    /// When absent, such inputs are rejected as ambiguous.
    pub default_region: Option<String>,

    // Carrier/line-type lookup (Numverify-style API)
    pub numverify_api_key: Option<String>,
    pub numverify_base_url: String,
    pub carrier_weight: f64,
    pub carrier_timeout_ms: u64,

    // Breach directory lookup
    pub breach_api_key: Option<String>,
    pub breach_base_url: String,
    pub breach_weight: f64,
    pub breach_timeout_ms: u64,

    // Reputation / spam scoring
    pub reputation_api_key: Option<String>,
    pub reputation_api_secret: Option<String>,
    pub reputation_base_url: String,
    pub reputation_weight: f64,
    pub reputation_timeout_ms: u64,

    // Local fraud heuristic plugin
    pub fraud_weight: f64,
    pub fraud_timeout_ms: u64,

    // Feature flags
    pub enable_breach_checking: bool,
    pub enable_reputation_scoring: bool,
    pub enable_fraud_plugin: bool,
    pub enable_audit_log: bool,

    pub profile_cache_ttl_secs: u64,
    pub max_batch_size: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            default_region: optional_env("DEFAULT_REGION")
                .map(|region| {
                    let region = region.trim().to_ascii_uppercase();
                    if region.len() != 2 || !region.chars().all(|c| c.is_ascii_alphabetic()) {
                        anyhow::bail!("DEFAULT_REGION must be a two-letter ISO country code");
                    }
                    Ok(region)
                })
                .transpose()?,

            numverify_api_key: optional_env("NUMVERIFY_API_KEY"),
            numverify_base_url: parse_base_url("NUMVERIFY_BASE_URL", "http://apilayer.net")?,
            carrier_weight: parse_weight("CARRIER_WEIGHT", 1.0)?,
            carrier_timeout_ms: parse_timeout_ms("CARRIER_TIMEOUT_MS", 5_000)?,

            breach_api_key: optional_env("BREACH_API_KEY"),
            breach_base_url: parse_base_url(
                "BREACH_BASE_URL",
                "https://api.breachdirectory.example.com",
            )?,
            breach_weight: parse_weight("BREACH_WEIGHT", 2.0)?,
            breach_timeout_ms: parse_timeout_ms("BREACH_TIMEOUT_MS", 5_000)?,

            reputation_api_key: optional_env("REPUTATION_API_KEY"),
            reputation_api_secret: optional_env("REPUTATION_API_SECRET"),
            reputation_base_url: parse_base_url(
                "REPUTATION_BASE_URL",
                "https://lookup.reputation.example.com",
            )?,
            reputation_weight: parse_weight("REPUTATION_WEIGHT", 3.0)?,
            reputation_timeout_ms: parse_timeout_ms("REPUTATION_TIMEOUT_MS", 5_000)?,

            fraud_weight: parse_weight("FRAUD_WEIGHT", 1.5)?,
            fraud_timeout_ms: parse_timeout_ms("FRAUD_TIMEOUT_MS", 2_000)?,

            enable_breach_checking: parse_flag("ENABLE_BREACH_CHECKING", true),
            enable_reputation_scoring: parse_flag("ENABLE_REPUTATION_SCORING", true),
            enable_fraud_plugin: parse_flag("ENABLE_FRAUD_PLUGIN", true),
            enable_audit_log: parse_flag("ENABLE_AUDIT_LOG", true),

            profile_cache_ttl_secs: std::env::var("PROFILE_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PROFILE_CACHE_TTL_SECS must be a number of seconds"))?,
            max_batch_size: std::env::var("MAX_BATCH_SIZE")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("MAX_BATCH_SIZE must be a positive number"))?,
        };

        if config.max_batch_size == 0 {
            anyhow::bail!("MAX_BATCH_SIZE must be greater than zero");
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Server Port: {}", config.port);
        tracing::debug!("Default region: {:?}", config.default_region);
        tracing::debug!("Numverify base URL: {}", config.numverify_base_url);
        tracing::debug!("Breach base URL: {}", config.breach_base_url);
        tracing::debug!("Reputation base URL: {}", config.reputation_base_url);
        tracing::debug!(
            "Flags: breach={} reputation={} fraud={} audit={}",
            config.enable_breach_checking,
            config.enable_reputation_scoring,
            config.enable_fraud_plugin,
            config.enable_audit_log
        );

        Ok(config)
    }

    /// A configuration with sensible defaults and no credentials.
    /// Used by tests that build their own registries.
    pub fn for_tests() -> Self {
        Self {
            port: 3000,
            default_region: Some("US".to_string()),
            numverify_api_key: None,
            numverify_base_url: "http://apilayer.net".to_string(),
            carrier_weight: 1.0,
            carrier_timeout_ms: 5_000,
            breach_api_key: None,
            breach_base_url: "https://api.breachdirectory.example.com".to_string(),
            breach_weight: 2.0,
            breach_timeout_ms: 5_000,
            reputation_api_key: None,
            reputation_api_secret: None,
            reputation_base_url: "https://lookup.reputation.example.com".to_string(),
            reputation_weight: 3.0,
            reputation_timeout_ms: 5_000,
            fraud_weight: 1.5,
            fraud_timeout_ms: 2_000,
            enable_breach_checking: true,
            enable_reputation_scoring: true,
            enable_fraud_plugin: true,
            enable_audit_log: true,
            profile_cache_ttl_secs: 3_600,
            max_batch_size: 50,
        }
    }
}
