use std::env;

#[derive(Debug, Clone)]
pub enum Deployment {
    Local,
    Dev,
    Stage,
    Prod,
}

impl Deployment {
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Self::Dev,
            "stage" | "staging" => Self::Stage,
            "prod" | "production" => Self::Prod,
            _ => Self::Local,
        }
    }
}

/// Where readings come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    /// Deterministic synthetic readings computed from sensor parameters.
    Mock,
    /// Readings fetched from an upstream HTTP source.
    Remote,
}

#[derive(Debug, Clone)]
pub struct Config {
    // Reading source
    pub source_mode: SourceMode,
    pub upstream_base_url: Option<String>,
    pub upstream_timeout_seconds: u64,

    // Sensor registry
    pub sensors_file: Option<String>,

    // Refresh loop
    pub refresh_interval_seconds: u64,

    // Alarm policy
    pub alarm_threshold_c: f64,
    pub alarm_hold_seconds: u64,
    pub alarm_trigger_probability: f64,

    // API settings
    pub api_host: String,
    pub api_port: u16,

    // Rate limiting
    pub disable_rate_limiting: bool,
    pub rate_limit_metadata_per_second: u64,
    pub rate_limit_metadata_burst: u32,
    pub rate_limit_data_per_second: u64,
    pub rate_limit_data_burst: u32,

    // Caching (remote historical responses)
    pub cache_ttl_seconds: u64,
    pub cache_max_entries: u64,

    // Application metadata
    pub deployment: Deployment,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `DATA_SOURCE=remote` is selected
    /// without `UPSTREAM_BASE_URL`. Mock mode needs no configuration.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let source_mode = match env::var("DATA_SOURCE")
            .unwrap_or_else(|_| "mock".to_string())
            .to_lowercase()
            .as_str()
        {
            "remote" => SourceMode::Remote,
            _ => SourceMode::Mock,
        };

        // Fail-fast policy: a remote deployment without an endpoint is a
        // misconfiguration, not something to paper over with mock data.
        let upstream_base_url = match env::var("UPSTREAM_BASE_URL") {
            Ok(url) => Some(url),
            Err(_) if source_mode == SourceMode::Remote => {
                return Err(ConfigError::Missing("UPSTREAM_BASE_URL"));
            }
            Err(_) => None,
        };

        Ok(Self {
            source_mode,
            upstream_base_url,
            upstream_timeout_seconds: env::var("UPSTREAM_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),

            sensors_file: env::var("SENSORS_FILE").ok(),

            refresh_interval_seconds: env::var("REFRESH_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),

            alarm_threshold_c: env::var("ALARM_THRESHOLD_C")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .unwrap_or(20.0),
            alarm_hold_seconds: env::var("ALARM_HOLD_SECONDS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            alarm_trigger_probability: env::var("ALARM_TRIGGER_PROBABILITY")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .unwrap_or(0.0_f64)
                .clamp(0.0, 1.0),

            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            api_port: env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),

            disable_rate_limiting: env::var("DISABLE_RATE_LIMITING")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            rate_limit_metadata_per_second: env::var("RATE_LIMIT_METADATA_PER_SECOND")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .unwrap_or(1),
            rate_limit_metadata_burst: env::var("RATE_LIMIT_METADATA_BURST")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
            rate_limit_data_per_second: env::var("RATE_LIMIT_DATA_PER_SECOND")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            rate_limit_data_burst: env::var("RATE_LIMIT_DATA_BURST")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),

            cache_ttl_seconds: env::var("CACHE_TTL_SECONDS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300), // 5 minutes default
            cache_max_entries: env::var("CACHE_MAX_ENTRIES")
                .unwrap_or_else(|_| "1024".to_string())
                .parse()
                .unwrap_or(1024),

            deployment: Deployment::from_str(
                &env::var("DEPLOYMENT").unwrap_or_else(|_| "local".to_string()),
            ),
        })
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Failed to load sensors file '{path}': {reason}")]
    SensorsFile { path: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    // One test covers every DATA_SOURCE/UPSTREAM_BASE_URL combination:
    // tests in a binary run on parallel threads and the process
    // environment is shared, so the mutations must stay sequential.
    #[test]
    fn source_mode_policy_from_env() {
        // Default: no configuration at all means mock mode
        env::remove_var("DATA_SOURCE");
        env::remove_var("UPSTREAM_BASE_URL");
        let config = Config::from_env().unwrap();
        assert_eq!(config.source_mode, SourceMode::Mock);
        assert!(config.upstream_base_url.is_none());

        // Fail-fast: remote mode without an endpoint aborts startup
        env::set_var("DATA_SOURCE", "remote");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("UPSTREAM_BASE_URL")));

        // Remote mode with an endpoint loads
        env::set_var("UPSTREAM_BASE_URL", "http://upstream.local/api");
        let config = Config::from_env().unwrap();
        assert_eq!(config.source_mode, SourceMode::Remote);
        assert_eq!(
            config.upstream_base_url.as_deref(),
            Some("http://upstream.local/api")
        );

        // A stray endpoint in mock mode is kept but harmless
        env::set_var("DATA_SOURCE", "mock");
        let config = Config::from_env().unwrap();
        assert_eq!(config.source_mode, SourceMode::Mock);

        env::remove_var("DATA_SOURCE");
        env::remove_var("UPSTREAM_BASE_URL");
    }
}
