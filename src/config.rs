use serde::Deserialize;
use std::path::Path;
use tracing::warn;

/// Environment variable consulted when the config file doesn't carry
/// the WSDOT access code.
pub const ACCESS_CODE_ENV: &str = "WSF_API_KEY";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// WSDOT Ferries API access code. May instead come from the
    /// `WSF_API_KEY` environment variable; missing everywhere is a
    /// fatal start-up error.
    #[serde(default)]
    pub api_access_code: Option<String>,
    /// Address the HTTP server binds to.
    #[serde(default = "Config::default_bind_addr")]
    pub bind_addr: String,
    /// Allowed CORS origins. Required unless cors_permissive is true.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Explicitly allow all origins (development only).
    #[serde(default = "Config::default_cors_permissive")]
    pub cors_permissive: bool,
    /// IANA timezone used to derive the schedule's local calendar day.
    /// Must match the ferry system's operating timezone.
    #[serde(default = "Config::default_timezone")]
    pub timezone: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_access_code: None,
            bind_addr: Self::default_bind_addr(),
            cors_origins: Vec::new(),
            cors_permissive: Self::default_cors_permissive(),
            timezone: Self::default_timezone(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load the config file, falling back to defaults when it doesn't
    /// exist. Parse failures in an existing file still propagate.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            warn!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// The effective access code: config file first, then environment.
    pub fn access_code(&self) -> Option<String> {
        self.api_access_code
            .clone()
            .filter(|code| !code.trim().is_empty())
            .or_else(|| std::env::var(ACCESS_CODE_ENV).ok())
            .filter(|code| !code.trim().is_empty())
    }

    /// Log warnings for configuration that will degrade at runtime.
    pub fn validate(&self) {
        if self.timezone.parse::<chrono_tz::Tz>().is_err() {
            warn!(
                timezone = %self.timezone,
                "Invalid IANA timezone, will fall back to America/Los_Angeles"
            );
        }
    }

    /// Parse the configured timezone, falling back to the ferry
    /// system's own timezone.
    pub fn parsed_timezone(&self) -> chrono_tz::Tz {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .unwrap_or(chrono_tz::America::Los_Angeles)
    }

    fn default_bind_addr() -> String {
        "0.0.0.0:3000".to_string()
    }
    fn default_cors_permissive() -> bool {
        false
    }
    fn default_timezone() -> String {
        "America/Los_Angeles".to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
}
