use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "TherapyPortal";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_PREDICTION_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_PREDICTION_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SESSION_TTL_HOURS: i64 = 24;
const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
    #[error("Cannot determine a data directory; set PORTAL_DB_PATH")]
    NoDataDir,
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "therapy_portal=info,tower_http=info"
}

/// Platform data directory for the portal, e.g. `~/.local/share/TherapyPortal`.
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join(APP_NAME))
}

/// Runtime configuration, loaded from the process environment.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub bind_addr: SocketAddr,
    pub db_path: PathBuf,
    pub prediction_url: String,
    pub prediction_timeout: Duration,
    pub session_ttl: chrono::Duration,
    pub cors_origin: String,
}

impl PortalConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr: SocketAddr = parse_var(
            &lookup,
            "PORTAL_BIND_ADDR",
            SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
        )?;

        let db_path = match lookup("PORTAL_DB_PATH") {
            Some(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => app_data_dir().ok_or(ConfigError::NoDataDir)?.join("portal.db"),
        };

        let prediction_url = lookup("PREDICTION_URL")
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PREDICTION_URL.to_string());
        if !prediction_url.starts_with("http://") && !prediction_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                var: "PREDICTION_URL",
                value: prediction_url,
            });
        }

        let timeout_secs: u64 = parse_var(
            &lookup,
            "PREDICTION_TIMEOUT_SECS",
            DEFAULT_PREDICTION_TIMEOUT_SECS,
        )?;
        let ttl_hours: i64 = parse_var(&lookup, "PORTAL_SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS)?;
        if ttl_hours <= 0 {
            return Err(ConfigError::InvalidValue {
                var: "PORTAL_SESSION_TTL_HOURS",
                value: ttl_hours.to_string(),
            });
        }

        let cors_origin = lookup("PORTAL_CORS_ORIGIN")
            .unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string());

        Ok(Self {
            bind_addr,
            db_path,
            prediction_url: prediction_url.trim_end_matches('/').to_string(),
            prediction_timeout: Duration::from_secs(timeout_secs),
            session_ttl: chrono::Duration::hours(ttl_hours),
            cors_origin,
        })
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse() {
            Ok(value) => Ok(value),
            Err(_) => Err(ConfigError::InvalidValue { var, value: raw }),
        },
    }
}
