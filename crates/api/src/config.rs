use assetlink_core::locking::{validate_lock_ttl, DEFAULT_LOCK_TTL_MINS, LOCK_SWEEP_INTERVAL_SECS};
use assetlink_db::transition::TransitionMode;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for background tasks (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// TTL of association locks in minutes (default: `5`).
    pub lock_ttl_mins: i64,
    /// Period of the expired-lock sweep in seconds (default: `60`).
    pub lock_sweep_interval_secs: u64,
    /// Transition strategy override (default: `auto`).
    pub transition_mode: TransitionMode,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                 |
    /// |-------------------------------|-------------------------|
    /// | `HOST`                        | `0.0.0.0`               |
    /// | `PORT`                        | `3000`                  |
    /// | `CORS_ORIGINS`                | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`        | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`       | `30`                    |
    /// | `LOCK_TTL_MINS`               | `5`                     |
    /// | `LOCK_SWEEP_INTERVAL_SECS`    | `60`                    |
    /// | `ASSOCIATION_TRANSITION_MODE` | `auto`                  |
    ///
    /// Panics on malformed values; misconfiguration should stop startup.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let lock_ttl_mins: i64 = std::env::var("LOCK_TTL_MINS")
            .unwrap_or_else(|_| DEFAULT_LOCK_TTL_MINS.to_string())
            .parse()
            .expect("LOCK_TTL_MINS must be a valid integer");
        if let Err(msg) = validate_lock_ttl(lock_ttl_mins) {
            panic!("Invalid LOCK_TTL_MINS: {msg}");
        }

        let lock_sweep_interval_secs: u64 = std::env::var("LOCK_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| LOCK_SWEEP_INTERVAL_SECS.to_string())
            .parse()
            .expect("LOCK_SWEEP_INTERVAL_SECS must be a valid u64");

        let transition_mode: TransitionMode = std::env::var("ASSOCIATION_TRANSITION_MODE")
            .unwrap_or_else(|_| "auto".into())
            .parse()
            .unwrap_or_else(|e| panic!("Invalid ASSOCIATION_TRANSITION_MODE: {e}"));

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            lock_ttl_mins,
            lock_sweep_interval_secs,
            transition_mode,
        }
    }
}
