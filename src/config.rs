//! Gateway configuration
//!
//! Defaults match a local single-user deployment. Every field can be
//! overridden through an `AGENT_SERVER_<FIELD>` environment variable.

use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{GatewayError, Result};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Environment variable prefix
pub const ENV_PREFIX: &str = "AGENT_SERVER_";

/// Key file locations relative to the home directory, in lookup order
const API_KEY_FILES: &[&str] = &[".claude/analytics/.secret", ".claude/analytics_data/.secret"];

/// Runtime configuration of the gateway
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listen address
    pub host: String,
    /// Listen port
    pub port: u16,
    /// Require a shared secret from clients
    pub auth_enabled: bool,
    /// Inline shared secret (takes precedence over the key file)
    pub api_key: Option<String>,
    /// Explicit key file path
    pub api_key_path: Option<PathBuf>,
    /// Maximum number of live sessions
    pub max_concurrent_sessions: usize,
    /// Idle time after which a session is evicted
    pub session_timeout_secs: u64,
    /// Idle reaper period
    pub reaper_interval_secs: u64,
    /// How long a tool call waits for client approval
    pub permission_timeout_secs: u64,
    /// WebSocket keepalive period
    pub ws_ping_interval_secs: u64,
    /// WebSocket keepalive grace period
    pub ws_ping_timeout_secs: u64,
    /// Default log filter
    pub log_level: String,
    /// Persist sessions and messages to the storage service
    pub storage_enabled: bool,
    /// Storage service host
    pub storage_host: String,
    /// Storage service port
    pub storage_port: u16,
    /// Use HTTPS towards the storage service
    pub storage_tls: bool,
    /// Per-call storage timeout
    pub storage_timeout_secs: u64,
    /// Agent CLI binary; searched on PATH when unset
    pub cli_path: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8001,
            auth_enabled: true,
            api_key: None,
            api_key_path: None,
            max_concurrent_sessions: 10,
            session_timeout_secs: 3600,
            reaper_interval_secs: 60,
            permission_timeout_secs: 30,
            ws_ping_interval_secs: 30,
            ws_ping_timeout_secs: 10,
            log_level: "info".to_string(),
            storage_enabled: true,
            storage_host: "127.0.0.1".to_string(),
            storage_port: 3333,
            storage_tls: true,
            storage_timeout_secs: 5,
            cli_path: None,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| GatewayError::invalid_config(format!("{ENV_PREFIX}{name}={raw}: {e}")))
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(GatewayError::invalid_config(format!(
            "{ENV_PREFIX}{name}={other}: expected a boolean"
        ))),
    }
}

impl GatewayConfig {
    /// Load defaults overlaid with `AGENT_SERVER_*` environment variables
    ///
    /// # Errors
    /// Returns `InvalidConfig` if a variable cannot be parsed
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(format!("{ENV_PREFIX}{name}")).ok())
    }

    /// Load defaults overlaid with values from `lookup` (keyed without prefix)
    ///
    /// # Errors
    /// Returns `InvalidConfig` if a value cannot be parsed
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        macro_rules! overlay {
            ($field:ident, $name:literal, string) => {
                if let Some(raw) = lookup($name) {
                    config.$field = raw;
                }
            };
            ($field:ident, $name:literal, optional) => {
                if let Some(raw) = lookup($name) {
                    config.$field = Some(raw.into());
                }
            };
            ($field:ident, $name:literal, bool) => {
                if let Some(raw) = lookup($name) {
                    config.$field = parse_bool($name, &raw)?;
                }
            };
            ($field:ident, $name:literal, parse) => {
                if let Some(raw) = lookup($name) {
                    config.$field = parse_var($name, &raw)?;
                }
            };
        }

        overlay!(host, "HOST", string);
        overlay!(port, "PORT", parse);
        overlay!(auth_enabled, "AUTH_ENABLED", bool);
        overlay!(api_key, "API_KEY", optional);
        overlay!(api_key_path, "API_KEY_PATH", optional);
        overlay!(max_concurrent_sessions, "MAX_CONCURRENT_SESSIONS", parse);
        overlay!(session_timeout_secs, "SESSION_TIMEOUT_SECONDS", parse);
        overlay!(reaper_interval_secs, "REAPER_INTERVAL_SECONDS", parse);
        overlay!(permission_timeout_secs, "PERMISSION_TIMEOUT_SECONDS", parse);
        overlay!(ws_ping_interval_secs, "WS_PING_INTERVAL", parse);
        overlay!(ws_ping_timeout_secs, "WS_PING_TIMEOUT", parse);
        overlay!(log_level, "LOG_LEVEL", string);
        overlay!(storage_enabled, "STORAGE_ENABLED", bool);
        overlay!(storage_host, "GO_API_HOST", string);
        overlay!(storage_port, "GO_API_PORT", parse);
        overlay!(storage_tls, "GO_API_TLS", bool);
        overlay!(storage_timeout_secs, "STORAGE_TIMEOUT_SECONDS", parse);
        overlay!(cli_path, "CLI_PATH", optional);

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns `InvalidConfig` for zero limits or intervals
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_sessions == 0 {
            return Err(GatewayError::invalid_config(
                "max_concurrent_sessions must be at least 1",
            ));
        }
        if self.reaper_interval_secs == 0 {
            return Err(GatewayError::invalid_config(
                "reaper_interval_secs must be at least 1",
            ));
        }
        if self.ws_ping_interval_secs == 0 {
            return Err(GatewayError::invalid_config(
                "ws_ping_interval_secs must be at least 1",
            ));
        }
        Ok(())
    }

    /// Resolve the shared secret clients must present.
    ///
    /// Lookup order: inline key, explicit key file, then the default key
    /// files under the home directory.
    #[must_use]
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            return Some(key.to_string());
        }

        let mut candidates: Vec<PathBuf> = self.api_key_path.iter().cloned().collect();
        if let Some(home) = dirs::home_dir() {
            candidates.extend(API_KEY_FILES.iter().map(|rel| home.join(rel)));
        }

        for path in candidates {
            match std::fs::read_to_string(&path) {
                Ok(contents) => {
                    let key = contents.trim();
                    if !key.is_empty() {
                        log::info!("Loaded API key from {}", path.display());
                        return Some(key.to_string());
                    }
                }
                Err(e) => log::debug!("No API key at {}: {e}", path.display()),
            }
        }

        log::warn!("No API key found; authenticated connections will be rejected");
        None
    }

    /// Address the server binds to
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL of the session storage API
    #[must_use]
    pub fn storage_base_url(&self) -> String {
        let scheme = if self.storage_tls { "https" } else { "http" };
        format!(
            "{scheme}://{}:{}/api/agent-sessions",
            self.storage_host, self.storage_port
        )
    }

    /// Idle eviction threshold
    #[must_use]
    pub const fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    /// Idle reaper period
    #[must_use]
    pub const fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }

    /// Permission wait bound
    #[must_use]
    pub const fn permission_timeout(&self) -> Duration {
        Duration::from_secs(self.permission_timeout_secs)
    }

    /// Storage call bound
    #[must_use]
    pub const fn storage_timeout(&self) -> Duration {
        Duration::from_secs(self.storage_timeout_secs)
    }

    /// Keepalive period
    #[must_use]
    pub const fn ws_ping_interval(&self) -> Duration {
        Duration::from_secs(self.ws_ping_interval_secs)
    }
}
