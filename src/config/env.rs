//! Environment variable overrides for configuration.
//!
//! Supports overriding config values with environment variables:
//! - `MINECART_SERVER_HOST` - Server host
//! - `MINECART_SERVER_PORT` - Server port
//! - `MINECART_USERNAME` - Player name
//! - `MINECART_ACCESS_TOKEN` - Session access token
//! - `MINECART_PROTOCOL_VERSION` - Pinned protocol version

use std::env;

use crate::config::types::Config;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "MINECART";

/// Apply environment variable overrides to a config.
///
/// This allows the access token to be provided via the environment instead
/// of the config file.
pub fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(host) = env::var(format!("{}_SERVER_HOST", ENV_PREFIX)) {
        config.server.host = host;
    }
    if let Ok(port) = env::var(format!("{}_SERVER_PORT", ENV_PREFIX)) {
        if let Ok(port) = port.parse() {
            config.server.port = port;
        }
    }

    if let Ok(username) = env::var(format!("{}_USERNAME", ENV_PREFIX)) {
        config.account.username = username;
    }
    if let Ok(token) = env::var(format!("{}_ACCESS_TOKEN", ENV_PREFIX)) {
        config.account.access_token = Some(token);
    }

    if let Ok(version) = env::var(format!("{}_PROTOCOL_VERSION", ENV_PREFIX)) {
        if let Ok(version) = version.parse() {
            config.protocol.version = Some(version);
        }
    }

    config
}

/// Check if any credential environment variables are set but empty.
///
/// Returns a list of variable names that are set but empty.
pub fn check_empty_env_vars() -> Vec<String> {
    let vars = [
        format!("{}_USERNAME", ENV_PREFIX),
        format!("{}_ACCESS_TOKEN", ENV_PREFIX),
    ];

    vars.into_iter()
        .filter(|var| env::var(var).map(|v| v.is_empty()).unwrap_or(false))
        .collect()
}

/// Get the config file path from environment or use default.
///
/// Checks `MINECART_CONFIG` environment variable, otherwise returns "minecart.conf".
pub fn get_config_path() -> String {
    env::var(format!("{}_CONFIG", ENV_PREFIX)).unwrap_or_else(|_| "minecart.conf".to_string())
}
