//! Configuration validation.
//!
//! Validates configuration values and provides helpful error messages.

use crate::common::error::ConfigError;
use crate::config::types::Config;
use crate::protocol::context::is_supported;

/// Validate a configuration and return detailed errors.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    // Server
    if config.server.host.is_empty() {
        errors.push("server.host is required".to_string());
    }
    if config.server.port == 0 {
        errors.push("server.port must be non-zero".to_string());
    }

    // Account
    let name_len = config.account.username.chars().count();
    if !(1..=16).contains(&name_len) {
        errors.push(format!(
            "account.username must be 1-16 characters (got {})",
            name_len
        ));
    }
    if let Some(expires_in) = config.account.expires_in {
        if expires_in <= 0 {
            errors.push("account.expires_in must be positive".to_string());
        }
    }

    // Protocol
    if let Some(version) = config.protocol.version {
        if !is_supported(version) {
            errors.push(format!("protocol.version {} is not supported", version));
        }
    }
    if let Some(ref versions) = config.protocol.allowed_versions {
        for (i, version) in versions.iter().enumerate() {
            if !is_supported(*version) {
                errors.push(format!(
                    "protocol.allowed_versions[{}] = {} is not supported",
                    i, version
                ));
            }
        }
    }

    // Forge
    for (i, entry) in config.forge.mods.iter().enumerate() {
        if entry.modid.is_empty() {
            errors.push(format!("forge.mods[{}].modid is required", i));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::*;

    fn make_valid_config() -> Config {
        Config {
            server: ServerConfig {
                host: "localhost".to_string(),
                port: 25565,
            },
            account: AccountConfig {
                username: "Steve".to_string(),
                access_token: Some("token".to_string()),
                token_type: Some("Bearer".to_string()),
                expires_in: Some(86400),
                profile_id: None,
            },
            protocol: ProtocolConfig {
                version: None,
                allowed_versions: Some(vec![340, 754]),
                read_timeout_ms: None,
            },
            forge: ForgeConfig {
                enabled: true,
                mods: vec![ModConfig {
                    modid: "forge".to_string(),
                    version: "14.23.5.2847".to_string(),
                }],
            },
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&make_valid_config()).is_ok());
    }

    #[test]
    fn test_long_username_fails() {
        let mut config = make_valid_config();
        config.account.username = "ThisNameIsWayTooLong".to_string();

        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("1-16 characters"));
    }

    #[test]
    fn test_unsupported_version_fails() {
        let mut config = make_valid_config();
        config.protocol.version = Some(999);

        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("protocol.version"));
    }

    #[test]
    fn test_all_errors_collected() {
        let mut config = make_valid_config();
        config.server.host = String::new();
        config.server.port = 0;
        config.forge.mods[0].modid = String::new();

        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("server.host"));
        assert!(message.contains("server.port"));
        assert!(message.contains("forge.mods[0].modid"));
    }
}
