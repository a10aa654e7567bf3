//! Configuration file parsing (HOCON format).

use std::path::Path;

use crate::common::error::ConfigError;
use crate::config::types::Config;
use hocon::HoconLoader;

/// Load configuration from a HOCON file.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();

    HoconLoader::new()
        .load_file(path)
        .map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
        })?
        .resolve()
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
}

/// Load configuration from a HOCON string.
pub fn load_config_str(content: &str) -> Result<Config, ConfigError> {
    HoconLoader::new()
        .load_str(content)
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?
        .resolve()
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config() {
        let config = load_config_str(
            r#"
            server { host = "mc.example.net" }
            account { username = "Steve" }
            "#,
        )
        .unwrap();

        assert_eq!(config.server.host, "mc.example.net");
        assert_eq!(config.server.port, 25565);
        assert!(config.account.access_token.is_none());
        assert!(!config.forge.enabled);
        assert_eq!(config.default_version(), 754);
    }

    #[test]
    fn test_full_config() {
        let config = load_config_str(
            r#"
            server { host = "localhost", port = 25570 }
            account {
                username = "Alex"
                access_token = "token"
                expires_in = 86400
            }
            protocol {
                allowed_versions = [340, 393]
                read_timeout_ms = 250
            }
            forge {
                enabled = true
                mods = [ { modid = "forge", version = "14.23.5.2847" } ]
            }
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 25570);
        assert_eq!(config.account.expires_in, Some(86400));
        assert_eq!(config.allowed_versions().into_iter().collect::<Vec<_>>(), vec![340, 393]);
        assert_eq!(config.default_version(), 393);
        assert_eq!(config.read_timeout().as_millis(), 250);
        assert_eq!(config.mods()[0].modid, "forge");
    }

    #[test]
    fn test_pinned_version_wins() {
        let config = load_config_str(
            r#"
            server { host = "localhost" }
            account { username = "Alex" }
            protocol { version = 47, allowed_versions = [340] }
            "#,
        )
        .unwrap();
        assert_eq!(config.allowed_versions().into_iter().collect::<Vec<_>>(), vec![47]);
    }

    #[test]
    fn test_missing_section_is_parse_error() {
        assert!(matches!(
            load_config_str(r#"server { host = "x" }"#),
            Err(ConfigError::ParseError { .. })
        ));
    }
}
