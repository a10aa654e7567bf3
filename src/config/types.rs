//! Configuration type definitions.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::Deserialize;

use crate::protocol::context::{latest_protocol_version, ModEntry, SUPPORTED_PROTOCOL_VERSIONS};

/// Default bounded wait for a single packet read.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 100;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub account: AccountConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub forge: ForgeConfig,
}

/// Game server address.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    25565
}

/// Player identity and optional session credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub username: String,
    /// Without a token the client can only join offline-mode servers.
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    /// Token lifetime in seconds, counted from startup.
    pub expires_in: Option<i64>,
    /// Undashed profile UUID; looked up from the token when absent.
    pub profile_id: Option<String>,
}

/// Protocol version selection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProtocolConfig {
    /// Pin a single protocol version and skip the status probe.
    pub version: Option<i32>,
    /// Restrict the versions the status probe may pick.
    pub allowed_versions: Option<Vec<i32>>,
    pub read_timeout_ms: Option<u64>,
}

/// Forge mod-list handshake.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForgeConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub mods: Vec<ModConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModConfig {
    pub modid: String,
    pub version: String,
}

impl Config {
    /// Versions a connection may use, newest last.
    pub fn allowed_versions(&self) -> BTreeSet<i32> {
        if let Some(version) = self.protocol.version {
            return BTreeSet::from([version]);
        }
        match &self.protocol.allowed_versions {
            Some(versions) if !versions.is_empty() => versions.iter().copied().collect(),
            _ => SUPPORTED_PROTOCOL_VERSIONS.iter().copied().collect(),
        }
    }

    pub fn default_version(&self) -> i32 {
        self.allowed_versions()
            .last()
            .copied()
            .unwrap_or_else(latest_protocol_version)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(
            self.protocol
                .read_timeout_ms
                .unwrap_or(DEFAULT_READ_TIMEOUT_MS),
        )
    }

    pub fn mods(&self) -> Vec<ModEntry> {
        self.forge
            .mods
            .iter()
            .map(|m| ModEntry::new(m.modid.clone(), m.version.clone()))
            .collect()
    }
}
