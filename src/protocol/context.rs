//! Negotiated per-connection protocol parameters.

use std::collections::BTreeSet;

/// Protocol numbers this client knows how to speak, oldest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[i32] = &[
    47, 107, 108, 109, 110, 210, 315, 316, 335, 338, 340, 393, 401, 404, 477, 480, 485, 490, 498,
    573, 575, 578, 735, 736, 751, 753, 754,
];

/// Release names and their protocol numbers.
pub const SUPPORTED_MINECRAFT_VERSIONS: &[(&str, i32)] = &[
    ("1.8", 47),
    ("1.8.9", 47),
    ("1.9", 107),
    ("1.9.1", 108),
    ("1.9.2", 109),
    ("1.9.4", 110),
    ("1.10", 210),
    ("1.10.2", 210),
    ("1.11", 315),
    ("1.11.2", 316),
    ("1.12", 335),
    ("1.12.1", 338),
    ("1.12.2", 340),
    ("1.13", 393),
    ("1.13.1", 401),
    ("1.13.2", 404),
    ("1.14", 477),
    ("1.14.1", 480),
    ("1.14.2", 485),
    ("1.14.3", 490),
    ("1.14.4", 498),
    ("1.15", 573),
    ("1.15.1", 575),
    ("1.15.2", 578),
    ("1.16", 735),
    ("1.16.1", 736),
    ("1.16.2", 751),
    ("1.16.3", 753),
    ("1.16.4", 754),
    ("1.16.5", 754),
];

/// The newest protocol number in the table.
pub fn latest_protocol_version() -> i32 {
    SUPPORTED_PROTOCOL_VERSIONS
        .last()
        .copied()
        .unwrap_or(47)
}

pub fn is_supported(protocol_version: i32) -> bool {
    SUPPORTED_PROTOCOL_VERSIONS.contains(&protocol_version)
}

/// Look up a protocol number by release name.
pub fn protocol_for_release(name: &str) -> Option<i32> {
    SUPPORTED_MINECRAFT_VERSIONS
        .iter()
        .find(|(release, _)| *release == name)
        .map(|(_, proto)| *proto)
}

/// A mod advertised during the Forge handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModEntry {
    pub modid: String,
    pub version: String,
}

impl ModEntry {
    pub fn new(modid: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            modid: modid.into(),
            version: version.into(),
        }
    }
}

/// Configuration shared by every packet and reactor of one connection.
///
/// Direction is not part of it. Registries only decode clientbound packets
/// and tag a [`RawPacket`] with its direction; serverbound kinds report
/// theirs through `ServerboundKind::direction`.
///
/// [`RawPacket`]: crate::protocol::packets::RawPacket
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    pub protocol_version: i32,
    /// Enables the Forge mod-list handshake channel.
    pub enable_fml: bool,
    /// Mods announced to the server; may be filled in from a status probe.
    pub fml_mods: Vec<ModEntry>,
    /// Plugin channels the server has registered with us.
    pub registered_channels: BTreeSet<String>,
}

impl Context {
    pub fn new(protocol_version: i32) -> Self {
        Self {
            protocol_version,
            enable_fml: false,
            fml_mods: Vec::new(),
            registered_channels: BTreeSet::new(),
        }
    }

    pub fn with_fml(mut self, mods: Vec<ModEntry>) -> Self {
        self.enable_fml = true;
        self.fml_mods = mods;
        self
    }

    pub fn protocol_later_eq(&self, other: i32) -> bool {
        self.protocol_version >= other
    }

    pub fn protocol_later(&self, other: i32) -> bool {
        self.protocol_version > other
    }

    pub fn protocol_earlier(&self, other: i32) -> bool {
        self.protocol_version < other
    }

    /// True when `start <= version < end`.
    pub fn protocol_in_range(&self, start: i32, end: i32) -> bool {
        start <= self.protocol_version && self.protocol_version < end
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(latest_protocol_version())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_table_sorted() {
        let mut sorted = SUPPORTED_PROTOCOL_VERSIONS.to_vec();
        sorted.sort();
        assert_eq!(sorted, SUPPORTED_PROTOCOL_VERSIONS);
        for (_, proto) in SUPPORTED_MINECRAFT_VERSIONS {
            assert!(is_supported(*proto));
        }
    }

    #[test]
    fn test_protocol_comparisons() {
        let ctx = Context::new(340);
        assert!(ctx.protocol_later_eq(340));
        assert!(ctx.protocol_later(339));
        assert!(ctx.protocol_earlier(393));
        assert!(ctx.protocol_in_range(107, 393));
        assert!(!ctx.protocol_in_range(393, 754));
        assert_eq!(protocol_for_release("1.12.2"), Some(340));
        assert_eq!(latest_protocol_version(), 754);
    }
}
