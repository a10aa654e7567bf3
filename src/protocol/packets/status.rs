//! Status phase packets and the server list payload.

use serde::Deserialize;

use crate::common::error::ProtocolResult;
use crate::protocol::buffer::PacketBuffer;
use crate::protocol::context::{Context, ModEntry};
use crate::protocol::packets::ids::StatusKind;
use crate::protocol::packets::{ClientboundSet, PacketDecode, PacketEncode, RawPacket};
use crate::protocol::types::{write_str, Long, McString, WireType};

/// Empty status request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusRequest;

impl PacketEncode for StatusRequest {
    fn encode(&self, _buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<()> {
        // Empty payload - just the id
        Ok(())
    }
}

/// Status response carrying the server list JSON document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusResponse {
    pub json_response: String,
}

impl PacketDecode for StatusResponse {
    fn decode(buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<Self> {
        Ok(StatusResponse {
            json_response: McString::read(buf)?,
        })
    }
}

impl PacketEncode for StatusResponse {
    fn encode(&self, buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<()> {
        write_str(&self.json_response, buf)
    }
}

impl StatusResponse {
    pub fn parse(&self) -> ProtocolResult<ServerStatus> {
        Ok(serde_json::from_str(&self.json_response)?)
    }
}

/// Latency probe, same shape both ways; the server echoes the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingPong {
    pub time: i64,
}

impl PacketDecode for PingPong {
    fn decode(buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<Self> {
        Ok(PingPong {
            time: Long::read(buf)?,
        })
    }
}

impl PacketEncode for PingPong {
    fn encode(&self, buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<()> {
        Long::write(&self.time, buf)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusClientbound {
    Response(StatusResponse),
    Pong(PingPong),
    Raw(RawPacket),
}

impl ClientboundSet for StatusClientbound {
    type Kind = StatusKind;

    fn decode_kind(kind: StatusKind, buf: &mut PacketBuffer, ctx: &Context) -> ProtocolResult<Self> {
        Ok(match kind {
            StatusKind::Response => StatusClientbound::Response(StatusResponse::decode(buf, ctx)?),
            StatusKind::Pong => StatusClientbound::Pong(PingPong::decode(buf, ctx)?),
        })
    }

    fn raw(raw: RawPacket) -> Self {
        StatusClientbound::Raw(raw)
    }
}

/// Parsed server list document. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ServerStatus {
    #[serde(default)]
    pub version: Option<StatusVersion>,
    #[serde(default)]
    pub modinfo: Option<ModInfo>,
    #[serde(default)]
    pub players: Option<serde_json::Value>,
    #[serde(default)]
    pub description: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ServerStatus {
    /// True for a document with no keys at all.
    pub fn is_empty(&self) -> bool {
        self.version.is_none()
            && self.modinfo.is_none()
            && self.players.is_none()
            && self.description.is_none()
            && self.extra.is_empty()
    }

    pub fn protocol(&self) -> Option<i32> {
        self.version.as_ref().and_then(|v| v.protocol)
    }

    pub fn version_name(&self) -> Option<&str> {
        self.version.as_ref().and_then(|v| v.name.as_deref())
    }

    /// Mods advertised by a Forge server.
    pub fn mods(&self) -> Vec<ModEntry> {
        self.modinfo
            .as_ref()
            .map(|info| {
                info.mod_list
                    .iter()
                    .map(|m| ModEntry::new(m.modid.clone(), m.version.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatusVersion {
    #[serde(default)]
    pub protocol: Option<i32>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ModInfo {
    #[serde(rename = "modList", default)]
    pub mod_list: Vec<StatusMod>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatusMod {
    #[serde(default)]
    pub modid: String,
    #[serde(default)]
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_status() {
        let response = StatusResponse {
            json_response: r#"{"version":{"protocol":340,"name":"1.12.2"},
                "modinfo":{"type":"FML","modList":[{"modid":"forge","version":"14.23.5.2847"}]}}"#
                .to_string(),
        };
        let status = response.parse().unwrap();
        assert_eq!(status.protocol(), Some(340));
        assert_eq!(status.version_name(), Some("1.12.2"));
        assert_eq!(status.mods(), vec![ModEntry::new("forge", "14.23.5.2847")]);
        assert!(!status.is_empty());
    }

    #[test]
    fn test_parse_tolerates_missing_keys() {
        let status: ServerStatus = serde_json::from_str(r#"{"version":{"name":"x"}}"#).unwrap();
        assert_eq!(status.protocol(), None);
        assert!(status.mods().is_empty());

        let empty: ServerStatus = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());
    }
}
