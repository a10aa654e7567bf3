//! Packet definitions, id tables and per-phase registries.

pub mod fml;
pub mod handshake;
pub mod ids;
pub mod login;
pub mod play;
pub mod plugins;
pub mod status;

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use bytes::Bytes;
use tracing::trace;

use crate::common::error::ProtocolResult;
use crate::protocol::buffer::PacketBuffer;
use crate::protocol::context::Context;
use crate::protocol::types::{VarInt, WireType};

pub use ids::ServerboundKind;

/// Which way a packet travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Clientbound,
    Serverbound,
}

/// Connection phase selecting the legal packet vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Handshake,
    Status,
    Login,
    Play,
}

/// Trait for packet bodies that can be decoded from a buffer.
///
/// The buffer is positioned right after the packet id. Bytes left over once
/// every modelled field is read are ignored.
pub trait PacketDecode: Sized {
    fn decode(buf: &mut PacketBuffer, ctx: &Context) -> ProtocolResult<Self>;
}

/// Trait for packet bodies that can be encoded into a buffer (fields only).
pub trait PacketEncode {
    fn encode(&self, buf: &mut PacketBuffer, ctx: &Context) -> ProtocolResult<()>;
}

/// A packet whose id is not registered in the active phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub id: i32,
    pub direction: Direction,
    pub data: Bytes,
}

/// One entry of a phase's packet catalog.
pub trait PacketKind: Copy + Eq + Hash + Debug + 'static {
    /// Every kind the phase can ever carry, across all versions.
    const ALL: &'static [Self];

    /// Packet id in the given context, or `None` when the kind does not
    /// exist there.
    fn id(self, ctx: &Context) -> Option<i32>;

    fn name(self) -> &'static str;
}

/// The closed set of packets a phase can receive.
pub trait ClientboundSet: Sized {
    type Kind: PacketKind;

    fn decode_kind(kind: Self::Kind, buf: &mut PacketBuffer, ctx: &Context)
        -> ProtocolResult<Self>;

    fn raw(raw: RawPacket) -> Self;
}

/// Packet id table for one phase, computed once from the context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry<K: PacketKind> {
    by_id: HashMap<i32, K>,
}

impl<K: PacketKind> Registry<K> {
    pub fn build(ctx: &Context) -> Self {
        let by_id = K::ALL
            .iter()
            .filter_map(|kind| kind.id(ctx).map(|id| (id, *kind)))
            .collect();
        Self { by_id }
    }

    pub fn get(&self, id: i32) -> Option<K> {
        self.by_id.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Decode a packet body (`[VarInt id][fields]`).
    ///
    /// Unregistered ids come back as the raw variant.
    pub fn decode<P>(&self, body: Bytes, ctx: &Context) -> ProtocolResult<P>
    where
        P: ClientboundSet<Kind = K>,
    {
        let mut buf = PacketBuffer::from(body);
        let id = VarInt::read(&mut buf)?;

        match self.get(id) {
            Some(kind) => {
                let packet = P::decode_kind(kind, &mut buf, ctx)?;
                if !buf.is_eof() {
                    trace!(
                        "{} left {} trailing bytes unread",
                        kind.name(),
                        buf.remaining()
                    );
                }
                Ok(packet)
            }
            None => Ok(P::raw(RawPacket {
                id,
                direction: Direction::Clientbound,
                data: buf.read_remaining(),
            })),
        }
    }
}

/// Serialize `[VarInt id][fields]` for the transport codec.
pub fn encode_body<P: PacketEncode>(
    id: i32,
    packet: &P,
    ctx: &Context,
) -> ProtocolResult<Bytes> {
    let mut buf = PacketBuffer::new();
    VarInt::write(&id, &mut buf)?;
    packet.encode(&mut buf, ctx)?;
    Ok(buf.freeze())
}

/// Every packet this client can send.
#[derive(Debug, Clone, PartialEq)]
pub enum Serverbound {
    Handshake(handshake::Handshake),
    StatusRequest(status::StatusRequest),
    Ping(status::PingPong),
    LoginStart(login::LoginStart),
    EncryptionResponse(login::EncryptionResponse),
    LoginPluginResponse(login::LoginPluginResponse),
    KeepAlive(play::KeepAlive),
    TeleportConfirm(play::TeleportConfirm),
    PositionAndLook(play::PositionAndLook),
    PluginMessage(play::PluginMessage),
    Plugin(plugins::PluginServerbound),
}

impl Serverbound {
    pub fn kind(&self) -> ServerboundKind {
        match self {
            Serverbound::Handshake(_) => ServerboundKind::Handshake,
            Serverbound::StatusRequest(_) => ServerboundKind::StatusRequest,
            Serverbound::Ping(_) => ServerboundKind::Ping,
            Serverbound::LoginStart(_) => ServerboundKind::LoginStart,
            Serverbound::EncryptionResponse(_) => ServerboundKind::EncryptionResponse,
            Serverbound::LoginPluginResponse(_) => ServerboundKind::LoginPluginResponse,
            Serverbound::KeepAlive(_) => ServerboundKind::KeepAlive,
            Serverbound::TeleportConfirm(_) => ServerboundKind::TeleportConfirm,
            Serverbound::PositionAndLook(_) => ServerboundKind::PositionAndLook,
            Serverbound::PluginMessage(_) | Serverbound::Plugin(_) => {
                ServerboundKind::PluginMessage
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Serverbound::Plugin(plugin) => plugin.name(),
            other => other.kind().name(),
        }
    }

    /// Serialize into a packet body ready for framing.
    pub fn encode(&self, ctx: &Context) -> ProtocolResult<Bytes> {
        let kind = self.kind();
        let id = kind
            .id(ctx)
            .ok_or(crate::common::error::ProtocolError::UnsupportedVersion(
                ctx.protocol_version,
            ))?;

        match self {
            Serverbound::Handshake(p) => encode_body(id, p, ctx),
            Serverbound::StatusRequest(p) => encode_body(id, p, ctx),
            Serverbound::Ping(p) => encode_body(id, p, ctx),
            Serverbound::LoginStart(p) => encode_body(id, p, ctx),
            Serverbound::EncryptionResponse(p) => encode_body(id, p, ctx),
            Serverbound::LoginPluginResponse(p) => encode_body(id, p, ctx),
            Serverbound::KeepAlive(p) => encode_body(id, p, ctx),
            Serverbound::TeleportConfirm(p) => encode_body(id, p, ctx),
            Serverbound::PositionAndLook(p) => encode_body(id, p, ctx),
            Serverbound::PluginMessage(p) => encode_body(id, p, ctx),
            Serverbound::Plugin(p) => encode_body(id, &p.to_message(ctx)?, ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ids::{LoginKind, PlayKind};
    use super::login::LoginClientbound;
    use super::play::PlayClientbound;
    use super::*;

    #[test]
    fn test_registry_tracks_version() {
        let legacy = Registry::<PlayKind>::build(&Context::new(47));
        let modern = Registry::<PlayKind>::build(&Context::new(754));

        assert_eq!(legacy.get(0x00), Some(PlayKind::KeepAlive));
        assert_eq!(legacy.get(0x46), Some(PlayKind::SetCompression));
        assert_eq!(modern.get(0x1F), Some(PlayKind::KeepAlive));
        assert_eq!(modern.get(0x46), None);
        assert_eq!(legacy.len(), PlayKind::ALL.len());
        assert_eq!(modern.len(), PlayKind::ALL.len() - 1);
    }

    #[test]
    fn test_unknown_id_decodes_raw() {
        let ctx = Context::new(340);
        let registry = Registry::<PlayKind>::build(&ctx);
        let body = Bytes::from_static(&[0x7A, 0x01, 0x02, 0x03]);

        let packet: PlayClientbound = registry.decode(body, &ctx).unwrap();
        match packet {
            PlayClientbound::Raw(raw) => {
                assert_eq!(raw.id, 0x7A);
                assert_eq!(raw.direction, Direction::Clientbound);
                assert_eq!(raw.data.as_ref(), &[0x01, 0x02, 0x03]);
            }
            other => panic!("expected raw packet, got {:?}", other),
        }
    }

    #[test]
    fn test_trailing_bytes_tolerated() {
        let ctx = Context::new(340);
        let registry = Registry::<LoginKind>::build(&ctx);
        // Set Compression (0x03), threshold 256, then junk.
        let body = Bytes::from_static(&[0x03, 0x80, 0x02, 0xAA, 0xBB]);

        let packet: LoginClientbound = registry.decode(body, &ctx).unwrap();
        match packet {
            LoginClientbound::SetCompression(p) => assert_eq!(p.threshold, 256),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_premature_end_is_fatal() {
        let ctx = Context::new(340);
        let registry = Registry::<LoginKind>::build(&ctx);
        // Encryption Request with a server id claiming 5 bytes but carrying 2.
        let body = Bytes::from_static(&[0x01, 0x05, b'a', b'b']);

        let result: ProtocolResult<LoginClientbound> = registry.decode(body, &ctx);
        assert!(result.is_err());
    }
}
