//! Play phase packets needed by the client core.

use crate::common::error::ProtocolResult;
use crate::protocol::buffer::PacketBuffer;
use crate::protocol::context::Context;
use crate::protocol::packets::ids::{PlayKind, TELEPORT_CONFIRM_SINCE};
use crate::protocol::packets::login::{Disconnect, SetCompression};
use crate::protocol::packets::plugins::PluginClientbound;
use crate::protocol::packets::{ClientboundSet, PacketDecode, PacketEncode, RawPacket};
use crate::protocol::types::{
    write_str, Boolean, Byte, Double, Float, KeepAliveId, McString, TrailingByteArray, VarInt,
    WireType,
};

/// Keep-alive, echoed back verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepAlive {
    pub keep_alive_id: i64,
}

impl PacketDecode for KeepAlive {
    fn decode(buf: &mut PacketBuffer, ctx: &Context) -> ProtocolResult<Self> {
        Ok(KeepAlive {
            keep_alive_id: KeepAliveId::read_with_context(buf, ctx)?,
        })
    }
}

impl PacketEncode for KeepAlive {
    fn encode(&self, buf: &mut PacketBuffer, ctx: &Context) -> ProtocolResult<()> {
        KeepAliveId::write_with_context(&self.keep_alive_id, buf, ctx)
    }
}

/// Server-side teleport of the player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerPositionAndLook {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
    /// Bit field marking relative coordinates.
    pub flags: i8,
    /// Present from 1.9 on.
    pub teleport_id: Option<i32>,
}

impl PacketDecode for PlayerPositionAndLook {
    fn decode(buf: &mut PacketBuffer, ctx: &Context) -> ProtocolResult<Self> {
        Ok(PlayerPositionAndLook {
            x: Double::read(buf)?,
            y: Double::read(buf)?,
            z: Double::read(buf)?,
            yaw: Float::read(buf)?,
            pitch: Float::read(buf)?,
            flags: Byte::read(buf)?,
            teleport_id: if ctx.protocol_later_eq(TELEPORT_CONFIRM_SINCE) {
                Some(VarInt::read(buf)?)
            } else {
                None
            },
        })
    }
}

impl PacketEncode for PlayerPositionAndLook {
    fn encode(&self, buf: &mut PacketBuffer, ctx: &Context) -> ProtocolResult<()> {
        Double::write(&self.x, buf)?;
        Double::write(&self.y, buf)?;
        Double::write(&self.z, buf)?;
        Float::write(&self.yaw, buf)?;
        Float::write(&self.pitch, buf)?;
        Byte::write(&self.flags, buf)?;
        if ctx.protocol_later_eq(TELEPORT_CONFIRM_SINCE) {
            VarInt::write(&self.teleport_id.unwrap_or_default(), buf)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeleportConfirm {
    pub teleport_id: i32,
}

impl PacketEncode for TeleportConfirm {
    fn encode(&self, buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<()> {
        VarInt::write(&self.teleport_id, buf)
    }
}

impl PacketDecode for TeleportConfirm {
    fn decode(buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<Self> {
        Ok(TeleportConfirm {
            teleport_id: VarInt::read(buf)?,
        })
    }
}

/// Client position and look, used to acknowledge teleports before 1.9.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionAndLook {
    pub x: f64,
    pub feet_y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
    pub on_ground: bool,
}

impl PacketEncode for PositionAndLook {
    fn encode(&self, buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<()> {
        Double::write(&self.x, buf)?;
        Double::write(&self.feet_y, buf)?;
        Double::write(&self.z, buf)?;
        Float::write(&self.yaw, buf)?;
        Float::write(&self.pitch, buf)?;
        Boolean::write(&self.on_ground, buf)
    }
}

impl PacketDecode for PositionAndLook {
    fn decode(buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<Self> {
        Ok(PositionAndLook {
            x: Double::read(buf)?,
            feet_y: Double::read(buf)?,
            z: Double::read(buf)?,
            yaw: Float::read(buf)?,
            pitch: Float::read(buf)?,
            on_ground: Boolean::read(buf)?,
        })
    }
}

/// Generic plugin message: a channel name followed by opaque data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginMessage {
    pub channel: String,
    pub data: Vec<u8>,
}

impl PacketDecode for PluginMessage {
    fn decode(buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<Self> {
        Ok(PluginMessage {
            channel: McString::read(buf)?,
            data: TrailingByteArray::read(buf)?,
        })
    }
}

impl PacketEncode for PluginMessage {
    fn encode(&self, buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<()> {
        write_str(&self.channel, buf)?;
        TrailingByteArray::write(&self.data, buf)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayClientbound {
    KeepAlive(KeepAlive),
    PlayerPositionAndLook(PlayerPositionAndLook),
    Disconnect(Disconnect),
    SetCompression(SetCompression),
    PluginMessage(PluginMessage),
    /// A plugin message re-decoded through a registered channel.
    Plugin(PluginClientbound),
    Raw(RawPacket),
}

impl ClientboundSet for PlayClientbound {
    type Kind = PlayKind;

    fn decode_kind(kind: PlayKind, buf: &mut PacketBuffer, ctx: &Context) -> ProtocolResult<Self> {
        Ok(match kind {
            PlayKind::KeepAlive => PlayClientbound::KeepAlive(KeepAlive::decode(buf, ctx)?),
            PlayKind::PlayerPositionAndLook => {
                PlayClientbound::PlayerPositionAndLook(PlayerPositionAndLook::decode(buf, ctx)?)
            }
            PlayKind::Disconnect => PlayClientbound::Disconnect(Disconnect::decode(buf, ctx)?),
            PlayKind::SetCompression => {
                PlayClientbound::SetCompression(SetCompression::decode(buf, ctx)?)
            }
            PlayKind::PluginMessage => {
                PlayClientbound::PluginMessage(PluginMessage::decode(buf, ctx)?)
            }
        })
    }

    fn raw(raw: RawPacket) -> Self {
        PlayClientbound::Raw(raw)
    }
}
