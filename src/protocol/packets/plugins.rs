//! Plugin channel sub-packets carried inside Play plugin messages.

use std::collections::HashMap;

use crate::common::error::{ProtocolError, ProtocolResult};
use crate::protocol::buffer::PacketBuffer;
use crate::protocol::context::Context;
use crate::protocol::packets::fml::{FmlClientPacket, FmlServerPacket};
use crate::protocol::packets::play::{PlayClientbound, PluginMessage};
use crate::protocol::packets::{PacketDecode, PacketEncode};

/// First protocol using namespaced channel names (1.13).
pub const NAMESPACED_CHANNELS_SINCE: i32 = 393;

pub const FML_HANDSHAKE_CHANNEL: &str = "FML|HS";

/// Channels this client understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    Register,
    Unregister,
    FmlHandshake,
}

impl PluginKind {
    pub const ALL: &'static [PluginKind] = &[
        PluginKind::Register,
        PluginKind::Unregister,
        PluginKind::FmlHandshake,
    ];

    pub fn channel(self, ctx: &Context) -> &'static str {
        let namespaced = ctx.protocol_later_eq(NAMESPACED_CHANNELS_SINCE);
        match self {
            PluginKind::Register if namespaced => "minecraft:register",
            PluginKind::Register => "REGISTER",
            PluginKind::Unregister if namespaced => "minecraft:unregister",
            PluginKind::Unregister => "UNREGISTER",
            PluginKind::FmlHandshake => FML_HANDSHAKE_CHANNEL,
        }
    }

    /// Whether the channel takes part in the given connection.
    pub fn enabled(self, ctx: &Context) -> bool {
        match self {
            PluginKind::FmlHandshake => ctx.enable_fml,
            _ => true,
        }
    }
}

/// Channel name -> sub-packet kind, computed once from the context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRegistry {
    by_channel: HashMap<String, PluginKind>,
}

impl ChannelRegistry {
    pub fn build(ctx: &Context) -> Self {
        let by_channel = PluginKind::ALL
            .iter()
            .filter(|kind| kind.enabled(ctx))
            .map(|kind| (kind.channel(ctx).to_string(), *kind))
            .collect();
        Self { by_channel }
    }

    pub fn get(&self, channel: &str) -> Option<PluginKind> {
        self.by_channel.get(channel).copied()
    }

    pub fn len(&self) -> usize {
        self.by_channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_channel.is_empty()
    }

    /// Re-decode a generic plugin message through its channel.
    ///
    /// Messages on unknown channels are returned unchanged.
    pub fn resolve(&self, message: PluginMessage, ctx: &Context) -> ProtocolResult<PlayClientbound> {
        let Some(kind) = self.get(&message.channel) else {
            return Ok(PlayClientbound::PluginMessage(message));
        };

        let mut buf = PacketBuffer::from(&message.data[..]);
        let packet = match kind {
            PluginKind::Register => PluginClientbound::Register(ChannelList::decode(&mut buf, ctx)?),
            PluginKind::Unregister => {
                PluginClientbound::Unregister(ChannelList::decode(&mut buf, ctx)?)
            }
            PluginKind::FmlHandshake => {
                PluginClientbound::Fml(FmlServerPacket::decode(&mut buf, ctx)?)
            }
        };
        Ok(PlayClientbound::Plugin(packet))
    }
}

/// Payload of REGISTER/UNREGISTER: channel names separated by NUL bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelList {
    pub channels: Vec<String>,
}

impl ChannelList {
    pub fn new<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channels: channels.into_iter().map(Into::into).collect(),
        }
    }
}

impl PacketDecode for ChannelList {
    // Vanilla and Bukkit servers send the bare NUL-joined names filling the
    // rest of the message, with no VarInt string prefix.
    fn decode(buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<Self> {
        let data = buf.read_remaining();
        let text = std::str::from_utf8(&data).map_err(|e| ProtocolError::InvalidString {
            message: e.to_string(),
        })?;
        Ok(ChannelList::new(text.split('\0').filter(|c| !c.is_empty())))
    }
}

impl PacketEncode for ChannelList {
    fn encode(&self, buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<()> {
        buf.send(self.channels.join("\0").as_bytes());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PluginClientbound {
    Register(ChannelList),
    Unregister(ChannelList),
    Fml(FmlServerPacket),
}

impl PluginClientbound {
    pub fn name(&self) -> &'static str {
        match self {
            PluginClientbound::Register(_) => "REGISTER",
            PluginClientbound::Unregister(_) => "UNREGISTER",
            PluginClientbound::Fml(packet) => packet.name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PluginServerbound {
    Register(ChannelList),
    Unregister(ChannelList),
    Fml(FmlClientPacket),
}

impl PluginServerbound {
    pub fn kind(&self) -> PluginKind {
        match self {
            PluginServerbound::Register(_) => PluginKind::Register,
            PluginServerbound::Unregister(_) => PluginKind::Unregister,
            PluginServerbound::Fml(_) => PluginKind::FmlHandshake,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PluginServerbound::Register(_) => "REGISTER",
            PluginServerbound::Unregister(_) => "UNREGISTER",
            PluginServerbound::Fml(packet) => packet.name(),
        }
    }

    /// Wrap the sub-packet into a generic plugin message.
    pub fn to_message(&self, ctx: &Context) -> ProtocolResult<PluginMessage> {
        let mut buf = PacketBuffer::new();
        match self {
            PluginServerbound::Register(list) | PluginServerbound::Unregister(list) => {
                list.encode(&mut buf, ctx)?
            }
            PluginServerbound::Fml(packet) => packet.encode(&mut buf, ctx)?,
        }
        Ok(PluginMessage {
            channel: self.kind().channel(ctx).to_string(),
            data: buf.get_writable().to_vec(),
        })
    }
}
