//! Handshake phase packets.

use crate::common::error::ProtocolResult;
use crate::protocol::buffer::PacketBuffer;
use crate::protocol::context::Context;
use crate::protocol::packets::ids::HandshakeKind;
use crate::protocol::packets::{ClientboundSet, PacketDecode, PacketEncode, RawPacket};
use crate::protocol::types::{
    read_enum, write_enum, write_str, McString, UnsignedShort, VarInt, WireEnum, WireType,
};

/// Phase requested by the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextState {
    Status,
    Login,
}

impl WireEnum for NextState {
    type Repr = VarInt;
    const NAME: &'static str = "NextState";

    fn from_repr(value: i32) -> Option<Self> {
        match value {
            1 => Some(NextState::Status),
            2 => Some(NextState::Login),
            _ => None,
        }
    }

    fn to_repr(self) -> i32 {
        match self {
            NextState::Status => 1,
            NextState::Login => 2,
        }
    }
}

/// Opening packet of every connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub protocol_version: i32,
    pub server_address: String,
    pub server_port: u16,
    pub next_state: NextState,
}

impl PacketEncode for Handshake {
    fn encode(&self, buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<()> {
        VarInt::write(&self.protocol_version, buf)?;
        write_str(&self.server_address, buf)?;
        UnsignedShort::write(&self.server_port, buf)?;
        write_enum(self.next_state, buf)
    }
}

impl PacketDecode for Handshake {
    fn decode(buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<Self> {
        Ok(Handshake {
            protocol_version: VarInt::read(buf)?,
            server_address: McString::read(buf)?,
            server_port: UnsignedShort::read(buf)?,
            next_state: read_enum(buf)?,
        })
    }
}

/// The server never speaks during the handshake; anything it sends is raw.
#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeClientbound {
    Raw(RawPacket),
}

impl ClientboundSet for HandshakeClientbound {
    type Kind = HandshakeKind;

    fn decode_kind(kind: HandshakeKind, _buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<Self> {
        match kind {}
    }

    fn raw(raw: RawPacket) -> Self {
        HandshakeClientbound::Raw(raw)
    }
}
