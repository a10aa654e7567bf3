//! Login phase packets.

use uuid::Uuid;

use crate::common::error::ProtocolResult;
use crate::protocol::buffer::PacketBuffer;
use crate::protocol::context::Context;
use crate::protocol::packets::ids::LoginKind;
use crate::protocol::packets::{ClientboundSet, PacketDecode, PacketEncode, RawPacket};
use crate::protocol::types::{
    write_str, Boolean, McString, PlayerUuid, TrailingByteArray, VarInt, VarIntPrefixedByteArray,
    WireType,
};

/// Server id sent by servers running in offline mode.
pub const OFFLINE_SERVER_ID: &str = "-";

/// Chat-component JSON explaining why the server dropped us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    pub json_data: String,
}

impl PacketDecode for Disconnect {
    fn decode(buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<Self> {
        Ok(Disconnect {
            json_data: McString::read(buf)?,
        })
    }
}

impl PacketEncode for Disconnect {
    fn encode(&self, buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<()> {
        write_str(&self.json_data, buf)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionRequest {
    pub server_id: String,
    /// DER-encoded RSA public key.
    pub public_key: Vec<u8>,
    pub verify_token: Vec<u8>,
}

impl EncryptionRequest {
    pub fn is_online_mode(&self) -> bool {
        self.server_id != OFFLINE_SERVER_ID
    }
}

impl PacketDecode for EncryptionRequest {
    fn decode(buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<Self> {
        Ok(EncryptionRequest {
            server_id: McString::read(buf)?,
            public_key: VarIntPrefixedByteArray::read(buf)?,
            verify_token: VarIntPrefixedByteArray::read(buf)?,
        })
    }
}

impl PacketEncode for EncryptionRequest {
    fn encode(&self, buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<()> {
        write_str(&self.server_id, buf)?;
        VarIntPrefixedByteArray::write(&self.public_key, buf)?;
        VarIntPrefixedByteArray::write(&self.verify_token, buf)
    }
}

/// Both fields are encrypted with the server's public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionResponse {
    pub shared_secret: Vec<u8>,
    pub verify_token: Vec<u8>,
}

impl PacketEncode for EncryptionResponse {
    fn encode(&self, buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<()> {
        VarIntPrefixedByteArray::write(&self.shared_secret, buf)?;
        VarIntPrefixedByteArray::write(&self.verify_token, buf)
    }
}

impl PacketDecode for EncryptionResponse {
    fn decode(buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<Self> {
        Ok(EncryptionResponse {
            shared_secret: VarIntPrefixedByteArray::read(buf)?,
            verify_token: VarIntPrefixedByteArray::read(buf)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSuccess {
    pub uuid: Uuid,
    pub username: String,
}

impl PacketDecode for LoginSuccess {
    fn decode(buf: &mut PacketBuffer, ctx: &Context) -> ProtocolResult<Self> {
        Ok(LoginSuccess {
            uuid: PlayerUuid::read_with_context(buf, ctx)?,
            username: McString::read(buf)?,
        })
    }
}

impl PacketEncode for LoginSuccess {
    fn encode(&self, buf: &mut PacketBuffer, ctx: &Context) -> ProtocolResult<()> {
        PlayerUuid::write_with_context(&self.uuid, buf, ctx)?;
        write_str(&self.username, buf)
    }
}

/// Arms compression; shared by Login and the legacy Play packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCompression {
    /// Minimum payload size to compress; negative disables compression.
    pub threshold: i32,
}

impl PacketDecode for SetCompression {
    fn decode(buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<Self> {
        Ok(SetCompression {
            threshold: VarInt::read(buf)?,
        })
    }
}

impl PacketEncode for SetCompression {
    fn encode(&self, buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<()> {
        VarInt::write(&self.threshold, buf)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginPluginRequest {
    pub message_id: i32,
    pub channel: String,
    pub data: Vec<u8>,
}

impl PacketDecode for LoginPluginRequest {
    fn decode(buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<Self> {
        Ok(LoginPluginRequest {
            message_id: VarInt::read(buf)?,
            channel: McString::read(buf)?,
            data: TrailingByteArray::read(buf)?,
        })
    }
}

impl PacketEncode for LoginPluginRequest {
    fn encode(&self, buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<()> {
        VarInt::write(&self.message_id, buf)?;
        write_str(&self.channel, buf)?;
        TrailingByteArray::write(&self.data, buf)
    }
}

/// Answer to a login plugin request; `data` is only present on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginPluginResponse {
    pub message_id: i32,
    pub successful: bool,
    pub data: Option<Vec<u8>>,
}

impl LoginPluginResponse {
    pub fn decline(message_id: i32) -> Self {
        Self {
            message_id,
            successful: false,
            data: None,
        }
    }
}

impl PacketEncode for LoginPluginResponse {
    fn encode(&self, buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<()> {
        VarInt::write(&self.message_id, buf)?;
        Boolean::write(&self.successful, buf)?;
        if self.successful {
            if let Some(data) = &self.data {
                TrailingByteArray::write(data, buf)?;
            }
        }
        Ok(())
    }
}

impl PacketDecode for LoginPluginResponse {
    fn decode(buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<Self> {
        let message_id = VarInt::read(buf)?;
        let successful = Boolean::read(buf)?;
        let data = if successful {
            Some(TrailingByteArray::read(buf)?)
        } else {
            None
        };
        Ok(LoginPluginResponse {
            message_id,
            successful,
            data,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginStart {
    pub name: String,
}

impl PacketEncode for LoginStart {
    fn encode(&self, buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<()> {
        write_str(&self.name, buf)
    }
}

impl PacketDecode for LoginStart {
    fn decode(buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<Self> {
        Ok(LoginStart {
            name: McString::read(buf)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoginClientbound {
    Disconnect(Disconnect),
    EncryptionRequest(EncryptionRequest),
    LoginSuccess(LoginSuccess),
    SetCompression(SetCompression),
    PluginRequest(LoginPluginRequest),
    Raw(RawPacket),
}

impl ClientboundSet for LoginClientbound {
    type Kind = LoginKind;

    fn decode_kind(kind: LoginKind, buf: &mut PacketBuffer, ctx: &Context) -> ProtocolResult<Self> {
        Ok(match kind {
            LoginKind::Disconnect => LoginClientbound::Disconnect(Disconnect::decode(buf, ctx)?),
            LoginKind::EncryptionRequest => {
                LoginClientbound::EncryptionRequest(EncryptionRequest::decode(buf, ctx)?)
            }
            LoginKind::LoginSuccess => {
                LoginClientbound::LoginSuccess(LoginSuccess::decode(buf, ctx)?)
            }
            LoginKind::SetCompression => {
                LoginClientbound::SetCompression(SetCompression::decode(buf, ctx)?)
            }
            LoginKind::PluginRequest => {
                LoginClientbound::PluginRequest(LoginPluginRequest::decode(buf, ctx)?)
            }
        })
    }

    fn raw(raw: RawPacket) -> Self {
        LoginClientbound::Raw(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declined_plugin_response_has_no_data() {
        let ctx = Context::new(393);
        let mut buf = PacketBuffer::new();
        LoginPluginResponse::decline(7).encode(&mut buf, &ctx).unwrap();
        assert_eq!(buf.get_writable(), &[0x07, 0x00]);
    }

    #[test]
    fn test_encryption_request_round_trip() {
        let ctx = Context::new(340);
        let request = EncryptionRequest {
            server_id: OFFLINE_SERVER_ID.to_string(),
            public_key: vec![1, 2, 3],
            verify_token: vec![9, 9, 9, 9],
        };
        let mut buf = PacketBuffer::new();
        request.encode(&mut buf, &ctx).unwrap();
        let decoded = EncryptionRequest::decode(&mut buf, &ctx).unwrap();
        assert_eq!(decoded, request);
        assert!(!decoded.is_online_mode());
    }
}
