//! Wire codecs for protocol scalar types.
//!
//! Every type is a zero-sized marker implementing [`WireType`]. The
//! `*_with_context` entry points default to the plain codec; types whose
//! shape changed between protocol versions override them.

use bytes::{BufMut, BytesMut};
use uuid::Uuid;

use crate::common::error::{ProtocolError, ProtocolResult};
use crate::protocol::buffer::PacketBuffer;
use crate::protocol::context::Context;

/// A VarInt never spans more than this many bytes.
pub const VARINT_MAX_BYTES: usize = 5;

/// Longest string the protocol allows, in UTF-16 code units.
pub const MAX_STRING_LENGTH: usize = 32767;

/// Longest string the protocol allows, in encoded bytes.
pub const MAX_STRING_BYTES: usize = MAX_STRING_LENGTH * 3;

const SEGMENT_BITS: u8 = 0x7F;
const CONTINUE_BIT: u8 = 0x80;

/// A value with a defined representation on the wire.
pub trait WireType {
    type Value;

    fn read(buf: &mut PacketBuffer) -> ProtocolResult<Self::Value>;

    fn write(value: &Self::Value, buf: &mut PacketBuffer) -> ProtocolResult<()>;

    fn read_with_context(buf: &mut PacketBuffer, _ctx: &Context) -> ProtocolResult<Self::Value> {
        Self::read(buf)
    }

    fn write_with_context(
        value: &Self::Value,
        buf: &mut PacketBuffer,
        _ctx: &Context,
    ) -> ProtocolResult<()> {
        Self::write(value, buf)
    }
}

macro_rules! fixed_width {
    ($(#[$doc:meta])* $name:ident, $ty:ty) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl WireType for $name {
            type Value = $ty;

            fn read(buf: &mut PacketBuffer) -> ProtocolResult<$ty> {
                Ok(<$ty>::from_be_bytes(buf.read_array()?))
            }

            fn write(value: &$ty, buf: &mut PacketBuffer) -> ProtocolResult<()> {
                buf.send(&value.to_be_bytes());
                Ok(())
            }
        }
    };
}

fixed_width!(
    /// Signed 8-bit integer.
    Byte, i8
);
fixed_width!(UnsignedByte, u8);
fixed_width!(Short, i16);
fixed_width!(UnsignedShort, u16);
fixed_width!(Integer, i32);
fixed_width!(Long, i64);
fixed_width!(Float, f32);
fixed_width!(Double, f64);

/// One byte, 0 or 1.
#[derive(Debug, Clone, Copy)]
pub struct Boolean;

impl WireType for Boolean {
    type Value = bool;

    fn read(buf: &mut PacketBuffer) -> ProtocolResult<bool> {
        match buf.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ProtocolError::InvalidEnum {
                name: "Boolean",
                value: other as i64,
            }),
        }
    }

    fn write(value: &bool, buf: &mut PacketBuffer) -> ProtocolResult<()> {
        buf.send(&[*value as u8]);
        Ok(())
    }
}

/// Variable-length integer: 7 payload bits per byte, high bit set while more
/// bytes follow, least significant group first.
#[derive(Debug, Clone, Copy)]
pub struct VarInt;

impl VarInt {
    /// Number of bytes `value` occupies once encoded.
    pub fn size(value: i32) -> usize {
        let mut value = value as u32;
        let mut size = 1;
        while value > SEGMENT_BITS as u32 {
            value >>= 7;
            size += 1;
        }
        size
    }

    pub fn encode(value: i32, dst: &mut BytesMut) {
        let mut value = value as u32;
        loop {
            if value & !(SEGMENT_BITS as u32) == 0 {
                dst.put_u8(value as u8);
                return;
            }
            dst.put_u8((value as u8 & SEGMENT_BITS) | CONTINUE_BIT);
            value >>= 7;
        }
    }

    /// Decode from the front of `src` without consuming it.
    ///
    /// Returns `Ok(None)` when `src` ends before the terminating byte, and the
    /// value with its encoded length otherwise.
    pub fn peek(src: &[u8]) -> ProtocolResult<Option<(i32, usize)>> {
        let mut value: u32 = 0;
        for (i, byte) in src.iter().enumerate() {
            if i >= VARINT_MAX_BYTES {
                return Err(ProtocolError::VarIntTooLong {
                    max_bytes: VARINT_MAX_BYTES,
                });
            }
            value |= ((byte & SEGMENT_BITS) as u32) << (7 * i);
            if byte & CONTINUE_BIT == 0 {
                return Ok(Some((value as i32, i + 1)));
            }
        }
        if src.len() >= VARINT_MAX_BYTES {
            return Err(ProtocolError::VarIntTooLong {
                max_bytes: VARINT_MAX_BYTES,
            });
        }
        Ok(None)
    }
}

impl WireType for VarInt {
    type Value = i32;

    fn read(buf: &mut PacketBuffer) -> ProtocolResult<i32> {
        let mut value: u32 = 0;
        for i in 0..VARINT_MAX_BYTES {
            let byte = buf.read_u8()?;
            value |= ((byte & SEGMENT_BITS) as u32) << (7 * i);
            if byte & CONTINUE_BIT == 0 {
                return Ok(value as i32);
            }
        }
        Err(ProtocolError::VarIntTooLong {
            max_bytes: VARINT_MAX_BYTES,
        })
    }

    fn write(value: &i32, buf: &mut PacketBuffer) -> ProtocolResult<()> {
        let mut out = BytesMut::with_capacity(VARINT_MAX_BYTES);
        Self::encode(*value, &mut out);
        buf.send(&out);
        Ok(())
    }
}

/// Read a VarInt that is used as a length and must not be negative.
pub fn read_length(buf: &mut PacketBuffer, what: &'static str) -> ProtocolResult<usize> {
    let length = VarInt::read(buf)?;
    usize::try_from(length).map_err(|_| ProtocolError::NegativeLength { what, length })
}

/// UTF-8 text prefixed by its byte length as a VarInt.
#[derive(Debug, Clone, Copy)]
pub struct McString;

impl WireType for McString {
    type Value = String;

    fn read(buf: &mut PacketBuffer) -> ProtocolResult<String> {
        let length = read_length(buf, "String")?;
        if length > MAX_STRING_BYTES {
            return Err(ProtocolError::StringTooLong {
                len: length,
                max: MAX_STRING_BYTES,
            });
        }
        let bytes = buf.read(length)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| ProtocolError::InvalidString {
            message: e.to_string(),
        })
    }

    fn write(value: &String, buf: &mut PacketBuffer) -> ProtocolResult<()> {
        write_str(value, buf)
    }
}

/// Encode a string slice with the [`McString`] layout.
pub fn write_str(value: &str, buf: &mut PacketBuffer) -> ProtocolResult<()> {
    if value.len() > MAX_STRING_BYTES {
        return Err(ProtocolError::StringTooLong {
            len: value.len(),
            max: MAX_STRING_BYTES,
        });
    }
    let units = value.encode_utf16().count();
    if units > MAX_STRING_LENGTH {
        return Err(ProtocolError::StringTooLong {
            len: units,
            max: MAX_STRING_LENGTH,
        });
    }
    VarInt::write(&(value.len() as i32), buf)?;
    buf.send(value.as_bytes());
    Ok(())
}

/// Bytes prefixed by their length as a VarInt.
#[derive(Debug, Clone, Copy)]
pub struct VarIntPrefixedByteArray;

impl WireType for VarIntPrefixedByteArray {
    type Value = Vec<u8>;

    fn read(buf: &mut PacketBuffer) -> ProtocolResult<Vec<u8>> {
        let length = read_length(buf, "byte array")?;
        Ok(buf.read(length)?.to_vec())
    }

    fn write(value: &Vec<u8>, buf: &mut PacketBuffer) -> ProtocolResult<()> {
        VarInt::write(&(value.len() as i32), buf)?;
        buf.send(value);
        Ok(())
    }
}

/// All bytes up to the end of the packet.
#[derive(Debug, Clone, Copy)]
pub struct TrailingByteArray;

impl WireType for TrailingByteArray {
    type Value = Vec<u8>;

    fn read(buf: &mut PacketBuffer) -> ProtocolResult<Vec<u8>> {
        Ok(buf.read_remaining().to_vec())
    }

    fn write(value: &Vec<u8>, buf: &mut PacketBuffer) -> ProtocolResult<()> {
        buf.send(value);
        Ok(())
    }
}

/// 128-bit UUID, most significant half first.
#[derive(Debug, Clone, Copy)]
pub struct UuidType;

impl WireType for UuidType {
    type Value = Uuid;

    fn read(buf: &mut PacketBuffer) -> ProtocolResult<Uuid> {
        Ok(Uuid::from_bytes(buf.read_array()?))
    }

    fn write(value: &Uuid, buf: &mut PacketBuffer) -> ProtocolResult<()> {
        buf.send(value.as_bytes());
        Ok(())
    }
}

/// Player UUID in Login Success: hyphenated text before 1.16, binary after.
#[derive(Debug, Clone, Copy)]
pub struct PlayerUuid;

/// First protocol sending Login Success UUIDs in binary form (20w12a).
pub const BINARY_PLAYER_UUID_SINCE: i32 = 707;

impl WireType for PlayerUuid {
    type Value = Uuid;

    fn read(buf: &mut PacketBuffer) -> ProtocolResult<Uuid> {
        UuidType::read(buf)
    }

    fn write(value: &Uuid, buf: &mut PacketBuffer) -> ProtocolResult<()> {
        UuidType::write(value, buf)
    }

    fn read_with_context(buf: &mut PacketBuffer, ctx: &Context) -> ProtocolResult<Uuid> {
        if ctx.protocol_later_eq(BINARY_PLAYER_UUID_SINCE) {
            return UuidType::read(buf);
        }
        let text = McString::read(buf)?;
        Uuid::parse_str(&text).map_err(|e| ProtocolError::InvalidString {
            message: format!("bad UUID '{}': {}", text, e),
        })
    }

    fn write_with_context(
        value: &Uuid,
        buf: &mut PacketBuffer,
        ctx: &Context,
    ) -> ProtocolResult<()> {
        if ctx.protocol_later_eq(BINARY_PLAYER_UUID_SINCE) {
            return UuidType::write(value, buf);
        }
        write_str(&value.hyphenated().to_string(), buf)
    }
}

/// Keep-alive identifier: VarInt until 1.12.2, Long from then on.
#[derive(Debug, Clone, Copy)]
pub struct KeepAliveId;

/// First protocol with 64-bit keep-alive ids (1.12.2-pre).
pub const LONG_KEEP_ALIVE_SINCE: i32 = 339;

impl WireType for KeepAliveId {
    type Value = i64;

    fn read(buf: &mut PacketBuffer) -> ProtocolResult<i64> {
        Long::read(buf)
    }

    fn write(value: &i64, buf: &mut PacketBuffer) -> ProtocolResult<()> {
        Long::write(value, buf)
    }

    fn read_with_context(buf: &mut PacketBuffer, ctx: &Context) -> ProtocolResult<i64> {
        if ctx.protocol_later_eq(LONG_KEEP_ALIVE_SINCE) {
            Long::read(buf)
        } else {
            Ok(VarInt::read(buf)? as i64)
        }
    }

    fn write_with_context(value: &i64, buf: &mut PacketBuffer, ctx: &Context) -> ProtocolResult<()> {
        if ctx.protocol_later_eq(LONG_KEEP_ALIVE_SINCE) {
            Long::write(value, buf)
        } else {
            VarInt::write(&(*value as i32), buf)
        }
    }
}

/// A closed set of values carried by an integer codec.
pub trait WireEnum: Sized + Copy {
    type Repr: WireType;
    const NAME: &'static str;

    fn from_repr(value: <Self::Repr as WireType>::Value) -> Option<Self>;
    fn to_repr(self) -> <Self::Repr as WireType>::Value;
}

/// Read an enum value; anything outside the set is a protocol error.
pub fn read_enum<E>(buf: &mut PacketBuffer) -> ProtocolResult<E>
where
    E: WireEnum,
    <E::Repr as WireType>::Value: Copy + Into<i64>,
{
    let raw = E::Repr::read(buf)?;
    E::from_repr(raw).ok_or(ProtocolError::InvalidEnum {
        name: E::NAME,
        value: raw.into(),
    })
}

pub fn write_enum<E: WireEnum>(value: E, buf: &mut PacketBuffer) -> ProtocolResult<()> {
    E::Repr::write(&value.to_repr(), buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encoded(value: i32) -> Vec<u8> {
        let mut out = BytesMut::new();
        VarInt::encode(value, &mut out);
        out.to_vec()
    }

    #[test]
    fn test_var_int_known_values() {
        // Reference values from the protocol documentation.
        let cases: [(&[u8], i32); 11] = [
            (&[0x00], 0),
            (&[0x01], 1),
            (&[0x02], 2),
            (&[0x7f], 127),
            (&[0x80, 0x01], 128),
            (&[0xff, 0x01], 255),
            (&[0xdd, 0xc7, 0x01], 25565),
            (&[0xff, 0xff, 0x7f], 2097151),
            (&[0xff, 0xff, 0xff, 0xff, 0x07], 2147483647),
            (&[0xff, 0xff, 0xff, 0xff, 0x0f], -1),
            (&[0x80, 0x80, 0x80, 0x80, 0x08], -2147483648),
        ];

        for (sample, expected) in cases {
            let mut buf = PacketBuffer::from(sample);
            assert_eq!(VarInt::read(&mut buf).unwrap(), expected);
            assert!(buf.is_eof());
            assert_eq!(encoded(expected), sample);
            assert_eq!(VarInt::size(expected), sample.len());
        }
    }

    #[test]
    fn test_var_int_sixth_byte_fails() {
        let mut buf = PacketBuffer::from(&[0x80u8, 0x80, 0x80, 0x80, 0x80, 0x01][..]);
        assert!(matches!(
            VarInt::read(&mut buf),
            Err(ProtocolError::VarIntTooLong { .. })
        ));
        assert!(matches!(
            VarInt::peek(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01]),
            Err(ProtocolError::VarIntTooLong { .. })
        ));
    }

    #[test]
    fn test_var_int_peek_partial() {
        assert_eq!(VarInt::peek(&[]).unwrap(), None);
        assert_eq!(VarInt::peek(&[0x80, 0x80]).unwrap(), None);
        assert_eq!(VarInt::peek(&[0xdd, 0xc7, 0x01, 0xff]).unwrap(), Some((25565, 3)));
    }

    #[test]
    fn test_string_too_long_rejected() {
        let long = "a".repeat(MAX_STRING_LENGTH + 1);
        let mut buf = PacketBuffer::new();
        assert!(matches!(
            write_str(&long, &mut buf),
            Err(ProtocolError::StringTooLong { .. })
        ));
        assert!(buf.is_empty());

        let max = "a".repeat(MAX_STRING_LENGTH);
        write_str(&max, &mut buf).unwrap();
        assert_eq!(McString::read(&mut buf).unwrap().len(), MAX_STRING_LENGTH);
    }

    #[test]
    fn test_string_truncated_is_error() {
        let mut buf = PacketBuffer::from(&[0x05u8, b'a', b'b'][..]);
        assert!(matches!(
            McString::read(&mut buf),
            Err(ProtocolError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_boolean_rejects_other_values() {
        let mut buf = PacketBuffer::from(&[0x01u8, 0x00, 0x02][..]);
        assert!(Boolean::read(&mut buf).unwrap());
        assert!(!Boolean::read(&mut buf).unwrap());
        assert!(Boolean::read(&mut buf).is_err());
    }

    #[test]
    fn test_keep_alive_id_depends_on_version() {
        let old = Context::new(335);
        let new = Context::new(340);

        let mut buf = PacketBuffer::new();
        KeepAliveId::write_with_context(&1234, &mut buf, &old).unwrap();
        assert_eq!(buf.len(), 2);
        assert_eq!(KeepAliveId::read_with_context(&mut buf, &old).unwrap(), 1234);

        let mut buf = PacketBuffer::new();
        KeepAliveId::write_with_context(&1234, &mut buf, &new).unwrap();
        assert_eq!(buf.len(), 8);
        assert_eq!(KeepAliveId::read_with_context(&mut buf, &new).unwrap(), 1234);
    }

    #[test]
    fn test_player_uuid_depends_on_version() {
        let id = Uuid::parse_str("069a79f4-44e9-4726-a5be-fca90e38aaf5").unwrap();

        let mut buf = PacketBuffer::new();
        PlayerUuid::write_with_context(&id, &mut buf, &Context::new(578)).unwrap();
        assert_eq!(buf.len(), 37);
        assert_eq!(
            PlayerUuid::read_with_context(&mut buf, &Context::new(578)).unwrap(),
            id
        );

        let mut buf = PacketBuffer::new();
        PlayerUuid::write_with_context(&id, &mut buf, &Context::new(754)).unwrap();
        assert_eq!(buf.len(), 16);
        assert_eq!(
            PlayerUuid::read_with_context(&mut buf, &Context::new(754)).unwrap(),
            id
        );
    }

    proptest! {
        #[test]
        fn prop_var_int_round_trip(n in any::<u32>()) {
            let bytes = encoded(n as i32);
            prop_assert!(bytes.len() <= VARINT_MAX_BYTES);
            prop_assert_eq!(VarInt::size(n as i32), bytes.len());
            prop_assert_eq!(VarInt::peek(&bytes).unwrap(), Some((n as i32, bytes.len())));

            let mut buf = PacketBuffer::from(&bytes[..]);
            prop_assert_eq!(VarInt::read(&mut buf).unwrap() as u32, n);
            prop_assert!(buf.is_eof());
        }

        #[test]
        fn prop_var_int_peek_waits_on_any_prefix(n in any::<u32>()) {
            let bytes = encoded(n as i32);
            for end in 0..bytes.len() {
                prop_assert_eq!(VarInt::peek(&bytes[..end]).unwrap(), None);
            }
        }

        #[test]
        fn prop_string_round_trip(s in "\\PC{0,512}") {
            let mut buf = PacketBuffer::new();
            write_str(&s, &mut buf).unwrap();
            prop_assert_eq!(McString::read(&mut buf).unwrap(), s);
            prop_assert!(buf.is_eof());
        }
    }
}
