//! Frame codec: length prefix, optional zlib compression and the optional
//! stream cipher.

use std::io::{Read, Write};

use bytes::{Buf, Bytes, BytesMut};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Encoder, Framed};
use tracing::debug;

use crate::common::error::{ProtocolError, ProtocolResult};
use crate::protocol::buffer::PacketBuffer;
use crate::protocol::encryption::{stream_cipher, StreamDecryptor, StreamEncryptor};
use crate::protocol::types::{read_length, VarInt};

/// Largest frame a three-byte VarInt length can describe.
pub const MAX_FRAME_LENGTH: usize = (1 << 21) - 1;

/// Largest body a compressed frame may inflate to.
pub const MAX_DECOMPRESSED_LENGTH: usize = 1 << 23;

/// Per-connection transport state changed by the reactors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportOptions {
    pub compression_enabled: bool,
    pub compression_threshold: i32,
}

/// Codec turning packet bodies (`[VarInt id][fields]`) into frames and back.
#[derive(Debug, Default)]
pub struct MinecraftCodec {
    options: TransportOptions,
    encryptor: Option<StreamEncryptor>,
    decryptor: Option<StreamDecryptor>,
    /// Prefix of the read buffer already run through the decryptor.
    decrypted_upto: usize,
}

impl MinecraftCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(&self) -> TransportOptions {
        self.options
    }

    pub fn is_encrypted(&self) -> bool {
        self.encryptor.is_some()
    }

    /// Arm compression. A negative threshold switches it off.
    pub fn enable_compression(&mut self, threshold: i32) {
        self.options = TransportOptions {
            compression_enabled: threshold >= 0,
            compression_threshold: threshold,
        };
        debug!("Compression threshold set to {}", threshold);
    }

    /// Wrap both directions in the stream cipher. Happens once per
    /// connection; every byte not yet decoded is treated as ciphertext.
    pub fn enable_encryption(&mut self, shared_secret: &[u8]) -> ProtocolResult<()> {
        if self.is_encrypted() {
            return Err(ProtocolError::Encryption {
                message: "encryption is already enabled".to_string(),
            });
        }
        let (encryptor, decryptor) = stream_cipher(shared_secret)?;
        self.encryptor = Some(encryptor);
        self.decryptor = Some(decryptor);
        self.decrypted_upto = 0;
        debug!("Stream encryption enabled");
        Ok(())
    }

    fn decompress(&self, frame: Bytes) -> ProtocolResult<Bytes> {
        let mut buf = PacketBuffer::from(frame);
        let declared = read_length(&mut buf, "uncompressed length")?;
        if declared == 0 {
            return Ok(buf.read_remaining());
        }
        if declared > MAX_DECOMPRESSED_LENGTH {
            return Err(ProtocolError::FrameTooLarge {
                length: declared,
                max: MAX_DECOMPRESSED_LENGTH,
            });
        }

        let compressed = buf.read_remaining();
        let mut inflated = Vec::with_capacity(declared);
        ZlibDecoder::new(&compressed[..])
            .take(declared as u64 + 1)
            .read_to_end(&mut inflated)
            .map_err(|e| ProtocolError::Compression {
                message: e.to_string(),
            })?;

        if inflated.len() != declared {
            return Err(ProtocolError::DecompressedLengthMismatch {
                declared,
                actual: inflated.len(),
            });
        }
        Ok(Bytes::from(inflated))
    }

    fn compress(&self, body: Bytes) -> ProtocolResult<BytesMut> {
        let mut payload = BytesMut::new();
        if (body.len() as i64) < self.options.compression_threshold as i64 {
            VarInt::encode(0, &mut payload);
            payload.extend_from_slice(&body);
            return Ok(payload);
        }

        let failed = |e: std::io::Error| ProtocolError::Compression {
            message: e.to_string(),
        };
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&body).map_err(failed)?;
        let compressed = encoder.finish().map_err(failed)?;

        VarInt::encode(body.len() as i32, &mut payload);
        payload.extend_from_slice(&compressed);
        Ok(payload)
    }
}

impl Decoder for MinecraftCodec {
    type Item = Bytes;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(decryptor) = self.decryptor.as_mut() {
            if self.decrypted_upto < src.len() {
                decryptor.apply(&mut src[self.decrypted_upto..]);
                self.decrypted_upto = src.len();
            }
        }

        let Some((length, header)) = VarInt::peek(&src[..])? else {
            return Ok(None);
        };
        let length = usize::try_from(length).map_err(|_| ProtocolError::NegativeLength {
            what: "frame",
            length,
        })?;
        if length > MAX_FRAME_LENGTH {
            return Err(ProtocolError::FrameTooLarge {
                length,
                max: MAX_FRAME_LENGTH,
            });
        }

        if src.len() < header + length {
            src.reserve(header + length - src.len());
            return Ok(None);
        }

        src.advance(header);
        let frame = src.split_to(length).freeze();
        self.decrypted_upto = self.decrypted_upto.saturating_sub(header + length);

        if self.options.compression_enabled {
            self.decompress(frame).map(Some)
        } else {
            Ok(Some(frame))
        }
    }
}

impl Encoder<Bytes> for MinecraftCodec {
    type Error = ProtocolError;

    fn encode(&mut self, body: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = if self.options.compression_enabled {
            self.compress(body)?
        } else {
            BytesMut::from(&body[..])
        };

        if payload.len() > MAX_FRAME_LENGTH {
            return Err(ProtocolError::FrameTooLarge {
                length: payload.len(),
                max: MAX_FRAME_LENGTH,
            });
        }

        let start = dst.len();
        dst.reserve(VarInt::size(payload.len() as i32) + payload.len());
        VarInt::encode(payload.len() as i32, dst);
        dst.extend_from_slice(&payload);

        if let Some(encryptor) = self.encryptor.as_mut() {
            encryptor.apply(&mut dst[start..]);
        }
        Ok(())
    }
}

/// A framed game server connection.
pub type MinecraftStream<S> = Framed<S, MinecraftCodec>;

/// Create a new framed connection from a stream.
pub fn new_connection<S: AsyncRead + AsyncWrite>(stream: S) -> MinecraftStream<S> {
    Framed::new(stream, MinecraftCodec::new())
}
