//! Login encryption: shared secret, RSA wrapping, server hash and the
//! AES/CFB8 stream cipher.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::Aes128;
use rand::RngCore;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use sha1::{Digest, Sha1};

use crate::common::error::{ProtocolError, ProtocolResult};

/// Length of the AES-128 shared secret in bytes.
pub const SHARED_SECRET_LENGTH: usize = 16;

type Aes128Cfb8Enc = cfb8::Encryptor<Aes128>;
type Aes128Cfb8Dec = cfb8::Decryptor<Aes128>;

/// Fresh random secret for one connection.
pub fn generate_shared_secret() -> [u8; SHARED_SECRET_LENGTH] {
    let mut secret = [0u8; SHARED_SECRET_LENGTH];
    rand::thread_rng().fill_bytes(&mut secret);
    secret
}

/// Encrypt the verify token and the shared secret with the server's key.
///
/// Returns `(encrypted_token, encrypted_secret)`.
pub fn encrypt_token_and_secret(
    public_key_der: &[u8],
    verify_token: &[u8],
    shared_secret: &[u8],
) -> ProtocolResult<(Vec<u8>, Vec<u8>)> {
    let key = RsaPublicKey::from_public_key_der(public_key_der).map_err(|e| {
        ProtocolError::Encryption {
            message: format!("bad server public key: {}", e),
        }
    })?;

    let mut rng = rand::thread_rng();
    let mut encrypt = |data: &[u8]| {
        key.encrypt(&mut rng, Pkcs1v15Encrypt, data)
            .map_err(|e| ProtocolError::Encryption {
                message: e.to_string(),
            })
    };

    let token = encrypt(verify_token)?;
    let secret = encrypt(shared_secret)?;
    Ok((token, secret))
}

/// Server hash sent to the session server when joining.
pub fn generate_verification_hash(
    server_id: &str,
    shared_secret: &[u8],
    public_key_der: &[u8],
) -> String {
    let mut hasher = Sha1::new();
    hasher.update(server_id.as_bytes());
    hasher.update(shared_secret);
    hasher.update(public_key_der);
    minecraft_sha1_hexdigest(&hasher.finalize())
}

/// Render a SHA-1 digest as a signed big integer in hex, the way the
/// session server expects it.
pub fn minecraft_sha1_hexdigest(digest: &[u8]) -> String {
    let negative = digest.first().is_some_and(|b| b & 0x80 != 0);
    let mut bytes = digest.to_vec();

    if negative {
        // two's complement
        let mut carry = true;
        for byte in bytes.iter_mut().rev() {
            *byte = !*byte;
            if carry {
                let (value, overflow) = byte.overflowing_add(1);
                *byte = value;
                carry = overflow;
            }
        }
    }

    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    let trimmed = match hex.trim_start_matches('0') {
        "" => "0",
        rest => rest,
    };

    if negative {
        format!("-{}", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Outbound half of the stream cipher.
pub struct StreamEncryptor(Aes128Cfb8Enc);

/// Inbound half of the stream cipher.
pub struct StreamDecryptor(Aes128Cfb8Dec);

impl StreamEncryptor {
    pub fn apply(&mut self, data: &mut [u8]) {
        for byte in data.chunks_mut(1) {
            self.0.encrypt_block_mut(GenericArray::from_mut_slice(byte));
        }
    }
}

impl StreamDecryptor {
    pub fn apply(&mut self, data: &mut [u8]) {
        for byte in data.chunks_mut(1) {
            self.0.decrypt_block_mut(GenericArray::from_mut_slice(byte));
        }
    }
}

impl std::fmt::Debug for StreamEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StreamEncryptor")
    }
}

impl std::fmt::Debug for StreamDecryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StreamDecryptor")
    }
}

/// Build both cipher halves; key and IV are the shared secret.
pub fn stream_cipher(shared_secret: &[u8]) -> ProtocolResult<(StreamEncryptor, StreamDecryptor)> {
    let invalid = |e: aes::cipher::InvalidLength| ProtocolError::Encryption {
        message: format!("bad shared secret: {}", e),
    };
    let encryptor = Aes128Cfb8Enc::new_from_slices(shared_secret, shared_secret).map_err(invalid)?;
    let decryptor = Aes128Cfb8Dec::new_from_slices(shared_secret, shared_secret).map_err(invalid)?;
    Ok((StreamEncryptor(encryptor), StreamDecryptor(decryptor)))
}
