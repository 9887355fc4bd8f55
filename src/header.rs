//! The message header framing a ciphertext.
//!
//! ## On-wire layout
//! ```text
//! offset  size  field
//! 0       16    key_fingerprint
//! 16      16    encrypted_extension (XOR pad, key-bound)
//! 32      T     mac_tag             (T = description mac_size; may be 0)
//! 32+T    ..    ciphertext
//! ```
//!
//! The extension field carries the original file extension obfuscated
//! with a 16-byte pad derived from the session key and the fingerprint
//! through the description's KDF digest, so only a holder of the key
//! material recovers it.

use std::io::{Read, Write};

use zeroize::Zeroizing;

use crate::digest::DigestKind;
use crate::utils::bytesa;
use crate::{Error, Result};

/// Bytes before the MAC tag slot.
pub const HEADER_PREFIX_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    /// Identifier the key store resolves to key material.
    pub key_fingerprint: [u8; 16],
    /// XOR-obfuscated file extension.
    pub encrypted_extension: [u8; 16],
    /// Tag over the ciphertext body; empty when unsigned.
    pub mac_tag: Vec<u8>,
}

impl MessageHeader {
    /// Total serialized size for a given tag size.
    pub fn len(mac_size: usize) -> usize {
        HEADER_PREFIX_LEN + mac_size
    }

    /// Read a header expecting `mac_size` tag bytes.
    pub fn read_from<R: Read>(r: &mut R, mac_size: usize) -> Result<Self> {
        let key_fingerprint = bytesa::<16>(r)?;
        let encrypted_extension = bytesa::<16>(r)?;
        let mut mac_tag = vec![0u8; mac_size];
        r.read_exact(&mut mac_tag)?;
        Ok(Self {
            key_fingerprint,
            encrypted_extension,
            mac_tag,
        })
    }

    /// Write the 32-byte prefix followed by the tag.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.key_fingerprint)?;
        w.write_all(&self.encrypted_extension)?;
        w.write_all(&self.mac_tag)?;
        Ok(())
    }

    /// Recover the plaintext extension with the key-derived pad.
    pub fn extension(&self, pad: &[u8; 16]) -> String {
        let mut clear = Zeroizing::new([0u8; 16]);
        for i in 0..16 {
            clear[i] = self.encrypted_extension[i] ^ pad[i];
        }
        let end = clear.iter().position(|&b| b == 0).unwrap_or(16);
        String::from_utf8_lossy(&clear[..end]).into_owned()
    }
}

/// Derive the 16-byte extension pad from the session key and the
/// fingerprint.
pub fn extension_pad(kdf: DigestKind, key: &[u8], fingerprint: &[u8; 16]) -> [u8; 16] {
    let mut digest = kdf.instantiate();
    digest.update(key);
    digest.update(fingerprint);
    let mut out = Zeroizing::new(vec![0u8; digest.digest_size()]);
    digest
        .finish(&mut out)
        .expect("output sized to digest_size");
    let mut pad = [0u8; 16];
    pad.copy_from_slice(&out[..16]);
    pad
}

/// Obfuscate a plaintext extension (at most 16 bytes) with the pad.
pub fn obfuscate_extension(extension: &str, pad: &[u8; 16]) -> Result<[u8; 16]> {
    if extension.len() > 16 {
        return Err(Error::InvalidArgument("extension longer than 16 bytes"));
    }
    let mut out = [0u8; 16];
    out[..extension.len()].copy_from_slice(extension.as_bytes());
    for (o, p) in out.iter_mut().zip(pad.iter()) {
        *o ^= p;
    }
    Ok(out)
}
