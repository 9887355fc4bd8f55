//! The cipher description record: everything needed to reconstruct a
//! transform, in a fixed 16-byte little-endian layout.
//!
//! ## Record layout
//! ```text
//! offset  size  field
//! 0       1     engine
//! 1       2     key_size (bytes, u16 LE)
//! 3       1     iv_size
//! 4       1     block_size
//! 5       1     rounds
//! 6       1     mode
//! 7       1     padding
//! 8       1     kdf_digest
//! 9       1     mac_engine (0 = none)
//! 10      2     mac_size (bytes, u16 LE)
//! 12      4     reserved
//! ```

use std::io::{Read, Write};

use crate::digest::DigestKind;
use crate::padding::PaddingKind;
use crate::utils::{bytesa, le_u16, u8 as read_u8};
use crate::{Error, Result};

/// Serialized size of a description record.
pub const DESCRIPTION_LEN: usize = 16;

/// The symmetric engines a description can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CipherEngine {
    /// Rijndael/AES with its native key schedule.
    Rdx = 1,
    /// Serpent with its native key schedule.
    Serpent = 2,
    /// Twofish with its native key schedule.
    Twofish = 3,
    /// Rijndael with the extended KDF key schedule.
    Rhx = 4,
    /// Serpent with the extended KDF key schedule.
    Shx = 5,
    /// Twofish with the extended KDF key schedule.
    Thx = 6,
    /// Rijndael driven as a segmented-counter stream module.
    Rsm = 7,
    /// Twofish driven as a segmented-counter stream module.
    Tsm = 8,
    /// ChaCha20 stream cipher.
    ChaCha = 9,
    /// Salsa20 stream cipher.
    Salsa = 10,
}

impl TryFrom<u8> for CipherEngine {
    type Error = Error;
    fn try_from(v: u8) -> Result<Self> {
        match v {
            1 => Ok(Self::Rdx),
            2 => Ok(Self::Serpent),
            3 => Ok(Self::Twofish),
            4 => Ok(Self::Rhx),
            5 => Ok(Self::Shx),
            6 => Ok(Self::Thx),
            7 => Ok(Self::Rsm),
            8 => Ok(Self::Tsm),
            9 => Ok(Self::ChaCha),
            10 => Ok(Self::Salsa),
            _ => Err(Error::InvalidArgument("unknown engine identifier")),
        }
    }
}

impl CipherEngine {
    /// Engines whose transform is a keystream rather than a block mode.
    pub fn is_stream(self) -> bool {
        matches!(self, Self::Rsm | Self::Tsm | Self::ChaCha | Self::Salsa)
    }
}

/// The block cipher chaining rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OperatingMode {
    /// Stream engines carry no mode.
    None = 0,
    Cbc = 1,
    Cfb = 2,
    Ofb = 3,
    Ctr = 4,
}

impl TryFrom<u8> for OperatingMode {
    type Error = Error;
    fn try_from(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Self::None),
            1 => Ok(Self::Cbc),
            2 => Ok(Self::Cfb),
            3 => Ok(Self::Ofb),
            4 => Ok(Self::Ctr),
            _ => Err(Error::InvalidArgument("unknown mode identifier")),
        }
    }
}

impl OperatingMode {
    /// Modes whose final region is padded rather than truncated.
    pub fn uses_padding(self) -> bool {
        matches!(self, Self::Cbc | Self::Cfb)
    }
}

/// A value record that fully parameterizes a transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherDescription {
    pub engine: CipherEngine,
    /// Key size in bytes.
    pub key_size: u16,
    /// IV/nonce size in bytes: 8, 16, or 32.
    pub iv_size: u8,
    /// Cipher block size in bytes: 16 or 32.
    pub block_size: u8,
    pub rounds: u8,
    pub mode: OperatingMode,
    pub padding: PaddingKind,
    /// Digest expanding the extended key schedules.
    pub kdf_digest: DigestKind,
    /// Digest keyed for the message MAC, if any.
    pub mac_engine: Option<DigestKind>,
    /// MAC tag size in bytes: 0, 32, 64, or 128.
    pub mac_size: u16,
}

impl CipherDescription {
    /// A ready-made AES-256-CTR description with a SHA-512 HMAC tag.
    pub fn aes256_ctr_hmac512() -> Self {
        Self {
            engine: CipherEngine::Rdx,
            key_size: 32,
            iv_size: 16,
            block_size: 16,
            rounds: 14,
            mode: OperatingMode::Ctr,
            padding: PaddingKind::None,
            kdf_digest: DigestKind::Sha512,
            mac_engine: Some(DigestKind::Sha512),
            mac_size: 64,
        }
    }

    /// Check every field against its engine-specific domain.
    pub fn validate(&self) -> Result<()> {
        let key = self.key_size as usize;
        let rounds = self.rounds as usize;

        if !matches!(self.block_size, 16 | 32) {
            return Err(Error::InvalidArgument("block size must be 16 or 32"));
        }
        if matches!(
            self.engine,
            CipherEngine::Serpent
                | CipherEngine::Twofish
                | CipherEngine::Shx
                | CipherEngine::Thx
                | CipherEngine::Tsm
        ) && self.block_size != 16
        {
            return Err(Error::InvalidArgument("engine only supports 16-byte blocks"));
        }

        match self.engine {
            CipherEngine::Rdx | CipherEngine::Serpent | CipherEngine::Twofish => {
                if !matches!(key, 16 | 24 | 32) {
                    return Err(Error::InvalidArgument("native key must be 16/24/32 bytes"));
                }
            }
            CipherEngine::Rhx | CipherEngine::Shx | CipherEngine::Thx => {
                if !(64..=320).contains(&key) {
                    return Err(Error::InvalidArgument("extended key must be 64-320 bytes"));
                }
            }
            CipherEngine::Rsm | CipherEngine::Tsm => {
                if !matches!(key, 16 | 24 | 32) && !(64..=320).contains(&key) {
                    return Err(Error::InvalidArgument("stream module key out of range"));
                }
            }
            CipherEngine::ChaCha | CipherEngine::Salsa => {
                if !matches!(key, 16 | 32 | 48 | 56) {
                    return Err(Error::InvalidArgument("stream key must be 16/32/48/56 bytes"));
                }
            }
        }

        match self.engine {
            CipherEngine::Rdx => {
                if !matches!(rounds, 10 | 12 | 14) {
                    return Err(Error::InvalidArgument("AES rounds must be 10/12/14"));
                }
            }
            CipherEngine::Serpent => {
                if rounds != 32 {
                    return Err(Error::InvalidArgument("Serpent runs 32 rounds"));
                }
            }
            CipherEngine::Twofish => {
                if rounds != 16 {
                    return Err(Error::InvalidArgument("Twofish runs 16 rounds"));
                }
            }
            CipherEngine::Rhx | CipherEngine::Rsm => {
                if self.engine == CipherEngine::Rsm && matches!(key, 16 | 24 | 32) {
                    // Native schedule inside the stream module.
                } else if !(10..=38).contains(&rounds) || rounds % 2 != 0 {
                    return Err(Error::InvalidArgument("extended Rijndael rounds must be even, 10-38"));
                }
            }
            CipherEngine::Shx => {
                if !(32..=64).contains(&rounds) || rounds % 8 != 0 {
                    return Err(Error::InvalidArgument(
                        "extended Serpent rounds must be a multiple of 8, 32-64",
                    ));
                }
            }
            CipherEngine::Thx | CipherEngine::Tsm => {
                if self.engine == CipherEngine::Tsm && matches!(key, 16 | 24 | 32) {
                    // Native schedule inside the stream module.
                } else if !(16..=32).contains(&rounds) || rounds % 2 != 0 {
                    return Err(Error::InvalidArgument("extended Twofish rounds must be even, 16-32"));
                }
            }
            CipherEngine::ChaCha | CipherEngine::Salsa => {
                if !(8..=30).contains(&rounds) || rounds % 2 != 0 {
                    return Err(Error::InvalidArgument("stream rounds must be even, 8-30"));
                }
            }
        }

        // IV equals the block except for keystream nonces.
        match self.engine {
            CipherEngine::ChaCha | CipherEngine::Salsa => {
                if self.iv_size != 8 {
                    return Err(Error::InvalidArgument("stream nonce must be 8 bytes"));
                }
            }
            _ => {
                if self.iv_size != self.block_size {
                    return Err(Error::InvalidArgument("IV must equal the block size"));
                }
            }
        }

        if self.engine.is_stream() != (self.mode == OperatingMode::None) {
            return Err(Error::InvalidArgument(
                "mode None is for stream engines exactly",
            ));
        }

        match (self.mac_engine, self.mac_size) {
            (None, 0) => {}
            (None, _) => return Err(Error::InvalidArgument("mac size without mac engine")),
            (Some(_), 0) => return Err(Error::InvalidArgument("mac engine without mac size")),
            (Some(kind), size) => {
                if !matches!(size, 32 | 64 | 128) || kind.digest_size() != size as usize {
                    return Err(Error::InvalidArgument("mac size must match its digest"));
                }
            }
        }

        Ok(())
    }

    /// Serialize into the fixed 16-byte record.
    pub fn to_bytes(&self) -> [u8; DESCRIPTION_LEN] {
        let mut out = [0u8; DESCRIPTION_LEN];
        out[0] = self.engine as u8;
        out[1..3].copy_from_slice(&self.key_size.to_le_bytes());
        out[3] = self.iv_size;
        out[4] = self.block_size;
        out[5] = self.rounds;
        out[6] = self.mode as u8;
        out[7] = self.padding as u8;
        out[8] = self.kdf_digest as u8;
        out[9] = self.mac_engine.map_or(0, |d| d as u8);
        out[10..12].copy_from_slice(&self.mac_size.to_le_bytes());
        out
    }

    /// Write the 16-byte record.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.to_bytes())?;
        Ok(())
    }

    /// Read and validate a 16-byte record.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let engine = CipherEngine::try_from(read_u8(r)?)?;
        let key_size = le_u16(r)?;
        let iv_size = read_u8(r)?;
        let block_size = read_u8(r)?;
        let rounds = read_u8(r)?;
        let mode = OperatingMode::try_from(read_u8(r)?)?;
        let padding = PaddingKind::try_from(read_u8(r)?)?;
        let kdf_digest = DigestKind::try_from(read_u8(r)?)?;
        let mac_raw = read_u8(r)?;
        let mac_engine = if mac_raw == 0 {
            None
        } else {
            Some(DigestKind::try_from(mac_raw)?)
        };
        let mac_size = le_u16(r)?;
        let _reserved = bytesa::<4>(r)?;

        let desc = Self {
            engine,
            key_size,
            iv_size,
            block_size,
            rounds,
            mode,
            padding,
            kdf_digest,
            mac_engine,
            mac_size,
        };
        desc.validate()?;
        Ok(desc)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn sample() -> CipherDescription {
        CipherDescription::aes256_ctr_hmac512()
    }

    #[test]
    fn record_round_trips() {
        let desc = sample();
        desc.validate().unwrap();
        let bytes = desc.to_bytes();
        assert_eq!(bytes.len(), DESCRIPTION_LEN);
        let back = CipherDescription::read_from(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(back, desc);
    }

    #[test]
    fn stream_description_round_trips() {
        let desc = CipherDescription {
            engine: CipherEngine::ChaCha,
            key_size: 32,
            iv_size: 8,
            block_size: 16,
            rounds: 20,
            mode: OperatingMode::None,
            padding: PaddingKind::None,
            kdf_digest: DigestKind::Sha256,
            mac_engine: Some(DigestKind::Skein256),
            mac_size: 32,
        };
        desc.validate().unwrap();
        let back = CipherDescription::read_from(&mut Cursor::new(desc.to_bytes())).unwrap();
        assert_eq!(back, desc);
    }

    #[test]
    fn validation_rejects_bad_domains() {
        let mut d = sample();
        d.key_size = 20;
        assert!(d.validate().is_err());

        let mut d = sample();
        d.iv_size = 8;
        assert!(d.validate().is_err());

        let mut d = sample();
        d.rounds = 11;
        assert!(d.validate().is_err());

        let mut d = sample();
        d.mode = OperatingMode::None;
        assert!(d.validate().is_err());

        let mut d = sample();
        d.mac_size = 48;
        assert!(d.validate().is_err());

        let mut d = sample();
        d.mac_engine = None;
        assert!(d.validate().is_err());
        d.mac_size = 0;
        d.validate().unwrap();
    }

    #[test]
    fn extended_key_domains() {
        let d = CipherDescription {
            engine: CipherEngine::Rhx,
            key_size: 128,
            iv_size: 16,
            block_size: 16,
            rounds: 22,
            mode: OperatingMode::Cbc,
            padding: PaddingKind::Pkcs7,
            kdf_digest: DigestKind::Keccak512,
            mac_engine: None,
            mac_size: 0,
        };
        d.validate().unwrap();

        let mut bad = d.clone();
        bad.key_size = 32;
        assert!(bad.validate().is_err());
    }
}
