//! Cryptographic hash primitives.
//!
//! All digests speak the same incremental contract: absorb arbitrary byte
//! sequences with [`Digest::update`], then emit a fixed-size digest with
//! [`Digest::finish`], which also returns the context to its initial
//! state. The digest over a byte sequence never depends on how the
//! sequence was split across `update` calls.
//!
//! | Module | Algorithms |
//! |--------|------------|
//! | [`sha2`]      | SHA-256, SHA-512 (FIPS 180-4) |
//! | [`keccak`]    | Keccak-224/256/288/384/512 (original pad, pre-NIST) |
//! | [`threefish`] | Threefish-256/512/1024 tweakable block cipher |
//! | [`skein`]     | Skein-256/512/1024 (UBI over Threefish) |

pub mod keccak;
pub mod sha2;
pub mod skein;
pub mod threefish;

pub use keccak::Keccak;
pub use sha2::{Sha256, Sha512};
pub use skein::Skein;
pub use threefish::Threefish;

use crate::{Error, Result};

/// Incremental hash function.
///
/// `finish` writes exactly [`digest_size`](Digest::digest_size) bytes at
/// the start of `out` and resets the context, so one instance can hash
/// any number of messages back to back.
pub trait Digest: Send {
    /// Absorb `data`; may be called any number of times.
    fn update(&mut self, data: &[u8]);

    /// Emit the digest into `out` and reset the context.
    ///
    /// Returns the number of bytes written. Fails with
    /// [`Error::BufferTooShort`] if `out` cannot hold the digest.
    fn finish(&mut self, out: &mut [u8]) -> Result<usize>;

    /// Discard buffered input and restore the initial state.
    fn reset(&mut self);

    /// Input block size in bytes (the HMAC pad width).
    fn block_size(&self) -> usize;

    /// Output size in bytes.
    fn digest_size(&self) -> usize;
}

/// Convenience: hash `data` in one call.
pub fn hash(kind: DigestKind, data: &[u8]) -> Vec<u8> {
    let mut d = kind.instantiate();
    let mut out = vec![0u8; d.digest_size()];
    d.update(data);
    d.finish(&mut out)
        .expect("output sized to digest_size");
    out
}

/// Selector for the supported digest algorithms.
///
/// The wire value is used by the cipher description record; `0` is
/// reserved there for "no digest".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DigestKind {
    Sha256 = 1,
    Sha512 = 2,
    Keccak256 = 3,
    Keccak512 = 4,
    Skein256 = 5,
    Skein512 = 6,
    Skein1024 = 7,
}

impl TryFrom<u8> for DigestKind {
    type Error = Error;
    fn try_from(v: u8) -> Result<Self> {
        match v {
            1 => Ok(Self::Sha256),
            2 => Ok(Self::Sha512),
            3 => Ok(Self::Keccak256),
            4 => Ok(Self::Keccak512),
            5 => Ok(Self::Skein256),
            6 => Ok(Self::Skein512),
            7 => Ok(Self::Skein1024),
            _ => Err(Error::InvalidArgument("unknown digest identifier")),
        }
    }
}

impl DigestKind {
    /// Construct a fresh context for this algorithm.
    pub fn instantiate(self) -> Box<dyn Digest> {
        match self {
            Self::Sha256 => Box::new(Sha256::new()),
            Self::Sha512 => Box::new(Sha512::new()),
            Self::Keccak256 => Box::new(Keccak::new(256).expect("valid digest size")),
            Self::Keccak512 => Box::new(Keccak::new(512).expect("valid digest size")),
            Self::Skein256 => Box::new(Skein::new(256, 256).expect("valid state size")),
            Self::Skein512 => Box::new(Skein::new(512, 512).expect("valid state size")),
            Self::Skein1024 => Box::new(Skein::new(1024, 1024).expect("valid state size")),
        }
    }

    /// Output size in bytes, without instantiating.
    pub fn digest_size(self) -> usize {
        match self {
            Self::Sha256 | Self::Keccak256 | Self::Skein256 => 32,
            Self::Sha512 | Self::Keccak512 | Self::Skein512 => 64,
            Self::Skein1024 => 128,
        }
    }

    /// Input block size in bytes, without instantiating.
    pub fn block_size(self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Sha512 => 128,
            Self::Keccak256 => 136,
            Self::Keccak512 => 72,
            Self::Skein256 => 32,
            Self::Skein512 => 64,
            Self::Skein1024 => 128,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_wire_value() {
        for v in 1u8..=7 {
            let kind = DigestKind::try_from(v).unwrap();
            assert_eq!(kind as u8, v);
        }
        assert!(DigestKind::try_from(0).is_err());
        assert!(DigestKind::try_from(8).is_err());
    }

    #[test]
    fn one_shot_hash_matches_incremental() {
        let data = b"one-shot versus incremental";
        for v in 1u8..=7 {
            let kind = DigestKind::try_from(v).unwrap();
            let mut d = kind.instantiate();
            let mut expected = vec![0u8; d.digest_size()];
            d.update(&data[..10]);
            d.update(&data[10..]);
            d.finish(&mut expected).unwrap();
            assert_eq!(hash(kind, data), expected, "{kind:?}");
        }
    }

    #[test]
    fn declared_sizes_match_instances() {
        for v in 1u8..=7 {
            let kind = DigestKind::try_from(v).unwrap();
            let d = kind.instantiate();
            assert_eq!(d.digest_size(), kind.digest_size());
            assert_eq!(d.block_size(), kind.block_size());
        }
    }
}
