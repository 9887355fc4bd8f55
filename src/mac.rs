//! HMAC and the stream MAC built on it.
//!
//! The canonical construction over any [`Digest`]: the key is pre-hashed
//! if longer than the digest block, zero-padded to block size, and XORed
//! with the 0x36/0x5C pads. [`StreamMac`] feeds a reader through HMAC in
//! digest-block chunks; the tag never depends on chunk boundaries.

use std::io::Read;

use zeroize::Zeroizing;

use crate::digest::{Digest, DigestKind};
use crate::utils::check_capacity;
use crate::Result;

const IPAD: u8 = 0x36;
const OPAD: u8 = 0x5C;

pub struct Hmac {
    digest: Box<dyn Digest>,
    /// Key zero-padded to the digest block size.
    key_block: Zeroizing<Vec<u8>>,
}

impl Hmac {
    /// Key an HMAC over the given digest algorithm.
    pub fn new(kind: DigestKind, key: &[u8]) -> Self {
        let mut digest = kind.instantiate();
        let block = digest.block_size();

        let mut key_block = Zeroizing::new(vec![0u8; block]);
        if key.len() > block {
            digest.update(key);
            digest
                .finish(&mut key_block[..kind.digest_size()])
                .expect("block exceeds digest size");
        } else {
            key_block[..key.len()].copy_from_slice(key);
        }

        let mut hmac = Self { digest, key_block };
        hmac.begin();
        hmac
    }

    /// Start the inner hash: digest(key ^ ipad || ...).
    fn begin(&mut self) {
        let pad: Zeroizing<Vec<u8>> =
            Zeroizing::new(self.key_block.iter().map(|b| b ^ IPAD).collect());
        self.digest.update(&pad);
    }

    /// Absorb message bytes.
    pub fn update(&mut self, data: &[u8]) {
        self.digest.update(data);
    }

    /// Emit the tag and re-key for the next message.
    ///
    /// Returns the number of bytes written ([`tag_size`](Self::tag_size)).
    pub fn finish(&mut self, out: &mut [u8]) -> Result<usize> {
        let size = self.digest.digest_size();
        check_capacity(out, size)?;

        let mut inner = Zeroizing::new(vec![0u8; size]);
        self.digest.finish(&mut inner)?;

        let pad: Zeroizing<Vec<u8>> =
            Zeroizing::new(self.key_block.iter().map(|b| b ^ OPAD).collect());
        self.digest.update(&pad);
        self.digest.update(&inner);
        self.digest.finish(&mut out[..size])?;

        self.begin();
        Ok(size)
    }

    /// Discard the current message and re-key.
    pub fn reset(&mut self) {
        self.digest.reset();
        self.begin();
    }

    /// Tag size in bytes (the digest size).
    pub fn tag_size(&self) -> usize {
        self.digest.digest_size()
    }

    /// Underlying digest block size in bytes.
    pub fn block_size(&self) -> usize {
        self.digest.block_size()
    }
}

/// Computes an HMAC tag over an entire byte stream.
pub struct StreamMac {
    hmac: Hmac,
}

impl StreamMac {
    pub fn new(kind: DigestKind, key: &[u8]) -> Self {
        Self {
            hmac: Hmac::new(kind, key),
        }
    }

    /// Read `source` to the end and return the tag over everything read.
    pub fn compute<R: Read>(&mut self, source: &mut R) -> Result<Vec<u8>> {
        let mut chunk = Zeroizing::new(vec![0u8; self.hmac.block_size()]);
        loop {
            let n = source.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            self.hmac.update(&chunk[..n]);
        }
        let mut tag = vec![0u8; self.hmac.tag_size()];
        self.hmac.finish(&mut tag)?;
        Ok(tag)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use hex_literal::hex;

    use super::*;

    fn tag(kind: DigestKind, key: &[u8], data: &[u8]) -> Vec<u8> {
        let mut h = Hmac::new(kind, key);
        h.update(data);
        let mut out = vec![0u8; h.tag_size()];
        h.finish(&mut out).unwrap();
        out
    }

    // RFC 4231 test case 1.
    #[test]
    fn rfc4231_case1() {
        let key = [0x0Bu8; 20];
        let data = b"Hi There";
        assert_eq!(
            tag(DigestKind::Sha256, &key, data),
            hex!("b0344c61d8db38535ca8afceaf0bf12b881dc200c9833da726e9376c2e32cff7")
        );
        assert_eq!(
            tag(DigestKind::Sha512, &key, data),
            hex!(
                "87aa7cdea5ef619d4ff0b4241a1d6cb02379f4e2ce4ec2787ad0b30545e17cde"
                "daa833b7d6b8a702038b274eaea3f4e4be9d914eeb61f1702e696c203a126854"
            )
        );
    }

    // RFC 4231 test case 2 ("Jefe").
    #[test]
    fn rfc4231_case2() {
        assert_eq!(
            tag(DigestKind::Sha256, b"Jefe", b"what do ya want for nothing?"),
            hex!("5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843")
        );
    }

    // RFC 4231 test case 3: 20 bytes of 0xAA, 50 bytes of 0xDD.
    #[test]
    fn rfc4231_case3() {
        assert_eq!(
            tag(DigestKind::Sha256, &[0xAA; 20], &[0xDD; 50]),
            hex!("773ea91e36800e46854db8ebd09181a72959098b3ef8c122d9635514ced565fe")
        );
    }

    #[test]
    fn long_key_is_prehashed() {
        let key = [0xAAu8; 131];
        // RFC 4231 test case 6.
        assert_eq!(
            tag(
                DigestKind::Sha256,
                &key,
                b"Test Using Larger Than Block-Size Key - Hash Key First"
            ),
            hex!("60e431591ee0b67f0d8a26aacbf5b77f8e0bc6213728c5140546040f0ee37f54")
        );
    }

    #[test]
    fn finish_rekeys_for_next_message() {
        let mut h = Hmac::new(DigestKind::Sha256, b"key");
        let mut a = vec![0u8; 32];
        let mut b = vec![0u8; 32];
        h.update(b"message");
        h.finish(&mut a).unwrap();
        h.update(b"message");
        h.finish(&mut b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn reset_discards_partial_message() {
        let mut h = Hmac::new(DigestKind::Sha256, b"key");
        h.update(b"garbage that should vanish");
        h.reset();
        h.update(b"message");
        let mut after_reset = vec![0u8; 32];
        h.finish(&mut after_reset).unwrap();
        assert_eq!(after_reset, tag(DigestKind::Sha256, b"key", b"message"));
    }

    #[test]
    fn stream_mac_ignores_chunk_boundaries() {
        let data: Vec<u8> = (0u16..5000).map(|i| (i % 251) as u8).collect();
        let expected = tag(DigestKind::Sha512, b"stream key", &data);

        let mut mac = StreamMac::new(DigestKind::Sha512, b"stream key");
        let got = mac.compute(&mut Cursor::new(&data)).unwrap();
        assert_eq!(got, expected);

        // A reader that trickles one byte at a time.
        struct Trickle<'a>(&'a [u8]);
        impl Read for Trickle<'_> {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if self.0.is_empty() || buf.is_empty() {
                    return Ok(0);
                }
                buf[0] = self.0[0];
                self.0 = &self.0[1..];
                Ok(1)
            }
        }
        let mut mac = StreamMac::new(DigestKind::Sha512, b"stream key");
        let got = mac.compute(&mut Trickle(&data)).unwrap();
        assert_eq!(got, expected);
    }

    #[test]
    fn works_over_every_digest() {
        for v in 1u8..=7 {
            let kind = DigestKind::try_from(v).unwrap();
            let t = tag(kind, b"k", b"m");
            assert_eq!(t.len(), kind.digest_size());
        }
    }
}
