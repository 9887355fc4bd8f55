//! Keccak digests with the original (pre-NIST) padding rule.
//!
//! Digest sizes 224/256/288/384/512 bits select the rate/capacity split
//! 1152/1088/1024/832/576 against a 1600-bit state. Absorption keeps a
//! byte-aligned queue of `rate / 8` bytes; the final block is padded with
//! a single 1 bit after the message and a 1 bit in the last rate
//! position (`0x01 .. 0x80`), not the SHA-3 domain-separated variant.

use zeroize::Zeroize;

use crate::digest::Digest;
use crate::utils::check_capacity;
use crate::{Error, Result};

/// Round constants for the 24 rounds of Keccak-f[1600].
const ROUND_CONSTANTS: [u64; 24] = [
    0x0000000000000001, 0x0000000000008082, 0x800000000000808a, 0x8000000080008000,
    0x000000000000808b, 0x0000000080000001, 0x8000000080008081, 0x8000000000008009,
    0x000000000000008a, 0x0000000000000088, 0x0000000080008009, 0x000000008000000a,
    0x000000008000808b, 0x800000000000008b, 0x8000000000008089, 0x8000000000008003,
    0x8000000000008002, 0x8000000000000080, 0x000000000000800a, 0x800000008000000a,
    0x8000000080008081, 0x8000000000008080, 0x0000000080000001, 0x8000000080008008,
];

/// Rho rotation offsets, indexed by lane `x + 5y`.
const RHO_OFFSETS: [u32; 25] = [
    0, 1, 62, 28, 27, //
    36, 44, 6, 55, 20, //
    3, 10, 43, 25, 39, //
    41, 45, 15, 21, 8, //
    18, 2, 61, 56, 14,
];

/// Largest rate in bytes (224-bit digest).
const MAX_RATE: usize = 144;

/// Apply the 24-round Keccak-f[1600] permutation in place.
pub fn keccak_f1600(a: &mut [u64; 25]) {
    for &rc in &ROUND_CONSTANTS {
        // Theta
        let mut c = [0u64; 5];
        for x in 0..5 {
            c[x] = a[x] ^ a[x + 5] ^ a[x + 10] ^ a[x + 15] ^ a[x + 20];
        }
        for x in 0..5 {
            let d = c[(x + 4) % 5] ^ c[(x + 1) % 5].rotate_left(1);
            for y in 0..5 {
                a[x + 5 * y] ^= d;
            }
        }

        // Rho and Pi
        let mut b = [0u64; 25];
        for x in 0..5 {
            for y in 0..5 {
                let lane = x + 5 * y;
                b[y + 5 * ((2 * x + 3 * y) % 5)] = a[lane].rotate_left(RHO_OFFSETS[lane]);
            }
        }

        // Chi
        for y in 0..5 {
            for x in 0..5 {
                a[x + 5 * y] = b[x + 5 * y] ^ (!b[(x + 1) % 5 + 5 * y] & b[(x + 2) % 5 + 5 * y]);
            }
        }

        // Iota
        a[0] ^= rc;
    }
}

/// Keccak sponge with a parameterized digest size.
pub struct Keccak {
    state: [u64; 25],
    queue: [u8; MAX_RATE],
    queue_len: usize,
    rate: usize,
    digest_size: usize,
}

impl Keccak {
    /// Create a context for a digest of `bits` ∈ {224, 256, 288, 384, 512}.
    pub fn new(bits: usize) -> Result<Self> {
        match bits {
            224 | 256 | 288 | 384 | 512 => Ok(Self {
                state: [0; 25],
                queue: [0; MAX_RATE],
                queue_len: 0,
                rate: (1600 - 2 * bits) / 8,
                digest_size: bits / 8,
            }),
            _ => Err(Error::InvalidArgument("unsupported Keccak digest size")),
        }
    }

    fn absorb(&mut self, block: &[u8]) {
        debug_assert_eq!(block.len(), self.rate);
        for (lane, chunk) in self.state.iter_mut().zip(block.chunks_exact(8)) {
            *lane ^= u64::from_le_bytes(chunk.try_into().unwrap());
        }
        keccak_f1600(&mut self.state);
    }
}

impl Digest for Keccak {
    fn update(&mut self, mut data: &[u8]) {
        if self.queue_len > 0 {
            let take = data.len().min(self.rate - self.queue_len);
            self.queue[self.queue_len..self.queue_len + take].copy_from_slice(&data[..take]);
            self.queue_len += take;
            data = &data[take..];
            if self.queue_len == self.rate {
                let block = self.queue;
                self.absorb(&block[..self.rate]);
                self.queue_len = 0;
            }
        }
        while data.len() >= self.rate {
            let (block, rest) = data.split_at(self.rate);
            self.absorb(block);
            data = rest;
        }
        self.queue[..data.len()].copy_from_slice(data);
        self.queue_len = data.len();
    }

    fn finish(&mut self, out: &mut [u8]) -> Result<usize> {
        check_capacity(out, self.digest_size)?;

        // Original Keccak pad: 1 bit after the message, 1 bit at the end
        // of the rate (the two coincide in one byte when the queue is one
        // byte short of full).
        let mut block = [0u8; MAX_RATE];
        block[..self.queue_len].copy_from_slice(&self.queue[..self.queue_len]);
        block[self.queue_len] |= 0x01;
        block[self.rate - 1] |= 0x80;
        let rate = self.rate;
        self.absorb(&block[..rate]);

        let mut emitted = 0;
        while emitted < self.digest_size {
            if emitted > 0 {
                keccak_f1600(&mut self.state);
            }
            let mut squeezed = [0u8; 200];
            for (chunk, lane) in squeezed.chunks_exact_mut(8).zip(self.state.iter()) {
                chunk.copy_from_slice(&lane.to_le_bytes());
            }
            let take = (self.digest_size - emitted).min(self.rate);
            out[emitted..emitted + take].copy_from_slice(&squeezed[..take]);
            emitted += take;
        }

        self.reset();
        Ok(self.digest_size)
    }

    fn reset(&mut self) {
        self.state.zeroize();
        self.queue.zeroize();
        self.queue_len = 0;
    }

    fn block_size(&self) -> usize {
        self.rate
    }

    fn digest_size(&self) -> usize {
        self.digest_size
    }
}

impl Drop for Keccak {
    fn drop(&mut self) {
        self.state.zeroize();
        self.queue.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    fn digest_of(bits: usize, data: &[u8]) -> Vec<u8> {
        let mut d = Keccak::new(bits).unwrap();
        let mut out = vec![0u8; d.digest_size()];
        d.update(data);
        d.finish(&mut out).unwrap();
        out
    }

    #[test]
    fn keccak512_empty() {
        assert_eq!(
            digest_of(512, b""),
            hex!(
                "0eab42de4c3ceb9235fc91acffe746b29c29a8c366b7c60e4e67c466f36a4304"
                "c00fa9caf9d87976ba469bcbe06713b435f091ef2769fb160cdab33d3670680e"
            )
        );
    }

    #[test]
    fn keccak256_known_answers() {
        assert_eq!(
            digest_of(256, b""),
            hex!("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470")
        );
        assert_eq!(
            digest_of(256, b"abc"),
            hex!("4e03657aea45a94fc7d47ba826c8d667c0d1e6e33a64a036ec44f58fa12d6c45")
        );
    }

    #[test]
    fn rates_track_digest_size() {
        for (bits, rate) in [(224, 144), (256, 136), (288, 128), (384, 104), (512, 72)] {
            let d = Keccak::new(bits).unwrap();
            assert_eq!(d.block_size(), rate);
        }
        assert!(Keccak::new(320).is_err());
    }

    #[test]
    fn update_split_is_irrelevant() {
        let data: Vec<u8> = (0u16..600).map(|i| (i % 193) as u8).collect();
        let reference = digest_of(512, &data);
        for split in [1usize, 7, 71, 72, 73, 200] {
            let mut d = Keccak::new(512).unwrap();
            for chunk in data.chunks(split) {
                d.update(chunk);
            }
            let mut out = vec![0u8; 64];
            d.finish(&mut out).unwrap();
            assert_eq!(out, reference, "split {split}");
        }
    }
}
