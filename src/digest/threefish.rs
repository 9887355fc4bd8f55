//! Threefish tweakable block ciphers (Skein 1.3 constants).
//!
//! Block sizes 256/512/1024 bits, keyed by a same-sized key and a
//! 128-bit tweak. Rounds are Mix/permute sequences with a subkey
//! injection every four rounds; Threefish-256 and -512 run 72 rounds,
//! Threefish-1024 runs 80. The cipher works on little-endian 64-bit
//! words; [`crate::digest::Skein`] drives it in UBI chaining mode.

use zeroize::Zeroize;

use crate::{Error, Result};

/// Key schedule parity constant.
const KEY_SCHEDULE_CONST: u64 = 0x1BD11BDAA9FC1A22;

const ROT_256: [[u32; 2]; 8] = [
    [14, 16], [52, 57], [23, 40], [5, 37], [25, 33], [46, 12], [58, 22], [32, 32],
];
const ROT_512: [[u32; 4]; 8] = [
    [46, 36, 19, 37],
    [33, 27, 14, 42],
    [17, 49, 36, 39],
    [44, 9, 54, 56],
    [39, 30, 34, 24],
    [13, 50, 10, 17],
    [25, 29, 39, 43],
    [8, 35, 56, 22],
];
const ROT_1024: [[u32; 8]; 8] = [
    [24, 13, 8, 47, 8, 17, 22, 37],
    [38, 19, 10, 55, 49, 18, 23, 52],
    [33, 4, 51, 13, 34, 41, 59, 17],
    [5, 20, 48, 41, 47, 28, 16, 25],
    [41, 9, 37, 31, 12, 47, 44, 30],
    [16, 34, 56, 51, 4, 53, 42, 41],
    [31, 44, 47, 46, 19, 42, 44, 25],
    [9, 48, 35, 52, 23, 31, 37, 20],
];

const PERM_256: [usize; 4] = [0, 3, 2, 1];
const PERM_512: [usize; 8] = [6, 1, 0, 7, 2, 5, 4, 3];
const PERM_1024: [usize; 16] = [0, 15, 2, 11, 6, 13, 4, 9, 14, 1, 8, 5, 10, 3, 12, 7];

#[inline]
fn mix(r: u32, x0: u64, x1: u64) -> (u64, u64) {
    let y0 = x0.wrapping_add(x1);
    let y1 = x1.rotate_left(r) ^ y0;
    (y0, y1)
}

#[inline]
fn unmix(r: u32, y0: u64, y1: u64) -> (u64, u64) {
    let x1 = (y0 ^ y1).rotate_right(r);
    let x0 = y0.wrapping_sub(x1);
    (x0, x1)
}

/// A Threefish instance for one block size, rekeyable in place.
pub struct Threefish {
    words: usize,
    rounds: usize,
    /// Expanded subkeys: `(rounds / 4 + 1)` groups of `words` words.
    sk: Vec<u64>,
}

impl Threefish {
    /// Create an unkeyed instance for a block of `words` 64-bit words
    /// (4, 8, or 16).
    pub fn new(words: usize) -> Result<Self> {
        let rounds = match words {
            4 | 8 => 72,
            16 => 80,
            _ => return Err(Error::InvalidArgument("Threefish block must be 4/8/16 words")),
        };
        Ok(Self {
            words,
            rounds,
            sk: vec![0; (rounds / 4 + 1) * words],
        })
    }

    /// Block size in 64-bit words.
    pub fn words(&self) -> usize {
        self.words
    }

    /// Recompute the subkey schedule for `key` and `tweak`.
    ///
    /// `key` must hold exactly [`words`](Self::words) words.
    pub fn rekey(&mut self, key: &[u64], tweak: [u64; 2]) -> Result<()> {
        if key.len() != self.words {
            return Err(Error::InvalidArgument("Threefish key must match block size"));
        }
        let nw = self.words;

        // One extra key word: the parity constant folded with the key.
        let mut k = [0u64; 17];
        k[..nw].copy_from_slice(key);
        k[nw] = key.iter().fold(KEY_SCHEDULE_CONST, |acc, w| acc ^ w);

        let t = [tweak[0], tweak[1], tweak[0] ^ tweak[1]];

        for s in 0..=self.rounds / 4 {
            for i in 0..nw {
                let mut w = k[(s + i) % (nw + 1)];
                if i == nw - 3 {
                    w = w.wrapping_add(t[s % 3]);
                } else if i == nw - 2 {
                    w = w.wrapping_add(t[(s + 1) % 3]);
                } else if i == nw - 1 {
                    w = w.wrapping_add(s as u64);
                }
                self.sk[s * nw + i] = w;
            }
        }
        k.zeroize();
        Ok(())
    }

    #[inline]
    fn rot(&self, d: usize, j: usize) -> u32 {
        match self.words {
            4 => ROT_256[d % 8][j],
            8 => ROT_512[d % 8][j],
            _ => ROT_1024[d % 8][j],
        }
    }

    #[inline]
    fn perm(&self, i: usize) -> usize {
        match self.words {
            4 => PERM_256[i],
            8 => PERM_512[i],
            _ => PERM_1024[i],
        }
    }

    /// Encrypt one block of words.
    pub fn encrypt_words(&self, input: &[u64], output: &mut [u64]) {
        debug_assert_eq!(input.len(), self.words);
        debug_assert_eq!(output.len(), self.words);
        let nw = self.words;

        let mut v = [0u64; 16];
        v[..nw].copy_from_slice(input);

        for d in 0..self.rounds {
            let vt = v;
            for j in 0..nw / 2 {
                let (mut e0, mut e1) = (vt[2 * j], vt[2 * j + 1]);
                if d % 4 == 0 {
                    e0 = e0.wrapping_add(self.sk[(d / 4) * nw + 2 * j]);
                    e1 = e1.wrapping_add(self.sk[(d / 4) * nw + 2 * j + 1]);
                }
                let (f0, f1) = mix(self.rot(d, j), e0, e1);
                v[self.perm(2 * j)] = f0;
                v[self.perm(2 * j + 1)] = f1;
            }
        }

        let last = (self.rounds / 4) * nw;
        for i in 0..nw {
            output[i] = v[i].wrapping_add(self.sk[last + i]);
        }
    }

    /// Decrypt one block of words.
    pub fn decrypt_words(&self, input: &[u64], output: &mut [u64]) {
        debug_assert_eq!(input.len(), self.words);
        debug_assert_eq!(output.len(), self.words);
        let nw = self.words;

        let mut v = [0u64; 16];
        let last = (self.rounds / 4) * nw;
        for i in 0..nw {
            v[i] = input[i].wrapping_sub(self.sk[last + i]);
        }

        for d in (0..self.rounds).rev() {
            let vt = v;
            for j in 0..nw / 2 {
                let (f0, f1) = (vt[self.perm(2 * j)], vt[self.perm(2 * j + 1)]);
                let (e0, e1) = unmix(self.rot(d, j), f0, f1);
                let (v0, v1) = if d % 4 == 0 {
                    (
                        e0.wrapping_sub(self.sk[(d / 4) * nw + 2 * j]),
                        e1.wrapping_sub(self.sk[(d / 4) * nw + 2 * j + 1]),
                    )
                } else {
                    (e0, e1)
                };
                v[2 * j] = v0;
                v[2 * j + 1] = v1;
            }
        }

        output[..nw].copy_from_slice(&v[..nw]);
    }
}

impl Drop for Threefish {
    fn drop(&mut self) {
        self.sk.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;
    use crate::utils::{load_u64_le, store_u64_le};

    fn encrypt_bytes(words: usize, key: &[u8], tweak: &[u8; 16], pt: &[u8]) -> Vec<u8> {
        let mut tf = Threefish::new(words).unwrap();
        let mut kw = vec![0u64; words];
        load_u64_le(&mut kw, key);
        let mut tw = [0u64; 2];
        load_u64_le(&mut tw, tweak);
        tf.rekey(&kw, tw).unwrap();

        let mut inw = vec![0u64; words];
        load_u64_le(&mut inw, pt);
        let mut outw = vec![0u64; words];
        tf.encrypt_words(&inw, &mut outw);
        let mut out = vec![0u8; words * 8];
        store_u64_le(&mut out, &outw);
        out
    }

    // Vector from the Skein NIST submission CD.
    #[test]
    fn threefish256_zero_vector() {
        let ct = encrypt_bytes(4, &[0u8; 32], &[0u8; 16], &[0u8; 32]);
        assert_eq!(
            ct,
            hex!("84da2a1f8beaee947066ae3e3103f1ad536db1f4a1192495116b9f3ce6133fd8")
        );
    }

    #[test]
    fn round_trips_all_sizes() {
        for words in [4usize, 8, 16] {
            let key: Vec<u8> = (0..words as u8 * 8).map(|i| i.wrapping_mul(7)).collect();
            let tweak = [0xA5u8; 16];
            let pt: Vec<u8> = (0..words as u8 * 8).map(|i| i.wrapping_add(3)).collect();

            let mut tf = Threefish::new(words).unwrap();
            let mut kw = vec![0u64; words];
            load_u64_le(&mut kw, &key);
            let mut tw = [0u64; 2];
            load_u64_le(&mut tw, &tweak);
            tf.rekey(&kw, tw).unwrap();

            let mut inw = vec![0u64; words];
            load_u64_le(&mut inw, &pt);
            let mut ct = vec![0u64; words];
            tf.encrypt_words(&inw, &mut ct);
            assert_ne!(ct, inw);
            let mut back = vec![0u64; words];
            tf.decrypt_words(&ct, &mut back);
            assert_eq!(back, inw, "{words}-word block");
        }
    }

    #[test]
    fn rejects_bad_sizes() {
        assert!(Threefish::new(5).is_err());
        let mut tf = Threefish::new(4).unwrap();
        assert!(tf.rekey(&[0u64; 8], [0, 0]).is_err());
    }
}
