//! Rijndael block cipher with 16- or 32-byte blocks.
//!
//! The 16-byte block with the native key schedule is AES (FIPS 197);
//! the 32-byte block uses the large-block Rijndael row offsets (1, 3, 4).
//! The state is stored column-major: bytes `[0..4]` are column 0, and
//! row `r` of column `c` sits at index `r + 4 * c`.
//!
//! The extended-key (RHX) constructor replaces the native schedule with
//! round keys sliced from a KDF digest, which admits 64- to 320-byte
//! keys and 10 to 38 rounds.

use zeroize::Zeroize;

use crate::cipher::hx::expand_round_keys;
use crate::cipher::BlockCipher;
use crate::digest::DigestKind;
use crate::{Error, Result};

const SBOX: [u8; 256] = [
    0x63, 0x7C, 0x77, 0x7B, 0xF2, 0x6B, 0x6F, 0xC5, 0x30, 0x01, 0x67, 0x2B, 0xFE, 0xD7, 0xAB, 0x76,
    0xCA, 0x82, 0xC9, 0x7D, 0xFA, 0x59, 0x47, 0xF0, 0xAD, 0xD4, 0xA2, 0xAF, 0x9C, 0xA4, 0x72, 0xC0,
    0xB7, 0xFD, 0x93, 0x26, 0x36, 0x3F, 0xF7, 0xCC, 0x34, 0xA5, 0xE5, 0xF1, 0x71, 0xD8, 0x31, 0x15,
    0x04, 0xC7, 0x23, 0xC3, 0x18, 0x96, 0x05, 0x9A, 0x07, 0x12, 0x80, 0xE2, 0xEB, 0x27, 0xB2, 0x75,
    0x09, 0x83, 0x2C, 0x1A, 0x1B, 0x6E, 0x5A, 0xA0, 0x52, 0x3B, 0xD6, 0xB3, 0x29, 0xE3, 0x2F, 0x84,
    0x53, 0xD1, 0x00, 0xED, 0x20, 0xFC, 0xB1, 0x5B, 0x6A, 0xCB, 0xBE, 0x39, 0x4A, 0x4C, 0x58, 0xCF,
    0xD0, 0xEF, 0xAA, 0xFB, 0x43, 0x4D, 0x33, 0x85, 0x45, 0xF9, 0x02, 0x7F, 0x50, 0x3C, 0x9F, 0xA8,
    0x51, 0xA3, 0x40, 0x8F, 0x92, 0x9D, 0x38, 0xF5, 0xBC, 0xB6, 0xDA, 0x21, 0x10, 0xFF, 0xF3, 0xD2,
    0xCD, 0x0C, 0x13, 0xEC, 0x5F, 0x97, 0x44, 0x17, 0xC4, 0xA7, 0x7E, 0x3D, 0x64, 0x5D, 0x19, 0x73,
    0x60, 0x81, 0x4F, 0xDC, 0x22, 0x2A, 0x90, 0x88, 0x46, 0xEE, 0xB8, 0x14, 0xDE, 0x5E, 0x0B, 0xDB,
    0xE0, 0x32, 0x3A, 0x0A, 0x49, 0x06, 0x24, 0x5C, 0xC2, 0xD3, 0xAC, 0x62, 0x91, 0x95, 0xE4, 0x79,
    0xE7, 0xC8, 0x37, 0x6D, 0x8D, 0xD5, 0x4E, 0xA9, 0x6C, 0x56, 0xF4, 0xEA, 0x65, 0x7A, 0xAE, 0x08,
    0xBA, 0x78, 0x25, 0x2E, 0x1C, 0xA6, 0xB4, 0xC6, 0xE8, 0xDD, 0x74, 0x1F, 0x4B, 0xBD, 0x8B, 0x8A,
    0x70, 0x3E, 0xB5, 0x66, 0x48, 0x03, 0xF6, 0x0E, 0x61, 0x35, 0x57, 0xB9, 0x86, 0xC1, 0x1D, 0x9E,
    0xE1, 0xF8, 0x98, 0x11, 0x69, 0xD9, 0x8E, 0x94, 0x9B, 0x1E, 0x87, 0xE9, 0xCE, 0x55, 0x28, 0xDF,
    0x8C, 0xA1, 0x89, 0x0D, 0xBF, 0xE6, 0x42, 0x68, 0x41, 0x99, 0x2D, 0x0F, 0xB0, 0x54, 0xBB, 0x16,
];

const INV_SBOX: [u8; 256] = [
    0x52, 0x09, 0x6A, 0xD5, 0x30, 0x36, 0xA5, 0x38, 0xBF, 0x40, 0xA3, 0x9E, 0x81, 0xF3, 0xD7, 0xFB,
    0x7C, 0xE3, 0x39, 0x82, 0x9B, 0x2F, 0xFF, 0x87, 0x34, 0x8E, 0x43, 0x44, 0xC4, 0xDE, 0xE9, 0xCB,
    0x54, 0x7B, 0x94, 0x32, 0xA6, 0xC2, 0x23, 0x3D, 0xEE, 0x4C, 0x95, 0x0B, 0x42, 0xFA, 0xC3, 0x4E,
    0x08, 0x2E, 0xA1, 0x66, 0x28, 0xD9, 0x24, 0xB2, 0x76, 0x5B, 0xA2, 0x49, 0x6D, 0x8B, 0xD1, 0x25,
    0x72, 0xF8, 0xF6, 0x64, 0x86, 0x68, 0x98, 0x16, 0xD4, 0xA4, 0x5C, 0xCC, 0x5D, 0x65, 0xB6, 0x92,
    0x6C, 0x70, 0x48, 0x50, 0xFD, 0xED, 0xB9, 0xDA, 0x5E, 0x15, 0x46, 0x57, 0xA7, 0x8D, 0x9D, 0x84,
    0x90, 0xD8, 0xAB, 0x00, 0x8C, 0xBC, 0xD3, 0x0A, 0xF7, 0xE4, 0x58, 0x05, 0xB8, 0xB3, 0x45, 0x06,
    0xD0, 0x2C, 0x1E, 0x8F, 0xCA, 0x3F, 0x0F, 0x02, 0xC1, 0xAF, 0xBD, 0x03, 0x01, 0x13, 0x8A, 0x6B,
    0x3A, 0x91, 0x11, 0x41, 0x4F, 0x67, 0xDC, 0xEA, 0x97, 0xF2, 0xCF, 0xCE, 0xF0, 0xB4, 0xE6, 0x73,
    0x96, 0xAC, 0x74, 0x22, 0xE7, 0xAD, 0x35, 0x85, 0xE2, 0xF9, 0x37, 0xE8, 0x1C, 0x75, 0xDF, 0x6E,
    0x47, 0xF1, 0x1A, 0x71, 0x1D, 0x29, 0xC5, 0x89, 0x6F, 0xB7, 0x62, 0x0E, 0xAA, 0x18, 0xBE, 0x1B,
    0xFC, 0x56, 0x3E, 0x4B, 0xC6, 0xD2, 0x79, 0x20, 0x9A, 0xDB, 0xC0, 0xFE, 0x78, 0xCD, 0x5A, 0xF4,
    0x1F, 0xDD, 0xA8, 0x33, 0x88, 0x07, 0xC7, 0x31, 0xB1, 0x12, 0x10, 0x59, 0x27, 0x80, 0xEC, 0x5F,
    0x60, 0x51, 0x7F, 0xA9, 0x19, 0xB5, 0x4A, 0x0D, 0x2D, 0xE5, 0x7A, 0x9F, 0x93, 0xC9, 0x9C, 0xEF,
    0xA0, 0xE0, 0x3B, 0x4D, 0xAE, 0x2A, 0xF5, 0xB0, 0xC8, 0xEB, 0xBB, 0x3C, 0x83, 0x53, 0x99, 0x61,
    0x17, 0x2B, 0x04, 0x7E, 0xBA, 0x77, 0xD6, 0x26, 0xE1, 0x69, 0x14, 0x63, 0x55, 0x21, 0x0C, 0x7D,
];

/// Multiply in GF(2^8) under the Rijndael polynomial 0x11B.
#[inline]
fn gmul(mut a: u8, mut b: u8) -> u8 {
    let mut p = 0u8;
    for _ in 0..8 {
        if b & 1 != 0 {
            p ^= a;
        }
        let hi = a & 0x80 != 0;
        a <<= 1;
        if hi {
            a ^= 0x1B;
        }
        b >>= 1;
    }
    p
}

#[inline]
fn xtime(a: u8) -> u8 {
    let hi = a & 0x80 != 0;
    let mut r = a << 1;
    if hi {
        r ^= 0x1B;
    }
    r
}

/// Row shift offsets: the large block uses (1, 3, 4) instead of (1, 2, 3).
fn row_offsets(nb: usize) -> [usize; 4] {
    if nb == 4 { [0, 1, 2, 3] } else { [0, 1, 3, 4] }
}

pub struct Rijndael {
    /// Round keys, `(rounds + 1) * nb * 4` bytes, column order.
    rk: Vec<u8>,
    rounds: usize,
    /// Columns in the state: 4 or 8.
    nb: usize,
}

impl Rijndael {
    /// AES-style native schedule: 16/24/32-byte keys, rounds fixed by
    /// `max(key words, block words) + 6`.
    pub fn new(key: &[u8], block_size: usize) -> Result<Self> {
        let nb = match block_size {
            16 => 4,
            32 => 8,
            _ => return Err(Error::InvalidArgument("Rijndael block must be 16 or 32 bytes")),
        };
        let nk = match key.len() {
            16 | 24 | 32 => key.len() / 4,
            _ => return Err(Error::InvalidArgument("Rijndael key must be 16/24/32 bytes")),
        };
        let rounds = nk.max(nb) + 6;

        let total_words = nb * (rounds + 1);
        let mut w = vec![0u8; total_words * 4];
        w[..key.len()].copy_from_slice(key);

        let mut rcon = 1u8;
        for i in nk..total_words {
            let mut t = [
                w[(i - 1) * 4],
                w[(i - 1) * 4 + 1],
                w[(i - 1) * 4 + 2],
                w[(i - 1) * 4 + 3],
            ];
            if i % nk == 0 {
                t = [
                    SBOX[t[1] as usize] ^ rcon,
                    SBOX[t[2] as usize],
                    SBOX[t[3] as usize],
                    SBOX[t[0] as usize],
                ];
                rcon = xtime(rcon);
            } else if nk > 6 && i % nk == 4 {
                t = [
                    SBOX[t[0] as usize],
                    SBOX[t[1] as usize],
                    SBOX[t[2] as usize],
                    SBOX[t[3] as usize],
                ];
            }
            for j in 0..4 {
                w[i * 4 + j] = w[(i - nk) * 4 + j] ^ t[j];
            }
        }

        Ok(Self { rk: w, rounds, nb })
    }

    /// Extended-key schedule (RHX): round keys come straight from the
    /// KDF digest; 64- to 320-byte keys, 10 to 38 rounds.
    pub fn new_extended(
        key: &[u8],
        block_size: usize,
        rounds: usize,
        kdf: DigestKind,
    ) -> Result<Self> {
        let nb = match block_size {
            16 => 4,
            32 => 8,
            _ => return Err(Error::InvalidArgument("Rijndael block must be 16 or 32 bytes")),
        };
        if !(64..=320).contains(&key.len()) {
            return Err(Error::InvalidArgument("extended Rijndael key must be 64-320 bytes"));
        }
        if !(10..=38).contains(&rounds) || rounds % 2 != 0 {
            return Err(Error::InvalidArgument(
                "extended Rijndael rounds must be even, 10-38",
            ));
        }
        let rk = expand_round_keys(kdf, key, (rounds + 1) * nb * 4);
        Ok(Self {
            rk: rk.to_vec(),
            rounds,
            nb,
        })
    }

    fn round_key(&self, round: usize) -> &[u8] {
        let len = self.nb * 4;
        &self.rk[round * len..(round + 1) * len]
    }

    fn add_round_key(state: &mut [u8], rk: &[u8]) {
        for (b, k) in state.iter_mut().zip(rk.iter()) {
            *b ^= k;
        }
    }

    fn sub_bytes(state: &mut [u8]) {
        for b in state.iter_mut() {
            *b = SBOX[*b as usize];
        }
    }

    fn inv_sub_bytes(state: &mut [u8]) {
        for b in state.iter_mut() {
            *b = INV_SBOX[*b as usize];
        }
    }

    fn shift_rows(state: &mut [u8], nb: usize) {
        let offsets = row_offsets(nb);
        let mut tmp = [0u8; 32];
        tmp[..state.len()].copy_from_slice(state);
        for r in 1..4 {
            for c in 0..nb {
                state[r + 4 * c] = tmp[r + 4 * ((c + offsets[r]) % nb)];
            }
        }
    }

    fn inv_shift_rows(state: &mut [u8], nb: usize) {
        let offsets = row_offsets(nb);
        let mut tmp = [0u8; 32];
        tmp[..state.len()].copy_from_slice(state);
        for r in 1..4 {
            for c in 0..nb {
                state[r + 4 * ((c + offsets[r]) % nb)] = tmp[r + 4 * c];
            }
        }
    }

    fn mix_columns(state: &mut [u8], nb: usize) {
        for c in 0..nb {
            let b = c * 4;
            let (s0, s1, s2, s3) = (state[b], state[b + 1], state[b + 2], state[b + 3]);
            state[b] = gmul(0x02, s0) ^ gmul(0x03, s1) ^ s2 ^ s3;
            state[b + 1] = s0 ^ gmul(0x02, s1) ^ gmul(0x03, s2) ^ s3;
            state[b + 2] = s0 ^ s1 ^ gmul(0x02, s2) ^ gmul(0x03, s3);
            state[b + 3] = gmul(0x03, s0) ^ s1 ^ s2 ^ gmul(0x02, s3);
        }
    }

    fn inv_mix_columns(state: &mut [u8], nb: usize) {
        for c in 0..nb {
            let b = c * 4;
            let (s0, s1, s2, s3) = (state[b], state[b + 1], state[b + 2], state[b + 3]);
            state[b] = gmul(0x0E, s0) ^ gmul(0x0B, s1) ^ gmul(0x0D, s2) ^ gmul(0x09, s3);
            state[b + 1] = gmul(0x09, s0) ^ gmul(0x0E, s1) ^ gmul(0x0B, s2) ^ gmul(0x0D, s3);
            state[b + 2] = gmul(0x0D, s0) ^ gmul(0x09, s1) ^ gmul(0x0E, s2) ^ gmul(0x0B, s3);
            state[b + 3] = gmul(0x0B, s0) ^ gmul(0x0D, s1) ^ gmul(0x09, s2) ^ gmul(0x0E, s3);
        }
    }
}

impl BlockCipher for Rijndael {
    fn encrypt_block(&self, input: &[u8], output: &mut [u8]) {
        let nb = self.nb;
        let mut s = [0u8; 32];
        let len = nb * 4;
        s[..len].copy_from_slice(&input[..len]);
        let state = &mut s[..len];

        Self::add_round_key(state, self.round_key(0));
        for round in 1..self.rounds {
            Self::sub_bytes(state);
            Self::shift_rows(state, nb);
            Self::mix_columns(state, nb);
            Self::add_round_key(state, self.round_key(round));
        }
        Self::sub_bytes(state);
        Self::shift_rows(state, nb);
        Self::add_round_key(state, self.round_key(self.rounds));

        output[..len].copy_from_slice(state);
    }

    fn decrypt_block(&self, input: &[u8], output: &mut [u8]) {
        let nb = self.nb;
        let mut s = [0u8; 32];
        let len = nb * 4;
        s[..len].copy_from_slice(&input[..len]);
        let state = &mut s[..len];

        Self::add_round_key(state, self.round_key(self.rounds));
        for round in (1..self.rounds).rev() {
            Self::inv_shift_rows(state, nb);
            Self::inv_sub_bytes(state);
            Self::add_round_key(state, self.round_key(round));
            Self::inv_mix_columns(state, nb);
        }
        Self::inv_shift_rows(state, nb);
        Self::inv_sub_bytes(state);
        Self::add_round_key(state, self.round_key(0));

        output[..len].copy_from_slice(state);
    }

    fn block_size(&self) -> usize {
        self.nb * 4
    }
}

impl Drop for Rijndael {
    fn drop(&mut self) {
        self.rk.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn aes128_fips197_vector() {
        // FIPS 197 appendix C.1.
        let c = Rijndael::new(&hex!("000102030405060708090a0b0c0d0e0f"), 16).unwrap();
        let mut out = [0u8; 16];
        c.encrypt_block(&hex!("00112233445566778899aabbccddeeff"), &mut out);
        assert_eq!(out, hex!("69c4e0d86a7b0430d8cdb78070b4c55a"));
        let mut back = [0u8; 16];
        c.decrypt_block(&out, &mut back);
        assert_eq!(back, hex!("00112233445566778899aabbccddeeff"));
    }

    #[test]
    fn aes_ecb_sp800_38a_vectors() {
        let pt = hex!("6bc1bee22e409f96e93d7e117393172a");

        let c128 = Rijndael::new(&hex!("2b7e151628aed2a6abf7158809cf4f3c"), 16).unwrap();
        let mut out = [0u8; 16];
        c128.encrypt_block(&pt, &mut out);
        assert_eq!(out, hex!("3ad77bb40d7a3660a89ecaf32466ef97"));

        let c256 = Rijndael::new(
            &hex!("603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4"),
            16,
        )
        .unwrap();
        c256.encrypt_block(&pt, &mut out);
        assert_eq!(out, hex!("f3eed1bdb5d2a03c064b5a7e3db181f8"));
    }

    #[test]
    fn aes192_fips197_vector() {
        let c = Rijndael::new(&hex!("000102030405060708090a0b0c0d0e0f1011121314151617"), 16)
            .unwrap();
        let mut out = [0u8; 16];
        c.encrypt_block(&hex!("00112233445566778899aabbccddeeff"), &mut out);
        assert_eq!(out, hex!("dda97ca4864cdfe06eaf70a0ec0d7191"));
    }

    #[test]
    fn large_block_round_trip() {
        let key: Vec<u8> = (0..32).collect();
        let c = Rijndael::new(&key, 32).unwrap();
        assert_eq!(c.block_size(), 32);
        let pt: Vec<u8> = (100..132).collect();
        let mut ct = [0u8; 32];
        c.encrypt_block(&pt, &mut ct);
        assert_ne!(&ct[..], &pt[..]);
        let mut back = [0u8; 32];
        c.decrypt_block(&ct, &mut back);
        assert_eq!(&back[..], &pt[..]);
    }

    #[test]
    fn extended_key_round_trip() {
        let key: Vec<u8> = (0u8..96).collect();
        let c = Rijndael::new_extended(&key, 16, 22, DigestKind::Sha512).unwrap();
        let pt = [0xABu8; 16];
        let mut ct = [0u8; 16];
        c.encrypt_block(&pt, &mut ct);
        let mut back = [0u8; 16];
        c.decrypt_block(&ct, &mut back);
        assert_eq!(back, pt);
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(Rijndael::new(&[0u8; 15], 16).is_err());
        assert!(Rijndael::new(&[0u8; 16], 24).is_err());
        assert!(Rijndael::new_extended(&[0u8; 32], 16, 22, DigestKind::Sha512).is_err());
        assert!(Rijndael::new_extended(&[0u8; 64], 16, 9, DigestKind::Sha512).is_err());
    }
}
