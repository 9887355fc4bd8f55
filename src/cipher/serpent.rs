//! Serpent block cipher (16-byte block).
//!
//! The native schedule takes 16/24/32-byte keys through the recursive
//! prekey recurrence and runs the standard 32 rounds. The extended-key
//! (SHX) constructor draws round keys from a KDF digest and stretches
//! the round count to 32-64 in multiples of 8, so the eight S-boxes
//! keep their alignment across the longer schedule.
//!
//! The state is four little-endian 32-bit words; S-boxes are applied
//! bitsliced, one 4-bit column per bit position, with word 0 holding
//! the least significant bit of each column.

use zeroize::Zeroize;

use crate::cipher::hx::expand_round_keys;
use crate::cipher::BlockCipher;
use crate::digest::DigestKind;
use crate::utils::{load_u32_le, store_u32_le};
use crate::{Error, Result};

/// Golden-ratio constant from the key schedule.
const PHI: u32 = 0x9E37_79B9;

/// The eight 4-bit S-boxes.
const SBOXES: [[u8; 16]; 8] = [
    [3, 8, 15, 1, 10, 6, 5, 11, 14, 13, 4, 2, 7, 0, 9, 12],
    [15, 12, 2, 7, 9, 0, 5, 10, 1, 11, 14, 8, 6, 13, 3, 4],
    [8, 6, 7, 9, 3, 12, 10, 15, 13, 1, 14, 4, 0, 11, 5, 2],
    [0, 15, 11, 8, 12, 9, 6, 3, 13, 1, 2, 4, 10, 7, 5, 14],
    [1, 15, 8, 3, 12, 0, 11, 6, 2, 5, 4, 10, 9, 14, 7, 13],
    [15, 5, 2, 11, 4, 10, 9, 12, 0, 3, 14, 8, 13, 6, 7, 1],
    [7, 2, 12, 5, 8, 4, 6, 11, 14, 9, 1, 15, 13, 3, 10, 0],
    [1, 13, 15, 0, 14, 8, 2, 11, 7, 4, 12, 10, 9, 3, 5, 6],
];

/// Apply S-box `idx` bitsliced across the four state words.
fn sbox(idx: usize, x: &mut [u32; 4]) {
    let table = &SBOXES[idx];
    let mut out = [0u32; 4];
    for bit in 0..32 {
        let nibble = ((x[0] >> bit) & 1)
            | (((x[1] >> bit) & 1) << 1)
            | (((x[2] >> bit) & 1) << 2)
            | (((x[3] >> bit) & 1) << 3);
        let sub = table[nibble as usize] as u32;
        for (w, o) in out.iter_mut().enumerate() {
            *o |= ((sub >> w) & 1) << bit;
        }
    }
    *x = out;
}

/// Apply the inverse of S-box `idx`.
fn inv_sbox(idx: usize, x: &mut [u32; 4]) {
    let table = &SBOXES[idx];
    let mut inverse = [0u8; 16];
    for (i, &v) in table.iter().enumerate() {
        inverse[v as usize] = i as u8;
    }
    let mut out = [0u32; 4];
    for bit in 0..32 {
        let nibble = ((x[0] >> bit) & 1)
            | (((x[1] >> bit) & 1) << 1)
            | (((x[2] >> bit) & 1) << 2)
            | (((x[3] >> bit) & 1) << 3);
        let sub = inverse[nibble as usize] as u32;
        for (w, o) in out.iter_mut().enumerate() {
            *o |= ((sub >> w) & 1) << bit;
        }
    }
    *x = out;
}

fn linear(x: &mut [u32; 4]) {
    x[0] = x[0].rotate_left(13);
    x[2] = x[2].rotate_left(3);
    x[1] ^= x[0] ^ x[2];
    x[3] ^= x[2] ^ (x[0] << 3);
    x[1] = x[1].rotate_left(1);
    x[3] = x[3].rotate_left(7);
    x[0] ^= x[1] ^ x[3];
    x[2] ^= x[3] ^ (x[1] << 7);
    x[0] = x[0].rotate_left(5);
    x[2] = x[2].rotate_left(22);
}

fn inv_linear(x: &mut [u32; 4]) {
    x[2] = x[2].rotate_right(22);
    x[0] = x[0].rotate_right(5);
    x[2] ^= x[3] ^ (x[1] << 7);
    x[0] ^= x[1] ^ x[3];
    x[3] = x[3].rotate_right(7);
    x[1] = x[1].rotate_right(1);
    x[3] ^= x[2] ^ (x[0] << 3);
    x[1] ^= x[0] ^ x[2];
    x[2] = x[2].rotate_right(3);
    x[0] = x[0].rotate_right(13);
}

pub struct Serpent {
    /// One subkey per round plus the closing key.
    rk: Vec<[u32; 4]>,
    rounds: usize,
}

impl Serpent {
    /// Native schedule: 16/24/32-byte key, 32 rounds.
    pub fn new(key: &[u8]) -> Result<Self> {
        if !matches!(key.len(), 16 | 24 | 32) {
            return Err(Error::InvalidArgument("Serpent key must be 16/24/32 bytes"));
        }
        let rounds = 32;

        // Short keys are padded to 256 bits with a single 1 bit.
        let mut padded = [0u8; 32];
        padded[..key.len()].copy_from_slice(key);
        if key.len() < 32 {
            padded[key.len()] = 0x01;
        }

        // Prekeys w_0 .. w_131 from the sliding recurrence.
        let total = 4 * (rounds + 1);
        let mut w = vec![0u32; 8 + total];
        load_u32_le(&mut w[..8], &padded);
        for i in 0..total {
            let x = w[i] ^ w[i + 3] ^ w[i + 5] ^ w[i + 7] ^ PHI ^ i as u32;
            w[i + 8] = x.rotate_left(11);
        }

        let mut rk = vec![[0u32; 4]; rounds + 1];
        for (i, k) in rk.iter_mut().enumerate() {
            k.copy_from_slice(&w[8 + 4 * i..8 + 4 * i + 4]);
            sbox((3 + 8 - (i % 8)) % 8, k);
        }
        w.zeroize();
        padded.zeroize();

        Ok(Self { rk, rounds })
    }

    /// Extended-key schedule (SHX): 64- to 320-byte keys, 32-64 rounds in
    /// multiples of 8.
    pub fn new_extended(key: &[u8], rounds: usize, kdf: DigestKind) -> Result<Self> {
        if !(64..=320).contains(&key.len()) {
            return Err(Error::InvalidArgument("extended Serpent key must be 64-320 bytes"));
        }
        if !(32..=64).contains(&rounds) || rounds % 8 != 0 {
            return Err(Error::InvalidArgument(
                "extended Serpent rounds must be a multiple of 8, 32-64",
            ));
        }
        let material = expand_round_keys(kdf, key, (rounds + 1) * 16);
        let mut rk = vec![[0u32; 4]; rounds + 1];
        for (k, chunk) in rk.iter_mut().zip(material.chunks_exact(16)) {
            load_u32_le(k, chunk);
        }
        Ok(Self { rk, rounds })
    }
}

impl BlockCipher for Serpent {
    fn encrypt_block(&self, input: &[u8], output: &mut [u8]) {
        let mut x = [0u32; 4];
        load_u32_le(&mut x, &input[..16]);

        for i in 0..self.rounds {
            for (w, k) in x.iter_mut().zip(self.rk[i]) {
                *w ^= k;
            }
            sbox(i % 8, &mut x);
            if i < self.rounds - 1 {
                linear(&mut x);
            }
        }
        for (w, k) in x.iter_mut().zip(self.rk[self.rounds]) {
            *w ^= k;
        }

        store_u32_le(&mut output[..16], &x);
    }

    fn decrypt_block(&self, input: &[u8], output: &mut [u8]) {
        let mut x = [0u32; 4];
        load_u32_le(&mut x, &input[..16]);

        for (w, k) in x.iter_mut().zip(self.rk[self.rounds]) {
            *w ^= k;
        }
        for i in (0..self.rounds).rev() {
            if i < self.rounds - 1 {
                inv_linear(&mut x);
            }
            inv_sbox(i % 8, &mut x);
            for (w, k) in x.iter_mut().zip(self.rk[i]) {
                *w ^= k;
            }
        }

        store_u32_le(&mut output[..16], &x);
    }

    fn block_size(&self) -> usize {
        16
    }
}

impl Drop for Serpent {
    fn drop(&mut self) {
        for k in &mut self.rk {
            k.zeroize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sboxes_are_permutations() {
        for (i, table) in SBOXES.iter().enumerate() {
            let mut seen = [false; 16];
            for &v in table {
                assert!(!seen[v as usize], "S-box {i} repeats {v}");
                seen[v as usize] = true;
            }
        }
    }

    #[test]
    fn sbox_inverse_round_trips() {
        for idx in 0..8 {
            let mut x = [0x01234567u32, 0x89ABCDEF, 0xFEDCBA98, 0x76543210];
            let orig = x;
            sbox(idx, &mut x);
            inv_sbox(idx, &mut x);
            assert_eq!(x, orig, "S-box {idx}");
        }
    }

    #[test]
    fn linear_inverse_round_trips() {
        let mut x = [0xDEADBEEFu32, 0x01020304, 0xA5A5A5A5, 0x12345678];
        let orig = x;
        linear(&mut x);
        assert_ne!(x, orig);
        inv_linear(&mut x);
        assert_eq!(x, orig);
    }

    #[test]
    fn round_trips_all_key_sizes() {
        for key_len in [16usize, 24, 32] {
            let key: Vec<u8> = (0..key_len as u8).collect();
            let c = Serpent::new(&key).unwrap();
            let pt = [0x3Cu8; 16];
            let mut ct = [0u8; 16];
            c.encrypt_block(&pt, &mut ct);
            assert_ne!(ct, pt);
            let mut back = [0u8; 16];
            c.decrypt_block(&ct, &mut back);
            assert_eq!(back, pt, "key length {key_len}");
        }
    }

    #[test]
    fn extended_round_trip() {
        let key: Vec<u8> = (0u8..128).collect();
        let c = Serpent::new_extended(&key, 40, DigestKind::Keccak512).unwrap();
        let pt = [0x77u8; 16];
        let mut ct = [0u8; 16];
        c.encrypt_block(&pt, &mut ct);
        let mut back = [0u8; 16];
        c.decrypt_block(&ct, &mut back);
        assert_eq!(back, pt);
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(Serpent::new(&[0u8; 20]).is_err());
        assert!(Serpent::new_extended(&[0u8; 64], 33, DigestKind::Sha256).is_err());
        assert!(Serpent::new_extended(&[0u8; 16], 32, DigestKind::Sha256).is_err());
    }
}
