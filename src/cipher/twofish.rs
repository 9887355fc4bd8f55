//! Twofish block cipher (16-byte block).
//!
//! The q0/q1 byte permutations are built from the published 4-bit
//! t-tables at construction time rather than carried as 256-entry
//! constants. The native schedule follows the reference design: the MDS
//! matrix over GF(2^8)/0x169 inside the h function, the RS matrix over
//! GF(2^8)/0x14D for the S-box key words, and paired h evaluations for
//! the 40 subkeys. The extended-key (THX) constructor draws both the
//! subkeys and the S-box key words from a KDF digest and allows 16-32
//! rounds.

use zeroize::Zeroize;

use crate::cipher::hx::expand_round_keys;
use crate::cipher::BlockCipher;
use crate::digest::DigestKind;
use crate::utils::{load_u32_le, store_u32_le};
use crate::{Error, Result};

/// 4-bit t-tables for q0.
const Q0_T: [[u8; 16]; 4] = [
    [0x8, 0x1, 0x7, 0xD, 0x6, 0xF, 0x3, 0x2, 0x0, 0xB, 0x5, 0x9, 0xE, 0xC, 0xA, 0x4],
    [0xE, 0xC, 0xB, 0x8, 0x1, 0x2, 0x3, 0x5, 0xF, 0x4, 0xA, 0x6, 0x7, 0x0, 0x9, 0xD],
    [0xB, 0xA, 0x5, 0xE, 0x6, 0xD, 0x9, 0x0, 0xC, 0x8, 0xF, 0x3, 0x2, 0x4, 0x7, 0x1],
    [0xD, 0x7, 0xF, 0x4, 0x1, 0x2, 0x6, 0xE, 0x9, 0xB, 0x3, 0x0, 0x8, 0x5, 0xC, 0xA],
];

/// 4-bit t-tables for q1.
const Q1_T: [[u8; 16]; 4] = [
    [0x2, 0x8, 0xB, 0xD, 0xF, 0x7, 0x6, 0xE, 0x3, 0x1, 0x9, 0x4, 0x0, 0xA, 0xC, 0x5],
    [0x1, 0xE, 0x2, 0xB, 0x4, 0xC, 0x3, 0x7, 0x6, 0xD, 0xA, 0x5, 0xF, 0x9, 0x0, 0x8],
    [0x4, 0xC, 0x7, 0x5, 0x1, 0x6, 0x9, 0xA, 0x0, 0xE, 0xD, 0x8, 0x2, 0xB, 0x3, 0xF],
    [0xB, 0x9, 0x5, 0x1, 0xC, 0x3, 0xD, 0xE, 0x6, 0x4, 0x7, 0xF, 0x2, 0x0, 0x8, 0xA],
];

/// MDS matrix coefficients (rows over y0..y3).
const MDS: [[u8; 4]; 4] = [
    [0x01, 0xEF, 0x5B, 0x5B],
    [0x5B, 0xEF, 0xEF, 0x01],
    [0xEF, 0x5B, 0x01, 0xEF],
    [0xEF, 0x01, 0xEF, 0x5B],
];

/// RS matrix mapping 8 key bytes to one S-box key word.
const RS: [[u8; 8]; 4] = [
    [0x01, 0xA4, 0x55, 0x87, 0x5A, 0x58, 0xDB, 0x9E],
    [0xA4, 0x56, 0x82, 0xF3, 0x1E, 0xC6, 0x68, 0xE5],
    [0x02, 0xA1, 0xFC, 0xC1, 0x47, 0xAE, 0x3D, 0x19],
    [0xA4, 0x55, 0x87, 0x5A, 0x58, 0xDB, 0x9E, 0x03],
];

const MDS_POLY: u16 = 0x169;
const RS_POLY: u16 = 0x14D;

/// Multiply in GF(2^8) under `poly` (9-bit reduction polynomial).
fn gf_mul(mut a: u8, mut b: u8, poly: u16) -> u8 {
    let mut p = 0u8;
    let reduce = (poly & 0xFF) as u8;
    for _ in 0..8 {
        if b & 1 != 0 {
            p ^= a;
        }
        let hi = a & 0x80 != 0;
        a <<= 1;
        if hi {
            a ^= reduce;
        }
        b >>= 1;
    }
    p
}

#[inline]
fn ror4(b: u8) -> u8 {
    ((b >> 1) | (b << 3)) & 0x0F
}

/// Build one q permutation from its t-tables.
fn build_q(t: &[[u8; 16]; 4]) -> [u8; 256] {
    let mut q = [0u8; 256];
    for (x, out) in q.iter_mut().enumerate() {
        let (a0, b0) = ((x >> 4) as u8, (x & 0x0F) as u8);
        let a1 = a0 ^ b0;
        let b1 = (a0 ^ ror4(b0) ^ (a0 << 3)) & 0x0F;
        let (a2, b2) = (t[0][a1 as usize], t[1][b1 as usize]);
        let a3 = a2 ^ b2;
        let b3 = (a2 ^ ror4(b2) ^ (a2 << 3)) & 0x0F;
        let (a4, b4) = (t[2][a3 as usize], t[3][b3 as usize]);
        *out = (b4 << 4) | a4;
    }
    q
}

pub struct Twofish {
    /// Expanded subkeys: whitening (8) plus two per round.
    k: Vec<u32>,
    /// S-box key words for the g function, most significant first.
    s: Vec<u32>,
    rounds: usize,
    q0: [u8; 256],
    q1: [u8; 256],
}

impl Twofish {
    /// Native schedule: 16/24/32-byte key, 16 rounds.
    pub fn new(key: &[u8]) -> Result<Self> {
        if !matches!(key.len(), 16 | 24 | 32) {
            return Err(Error::InvalidArgument("Twofish key must be 16/24/32 bytes"));
        }
        let rounds = 16;
        let k64 = key.len() / 8;
        let q0 = build_q(&Q0_T);
        let q1 = build_q(&Q1_T);

        let mut words = vec![0u32; key.len() / 4];
        load_u32_le(&mut words, key);
        let me: Vec<u32> = words.iter().copied().step_by(2).collect();
        let mo: Vec<u32> = words.iter().copied().skip(1).step_by(2).collect();

        // S-box key words from the RS code, in reverse order.
        let mut s = vec![0u32; k64];
        for i in 0..k64 {
            let chunk = &key[8 * i..8 * i + 8];
            let mut word = [0u8; 4];
            for (r, w) in word.iter_mut().enumerate() {
                for (c, &b) in RS[r].iter().zip(chunk.iter()) {
                    *w ^= gf_mul(*c, b, RS_POLY);
                }
            }
            s[k64 - 1 - i] = u32::from_le_bytes(word);
        }

        let mut this = Self {
            k: vec![0u32; 8 + 2 * rounds],
            s,
            rounds,
            q0,
            q1,
        };

        const RHO: u32 = 0x0101_0101;
        for i in 0..(4 + this.rounds) {
            let a = this.h(RHO.wrapping_mul(2 * i as u32), &me);
            let b = this.h(RHO.wrapping_mul(2 * i as u32 + 1), &mo).rotate_left(8);
            this.k[2 * i] = a.wrapping_add(b);
            this.k[2 * i + 1] = a.wrapping_add(b.wrapping_mul(2)).rotate_left(9);
        }

        Ok(this)
    }

    /// Extended-key schedule (THX): subkeys and S-box key words from a
    /// KDF digest; 64- to 320-byte keys, 16-32 rounds in steps of 2.
    pub fn new_extended(key: &[u8], rounds: usize, kdf: DigestKind) -> Result<Self> {
        if !(64..=320).contains(&key.len()) {
            return Err(Error::InvalidArgument("extended Twofish key must be 64-320 bytes"));
        }
        if !(16..=32).contains(&rounds) || rounds % 2 != 0 {
            return Err(Error::InvalidArgument(
                "extended Twofish rounds must be even, 16-32",
            ));
        }

        // 4 S-box words first, then the subkey schedule.
        let subkeys = 8 + 2 * rounds;
        let material = expand_round_keys(kdf, key, 16 + subkeys * 4);
        let mut s = vec![0u32; 4];
        load_u32_le(&mut s, &material[..16]);
        let mut k = vec![0u32; subkeys];
        load_u32_le(&mut k, &material[16..]);

        Ok(Self {
            k,
            s,
            rounds,
            q0: build_q(&Q0_T),
            q1: build_q(&Q1_T),
        })
    }

    /// The h function: a q-permutation ladder keyed by `l`, closed by
    /// the MDS matrix.
    fn h(&self, x: u32, l: &[u32]) -> u32 {
        let lb: Vec<[u8; 4]> = l.iter().map(|w| w.to_le_bytes()).collect();
        let mut b = x.to_le_bytes();

        if l.len() >= 4 {
            b = [
                self.q1[b[0] as usize] ^ lb[3][0],
                self.q0[b[1] as usize] ^ lb[3][1],
                self.q0[b[2] as usize] ^ lb[3][2],
                self.q1[b[3] as usize] ^ lb[3][3],
            ];
        }
        if l.len() >= 3 {
            b = [
                self.q1[b[0] as usize] ^ lb[2][0],
                self.q1[b[1] as usize] ^ lb[2][1],
                self.q0[b[2] as usize] ^ lb[2][2],
                self.q0[b[3] as usize] ^ lb[2][3],
            ];
        }
        let y = [
            self.q1[(self.q0[(self.q0[b[0] as usize] ^ lb[1][0]) as usize] ^ lb[0][0]) as usize],
            self.q0[(self.q0[(self.q1[b[1] as usize] ^ lb[1][1]) as usize] ^ lb[0][1]) as usize],
            self.q1[(self.q1[(self.q0[b[2] as usize] ^ lb[1][2]) as usize] ^ lb[0][2]) as usize],
            self.q0[(self.q1[(self.q1[b[3] as usize] ^ lb[1][3]) as usize] ^ lb[0][3]) as usize],
        ];

        let mut z = [0u8; 4];
        for (r, zb) in z.iter_mut().enumerate() {
            for (c, &yb) in MDS[r].iter().zip(y.iter()) {
                *zb ^= gf_mul(*c, yb, MDS_POLY);
            }
        }
        u32::from_le_bytes(z)
    }

    #[inline]
    fn g(&self, x: u32) -> u32 {
        self.h(x, &self.s)
    }
}

impl BlockCipher for Twofish {
    fn encrypt_block(&self, input: &[u8], output: &mut [u8]) {
        let mut w = [0u32; 4];
        load_u32_le(&mut w, &input[..16]);
        let mut a = w[0] ^ self.k[0];
        let mut b = w[1] ^ self.k[1];
        let mut c = w[2] ^ self.k[2];
        let mut d = w[3] ^ self.k[3];

        for r in (0..self.rounds).step_by(2) {
            let t0 = self.g(a);
            let t1 = self.g(b.rotate_left(8));
            c = (c ^ t0.wrapping_add(t1).wrapping_add(self.k[8 + 2 * r])).rotate_right(1);
            d = d.rotate_left(1)
                ^ t0.wrapping_add(t1.wrapping_mul(2))
                    .wrapping_add(self.k[9 + 2 * r]);

            let t0 = self.g(c);
            let t1 = self.g(d.rotate_left(8));
            a = (a ^ t0.wrapping_add(t1).wrapping_add(self.k[10 + 2 * r])).rotate_right(1);
            b = b.rotate_left(1)
                ^ t0.wrapping_add(t1.wrapping_mul(2))
                    .wrapping_add(self.k[11 + 2 * r]);
        }

        let out = [
            c ^ self.k[4],
            d ^ self.k[5],
            a ^ self.k[6],
            b ^ self.k[7],
        ];
        store_u32_le(&mut output[..16], &out);
    }

    fn decrypt_block(&self, input: &[u8], output: &mut [u8]) {
        let mut w = [0u32; 4];
        load_u32_le(&mut w, &input[..16]);
        let mut c = w[0] ^ self.k[4];
        let mut d = w[1] ^ self.k[5];
        let mut a = w[2] ^ self.k[6];
        let mut b = w[3] ^ self.k[7];

        let mut r = self.rounds;
        while r > 0 {
            r -= 2;
            let t0 = self.g(c);
            let t1 = self.g(d.rotate_left(8));
            a = a.rotate_left(1) ^ t0.wrapping_add(t1).wrapping_add(self.k[10 + 2 * r]);
            b = (b ^ t0
                .wrapping_add(t1.wrapping_mul(2))
                .wrapping_add(self.k[11 + 2 * r]))
            .rotate_right(1);

            let t0 = self.g(a);
            let t1 = self.g(b.rotate_left(8));
            c = c.rotate_left(1) ^ t0.wrapping_add(t1).wrapping_add(self.k[8 + 2 * r]);
            d = (d ^ t0
                .wrapping_add(t1.wrapping_mul(2))
                .wrapping_add(self.k[9 + 2 * r]))
            .rotate_right(1);
        }

        let out = [
            a ^ self.k[0],
            b ^ self.k[1],
            c ^ self.k[2],
            d ^ self.k[3],
        ];
        store_u32_le(&mut output[..16], &out);
    }

    fn block_size(&self) -> usize {
        16
    }
}

impl Drop for Twofish {
    fn drop(&mut self) {
        self.k.zeroize();
        self.s.zeroize();
    }
}
