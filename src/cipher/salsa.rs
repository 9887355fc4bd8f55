//! Salsa20 stream cipher family.
//!
//! The 16-word state holds the four expansion constants on the main
//! diagonal, the key halves, a 64-bit block counter (words 8-9), and
//! the 8-byte nonce (words 6-7). Each 64-byte keystream block is the
//! state run through `rounds / 2` double rounds and added back to the
//! initial state.
//!
//! Key sizes 16 and 32 use the standard "expand N-byte k" constants
//! (a 16-byte key is used for both halves). The extended 48- and
//! 56-byte keys supply the constant words from bytes 32..48 and, for
//! 56-byte keys, pre-load the block counter from bytes 48..56.

use zeroize::Zeroize;

use crate::cipher::StreamCipher;
use crate::utils::load_u32_le;
use crate::{Error, Result};

const SIGMA: &[u8; 16] = b"expand 32-byte k";
const TAU: &[u8; 16] = b"expand 16-byte k";

/// Keystream block size shared by the Salsa/ChaCha family.
pub(crate) const KEYSTREAM_BLOCK: usize = 64;

/// Validate a family round count: even, 8 to 30.
pub(crate) fn check_rounds(rounds: usize) -> Result<usize> {
    if !(8..=30).contains(&rounds) || rounds % 2 != 0 {
        return Err(Error::InvalidArgument("stream rounds must be even, 8-30"));
    }
    Ok(rounds)
}

/// Split key material into (cipher key, constants, counter preload).
pub(crate) fn split_extended_key(key: &[u8]) -> Result<(&[u8], [u32; 4], u64)> {
    match key.len() {
        16 => {
            let mut c = [0u32; 4];
            load_u32_le(&mut c, TAU);
            Ok((key, c, 0))
        }
        32 => {
            let mut c = [0u32; 4];
            load_u32_le(&mut c, SIGMA);
            Ok((key, c, 0))
        }
        48 | 56 => {
            let mut c = [0u32; 4];
            load_u32_le(&mut c, &key[32..48]);
            let counter = if key.len() == 56 {
                u64::from_le_bytes(key[48..56].try_into().unwrap())
            } else {
                0
            };
            Ok((&key[..32], c, counter))
        }
        _ => Err(Error::InvalidArgument("stream key must be 16/32/48/56 bytes")),
    }
}

#[derive(Clone)]
pub struct Salsa20 {
    state: [u32; 16],
    rounds: usize,
    buffer: [u8; KEYSTREAM_BLOCK],
    /// Next unread byte in `buffer`; 64 means empty.
    buffer_pos: usize,
}

impl Salsa20 {
    /// Create from a 16/32/48/56-byte key and an 8-byte nonce.
    pub fn new(key: &[u8], nonce: &[u8], rounds: usize) -> Result<Self> {
        let rounds = check_rounds(rounds)?;
        if nonce.len() != 8 {
            return Err(Error::InvalidArgument("Salsa20 nonce must be 8 bytes"));
        }
        let (key, constants, counter) = split_extended_key(key)?;

        let mut state = [0u32; 16];
        state[0] = constants[0];
        load_u32_le(&mut state[1..5], &key[..16]);
        state[5] = constants[1];
        load_u32_le(&mut state[6..8], nonce);
        state[8] = counter as u32;
        state[9] = (counter >> 32) as u32;
        state[10] = constants[2];
        load_u32_le(&mut state[11..15], &key[key.len() - 16..]);
        state[15] = constants[3];

        Ok(Self {
            state,
            rounds,
            buffer: [0; KEYSTREAM_BLOCK],
            buffer_pos: KEYSTREAM_BLOCK,
        })
    }

    fn next_block(&mut self) {
        let mut x = self.state;
        for _ in 0..self.rounds / 2 {
            // Column round.
            quarter(&mut x, 0, 4, 8, 12);
            quarter(&mut x, 5, 9, 13, 1);
            quarter(&mut x, 10, 14, 2, 6);
            quarter(&mut x, 15, 3, 7, 11);
            // Row round.
            quarter(&mut x, 0, 1, 2, 3);
            quarter(&mut x, 5, 6, 7, 4);
            quarter(&mut x, 10, 11, 8, 9);
            quarter(&mut x, 15, 12, 13, 14);
        }
        for (chunk, (xi, si)) in self
            .buffer
            .chunks_exact_mut(4)
            .zip(x.iter().zip(self.state.iter()))
        {
            chunk.copy_from_slice(&xi.wrapping_add(*si).to_le_bytes());
        }
        self.buffer_pos = 0;

        let (lo, carry) = self.state[8].overflowing_add(1);
        self.state[8] = lo;
        if carry {
            self.state[9] = self.state[9].wrapping_add(1);
        }
    }
}

#[inline]
fn quarter(x: &mut [u32; 16], a: usize, b: usize, c: usize, d: usize) {
    x[b] ^= x[a].wrapping_add(x[d]).rotate_left(7);
    x[c] ^= x[b].wrapping_add(x[a]).rotate_left(9);
    x[d] ^= x[c].wrapping_add(x[b]).rotate_left(13);
    x[a] ^= x[d].wrapping_add(x[c]).rotate_left(18);
}

impl StreamCipher for Salsa20 {
    fn apply_keystream(&mut self, input: &[u8], output: &mut [u8]) {
        debug_assert_eq!(input.len(), output.len());
        for (i, o) in input.iter().zip(output.iter_mut()) {
            if self.buffer_pos == KEYSTREAM_BLOCK {
                self.next_block();
            }
            *o = i ^ self.buffer[self.buffer_pos];
            self.buffer_pos += 1;
        }
    }

    fn seek_block(&mut self, block: u64) {
        self.state[8] = block as u32;
        self.state[9] = (block >> 32) as u32;
        self.buffer_pos = KEYSTREAM_BLOCK;
    }

    fn block_pos(&self) -> u64 {
        (self.state[8] as u64) | ((self.state[9] as u64) << 32)
    }

    fn keystream_block(&self) -> usize {
        KEYSTREAM_BLOCK
    }

    fn fork(&self) -> Box<dyn StreamCipher> {
        Box::new(self.clone())
    }
}

impl Drop for Salsa20 {
    fn drop(&mut self) {
        self.state.zeroize();
        self.buffer.zeroize();
    }
}
