//! ChaCha20 stream cipher family.
//!
//! Same construction as [`Salsa20`](crate::cipher::Salsa20) with the
//! rearranged state (constants in row 0, key in rows 1-2, counter and
//! nonce in row 3) and the add-XOR-rotate quarter round applied to
//! columns then diagonals. The block counter is the 64-bit pair in
//! words 12-13; the 8-byte nonce fills words 14-15.

use zeroize::Zeroize;

use crate::cipher::salsa::{check_rounds, split_extended_key, KEYSTREAM_BLOCK};
use crate::cipher::StreamCipher;
use crate::utils::load_u32_le;
use crate::{Error, Result};

#[derive(Clone)]
pub struct ChaCha20 {
    state: [u32; 16],
    rounds: usize,
    buffer: [u8; KEYSTREAM_BLOCK],
    buffer_pos: usize,
}

impl ChaCha20 {
    /// Create from a 16/32/48/56-byte key and an 8-byte nonce.
    pub fn new(key: &[u8], nonce: &[u8], rounds: usize) -> Result<Self> {
        let rounds = check_rounds(rounds)?;
        if nonce.len() != 8 {
            return Err(Error::InvalidArgument("ChaCha20 nonce must be 8 bytes"));
        }
        let (key, constants, counter) = split_extended_key(key)?;

        let mut state = [0u32; 16];
        state[..4].copy_from_slice(&constants);
        // A 16-byte key fills both halves, as in the Salsa layout.
        load_u32_le(&mut state[4..8], &key[..16]);
        load_u32_le(&mut state[8..12], &key[key.len() - 16..]);
        state[12] = counter as u32;
        state[13] = (counter >> 32) as u32;
        load_u32_le(&mut state[14..16], nonce);

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
            quarter(&mut x, 1, 5, 9, 13);
            quarter(&mut x, 2, 6, 10, 14);
            quarter(&mut x, 3, 7, 11, 15);
            // Diagonal round.
            quarter(&mut x, 0, 5, 10, 15);
            quarter(&mut x, 1, 6, 11, 12);
            quarter(&mut x, 2, 7, 8, 13);
            quarter(&mut x, 3, 4, 9, 14);
        }
        for (chunk, (xi, si)) in self
            .buffer
            .chunks_exact_mut(4)
            .zip(x.iter().zip(self.state.iter()))
        {
            chunk.copy_from_slice(&xi.wrapping_add(*si).to_le_bytes());
        }
        self.buffer_pos = 0;

        let (lo, carry) = self.state[12].overflowing_add(1);
        self.state[12] = lo;
        if carry {
            self.state[13] = self.state[13].wrapping_add(1);
        }
    }
}

#[inline]
fn quarter(x: &mut [u32; 16], a: usize, b: usize, c: usize, d: usize) {
    x[a] = x[a].wrapping_add(x[b]);
    x[d] = (x[d] ^ x[a]).rotate_left(16);
    x[c] = x[c].wrapping_add(x[d]);
    x[b] = (x[b] ^ x[c]).rotate_left(12);
    x[a] = x[a].wrapping_add(x[b]);
    x[d] = (x[d] ^ x[a]).rotate_left(8);
    x[c] = x[c].wrapping_add(x[d]);
    x[b] = (x[b] ^ x[c]).rotate_left(7);
}

impl StreamCipher for ChaCha20 {
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
        self.state[12] = block as u32;
        self.state[13] = (block >> 32) as u32;
        self.buffer_pos = KEYSTREAM_BLOCK;
    }

    fn block_pos(&self) -> u64 {
        (self.state[12] as u64) | ((self.state[13] as u64) << 32)
    }

    fn keystream_block(&self) -> usize {
        KEYSTREAM_BLOCK
    }

    fn fork(&self) -> Box<dyn StreamCipher> {
        Box::new(self.clone())
    }
}

impl Drop for ChaCha20 {
    fn drop(&mut self) {
        self.state.zeroize();
        self.buffer.zeroize();
    }
}
