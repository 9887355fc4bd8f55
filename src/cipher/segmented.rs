//! Block ciphers driven as stream modules.
//!
//! A [`SegmentedCounter`] owns a shared block-cipher schedule and a
//! block-sized big-endian counter seeded from the IV. Each keystream
//! block is the encryption of `base + block_index`, so any position can
//! be generated independently; that makes the module seekable and
//! embarrassingly parallel, the same way the Salsa/ChaCha counters are.

use std::sync::Arc;

use zeroize::Zeroize;

use crate::cipher::{BlockCipher, StreamCipher};
use crate::utils::add_be;
use crate::{Error, Result};

const MAX_BLOCK: usize = 32;

pub struct SegmentedCounter {
    cipher: Arc<dyn BlockCipher>,
    /// Counter value at block index 0, from the IV.
    base: [u8; MAX_BLOCK],
    block_index: u64,
    buffer: [u8; MAX_BLOCK],
    buffer_pos: usize,
}

impl SegmentedCounter {
    /// Wrap `cipher` with a counter seeded from `iv`, which must be
    /// exactly one block.
    pub fn new(cipher: Arc<dyn BlockCipher>, iv: &[u8]) -> Result<Self> {
        let block = cipher.block_size();
        if iv.len() != block {
            return Err(Error::InvalidArgument("counter IV must be one block"));
        }
        let mut base = [0u8; MAX_BLOCK];
        base[..block].copy_from_slice(iv);
        Ok(Self {
            cipher,
            base,
            block_index: 0,
            buffer: [0; MAX_BLOCK],
            buffer_pos: block,
        })
    }

    fn next_block(&mut self) {
        let block = self.cipher.block_size();
        let mut counter = [0u8; MAX_BLOCK];
        counter[..block].copy_from_slice(&self.base[..block]);
        add_be(&mut counter[..block], self.block_index);
        let mut keystream = [0u8; MAX_BLOCK];
        self.cipher
            .encrypt_block(&counter[..block], &mut keystream[..block]);
        self.buffer[..block].copy_from_slice(&keystream[..block]);
        self.buffer_pos = 0;
        self.block_index = self.block_index.wrapping_add(1);
        counter.zeroize();
        keystream.zeroize();
    }
}

impl StreamCipher for SegmentedCounter {
    fn apply_keystream(&mut self, input: &[u8], output: &mut [u8]) {
        debug_assert_eq!(input.len(), output.len());
        let block = self.cipher.block_size();
        for (i, o) in input.iter().zip(output.iter_mut()) {
            if self.buffer_pos == block {
                self.next_block();
            }
            *o = i ^ self.buffer[self.buffer_pos];
            self.buffer_pos += 1;
        }
    }

    fn seek_block(&mut self, block: u64) {
        self.block_index = block;
        self.buffer_pos = self.cipher.block_size();
    }

    fn block_pos(&self) -> u64 {
        self.block_index
    }

    fn keystream_block(&self) -> usize {
        self.cipher.block_size()
    }

    fn fork(&self) -> Box<dyn StreamCipher> {
        Box::new(Self {
            cipher: Arc::clone(&self.cipher),
            base: self.base,
            block_index: self.block_index,
            buffer: [0; MAX_BLOCK],
            buffer_pos: self.cipher.block_size(),
        })
    }
}

impl Drop for SegmentedCounter {
    fn drop(&mut self) {
        self.base.zeroize();
        self.buffer.zeroize();
    }
}
