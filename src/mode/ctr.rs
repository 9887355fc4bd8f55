//! Big-endian counter mode.
//!
//! The counter is a block-sized big-endian integer initialized from the
//! IV and incremented by one per block, wrapping at the block width.
//! Every keystream block is a pure function of the starting counter and
//! the block index, so both directions parallelize by assigning each
//! worker chunk its own counter offset.

use rayon::prelude::*;

use zeroize::Zeroize;

use crate::cipher::BlockCipher;
use crate::mode::{chunk_bytes, CipherMode};
use crate::utils::{add_be, increment_be};

pub struct Ctr {
    cipher: Box<dyn BlockCipher>,
    counter: [u8; 32],
}

impl Ctr {
    pub fn new(cipher: Box<dyn BlockCipher>, iv: &[u8]) -> Self {
        let mut counter = [0u8; 32];
        counter[..iv.len()].copy_from_slice(iv);
        Self { cipher, counter }
    }

    /// The current counter value (for monotonicity checks).
    pub fn counter(&self) -> &[u8] {
        &self.counter[..self.cipher.block_size()]
    }
}

impl CipherMode for Ctr {
    fn block_size(&self) -> usize {
        self.cipher.block_size()
    }

    fn supports_parallel(&self) -> bool {
        true
    }

    fn transform(&mut self, input: &[u8], output: &mut [u8]) {
        debug_assert_eq!(input.len(), output.len());
        let block = self.cipher.block_size();
        let mut keystream = [0u8; 32];
        for (inb, outb) in input.chunks_exact(block).zip(output.chunks_exact_mut(block)) {
            self.cipher
                .encrypt_block(&self.counter[..block], &mut keystream[..block]);
            for i in 0..block {
                outb[i] = inb[i] ^ keystream[i];
            }
            increment_be(&mut self.counter[..block]);
        }
        keystream.zeroize();
    }

    fn transform_tail(&mut self, input: &[u8], output: &mut [u8]) {
        debug_assert_eq!(input.len(), output.len());
        let block = self.cipher.block_size();
        let whole = input.len() / block * block;
        self.transform(&input[..whole], &mut output[..whole]);
        if whole < input.len() {
            let mut keystream = [0u8; 32];
            self.cipher
                .encrypt_block(&self.counter[..block], &mut keystream[..block]);
            for i in 0..input.len() - whole {
                output[whole + i] = input[whole + i] ^ keystream[i];
            }
            increment_be(&mut self.counter[..block]);
            keystream.zeroize();
        }
    }

    fn transform_parallel(&mut self, input: &[u8], output: &mut [u8], pool: &rayon::ThreadPool) {
        let block = self.cipher.block_size();
        if input.is_empty() {
            return;
        }
        let chunk = chunk_bytes(input.len() / block, block, pool.current_num_threads());
        let base = self.counter;
        let cipher = self.cipher.as_ref();

        pool.install(|| {
            output
                .par_chunks_mut(chunk)
                .enumerate()
                .for_each(|(ci, out_chunk)| {
                    let start = ci * chunk;
                    let in_chunk = &input[start..start + out_chunk.len()];
                    let mut counter = base;
                    add_be(&mut counter[..block], (start / block) as u64);
                    let mut keystream = [0u8; 32];
                    for (inb, outb) in in_chunk
                        .chunks_exact(block)
                        .zip(out_chunk.chunks_exact_mut(block))
                    {
                        cipher.encrypt_block(&counter[..block], &mut keystream[..block]);
                        for i in 0..block {
                            outb[i] = inb[i] ^ keystream[i];
                        }
                        increment_be(&mut counter[..block]);
                    }
                    counter.zeroize();
                    keystream.zeroize();
                });
        });

        add_be(&mut self.counter[..block], (input.len() / block) as u64);
    }
}

impl Drop for Ctr {
    fn drop(&mut self) {
        self.counter.zeroize();
    }
}
