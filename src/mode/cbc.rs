//! Cipher block chaining.
//!
//! Encrypt: `out = E(in ^ prev_ct)`, carrying the new ciphertext block.
//! Decrypt: `out = D(in) ^ prev_ct`, carrying the old ciphertext block.
//! Decryption parallelizes because every block's chain value is the
//! preceding ciphertext block, already present in the input region.

use rayon::prelude::*;

use zeroize::Zeroize;

use crate::cipher::BlockCipher;
use crate::mode::{chunk_bytes, CipherMode, Direction};

pub struct Cbc {
    cipher: Box<dyn BlockCipher>,
    chain: [u8; 32],
    direction: Direction,
}

impl Cbc {
    pub fn new(cipher: Box<dyn BlockCipher>, direction: Direction, iv: &[u8]) -> Self {
        let mut chain = [0u8; 32];
        chain[..iv.len()].copy_from_slice(iv);
        Self {
            cipher,
            chain,
            direction,
        }
    }

    fn encrypt(&mut self, input: &[u8], output: &mut [u8]) {
        let block = self.cipher.block_size();
        let mut x = [0u8; 32];
        for (inb, outb) in input.chunks_exact(block).zip(output.chunks_exact_mut(block)) {
            for i in 0..block {
                x[i] = inb[i] ^ self.chain[i];
            }
            self.cipher.encrypt_block(&x[..block], outb);
            self.chain[..block].copy_from_slice(outb);
        }
        x.zeroize();
    }

    fn decrypt(&mut self, input: &[u8], output: &mut [u8]) {
        let block = self.cipher.block_size();
        let mut tmp = [0u8; 32];
        for (inb, outb) in input.chunks_exact(block).zip(output.chunks_exact_mut(block)) {
            self.cipher.decrypt_block(inb, &mut tmp[..block]);
            for i in 0..block {
                outb[i] = tmp[i] ^ self.chain[i];
            }
            self.chain[..block].copy_from_slice(inb);
        }
        tmp.zeroize();
    }
}

impl CipherMode for Cbc {
    fn block_size(&self) -> usize {
        self.cipher.block_size()
    }

    fn supports_parallel(&self) -> bool {
        self.direction == Direction::Decrypt
    }

    fn transform(&mut self, input: &[u8], output: &mut [u8]) {
        debug_assert_eq!(input.len(), output.len());
        debug_assert_eq!(input.len() % self.cipher.block_size(), 0);
        match self.direction {
            Direction::Encrypt => self.encrypt(input, output),
            Direction::Decrypt => self.decrypt(input, output),
        }
    }

    fn transform_tail(&mut self, input: &[u8], output: &mut [u8]) {
        self.transform(input, output);
    }

    fn transform_parallel(&mut self, input: &[u8], output: &mut [u8], pool: &rayon::ThreadPool) {
        debug_assert_eq!(self.direction, Direction::Decrypt);
        let block = self.cipher.block_size();
        if input.is_empty() {
            return;
        }
        let chunk = chunk_bytes(input.len() / block, block, pool.current_num_threads());
        let chain = self.chain;
        let cipher = self.cipher.as_ref();

        pool.install(|| {
            output
                .par_chunks_mut(chunk)
                .enumerate()
                .for_each(|(ci, out_chunk)| {
                    let start = ci * chunk;
                    let in_chunk = &input[start..start + out_chunk.len()];
                    let mut prev: &[u8] = if start == 0 {
                        &chain[..block]
                    } else {
                        &input[start - block..start]
                    };
                    let mut tmp = [0u8; 32];
                    for (inb, outb) in in_chunk
                        .chunks_exact(block)
                        .zip(out_chunk.chunks_exact_mut(block))
                    {
                        cipher.decrypt_block(inb, &mut tmp[..block]);
                        for i in 0..block {
                            outb[i] = tmp[i] ^ prev[i];
                        }
                        prev = inb;
                    }
                    tmp.zeroize();
                });
        });

        self.chain[..block].copy_from_slice(&input[input.len() - block..]);
    }
}

impl Drop for Cbc {
    fn drop(&mut self) {
        self.chain.zeroize();
    }
}
