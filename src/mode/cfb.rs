//! Cipher feedback (full-block).
//!
//! Both directions XOR the input with `E(register)`; encryption feeds
//! the new ciphertext back into the register, decryption feeds the old
//! one. Only the forward permutation of the cipher is used.

use rayon::prelude::*;

use zeroize::Zeroize;

use crate::cipher::BlockCipher;
use crate::mode::{chunk_bytes, CipherMode, Direction};

pub struct Cfb {
    cipher: Box<dyn BlockCipher>,
    register: [u8; 32],
    direction: Direction,
}

impl Cfb {
    pub fn new(cipher: Box<dyn BlockCipher>, direction: Direction, iv: &[u8]) -> Self {
        let mut register = [0u8; 32];
        register[..iv.len()].copy_from_slice(iv);
        Self {
            cipher,
            register,
            direction,
        }
    }
}

impl CipherMode for Cfb {
    fn block_size(&self) -> usize {
        self.cipher.block_size()
    }

    fn supports_parallel(&self) -> bool {
        self.direction == Direction::Decrypt
    }

    fn transform(&mut self, input: &[u8], output: &mut [u8]) {
        debug_assert_eq!(input.len(), output.len());
        let block = self.cipher.block_size();
        let mut keystream = [0u8; 32];
        for (inb, outb) in input.chunks_exact(block).zip(output.chunks_exact_mut(block)) {
            self.cipher
                .encrypt_block(&self.register[..block], &mut keystream[..block]);
            for i in 0..block {
                outb[i] = inb[i] ^ keystream[i];
            }
            let feedback = match self.direction {
                Direction::Encrypt => &*outb,
                Direction::Decrypt => inb,
            };
            self.register[..block].copy_from_slice(feedback);
        }
        keystream.zeroize();
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
        let register = self.register;
        let cipher = self.cipher.as_ref();

        pool.install(|| {
            output
                .par_chunks_mut(chunk)
                .enumerate()
                .for_each(|(ci, out_chunk)| {
                    let start = ci * chunk;
                    let in_chunk = &input[start..start + out_chunk.len()];
                    let mut prev: &[u8] = if start == 0 {
                        &register[..block]
                    } else {
                        &input[start - block..start]
                    };
                    let mut keystream = [0u8; 32];
                    for (inb, outb) in in_chunk
                        .chunks_exact(block)
                        .zip(out_chunk.chunks_exact_mut(block))
                    {
                        cipher.encrypt_block(prev, &mut keystream[..block]);
                        for i in 0..block {
                            outb[i] = inb[i] ^ keystream[i];
                        }
                        prev = inb;
                    }
                    keystream.zeroize();
                });
        });

        self.register[..block].copy_from_slice(&input[input.len() - block..]);
    }
}

impl Drop for Cfb {
    fn drop(&mut self) {
        self.register.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::{Serpent, Twofish};

    #[test]
    fn round_trip_both_ciphers() {
        let key = [0x31u8; 16];
        let iv = [0x07u8; 16];
        let pt: Vec<u8> = (0u16..320).map(|i| (i % 256) as u8).collect();

        let ciphers: Vec<(Box<dyn BlockCipher>, Box<dyn BlockCipher>)> = vec![
            (
                Box::new(Serpent::new(&key).unwrap()),
                Box::new(Serpent::new(&key).unwrap()),
            ),
            (
                Box::new(Twofish::new(&key).unwrap()),
                Box::new(Twofish::new(&key).unwrap()),
            ),
        ];

        for (c_enc, c_dec) in ciphers {
            let mut enc = Cfb::new(c_enc, Direction::Encrypt, &iv);
            let mut ct = vec![0u8; pt.len()];
            enc.transform(&pt, &mut ct);
            assert_ne!(ct, pt);

            let mut dec = Cfb::new(c_dec, Direction::Decrypt, &iv);
            let mut back = vec![0u8; pt.len()];
            dec.transform(&ct, &mut back);
            assert_eq!(back, pt);
        }
    }

    #[test]
    fn parallel_decrypt_matches_sequential() {
        let key = [0x61u8; 16];
        let iv = [0x45u8; 16];
        let pt: Vec<u8> = (0u32..2048).map(|i| (i * 13 % 256) as u8).collect();

        let mut enc = Cfb::new(
            Box::new(Twofish::new(&key).unwrap()),
            Direction::Encrypt,
            &iv,
        );
        let mut ct = vec![0u8; pt.len()];
        enc.transform(&pt, &mut ct);

        let mut seq = Cfb::new(
            Box::new(Twofish::new(&key).unwrap()),
            Direction::Decrypt,
            &iv,
        );
        let mut expected = vec![0u8; pt.len()];
        seq.transform(&ct, &mut expected);

        for threads in [1usize, 2, 4, 8] {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .unwrap();
            let mut par = Cfb::new(
                Box::new(Twofish::new(&key).unwrap()),
                Direction::Decrypt,
                &iv,
            );
            let mut got = vec![0u8; pt.len()];
            par.transform_parallel(&ct, &mut got, &pool);
            assert_eq!(got, expected, "{threads} threads");
        }
    }
}
