//! Output feedback.
//!
//! The keystream is the cipher iterated over its own output, so both
//! directions are identical and nothing about a block can be computed
//! without the preceding keystream block; the mode never parallelizes.
//! The final region may be shorter than a block.

use zeroize::Zeroize;

use crate::cipher::BlockCipher;
use crate::mode::CipherMode;

pub struct Ofb {
    cipher: Box<dyn BlockCipher>,
    keystream: [u8; 32],
}

impl Ofb {
    pub fn new(cipher: Box<dyn BlockCipher>, iv: &[u8]) -> Self {
        let mut keystream = [0u8; 32];
        keystream[..iv.len()].copy_from_slice(iv);
        Self { cipher, keystream }
    }

    fn advance(&mut self) {
        let block = self.cipher.block_size();
        let mut next = [0u8; 32];
        self.cipher
            .encrypt_block(&self.keystream[..block], &mut next[..block]);
        self.keystream[..block].copy_from_slice(&next[..block]);
        next.zeroize();
    }
}

impl CipherMode for Ofb {
    fn block_size(&self) -> usize {
        self.cipher.block_size()
    }

    fn supports_parallel(&self) -> bool {
        false
    }

    fn transform(&mut self, input: &[u8], output: &mut [u8]) {
        debug_assert_eq!(input.len(), output.len());
        let block = self.cipher.block_size();
        for (inb, outb) in input.chunks_exact(block).zip(output.chunks_exact_mut(block)) {
            self.advance();
            for i in 0..block {
                outb[i] = inb[i] ^ self.keystream[i];
            }
        }
    }

    fn transform_tail(&mut self, input: &[u8], output: &mut [u8]) {
        debug_assert_eq!(input.len(), output.len());
        let block = self.cipher.block_size();
        let whole = input.len() / block * block;
        self.transform(&input[..whole], &mut output[..whole]);
        if whole < input.len() {
            self.advance();
            for i in 0..input.len() - whole {
                output[whole + i] = input[whole + i] ^ self.keystream[i];
            }
        }
    }

    fn transform_parallel(&mut self, input: &[u8], output: &mut [u8], _pool: &rayon::ThreadPool) {
        // Feedback chaining admits no fan-out.
        self.transform(input, output);
    }
}

impl Drop for Ofb {
    fn drop(&mut self) {
        self.keystream.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::Rijndael;

    fn aes(key: &[u8; 16], iv: &[u8; 16]) -> Ofb {
        Ofb::new(Box::new(Rijndael::new(key, 16).unwrap()), iv)
    }

    #[test]
    fn round_trip_with_short_tail() {
        let key = [0x0Fu8; 16];
        let iv = [0xF0u8; 16];
        let pt: Vec<u8> = (0u16..75).map(|i| (i % 256) as u8).collect();

        let mut enc = aes(&key, &iv);
        let mut ct = vec![0u8; pt.len()];
        enc.transform_tail(&pt, &mut ct);

        let mut dec = aes(&key, &iv);
        let mut back = vec![0u8; pt.len()];
        dec.transform_tail(&ct, &mut back);
        assert_eq!(back, pt);
    }

    #[test]
    fn encrypt_and_decrypt_are_identical() {
        let key = [0x2Au8; 16];
        let iv = [0x3Cu8; 16];
        let data = [0x55u8; 64];

        let mut a = aes(&key, &iv);
        let mut b = aes(&key, &iv);
        let mut out_a = [0u8; 64];
        let mut out_b = [0u8; 64];
        a.transform(&data, &mut out_a);
        b.transform(&data, &mut out_b);
        assert_eq!(out_a, out_b);
    }
}
