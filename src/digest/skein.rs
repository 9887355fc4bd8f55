//! Skein digests: UBI chaining over [`Threefish`].
//!
//! The state equals the cipher block (256/512/1024 bits) and is derived
//! from a configuration block carrying the schema identifier, version,
//! and output size. Each message block is encrypted with the current
//! state as key and the UBI tweak, then XORed back with the plaintext
//! block (Matyas-Meyer-Oseas feed-forward). An output phase rekeys with
//! the final state and encrypts incrementing counter blocks until the
//! digest is filled.

use zeroize::Zeroize;

use crate::digest::{Digest, Threefish};
use crate::utils::{check_capacity, load_u64_le, store_u64_le};
use crate::{Error, Result};

const TYPE_CONFIG: u8 = 4;
const TYPE_MESSAGE: u8 = 48;
const TYPE_OUT: u8 = 63;

/// The 128-bit UBI tweak: processed-byte position in the low word,
/// block type and first/final flags in the high word. The third tweak
/// word Threefish derives is always `t0 ^ t1`.
#[derive(Clone, Copy)]
pub(crate) struct UbiTweak {
    position: u64,
    block_type: u8,
    first: bool,
    last: bool,
}

impl UbiTweak {
    fn new(block_type: u8) -> Self {
        Self {
            position: 0,
            block_type,
            first: true,
            last: false,
        }
    }

    fn words(&self) -> [u64; 2] {
        let mut t1 = (self.block_type as u64) << 56;
        if self.first {
            t1 |= 1 << 62;
        }
        if self.last {
            t1 |= 1 << 63;
        }
        [self.position, t1]
    }
}

/// How a Skein context derives its starting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkeinInitialization {
    /// Derive the state from the configuration block.
    Normal,
    /// Start from an all-zero state with no configuration pass.
    ZeroedState,
    /// Reuse a caller-provided chain value as-is.
    ChainedState,
    /// Re-derive the configuration using a prior chain value as key.
    ChainedConfig,
}

/// Skein digest over a 256-, 512-, or 1024-bit Threefish block.
pub struct Skein {
    cipher: Threefish,
    state: Vec<u64>,
    /// Chain value restored by `reset`.
    initial: Vec<u64>,
    buffer: Vec<u8>,
    buflen: usize,
    tweak: UbiTweak,
    digest_size: usize,
}

impl Skein {
    /// Create a context with `state_bits` ∈ {256, 512, 1024} and an
    /// output of `output_bits` (a positive multiple of 8).
    pub fn new(state_bits: usize, output_bits: usize) -> Result<Self> {
        Self::with_initialization(state_bits, output_bits, SkeinInitialization::Normal, None)
    }

    /// Create a context with an explicit initialization mode.
    ///
    /// `chain` supplies the prior chain value for the `Chained*` modes
    /// and must hold `state_bits / 64` words.
    pub fn with_initialization(
        state_bits: usize,
        output_bits: usize,
        init: SkeinInitialization,
        chain: Option<&[u64]>,
    ) -> Result<Self> {
        if output_bits == 0 || output_bits % 8 != 0 {
            return Err(Error::InvalidArgument("Skein output must be whole bytes"));
        }
        let words = match state_bits {
            256 | 512 | 1024 => state_bits / 64,
            _ => return Err(Error::InvalidArgument("Skein state must be 256/512/1024 bits")),
        };

        let mut skein = Self {
            cipher: Threefish::new(words)?,
            state: vec![0; words],
            initial: vec![0; words],
            buffer: vec![0; words * 8],
            buflen: 0,
            tweak: UbiTweak::new(TYPE_MESSAGE),
            digest_size: output_bits / 8,
        };

        match init {
            SkeinInitialization::Normal => skein.process_config(output_bits),
            SkeinInitialization::ZeroedState => {}
            SkeinInitialization::ChainedState | SkeinInitialization::ChainedConfig => {
                let chain =
                    chain.ok_or(Error::InvalidArgument("chained init requires a chain value"))?;
                if chain.len() != words {
                    return Err(Error::InvalidArgument("chain value must match state size"));
                }
                skein.state.copy_from_slice(chain);
                if init == SkeinInitialization::ChainedConfig {
                    skein.process_config(output_bits);
                }
            }
        }

        skein.initial.copy_from_slice(&skein.state);
        Ok(skein)
    }

    fn block_bytes(&self) -> usize {
        self.cipher.words() * 8
    }

    /// Run the configuration block through UBI: schema "SHA3", version 1,
    /// output size in bits.
    fn process_config(&mut self, output_bits: usize) {
        let mut config = vec![0u8; self.block_bytes()];
        config[..4].copy_from_slice(b"SHA3");
        config[4..6].copy_from_slice(&1u16.to_le_bytes());
        config[8..16].copy_from_slice(&(output_bits as u64).to_le_bytes());

        self.tweak = UbiTweak::new(TYPE_CONFIG);
        self.process_block(&config, 32, true);
        self.tweak = UbiTweak::new(TYPE_MESSAGE);
    }

    /// One UBI step: advance the position, rekey with the current state,
    /// encrypt, and feed the plaintext block forward.
    fn process_block(&mut self, block: &[u8], byte_count: u64, last: bool) {
        self.tweak.position += byte_count;
        self.tweak.last = last;
        self.cipher
            .rekey(&self.state, self.tweak.words())
            .expect("state sized to cipher block");

        let mut w = [0u64; 16];
        let nw = self.cipher.words();
        load_u64_le(&mut w[..nw], block);
        let mut e = [0u64; 16];
        self.cipher.encrypt_words(&w[..nw], &mut e[..nw]);
        for i in 0..nw {
            self.state[i] = e[i] ^ w[i];
        }

        self.tweak.first = false;
        w.zeroize();
        e.zeroize();
    }
}

impl Digest for Skein {
    fn update(&mut self, mut data: &[u8]) {
        let block_bytes = self.block_bytes();
        while !data.is_empty() {
            // Flush a full buffer only once more input arrives, so the
            // final block is always processed with the final flag set.
            if self.buflen == block_bytes {
                let block = std::mem::take(&mut self.buffer);
                self.process_block(&block, block_bytes as u64, false);
                self.buffer = block;
                self.buflen = 0;
            }
            let take = data.len().min(block_bytes - self.buflen);
            self.buffer[self.buflen..self.buflen + take].copy_from_slice(&data[..take]);
            self.buflen += take;
            data = &data[take..];
        }
    }

    fn finish(&mut self, out: &mut [u8]) -> Result<usize> {
        check_capacity(out, self.digest_size)?;

        // Final message block, zero-padded; the position only advances by
        // the real message bytes.
        self.buffer[self.buflen..].fill(0);
        let count = self.buflen as u64;
        let block = std::mem::take(&mut self.buffer);
        self.process_block(&block, count, true);
        self.buffer = block;

        // Output phase: encrypt counter blocks keyed by the final state.
        let nw = self.cipher.words();
        let block_bytes = self.block_bytes();
        let mut chain = self.state.clone();
        let mut emitted = 0;
        let mut counter = 0u64;
        while emitted < self.digest_size {
            let mut tweak = UbiTweak::new(TYPE_OUT);
            tweak.position = 8;
            tweak.last = true;
            self.cipher
                .rekey(&chain, tweak.words())
                .expect("state sized to cipher block");

            let mut cnt = [0u64; 16];
            cnt[0] = counter;
            let mut e = [0u64; 16];
            self.cipher.encrypt_words(&cnt[..nw], &mut e[..nw]);
            e[0] ^= counter;

            let mut bytes = vec![0u8; block_bytes];
            store_u64_le(&mut bytes, &e[..nw]);
            let take = (self.digest_size - emitted).min(block_bytes);
            out[emitted..emitted + take].copy_from_slice(&bytes[..take]);
            bytes.zeroize();

            emitted += take;
            counter += 1;
        }
        chain.zeroize();

        self.reset();
        Ok(self.digest_size)
    }

    fn reset(&mut self) {
        self.state.copy_from_slice(&self.initial);
        self.buffer.zeroize();
        self.buflen = 0;
        self.tweak = UbiTweak::new(TYPE_MESSAGE);
    }

    fn block_size(&self) -> usize {
        self.block_bytes()
    }

    fn digest_size(&self) -> usize {
        self.digest_size
    }
}

impl Drop for Skein {
    fn drop(&mut self) {
        self.state.zeroize();
        self.initial.zeroize();
        self.buffer.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    fn digest_of(state_bits: usize, data: &[u8]) -> Vec<u8> {
        let mut d = Skein::new(state_bits, state_bits).unwrap();
        let mut out = vec![0u8; d.digest_size()];
        d.update(data);
        d.finish(&mut out).unwrap();
        out
    }

    // Vector from the Skein 1.3 submission appendix.
    #[test]
    fn skein512_single_ff_byte() {
        assert_eq!(
            digest_of(512, &[0xFF]),
            hex!(
                "71b7bce6fe6452227b9ced6014249e5bf9a9754c3ad618ccc4e0aaae01f8e6a2"
                "09ff6de03da32cd36cd9b2f59b08d09bc17cbf398fefbf5d179b4c52c04bbf0e"
            )
        );
    }

    #[test]
    fn digest_sizes() {
        for (bits, bytes) in [(256usize, 32usize), (512, 64), (1024, 128)] {
            let d = Skein::new(bits, bits).unwrap();
            assert_eq!(d.digest_size(), bytes);
            assert_eq!(d.block_size(), bytes);
        }
    }

    #[test]
    fn update_split_is_irrelevant() {
        let data: Vec<u8> = (0u16..700).map(|i| (i % 173) as u8).collect();
        let reference = digest_of(512, &data);
        for split in [1usize, 17, 63, 64, 65, 300] {
            let mut d = Skein::new(512, 512).unwrap();
            for chunk in data.chunks(split) {
                d.update(chunk);
            }
            let mut out = vec![0u8; 64];
            d.finish(&mut out).unwrap();
            assert_eq!(out, reference, "split {split}");
        }
    }

    #[test]
    fn finish_resets_context() {
        let mut d = Skein::new(256, 256).unwrap();
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        d.update(b"skein");
        d.finish(&mut a).unwrap();
        d.update(b"skein");
        d.finish(&mut b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn initialization_modes_differ() {
        let chain = [0x0123456789abcdefu64; 8];
        let mut normal = Skein::new(512, 512).unwrap();
        let mut zeroed =
            Skein::with_initialization(512, 512, SkeinInitialization::ZeroedState, None).unwrap();
        let mut chained = Skein::with_initialization(
            512,
            512,
            SkeinInitialization::ChainedState,
            Some(&chain),
        )
        .unwrap();

        let mut out = [[0u8; 64]; 3];
        for (d, out) in [&mut normal, &mut zeroed, &mut chained]
            .into_iter()
            .zip(out.iter_mut())
        {
            d.update(b"same message");
            d.finish(out).unwrap();
        }
        assert_ne!(out[0], out[1]);
        assert_ne!(out[0], out[2]);
        assert_ne!(out[1], out[2]);

        assert!(
            Skein::with_initialization(512, 512, SkeinInitialization::ChainedState, None).is_err()
        );
    }

    #[test]
    fn distinct_state_sizes_disagree() {
        assert_ne!(digest_of(256, b"x"), digest_of(512, b"x")[..32].to_vec());
    }
}
