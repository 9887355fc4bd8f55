//! Symmetric cipher primitives.
//!
//! Block ciphers expose a keyed fixed-size permutation; stream ciphers
//! expose a seekable keystream XORed over arbitrary-length data. The
//! chaining rules that turn block ciphers into whole-stream transforms
//! live in [`crate::mode`].
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`rijndael`]  | Rijndael/AES, 16- or 32-byte blocks, native + extended (RHX) schedules |
//! | [`serpent`]   | Serpent, native + extended (SHX) schedules |
//! | [`twofish`]   | Twofish, native + extended (THX) schedules |
//! | [`salsa`]     | Salsa20 family |
//! | [`chacha`]    | ChaCha20 family |
//! | [`segmented`] | Block ciphers driven as segmented-counter stream modules (RSM/TSM) |
//! | [`hx`]        | KDF round-key expansion shared by the extended schedules |

pub mod chacha;
pub(crate) mod hx;
pub mod rijndael;
pub mod salsa;
pub mod segmented;
pub mod serpent;
pub mod twofish;

pub use chacha::ChaCha20;
pub use rijndael::Rijndael;
pub use salsa::Salsa20;
pub use segmented::SegmentedCounter;
pub use serpent::Serpent;
pub use twofish::Twofish;

use std::sync::Arc;

use crate::description::{CipherDescription, CipherEngine};
use crate::{Error, Result};

/// A keyed permutation over fixed-size blocks.
///
/// Implementations are immutable after construction, so a schedule can
/// be shared read-only across worker threads.
pub trait BlockCipher: Send + Sync {
    /// Encrypt one block; `input` and `output` hold at least
    /// [`block_size`](Self::block_size) bytes.
    fn encrypt_block(&self, input: &[u8], output: &mut [u8]);

    /// Decrypt one block.
    fn decrypt_block(&self, input: &[u8], output: &mut [u8]);

    /// Block size in bytes (16 or 32).
    fn block_size(&self) -> usize;
}

/// A keystream generator applied by XOR, seekable by keystream block.
pub trait StreamCipher: Send {
    /// XOR the keystream over `input` into `output` (equal lengths).
    fn apply_keystream(&mut self, input: &[u8], output: &mut [u8]);

    /// Position the keystream at the given block index, discarding any
    /// partially consumed block.
    fn seek_block(&mut self, block: u64);

    /// The block index the next generated block will use.
    fn block_pos(&self) -> u64;

    /// Keystream block size in bytes (the seek granularity).
    fn keystream_block(&self) -> usize;

    /// An independent copy at the same position, for parallel splits.
    fn fork(&self) -> Box<dyn StreamCipher>;
}

/// Construct the block cipher a description names, keyed with `key`.
pub(crate) fn build_block_cipher(
    desc: &CipherDescription,
    key: &[u8],
) -> Result<Box<dyn BlockCipher>> {
    match desc.engine {
        CipherEngine::Rdx => Ok(Box::new(Rijndael::new(key, desc.block_size as usize)?)),
        CipherEngine::Serpent => Ok(Box::new(Serpent::new(key)?)),
        CipherEngine::Twofish => Ok(Box::new(Twofish::new(key)?)),
        CipherEngine::Rhx => Ok(Box::new(Rijndael::new_extended(
            key,
            desc.block_size as usize,
            desc.rounds as usize,
            desc.kdf_digest,
        )?)),
        CipherEngine::Shx => Ok(Box::new(Serpent::new_extended(
            key,
            desc.rounds as usize,
            desc.kdf_digest,
        )?)),
        CipherEngine::Thx => Ok(Box::new(Twofish::new_extended(
            key,
            desc.rounds as usize,
            desc.kdf_digest,
        )?)),
        _ => Err(Error::InvalidArgument("engine is not a block cipher")),
    }
}

/// Construct the stream cipher a description names.
///
/// The RSM/TSM stream modules run the extended Rijndael/Twofish cores
/// under a segmented big-endian counter seeded from the block-sized IV;
/// Salsa/ChaCha take the 8-byte nonce directly.
pub(crate) fn build_stream_cipher(
    desc: &CipherDescription,
    key: &[u8],
    iv: &[u8],
) -> Result<Box<dyn StreamCipher>> {
    match desc.engine {
        CipherEngine::Salsa => Ok(Box::new(Salsa20::new(key, iv, desc.rounds as usize)?)),
        CipherEngine::ChaCha => Ok(Box::new(ChaCha20::new(key, iv, desc.rounds as usize)?)),
        CipherEngine::Rsm => {
            let cipher: Arc<dyn BlockCipher> = if key.len() >= 64 {
                Arc::new(Rijndael::new_extended(
                    key,
                    desc.block_size as usize,
                    desc.rounds as usize,
                    desc.kdf_digest,
                )?)
            } else {
                Arc::new(Rijndael::new(key, desc.block_size as usize)?)
            };
            Ok(Box::new(SegmentedCounter::new(cipher, iv)?))
        }
        CipherEngine::Tsm => {
            let cipher: Arc<dyn BlockCipher> = if key.len() >= 64 {
                Arc::new(Twofish::new_extended(
                    key,
                    desc.rounds as usize,
                    desc.kdf_digest,
                )?)
            } else {
                Arc::new(Twofish::new(key)?)
            };
            Ok(Box::new(SegmentedCounter::new(cipher, iv)?))
        }
        _ => Err(Error::InvalidArgument("engine is not a stream cipher")),
    }
}
