//! Block cipher operating modes.
//!
//! A mode wraps a [`BlockCipher`](crate::cipher::BlockCipher) with the
//! chaining state that turns it into a whole-stream transform. All modes
//! share one contract: [`CipherMode::transform`] over whole blocks, plus
//! a tail entry point for the final short region of counter-style modes.
//!
//! | Mode | Encrypt | Decrypt | Parallelizable |
//! |------|---------|---------|----------------|
//! | CBC  | chained | chained | decrypt only |
//! | CFB  | chained | chained | decrypt only |
//! | OFB  | keystream feedback | same | never |
//! | CTR  | counter keystream | same | always |
//!
//! The parallel entry point splits the region across a fixed-size worker
//! pool; every block's result is a pure function of the input region and
//! the starting state, so the output is byte-identical to the sequential
//! path for any thread count.

pub mod cbc;
pub mod cfb;
pub mod ctr;
pub mod ofb;

pub use cbc::Cbc;
pub use cfb::Cfb;
pub use ctr::Ctr;
pub use ofb::Ofb;

use crate::description::{CipherDescription, OperatingMode};
use crate::cipher::build_block_cipher;
use crate::{Error, Result};

/// Transform direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

/// A block cipher composed with an operating mode.
pub trait CipherMode: Send {
    /// The wrapped cipher's block size in bytes.
    fn block_size(&self) -> usize;

    /// Whether `transform_parallel` is available for the configured
    /// direction.
    fn supports_parallel(&self) -> bool;

    /// Transform a whole number of blocks.
    fn transform(&mut self, input: &[u8], output: &mut [u8]);

    /// Transform the final region of the stream.
    ///
    /// Counter-style modes accept any length here; chained modes still
    /// require a whole block (the pipeline pads before calling).
    fn transform_tail(&mut self, input: &[u8], output: &mut [u8]);

    /// Transform a whole number of blocks across the worker pool.
    ///
    /// Callers must check [`supports_parallel`](Self::supports_parallel)
    /// first; the output matches `transform` byte for byte.
    fn transform_parallel(&mut self, input: &[u8], output: &mut [u8], pool: &rayon::ThreadPool);
}

/// Build the mode a description names around its block cipher.
pub(crate) fn build_mode(
    desc: &CipherDescription,
    key: &[u8],
    iv: &[u8],
    direction: Direction,
) -> Result<Box<dyn CipherMode>> {
    let cipher = build_block_cipher(desc, key)?;
    if iv.len() != cipher.block_size() {
        return Err(Error::InvalidArgument("IV must be one cipher block"));
    }
    match desc.mode {
        OperatingMode::Cbc => Ok(Box::new(Cbc::new(cipher, direction, iv))),
        OperatingMode::Cfb => Ok(Box::new(Cfb::new(cipher, direction, iv))),
        OperatingMode::Ofb => Ok(Box::new(Ofb::new(cipher, iv))),
        OperatingMode::Ctr => Ok(Box::new(Ctr::new(cipher, iv))),
        OperatingMode::None => Err(Error::InvalidArgument("block engines require a mode")),
    }
}

/// Split `blocks` whole blocks into per-worker chunk sizes in bytes.
pub(crate) fn chunk_bytes(blocks: usize, block_size: usize, workers: usize) -> usize {
    let per_worker = blocks.div_ceil(workers.max(1));
    per_worker.max(1) * block_size
}
