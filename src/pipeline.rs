//! The stream-processing pipeline.
//!
//! Drives a described cipher over a source stream into a sink stream:
//! writes or parses the message header, pre-verifies the MAC tag on
//! authenticated decryption (no plaintext is emitted on a mismatch),
//! runs the sequential or parallel transform loop with the per-mode
//! tail rules, reports progress, and patches the tag into the header
//! slot after encryption.
//!
//! Both streams must seek: encryption returns to the header to write
//! the tag, and authenticated decryption reads the source twice (once
//! for the MAC pass, once for the transform). On failure the sink
//! cursor is rewound to its pre-process position;
//! [`Pipeline::process_file`] also truncates there.
//!
//! ```text
//! Ready ──process──▶ Primed ──(decrypt, mac)──▶ Verifying ──ok──▶ Transforming
//!                      │                            └─bad──▶ Failed
//!                      └──(else)──▶ Transforming ──▶ Finalizing ──▶ Done
//! ```

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::ops::ControlFlow;
use std::path::Path;

use rayon::prelude::*;
use subtle::ConstantTimeEq;
use tracing::debug;
use zeroize::Zeroize;

use crate::cipher::{build_stream_cipher, StreamCipher};
use crate::description::CipherDescription;
use crate::header::{extension_pad, obfuscate_extension, MessageHeader, HEADER_PREFIX_LEN};
use crate::keys::{KeyMaterial, KeyStore};
use crate::mac::{Hmac, StreamMac};
use crate::mode::{build_mode, CipherMode, Direction};
use crate::padding::PaddingKind;
use crate::parallel::{build_pool, resolve, ParallelPolicy};
use crate::{Error, Result};

/// Sequential read granularity when no parallel plan is active.
const SEQUENTIAL_CHUNK: usize = 64 * 1024;

/// Host-injected progress observer: `(bytes_done, total)`; returning
/// `ControlFlow::Break` cancels at the next block boundary.
pub type ProgressCallback = Box<dyn FnMut(u64, u64) -> ControlFlow<()> + Send>;

/// Observable pipeline lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Ready,
    Primed,
    Verifying,
    Transforming,
    Finalizing,
    Done,
    Failed,
}

enum Context {
    Block {
        mode: Box<dyn CipherMode>,
        padding: PaddingKind,
        uses_padding: bool,
    },
    Stream {
        cipher: Box<dyn StreamCipher>,
    },
}

pub struct Pipeline {
    description: CipherDescription,
    keys: KeyMaterial,
    direction: Direction,
    fingerprint: [u8; 16],
    extension: String,
    recovered_extension: Option<String>,
    progress: Option<ProgressCallback>,
    policy: ParallelPolicy,
    workers: usize,
    state: PipelineState,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Create a pipeline from an already-resolved description and key
    /// material.
    pub fn new(
        description: CipherDescription,
        keys: KeyMaterial,
        direction: Direction,
    ) -> Result<Self> {
        description.validate()?;
        keys.matches(&description)?;
        Ok(Self {
            description,
            keys,
            direction,
            fingerprint: [0; 16],
            extension: String::new(),
            recovered_extension: None,
            progress: None,
            policy: ParallelPolicy::Off,
            workers: std::thread::available_parallelism().map_or(1, |n| n.get()),
            state: PipelineState::Ready,
        })
    }

    /// Create a decryption pipeline by resolving the header fingerprint
    /// at the reader's current position against the key store.
    ///
    /// The reader is returned to its starting position.
    pub fn from_store<R: Read + Seek>(store: &dyn KeyStore, input: &mut R) -> Result<Self> {
        let start = input.stream_position()?;
        let header = MessageHeader::read_from(input, 0)?;
        input.seek(SeekFrom::Start(start))?;

        let (description, keys) = store.resolve(&header.key_fingerprint)?;
        debug!(
            fingerprint = %hex::encode(header.key_fingerprint),
            "resolved key material from store"
        );
        let mut pipeline = Self::new(description, keys, Direction::Decrypt)?;
        pipeline.fingerprint = header.key_fingerprint;
        Ok(pipeline)
    }

    /// The fingerprint written into (encrypt) or read from (decrypt)
    /// the message header.
    pub fn set_fingerprint(&mut self, fingerprint: [u8; 16]) {
        self.fingerprint = fingerprint;
    }

    /// The plaintext file extension carried (obfuscated) in the header.
    pub fn set_extension(&mut self, extension: &str) -> Result<()> {
        if extension.len() > 16 {
            return Err(Error::InvalidArgument("extension longer than 16 bytes"));
        }
        self.extension = extension.to_owned();
        Ok(())
    }

    pub fn set_progress_callback(&mut self, callback: ProgressCallback) {
        self.progress = Some(callback);
    }

    pub fn set_parallel(&mut self, policy: ParallelPolicy) {
        self.policy = policy;
    }

    /// Fix the worker fan-out count (defaults to the processor count).
    pub fn set_workers(&mut self, workers: usize) {
        self.workers = workers.max(1);
    }

    /// The extension recovered from the header on decryption.
    pub fn recovered_extension(&self) -> Option<&str> {
        self.recovered_extension.as_deref()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Run the transform from `input` into `output`.
    pub fn process<R, W>(&mut self, input: &mut R, output: &mut W) -> Result<()>
    where
        R: Read + Seek,
        W: Write + Seek,
    {
        let out_start = output.stream_position()?;
        self.state = PipelineState::Primed;

        let result = self.run(input, output, out_start);
        match result {
            Ok(()) => {
                self.state = PipelineState::Done;
                Ok(())
            }
            Err(e) => {
                self.state = PipelineState::Failed;
                let _ = output.seek(SeekFrom::Start(out_start));
                Err(e)
            }
        }
    }

    /// File-path convenience around [`process`](Self::process): the
    /// output file is truncated on failure.
    pub fn process_file(&mut self, input: &Path, output: &Path) -> Result<()> {
        let mut src = File::open(input)?;
        let mut dst = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(output)?;
        let result = self.process(&mut src, &mut dst);
        if result.is_err() {
            let _ = dst.set_len(0);
        }
        result
    }

    fn run<R, W>(&mut self, input: &mut R, output: &mut W, out_start: u64) -> Result<()>
    where
        R: Read + Seek,
        W: Write + Seek,
    {
        let in_start = input.stream_position()?;
        let in_len = input.seek(SeekFrom::End(0))? - in_start;
        input.seek(SeekFrom::Start(in_start))?;

        let desc = self.description.clone();
        let mac_size = desc.mac_size as usize;
        let header_len = MessageHeader::len(mac_size) as u64;

        match self.direction {
            Direction::Encrypt => {
                let pad = extension_pad(desc.kdf_digest, &self.keys.key, &self.fingerprint);
                let header = MessageHeader {
                    key_fingerprint: self.fingerprint,
                    encrypted_extension: obfuscate_extension(&self.extension, &pad)?,
                    mac_tag: vec![0; mac_size],
                };
                header.write_to(output)?;

                let mut hmac = desc
                    .mac_engine
                    .map(|kind| Hmac::new(kind, &self.keys.mac_key));

                self.state = PipelineState::Transforming;
                debug!(total = in_len, "encrypting");
                self.transform_loop(input, output, in_len, hmac.as_mut())?;

                self.state = PipelineState::Finalizing;
                if let Some(hmac) = hmac.as_mut() {
                    let mut tag = vec![0u8; hmac.tag_size()];
                    hmac.finish(&mut tag)?;
                    let end = output.stream_position()?;
                    output.seek(SeekFrom::Start(out_start + HEADER_PREFIX_LEN as u64))?;
                    output.write_all(&tag)?;
                    output.seek(SeekFrom::Start(end))?;
                    debug!("MAC tag written into header slot");
                    tag.zeroize();
                }
                Ok(())
            }
            Direction::Decrypt => {
                if in_len < header_len {
                    return Err(Error::InvalidArgument("input shorter than its header"));
                }
                let header = MessageHeader::read_from(input, mac_size)?;
                if self.fingerprint != [0u8; 16] && self.fingerprint != header.key_fingerprint {
                    return Err(Error::KeyLookupFailed(header.key_fingerprint));
                }
                self.fingerprint = header.key_fingerprint;
                let pad = extension_pad(desc.kdf_digest, &self.keys.key, &self.fingerprint);
                self.recovered_extension = Some(header.extension(&pad));

                let body_start = in_start + header_len;
                let body_len = in_len - header_len;

                if mac_size > 0 {
                    self.state = PipelineState::Verifying;
                    let kind = desc
                        .mac_engine
                        .ok_or(Error::InternalInvariant("mac size without engine"))?;
                    let mut mac = StreamMac::new(kind, &self.keys.mac_key);
                    let tag = mac.compute(input)?;
                    let matches: bool = tag.as_slice().ct_eq(header.mac_tag.as_slice()).into();
                    if !matches {
                        debug!("MAC tag mismatch, aborting before any plaintext");
                        return Err(Error::AuthenticationFailed);
                    }
                    debug!("MAC tag verified");
                    input.seek(SeekFrom::Start(body_start))?;
                }

                self.state = PipelineState::Transforming;
                debug!(total = body_len, "decrypting");
                self.transform_loop(input, output, body_len, None)?;
                self.state = PipelineState::Finalizing;
                Ok(())
            }
        }
    }

    /// The read-transform-write loop shared by both directions.
    ///
    /// `mac` is the encrypt-side HMAC absorbing ciphertext as it is
    /// written.
    fn transform_loop<R, W>(
        &mut self,
        input: &mut R,
        output: &mut W,
        total: u64,
        mut mac: Option<&mut Hmac>,
    ) -> Result<()>
    where
        R: Read + Seek,
        W: Write + Seek,
    {
        let desc = &self.description;
        let direction = self.direction;

        let mut context = if desc.engine.is_stream() {
            Context::Stream {
                cipher: build_stream_cipher(desc, &self.keys.key, &self.keys.iv)?,
            }
        } else {
            Context::Block {
                mode: build_mode(desc, &self.keys.key, &self.keys.iv, direction)?,
                padding: desc.padding,
                uses_padding: desc.mode.uses_padding(),
            }
        };

        let unit = match &context {
            Context::Block { mode, .. } => mode.block_size(),
            Context::Stream { cipher } => cipher.keystream_block(),
        };

        let plan = resolve(self.policy, self.workers, unit, total);
        let pool = match &plan {
            Some(cfg) => {
                debug!(
                    workers = cfg.workers,
                    parallel_block = cfg.block_bytes,
                    "parallel fan-out enabled"
                );
                Some(build_pool(cfg.workers)?)
            }
            None => None,
        };
        let chunk_size = plan
            .map(|cfg| cfg.block_bytes)
            .unwrap_or_else(|| (SEQUENTIAL_CHUNK / unit).max(1) * unit);

        let mut inbuf = vec![0u8; chunk_size];
        let mut outbuf = vec![0u8; chunk_size];
        let mut done: u64 = 0;
        let mut last_reported: Option<u64> = None;
        // Plaintext block withheld until EOF is known (padded decrypt).
        let mut held: Option<Vec<u8>> = None;
        // Partial tail bytes (counter modes and streams).
        let mut tail: Vec<u8> = Vec::new();
        let mut last_data_byte = 0u8;

        loop {
            let n = read_full(input, &mut inbuf)?;
            if n == 0 {
                break;
            }
            let at_eof = n < chunk_size;
            let whole = n / unit * unit;
            let rem = n - whole;

            match &mut context {
                Context::Block {
                    mode,
                    uses_padding,
                    padding,
                } => {
                    if *uses_padding && *padding != PaddingKind::None {
                        if rem > 0 && (direction == Direction::Decrypt) {
                            return Err(Error::InvalidArgument(
                                "ciphertext is not block aligned",
                            ));
                        }
                        if whole > 0 {
                            run_block(
                                mode.as_mut(),
                                &inbuf[..whole],
                                &mut outbuf[..whole],
                                pool.as_ref(),
                                whole == chunk_size,
                            );
                        }
                        match direction {
                            Direction::Encrypt => {
                                if whole > 0 {
                                    absorb(&mut mac, &outbuf[..whole]);
                                    output.write_all(&outbuf[..whole])?;
                                    last_data_byte = inbuf[whole - 1];
                                }
                                if rem > 0 {
                                    tail.clear();
                                    tail.extend_from_slice(&inbuf[whole..n]);
                                }
                            }
                            Direction::Decrypt => {
                                // Withhold the final block of every chunk;
                                // only EOF reveals which block carries the
                                // padding trailer.
                                if let Some(h) = held.take() {
                                    output.write_all(&h)?;
                                }
                                if whole > unit {
                                    output.write_all(&outbuf[..whole - unit])?;
                                }
                                held = Some(outbuf[whole - unit..whole].to_vec());
                            }
                        }
                    } else {
                        // CTR/OFB (and unpadded chained modes): transform
                        // exactly the bytes read.
                        if whole > 0 {
                            run_block(
                                mode.as_mut(),
                                &inbuf[..whole],
                                &mut outbuf[..whole],
                                pool.as_ref(),
                                whole == chunk_size,
                            );
                        }
                        if rem > 0 {
                            if !at_eof {
                                return Err(Error::InternalInvariant(
                                    "short read before end of stream",
                                ));
                            }
                            if *uses_padding {
                                return Err(Error::InvalidArgument(
                                    "input is not block aligned and mode has no padding",
                                ));
                            }
                            mode.transform_tail(&inbuf[whole..n], &mut outbuf[whole..n]);
                        }
                        absorb(&mut mac, &outbuf[..n]);
                        output.write_all(&outbuf[..n])?;
                    }
                }
                Context::Stream { cipher } => {
                    if whole > 0 {
                        match (&pool, whole == chunk_size) {
                            (Some(pool), true) => run_stream_parallel(
                                cipher.as_mut(),
                                &inbuf[..whole],
                                &mut outbuf[..whole],
                                pool,
                            ),
                            _ => cipher.apply_keystream(&inbuf[..whole], &mut outbuf[..whole]),
                        }
                    }
                    if rem > 0 {
                        cipher.apply_keystream(&inbuf[whole..n], &mut outbuf[whole..n]);
                    }
                    absorb(&mut mac, &outbuf[..n]);
                    output.write_all(&outbuf[..n])?;
                }
            }

            done += n as u64;
            if let Some(cb) = self.progress.as_mut() {
                last_reported = Some(done);
                if cb(done, total).is_break() {
                    inbuf.zeroize();
                    outbuf.zeroize();
                    debug!("cancelled by progress callback");
                    return Err(Error::Cancelled);
                }
            }
            if at_eof {
                break;
            }
        }

        // Tail of a padded chained mode.
        if let Context::Block {
            mode,
            padding,
            uses_padding,
        } = &mut context
        {
            if *uses_padding && *padding != PaddingKind::None {
                match direction {
                    Direction::Encrypt => {
                        let rem = tail.len();
                        // PKCS7-family schemes emit a full trailer block
                        // for aligned input; zero padding does not.
                        if rem > 0 || *padding != PaddingKind::Zero {
                            let mut block = vec![0u8; unit];
                            block[..rem].copy_from_slice(&tail);
                            if rem == 0 && *padding == PaddingKind::Tbc {
                                // Carry the last data bit across the
                                // block boundary.
                                block.fill(if last_data_byte & 1 == 0 { 0xFF } else { 0x00 });
                            } else {
                                padding.add_padding(&mut block, rem);
                            }
                            let mut out = vec![0u8; unit];
                            mode.transform(&block, &mut out);
                            absorb(&mut mac, &out);
                            output.write_all(&out)?;
                            block.zeroize();
                        }
                    }
                    Direction::Decrypt => {
                        if let Some(mut h) = held.take() {
                            let pad_len = padding.padding_length(&h)?;
                            output.write_all(&h[..unit - pad_len])?;
                            h.zeroize();
                        }
                    }
                }
            } else if let Some(h) = held.take() {
                output.write_all(&h)?;
            }
        }

        if last_reported != Some(done) {
            if let Some(cb) = self.progress.as_mut() {
                let _ = cb(done, total);
            }
        }
        inbuf.zeroize();
        outbuf.zeroize();
        tail.zeroize();
        output.flush()?;
        Ok(())
    }
}

fn absorb(mac: &mut Option<&mut Hmac>, data: &[u8]) {
    if let Some(mac) = mac {
        mac.update(data);
    }
}

/// Transform whole blocks, fanning out when a full parallel chunk is
/// available and the mode allows it.
fn run_block(
    mode: &mut dyn CipherMode,
    input: &[u8],
    output: &mut [u8],
    pool: Option<&rayon::ThreadPool>,
    full_chunk: bool,
) {
    match pool {
        Some(pool) if full_chunk && mode.supports_parallel() => {
            mode.transform_parallel(input, output, pool)
        }
        _ => mode.transform(input, output),
    }
}

/// Split a block-aligned region across forked keystreams.
fn run_stream_parallel(
    cipher: &mut dyn StreamCipher,
    input: &[u8],
    output: &mut [u8],
    pool: &rayon::ThreadPool,
) {
    let unit = cipher.keystream_block();
    debug_assert_eq!(input.len() % unit, 0);
    let base = cipher.block_pos();
    let blocks = input.len() / unit;
    let chunk = blocks.div_ceil(pool.current_num_threads().max(1)).max(1) * unit;

    let chunks = input.len().div_ceil(chunk);
    let mut forks: Vec<Box<dyn StreamCipher>> = Vec::with_capacity(chunks);
    for ci in 0..chunks {
        let mut fork = cipher.fork();
        fork.seek_block(base + (ci * chunk / unit) as u64);
        forks.push(fork);
    }

    pool.install(|| {
        output
            .par_chunks_mut(chunk)
            .zip(forks.par_iter_mut())
            .enumerate()
            .for_each(|(ci, (out_chunk, fork))| {
                let start = ci * chunk;
                fork.apply_keystream(&input[start..start + out_chunk.len()], out_chunk);
            });
    });

    cipher.seek_block(base + blocks as u64);
}

/// Read until `buf` is full or the stream ends.
fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = r.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
