//! **cexkit** - a symmetric cryptography library and file-processing
//! toolkit: digests, block and stream ciphers, HMAC, and an
//! authenticated stream-processing pipeline.
//!
//! # Layers
//! | Module | Contents |
//! |--------|----------|
//! | [`digest`]      | SHA-2, Keccak, Skein/Threefish |
//! | [`cipher`]      | Rijndael/AES, Serpent, Twofish (+ extended-key HX variants), Salsa20, ChaCha20 |
//! | [`mode`]        | CBC, CFB, OFB, CTR with deterministic parallel paths |
//! | [`padding`]     | PKCS#7, X.923, ISO 7816-4, TBC, zero |
//! | [`mac`]         | HMAC over any digest, stream MAC |
//! | [`description`] | The 16-byte cipher description record |
//! | [`header`]      | Message header: key fingerprint, obfuscated extension, MAC tag |
//! | [`keys`]        | Key material, key-store and RNG contracts |
//! | [`pipeline`]    | The encrypt/decrypt stream pipeline |
//!
//! Ciphertext framing on the wire:
//! ```text
//! [16] key_fingerprint  [16] encrypted_extension  [T] mac_tag  [..] ciphertext
//! ```
//!
//! Key material is borrowed for the duration of a transform and
//! zeroized on drop; authenticated decryption verifies the tag before
//! emitting a single plaintext byte.

pub mod cipher;
pub mod description;
pub mod digest;
pub mod error;
pub mod header;
pub mod keys;
pub mod mac;
pub mod mode;
pub mod padding;
pub mod parallel;
pub mod pipeline;
pub(crate) mod utils;

pub use description::{CipherDescription, CipherEngine, OperatingMode};
pub use digest::{Digest, DigestKind};
pub use error::{Error, Result};
pub use header::MessageHeader;
pub use keys::{KeyMaterial, KeyStore, MemoryKeyStore, Rng};
pub use mac::{Hmac, StreamMac};
pub use mode::Direction;
pub use padding::PaddingKind;
pub use parallel::ParallelPolicy;
pub use pipeline::{Pipeline, PipelineState, ProgressCallback};
