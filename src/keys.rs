//! Key material and the external key-store / RNG contracts.
//!
//! This module intentionally performs no cryptography - it is the plain
//! data container the pipeline borrows key bytes from, plus the traits
//! the host implements to resolve fingerprints and supply randomness.
//! Long-term key storage (package files, access policy, expiration) is
//! the host's concern.

use std::collections::HashMap;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::description::CipherDescription;
use crate::{Error, Result};

/// The secret bytes for one transform, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    /// Cipher key.
    pub key: Vec<u8>,
    /// IV for block modes (block-sized) or nonce for stream engines.
    pub iv: Vec<u8>,
    /// HMAC key; empty when the description carries no MAC.
    pub mac_key: Vec<u8>,
}

impl KeyMaterial {
    pub fn new(key: Vec<u8>, iv: Vec<u8>, mac_key: Vec<u8>) -> Self {
        Self { key, iv, mac_key }
    }

    /// Draw fresh material sized to `desc` from the host RNG.
    ///
    /// The MAC key is sized to the tag when the description carries one.
    pub fn generate(desc: &CipherDescription, rng: &mut dyn Rng) -> Self {
        let mut key = vec![0u8; desc.key_size as usize];
        let mut iv = vec![0u8; desc.iv_size as usize];
        let mut mac_key = vec![0u8; desc.mac_size as usize];
        rng.fill(&mut key);
        rng.fill(&mut iv);
        rng.fill(&mut mac_key);
        Self { key, iv, mac_key }
    }

    /// Check the byte counts against a description.
    pub fn matches(&self, desc: &CipherDescription) -> Result<()> {
        if self.key.len() != desc.key_size as usize {
            return Err(Error::InvalidArgument("key length does not match description"));
        }
        if self.iv.len() != desc.iv_size as usize {
            return Err(Error::InvalidArgument("IV length does not match description"));
        }
        if desc.mac_size > 0 && self.mac_key.is_empty() {
            return Err(Error::InvalidArgument("description requires a MAC key"));
        }
        Ok(())
    }
}

/// Host-supplied randomness.
pub trait Rng {
    fn fill(&mut self, buf: &mut [u8]);
}

/// The external key store the pipeline resolves fingerprints against.
pub trait KeyStore {
    /// Look up the description and key material for a header fingerprint.
    fn resolve(&self, fingerprint: &[u8; 16]) -> Result<(CipherDescription, KeyMaterial)>;

    /// Hand out the next unused subkey for an encryption.
    fn next_subkey(&mut self) -> Result<([u8; 16], CipherDescription, KeyMaterial)>;
}

/// An in-memory key store for hosts and tests.
pub struct MemoryKeyStore {
    entries: HashMap<[u8; 16], (CipherDescription, KeyMaterial)>,
    /// Insertion order, for `next_subkey` rotation.
    order: Vec<[u8; 16]>,
    next: usize,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            next: 0,
        }
    }

    pub fn insert(&mut self, fingerprint: [u8; 16], desc: CipherDescription, keys: KeyMaterial) {
        if self.entries.insert(fingerprint, (desc, keys)).is_none() {
            self.order.push(fingerprint);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MemoryKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStore for MemoryKeyStore {
    fn resolve(&self, fingerprint: &[u8; 16]) -> Result<(CipherDescription, KeyMaterial)> {
        self.entries
            .get(fingerprint)
            .cloned()
            .ok_or(Error::KeyLookupFailed(*fingerprint))
    }

    fn next_subkey(&mut self) -> Result<([u8; 16], CipherDescription, KeyMaterial)> {
        let fp = *self
            .order
            .get(self.next)
            .ok_or(Error::KeyLookupFailed([0u8; 16]))?;
        self.next = (self.next + 1) % self.order.len();
        let (desc, keys) = self.entries[&fp].clone();
        Ok((fp, desc, keys))
    }
}
