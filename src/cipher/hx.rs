//! KDF-based round-key expansion for the extended-key (HX) cipher
//! variants.
//!
//! The HX ciphers bypass their native key schedules: the round keys are
//! sliced from the output of a digest fed the user key prefixed with a
//! little-endian schedule counter, one digest block per counter value.

use zeroize::Zeroizing;

use crate::digest::DigestKind;

/// Produce `needed` bytes of round-key material from `key` with `kind`.
pub(crate) fn expand_round_keys(kind: DigestKind, key: &[u8], needed: usize) -> Zeroizing<Vec<u8>> {
    let mut digest = kind.instantiate();
    let mut block = Zeroizing::new(vec![0u8; digest.digest_size()]);
    let mut out = Zeroizing::new(Vec::with_capacity(needed + digest.digest_size()));

    let mut counter = 0u32;
    while out.len() < needed {
        digest.update(&counter.to_le_bytes());
        digest.update(key);
        digest
            .finish(&mut block)
            .expect("block sized to digest output");
        out.extend_from_slice(&block);
        counter += 1;
    }
    out.truncate(needed);
    out
}
