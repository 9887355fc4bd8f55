//! End-to-end pipeline scenarios: header framing, key-store resolution,
//! authenticated decryption, every engine family, and parallel
//! equivalence across thread counts.

use std::io::Cursor;
use std::ops::ControlFlow;

use cexkit::{
    CipherDescription, CipherEngine, Direction, DigestKind, Error, KeyMaterial, KeyStore,
    MemoryKeyStore, OperatingMode, PaddingKind, ParallelPolicy, Pipeline, Rng,
};

struct XorShiftRng(u64);

impl Rng for XorShiftRng {
    fn fill(&mut self, buf: &mut [u8]) {
        for b in buf {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            *b = self.0 as u8;
        }
    }
}

fn description(
    engine: CipherEngine,
    key_size: u16,
    rounds: u8,
    mode: OperatingMode,
    padding: PaddingKind,
) -> CipherDescription {
    let (block_size, iv_size) = match engine {
        CipherEngine::ChaCha | CipherEngine::Salsa => (16, 8),
        _ => (16, 16),
    };
    CipherDescription {
        engine,
        key_size,
        iv_size,
        block_size,
        rounds,
        mode,
        padding,
        kdf_digest: DigestKind::Sha512,
        mac_engine: None,
        mac_size: 0,
    }
}

fn roundtrip(desc: &CipherDescription, keys: &KeyMaterial, plaintext: &[u8]) -> Vec<u8> {
    let mut ct = Cursor::new(Vec::new());
    let mut enc = Pipeline::new(desc.clone(), keys.clone(), Direction::Encrypt).unwrap();
    enc.process(&mut Cursor::new(plaintext.to_vec()), &mut ct)
        .unwrap();

    let mut out = Cursor::new(Vec::new());
    let mut dec = Pipeline::new(desc.clone(), keys.clone(), Direction::Decrypt).unwrap();
    dec.process(&mut Cursor::new(ct.into_inner()), &mut out)
        .unwrap();
    out.into_inner()
}

#[test]
fn hello_cex_world_through_the_key_store() {
    let desc = CipherDescription::aes256_ctr_hmac512();
    let keys = KeyMaterial::generate(&desc, &mut XorShiftRng(0x1234_5678));
    let fingerprint = {
        let mut fp = [0u8; 16];
        XorShiftRng(99).fill(&mut fp);
        fp
    };

    let mut store = MemoryKeyStore::new();
    store.insert(fingerprint, desc, keys);

    let plaintext = b"hello, cex world!";

    // Encrypt with the next subkey the store hands out.
    let (fp, desc, keys) = store.next_subkey().unwrap();
    let mut enc = Pipeline::new(desc, keys, Direction::Encrypt).unwrap();
    enc.set_fingerprint(fp);
    enc.set_extension("txt").unwrap();
    let mut ciphertext = Cursor::new(Vec::new());
    enc.process(&mut Cursor::new(plaintext.to_vec()), &mut ciphertext)
        .unwrap();

    // Decrypt by resolving the header fingerprint.
    let mut ciphertext = Cursor::new(ciphertext.into_inner());
    let mut dec = Pipeline::from_store(&store, &mut ciphertext).unwrap();
    let mut out = Cursor::new(Vec::new());
    dec.process(&mut ciphertext, &mut out).unwrap();

    assert_eq!(out.into_inner(), plaintext);
    assert_eq!(dec.recovered_extension(), Some("txt"));
}

#[test]
fn flipped_ciphertext_emits_no_plaintext() {
    let desc = CipherDescription::aes256_ctr_hmac512();
    let keys = KeyMaterial::generate(&desc, &mut XorShiftRng(7));

    let plaintext = b"hello, cex world!";
    let mut enc = Pipeline::new(desc.clone(), keys.clone(), Direction::Encrypt).unwrap();
    let mut ciphertext = Cursor::new(Vec::new());
    enc.process(&mut Cursor::new(plaintext.to_vec()), &mut ciphertext)
        .unwrap();
    let reference = ciphertext.into_inner();

    for i in 32..reference.len() {
        let mut corrupted = reference.clone();
        corrupted[i] ^= 0x80;
        let mut dec = Pipeline::new(desc.clone(), keys.clone(), Direction::Decrypt).unwrap();
        let mut out = Cursor::new(Vec::new());
        let err = dec
            .process(&mut Cursor::new(corrupted), &mut out)
            .unwrap_err();
        assert!(matches!(err, Error::AuthenticationFailed), "byte {i}");
        assert!(out.get_ref().is_empty(), "plaintext leaked at byte {i}");
    }
}

#[test]
fn unknown_fingerprint_fails_lookup() {
    let desc = CipherDescription::aes256_ctr_hmac512();
    let keys = KeyMaterial::generate(&desc, &mut XorShiftRng(3));
    let mut enc = Pipeline::new(desc, keys, Direction::Encrypt).unwrap();
    enc.set_fingerprint([0xEE; 16]);
    let mut ciphertext = Cursor::new(Vec::new());
    enc.process(&mut Cursor::new(b"data".to_vec()), &mut ciphertext)
        .unwrap();

    let store = MemoryKeyStore::new();
    let mut ciphertext = Cursor::new(ciphertext.into_inner());
    let err = Pipeline::from_store(&store, &mut ciphertext).unwrap_err();
    assert!(matches!(err, Error::KeyLookupFailed(fp) if fp == [0xEE; 16]));
}

#[test]
fn every_block_engine_round_trips() {
    let cases = [
        (CipherEngine::Rdx, 32u16, 14u8),
        (CipherEngine::Serpent, 32, 32),
        (CipherEngine::Twofish, 32, 16),
        (CipherEngine::Rhx, 64, 22),
        (CipherEngine::Shx, 64, 40),
        (CipherEngine::Thx, 64, 20),
    ];
    let plaintext: Vec<u8> = (0u32..10_000).map(|i| (i * 31 % 256) as u8).collect();

    for (engine, key_size, rounds) in cases {
        let desc = description(
            engine,
            key_size,
            rounds,
            OperatingMode::Cbc,
            PaddingKind::Pkcs7,
        );
        let keys = KeyMaterial::generate(&desc, &mut XorShiftRng(engine as u64));
        assert_eq!(
            roundtrip(&desc, &keys, &plaintext),
            plaintext,
            "{engine:?}"
        );
    }
}

#[test]
fn every_stream_engine_round_trips() {
    let cases = [
        (CipherEngine::Salsa, 32u16, 20u8),
        (CipherEngine::ChaCha, 32, 20),
        (CipherEngine::ChaCha, 56, 20),
        (CipherEngine::Rsm, 32, 14),
        (CipherEngine::Tsm, 32, 16),
    ];
    let plaintext: Vec<u8> = (0u32..9_999).map(|i| (i * 17 % 256) as u8).collect();

    for (engine, key_size, rounds) in cases {
        let desc = description(
            engine,
            key_size,
            rounds,
            OperatingMode::None,
            PaddingKind::None,
        );
        let keys = KeyMaterial::generate(&desc, &mut XorShiftRng(engine as u64 + 100));
        assert_eq!(
            roundtrip(&desc, &keys, &plaintext),
            plaintext,
            "{engine:?}/{key_size}"
        );
    }
}

#[test]
fn modes_and_paddings_round_trip() {
    // Lengths straddling block and chunk boundaries.
    let lengths = [1usize, 15, 16, 17, 255, 4096, 70_000];

    for mode in [OperatingMode::Cbc, OperatingMode::Cfb] {
        for padding in [
            PaddingKind::Pkcs7,
            PaddingKind::X923,
            PaddingKind::Iso7816,
            PaddingKind::Tbc,
        ] {
            for &len in &lengths {
                let desc = description(CipherEngine::Rdx, 16, 10, mode, padding);
                let keys = KeyMaterial::generate(&desc, &mut XorShiftRng(len as u64));
                // End on a nonzero byte so zero-sensitive schemes stay
                // unambiguous.
                let plaintext: Vec<u8> = (0..len).map(|i| (i % 250 + 1) as u8).collect();
                assert_eq!(
                    roundtrip(&desc, &keys, &plaintext),
                    plaintext,
                    "{mode:?}/{padding:?}/{len}"
                );
            }
        }
    }

    for mode in [OperatingMode::Ctr, OperatingMode::Ofb] {
        for &len in &lengths {
            let desc = description(CipherEngine::Rdx, 16, 10, mode, PaddingKind::None);
            let keys = KeyMaterial::generate(&desc, &mut XorShiftRng(len as u64 + 7));
            let plaintext: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            assert_eq!(
                roundtrip(&desc, &keys, &plaintext),
                plaintext,
                "{mode:?}/{len}"
            );
        }
    }
}

#[test]
fn parallel_output_is_identical_across_thread_counts() {
    let desc = CipherDescription {
        mac_engine: None,
        mac_size: 0,
        ..CipherDescription::aes256_ctr_hmac512()
    };
    let keys = KeyMaterial::generate(&desc, &mut XorShiftRng(0xC0FFEE));
    let plaintext = vec![0x01u8; 4 * 1024 * 1024];

    let mut reference = Cursor::new(Vec::new());
    let mut seq = Pipeline::new(desc.clone(), keys.clone(), Direction::Encrypt).unwrap();
    seq.set_parallel(ParallelPolicy::Off);
    seq.process(&mut Cursor::new(plaintext.clone()), &mut reference)
        .unwrap();
    let reference = reference.into_inner();

    for workers in [1usize, 2, 3, 4, 8] {
        let mut par = Pipeline::new(desc.clone(), keys.clone(), Direction::Encrypt).unwrap();
        par.set_parallel(ParallelPolicy::SpeedProfile);
        par.set_workers(workers);
        let mut got = Cursor::new(Vec::new());
        par.process(&mut Cursor::new(plaintext.clone()), &mut got)
            .unwrap();
        assert_eq!(got.into_inner(), reference, "{workers} workers");
    }

    // The parallel decrypt round-trips back to the plaintext.
    let mut dec = Pipeline::new(desc, keys, Direction::Decrypt).unwrap();
    dec.set_parallel(ParallelPolicy::ProgressProfile(16));
    dec.set_workers(4);
    let mut out = Cursor::new(Vec::new());
    dec.process(&mut Cursor::new(reference), &mut out).unwrap();
    assert_eq!(out.into_inner(), plaintext);
}

#[test]
fn parallel_stream_matches_sequential() {
    let desc = description(
        CipherEngine::ChaCha,
        32,
        20,
        OperatingMode::None,
        PaddingKind::None,
    );
    let keys = KeyMaterial::generate(&desc, &mut XorShiftRng(0xBEEF));
    let plaintext: Vec<u8> = (0u32..1_000_000).map(|i| (i % 256) as u8).collect();

    let mut reference = Cursor::new(Vec::new());
    let mut seq = Pipeline::new(desc.clone(), keys.clone(), Direction::Encrypt).unwrap();
    seq.process(&mut Cursor::new(plaintext.clone()), &mut reference)
        .unwrap();

    for workers in [2usize, 4, 8] {
        let mut par = Pipeline::new(desc.clone(), keys.clone(), Direction::Encrypt).unwrap();
        par.set_parallel(ParallelPolicy::SpeedProfile);
        par.set_workers(workers);
        let mut got = Cursor::new(Vec::new());
        par.process(&mut Cursor::new(plaintext.clone()), &mut got)
            .unwrap();
        assert_eq!(got.get_ref(), reference.get_ref(), "{workers} workers");
    }
}

#[test]
fn file_processing_truncates_on_cancellation() {
    let dir = tempfile::tempdir().unwrap();
    let src_path = dir.path().join("plain.bin");
    let dst_path = dir.path().join("cipher.bin");
    std::fs::write(&src_path, vec![0x42u8; 300_000]).unwrap();

    let desc = CipherDescription::aes256_ctr_hmac512();
    let keys = KeyMaterial::generate(&desc, &mut XorShiftRng(11));

    let mut enc = Pipeline::new(desc.clone(), keys.clone(), Direction::Encrypt).unwrap();
    enc.set_progress_callback(Box::new(|done, _total| {
        if done > 100_000 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }));
    let err = enc.process_file(&src_path, &dst_path).unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(std::fs::metadata(&dst_path).unwrap().len(), 0);

    // And a clean run round-trips through the filesystem.
    let mut enc = Pipeline::new(desc.clone(), keys.clone(), Direction::Encrypt).unwrap();
    enc.process_file(&src_path, &dst_path).unwrap();
    let out_path = dir.path().join("out.bin");
    let mut dec = Pipeline::new(desc, keys, Direction::Decrypt).unwrap();
    dec.process_file(&dst_path, &out_path).unwrap();
    assert_eq!(
        std::fs::read(&out_path).unwrap(),
        std::fs::read(&src_path).unwrap()
    );
}

#[test]
fn randomized_round_trips() {
    use rand::rngs::StdRng;
    use rand::{Rng as _, SeedableRng};

    let mut rng = StdRng::seed_from_u64(0x5EED);
    for _ in 0..20 {
        let len = rng.gen_range(0..20_000);
        let mut plaintext = vec![0u8; len];
        rng.fill(plaintext.as_mut_slice());
        // Avoid the zero-padding ambiguity on the trailing byte.
        if let Some(last) = plaintext.last_mut() {
            *last |= 1;
        }

        let (mode, padding) = if rng.gen_bool(0.5) {
            (OperatingMode::Cbc, PaddingKind::Pkcs7)
        } else {
            (OperatingMode::Ctr, PaddingKind::None)
        };
        let desc = description(CipherEngine::Rdx, 32, 14, mode, padding);
        let keys = KeyMaterial::generate(&desc, &mut XorShiftRng(rng.gen_range(1..u64::MAX)));
        assert_eq!(roundtrip(&desc, &keys, &plaintext), plaintext, "{mode:?}/{len}");
    }
}

#[test]
fn large_block_rijndael_round_trips() {
    let desc = CipherDescription {
        engine: CipherEngine::Rdx,
        key_size: 32,
        iv_size: 32,
        block_size: 32,
        rounds: 14,
        mode: OperatingMode::Cbc,
        padding: PaddingKind::Pkcs7,
        kdf_digest: DigestKind::Sha512,
        mac_engine: Some(DigestKind::Skein1024),
        mac_size: 128,
    };
    let keys = KeyMaterial::generate(&desc, &mut XorShiftRng(0xA5));
    let plaintext: Vec<u8> = (0u32..5_000).map(|i| (i * 7 % 256) as u8).collect();
    assert_eq!(roundtrip(&desc, &keys, &plaintext), plaintext);
}
