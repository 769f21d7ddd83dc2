//! Saving and loading fitted models.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use vhash::{DecodeError, FittedVectorizer, HashVectorizer, Hyperparameters, VHashErrorKind};

fn fitted() -> FittedVectorizer {
    let docs = [
        "hi, my name is Mike",
        "hi, my name is George",
        "hello, my name is Mike",
        "good morning George",
    ];
    let params = Hyperparameters::default().with_largest_ngram(2);
    HashVectorizer::new(params)
        .unwrap()
        .fit(&docs, &[1, 0, 1, 0])
        .unwrap()
}

fn decode_error(bytes: &[u8]) -> DecodeError {
    match FittedVectorizer::from_bytes(bytes).unwrap_err().into_inner() {
        VHashErrorKind::Decode(err) => err,
        other => panic!("expected a decode error, got {other}"),
    }
}

#[test]
fn bytes_round_trip() {
    let model = fitted();
    let loaded = FittedVectorizer::from_bytes(&model.to_bytes().unwrap()).unwrap();
    assert_eq!(loaded, model);

    let probe = ["hi George", "my name is Mike", "nothing known here"];
    assert_eq!(loaded.transform(&probe), model.transform(&probe));
    assert_eq!(loaded.phrase_weight("mike"), model.phrase_weight("mike"));
}

#[test]
fn encoding_is_deterministic() {
    let model = fitted();
    let bytes = model.to_bytes().unwrap();
    assert_eq!(bytes, model.to_bytes().unwrap());
    assert_eq!(bytes, model.clone().to_bytes().unwrap());
    let reloaded = FittedVectorizer::from_bytes(&bytes).unwrap();
    assert_eq!(reloaded.to_bytes().unwrap(), bytes);
}

#[test]
fn save_and_load_through_the_filesystem() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.vhash");
    let model = fitted();
    model.save(&path).unwrap();
    let loaded = FittedVectorizer::load(&path).unwrap();
    assert_eq!(loaded, model);

    // Only the model itself is left behind.
    let names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(names, vec![std::ffi::OsString::from("model.vhash")]);
}

#[test]
fn saving_replaces_an_existing_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.vhash");
    std::fs::write(&path, b"stale").unwrap();
    let model = fitted();
    model.save(&path).unwrap();
    assert_eq!(FittedVectorizer::load(&path).unwrap(), model);
}

#[test]
fn loading_a_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = FittedVectorizer::load(dir.path().join("absent.vhash")).unwrap_err();
    assert!(matches!(err.kind(), VHashErrorKind::Io(_)));
}

#[test]
fn every_strict_prefix_is_rejected() {
    let bytes = fitted().to_bytes().unwrap();
    for len in 0..bytes.len() {
        assert!(
            FittedVectorizer::from_bytes(&bytes[..len]).is_err(),
            "prefix of {len} bytes decoded"
        );
    }
}

#[test]
fn every_flipped_byte_is_rejected() {
    let bytes = fitted().to_bytes().unwrap();
    for i in 0..bytes.len() {
        let mut corrupt = bytes.clone();
        corrupt[i] ^= 0x20;
        assert!(
            FittedVectorizer::from_bytes(&corrupt).is_err(),
            "flipping byte {i} went unnoticed"
        );
    }
}

#[test]
fn corruption_in_the_body_fails_the_checksum() {
    let mut bytes = fitted().to_bytes().unwrap();
    let middle = bytes.len() / 2;
    bytes[middle] ^= 1;
    assert!(matches!(
        decode_error(&bytes),
        DecodeError::ChecksumMismatch { .. }
    ));
}

#[test]
fn header_problems_are_named() {
    let bytes = fitted().to_bytes().unwrap();

    let mut wrong_magic = bytes.clone();
    wrong_magic[..4].copy_from_slice(b"FTIP");
    assert_eq!(decode_error(&wrong_magic), DecodeError::BadMagic);

    let mut newer = bytes.clone();
    newer[4] = 2;
    assert_eq!(decode_error(&newer), DecodeError::UnsupportedVersion(2));

    let mut other_hash = bytes;
    other_hash[6] = 0;
    assert_eq!(decode_error(&other_hash), DecodeError::UnknownHashAlgorithm(0));
}

#[test]
fn appended_bytes_are_rejected() {
    let mut bytes = fitted().to_bytes().unwrap();
    bytes.extend_from_slice(&[0; 8]);
    assert!(FittedVectorizer::from_bytes(&bytes).is_err());
}

#[test]
fn empty_model_round_trips() {
    let docs: [&str; 0] = [];
    let params = Hyperparameters::default().with_num_features(4);
    let model = HashVectorizer::new(params).unwrap().fit(&docs, &[]).unwrap();
    let loaded = FittedVectorizer::from_bytes(&model.to_bytes().unwrap()).unwrap();
    assert_eq!(loaded, model);
    assert_eq!(loaded.transform_one("hi"), vec![0.0; 4]);
}
