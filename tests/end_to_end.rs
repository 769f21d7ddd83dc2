//! Fitting and transforming through the public API.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::thread;

use vhash::{FittedVectorizer, HashVectorizer, Hyperparameters};

const DOCS: [&str; 3] = [
    "hi, my name is Mike",
    "hi, my name is George",
    "hello, my name is Mike",
];
const LABELS: [usize; 3] = [1, 0, 1];

fn fitted() -> FittedVectorizer {
    HashVectorizer::default().fit(&DOCS, &LABELS).unwrap()
}

#[test]
fn training_documents_match_themselves_best() {
    let out = fitted().transform(&DOCS);
    assert_eq!(out.len(), 3);
    for (i, row) in out.iter().enumerate() {
        assert_eq!(row.len(), 3);
        assert!((row[i] - 1.0).abs() < 1e-6, "row {i}: {row:?}");
    }
    assert!(out[0][2] > out[0][1], "{out:?}");
    assert!(out[2][0] > out[2][1], "{out:?}");
}

#[test]
fn class_balanced_phrase_is_neutral() {
    let model = fitted();
    assert_eq!(model.transform(&["name"]), vec![vec![0.0; 3]]);
}

#[test]
fn unseen_phrases_contribute_nothing() {
    let model = fitted();
    assert_eq!(model.transform_one("zebra quantum teapot"), vec![0.0; 3]);
    assert_eq!(model.transform_one(""), vec![0.0; 3]);
    assert_eq!(
        model.transform_one("hi zebra"),
        model.transform_one("hi"),
    );
}

#[test]
fn fitting_is_deterministic() {
    let a = fitted();
    let b = fitted();
    assert_eq!(a, b);
    assert_eq!(a.transform(&DOCS), b.transform(&DOCS));
    assert_eq!(a.to_bytes().unwrap(), b.to_bytes().unwrap());
}

#[test]
fn fit_transform_matches_fit_then_transform() {
    let (model, vectors) = HashVectorizer::default().fit_transform(&DOCS, &LABELS).unwrap();
    assert_eq!(model, fitted());
    assert_eq!(vectors, model.transform(&DOCS));
}

#[test]
fn clones_transform_identically() {
    let model = fitted();
    let copy = model.clone();
    assert_eq!(copy.transform(&DOCS), model.transform(&DOCS));
}

#[test]
fn concurrent_transforms_agree() {
    let model = Arc::new(fitted());
    let expected = model.transform(&DOCS);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let model = Arc::clone(&model);
            thread::spawn(move || model.transform(&DOCS))
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn fewer_features_means_fewer_columns() {
    let params = Hyperparameters::default().with_num_features(2);
    let model = HashVectorizer::new(params).unwrap().fit(&DOCS, &LABELS).unwrap();
    let out = model.transform(&DOCS);
    assert!(out.iter().all(|row| row.len() == 2));
}

#[test]
fn vocabulary_never_exceeds_capacity() {
    let docs: Vec<String> = (0..200)
        .map(|i| {
            let a = char::from(b'a' + (i % 26) as u8);
            let b = char::from(b'a' + (i / 26 % 26) as u8);
            format!("shared words {a}{b} tail{a} {b}head")
        })
        .collect();
    let labels: Vec<usize> = (0..docs.len()).map(|i| i % 3).collect();
    let params = Hyperparameters::default()
        .with_min_phrase_occurrence(1.0)
        .with_max_num_phrases(20)
        .with_live_evaluation_step(10)
        .with_num_features(16);
    let model = HashVectorizer::new(params).unwrap().fit(&docs, &labels).unwrap();
    assert!(model.vocabulary_len() <= 20);
    assert!(model.contains_phrase("shared words"));
    assert_eq!(model.num_features(), 16);
    assert_eq!(model.num_classes(), 3);
}

#[test]
fn gaps_between_labels_do_not_add_classes() {
    let model = HashVectorizer::default()
        .fit(&["alpha beta", "beta gamma"], &[0, 4])
        .unwrap();
    assert_eq!(model.num_classes(), 2);
    assert_eq!(model.class_labels(), [0, 4]);
    assert_eq!(model.phrase_counts("beta"), Some(&[1, 1][..]));
    assert_eq!(model.phrase_weight("beta"), Some(0.0));

    let relabelled = HashVectorizer::default()
        .fit(&["alpha beta", "beta gamma"], &[0, 1])
        .unwrap();
    assert_eq!(
        model.transform(&["alpha", "gamma beta"]),
        relabelled.transform(&["alpha", "gamma beta"])
    );
}

#[test]
fn fitted_models_are_thread_safe() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<FittedVectorizer>();
}
