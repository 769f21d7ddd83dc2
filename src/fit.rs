//! Fitting: downsample, scan, prune, freeze.
//!
//! The scan is strictly sequential. Eviction breaks ties by insertion order,
//! so observing documents in any other order could change which phrases
//! survive.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};
use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::config::Hyperparameters;
use crate::error::{VHashErrorKind, VHashResult};
use crate::model::FittedVectorizer;
use crate::phrase::PhraseExtractor;
use crate::project::{Projector, SparseVector};
use crate::table::{ClassStats, FrozenTable, VocabularyTable};

/// Mixed into the seed when choosing prototypes, so that prototypes are not
/// simply the first documents kept by downsampling.
const PROTOTYPE_SALT: u64 = 0x5052_4f54_4f54_5950;

/// Choose `k` of `n` indices deterministically, returned in ascending order.
///
/// Keeps the indices whose seeded hash is smallest. When `k >= n` every
/// index is kept.
pub(crate) fn sample_indices(n: usize, k: usize, seed: u64) -> Vec<usize> {
    if k >= n {
        return (0..n).collect();
    }
    if k == 0 {
        return vec![];
    }
    let mut keyed: Vec<(u64, usize)> = (0..n)
        .map(|i| (xxh3_64_with_seed(&(i as u64).to_le_bytes(), seed), i))
        .collect();
    keyed.select_nth_unstable(k - 1);
    let mut chosen: Vec<usize> = keyed[..k].iter().map(|&(_, i)| i).collect();
    chosen.sort_unstable();
    chosen
}

/// A table being built from a stream of documents.
struct Scan<'a> {
    params: &'a Hyperparameters,
    extractor: PhraseExtractor,
    table: VocabularyTable,
    stats: ClassStats,
}

impl<'a> Scan<'a> {
    /// A scan over documents whose labels are `labels`, sorted and
    /// distinct. Documents are then observed by class index into `labels`.
    fn new(params: &'a Hyperparameters, labels: Vec<usize>) -> Scan<'a> {
        Scan {
            params,
            extractor: PhraseExtractor::new(params.smallest_ngram, params.largest_ngram),
            table: VocabularyTable::new(),
            stats: ClassStats::for_labels(labels),
        }
    }

    fn observe_document(&mut self, doc: &str, class: usize) {
        let table = &mut self.table;
        let doc_id = self.stats.num_docs;
        self.extractor
            .for_each_phrase(doc, |phrase| table.observe(phrase, class, doc_id));
        self.stats.add_document(class);

        if self.stats.num_docs % self.params.live_evaluation_step as u64 == 0 {
            self.evaluate();
        }
    }

    /// Prune against the documents seen so far, then enforce the cap.
    fn evaluate(&mut self) {
        let threshold = self.params.prune_threshold(self.stats.num_docs);
        let removed = self.table.prune(threshold);
        let evicted = self.table.enforce_capacity(self.params.max_num_phrases);
        debug!(
            docs_seen = self.stats.num_docs,
            threshold,
            removed,
            evicted,
            phrases = self.table.len(),
            "live evaluation"
        );
    }

    /// Run the final pass and freeze the table.
    fn finish(mut self) -> FrozenTable {
        self.evaluate();
        FrozenTable::build(
            self.table.into_phrases(),
            self.stats,
            self.params.sketch_bits,
        )
    }
}

/// Fit a model on `docs` labelled with `labels`.
///
/// Labels may be any `usize`; the distinct labels of the documents kept
/// after downsampling become dense class indices in ascending order.
///
/// When `cancel` is set while scanning, the partial table is dropped and
/// [`VHashErrorKind::Cancelled`] is returned.
pub(crate) fn fit_documents<S>(
    params: &Hyperparameters,
    docs: &[S],
    labels: &[usize],
    cancel: Option<&AtomicBool>,
) -> VHashResult<FittedVectorizer>
where
    S: AsRef<str> + Sync,
{
    if docs.len() != labels.len() {
        return Err(VHashErrorKind::ShapeMismatch {
            docs: docs.len(),
            labels: labels.len(),
        }
        .into());
    }
    let start = Instant::now();

    let kept = sample_indices(docs.len(), params.downsample_to, params.seed);
    if kept.len() < docs.len() {
        warn!(
            total = docs.len(),
            kept = kept.len(),
            "downsampling training documents"
        );
    }

    let mut classes: BTreeMap<usize, usize> = kept.iter().map(|&i| (labels[i], 0)).collect();
    for (class, index) in classes.values_mut().enumerate() {
        *index = class;
    }

    let mut scan = Scan::new(params, classes.keys().copied().collect());
    for &i in &kept {
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return Err(VHashErrorKind::Cancelled.into());
        }
        scan.observe_document(docs[i].as_ref(), classes[&labels[i]]);
    }
    let extractor = scan.extractor;
    let table = scan.finish();

    let projector = Projector::new(extractor);
    let prototypes: Vec<SparseVector> = if kept.is_empty() {
        vec![SparseVector::default(); params.num_features]
    } else {
        let num_features = params.num_features.min(kept.len());
        sample_indices(kept.len(), num_features, params.seed ^ PROTOTYPE_SALT)
            .par_iter()
            .map(|&i| projector.sketch(&table, docs[kept[i]].as_ref()))
            .collect()
    };
    let projector = projector.with_prototypes(prototypes);

    info!(
        docs = kept.len(),
        classes = table.stats().class_docs.len(),
        phrases = table.len(),
        num_features = projector.num_features(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "fitted vectorizer"
    );
    Ok(FittedVectorizer::from_parts(params.clone(), table, projector))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_keeps_everything_when_small() {
        assert_eq!(sample_indices(3, 5, 0), vec![0, 1, 2]);
        assert_eq!(sample_indices(3, 3, 0), vec![0, 1, 2]);
        assert!(sample_indices(0, 3, 0).is_empty());
        assert!(sample_indices(5, 0, 0).is_empty());
    }

    #[test]
    fn sampling_is_deterministic_and_sorted() {
        let a = sample_indices(1_000, 100, 7);
        assert_eq!(a, sample_indices(1_000, 100, 7));
        assert_eq!(a.len(), 100);
        assert!(a.windows(2).all(|w| w[0] < w[1]));
        assert!(a.iter().all(|&i| i < 1_000));
        assert_ne!(a, sample_indices(1_000, 100, 8));
    }

    #[test]
    fn sampling_spreads_over_the_input() {
        let chosen = sample_indices(10_000, 1_000, 0);
        let first_half = chosen.iter().filter(|&&i| i < 5_000).count();
        assert!(first_half > 400 && first_half < 600, "{first_half}");
    }

    #[test]
    fn live_evaluation_bounds_the_table() {
        let params = Hyperparameters::default()
            .with_ngram_range(1, 1)
            .with_min_phrase_occurrence(1.0)
            .with_max_num_phrases(5)
            .with_live_evaluation_step(2);
        let mut scan = Scan::new(&params, vec![0, 1]);
        for (i, c) in ('a'..='j').enumerate() {
            scan.observe_document(&format!("common {c}x {c}y {c}z"), i % 2);
            if scan.stats.num_docs % 2 == 0 {
                assert!(scan.table.len() <= 5);
            }
        }
        let table = scan.finish();
        assert!(table.len() <= 5);
        assert!(table.get("common").is_some());
    }

    #[test]
    fn final_prune_uses_the_true_document_count() {
        // 0.5 × 4 documents: phrases need 2 occurrences to survive.
        let params = Hyperparameters::default()
            .with_ngram_range(1, 1)
            .with_min_phrase_occurrence(0.5)
            .with_live_evaluation_step(1_000);
        let mut scan = Scan::new(&params, vec![0]);
        for doc in ["a b", "a c", "d", "a"] {
            scan.observe_document(doc, 0);
        }
        let table = scan.finish();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("a").map(|e| &*e.doc_counts), Some(&[3][..]));
    }

    #[test]
    fn repeated_phrases_count_once_per_document() {
        let params = Hyperparameters::default()
            .with_ngram_range(1, 1)
            .with_min_phrase_occurrence(1.0);
        let mut scan = Scan::new(&params, vec![0, 1]);
        scan.observe_document("the cat the", 0);
        scan.observe_document("the dog", 1);
        let table = scan.finish();
        let the = table.get("the").unwrap();
        assert_eq!(the.total, 3);
        assert_eq!(&*the.doc_counts, &[1, 1]);
        assert_eq!(the.weight, 0.0);
    }

    #[test]
    fn sparse_labels_become_dense_classes() {
        let model = fit_documents(
            &Hyperparameters::default(),
            &["a b", "b c", "c"],
            &[usize::MAX, 1 << 40, usize::MAX],
            None,
        )
        .unwrap();
        assert_eq!(model.class_labels(), [1 << 40, usize::MAX]);
        assert_eq!(model.phrase_counts("b"), Some(&[1, 1][..]));
        assert_eq!(model.phrase_counts("c"), Some(&[1, 1][..]));
        assert_eq!(model.phrase_counts("a"), Some(&[0, 1][..]));
    }

    #[test]
    fn cancelled_fit_returns_an_error() {
        let cancel = AtomicBool::new(true);
        let err = fit_documents(&Hyperparameters::default(), &["a b"], &[0], Some(&cancel))
            .unwrap_err();
        assert!(matches!(err.kind(), VHashErrorKind::Cancelled));
    }

    #[test]
    fn uncancelled_flag_is_ignored() {
        let cancel = AtomicBool::new(false);
        let model =
            fit_documents(&Hyperparameters::default(), &["a b", "c"], &[0, 1], Some(&cancel))
                .unwrap();
        assert_eq!(model.num_documents(), 2);
    }
}
