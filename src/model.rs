//! The public vectorizer types.
//!
//! [`HashVectorizer`] holds validated hyperparameters and nothing else.
//! Fitting it produces a [`FittedVectorizer`], which is immutable: it can be
//! transformed against from any number of threads, cloned, saved and loaded.
//! There is no way to call `transform` on a model that was never fitted.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::AtomicBool;

use rayon::prelude::*;
use tracing::info;

use crate::config::Hyperparameters;
use crate::error::VHashResult;
use crate::fit::fit_documents;
use crate::project::Projector;
use crate::read::decode;
use crate::table::FrozenTable;
use crate::tmp::TmpDir;
use crate::write::encode;

/// Anything `transform` accepts: a single document or a batch of them.
pub trait Documents {
    /// Borrow every document, in order.
    fn documents(&self) -> Vec<&str>;
}

impl Documents for str {
    fn documents(&self) -> Vec<&str> {
        vec![self]
    }
}

impl Documents for String {
    fn documents(&self) -> Vec<&str> {
        vec![self.as_str()]
    }
}

impl<S: AsRef<str>> Documents for [S] {
    fn documents(&self) -> Vec<&str> {
        self.iter().map(AsRef::as_ref).collect()
    }
}

impl<S: AsRef<str>, const N: usize> Documents for [S; N] {
    fn documents(&self) -> Vec<&str> {
        self.iter().map(AsRef::as_ref).collect()
    }
}

impl<S: AsRef<str>> Documents for Vec<S> {
    fn documents(&self) -> Vec<&str> {
        self.iter().map(AsRef::as_ref).collect()
    }
}

/// An unfitted vectorizing hash table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HashVectorizer {
    params: Hyperparameters,
}

impl HashVectorizer {
    /// Validate `params` and build an unfitted vectorizer.
    pub fn new(params: Hyperparameters) -> VHashResult<HashVectorizer> {
        params.validate()?;
        Ok(HashVectorizer { params })
    }

    /// The hyperparameters every fit of this vectorizer uses.
    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.params
    }

    /// Fit a model on `docs`, where `labels[i]` is the class label of
    /// `docs[i]`. Labels can be any values; see
    /// [`FittedVectorizer::class_labels`].
    ///
    /// An empty corpus is not an error: the model has an empty vocabulary
    /// and transforms every document to zeros.
    pub fn fit<S>(&self, docs: &[S], labels: &[usize]) -> VHashResult<FittedVectorizer>
    where
        S: AsRef<str> + Sync,
    {
        fit_documents(&self.params, docs, labels, None)
    }

    /// Like [`fit`](Self::fit), but gives up with
    /// [`Cancelled`](crate::VHashErrorKind::Cancelled) once `cancel` is set.
    pub fn fit_with_cancel<S>(
        &self,
        docs: &[S],
        labels: &[usize],
        cancel: &AtomicBool,
    ) -> VHashResult<FittedVectorizer>
    where
        S: AsRef<str> + Sync,
    {
        fit_documents(&self.params, docs, labels, Some(cancel))
    }

    /// Fit a model, then transform the training documents with it.
    pub fn fit_transform<S>(
        &self,
        docs: &[S],
        labels: &[usize],
    ) -> VHashResult<(FittedVectorizer, Vec<Vec<f32>>)>
    where
        S: AsRef<str> + Sync,
    {
        let model = self.fit(docs, labels)?;
        let vectors = model.transform(docs);
        Ok((model, vectors))
    }
}

impl From<FittedVectorizer> for HashVectorizer {
    fn from(model: FittedVectorizer) -> HashVectorizer {
        HashVectorizer {
            params: model.params,
        }
    }
}

/// A fitted, read-only vectorizing hash table.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedVectorizer {
    pub(crate) params: Hyperparameters,
    pub(crate) table: FrozenTable,
    pub(crate) projector: Projector,
}

impl FittedVectorizer {
    pub(crate) fn from_parts(
        params: Hyperparameters,
        table: FrozenTable,
        projector: Projector,
    ) -> FittedVectorizer {
        FittedVectorizer {
            params,
            table,
            projector,
        }
    }

    /// Vectorize `docs`: one row of [`num_features`](Self::num_features)
    /// values per document.
    ///
    /// Phrases never seen while fitting are ignored, so unknown text maps to
    /// a zero row. Rows are computed in parallel; each depends only on its
    /// own document.
    pub fn transform<D>(&self, docs: &D) -> Vec<Vec<f32>>
    where
        D: Documents + ?Sized,
    {
        docs.documents()
            .into_par_iter()
            .map(|doc| self.transform_one(doc))
            .collect()
    }

    /// Vectorize a single document.
    pub fn transform_one(&self, doc: &str) -> Vec<f32> {
        self.projector.project(&self.table, doc)
    }

    /// Fit a fresh model with the same hyperparameters. `self` is left
    /// untouched.
    pub fn refit<S>(&self, docs: &[S], labels: &[usize]) -> VHashResult<FittedVectorizer>
    where
        S: AsRef<str> + Sync,
    {
        fit_documents(&self.params, docs, labels, None)
    }

    /// Hyperparameters the model was built with.
    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.params
    }

    /// Length of every output vector.
    ///
    /// This is the configured `num_features`, reduced to the number of
    /// training documents when there were fewer.
    pub fn num_features(&self) -> usize {
        self.projector.num_features()
    }

    /// Documents used for fitting, after downsampling.
    pub fn num_documents(&self) -> u64 {
        self.table.stats().num_docs
    }

    /// Number of distinct labels among the documents used for fitting.
    pub fn num_classes(&self) -> usize {
        self.table.stats().labels.len()
    }

    /// The distinct training labels in ascending order. Per-class counts
    /// such as [`phrase_counts`](Self::phrase_counts) follow this order.
    pub fn class_labels(&self) -> &[usize] {
        &self.table.stats().labels
    }

    /// Number of phrases in the vocabulary.
    pub fn vocabulary_len(&self) -> usize {
        self.table.len()
    }

    /// True if `phrase` survived pruning. `phrase` must be normalized:
    /// lowercase words separated by single spaces.
    pub fn contains_phrase(&self, phrase: &str) -> bool {
        self.table.get(phrase).is_some()
    }

    /// Class-discriminative weight of `phrase`, if it is in the vocabulary.
    pub fn phrase_weight(&self, phrase: &str) -> Option<f64> {
        self.table.get(phrase).map(|entry| entry.weight)
    }

    /// Training documents containing `phrase`, per class in
    /// [`class_labels`](Self::class_labels) order, if it is in the
    /// vocabulary. Trailing classes without the phrase may be left out.
    pub fn phrase_counts(&self, phrase: &str) -> Option<&[u64]> {
        self.table.get(phrase).map(|entry| &*entry.doc_counts)
    }

    /// Occurrences of `phrase` in the training documents, repeats included.
    pub fn phrase_occurrences(&self, phrase: &str) -> Option<u64> {
        self.table.get(phrase).map(|entry| entry.total)
    }

    /// Serialize the model. The same model always yields the same bytes.
    pub fn to_bytes(&self) -> VHashResult<Vec<u8>> {
        Ok(encode(self)?)
    }

    /// Rebuild a model from [`to_bytes`](Self::to_bytes) output.
    ///
    /// Malformed, truncated or corrupted buffers are rejected with
    /// [`Decode`](crate::VHashErrorKind::Decode).
    pub fn from_bytes(bytes: &[u8]) -> VHashResult<FittedVectorizer> {
        Ok(decode(bytes)?)
    }

    /// Save the model to `path`.
    ///
    /// The bytes go to a temporary file in the same directory, which is then
    /// renamed over `path`, so readers never see a half-written model.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> VHashResult<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp_dir = TmpDir::new(dir);
        let (tmp_name, mut out) = tmp_dir.create()?;
        let written = out
            .write_all(&bytes)
            .and_then(|()| out.into_inner().map_err(|err| err.into_error()))
            .and_then(|file| file.sync_all())
            .and_then(|()| fs::rename(&tmp_name, path));
        if let Err(err) = written {
            _ = fs::remove_file(&tmp_name);
            return Err(err.into());
        }

        info!(path = %path.display(), bytes = bytes.len(), "saved model");
        Ok(())
    }

    /// Load a model written by [`save`](Self::save).
    pub fn load<P: AsRef<Path>>(path: P) -> VHashResult<FittedVectorizer> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let model = FittedVectorizer::from_bytes(&bytes)?;
        info!(
            path = %path.display(),
            phrases = model.vocabulary_len(),
            num_features = model.num_features(),
            "loaded model"
        );
        Ok(model)
    }
}
