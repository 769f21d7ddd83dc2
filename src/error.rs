use std::error::Error;

/// Result type that is being returned from methods that can fail and thus have [`VHashError`]s.
pub type VHashResult<T> = Result<T, VHashError>;

/// Errors that can result from vhash.
// [`Error`] is public, but opaque and easy to keep compatible.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct VHashError(#[from] VHashErrorKind);

// Accessors for anything we do want to expose publicly.
impl VHashError {
    /// Expose the inner error kind.
    ///
    /// This is useful for matching on the error kind.
    pub fn into_inner(self) -> VHashErrorKind {
        self.0
    }

    /// Borrow the inner error kind.
    pub fn kind(&self) -> &VHashErrorKind {
        &self.0
    }
}

/// [`VHashErrorKind`] describes the errors that can happen while configuring, fitting,
/// saving or loading a vectorizer.
///
/// This is a non-exhaustive enum, so additional variants may be added in future. It is
/// recommended to match against the wildcard `_` instead of listing all possible variants,
/// to avoid problems when new variants are added.
#[non_exhaustive]
#[derive(thiserror::Error, Debug, displaydoc::Display)]
pub enum VHashErrorKind {
    /// I/O error: {0}
    Io(#[from] std::io::Error),
    /// invalid hyperparameters: {0}
    Config(#[from] ConfigError),
    /// got {docs} documents but {labels} labels
    ShapeMismatch {
        /// Number of documents passed to `fit`.
        docs: usize,
        /// Number of labels passed to `fit`.
        labels: usize,
    },
    /// could not decode model: {0}
    Decode(#[from] DecodeError),
    /// fitting was cancelled before completion
    Cancelled,
    /// corpus line {line} is not of the form `label<TAB>text`
    Corpus {
        /// One-based line number in the corpus file.
        line: usize,
    },
    /// could not parse hyperparameters: {0}
    Json(#[from] serde_json::Error),
}

/// Hyperparameter values rejected when a vectorizer is constructed.
#[non_exhaustive]
#[derive(thiserror::Error, Debug, displaydoc::Display, Clone, PartialEq)]
pub enum ConfigError {
    /// `smallest_ngram` must be at least 1
    SmallestNgramZero,
    /// `smallest_ngram` ({smallest}) exceeds `largest_ngram` ({largest})
    NgramRange {
        /// Configured shortest phrase length.
        smallest: usize,
        /// Configured longest phrase length.
        largest: usize,
    },
    /// `min_phrase_occurrence` must be a positive finite number, got {0}
    MinPhraseOccurrence(f32),
    /// `{0}` must be at least 1
    ZeroCount(&'static str),
    /// `sketch_bits` must lie in 1..=32, got {0}
    SketchBits(u8),
}

/// Reasons a persisted model buffer is rejected.
#[non_exhaustive]
#[derive(thiserror::Error, Debug, displaydoc::Display, Clone, PartialEq)]
pub enum DecodeError {
    /// buffer does not start with the vhash magic bytes
    BadMagic,
    /// unsupported format version {0}
    UnsupportedVersion(u16),
    /// unknown hash algorithm id {0}
    UnknownHashAlgorithm(u8),
    /// checksum mismatch: stored {stored}, computed {computed}
    ChecksumMismatch {
        /// Checksum found at the end of the buffer.
        stored: u64,
        /// Checksum of the bytes actually read.
        computed: u64,
    },
    /// buffer ended unexpectedly
    Truncated,
    /// phrase is not valid UTF-8
    InvalidPhrase,
    /// phrase `{0}` appears more than once
    DuplicatePhrase(String),
    /// stored hyperparameters are invalid: {0}
    InvalidHyperparameters(#[source] ConfigError),
    /// expected {expected} prototypes, found {found}
    PrototypeCount {
        /// Effective `num_features` recorded in the buffer.
        expected: usize,
        /// Number of prototype sketches recorded in the buffer.
        found: usize,
    },
    /// sketch bucket {bucket} is outside a {bits}-bit sketch
    BucketOutOfRange {
        /// Offending bucket index.
        bucket: u32,
        /// Sketch width in bits.
        bits: u8,
    },
    /// prototype buckets are not strictly increasing
    UnsortedBuckets,
    /// prototype holds a non-finite value
    NonFiniteValue,
    /// class labels are not strictly increasing
    UnsortedLabels,
    /// phrase counts cover {found} classes but the model has {classes}
    ClassCount {
        /// Number of per-class counts stored for a phrase.
        found: usize,
        /// Number of classes stored for the model.
        classes: usize,
    },
    /// {found} output features is outside 1..={configured}
    FeatureCount {
        /// Effective `num_features` recorded in the buffer.
        found: usize,
        /// Configured `num_features` recorded in the buffer.
        configured: usize,
    },
    /// {0} unexpected bytes after the end of the model
    TrailingBytes(usize),
}

trait VHashErrorMarker: Error {}

impl VHashErrorMarker for std::io::Error {}
impl VHashErrorMarker for ConfigError {}
impl VHashErrorMarker for DecodeError {}
impl VHashErrorMarker for serde_json::Error {}

impl<E> From<E> for VHashError
where
    E: VHashErrorMarker,
    VHashErrorKind: From<E>,
{
    fn from(value: E) -> Self {
        Self(VHashErrorKind::from(value))
    }
}
