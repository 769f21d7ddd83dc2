//! Hyperparameters for a vectorizing hash table.
//!
//! A [`Hyperparameters`] value is captured once when a
//! [`HashVectorizer`](crate::HashVectorizer) is built and never changes
//! afterwards. It is persisted next to every fitted model, so a loaded model
//! extracts phrases and prunes exactly as the model that wrote it.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration of phrase extraction, pruning and projection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Hyperparameters {
    /// Minimum number of words taken as a single phrase.
    pub smallest_ngram: usize,
    /// Maximum number of words taken as a single phrase.
    ///
    /// The vocabulary holds phrases from `smallest_ngram` to `largest_ngram`
    /// words long.
    pub largest_ngram: usize,
    /// Occurrence bar a phrase must meet to stay in the table.
    ///
    /// Values of 1 or more are an absolute count. Smaller values are a
    /// fraction of the documents seen so far: with `0.001` and 50 000
    /// documents, phrases seen fewer than 50 times are removed.
    pub min_phrase_occurrence: f32,
    /// Dimension of each output vector.
    ///
    /// Reduced at fit time to the number of training documents when fewer
    /// documents than this are used.
    pub num_features: usize,
    /// Largest allowed vocabulary, counting phrases of all lengths.
    pub max_num_phrases: usize,
    /// Maximum number of documents used when fitting. Larger corpora are
    /// downsampled deterministically.
    pub downsample_to: usize,
    /// Infrequent phrases are removed every `live_evaluation_step`
    /// documents while fitting, to bound memory.
    pub live_evaluation_step: usize,
    /// The hashed phrase space has `2^sketch_bits` buckets.
    pub sketch_bits: u8,
    /// Seed for downsampling and prototype selection.
    pub seed: u64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            smallest_ngram: 1,
            largest_ngram: 3,
            min_phrase_occurrence: 1e-3,
            num_features: 1_000,
            max_num_phrases: 1_000_000,
            downsample_to: 100_000,
            live_evaluation_step: 10_000,
            sketch_bits: 20,
            seed: 0,
        }
    }
}

impl Hyperparameters {
    /// Create a configuration with the default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the phrase length range, in words.
    pub fn with_ngram_range(mut self, smallest: usize, largest: usize) -> Self {
        self.smallest_ngram = smallest;
        self.largest_ngram = largest;
        self
    }

    /// Set the longest phrase length, in words.
    pub fn with_largest_ngram(mut self, largest: usize) -> Self {
        self.largest_ngram = largest;
        self
    }

    /// Set the occurrence bar (absolute if ≥ 1, fractional otherwise).
    pub fn with_min_phrase_occurrence(mut self, min: f32) -> Self {
        self.min_phrase_occurrence = min;
        self
    }

    /// Set the output dimension.
    pub fn with_num_features(mut self, num_features: usize) -> Self {
        self.num_features = num_features;
        self
    }

    /// Set the vocabulary cap.
    pub fn with_max_num_phrases(mut self, max: usize) -> Self {
        self.max_num_phrases = max;
        self
    }

    /// Set the downsampling cap.
    pub fn with_downsample_to(mut self, docs: usize) -> Self {
        self.downsample_to = docs;
        self
    }

    /// Set how many documents pass between live pruning passes.
    pub fn with_live_evaluation_step(mut self, step: usize) -> Self {
        self.live_evaluation_step = step;
        self
    }

    /// Set the width of the hashed phrase space, in bits.
    pub fn with_sketch_bits(mut self, bits: u8) -> Self {
        self.sketch_bits = bits;
        self
    }

    /// Set the sampling seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check every value, returning the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.smallest_ngram == 0 {
            return Err(ConfigError::SmallestNgramZero);
        }
        if self.smallest_ngram > self.largest_ngram {
            return Err(ConfigError::NgramRange {
                smallest: self.smallest_ngram,
                largest: self.largest_ngram,
            });
        }
        if !self.min_phrase_occurrence.is_finite() || self.min_phrase_occurrence <= 0.0 {
            return Err(ConfigError::MinPhraseOccurrence(self.min_phrase_occurrence));
        }
        for (name, value) in [
            ("num_features", self.num_features),
            ("max_num_phrases", self.max_num_phrases),
            ("downsample_to", self.downsample_to),
            ("live_evaluation_step", self.live_evaluation_step),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroCount(name));
            }
        }
        if !(1..=32).contains(&self.sketch_bits) {
            return Err(ConfigError::SketchBits(self.sketch_bits));
        }
        Ok(())
    }

    /// Count threshold for a pruning pass after `documents_seen` documents.
    ///
    /// Phrases whose total count is strictly below the threshold are removed.
    pub fn prune_threshold(&self, documents_seen: u64) -> f64 {
        let min = f64::from(self.min_phrase_occurrence);
        if min < 1.0 {
            min * documents_seen as f64
        } else {
            min
        }
    }
}
