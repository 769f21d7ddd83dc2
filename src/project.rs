//! Projecting documents onto fixed-size vectors.
//!
//! Every phrase of a fitted table owns a bucket of the hashed phrase space
//! and a sign, both derived from the phrase text with xxh3. A document is
//! first turned into a sparse *sketch*: the signed, weighted sum of its known
//! phrases, normalized to unit length. Output column `f` is the dot product
//! of that sketch with the sketch of prototype document `f`, so every value
//! lies in `[-1, 1]` and a prototype document maps to 1 in its own column.

use std::collections::BTreeMap;

use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::phrase::PhraseExtractor;
use crate::table::{ClassStats, FrozenTable};

/// Identifier of the hash function used for [`assign`], written to every
/// persisted model. Bump it whenever `assign` changes.
pub const HASH_ALGORITHM: u8 = 1;

const BUCKET_SEED: u64 = 0x7668_6173_685f_6231;
const SIGN_SEED: u64 = 0x7668_6173_685f_7331;

/// Where a phrase lands in the hashed phrase space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Assignment {
    /// Bucket index, below `2^sketch_bits`.
    pub bucket: u32,
    /// True if the phrase contributes negatively to its bucket.
    pub negative: bool,
}

impl Assignment {
    /// `+1.0` or `-1.0`.
    pub fn sign(&self) -> f64 {
        if self.negative {
            -1.0
        } else {
            1.0
        }
    }
}

/// Bucket and sign of `phrase` in a `2^sketch_bits` wide space.
///
/// This depends on nothing but the phrase bytes, so it is stable across
/// processes, table layouts and save/load cycles.
pub fn assign(phrase: &str, sketch_bits: u8) -> Assignment {
    let bits = u32::from(sketch_bits.clamp(1, 32));
    let bucket_hash = xxh3_64_with_seed(phrase.as_bytes(), BUCKET_SEED);
    let sign_hash = xxh3_64_with_seed(phrase.as_bytes(), SIGN_SEED);
    Assignment {
        bucket: (bucket_hash >> (64 - bits)) as u32,
        negative: sign_hash & 1 == 1,
    }
}

/// Class-discriminative weight of a phrase.
///
/// With `N` scanned documents, `N_c` of them in class `c`, and `n_c` of
/// those containing the phrase (`n` over all classes), the weight is the
/// Euclidean distance between the phrase's document frequency in each class
/// and its overall document frequency:
///
/// ```text
/// w = sqrt( Σ_{c: N_c > 0} (n / N - n_c / N_c)² )
/// ```
///
/// A phrase found in the same share of documents of every class weighs 0,
/// however often it repeats inside them.
pub fn class_weight(doc_counts: &[u64], stats: &ClassStats) -> f64 {
    if stats.num_docs == 0 {
        return 0.0;
    }
    let total: u64 = doc_counts.iter().sum();
    let expected = total as f64 / stats.num_docs as f64;
    let mut sum = 0.0;
    for (class, &docs) in stats.class_docs.iter().enumerate() {
        if docs == 0 {
            continue;
        }
        let count = doc_counts.get(class).copied().unwrap_or(0);
        let difference = expected - count as f64 / docs as f64;
        sum += difference * difference;
    }
    sum.sqrt()
}

/// A sparse vector over the hashed phrase space, sorted by bucket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    entries: Vec<(u32, f64)>,
}

impl SparseVector {
    /// Build from `(bucket, value)` pairs already sorted by bucket with no
    /// repeated bucket.
    pub fn from_sorted(entries: Vec<(u32, f64)>) -> SparseVector {
        debug_assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));
        SparseVector { entries }
    }

    /// Non-zero entries, sorted by bucket.
    pub fn entries(&self) -> &[(u32, f64)] {
        &self.entries
    }

    /// True if every entry is zero.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Euclidean norm.
    pub fn norm(&self) -> f64 {
        self.entries.iter().map(|&(_, v)| v * v).sum::<f64>().sqrt()
    }

    /// Scale to unit length. A zero vector stays zero.
    pub fn normalize(&mut self) {
        let norm = self.norm();
        if norm > 0.0 {
            for (_, value) in &mut self.entries {
                *value /= norm;
            }
        }
    }

    /// Dot product, merging the two sorted entry lists.
    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j) = (0, 0);
        let (a, b) = (&self.entries, &other.entries);
        let mut sum = 0.0;
        while i < a.len() && j < b.len() {
            match a[i].0.cmp(&b[j].0) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += a[i].1 * b[j].1;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }
}

/// Turns documents into sketches and output vectors for one fitted table.
#[derive(Debug, Clone, PartialEq)]
pub struct Projector {
    extractor: PhraseExtractor,
    prototypes: Vec<SparseVector>,
}

impl Projector {
    /// A projector with no prototypes yet; see [`with_prototypes`](Self::with_prototypes).
    pub fn new(extractor: PhraseExtractor) -> Projector {
        Projector {
            extractor,
            prototypes: vec![],
        }
    }

    /// Attach the prototype sketches; their count is the output dimension.
    pub fn with_prototypes(mut self, prototypes: Vec<SparseVector>) -> Projector {
        self.prototypes = prototypes;
        self
    }

    /// Output dimension.
    pub fn num_features(&self) -> usize {
        self.prototypes.len()
    }

    /// Prototype sketches, one per output column.
    pub fn prototypes(&self) -> &[SparseVector] {
        &self.prototypes
    }

    /// Unit-length sketch of `doc`.
    ///
    /// Each known phrase adds `sign × weight × ln(1 + count)` to its bucket.
    /// Phrases are visited in sorted order so that colliding contributions
    /// are always summed in the same order.
    pub fn sketch(&self, table: &FrozenTable, doc: &str) -> SparseVector {
        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        self.extractor.for_each_phrase(doc, |phrase| {
            if table.get(phrase).is_some() {
                match counts.get_mut(phrase) {
                    Some(count) => *count += 1,
                    None => {
                        counts.insert(phrase.to_string(), 1);
                    }
                }
            }
        });

        let mut buckets: BTreeMap<u32, f64> = BTreeMap::new();
        for (phrase, count) in &counts {
            let Some(entry) = table.get(phrase) else {
                continue;
            };
            if entry.weight == 0.0 {
                continue;
            }
            let value = entry.assignment.sign() * entry.weight * f64::from(*count).ln_1p();
            *buckets.entry(entry.assignment.bucket).or_insert(0.0) += value;
        }

        let mut sketch =
            SparseVector::from_sorted(buckets.into_iter().filter(|&(_, v)| v != 0.0).collect());
        sketch.normalize();
        sketch
    }

    /// Output vector of `doc`: its sketch dotted with every prototype.
    pub fn project(&self, table: &FrozenTable, doc: &str) -> Vec<f32> {
        let sketch = self.sketch(table, doc);
        if sketch.is_empty() {
            return vec![0.0; self.prototypes.len()];
        }
        self.prototypes
            .iter()
            .map(|prototype| sketch.dot(prototype) as f32)
            .collect()
    }
}
