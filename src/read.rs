use std::collections::HashSet;
use std::io::{self, Cursor};

use byteorder::{LittleEndian, ReadBytesExt};
use xxhash_rust::xxh3::xxh3_64;

use crate::config::Hyperparameters;
use crate::error::DecodeError;
use crate::model::FittedVectorizer;
use crate::phrase::PhraseExtractor;
use crate::project::{Projector, SparseVector, HASH_ALGORITHM};
use crate::table::{ClassStats, FrozenTable, PhraseCounts};
use crate::write::{CHECKSUM_SIZE, FORMAT_VERSION, MAGIC};

/// Every read of a model body goes through here, so that running off the
/// end of the buffer is always reported as [`DecodeError::Truncated`].
struct ModelReader<'a> {
    body: Cursor<&'a [u8]>,
}

fn truncated(_: io::Error) -> DecodeError {
    DecodeError::Truncated
}

impl<'a> ModelReader<'a> {
    fn new(body: &'a [u8]) -> ModelReader<'a> {
        ModelReader {
            body: Cursor::new(body),
        }
    }

    fn remaining(&self) -> usize {
        let len = self.body.get_ref().len();
        len.saturating_sub(self.body.position() as usize)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        self.body.read_u8().map_err(truncated)
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        self.body.read_u32::<LittleEndian>().map_err(truncated)
    }

    fn u64(&mut self) -> Result<u64, DecodeError> {
        self.body.read_u64::<LittleEndian>().map_err(truncated)
    }

    fn f32(&mut self) -> Result<f32, DecodeError> {
        self.body.read_f32::<LittleEndian>().map_err(truncated)
    }

    fn f64(&mut self) -> Result<f64, DecodeError> {
        self.body.read_f64::<LittleEndian>().map_err(truncated)
    }

    /// A length that must be backed by at least `len * item_size` bytes.
    fn bounded_len(&self, len: u64, item_size: usize) -> Result<usize, DecodeError> {
        let len = usize::try_from(len).map_err(|_| DecodeError::Truncated)?;
        match len.checked_mul(item_size) {
            Some(bytes) if bytes <= self.remaining() => Ok(len),
            _ => Err(DecodeError::Truncated),
        }
    }

    fn usize(&mut self) -> Result<usize, DecodeError> {
        let value = self.u64()?;
        usize::try_from(value).map_err(|_| DecodeError::Truncated)
    }

    fn str(&mut self) -> Result<&'a str, DecodeError> {
        let len = self.u32()?;
        let len = self.bounded_len(u64::from(len), 1)?;
        let data: &'a [u8] = self.body.get_ref();
        let start = self.body.position() as usize;
        let bytes = &data[start..start + len];
        self.body.set_position((start + len) as u64);
        std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidPhrase)
    }

    fn counts(&mut self) -> Result<Vec<u64>, DecodeError> {
        let n = self.u32()?;
        let n = self.bounded_len(u64::from(n), 8)?;
        (0..n).map(|_| self.u64()).collect()
    }

    fn classes(&mut self) -> Result<ClassStats, DecodeError> {
        let num_docs = self.u64()?;
        let n = self.u32()?;
        let n = self.bounded_len(u64::from(n), 8 + 8)?;
        let mut labels = Vec::with_capacity(n);
        let mut class_docs = Vec::with_capacity(n);
        for _ in 0..n {
            let label = self.usize()?;
            if labels.last().is_some_and(|&last| last >= label) {
                return Err(DecodeError::UnsortedLabels);
            }
            labels.push(label);
            class_docs.push(self.u64()?);
        }
        Ok(ClassStats {
            num_docs,
            labels,
            class_docs,
        })
    }

    fn params(&mut self) -> Result<Hyperparameters, DecodeError> {
        Ok(Hyperparameters {
            smallest_ngram: self.usize()?,
            largest_ngram: self.usize()?,
            min_phrase_occurrence: self.f32()?,
            num_features: self.usize()?,
            max_num_phrases: self.usize()?,
            downsample_to: self.usize()?,
            live_evaluation_step: self.usize()?,
            sketch_bits: self.u8()?,
            seed: self.u64()?,
        })
    }

    fn prototype(&mut self, sketch_bits: u8) -> Result<SparseVector, DecodeError> {
        let nnz = self.u32()?;
        let nnz = self.bounded_len(u64::from(nnz), 4 + 8)?;
        let mut entries = Vec::with_capacity(nnz);
        for _ in 0..nnz {
            let bucket = self.u32()?;
            let value = self.f64()?;
            if !value.is_finite() {
                return Err(DecodeError::NonFiniteValue);
            }
            if u64::from(bucket) >> sketch_bits != 0 {
                return Err(DecodeError::BucketOutOfRange {
                    bucket,
                    bits: sketch_bits,
                });
            }
            if entries.last().is_some_and(|&(last, _)| last >= bucket) {
                return Err(DecodeError::UnsortedBuckets);
            }
            entries.push((bucket, value));
        }
        Ok(SparseVector::from_sorted(entries))
    }
}

/// Check the header and checksum of `bytes`, returning the body between
/// them.
fn verify(bytes: &[u8]) -> Result<&[u8], DecodeError> {
    let header_len = MAGIC.len() + 2 + 1;
    if bytes.len() < MAGIC.len() {
        return Err(DecodeError::Truncated);
    }
    if &bytes[..MAGIC.len()] != MAGIC {
        return Err(DecodeError::BadMagic);
    }
    if bytes.len() < header_len + CHECKSUM_SIZE {
        return Err(DecodeError::Truncated);
    }

    let mut header = Cursor::new(&bytes[MAGIC.len()..header_len]);
    let version = header.read_u16::<LittleEndian>().map_err(truncated)?;
    if version != FORMAT_VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }
    let algorithm = header.read_u8().map_err(truncated)?;
    if algorithm != HASH_ALGORITHM {
        return Err(DecodeError::UnknownHashAlgorithm(algorithm));
    }

    let (content, mut trailer) = bytes.split_at(bytes.len() - CHECKSUM_SIZE);
    let stored = trailer.read_u64::<LittleEndian>().map_err(truncated)?;
    let computed = xxh3_64(content);
    if stored != computed {
        return Err(DecodeError::ChecksumMismatch { stored, computed });
    }
    Ok(&content[header_len..])
}

/// Rebuild a fitted model from the bytes written by
/// [`encode`](crate::write::encode).
///
/// Either the whole model decodes or an error is returned; nothing partially
/// built escapes.
pub fn decode(bytes: &[u8]) -> Result<FittedVectorizer, DecodeError> {
    let mut reader = ModelReader::new(verify(bytes)?);

    let params = reader.params()?;
    params
        .validate()
        .map_err(DecodeError::InvalidHyperparameters)?;
    let num_features = reader.usize()?;
    if num_features == 0 || num_features > params.num_features {
        return Err(DecodeError::FeatureCount {
            found: num_features,
            configured: params.num_features,
        });
    }

    let stats = reader.classes()?;

    // Smallest possible phrase record: empty key, total and no classes.
    let num_phrases = reader.u64()?;
    let num_phrases = reader.bounded_len(num_phrases, 4 + 8 + 4)?;
    let mut phrases = Vec::with_capacity(num_phrases);
    let mut seen = HashSet::with_capacity(num_phrases);
    for _ in 0..num_phrases {
        let phrase = reader.str()?;
        if !seen.insert(phrase) {
            return Err(DecodeError::DuplicatePhrase(phrase.to_string()));
        }
        let total = reader.u64()?;
        let doc_counts = reader.counts()?;
        if doc_counts.len() > stats.labels.len() {
            return Err(DecodeError::ClassCount {
                found: doc_counts.len(),
                classes: stats.labels.len(),
            });
        }
        phrases.push((Box::<str>::from(phrase), PhraseCounts { total, doc_counts }));
    }

    let num_prototypes = reader.u32()?;
    let num_prototypes = reader.bounded_len(u64::from(num_prototypes), 4)?;
    if num_prototypes != num_features {
        return Err(DecodeError::PrototypeCount {
            expected: num_features,
            found: num_prototypes,
        });
    }
    let prototypes = (0..num_prototypes)
        .map(|_| reader.prototype(params.sketch_bits))
        .collect::<Result<Vec<_>, _>>()?;

    let trailing = reader.remaining();
    if trailing != 0 {
        return Err(DecodeError::TrailingBytes(trailing));
    }

    let table = FrozenTable::build(phrases, stats, params.sketch_bits);
    let projector =
        Projector::new(PhraseExtractor::new(params.smallest_ngram, params.largest_ngram))
            .with_prototypes(prototypes);
    Ok(FittedVectorizer::from_parts(params, table, projector))
}
