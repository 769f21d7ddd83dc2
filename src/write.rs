use std::io;

use byteorder::{LittleEndian, WriteBytesExt};
use xxhash_rust::xxh3::xxh3_64;

use crate::config::Hyperparameters;
use crate::model::FittedVectorizer;
use crate::project::{SparseVector, HASH_ALGORITHM};
use crate::table::ClassStats;

/// First bytes of every persisted model.
pub const MAGIC: &[u8; 4] = b"VHSH";

/// Layout version written after the magic bytes.
pub const FORMAT_VERSION: u16 = 1;

/// Size of the trailing checksum.
pub const CHECKSUM_SIZE: usize = 8;

/// Writer for serializing a fitted model.
///
/// A model file starts with a header: the magic bytes, the format version and
/// the id of the phrase hash function. Then come the hyperparameters, the
/// corpus statistics with the label of every class, every phrase with its
/// occurrence total and per-class document counts (sorted, so the bytes do
/// not depend on hash map order), and the prototype sketches. The last 8
/// bytes are an xxh3 checksum of everything before them.
///
/// All integers are little-endian.
pub struct ModelWriter {
    buf: Vec<u8>,
}

fn too_large(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, format!("{what} too large to encode"))
}

fn len_u32(len: usize, what: &str) -> io::Result<u32> {
    u32::try_from(len).map_err(|_| too_large(what))
}

impl ModelWriter {
    pub fn new() -> io::Result<ModelWriter> {
        let mut buf = Vec::with_capacity(4096);
        buf.extend_from_slice(MAGIC);
        buf.write_u16::<LittleEndian>(FORMAT_VERSION)?;
        buf.write_u8(HASH_ALGORITHM)?;
        Ok(ModelWriter { buf })
    }

    pub fn write_params(&mut self, params: &Hyperparameters) -> io::Result<()> {
        self.buf.write_u64::<LittleEndian>(params.smallest_ngram as u64)?;
        self.buf.write_u64::<LittleEndian>(params.largest_ngram as u64)?;
        self.buf.write_f32::<LittleEndian>(params.min_phrase_occurrence)?;
        self.buf.write_u64::<LittleEndian>(params.num_features as u64)?;
        self.buf.write_u64::<LittleEndian>(params.max_num_phrases as u64)?;
        self.buf.write_u64::<LittleEndian>(params.downsample_to as u64)?;
        self.buf.write_u64::<LittleEndian>(params.live_evaluation_step as u64)?;
        self.buf.write_u8(params.sketch_bits)?;
        self.buf.write_u64::<LittleEndian>(params.seed)?;
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> io::Result<()> {
        self.buf.write_u32::<LittleEndian>(value)
    }

    pub fn write_u64(&mut self, value: u64) -> io::Result<()> {
        self.buf.write_u64::<LittleEndian>(value)
    }

    pub fn write_counts(&mut self, counts: &[u64]) -> io::Result<()> {
        self.buf.write_u32::<LittleEndian>(len_u32(counts.len(), "class count")?)?;
        for &count in counts {
            self.buf.write_u64::<LittleEndian>(count)?;
        }
        Ok(())
    }

    /// Document total, then one `(label, documents)` pair per class.
    pub fn write_classes(&mut self, stats: &ClassStats) -> io::Result<()> {
        self.buf.write_u64::<LittleEndian>(stats.num_docs)?;
        self.buf
            .write_u32::<LittleEndian>(len_u32(stats.labels.len(), "class list")?)?;
        for (&label, &docs) in stats.labels.iter().zip(&stats.class_docs) {
            self.buf.write_u64::<LittleEndian>(label as u64)?;
            self.buf.write_u64::<LittleEndian>(docs)?;
        }
        Ok(())
    }

    pub fn write_phrase(&mut self, phrase: &str, total: u64, doc_counts: &[u64]) -> io::Result<()> {
        let bytes = phrase.as_bytes();
        self.buf.write_u32::<LittleEndian>(len_u32(bytes.len(), "phrase")?)?;
        self.buf.extend_from_slice(bytes);
        self.buf.write_u64::<LittleEndian>(total)?;
        self.write_counts(doc_counts)
    }

    pub fn write_prototype(&mut self, sketch: &SparseVector) -> io::Result<()> {
        let entries = sketch.entries();
        self.buf.write_u32::<LittleEndian>(len_u32(entries.len(), "prototype")?)?;
        for &(bucket, value) in entries {
            self.buf.write_u32::<LittleEndian>(bucket)?;
            self.buf.write_f64::<LittleEndian>(value)?;
        }
        Ok(())
    }

    /// Append the checksum and hand back the finished buffer.
    pub fn finish(mut self) -> io::Result<Vec<u8>> {
        let checksum = xxh3_64(&self.buf);
        self.buf.write_u64::<LittleEndian>(checksum)?;
        Ok(self.buf)
    }
}

pub fn encode(model: &FittedVectorizer) -> io::Result<Vec<u8>> {
    let mut writer = ModelWriter::new()?;
    writer.write_params(&model.params)?;
    writer.write_u64(model.projector.num_features() as u64)?;

    writer.write_classes(model.table.stats())?;

    let phrases = model.table.sorted();
    writer.write_u64(phrases.len() as u64)?;
    for (phrase, entry) in phrases {
        writer.write_phrase(phrase, entry.total, &entry.doc_counts)?;
    }

    let prototypes = model.projector.prototypes();
    writer.write_u32(len_u32(prototypes.len(), "prototype list")?)?;
    for prototype in prototypes {
        writer.write_prototype(prototype)?;
    }
    writer.finish()
}
