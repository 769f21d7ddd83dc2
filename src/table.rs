//! The phrase statistics table.
//!
//! While fitting, [`VocabularyTable`] aggregates per-class phrase counts.
//! Entries live in an arena (`entries`) addressed through a hash index, so
//! the hot path of [`observe`](VocabularyTable::observe) is one lookup and
//! an increment. Pruning and eviction never remove entries one at a time:
//! they mark survivors and compact the arena and the index in a single pass.
//!
//! Once fitting is done the table is turned into a [`FrozenTable`], which is
//! immutable and carries the projection data for every surviving phrase.

use std::collections::HashMap;

use crate::project::{assign, class_weight, Assignment};

/// Statistics for one phrase while the table is being built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseEntry {
    total: u64,
    doc_counts: Vec<u64>,
    epoch: u64,
    last_doc: u64,
}

impl PhraseEntry {
    fn new(class: usize, doc: u64, epoch: u64) -> PhraseEntry {
        let mut doc_counts = vec![0; class + 1];
        doc_counts[class] = 1;
        PhraseEntry {
            total: 1,
            doc_counts,
            epoch,
            last_doc: doc,
        }
    }

    fn bump(&mut self, class: usize, doc: u64) {
        self.total += 1;
        if self.last_doc == doc {
            return;
        }
        self.last_doc = doc;
        if self.doc_counts.len() <= class {
            self.doc_counts.resize(class + 1, 0);
        }
        self.doc_counts[class] += 1;
    }

    /// Occurrences across all documents, repeats included.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Documents containing the phrase, per class index. Classes past the
    /// end have count 0.
    pub fn doc_counts(&self) -> &[u64] {
        &self.doc_counts
    }

    /// Insertion order of this entry; smaller is older.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Counts kept for a phrase once fitting is done.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhraseCounts {
    /// Occurrences across all documents.
    pub total: u64,
    /// Documents containing the phrase, per class index.
    pub doc_counts: Vec<u64>,
}

/// Mutable phrase table used while fitting.
#[derive(Debug, Default)]
pub struct VocabularyTable {
    index: HashMap<Box<str>, usize>,
    entries: Vec<PhraseEntry>,
    next_epoch: u64,
}

impl VocabularyTable {
    /// An empty table.
    pub fn new() -> VocabularyTable {
        VocabularyTable::default()
    }

    /// Number of phrases currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no phrase is held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the statistics of `phrase`.
    pub fn get(&self, phrase: &str) -> Option<&PhraseEntry> {
        self.index.get(phrase).map(|&slot| &self.entries[slot])
    }

    /// Count one occurrence of `phrase` in document number `doc`, of class
    /// `class`.
    ///
    /// Occurrences of one document must be observed together: the per-class
    /// document count only moves when `doc` differs from the previous
    /// document that contained the phrase.
    pub fn observe(&mut self, phrase: &str, class: usize, doc: u64) {
        match self.index.get(phrase) {
            Some(&slot) => self.entries[slot].bump(class, doc),
            None => {
                let slot = self.entries.len();
                self.entries
                    .push(PhraseEntry::new(class, doc, self.next_epoch));
                self.next_epoch += 1;
                self.index.insert(phrase.into(), slot);
            }
        }
    }

    /// Remove every phrase whose total count is below `threshold`.
    ///
    /// Returns how many phrases were removed.
    pub fn prune(&mut self, threshold: f64) -> usize {
        let keep: Vec<bool> = self
            .entries
            .iter()
            .map(|entry| entry.total as f64 >= threshold)
            .collect();
        self.compact(&keep)
    }

    /// Evict the least frequent phrases, oldest first among equal counts,
    /// until at most `max_num_phrases` remain.
    ///
    /// Returns how many phrases were evicted.
    pub fn enforce_capacity(&mut self, max_num_phrases: usize) -> usize {
        let len = self.entries.len();
        if len <= max_num_phrases {
            return 0;
        }
        let excess = len - max_num_phrases;
        let mut order: Vec<usize> = (0..len).collect();
        let entries = &self.entries;
        let key = |&slot: &usize| (entries[slot].total, entries[slot].epoch);
        order.select_nth_unstable_by_key(excess - 1, key);

        let mut keep = vec![true; len];
        for &slot in &order[..excess] {
            keep[slot] = false;
        }
        self.compact(&keep)
    }

    /// Drop every entry whose `keep` flag is false, preserving arena order.
    fn compact(&mut self, keep: &[bool]) -> usize {
        let len = self.entries.len();
        let mut remap = vec![usize::MAX; len];
        let mut kept = 0;
        for (slot, &k) in keep.iter().enumerate() {
            if k {
                remap[slot] = kept;
                kept += 1;
            }
        }
        if kept == len {
            return 0;
        }

        let mut slot = 0;
        self.entries.retain(|_| {
            let k = keep[slot];
            slot += 1;
            k
        });
        self.index.retain(|_, slot| match remap[*slot] {
            usize::MAX => false,
            new_slot => {
                *slot = new_slot;
                true
            }
        });
        len - kept
    }

    /// Consume the table, yielding each phrase with its counts.
    pub fn into_phrases(self) -> Vec<(Box<str>, PhraseCounts)> {
        let mut counts: Vec<Option<PhraseCounts>> = self
            .entries
            .into_iter()
            .map(|entry| {
                Some(PhraseCounts {
                    total: entry.total,
                    doc_counts: entry.doc_counts,
                })
            })
            .collect();
        self.index
            .into_iter()
            .filter_map(|(phrase, slot)| counts[slot].take().map(|c| (phrase, c)))
            .collect()
    }
}

/// Corpus-level counts the phrase weights are derived from.
///
/// Classes are dense indices `0..labels.len()`; `labels[c]` is the label the
/// caller used for class `c`, and labels are strictly increasing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassStats {
    /// Documents scanned while fitting.
    pub num_docs: u64,
    /// Caller label of each class.
    pub labels: Vec<usize>,
    /// Documents scanned per class index.
    pub class_docs: Vec<u64>,
}

impl ClassStats {
    /// Statistics for the given sorted, distinct labels, with no documents
    /// counted yet.
    pub fn for_labels(labels: Vec<usize>) -> ClassStats {
        ClassStats {
            num_docs: 0,
            class_docs: vec![0; labels.len()],
            labels,
        }
    }

    /// Record one scanned document of class index `class`, which must be
    /// below `labels.len()`.
    pub fn add_document(&mut self, class: usize) {
        self.class_docs[class] += 1;
        self.num_docs += 1;
    }
}

/// Read-only data for one phrase of a fitted model.
#[derive(Debug, Clone, PartialEq)]
pub struct FrozenEntry {
    /// Sketch bucket and sign, derived from the phrase alone.
    pub assignment: Assignment,
    /// Class-discriminative weight.
    pub weight: f64,
    /// Occurrences across all training documents.
    pub total: u64,
    /// Training documents containing the phrase, per class index.
    pub doc_counts: Box<[u64]>,
}

/// The immutable phrase table of a fitted model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrozenTable {
    entries: HashMap<Box<str>, FrozenEntry>,
    stats: ClassStats,
    sketch_bits: u8,
}

impl FrozenTable {
    /// Freeze `phrases`, computing each phrase's assignment and weight.
    ///
    /// Both fitting and decoding build tables through this function, so a
    /// decoded model carries bit-identical weights.
    pub fn build<I>(phrases: I, stats: ClassStats, sketch_bits: u8) -> FrozenTable
    where
        I: IntoIterator<Item = (Box<str>, PhraseCounts)>,
    {
        let entries = phrases
            .into_iter()
            .map(|(phrase, counts)| {
                let entry = FrozenEntry {
                    assignment: assign(&phrase, sketch_bits),
                    weight: class_weight(&counts.doc_counts, &stats),
                    total: counts.total,
                    doc_counts: counts.doc_counts.into_boxed_slice(),
                };
                (phrase, entry)
            })
            .collect();
        FrozenTable {
            entries,
            stats,
            sketch_bits,
        }
    }

    /// Number of phrases.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the table holds no phrase.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a phrase.
    pub fn get(&self, phrase: &str) -> Option<&FrozenEntry> {
        self.entries.get(phrase)
    }

    /// Corpus statistics used for the weights.
    pub fn stats(&self) -> &ClassStats {
        &self.stats
    }

    /// Width of the hashed phrase space, in bits.
    pub fn sketch_bits(&self) -> u8 {
        self.sketch_bits
    }

    /// All phrases, sorted by key.
    pub fn sorted(&self) -> Vec<(&str, &FrozenEntry)> {
        let mut phrases: Vec<_> = self
            .entries
            .iter()
            .map(|(phrase, entry)| (&**phrase, entry))
            .collect();
        phrases.sort_unstable_by(|a, b| a.0.cmp(b.0));
        phrases
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every observation is its own document.
    fn table_of(phrases: &[(&str, usize)]) -> VocabularyTable {
        let mut table = VocabularyTable::new();
        for (doc, &(phrase, class)) in phrases.iter().enumerate() {
            table.observe(phrase, class, doc as u64);
        }
        table
    }

    #[test]
    fn observe_counts_documents_per_class() {
        let table = table_of(&[("hi", 0), ("hi", 2), ("hi", 2), ("name", 1)]);
        assert_eq!(table.len(), 2);
        let hi = table.get("hi").unwrap();
        assert_eq!(hi.total(), 3);
        assert_eq!(hi.doc_counts(), [1, 0, 2]);
        assert_eq!(table.get("name").unwrap().doc_counts(), [0, 1]);
        assert!(table.get("mike").is_none());
    }

    #[test]
    fn repeats_within_a_document_count_once_per_class() {
        let mut table = VocabularyTable::new();
        table.observe("the", 0, 0);
        table.observe("cat", 0, 0);
        table.observe("the", 0, 0);
        table.observe("the", 1, 1);
        let the = table.get("the").unwrap();
        assert_eq!(the.total(), 3);
        assert_eq!(the.doc_counts(), [1, 1]);
    }

    #[test]
    fn epochs_follow_insertion_order() {
        let table = table_of(&[("b", 0), ("a", 0), ("b", 0)]);
        assert_eq!(table.get("b").unwrap().epoch(), 0);
        assert_eq!(table.get("a").unwrap().epoch(), 1);
    }

    #[test]
    fn prune_removes_entries_below_threshold() {
        let mut table = table_of(&[("a", 0), ("a", 0), ("b", 0), ("c", 1), ("c", 1), ("c", 0)]);
        assert_eq!(table.prune(2.0), 1);
        assert_eq!(table.len(), 2);
        assert!(table.get("b").is_none());
        assert_eq!(table.get("a").unwrap().total(), 2);
        assert_eq!(table.get("c").unwrap().total(), 3);
    }

    #[test]
    fn prune_uses_occurrences_not_documents() {
        let mut table = VocabularyTable::new();
        table.observe("echo", 0, 0);
        table.observe("echo", 0, 0);
        table.observe("once", 0, 0);
        assert_eq!(table.prune(2.0), 1);
        assert_eq!(table.get("echo").unwrap().doc_counts(), [1]);
    }

    #[test]
    fn prune_with_fractional_threshold() {
        let mut table = table_of(&[("a", 0), ("b", 0), ("b", 0)]);
        assert_eq!(table.prune(0.003), 0);
        assert_eq!(table.prune(1.5), 1);
        assert!(table.get("a").is_none());
    }

    #[test]
    fn index_stays_consistent_after_compaction() {
        let mut table = table_of(&[("a", 0), ("b", 0), ("b", 0), ("c", 0), ("d", 1), ("d", 1)]);
        table.prune(2.0);
        table.observe("d", 0, 10);
        table.observe("e", 0, 10);
        assert_eq!(table.get("b").unwrap().total(), 2);
        assert_eq!(table.get("d").unwrap().total(), 3);
        assert_eq!(table.get("d").unwrap().doc_counts(), [1, 2]);
        assert_eq!(table.get("e").unwrap().total(), 1);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn capacity_evicts_lowest_counts_first() {
        let mut table = table_of(&[("a", 0), ("a", 0), ("a", 0), ("b", 0), ("c", 0), ("c", 0)]);
        assert_eq!(table.enforce_capacity(2), 1);
        assert_eq!(table.len(), 2);
        assert!(table.get("b").is_none());
    }

    #[test]
    fn capacity_ties_evict_oldest_first() {
        let mut table = table_of(&[("old", 0), ("mid", 0), ("new", 0), ("big", 0), ("big", 0)]);
        assert_eq!(table.enforce_capacity(2), 2);
        assert_eq!(table.len(), 2);
        assert!(table.get("big").is_some());
        assert!(table.get("new").is_some());
        assert!(table.get("old").is_none());
        assert!(table.get("mid").is_none());
    }

    #[test]
    fn capacity_is_a_no_op_under_the_cap() {
        let mut table = table_of(&[("a", 0), ("b", 0)]);
        assert_eq!(table.enforce_capacity(2), 0);
        assert_eq!(table.enforce_capacity(10), 0);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn capacity_holds_for_large_tables() {
        let mut table = VocabularyTable::new();
        let mut doc = 0;
        for i in 0..1_000 {
            for _ in 0..(i % 7) {
                table.observe(&format!("phrase {i}"), i % 3, doc);
                doc += 1;
            }
            table.observe(&format!("phrase {i}"), 0, doc);
            doc += 1;
        }
        assert_eq!(table.enforce_capacity(100), 900);
        assert_eq!(table.len(), 100);
        // The 100 survivors are the most frequent phrases (count 7).
        for i in (0..1_000).filter(|i| i % 7 == 6) {
            let kept = table.get(&format!("phrase {i}")).is_some();
            assert_eq!(kept, i >= 6 + 7 * 42, "phrase {i}");
        }
    }

    #[test]
    fn into_phrases_yields_every_survivor() {
        let mut table = table_of(&[("a", 0), ("b", 1), ("b", 1), ("c", 0)]);
        table.prune(2.0);
        let phrases = table.into_phrases();
        assert_eq!(
            phrases,
            vec![(
                "b".into(),
                PhraseCounts {
                    total: 2,
                    doc_counts: vec![0, 2]
                }
            )]
        );
    }

    #[test]
    fn class_stats_count_documents() {
        let mut stats = ClassStats::for_labels(vec![3, 7]);
        stats.add_document(1);
        stats.add_document(0);
        stats.add_document(1);
        assert_eq!(stats.num_docs, 3);
        assert_eq!(stats.class_docs, [1, 2]);
        assert_eq!(stats.labels, [3, 7]);
    }
}
