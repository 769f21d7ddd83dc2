//! Splitting documents into words and phrases.

/// Break `text` into normalized words.
///
/// Anything that is not alphanumeric separates words, letters are
/// lowercased, and a switch between letters and digits starts a new word,
/// so `"Route66, west!"` becomes `["route", "66", "west"]`.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut words = vec![];
    let mut word = String::new();
    let mut word_is_numeric = false;

    for ch in text.chars() {
        if !ch.is_alphanumeric() {
            if !word.is_empty() {
                words.push(std::mem::take(&mut word));
            }
            continue;
        }
        let is_numeric = ch.is_numeric();
        if !word.is_empty() && is_numeric != word_is_numeric {
            words.push(std::mem::take(&mut word));
        }
        word_is_numeric = is_numeric;
        word.extend(ch.to_lowercase());
    }
    if !word.is_empty() {
        words.push(word);
    }
    words
}

/// Produces every phrase of `smallest..=largest` consecutive words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhraseExtractor {
    smallest: usize,
    largest: usize,
}

impl PhraseExtractor {
    /// Extractor for phrases of `smallest` to `largest` words.
    ///
    /// Callers validate the range; a zero `smallest` is treated as 1.
    pub fn new(smallest: usize, largest: usize) -> PhraseExtractor {
        PhraseExtractor {
            smallest: smallest.max(1),
            largest,
        }
    }

    /// All phrases of `text`, shortest phrases first, in document order
    /// within each length.
    pub fn extract(&self, text: &str) -> Vec<String> {
        let mut phrases = vec![];
        self.for_each_phrase(text, |phrase| phrases.push(phrase.to_string()));
        phrases
    }

    /// Call `f` once per phrase occurrence of `text`, in the same order as
    /// [`extract`](Self::extract). A single buffer is reused for every
    /// phrase.
    pub fn for_each_phrase<F>(&self, text: &str, mut f: F)
    where
        F: FnMut(&str),
    {
        let words = tokenize(text);
        let mut buf = String::new();
        for len in self.smallest..=self.largest {
            for window in words.windows(len) {
                buf.clear();
                for (i, word) in window.iter().enumerate() {
                    if i > 0 {
                        buf.push(' ');
                    }
                    buf.push_str(word);
                }
                f(&buf);
            }
        }
    }
}
