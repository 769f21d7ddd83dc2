//! `vhash` turns text documents into fixed-size vectors.
//!
//! Fitting scans a labelled corpus once and keeps a bounded table of word
//! n-grams ("phrases") together with how often each occurs per class. Phrases
//! that are too rare are pruned while scanning, and the table never grows
//! much beyond `max_num_phrases`. The finished table is frozen and used to
//! project any document, seen or unseen, onto `num_features` dimensions.
//!
//! ```no_run
//! use vhash::{HashVectorizer, Hyperparameters};
//!
//! # fn main() -> vhash::VHashResult<()> {
//! let docs = ["hi, my name is Mike", "hi, my name is George", "hello, my name is Mike"];
//! let labels = [1, 0, 1];
//! let model = HashVectorizer::new(Hyperparameters::default())?.fit(&docs, &labels)?;
//! let vectors = model.transform(&docs);
//! assert_eq!(vectors.len(), 3);
//! model.save("model.vhash")?;
//! # Ok(())
//! # }
//! ```
//!
//! The modules are layered leaves first: [`phrase`] extracts phrases,
//! [`table`] counts them, [`project`] hashes and weights them. Fitting ties
//! the three together, and the codec persists the result.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod cli;
pub mod config;
pub mod error;
mod fit;
mod model;
pub mod phrase;
pub mod project;
mod read;
pub mod table;
mod tmp;
mod write;

pub use crate::config::Hyperparameters;
pub use crate::error::{ConfigError, DecodeError, VHashError, VHashErrorKind, VHashResult};
pub use crate::model::{Documents, FittedVectorizer, HashVectorizer};
pub use crate::phrase::{tokenize, PhraseExtractor};
