//! Glue behind the `vhash` command line tool.
//!
//! The binary only parses arguments; everything it does happens in [`run`].

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::Hyperparameters;
use crate::error::{VHashErrorKind, VHashResult};
use crate::model::{FittedVectorizer, HashVectorizer};

/// Command line values for individual hyperparameters. Each one that is set
/// replaces the value from the defaults or from `--config`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    /// `--smallest-ngram`
    pub smallest_ngram: Option<usize>,
    /// `--largest-ngram`
    pub largest_ngram: Option<usize>,
    /// `--min-phrase-occurrence`
    pub min_phrase_occurrence: Option<f32>,
    /// `--num-features`
    pub num_features: Option<usize>,
    /// `--max-num-phrases`
    pub max_num_phrases: Option<usize>,
    /// `--downsample-to`
    pub downsample_to: Option<usize>,
    /// `--live-evaluation-step`
    pub live_evaluation_step: Option<usize>,
    /// `--sketch-bits`
    pub sketch_bits: Option<u8>,
    /// `--seed`
    pub seed: Option<u64>,
}

impl Overrides {
    fn apply(&self, params: &mut Hyperparameters) {
        fn set<T: Copy>(field: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *field = value;
            }
        }
        set(&mut params.smallest_ngram, self.smallest_ngram);
        set(&mut params.largest_ngram, self.largest_ngram);
        set(&mut params.min_phrase_occurrence, self.min_phrase_occurrence);
        set(&mut params.num_features, self.num_features);
        set(&mut params.max_num_phrases, self.max_num_phrases);
        set(&mut params.downsample_to, self.downsample_to);
        set(&mut params.live_evaluation_step, self.live_evaluation_step);
        set(&mut params.sketch_bits, self.sketch_bits);
        set(&mut params.seed, self.seed);
    }
}

/// Everything the `vhash` binary was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    /// Labelled corpus to fit on. Without one, the model is loaded instead.
    pub corpus: Option<String>,
    /// Where the model is saved to or loaded from.
    pub model: String,
    /// JSON file of hyperparameters.
    pub config: Option<String>,
    /// Per-flag hyperparameter values.
    pub overrides: Overrides,
    /// Files or directories of documents to transform, one per line.
    pub documents: Vec<String>,
}

impl Default for CliArgs {
    fn default() -> Self {
        CliArgs {
            corpus: None,
            model: "model.vhash".to_string(),
            config: None,
            overrides: Overrides::default(),
            documents: vec![],
        }
    }
}

/// Read hyperparameters from an optional JSON file, then apply overrides.
pub fn load_hyperparameters(
    config: Option<&Path>,
    overrides: &Overrides,
) -> VHashResult<Hyperparameters> {
    let mut params = match config {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => Hyperparameters::default(),
    };
    overrides.apply(&mut params);
    Ok(params)
}

/// Split a corpus of `label<TAB>text` lines into labels and documents.
///
/// Blank lines are skipped. Any other line without a tab is an error that
/// names the line.
pub fn parse_corpus(text: &str) -> VHashResult<(Vec<String>, Vec<String>)> {
    let mut labels = vec![];
    let mut docs = vec![];
    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((label, doc)) = line.split_once('\t') else {
            return Err(VHashErrorKind::Corpus { line: i + 1 }.into());
        };
        labels.push(label.to_string());
        docs.push(doc.to_string());
    }
    Ok((labels, docs))
}

/// Map arbitrary label strings to class indices `0..k`, in sorted order of
/// the distinct labels. Returns the indices and the label of each class.
pub fn remap_labels<S: AsRef<str>>(labels: &[S]) -> (Vec<usize>, Vec<String>) {
    let mut classes: BTreeMap<&str, usize> =
        labels.iter().map(|label| (label.as_ref(), 0)).collect();
    for (i, class) in classes.values_mut().enumerate() {
        *class = i;
    }
    let indices = labels.iter().map(|label| classes[label.as_ref()]).collect();
    let names = classes.keys().map(|name| name.to_string()).collect();
    (indices, names)
}

/// Given some paths, generate the complete list of document files. For
/// directories, every file immediately under the directory is used, in name
/// order.
///
/// It's an error if any of the `args` is not a valid path to an existing file
/// or directory.
fn expand_filename_arguments(args: &[String]) -> io::Result<Vec<PathBuf>> {
    let mut filenames = vec![];
    for arg in args {
        let path = PathBuf::from(arg);
        if path.metadata()?.is_dir() {
            let mut entries = vec![];
            for entry in path.read_dir()? {
                let entry = entry?;
                if entry.file_type()?.is_file() {
                    entries.push(entry.path());
                }
            }
            entries.sort();
            filenames.extend(entries);
        } else {
            filenames.push(path);
        }
    }
    Ok(filenames)
}

fn fit_corpus(corpus: &Path, args: &CliArgs) -> VHashResult<FittedVectorizer> {
    let params = load_hyperparameters(args.config.as_deref().map(Path::new), &args.overrides)?;
    let vectorizer = HashVectorizer::new(params)?;

    let (labels, docs) = parse_corpus(&fs::read_to_string(corpus)?)?;
    let (labels, classes) = remap_labels(&labels);
    info!(
        corpus = %corpus.display(),
        docs = docs.len(),
        classes = ?classes,
        "read corpus"
    );

    let model = vectorizer.fit(&docs, &labels)?;
    model.save(&args.model)?;
    Ok(model)
}

fn write_vector<W: Write>(out: &mut W, vector: &[f32]) -> io::Result<()> {
    for (i, value) in vector.iter().enumerate() {
        if i > 0 {
            out.write_all(b" ")?;
        }
        write!(out, "{value}")?;
    }
    out.write_all(b"\n")
}

/// Fit or load a model, then print the vector of every document line.
pub fn run(args: &CliArgs) -> VHashResult<()> {
    let model = match &args.corpus {
        Some(corpus) => fit_corpus(Path::new(corpus), args)?,
        None => FittedVectorizer::load(&args.model)?,
    };

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for filename in expand_filename_arguments(&args.documents)? {
        let text = fs::read_to_string(&filename)?;
        let lines: Vec<&str> = text.lines().collect();
        for vector in model.transform(&lines) {
            write_vector(&mut out, &vector)?;
        }
    }
    out.flush()?;
    Ok(())
}
