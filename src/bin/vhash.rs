//! `vhash` fits a vectorizing hash table on a labelled corpus and prints
//! document vectors.
//!
//! *   `vhash --fit corpus.tsv -m model.vhash` fits on `label<TAB>text` lines
//!     and saves the model.
//!
//! *   `vhash -m model.vhash docs.txt` loads a saved model and prints one
//!     vector per line of `docs.txt`.
//!
//! Both can be combined: fit, save, then transform in one go.

use argparse::{ArgumentParser, Collect, Store, StoreOption};
use tracing_subscriber::EnvFilter;
use vhash::cli::{run, CliArgs};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut args = CliArgs::default();

    {
        let mut ap = ArgumentParser::new();
        ap.set_description("Turn text documents into fixed-size vectors.");
        _ = ap.refer(&mut args.corpus).add_option(
            &["--fit"],
            StoreOption,
            "Fit on this corpus of `label<TAB>text` lines and save the model.",
        );
        _ = ap.refer(&mut args.model).add_option(
            &["-m", "--model"],
            Store,
            "Model file to save to, or to load when --fit is not given.",
        );
        _ = ap.refer(&mut args.config).add_option(
            &["--config"],
            StoreOption,
            "JSON file of hyperparameters.",
        );
        _ = ap.refer(&mut args.overrides.smallest_ngram).add_option(
            &["--smallest-ngram"],
            StoreOption,
            "Fewest words in a phrase.",
        );
        _ = ap.refer(&mut args.overrides.largest_ngram).add_option(
            &["--largest-ngram"],
            StoreOption,
            "Most words in a phrase.",
        );
        _ = ap.refer(&mut args.overrides.min_phrase_occurrence).add_option(
            &["--min-phrase-occurrence"],
            StoreOption,
            "Occurrences a phrase needs to be kept; below 1, a fraction of documents seen.",
        );
        _ = ap.refer(&mut args.overrides.num_features).add_option(
            &["--num-features"],
            StoreOption,
            "Length of each output vector.",
        );
        _ = ap.refer(&mut args.overrides.max_num_phrases).add_option(
            &["--max-num-phrases"],
            StoreOption,
            "Largest vocabulary kept while fitting.",
        );
        _ = ap.refer(&mut args.overrides.downsample_to).add_option(
            &["--downsample-to"],
            StoreOption,
            "Most training documents used.",
        );
        _ = ap.refer(&mut args.overrides.live_evaluation_step).add_option(
            &["--live-evaluation-step"],
            StoreOption,
            "Prune rare phrases every this many documents.",
        );
        _ = ap.refer(&mut args.overrides.sketch_bits).add_option(
            &["--sketch-bits"],
            StoreOption,
            "Phrases are hashed into 2^bits buckets.",
        );
        _ = ap.refer(&mut args.overrides.seed).add_option(
            &["--seed"],
            StoreOption,
            "Seed for downsampling and prototype choice.",
        );
        _ = ap.refer(&mut args.documents).add_argument(
            "documents",
            Collect,
            "Files/directories of documents to transform, one document per line. \
                For directories, every file immediately under the directory is used.",
        );
        ap.parse_args_or_exit();
    }

    if let Err(err) = run(&args) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
