//! Phrase collection for the submission client.
//!
//! Callers hand the CLI a mixture of literal phrases and phrase-list file
//! paths. This crate turns that into an ordered, deduplicated sequence of
//! [`Phrase`] values and provides the deterministic output-name helpers
//! used when writing downloaded videos to disk.

pub mod error;
pub mod parser;
pub mod types;

pub use error::{PhraseLoadError, Result};
pub use parser::collect_phrases;
pub use types::{normalize, output_filename, slug, stable_key, Phrase};
