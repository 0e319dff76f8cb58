//! Error types for the phrase-loader crate.

use thiserror::Error;

/// Errors that can occur while collecting phrases.
#[derive(Error, Debug)]
pub enum PhraseLoadError {
    /// A phrase-list file could not be read
    #[error("failed to read phrase file {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Nothing usable was found in the given inputs
    #[error("no phrases found in the given inputs")]
    Empty,
}

/// Convenience alias for Results in this crate
pub type Result<T> = std::result::Result<T, PhraseLoadError>;
