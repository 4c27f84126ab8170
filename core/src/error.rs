use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    CorpusLoad(#[from] CorpusLoadError),
    #[error("corpus has no entries")]
    EmptyCorpus,
    #[error("invalid matcher config: {0}")]
    InvalidConfig(String),
    #[error("index persistence failed at {path}: {message}")]
    Persist { path: PathBuf, message: String },
    #[error("index is corrupt: {0}")]
    CorruptIndex(String),
    #[error("unsupported index format version {0}")]
    UnsupportedVersion(u32),
    #[error("index was built from corpus {found}, current corpus is {expected}")]
    StaleIndex { expected: String, found: String },
}

impl Error {
    pub(crate) fn persist(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Error::Persist { path: path.into(), message: err.to_string() }
    }
}

/// Everything that can go wrong turning a corpus source into entries.
#[derive(Debug, Error)]
pub enum CorpusLoadError {
    #[error("cannot read corpus {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed corpus {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed corpus {path} at line {line}: {source}")]
    MalformedLine {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("no .json or .jsonl files under {0}")]
    NoSources(PathBuf),
}
