pub mod corpus;
pub mod error;
mod index;
pub mod persist;
pub mod tokenizer;

pub use corpus::{corpus_fingerprint, load_corpus, FaqEntry};
pub use error::{CorpusLoadError, Error, Result};
pub use index::*;
