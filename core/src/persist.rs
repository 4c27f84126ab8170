use crate::corpus::{corpus_fingerprint, FaqEntry};
use crate::error::{Error, Result};
use crate::index::{FaqIndex, MatcherConfig, TermId, TermVector};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_entries: u32,
    pub num_terms: u32,
    pub created_at: String,
    pub version: u32,
    pub fingerprint: String,
    pub config: MatcherConfig,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn dictionary(&self) -> PathBuf { self.root.join("dictionary.bin") }
    fn entries(&self) -> PathBuf { self.root.join("entries.bin") }
    fn vectors(&self) -> PathBuf { self.root.join("vectors.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }

    pub fn exists(&self) -> bool {
        self.meta().is_file()
    }
}

fn write_bin<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = bincode::serialize(value).map_err(|e| Error::persist(path, e))?;
    let mut f = File::create(path).map_err(|e| Error::persist(path, e))?;
    f.write_all(&bytes).map_err(|e| Error::persist(path, e))?;
    Ok(())
}

fn read_bin<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let mut f = File::open(path).map_err(|e| Error::persist(path, e))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf).map_err(|e| Error::persist(path, e))?;
    bincode::deserialize(&buf).map_err(|e| Error::persist(path, e))
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    let path = paths.meta();
    let json = serde_json::to_string_pretty(meta).map_err(|e| Error::persist(&path, e))?;
    let mut f = File::create(&path).map_err(|e| Error::persist(&path, e))?;
    f.write_all(json.as_bytes()).map_err(|e| Error::persist(&path, e))?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let path = paths.meta();
    let mut f = File::open(&path).map_err(|e| Error::persist(&path, e))?;
    let mut buf = String::new();
    f.read_to_string(&mut buf).map_err(|e| Error::persist(&path, e))?;
    serde_json::from_str(&buf).map_err(|e| Error::persist(&path, e))
}

/// Write every part of the index below `paths.root`, creating it if needed.
pub fn save_index(paths: &IndexPaths, index: &FaqIndex) -> Result<()> {
    create_dir_all(&paths.root).map_err(|e| Error::persist(&paths.root, e))?;
    write_bin(&paths.dictionary(), &(index.dictionary(), index.df()))?;
    write_bin(&paths.entries(), &index.entries())?;
    write_bin(&paths.vectors(), &index.vectors())?;
    let meta = MetaFile {
        num_entries: index.len() as u32,
        num_terms: index.num_terms() as u32,
        created_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default(),
        version: FORMAT_VERSION,
        fingerprint: index.fingerprint().to_string(),
        config: *index.config(),
    };
    save_meta(paths, &meta)?;
    tracing::info!(root = %paths.root.display(), num_entries = meta.num_entries, "saved faq index");
    Ok(())
}

pub fn load_index(paths: &IndexPaths) -> Result<FaqIndex> {
    let meta = load_meta(paths)?;
    if meta.version != FORMAT_VERSION {
        return Err(Error::UnsupportedVersion(meta.version));
    }
    let (dictionary, df): (HashMap<String, TermId>, Vec<u32>) = read_bin(&paths.dictionary())?;
    let entries: Vec<FaqEntry> = read_bin(&paths.entries())?;
    let vectors: Vec<TermVector> = read_bin(&paths.vectors())?;
    if entries.len() != meta.num_entries as usize {
        return Err(Error::CorruptIndex(format!(
            "meta.json lists {} entries, entries.bin has {}",
            meta.num_entries,
            entries.len()
        )));
    }
    FaqIndex::from_parts(entries, dictionary, df, vectors, meta.config, meta.fingerprint)
}

/// Load a persisted index and make sure it was built from exactly `corpus`.
pub fn load_index_checked(paths: &IndexPaths, corpus: &[FaqEntry]) -> Result<FaqIndex> {
    let index = load_index(paths)?;
    if !index.is_built_from(corpus) {
        return Err(Error::StaleIndex {
            expected: corpus_fingerprint(corpus),
            found: index.fingerprint().to_string(),
        });
    }
    Ok(index)
}
