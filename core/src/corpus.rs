use crate::error::CorpusLoadError;
use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One FAQ record. Entries are identified by their position in the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}

impl FaqEntry {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self { question: question.into(), answer: answer.into() }
    }
}

/// Load a corpus from a `.json` / `.jsonl` file, or from every such file below a directory.
///
/// Either every record loads or the whole call fails; a partial corpus is never returned.
pub fn load_corpus<P: AsRef<Path>>(path: P) -> Result<Vec<FaqEntry>, CorpusLoadError> {
    let path = path.as_ref();
    let meta = fs::metadata(path)
        .map_err(|source| CorpusLoadError::Io { path: path.to_path_buf(), source })?;
    if !meta.is_dir() {
        return load_file(path);
    }

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry.map_err(|err| CorpusLoadError::Io {
            path: err.path().unwrap_or(path).to_path_buf(),
            source: err.into(),
        })?;
        let p = entry.path();
        if p.is_file() && matches!(extension(p), Some("json" | "jsonl")) {
            files.push(p.to_path_buf());
        }
    }
    if files.is_empty() {
        return Err(CorpusLoadError::NoSources(path.to_path_buf()));
    }

    let mut entries = Vec::new();
    for file in files {
        entries.extend(load_file(&file)?);
    }
    Ok(entries)
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|s| s.to_str())
}

fn load_file(path: &Path) -> Result<Vec<FaqEntry>, CorpusLoadError> {
    let text = fs::read_to_string(path)
        .map_err(|source| CorpusLoadError::Io { path: path.to_path_buf(), source })?;
    if extension(path) == Some("jsonl") {
        parse_jsonl(path, &text)
    } else {
        parse_json(&text).map_err(|source| CorpusLoadError::Malformed { path: path.to_path_buf(), source })
    }
}

fn parse_jsonl(path: &Path, text: &str) -> Result<Vec<FaqEntry>, CorpusLoadError> {
    let mut entries = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let entry: FaqEntry = serde_json::from_str(line).map_err(|source| CorpusLoadError::MalformedLine {
            path: path.to_path_buf(),
            line: idx + 1,
            source,
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Accepts `{"questions": [...]}` or a bare array of records.
pub fn parse_json(text: &str) -> Result<Vec<FaqEntry>, serde_json::Error> {
    let json: serde_json::Value = serde_json::from_str(text)?;
    match json {
        serde_json::Value::Array(_) => serde_json::from_value(json),
        serde_json::Value::Object(mut obj) => match obj.remove("questions") {
            Some(list) => serde_json::from_value(list),
            None => Err(serde_json::Error::missing_field("questions")),
        },
        _ => Err(serde_json::Error::custom("expected an object with `questions` or an array of entries")),
    }
}

/// Hex SHA-1 over every question and answer, in corpus order.
pub fn corpus_fingerprint(entries: &[FaqEntry]) -> String {
    let mut hasher = Sha1::new();
    for entry in entries {
        hasher.update(entry.question.as_bytes());
        hasher.update([0u8]);
        hasher.update(entry.answer.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const WRAPPED: &str = r#"{"questions": [
        {"question": "How do I reset my password?", "answer": "Use the forgot password link."},
        {"question": "Do you ship abroad?", "answer": "Yes, to 40 countries.", "category": "shipping"}
    ]}"#;

    #[test]
    fn parses_wrapped_and_bare_documents() {
        let wrapped = parse_json(WRAPPED).unwrap();
        assert_eq!(wrapped.len(), 2);
        assert_eq!(wrapped[1].answer, "Yes, to 40 countries.");

        let bare = parse_json(r#"[{"question": "q", "answer": "a"}]"#).unwrap();
        assert_eq!(bare, vec![FaqEntry::new("q", "a")]);
    }

    #[test]
    fn rejects_wrong_shapes() {
        assert!(parse_json(r#"{"faqs": []}"#).is_err());
        assert!(parse_json(r#""just a string""#).is_err());
        assert!(parse_json(r#"[{"question": "missing answer"}]"#).is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = load_corpus(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, CorpusLoadError::Io { .. }));
    }

    #[test]
    fn jsonl_reports_bad_line() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("faq.jsonl");
        fs::write(&file, "{\"question\":\"a\",\"answer\":\"b\"}\n\nnot json\n").unwrap();
        match load_corpus(&file).unwrap_err() {
            CorpusLoadError::MalformedLine { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn directory_loads_in_sorted_order() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.jsonl"), "{\"question\":\"second\",\"answer\":\"2\"}\n").unwrap();
        fs::write(dir.path().join("a.json"), r#"[{"question":"first","answer":"1"}]"#).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let entries = load_corpus(dir.path()).unwrap();
        let questions: Vec<&str> = entries.iter().map(|e| e.question.as_str()).collect();
        assert_eq!(questions, vec!["first", "second"]);
    }

    #[test]
    fn one_bad_file_fails_the_whole_directory() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.json"), r#"[{"question":"fine","answer":"1"}]"#).unwrap();
        fs::write(dir.path().join("b.json"), r#"{"questions": [{"question":"no answer"}]}"#).unwrap();
        match load_corpus(dir.path()).unwrap_err() {
            CorpusLoadError::Malformed { path, .. } => assert!(path.ends_with("b.json")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_directory_has_no_sources() {
        let dir = tempdir().unwrap();
        assert!(matches!(load_corpus(dir.path()).unwrap_err(), CorpusLoadError::NoSources(_)));
    }

    #[test]
    fn fingerprint_tracks_content_and_order() {
        let a = vec![FaqEntry::new("q1", "a1"), FaqEntry::new("q2", "a2")];
        let b = vec![FaqEntry::new("q2", "a2"), FaqEntry::new("q1", "a1")];
        assert_eq!(corpus_fingerprint(&a), corpus_fingerprint(&a.clone()));
        assert_ne!(corpus_fingerprint(&a), corpus_fingerprint(&b));
        assert_eq!(corpus_fingerprint(&a).len(), 40);
    }
}
