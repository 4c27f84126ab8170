use crate::corpus::{corpus_fingerprint, FaqEntry};
use crate::error::{Error, Result};
use crate::tokenizer::term_counts;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub type TermId = u32;

/// A sparse weight vector, sorted by term id.
pub type TermVector = Vec<(TermId, f32)>;

pub const DEFAULT_THRESHOLD: f32 = 0.2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdfWeighting {
    /// ln((1 + N) / (1 + df)) + 1, never zero
    #[default]
    Smooth,
    /// ln(N / df), zero for terms present in every entry
    Plain,
}

impl IdfWeighting {
    fn idf(self, num_entries: usize, df: u32) -> f32 {
        let n = num_entries as f32;
        let df = df.max(1) as f32;
        match self {
            IdfWeighting::Smooth => ((1.0 + n) / (1.0 + df)).ln() + 1.0,
            IdfWeighting::Plain => (n / df).ln(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Minimum cosine similarity for a match to count.
    pub threshold: f32,
    #[serde(default)]
    pub idf: IdfWeighting,
    /// Use 1 + ln(tf) instead of the raw term count.
    #[serde(default)]
    pub sublinear_tf: bool,
    /// Reduce terms to their English stems, so "orders" also hits "order".
    #[serde(default)]
    pub stem: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self { threshold: DEFAULT_THRESHOLD, idf: IdfWeighting::Smooth, sublinear_tf: false, stem: false }
    }
}

impl MatcherConfig {
    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.threshold)
    }
}

fn validate_threshold(threshold: f32) -> Result<()> {
    if threshold.is_finite() && (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!("threshold must be within [0, 1], got {threshold}")))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Posting {
    pub entry: u32,
    pub weight: f32, // normalized tf-idf weight
}

/// Best corpus entry for a query, above the relevance threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Match<'a> {
    pub position: usize,
    pub entry: &'a FaqEntry,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum MatchOutcome<'a> {
    Matched(Match<'a>),
    /// Nothing cleared the threshold. This is an expected answer, not a failure.
    NoMatch { best_score: f32 },
}

impl<'a> MatchOutcome<'a> {
    pub fn matched(&self) -> Option<&Match<'a>> {
        match self {
            MatchOutcome::Matched(m) => Some(m),
            MatchOutcome::NoMatch { .. } => None,
        }
    }

    pub fn is_match(&self) -> bool {
        self.matched().is_some()
    }
}

/// TF-IDF index over the questions of one corpus.
///
/// The index owns the corpus it was built from, so results always refer to
/// entries of that exact corpus. It is never mutated after construction; a new
/// corpus means a new index.
#[derive(Debug, Clone)]
pub struct FaqIndex {
    entries: Vec<FaqEntry>,
    dictionary: HashMap<String, TermId>,
    df: Vec<u32>,
    idf: Vec<f32>,
    vectors: Vec<TermVector>,
    postings: Vec<Vec<Posting>>, // indexed by term id, sorted by entry
    config: MatcherConfig,
    fingerprint: String,
}

impl FaqIndex {
    pub fn build(entries: Vec<FaqEntry>) -> Result<Self> {
        Self::build_with(entries, MatcherConfig::default())
    }

    pub fn build_with(entries: Vec<FaqEntry>, config: MatcherConfig) -> Result<Self> {
        config.validate()?;
        if entries.is_empty() {
            return Err(Error::EmptyCorpus);
        }

        let mut dictionary: HashMap<String, TermId> = HashMap::new();
        let mut df: Vec<u32> = Vec::new();
        let mut counts: Vec<BTreeMap<TermId, u32>> = Vec::with_capacity(entries.len());
        for entry in &entries {
            let mut entry_counts = BTreeMap::new();
            for (term, tf) in term_counts(&entry.question, config.stem) {
                let next_id = dictionary.len() as TermId;
                let tid = *dictionary.entry(term).or_insert_with(|| {
                    df.push(0);
                    next_id
                });
                df[tid as usize] += 1;
                entry_counts.insert(tid, tf);
            }
            counts.push(entry_counts);
        }

        let idf = compute_idf(&df, entries.len(), config.idf);
        let vectors = counts
            .iter()
            .map(|c| weigh(c.iter().map(|(&tid, &tf)| (tid, tf)), &idf, config.sublinear_tf))
            .collect();
        let fingerprint = corpus_fingerprint(&entries);
        let index = Self::assemble(entries, dictionary, df, idf, vectors, config, fingerprint);
        tracing::info!(
            num_entries = index.entries.len(),
            num_terms = index.dictionary.len(),
            fingerprint = %index.fingerprint,
            "built faq index"
        );
        Ok(index)
    }

    /// Reassemble an index from persisted parts, checking that they fit together.
    pub fn from_parts(
        entries: Vec<FaqEntry>,
        dictionary: HashMap<String, TermId>,
        df: Vec<u32>,
        vectors: Vec<TermVector>,
        config: MatcherConfig,
        fingerprint: String,
    ) -> Result<Self> {
        config.validate()?;
        if entries.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        if vectors.len() != entries.len() {
            return Err(Error::CorruptIndex(format!(
                "{} vectors for {} entries",
                vectors.len(),
                entries.len()
            )));
        }
        if df.len() != dictionary.len() || dictionary.values().any(|&tid| tid as usize >= df.len()) {
            return Err(Error::CorruptIndex("dictionary and document frequencies disagree".into()));
        }
        for vector in &vectors {
            if vector.iter().any(|&(tid, w)| tid as usize >= df.len() || !w.is_finite()) {
                return Err(Error::CorruptIndex("vector refers to an unknown term".into()));
            }
        }
        if corpus_fingerprint(&entries) != fingerprint {
            return Err(Error::CorruptIndex("stored entries do not match the stored fingerprint".into()));
        }
        let idf = compute_idf(&df, entries.len(), config.idf);
        Ok(Self::assemble(entries, dictionary, df, idf, vectors, config, fingerprint))
    }

    fn assemble(
        entries: Vec<FaqEntry>,
        dictionary: HashMap<String, TermId>,
        df: Vec<u32>,
        idf: Vec<f32>,
        vectors: Vec<TermVector>,
        config: MatcherConfig,
        fingerprint: String,
    ) -> Self {
        let mut postings: Vec<Vec<Posting>> = vec![Vec::new(); df.len()];
        for (pos, vector) in vectors.iter().enumerate() {
            for &(tid, weight) in vector {
                postings[tid as usize].push(Posting { entry: pos as u32, weight });
            }
        }
        Self { entries, dictionary, df, idf, vectors, postings, config, fingerprint }
    }

    /// Best entry for `query`, decided with the configured threshold.
    pub fn find_best(&self, query: &str) -> MatchOutcome<'_> {
        self.decide(query, self.config.threshold)
    }

    /// Like [`FaqIndex::find_best`] with a one-off threshold, which must lie in `[0, 1]`.
    pub fn find_best_above(&self, query: &str, threshold: f32) -> Result<MatchOutcome<'_>> {
        validate_threshold(threshold)?;
        Ok(self.decide(query, threshold))
    }

    fn decide(&self, query: &str, threshold: f32) -> MatchOutcome<'_> {
        let q = self.query_vector(query);
        if q.is_empty() {
            tracing::debug!(query, "query has no known terms");
            return MatchOutcome::NoMatch { best_score: 0.0 };
        }

        // both sides are unit length, so the dot product is the cosine
        let mut scores = vec![0.0f32; self.entries.len()];
        for &(tid, q_w) in &q {
            for p in &self.postings[tid as usize] {
                scores[p.entry as usize] += p.weight * q_w;
            }
        }

        let mut best = 0usize;
        for (pos, &score) in scores.iter().enumerate().skip(1) {
            if score > scores[best] {
                best = pos;
            }
        }
        let score = scores[best].clamp(0.0, 1.0);
        if score < threshold {
            tracing::debug!(query, best_score = score, threshold, "no faq entry above threshold");
            return MatchOutcome::NoMatch { best_score: score };
        }
        MatchOutcome::Matched(Match { position: best, entry: &self.entries[best], score })
    }

    /// Unit-length weight vector for `query`; empty when no term is in the vocabulary.
    pub fn query_vector(&self, query: &str) -> TermVector {
        let known = term_counts(query, self.config.stem)
            .into_iter()
            .filter_map(|(term, tf)| self.dictionary.get(&term).map(|&tid| (tid, tf)));
        weigh(known, &self.idf, self.config.sublinear_tf)
    }

    /// Copy of this index that decides with a different threshold.
    pub fn with_threshold(&self, threshold: f32) -> Result<Self> {
        validate_threshold(threshold)?;
        let mut index = self.clone();
        index.config.threshold = threshold;
        Ok(index)
    }

    pub fn entries(&self) -> &[FaqEntry] {
        &self.entries
    }

    pub fn entry(&self, position: usize) -> Option<&FaqEntry> {
        self.entries.get(position)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dictionary(&self) -> &HashMap<String, TermId> {
        &self.dictionary
    }

    pub fn df(&self) -> &[u32] {
        &self.df
    }

    pub fn num_terms(&self) -> usize {
        self.dictionary.len()
    }

    pub fn vectors(&self) -> &[TermVector] {
        &self.vectors
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// SHA-1 of the corpus this index was built from.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn is_built_from(&self, entries: &[FaqEntry]) -> bool {
        corpus_fingerprint(entries) == self.fingerprint
    }
}

fn compute_idf(df: &[u32], num_entries: usize, weighting: IdfWeighting) -> Vec<f32> {
    df.iter().map(|&d| weighting.idf(num_entries, d)).collect()
}

fn weigh(counts: impl Iterator<Item = (TermId, u32)>, idf: &[f32], sublinear_tf: bool) -> TermVector {
    let mut vector: TermVector = counts
        .map(|(tid, tf_raw)| {
            let tf = if sublinear_tf { 1.0 + (tf_raw as f32).ln() } else { tf_raw as f32 };
            (tid, tf * idf[tid as usize])
        })
        .filter(|&(_, w)| w > 0.0)
        .collect();
    vector.sort_by_key(|&(tid, _)| tid);

    let norm = vector.iter().map(|&(_, w)| w * w).sum::<f32>().sqrt();
    if norm == 0.0 {
        return Vec::new();
    }
    for (_, w) in vector.iter_mut() {
        *w /= norm;
    }
    vector
}
